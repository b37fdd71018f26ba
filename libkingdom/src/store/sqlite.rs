//! SQLite-backed local store

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use crate::error::{Result, StorageError};
use crate::store::LocalStore;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the store at `db_path`
    ///
    /// Expands `~`, creates parent directories and runs migrations.
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::IoError)?;
        }

        // mode=rwc creates the file when missing; forward slashes keep the URL valid on Windows
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StorageError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StorageError::MigrationError)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT value FROM kv_store WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::SqlxError)?;

        Ok(row.map(|r| r.0))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(StorageError::SqlxError)?;

        Ok(())
    }
}
