//! Active account tracking
//!
//! At most one account per platform is "active", i.e. used by default for
//! one-click posting. Selections are session-only and are never persisted.

use std::collections::HashMap;

/// Mapping platform id -> active account id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveAccountSelection {
    selections: HashMap<String, String>,
}

impl ActiveAccountSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `account_id` for `platform_id`, replacing any previous choice
    pub fn set(&mut self, platform_id: &str, account_id: &str) {
        self.selections
            .insert(platform_id.to_string(), account_id.to_string());
    }

    pub fn get(&self, platform_id: &str) -> Option<&str> {
        self.selections.get(platform_id).map(String::as_str)
    }

    pub fn clear(&mut self, platform_id: &str) -> Option<String> {
        self.selections.remove(platform_id)
    }

    /// Drop the selection for `platform_id` if it points at `account_id`
    ///
    /// Returns true if a selection was removed.
    pub fn invalidate(&mut self, platform_id: &str, account_id: &str) -> bool {
        if self.get(platform_id) == Some(account_id) {
            self.selections.remove(platform_id);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}
