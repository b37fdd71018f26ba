//! Kingdom - content distribution for the Kingdom Studios apps
//!
//! Connects several accounts per social platform, publishes one piece of
//! content to many platforms at once, and schedules posts for later.
//! Per-platform failures are reported as data so one broken platform never
//! blocks the others.

pub mod accounts;
pub mod analytics;
pub mod config;
pub mod distributor;
pub mod error;
pub mod logging;
pub mod notifications;
pub mod platforms;
pub mod scheduler;
pub mod scheduling;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use accounts::AccountStore;
pub use config::Config;
pub use distributor::Distributor;
pub use error::{KingdomError, Result};
pub use platforms::{Platform, PlatformAdapter, PlatformRegistry};
pub use scheduler::Scheduler;
pub use service::KingdomService;
pub use types::{
    Account, AccountCredentials, ContentPayload, PostResult, ScheduleStatus, ScheduledPost,
};
