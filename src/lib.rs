//! Deadline Notifier Library
//!
//! In-app notification store, local and push delivery, and the trigger that
//! asks an upstream generator to materialize deadline notifications.

pub mod background;
pub mod config;
pub mod delivery;
pub mod error;
pub mod generation;
pub mod notifications;
pub mod platform;
pub mod push;
pub mod server;
pub mod sqlite_store;

// Re-export commonly used types for convenience
pub use background::{BackgroundDeliveryHandler, NavigationIntent};
pub use delivery::DeliveryChannel;
pub use error::{NotifyError, NotifyResult};
pub use generation::{GenerationTrigger, NotificationGenerator};
pub use notifications::{Notification, NotificationStore, StoreMode};
pub use platform::{NotificationPlatform, Permission};
pub use push::{PushConfig, PushRegistrationManager, RegistrationState};
pub use server::{run_server, RequestsLoggingLevel};
pub use sqlite_store::SqliteStore;
