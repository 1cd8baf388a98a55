//! Push registration: background handler setup and relay subscription.

mod key;
mod registration;

pub use key::decode_relay_key;
pub use registration::{PushRegistrationManager, RegistrationState};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Static push settings, handed to `PushRegistrationManager::new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Location of the background handler the platform should load.
    pub handler_path: String,
    /// Scope the handler controls.
    pub scope: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        PushConfig {
            handler_path: "/sw.js".to_string(),
            scope: "/".to_string(),
        }
    }
}

/// Options passed to the platform's subscribe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub user_visible_only: bool,
    pub application_server_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Credential returned by the relay. Owned by the registration manager; other
/// components only ever see a `SubscriptionInfo` copy.
#[derive(Debug, PartialEq, Eq)]
pub struct PushSubscription {
    pub endpoint: String,
    pub expiration_time: Option<i64>,
    pub keys: SubscriptionKeys,
}

/// Serializable copy of a subscription, for handing to whoever stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub endpoint: String,
    pub expiration_time: Option<i64>,
    pub keys: SubscriptionKeys,
}

impl From<&PushSubscription> for SubscriptionInfo {
    fn from(subscription: &PushSubscription) -> Self {
        SubscriptionInfo {
            endpoint: subscription.endpoint.clone(),
            expiration_time: subscription.expiration_time,
            keys: subscription.keys.clone(),
        }
    }
}

/// Host push facilities.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Whether the host can run a background handler at all.
    fn supports_background_delivery(&self) -> bool;

    /// Register the background handler described by `config`.
    async fn register_handler(&self, config: &PushConfig) -> Result<()>;

    /// Resolve once the registered handler is active.
    async fn handler_ready(&self) -> Result<()>;

    async fn subscribe(&self, options: SubscribeOptions) -> Result<PushSubscription>;

    async fn unsubscribe(&self, subscription: &PushSubscription) -> Result<()>;
}
