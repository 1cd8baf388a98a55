//! Push registration state machine.

use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::key::decode_relay_key;
use super::{PushConfig, PushPlatform, PushSubscription, SubscribeOptions, SubscriptionInfo};
use crate::delivery::DeliveryChannel;
use crate::error::{NotifyError, NotifyResult};

/// Registration lifecycle.
///
/// `Unregistered → Registering → Ready → Subscribed`; `Failed` is entered when
/// registration or a subscribe call is rejected. `initialize` recovers from
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Ready,
    Subscribed,
    Failed,
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationState::Unregistered => write!(f, "Unregistered"),
            RegistrationState::Registering => write!(f, "Registering"),
            RegistrationState::Ready => write!(f, "Ready"),
            RegistrationState::Subscribed => write!(f, "Subscribed"),
            RegistrationState::Failed => write!(f, "Failed"),
        }
    }
}

struct RegistrationInner {
    state: RegistrationState,
    subscription: Option<PushSubscription>,
    /// A `subscribe` call owns the `Ready` state until it finishes.
    subscribing: bool,
}

/// Puts the manager back to `Unregistered` if an `initialize` call is dropped
/// before the platform answered.
struct RegisteringGuard<'a> {
    inner: &'a Mutex<RegistrationInner>,
    armed: bool,
}

impl RegisteringGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RegisteringGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut inner) = self.inner.lock() {
            if inner.state == RegistrationState::Registering {
                debug!("Push registration abandoned, resetting to Unregistered");
                inner.state = RegistrationState::Unregistered;
            }
        }
    }
}

/// Releases the subscribe claim when a `subscribe` call ends or is dropped.
struct SubscribingGuard<'a> {
    inner: &'a Mutex<RegistrationInner>,
}

impl Drop for SubscribingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.subscribing = false;
    }
}

/// Owns the background handler registration and the relay subscription.
pub struct PushRegistrationManager {
    platform: Arc<dyn PushPlatform>,
    channel: DeliveryChannel,
    config: PushConfig,
    supported: OnceLock<bool>,
    inner: Mutex<RegistrationInner>,
}

impl PushRegistrationManager {
    pub fn new(platform: Arc<dyn PushPlatform>, channel: DeliveryChannel, config: PushConfig) -> Self {
        Self {
            platform,
            channel,
            config,
            supported: OnceLock::new(),
            inner: Mutex::new(RegistrationInner {
                state: RegistrationState::Unregistered,
                subscription: None,
                subscribing: false,
            }),
        }
    }

    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    pub fn state(&self) -> RegistrationState {
        self.lock().state
    }

    /// Copy of the current subscription, if subscribed.
    pub fn subscription_info(&self) -> Option<SubscriptionInfo> {
        self.lock().subscription.as_ref().map(SubscriptionInfo::from)
    }

    /// Probed once per manager.
    pub fn is_supported(&self) -> bool {
        *self
            .supported
            .get_or_init(|| self.platform.supports_background_delivery())
    }

    /// Register the background handler and wait until it is active.
    ///
    /// Already `Ready`/`Subscribed` managers return immediately.
    pub async fn initialize(&self) -> NotifyResult<()> {
        {
            let mut inner = self.lock();
            match inner.state {
                RegistrationState::Ready | RegistrationState::Subscribed => return Ok(()),
                RegistrationState::Registering => {
                    return Err(NotifyError::NotReady {
                        state: inner.state,
                    })
                }
                RegistrationState::Unregistered | RegistrationState::Failed => {}
            }
            inner.state = RegistrationState::Registering;
        }

        if !self.is_supported() {
            warn!("Background delivery is not supported on this platform");
            self.set_state(RegistrationState::Failed);
            return Err(NotifyError::UnsupportedPlatform);
        }

        let guard = RegisteringGuard {
            inner: &self.inner,
            armed: true,
        };
        let result = async {
            self.platform.register_handler(&self.config).await?;
            self.platform.handler_ready().await
        }
        .await;
        guard.disarm();

        match result {
            Ok(()) => {
                info!(
                    "Background handler {} ready (scope {})",
                    self.config.handler_path, self.config.scope
                );
                self.set_state(RegistrationState::Ready);
                Ok(())
            }
            Err(e) => {
                warn!("Background handler registration failed: {:#}", e);
                self.set_state(RegistrationState::Failed);
                Err(NotifyError::RegistrationFailed(format!("{:#}", e)))
            }
        }
    }

    /// Subscribe to the relay using its public key in URL-safe base64.
    ///
    /// Only one call may be in flight; a concurrent call fails with `NotReady`
    /// without reaching the platform.
    pub async fn subscribe(&self, relay_public_key: &str) -> NotifyResult<SubscriptionInfo> {
        let _claim = self.claim_subscribe()?;

        let application_server_key = decode_relay_key(relay_public_key)?;
        self.channel.ensure_permission().await?;

        let options = SubscribeOptions {
            user_visible_only: true,
            application_server_key,
        };

        match self.platform.subscribe(options).await {
            Ok(subscription) => {
                let stale_state = {
                    let mut inner = self.lock();
                    if inner.state == RegistrationState::Ready {
                        let info = SubscriptionInfo::from(&subscription);
                        info!("Subscribed to push relay at {}", info.endpoint);
                        inner.subscription = Some(subscription);
                        inner.state = RegistrationState::Subscribed;
                        return Ok(info);
                    }
                    inner.state
                };

                // Nothing may hold a subscription the manager does not own.
                warn!(
                    "State changed to {} while subscribing, releasing {}",
                    stale_state, subscription.endpoint
                );
                if let Err(e) = self.platform.unsubscribe(&subscription).await {
                    warn!("Failed to release stale push subscription: {:#}", e);
                }
                Err(NotifyError::NotReady { state: stale_state })
            }
            Err(e) => {
                warn!("Push subscription rejected: {:#}", e);
                self.set_state(RegistrationState::Failed);
                Err(NotifyError::SubscriptionDenied(format!("{:#}", e)))
            }
        }
    }

    /// Drop the current subscription and return to `Ready`.
    pub async fn unsubscribe(&self) -> NotifyResult<()> {
        let subscription = {
            let mut inner = self.lock();
            if inner.state != RegistrationState::Subscribed {
                return Err(NotifyError::NotReady { state: inner.state });
            }
            match inner.subscription.take() {
                Some(subscription) => subscription,
                None => {
                    inner.state = RegistrationState::Ready;
                    return Ok(());
                }
            }
        };

        match self.platform.unsubscribe(&subscription).await {
            Ok(()) => {
                info!("Unsubscribed from push relay at {}", subscription.endpoint);
                self.set_state(RegistrationState::Ready);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to unsubscribe from push relay: {:#}", e);
                self.lock().subscription = Some(subscription);
                Err(NotifyError::RemoteWriteFailed(format!("{:#}", e)))
            }
        }
    }

    fn claim_subscribe(&self) -> NotifyResult<SubscribingGuard<'_>> {
        let mut inner = self.lock();
        if inner.state != RegistrationState::Ready || inner.subscribing {
            return Err(NotifyError::NotReady { state: inner.state });
        }
        inner.subscribing = true;
        Ok(SubscribingGuard { inner: &self.inner })
    }

    fn set_state(&self, state: RegistrationState) {
        self.lock().state = state;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistrationInner> {
        // The lock is never held across an await or a panic-prone call.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
