//! Cancellable in-process timers for scheduled notifications.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::DeliveryChannel;

/// Handle to a notification scheduled with `DeliveryChannel::show_at`.
///
/// Dropping the handle leaves the timer running; call `cancel` (or keep the
/// handle in a `ReminderSet`) to stop it.
#[derive(Debug)]
pub struct ScheduledDelivery {
    fire_at: DateTime<Utc>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ScheduledDelivery {
    pub(super) fn spawn(
        channel: DeliveryChannel,
        title: String,
        body: String,
        metadata: serde_json::Value,
        fire_at: DateTime<Utc>,
    ) -> Self {
        // Negative durations fail to convert, which is exactly the "already due" case.
        let delay = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {
                    debug!("Scheduled notification '{}' cancelled", title);
                }
                _ = tokio::time::sleep(delay) => {
                    if !cancelled.is_cancelled() {
                        channel.show_now(&title, &body, metadata);
                    }
                }
            }
        });

        Self {
            fire_at,
            token,
            task,
        }
    }

    /// Prevent the notification from firing. No effect once it has fired.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the timer task is done, either fired or cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn fire_at(&self) -> DateTime<Utc> {
        self.fire_at
    }
}

/// Scheduled notifications owned by one view or context.
///
/// Every pending timer is cancelled when the set is dropped.
#[derive(Debug, Default)]
pub struct ReminderSet {
    pending: Vec<ScheduledDelivery>,
}

impl ReminderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delivery: ScheduledDelivery) {
        self.pending.retain(|d| !d.is_finished());
        self.pending.push(delivery);
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.pending
            .iter()
            .filter(|d| !d.is_finished() && !d.is_cancelled())
            .count()
    }

    pub fn cancel_all(&mut self) {
        for delivery in self.pending.drain(..) {
            delivery.cancel();
        }
    }
}

impl Drop for ReminderSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
