//! Background delivery handler.
//!
//! Runs independently of any open view: it turns relay pushes into displayed
//! notifications and user interaction with them into navigation intents. It
//! shares no state with `NotificationStore`.

mod payload;

pub use payload::{ActivationEvent, HandlerEvent, InboundPush, NavigationIntent, NotificationAction};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::platform::{DisplayRequest, NotificationPlatform};
use crate::server::metrics;

pub struct BackgroundDeliveryHandler {
    platform: Arc<dyn NotificationPlatform>,
}

impl BackgroundDeliveryHandler {
    pub fn new(platform: Arc<dyn NotificationPlatform>) -> Self {
        Self { platform }
    }

    /// Display an inbound push. Payloads that don't parse are dropped.
    ///
    /// Returns whether a notification was displayed.
    pub fn on_push(&self, raw: &[u8]) -> bool {
        let push = match InboundPush::parse(raw) {
            Ok(push) => push,
            Err(e) => {
                warn!("Dropping push payload: {}", e);
                metrics::record_push_payload_dropped();
                return false;
            }
        };

        let tag = push.tag();
        debug!("Displaying push '{}' as {}", push.title, tag);
        self.platform.display(
            DisplayRequest::new(push.title, push.body)
                .with_tag(tag)
                .with_data(push.data.unwrap_or(serde_json::Value::Null)),
        );
        metrics::record_notification_displayed("push");
        true
    }

    /// Close the activated notification and work out where to navigate.
    pub fn on_activate(&self, event: &ActivationEvent) -> Option<NavigationIntent> {
        self.platform.close(&event.tag);

        match NotificationAction::from_tag(event.action.as_deref()) {
            NotificationAction::Dismiss => {
                debug!("Notification {} dismissed", event.tag);
                None
            }
            NotificationAction::View => Some(NavigationIntent::from_data(&event.data)),
        }
    }

    pub fn on_close(&self, tag: &str) {
        debug!("Notification {} closed without action", tag);
    }

    pub fn handle(&self, event: HandlerEvent) -> Option<NavigationIntent> {
        match event {
            HandlerEvent::Push(raw) => {
                self.on_push(&raw);
                None
            }
            HandlerEvent::Activated(activation) => self.on_activate(&activation),
            HandlerEvent::Closed { tag } => {
                self.on_close(&tag);
                None
            }
        }
    }

    /// Event loop: handle `events` until the channel closes or `shutdown` fires,
    /// forwarding navigation intents to `intents`.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<HandlerEvent>,
        intents: mpsc::Sender<NavigationIntent>,
        shutdown: CancellationToken,
    ) {
        info!("Background delivery handler started");

        loop {
            let event = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = shutdown.cancelled() => break,
            };

            if let Some(intent) = self.handle(event) {
                if intents.send(intent).await.is_err() {
                    debug!("Navigation intent dropped: no receiver");
                }
            }
        }

        info!("Background delivery handler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::RecordingPlatform;
    use serde_json::json;

    fn handler() -> (BackgroundDeliveryHandler, Arc<RecordingPlatform>) {
        let platform = Arc::new(RecordingPlatform::granted());
        (BackgroundDeliveryHandler::new(platform.clone()), platform)
    }

    fn activation(action: Option<&str>) -> ActivationEvent {
        ActivationEvent {
            tag: "deadline-d-1".to_string(),
            action: action.map(str::to_string),
            data: json!({"deadline_id": "d-1"}),
        }
    }

    #[test]
    fn test_push_is_displayed() {
        let (handler, platform) = handler();

        let shown = handler.on_push(
            br#"{"title": "Essay due", "body": "Tomorrow 9:00", "data": {"deadline_id": "d-1"}}"#,
        );

        assert!(shown);
        let displayed = platform.displayed();
        assert_eq!(displayed.len(), 1);
        assert_eq!(displayed[0].title, "Essay due");
        assert_eq!(displayed[0].tag.as_deref(), Some("deadline-d-1"));
        assert_eq!(displayed[0].data["deadline_id"], "d-1");
    }

    #[test]
    fn test_malformed_push_is_dropped_silently() {
        let (handler, platform) = handler();

        assert!(!handler.on_push(b"<html>not json</html>"));
        assert!(!handler.on_push(&[0xff, 0xfe, 0x00]));
        assert!(platform.displayed().is_empty());
    }

    #[test]
    fn test_view_action_closes_and_navigates() {
        let (handler, platform) = handler();

        let intent = handler.on_activate(&activation(Some("view")));

        assert_eq!(intent, Some(NavigationIntent::Deadline { id: "d-1".into() }));
        assert_eq!(platform.closed(), vec!["deadline-d-1".to_string()]);
    }

    #[test]
    fn test_dismiss_action_only_closes() {
        let (handler, platform) = handler();

        assert_eq!(handler.on_activate(&activation(Some("dismiss"))), None);
        assert_eq!(platform.closed(), vec!["deadline-d-1".to_string()]);
    }

    #[test]
    fn test_missing_or_unknown_action_navigates() {
        let (handler, platform) = handler();

        assert!(handler.on_activate(&activation(None)).is_some());
        assert!(handler.on_activate(&activation(Some("snooze"))).is_some());
        assert_eq!(platform.closed().len(), 2);
    }

    #[test]
    fn test_close_event_has_no_effect() {
        let (handler, platform) = handler();

        let intent = handler.handle(HandlerEvent::Closed {
            tag: "deadline-d-1".into(),
        });

        assert!(intent.is_none());
        assert!(platform.displayed().is_empty());
        assert!(platform.closed().is_empty());
    }

    #[tokio::test]
    async fn test_run_forwards_intents_until_shutdown() {
        let (handler, platform) = handler();
        let (event_tx, event_rx) = mpsc::channel(8);
        let (intent_tx, mut intent_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(Arc::new(handler).run(event_rx, intent_tx, shutdown.clone()));

        event_tx
            .send(HandlerEvent::Push(b"garbage".to_vec()))
            .await
            .unwrap();
        event_tx
            .send(HandlerEvent::Push(br#"{"title": "a", "body": "b"}"#.to_vec()))
            .await
            .unwrap();
        event_tx
            .send(HandlerEvent::Activated(activation(None)))
            .await
            .unwrap();

        let intent = intent_rx.recv().await.unwrap();
        assert_eq!(intent, NavigationIntent::Deadline { id: "d-1".into() });
        assert_eq!(platform.displayed().len(), 1);

        shutdown.cancel();
        task.await.unwrap();
    }
}
