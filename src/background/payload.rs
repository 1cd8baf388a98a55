//! Inbound push payloads and user interaction events.

use serde::{Deserialize, Serialize};

use crate::error::{NotifyError, NotifyResult};

/// Push message as sent by the relay: `{title, body, data?}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundPush {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl InboundPush {
    pub fn parse(raw: &[u8]) -> NotifyResult<Self> {
        serde_json::from_slice(raw).map_err(|e| NotifyError::MalformedPayload(e.to_string()))
    }

    /// Tag under which the notification is displayed. Pushes about the same
    /// deadline replace each other.
    pub fn tag(&self) -> String {
        let data = self.data.as_ref();
        if let Some(tag) = data.and_then(|d| d.get("tag")).and_then(|t| t.as_str()) {
            return tag.to_string();
        }
        match data
            .and_then(|d| d.get("deadline_id"))
            .and_then(|id| id.as_str())
        {
            Some(deadline_id) => format!("deadline-{}", deadline_id),
            None => format!("push-{}", uuid::Uuid::new_v4()),
        }
    }
}

/// Action chosen by the user on a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    View,
    Dismiss,
}

impl NotificationAction {
    /// Unknown or missing actions behave like `View`.
    pub fn from_tag(action: Option<&str>) -> Self {
        match action {
            Some("dismiss") => NotificationAction::Dismiss,
            _ => NotificationAction::View,
        }
    }
}

/// Request for the routing layer to open part of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum NavigationIntent {
    Dashboard,
    Deadline { id: String },
    Url { url: String },
}

impl NavigationIntent {
    pub fn from_data(data: &serde_json::Value) -> Self {
        if let Some(id) = data.get("deadline_id").and_then(|v| v.as_str()) {
            return NavigationIntent::Deadline { id: id.to_string() };
        }
        if let Some(url) = data.get("url").and_then(|v| v.as_str()) {
            return NavigationIntent::Url {
                url: url.to_string(),
            };
        }
        NavigationIntent::Dashboard
    }
}

/// The user clicked a displayed notification or one of its action buttons.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationEvent {
    pub tag: String,
    pub action: Option<String>,
    pub data: serde_json::Value,
}

/// Everything the background handler reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerEvent {
    Push(Vec<u8>),
    Activated(ActivationEvent),
    Closed { tag: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_payload() {
        let push = InboundPush::parse(br#"{"title": "Essay", "body": "Due in 1 hour"}"#).unwrap();
        assert_eq!(push.title, "Essay");
        assert_eq!(push.body, "Due in 1 hour");
        assert!(push.data.is_none());
    }

    #[test]
    fn test_parse_rejects_non_json_and_missing_fields() {
        assert!(matches!(
            InboundPush::parse(b"not json at all"),
            Err(NotifyError::MalformedPayload(_))
        ));
        assert!(matches!(
            InboundPush::parse(br#"{"title": "no body"}"#),
            Err(NotifyError::MalformedPayload(_))
        ));
        assert!(matches!(
            InboundPush::parse(b"[1, 2, 3]"),
            Err(NotifyError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_tag_prefers_explicit_then_deadline() {
        let explicit = InboundPush {
            title: "t".into(),
            body: "b".into(),
            data: Some(json!({"tag": "custom", "deadline_id": "d-1"})),
        };
        assert_eq!(explicit.tag(), "custom");

        let deadline = InboundPush {
            data: Some(json!({"deadline_id": "d-1"})),
            ..explicit.clone()
        };
        assert_eq!(deadline.tag(), "deadline-d-1");

        let anonymous = InboundPush {
            data: None,
            ..explicit
        };
        assert!(anonymous.tag().starts_with("push-"));
    }

    #[test]
    fn test_action_defaults_to_view() {
        assert_eq!(NotificationAction::from_tag(Some("view")), NotificationAction::View);
        assert_eq!(NotificationAction::from_tag(Some("dismiss")), NotificationAction::Dismiss);
        assert_eq!(NotificationAction::from_tag(Some("snooze")), NotificationAction::View);
        assert_eq!(NotificationAction::from_tag(None), NotificationAction::View);
    }

    #[test]
    fn test_navigation_intent_from_data() {
        assert_eq!(
            NavigationIntent::from_data(&json!({"deadline_id": "d-9", "url": "/x"})),
            NavigationIntent::Deadline { id: "d-9".into() }
        );
        assert_eq!(
            NavigationIntent::from_data(&json!({"url": "/timetable"})),
            NavigationIntent::Url {
                url: "/timetable".into()
            }
        );
        assert_eq!(
            NavigationIntent::from_data(&serde_json::Value::Null),
            NavigationIntent::Dashboard
        );
    }
}
