//! Notification data models

use serde::{Deserialize, Serialize};

/// Notification kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DeadlineDue,
    DeadlineOverdue,
    Reminder,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::DeadlineDue => "deadline_due",
            NotificationKind::DeadlineOverdue => "deadline_overdue",
            NotificationKind::Reminder => "reminder",
            NotificationKind::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deadline_due" => Some(NotificationKind::DeadlineDue),
            "deadline_overdue" => Some(NotificationKind::DeadlineOverdue),
            "reminder" => Some(NotificationKind::Reminder),
            "system" => Some(NotificationKind::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// A user notification.
///
/// `related_entity_id` is a back-reference to the deadline the notification was
/// generated from. Deleting the notification never touches the deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_entity_id: Option<String>,
    pub related_entity_label: Option<String>,
    /// Unix timestamp in milliseconds.
    pub created_at: i64,
    pub read: bool,
    pub priority: Priority,
}

/// Fields supplied by the caller when creating a notification.
/// `id`, `created_at` and `read` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub related_entity_id: Option<String>,
    #[serde(default)]
    pub related_entity_label: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

impl NotificationDraft {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            related_entity_id: None,
            related_entity_label: None,
            priority: Priority::default(),
        }
    }

    pub fn with_related_entity(mut self, id: impl Into<String>, label: impl Into<String>) -> Self {
        self.related_entity_id = Some(id.into());
        self.related_entity_label = Some(label.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Materialize the draft into an unread record.
    pub fn into_notification(self, id: String, created_at: i64) -> Notification {
        Notification {
            id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            related_entity_id: self.related_entity_id,
            related_entity_label: self.related_entity_label,
            created_at,
            read: false,
            priority: self.priority,
        }
    }
}

/// Observable state of a `NotificationStore`: the ordered collection together
/// with its unread count. Both fields are always replaced together.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

impl NotificationSnapshot {
    pub(crate) fn from_records(notifications: Vec<Notification>) -> Self {
        let unread_count = notifications.iter().filter(|n| !n.read).count();
        Self {
            notifications,
            unread_count,
        }
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_kind_serialization() {
        let serialized = serde_json::to_string(&NotificationKind::DeadlineOverdue).unwrap();
        assert_eq!(serialized, "\"deadline_overdue\"");

        let deserialized: NotificationKind = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, NotificationKind::DeadlineOverdue);
    }

    #[test]
    fn test_kind_and_priority_parse_matches_as_str() {
        for kind in [
            NotificationKind::DeadlineDue,
            NotificationKind::DeadlineOverdue,
            NotificationKind::Reminder,
            NotificationKind::System,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        for priority in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(Priority::parse(priority.as_str()), Some(priority));
        }
        assert!(NotificationKind::parse("download_completed").is_none());
        assert!(Priority::parse("urgent").is_none());
    }

    #[test]
    fn test_draft_defaults_when_fields_missing() {
        let draft: NotificationDraft = serde_json::from_value(serde_json::json!({
            "kind": "reminder",
            "title": "Essay",
            "message": "Due tomorrow",
        }))
        .unwrap();

        assert_eq!(draft.priority, Priority::Medium);
        assert!(draft.related_entity_id.is_none());
    }

    #[test]
    fn test_into_notification_is_unread() {
        let notification = NotificationDraft::new(NotificationKind::DeadlineDue, "Essay", "Due soon")
            .with_related_entity("deadline-1", "History essay")
            .with_priority(Priority::High)
            .into_notification("n-1".to_string(), 1_700_000_000_000);

        assert_eq!(notification.id, "n-1");
        assert!(!notification.read);
        assert_eq!(notification.created_at, 1_700_000_000_000);
        assert_eq!(notification.related_entity_id.as_deref(), Some("deadline-1"));
        assert_eq!(notification.priority, Priority::High);
    }

    #[test]
    fn test_snapshot_counts_unread() {
        let mut read = NotificationDraft::new(NotificationKind::System, "a", "b")
            .into_notification("1".into(), 2);
        read.read = true;
        let unread = NotificationDraft::new(NotificationKind::System, "a", "b")
            .into_notification("2".into(), 1);

        let snapshot = NotificationSnapshot::from_records(vec![read, unread]);
        assert_eq!(snapshot.unread_count, 1);
    }
}
