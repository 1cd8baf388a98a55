//! Host notification primitives.
//!
//! Everything that actually puts a notification on screen goes through
//! `NotificationPlatform`, so the delivery channel and the background handler
//! can be driven by a fake host in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Permission state reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Granted,
    Denied,
    /// The user hasn't been asked yet.
    Default,
}

/// A notification as handed to the host for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRequest {
    pub title: String,
    pub body: String,
    /// Replaces any displayed notification with the same tag.
    pub tag: Option<String>,
    pub data: serde_json::Value,
}

impl DisplayRequest {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            tag: None,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    /// Whether the host can display notifications at all.
    fn is_supported(&self) -> bool;

    fn permission(&self) -> Permission;

    /// Ask the user for permission. Only called while the state is `Default`.
    async fn prompt_permission(&self) -> Permission;

    fn display(&self, request: DisplayRequest);

    /// Close the displayed notification carrying `tag`, if any.
    fn close(&self, tag: &str);
}
