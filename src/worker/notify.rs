//! Push messages to notifications.

use serde::{Deserialize, Serialize};

/// Title on every notification.
pub const NOTIFICATION_TITLE: &str = "Showroom";

/// Body used when a push carries no text.
pub const DEFAULT_BODY: &str = "New update available";

/// A notification action button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Payload for `showNotification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    /// Page opened by the "view" action.
    pub url: String,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// Build the notification for a push payload.
    #[must_use]
    pub fn from_push(payload: Option<&str>) -> Self {
        let body = payload
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(DEFAULT_BODY);

        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: body.to_string(),
            icon: "/icon-192.png".to_string(),
            badge: "/icon-72.png".to_string(),
            vibrate: vec![100, 50, 100],
            url: "/".to_string(),
            actions: vec![
                NotificationAction {
                    action: "view".to_string(),
                    title: "View".to_string(),
                },
                NotificationAction {
                    action: "close".to_string(),
                    title: "Close".to_string(),
                },
            ],
        }
    }
}

/// What a notification click does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "url", rename_all = "camelCase")]
pub enum ClickOutcome {
    /// Close the notification and open a window at the URL.
    OpenWindow(String),
    /// Just close the notification.
    Close,
}

/// Resolve a click on `notification` with the chosen action, if any.
#[must_use]
pub fn on_click(notification: &Notification, action: Option<&str>) -> ClickOutcome {
    match action {
        Some("view") => ClickOutcome::OpenWindow(notification.url.clone()),
        _ => ClickOutcome::Close,
    }
}
