use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Lifecycle events the core hands to the notification emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    Subscribed,
    Cancelled,
    EntitlementUpdated,
    EntitlementReset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub account_id: String,
    pub kind: NotificationKind,
    pub heading: String,
    pub content: String,
    /// The account type the event concerns, or "system"
    pub category: String,
    pub created_at: i64,
}
