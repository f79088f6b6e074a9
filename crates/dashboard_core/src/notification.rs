use std::time::Duration;

pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(4000);

pub type NotificationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

/// The single visible toast. A newer one replaces it and makes its expiry stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub message: String,
}
