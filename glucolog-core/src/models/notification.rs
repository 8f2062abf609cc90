use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How long a notification stays visible, in milliseconds.
pub const DISPLAY_DURATION_MS: i64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Success => write!(f, "success"),
            NotificationKind::Error => write!(f, "error"),
        }
    }
}

/// Ephemeral status message shown after a user action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub shown_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(message: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message: message.into(),
            kind,
            shown_at: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, NotificationKind::Success)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, NotificationKind::Error)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.shown_at + Duration::milliseconds(DISPLAY_DURATION_MS)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NotificationKind::Success => write!(f, "Éxito: {}", self.message),
            NotificationKind::Error => write!(f, "Error: {}", self.message),
        }
    }
}

/// Holds at most one live notification; a newer one replaces the current.
#[derive(Debug, Default, Clone)]
pub struct Notifier {
    current: Option<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, notification: Notification) -> &Notification {
        self.current.insert(notification)
    }

    /// The visible notification at `now`, dropping it once it has expired.
    pub fn current(&mut self, now: DateTime<Utc>) -> Option<&Notification> {
        if self.current.as_ref().is_some_and(|n| n.is_expired(now)) {
            self.current = None;
        }
        self.current.as_ref()
    }

    /// Last notification shown, regardless of expiry.
    pub fn last(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }
}
