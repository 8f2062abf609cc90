mod glucose_status;
mod notification;
mod reading;

pub use glucose_status::{GlucoseStatus, Severity};
pub use notification::{Notification, NotificationKind, Notifier, DISPLAY_DURATION_MS};
pub use reading::Reading;
