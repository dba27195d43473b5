use std::collections::HashMap;

use zbus::{dbus_proxy, zvariant::Value};

pub const NOTIFICATIONS_BUS: &str = "org.freedesktop.Notifications";

#[dbus_proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    /// Notify method
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, &Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    /// CloseNotification method
    fn close_notification(&self, id: u32) -> zbus::Result<()>;

    /// NotificationClosed signal
    #[dbus_proxy(signal)]
    fn notification_closed(&self, id: u32, reason: u32) -> zbus::Result<()>;
}

/// Why the server closed a notification, as reported by `NotificationClosed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Expired,
    DismissedByUser,
    /// Closed by a call to `CloseNotification`.
    Closed,
    Undefined,
}

impl From<u32> for CloseReason {
    fn from(reason: u32) -> Self {
        match reason {
            1 => CloseReason::Expired,
            2 => CloseReason::DismissedByUser,
            3 => CloseReason::Closed,
            _ => CloseReason::Undefined,
        }
    }
}
