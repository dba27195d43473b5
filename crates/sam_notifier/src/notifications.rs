//! Presents the queue progress through the desktop notification server (`org.freedesktop.Notifications`).

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use futures::StreamExt;
use sam_tracker::{
    dbus::{self, CloseReason},
    Error, Notification, Presenter, PresenterFeedback, Result,
};
use tokio::task::JoinHandle;
use zbus::zvariant::Value;

const APP_NAME: &str = "App Manager";
const APP_ICON: &str = "system-software-install-symbolic";

/// Keep the notification until we close it ourselves.
const NEVER_EXPIRE: i32 = 0;

/// A notification server we are connected to, together with the task watching it.
struct NotificationSource {
    proxy: dbus::NotificationsProxy<'static>,
    watcher: JoinHandle<()>,
}

impl Drop for NotificationSource {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// Content and server-side id of the notification we show.
///
/// The id is 0 while nothing is shown. It is shared with the source watcher, which compares it against the ids in
/// `NotificationClosed` signals.
#[derive(Debug, Default)]
struct ShownNotification {
    content: Option<Notification>,
    id: Arc<AtomicU32>,
}

impl ShownNotification {
    fn shared_id(&self) -> Arc<AtomicU32> {
        self.id.clone()
    }

    /// Id to pass as `replaces_id`, so the server updates our notification in place.
    fn replaces_id(&self) -> u32 {
        self.id.load(Ordering::SeqCst)
    }

    fn is_current(&self, notification: &Notification) -> bool {
        self.content.as_ref() == Some(notification)
    }

    /// The active notification with its body replaced, or `None` if nothing is shown.
    fn with_body(&self, body: &str) -> Option<Notification> {
        self.content.as_ref().map(|active| Notification { body: body.to_string(), ..active.clone() })
    }

    fn shown(&mut self, id: u32, notification: Notification) {
        self.id.store(id, Ordering::SeqCst);
        self.content = Some(notification);
    }

    /// Forget the notification, returning its id if there is one to close.
    fn take_id(&mut self) -> Option<u32> {
        self.content = None;
        match self.id.swap(0, Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    /// Forget the notification if it is still the one with `id`.
    fn forget(&mut self, id: u32) -> bool {
        if id == 0 || self.id.compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return false;
        }
        self.content = None;
        true
    }

    fn clear(&mut self) {
        self.content = None;
        self.id.store(0, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.content.is_some()
    }
}

/// [`Presenter`] backed by the freedesktop notification server on the session bus.
///
/// The server has no way to hide a notification's close button, so instead the notification is marked resident,
/// never expires, and whenever the server reports that the user dismissed *our* notification, the session is told
/// so it can show it again. Notifications of other applications are never looked at.
pub struct FdoPresenter {
    feedback: PresenterFeedback,
    connection: Option<zbus::Connection>,
    source: Option<NotificationSource>,
    shown: ShownNotification,
}

impl FdoPresenter {
    pub fn new(feedback: PresenterFeedback) -> Self {
        FdoPresenter { feedback, connection: None, source: None, shown: ShownNotification::default() }
    }

    async fn connection(&mut self) -> Result<zbus::Connection> {
        if let Some(con) = &self.connection {
            return Ok(con.clone());
        }
        let con = zbus::Connection::session().await.map_err(unavailable)?;
        self.connection = Some(con.clone());
        Ok(con)
    }

    fn proxy(&self) -> Result<&dbus::NotificationsProxy<'static>> {
        match &self.source {
            Some(source) => Ok(&source.proxy),
            None => Err(Error::PresenterUnavailable("no notification source".to_string())),
        }
    }

    async fn show(&mut self, notification: Notification) -> Result<()> {
        let replaces_id = self.shown.replaces_id();
        let urgency = Value::from(notification.urgency.as_hint());
        let resident = Value::from(true);
        let transient = Value::from(false);
        let hints = HashMap::from([("urgency", &urgency), ("resident", &resident), ("transient", &transient)]);

        let id = self
            .proxy()?
            .notify(APP_NAME, replaces_id, APP_ICON, &notification.title, &notification.body, &[], hints, NEVER_EXPIRE)
            .await
            .map_err(unavailable)?;

        if id != replaces_id {
            log::debug!("Showing notification {}", id);
        }
        self.shown.shown(id, notification);
        Ok(())
    }
}

impl Presenter for FdoPresenter {
    async fn ensure_source(&mut self) -> Result<()> {
        if self.source.is_some() {
            return Ok(());
        }
        let con = self.connection().await?;
        let proxy = dbus::NotificationsProxy::new(&con).await.map_err(unavailable)?;
        let watcher = tokio::spawn({
            let proxy = proxy.clone();
            let active_id = self.shown.shared_id();
            let feedback = self.feedback.clone();
            async move {
                if let Err(err) = watch_source(proxy, active_id, feedback.clone()).await {
                    log::error!("Failed to watch the notification server: {}", err);
                    feedback.source_destroyed();
                }
            }
        });
        log::debug!("Acquired notification source");
        self.source = Some(NotificationSource { proxy, watcher });
        Ok(())
    }

    async fn create_or_update(&mut self, notification: &Notification) -> Result<()> {
        if self.shown.is_current(notification) {
            return Ok(());
        }
        self.show(notification.clone()).await
    }

    async fn update_body(&mut self, body: &str) -> Result<()> {
        match self.shown.with_body(body) {
            Some(notification) => self.show(notification).await,
            None => Ok(()),
        }
    }

    async fn destroy(&mut self) -> Result<()> {
        let Some(id) = self.shown.take_id() else {
            return Ok(());
        };
        log::debug!("Closing notification {}", id);
        self.proxy()?.close_notification(id).await.map_err(unavailable)
    }

    fn forget_notification(&mut self, id: u32) -> bool {
        self.shown.forget(id)
    }

    fn invalidate_source(&mut self) {
        self.shown.clear();
        self.source = None;
    }

    fn is_active(&self) -> bool {
        self.shown.is_active()
    }
}

fn unavailable(err: zbus::Error) -> Error {
    Error::PresenterUnavailable(err.to_string())
}

/// Whether a `NotificationClosed` signal means the host took our notification away without being asked to.
fn closed_by_host(id: u32, reason: CloseReason, active_id: u32) -> bool {
    id != 0 && id == active_id && matches!(reason, CloseReason::Expired | CloseReason::DismissedByUser)
}

/// Report dismissals of our notification and the disappearance of the notification server.
async fn watch_source(
    proxy: dbus::NotificationsProxy<'static>,
    active_id: Arc<AtomicU32>,
    feedback: PresenterFeedback,
) -> zbus::Result<()> {
    let bus = zbus::fdo::DBusProxy::new(proxy.connection()).await?;
    let mut owner_changes = bus.receive_name_owner_changed_with_args(&[(0, dbus::NOTIFICATIONS_BUS)]).await?;
    let mut closed = proxy.receive_notification_closed().await?;

    loop {
        tokio::select! {
            Some(sig) = closed.next() => {
                let args = match sig.args() {
                    Ok(args) => args,
                    Err(err) => {
                        log::warn!("Ignoring malformed NotificationClosed signal: {}", err);
                        continue;
                    }
                };
                if closed_by_host(args.id, CloseReason::from(args.reason), active_id.load(Ordering::SeqCst)) {
                    log::debug!("Notification {} was closed by the host", args.id);
                    feedback.notification_dismissed(args.id);
                }
            },
            Some(sig) = owner_changes.next() => {
                let args = match sig.args() {
                    Ok(args) => args,
                    Err(err) => {
                        log::warn!("Ignoring malformed NameOwnerChanged signal: {}", err);
                        continue;
                    }
                };
                if args.new_owner().is_none() {
                    log::warn!("Notification server left the bus");
                    feedback.source_destroyed();
                    break;
                }
            },
            else => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use sam_tracker::Urgency;

    use super::*;

    fn notification(title: &str, body: &str) -> Notification {
        Notification { title: title.to_string(), body: body.to_string(), urgency: Urgency::Normal }
    }

    #[test]
    fn test_identical_content_is_current() {
        let mut shown = ShownNotification::default();
        assert!(!shown.is_current(&notification("Installing Foo (1/1)", "Progress: 0%")));

        shown.shown(7, notification("Installing Foo (1/1)", "Progress: 0%"));
        assert!(shown.is_current(&notification("Installing Foo (1/1)", "Progress: 0%")));
        assert!(!shown.is_current(&notification("Installing Foo (1/1)", "Progress: 5%")));
    }

    #[test]
    fn test_updates_replace_the_shown_id() {
        let mut shown = ShownNotification::default();
        assert_eq!(0, shown.replaces_id());

        shown.shown(7, notification("Installing Foo (1/1)", "Progress: 0%"));
        assert_eq!(7, shown.replaces_id());
        assert_eq!(7, shown.shared_id().load(Ordering::SeqCst));
    }

    #[test]
    fn test_body_update_needs_an_active_notification() {
        let mut shown = ShownNotification::default();
        assert_eq!(None, shown.with_body("Progress: 10%"));

        shown.shown(7, notification("Installing Foo (1/1)", "Progress: 0%"));
        assert_eq!(Some(notification("Installing Foo (1/1)", "Progress: 10%")), shown.with_body("Progress: 10%"));
    }

    #[test]
    fn test_nothing_to_close_without_an_id() {
        let mut shown = ShownNotification::default();
        assert_eq!(None, shown.take_id());

        shown.shown(7, notification("Installing Foo (1/1)", "Progress: 0%"));
        assert_eq!(Some(7), shown.take_id());
        assert!(!shown.is_active());
        assert_eq!(None, shown.take_id());
    }

    #[test]
    fn test_forget_ignores_replaced_ids() {
        let mut shown = ShownNotification::default();
        shown.shown(7, notification("Installing Foo (1/1)", "Progress: 0%"));
        // the host dismissed 7, but a progress update got there first and the server handed out 8
        shown.shown(8, notification("Installing Foo (1/1)", "Progress: 20%"));

        assert!(!shown.forget(7));
        assert!(shown.is_active());
        assert_eq!(8, shown.replaces_id());

        assert!(shown.forget(8));
        assert!(!shown.is_active());
        assert_eq!(0, shown.replaces_id());
        assert!(!shown.forget(0));
    }

    #[test]
    fn test_clear_drops_content_and_id() {
        let mut shown = ShownNotification::default();
        let watched = shown.shared_id();
        shown.shown(7, notification("Installing Foo (1/1)", "Progress: 0%"));
        shown.clear();

        assert!(!shown.is_active());
        assert_eq!(0, watched.load(Ordering::SeqCst));
    }

    #[test]
    fn test_only_our_notification_counts_as_closed_by_host() {
        assert!(closed_by_host(7, CloseReason::DismissedByUser, 7));
        assert!(closed_by_host(7, CloseReason::Expired, 7));
        assert!(!closed_by_host(8, CloseReason::DismissedByUser, 7));
        assert!(!closed_by_host(7, CloseReason::Closed, 7));
        assert!(!closed_by_host(7, CloseReason::Undefined, 7));
        assert!(!closed_by_host(0, CloseReason::DismissedByUser, 0));
    }

    #[test]
    fn test_close_reason_from_wire() {
        assert_eq!(CloseReason::Expired, CloseReason::from(1));
        assert_eq!(CloseReason::DismissedByUser, CloseReason::from(2));
        assert_eq!(CloseReason::Closed, CloseReason::from(3));
        assert_eq!(CloseReason::Undefined, CloseReason::from(4));
    }
}
