use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Normal,
}

impl Urgency {
    /// Value of the `urgency` hint in the desktop notifications specification.
    pub fn as_hint(self) -> u8 {
        match self {
            Urgency::Low => 0,
            Urgency::Normal => 1,
        }
    }
}

/// What the progress notification should currently say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub urgency: Urgency,
}

impl Notification {
    /// Build the notification for `record`, which is the `queue_position`th task seen in this session while
    /// `queue_length` tasks are still queued.
    ///
    /// The denominator counts the tasks already done plus the ones still queued.
    pub fn for_task(record: &TaskRecord, queue_position: usize, queue_length: usize) -> Self {
        let total = queue_length.saturating_sub(1) + queue_position;
        Notification {
            title: format!("{} ({}/{})", record.status_line(), queue_position, total),
            body: Notification::progress_body(record.progress),
            urgency: if record.background { Urgency::Low } else { Urgency::Normal },
        }
    }

    pub fn progress_body(percent: u32) -> String {
        format!("Progress: {}%", percent)
    }
}

/// Something that can show a single, persistent notification on behalf of a session.
///
/// Implementations own the handle of the active notification. The presentation channel ("source") belongs to the
/// display host, which may destroy it at any time; implementations report that through [`PresenterFeedback`].
#[allow(async_fn_in_trait)]
pub trait Presenter {
    /// Acquire the presentation channel if we don't hold one. Must be cheap when it already exists.
    async fn ensure_source(&mut self) -> Result<()>;

    /// Show `notification`, replacing the active one in place if there is one. Never shows a second notification.
    ///
    /// The notification must stay until it is destroyed, and the user should not be able to close it.
    async fn create_or_update(&mut self, notification: &Notification) -> Result<()>;

    /// Replace only the body of the active notification.
    async fn update_body(&mut self, body: &str) -> Result<()>;

    /// Remove the active notification. Does nothing if there is none.
    async fn destroy(&mut self) -> Result<()>;

    /// The host closed the notification with server-side id `id`; forget its handle without closing anything.
    ///
    /// Returns `false` and keeps everything as is when `id` is not the active notification any more, e.g. because
    /// it was already replaced by a new one before the dismissal got here.
    fn forget_notification(&mut self, id: u32) -> bool;

    /// The host destroyed the source; forget it together with the notification shown through it.
    fn invalidate_source(&mut self);

    fn is_active(&self) -> bool;
}

/// Channel through which a presenter tells the session what the display host did to its objects.
#[derive(Debug, Clone)]
pub struct PresenterFeedback(UnboundedSender<TrackerEvent>);

pub fn create_feedback_pair() -> (PresenterFeedback, UnboundedReceiver<TrackerEvent>) {
    let (sender, recv) = tokio::sync::mpsc::unbounded_channel();
    (PresenterFeedback(sender), recv)
}

impl PresenterFeedback {
    pub fn source_destroyed(&self) {
        crate::print_result_err!("while reporting a destroyed notification source", self.0.send(TrackerEvent::SourceDestroyed));
    }

    pub fn notification_dismissed(&self, id: u32) {
        crate::print_result_err!("while reporting a dismissed notification", self.0.send(TrackerEvent::NotificationDismissed(id)));
    }
}
