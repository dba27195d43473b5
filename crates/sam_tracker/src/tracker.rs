use crate::*;


/// Everything that can make the tracker reconsider what it shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// Membership of the remote queue changed.
    QueueChanged,
    /// The task at the head of the queue advanced to the given percentage.
    ProgressChanged(u32),
    /// The display host destroyed our notification source.
    SourceDestroyed,
    /// The display host closed the notification with this id without us asking for it.
    NotificationDismissed(u32),
}

impl TrackerEvent {
    pub fn progress(percent: i32) -> Self {
        TrackerEvent::ProgressChanged(percent.clamp(0, 100) as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Tracking,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Package id of the task currently shown.
    pub current_task_id: Option<String>,
    /// Number of distinct tasks seen since tracking began. This is not an index into the remote queue.
    pub queue_position: usize,
    /// Size of the most recent snapshot.
    pub queue_length: usize,
    /// Last content handed to the presenter, kept so it can be shown again after the host closed it.
    pub shown: Option<Notification>,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        if self.current_task_id.is_some() {
            Phase::Tracking
        } else {
            Phase::Idle
        }
    }
}

/// The queue/session state machine.
///
/// Consumes [`TrackerEvent`]s one at a time, fetching a fresh snapshot through `C` on every queue change and keeping
/// the single notification of `P` in line with it. Failures are logged and absorbed, they never reach the caller.
pub struct SessionTracker<C, P> {
    client: C,
    presenter: P,
    state: SessionState,
}

impl<C: QueueClient, P: Presenter> SessionTracker<C, P> {
    pub fn new(client: C, presenter: P) -> Self {
        Self { client, presenter, state: SessionState::default() }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub async fn handle(&mut self, event: TrackerEvent) {
        log::debug!("Handling {:?} in phase {:?}", event, self.state.phase());
        match event {
            TrackerEvent::QueueChanged => self.on_queue_changed().await,
            TrackerEvent::ProgressChanged(percent) => self.on_progress_changed(percent).await,
            TrackerEvent::SourceDestroyed => {
                log::info!("Notification source was destroyed by the host");
                self.presenter.invalidate_source();
            }
            TrackerEvent::NotificationDismissed(id) => self.on_dismissed(id).await,
        }
    }

    /// Remove the notification and forget everything about the session.
    pub async fn teardown(&mut self) {
        self.reset().await;
    }

    async fn on_queue_changed(&mut self) {
        let record = match self.fetch_head().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                log::debug!("Queue is empty");
                self.reset().await;
                return;
            }
            Err(err) => {
                log::warn!("Treating queue as empty: {}", err);
                self.reset().await;
                return;
            }
        };

        if self.state.current_task_id.as_deref() != Some(record.package_id.as_str()) {
            self.state.queue_position += 1;
            log::info!("Now tracking {} ({}/{})", record.package_id, self.state.queue_position, self.state.queue_length);
            self.state.current_task_id = Some(record.package_id.clone());
        }

        let notification = Notification::for_task(&record, self.state.queue_position, self.state.queue_length);
        self.present(notification).await;
    }

    async fn on_progress_changed(&mut self, percent: u32) {
        if self.state.phase() == Phase::Idle {
            log::debug!("Ignoring progress of {}% while idle", percent);
            return;
        }
        let body = Notification::progress_body(percent);

        if self.presenter.is_active() {
            if let Some(shown) = &mut self.state.shown {
                shown.body = body.clone();
            }
            if let Err(err) = self.presenter.update_body(&body).await {
                log::warn!("Failed to update notification progress: {}", err);
                self.presenter.invalidate_source();
            }
        } else if let Some(shown) = self.state.shown.clone() {
            // the notification got lost along with its source, bring it back with the new progress
            self.present(Notification { body, ..shown }).await;
        }
    }

    async fn on_dismissed(&mut self, id: u32) {
        if !self.presenter.forget_notification(id) {
            log::debug!("Ignoring dismissal of notification {}, it was already replaced", id);
            return;
        }
        match self.state.shown.clone() {
            Some(shown) if self.state.phase() == Phase::Tracking => {
                log::debug!("Notification was closed while a task is running, showing it again");
                self.present(shown).await;
            }
            _ => {}
        }
    }

    async fn fetch_head(&mut self) -> Result<Option<TaskRecord>> {
        let snapshot = self.client.fetch_current().await?;
        self.state.queue_length = snapshot.len();
        snapshot.head()
    }

    async fn present(&mut self, notification: Notification) {
        if let Err(err) = self.try_present(&notification).await {
            log::warn!("Failed to show notification: {}", err);
            self.presenter.invalidate_source();
        }
        self.state.shown = Some(notification);
    }

    async fn try_present(&mut self, notification: &Notification) -> Result<()> {
        self.presenter.ensure_source().await?;
        self.presenter.create_or_update(notification).await
    }

    async fn reset(&mut self) {
        self.state = SessionState::default();
        if self.presenter.is_active() {
            if let Err(err) = self.presenter.destroy().await {
                log::warn!("Failed to remove notification: {}", err);
                self.presenter.invalidate_source();
            }
        }
    }
}
