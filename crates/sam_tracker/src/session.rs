use std::time::Duration;

use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use zbus::export::ordered_stream::{self, OrderedStream, OrderedStreamExt};

use crate::*;

/// Which message bus the queue service lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    System,
    Session,
}

impl BusKind {
    pub async fn connect(self) -> zbus::Result<zbus::Connection> {
        match self {
            BusKind::System => zbus::Connection::system().await,
            BusKind::Session => zbus::Connection::session().await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub bus: BusKind,
    pub service: String,
    pub object_path: String,
    /// Upper bound for a single queue fetch.
    pub fetch_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            bus: BusKind::System,
            service: dbus::SAM_SERVICE_BUS.to_string(),
            object_path: dbus::SAM_SERVICE_OBJECT.to_string(),
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    /// Connect to the configured bus and build a proxy for the queue service.
    pub async fn service_proxy(&self) -> Result<dbus::SamServiceProxy<'static>> {
        let con = self.bus.connect().await?;
        let proxy = dbus::SamServiceProxy::builder(&con)
            .destination(self.service.clone())?
            .path(self.object_path.clone())?
            .build()
            .await?;
        Ok(proxy)
    }
}

/// The signal streams of the queue service we react to.
pub struct Subscription {
    queue_changed: dbus::queue_changedStream<'static>,
    progress_changed: dbus::progress_changedStream<'static>,
}

impl Subscription {
    pub async fn subscribe(service: &dbus::SamServiceProxy<'static>) -> zbus::Result<Self> {
        Ok(Subscription {
            queue_changed: service.receive_queue_changed().await?,
            progress_changed: service.receive_progress_changed().await?,
        })
    }
}

struct RunningSession {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Lifecycle of one tracking session: connection, subscription and the task driving the [`SessionTracker`].
///
/// The session task is spawned with [`tokio::task::spawn_local`], so `start` has to be called from within a
/// [`tokio::task::LocalSet`].
pub struct Session {
    config: SessionConfig,
    running: Option<RunningSession>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Session { config, running: None }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Connect to the queue service, subscribe to its signals and start tracking.
    ///
    /// `make_presenter` receives the feedback channel the presenter reports host-side destruction through.
    /// Starting an already running session does nothing.
    pub async fn start<P, F>(&mut self, make_presenter: F) -> Result<()>
    where
        P: Presenter + 'static,
        F: FnOnce(PresenterFeedback) -> P,
    {
        if self.running.is_some() {
            log::debug!("Session already running");
            return Ok(());
        }

        let service = self.config.service_proxy().await?;
        let subscription = Subscription::subscribe(&service).await?;
        log::info!("Subscribed to {} at {}", self.config.service, self.config.object_path);

        let (feedback, feedback_recv) = create_feedback_pair();
        let client = DbusQueueClient::new(service, self.config.fetch_timeout);
        let mut tracker = SessionTracker::new(client, make_presenter(feedback));

        let cancel = CancellationToken::new();
        let task = tokio::task::spawn_local({
            let cancel = cancel.clone();
            async move {
                serve_tracker_forever_on(&mut tracker, subscription, feedback_recv, cancel).await;
                tracker.teardown().await;
            }
        });

        self.running = Some(RunningSession { cancel, task });
        Ok(())
    }

    /// Stop tracking, removing the notification and clearing all state. Safe to call when not running.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(err) = running.task.await {
            log::error!("Queue session task failed: {}", err);
        }
        log::info!("Queue session stopped");
    }
}

/// Feed the signals of `subscription` and the presenter's feedback into `tracker`, one event at a time, until
/// `cancel` fires or the bus goes away.
///
/// A fetch triggered by one event is awaited before the next event is looked at, so events are handled strictly
/// in delivery order.
pub async fn serve_tracker_forever_on<C: QueueClient, P: Presenter>(
    tracker: &mut SessionTracker<C, P>,
    subscription: Subscription,
    feedback: UnboundedReceiver<TrackerEvent>,
    cancel: CancellationToken,
) {
    let bus_events = ordered_stream::join(
        OrderedStreamExt::map(subscription.queue_changed, |_| Some(TrackerEvent::QueueChanged)),
        OrderedStreamExt::map(subscription.progress_changed, |sig| match sig.args() {
            Ok(args) => Some(TrackerEvent::progress(args.progress)),
            Err(err) => {
                log::warn!("Ignoring malformed progress_changed signal: {}", err);
                None
            }
        }),
    );
    drive_tracker(tracker, bus_events, feedback, cancel).await;
}

/// Event loop behind [`serve_tracker_forever_on`]. `None` items in `bus_events` are signals that were dropped.
///
/// Ends once `bus_events` is exhausted, even though `feedback` never closes while the presenter is alive.
async fn drive_tracker<C, P, S>(
    tracker: &mut SessionTracker<C, P>,
    mut bus_events: S,
    mut feedback: UnboundedReceiver<TrackerEvent>,
    cancel: CancellationToken,
) where
    C: QueueClient,
    P: Presenter,
    S: OrderedStream<Data = Option<TrackerEvent>> + Unpin,
{
    // the queue may already be busy when we start listening
    tracker.handle(TrackerEvent::QueueChanged).await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = bus_events.next() => match event {
                Some(Some(event)) => tracker.handle(event).await,
                Some(None) => {}
                None => {
                    log::warn!("Queue service signal streams ended");
                    break;
                }
            },
            Some(event) = feedback.recv() => tracker.handle(event).await,
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::VecDeque,
        pin::Pin,
        task::{Context, Poll},
    };

    use maplit::hashmap;
    use pretty_assertions::assert_eq;
    use zbus::export::ordered_stream::PollResult;

    use super::*;
    use crate::tracker::test::{FakeQueue, RecordingPresenter};

    /// Signal stream that yields a fixed list of events and then ends.
    struct ScriptedSignals {
        events: VecDeque<Option<TrackerEvent>>,
        serial: u64,
    }

    impl ScriptedSignals {
        fn new(events: Vec<Option<TrackerEvent>>) -> Self {
            ScriptedSignals { events: events.into(), serial: 0 }
        }
    }

    impl OrderedStream for ScriptedSignals {
        type Ordering = u64;
        type Data = Option<TrackerEvent>;

        fn poll_next_before(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _before: Option<&u64>,
        ) -> Poll<PollResult<u64, Option<TrackerEvent>>> {
            let this = &mut *self;
            match this.events.pop_front() {
                Some(data) => {
                    this.serial += 1;
                    Poll::Ready(PollResult::Item { data, ordering: this.serial })
                }
                None => Poll::Ready(PollResult::Terminated),
            }
        }
    }

    #[tokio::test]
    async fn test_loop_ends_when_signal_streams_end() {
        let queue = FakeQueue::default();
        queue.set(vec![vec![hashmap! {
            "package_id".to_string() => "pkg1".to_string(),
            "app_name".to_string() => "Foo".to_string(),
            "task".to_string() => "install".to_string(),
        }]]);
        let mut tracker = SessionTracker::new(queue, RecordingPresenter::default());
        // the presenter keeps its sender for as long as the session runs
        let (_feedback, feedback_recv) = create_feedback_pair();
        let signals = ScriptedSignals::new(vec![None, Some(TrackerEvent::ProgressChanged(20))]);

        let finished = tokio::time::timeout(
            Duration::from_secs(5),
            drive_tracker(&mut tracker, signals, feedback_recv, CancellationToken::new()),
        )
        .await;

        assert!(finished.is_ok(), "event loop kept running after the signal streams ended");
        assert_eq!(Some("Progress: 20%"), tracker.presenter().active.as_ref().map(|n| n.body.as_str()));
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mut session = Session::new(SessionConfig::default());
        session.stop().await;
        session.stop().await;
        assert!(!session.is_running());
    }

    #[test]
    fn test_default_config_targets_sam_service() {
        let config = SessionConfig::default();
        assert_eq!(BusKind::System, config.bus);
        assert_eq!("io.stillhq.SamService", config.service);
        assert_eq!("/io/stillhq/SamService", config.object_path);
    }
}
