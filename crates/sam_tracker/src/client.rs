use std::time::Duration;

use crate::*;

/// Source of queue snapshots.
#[allow(async_fn_in_trait)]
pub trait QueueClient {
    /// Fetch the queue as it is right now. A legitimately empty queue is an empty snapshot, not an error.
    async fn fetch_current(&self) -> Result<QueueSnapshot>;
}

/// [`QueueClient`] that asks the queue service over DBus.
#[derive(Clone)]
pub struct DbusQueueClient {
    service: dbus::SamServiceProxy<'static>,
    timeout: Duration,
}

impl DbusQueueClient {
    pub fn new(service: dbus::SamServiceProxy<'static>, timeout: Duration) -> Self {
        Self { service, timeout }
    }
}

impl QueueClient for DbusQueueClient {
    async fn fetch_current(&self) -> Result<QueueSnapshot> {
        match tokio::time::timeout(self.timeout, self.service.get_queue_actions_dict()).await {
            Ok(Ok(entries)) => Ok(QueueSnapshot::new(entries)),
            Ok(Err(err)) => Err(Error::RemoteUnavailable(err.to_string())),
            Err(_) => Err(Error::RemoteUnavailable(format!("no reply to get_queue_actions_dict within {:?}", self.timeout))),
        }
    }
}
