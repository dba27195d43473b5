use std::collections::HashMap;

use crate::*;

/// One element of the queue as the service sends it: a sequence whose first mapping describes the task.
pub type RawQueueEntry = Vec<HashMap<String, String>>;

/// The remote queue at one instant, in the order the service reported it.
///
/// The service wraps every record in an extra one-element sequence (`aaa{ss}` on the wire). We keep that shape
/// as-is and unwrap it explicitly when decoding, rather than flattening it on receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    entries: Vec<RawQueueEntry>,
}

impl QueueSnapshot {
    pub fn new(entries: Vec<RawQueueEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode the task at the head of the queue, which is the one currently being worked on.
    ///
    /// Returns `Ok(None)` for an empty queue.
    pub fn head(&self) -> Result<Option<TaskRecord>> {
        match self.entries.first() {
            Some(entry) => decode_entry(0, entry).map(Some),
            None => Ok(None),
        }
    }

    /// Decode every entry of the queue, head first.
    pub fn records(&self) -> impl Iterator<Item = Result<TaskRecord>> + '_ {
        self.entries.iter().enumerate().map(|(index, entry)| decode_entry(index, entry))
    }
}

impl From<Vec<RawQueueEntry>> for QueueSnapshot {
    fn from(entries: Vec<RawQueueEntry>) -> Self {
        Self::new(entries)
    }
}

fn decode_entry(index: usize, entry: &RawQueueEntry) -> Result<TaskRecord> {
    match entry.first() {
        Some(mapping) => Ok(TaskRecord::decode(mapping)),
        None => Err(Error::DecodeAnomaly { index, reason: "entry does not contain a task mapping".to_string() }),
    }
}
