//! Transport abstraction under the dispatcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::event::ChangeEvent;
use crate::RealtimeError;

/// Callback the transport invokes for every inbound event on a channel.
pub type EventSink = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open one connection for `channel`, delivering events into `sink`
    /// until the returned handle is closed or dropped.
    async fn open(&self, channel: &str, sink: EventSink)
        -> Result<TransportConnection, RealtimeError>;
}

/// Handle to one live transport connection. Closing is idempotent and
/// also happens on drop.
pub struct TransportConnection {
    closer: Option<Box<dyn FnOnce() + Send>>,
}

impl TransportConnection {
    pub fn new(closer: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            closer: Some(closer),
        }
    }

    pub fn close(mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl Drop for TransportConnection {
    fn drop(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

/// In-process transport used by the test suites.
///
/// Counts opened connections and lets the caller inject events with
/// [`MemoryTransport::emit`].
#[derive(Default, Clone)]
pub struct MemoryTransport {
    channels: Arc<Mutex<HashMap<String, Vec<(u64, EventSink)>>>>,
    next_id: Arc<AtomicU64>,
    total_opened: Arc<AtomicUsize>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connections currently open across all channels.
    pub fn open_connections(&self) -> usize {
        self.channels
            .lock()
            .expect("memory transport lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Number of connections ever opened.
    pub fn total_opened(&self) -> usize {
        self.total_opened.load(Ordering::SeqCst)
    }

    /// Deliver an event to every connection on `channel`.
    pub fn emit(&self, channel: &str, event: ChangeEvent) {
        let sinks: Vec<EventSink> = {
            let guard = self
                .channels
                .lock()
                .expect("memory transport lock poisoned");
            guard
                .get(channel)
                .map(|conns| conns.iter().map(|(_, sink)| Arc::clone(sink)).collect())
                .unwrap_or_default()
        };
        for sink in sinks {
            sink(event.clone());
        }
    }
}

#[async_trait]
impl RealtimeTransport for MemoryTransport {
    async fn open(
        &self,
        channel: &str,
        sink: EventSink,
    ) -> Result<TransportConnection, RealtimeError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut guard = self
                .channels
                .lock()
                .expect("memory transport lock poisoned");
            guard.entry(channel.to_string()).or_default().push((id, sink));
        }
        self.total_opened.fetch_add(1, Ordering::SeqCst);

        let channels = Arc::clone(&self.channels);
        let channel = channel.to_string();
        Ok(TransportConnection::new(Box::new(move || {
            if let Ok(mut guard) = channels.lock() {
                if let Some(conns) = guard.get_mut(&channel) {
                    conns.retain(|(conn_id, _)| *conn_id != id);
                    if conns.is_empty() {
                        guard.remove(&channel);
                    }
                }
            }
        })))
    }
}
