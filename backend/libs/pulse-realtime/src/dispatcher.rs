//! Fan-out dispatcher
//!
//! One transport connection per watched key, any number of listeners.
//! Listeners are invoked synchronously, in registration order, exactly
//! once per inbound event; a panicking listener is isolated so the rest
//! of the fan-out still runs.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::event::{ChangeEvent, WatchKey};
use crate::transport::{EventSink, RealtimeTransport, TransportConnection};
use crate::RealtimeError;

pub type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    listener: Listener,
}

#[derive(Default)]
struct KeyState {
    listeners: Vec<ListenerEntry>,
    connection: Option<TransportConnection>,
    /// Set while the first subscriber's transport open is in flight, so a
    /// concurrent subscribe does not open a second connection for the key.
    connecting: bool,
}

type KeyTable = Arc<Mutex<HashMap<WatchKey, KeyState>>>;

pub struct FanoutDispatcher {
    transport: Arc<dyn RealtimeTransport>,
    keys: KeyTable,
    next_listener_id: AtomicU64,
}

impl FanoutDispatcher {
    pub fn new(transport: Arc<dyn RealtimeTransport>) -> Self {
        Self {
            transport,
            keys: Arc::new(Mutex::new(HashMap::new())),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Register `listener` for `key`.
    ///
    /// The first listener for a key opens the transport connection; later
    /// listeners share it. The returned [`Subscription`] removes the
    /// listener on `unsubscribe()` or drop, closing the connection when it
    /// was the last one.
    pub async fn subscribe(
        &self,
        key: WatchKey,
        listener: Listener,
    ) -> Result<Subscription, RealtimeError> {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);

        let must_connect = {
            let mut keys = lock(&self.keys);
            let state = keys.entry(key.clone()).or_default();
            state.listeners.push(ListenerEntry {
                id,
                listener,
            });
            if state.connection.is_none() && !state.connecting {
                state.connecting = true;
                true
            } else {
                false
            }
        };

        if must_connect {
            let sink = self.sink_for(&key);
            match self.transport.open(&key.channel(), sink).await {
                Ok(connection) => {
                    let leftover = {
                        let mut keys = lock(&self.keys);
                        match keys.get_mut(&key) {
                            Some(state) => {
                                state.connecting = false;
                                if state.listeners.is_empty() {
                                    // everyone left while we were connecting
                                    keys.remove(&key);
                                    Some(connection)
                                } else {
                                    state.connection = Some(connection);
                                    None
                                }
                            }
                            None => Some(connection),
                        }
                    };
                    if let Some(connection) = leftover {
                        connection.close();
                    }
                }
                Err(err) => {
                    let mut keys = lock(&self.keys);
                    if let Some(state) = keys.get_mut(&key) {
                        state.connecting = false;
                        state.listeners.retain(|entry| entry.id != id);
                        if state.listeners.is_empty() {
                            keys.remove(&key);
                        }
                    }
                    return Err(err);
                }
            }
        }

        Ok(Subscription {
            keys: Arc::clone(&self.keys),
            key,
            id,
            active: AtomicBool::new(true),
        })
    }

    /// Foreground/visibility hint: reopen the transport connection for
    /// every key that still has listeners. Best effort only — events
    /// arriving during the reconnect gap are lost, and a key whose reopen
    /// fails keeps its listeners and is retried on the next refresh.
    pub async fn refresh(&self) {
        let active: Vec<WatchKey> = {
            let keys = lock(&self.keys);
            keys.iter()
                .filter(|(_, state)| !state.listeners.is_empty())
                .map(|(key, _)| key.clone())
                .collect()
        };

        for key in active {
            let old = {
                let mut keys = lock(&self.keys);
                keys.get_mut(&key).and_then(|state| state.connection.take())
            };
            if let Some(connection) = old {
                connection.close();
            }

            let sink = self.sink_for(&key);
            match self.transport.open(&key.channel(), sink).await {
                Ok(connection) => {
                    let leftover = {
                        let mut keys = lock(&self.keys);
                        match keys.get_mut(&key) {
                            Some(state) if !state.listeners.is_empty() => {
                                state.connection = Some(connection);
                                None
                            }
                            _ => Some(connection),
                        }
                    };
                    if let Some(connection) = leftover {
                        connection.close();
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        channel = %key.channel(),
                        error = %err,
                        "failed to reestablish realtime connection"
                    );
                }
            }
        }
    }

    /// Live transport connections (equals the number of watched keys with
    /// at least one listener, once connects have settled).
    pub fn connection_count(&self) -> usize {
        lock(&self.keys)
            .values()
            .filter(|state| state.connection.is_some())
            .count()
    }

    fn sink_for(&self, key: &WatchKey) -> EventSink {
        let keys = Arc::clone(&self.keys);
        let key = key.clone();
        Arc::new(move |event: ChangeEvent| {
            // snapshot under the lock, invoke outside it, so a listener may
            // unsubscribe (itself or others) from within the callback
            let listeners: Vec<Listener> = {
                let keys = lock(&keys);
                keys.get(&key)
                    .map(|state| {
                        state
                            .listeners
                            .iter()
                            .map(|entry| Arc::clone(&entry.listener))
                            .collect()
                    })
                    .unwrap_or_default()
            };
            for listener in listeners {
                if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                    tracing::warn!(
                        channel = %key.channel(),
                        "realtime listener panicked; continuing fan-out"
                    );
                }
            }
        })
    }
}

fn lock(keys: &KeyTable) -> std::sync::MutexGuard<'_, HashMap<WatchKey, KeyState>> {
    keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registration handle. Unsubscribing twice is a no-op; dropping the
/// handle unsubscribes as well.
pub struct Subscription {
    keys: KeyTable,
    key: WatchKey,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let closed = {
            let mut keys = lock(&self.keys);
            match keys.get_mut(&self.key) {
                Some(state) => {
                    state.listeners.retain(|entry| entry.id != self.id);
                    if state.listeners.is_empty() && !state.connecting {
                        let connection = state.connection.take();
                        keys.remove(&self.key);
                        connection
                    } else {
                        None
                    }
                }
                None => None,
            }
        };
        if let Some(connection) = closed {
            connection.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn post_event(marker: &str) -> ChangeEvent {
        ChangeEvent {
            events: vec![format!("collections.posts.documents.p1{}", marker)],
            payload: json!({"id": "p1"}),
        }
    }

    fn counting_listener(counter: Arc<AtomicUsize>) -> Listener {
        Arc::new(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn two_listeners_share_one_connection() {
        let transport = MemoryTransport::new();
        let dispatcher = FanoutDispatcher::new(Arc::new(transport.clone()));
        let key = WatchKey::collection("posts");

        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let sub_a = dispatcher
            .subscribe(key.clone(), counting_listener(Arc::clone(&first)))
            .await
            .unwrap();
        let sub_b = dispatcher
            .subscribe(key.clone(), counting_listener(Arc::clone(&second)))
            .await
            .unwrap();

        assert_eq!(transport.open_connections(), 1);
        assert_eq!(dispatcher.connection_count(), 1);

        transport.emit(&key.channel(), post_event(".create"));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        sub_a.unsubscribe();
        assert_eq!(transport.open_connections(), 1);
        sub_b.unsubscribe();
        assert_eq!(transport.open_connections(), 0);
        assert_eq!(dispatcher.connection_count(), 0);
    }

    #[tokio::test]
    async fn delivery_follows_registration_order() {
        let transport = MemoryTransport::new();
        let dispatcher = FanoutDispatcher::new(Arc::new(transport.clone()));
        let key = WatchKey::collection("posts");

        let order = Arc::new(Mutex::new(Vec::new()));
        let order_a = Arc::clone(&order);
        let order_b = Arc::clone(&order);
        let _sub_a = dispatcher
            .subscribe(
                key.clone(),
                Arc::new(move |_| order_a.lock().unwrap().push("a")),
            )
            .await
            .unwrap();
        let _sub_b = dispatcher
            .subscribe(
                key.clone(),
                Arc::new(move |_| order_b.lock().unwrap().push("b")),
            )
            .await
            .unwrap();

        transport.emit(&key.channel(), post_event(".update"));
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn distinct_keys_get_distinct_connections() {
        let transport = MemoryTransport::new();
        let dispatcher = FanoutDispatcher::new(Arc::new(transport.clone()));

        let hits = Arc::new(AtomicUsize::new(0));
        let _posts = dispatcher
            .subscribe(
                WatchKey::collection("posts"),
                counting_listener(Arc::clone(&hits)),
            )
            .await
            .unwrap();
        let _doc = dispatcher
            .subscribe(
                WatchKey::document("posts", "p1"),
                counting_listener(Arc::clone(&hits)),
            )
            .await
            .unwrap();

        assert_eq!(transport.open_connections(), 2);

        // an event on one channel does not leak into the other
        transport.emit(
            &WatchKey::collection("posts").channel(),
            post_event(".create"),
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let transport = MemoryTransport::new();
        let dispatcher = FanoutDispatcher::new(Arc::new(transport.clone()));
        let key = WatchKey::collection("posts");

        let hits = Arc::new(AtomicUsize::new(0));
        let sub_a = dispatcher
            .subscribe(key.clone(), counting_listener(Arc::clone(&hits)))
            .await
            .unwrap();
        let sub_b = dispatcher
            .subscribe(key.clone(), counting_listener(Arc::clone(&hits)))
            .await
            .unwrap();

        sub_a.unsubscribe();
        sub_a.unsubscribe();
        sub_a.unsubscribe();

        // the double unsubscribe must not have decremented past sub_a
        assert_eq!(transport.open_connections(), 1);
        transport.emit(&key.channel(), post_event(".create"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        sub_b.unsubscribe();
        assert_eq!(transport.open_connections(), 0);
    }

    #[tokio::test]
    async fn dropping_the_handle_unsubscribes() {
        let transport = MemoryTransport::new();
        let dispatcher = FanoutDispatcher::new(Arc::new(transport.clone()));
        let key = WatchKey::collection("posts");

        let hits = Arc::new(AtomicUsize::new(0));
        {
            let _sub = dispatcher
                .subscribe(key.clone(), counting_listener(Arc::clone(&hits)))
                .await
                .unwrap();
            assert_eq!(transport.open_connections(), 1);
        }
        assert_eq!(transport.open_connections(), 0);
    }

    #[tokio::test]
    async fn panicking_listener_does_not_stop_fanout() {
        let transport = MemoryTransport::new();
        let dispatcher = FanoutDispatcher::new(Arc::new(transport.clone()));
        let key = WatchKey::collection("posts");

        let _bad = dispatcher
            .subscribe(key.clone(), Arc::new(|_| panic!("listener blew up")))
            .await
            .unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let _good = dispatcher
            .subscribe(key.clone(), counting_listener(Arc::clone(&hits)))
            .await
            .unwrap();

        transport.emit(&key.channel(), post_event(".create"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_reopens_one_connection_per_active_key() {
        let transport = MemoryTransport::new();
        let dispatcher = FanoutDispatcher::new(Arc::new(transport.clone()));

        let hits = Arc::new(AtomicUsize::new(0));
        let _posts = dispatcher
            .subscribe(
                WatchKey::collection("posts"),
                counting_listener(Arc::clone(&hits)),
            )
            .await
            .unwrap();
        let _threads = dispatcher
            .subscribe(
                WatchKey::collection("threads"),
                counting_listener(Arc::clone(&hits)),
            )
            .await
            .unwrap();

        assert_eq!(transport.total_opened(), 2);
        dispatcher.refresh().await;
        assert_eq!(transport.total_opened(), 4);
        assert_eq!(transport.open_connections(), 2);

        // listeners survive the reconnect
        transport.emit(
            &WatchKey::collection("posts").channel(),
            post_event(".update"),
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
