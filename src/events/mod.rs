//! Event dispatch for connection lifecycle and data notifications.
//!
//! # Responsibilities
//! - Expose five notification points: Connect, Send, Receive, Close, Error
//! - Hold an explicit, synchronized subscriber list per notification point
//! - Isolate subscriber panics so one bad handler never stops a connection
//!
//! # Design Decisions
//! - Copy-on-notify dispatch: firing snapshots the handler list, so
//!   subscribe/unsubscribe never races with an in-flight emission
//! - Invocation order among subscribers is unspecified
//! - Events are ephemeral; handlers get references and nothing is retained

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::HubError;
use crate::net::connection::{ConnectionId, ConnectionInfo};

/// Monotonic source of subscriber ids. Relaxed ordering is sufficient since
/// only uniqueness matters.
static SUBSCRIBER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one subscription, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(SUBSCRIBER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// The five notification points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Connect,
    Send,
    Receive,
    Close,
    Error,
}

/// Handler for Connect/Close notifications.
pub type LifecycleHandler = dyn Fn(&ConnectionInfo) + Send + Sync;
/// Handler for Send/Receive notifications (payload attached).
pub type PayloadHandler = dyn Fn(&ConnectionInfo, &[u8]) + Send + Sync;
/// Handler for Error notifications.
pub type ErrorHandler = dyn Fn(&ConnectionInfo, &HubError) + Send + Sync;

struct HandlerSet<H: ?Sized> {
    handlers: RwLock<Vec<(SubscriberId, Arc<H>)>>,
}

impl<H: ?Sized> HandlerSet<H> {
    fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    fn subscribe(&self, handler: Arc<H>) -> SubscriberId {
        let id = SubscriberId::next();
        self.handlers
            .write()
            .expect("subscriber list poisoned")
            .push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut handlers = self.handlers.write().expect("subscriber list poisoned");
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }

    fn snapshot(&self) -> Vec<Arc<H>> {
        self.handlers
            .read()
            .expect("subscriber list poisoned")
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }
}

/// Delivers connection notifications to registered subscribers.
pub struct EventBus {
    connect: HandlerSet<LifecycleHandler>,
    send: HandlerSet<PayloadHandler>,
    receive: HandlerSet<PayloadHandler>,
    close: HandlerSet<LifecycleHandler>,
    error: HandlerSet<ErrorHandler>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            connect: HandlerSet::new(),
            send: HandlerSet::new(),
            receive: HandlerSet::new(),
            close: HandlerSet::new(),
            error: HandlerSet::new(),
        }
    }

    /// Notified once per accepted or attached connection.
    pub fn subscribe_connect(
        &self,
        handler: impl Fn(&ConnectionInfo) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.connect.subscribe(Arc::new(handler))
    }

    /// Notified when a queued payload has been written to the transport.
    pub fn subscribe_send(
        &self,
        handler: impl Fn(&ConnectionInfo, &[u8]) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.send.subscribe(Arc::new(handler))
    }

    /// Notified once per inbound frame (or chunk, for raw streams).
    pub fn subscribe_receive(
        &self,
        handler: impl Fn(&ConnectionInfo, &[u8]) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.receive.subscribe(Arc::new(handler))
    }

    /// Notified exactly once when a connection reaches Closed.
    pub fn subscribe_close(
        &self,
        handler: impl Fn(&ConnectionInfo) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.close.subscribe(Arc::new(handler))
    }

    /// Notified on connection-scoped failures (transport errors, rejected
    /// broadcast deliveries).
    pub fn subscribe_error(
        &self,
        handler: impl Fn(&ConnectionInfo, &HubError) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.error.subscribe(Arc::new(handler))
    }

    /// Remove a subscription. Returns false if the id was not registered for
    /// this event kind.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriberId) -> bool {
        match kind {
            EventKind::Connect => self.connect.unsubscribe(id),
            EventKind::Send => self.send.unsubscribe(id),
            EventKind::Receive => self.receive.unsubscribe(id),
            EventKind::Close => self.close.unsubscribe(id),
            EventKind::Error => self.error.unsubscribe(id),
        }
    }

    pub(crate) fn emit_connect(&self, info: &ConnectionInfo) {
        for handler in self.connect.snapshot() {
            dispatch(EventKind::Connect, info.id, || handler(info));
        }
    }

    pub(crate) fn emit_send(&self, info: &ConnectionInfo, payload: &[u8]) {
        for handler in self.send.snapshot() {
            dispatch(EventKind::Send, info.id, || handler(info, payload));
        }
    }

    pub(crate) fn emit_receive(&self, info: &ConnectionInfo, payload: &[u8]) {
        for handler in self.receive.snapshot() {
            dispatch(EventKind::Receive, info.id, || handler(info, payload));
        }
    }

    pub(crate) fn emit_close(&self, info: &ConnectionInfo) {
        for handler in self.close.snapshot() {
            dispatch(EventKind::Close, info.id, || handler(info));
        }
    }

    pub(crate) fn emit_error(&self, info: &ConnectionInfo, error: &HubError) {
        for handler in self.error.snapshot() {
            dispatch(EventKind::Error, info.id, || handler(info, error));
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one handler, swallowing and logging a panic. The connection's own
/// loops never observe subscriber failures.
fn dispatch(kind: EventKind, id: ConnectionId, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        tracing::warn!(
            connection_id = %id,
            event = ?kind,
            "Subscriber panicked; handler isolated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::framing::FramingMode;
    use std::sync::atomic::AtomicUsize;

    fn info() -> ConnectionInfo {
        ConnectionInfo {
            id: ConnectionId::new(),
            peer_addr: "127.0.0.1:4000".parse().unwrap(),
            framing: FramingMode::Stream,
        }
    }

    #[test]
    fn every_subscriber_is_notified() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            bus.subscribe_connect(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit_connect(&info());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        let id = bus.subscribe_receive(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit_receive(&info(), b"one");
        assert!(bus.unsubscribe(EventKind::Receive, id));
        bus.emit_receive(&info(), b"two");

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!bus.unsubscribe(EventKind::Receive, id));
    }

    #[test]
    fn unsubscribe_checks_the_event_kind() {
        let bus = EventBus::new();
        let id = bus.subscribe_close(|_| {});
        assert!(!bus.unsubscribe(EventKind::Connect, id));
        assert!(bus.unsubscribe(EventKind::Close, id));
    }

    #[test]
    fn panicking_subscriber_is_isolated() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe_connect(|_| panic!("handler bug"));
        let counter = Arc::clone(&count);
        bus.subscribe_connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit_connect(&info());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn payload_reaches_receive_subscribers() {
        let bus = EventBus::new();
        let seen = Arc::new(RwLock::new(Vec::new()));

        let sink = Arc::clone(&seen);
        bus.subscribe_receive(move |_, payload| {
            sink.write().unwrap().push(payload.to_vec());
        });

        bus.emit_receive(&info(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(*seen.read().unwrap(), vec![vec![0xde, 0xad, 0xbe, 0xef]]);
    }
}
