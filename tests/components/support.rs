//! Shared fakes for component tests

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use kodegen_native_push::{EventPayload, Handler, PushResult, PushTransport};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Collects formatted log output from a scoped subscriber
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with a subscriber that writes into this capture
    pub fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Transport returning a fixed result, optionally held until released
#[derive(Clone)]
pub struct MockTransport {
    pub calls: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<Vec<String>>>>,
    result: PushResult<String>,
    gate: Option<Arc<Notify>>,
}

impl MockTransport {
    pub fn returning(result: PushResult<String>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
            result,
            gate: None,
        }
    }

    pub fn ok(token: &str) -> Self {
        Self::returning(Ok(token.to_string()))
    }

    /// Hold every call until `release` is notified
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_sender_ids(&self) -> Option<Vec<String>> {
        self.seen.lock().last().cloned()
    }
}

impl PushTransport for MockTransport {
    fn register<'a>(
        &'a self,
        sender_ids: &'a [String],
    ) -> Pin<Box<dyn Future<Output = PushResult<String>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(sender_ids.to_vec());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.result.clone()
        })
    }
}

pub struct PanickingTransport;

impl PushTransport for PanickingTransport {
    fn register<'a>(
        &'a self,
        _sender_ids: &'a [String],
    ) -> Pin<Box<dyn Future<Output = PushResult<String>> + Send + 'a>> {
        Box::pin(async move { panic!("transport exploded") })
    }
}

/// Records every payload its handler receives
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<EventPayload>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(&self) -> Handler {
        let events = self.events.clone();
        Arc::new(move |payload: &EventPayload| events.lock().push(payload.clone()))
    }

    pub fn events(&self) -> Vec<EventPayload> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }
}

/// Counts acknowledgments for inbound envelopes
#[derive(Clone, Default)]
pub struct AckCounter {
    count: Arc<AtomicUsize>,
}

impl AckCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ack(&self) -> impl FnOnce() + Send + 'static {
        let count = self.count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}
