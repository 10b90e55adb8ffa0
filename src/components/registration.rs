// Push registration coordination
// Sender id collection, single-flight registration attempts and outcome signaling

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::Instrument;

use super::callbacks::{CallbackDispatcher, EventChannel, EventPayload};
use super::lifecycle::StateTracker;
use super::{AttemptId, Handler, PushError, PushResult};

/// Device registration primitive of the underlying push transport
pub trait PushTransport: Send + Sync {
    /// Register this device for every sender id, returning the device token
    fn register<'a>(
        &'a self,
        sender_ids: &'a [String],
    ) -> Pin<Box<dyn Future<Output = PushResult<String>> + Send + 'a>>;
}

/// Sender ids supplied by the caller: a single value or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SenderIds {
    One(String),
    Many(Vec<String>),
}

impl SenderIds {
    pub fn as_slice(&self) -> &[String] {
        match self {
            SenderIds::One(id) => std::slice::from_ref(id),
            SenderIds::Many(ids) => ids,
        }
    }
}

impl From<&str> for SenderIds {
    fn from(id: &str) -> Self {
        Self::One(id.to_string())
    }
}

impl From<String> for SenderIds {
    fn from(id: String) -> Self {
        Self::One(id)
    }
}

impl From<Vec<String>> for SenderIds {
    fn from(ids: Vec<String>) -> Self {
        Self::Many(ids)
    }
}

impl From<Vec<&str>> for SenderIds {
    fn from(ids: Vec<&str>) -> Self {
        Self::Many(ids.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for SenderIds {
    fn from(ids: [&str; N]) -> Self {
        Self::Many(ids.into_iter().map(str::to_string).collect())
    }
}

/// Ordered, duplicate-free set of sender ids for one registration attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderIdSet(Vec<String>);

impl SenderIdSet {
    /// Configured default first, then caller ids; blanks and repeats are skipped
    pub fn build(default: Option<&str>, caller: Option<&SenderIds>) -> Self {
        let mut set = Self::default();
        if let Some(id) = default {
            set.insert(id);
        }
        if let Some(ids) = caller {
            for id in ids.as_slice() {
                set.insert(id);
            }
        }
        set
    }

    /// Returns `false` if the id was blank or already present
    pub fn insert(&mut self, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() || self.0.iter().any(|existing| existing == id) {
            return false;
        }
        self.0.push(id.to_string());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|existing| existing == id)
    }
}

/// Options accepted by a registration call
///
/// Every handler is optional; a provided handler replaces the one currently installed
/// for its channel.
#[derive(Clone)]
pub struct RegistrationOptions {
    pub on_success: Option<Handler>,
    pub on_error: Option<Handler>,
    /// Message handler, also known as `callback`
    pub on_message: Option<Handler>,
    pub on_unregister: Option<Handler>,
    pub on_data: Option<Handler>,
    pub sender_ids: Option<SenderIds>,
    /// Treat the caller as running in a visible UI context and force `Foreground`
    pub assume_foreground: bool,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
            on_message: None,
            on_unregister: None,
            on_data: None,
            sender_ids: None,
            assume_foreground: true,
        }
    }
}

impl RegistrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl Fn(&EventPayload) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&EventPayload) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_message(mut self, f: impl Fn(&EventPayload) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    pub fn on_unregister(mut self, f: impl Fn(&EventPayload) + Send + Sync + 'static) -> Self {
        self.on_unregister = Some(Arc::new(f));
        self
    }

    pub fn on_data(mut self, f: impl Fn(&EventPayload) + Send + Sync + 'static) -> Self {
        self.on_data = Some(Arc::new(f));
        self
    }

    pub fn sender_ids(mut self, ids: impl Into<SenderIds>) -> Self {
        self.sender_ids = Some(ids.into());
        self
    }

    pub fn assume_foreground(mut self, assume: bool) -> Self {
        self.assume_foreground = assume;
        self
    }

    fn install(&self, callbacks: &CallbackDispatcher) {
        let slots = [
            (EventChannel::Success, &self.on_success),
            (EventChannel::Error, &self.on_error),
            (EventChannel::Message, &self.on_message),
            (EventChannel::Unregister, &self.on_unregister),
            (EventChannel::Data, &self.on_data),
        ];
        for (channel, handler) in slots {
            if let Some(handler) = handler {
                callbacks.set_handler(channel, handler.clone());
            }
        }
    }
}

impl std::fmt::Debug for RegistrationOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationOptions")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_unregister", &self.on_unregister.is_some())
            .field("on_data", &self.on_data.is_some())
            .field("sender_ids", &self.sender_ids)
            .field("assume_foreground", &self.assume_foreground)
            .finish()
    }
}

/// Terminal result of one registration attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationOutcome {
    Success { token: String },
    Failure { message: String },
}

impl RegistrationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RegistrationOutcome::Success { .. })
    }

    fn from_result(result: PushResult<String>) -> Self {
        match result {
            Ok(token) => RegistrationOutcome::Success { token },
            Err(e) => RegistrationOutcome::Failure {
                message: e.to_string(),
            },
        }
    }

    /// Fire exactly one of `success` or `error`
    fn signal(&self, callbacks: &CallbackDispatcher) {
        match self {
            RegistrationOutcome::Success { token } => callbacks.fire_success(token.clone()),
            RegistrationOutcome::Failure { message } => callbacks.fire_error(message.clone()),
        }
    }
}

/// Handle to the outcome of a registration attempt
///
/// Outcomes are always delivered through the event channels; the ticket only lets
/// callers wait for the same result.
#[derive(Debug, Clone)]
pub struct RegistrationTicket {
    attempt_id: Option<AttemptId>,
    coalesced: bool,
    rx: watch::Receiver<Option<RegistrationOutcome>>,
}

impl RegistrationTicket {
    fn resolved(outcome: RegistrationOutcome) -> Self {
        let (_tx, rx) = watch::channel(Some(outcome));
        Self {
            attempt_id: None,
            coalesced: false,
            rx,
        }
    }

    /// Attempt this ticket follows; `None` if no transport call was made
    pub fn attempt_id(&self) -> Option<AttemptId> {
        self.attempt_id
    }

    /// `true` if this call joined an attempt that was already in flight
    pub fn is_coalesced(&self) -> bool {
        self.coalesced
    }

    pub fn try_outcome(&self) -> Option<RegistrationOutcome> {
        self.rx.borrow().clone()
    }

    pub async fn outcome(mut self) -> RegistrationOutcome {
        if let Some(outcome) = self.try_outcome() {
            return outcome;
        }
        match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone().unwrap_or_else(abandoned),
            Err(_) => abandoned(),
        }
    }
}

fn abandoned() -> RegistrationOutcome {
    RegistrationOutcome::Failure {
        message: "registration attempt abandoned".to_string(),
    }
}

#[derive(Debug)]
struct InFlight {
    attempt_id: AttemptId,
    rx: watch::Receiver<Option<RegistrationOutcome>>,
}

/// Coordinates registration attempts against the push transport
///
/// At most one attempt is in flight; overlapping calls join it.
pub struct RegistrationCoordinator {
    callbacks: Arc<CallbackDispatcher>,
    state: Arc<StateTracker>,
    transport: Option<Arc<dyn PushTransport>>,
    runtime: Handle,
    in_flight: Arc<Mutex<Option<InFlight>>>,
}

impl RegistrationCoordinator {
    pub fn new(
        callbacks: Arc<CallbackDispatcher>,
        state: Arc<StateTracker>,
        transport: Option<Arc<dyn PushTransport>>,
        runtime: Handle,
    ) -> Self {
        Self {
            callbacks,
            state,
            transport,
            runtime,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Start (or join) a registration attempt
    ///
    /// Never returns an error: a missing sender id fires `error` before any transport
    /// call and yields an already-resolved ticket.
    pub fn register(
        &self,
        options: RegistrationOptions,
        default_sender_id: Option<&str>,
    ) -> RegistrationTicket {
        options.install(&self.callbacks);

        let mut in_flight = self.in_flight.lock();
        if let Some(current) = in_flight.as_ref() {
            match options.sender_ids.as_ref() {
                Some(ids) if !ids.as_slice().is_empty() => {
                    tracing::warn!(
                        attempt = %current.attempt_id,
                        ignored_sender_ids = ?ids.as_slice(),
                        "Registration already in flight; joining it and ignoring these sender ids"
                    );
                },
                _ => {
                    tracing::info!(attempt = %current.attempt_id, "Registration already in flight; joining it");
                },
            }
            return RegistrationTicket {
                attempt_id: Some(current.attempt_id),
                coalesced: true,
                rx: current.rx.clone(),
            };
        }

        let sender_ids = SenderIdSet::build(default_sender_id, options.sender_ids.as_ref());
        if sender_ids.is_empty() {
            drop(in_flight);
            tracing::warn!("Could not find any sender id in application properties or options");
            let outcome = RegistrationOutcome::from_result(Err(PushError::NoSenderId));
            outcome.signal(&self.callbacks);
            return RegistrationTicket::resolved(outcome);
        }

        let attempt_id = AttemptId::generate();
        let (tx, rx) = watch::channel(None);
        *in_flight = Some(InFlight {
            attempt_id,
            rx: rx.clone(),
        });
        drop(in_flight);

        if options.assume_foreground {
            self.state.mark_foreground_optimistic();
        }

        tracing::debug!(attempt = %attempt_id, sender_ids = ?sender_ids.as_slice(), "Starting registration");

        let callbacks = self.callbacks.clone();
        let transport = self.transport.clone();
        let in_flight = self.in_flight.clone();
        let runtime = self.runtime.clone();
        let span = tracing::info_span!("registration", attempt = %attempt_id);

        self.runtime.spawn(
            async move {
                let result = match transport {
                    Some(transport) => {
                        let call = runtime.spawn(async move {
                            transport.register(sender_ids.as_slice()).await
                        });
                        match call.await {
                            Ok(result) => result,
                            Err(e) => Err(PushError::transport(format!("registration task failed: {e}"))),
                        }
                    },
                    None => Err(PushError::TransportUnavailable),
                };

                let outcome = RegistrationOutcome::from_result(result);
                match &outcome {
                    RegistrationOutcome::Success { token } => {
                        tracing::info!(token = %token, "Device registered");
                    },
                    RegistrationOutcome::Failure { message } => {
                        tracing::warn!(error = %message, "Registration failed");
                    },
                }

                // Release the slot first so handlers may start a new attempt
                {
                    let mut slot = in_flight.lock();
                    if slot.as_ref().is_some_and(|current| current.attempt_id == attempt_id) {
                        *slot = None;
                    }
                }

                outcome.signal(&callbacks);
                let _ = tx.send(Some(outcome));
            }
            .instrument(span),
        );

        RegistrationTicket {
            attempt_id: Some(attempt_id),
            coalesced: false,
            rx,
        }
    }

    /// Pass-through for a completed unregistration
    pub fn unregister(&self, device_token: &str) {
        tracing::debug!(token = device_token, "Device unregistered");
        self.callbacks.fire_unregister(device_token);
    }
}

impl std::fmt::Debug for RegistrationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationCoordinator")
            .field("has_transport", &self.transport.is_some())
            .field("in_flight", &self.in_flight.lock().as_ref().map(|i| i.attempt_id))
            .finish()
    }
}
