// Inbound push envelope routing
// Classify, then dispatch live (foreground) or hand off (background); always acknowledge

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::callbacks::CallbackDispatcher;
use super::lifecycle::StateTracker;
use super::payload::{NormalizedPayload, PayloadExtractor, RawEnvelope};
use super::{EnvelopeId, PushResult};

/// Transport tag for a regular data message
pub const MESSAGE_TYPE_MESSAGE: &str = "gcm";
/// Transport tag signalling that pending messages were dropped server-side
pub const MESSAGE_TYPE_DELETED: &str = "deleted_messages";

/// Classification of an inbound envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Message,
    Deleted,
    Unrecognized(String),
}

impl MessageKind {
    /// `None` when the transport supplied no type tag; any other tag, `send_error`
    /// included, is `Unrecognized`
    pub fn classify(tag: Option<&str>) -> Option<Self> {
        let tag = tag?;
        Some(match tag {
            MESSAGE_TYPE_MESSAGE | "message" => MessageKind::Message,
            MESSAGE_TYPE_DELETED | "deleted" => MessageKind::Deleted,
            other => MessageKind::Unrecognized(other.to_string()),
        })
    }
}

/// One inbound delivery from the push transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub id: EnvelopeId,
    pub message_type: Option<String>,
    pub extras: RawEnvelope,
    pub received_at: DateTime<Utc>,
}

impl InboundEnvelope {
    pub fn new(message_type: Option<&str>, extras: RawEnvelope) -> Self {
        Self {
            id: EnvelopeId::generate(),
            message_type: message_type.map(str::to_string),
            extras,
            received_at: Utc::now(),
        }
    }

    /// Envelope tagged as a regular data message
    pub fn message(extras: RawEnvelope) -> Self {
        Self::new(Some(MESSAGE_TYPE_MESSAGE), extras)
    }

    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::classify(self.message_type.as_deref())
    }
}

/// Completion receipt owed to the transport for every inbound envelope
pub trait DeliveryAck: Send {
    fn acknowledge(self: Box<Self>);
}

impl<F> DeliveryAck for F
where
    F: FnOnce() + Send,
{
    fn acknowledge(self: Box<Self>) {
        (*self)()
    }
}

/// Acknowledges its receipt exactly once: on `complete` or, failing that, on drop
///
/// Drop covers early returns and panics inside handlers.
pub struct AckGuard {
    envelope_id: EnvelopeId,
    ack: Option<Box<dyn DeliveryAck>>,
}

impl AckGuard {
    pub fn new(envelope_id: EnvelopeId, ack: impl DeliveryAck + 'static) -> Self {
        Self {
            envelope_id,
            ack: Some(Box::new(ack)),
        }
    }

    pub fn complete(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(ack) = self.ack.take() {
            tracing::trace!(envelope = %self.envelope_id, "Acknowledging delivery");
            ack.acknowledge();
        }
    }
}

impl Drop for AckGuard {
    fn drop(&mut self) {
        if self.ack.is_some() {
            tracing::debug!(envelope = %self.envelope_id, "Acknowledging delivery on unwind");
        }
        self.release();
    }
}

impl std::fmt::Debug for AckGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckGuard")
            .field("envelope_id", &self.envelope_id)
            .field("pending", &self.ack.is_some())
            .finish()
    }
}

/// Background delivery request handed to the notification/launch path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRequest {
    pub envelope_id: EnvelopeId,
    pub payload: NormalizedPayload,
    pub launched_fresh: bool,
    pub received_at: DateTime<Utc>,
}

/// Delivery path used while the application is not visible
pub trait BackgroundHandoff: Send + Sync {
    /// Backend name for diagnostics
    fn name(&self) -> &'static str;

    fn hand_off(
        &self,
        request: HandoffRequest,
    ) -> Pin<Box<dyn Future<Output = PushResult<()>> + Send + '_>>;
}

/// Why an envelope produced no delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    MissingType,
    Deleted,
    Unrecognized(String),
    EmptyContent,
    HandoffFailed(String),
}

/// Result of routing one envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteOutcome {
    /// Fired as a `message` event
    Dispatched,
    /// Forwarded to the background handoff
    HandedOff,
    Dropped(DropReason),
}

/// Routes inbound envelopes based on current visibility
pub struct MessageRouter {
    state: Arc<StateTracker>,
    callbacks: Arc<CallbackDispatcher>,
    handoff: Arc<dyn BackgroundHandoff>,
}

impl MessageRouter {
    pub fn new(
        state: Arc<StateTracker>,
        callbacks: Arc<CallbackDispatcher>,
        handoff: Arc<dyn BackgroundHandoff>,
    ) -> Self {
        Self {
            state,
            callbacks,
            handoff,
        }
    }

    /// Route one envelope and acknowledge it as the final step
    #[tracing::instrument(skip_all, fields(envelope = %envelope.id))]
    pub async fn route(&self, envelope: InboundEnvelope, ack: impl DeliveryAck + 'static) -> RouteOutcome {
        let guard = AckGuard::new(envelope.id, ack);
        let outcome = self.dispatch(envelope).await;
        guard.complete();
        outcome
    }

    async fn dispatch(&self, envelope: InboundEnvelope) -> RouteOutcome {
        match envelope.kind() {
            None => {
                tracing::debug!("Message type is null");
                return RouteOutcome::Dropped(DropReason::MissingType);
            },
            Some(MessageKind::Deleted) => {
                tracing::debug!("Transport reported deleted messages");
                return RouteOutcome::Dropped(DropReason::Deleted);
            },
            Some(MessageKind::Unrecognized(tag)) => {
                tracing::debug!(message_type = %tag, "Unrecognized message type");
                return RouteOutcome::Dropped(DropReason::Unrecognized(tag));
            },
            Some(MessageKind::Message) => {},
        }

        if envelope.extras.is_empty() {
            return RouteOutcome::Dropped(DropReason::EmptyContent);
        }

        if self.state.is_foreground() {
            let payload = PayloadExtractor::normalize(&envelope.extras);
            tracing::debug!(keys = payload.len(), "Dispatching message in foreground");
            self.callbacks.fire_message(payload);
            return RouteOutcome::Dispatched;
        }

        let request = HandoffRequest {
            envelope_id: envelope.id,
            payload: PayloadExtractor::extract_each(&envelope.extras).collect(),
            launched_fresh: self.state.was_launched_fresh(),
            received_at: envelope.received_at,
        };
        let backend = self.handoff.name();
        match self.handoff.hand_off(request).await {
            Ok(()) => {
                tracing::debug!(backend, "Handed off message in background");
                RouteOutcome::HandedOff
            },
            Err(e) => {
                tracing::warn!(backend, error = %e, "Background handoff failed");
                RouteOutcome::Dropped(DropReason::HandoffFailed(e.to_string()))
            },
        }
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("handoff", &self.handoff.name())
            .finish()
    }
}
