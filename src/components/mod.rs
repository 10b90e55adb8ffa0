// Core push bridge components
// Registration, visibility tracking, envelope routing and callback dispatch

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod callbacks;
pub mod config;
pub mod host;
pub mod lifecycle;
pub mod payload;
pub mod pending;
pub mod registration;
pub mod router;

pub use callbacks::{BridgeEvent, CallbackDispatcher, EventChannel, EventPayload};
pub use config::{AppProperties, BridgeConfig, DEFAULT_SENDER_ID_PROPERTY, HandoffConfig};
pub use host::HostEnvironment;
pub use lifecycle::{
    AppVisibility, ForegroundHook, LifecycleEvent, StateTracker, VisibilityTransition,
};
pub use payload::{EnvelopeValue, NormalizedPayload, PAYLOAD_KEY_PREFIX, PayloadExtractor, RawEnvelope};
pub use pending::PendingDataStore;
pub use registration::{
    PushTransport, RegistrationCoordinator, RegistrationOptions, RegistrationOutcome,
    RegistrationTicket, SenderIdSet, SenderIds,
};
pub use router::{
    AckGuard, BackgroundHandoff, DeliveryAck, DropReason, HandoffRequest, InboundEnvelope,
    MessageKind, MessageRouter, RouteOutcome,
};

/// Event handler registered by application code for one event channel
///
/// Handlers are invoked synchronously on the thread that fires the event.
pub type Handler = Arc<dyn Fn(&EventPayload) + Send + Sync>;

/// Wrap a closure as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&EventPayload) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Identifier of one registration attempt, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(Uuid);

impl AttemptId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned to each inbound push envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvelopeId(Uuid);

impl EnvelopeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for EnvelopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error taxonomy for the push bridge
///
/// None of these cross the bridge boundary as a thrown error during registration or
/// routing: they are rendered with `Display` and surfaced through the `error` event
/// channel or logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// Neither application properties nor the caller supplied a sender id
    #[error("no sender id configured")]
    NoSenderId,
    /// The push transport rejected or failed the registration call
    #[error("{message}")]
    Transport { message: String },
    /// No push transport was attached to the bridge
    #[error("push transport unavailable")]
    TransportUnavailable,
    /// No host environment was attached to the bridge
    #[error("host environment unavailable")]
    HostUnavailable,
    /// A background handoff backend failed to accept a payload
    #[error("handoff via {backend} failed: {message}")]
    Handoff { backend: String, message: String },
    /// Configuration could not be parsed
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl PushError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn handoff(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handoff {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

/// Type alias for push bridge results
pub type PushResult<T> = Result<T, PushError>;
