// Named event handlers plus a uniform broadcast stream
// One handler per channel; every fire is also broadcast to subscribers

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::Handler;
use super::payload::NormalizedPayload;

/// Event channels exposed to application code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventChannel {
    Success,
    Error,
    Message,
    Unregister,
    Data,
}

impl EventChannel {
    pub const ALL: [EventChannel; 5] = [
        EventChannel::Success,
        EventChannel::Error,
        EventChannel::Message,
        EventChannel::Unregister,
        EventChannel::Data,
    ];

    /// Name of the broadcast event emitted for this channel
    ///
    /// Messages are broadcast as `callback`, matching the registration option name.
    pub fn event_name(&self) -> &'static str {
        match self {
            EventChannel::Success => "success",
            EventChannel::Error => "error",
            EventChannel::Message => "callback",
            EventChannel::Unregister => "unregister",
            EventChannel::Data => "data",
        }
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "success" => Some(EventChannel::Success),
            "error" => Some(EventChannel::Error),
            "callback" | "message" => Some(EventChannel::Message),
            "unregister" => Some(EventChannel::Unregister),
            "data" => Some(EventChannel::Data),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.event_name())
    }
}

/// Payload delivered to handlers and broadcast subscribers
///
/// Serializes to the wire shapes applications depend on:
/// `{"deviceToken": ..}`, `{"error": ..}`, the bare message map, or the bare data value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    DeviceToken {
        #[serde(rename = "deviceToken")]
        device_token: String,
    },
    Error {
        error: String,
    },
    Message(NormalizedPayload),
    Data(Option<serde_json::Value>),
}

impl EventPayload {
    pub fn device_token(&self) -> Option<&str> {
        match self {
            EventPayload::DeviceToken { device_token } => Some(device_token),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            EventPayload::Error { error } => Some(error),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&NormalizedPayload> {
        match self {
            EventPayload::Message(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            EventPayload::Data(value) => value.as_ref(),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Uniform event emitted on the broadcast stream for every fire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeEvent {
    pub channel: EventChannel,
    pub name: String,
    pub payload: EventPayload,
    pub emitted_at: DateTime<Utc>,
}

/// Registry of single-subscriber handlers with a parallel broadcast channel
pub struct CallbackDispatcher {
    handlers: DashMap<EventChannel, Handler>,
    events: broadcast::Sender<BridgeEvent>,
}

impl CallbackDispatcher {
    pub fn new(broadcast_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            handlers: DashMap::new(),
            events,
        }
    }

    /// Install `handler` for `channel`, replacing any previous one
    pub fn set_handler(&self, channel: EventChannel, handler: Handler) {
        if self.handlers.insert(channel, handler).is_some() {
            tracing::debug!(%channel, "Replaced event handler");
        } else {
            tracing::debug!(%channel, "Set event handler");
        }
    }

    pub fn clear_handler(&self, channel: EventChannel) {
        self.handlers.remove(&channel);
    }

    pub fn has_handler(&self, channel: EventChannel) -> bool {
        self.handlers.contains_key(&channel)
    }

    /// Subscribe to the uniform event stream
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Invoke the channel handler, if any, then broadcast the event
    ///
    /// The handler reference is cloned out of the registry before the call, so a
    /// handler may replace itself or others while running.
    pub fn fire(&self, channel: EventChannel, payload: EventPayload) {
        let handler = self.handlers.get(&channel).map(|entry| entry.value().clone());
        if let Some(handler) = handler {
            handler(&payload);
        } else {
            tracing::debug!(%channel, "No handler registered");
        }

        let event = BridgeEvent {
            channel,
            name: channel.event_name().to_string(),
            payload,
            emitted_at: Utc::now(),
        };
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    pub fn fire_success(&self, device_token: impl Into<String>) {
        self.fire(
            EventChannel::Success,
            EventPayload::DeviceToken {
                device_token: device_token.into(),
            },
        );
    }

    pub fn fire_error(&self, error: impl Into<String>) {
        self.fire(EventChannel::Error, EventPayload::Error {
            error: error.into(),
        });
    }

    pub fn fire_message(&self, payload: NormalizedPayload) {
        self.fire(EventChannel::Message, EventPayload::Message(payload));
    }

    pub fn fire_unregister(&self, device_token: impl Into<String>) {
        self.fire(
            EventChannel::Unregister,
            EventPayload::DeviceToken {
                device_token: device_token.into(),
            },
        );
    }

    pub fn fire_data(&self, value: Option<serde_json::Value>) {
        self.fire(EventChannel::Data, EventPayload::Data(value));
    }
}

impl Default for CallbackDispatcher {
    fn default() -> Self {
        Self::new(64)
    }
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<EventChannel> = EventChannel::ALL
            .into_iter()
            .filter(|c| self.handlers.contains_key(c))
            .collect();
        f.debug_struct("CallbackDispatcher")
            .field("registered", &registered)
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}
