//! Native push bridge between a push-messaging transport and application event handlers
//!
//! This crate registers the device with a push backend, tracks whether the host
//! application is visible, and routes inbound push envelopes either to live
//! application callbacks or to a background delivery path. Data set while the
//! application is hidden is delivered once on the next foreground transition.
//!
//! All state lives in an owned [`PushBridge`]; the host application drives it through
//! explicit lifecycle calls and the push transport plugs in through [`PushTransport`].

pub mod backends;
pub mod components;

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

// Re-export all components for convenience
pub use backends::*;
pub use components::*;

struct BridgeInner {
    config: BridgeConfig,
    properties: RwLock<AppProperties>,
    state: Arc<StateTracker>,
    callbacks: Arc<CallbackDispatcher>,
    pending: Arc<PendingDataStore>,
    registration: RegistrationCoordinator,
    router: Arc<MessageRouter>,
    host: Option<Arc<dyn HostEnvironment>>,
    runtime: Handle,
}

/// Owned core context shared by every entry point
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct PushBridge {
    inner: Arc<BridgeInner>,
}

impl PushBridge {
    pub fn builder() -> PushBridgeBuilder {
        PushBridgeBuilder::new()
    }

    // Registration

    /// Install handlers and start (or join) a registration attempt
    ///
    /// The outcome is delivered through the `success`/`error` channels; the returned
    /// ticket can be awaited for the same outcome.
    pub fn register(&self, options: RegistrationOptions) -> RegistrationTicket {
        let default_sender_id = {
            let properties = self.inner.properties.read();
            self.inner.config.default_sender_id(&properties)
        };
        self.inner
            .registration
            .register(options, default_sender_id.as_deref())
    }

    /// Signal a completed unregistration for `device_token`
    pub fn unregister(&self, device_token: &str) {
        self.inner.registration.unregister(device_token);
    }

    pub fn is_registration_in_flight(&self) -> bool {
        self.inner.registration.is_in_flight()
    }

    // Inbound messages

    /// Route one envelope on the current task
    pub async fn route(
        &self,
        envelope: InboundEnvelope,
        ack: impl DeliveryAck + 'static,
    ) -> RouteOutcome {
        self.inner.router.route(envelope, ack).await
    }

    /// Route one envelope on its own task
    pub fn deliver(
        &self,
        envelope: InboundEnvelope,
        ack: impl DeliveryAck + 'static,
    ) -> JoinHandle<RouteOutcome> {
        let router = self.inner.router.clone();
        self.inner
            .runtime
            .spawn(async move { router.route(envelope, ack).await })
    }

    // Lifecycle

    /// A UI surface was resumed; flushes pending data
    pub fn notify_resumed(&self) {
        self.inner.state.notify_resumed();
    }

    pub fn notify_paused(&self) {
        self.inner.state.notify_paused();
    }

    pub fn notify_all_stopped(&self) {
        self.inner.state.notify_all_stopped();
    }

    pub fn notify_runtime_ready(&self) {
        self.inner.state.notify_runtime_ready();
    }

    pub fn is_in_foreground(&self) -> bool {
        self.inner.state.is_foreground()
    }

    pub fn was_launched_fresh(&self) -> bool {
        self.inner.state.was_launched_fresh()
    }

    pub fn visibility(&self) -> AppVisibility {
        self.inner.state.visibility()
    }

    pub fn is_runtime_ready(&self) -> bool {
        self.inner.state.is_runtime_ready()
    }

    pub fn last_transition(&self) -> Option<VisibilityTransition> {
        self.inner.state.last_transition()
    }

    /// Entry UI surface of the host application
    pub fn main_activity_class_name(&self) -> PushResult<String> {
        match &self.inner.host {
            Some(host) => host.entry_surface_name(),
            None => Err(PushError::HostUnavailable),
        }
    }

    // Pending data

    pub fn get_data(&self) -> Option<serde_json::Value> {
        self.inner.pending.get()
    }

    /// Store `value`; it is held for the next foreground transition when hidden
    pub fn set_data(&self, value: Option<serde_json::Value>) {
        let visibility = if self.is_in_foreground() {
            AppVisibility::Foreground
        } else {
            AppVisibility::Background
        };
        self.inner.pending.set(value, visibility);
    }

    pub fn has_pending_data(&self) -> bool {
        self.inner.pending.is_pending()
    }

    /// Explicit poll: fire pending data now if any; returns whether it fired
    pub fn flush_pending_data(&self) -> bool {
        self.inner.pending.flush_if_pending(&self.inner.callbacks)
    }

    // Events and configuration

    pub fn callbacks(&self) -> &CallbackDispatcher {
        &self.inner.callbacks
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.inner.callbacks.subscribe()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn properties(&self) -> AppProperties {
        self.inner.properties.read().clone()
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.properties.write().set(key, value);
    }
}

impl std::fmt::Debug for PushBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushBridge")
            .field("visibility", &self.inner.state.visibility())
            .field("callbacks", &self.inner.callbacks)
            .field("registration", &self.inner.registration)
            .field("router", &self.inner.router)
            .finish()
    }
}

/// Builder for [`PushBridge`] with fluent API
pub struct PushBridgeBuilder {
    config: BridgeConfig,
    properties: AppProperties,
    transport: Option<Arc<dyn PushTransport>>,
    handoff: Option<Arc<dyn BackgroundHandoff>>,
    platform_handoff: bool,
    host: Option<Arc<dyn HostEnvironment>>,
    runtime: Option<Handle>,
    launched_fresh: bool,
}

impl PushBridgeBuilder {
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
            properties: AppProperties::default(),
            transport: None,
            handoff: None,
            platform_handoff: false,
            host: None,
            runtime: None,
            launched_fresh: true,
        }
    }

    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_properties(mut self, properties: AppProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Shorthand for setting the default sender id property
    pub fn with_default_sender_id(mut self, sender_id: impl Into<String>) -> Self {
        self.properties
            .set(self.config.sender_id_property.clone(), sender_id);
        self
    }

    pub fn with_transport(mut self, transport: impl PushTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn with_shared_transport(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_handoff(mut self, handoff: impl BackgroundHandoff + 'static) -> Self {
        self.handoff = Some(Arc::new(handoff));
        self
    }

    /// Use the native notification backend for background messages
    pub fn with_platform_handoff(mut self) -> Self {
        self.platform_handoff = true;
        self
    }

    pub fn with_host(mut self, host: impl HostEnvironment + 'static) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Whether the process was cold-started by this activation
    pub fn launched_fresh(mut self, launched_fresh: bool) -> Self {
        self.launched_fresh = launched_fresh;
        self
    }

    /// Build the bridge; needs an explicit runtime handle or an ambient tokio runtime
    pub fn build(self) -> PushResult<PushBridge> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| PushError::Config {
                message: format!("no tokio runtime available: {e}"),
            })?,
        };

        let handoff = match (self.handoff, self.platform_handoff) {
            (Some(handoff), _) => handoff,
            (None, true) => HandoffBackendFactory::platform_default(&self.config.handoff),
            (None, false) => HandoffBackendFactory::fallback(),
        };

        let state = Arc::new(StateTracker::new(self.launched_fresh));
        let callbacks = Arc::new(CallbackDispatcher::new(self.config.broadcast_capacity));
        let pending = Arc::new(PendingDataStore::new());

        // Every foreground transition delivers data set while hidden, including the
        // optimistic one made by registration
        state.set_foreground_hook({
            let pending = pending.clone();
            let callbacks = callbacks.clone();
            move || {
                pending.flush_if_pending(&callbacks);
            }
        });

        let registration = RegistrationCoordinator::new(
            callbacks.clone(),
            state.clone(),
            self.transport,
            runtime.clone(),
        );
        let router = Arc::new(MessageRouter::new(state.clone(), callbacks.clone(), handoff));

        tracing::debug!(
            sender_id_property = %self.config.sender_id_property,
            launched_fresh = self.launched_fresh,
            "Push bridge created"
        );

        Ok(PushBridge {
            inner: Arc::new(BridgeInner {
                config: self.config,
                properties: RwLock::new(self.properties),
                state,
                callbacks,
                pending,
                registration,
                router,
                host: self.host,
                runtime,
            }),
        })
    }
}

impl Default for PushBridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
