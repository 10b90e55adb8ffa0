// Foreground/background state tracking
// Driven by host lifecycle notifications; read from any context

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Whether the host application currently has a visible surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AppVisibility {
    Foreground,
    /// Initial state: delivery is deferred until the host reports a resume
    #[default]
    Background,
}

impl AppVisibility {
    fn as_u8(self) -> u8 {
        match self {
            AppVisibility::Foreground => 1,
            AppVisibility::Background => 0,
        }
    }

    fn from_u8(raw: u8) -> Self {
        if raw == 1 {
            AppVisibility::Foreground
        } else {
            AppVisibility::Background
        }
    }
}

/// Lifecycle notifications delivered by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// A UI surface was resumed
    Resumed,
    /// The resumed surface was paused
    Paused,
    /// Every UI surface of the process was stopped
    AllStopped,
    /// Registration forced foreground without a host signal
    OptimisticForeground,
}

impl LifecycleEvent {
    pub fn target(&self) -> AppVisibility {
        match self {
            LifecycleEvent::Resumed | LifecycleEvent::OptimisticForeground => {
                AppVisibility::Foreground
            },
            LifecycleEvent::Paused | LifecycleEvent::AllStopped => AppVisibility::Background,
        }
    }
}

/// Record of the most recent visibility change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityTransition {
    pub from: AppVisibility,
    pub to: AppVisibility,
    pub event: LifecycleEvent,
    pub at: DateTime<Utc>,
}

/// Callback run after every event that targets `Foreground`
pub type ForegroundHook = Arc<dyn Fn() + Send + Sync>;

/// Process-wide visibility state machine
///
/// Single writer (the host lifecycle collaborator), many readers. Reads are atomic
/// loads and never block.
pub struct StateTracker {
    visibility: AtomicU8,
    launched_fresh: AtomicBool,
    runtime_ready: AtomicBool,
    last_transition: Mutex<Option<VisibilityTransition>>,
    on_foreground: RwLock<Option<ForegroundHook>>,
}

impl StateTracker {
    pub fn new(launched_fresh: bool) -> Self {
        Self {
            visibility: AtomicU8::new(AppVisibility::Background.as_u8()),
            launched_fresh: AtomicBool::new(launched_fresh),
            runtime_ready: AtomicBool::new(false),
            last_transition: Mutex::new(None),
            on_foreground: RwLock::new(None),
        }
    }

    /// Install the hook run on every resume and optimistic foreground mark
    ///
    /// The hook runs on the notifying thread, after the state change is visible and
    /// with no tracker lock held. It also runs when the tracker was already
    /// `Foreground`.
    pub fn set_foreground_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        let hook: ForegroundHook = Arc::new(hook);
        *self.on_foreground.write() = Some(hook);
    }

    pub fn clear_foreground_hook(&self) {
        *self.on_foreground.write() = None;
    }

    /// Host signalled that the application runtime finished initializing
    pub fn notify_runtime_ready(&self) {
        if !self.runtime_ready.swap(true, Ordering::AcqRel) {
            tracing::debug!("Application runtime ready");
        }
    }

    /// Returns `true` if this call moved the tracker into `Foreground`
    pub fn notify_resumed(&self) -> bool {
        self.apply(LifecycleEvent::Resumed)
    }

    pub fn notify_paused(&self) {
        self.apply(LifecycleEvent::Paused);
    }

    /// All surfaces stopped: background, and any later activation is a resume
    pub fn notify_all_stopped(&self) {
        self.apply(LifecycleEvent::AllStopped);
        if self.launched_fresh.swap(false, Ordering::AcqRel) {
            tracing::debug!("Clearing launched-fresh flag after all surfaces stopped");
        }
    }

    /// Force `Foreground` ahead of a UI-triggered registration
    pub fn mark_foreground_optimistic(&self) {
        self.apply(LifecycleEvent::OptimisticForeground);
    }

    /// `false` until the runtime is ready, regardless of the visibility state
    pub fn is_foreground(&self) -> bool {
        self.runtime_ready.load(Ordering::Acquire) && self.visibility() == AppVisibility::Foreground
    }

    pub fn visibility(&self) -> AppVisibility {
        AppVisibility::from_u8(self.visibility.load(Ordering::Acquire))
    }

    pub fn was_launched_fresh(&self) -> bool {
        self.launched_fresh.load(Ordering::Acquire)
    }

    pub fn is_runtime_ready(&self) -> bool {
        self.runtime_ready.load(Ordering::Acquire)
    }

    pub fn last_transition(&self) -> Option<VisibilityTransition> {
        self.last_transition.lock().clone()
    }

    fn apply(&self, event: LifecycleEvent) -> bool {
        let to = event.target();
        let from = AppVisibility::from_u8(self.visibility.swap(to.as_u8(), Ordering::AcqRel));
        let changed = from != to;

        if changed {
            tracing::debug!(?from, ?to, ?event, "Visibility transition");
            *self.last_transition.lock() = Some(VisibilityTransition {
                from,
                to,
                event,
                at: Utc::now(),
            });
        }

        if to == AppVisibility::Foreground {
            let hook = self.on_foreground.read().clone();
            if let Some(hook) = hook {
                hook();
            }
        }
        changed
    }
}

impl std::fmt::Debug for StateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTracker")
            .field("visibility", &self.visibility())
            .field("launched_fresh", &self.was_launched_fresh())
            .field("runtime_ready", &self.is_runtime_ready())
            .field("has_foreground_hook", &self.on_foreground.read().is_some())
            .finish()
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new(true)
    }
}
