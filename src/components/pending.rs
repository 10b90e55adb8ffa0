// Deferred "data" delivery
// Holds the last application-set value and fires it once on the next foreground

use parking_lot::Mutex;

use super::callbacks::CallbackDispatcher;
use super::lifecycle::AppVisibility;

#[derive(Debug, Default)]
struct PendingSlot {
    value: Option<serde_json::Value>,
    pending: bool,
}

/// Single-slot store for application data awaiting a foreground transition
#[derive(Debug, Default)]
pub struct PendingDataStore {
    slot: Mutex<PendingSlot>,
}

impl PendingDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`; mark it pending only when non-null and set while backgrounded
    pub fn set(&self, value: Option<serde_json::Value>, visibility: AppVisibility) {
        let mut slot = self.slot.lock();
        let has_value = value.as_ref().is_some_and(|v| !v.is_null());
        slot.value = value;

        match visibility {
            AppVisibility::Background if has_value => {
                tracing::debug!("Mark pending data");
                slot.pending = true;
            },
            AppVisibility::Background => {
                tracing::debug!("No pending data to mark");
                slot.pending = false;
            },
            AppVisibility::Foreground => {
                tracing::debug!("Setting data while in foreground");
                slot.pending = false;
            },
        }
    }

    /// Last stored value, pending or not
    pub fn get(&self) -> Option<serde_json::Value> {
        self.slot.lock().value.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().pending
    }

    /// Fire the pending value through `callbacks` exactly once
    ///
    /// Returns `true` if a `data` event was fired. The flag is cleared under the lock
    /// and the handler runs after it is released.
    pub fn flush_if_pending(&self, callbacks: &CallbackDispatcher) -> bool {
        let value = {
            let mut slot = self.slot.lock();
            if !slot.pending {
                tracing::debug!("No pending data found");
                return false;
            }
            slot.pending = false;
            slot.value.clone()
        };

        tracing::debug!("Found pending data");
        callbacks.fire_data(value);
        true
    }
}
