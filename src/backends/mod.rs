// Background handoff backends
// Each backend receives messages that arrive while the application is not visible

pub mod channel;
pub mod linux;
pub mod log;

use std::sync::Arc;

use crate::components::config::HandoffConfig;
use crate::components::router::BackgroundHandoff;

pub use channel::ChannelHandoff;
pub use log::LogHandoff;

/// Factory for creating handoff backends
pub struct HandoffBackendFactory;

impl HandoffBackendFactory {
    /// Native notification backend for the current OS, or the logging fallback
    #[allow(unused_variables)]
    pub fn platform_default(config: &HandoffConfig) -> Arc<dyn BackgroundHandoff> {
        #[cfg(target_os = "linux")]
        {
            Arc::new(linux::DbusHandoff::new(config.clone()))
        }

        #[cfg(not(target_os = "linux"))]
        {
            Arc::new(LogHandoff)
        }
    }

    /// Backend that only logs; used when no delivery path is attached
    pub fn fallback() -> Arc<dyn BackgroundHandoff> {
        Arc::new(LogHandoff)
    }
}
