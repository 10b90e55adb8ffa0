// Logging-only handoff

use std::future::Future;
use std::pin::Pin;

use crate::components::PushResult;
use crate::components::router::{BackgroundHandoff, HandoffRequest};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandoff;

impl BackgroundHandoff for LogHandoff {
    fn name(&self) -> &'static str {
        "log"
    }

    fn hand_off(
        &self,
        request: HandoffRequest,
    ) -> Pin<Box<dyn Future<Output = PushResult<()>> + Send + '_>> {
        Box::pin(async move {
            tracing::info!(
                envelope = %request.envelope_id,
                keys = ?request.payload.as_map().keys().collect::<Vec<_>>(),
                launched_fresh = request.launched_fresh,
                "Background message received with no delivery path attached"
            );
            Ok(())
        })
    }
}
