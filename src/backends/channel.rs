// In-process handoff over a tokio channel
// Lets a background worker in the same process consume deferred messages

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::components::router::{BackgroundHandoff, HandoffRequest};
use crate::components::{PushError, PushResult};

pub struct ChannelHandoff {
    tx: mpsc::Sender<HandoffRequest>,
}

impl ChannelHandoff {
    /// Create the backend and the receiving end for the consumer
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<HandoffRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl BackgroundHandoff for ChannelHandoff {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn hand_off(
        &self,
        request: HandoffRequest,
    ) -> Pin<Box<dyn Future<Output = PushResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.tx
                .send(request)
                .await
                .map_err(|_| PushError::handoff("channel", "receiver dropped"))
        })
    }
}
