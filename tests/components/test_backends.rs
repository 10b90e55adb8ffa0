//! Tests for the background handoff backends

use chrono::Utc;
use kodegen_native_push::backends::{ChannelHandoff, HandoffBackendFactory, LogHandoff};
use kodegen_native_push::components::config::HandoffConfig;
use kodegen_native_push::components::router::{BackgroundHandoff, HandoffRequest};
use kodegen_native_push::components::{EnvelopeId, NormalizedPayload, PushError};

use crate::support::init_tracing;

fn request() -> HandoffRequest {
    HandoffRequest {
        envelope_id: EnvelopeId::generate(),
        payload: [("title", "Hi"), ("message", "Body")].into_iter().collect::<NormalizedPayload>(),
        launched_fresh: false,
        received_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_log_handoff_accepts_everything() {
    init_tracing();
    assert_eq!(LogHandoff.name(), "log");
    assert!(LogHandoff.hand_off(request()).await.is_ok());
}

#[tokio::test]
async fn test_channel_handoff_forwards_request() {
    let (handoff, mut rx) = ChannelHandoff::new(1);
    let sent = request();
    let envelope_id = sent.envelope_id;

    handoff.hand_off(sent).await.expect("send");

    let received = rx.recv().await.expect("request");
    assert_eq!(received.envelope_id, envelope_id);
    assert_eq!(received.payload.get("message"), Some("Body"));
}

#[tokio::test]
async fn test_channel_handoff_without_receiver_fails() {
    let (handoff, rx) = ChannelHandoff::new(1);
    drop(rx);

    let err = handoff.hand_off(request()).await.unwrap_err();
    assert!(matches!(err, PushError::Handoff { ref backend, .. } if backend == "channel"));
}

#[test]
fn test_factory_backends() {
    assert_eq!(HandoffBackendFactory::fallback().name(), "log");

    let platform = HandoffBackendFactory::platform_default(&HandoffConfig::default());
    if cfg!(target_os = "linux") {
        assert_eq!(platform.name(), "dbus");
    } else {
        assert_eq!(platform.name(), "log");
    }
}
