//! Tests for components/callbacks.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use kodegen_native_push::components::callbacks::*;
use kodegen_native_push::components::handler;
use kodegen_native_push::components::payload::NormalizedPayload;
use serde_json::json;

use crate::support::Recorder;

#[test]
fn test_fire_without_handler_or_subscriber_is_noop() {
    let dispatcher = CallbackDispatcher::default();
    for channel in EventChannel::ALL {
        assert!(!dispatcher.has_handler(channel));
    }
    dispatcher.fire_success("T1");
    dispatcher.fire_error("boom");
    dispatcher.fire_data(None);
}

#[test]
fn test_handler_receives_payload_shape() {
    let dispatcher = CallbackDispatcher::default();
    let success = Recorder::new();
    let error = Recorder::new();
    dispatcher.set_handler(EventChannel::Success, success.handler());
    dispatcher.set_handler(EventChannel::Error, error.handler());

    dispatcher.fire_success("T1");
    dispatcher.fire_error("no sender id configured");

    assert_eq!(success.events()[0].device_token(), Some("T1"));
    assert_eq!(error.events()[0].error(), Some("no sender id configured"));
}

#[test]
fn test_set_handler_replaces_previous() {
    let dispatcher = CallbackDispatcher::default();
    let first = Recorder::new();
    let second = Recorder::new();

    dispatcher.set_handler(EventChannel::Success, first.handler());
    dispatcher.set_handler(EventChannel::Success, second.handler());
    dispatcher.fire_success("T1");
    dispatcher.fire_success("T2");

    assert_eq!(first.count(), 0);
    assert_eq!(second.count(), 2);
}

#[test]
fn test_clear_handler() {
    let dispatcher = CallbackDispatcher::default();
    let recorder = Recorder::new();
    dispatcher.set_handler(EventChannel::Unregister, recorder.handler());
    dispatcher.clear_handler(EventChannel::Unregister);
    dispatcher.fire_unregister("T1");
    assert_eq!(recorder.count(), 0);
}

#[test]
fn test_handler_may_swap_itself_during_fire() {
    let dispatcher = Arc::new(CallbackDispatcher::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let replacement = Recorder::new();

    let weak = Arc::downgrade(&dispatcher);
    let replacement_handler = replacement.handler();
    let counter = calls.clone();
    dispatcher.set_handler(
        EventChannel::Message,
        handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(dispatcher) = weak.upgrade() {
                dispatcher.set_handler(EventChannel::Message, replacement_handler.clone());
            }
        }),
    );

    dispatcher.fire_message(NormalizedPayload::default());
    dispatcher.fire_message(NormalizedPayload::default());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(replacement.count(), 1);
}

#[tokio::test]
async fn test_broadcast_mirrors_every_fire() {
    let dispatcher = CallbackDispatcher::default();
    let mut events = dispatcher.subscribe();

    dispatcher.fire_success("T1");
    dispatcher.fire_message([("title", "Hi")].into_iter().collect());
    dispatcher.fire_data(Some(json!({"route": "inbox"})));

    let success = events.recv().await.expect("success event");
    assert_eq!(success.channel, EventChannel::Success);
    assert_eq!(success.name, "success");

    let message = events.recv().await.expect("message event");
    assert_eq!(message.name, "callback");
    assert_eq!(
        message.payload.message().and_then(|p| p.get("title")),
        Some("Hi")
    );

    let data = events.recv().await.expect("data event");
    assert_eq!(data.name, "data");
    assert_eq!(data.payload.data(), Some(&json!({"route": "inbox"})));
}

#[test]
fn test_payload_json_shapes() {
    let success = EventPayload::DeviceToken {
        device_token: "T1".to_string(),
    };
    assert_eq!(success.to_json(), json!({"deviceToken": "T1"}));

    let error = EventPayload::Error {
        error: "boom".to_string(),
    };
    assert_eq!(error.to_json(), json!({"error": "boom"}));

    let message = EventPayload::Message([("title", "Hi"), ("count", "3")].into_iter().collect());
    assert_eq!(message.to_json(), json!({"title": "Hi", "count": "3"}));

    let data = EventPayload::Data(Some(json!({"nested": {"ids": [1, 2]}})));
    assert_eq!(data.to_json(), json!({"nested": {"ids": [1, 2]}}));
    assert_eq!(EventPayload::Data(None).to_json(), serde_json::Value::Null);
}

#[test]
fn test_channel_names() {
    for channel in EventChannel::ALL {
        assert_eq!(EventChannel::from_event_name(channel.event_name()), Some(channel));
    }
    assert_eq!(EventChannel::from_event_name("message"), Some(EventChannel::Message));
    assert_eq!(EventChannel::from_event_name("bogus"), None);
}
