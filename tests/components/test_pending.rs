//! Tests for components/pending.rs

use std::sync::Arc;

use kodegen_native_push::components::callbacks::{CallbackDispatcher, EventChannel};
use kodegen_native_push::components::handler;
use kodegen_native_push::components::lifecycle::AppVisibility;
use kodegen_native_push::components::pending::PendingDataStore;
use serde_json::json;

use crate::support::Recorder;

fn dispatcher_with_recorder() -> (CallbackDispatcher, Recorder) {
    let dispatcher = CallbackDispatcher::default();
    let recorder = Recorder::new();
    dispatcher.set_handler(EventChannel::Data, recorder.handler());
    (dispatcher, recorder)
}

#[test]
fn test_set_in_background_marks_pending() {
    let store = PendingDataStore::new();
    store.set(Some(json!({"id": 7})), AppVisibility::Background);

    assert!(store.is_pending());
    assert_eq!(store.get(), Some(json!({"id": 7})));
}

#[test]
fn test_set_in_foreground_does_not_mark_pending() {
    let (dispatcher, recorder) = dispatcher_with_recorder();
    let store = PendingDataStore::new();
    store.set(Some(json!("value")), AppVisibility::Foreground);

    assert!(!store.is_pending());
    assert!(!store.flush_if_pending(&dispatcher));
    assert_eq!(recorder.count(), 0);
    assert_eq!(store.get(), Some(json!("value")));
}

#[test]
fn test_set_none_in_background_is_not_pending() {
    let store = PendingDataStore::new();
    store.set(Some(json!(1)), AppVisibility::Background);
    store.set(None, AppVisibility::Background);

    assert!(!store.is_pending());
    assert_eq!(store.get(), None);
}

#[test]
fn test_set_json_null_in_background_is_not_pending() {
    let (dispatcher, recorder) = dispatcher_with_recorder();
    let store = PendingDataStore::new();
    store.set(Some(json!({"id": 7})), AppVisibility::Background);
    store.set(Some(json!(null)), AppVisibility::Background);

    assert!(!store.is_pending());
    assert!(!store.flush_if_pending(&dispatcher));
    assert_eq!(recorder.count(), 0);
}

#[test]
fn test_flush_fires_exactly_once() {
    let (dispatcher, recorder) = dispatcher_with_recorder();
    let store = PendingDataStore::new();
    store.set(Some(json!({"id": 7})), AppVisibility::Background);

    assert!(store.flush_if_pending(&dispatcher));
    assert!(!store.flush_if_pending(&dispatcher));

    assert_eq!(recorder.count(), 1);
    assert_eq!(recorder.events()[0].data(), Some(&json!({"id": 7})));
    // Reading does not consume the value
    assert_eq!(store.get(), Some(json!({"id": 7})));
}

#[test]
fn test_latest_value_wins() {
    let (dispatcher, recorder) = dispatcher_with_recorder();
    let store = PendingDataStore::new();
    store.set(Some(json!("first")), AppVisibility::Background);
    store.set(Some(json!("second")), AppVisibility::Background);

    store.flush_if_pending(&dispatcher);
    assert_eq!(recorder.events()[0].data(), Some(&json!("second")));
}

#[test]
fn test_handler_may_set_data_during_flush() {
    let store = Arc::new(PendingDataStore::new());
    let dispatcher = CallbackDispatcher::default();
    let inner = store.clone();
    dispatcher.set_handler(
        EventChannel::Data,
        handler(move |_| inner.set(Some(json!("again")), AppVisibility::Background)),
    );

    store.set(Some(json!("first")), AppVisibility::Background);
    assert!(store.flush_if_pending(&dispatcher));

    // The update made from inside the handler is not lost
    assert!(store.is_pending());
    assert_eq!(store.get(), Some(json!("again")));
}

#[test]
fn test_concurrent_set_and_flush_never_double_fire() {
    let store = Arc::new(PendingDataStore::new());
    let dispatcher = Arc::new(CallbackDispatcher::default());
    let recorder = Recorder::new();
    dispatcher.set_handler(EventChannel::Data, recorder.handler());

    store.set(Some(json!(0)), AppVisibility::Background);

    let flushers: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let dispatcher = dispatcher.clone();
            std::thread::spawn(move || store.flush_if_pending(&dispatcher))
        })
        .collect();

    let fired = flushers
        .into_iter()
        .map(|t| t.join().expect("flusher thread"))
        .filter(|fired| *fired)
        .count();

    assert_eq!(fired, 1);
    assert_eq!(recorder.count(), 1);
}
