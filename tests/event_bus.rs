use std::time::Duration;

use citeweave::event_bus::{Event, EventBus, EventEmitter, MemorySink, STREAM_END_SCOPE};

#[tokio::test]
async fn memory_sink_captures_published_events_in_order() {
    let sink = MemorySink::new();
    let snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);
    bus.listen_for_events();

    let emitter = bus.get_emitter();
    emitter.emit(Event::stage_message("s1", "searching", "hit core")).unwrap();
    emitter.emit(Event::stage_message("s1", "searching", "hit arxiv")).unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    bus.stop_listener().await;

    let events = snapshot.snapshot();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].scope_label(), Some("searching"));
}

#[tokio::test]
async fn stopping_without_events_is_a_noop() {
    let bus = EventBus::with_sink(MemorySink::new());
    bus.listen_for_events();
    bus.stop_listener().await;
}

#[tokio::test]
async fn subscriber_sees_events_published_after_it_subscribes() {
    let bus = EventBus::default();
    let mut stream = bus.subscribe();

    let emitter = bus.get_emitter();
    emitter.emit(Event::stage_message("s1", STREAM_END_SCOPE, "complete")).unwrap();

    let received = stream.recv().await.expect("event delivered");
    assert_eq!(received.scope_label(), Some(STREAM_END_SCOPE));
}

#[tokio::test]
async fn two_subscribers_each_receive_every_event() {
    let bus = EventBus::default();
    let mut first = bus.subscribe();
    let mut second = bus.subscribe();

    bus.get_emitter().emit(Event::stage_message("s1", "writing", "draft ready")).unwrap();

    assert_eq!(first.recv().await.unwrap().scope_label(), Some("writing"));
    assert_eq!(second.recv().await.unwrap().scope_label(), Some("writing"));
}
