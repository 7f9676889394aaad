//! Concurrency tests: the registry's maps are shared across threads and the
//! broker may dispatch concurrently with application-side calls.

use serde_json::json;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use submux::{MemoryConnection, PubSub};

fn engine() -> PubSub<MemoryConnection> {
    PubSub::new(MemoryConnection::new())
}

#[test]
fn test_concurrent_subscribes_create_one_broker_subscription() {
    let pubsub = engine();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let pubsub = pubsub.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                pubsub.subscribe("hot-topic", Arc::new(|_| {}), None).unwrap()
            })
        })
        .collect();

    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Check-then-subscribe is atomic: one physical subscription, ever.
    assert_eq!(pubsub.connection().subscribe_calls(), 1);
    assert_eq!(pubsub.connection().active_subscriptions("hot-topic"), 1);
    assert_eq!(pubsub.subscription_count(), threads);

    // All ids are distinct.
    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), threads);

    for id in ids {
        pubsub.unsubscribe(id).unwrap();
    }
    assert_eq!(pubsub.connection().unsubscribe_calls(), 1);
}

#[test]
fn test_publish_concurrent_with_unsubscribe_stays_consistent() {
    let pubsub = engine();
    let ids: Vec<_> = (0..50)
        .map(|_| pubsub.subscribe("churn", Arc::new(|_| {}), None).unwrap())
        .collect();

    let publisher = pubsub.clone();
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let stop_flag = stop.clone();
    let publishing = thread::spawn(move || {
        while !stop_flag.load(std::sync::atomic::Ordering::SeqCst) {
            publisher.publish("churn", &json!({"tick": 1})).unwrap();
        }
    });

    for id in ids {
        pubsub.unsubscribe(id).unwrap();
    }
    stop.store(true, std::sync::atomic::Ordering::SeqCst);
    publishing.join().unwrap();

    assert_eq!(pubsub.subscription_count(), 0);
    assert_eq!(pubsub.connection().active_subscriptions("churn"), 0);
    // Publishing into the now-empty topic still succeeds.
    pubsub.publish("churn", &json!({"tick": 2})).unwrap();
}

#[test]
fn test_blocked_stream_consumer_wakes_on_close_from_another_thread() {
    let pubsub = engine();
    let stream = Arc::new(pubsub.stream("idle").unwrap());

    let closer = stream.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        closer.close();
    });

    // Blocks with nothing published, then resolves with end-of-sequence.
    assert_eq!(stream.next(), None);
    handle.join().unwrap();

    assert!(stream.is_closed());
    assert_eq!(pubsub.connection().active_subscriptions("idle"), 0);
}

#[test]
fn test_listeners_added_during_dispatch_see_later_messages() {
    let pubsub = engine();
    let late_seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    // The first listener registers a second one from inside dispatch.
    let engine_handle = pubsub.clone();
    let sink = late_seen.clone();
    let registered = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let registered_flag = registered.clone();
    pubsub
        .subscribe(
            "growing",
            Arc::new(move |_| {
                if !registered_flag.swap(true, std::sync::atomic::Ordering::SeqCst) {
                    let sink = sink.clone();
                    engine_handle
                        .subscribe("growing", Arc::new(move |payload| sink.lock().push(payload)), None)
                        .unwrap();
                }
            }),
            None,
        )
        .unwrap();

    pubsub.publish("growing", &json!(1)).unwrap();
    // Once the subscribe returned, subsequent messages are guaranteed.
    pubsub.publish("growing", &json!(2)).unwrap();

    assert_eq!(*late_seen.lock(), vec![json!(2)]);
}
