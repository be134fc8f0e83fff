use std::sync::Arc;

use parking_lot::Mutex;

use crate::Error;
use crate::EventBus;

#[test]
fn test_publish_invokes_listeners_in_subscription_order() {
    let bus = EventBus::<u32>::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&order);
    bus.subscribe(move |value: &u32| first.lock().push(("first", *value)));
    let second = Arc::clone(&order);
    bus.subscribe(move |value: &u32| second.lock().push(("second", *value)));

    bus.publish(&42);
    bus.publish(&7);

    assert_eq!(
        *order.lock(),
        vec![("first", 42), ("second", 42), ("first", 7), ("second", 7)]
    );
}

#[test]
fn test_unsubscribe_removes_listener() {
    let bus = EventBus::<u32>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let id = bus.subscribe(move |value: &u32| sink.lock().push(*value));

    bus.publish(&1);
    bus.unsubscribe(id).unwrap();
    bus.publish(&2);

    assert_eq!(*seen.lock(), vec![1]);
    assert!(bus.is_empty());
}

#[test]
fn test_unsubscribe_unknown_listener_fails() {
    let bus = EventBus::<u32>::new();
    let id = bus.subscribe(|_| {});
    bus.unsubscribe(id).unwrap();

    let result = bus.unsubscribe(id);
    assert!(matches!(result, Err(Error::ListenerNotFound(_))));
}

#[test]
fn test_listener_unsubscribing_itself_still_gets_this_round() {
    let bus = Arc::new(EventBus::<u32>::new());
    let calls = Arc::new(Mutex::new(0_u32));
    let own_id = Arc::new(Mutex::new(None));

    let bus_ref = Arc::clone(&bus);
    let calls_ref = Arc::clone(&calls);
    let own_id_ref = Arc::clone(&own_id);
    let id = bus.subscribe(move |_: &u32| {
        *calls_ref.lock() += 1;
        let id = own_id_ref.lock().take();
        if let Some(id) = id {
            bus_ref.unsubscribe(id).unwrap();
        }
    });
    *own_id.lock() = Some(id);

    let late = Arc::new(Mutex::new(0_u32));
    let late_ref = Arc::clone(&late);
    bus.subscribe(move |_: &u32| *late_ref.lock() += 1);

    // the self-removing listener is still part of this round's snapshot,
    // and removing it must not skip the listener after it
    bus.publish(&0);
    assert_eq!(*calls.lock(), 1);
    assert_eq!(*late.lock(), 1);

    bus.publish(&0);
    assert_eq!(*calls.lock(), 1);
    assert_eq!(*late.lock(), 2);
    assert_eq!(bus.len(), 1);
}
