// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

use super::*;
use crate::event::{Meta, Payload};
use parking_lot::Mutex;

fn sync_event(barrier_id: &str) -> Event {
    Event {
        meta: Meta::default(),
        payload: Payload::SyncPointReached {
            barrier_id: barrier_id.to_string(),
        },
    }
}

#[test]
fn delivers_to_all_matching_subscribers() {
    let bus = Bus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s1 = seen.clone();
    let _a = bus.subscribe(move |e| s1.lock().push(("a", e.payload.name())));
    let s2 = seen.clone();
    let _b = bus.subscribe(move |e| s2.lock().push(("b", e.payload.name())));

    bus.publish(&sync_event("x"));
    let got = seen.lock().clone();
    assert_eq!(got.len(), 2);
}

#[test]
fn predicate_filters_events() {
    let bus = Bus::new();
    let seen = Arc::new(Mutex::new(0usize));

    let s = seen.clone();
    let _sub = bus.subscribe_filtered(
        move |_| *s.lock() += 1,
        |e| matches!(&e.payload, Payload::SyncPointReached { barrier_id } if barrier_id == "yes"),
    );

    bus.publish(&sync_event("no"));
    bus.publish(&sync_event("yes"));
    bus.publish(&sync_event("no"));
    assert_eq!(*seen.lock(), 1);
}

#[test]
fn unsubscribe_stops_delivery() {
    let bus = Bus::new();
    let seen = Arc::new(Mutex::new(0usize));

    let s = seen.clone();
    let sub = bus.subscribe(move |_| *s.lock() += 1);

    bus.publish(&sync_event("x"));
    sub.unsubscribe();
    bus.publish(&sync_event("x"));
    assert_eq!(*seen.lock(), 1);
}

#[test]
fn unsubscribe_is_idempotent() {
    let bus = Bus::new();
    let seen = Arc::new(Mutex::new(0usize));

    let s = seen.clone();
    let sub = bus.subscribe(move |_| *s.lock() += 1);
    sub.unsubscribe();
    sub.unsubscribe();

    bus.publish(&sync_event("x"));
    assert_eq!(*seen.lock(), 0);
}

#[test]
fn unsubscribe_after_bus_dropped_is_noop() {
    let bus = Bus::new();
    let sub = bus.subscribe(|_| {});
    drop(bus);
    sub.unsubscribe();
}

#[test]
fn subscribing_during_publish_does_not_deadlock() {
    // Publish snapshots subscriptions before invoking handlers, so a
    // handler may register new subscriptions on the same bus.
    let bus = Bus::new();
    let bus2 = bus.clone();
    let added = Arc::new(Mutex::new(Vec::new()));
    let added2 = added.clone();
    let _sub = bus.subscribe(move |_| {
        let sub = bus2.subscribe(|_| {});
        added2.lock().push(sub);
    });
    bus.publish(&sync_event("x"));
    assert_eq!(added.lock().len(), 1);
}
