// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Process-local typed pub/sub.
//!
//! Publish snapshots the subscription set under the read lock, evaluates
//! each subscription's predicates, and invokes matching handlers
//! synchronously on the publishing task. A slow subscriber slows the
//! publisher; there is no internal queueing.

use crate::event::Event;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;
pub type Predicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

struct Subscription {
    handler: Handler,
    predicates: Vec<Predicate>,
}

#[derive(Default)]
struct Subscriptions {
    next_id: u64,
    by_id: HashMap<u64, Arc<Subscription>>,
}

/// In-process event broker.
///
/// Cheap to clone; clones share the subscription set.
#[derive(Clone, Default)]
pub struct Bus {
    subscriptions: Arc<RwLock<Subscriptions>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every subscription whose predicates all pass.
    pub fn publish(&self, event: &Event) {
        let snapshot: Vec<Arc<Subscription>> = {
            let subs = self.subscriptions.read();
            subs.by_id.values().cloned().collect()
        };
        let mut delivered = 0usize;
        let mut filtered = 0usize;
        for sub in snapshot {
            if sub.predicates.iter().all(|p| p(event)) {
                (sub.handler)(event);
                delivered += 1;
            } else {
                filtered += 1;
            }
        }
        tracing::trace!(
            event = event.payload.name(),
            sequence = event.meta.sequence,
            delivered,
            filtered,
            "published event"
        );
    }

    /// Registers `handler` for every event.
    pub fn subscribe<F>(&self, handler: F) -> Unsubscribe
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(Arc::new(handler), Vec::new())
    }

    /// Registers `handler` for events matching `predicate`.
    pub fn subscribe_filtered<F, P>(&self, handler: F, predicate: P) -> Unsubscribe
    where
        F: Fn(&Event) + Send + Sync + 'static,
        P: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.register(Arc::new(handler), vec![Arc::new(predicate)])
    }

    fn register(&self, handler: Handler, predicates: Vec<Predicate>) -> Unsubscribe {
        let id = {
            let mut subs = self.subscriptions.write();
            let id = subs.next_id;
            subs.next_id += 1;
            subs.by_id.insert(id, Arc::new(Subscription { handler, predicates }));
            id
        };
        Unsubscribe {
            id,
            subscriptions: Arc::downgrade(&self.subscriptions),
        }
    }
}

/// Handle that removes a subscription from its [`Bus`].
///
/// Holds only a weak back-reference to the subscription set, so dropping
/// the bus is never kept alive by outstanding handles. Unsubscribing is
/// idempotent, and a no-op once the bus is gone.
pub struct Unsubscribe {
    id: u64,
    subscriptions: Weak<RwLock<Subscriptions>>,
}

impl Unsubscribe {
    pub fn unsubscribe(&self) {
        if let Some(subs) = self.subscriptions.upgrade() {
            subs.write().by_id.remove(&self.id);
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
