//! Central registry and dispatcher for all handlers.
//!
//! This module provides [`Broker`], which owns every registered handler and
//! the set of idempotency keys in use. It handles subscription, removal, and
//! synchronous dispatch of published events.
//!
//! # Overview
//!
//! - **Registration**: [`Broker::on`] starts a [`Subscription`] builder; the
//!   handler is registered under its exact subject type when the builder is
//!   finalized
//! - **Hierarchy**: publishing an event reaches handlers for its own type, every
//!   declared ancestor, and [`AnyEvent`](crate::AnyEvent)
//! - **Ordering**: handlers run by ascending [`Priority`](crate::Priority)
//!
//! # Dispatch
//!
//! A publish takes a snapshot of the matching handlers before invoking any of
//! them. Handlers may subscribe, unsubscribe, or publish from inside their
//! actions; those changes only affect later publishes. For equal priorities,
//! handlers for more specific types run first, then in registration order.
//!
//! # Example
//!
//! ```rust,ignore
//! use rusty_broker::{Broker, Event, Priority};
//!
//! #[derive(Event)]
//! struct Damage { amount: u32 }
//!
//! let broker = Broker::new();
//!
//! broker
//!     .on::<Damage>()
//!     .when(|damage| damage.amount > 0)
//!     .with_priority(Priority::High)
//!     .run(|damage| println!("took {} damage", damage.amount));
//!
//! broker.publish(Damage { amount: 50 });
//! ```

use std::{
    any::TypeId,
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use log::{debug, trace};

use crate::{
    event::{Event, Subject, ancestry},
    handler::Handle,
    key::IdempotencyKey,
    lookup::Lookup,
    subscription::Subscription,
};

#[derive(Default)]
struct State {
    /// Registered handlers, keyed by their exact subject type.
    handlers: Lookup<TypeId, Handle>,

    /// Keys held by registered handlers.
    keys: HashSet<IdempotencyKey>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
}

/// Synchronous publish/subscribe dispatcher.
///
/// `Broker` is a cheap handle: clones share the same registry. Handlers that
/// need to publish or manage subscriptions from inside their action capture a
/// clone (or a [`WeakBroker`] to avoid keeping the registry alive).
///
/// # Thread Safety
///
/// `Broker` is `Send + Sync`. The registry and the key set sit behind one
/// mutex, held for subscribe, unsubscribe, and the snapshot step of a
/// publish. Handlers always run with the lock released, so calling back into
/// the broker from a handler never deadlocks. Publishes from different
/// threads are not ordered relative to each other.
#[derive(Clone, Default)]
pub struct Broker {
    shared: Arc<Shared>,
}

/// A non-owning reference to a [`Broker`].
#[derive(Clone)]
pub struct WeakBroker {
    shared: Weak<Shared>,
}

impl WeakBroker {
    /// Returns the broker if it is still alive.
    pub fn upgrade(&self) -> Option<Broker> {
        self.shared.upgrade().map(|shared| Broker { shared })
    }
}

impl fmt::Debug for WeakBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBroker")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl Broker {
    /// Creates a broker with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downgrade(&self) -> WeakBroker {
        WeakBroker {
            shared: Arc::downgrade(&self.shared),
        }
    }

    // Handlers never run under this lock, so a panic cannot leave the
    // registry half-updated.
    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a subscription for subject type `T`.
    ///
    /// Nothing is registered until the returned builder is finalized.
    pub fn on<T: Subject + ?Sized>(&self) -> Subscription<'_, T> {
        Subscription::new(self)
    }

    /// Registers `handle` under its subject type.
    ///
    /// Returns `false`, leaving the registry untouched, if the handler's
    /// idempotency key is already held by a registered handler.
    pub(crate) fn subscribe(&self, handle: &Handle) -> bool {
        let mut state = self.state();

        if let Some(key) = handle.idempotency_key() {
            if !state.keys.insert(key.clone()) {
                debug!(
                    "Dropping handler {} for {}: idempotency key {:?} is already in use",
                    handle.id(),
                    handle.subject_name(),
                    key
                );
                handle.0.retire();
                return false;
            }
        }

        state.handlers.add(handle.subject_type(), handle.clone());
        debug!(
            "Subscribed handler {} for {} ({} priority)",
            handle.id(),
            handle.subject_name(),
            handle.priority()
        );
        true
    }

    /// Removes a handler.
    ///
    /// `None`, handlers that were already removed, and handlers that were
    /// never registered because of their idempotency key are all ignored.
    ///
    /// ```rust,ignore
    /// broker.unsubscribe(&handle);
    /// broker.unsubscribe(maybe_handle.as_ref());
    /// ```
    pub fn unsubscribe<'h>(&self, handle: impl Into<Option<&'h Handle>>) {
        let Some(handle) = handle.into() else {
            return;
        };

        let mut state = self.state();
        if !state.handlers.remove(&handle.subject_type(), handle) {
            return;
        }
        handle.0.retire();
        if let Some(key) = handle.idempotency_key() {
            state.keys.remove(key);
        }
        drop(state);

        debug!(
            "Unsubscribed handler {} for {}",
            handle.id(),
            handle.subject_name()
        );
    }

    /// Publishes `event` to every matching handler and gives it back.
    pub fn publish<E: Event>(&self, event: E) -> E {
        self.publish_dyn(&event);
        event
    }

    /// Publishes an already type-erased event.
    ///
    /// Routing uses the event's concrete type, exactly as [`publish`](Self::publish)
    /// would for the same value.
    pub fn publish_dyn(&self, event: &dyn Event) {
        let levels = ancestry(event);

        let mut snapshot = Vec::new();
        {
            let state = self.state();
            for level in &levels {
                for handle in state.handlers.get(&level.type_id) {
                    snapshot.push((handle.clone(), level.view));
                }
            }
        }

        // Stable: ties keep chain order, then registration order.
        snapshot.sort_by_key(|(handle, _)| handle.priority());

        let mut fired = 0;
        for (handle, view) in &snapshot {
            let handler = &handle.0;
            if !handler.should_handle(*view) {
                continue;
            }
            if handle.is_one_time() {
                if !handler.claim() {
                    continue;
                }
                self.unsubscribe(handle);
            }
            handler.handle(*view);
            fired += 1;
        }

        trace!(
            "Published {}: {} of {} handler(s) fired",
            event.type_name(),
            fired,
            snapshot.len()
        );
    }

    /// Returns `true` if `handle` is currently registered.
    pub fn is_subscribed(&self, handle: &Handle) -> bool {
        self.state()
            .handlers
            .contains(&handle.subject_type(), handle)
    }

    /// Number of handlers registered for exactly `T` (ancestors not included).
    pub fn handler_count<T: Subject + ?Sized>(&self) -> usize {
        self.state().handlers.len(&TypeId::of::<T>())
    }

    /// Returns `true` if a registered handler holds `key`.
    pub fn is_key_active(&self, key: impl Into<IdempotencyKey>) -> bool {
        self.state().keys.contains(&key.into())
    }

    /// Unsubscribes every handler registered for exactly `T` and frees their
    /// idempotency keys. Returns how many handlers were removed.
    pub fn clear<T: Subject + ?Sized>(&self) -> usize {
        let mut state = self.state();
        let removed = state.handlers.clear_key(&TypeId::of::<T>());
        for handle in &removed {
            handle.0.retire();
            if let Some(key) = handle.idempotency_key() {
                state.keys.remove(key);
            }
        }
        drop(state);

        debug!(
            "Cleared {} handler(s) for {}",
            removed.len(),
            std::any::type_name::<T>()
        );
        removed.len()
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Broker")
            .field("active_keys", &state.keys.len())
            .finish_non_exhaustive()
    }
}
