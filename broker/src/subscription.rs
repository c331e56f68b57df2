//! Fluent configuration of a single subscription.
//!
//! A [`Subscription`] is obtained from [`Broker::on`] and accumulates options
//! through chained calls. Nothing is registered until a terminal call
//! ([`run`](Subscription::run) or [`trigger`](Subscription::trigger)) consumes
//! the builder, so a builder can never be finalized twice.
//!
//! # Example
//!
//! ```rust,ignore
//! let handle = broker
//!     .on::<Damage>()
//!     .when(|damage| damage.amount > 10)
//!     .with_priority(Priority::High)
//!     .until_event::<LevelCompleted>()
//!     .run(|damage| println!("ouch: {}", damage.amount));
//! ```

use std::{fmt, sync::Arc};

use crate::{
    broker::Broker,
    event::Subject,
    handler::{Handle, Handler},
    key::IdempotencyKey,
    priority::Priority,
};

type BoxedPredicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Builder for a handler on subject type `T`.
///
/// Options are last-write-wins except for stop triggers, which accumulate:
/// every [`until`](Self::until) call adds an independent way for the handler
/// to be unsubscribed.
#[must_use = "a subscription does nothing until `run` or `trigger` is called"]
pub struct Subscription<'b, T: Subject + ?Sized> {
    broker: &'b Broker,
    predicate: Option<BoxedPredicate<T>>,
    priority: Priority,
    once: bool,
    key: Option<IdempotencyKey>,

    /// Handlers whose firing unsubscribes the handler built here.
    stop_triggers: Vec<Handle>,
}

impl<'b, T: Subject + ?Sized> Subscription<'b, T> {
    pub(crate) fn new(broker: &'b Broker) -> Self {
        Self {
            broker,
            predicate: None,
            priority: Priority::default(),
            once: false,
            key: None,
            stop_triggers: Vec::new(),
        }
    }

    /// Only handle subjects for which `predicate` returns `true`.
    ///
    /// Replaces any previous predicate. Combine conditions inside a single
    /// closure when more than one is needed.
    pub fn when(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Unsubscribe the handler the first time it fires.
    ///
    /// The handler is removed before its action runs, so a publish from
    /// inside the action cannot reach it again.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Refuse the registration if a handler holding `key` is already
    /// subscribed.
    ///
    /// A refused handler still gets a [`Handle`]; it simply never fires.
    pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Unsubscribe the handler when `stop` fires.
    ///
    /// `stop` can be any handler, and one handler can stop many others. If
    /// `stop` is one-shot and has already fired, the handler is unsubscribed
    /// as soon as it is registered.
    pub fn until(mut self, stop: &Handle) -> Self {
        self.stop_triggers.push(stop.clone());
        self
    }

    /// Unsubscribe the handler the next time an `S` is published.
    pub fn until_event<S: Subject + ?Sized>(self) -> Self {
        self.until_event_with::<S>(|stop| stop)
    }

    /// Unsubscribe the handler the next time an `S` passing the stop
    /// subscription built by `configure` is published.
    ///
    /// ```rust,ignore
    /// broker
    ///     .on::<Tick>()
    ///     .until_event_with::<Key>(|stop| stop.when(|key| key.code == ESCAPE))
    ///     .run(|tick| update(tick));
    /// ```
    pub fn until_event_with<S: Subject + ?Sized>(
        self,
        configure: impl FnOnce(Subscription<'b, S>) -> Subscription<'b, S>,
    ) -> Self {
        let mut stop = None;
        self.until_event_into(configure, &mut stop)
    }

    /// Like [`until_event_with`](Self::until_event_with), and stores the stop
    /// handler in `stop` so other subscriptions can share it through
    /// [`until`](Self::until).
    ///
    /// The stop handler is one-shot: it fires once and every subscription
    /// depending on it is unsubscribed together.
    pub fn until_event_into<S: Subject + ?Sized>(
        self,
        configure: impl FnOnce(Subscription<'b, S>) -> Subscription<'b, S>,
        stop: &mut Option<Handle>,
    ) -> Self {
        let handle = configure(Subscription::new(self.broker)).once().trigger();
        let this = self.until(&handle);
        *stop = Some(handle);
        this
    }

    /// Registers the handler with `action` and returns its handle.
    pub fn run(self, action: impl Fn(&T) + Send + Sync + 'static) -> Handle {
        let handle = Handle::new(Handler::new::<T, _>(
            self.priority,
            self.predicate,
            action,
            self.once,
            self.key,
        ));

        // Stops are wired before registering so a stop firing on another
        // thread in between is seen by the check below.
        let wired: Vec<(&Handle, u64)> = self
            .stop_triggers
            .iter()
            .map(|stop| {
                let broker = self.broker.downgrade();
                let dependent = Arc::downgrade(&handle.0);
                let firings = stop.0.decorate_dependent(
                    Arc::downgrade(&handle.0),
                    Arc::new(move || {
                        if let (Some(broker), Some(dependent)) =
                            (broker.upgrade(), dependent.upgrade())
                        {
                            broker.unsubscribe(&Handle(dependent));
                        }
                    }),
                );
                (stop, firings)
            })
            .collect();

        if self.broker.subscribe(&handle) {
            let stopped = wired
                .iter()
                .any(|(stop, firings)| stop.0.is_claimed() || stop.0.firings() != *firings);
            if stopped {
                self.broker.unsubscribe(&handle);
            }
        }

        handle
    }

    /// Registers a handler with no action of its own.
    ///
    /// Useful as a dedicated stop signal for [`until`](Self::until).
    pub fn trigger(self) -> Handle {
        self.run(|_| {})
    }
}

impl<T: Subject + ?Sized> fmt::Debug for Subscription<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("subject", &std::any::type_name::<T>())
            .field("filtered", &self.predicate.is_some())
            .field("priority", &self.priority)
            .field("once", &self.once)
            .field("key", &self.key)
            .field("stop_triggers", &self.stop_triggers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::Event;

    #[derive(Event, Debug)]
    struct Tick(u32);

    #[derive(Event, Debug)]
    struct Halt(bool);

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Tick) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_: &Tick| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn nothing_registers_until_finalized() {
        // Given
        let broker = Broker::new();

        // When
        let subscription = broker.on::<Tick>().with_priority(Priority::High).once();

        // Then
        assert_eq!(broker.handler_count::<Tick>(), 0);

        // When
        let handle = subscription.trigger();

        // Then
        assert_eq!(broker.handler_count::<Tick>(), 1);
        assert_eq!(handle.priority(), Priority::High);
        assert!(handle.is_one_time());
    }

    #[test]
    fn last_predicate_wins() {
        // Given
        let broker = Broker::new();
        let (count, action) = counter();

        broker
            .on::<Tick>()
            .when(|tick| tick.0 == 1)
            .when(|tick| tick.0 == 2)
            .run(action);

        // When
        broker.publish(Tick(1));
        broker.publish(Tick(2));

        // Then
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn last_priority_and_key_win() {
        // Given
        let broker = Broker::new();

        // When
        let handle = broker
            .on::<Tick>()
            .with_priority(Priority::Low)
            .with_priority(Priority::Highest)
            .with_idempotency_key("first")
            .with_idempotency_key("second")
            .trigger();

        // Then
        assert_eq!(handle.priority(), Priority::Highest);
        assert_eq!(handle.idempotency_key(), Some(&IdempotencyKey::from("second")));
        assert!(broker.is_key_active("second"));
        assert!(!broker.is_key_active("first"));
    }

    #[test]
    fn until_calls_accumulate() {
        // Given
        let broker = Broker::new();
        let (count, action) = counter();
        let first_stop = broker.on::<Halt>().when(|halt| halt.0).trigger();
        let second_stop = broker.on::<Halt>().when(|halt| !halt.0).trigger();

        let handle = broker
            .on::<Tick>()
            .until(&first_stop)
            .until(&second_stop)
            .run(action);

        // When - the second trigger fires
        broker.publish(Tick(0));
        broker.publish(Halt(false));
        broker.publish(Tick(0));

        // Then
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!broker.is_subscribed(&handle));
    }

    #[test]
    fn until_event_into_hands_back_one_shot_stop_handler() {
        // Given
        let broker = Broker::new();
        let mut stop = None;

        // When
        let handle = broker
            .on::<Tick>()
            .until_event_into::<Halt>(|halt| halt.with_priority(Priority::Low), &mut stop)
            .trigger();

        // Then
        let stop = stop.expect("stop handler is handed back");
        assert!(stop.is_one_time());
        assert_eq!(stop.priority(), Priority::Low);
        assert!(broker.is_subscribed(&stop));
        assert!(broker.is_subscribed(&handle));

        // When
        broker.publish(Halt(true));

        // Then
        assert!(!broker.is_subscribed(&stop));
        assert!(!broker.is_subscribed(&handle));
    }

    #[test]
    fn debug_shows_configuration() {
        let broker = Broker::new();
        let subscription = broker.on::<Tick>().once().with_idempotency_key(7);
        let debug = format!("{subscription:?}");

        assert!(debug.contains("once: true"));
        assert!(debug.contains("IdempotencyKey(7)"));
    }
}
