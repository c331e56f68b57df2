//! Registered handlers and the handles that identify them.
//!
//! A [`Handler`] is created once by a finalized
//! [`Subscription`](crate::Subscription) and never changes afterwards, apart
//! from its decorations: extra no-argument callbacks appended after the
//! action. Decorations are how a stop trigger unsubscribes its dependents.
//!
//! Handlers are shared behind a [`Handle`], which compares and hashes by
//! identity. Two handlers with identical configuration are still distinct.

use std::{
    any::TypeId,
    fmt,
    hash::{Hash, Hasher},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use crate::{event::Event, event::Subject, key::IdempotencyKey, priority::Priority};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

impl Id {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Predicate = Box<dyn Fn(&dyn Event) -> bool + Send + Sync>;
type Action = Box<dyn Fn(&dyn Event) + Send + Sync>;
type Behavior = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
struct Decoration {
    behavior: Behavior,

    /// Handler the behavior acts on, if any. Once that handler is dropped or
    /// retired the decoration has nothing left to do.
    dependent: Option<Weak<Handler>>,
}

impl Decoration {
    fn is_spent(&self) -> bool {
        self.dependent.as_ref().is_some_and(|dependent| {
            dependent
                .upgrade()
                .is_none_or(|dependent| dependent.is_retired())
        })
    }
}

/// A handler bound to one subject type, with its type erased.
pub(crate) struct Handler {
    id: Id,
    subject: TypeId,
    subject_name: &'static str,
    key: Option<IdempotencyKey>,
    priority: Priority,
    once: bool,

    /// Set by the first qualifying dispatch of a one-shot handler.
    claimed: AtomicBool,

    /// Set once the handler has left the registry, or was refused by it.
    /// Handlers are registered at most once, so this never clears.
    retired: AtomicBool,

    /// Number of firings that have collected their decorations.
    firings: AtomicU64,

    predicate: Option<Predicate>,
    action: Action,

    /// Run after `action`, in the order they were added.
    decorations: Mutex<Vec<Decoration>>,
}

impl Handler {
    pub fn new<T, A>(
        priority: Priority,
        predicate: Option<Box<dyn Fn(&T) -> bool + Send + Sync>>,
        action: A,
        once: bool,
        key: Option<IdempotencyKey>,
    ) -> Self
    where
        T: Subject + ?Sized,
        A: Fn(&T) + Send + Sync + 'static,
    {
        let predicate = predicate.map(|predicate| -> Predicate {
            Box::new(move |event: &dyn Event| {
                T::view(event).is_some_and(|subject| predicate(subject))
            })
        });
        let action: Action = Box::new(move |event: &dyn Event| {
            if let Some(subject) = T::view(event) {
                action(subject);
            }
        });

        Self {
            id: Id::next(),
            subject: TypeId::of::<T>(),
            subject_name: std::any::type_name::<T>(),
            key,
            priority,
            once,
            claimed: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            firings: AtomicU64::new(0),
            predicate,
            action,
            decorations: Mutex::new(Vec::new()),
        }
    }

    /// Evaluates the predicate; a handler without one accepts everything.
    pub fn should_handle(&self, event: &dyn Event) -> bool {
        self.predicate
            .as_ref()
            .is_none_or(|predicate| predicate(event))
    }

    /// Marks a one-shot handler as fired.
    ///
    /// Returns `false` if it already fired. Always `true` for handlers that
    /// are not one-shot.
    pub fn claim(&self) -> bool {
        !self.once || !self.claimed.swap(true, Ordering::AcqRel)
    }

    /// Returns `true` if this is a one-shot handler that already fired.
    pub fn is_claimed(&self) -> bool {
        self.once && self.claimed.load(Ordering::Acquire)
    }

    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub fn firings(&self) -> u64 {
        self.firings.load(Ordering::Acquire)
    }

    /// Runs the action, then every decoration.
    pub fn handle(&self, event: &dyn Event) {
        (self.action)(event);

        // Decorations may be appended while this handler runs; those wait
        // for the next firing.
        let decorations = {
            let mut decorations = self.decorations();
            decorations.retain(|decoration| !decoration.is_spent());
            self.firings.fetch_add(1, Ordering::AcqRel);
            decorations.clone()
        };
        for decoration in &decorations {
            (decoration.behavior)();
        }
    }

    pub fn decorate(&self, behavior: Behavior) {
        self.push_decoration(Decoration {
            behavior,
            dependent: None,
        });
    }

    /// Appends `behavior` acting on `dependent`. It is dropped once
    /// `dependent` is gone or retired.
    ///
    /// Returns the firing count observed while appending: any later change
    /// means a firing may have run `behavior` before it could take effect.
    pub fn decorate_dependent(&self, dependent: Weak<Handler>, behavior: Behavior) -> u64 {
        self.push_decoration(Decoration {
            behavior,
            dependent: Some(dependent),
        })
    }

    fn push_decoration(&self, decoration: Decoration) -> u64 {
        let mut decorations = self.decorations();
        decorations.retain(|decoration| !decoration.is_spent());
        decorations.push(decoration);
        self.firings.load(Ordering::Acquire)
    }

    fn decorations(&self) -> MutexGuard<'_, Vec<Decoration>> {
        self.decorations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn decoration_count(&self) -> usize {
        self.decorations().len()
    }
}

/// Opaque reference to a handler created by
/// [`Subscription::run`](crate::Subscription::run).
///
/// Use it to [unsubscribe](crate::Broker::unsubscribe) the handler or as the
/// stop trigger of other subscriptions via
/// [`Subscription::until`](crate::Subscription::until). Cloning is cheap and
/// all clones refer to the same handler.
#[derive(Clone)]
pub struct Handle(pub(crate) Arc<Handler>);

impl Handle {
    pub(crate) fn new(handler: Handler) -> Self {
        Self(Arc::new(handler))
    }

    #[inline]
    pub fn id(&self) -> Id {
        self.0.id
    }

    /// The exact type this handler was registered for.
    #[inline]
    pub fn subject_type(&self) -> TypeId {
        self.0.subject
    }

    #[inline]
    pub fn subject_name(&self) -> &'static str {
        self.0.subject_name
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.0.priority
    }

    #[inline]
    pub fn is_one_time(&self) -> bool {
        self.0.once
    }

    #[inline]
    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.0.key.as_ref()
    }

    /// Appends `behavior` to run after the handler's action every time it
    /// fires. Repeated calls compose; all decorations run in the order they
    /// were added.
    pub fn decorate(&self, behavior: impl Fn() + Send + Sync + 'static) {
        self.0.decorate(Arc::new(behavior));
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.0.id)
            .field("subject", &self.0.subject_name)
            .field("priority", &self.0.priority)
            .field("once", &self.0.once)
            .field("key", &self.0.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[derive(Debug)]
    struct Ping(u32);
    impl Event for Ping {}

    #[derive(Debug)]
    struct Pong;
    impl Event for Pong {}

    fn handler<A>(action: A) -> Handler
    where
        A: Fn(&Ping) + Send + Sync + 'static,
    {
        Handler::new::<Ping, _>(Priority::Normal, None, action, false, None)
    }

    #[test]
    fn handles_are_distinct_by_identity() {
        // Given
        let a = Handle::new(handler(|_| {}));
        let b = Handle::new(handler(|_| {}));

        // Then
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.subject_type(), TypeId::of::<Ping>());
        assert!(a.subject_name().ends_with("Ping"));
    }

    #[test]
    fn missing_predicate_accepts_everything() {
        let handler = handler(|_| {});
        assert!(handler.should_handle(&Ping(0)));
    }

    #[test]
    fn predicate_filters_subjects() {
        // Given
        let handler = Handler::new::<Ping, _>(
            Priority::Normal,
            Some(Box::new(|ping: &Ping| ping.0 > 10)),
            |_| {},
            false,
            None,
        );

        // Then
        assert!(!handler.should_handle(&Ping(3)));
        assert!(handler.should_handle(&Ping(11)));

        // Then - a view of the wrong type never passes
        assert!(!handler.should_handle(&Pong));
    }

    #[test]
    fn decorations_run_after_action_in_order() {
        // Given
        let log = Arc::new(Mutex::new(Vec::new()));
        let action_log = Arc::clone(&log);
        let handle = Handle::new(handler(move |ping| {
            action_log.lock().unwrap().push(format!("action {}", ping.0));
        }));

        for name in ["first", "second"] {
            let log = Arc::clone(&log);
            handle.decorate(move || log.lock().unwrap().push(name.to_string()));
        }

        // When
        handle.0.handle(&Ping(1));
        handle.0.handle(&Ping(2));

        // Then
        assert_eq!(
            *log.lock().unwrap(),
            vec!["action 1", "first", "second", "action 2", "first", "second"]
        );
    }

    #[test]
    fn spent_dependent_decorations_are_pruned() {
        // Given
        let stop = handler(|_| {});
        let live = Arc::new(handler(|_| {}));
        let retired = Arc::new(handler(|_| {}));
        let dropped = Arc::new(handler(|_| {}));

        for dependent in [&live, &retired, &dropped] {
            stop.decorate_dependent(Arc::downgrade(dependent), Arc::new(|| {}));
        }
        stop.decorate(Arc::new(|| {}));

        // When
        retired.retire();
        drop(dropped);
        stop.handle(&Ping(0));

        // Then - plain decorations and live dependents stay
        assert_eq!(stop.decoration_count(), 2);
        assert_eq!(stop.firings(), 1);
    }

    #[test]
    fn decorating_reports_firings_seen() {
        // Given
        let stop = handler(|_| {});
        let dependent = Arc::new(handler(|_| {}));

        // When
        let before = stop.decorate_dependent(Arc::downgrade(&dependent), Arc::new(|| {}));
        stop.handle(&Ping(0));
        let after = stop.decorate_dependent(Arc::downgrade(&dependent), Arc::new(|| {}));

        // Then
        assert_eq!(before, 0);
        assert_eq!(after, 1);
    }

    #[test]
    fn one_shot_claims_once() {
        // Given
        let once = Handler::new::<Ping, _>(Priority::Normal, None, |_| {}, true, None);
        let repeating = handler(|_| {});

        // Then
        assert!(!once.is_claimed());
        assert!(once.claim());
        assert!(!once.claim());
        assert!(once.is_claimed());
        assert!(repeating.claim());
        assert!(repeating.claim());
        assert!(!repeating.is_claimed());
    }

    #[test]
    fn action_ignores_foreign_views() {
        // Given
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // When
        handler.handle(&Pong);
        handler.handle(&Ping(1));

        // Then
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
