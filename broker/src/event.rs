//! Event types and the declared type hierarchy used for routing.
//!
//! Rust has no runtime reflection over a type's ancestry, so every event type
//! declares its supertype explicitly through [`Event::parent`]. A "derived"
//! event embeds its "base" event as a field and hands out a view of it:
//!
//! ```rust,ignore
//! #[derive(Event)]
//! struct Damage { amount: u32 }
//!
//! #[derive(Event)]
//! struct CriticalDamage {
//!     #[event(parent)]
//!     damage: Damage,
//!     multiplier: f32,
//! }
//! ```
//!
//! Publishing a `CriticalDamage` reaches handlers registered for
//! `CriticalDamage`, then `Damage`, then the universal root [`AnyEvent`].

use std::{
    any::{Any, TypeId},
    fmt,
};

use log::warn;

/// Type-erased access to a value. Implemented for every `'static` type.
#[doc(hidden)]
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Marker trait for publishable event types.
///
/// Events must be:
/// - `'static`: No borrowed data
/// - `Send + Sync`: A publish may happen on any thread
///
/// Implement it by hand or with `#[derive(Event)]`.
pub trait Event: AsAny + Send + Sync + 'static {
    /// The supertype view of this event, if it has one.
    ///
    /// Handlers registered for the parent's type receive the returned value
    /// when this event is published. The chain must be finite.
    fn parent(&self) -> Option<&dyn Event> {
        None
    }
}

/// The universal root of every event hierarchy.
///
/// A handler registered on `AnyEvent` fires for every published event and
/// receives the most specific view, which it can inspect through
/// [`AsAny::as_any`].
pub type AnyEvent = dyn Event;

impl fmt::Debug for AnyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyEvent")
            .field("type", &self.type_name())
            .finish()
    }
}

/// A type handlers can be registered for: any sized [`Event`], or [`AnyEvent`].
pub trait Subject: 'static {
    /// Resolves a published view into `&Self`, if the view holds a `Self`.
    fn view(event: &dyn Event) -> Option<&Self>;
}

impl<E: Event> Subject for E {
    #[inline]
    fn view(event: &dyn Event) -> Option<&Self> {
        event.as_any().downcast_ref::<E>()
    }
}

impl Subject for AnyEvent {
    #[inline]
    fn view(event: &dyn Event) -> Option<&Self> {
        Some(event)
    }
}

/// One step of an event's ancestor chain.
#[derive(Clone, Copy)]
pub(crate) struct Level<'e> {
    /// Registry key of this level.
    pub type_id: TypeId,

    /// The view handed to handlers registered on this level.
    pub view: &'e dyn Event,
}

/// Walks `[exact type, parent, ..., AnyEvent]` for a published event.
///
/// The root level carries the most specific view. A chain that comes back to
/// a type it already visited is cut at the repeat.
pub(crate) fn ancestry(event: &dyn Event) -> Vec<Level<'_>> {
    let mut levels: Vec<Level<'_>> = Vec::with_capacity(4);
    let mut current = Some(event);

    while let Some(view) = current {
        let type_id = Any::type_id(view.as_any());
        if levels.iter().any(|level| level.type_id == type_id) {
            warn!(
                "Event hierarchy of {} revisits {}; ignoring the rest of the chain",
                event.type_name(),
                view.type_name()
            );
            break;
        }
        levels.push(Level { type_id, view });
        current = view.parent();
    }

    levels.push(Level {
        type_id: TypeId::of::<AnyEvent>(),
        view: event,
    });
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Base {
        value: u32,
    }
    impl Event for Base {}

    #[derive(Debug)]
    struct Derived {
        base: Base,
    }
    impl Event for Derived {
        fn parent(&self) -> Option<&dyn Event> {
            Some(&self.base)
        }
    }

    #[derive(Debug)]
    struct MostDerived {
        derived: Derived,
    }
    impl Event for MostDerived {
        fn parent(&self) -> Option<&dyn Event> {
            Some(&self.derived)
        }
    }

    struct Looping;
    impl Event for Looping {
        fn parent(&self) -> Option<&dyn Event> {
            Some(self)
        }
    }

    #[test]
    fn ancestry_of_root_level_event() {
        // Given
        let event = Base { value: 1 };

        // When
        let levels = ancestry(&event);

        // Then
        let ids: Vec<_> = levels.iter().map(|l| l.type_id).collect();
        assert_eq!(ids, vec![TypeId::of::<Base>(), TypeId::of::<AnyEvent>()]);
    }

    #[test]
    fn ancestry_walks_full_chain_most_specific_first() {
        // Given
        let event = MostDerived {
            derived: Derived {
                base: Base { value: 7 },
            },
        };

        // When
        let levels = ancestry(&event);

        // Then
        let ids: Vec<_> = levels.iter().map(|l| l.type_id).collect();
        assert_eq!(
            ids,
            vec![
                TypeId::of::<MostDerived>(),
                TypeId::of::<Derived>(),
                TypeId::of::<Base>(),
                TypeId::of::<AnyEvent>(),
            ]
        );

        // Then - each level hands out the matching view
        let base = Base::view(levels[2].view).unwrap();
        assert_eq!(base, &Base { value: 7 });

        // Then - the root level sees the most specific event
        assert_eq!(levels[3].view.type_name(), std::any::type_name::<MostDerived>());
    }

    #[test]
    fn ancestry_stops_at_cycle() {
        // Given
        let event = Looping;

        // When
        let levels = ancestry(&event);

        // Then
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].type_id, TypeId::of::<Looping>());
        assert_eq!(levels[1].type_id, TypeId::of::<AnyEvent>());
    }

    #[test]
    fn subject_view_downcasts_concrete_types() {
        // Given
        let event = Base { value: 3 };
        let erased: &dyn Event = &event;

        // Then
        assert!(Base::view(erased).is_some());
        assert!(Derived::view(erased).is_none());
        assert!(<AnyEvent as Subject>::view(erased).is_some());
    }
}
