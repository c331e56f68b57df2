//! Idempotency keys.
//!
//! An [`IdempotencyKey`] wraps an arbitrary hashable value. The broker keeps the
//! set of keys held by registered handlers and refuses a second registration
//! with a key that is already in use.

use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

trait KeyValue: Send + Sync + fmt::Debug {
    fn value_any(&self) -> &dyn Any;

    fn eq_key(&self, other: &dyn KeyValue) -> bool;

    fn hash_key(&self, state: &mut dyn Hasher);
}

impl<V> KeyValue for V
where
    V: Hash + Eq + fmt::Debug + Send + Sync + 'static,
{
    fn value_any(&self) -> &dyn Any {
        self
    }

    fn eq_key(&self, other: &dyn KeyValue) -> bool {
        other
            .value_any()
            .downcast_ref::<V>()
            .is_some_and(|other| other == self)
    }

    fn hash_key(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<V>().hash(&mut state);
        self.hash(&mut state);
    }
}

/// An opaque, cheaply clonable idempotency key.
///
/// Keys compare equal only when they wrap the same concrete type with equal
/// values, so `123_i32` and `123_u64` are different keys.
#[derive(Clone)]
pub struct IdempotencyKey(Arc<dyn KeyValue>);

impl IdempotencyKey {
    /// Wraps any hashable value as a key.
    pub fn new<V>(value: V) -> Self
    where
        V: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(value))
    }

    /// Returns the wrapped value if it is a `V`.
    pub fn downcast_ref<V: 'static>(&self) -> Option<&V> {
        self.0.value_any().downcast_ref::<V>()
    }
}

impl PartialEq for IdempotencyKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_key(other.0.as_ref())
    }
}

impl Eq for IdempotencyKey {}

impl Hash for IdempotencyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let state: &mut dyn Hasher = state;
        self.0.hash_key(state);
    }
}

impl fmt::Debug for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IdempotencyKey").field(&self.0).finish()
    }
}

macro_rules! key_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for IdempotencyKey {
                #[inline]
                fn from(value: $ty) -> Self {
                    Self::new(value)
                }
            }
        )*
    };
}

key_from!(
    &'static str,
    String,
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    TypeId,
);
