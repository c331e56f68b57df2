//! Synchronous, in-process publish/subscribe.
//!
//! Register handlers for event types through a fluent [`Subscription`]
//! builder and [`publish`](Broker::publish) events to run every matching
//! handler, ordered by [`Priority`].
//!
//! ```rust,ignore
//! use rusty_broker::{Broker, Event};
//!
//! #[derive(Event)]
//! struct Connected { peer: u32 }
//!
//! #[derive(Event)]
//! struct Shutdown;
//!
//! let broker = Broker::new();
//! broker
//!     .on::<Connected>()
//!     .until_event::<Shutdown>()
//!     .run(|event| println!("peer {} connected", event.peer));
//!
//! broker.publish(Connected { peer: 7 });
//! broker.publish(Shutdown);
//! broker.publish(Connected { peer: 8 }); // no longer handled
//! ```

// Lets `#[derive(Event)]` name `::rusty_broker` from inside this crate too.
extern crate self as rusty_broker;

mod broker;
pub mod event;
mod handler;
mod key;
pub mod logging;
mod lookup;
mod priority;
mod subscription;

pub use broker::{Broker, WeakBroker};
pub use event::{AnyEvent, Event, Subject};
pub use handler::{Handle, Id as HandlerId};
pub use key::IdempotencyKey;
pub use priority::Priority;
pub use subscription::Subscription;

pub use rusty_broker_macros::Event;
