//! Log sinks for embedding applications.
//!
//! The broker logs through the `log` facade: subscriptions, drops and removals
//! at `debug`, dispatch summaries at `trace`, and malformed event hierarchies
//! at `warn`. Any `log` backend works; [`ChannelLogger`] is provided for
//! applications that drain records on their own thread.

mod channel;

pub use channel::{ChannelLogger, LogMessage};
