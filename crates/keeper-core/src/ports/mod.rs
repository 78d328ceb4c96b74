//! Ports - the seams between the preserver and the outside world.
//!
//! - `AsyncSource`: what the preserver wraps and what it exposes
//! - `Acknowledger`: the completion callback handed out with every batch

pub mod ack;
pub mod source;

pub use self::ack::{AckHandle, Acknowledger, ack_fn, noop_ack};
pub use self::source::AsyncSource;
