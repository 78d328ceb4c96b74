//! Impls - in-process implementations of the ports (development and tests).
//!
//! Production sources live in their own crates and only need to implement
//! `ports::AsyncSource`.

pub mod memory;

pub use self::memory::{AckRecord, InMemorySource};
