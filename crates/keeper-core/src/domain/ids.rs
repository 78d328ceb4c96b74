//! Domain identifiers (strongly-typed ULID ids).
//!
//! `Id<T>` carries a phantom marker so a `GroupId` can never be passed where a
//! `BatchId` is expected, while both share one implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for id kinds. Provides the prefix used by `Display`.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed identifier.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self {
            ulid: Ulid::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for tracking groups (one per tagged delivery of a multi-part batch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Group {}

impl IdMarker for Group {
    fn prefix() -> &'static str {
        "group-"
    }
}

/// Marker for batches minted by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceBatch {}

impl IdMarker for SourceBatch {
    fn prefix() -> &'static str {
        "batch-"
    }
}

/// Identifier of a tracking group.
pub type GroupId = Id<Group>;

/// Identifier of a batch as produced by a source.
pub type BatchId = Id<SourceBatch>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_marker_prefix() {
        let group = GroupId::generate();
        let batch = BatchId::generate();

        assert!(group.to_string().starts_with("group-"));
        assert!(batch.to_string().starts_with("batch-"));
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = GroupId::generate();
        let b = GroupId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn phantom_marker_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<GroupId>(), size_of::<Ulid>());
        assert_eq!(size_of::<BatchId>(), 16);
    }
}
