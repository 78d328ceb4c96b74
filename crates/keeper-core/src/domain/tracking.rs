//! Tracking facility: correlate parts of a delivered batch back to their
//! original positions.
//!
//! `SortGroup::new` returns tagged shallow copies of a batch. Downstream code
//! may reorder, filter or clone those parts freely; as long as a part still
//! carries the group's tag, `index_of` recovers where it came from.

use super::ids::GroupId;
use super::message::{Batch, Part, PartTag};

#[derive(Debug, Clone, Copy)]
pub struct SortGroup {
    id: GroupId,
    len: usize,
}

impl SortGroup {
    /// Create a group for `batch` and return it with the tagged copy.
    pub fn new(batch: &Batch) -> (Self, Batch) {
        let id = GroupId::generate();
        let tagged = batch
            .iter()
            .enumerate()
            .map(|(index, part)| part.with_tag(PartTag { group: id, index }))
            .collect();
        (
            Self {
                id,
                len: batch.len(),
            },
            tagged,
        )
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Original index of `part`, if it was tagged by this group.
    ///
    /// The most recent tag wins when a part was tagged by the same group more
    /// than once.
    pub fn index_of(&self, part: &Part) -> Option<usize> {
        part.tags()
            .iter()
            .rev()
            .find(|tag| tag.group == self.id)
            .map(|tag| tag.index)
            .filter(|index| *index < self.len)
    }
}
