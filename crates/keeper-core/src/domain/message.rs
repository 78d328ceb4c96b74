//! Message parts and batches.
//!
//! Copies are shallow: cloning a `Part` or taking a `Batch::shallow_copy`
//! duplicates the container and the tracking tags, never the content bytes.
//! Content is immutable (`Arc<[u8]>`), so a batch kept for redelivery cannot be
//! altered by downstream code holding a delivered copy.

use std::borrow::Cow;
use std::sync::Arc;

use super::ids::GroupId;

/// Tag attached to a tracked copy of a part.
///
/// Records which tracking group produced the copy and the position the part
/// had in the batch that group was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartTag {
    pub group: GroupId,
    pub index: usize,
}

/// One opaque message part.
#[derive(Debug, Clone)]
pub struct Part {
    content: Arc<[u8]>,
    tags: Vec<PartTag>,
}

impl Part {
    pub fn new(content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            content: content.into(),
            tags: Vec::new(),
        }
    }

    /// Content as text (lossy), mostly for logs.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// True when both parts point at the same content allocation.
    pub fn shares_content_with(&self, other: &Part) -> bool {
        Arc::ptr_eq(&self.content, &other.content)
    }

    pub(crate) fn tags(&self) -> &[PartTag] {
        &self.tags
    }

    pub(crate) fn with_tag(&self, tag: PartTag) -> Self {
        let mut copy = self.clone();
        copy.tags.push(tag);
        copy
    }
}

impl From<&str> for Part {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<Vec<u8>> for Part {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// An ordered group of parts delivered as one unit.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    parts: Vec<Part>,
}

impl Batch {
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    /// Build a batch from raw contents, one part per item.
    pub fn from_contents<I, P>(contents: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        Self {
            parts: contents.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Part> {
        self.parts.iter()
    }

    pub fn push(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Structural copy: new container, shared part contents.
    pub fn shallow_copy(&self) -> Self {
        self.clone()
    }

    /// All part contents as lossy strings (handy for logs and assertions).
    pub fn texts(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.as_str().into_owned()).collect()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Part;
    type IntoIter = std::slice::Iter<'a, Part>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.iter()
    }
}

impl FromIterator<Part> for Batch {
    fn from_iter<I: IntoIterator<Item = Part>>(iter: I) -> Self {
        Self {
            parts: iter.into_iter().collect(),
        }
    }
}
