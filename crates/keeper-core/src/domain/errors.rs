//! Processing outcomes reported by consumers through an acknowledger.
//!
//! A consumer either fails a batch as a whole or reports which individual
//! parts failed with a `BatchError`. The preserver uses the latter to resend
//! only the parts that need it.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::ops::ControlFlow;

use thiserror::Error;

use super::message::{Batch, Part};
use crate::error::BoxError;

/// Why a delivered batch was not processed.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The batch failed as a whole.
    #[error("batch processing failed: {0}")]
    Whole(#[source] BoxError),

    /// Some parts failed, each with its own cause.
    #[error(transparent)]
    Parts(#[from] BatchError),
}

impl ProcessingError {
    pub fn whole(err: impl Into<BoxError>) -> Self {
        Self::Whole(err.into())
    }
}

/// Structured per-part failure of a batch.
///
/// Holds the batch as the consumer saw it (usually the tagged copy it was
/// handed) and an error for each failed index.
#[derive(Debug)]
pub struct BatchError {
    cause: BoxError,
    batch: Batch,
    errors: BTreeMap<usize, BoxError>,
}

impl BatchError {
    pub fn new(batch: Batch, cause: impl Into<BoxError>) -> Self {
        Self {
            cause: cause.into(),
            batch,
            errors: BTreeMap::new(),
        }
    }

    /// Mark the part at `index` as failed. Indexes outside the batch are ignored.
    pub fn failed(mut self, index: usize, err: impl Into<BoxError>) -> Self {
        if index < self.batch.len() {
            self.errors.insert(index, err.into());
        }
        self
    }

    /// Number of parts that carry their own error.
    pub fn indexed_errors(&self) -> usize {
        self.errors.len()
    }

    /// Visit every part with its error (if any). Returning `Break` stops the walk.
    pub fn walk_parts<F>(&self, mut f: F)
    where
        F: FnMut(usize, &Part, Option<&(dyn Error + Send + Sync + 'static)>) -> ControlFlow<()>,
    {
        for (index, part) in self.batch.iter().enumerate() {
            let err = self.errors.get(&index).map(|e| e.as_ref());
            if f(index, part, err).is_break() {
                return;
            }
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} of {} parts failed)",
            self.cause,
            self.errors.len(),
            self.batch.len()
        )
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_parts() -> Batch {
        Batch::from_contents(["a", "b", "c"])
    }

    #[test]
    fn counts_only_in_range_errors() {
        let err = BatchError::new(three_parts(), "boom")
            .failed(1, "bad b")
            .failed(7, "out of range");
        assert_eq!(err.indexed_errors(), 1);
    }

    #[test]
    fn walk_visits_every_part_with_its_error() {
        let err = BatchError::new(three_parts(), "boom").failed(2, "bad c");

        let mut seen = Vec::new();
        err.walk_parts(|i, part, e| {
            seen.push((i, part.as_str().into_owned(), e.map(|e| e.to_string())));
            ControlFlow::Continue(())
        });

        assert_eq!(
            seen,
            vec![
                (0, "a".to_string(), None),
                (1, "b".to_string(), None),
                (2, "c".to_string(), Some("bad c".to_string())),
            ]
        );
    }

    #[test]
    fn walk_can_short_circuit() {
        let err = BatchError::new(three_parts(), "boom")
            .failed(0, "x")
            .failed(1, "y");

        let mut visited = 0;
        err.walk_parts(|_, _, _| {
            visited += 1;
            ControlFlow::Break(())
        });
        assert_eq!(visited, 1);
    }

    #[test]
    fn display_mentions_failed_part_count() {
        let err = ProcessingError::from(BatchError::new(three_parts(), "boom").failed(0, "x"));
        assert_eq!(err.to_string(), "boom (1 of 3 parts failed)");

        let whole = ProcessingError::whole("nope");
        assert_eq!(whole.to_string(), "batch processing failed: nope");
    }
}
