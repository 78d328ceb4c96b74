//! Domain model: message parts and batches, ids, part tracking and
//! processing outcomes.

pub mod errors;
pub mod ids;
pub mod message;
pub mod tracking;

pub use errors::{BatchError, ProcessingError};
pub use ids::{BatchId, GroupId};
pub use message::{Batch, Part};
pub use tracking::SortGroup;
