//! Queue module: resend entries, the resend FIFO and backoff.

mod backoff;
mod entry;
mod resend;

pub use backoff::{Backoff, BackoffPolicy};
pub use entry::ResendEntry;
pub use resend::{QueueSnapshot, ResendQueue};
