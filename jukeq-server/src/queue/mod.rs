//! Request queue core
//!
//! **Responsibilities:**
//! - Queue mutations (enqueue, status transitions, promote-to-top, cancel)
//! - Position reconciliation after a pending request is cancelled
//! - Queue queries (ordered listings, stats)

pub mod query;
pub mod store;

pub use query::{QueueFilter, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use store::QueueStore;
