//! Receivable queue
//!
//! Pending incoming transfers waiting to be claimed with receive/open
//! blocks, and the serialized worker that claims them.

pub mod ordering;
pub mod queue;

pub use ordering::*;
pub use queue::*;
