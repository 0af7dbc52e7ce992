//! Block construction and submission
//!
//! A block moves `Draft -> Validated -> Signed -> WorkAttached -> Submitted`
//! and ends `Confirmed` or `Rejected`. Nothing reaches the node unless the
//! frontier it extends has been re-fetched and verified.

pub mod builder;
pub mod operation;

pub use builder::*;
pub use operation::*;
