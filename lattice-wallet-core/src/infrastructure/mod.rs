//! Infrastructure layer
//!
//! Configuration loading, logging setup and the file-backed wallet store.

pub mod config;
pub mod logger;
pub mod platform;

pub use self::config::*;
pub use logger::*;
pub use platform::*;
