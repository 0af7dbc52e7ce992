//! Block signing
//!
//! Software wallets sign locally once unlocked; hardware wallets forward
//! requests over a device transport and may answer with a denial.

pub mod block_signer;
pub mod hardware_signer;
pub mod software_signer;

pub use block_signer::*;
pub use hardware_signer::*;
pub use software_signer::*;
