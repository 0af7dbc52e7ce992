//! Constants for the wallet core
//!
//! This module contains all constants used throughout the wallet core.

// Wallet constants
pub const SEED_SIZE: usize = 32;
pub const PRIVATE_KEY_SIZE: usize = 32;
pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;
pub const HASH_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const SALT_SIZE: usize = 16;

// Address encoding
pub const ADDRESS_PREFIX: &str = "nano_";
pub const LEGACY_ADDRESS_PREFIX: &str = "xrb_";
/// 52 characters of key material plus an 8 character checksum
pub const ADDRESS_BODY_LENGTH: usize = 60;

/// Preamble for state block hashing: 31 zero bytes followed by 6
pub const STATE_BLOCK_PREAMBLE: [u8; 32] = {
    let mut p = [0u8; 32];
    p[31] = 6;
    p
};

// Proof-of-work thresholds
pub const FULL_WORK_THRESHOLD: u64 = 0xfffffff800000000;
pub const REDUCED_WORK_THRESHOLD: u64 = 0xfffffe0000000000;
/// Work tokens travel as 16 hex characters
pub const WORK_HEX_LENGTH: usize = 16;
pub const REMOTE_WORK_TIMEOUT_MS: u64 = 30_000;

// Gateway
pub const MAX_REQUEST_ATTEMPTS: u32 = 10;
pub const REQUEST_RETRY_DELAY_MS: u64 = 1_000;
pub const REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const HTTP_TOO_MANY_REQUESTS: u16 = 429;

// Realtime feed
pub const FEED_MAX_QUEUED_COMMANDS: usize = 3;
pub const FEED_RECONNECT_BASE_MS: u64 = 5_000;
pub const FEED_RECONNECT_CEILING_MS: u64 = 60_000;
pub const FEED_KEEPALIVE_INTERVAL_MS: u64 = 30_000;
pub const FEED_CONFIRMATION_TOPIC: &str = "confirmation";

// Receivable handling
pub const RECEIVE_BATCH_DELAY_MS: u64 = 500;
/// Consecutive failures after which an entry is parked until explicit user action
pub const MAX_RECEIVE_ATTEMPTS: u32 = 3;
/// 0.000001 in the 10^30 unit, the default minimum for auto-receive
pub const DEFAULT_MINIMUM_RECEIVE_RAW: u128 = 1_000_000_000_000_000_000_000_000;
pub const RECEIVABLE_FETCH_COUNT: u32 = 100;

// Event channel capacity
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// Storage
pub const WALLET_FILE_EXTENSION: &str = "wallet.json";
pub const DEFAULT_DATA_DIR: &str = ".lattice-wallet";
pub const CONFIG_FILE_NAME: &str = "lattice-wallet";
pub const ENV_PREFIX: &str = "LATTICE_WALLET";

pub const DEFAULT_NODE_ENDPOINTS: &[&str] = &[
    "https://rpc.nano.to",
    "https://proxy.nanos.cc/proxy",
    "https://node.somenano.com/proxy",
];
pub const DEFAULT_FEED_URL: &str = "wss://ws.nanos.cc";
/// Representative assigned to newly opened accounts unless configured
pub const DEFAULT_REPRESENTATIVE: &str =
    "nano_3t6k35gi95xu6tergt6p69ck76ogmitsa8mnijtpxm9fkcm736xtoncuohr3";

/// Key of the protocol-upgrade (epoch) signer trusted out of the box
pub const DEFAULT_UPGRADE_SIGNER: &str =
    "E89208DD038FBB269987689621D52292AE9C35941A7484756ECCED92A65093BA";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_are_ordered() {
        assert!(FULL_WORK_THRESHOLD > REDUCED_WORK_THRESHOLD);
    }

    #[test]
    fn test_preamble() {
        assert_eq!(STATE_BLOCK_PREAMBLE[31], 6);
        assert!(STATE_BLOCK_PREAMBLE[..31].iter().all(|b| *b == 0));
    }
}
