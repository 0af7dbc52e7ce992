use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::shared::error::WalletError;

// Basic types for wallet operations
pub type Address = String;
pub type WalletId = String;
/// Amounts in the smallest ledger unit ("raw")
pub type Raw = u128;

macro_rules! fixed_bytes {
    ($name:ident, $what:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const ZERO: $name = $name([0u8; 32]);

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            pub fn to_hex(&self) -> String {
                hex::encode_upper(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = WalletError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.len() != 64 {
                    return Err(WalletError::validation(format!(
                        "{} must be 64 hex characters, got {}",
                        $what,
                        s.len()
                    )));
                }
                let mut out = [0u8; 32];
                hex::decode_to_slice(s, &mut out)?;
                Ok($name(out))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(BlockHash, "block hash");
fixed_bytes!(PublicKey, "public key");

impl From<PublicKey> for BlockHash {
    /// An unopened account's work root is its public key.
    fn from(key: PublicKey) -> Self {
        BlockHash(key.0)
    }
}

/// Proof-of-work strength. `Full` is required for send/change,
/// `Reduced` suffices for receive/open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Reduced,
    Full,
}

impl DifficultyTier {
    /// A token generated at `self` is acceptable for a request at `required`.
    pub fn satisfies(self, required: DifficultyTier) -> bool {
        self >= required
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfflineReason {
    Unreachable,
    RateLimited,
}

/// Node status published by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "reason")]
pub enum NodeStatus {
    Loading,
    Online,
    Offline(OfflineReason),
}

impl NodeStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, NodeStatus::Online)
    }
}

/// Automatic receive policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceivePolicy {
    Manual,
    #[default]
    Amount,
    Date,
}

impl FromStr for ReceivePolicy {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(ReceivePolicy::Manual),
            "amount" => Ok(ReceivePolicy::Amount),
            "date" => Ok(ReceivePolicy::Date),
            other => Err(WalletError::config(format!("Unknown receive policy: {}", other))),
        }
    }
}

/// Endpoint selection mode for the backend gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    #[default]
    Auto,
    Custom,
}

/// Where proof-of-work comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkSource {
    #[default]
    Local,
    Node,
}

/// State block subtype as declared to the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockSubtype {
    Send,
    Receive,
    Open,
    Change,
    Epoch,
}

impl BlockSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockSubtype::Send => "send",
            BlockSubtype::Receive => "receive",
            BlockSubtype::Open => "open",
            BlockSubtype::Change => "change",
            BlockSubtype::Epoch => "epoch",
        }
    }

    /// Work tier the network demands for this kind of block
    pub fn required_tier(&self) -> DifficultyTier {
        match self {
            BlockSubtype::Receive | BlockSubtype::Open | BlockSubtype::Epoch => {
                DifficultyTier::Reduced
            }
            BlockSubtype::Send | BlockSubtype::Change => DifficultyTier::Full,
        }
    }
}

impl FromStr for BlockSubtype {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send" => Ok(BlockSubtype::Send),
            "receive" => Ok(BlockSubtype::Receive),
            "open" => Ok(BlockSubtype::Open),
            "change" => Ok(BlockSubtype::Change),
            "epoch" => Ok(BlockSubtype::Epoch),
            other => Err(WalletError::validation(format!("Unknown block subtype: {}", other))),
        }
    }
}

/// How the wallet's private material is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletKind {
    #[serde(rename = "seed")]
    Seed,
    #[serde(rename = "ledger")]
    Ledger,
    #[serde(rename = "privateKey")]
    PrivateKey,
}

/// A ledger node the gateway can talk to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoint {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl NodeEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), token: None }
    }

    pub fn with_token(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { url: url.into(), token: Some(token.into()) }
    }
}

/// Serde adapter for raw amounts, which travel as decimal strings
pub mod raw_string {
    use super::Raw;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Raw, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Raw, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<Raw>().map_err(serde::de::Error::custom)
    }
}
