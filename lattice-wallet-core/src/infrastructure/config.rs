//! Engine configuration
//!
//! Defaults, then an optional `lattice-wallet.toml`, then `LATTICE_WALLET_*`
//! environment variables (after `.env` is loaded).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::blocks::BuilderSettings;
use crate::core::crypto::keys::is_valid_address;
use crate::core::feed::FeedSettings;
use crate::core::gateway::GatewaySettings;
use crate::core::ledger::LedgerSettings;
use crate::core::work::{WorkSettings, WorkThresholds};
use crate::shared::constants::*;
use crate::shared::error::WalletError;
use crate::shared::types::{NodeEndpoint, PublicKey, ReceivePolicy, ServerMode, WorkSource};
use crate::shared::utils::parse_raw;
use crate::shared::WalletResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub server_mode: ServerMode,
    pub endpoints: Vec<String>,
    pub custom_endpoint: Option<String>,
    pub custom_token: Option<String>,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_ms: u64,

    pub feed_url: String,
    pub feed_reconnect_base_ms: u64,
    pub feed_reconnect_ceiling_ms: u64,
    pub feed_keepalive_ms: u64,

    pub receive_policy: ReceivePolicy,
    /// Raw decimal string
    pub minimum_receive: String,
    pub receive_batch_delay_ms: u64,

    pub work_source: WorkSource,
    /// 16 hex characters each
    pub work_threshold_full: String,
    pub work_threshold_reduced: String,
    pub remote_work_timeout_ms: u64,

    pub default_representative: String,
    pub upgrade_signers: Vec<String>,

    pub data_dir: PathBuf,
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            server_mode: ServerMode::Auto,
            endpoints: DEFAULT_NODE_ENDPOINTS.iter().map(|url| url.to_string()).collect(),
            custom_endpoint: None,
            custom_token: None,
            max_attempts: MAX_REQUEST_ATTEMPTS,
            retry_delay_ms: REQUEST_RETRY_DELAY_MS,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            feed_url: DEFAULT_FEED_URL.to_string(),
            feed_reconnect_base_ms: FEED_RECONNECT_BASE_MS,
            feed_reconnect_ceiling_ms: FEED_RECONNECT_CEILING_MS,
            feed_keepalive_ms: FEED_KEEPALIVE_INTERVAL_MS,
            receive_policy: ReceivePolicy::default(),
            minimum_receive: DEFAULT_MINIMUM_RECEIVE_RAW.to_string(),
            receive_batch_delay_ms: RECEIVE_BATCH_DELAY_MS,
            work_source: WorkSource::default(),
            work_threshold_full: format!("{:016x}", FULL_WORK_THRESHOLD),
            work_threshold_reduced: format!("{:016x}", REDUCED_WORK_THRESHOLD),
            remote_work_timeout_ms: REMOTE_WORK_TIMEOUT_MS,
            default_representative: DEFAULT_REPRESENTATIVE.to_string(),
            upgrade_signers: vec![DEFAULT_UPGRADE_SIGNER.to_string()],
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            log_level: "info".to_string(),
        }
    }
}

impl CoreConfig {
    /// Load from `.env`, the optional config file and the process environment
    pub fn load() -> WalletResult<Self> {
        dotenv::dotenv().ok();
        Self::from_sources(File::with_name(CONFIG_FILE_NAME).required(false), Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("endpoints")
            .with_list_parse_key("upgrade_signers")
    }

    fn from_sources(file: File<config::FileSourceFile, config::FileFormat>, env: Environment) -> WalletResult<Self> {
        let config: CoreConfig = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> WalletResult<()> {
        if self.max_attempts == 0 {
            return Err(WalletError::config("max_attempts must be at least 1"));
        }
        if self.feed_reconnect_base_ms > self.feed_reconnect_ceiling_ms {
            return Err(WalletError::config("Feed reconnect base exceeds its ceiling"));
        }
        if !is_valid_address(&self.default_representative) {
            return Err(WalletError::config(format!(
                "Invalid default representative: {}",
                self.default_representative
            )));
        }
        self.gateway_settings()?;
        self.ledger_settings()?;
        self.work_settings()?;
        self.builder_settings()?;
        Ok(())
    }

    pub fn gateway_settings(&self) -> WalletResult<GatewaySettings> {
        let custom_endpoint = self.custom_endpoint.as_ref().map(|url| match &self.custom_token {
            Some(token) => NodeEndpoint::with_token(url.clone(), token.clone()),
            None => NodeEndpoint::new(url.clone()),
        });
        match self.server_mode {
            ServerMode::Custom if custom_endpoint.is_none() => {
                return Err(WalletError::config("Custom server mode requires custom_endpoint"));
            }
            ServerMode::Auto if self.endpoints.is_empty() => {
                return Err(WalletError::config("Automatic server mode requires at least one endpoint"));
            }
            _ => {}
        }
        Ok(GatewaySettings {
            mode: self.server_mode,
            endpoints: self.endpoints.iter().map(NodeEndpoint::new).collect(),
            custom_endpoint,
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            url: self.feed_url.clone(),
            reconnect_base: Duration::from_millis(self.feed_reconnect_base_ms),
            reconnect_ceiling: Duration::from_millis(self.feed_reconnect_ceiling_ms),
            keepalive_interval: Duration::from_millis(self.feed_keepalive_ms),
            ..FeedSettings::default()
        }
    }

    pub fn ledger_settings(&self) -> WalletResult<LedgerSettings> {
        let minimum_receive = parse_raw(&self.minimum_receive)
            .map_err(|e| WalletError::config(format!("minimum_receive: {}", e)))?;
        Ok(LedgerSettings {
            receive_policy: self.receive_policy,
            minimum_receive,
            receive_batch_delay: Duration::from_millis(self.receive_batch_delay_ms),
            ..LedgerSettings::default()
        })
    }

    pub fn work_settings(&self) -> WalletResult<WorkSettings> {
        let thresholds = WorkThresholds {
            full: parse_threshold("work_threshold_full", &self.work_threshold_full)?,
            reduced: parse_threshold("work_threshold_reduced", &self.work_threshold_reduced)?,
        };
        if thresholds.reduced > thresholds.full {
            return Err(WalletError::config("Reduced work threshold exceeds the full threshold"));
        }
        Ok(WorkSettings {
            source: self.work_source,
            thresholds,
            remote_timeout: Duration::from_millis(self.remote_work_timeout_ms),
        })
    }

    pub fn builder_settings(&self) -> WalletResult<BuilderSettings> {
        let upgrade_signers = self
            .upgrade_signers
            .iter()
            .map(|key| {
                key.parse::<PublicKey>()
                    .map_err(|e| WalletError::config(format!("Invalid upgrade signer {}: {}", key, e)))
            })
            .collect::<WalletResult<Vec<_>>>()?;
        Ok(BuilderSettings {
            default_representative: self.default_representative.clone(),
            upgrade_signers,
        })
    }
}

fn parse_threshold(name: &str, value: &str) -> WalletResult<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| WalletError::config(format!("{} is not a hex threshold: {}", name, e)))
}
