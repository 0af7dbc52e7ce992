//! Logging setup
//!
//! Everything logs through the `log` facade; `env_logger` is installed once.
//! `RUST_LOG` takes precedence over the configured level.

use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_logging(level: &str) {
    INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(level));
        let result = env_logger::Builder::new()
            .parse_filters(&filter)
            .format_timestamp_millis()
            .try_init();
        if let Err(e) = result {
            eprintln!("Logger already installed: {}", e);
        }
    });
}

fn default_filter(level: &str) -> String {
    let level = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        "off" => "off",
        _ => "info",
    };
    format!("lattice_wallet_core={}", level)
}
