use anyhow::Context;
use lattice_wallet_core::infrastructure::CoreConfig;
use lattice_wallet_core::shared::types::ServerMode;

fn main() -> anyhow::Result<()> {
    let config = CoreConfig::load().context("Invalid configuration")?;

    println!("Lattice Wallet Core Configuration:\n");
    match config.server_mode {
        ServerMode::Auto => {
            println!("  Server Mode: auto");
            for (i, url) in config.endpoints.iter().enumerate() {
                println!("  Endpoint {}: {}", i + 1, url);
            }
        }
        ServerMode::Custom => {
            println!("  Server Mode: custom");
            println!("  Custom Endpoint: {}", config.custom_endpoint.as_deref().unwrap_or("(not set)"));
            println!("  Custom Token: {}", if config.custom_token.is_some() { "(set)" } else { "(not set)" });
        }
    }
    println!("  Max Attempts: {}", config.max_attempts);
    println!("  Retry Delay: {} ms", config.retry_delay_ms);
    println!("  Feed URL: {}", config.feed_url);
    println!("  Receive Policy: {:?}", config.receive_policy);
    println!("  Minimum Receive: {} raw", config.minimum_receive);
    println!("  Work Source: {:?}", config.work_source);
    println!("  Work Thresholds: full {} / reduced {}", config.work_threshold_full, config.work_threshold_reduced);
    println!("  Default Representative: {}", config.default_representative);
    println!("  Upgrade Signers: {}", config.upgrade_signers.join(", "));
    println!("  Data Directory: {}", config.data_dir.display());
    println!("  Log Level: {}", config.log_level);
    Ok(())
}
