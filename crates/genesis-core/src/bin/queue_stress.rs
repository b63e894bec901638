//! Stress test for the genesis handoff queue and order keys
//!
//! Usage: `queue-stress [config.yaml]`
//!
//! Without an argument the config is read from the default genesis config
//! directory (`stress.yaml`), falling back to built-in defaults. Set
//! `RUST_LOG=debug` for queue-level output.

use anyhow::{bail, Result};
use genesis_core::config::{default_config_path, load_config, StressConfig, STRESS_CONFIG_FILE};
use genesis_core::stress::{order_key_growth, run_queue_stress};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| default_config_path(STRESS_CONFIG_FILE));
    let config: StressConfig = load_config(&config_path);
    config.validate()?;
    log::info!("queue-stress: {:?}", config);

    let report = run_queue_stress(&config)?;
    let growth = order_key_growth(config.order_key_batch);

    println!(
        "queue: {} items, {:.0} items/s, lost {}, duplicated {}, out of order {}",
        report.items,
        report.items_per_second(),
        report.lost,
        report.duplicated,
        report.out_of_order
    );
    println!(
        "order keys ({} per batch): multi {} digits, append {} digits, split {} digits",
        growth.batch, growth.multi_magnitude, growth.append_magnitude, growth.split_magnitude
    );

    if !report.is_clean() {
        bail!("queue handoff lost, duplicated or reordered items");
    }
    Ok(())
}
