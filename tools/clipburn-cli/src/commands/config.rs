//! Show the effective configuration.

use clipburn_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, write: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if write {
        config.save()?;
        println!("Wrote {}", config_file_path().display());
    }

    Ok(())
}
