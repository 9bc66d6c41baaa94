use anyhow::{anyhow, Result};
use clap::Subcommand;
use sprint_core::config::{ServerConfig, WarnLevel};
use sprint_core::hub::generate_secret;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Print the effective config with validation findings
    Show,
    /// Write a default config file with a fresh token secret
    Init,
}

pub fn run(config_path: &Path, subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show => show(config_path),
        ConfigSubcommand::Init => init(config_path),
    }
}

fn show(config_path: &Path) -> Result<()> {
    let mut config = ServerConfig::load_or_default(config_path)
        .map_err(|e| anyhow!("{}: {e}", config_path.display()))?;
    let warnings = config.validate();
    if config.hub.token_secret.is_some() {
        config.hub.token_secret = Some("<redacted>".into());
    }
    print!("{}", serde_yaml::to_string(&config)?);
    for w in warnings {
        let tag = match w.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        println!("# {tag}: {}", w.message);
    }
    Ok(())
}

fn init(config_path: &Path) -> Result<()> {
    let mut config = ServerConfig::default();
    config.hub.token_secret = Some(generate_secret());
    let data = serde_yaml::to_string(&config)?;
    let written = sprint_core::io::write_if_missing(config_path, data.as_bytes())
        .map_err(|e| anyhow!("{e}"))?;
    if written {
        println!("wrote {}", config_path.display());
    } else {
        println!("{} already exists; left unchanged", config_path.display());
    }
    Ok(())
}
