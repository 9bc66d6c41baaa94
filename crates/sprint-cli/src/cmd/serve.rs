use anyhow::{anyhow, Result};
use clap::Args;
use sprint_core::config::{ServerConfig, WarnLevel};
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (0 = OS-assigned)
    #[arg(long, env = "SPRINT_PORT")]
    pub port: Option<u16>,

    /// redb database file; records stay in memory when omitted
    #[arg(long, env = "SPRINT_DATABASE")]
    pub database: Option<PathBuf>,

    /// Externally reachable base URL used in negotiated hub URLs
    #[arg(long, env = "SPRINT_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// HMAC secret for hub access tokens
    #[arg(long, env = "SPRINT_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,
}

/// Load the config file (or defaults) and apply command-line/env overrides.
pub fn effective_config(config_path: &Path, args: ServeArgs) -> Result<ServerConfig> {
    let mut config = ServerConfig::load_or_default(config_path)
        .map_err(|e| anyhow!("{}: {e}", config_path.display()))?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(db) = args.database {
        config.database = Some(db);
    }
    if let Some(url) = args.public_url {
        config.public_url = Some(url);
    }
    if let Some(secret) = args.token_secret {
        config.hub.token_secret = Some(secret);
    }
    Ok(config)
}

pub fn run(config_path: &Path, args: ServeArgs) -> Result<()> {
    let config = effective_config(config_path, args)?;

    let mut fatal = Vec::new();
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
            WarnLevel::Error => fatal.push(w.message),
        }
    }
    if !fatal.is_empty() {
        return Err(anyhow!("invalid configuration: {}", fatal.join("; ")));
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
        let actual_port = listener.local_addr()?.port();
        println!("Sprint planning server → http://localhost:{actual_port}");

        tokio::select! {
            res = sprint_server::serve_on(config, listener) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
