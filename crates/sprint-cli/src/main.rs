mod cmd;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, serve::ServeArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sprint",
    about = "Sprint planning backend: store estimates and broadcast them live",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (YAML). Defaults apply when the file does not exist.
    #[arg(
        long,
        global = true,
        env = "SPRINT_CONFIG",
        default_value = sprint_core::config::DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server and broadcast hub
    Serve(ServeArgs),

    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Serve(args) => cmd::serve::run(&cli.config, args),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
