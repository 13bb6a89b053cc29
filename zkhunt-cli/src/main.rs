mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zkhunt_core::{ClientConfig, NetworkKind};

#[derive(Parser)]
#[command(name = "zkhunt")]
#[command(about = "ZK Hunt: hide in the jungle, prove you are not where they search")]
#[command(version)]
struct Cli {
    /// Data directory for prey secrets
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the map pool, or one map in full
    Maps {
        /// Map index (0-19)
        index: Option<u8>,
    },
    /// Compute a position commitment
    Commit {
        x: u8,
        y: u8,
        /// Decimal nonce; random when omitted
        nonce: Option<String>,
    },
    /// Play a local match between two bots
    Play {
        /// Rounds each player spends as hunter
        #[arg(long, default_value_t = 1)]
        rounds: u32,
        /// Seed for spawns and bot choices
        #[arg(long)]
        seed: Option<u64>,
        /// Encrypt stored prey secrets with this passphrase
        #[arg(long)]
        passphrase: Option<String>,
        /// Network profile recorded in the client config
        #[arg(long, default_value = "local")]
        network: NetworkKind,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "zkhunt={},zkhunt_core={},zkhunt_game={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("zkhunt")
    });

    let result = match cli.command {
        Commands::Maps { index } => commands::show_maps(index),
        Commands::Commit { x, y, nonce } => commands::show_commitment(x, y, nonce.as_deref()),
        Commands::Play {
            rounds,
            seed,
            passphrase,
            network,
        } => {
            let mut config = ClientConfig::new(network).with_data_dir(&data_dir);
            config.secret_passphrase = passphrase;
            commands::play::play_match(&config, rounds, seed).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
