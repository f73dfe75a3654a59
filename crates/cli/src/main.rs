//! Product catalog CLI - Database migrations and seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run catalog database migrations
//! catalog-cli migrate
//!
//! # Seed variant axes (Color, Size, Style)
//! catalog-cli seed variants
//! catalog-cli seed variants --file path/to/variants.yaml
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

/// Default location of the variant seed file, relative to the workspace root.
const DEFAULT_VARIANT_SEEDS: &str = "crates/cli/seeds/variants.yaml";

#[derive(Parser)]
#[command(name = "catalog-cli")]
#[command(author, version, about = "Product catalog CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed reference data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert variant axes from a YAML file
    Variants {
        /// Path to the seed file
        #[arg(short, long, default_value = DEFAULT_VARIANT_SEEDS)]
        file: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Variants { file } => commands::seed::variants(&file).await?,
        },
    }
    Ok(())
}
