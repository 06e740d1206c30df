//! Nonito CLI - Database migrations and catalog seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! nonito migrate
//!
//! # Upsert products and fabrics from a YAML file
//! nonito seed catalog.yaml
//!
//! # Validate a seed file without touching the database
//! nonito seed catalog.yaml --dry-run
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Upsert the catalog from YAML

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "nonito")]
#[command(author, version, about = "Nonito CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Upsert products, fabrics and their links from a YAML file
    Seed {
        /// Path to the YAML seed file
        file: String,

        /// Validate the file only
        #[arg(long)]
        dry_run: bool,
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { file, dry_run } => commands::seed::catalog(&file, dry_run).await?,
    }
    Ok(())
}
