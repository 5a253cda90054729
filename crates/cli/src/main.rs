//! Lunaria CLI - database migrations and catalog seeding.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending storefront migrations
//! ln-cli migrate
//!
//! # Upsert catalog products from a YAML file
//! ln-cli seed products catalog/products.yaml
//!
//! # Upsert blog articles from a YAML file
//! ln-cli seed articles content/articles.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `LUNARIA_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ln-cli")]
#[command(author, version, about = "Lunaria CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending storefront database migrations
    Migrate,
    /// Upsert catalog data from YAML files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert products, keyed by slug
    Products {
        /// YAML file containing a list of products
        file: PathBuf,
    },
    /// Upsert blog articles, keyed by slug
    Articles {
        /// YAML file containing a list of articles
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
            SeedTarget::Articles { file } => commands::seed::articles(&file).await?,
        },
    }
    Ok(())
}
