//! Command-line interface.
//!
//! - no subcommand / `serve` - run the HTTP server
//! - `import-products --file <csv>` - bulk-load products from a CSV export
//! - `config check` - validate the configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(author, version, about = "Product and order API with cookie-token sessions", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "STOREFRONT_CONFIG", default_value = "storefront.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve,

    /// Import products from a CSV file (header row, then id,name,price)
    ImportProducts {
        /// CSV file to read
        #[arg(short, long, default_value = "static/data/products.csv")]
        file: PathBuf,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Load the database and import a product CSV into it
pub async fn import_products(config: &Config, file: &Path) -> Result<()> {
    let db = crate::db::init(&config.database).await?;

    println!("Migrating CSV data from {}...", file.display());
    let count = crate::db::import_products_csv(&db, file)
        .await
        .with_context(|| format!("Failed to import {}", file.display()))?;
    println!("Imported {} products", count);

    db.close().await;
    Ok(())
}

/// Print a summary of the effective configuration
pub fn config_check(path: &Path, config: &Config) -> Result<()> {
    config.validate()?;

    println!("Configuration OK ({})", path.display());
    println!("  listen:        {}", config.listen_addr());
    println!("  database:      {}", config.database.url);
    println!("  token ttl:     {}s", config.auth.token_ttl_seconds);
    println!(
        "  rate limit:    {} ({}/hour, {}/day, exempt: {:?})",
        if config.rate_limit.enabled { "enabled" } else { "disabled" },
        config.rate_limit.requests_per_hour,
        config.rate_limit.requests_per_day,
        config.rate_limit.exempt_paths
    );
    if config.cors.allowed_origins.is_empty() {
        println!("  cors:          any origin");
    } else {
        println!("  cors:          {:?}", config.cors.allowed_origins);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_runs_server() {
        let cli = Cli::try_parse_from(["storefront"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("storefront.toml"));
    }

    #[test]
    fn test_import_products_args() {
        let cli = Cli::try_parse_from(["storefront", "import-products", "--file", "data.csv"]).unwrap();
        match cli.command {
            Some(Commands::ImportProducts { file }) => assert_eq!(file, PathBuf::from("data.csv")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_check_args() {
        let cli = Cli::try_parse_from(["storefront", "-c", "alt.toml", "config", "check"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert!(matches!(cli.command, Some(Commands::Config(ConfigCommands::Check))));
    }

    #[tokio::test]
    async fn test_import_products_into_memory_db() {
        let mut config = Config::default();
        config.database.url = "sqlite::memory:".to_string();

        let path = std::env::temp_dir().join(format!("storefront-cli-{}.csv", std::process::id()));
        tokio::fs::write(&path, "id,name,price\n1,Widget,9.99\n").await.unwrap();

        let result = import_products(&config, &path).await;
        let _ = tokio::fs::remove_file(&path).await;
        assert!(result.is_ok());
    }
}
