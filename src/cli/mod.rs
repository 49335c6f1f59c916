//! Command-line interface.
//!
//! With no subcommand the binary starts the server. `config check` loads and
//! validates the configuration (file plus environment) without starting it.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, Overrides};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "bistro")]
#[command(author, version, about = "Backend for the Bistro restaurant ordering app", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "bistro.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Document store connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Secret used to sign session tokens
    #[arg(long, env = "ACCESS_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration and print the effective settings
    Check,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port,
            database_url: self.database_url.clone(),
            token_secret: self.token_secret.clone(),
            log_level: self.log_level.clone(),
        }
    }

    /// Load the config file and apply environment/flag overrides.
    pub fn load_config(&self) -> Result<Config> {
        Ok(Config::load(&self.config)?.apply(self.overrides()))
    }
}

/// Print the effective configuration, flagging what would break at runtime.
pub fn check_config(config: &Config) -> Result<()> {
    println!("Configuration OK");
    println!("  listen:          {}", config.listen_address());
    println!("  database:        {}", config.database.url);
    println!("  max connections: {}", config.database.max_connections);
    println!("  token ttl:       {}s", config.auth.token_ttl_secs);
    println!("  log level:       {}", config.logging.level);

    if config.auth.secret().is_some() {
        println!("  token secret:    set");
    } else {
        println!("  token secret:    MISSING (set ACCESS_TOKEN_SECRET)");
        anyhow::bail!("no token secret configured");
    }

    Ok(())
}
