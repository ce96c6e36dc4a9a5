//! Application configuration management

use std::env;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port for the health endpoints
    pub port: u16,

    /// Database URL (PostgreSQL)
    pub database_url: String,

    /// Telegram bot token
    pub telegram_bot_token: String,

    /// Operator channel for audit notifications; admin path is skipped
    /// when unset
    pub telegram_admin_chat: Option<String>,

    /// Portal origins
    pub aniworld_base_url: String,
    pub sto_base_url: String,

    /// Minutes between reconciliation sweeps
    pub sweep_interval_minutes: u64,

    /// Maximum number of series processed concurrently within one sweep
    pub sweep_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,

            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .context("TELEGRAM_BOT_TOKEN is required")?,

            telegram_admin_chat: env::var("TELEGRAM_ADMIN_CHAT").ok(),

            aniworld_base_url: env::var("ANIWORLD_BASE_URL")
                .unwrap_or_else(|_| "https://aniworld.to".to_string()),

            sto_base_url: env::var("STO_BASE_URL").unwrap_or_else(|_| "https://s.to".to_string()),

            sweep_interval_minutes: env::var("SWEEP_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid SWEEP_INTERVAL_MINUTES")?,

            sweep_concurrency: env::var("SWEEP_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
        })
    }
}
