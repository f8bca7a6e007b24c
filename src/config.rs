use std::time::Duration;

use anyhow::Context;

/// Default backpressure ceiling for the payment v1 path.
pub const DEFAULT_MAX_CONCURRENT_PAYMENTS: usize = 8;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_concurrent_payments: usize,
    pub shutdown_grace: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            max_concurrent_payments: std::env::var("PAYMENT_MAX_CONCURRENT")
                .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENT_PAYMENTS.to_string())
                .parse()
                .context("PAYMENT_MAX_CONCURRENT must be a positive integer")?,
            shutdown_grace: Duration::from_secs(
                std::env::var("SHUTDOWN_GRACE_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .context("SHUTDOWN_GRACE_SECS must be a number of seconds")?,
            ),
        })
    }
}
