use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::engine::AlertThresholds;
use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Zero disables the background alert scheduler.
    pub alert_interval_secs: u64,
    pub thresholds: AlertThresholds,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://studytrack.db?mode=rwc".to_string());
        let bind_addr = parse_var("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 8080)))?;
        let alert_interval_secs = parse_var("ALERT_INTERVAL_SECS", 300)?;

        let defaults = AlertThresholds::default();
        let thresholds = AlertThresholds {
            exam_soon_days: parse_var("EXAM_SOON_DAYS", defaults.exam_soon_days)?,
            urgent_review_days: parse_var("URGENT_REVIEW_DAYS", defaults.urgent_review_days)?,
            urgent_progress_below: parse_var("URGENT_PROGRESS_BELOW", defaults.urgent_progress_below)?,
            neglect_after_days: parse_var("NEGLECT_AFTER_DAYS", defaults.neglect_after_days)?,
        };

        Ok(Self {
            database_url,
            bind_addr,
            alert_interval_secs,
            thresholds,
        })
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}
