//! Engine configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;

/// A variable was set but could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{name} has invalid value {value:?}: {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub reason: String,
}

/// Tunables for the event processor, delivery and scheduler.
///
/// | Env Var                            | Default |
/// |------------------------------------|---------|
/// | `EVENT_WORKERS`                    | `8`     |
/// | `NOTICE_POLL_MS`                   | `500`   |
/// | `SWEEP_BATCH_SIZE`                 | `500`   |
/// | `CHANNEL_TIMEOUT_SECS`             | `10`    |
/// | `BULK_CONCURRENCY`                 | `16`    |
/// | `LOW_STOCK_INTERVAL_SECS`          | `300`   |
/// | `OVERDUE_INVOICE_INTERVAL_SECS`    | `3600`  |
/// | `SCHEDULED_DISPATCH_INTERVAL_SECS` | `60`    |
/// | `ANNOUNCEMENT_INTERVAL_SECS`       | `60`    |
/// | `BROADCAST_WATCHDOG_INTERVAL_SECS` | `300`   |
/// | `RETENTION_DAYS`                   | `90`    |
/// | `RETENTION_CLEANUP_AT`             | `03:00` |
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Events processed concurrently.
    pub event_workers: usize,
    /// How long the processor waits for a notice before re-checking for
    /// shutdown.
    pub notice_poll: Duration,
    /// Unprocessed events loaded per sweep.
    pub sweep_batch_size: i64,
    /// Upper bound on a single channel send.
    pub channel_timeout: Duration,
    /// Users delivered to concurrently in a bulk send.
    pub bulk_concurrency: usize,
    pub low_stock_interval: Duration,
    pub overdue_invoice_interval: Duration,
    pub scheduled_dispatch_interval: Duration,
    pub announcement_interval: Duration,
    pub broadcast_watchdog_interval: Duration,
    pub retention_days: i64,
    /// UTC wall-clock time of the daily retention run.
    pub retention_cleanup_at: NaiveTime,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_workers: 8,
            notice_poll: Duration::from_millis(500),
            sweep_batch_size: 500,
            channel_timeout: Duration::from_secs(10),
            bulk_concurrency: 16,
            low_stock_interval: Duration::from_secs(300),
            overdue_invoice_interval: Duration::from_secs(3600),
            scheduled_dispatch_interval: Duration::from_secs(60),
            announcement_interval: Duration::from_secs(60),
            broadcast_watchdog_interval: Duration::from_secs(300),
            retention_days: 90,
            retention_cleanup_at: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default(),
        }
    }
}

impl EngineConfig {
    /// Load from the process environment; unset variables keep their default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to read variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |name, default: Duration| -> Result<Duration, ConfigError> {
            Ok(parse_var(&lookup, name)?.map_or(default, Duration::from_secs))
        };

        let retention_cleanup_at = match lookup("RETENTION_CLEANUP_AT") {
            Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| ConfigError {
                name: "RETENTION_CLEANUP_AT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.retention_cleanup_at,
        };

        let config = Self {
            event_workers: parse_var(&lookup, "EVENT_WORKERS")?.unwrap_or(defaults.event_workers),
            notice_poll: parse_var(&lookup, "NOTICE_POLL_MS")?
                .map_or(defaults.notice_poll, Duration::from_millis),
            sweep_batch_size: parse_var(&lookup, "SWEEP_BATCH_SIZE")?
                .unwrap_or(defaults.sweep_batch_size),
            channel_timeout: secs("CHANNEL_TIMEOUT_SECS", defaults.channel_timeout)?,
            bulk_concurrency: parse_var(&lookup, "BULK_CONCURRENCY")?
                .unwrap_or(defaults.bulk_concurrency),
            low_stock_interval: secs("LOW_STOCK_INTERVAL_SECS", defaults.low_stock_interval)?,
            overdue_invoice_interval: secs(
                "OVERDUE_INVOICE_INTERVAL_SECS",
                defaults.overdue_invoice_interval,
            )?,
            scheduled_dispatch_interval: secs(
                "SCHEDULED_DISPATCH_INTERVAL_SECS",
                defaults.scheduled_dispatch_interval,
            )?,
            announcement_interval: secs("ANNOUNCEMENT_INTERVAL_SECS", defaults.announcement_interval)?,
            broadcast_watchdog_interval: secs(
                "BROADCAST_WATCHDOG_INTERVAL_SECS",
                defaults.broadcast_watchdog_interval,
            )?,
            retention_days: parse_var(&lookup, "RETENTION_DAYS")?.unwrap_or(defaults.retention_days),
            retention_cleanup_at,
        };

        if config.event_workers == 0 {
            return Err(ConfigError {
                name: "EVENT_WORKERS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        if config.bulk_concurrency == 0 {
            return Err(ConfigError {
                name: "BULK_CONCURRENCY",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| ConfigError {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
