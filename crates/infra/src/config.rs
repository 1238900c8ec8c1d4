//! Runtime configuration for the ledger services.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use stockflow_inventory::ExpiryConfig;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_WRITE_RETRIES: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub expiry: ExpiryConfig,
    /// How often the reservation sweeper expires stale holds.
    pub sweep_interval: Duration,
    /// Optimistic write attempts after the first before giving up with `Conflict`.
    pub max_write_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            expiry: ExpiryConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_write_retries: DEFAULT_MAX_WRITE_RETRIES,
        }
    }
}

impl LedgerConfig {
    /// Read overrides from `STOCKFLOW_*` environment variables.
    ///
    /// Missing variables keep their defaults; unparsable ones are logged and ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let expiry = ExpiryConfig {
            critical_days: env_or("STOCKFLOW_CRITICAL_DAYS", defaults.expiry.critical_days),
            warning_days: env_or("STOCKFLOW_WARNING_DAYS", defaults.expiry.warning_days),
            info_days: env_or("STOCKFLOW_INFO_DAYS", defaults.expiry.info_days),
            auto_write_off: env_flag("STOCKFLOW_AUTO_WRITE_OFF", defaults.expiry.auto_write_off),
            block_expired: env_flag("STOCKFLOW_BLOCK_EXPIRED", defaults.expiry.block_expired),
            fefo_enabled: env_flag("STOCKFLOW_FEFO_ENABLED", defaults.expiry.fefo_enabled),
        }
        .normalized();

        Self {
            expiry,
            sweep_interval: Duration::from_secs(env_or(
                "STOCKFLOW_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
            max_write_retries: env_or("STOCKFLOW_MAX_WRITE_RETRIES", defaults.max_write_retries),
        }
    }

    pub fn with_expiry(mut self, expiry: ExpiryConfig) -> Self {
        self.expiry = expiry.normalized();
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_max_write_retries(mut self, retries: u32) -> Self {
        self.max_write_retries = retries;
        self
    }
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "ignoring unparsable config value");
            default
        }),
        Err(_) => default,
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(var = name, value = %raw, "ignoring unparsable config flag");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.expiry.critical_days, 7);
        assert_eq!(cfg.expiry.warning_days, 30);
        assert_eq!(cfg.expiry.info_days, 90);
        assert!(cfg.expiry.block_expired);
        assert!(!cfg.expiry.auto_write_off);
        assert_eq!(cfg.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn unset_variables_keep_defaults() {
        assert_eq!(env_or("STOCKFLOW_TEST_UNSET_NUMBER", 42u32), 42);
        assert!(env_flag("STOCKFLOW_TEST_UNSET_FLAG", true));
    }

    #[test]
    fn builder_normalizes_expiry() {
        let cfg = LedgerConfig::default().with_expiry(ExpiryConfig {
            warning_days: 0,
            ..ExpiryConfig::default()
        });
        assert_eq!(cfg.expiry.warning_days, 30);
    }
}
