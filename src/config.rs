use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use rust_decimal::Decimal;

use crate::domain::money::Currency;
use crate::domain::policy::PaymentPolicy;
use crate::error::{PaymentError, Result};

/// Payment lifecycle service with an append-only event ledger.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address the HTTP API listens on.
    #[arg(long, env = "PAYTRAIL_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// CSV file of orders and seller orders (`type, id, owner, total`) loaded at startup.
    #[arg(long, env = "PAYTRAIL_SEED")]
    pub seed: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYTRAIL_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Card payments above this amount require 3-D Secure.
    #[arg(long, env = "PAYTRAIL_THREE_D_SECURE_THRESHOLD", default_value = "500")]
    pub three_d_secure_threshold: Decimal,

    /// Hours an intent stays open before it may expire.
    #[arg(long, env = "PAYTRAIL_INTENT_TTL_HOURS", default_value_t = 24)]
    pub intent_ttl_hours: u32,

    /// Currency used when a create request names none.
    #[arg(long, env = "PAYTRAIL_DEFAULT_CURRENCY", default_value = Currency::DEFAULT)]
    pub default_currency: String,

    /// Seconds between expiry sweeps; 0 disables the sweeper.
    #[arg(long, env = "PAYTRAIL_EXPIRY_SWEEP_SECS", default_value_t = 60)]
    pub expiry_sweep_secs: u64,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, env = "PAYTRAIL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn policy(&self) -> Result<PaymentPolicy> {
        if self.three_d_secure_threshold < Decimal::ZERO {
            return Err(PaymentError::validation(
                "3-D Secure threshold must not be negative",
            ));
        }
        if self.intent_ttl_hours == 0 {
            return Err(PaymentError::validation(
                "Intent TTL must be at least one hour",
            ));
        }
        Ok(PaymentPolicy {
            three_d_secure_threshold: self.three_d_secure_threshold,
            intent_ttl: chrono::Duration::hours(i64::from(self.intent_ttl_hours)),
            default_currency: Currency::parse(&self.default_currency)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["paytrail"]).unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert!(config.seed.is_none());
        assert_eq!(config.expiry_sweep_secs, 60);

        let policy = config.policy().unwrap();
        assert_eq!(policy.three_d_secure_threshold, dec!(500));
        assert_eq!(policy.intent_ttl, chrono::Duration::hours(24));
        assert_eq!(policy.default_currency.as_str(), "TRY");
    }

    #[test]
    fn test_overrides() {
        let config = Config::try_parse_from([
            "paytrail",
            "--three-d-secure-threshold",
            "250.50",
            "--default-currency",
            "eur",
            "--intent-ttl-hours",
            "2",
        ])
        .unwrap();
        let policy = config.policy().unwrap();
        assert_eq!(policy.three_d_secure_threshold, dec!(250.50));
        assert_eq!(policy.default_currency.as_str(), "EUR");
        assert_eq!(policy.intent_ttl, chrono::Duration::hours(2));
    }

    #[test]
    fn test_invalid_currency() {
        let config =
            Config::try_parse_from(["paytrail", "--default-currency", "EURO"]).unwrap();
        assert!(config.policy().is_err());
        assert!(Config::try_parse_from(["paytrail", "--bind", "nowhere"]).is_err());
    }
}
