use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::money::Currency;

/// Tunable constants of the payment lifecycle.
#[derive(Debug, Clone)]
pub struct PaymentPolicy {
    /// Card payments strictly above this amount must pass 3-D Secure.
    pub three_d_secure_threshold: Decimal,
    /// How long an intent stays open before the expiry sweep may expire it.
    pub intent_ttl: Duration,
    /// Used when a create request carries no currency.
    pub default_currency: Currency,
}

impl Default for PaymentPolicy {
    fn default() -> Self {
        Self {
            three_d_secure_threshold: dec!(500),
            intent_ttl: Duration::hours(24),
            default_currency: Currency::default(),
        }
    }
}
