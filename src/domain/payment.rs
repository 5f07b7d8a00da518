use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::{Amount, Currency, format_money};
use super::order::Order;
use super::policy::PaymentPolicy;
use crate::error::{PaymentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Created,
    Pending,
    Authorized,
    Captured,
    Failed,
    Cancelled,
    Refunded,
    PartiallyRefunded,
    Expired,
}

/// Legal transitions, keyed by the current status.
///
/// A status missing from the left column is terminal.
pub const TRANSITIONS: &[(PaymentStatus, &[PaymentStatus])] = &[
    (
        PaymentStatus::Created,
        &[
            PaymentStatus::Pending,
            PaymentStatus::Authorized,
            PaymentStatus::Captured,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
            PaymentStatus::Expired,
        ],
    ),
    (
        PaymentStatus::Pending,
        &[
            PaymentStatus::Authorized,
            PaymentStatus::Captured,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
            PaymentStatus::Expired,
        ],
    ),
    (
        PaymentStatus::Authorized,
        &[
            PaymentStatus::Captured,
            PaymentStatus::Cancelled,
            PaymentStatus::Expired,
        ],
    ),
    (
        PaymentStatus::Captured,
        &[PaymentStatus::Refunded, PaymentStatus::PartiallyRefunded],
    ),
    (
        PaymentStatus::PartiallyRefunded,
        &[PaymentStatus::Refunded, PaymentStatus::PartiallyRefunded],
    ),
];

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 9] = [
        PaymentStatus::Created,
        PaymentStatus::Pending,
        PaymentStatus::Authorized,
        PaymentStatus::Captured,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Refunded,
        PaymentStatus::PartiallyRefunded,
        PaymentStatus::Expired,
    ];

    pub fn allowed_targets(self) -> &'static [PaymentStatus] {
        TRANSITIONS
            .iter()
            .find(|(from, _)| *from == self)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    pub fn can_transition_to(self, target: PaymentStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Fails with a validation error naming the illegal `from -> to` pair.
    pub fn ensure_transition(self, target: PaymentStatus) -> Result<()> {
        if self.can_transition_to(target) {
            Ok(())
        } else {
            Err(PaymentError::validation(format!(
                "Cannot transition from {self} to {target}"
            )))
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    CashOnDelivery,
    BankTransfer,
    CreditCard,
    DebitCard,
    Wallet,
    Installment,
    BuyNowPayLater,
}

impl PaymentMethod {
    /// Label of the (simulated) provider that handles this method.
    pub fn provider(self) -> &'static str {
        match self {
            Self::CreditCard | Self::DebitCard | Self::Installment => "STRIPE",
            Self::Wallet => "PAYPAL",
            Self::BankTransfer => "BANK",
            Self::BuyNowPayLater => "KLARNA",
            Self::CashOnDelivery => "MANUAL",
        }
    }

    pub fn is_card(self) -> bool {
        matches!(self, Self::CreditCard | Self::DebitCard)
    }
}

/// Raw card input. Only the last four digits and the brand are ever stored.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub card_number: String,
    #[serde(default)]
    pub expiry_date: String,
    #[serde(default)]
    pub cvv: String,
    #[serde(default)]
    pub card_holder_name: String,
}

impl CardDetails {
    fn digits(&self) -> String {
        self.card_number
            .chars()
            .filter(|c| *c != ' ' && *c != '-')
            .collect()
    }

    pub fn last4(&self) -> String {
        let digits = self.digits();
        let skip = digits.chars().count().saturating_sub(4);
        digits.chars().skip(skip).collect()
    }

    pub fn brand(&self) -> &'static str {
        card_brand(&self.digits())
    }
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("last4", &self.last4())
            .field("card_holder_name", &self.card_holder_name)
            .finish_non_exhaustive()
    }
}

/// Sniffs the card network from the number prefix.
pub fn card_brand(number: &str) -> &'static str {
    if number.starts_with('4') {
        "Visa"
    } else if number.starts_with('5') {
        "Mastercard"
    } else if number.starts_with("34") || number.starts_with("37") {
        "Amex"
    } else if number.starts_with("6011") {
        "Discover"
    } else {
        "Unknown"
    }
}

/// `PAY-<yyyyMMdd>-<8 upper hex>`, used to correlate provider webhooks.
pub fn new_external_reference(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase();
    format!("PAY-{}-{}", now.format("%Y%m%d"), suffix)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub order_id: u64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub card_details: Option<CardDetails>,
    #[serde(default)]
    pub installment_count: Option<u32>,
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl CreateIntentRequest {
    pub fn new(order_id: u64, method: PaymentMethod) -> Self {
        Self {
            order_id,
            method,
            currency: None,
            card_details: None,
            installment_count: None,
            return_url: None,
            metadata: None,
        }
    }
}

/// One payment attempt for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub order_id: u64,
    pub amount: Decimal,
    pub refunded_amount: Decimal,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub provider: String,
    pub external_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub card_last4: Option<String>,
    pub card_brand: Option<String>,
    pub requires_3d_secure: bool,
    pub three_d_secure_url: Option<String>,
    pub installment_count: Option<u32>,
    pub installment_amount: Option<Decimal>,
    pub metadata: Option<BTreeMap<String, String>>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub captured_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Bumped by the store on every commit; used for optimistic concurrency.
    pub version: u64,
}

/// Result of a (partial) refund.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundOutcome {
    pub payment_intent_id: Uuid,
    pub refunded_amount: Decimal,
    pub total_refunded_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: PaymentStatus,
    pub external_reference: Option<String>,
    pub refunded_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// Builds a fresh intent for `order`. Card payments above the policy
    /// threshold start in `Pending` and wait for 3-D Secure.
    pub fn open(
        order: &Order,
        request: CreateIntentRequest,
        policy: &PaymentPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let currency = match request.currency.as_deref() {
            Some(code) => Currency::parse(code)?,
            None => policy.default_currency.clone(),
        };
        if request.installment_count == Some(0) {
            return Err(PaymentError::validation(
                "Installment count must be at least 1",
            ));
        }

        let id = Uuid::new_v4();
        let mut intent = Self {
            id,
            order_id: order.id,
            amount: order.total_amount,
            refunded_amount: Decimal::ZERO,
            currency,
            method: request.method,
            status: PaymentStatus::Created,
            provider: request.method.provider().to_string(),
            external_reference: None,
            failure_reason: None,
            card_last4: None,
            card_brand: None,
            requires_3d_secure: false,
            three_d_secure_url: None,
            installment_count: request.installment_count,
            installment_amount: None,
            metadata: request.metadata,
            authorized_at: None,
            captured_at: None,
            failed_at: None,
            refunded_at: None,
            expires_at: now + policy.intent_ttl,
            created_at: now,
            version: 0,
        };

        if let Some(card) = request.card_details.filter(|_| request.method.is_card()) {
            intent.card_last4 = Some(card.last4());
            intent.card_brand = Some(card.brand().to_string());

            if intent.amount > policy.three_d_secure_threshold {
                intent.requires_3d_secure = true;
                intent.three_d_secure_url = Some(format!(
                    "/api/payments/intents/{id}/3ds?returnUrl={}",
                    request.return_url.unwrap_or_default()
                ));
                intent.status = PaymentStatus::Pending;
            }
        }

        if let Some(count) = request.installment_count.filter(|count| *count > 1) {
            intent.installment_amount = Some((intent.amount / Decimal::from(count)).round_dp(2));
        }

        Ok(intent)
    }

    pub fn remaining_refundable(&self) -> Decimal {
        self.amount - self.refunded_amount
    }

    fn transition_to(&mut self, target: PaymentStatus) -> Result<()> {
        self.status.ensure_transition(target)?;
        self.status = target;
        Ok(())
    }

    fn ensure_external_reference(&mut self, now: DateTime<Utc>) {
        if self.external_reference.as_deref().is_none_or(str::is_empty) {
            self.external_reference = Some(new_external_reference(now));
        }
    }

    pub fn authorize(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition_to(PaymentStatus::Authorized)?;
        self.authorized_at = Some(now);
        self.ensure_external_reference(now);
        Ok(())
    }

    pub fn capture(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition_to(PaymentStatus::Captured)?;
        self.captured_at = Some(now);
        self.failure_reason = None;
        self.ensure_external_reference(now);
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<String>) -> Result<()> {
        self.transition_to(PaymentStatus::Cancelled)?;
        self.failure_reason = reason;
        Ok(())
    }

    pub fn fail(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<()> {
        self.transition_to(PaymentStatus::Failed)?;
        self.failed_at = Some(now);
        self.failure_reason = reason;
        Ok(())
    }

    pub fn expire(&mut self) -> Result<()> {
        self.transition_to(PaymentStatus::Expired)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.can_transition_to(PaymentStatus::Expired) && self.expires_at <= now
    }

    /// Refunds `amount`, or everything still refundable when `None`.
    pub fn refund(&mut self, amount: Option<Decimal>, now: DateTime<Utc>) -> Result<RefundOutcome> {
        if !matches!(
            self.status,
            PaymentStatus::Captured | PaymentStatus::PartiallyRefunded
        ) {
            return Err(PaymentError::validation(
                "Only captured payments can be refunded",
            ));
        }

        let remaining = self.remaining_refundable();
        let requested = amount.unwrap_or(remaining);
        let refund = Amount::new(requested)
            .ok()
            .filter(|refund| refund.value() <= remaining)
            .ok_or_else(|| {
                PaymentError::validation(format!(
                    "Invalid refund amount. Maximum refundable: {}",
                    format_money(remaining)
                ))
            })?;

        let total = self.refunded_amount + refund.value();
        let target = if total == self.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        self.transition_to(target)?;
        self.refunded_amount = total;
        self.refunded_at = Some(now);

        Ok(RefundOutcome {
            payment_intent_id: self.id,
            refunded_amount: refund.value(),
            total_refunded_amount: self.refunded_amount,
            remaining_amount: self.remaining_refundable(),
            status: self.status,
            external_reference: self.external_reference.clone(),
            refunded_at: now,
        })
    }

    /// 3-D Secure may only be confirmed on a pending intent that asked for it.
    pub fn ensure_awaiting_3d_secure(&self) -> Result<()> {
        if !self.requires_3d_secure {
            return Err(PaymentError::validation(
                "This payment does not require 3D Secure",
            ));
        }
        if self.status != PaymentStatus::Pending {
            return Err(PaymentError::validation(
                "Payment is not awaiting 3D Secure confirmation",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use rust_decimal_macros::dec;

    fn order(total: Decimal) -> Order {
        Order {
            id: 7,
            buyer_id: 42,
            total_amount: total,
            status: OrderStatus::Pending,
            paid_at: None,
        }
    }

    fn card(number: &str) -> CardDetails {
        CardDetails {
            card_number: number.to_string(),
            expiry_date: "12/30".to_string(),
            cvv: "123".to_string(),
            card_holder_name: "Test Buyer".to_string(),
        }
    }

    fn open(total: Decimal, request: CreateIntentRequest) -> PaymentIntent {
        PaymentIntent::open(&order(total), request, &PaymentPolicy::default(), Utc::now()).unwrap()
    }

    fn captured(total: Decimal) -> PaymentIntent {
        let mut intent = open(total, CreateIntentRequest::new(7, PaymentMethod::BankTransfer));
        intent.capture(Utc::now()).unwrap();
        intent
    }

    #[test]
    fn test_transition_table_is_exhaustive() {
        use PaymentStatus::*;
        assert!(Created.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Captured));
        assert!(Authorized.can_transition_to(Expired));
        assert!(Captured.can_transition_to(PartiallyRefunded));
        assert!(PartiallyRefunded.can_transition_to(PartiallyRefunded));

        assert!(!Captured.can_transition_to(Captured));
        assert!(!Authorized.can_transition_to(Failed));
        assert!(!Captured.can_transition_to(Cancelled));
        for terminal in [Failed, Cancelled, Expired, Refunded] {
            assert!(terminal.allowed_targets().is_empty());
            for target in PaymentStatus::ALL {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_illegal_transition_names_the_pair() {
        let err = PaymentStatus::Cancelled
            .ensure_transition(PaymentStatus::Captured)
            .unwrap_err();
        assert!(err.to_string().contains("Cannot transition from Cancelled to Captured"));
    }

    #[test]
    fn test_card_brand_detection() {
        assert_eq!(card_brand("4111111111111111"), "Visa");
        assert_eq!(card_brand("5500000000000004"), "Mastercard");
        assert_eq!(card_brand("340000000000009"), "Amex");
        assert_eq!(card_brand("370000000000002"), "Amex");
        assert_eq!(card_brand("6011000000000004"), "Discover");
        assert_eq!(card_brand("3530111333300000"), "Unknown");
        assert_eq!(card_brand(""), "Unknown");
    }

    #[test]
    fn test_card_number_is_normalized() {
        let details = card("4111 1111-1111 1234");
        assert_eq!(details.last4(), "1234");
        assert_eq!(details.brand(), "Visa");
        assert!(!format!("{details:?}").contains("4111"));
    }

    #[test]
    fn test_provider_for_method() {
        assert_eq!(PaymentMethod::CreditCard.provider(), "STRIPE");
        assert_eq!(PaymentMethod::Installment.provider(), "STRIPE");
        assert_eq!(PaymentMethod::Wallet.provider(), "PAYPAL");
        assert_eq!(PaymentMethod::BankTransfer.provider(), "BANK");
        assert_eq!(PaymentMethod::BuyNowPayLater.provider(), "KLARNA");
        assert_eq!(PaymentMethod::CashOnDelivery.provider(), "MANUAL");
    }

    #[test]
    fn test_open_card_payment_above_threshold_requires_3ds() {
        let mut request = CreateIntentRequest::new(7, PaymentMethod::CreditCard);
        request.card_details = Some(card("4111111111111111"));
        request.return_url = Some("https://shop.test/done".to_string());

        let intent = open(dec!(1000), request);
        assert!(intent.requires_3d_secure);
        assert_eq!(intent.status, PaymentStatus::Pending);
        assert_eq!(intent.card_brand.as_deref(), Some("Visa"));
        assert_eq!(intent.card_last4.as_deref(), Some("1111"));
        assert_eq!(intent.amount, dec!(1000));
        assert!(
            intent
                .three_d_secure_url
                .as_deref()
                .unwrap()
                .ends_with("/3ds?returnUrl=https://shop.test/done")
        );
    }

    #[test]
    fn test_open_at_threshold_does_not_require_3ds() {
        let mut request = CreateIntentRequest::new(7, PaymentMethod::DebitCard);
        request.card_details = Some(card("5500000000000004"));

        let intent = open(dec!(500), request);
        assert!(!intent.requires_3d_secure);
        assert_eq!(intent.status, PaymentStatus::Created);
        assert_eq!(intent.card_brand.as_deref(), Some("Mastercard"));
    }

    #[test]
    fn test_open_ignores_card_for_non_card_methods() {
        let mut request = CreateIntentRequest::new(7, PaymentMethod::Wallet);
        request.card_details = Some(card("4111111111111111"));

        let intent = open(dec!(1000), request);
        assert!(intent.card_last4.is_none());
        assert!(!intent.requires_3d_secure);
        assert_eq!(intent.provider, "PAYPAL");
    }

    #[test]
    fn test_open_computes_installments_and_expiry() {
        let mut request = CreateIntentRequest::new(7, PaymentMethod::Installment);
        request.installment_count = Some(3);
        request.currency = Some("usd".to_string());

        let now = Utc::now();
        let intent =
            PaymentIntent::open(&order(dec!(100)), request, &PaymentPolicy::default(), now).unwrap();
        assert_eq!(intent.installment_amount, Some(dec!(33.33)));
        assert_eq!(intent.currency.as_str(), "USD");
        assert_eq!(intent.expires_at, now + chrono::Duration::hours(24));
    }

    #[test]
    fn test_open_single_installment_has_no_amount() {
        let mut request = CreateIntentRequest::new(7, PaymentMethod::Installment);
        request.installment_count = Some(1);
        assert_eq!(open(dec!(100), request).installment_amount, None);

        let mut request = CreateIntentRequest::new(7, PaymentMethod::Installment);
        request.installment_count = Some(0);
        assert!(
            PaymentIntent::open(&order(dec!(100)), request, &PaymentPolicy::default(), Utc::now())
                .is_err()
        );
    }

    #[test]
    fn test_authorize_keeps_existing_reference() {
        let mut intent = open(dec!(200), CreateIntentRequest::new(7, PaymentMethod::BankTransfer));
        intent.external_reference = Some("PAY-EXISTING".to_string());
        intent.authorize(Utc::now()).unwrap();
        assert_eq!(intent.status, PaymentStatus::Authorized);
        assert_eq!(intent.external_reference.as_deref(), Some("PAY-EXISTING"));
    }

    #[test]
    fn test_capture_generates_reference_and_clears_failure() {
        let mut intent = open(dec!(200), CreateIntentRequest::new(7, PaymentMethod::BankTransfer));
        intent.failure_reason = Some("stale".to_string());
        intent.capture(Utc::now()).unwrap();

        let reference = intent.external_reference.as_deref().unwrap();
        assert!(reference.starts_with("PAY-"));
        assert_eq!(reference.len(), "PAY-20240101-ABCDEF12".len());
        assert!(intent.failure_reason.is_none());
        assert!(intent.captured_at.is_some());
    }

    #[test]
    fn test_second_capture_is_rejected_without_changes() {
        let mut intent = captured(dec!(200));
        let before = intent.clone();
        assert!(matches!(
            intent.capture(Utc::now()),
            Err(PaymentError::ValidationError(_))
        ));
        assert_eq!(intent, before);
    }

    #[test]
    fn test_partial_then_full_refund() {
        let mut intent = captured(dec!(100));

        let first = intent.refund(Some(dec!(50)), Utc::now()).unwrap();
        assert_eq!(first.status, PaymentStatus::PartiallyRefunded);
        assert_eq!(first.total_refunded_amount, dec!(50));
        assert_eq!(first.remaining_amount, dec!(50));

        let second = intent.refund(Some(dec!(50)), Utc::now()).unwrap();
        assert_eq!(second.status, PaymentStatus::Refunded);
        assert_eq!(intent.refunded_amount, dec!(100));
        assert_eq!(second.remaining_amount, dec!(0));

        let err = intent.refund(Some(dec!(1)), Utc::now()).unwrap_err();
        assert!(matches!(err, PaymentError::ValidationError(_)));
    }

    #[test]
    fn test_refund_defaults_to_remaining() {
        let mut intent = captured(dec!(80.50));
        intent.refund(Some(dec!(0.50)), Utc::now()).unwrap();
        let outcome = intent.refund(None, Utc::now()).unwrap();
        assert_eq!(outcome.refunded_amount, dec!(80.00));
        assert_eq!(intent.status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_refund_rejects_bad_amounts() {
        let mut intent = captured(dec!(100));
        for amount in [dec!(0), dec!(-5), dec!(100.01)] {
            let err = intent.refund(Some(amount), Utc::now()).unwrap_err();
            assert!(err.to_string().contains("Invalid refund amount"));
            assert!(err.to_string().contains("100.00"));
        }
        assert_eq!(intent.refunded_amount, dec!(0));
        assert_eq!(intent.status, PaymentStatus::Captured);
    }

    #[test]
    fn test_refund_requires_capture() {
        let mut intent = open(dec!(100), CreateIntentRequest::new(7, PaymentMethod::BankTransfer));
        let err = intent.refund(None, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("Only captured payments can be refunded"));
    }

    #[test]
    fn test_overdue_only_for_expirable_statuses() {
        let mut intent = open(dec!(100), CreateIntentRequest::new(7, PaymentMethod::BankTransfer));
        let later = intent.expires_at + chrono::Duration::seconds(1);
        assert!(!intent.is_overdue(intent.created_at));
        assert!(intent.is_overdue(later));

        intent.capture(Utc::now()).unwrap();
        assert!(!intent.is_overdue(later));
    }

    #[test]
    fn test_3ds_guard() {
        let intent = open(dec!(100), CreateIntentRequest::new(7, PaymentMethod::BankTransfer));
        let err = intent.ensure_awaiting_3d_secure().unwrap_err();
        assert!(err.to_string().contains("does not require 3D Secure"));

        let mut request = CreateIntentRequest::new(7, PaymentMethod::CreditCard);
        request.card_details = Some(card("4111111111111111"));
        let mut intent = open(dec!(900), request);
        assert!(intent.ensure_awaiting_3d_secure().is_ok());
        intent.cancel(None).unwrap();
        assert!(intent.ensure_awaiting_3d_secure().is_err());
    }
}
