use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::webhook::SimulatedProvider;
use crate::domain::event::{
    EventSource, PAYMENT_AUTHORIZED, PAYMENT_CANCELLED, PAYMENT_CAPTURED, PAYMENT_CREATED,
    PAYMENT_EXPIRED, PAYMENT_FAILED, PAYMENT_REFUNDED, PaymentEvent,
};
use crate::domain::money::format_money;
use crate::domain::order::{Order, PaymentNotice, PaymentOutcome};
use crate::domain::payment::{CreateIntentRequest, PaymentIntent, RefundOutcome};
use crate::domain::policy::PaymentPolicy;
use crate::domain::ports::{NotifierBox, OrderDirectoryBox, PaymentStoreBox, SignatureVerifierBox};
use crate::error::{PaymentError, Result};

/// The payment state machine.
///
/// `PaymentService` is the only writer of `PaymentIntent::status`. Each
/// operation loads the intent, validates the transition against the table in
/// [`crate::domain::payment::TRANSITIONS`], and commits the mutated intent
/// together with its ledger events in one store write. Order updates and
/// notifications follow the commit.
pub struct PaymentService {
    pub(crate) store: PaymentStoreBox,
    orders: OrderDirectoryBox,
    notifier: NotifierBox,
    pub(crate) verifier: SignatureVerifierBox,
    policy: PaymentPolicy,
}

impl PaymentService {
    /// Creates a service backed by the simulated provider, which accepts every
    /// webhook signature.
    pub fn new(
        store: PaymentStoreBox,
        orders: OrderDirectoryBox,
        notifier: NotifierBox,
        policy: PaymentPolicy,
    ) -> Self {
        Self {
            store,
            orders,
            notifier,
            verifier: Box::new(SimulatedProvider),
            policy,
        }
    }

    pub fn with_signature_verifier(mut self, verifier: SignatureVerifierBox) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn policy(&self) -> &PaymentPolicy {
        &self.policy
    }

    /// Opens the payment intent of an order.
    ///
    /// Idempotent per order: the store's unique constraint on the order id
    /// arbitrates concurrent calls, and the loser returns the winner's intent.
    pub async fn create_intent(&self, request: CreateIntentRequest) -> Result<PaymentIntent> {
        let order_id = request.order_id;
        let order = self
            .orders
            .order(order_id)
            .await?
            .ok_or_else(|| PaymentError::not_found(format!("Order not found. OrderId={order_id}")))?;

        let now = Utc::now();
        let intent = PaymentIntent::open(&order, request, &self.policy, now)?;
        let event = PaymentEvent::new(
            &intent,
            PAYMENT_CREATED,
            Some(json!({ "method": intent.method, "amount": intent.amount })),
            EventSource::Api,
            now,
        );

        match self.store.insert(intent, event).await {
            Err(PaymentError::Conflict(_)) => {
                debug!(order_id, "payment intent already exists, returning stored intent");
                self.store.find_by_order(order_id).await?.ok_or_else(|| {
                    PaymentError::conflict(format!(
                        "PaymentIntent for OrderId={order_id} is being created concurrently"
                    ))
                })
            }
            result => result,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<PaymentIntent> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::not_found(format!("PaymentIntent not found. Id={id}")))
    }

    pub async fn get_by_order(&self, order_id: u64) -> Result<PaymentIntent> {
        self.store.find_by_order(order_id).await?.ok_or_else(|| {
            PaymentError::not_found(format!("PaymentIntent not found for OrderId={order_id}"))
        })
    }

    pub async fn get_by_reference(&self, reference: &str) -> Result<PaymentIntent> {
        self.store.find_by_reference(reference).await?.ok_or_else(|| {
            PaymentError::not_found(format!(
                "PaymentIntent not found for ExternalReference={reference}"
            ))
        })
    }

    /// Runs one guarded step against a copy of the stored intent and commits
    /// it with the events the step recorded. A failing step writes nothing.
    pub(crate) async fn apply<T, F>(&self, id: Uuid, step: F) -> Result<(PaymentIntent, T)>
    where
        F: FnOnce(&mut PaymentIntent, DateTime<Utc>, &mut Vec<PaymentEvent>) -> Result<T> + Send,
        T: Send,
    {
        let mut intent = self.get(id).await?;
        let expected_version = intent.version;
        let now = Utc::now();
        let mut events = Vec::new();
        let output = step(&mut intent, now, &mut events)?;
        let intent = self.store.commit(intent, expected_version, events).await?;
        Ok((intent, output))
    }

    pub async fn authorize(&self, id: Uuid) -> Result<PaymentIntent> {
        let (intent, ()) = self
            .apply(id, |intent, now, events| {
                intent.authorize(now)?;
                events.push(PaymentEvent::new(
                    intent,
                    PAYMENT_AUTHORIZED,
                    None,
                    EventSource::Api,
                    now,
                ));
                Ok(())
            })
            .await?;
        Ok(intent)
    }

    pub async fn capture(&self, id: Uuid, note: Option<String>) -> Result<PaymentIntent> {
        self.capture_from(id, note, EventSource::Api).await
    }

    pub(crate) async fn capture_from(
        &self,
        id: Uuid,
        note: Option<String>,
        source: EventSource,
    ) -> Result<PaymentIntent> {
        let (intent, ()) = self
            .apply(id, |intent, now, events| {
                intent.capture(now)?;
                events.push(PaymentEvent::new(
                    intent,
                    PAYMENT_CAPTURED,
                    note.map(|note| json!({ "note": note })),
                    source,
                    now,
                ));
                Ok(())
            })
            .await?;
        self.after_capture(&intent).await;
        Ok(intent)
    }

    pub async fn cancel(&self, id: Uuid, reason: Option<String>) -> Result<PaymentIntent> {
        let (intent, ()) = self
            .apply(id, |intent, now, events| {
                let payload = reason.as_ref().map(|reason| json!({ "reason": reason }));
                intent.cancel(reason)?;
                events.push(PaymentEvent::new(
                    intent,
                    PAYMENT_CANCELLED,
                    payload,
                    EventSource::Api,
                    now,
                ));
                Ok(())
            })
            .await?;
        Ok(intent)
    }

    pub async fn fail(&self, id: Uuid, reason: Option<String>) -> Result<PaymentIntent> {
        self.fail_from(id, reason, EventSource::Api).await
    }

    pub(crate) async fn fail_from(
        &self,
        id: Uuid,
        reason: Option<String>,
        source: EventSource,
    ) -> Result<PaymentIntent> {
        let (intent, ()) = self
            .apply(id, |intent, now, events| {
                let payload = reason.as_ref().map(|reason| json!({ "reason": reason }));
                intent.fail(reason, now)?;
                events.push(PaymentEvent::new(intent, PAYMENT_FAILED, payload, source, now));
                Ok(())
            })
            .await?;
        self.after_failure(&intent).await;
        Ok(intent)
    }

    pub async fn refund(
        &self,
        id: Uuid,
        amount: Option<Decimal>,
        reason: Option<String>,
    ) -> Result<RefundOutcome> {
        self.refund_from(id, amount, reason, EventSource::Api).await
    }

    pub(crate) async fn refund_from(
        &self,
        id: Uuid,
        amount: Option<Decimal>,
        reason: Option<String>,
        source: EventSource,
    ) -> Result<RefundOutcome> {
        let (intent, outcome) = self
            .apply(id, |intent, now, events| {
                let outcome = intent.refund(amount, now)?;
                events.push(PaymentEvent::new(
                    intent,
                    PAYMENT_REFUNDED,
                    Some(json!({ "amount": outcome.refunded_amount, "reason": reason })),
                    source,
                    now,
                ));
                Ok(outcome)
            })
            .await?;

        if let Some(order) = self.buyer_order(&intent).await {
            self.notifier
                .notify(PaymentNotice {
                    buyer_id: order.buyer_id,
                    order_id: order.id,
                    title: "Refund Processed".to_string(),
                    message: format!(
                        "A refund of {} {} has been processed.",
                        format_money(outcome.refunded_amount),
                        intent.currency
                    ),
                })
                .await;
        }
        Ok(outcome)
    }

    pub async fn mark_received(&self, id: Uuid, note: Option<String>) -> Result<PaymentIntent> {
        let note = note.unwrap_or_else(|| "Manually marked as received".to_string());
        self.capture_from(id, Some(note), EventSource::Admin).await
    }

    pub async fn simulate_success(&self, id: Uuid, note: Option<String>) -> Result<PaymentIntent> {
        let note = note.unwrap_or_else(|| "Simulated success".to_string());
        self.capture_from(id, Some(note), EventSource::System).await
    }

    pub async fn simulate_fail(&self, id: Uuid, reason: Option<String>) -> Result<PaymentIntent> {
        let reason = reason.unwrap_or_else(|| "Simulated failure".to_string());
        self.fail_from(id, Some(reason), EventSource::System).await
    }

    /// The ledger of an intent, newest first.
    pub async fn events(&self, id: Uuid) -> Result<Vec<PaymentEvent>> {
        self.get(id).await?;
        let mut events = self.store.events(id).await?;
        events.reverse();
        Ok(events)
    }

    /// Expires every open intent whose `expires_at` has passed.
    ///
    /// An intent that moves concurrently is skipped; the next sweep sees its
    /// new status.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<PaymentIntent>> {
        let mut expired = Vec::new();
        for candidate in self.store.overdue(now).await? {
            let result = self
                .apply(candidate.id, |intent, at, events| {
                    if !intent.is_overdue(now) {
                        return Err(PaymentError::conflict("intent changed before expiry"));
                    }
                    intent.expire()?;
                    events.push(PaymentEvent::new(
                        intent,
                        PAYMENT_EXPIRED,
                        Some(json!({ "expiresAt": intent.expires_at })),
                        EventSource::System,
                        at,
                    ));
                    Ok(())
                })
                .await;
            match result {
                Ok((intent, ())) => expired.push(intent),
                Err(PaymentError::Conflict(_) | PaymentError::ValidationError(_)) => {
                    debug!(intent_id = %candidate.id, "skipping intent that moved during expiry");
                }
                Err(err) => return Err(err),
            }
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired overdue payment intents");
        }
        Ok(expired)
    }

    /// Order bookkeeping and the buyer notice run after the intent committed,
    /// so collaborator failures are logged and never undo the transition.
    pub(crate) async fn after_capture(&self, intent: &PaymentIntent) {
        let paid_at = intent.captured_at.unwrap_or_else(Utc::now);
        let Some(order) = self
            .record_outcome(intent, PaymentOutcome::Succeeded { paid_at })
            .await
        else {
            return;
        };
        self.notifier
            .notify(PaymentNotice {
                buyer_id: order.buyer_id,
                order_id: order.id,
                title: "Payment Successful".to_string(),
                message: format!(
                    "Your payment of {} {} has been processed successfully.",
                    format_money(intent.amount),
                    intent.currency
                ),
            })
            .await;
    }

    pub(crate) async fn after_failure(&self, intent: &PaymentIntent) {
        let Some(order) = self.record_outcome(intent, PaymentOutcome::Failed).await else {
            return;
        };
        self.notifier
            .notify(PaymentNotice {
                buyer_id: order.buyer_id,
                order_id: order.id,
                title: "Payment Failed".to_string(),
                message: format!(
                    "Your payment could not be processed. Reason: {}",
                    intent.failure_reason.as_deref().unwrap_or("Unknown error")
                ),
            })
            .await;
    }

    /// Returns the updated order, or `None` when it could not be recorded.
    async fn record_outcome(&self, intent: &PaymentIntent, outcome: PaymentOutcome) -> Option<Order> {
        if let Err(err) = self
            .orders
            .record_payment_outcome(intent.order_id, outcome)
            .await
        {
            warn!(intent_id = %intent.id, order_id = intent.order_id, error = %err, "order not updated after payment outcome");
            return None;
        }
        self.buyer_order(intent).await
    }

    async fn buyer_order(&self, intent: &PaymentIntent) -> Option<Order> {
        match self.orders.order(intent.order_id).await {
            Ok(Some(order)) => Some(order),
            Ok(None) => {
                warn!(intent_id = %intent.id, order_id = intent.order_id, "order missing, buyer not notified");
                None
            }
            Err(err) => {
                warn!(intent_id = %intent.id, order_id = intent.order_id, error = %err, "order lookup failed, buyer not notified");
                None
            }
        }
    }
}
