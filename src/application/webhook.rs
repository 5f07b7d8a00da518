use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::application::payments::PaymentService;
use crate::domain::event::{EventSource, PaymentEvent};
use crate::domain::ports::SignatureVerifier;
use crate::error::{PaymentError, Result};

/// Provider callback body. Field names are matched in camelCase, PascalCase
/// or snake_case.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    #[serde(default, alias = "EventType", alias = "event_type")]
    pub event_type: Option<String>,
    #[serde(default, alias = "ExternalReference", alias = "external_reference")]
    pub external_reference: Option<String>,
    #[serde(default, alias = "Amount")]
    pub amount: Option<Decimal>,
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
}

impl WebhookEnvelope {
    pub fn parse(payload: &str) -> Result<(Self, Value)> {
        let invalid = || PaymentError::validation("Invalid webhook payload");
        let raw: Value = serde_json::from_str(payload).map_err(|_| invalid())?;
        let envelope: Self = serde_json::from_value(raw.clone()).map_err(|_| invalid())?;
        if envelope
            .external_reference
            .as_deref()
            .is_none_or(|reference| reference.trim().is_empty())
        {
            return Err(invalid());
        }
        Ok((envelope, raw))
    }
}

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WebhookReceipt {
    pub received: bool,
}

/// The simulated provider signs nothing, so every signature is accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedProvider;

impl SignatureVerifier for SimulatedProvider {
    fn verify(&self, _provider: &str, _payload: &str, _signature: Option<&str>) -> Result<()> {
        Ok(())
    }
}

impl PaymentService {
    /// Ingests a provider callback.
    ///
    /// Callbacks for references this service never issued are acknowledged
    /// and dropped. For known intents the matching transition is attempted,
    /// then a `webhook.<eventType>` entry is appended whatever its outcome.
    pub async fn process_webhook(
        &self,
        provider: &str,
        payload: &str,
        signature: Option<&str>,
    ) -> Result<WebhookReceipt> {
        self.verifier.verify(provider, payload, signature)?;
        let (envelope, raw) = WebhookEnvelope::parse(payload)?;
        let reference = envelope.external_reference.as_deref().unwrap_or_default();

        let Some(intent) = self.store.find_by_reference(reference).await? else {
            warn!(provider, reference, "webhook for unknown payment reference dropped");
            return Ok(WebhookReceipt { received: true });
        };

        let event_type = envelope.event_type.as_deref().unwrap_or("unknown");
        let dispatched = match event_type.to_ascii_lowercase().as_str() {
            "payment.captured" => self
                .capture_from(
                    intent.id,
                    Some("Captured via webhook".to_string()),
                    EventSource::Webhook,
                )
                .await
                .map(drop),
            "payment.failed" => self
                .fail_from(intent.id, envelope.message.clone(), EventSource::Webhook)
                .await
                .map(drop),
            "payment.refunded" => self
                .refund_from(
                    intent.id,
                    envelope.amount,
                    envelope.message.clone(),
                    EventSource::Webhook,
                )
                .await
                .map(drop),
            _ => Ok(()),
        };
        if let Err(err) = dispatched {
            warn!(provider, reference, event_type, error = %err, "webhook transition rejected");
        }

        let current = self.get(intent.id).await?;
        self.store
            .append_event(PaymentEvent::new(
                &current,
                format!("webhook.{event_type}"),
                Some(raw),
                EventSource::Webhook,
                chrono::Utc::now(),
            ))
            .await?;

        Ok(WebhookReceipt { received: true })
    }
}
