use serde_json::json;
use uuid::Uuid;

use crate::application::payments::PaymentService;
use crate::domain::event::{
    EventSource, PAYMENT_AUTHORIZED, PAYMENT_CAPTURED, PAYMENT_FAILED, PaymentEvent,
    THREE_DS_AUTHENTICATED, THREE_DS_FAILED,
};
use crate::domain::payment::PaymentIntent;
use crate::error::Result;

const THREE_DS_FAILURE_REASON: &str = "3D Secure authentication failed";

impl PaymentService {
    /// Completes the 3-D Secure challenge of a pending card payment.
    ///
    /// `result` equal to "success" (any case) authorizes and captures the
    /// intent in one step; anything else fails it.
    pub async fn confirm_3d_secure(&self, id: Uuid, result: &str) -> Result<PaymentIntent> {
        let success = result.eq_ignore_ascii_case("success");

        let (intent, ()) = self
            .apply(id, |intent, now, events| {
                intent.ensure_awaiting_3d_secure()?;

                if success {
                    intent.authorize(now)?;
                    events.push(PaymentEvent::new(
                        intent,
                        THREE_DS_AUTHENTICATED,
                        Some(json!({ "result": result })),
                        EventSource::ThreeDSecure,
                        now,
                    ));
                    events.push(PaymentEvent::new(
                        intent,
                        PAYMENT_AUTHORIZED,
                        None,
                        EventSource::ThreeDSecure,
                        now,
                    ));
                    intent.capture(now)?;
                    events.push(PaymentEvent::new(
                        intent,
                        PAYMENT_CAPTURED,
                        Some(json!({ "note": "Auto-captured after 3DS" })),
                        EventSource::ThreeDSecure,
                        now,
                    ));
                } else {
                    events.push(PaymentEvent::new(
                        intent,
                        THREE_DS_FAILED,
                        Some(json!({ "result": result })),
                        EventSource::ThreeDSecure,
                        now,
                    ));
                    intent.fail(Some(THREE_DS_FAILURE_REASON.to_string()), now)?;
                    events.push(PaymentEvent::new(
                        intent,
                        PAYMENT_FAILED,
                        Some(json!({ "reason": THREE_DS_FAILURE_REASON })),
                        EventSource::ThreeDSecure,
                        now,
                    ));
                }
                Ok(())
            })
            .await?;

        if success {
            self.after_capture(&intent).await;
        } else {
            self.after_failure(&intent).await;
        }
        Ok(intent)
    }
}
