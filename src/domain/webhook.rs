use crate::error::{EngineError, Result};
use serde::Deserialize;

pub const PAYMENT_CAPTURED: &str = "payment.captured";
pub const PAYMENT_FAILED: &str = "payment.failed";

/// The payment entity carried by gateway events. `order_id` is the only
/// field that ties the event back to a local payment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub amount: i64,
}

/// Gateway events the reconciler understands. Anything else is kept only by
/// name so it can be acknowledged and logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    PaymentCaptured(PaymentEntity),
    PaymentFailed(PaymentEntity),
    Unrecognized(String),
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    /// Left opaque until the event kind is known; other kinds may carry
    /// entities of a different shape.
    #[serde(default)]
    payload: serde_json::Value,
}

impl GatewayEvent {
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(raw)
            .map_err(|e| EngineError::Validation(format!("malformed webhook payload: {e}")))?;

        match envelope.event.as_str() {
            PAYMENT_CAPTURED => Ok(GatewayEvent::PaymentCaptured(payment_entity(&envelope)?)),
            PAYMENT_FAILED => Ok(GatewayEvent::PaymentFailed(payment_entity(&envelope)?)),
            _ => Ok(GatewayEvent::Unrecognized(envelope.event.clone())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GatewayEvent::PaymentCaptured(_) => PAYMENT_CAPTURED,
            GatewayEvent::PaymentFailed(_) => PAYMENT_FAILED,
            GatewayEvent::Unrecognized(name) => name,
        }
    }
}

fn payment_entity(envelope: &Envelope) -> Result<PaymentEntity> {
    let entity = envelope
        .payload
        .pointer("/payment/entity")
        .filter(|v| !v.is_null())
        .ok_or_else(|| {
            EngineError::Validation(format!(
                "{} event without a payment entity",
                envelope.event
            ))
        })?;
    PaymentEntity::deserialize(entity).map_err(|e| {
        EngineError::Validation(format!("malformed {} payment entity: {e}", envelope.event))
    })
}
