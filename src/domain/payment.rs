use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Payment state. Moves forward only: `created -> paid` or `created -> failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, PaymentStatus::Created)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub gateway: String,
    /// Idempotency key: the only identifier the gateway echoes back.
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields a settling transition writes onto a payment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSettlement {
    pub status: PaymentStatus,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
}

impl PaymentSettlement {
    pub fn apply(self, payment: &mut Payment, at: DateTime<Utc>) {
        payment.status = self.status;
        if self.gateway_payment_id.is_some() {
            payment.gateway_payment_id = self.gateway_payment_id;
        }
        if self.gateway_signature.is_some() {
            payment.gateway_signature = self.gateway_signature;
        }
        payment.updated_at = at;
    }
}

/// Outcome of a completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// This call moved the payment and its booking.
    Applied,
    /// Another signal got there first; nothing was changed.
    AlreadySettled,
}

/// Returned to the client after a gateway order has been opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    pub payment_id: Uuid,
    pub gateway_order_id: String,
    pub amount: i64,
    pub currency: String,
}

impl From<&Payment> for PaymentIntent {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            gateway_order_id: payment.gateway_order_id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
        }
    }
}

/// HMAC-SHA256 signatures shared with the payment gateway.
///
/// The checkout signature covers `order_id|payment_id`; the webhook signature
/// covers the raw request body. Both are hex encoded and keyed with the same
/// secret, but they are never interchangeable.
#[derive(Clone)]
pub struct GatewaySigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for GatewaySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySigner").finish_non_exhaustive()
    }
}

impl GatewaySigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| EngineError::internal(format!("hmac key: {e}")))
    }

    pub fn sign_checkout(&self, order_id: &str, payment_id: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(checkout_message(order_id, payment_id).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify_checkout(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<()> {
        let mut mac = self.mac()?;
        mac.update(checkout_message(order_id, payment_id).as_bytes());
        verify_hex(mac, signature, "payment")
    }

    pub fn sign_webhook(&self, body: &[u8]) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify_webhook(&self, body: &[u8], signature: &str) -> Result<()> {
        let mut mac = self.mac()?;
        mac.update(body);
        verify_hex(mac, signature, "webhook")
    }
}

fn checkout_message(order_id: &str, payment_id: &str) -> String {
    format!("{order_id}|{payment_id}")
}

// `verify_slice` compares in constant time.
fn verify_hex(mac: HmacSha256, signature: &str, scheme: &'static str) -> Result<()> {
    let expected = hex::decode(signature.trim()).map_err(|_| EngineError::Signature(scheme))?;
    mac.verify_slice(&expected)
        .map_err(|_| EngineError::Signature(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_signature_round_trip() {
        let signer = GatewaySigner::new("s3cret");
        let sig = signer.sign_checkout("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(signer
            .verify_checkout("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", &sig)
            .is_ok());
        assert!(matches!(
            signer.verify_checkout("order_9A33XWu170gUtm", "pay_other", &sig),
            Err(EngineError::Signature("payment"))
        ));
    }

    #[test]
    fn test_known_hmac_vector() {
        // RFC 4231 test case 2.
        let signer = GatewaySigner::new("Jefe");
        let sig = signer.sign_webhook(b"what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_schemes_are_not_interchangeable() {
        let signer = GatewaySigner::new("s3cret");
        let checkout = signer.sign_checkout("order_1", "pay_1").unwrap();
        assert!(signer.verify_webhook(b"order_1|pay_1x", &checkout).is_err());

        let body = br#"{"event":"payment.captured"}"#;
        let webhook = signer.sign_webhook(body).unwrap();
        assert!(signer.verify_webhook(body, &webhook).is_ok());
        assert!(signer.verify_checkout("order_1", "pay_1", &webhook).is_err());
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        let signer = GatewaySigner::new("s3cret");
        assert!(matches!(
            signer.verify_webhook(b"{}", "not-hex"),
            Err(EngineError::Signature("webhook"))
        ));
        assert!(matches!(
            signer.verify_webhook(b"{}", ""),
            Err(EngineError::Signature("webhook"))
        ));
    }

    #[test]
    fn test_settlement_keeps_existing_gateway_fields() {
        let now = Utc::now();
        let mut payment = Payment {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            gateway: "razorpay".to_string(),
            gateway_order_id: "order_1".to_string(),
            gateway_payment_id: Some("pay_1".to_string()),
            gateway_signature: None,
            amount: 100,
            currency: "INR".to_string(),
            status: PaymentStatus::Created,
            created_at: now,
            updated_at: now,
        };
        PaymentSettlement {
            status: PaymentStatus::Failed,
            gateway_payment_id: None,
            gateway_signature: None,
        }
        .apply(&mut payment, now);

        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.gateway_payment_id.as_deref(), Some("pay_1"));
    }
}
