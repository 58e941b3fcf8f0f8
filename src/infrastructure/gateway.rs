use crate::domain::ports::PaymentGateway;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An order opened with [`LocalGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub receipt: String,
}

/// A gateway that issues `order_<hex>` ids locally.
///
/// It stands in for the hosted checkout in the CLI and in tests, and records
/// every order it opens so orphans can be inspected.
#[derive(Default, Clone)]
pub struct LocalGateway {
    orders: Arc<RwLock<HashMap<String, GatewayOrder>>>,
    unavailable: bool,
}

impl LocalGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every call fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub async fn orders(&self) -> Vec<GatewayOrder> {
        self.orders.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl PaymentGateway for LocalGateway {
    async fn create_order(
        &self,
        amount_cents: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<String> {
        if self.unavailable {
            return Err(EngineError::internal("payment gateway unavailable"));
        }
        if amount_cents < 0 {
            return Err(EngineError::Validation(
                "order amount must not be negative".to_string(),
            ));
        }
        let mut bytes = [0u8; 7];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let id = format!("order_{}", hex::encode(bytes));

        self.orders.write().await.insert(
            id.clone(),
            GatewayOrder {
                id: id.clone(),
                amount_cents,
                currency: currency.to_string(),
                receipt: receipt.to_string(),
            },
        );
        Ok(id)
    }
}
