use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session lengths a mentor may offer.
pub const ALLOWED_DURATIONS: [u32; 2] = [30, 60];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mentor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    /// Profile metadata only. Slot and booking arithmetic never consult it.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub is_active: bool,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// A bookable offering: it fixes the slot length and the price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorService {
    pub id: Uuid,
    pub mentor_id: Uuid,
    #[serde(default)]
    pub title: String,
    pub duration_minutes: u32,
    pub price_cents: i64,
    pub currency: String,
    pub is_active: bool,
}

impl MentorService {
    pub fn validate(&self) -> Result<()> {
        if !ALLOWED_DURATIONS.contains(&self.duration_minutes) {
            return Err(EngineError::Validation(format!(
                "duration_minutes must be one of {:?}",
                ALLOWED_DURATIONS
            )));
        }
        if self.price_cents < 0 {
            return Err(EngineError::Validation(
                "price_cents must not be negative".to_string(),
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(EngineError::Validation("currency is required".to_string()));
        }
        Ok(())
    }

    pub fn price(&self) -> Decimal {
        minor_to_major(self.price_cents)
    }
}

/// Converts an amount in minor units (cents, paise) to a two-decimal value.
pub fn minor_to_major(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
