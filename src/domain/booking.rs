use super::clock::{DATE_FORMAT, TimeRange, hhmm};
use super::mentor::{MentorService, minor_to_major};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    PaymentFailed,
}

impl BookingStatus {
    /// Whether a booking in this state occupies its interval.
    pub fn holds_slot(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::PaymentFailed => "payment_failed",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub mentor_id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub booking_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub price_cents: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A fresh `pending` booking priced from the offering.
    pub fn pending(
        user_id: Uuid,
        service: &MentorService,
        booking_date: NaiveDate,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mentor_id: service.mentor_id,
            user_id,
            service_id: service.id,
            booking_date,
            start_time: range.start,
            end_time: range.end,
            status: BookingStatus::Pending,
            price_cents: service.price_cents,
            currency: service.currency.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// What a caller gets back after booking, or when listing bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingReceipt {
    pub id: Uuid,
    pub status: BookingStatus,
    pub date: String,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub price: Decimal,
    pub currency: String,
}

impl From<&Booking> for BookingReceipt {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id,
            status: booking.status,
            date: booking.booking_date.format(DATE_FORMAT).to_string(),
            start: booking.start_time,
            end: booking.end_time,
            price: minor_to_major(booking.price_cents),
            currency: booking.currency.clone(),
        }
    }
}
