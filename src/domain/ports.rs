use super::availability::AvailabilityRule;
use super::booking::{Booking, BookingStatus};
use super::clock::TimeRange;
use super::mentor::{Mentor, MentorService};
use super::payment::{Payment, PaymentSettlement, PaymentStatus};
use super::session::RefreshToken;
use super::user::UserAccount;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<UserAccount>>;
    async fn upsert_user(&self, user: UserAccount) -> Result<()>;
}

#[async_trait]
pub trait MentorDirectory: Send + Sync {
    async fn get_mentor(&self, id: Uuid) -> Result<Option<Mentor>>;
    async fn find_mentor_by_username(&self, username: &str) -> Result<Option<Mentor>>;
    async fn upsert_mentor(&self, mentor: Mentor) -> Result<()>;
}

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn get_service(&self, id: Uuid) -> Result<Option<MentorService>>;
    async fn upsert_service(&self, service: MentorService) -> Result<()>;
}

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn rules_for_mentor_and_day(&self, mentor_id: Uuid, day_of_week: u8)
    -> Result<Vec<AvailabilityRule>>;
    async fn rules_for_mentor(&self, mentor_id: Uuid) -> Result<Vec<AvailabilityRule>>;
    async fn insert_rule(&self, rule: AvailabilityRule) -> Result<()>;
}

/// Committed, non-locking reads of the booking table.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>>;
    /// Bookings for `(mentor_id, date)` whose status still holds a slot.
    async fn active_bookings_on(&self, mentor_id: Uuid, date: NaiveDate) -> Result<Vec<Booking>>;
    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>>;
    async fn bookings_for_mentor_with_status(
        &self,
        mentor_id: Uuid,
        status: BookingStatus,
    ) -> Result<Vec<Booking>>;
}

/// Committed, non-locking reads of the payment table.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_gateway_order_id(&self, order_id: &str) -> Result<Option<Payment>>;
    async fn payment_for_booking(&self, booking_id: Uuid) -> Result<Option<Payment>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_refresh_token(&self, token: RefreshToken) -> Result<()>;
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>>;
    /// Sets `revoked_at` only if the token is still active. Exactly one of any
    /// number of concurrent callers for the same token observes `true`.
    async fn revoke_if_active(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;
    /// Revokes every active token of the user, returning how many changed.
    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<usize>;
}

#[async_trait]
pub trait Transactor: Send + Sync {
    async fn begin_serializable(&self) -> Result<Box<dyn StoreTx>>;
}

/// One serializable unit of work.
///
/// Locks taken by the `*_locked`/`lock_*` calls are held until the
/// transaction ends. Writes become visible to other callers only on
/// `commit`; dropping the transaction rolls it back.
#[async_trait]
pub trait StoreTx: Send {
    /// Locks `(mentor_id, date)` and reports whether any slot-holding booking
    /// intersects `range`.
    async fn conflicts_locked(
        &mut self,
        mentor_id: Uuid,
        date: NaiveDate,
        range: TimeRange,
    ) -> Result<bool>;
    /// Callers must hold the `(mentor_id, date)` lock via `conflicts_locked`.
    async fn insert_booking(&mut self, booking: Booking) -> Result<()>;
    async fn lock_booking(&mut self, id: Uuid) -> Result<Option<Booking>>;
    /// Guarded transition: applies only while the booking is in `from`.
    async fn set_booking_status_if_current(
        &mut self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool>;
    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<Payment>>;
    async fn payment_for_booking(&mut self, booking_id: Uuid) -> Result<Option<Payment>>;
    async fn insert_payment(&mut self, payment: Payment) -> Result<()>;
    /// Guarded transition: applies only while the payment is in `from`.
    async fn settle_payment_if_current(
        &mut self,
        id: Uuid,
        from: PaymentStatus,
        settlement: PaymentSettlement,
        at: DateTime<Utc>,
    ) -> Result<bool>;
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Opens an order with the external payment gateway. Not transactional.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, amount_cents: i64, currency: &str, receipt: &str)
    -> Result<String>;
}

/// Everything a storage adapter must provide to back an engine.
pub trait Backend:
    UserDirectory
    + MentorDirectory
    + ServiceCatalog
    + AvailabilityStore
    + BookingStore
    + PaymentStore
    + SessionStore
    + Transactor
{
}

impl<T> Backend for T where
    T: UserDirectory
        + MentorDirectory
        + ServiceCatalog
        + AvailabilityStore
        + BookingStore
        + PaymentStore
        + SessionStore
        + Transactor
{
}
