use super::locks::{LockGuard, LockKey, LockTable};
use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::clock::TimeRange;
use crate::domain::payment::{Payment, PaymentSettlement, PaymentStatus};
use crate::domain::ports::StoreTx;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Rows a transaction wants written, applied all together at commit.
#[derive(Debug, Default)]
pub struct StagedWrites {
    pub bookings: Vec<Booking>,
    pub payments: Vec<Payment>,
}

impl StagedWrites {
    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty() && self.payments.is_empty()
    }
}

/// What a backend exposes to [`LockingTx`]: committed reads and one atomic
/// write of a whole transaction's rows.
#[async_trait]
pub trait CommittedView: Send + Sync + 'static {
    async fn committed_booking(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn committed_active_bookings(&self, mentor_id: Uuid, date: NaiveDate)
    -> Result<Vec<Booking>>;
    async fn committed_payment(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn committed_payment_for_booking(&self, booking_id: Uuid) -> Result<Option<Payment>>;
    async fn apply_writes(&self, writes: StagedWrites) -> Result<()>;
}

/// A serializable transaction built from per-key locks and staged writes.
///
/// Every row a transaction mutates is locked first, and every write stays in
/// the transaction until `commit`, so no other caller can observe or
/// interleave with a half-done unit of work. Dropping it releases the locks
/// and discards the staged rows.
pub struct LockingTx<V: CommittedView> {
    view: Arc<V>,
    locks: LockTable,
    held: HashMap<LockKey, LockGuard>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
}

impl<V: CommittedView> LockingTx<V> {
    pub fn new(view: Arc<V>, locks: LockTable) -> Self {
        Self {
            view,
            locks,
            held: HashMap::new(),
            bookings: HashMap::new(),
            payments: HashMap::new(),
        }
    }

    async fn lock(&mut self, key: LockKey) {
        if !self.held.contains_key(&key) {
            let guard = self.locks.acquire(key).await;
            self.held.insert(key, guard);
        }
    }

    fn holds(&self, key: LockKey) -> bool {
        self.held.contains_key(&key)
    }

    async fn current_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        match self.bookings.get(&id) {
            Some(staged) => Ok(Some(staged.clone())),
            None => self.view.committed_booking(id).await,
        }
    }

    async fn current_payment(&self, id: Uuid) -> Result<Option<Payment>> {
        match self.payments.get(&id) {
            Some(staged) => Ok(Some(staged.clone())),
            None => self.view.committed_payment(id).await,
        }
    }
}

#[async_trait]
impl<V: CommittedView> StoreTx for LockingTx<V> {
    async fn conflicts_locked(
        &mut self,
        mentor_id: Uuid,
        date: NaiveDate,
        range: TimeRange,
    ) -> Result<bool> {
        self.lock(LockKey::Slot(mentor_id, date)).await;

        let mut active: HashMap<Uuid, Booking> = self
            .view
            .committed_active_bookings(mentor_id, date)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();
        for staged in self.bookings.values() {
            if staged.mentor_id == mentor_id && staged.booking_date == date {
                active.insert(staged.id, staged.clone());
            }
        }

        Ok(active
            .values()
            .any(|b| b.status.holds_slot() && b.range().overlaps(&range)))
    }

    async fn insert_booking(&mut self, booking: Booking) -> Result<()> {
        if !self.holds(LockKey::Slot(booking.mentor_id, booking.booking_date)) {
            return Err(EngineError::internal(
                "booking inserted without holding its slot lock",
            ));
        }
        if self.current_booking(booking.id).await?.is_some() {
            return Err(EngineError::Conflict(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        self.lock(LockKey::Booking(booking.id)).await;
        self.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn lock_booking(&mut self, id: Uuid) -> Result<Option<Booking>> {
        self.lock(LockKey::Booking(id)).await;
        self.current_booking(id).await
    }

    async fn set_booking_status_if_current(
        &mut self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.lock(LockKey::Booking(id)).await;
        match self.current_booking(id).await? {
            Some(mut booking) if booking.status == from => {
                booking.status = to;
                booking.updated_at = at;
                self.bookings.insert(id, booking);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
        self.lock(LockKey::Payment(id)).await;
        self.current_payment(id).await
    }

    async fn payment_for_booking(&mut self, booking_id: Uuid) -> Result<Option<Payment>> {
        if let Some(staged) = self.payments.values().find(|p| p.booking_id == booking_id) {
            return Ok(Some(staged.clone()));
        }
        self.view.committed_payment_for_booking(booking_id).await
    }

    async fn insert_payment(&mut self, payment: Payment) -> Result<()> {
        if !self.holds(LockKey::Booking(payment.booking_id)) {
            return Err(EngineError::internal(
                "payment inserted without holding its booking lock",
            ));
        }
        if self.current_payment(payment.id).await?.is_some() {
            return Err(EngineError::Conflict(format!(
                "payment {} already exists",
                payment.id
            )));
        }
        self.lock(LockKey::Payment(payment.id)).await;
        self.payments.insert(payment.id, payment);
        Ok(())
    }

    async fn settle_payment_if_current(
        &mut self,
        id: Uuid,
        from: PaymentStatus,
        settlement: PaymentSettlement,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.lock(LockKey::Payment(id)).await;
        match self.current_payment(id).await? {
            Some(mut payment) if payment.status == from => {
                settlement.apply(&mut payment, at);
                self.payments.insert(id, payment);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let LockingTx {
            view,
            held,
            bookings,
            payments,
            ..
        } = *self;
        let writes = StagedWrites {
            bookings: bookings.into_values().collect(),
            payments: payments.into_values().collect(),
        };
        if !writes.is_empty() {
            view.apply_writes(writes).await?;
        }
        drop(held);
        Ok(())
    }
}
