use super::locks::LockTable;
use super::tx::{CommittedView, LockingTx, StagedWrites};
use crate::domain::availability::AvailabilityRule;
use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::mentor::{Mentor, MentorService};
use crate::domain::payment::Payment;
use crate::domain::ports::{
    AvailabilityStore, BookingStore, MentorDirectory, PaymentStore, ServiceCatalog, SessionStore,
    StoreTx, Transactor, UserDirectory,
};
use crate::domain::session::RefreshToken;
use crate::domain::user::UserAccount;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserAccount>,
    mentors: HashMap<Uuid, Mentor>,
    services: HashMap<Uuid, MentorService>,
    rules: HashMap<Uuid, AvailabilityRule>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
    refresh_tokens: HashMap<Uuid, RefreshToken>,
}

/// A thread-safe in-memory backend.
///
/// All tables sit behind one `Arc<RwLock<..>>`, so a committed transaction
/// becomes visible in a single step. Cloning shares the same tables and lock
/// table. Ideal for tests and one-shot CLI runs.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    locks: LockTable,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<UserAccount>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn upsert_user(&self, user: UserAccount) -> Result<()> {
        self.tables.write().await.users.insert(user.id, user);
        Ok(())
    }
}

#[async_trait]
impl MentorDirectory for InMemoryStore {
    async fn get_mentor(&self, id: Uuid) -> Result<Option<Mentor>> {
        Ok(self.tables.read().await.mentors.get(&id).cloned())
    }

    async fn find_mentor_by_username(&self, username: &str) -> Result<Option<Mentor>> {
        let tables = self.tables.read().await;
        Ok(tables
            .mentors
            .values()
            .find(|m| m.username == username)
            .cloned())
    }

    async fn upsert_mentor(&self, mentor: Mentor) -> Result<()> {
        self.tables.write().await.mentors.insert(mentor.id, mentor);
        Ok(())
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryStore {
    async fn get_service(&self, id: Uuid) -> Result<Option<MentorService>> {
        Ok(self.tables.read().await.services.get(&id).cloned())
    }

    async fn upsert_service(&self, service: MentorService) -> Result<()> {
        self.tables.write().await.services.insert(service.id, service);
        Ok(())
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryStore {
    async fn rules_for_mentor_and_day(
        &self,
        mentor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Vec<AvailabilityRule>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rules
            .values()
            .filter(|r| r.mentor_id == mentor_id && r.day_of_week == day_of_week)
            .cloned()
            .collect())
    }

    async fn rules_for_mentor(&self, mentor_id: Uuid) -> Result<Vec<AvailabilityRule>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rules
            .values()
            .filter(|r| r.mentor_id == mentor_id)
            .cloned()
            .collect())
    }

    async fn insert_rule(&self, rule: AvailabilityRule) -> Result<()> {
        self.tables.write().await.rules.insert(rule.id, rule);
        Ok(())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        self.committed_booking(id).await
    }

    async fn active_bookings_on(&self, mentor_id: Uuid, date: NaiveDate) -> Result<Vec<Booking>> {
        self.committed_active_bookings(mentor_id, date).await
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn bookings_for_mentor_with_status(
        &self,
        mentor_id: Uuid,
        status: BookingStatus,
    ) -> Result<Vec<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.mentor_id == mentor_id && b.status == status)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>> {
        self.committed_payment(id).await
    }

    async fn find_by_gateway_order_id(&self, order_id: &str) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .find(|p| p.gateway_order_id == order_id)
            .cloned())
    }

    async fn payment_for_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        self.committed_payment_for_booking(booking_id).await
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn insert_refresh_token(&self, token: RefreshToken) -> Result<()> {
        self.tables
            .write()
            .await
            .refresh_tokens
            .insert(token.id, token);
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        let tables = self.tables.read().await;
        Ok(tables
            .refresh_tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn revoke_if_active(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.refresh_tokens.get_mut(&id) {
            Some(token) if token.revoked_at.is_none() => {
                token.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let mut revoked = 0;
        for token in tables.refresh_tokens.values_mut() {
            if token.user_id == user_id && token.revoked_at.is_none() {
                token.revoked_at = Some(at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[async_trait]
impl CommittedView for InMemoryStore {
    async fn committed_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn committed_active_bookings(
        &self,
        mentor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| {
                b.mentor_id == mentor_id && b.booking_date == date && b.status.holds_slot()
            })
            .cloned()
            .collect())
    }

    async fn committed_payment(&self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn committed_payment_for_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .find(|p| p.booking_id == booking_id)
            .cloned())
    }

    async fn apply_writes(&self, writes: StagedWrites) -> Result<()> {
        let mut tables = self.tables.write().await;
        for booking in writes.bookings {
            tables.bookings.insert(booking.id, booking);
        }
        for payment in writes.payments {
            tables.payments.insert(payment.id, payment);
        }
        Ok(())
    }
}

#[async_trait]
impl Transactor for InMemoryStore {
    async fn begin_serializable(&self) -> Result<Box<dyn StoreTx>> {
        Ok(Box::new(LockingTx::new(
            Arc::new(self.clone()),
            self.locks.clone(),
        )))
    }
}
