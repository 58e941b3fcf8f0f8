use super::locks::{LockKey, LockTable};
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
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub const CF_USERS: &str = "users";
pub const CF_MENTORS: &str = "mentors";
pub const CF_SERVICES: &str = "services";
pub const CF_RULES: &str = "availability_rules";
pub const CF_BOOKINGS: &str = "bookings";
pub const CF_PAYMENTS: &str = "payments";
pub const CF_REFRESH_TOKENS: &str = "refresh_tokens";

const COLUMN_FAMILIES: [&str; 7] = [
    CF_USERS,
    CF_MENTORS,
    CF_SERVICES,
    CF_RULES,
    CF_BOOKINGS,
    CF_PAYMENTS,
    CF_REFRESH_TOKENS,
];

/// A persistent backend on RocksDB.
///
/// One column family per table, rows keyed by their UUID bytes and stored as
/// JSON. Secondary lookups (by mentor, by order id, by token hash) scan the
/// column family. Transactions share the in-process lock table and commit
/// through a single `WriteBatch`, so the store assumes one process owns the
/// database directory, which RocksDB's own file lock enforces.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    locks: LockTable,
}

impl RocksDBStore {
    /// Opens or creates a database at `path`, creating any missing column
    /// families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            locks: LockTable::new(),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| EngineError::internal(format!("column family '{name}' not found")))
    }

    fn get<T: DeserializeOwned>(&self, cf: &'static str, id: Uuid) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, cf: &'static str, id: Uuid, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, id.as_bytes(), bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(
        &self,
        cf: &'static str,
        mut keep: impl FnMut(&T) -> bool,
    ) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            let row: T = serde_json::from_slice(&value)?;
            if keep(&row) {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn find<T: DeserializeOwned>(
        &self,
        cf: &'static str,
        keep: impl FnMut(&T) -> bool,
    ) -> Result<Option<T>> {
        Ok(self.scan(cf, keep)?.into_iter().next())
    }

    fn revoke_locked(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        match self.get::<RefreshToken>(CF_REFRESH_TOKENS, id)? {
            Some(mut token) if token.revoked_at.is_none() => {
                token.revoked_at = Some(at);
                self.put(CF_REFRESH_TOKENS, id, &token)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl UserDirectory for RocksDBStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<UserAccount>> {
        self.get(CF_USERS, id)
    }

    async fn upsert_user(&self, user: UserAccount) -> Result<()> {
        self.put(CF_USERS, user.id, &user)
    }
}

#[async_trait]
impl MentorDirectory for RocksDBStore {
    async fn get_mentor(&self, id: Uuid) -> Result<Option<Mentor>> {
        self.get(CF_MENTORS, id)
    }

    async fn find_mentor_by_username(&self, username: &str) -> Result<Option<Mentor>> {
        self.find(CF_MENTORS, |m: &Mentor| m.username == username)
    }

    async fn upsert_mentor(&self, mentor: Mentor) -> Result<()> {
        self.put(CF_MENTORS, mentor.id, &mentor)
    }
}

#[async_trait]
impl ServiceCatalog for RocksDBStore {
    async fn get_service(&self, id: Uuid) -> Result<Option<MentorService>> {
        self.get(CF_SERVICES, id)
    }

    async fn upsert_service(&self, service: MentorService) -> Result<()> {
        self.put(CF_SERVICES, service.id, &service)
    }
}

#[async_trait]
impl AvailabilityStore for RocksDBStore {
    async fn rules_for_mentor_and_day(
        &self,
        mentor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Vec<AvailabilityRule>> {
        self.scan(CF_RULES, |r: &AvailabilityRule| {
            r.mentor_id == mentor_id && r.day_of_week == day_of_week
        })
    }

    async fn rules_for_mentor(&self, mentor_id: Uuid) -> Result<Vec<AvailabilityRule>> {
        self.scan(CF_RULES, |r: &AvailabilityRule| r.mentor_id == mentor_id)
    }

    async fn insert_rule(&self, rule: AvailabilityRule) -> Result<()> {
        self.put(CF_RULES, rule.id, &rule)
    }
}

#[async_trait]
impl BookingStore for RocksDBStore {
    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        self.get(CF_BOOKINGS, id)
    }

    async fn active_bookings_on(&self, mentor_id: Uuid, date: NaiveDate) -> Result<Vec<Booking>> {
        self.committed_active_bookings(mentor_id, date).await
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        self.scan(CF_BOOKINGS, |b: &Booking| b.user_id == user_id)
    }

    async fn bookings_for_mentor_with_status(
        &self,
        mentor_id: Uuid,
        status: BookingStatus,
    ) -> Result<Vec<Booking>> {
        self.scan(CF_BOOKINGS, |b: &Booking| {
            b.mentor_id == mentor_id && b.status == status
        })
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>> {
        self.get(CF_PAYMENTS, id)
    }

    async fn find_by_gateway_order_id(&self, order_id: &str) -> Result<Option<Payment>> {
        self.find(CF_PAYMENTS, |p: &Payment| p.gateway_order_id == order_id)
    }

    async fn payment_for_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        self.find(CF_PAYMENTS, |p: &Payment| p.booking_id == booking_id)
    }
}

#[async_trait]
impl SessionStore for RocksDBStore {
    async fn insert_refresh_token(&self, token: RefreshToken) -> Result<()> {
        self.put(CF_REFRESH_TOKENS, token.id, &token)
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        self.find(CF_REFRESH_TOKENS, |t: &RefreshToken| {
            t.token_hash == token_hash
        })
    }

    async fn revoke_if_active(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let _guard = self.locks.acquire(LockKey::RefreshToken(id)).await;
        self.revoke_locked(id, at)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<usize> {
        let active = self.scan(CF_REFRESH_TOKENS, |t: &RefreshToken| {
            t.user_id == user_id && t.revoked_at.is_none()
        })?;
        let mut revoked = 0;
        for token in active {
            let _guard = self.locks.acquire(LockKey::RefreshToken(token.id)).await;
            if self.revoke_locked(token.id, at)? {
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[async_trait]
impl CommittedView for RocksDBStore {
    async fn committed_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        self.get(CF_BOOKINGS, id)
    }

    async fn committed_active_bookings(
        &self,
        mentor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Booking>> {
        self.scan(CF_BOOKINGS, |b: &Booking| {
            b.mentor_id == mentor_id && b.booking_date == date && b.status.holds_slot()
        })
    }

    async fn committed_payment(&self, id: Uuid) -> Result<Option<Payment>> {
        self.get(CF_PAYMENTS, id)
    }

    async fn committed_payment_for_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        self.find(CF_PAYMENTS, |p: &Payment| p.booking_id == booking_id)
    }

    async fn apply_writes(&self, writes: StagedWrites) -> Result<()> {
        let mut batch = WriteBatch::default();
        let bookings = self.cf(CF_BOOKINGS)?;
        for booking in &writes.bookings {
            batch.put_cf(bookings, booking.id.as_bytes(), serde_json::to_vec(booking)?);
        }
        let payments = self.cf(CF_PAYMENTS)?;
        for payment in &writes.payments {
            batch.put_cf(payments, payment.id.as_bytes(), serde_json::to_vec(payment)?);
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl Transactor for RocksDBStore {
    async fn begin_serializable(&self) -> Result<Box<dyn StoreTx>> {
        Ok(Box::new(LockingTx::new(
            Arc::new(self.clone()),
            self.locks.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::{parse_clock, parse_date};
    use crate::domain::user::Role;
    use chrono::Duration;
    use tempfile::tempdir;

    fn booking(mentor_id: Uuid) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            mentor_id,
            user_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            booking_date: parse_date("2025-01-06").unwrap(),
            start_time: parse_clock("10:00").unwrap(),
            end_time: parse_clock("11:00").unwrap(),
            status: BookingStatus::Pending,
            price_cents: 1000,
            currency: "INR".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");
        for name in COLUMN_FAMILIES {
            assert!(store.db.cf_handle(name).is_some(), "missing {name}");
        }
    }

    #[tokio::test]
    async fn test_rocksdb_directory_rows() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let user = UserAccount {
            id: Uuid::new_v4(),
            username: "ravi".to_string(),
            role: Role::User,
            is_active: true,
        };
        store.upsert_user(user.clone()).await.unwrap();
        assert_eq!(store.get_user(user.id).await.unwrap(), Some(user));
        assert!(store.get_user(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_commit_survives_reopen() {
        let dir = tempdir().unwrap();
        let b = booking(Uuid::new_v4());
        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            let mut tx = store.begin_serializable().await.unwrap();
            assert!(
                !tx.conflicts_locked(b.mentor_id, b.booking_date, b.range())
                    .await
                    .unwrap()
            );
            tx.insert_booking(b.clone()).await.unwrap();
            tx.commit().await.unwrap();
        }

        let store = RocksDBStore::open(dir.path()).unwrap();
        assert_eq!(store.get_booking(b.id).await.unwrap(), Some(b.clone()));
        let active = store
            .active_bookings_on(b.mentor_id, b.booking_date)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_rocksdb_revoke() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let token = RefreshToken::new(user, "hash".into(), now, Duration::days(10));
        store.insert_refresh_token(token.clone()).await.unwrap();
        store
            .insert_refresh_token(RefreshToken::new(user, "other".into(), now, Duration::days(10)))
            .await
            .unwrap();

        assert!(store.revoke_if_active(token.id, now).await.unwrap());
        assert!(!store.revoke_if_active(token.id, now).await.unwrap());
        assert_eq!(store.revoke_all_for_user(user, now).await.unwrap(), 1);
        assert!(store.find_by_hash("hash").await.unwrap().unwrap().is_revoked());
    }
}
