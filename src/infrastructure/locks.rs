use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// The rows and row groups a transaction can hold exclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// Every booking of one mentor on one date.
    Slot(Uuid, NaiveDate),
    Booking(Uuid),
    Payment(Uuid),
    RefreshToken(Uuid),
}

pub type LockGuard = OwnedMutexGuard<()>;

const PRUNE_THRESHOLD: usize = 1024;

/// Per-key async mutexes, created on demand.
///
/// Exclusion is scoped to a single key: holders of different keys never wait
/// on each other. Entries nobody holds or waits on are pruned once the table
/// grows past a threshold.
#[derive(Default, Clone)]
pub struct LockTable {
    entries: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: LockKey) -> LockGuard {
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if entries.len() > PRUNE_THRESHOLD {
                entries.retain(|_, m| Arc::strong_count(m) > 1);
            }
            entries.entry(key).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
