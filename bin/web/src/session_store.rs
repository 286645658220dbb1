//! In-memory session records that expire and get pruned.
//!
//! Every visitor who sees a form gets a session (it carries the CSRF token),
//! so records for abandoned sessions must not accumulate. Expired records
//! are hidden from `load` at once and removed by [`spawn_pruning`].

use axum::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tower_sessions::cookie::time::OffsetDateTime;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, ExpiredDeletion, SessionStore};
use tracing::debug;

#[derive(Clone, Debug, Default)]
pub struct ExpiringMemoryStore {
    records: Arc<Mutex<HashMap<Id, Record>>>,
}

impl ExpiringMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<Id, Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of records held, expired ones included
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired record and returns how many went
    pub fn prune(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut records = self.records();
        let before = records.len();
        records.retain(|_, record| is_active(record, now));
        let removed = before - records.len();
        if removed > 0 {
            debug!(removed, remaining = records.len(), "expired sessions pruned");
        }
        removed
    }
}

fn is_active(record: &Record, now: OffsetDateTime) -> bool {
    record.expiry_date > now
}

#[async_trait]
impl SessionStore for ExpiringMemoryStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let mut records = self.records();
        while records.contains_key(&record.id) {
            record.id = Id::default();
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.records().insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .records()
            .get(session_id)
            .filter(|record| is_active(record, now))
            .cloned())
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.records().remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for ExpiringMemoryStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        self.prune();
        Ok(())
    }
}

/// Prunes `store` every `period` for as long as the server runs
pub fn spawn_pruning(store: ExpiringMemoryStore, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = store.delete_expired().await {
                tracing::warn!(error = %e, "session pruning failed");
            }
        }
    })
}
