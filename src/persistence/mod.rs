//! Durable storage for analysis sessions
//!
//! Sessions are persisted as JSON values in a key-value store with a
//! separate summaries keyspace, so listing saved analyses never touches
//! part-result bodies.

pub mod rocks;

use crate::analysis::session::{AnalysisSession, SessionSummary};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

pub use rocks::RocksSessionStore;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("column family error: {0}")]
    ColumnFamily(String),

    #[error("store poisoned: {0}")]
    Poisoned(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Aggregate statistics over saved analyses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStatistics {
    pub total_analyses: usize,
    pub average_risk_score: f64,
    pub high_risk_analyses: usize,
}

/// Storage seam for analysis sessions
pub trait SessionStore: Send + Sync {
    /// Write the full session and its summary
    fn put(&self, session: &AnalysisSession) -> StorageResult<()>;

    /// Load a full session by id
    fn get(&self, id: &str) -> StorageResult<Option<AnalysisSession>>;

    /// All summaries, newest first; O(n) in sessions, no bodies read
    fn list(&self) -> StorageResult<Vec<SessionSummary>>;

    /// Remove a saved session; returns whether it existed
    fn delete(&self, id: &str) -> StorageResult<bool>;

    /// Summaries whose contract name contains the query (case-insensitive)
    fn search(&self, query: &str) -> StorageResult<Vec<SessionSummary>> {
        let needle = query.to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .filter(|s| s.contract_name.to_lowercase().contains(&needle))
            .collect())
    }

    /// Aggregate statistics over saved sessions
    fn statistics(&self) -> StorageResult<AnalysisStatistics> {
        let summaries = self.list()?;
        let scores: Vec<f64> = summaries.iter().filter_map(|s| s.overall_risk_score).collect();
        let average = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        Ok(AnalysisStatistics {
            total_analyses: summaries.len(),
            average_risk_score: average,
            high_risk_analyses: scores.iter().filter(|&&s| s >= 2.5).count(),
        })
    }
}

/// In-memory store for tests and ephemeral deployments
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, AnalysisSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, session: &AnalysisSession) -> StorageResult<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> StorageResult<Option<AnalysisSession>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        Ok(sessions.get(id).cloned())
    }

    fn list(&self) -> StorageResult<Vec<SessionSummary>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        let mut summaries: Vec<SessionSummary> = sessions.values().map(|s| s.summary()).collect();
        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    fn delete(&self, id: &str) -> StorageResult<bool> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        Ok(sessions.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::session::AnalysisBackend;
    use chrono::Utc;

    fn session(id: &str, name: &str) -> AnalysisSession {
        AnalysisSession::new(id, "c1", name, AnalysisBackend::Hybrid, vec![1], Utc::now())
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySessionStore::new();
        store.put(&session("a1", "NDA")).unwrap();

        let loaded = store.get("a1").unwrap().unwrap();
        assert_eq!(loaded.contract_name, "NDA");
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_and_search() {
        let store = MemorySessionStore::new();
        store.put(&session("a1", "Supply Agreement")).unwrap();
        store.put(&session("a2", "License Agreement")).unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
        let found = store.search("license").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a2");
    }

    #[test]
    fn test_delete() {
        let store = MemorySessionStore::new();
        store.put(&session("a1", "NDA")).unwrap();
        assert!(store.delete("a1").unwrap());
        assert!(!store.delete("a1").unwrap());
    }
}
