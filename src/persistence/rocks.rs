//! RocksDB-backed session store
//!
//! Two column families: `sessions` holds full session JSON, `summaries`
//! holds listing entries. Writes go through a `WriteBatch` so the pair
//! stays consistent.

use super::{SessionStore, StorageError, StorageResult};
use crate::analysis::session::{AnalysisSession, SessionSummary};
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use tracing::info;

const CF_SESSIONS: &str = "sessions";
const CF_SUMMARIES: &str = "summaries";

/// Persistent session store
pub struct RocksSessionStore {
    db: DB,
}

impl RocksSessionStore {
    /// Open or create the store at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_SESSIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_SUMMARIES, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)?;
        info!(path = %path.as_ref().display(), "session store opened");
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> StorageResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamily(name.to_string()))
    }
}

impl SessionStore for RocksSessionStore {
    fn put(&self, session: &AnalysisSession) -> StorageResult<()> {
        let session_bytes = serde_json::to_vec(session)?;
        let summary_bytes = serde_json::to_vec(&session.summary())?;

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_SESSIONS)?, session.id.as_bytes(), session_bytes);
        batch.put_cf(self.cf(CF_SUMMARIES)?, session.id.as_bytes(), summary_bytes);
        self.db.write(batch)?;
        Ok(())
    }

    fn get(&self, id: &str) -> StorageResult<Option<AnalysisSession>> {
        let Some(bytes) = self.db.get_cf(self.cf(CF_SESSIONS)?, id.as_bytes())? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn list(&self) -> StorageResult<Vec<SessionSummary>> {
        let cf = self.cf(CF_SUMMARIES)?;
        let mut summaries = Vec::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = entry?;
            let summary: SessionSummary = serde_json::from_slice(&value)?;
            summaries.push(summary);
        }
        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    fn delete(&self, id: &str) -> StorageResult<bool> {
        let existed = self.db.get_cf(self.cf(CF_SUMMARIES)?, id.as_bytes())?.is_some();
        if existed {
            let mut batch = WriteBatch::default();
            batch.delete_cf(self.cf(CF_SESSIONS)?, id.as_bytes());
            batch.delete_cf(self.cf(CF_SUMMARIES)?, id.as_bytes());
            self.db.write(batch)?;
        }
        Ok(existed)
    }
}
