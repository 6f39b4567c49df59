//! History of past generations.
//!
//! The history is an in-memory list of [`HistoryRecord`]s ordered
//! most-recent-first, mirrored to durable storage as one JSON value. Every
//! change rewrites the whole stored list on the blocking pool. Storage
//! failures never lose the in-memory list; they are logged and the session
//! carries on.

use std::sync::Arc;

use crate::error::{Result, StudyError};
use crate::model::HistoryRecord;
use crate::storage::{spawn_storage_op, KeyValueStore, HISTORY_KEY};

/// Append-only list of generation records backed by a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct HistoryStore {
    records: Vec<HistoryRecord>,
    storage: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    /// Loads the history from `storage`.
    ///
    /// Missing, unreadable or malformed storage yields an empty history.
    #[must_use]
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let records = match storage.get(HISTORY_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<HistoryRecord>>(&json) {
                Ok(records) => {
                    tracing::debug!(records = records.len(), "Loaded history");
                    records
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stored history is malformed, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => {
                tracing::debug!("No stored history");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read history, starting empty");
                Vec::new()
            }
        };

        Self { records, storage }
    }

    /// Returns the records, most recent first.
    #[must_use]
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a record by id.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::RecordNotFound` if no record has that id.
    pub fn get(&self, id: i64) -> Result<&HistoryRecord> {
        self.records
            .iter()
            .find(|record| record.id == id)
            .ok_or(StudyError::RecordNotFound { id })
    }

    /// Prepends `record` and writes the whole list through to storage.
    ///
    /// If the record's id is not newer than the current head, it is bumped
    /// so ids stay unique and increasing. Returns the stored id. A failed
    /// write is logged; the record stays in memory.
    pub async fn append(&mut self, mut record: HistoryRecord) -> i64 {
        if let Some(head) = self.records.first() {
            if record.id <= head.id {
                record.id = head.id + 1;
            }
        }
        let id = record.id;
        self.records.insert(0, record);

        if let Err(e) = self.persist().await {
            tracing::warn!(error = %e, record_id = id, "Failed to persist history");
        }
        id
    }

    /// Empties the history and removes the stored entry.
    pub async fn clear(&mut self) {
        self.records.clear();
        let storage = Arc::clone(&self.storage);
        if let Err(e) = spawn_storage_op(HISTORY_KEY, move || storage.remove(HISTORY_KEY)).await {
            tracing::warn!(error = %e, "Failed to remove stored history");
        }
    }

    /// Serializes the whole list to storage.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Storage` if the write fails.
    pub async fn persist(&self) -> Result<()> {
        let json = serde_json::to_string(&self.records)
            .map_err(|e| StudyError::storage(HISTORY_KEY, e.to_string()))?;
        let storage = Arc::clone(&self.storage);
        spawn_storage_op(HISTORY_KEY, move || storage.set(HISTORY_KEY, &json)).await
    }
}
