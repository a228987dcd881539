//! Read-only lookup facade over the storage adapter
//!
//! Both front ends go through this one type, so the error mapping happens in
//! exactly one place: not-found stays a normal negative outcome, everything
//! else collapses to an opaque internal error after the real cause is logged.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::TitleRecord;
use crate::store::Store;

pub struct Lookup {
    store: Arc<dyn Store>,
}

impl Lookup {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fetch and decode the record for `id`.
    ///
    /// An empty `id` is a caller error and never reaches the store. A blob
    /// that no longer decodes signals store corruption, not a caller mistake.
    pub fn get_by_id(&self, id: &str) -> Result<TitleRecord> {
        if id.is_empty() {
            return Err(Error::MissingId);
        }

        let bytes = self.store.get(id).map_err(|e| {
            tracing::error!(id, error = %e, "storage read failed");
            Error::Internal("storage read failed".to_string())
        })?;
        let Some(bytes) = bytes else {
            tracing::debug!(id, "title not found");
            return Err(Error::NotFound(id.to_string()));
        };

        TitleRecord::decode(&bytes).map_err(|e| {
            tracing::error!(id, error = %e, "stored record is corrupt");
            Error::Internal("stored record is corrupt".to_string())
        })
    }
}
