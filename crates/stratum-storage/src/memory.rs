//! In-memory implementation of [`CatalogStateApi`].
//!
//! [`InMemoryCatalog`] stands in for the backend's catalog state endpoint
//! in tests and dry runs. It keeps the blob behind a mutex with identical
//! whole-state get/set semantics, and can be switched offline or made to
//! reject writes to exercise failure paths.

use std::sync::Mutex;

use stratum_core::CatalogState;

use crate::error::StorageError;
use crate::traits::CatalogStateApi;

const STORE: &str = "catalog";

#[derive(Debug, Default)]
struct Inner {
    state: CatalogState,
    available: bool,
    reject_writes: bool,
    writes: usize,
}

/// In-memory catalog state endpoint.
#[derive(Debug)]
pub struct InMemoryCatalog {
    inner: Mutex<Inner>,
}

impl InMemoryCatalog {
    /// Creates a reachable endpoint holding an empty state.
    pub fn new() -> Self {
        Self::with_state(CatalogState::default())
    }

    pub fn with_state(state: CatalogState) -> Self {
        InMemoryCatalog {
            inner: Mutex::new(Inner {
                state,
                available: true,
                reject_writes: false,
                writes: 0,
            }),
        }
    }

    /// Makes every call fail as if the backend were down.
    pub fn set_available(&self, available: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.available = available;
        }
    }

    /// Makes `set` fail while `get` keeps working.
    pub fn set_reject_writes(&self, reject: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.reject_writes = reject;
        }
    }

    /// Returns a copy of the stored state, bypassing availability.
    pub fn snapshot(&self) -> CatalogState {
        self.inner
            .lock()
            .map(|inner| inner.state.clone())
            .unwrap_or_default()
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.writes).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::io(STORE, "catalog mutex poisoned"))
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStateApi for InMemoryCatalog {
    fn get(&self) -> Result<CatalogState, StorageError> {
        let inner = self.lock()?;
        if !inner.available {
            return Err(StorageError::io(STORE, "catalog endpoint unreachable"));
        }
        Ok(inner.state.clone())
    }

    fn set(&self, state: &CatalogState) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        if !inner.available {
            return Err(StorageError::io(STORE, "catalog endpoint unreachable"));
        }
        if inner.reject_writes {
            return Err(StorageError::io(STORE, "catalog endpoint rejected write"));
        }
        inner.state = state.clone();
        inner.writes += 1;
        Ok(())
    }
}
