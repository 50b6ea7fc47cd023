//! Scoped acquisition
//!
//! A [`StoreGuard`] syncs its store when the scope that owns it ends. The
//! explicit [`StoreGuard::close`] returns the sync result; a guard that is
//! dropped instead (early return, `?`, panic) still syncs, but can only log
//! a failure. [`with_store`] wraps both so the caller always gets the error.

use std::ops::{Deref, DerefMut};
use std::path::Path;

use tracing::error;

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::store::Store;

/// Owns a [`Store`] and syncs it on release
#[derive(Debug)]
pub struct StoreGuard {
    store: Store,
    closed: bool,
}

impl StoreGuard {
    /// Open a store and guard it
    pub fn open(config: Config) -> Result<Self> {
        Store::open(config).map(Self::new)
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Config::new(path.as_ref()))
    }

    pub fn new(store: Store) -> Self {
        Self {
            store,
            closed: false,
        }
    }

    /// Run the exit sync and report its outcome
    pub fn close(mut self) -> Result<bool> {
        self.closed = true;
        self.store.sync()
    }
}

impl Deref for StoreGuard {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

impl DerefMut for StoreGuard {
    fn deref_mut(&mut self) -> &mut Store {
        &mut self.store
    }
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.store.sync() {
            error!(
                path = %self.store.path().display(),
                error = %e,
                "sync on scope exit failed, unsynced changes were not persisted"
            );
        }
    }
}

/// Open the store at `config.path`, run `body`, then sync on every exit path
///
/// | body  | exit sync | result                       |
/// |-------|-----------|------------------------------|
/// | Ok    | Ok        | body's value                 |
/// | Ok    | Err       | sync error                   |
/// | Err   | Ok        | body error                   |
/// | Err   | Err       | `StoreError::ScopeExit`      |
///
/// If `body` panics the guard's drop still attempts the sync.
pub fn with_store<T, F>(config: Config, body: F) -> Result<T>
where
    F: FnOnce(&mut Store) -> Result<T>,
{
    let mut guard = StoreGuard::open(config)?;
    let outcome = body(&mut guard);
    let synced = guard.close();

    match (outcome, synced) {
        (Ok(value), Ok(_)) => Ok(value),
        (Ok(_), Err(sync)) => Err(sync),
        (Err(body), Ok(_)) => Err(body),
        (Err(body), Err(sync)) => Err(StoreError::ScopeExit {
            body: Box::new(body),
            sync: Box::new(sync),
        }),
    }
}
