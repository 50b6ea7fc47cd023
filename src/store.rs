//! Store Module
//!
//! The in-memory mapping and its persist protocol.
//!
//! ## Responsibilities
//! - Load the whole backing document on open (or create it when missing)
//! - Serve get/set/delete/iterate purely from memory
//! - Track whether anything changed since the last successful sync
//! - Rewrite the backing file atomically on sync
//!
//! ## Sync Protocol
//! ```text
//!   options != last synced options ──► dirty
//!   !dirty && !force ────────────────► return false
//!
//!   <dir>/<name>.XXXXXX   (NamedTempFile, same directory)
//!        │  encode + flush + fsync
//!        ▼
//!   rename over <dir>/<name> ──► fsync <dir> ──► dirty = false, return true
//! ```
//!
//! A crash before the rename leaves at most a stray temp file; the backing
//! file is always either the old or the new document.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::map::{Iter, Keys, Values};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::options::SerializeOptions;

/// A string-keyed JSON map held in memory and persisted to one file
///
/// ## Ownership Model
///
/// A `Store` is a plain single-owner value: reads borrow `&self`, mutations
/// need `&mut self`, and nothing is shared between threads. Two stores (or
/// two processes) opened on the same path will overwrite each other's
/// syncs; coordinating that is up to the caller.
#[derive(Debug)]
pub struct Store {
    /// Backing document
    path: PathBuf,

    /// Options used by `sync()`
    options: SerializeOptions,

    /// Full contents, always completely loaded
    entries: Map<String, Value>,

    /// Options of the last successful sync (`None` until the first write
    /// of a newly created store)
    synced_options: Option<SerializeOptions>,

    /// Mutated since the last successful sync
    dirty: bool,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On open:
    /// 1. Read the backing file in one go
    /// 2. If it is missing, start empty and force a sync so the file exists
    /// 3. Otherwise parse it; anything but a JSON object is a load error
    pub fn open(config: Config) -> Result<Self> {
        let Config { path, options } = config;

        let mut store = Self {
            path,
            options,
            entries: Map::new(),
            synced_options: None,
            dirty: false,
        };

        match fs::read(&store.path) {
            Ok(bytes) => {
                store.entries = codec::decode(&bytes).map_err(|e| StoreError::Load {
                    path: store.path.clone(),
                    reason: e.to_string(),
                })?;
                // The file on disk is what these options would have produced
                // as far as change detection is concerned.
                store.synced_options = Some(store.options.clone());

                debug!(
                    path = %store.path.display(),
                    entries = store.entries.len(),
                    "loaded store"
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let options = store.options.clone();
                store.sync_with(&options, true)?;
                info!(path = %store.path.display(), "created empty store");
            }
            Err(e) => {
                return Err(StoreError::Load {
                    path: store.path.clone(),
                    reason: e.to_string(),
                });
            }
        }

        Ok(store)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default serialization options
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Config::new(path.as_ref()))
    }

    // =========================================================================
    // Mapping Operations
    // =========================================================================

    /// Get the value stored under `key`
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.entries
            .get(key)
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Get the value under `key` decoded as `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        T::deserialize(value).map_err(|e| StoreError::TypeMismatch {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Like `get_as`, but a missing key yields `default`
    pub fn get_as_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        match self.entries.get(key) {
            Some(_) => self.get_as(key),
            None => Ok(default),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite `key`, returning the previous value
    ///
    /// The value is converted to JSON up front. Non-finite floats and
    /// anything serde_json refuses (non-string map keys, failing `Serialize`
    /// impls) are rejected; nothing is changed and the store stays as clean
    /// or dirty as it was.
    pub fn set<K, V>(&mut self, key: K, value: V) -> Result<Option<Value>>
    where
        K: Into<String>,
        V: Serialize,
    {
        let key = key.into();
        if let Err(e) = codec::check_representable(&value) {
            return Err(StoreError::UnrepresentableValue {
                key,
                reason: e.to_string(),
            });
        }
        let value = serde_json::to_value(value).map_err(|e| StoreError::UnrepresentableValue {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        self.dirty = true;
        Ok(self.entries.insert(key, value))
    }

    /// Remove `key`, returning its value
    pub fn delete(&mut self, key: &str) -> Result<Value> {
        let value = self
            .entries
            .shift_remove(key)
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;
        self.dirty = true;
        Ok(value)
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }

    /// Iterate over the in-memory entries, unsynced changes included
    pub fn iter(&self) -> Iter<'_> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Keys<'_> {
        self.entries.keys()
    }

    pub fn values(&self) -> Values<'_> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The whole in-memory map
    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write the store to disk if anything changed, with the configured options
    ///
    /// Returns whether the file was rewritten.
    pub fn sync(&mut self) -> Result<bool> {
        let options = self.options.clone();
        self.sync_with(&options, false)
    }

    /// Write the store with `options`, or unconditionally when `force` is set
    ///
    /// `options` apply to this write only; the configured defaults are left
    /// alone. A later `sync()` with different defaults writes again.
    ///
    /// On error the backing file and the entries are untouched and the store
    /// stays dirty, so the call can simply be retried.
    pub fn sync_with(&mut self, options: &SerializeOptions, force: bool) -> Result<bool> {
        if self.synced_options.as_ref() != Some(options) {
            self.dirty = true;
        }

        if !self.dirty && !force {
            debug!(path = %self.path.display(), "store unchanged, skipping sync");
            return Ok(false);
        }

        let temp = self.write_temp(options)?;
        self.replace_with(temp)?;

        self.synced_options = Some(options.clone());
        self.dirty = false;

        debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            forced = force,
            "synced store"
        );
        Ok(true)
    }

    /// Sync and release the store
    pub fn close(mut self) -> Result<bool> {
        self.sync()
    }

    /// Encode the entries into a fully flushed temp file next to the backing file
    fn write_temp(&self, options: &SerializeOptions) -> Result<NamedTempFile> {
        let prefix = format!("{}.", self.file_name());
        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .tempfile_in(self.parent_dir())
            .map_err(|e| self.sync_error(e))?;

        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            codec::encode(&mut writer, &self.entries, options)
                .map_err(|e| self.sync_error(io::Error::from(e)))?;
            writer.flush().map_err(|e| self.sync_error(e))?;
        }

        // Keep the file mode of the document being replaced
        if let Ok(meta) = fs::metadata(&self.path) {
            temp.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| self.sync_error(e))?;
        }

        temp.as_file().sync_all().map_err(|e| self.sync_error(e))?;
        Ok(temp)
    }

    /// Rename `temp` over the backing file
    ///
    /// If the rename fails the temp file is dropped, which deletes it.
    fn replace_with(&self, temp: NamedTempFile) -> Result<()> {
        temp.persist(&self.path)
            .map_err(|e| self.sync_error(e.error))?;
        sync_dir(self.parent_dir());
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the configured serialization options
    pub fn options(&self) -> &SerializeOptions {
        &self.options
    }

    /// Replace the configured options
    ///
    /// Nothing is written here; the next `sync()` notices the change.
    pub fn set_options(&mut self, options: SerializeOptions) {
        self.options = options;
    }

    /// Whether the in-memory state has unsynced changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string())
    }

    fn sync_error(&self, source: io::Error) -> StoreError {
        StoreError::Sync {
            path: self.path.clone(),
            source,
        }
    }
}

impl<'a> IntoIterator for &'a Store {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Persist the rename itself. Failure here is logged, not returned: the new
/// document is already in place.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        warn!(dir = %dir.display(), error = %e, "failed to fsync store directory");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
