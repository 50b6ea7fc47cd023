//! # JsonStore
//!
//! A small durable key-value store for small datasets:
//! - Whole contents kept in memory as a JSON object
//! - One backing file, replaced atomically (temp file + rename) on sync
//! - Writes only when something changed, or when forced
//! - Scoped use that syncs on every exit path
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Caller (CLI, request handler, ...)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ get / set / delete / iter / len
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │        StoreGuard / with_store  (sync on scope exit)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Store  (Map + dirty flag)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ sync
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │    Codec    │ ───────► │  Temp file   │ ──rename──► store.json
//!   │ (options)   │          │ (same dir)   │
//!   └─────────────┘          └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use jsonstore::{with_store, Config};
//!
//! with_store(Config::new("votes.json"), |votes| {
//!     let count = votes.get_as::<u64>("krk").unwrap_or(0);
//!     votes.set("krk", count + 1)?;
//!     Ok(())
//! })?;
//! # Ok::<(), jsonstore::StoreError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod options;

pub mod codec;
pub mod store;
pub mod guard;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::Config;
pub use options::{KeyOrder, SerializeOptions};
pub use store::Store;
pub use guard::{with_store, StoreGuard};

pub use serde_json::{json, Map, Value};

/// Open (or create) the store at `path` with default options
pub fn open(path: impl AsRef<std::path::Path>) -> Result<Store> {
    Store::open_path(path)
}

// =============================================================================
// Version Info
// =============================================================================

/// Current version of JsonStore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
