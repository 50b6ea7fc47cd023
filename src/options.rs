//! Serialization options
//!
//! The options a store passes to the JSON encoder on every sync. They are a
//! plain comparable value: a sync with options that differ from the ones
//! used by the previous sync always rewrites the file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Order in which object keys are emitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyOrder {
    /// Keys appear in the order they were inserted (or loaded)
    #[default]
    Insertion,

    /// Keys are emitted sorted, recursively through nested objects
    Sorted,
}

/// Options controlling how the store document is written
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializeOptions {
    /// `None` writes compact single-line output, `Some(n)` indents by n spaces
    pub indent: Option<usize>,

    /// Key emission order
    pub key_order: KeyOrder,

    /// Escape every non-ASCII character as `\uXXXX` instead of writing UTF-8
    pub ensure_ascii: bool,

    /// Opaque format flags. Never interpreted by the store, only compared.
    pub flags: BTreeMap<String, String>,
}

impl SerializeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Multi-line output indented by `indent` spaces
    pub fn pretty(mut self, indent: usize) -> Self {
        self.indent = Some(indent);
        self
    }

    /// Single-line output
    pub fn compact(mut self) -> Self {
        self.indent = None;
        self
    }

    pub fn sort_keys(mut self, sorted: bool) -> Self {
        self.key_order = if sorted {
            KeyOrder::Sorted
        } else {
            KeyOrder::Insertion
        };
        self
    }

    pub fn ensure_ascii(mut self, escape: bool) -> Self {
        self.ensure_ascii = escape;
        self
    }

    /// Attach an opaque flag
    pub fn flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    pub fn sorts_keys(&self) -> bool {
        self.key_order == KeyOrder::Sorted
    }
}
