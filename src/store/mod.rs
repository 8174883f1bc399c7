//! Persistent similarity-index abstraction.
//!
//! The [`IndexBackend`] trait defines the operations the router needs from
//! a persistent nearest-neighbor store: add, search, reset, and a couple of
//! introspection helpers. Each backend is bound to one storage directory
//! and one embedding model identity.
//!
//! Two implementations are provided:
//! - [`flat::FlatIndex`] — a snapshot-file index used for the document and
//!   schema classes; the whole index is flushed to disk on every add.
//! - [`memory::SqliteMemoryIndex`] — a SQLite-backed index used for the
//!   conversation-memory class, with optional metadata filtering.
//!
//! A backend moves through **uninitialized → loaded/empty → populated**;
//! `reset()` returns it directly to **empty** from any state. There is no
//! closing state — backends are simply replaced.

pub mod flat;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::model::ContentUnit;

/// Equality filter over unit metadata. All entries must match.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    fields: serde_json::Map<String, Value>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn matches(&self, unit: &ContentUnit) -> bool {
        self.fields
            .iter()
            .all(|(key, expected)| unit.metadata.get(key) == Some(expected))
    }
}

/// A persistent nearest-neighbor similarity store.
///
/// # Contract
///
/// | Method | Behavior |
/// |--------|----------|
/// | [`add`](IndexBackend::add) | Embeds and appends units, then flushes; warn-level no-op on an empty slice |
/// | [`search`](IndexBackend::search) | Top-k by similarity; empty vec (never an error) on an empty store |
/// | [`reset`](IndexBackend::reset) | Drops the backing store and reinitializes empty — destructive, irreversible |
/// | [`count`](IndexBackend::count) | Number of indexed units |
/// | [`all_units`](IndexBackend::all_units) | Every indexed unit, insertion order |
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Embed each unit's text and append the vectors + metadata to the
    /// persisted index, then flush to durable storage.
    async fn add(&self, units: &[ContentUnit]) -> Result<()>;

    /// Return the `k` nearest units to `query`, most similar first.
    ///
    /// An empty store short-circuits to an empty result without calling
    /// the embedding provider. The optional filter restricts candidates
    /// by metadata equality before truncation.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ContentUnit>>;

    /// Discard the backing store and reinitialize empty.
    async fn reset(&self) -> Result<()>;

    /// Number of units currently indexed.
    async fn count(&self) -> Result<usize>;

    /// All indexed units in insertion order (used for summaries).
    async fn all_units(&self) -> Result<Vec<ContentUnit>>;
}
