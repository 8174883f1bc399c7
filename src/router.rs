//! Hybrid retrieval router.
//!
//! Owns the three persistent index backends — one per content class — and
//! routes writes and searches to them. The combined document search fans
//! out across the document and schema backends and concatenates the
//! per-backend orderings (document results first) without cross-backend
//! re-ranking; within a backend, ranking is the backend's native
//! similarity order.
//!
//! The router is an explicitly constructed value: callers build one (or
//! inject test doubles through [`HybridRouter::new`]) and pass it around,
//! rather than sharing a process-global instance.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::model::{ContentUnit, StoreClass};
use crate::store::flat::FlatIndex;
use crate::store::memory::SqliteMemoryIndex;
use crate::store::{IndexBackend, MetadataFilter};

/// Router over the document, schema, and memory backends.
pub struct HybridRouter {
    document: Box<dyn IndexBackend>,
    schema: Box<dyn IndexBackend>,
    memory: Box<dyn IndexBackend>,
}

impl HybridRouter {
    /// Construct a router from explicit backends (used by tests and
    /// embedders other than the configured one).
    pub fn new(
        document: Box<dyn IndexBackend>,
        schema: Box<dyn IndexBackend>,
        memory: Box<dyn IndexBackend>,
    ) -> Self {
        Self {
            document,
            schema,
            memory,
        }
    }

    /// Build the three configured backends: flat snapshot indexes for the
    /// document and schema classes, SQLite for memory. Loads persisted
    /// state where present, otherwise initializes empty stores.
    pub async fn open(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let schema_embedder = create_embedder(&config.embedding.for_schema())?;

        let document = FlatIndex::open(&config.storage.document_dir(), embedder.clone())
            .context("Failed to open document index")?;
        let schema = FlatIndex::open(&config.storage.schema_dir(), schema_embedder)
            .context("Failed to open schema index")?;
        let memory = SqliteMemoryIndex::open(&config.storage.memory_dir, embedder)
            .await
            .context("Failed to open memory store")?;

        Ok(Self::new(
            Box::new(document),
            Box::new(schema),
            Box::new(memory),
        ))
    }

    pub fn backend(&self, class: StoreClass) -> &dyn IndexBackend {
        match class {
            StoreClass::Document => self.document.as_ref(),
            StoreClass::Schema => self.schema.as_ref(),
            StoreClass::Memory => self.memory.as_ref(),
        }
    }

    /// Write a single unit to the backend for `class`.
    pub async fn add_unit(&self, unit: &ContentUnit, class: StoreClass) -> Result<()> {
        self.add_units(std::slice::from_ref(unit), class).await
    }

    /// Write a batch of units to the backend for `class`.
    pub async fn add_units(&self, units: &[ContentUnit], class: StoreClass) -> Result<()> {
        self.backend(class)
            .add(units)
            .await
            .with_context(|| format!("Error adding units to {} store", class))
    }

    /// Fan-out search.
    ///
    /// - `schema` and `memory` query their single backend.
    /// - `document` is the combined mode: both the document and schema
    ///   backends are queried at `k`, document results precede schema
    ///   results, and the concatenation is truncated to `k`.
    pub async fn search(
        &self,
        query: &str,
        class: StoreClass,
        k: usize,
    ) -> Result<Vec<ContentUnit>> {
        self.search_filtered(query, class, k, None).await
    }

    /// [`search`](Self::search) with an optional metadata filter, honored
    /// by the memory backend.
    pub async fn search_filtered(
        &self,
        query: &str,
        class: StoreClass,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ContentUnit>> {
        match class {
            StoreClass::Schema => self.schema.search(query, k, None).await,
            StoreClass::Memory => self.memory.search(query, k, filter).await,
            StoreClass::Document => {
                let mut results = self.document.search(query, k, None).await?;
                let schema_results = self.schema.search(query, k, None).await?;
                results.extend(schema_results);
                results.truncate(k);
                Ok(results)
            }
        }
        .with_context(|| format!("Error searching {} store", class))
    }

    /// Reset one backend to empty.
    pub async fn reset(&self, class: StoreClass) -> Result<()> {
        self.backend(class)
            .reset()
            .await
            .with_context(|| format!("Error clearing {} store", class))
    }

    /// Reset all three backends unconditionally.
    pub async fn reset_all(&self) -> Result<()> {
        for class in StoreClass::ALL {
            self.reset(class).await?;
        }
        Ok(())
    }

    /// Unit counts per class, in [`StoreClass::ALL`] order.
    pub async fn counts(&self) -> Result<[(StoreClass, usize); 3]> {
        Ok([
            (StoreClass::Document, self.document.count().await?),
            (StoreClass::Schema, self.schema.count().await?),
            (StoreClass::Memory, self.memory.count().await?),
        ])
    }
}
