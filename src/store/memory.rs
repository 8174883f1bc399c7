//! SQLite-backed conversation-memory index.
//!
//! The memory class stores Q/A exchanges and other session artifacts in a
//! SQLite database (`memory.sqlite`) inside the backend's directory, with
//! embedding vectors as little-endian f32 BLOBs. Unlike the snapshot
//! index, rows are appended individually; SQLite's journal provides the
//! flush atomicity boundary.
//!
//! Search fetches all vectors and ranks by cosine similarity in process,
//! applying the optional metadata filter before truncation. Reset drops
//! and recreates the tables.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::model::ContentUnit;

use super::{IndexBackend, MetadataFilter};

const DB_FILE: &str = "memory.sqlite";

/// SQLite-backed memory store.
pub struct SqliteMemoryIndex {
    db_path: PathBuf,
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteMemoryIndex {
    /// Open (or create) the memory database under `dir` and run migrations.
    pub async fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create memory directory: {}", dir.display()))?;

        let db_path = dir.join(DB_FILE);
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let index = Self {
            db_path,
            pool,
            embedder,
        };
        index.migrate().await?;
        info!(db = %index.db_path.display(), "memory store ready");
        Ok(index)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory_units (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                metadata_json TEXT NOT NULL DEFAULT '{}',
                content_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory_vectors (
                unit_id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL,
                model TEXT NOT NULL,
                dims INTEGER NOT NULL,
                FOREIGN KEY (unit_id) REFERENCES memory_units(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl IndexBackend for SqliteMemoryIndex {
    async fn add(&self, units: &[ContentUnit]) -> Result<()> {
        if units.is_empty() {
            warn!(db = %self.db_path.display(), "no units provided to add");
            return Ok(());
        }

        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != units.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                units.len()
            );
        }

        let created_at = chrono::Utc::now().timestamp();

        for (unit, vector) in units.iter().zip(vectors) {
            let id = Uuid::new_v4().to_string();
            let metadata_json = serde_json::to_string(&unit.metadata)?;

            let mut hasher = Sha256::new();
            hasher.update(unit.text.as_bytes());
            let content_hash = format!("{:x}", hasher.finalize());

            sqlx::query(
                "INSERT INTO memory_units (id, text, metadata_json, content_hash, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&unit.text)
            .bind(&metadata_json)
            .bind(&content_hash)
            .bind(created_at)
            .execute(&self.pool)
            .await?;

            sqlx::query(
                "INSERT INTO memory_vectors (unit_id, embedding, model, dims) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(vec_to_blob(&vector))
            .bind(self.embedder.model_name())
            .bind(vector.len() as i64)
            .execute(&self.pool)
            .await?;
        }

        info!(
            db = %self.db_path.display(),
            added = units.len(),
            "added units to memory store"
        );
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ContentUnit>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memory_units")
            .fetch_one(&self.pool)
            .await?;
        if total == 0 {
            debug!(db = %self.db_path.display(), "memory store is empty; nothing to search");
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response for query"))?;

        let rows = sqlx::query(
            r#"
            SELECT u.text, u.metadata_json, v.embedding
            FROM memory_units u
            JOIN memory_vectors v ON v.unit_id = u.id
            ORDER BY u.created_at, u.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(f64, ContentUnit)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let text: String = row.get("text");
            let metadata_json: String = row.get("metadata_json");
            let blob: Vec<u8> = row.get("embedding");

            let metadata =
                serde_json::from_str(&metadata_json).unwrap_or_else(|_| serde_json::Map::new());
            let unit = ContentUnit { text, metadata };

            if let Some(f) = filter {
                if !f.matches(&unit) {
                    continue;
                }
            }

            let vector = blob_to_vec(&blob);
            let score = cosine_similarity(&query_vec, &vector) as f64;
            scored.push((score, unit));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, unit)| unit).collect())
    }

    async fn reset(&self) -> Result<()> {
        sqlx::query("DROP TABLE IF EXISTS memory_vectors")
            .execute(&self.pool)
            .await?;
        sqlx::query("DROP TABLE IF EXISTS memory_units")
            .execute(&self.pool)
            .await?;
        self.migrate().await?;
        info!(db = %self.db_path.display(), "memory store reset");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memory_units")
            .fetch_one(&self.pool)
            .await?;
        Ok(total as usize)
    }

    async fn all_units(&self) -> Result<Vec<ContentUnit>> {
        let rows = sqlx::query(
            "SELECT text, metadata_json FROM memory_units ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let text: String = row.get("text");
                let metadata_json: String = row.get("metadata_json");
                let metadata = serde_json::from_str(&metadata_json)
                    .unwrap_or_else(|_| serde_json::Map::new());
                ContentUnit { text, metadata }
            })
            .collect())
    }
}
