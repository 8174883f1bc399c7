//! # Schema Harness
//!
//! A schema-aware ingestion and retrieval engine for natural-language
//! question answering over database artifacts.
//!
//! Schema Harness ingests heterogeneous schema descriptions (SQL DDL,
//! JSON, YAML) and free-text documents, normalizes them into indexable
//! units, and answers questions by retrieving the most relevant units
//! from one of several independent persistent similarity indices.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────────┐
//! │ SQL/JSON/YAML│──▶│ Canonicalize   │──▶│ Schema index    │
//! │ PDF/TXT/MD   │──▶│ Extract+Chunk  │──▶│ Document index  │
//! └──────────────┘   └───────────────┘   │ Memory store    │
//!                                        └───────┬─────────┘
//!                                                │
//!                          question ──▶ HybridRouter ──▶ ranked answer
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sqa init                          # create the stores
//! sqa ingest schema.sql             # parse and index a DDL file
//! sqa ingest docs/                  # index a directory of documents
//! sqa ask "which tables reference users?"
//! sqa summary                       # tables and schema types indexed
//! sqa reset                         # wipe all stores
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`model`] | Core data types |
//! | [`ddl`] | SQL DDL parsing into a canonical schema model |
//! | [`canonicalize`] | Schema payloads to indexable content units |
//! | [`chunk`] | Free-text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Persistent similarity-index backends |
//! | [`router`] | Content-class routing and fan-out search |
//! | [`qa`] | Question classification, merge strategies, answering |
//! | [`ingest`] | File ingestion pipeline |
//! | [`stats`] | Store statistics and schema summary |

pub mod canonicalize;
pub mod chunk;
pub mod config;
pub mod ddl;
pub mod embedding;
pub mod ingest;
pub mod model;
pub mod qa;
pub mod router;
pub mod stats;
pub mod store;
