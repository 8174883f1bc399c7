//! File ingestion pipeline orchestration.
//!
//! Coordinates the full upload flow: file-type detection → canonicalization
//! (schema payloads) or extraction + chunking (free-text documents) →
//! common metadata stamping → routed write to the correct index backend.
//!
//! Schema files (`.sql`, `.json`, `.yaml`/`.yml`) land in the schema store;
//! document files (`.pdf`, `.txt`, `.md`) are chunked and land in the
//! document store. Ingesting a directory processes every regular file in
//! it, skipping individual failures with a logged error; ingesting a
//! single file propagates its failure to the caller.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};
use walkdir::WalkDir;

use crate::canonicalize::{stamp_common_metadata, SchemaCanonicalizer, SchemaType};
use crate::chunk::chunk_text;
use crate::config::Config;
use crate::model::{meta, ContentUnit, StoreClass};
use crate::router::HybridRouter;

/// File classification by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Sql,
    Json,
    Yaml,
    Pdf,
    Text,
    Markdown,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Sql => "sql",
            FileType::Json => "json",
            FileType::Yaml => "yaml",
            FileType::Pdf => "pdf",
            FileType::Text => "text",
            FileType::Markdown => "markdown",
        }
    }

    /// The schema payload type, for schema-class files.
    pub fn schema_type(&self) -> Option<SchemaType> {
        match self {
            FileType::Sql => Some(SchemaType::Sql),
            FileType::Json => Some(SchemaType::Json),
            FileType::Yaml => Some(SchemaType::Yaml),
            _ => None,
        }
    }
}

/// Error raised for files the pipeline does not understand.
#[derive(Debug)]
pub enum IngestError {
    UnsupportedExtension(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::UnsupportedExtension(ext) => {
                write!(f, "Unsupported file extension: {}", ext)
            }
        }
    }
}

impl std::error::Error for IngestError {}

/// Detect a file's type from its extension.
pub fn detect_file_type(path: &Path) -> Result<FileType, IngestError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "sql" => Ok(FileType::Sql),
        "json" => Ok(FileType::Json),
        "yaml" | "yml" => Ok(FileType::Yaml),
        "pdf" => Ok(FileType::Pdf),
        "txt" => Ok(FileType::Text),
        "md" | "markdown" => Ok(FileType::Markdown),
        other => Err(IngestError::UnsupportedExtension(other.to_string())),
    }
}

/// Counts reported after an ingest run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub files: usize,
    pub skipped: usize,
    pub schema_units: usize,
    pub document_units: usize,
    pub tables: usize,
    pub relationships: usize,
}

/// Run the ingest command and print a summary.
pub async fn run_ingest(
    config: &Config,
    router: &HybridRouter,
    path: &Path,
    dry_run: bool,
) -> Result<()> {
    let report = ingest_path(config, router, path, dry_run).await?;

    if dry_run {
        println!("ingest {} (dry-run)", path.display());
    } else {
        println!("ingest {}", path.display());
    }
    println!("  files processed: {}", report.files);
    println!("  schema units: {}", report.schema_units);
    println!("  document units: {}", report.document_units);
    if report.tables > 0 || report.relationships > 0 {
        println!("  tables parsed: {}", report.tables);
        println!("  relationships parsed: {}", report.relationships);
    }
    if report.skipped > 0 {
        println!("  skipped: {}", report.skipped);
    }
    println!("ok");
    Ok(())
}

/// Ingest a file or every regular file in a directory.
pub async fn ingest_path(
    config: &Config,
    router: &HybridRouter,
    path: &Path,
    dry_run: bool,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    if path.is_dir() {
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            match ingest_file(config, router, entry.path(), dry_run, &mut report).await {
                Ok(()) => report.files += 1,
                Err(e) => {
                    error!(file = %entry.path().display(), error = %e, "skipping file");
                    report.skipped += 1;
                }
            }
        }
    } else {
        ingest_file(config, router, path, dry_run, &mut report).await?;
        report.files = 1;
    }

    Ok(report)
}

/// Process a single file: canonicalize or chunk, stamp, and write.
async fn ingest_file(
    config: &Config,
    router: &HybridRouter,
    path: &Path,
    dry_run: bool,
    report: &mut IngestReport,
) -> Result<()> {
    let file_type = detect_file_type(path)?;
    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    info!(file = %source, kind = file_type.as_str(), "processing file");

    let (mut units, class) = match file_type.schema_type() {
        Some(schema_type) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            let units = schema_units_for(&content, schema_type, report)?;
            (units, StoreClass::Schema)
        }
        None => {
            let text = match file_type {
                FileType::Pdf => {
                    let bytes = std::fs::read(path)
                        .with_context(|| format!("Failed to read file: {}", path.display()))?;
                    pdf_extract::extract_text_from_mem(&bytes)
                        .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))?
                }
                _ => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read file: {}", path.display()))?,
            };
            (document_units(&text, config.chunking.max_tokens), StoreClass::Document)
        }
    };

    for unit in &mut units {
        unit.set_meta(meta::FILE_TYPE, file_type.as_str());
    }
    stamp_common_metadata(&mut units, &source, class, class == StoreClass::Schema);

    match class {
        StoreClass::Schema => report.schema_units += units.len(),
        _ => report.document_units += units.len(),
    }

    if !dry_run && !units.is_empty() {
        router.add_units(&units, class).await?;
    }

    info!(file = %source, units = units.len(), store = %class, "processed file");
    Ok(())
}

fn schema_units_for(
    content: &str,
    schema_type: SchemaType,
    report: &mut IngestReport,
) -> Result<Vec<ContentUnit>> {
    let canonicalizer = SchemaCanonicalizer::new();
    match schema_type {
        SchemaType::Sql => {
            let (model, units) = canonicalizer.canonicalize_sql(content)?;
            report.tables += model.tables.len();
            report.relationships += model.relationships.len();
            Ok(units)
        }
        other => Ok(canonicalizer.canonicalize(content, other)?),
    }
}

/// Chunk free text into document units with chunk-index metadata.
fn document_units(text: &str, max_tokens: usize) -> Vec<ContentUnit> {
    chunk_text(text, max_tokens)
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            ContentUnit::new(chunk)
                .with_meta(meta::TYPE, "document_chunk")
                .with_meta(meta::BUSINESS_CONTEXT, "documentation")
                .with_meta(meta::CHUNK_INDEX, index)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_file_type() {
        assert_eq!(
            detect_file_type(&PathBuf::from("schema.sql")).unwrap(),
            FileType::Sql
        );
        assert_eq!(
            detect_file_type(&PathBuf::from("data.JSON")).unwrap(),
            FileType::Json
        );
        assert_eq!(
            detect_file_type(&PathBuf::from("config.yml")).unwrap(),
            FileType::Yaml
        );
        assert_eq!(
            detect_file_type(&PathBuf::from("notes.md")).unwrap(),
            FileType::Markdown
        );
    }

    #[test]
    fn test_detect_unsupported_extension() {
        let err = detect_file_type(&PathBuf::from("report.docx")).unwrap_err();
        assert!(err.to_string().contains("docx"));

        assert!(detect_file_type(&PathBuf::from("no_extension")).is_err());
    }

    #[test]
    fn test_document_units_metadata() {
        let units = document_units("First paragraph.\n\nSecond paragraph.", 250);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].meta_str(meta::TYPE), Some("document_chunk"));
        assert_eq!(units[0].business_context(), Some("documentation"));
    }

    #[test]
    fn test_document_units_empty_text() {
        assert!(document_units("   ", 250).is_empty());
    }
}
