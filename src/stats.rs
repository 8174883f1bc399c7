//! Store statistics and schema summary.
//!
//! Provides a quick overview of what's indexed: unit counts per store and
//! an aggregate view of the schema store (distinct table names and schema
//! content types). Used by `sqa stats` and `sqa summary` to give
//! confidence that ingests are landing where expected.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::config::Config;
use crate::model::{meta, StoreClass};
use crate::router::HybridRouter;

/// Aggregate view over the schema store.
#[derive(Debug, Default)]
pub struct SchemaSummary {
    pub tables: Vec<String>,
    pub schema_types: Vec<String>,
    pub unit_count: usize,
}

/// Collect distinct table names and content types from the schema store.
pub async fn schema_summary(router: &HybridRouter) -> Result<SchemaSummary> {
    let units = router.backend(StoreClass::Schema).all_units().await?;

    let mut tables = BTreeSet::new();
    let mut schema_types = BTreeSet::new();

    for unit in &units {
        if let Some(table) = unit.meta_str(meta::TABLE_NAME) {
            tables.insert(table.to_string());
        }
        if let Some(kind) = unit.meta_str(meta::TYPE) {
            schema_types.insert(kind.to_string());
        }
    }

    Ok(SchemaSummary {
        tables: tables.into_iter().collect(),
        schema_types: schema_types.into_iter().collect(),
        unit_count: units.len(),
    })
}

/// Run the stats command: print per-store unit counts.
pub async fn run_stats(config: &Config, router: &HybridRouter) -> Result<()> {
    let counts = router.counts().await?;

    println!("Schema Harness — Store Stats");
    println!("============================");
    println!();
    println!("  Index dir:   {}", config.storage.index_dir.display());
    println!("  Memory dir:  {}", config.storage.memory_dir.display());
    println!();
    for (class, count) in counts {
        println!("  {:<10} {}", format!("{}:", class), count);
    }
    println!();
    Ok(())
}

/// Run the summary command: print the schema-store aggregate view.
pub async fn run_summary(router: &HybridRouter) -> Result<()> {
    let summary = schema_summary(router).await?;

    println!("Schema Summary");
    println!("==============");
    println!();
    println!("  Units indexed: {}", summary.unit_count);
    println!();
    if summary.tables.is_empty() {
        println!("  Tables: (none)");
    } else {
        println!("  Tables:");
        for table in &summary.tables {
            println!("    - {}", table);
        }
    }
    println!();
    if summary.schema_types.is_empty() {
        println!("  Schema types: (none)");
    } else {
        println!("  Schema types: {}", summary.schema_types.join(", "));
    }
    println!();
    Ok(())
}
