//! Core data models used throughout Schema Harness.
//!
//! These types represent the parsed relational schema, the canonical
//! indexable unit, and the store classes that route units to the correct
//! persistent index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single column within a [`Table`].
///
/// The declared type is carried as free text and is not validated against
/// any real SQL type system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub col_type: String,
    pub nullable: bool,
    pub is_primary: bool,
    pub is_foreign: bool,
}

/// A foreign-key constraint recorded on the referencing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// A cross-table relationship: `from_table.from_column -> to_table.to_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

/// A parsed `CREATE TABLE` definition.
///
/// Tables are never mutated after their owning statement finishes parsing,
/// except for foreign keys added by later `ALTER TABLE` statements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }
}

/// The complete output of a DDL parse: tables and relationships in
/// statement order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaModel {
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
}

impl SchemaModel {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.relationships.is_empty()
    }
}

/// Well-known metadata keys stamped on [`ContentUnit`]s.
pub mod meta {
    pub const SOURCE: &str = "source";
    pub const TYPE: &str = "type";
    pub const CONTENT_CLASS: &str = "content_class";
    pub const BUSINESS_CONTEXT: &str = "business_context";
    pub const ENTITY_TYPE: &str = "entity_type";
    pub const TABLE_NAME: &str = "table_name";
    pub const CONFIG_TYPE: &str = "config_type";
    pub const FILE_TYPE: &str = "file_type";
    pub const IS_SCHEMA: &str = "is_schema";
    pub const PROCESSED_AT: &str = "processed_at";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const QUESTION: &str = "question";
    pub const ANSWER: &str = "answer";
}

/// The canonical indexable entity: free text plus a flat metadata map.
///
/// One unit maps to exactly one embedding vector once indexed. Units are
/// never mutated after canonicalization stamps them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUnit {
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl ContentUnit {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Builder-style metadata insertion.
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Fetch a metadata value as a string slice, if present and a string.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn business_context(&self) -> Option<&str> {
        self.meta_str(meta::BUSINESS_CONTEXT)
    }

    pub fn source(&self) -> Option<&str> {
        self.meta_str(meta::SOURCE)
    }
}

/// Which persistent index a unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreClass {
    Document,
    Schema,
    Memory,
}

impl StoreClass {
    pub const ALL: [StoreClass; 3] = [StoreClass::Document, StoreClass::Schema, StoreClass::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreClass::Document => "document",
            StoreClass::Schema => "schema",
            StoreClass::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a store class name is outside the known set.
#[derive(Debug, Clone)]
pub struct InvalidStoreClass(pub String);

impl fmt::Display for InvalidStoreClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid store class: '{}'. Must be document, schema, or memory.",
            self.0
        )
    }
}

impl std::error::Error for InvalidStoreClass {}

impl FromStr for StoreClass {
    type Err = InvalidStoreClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(StoreClass::Document),
            "schema" => Ok(StoreClass::Schema),
            "memory" => Ok(StoreClass::Memory),
            other => Err(InvalidStoreClass(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_class_roundtrip() {
        for class in StoreClass::ALL {
            let parsed: StoreClass = class.as_str().parse().unwrap();
            assert_eq!(parsed, class);
        }
    }

    #[test]
    fn test_store_class_invalid() {
        let err = "vector".parse::<StoreClass>().unwrap_err();
        assert!(err.to_string().contains("vector"));
    }

    #[test]
    fn test_content_unit_meta() {
        let unit = ContentUnit::new("Table: users")
            .with_meta(meta::TABLE_NAME, "users")
            .with_meta(meta::BUSINESS_CONTEXT, "database_schema");
        assert_eq!(unit.meta_str(meta::TABLE_NAME), Some("users"));
        assert_eq!(unit.business_context(), Some("database_schema"));
        assert_eq!(unit.meta_str("missing"), None);
    }
}
