//! Schema canonicalization: raw schema payloads to indexable [`ContentUnit`]s.
//!
//! Three declared types are supported. SQL DDL is delegated to the
//! [`DdlParser`] and rendered one unit per table (plus an aggregate
//! relationships unit). JSON payloads are treated as business-entity
//! collections and rendered one unit per entity. YAML payloads are treated
//! as configuration and rendered one unit per top-level key.
//!
//! Malformed-but-parseable shapes (a JSON top-level scalar, entities that
//! are not mappings) yield zero units rather than an error; only invalid
//! syntax fails. All units are tagged with a business-context label so
//! the retrieval layer can rank them contextually.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::ddl::{DdlParser, ParseError};
use crate::model::{meta, ContentUnit, SchemaModel, StoreClass};

/// Declared schema payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Sql,
    Json,
    Yaml,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Sql => "sql",
            SchemaType::Json => "json",
            SchemaType::Yaml => "yaml",
        }
    }
}

impl FromStr for SchemaType {
    type Err = CanonicalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sql" => Ok(SchemaType::Sql),
            "json" => Ok(SchemaType::Json),
            "yaml" | "yml" => Ok(SchemaType::Yaml),
            other => Err(CanonicalizeError::UnsupportedType(other.to_string())),
        }
    }
}

/// Canonicalization failure.
#[derive(Debug)]
pub enum CanonicalizeError {
    UnsupportedType(String),
    Sql(ParseError),
    Json(String),
    Yaml(String),
}

impl fmt::Display for CanonicalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalizeError::UnsupportedType(t) => {
                write!(f, "Unsupported schema type: {}", t)
            }
            CanonicalizeError::Sql(e) => write!(f, "Error parsing SQL schema: {}", e),
            CanonicalizeError::Json(e) => write!(f, "Error parsing JSON schema: {}", e),
            CanonicalizeError::Yaml(e) => write!(f, "Error parsing YAML schema: {}", e),
        }
    }
}

impl std::error::Error for CanonicalizeError {}

impl From<ParseError> for CanonicalizeError {
    fn from(e: ParseError) -> Self {
        CanonicalizeError::Sql(e)
    }
}

/// Turns schema payloads into content units.
#[derive(Debug, Default)]
pub struct SchemaCanonicalizer {
    parser: DdlParser,
}

impl SchemaCanonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalize `content` according to its declared type.
    pub fn canonicalize(
        &self,
        content: &str,
        schema_type: SchemaType,
    ) -> Result<Vec<ContentUnit>, CanonicalizeError> {
        match schema_type {
            SchemaType::Sql => Ok(self.canonicalize_sql(content)?.1),
            SchemaType::Json => self.json_units(content),
            SchemaType::Yaml => self.yaml_units(content),
        }
    }

    /// SQL path, also returning the parsed model for reporting.
    pub fn canonicalize_sql(
        &self,
        content: &str,
    ) -> Result<(SchemaModel, Vec<ContentUnit>), CanonicalizeError> {
        let model = self.parser.parse(content)?;
        let units = schema_units(&model);
        Ok((model, units))
    }

    fn json_units(&self, content: &str) -> Result<Vec<ContentUnit>, CanonicalizeError> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| CanonicalizeError::Json(e.to_string()))?;

        let mut units = Vec::new();
        let Value::Object(top) = value else {
            return Ok(units);
        };

        for section in top.values() {
            let Value::Object(section) = section else {
                continue;
            };
            for (entity_type, entities) in section {
                let Value::Array(entities) = entities else {
                    continue;
                };
                for entity in entities {
                    let Value::Object(fields) = entity else {
                        continue;
                    };
                    units.push(entity_unit(entity_type, fields));
                }
            }
        }

        Ok(units)
    }

    fn yaml_units(&self, content: &str) -> Result<Vec<ContentUnit>, CanonicalizeError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| CanonicalizeError::Yaml(e.to_string()))?;

        let mut units = Vec::new();
        let serde_yaml::Value::Mapping(map) = value else {
            return Ok(units);
        };

        for (key, val) in &map {
            let Some(key) = yaml_key(key) else {
                continue;
            };

            let text = match val {
                serde_yaml::Value::Mapping(section) => {
                    let mut lines = vec![format!("{} Configuration:", capitalize(&key))];
                    for (sub_key, sub_val) in section {
                        let sub_key = yaml_key(sub_key).unwrap_or_default();
                        lines.push(format!("{}: {}", sub_key, yaml_value_display(sub_val)));
                    }
                    lines.join("\n")
                }
                other => format!("{}: {}", key, yaml_value_display(other)),
            };

            units.push(
                ContentUnit::new(text)
                    .with_meta(meta::TYPE, "yaml_config")
                    .with_meta(meta::BUSINESS_CONTEXT, "configuration")
                    .with_meta(meta::CONFIG_TYPE, key)
                    .with_meta(meta::FILE_TYPE, "yaml"),
            );
        }

        Ok(units)
    }
}

/// Render a parsed [`SchemaModel`] into content units: one per table, plus
/// one aggregate unit describing all relationships when any exist.
pub fn schema_units(model: &SchemaModel) -> Vec<ContentUnit> {
    let mut units = Vec::new();

    for table in &model.tables {
        let mut text = format!("Table: {}\nColumns:\n", table.name);
        for column in &table.columns {
            text.push_str(&format!("- {} ({})", column.name, column.col_type));
            if column.is_primary {
                text.push_str(" [Primary Key]");
            }
            if !column.nullable {
                text.push_str(" [Not Null]");
            }
            text.push('\n');
        }

        units.push(
            ContentUnit::new(text)
                .with_meta(meta::TYPE, "sql_table")
                .with_meta(meta::BUSINESS_CONTEXT, "database_schema")
                .with_meta(meta::TABLE_NAME, table.name.clone())
                .with_meta(meta::FILE_TYPE, "sql"),
        );
    }

    if !model.relationships.is_empty() {
        let mut text = String::from("Table Relationships:\n");
        for rel in &model.relationships {
            text.push_str(&format!(
                "- {}.{} -> {}.{}\n",
                rel.from_table, rel.from_column, rel.to_table, rel.to_column
            ));
        }
        units.push(
            ContentUnit::new(text)
                .with_meta(meta::TYPE, "sql_relationships")
                .with_meta(meta::BUSINESS_CONTEXT, "database_schema")
                .with_meta(meta::FILE_TYPE, "sql"),
        );
    }

    units
}

/// Stamp the metadata common to every canonicalization path.
pub fn stamp_common_metadata(
    units: &mut [ContentUnit],
    source: &str,
    class: StoreClass,
    is_schema: bool,
) {
    let processed_at = chrono::Utc::now().to_rfc3339();
    for unit in units {
        unit.set_meta(meta::SOURCE, source);
        unit.set_meta(meta::CONTENT_CLASS, class.as_str());
        unit.set_meta(meta::IS_SCHEMA, is_schema);
        unit.set_meta(meta::PROCESSED_AT, processed_at.clone());
    }
}

fn entity_unit(entity_type: &str, fields: &serde_json::Map<String, Value>) -> ContentUnit {
    let mut lines = vec![format!("{} Details:", capitalize(entity_type))];

    for (key, value) in fields {
        match value {
            Value::Object(_) => {
                let block = serde_json::to_string_pretty(value).unwrap_or_default();
                lines.push(format!("{}: {}", key, block));
            }
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .map(json_value_display)
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(format!("{}: {}", key, joined));
            }
            scalar => lines.push(format!("{}: {}", key, json_value_display(scalar))),
        }
    }

    ContentUnit::new(lines.join("\n"))
        .with_meta(meta::TYPE, entity_type)
        .with_meta(meta::BUSINESS_CONTEXT, "customer_data")
        .with_meta(meta::ENTITY_TYPE, entity_type)
        .with_meta(meta::FILE_TYPE, "json")
}

fn json_value_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn yaml_key(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn yaml_value_display(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_json_entities() {
        let content = r#"{"data": {"clients": [{"name": "Acme", "tier": "gold"}]}}"#;
        let units = SchemaCanonicalizer::new()
            .canonicalize(content, SchemaType::Json)
            .unwrap();

        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.business_context(), Some("customer_data"));
        assert_eq!(unit.meta_str(meta::ENTITY_TYPE), Some("clients"));
        assert!(unit.text.contains("Acme"));
        assert!(unit.text.contains("gold"));
    }

    #[test]
    fn test_json_multiple_entity_types() {
        let content = r#"{
            "data": {
                "clients": [{"name": "Acme"}, {"name": "Globex"}],
                "services": [{"name": "hosting", "tiers": ["basic", "pro"]}]
            }
        }"#;
        let units = SchemaCanonicalizer::new()
            .canonicalize(content, SchemaType::Json)
            .unwrap();

        assert_eq!(units.len(), 3);
        let service = units
            .iter()
            .find(|u| u.meta_str(meta::ENTITY_TYPE) == Some("services"))
            .unwrap();
        assert!(service.text.contains("basic, pro"));
    }

    #[test]
    fn test_json_unexpected_shapes_yield_nothing() {
        let canonicalizer = SchemaCanonicalizer::new();
        for content in [r#"{"data": "flat"}"#, r#"[1, 2, 3]"#, r#""scalar""#] {
            let units = canonicalizer.canonicalize(content, SchemaType::Json).unwrap();
            assert!(units.is_empty(), "expected no units for {}", content);
        }
    }

    #[test]
    fn test_json_invalid_syntax_errors() {
        let err = SchemaCanonicalizer::new()
            .canonicalize("{not json", SchemaType::Json)
            .unwrap_err();
        assert!(matches!(err, CanonicalizeError::Json(_)));
    }

    #[test]
    fn test_yaml_config_units() {
        let content = "server:\n  host: localhost\n  port: 8080\ndebug: true\n";
        let units = SchemaCanonicalizer::new()
            .canonicalize(content, SchemaType::Yaml)
            .unwrap();

        assert_eq!(units.len(), 2);
        let server = units
            .iter()
            .find(|u| u.meta_str(meta::CONFIG_TYPE) == Some("server"))
            .unwrap();
        assert!(server.text.starts_with("Server Configuration:"));
        assert!(server.text.contains("port: 8080"));
        assert_eq!(server.business_context(), Some("configuration"));

        let debug = units
            .iter()
            .find(|u| u.meta_str(meta::CONFIG_TYPE) == Some("debug"))
            .unwrap();
        assert_eq!(debug.text, "debug: true");
    }

    #[test]
    fn test_yaml_invalid_syntax_errors() {
        let err = SchemaCanonicalizer::new()
            .canonicalize("key: [unclosed", SchemaType::Yaml)
            .unwrap_err();
        assert!(matches!(err, CanonicalizeError::Yaml(_)));
    }

    #[test]
    fn test_sql_units_render_tables_and_relationships() {
        let sql = "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(50) NOT NULL); \
                   CREATE TABLE posts (id INT PRIMARY KEY, user_id INT, \
                   FOREIGN KEY (user_id) REFERENCES users(id));";
        let (model, units) = SchemaCanonicalizer::new().canonicalize_sql(sql).unwrap();

        assert_eq!(model.tables.len(), 2);
        // Two table units plus one relationships unit.
        assert_eq!(units.len(), 3);

        let users = units
            .iter()
            .find(|u| u.meta_str(meta::TABLE_NAME) == Some("users"))
            .unwrap();
        assert!(users.text.contains("Table: users"));
        assert!(users.text.contains("- id (INT) [Primary Key]"));
        assert!(users.text.contains("- name (VARCHAR(50)) [Not Null]"));

        let rels = units
            .iter()
            .find(|u| u.meta_str(meta::TYPE) == Some("sql_relationships"))
            .unwrap();
        assert!(rels.text.contains("posts.user_id -> users.id"));
    }

    #[test]
    fn test_sql_table_names_roundtrip() {
        let sql = "CREATE TABLE alpha (id INT); CREATE TABLE beta (id INT); \
                   CREATE TABLE gamma (id INT);";
        let (model, units) = SchemaCanonicalizer::new().canonicalize_sql(sql).unwrap();

        let model_names: BTreeSet<&str> =
            model.tables.iter().map(|t| t.name.as_str()).collect();
        let unit_names: BTreeSet<&str> = units
            .iter()
            .filter_map(|u| u.meta_str(meta::TABLE_NAME))
            .collect();
        assert_eq!(model_names, unit_names);
    }

    #[test]
    fn test_schema_type_from_str() {
        assert_eq!("sql".parse::<SchemaType>().unwrap(), SchemaType::Sql);
        assert_eq!("yml".parse::<SchemaType>().unwrap(), SchemaType::Yaml);
        assert_eq!("YAML".parse::<SchemaType>().unwrap(), SchemaType::Yaml);
        assert!(matches!(
            "graphql".parse::<SchemaType>(),
            Err(CanonicalizeError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_stamp_common_metadata() {
        let mut units = vec![ContentUnit::new("Table: users")];
        stamp_common_metadata(&mut units, "schema.sql", StoreClass::Schema, true);

        let unit = &units[0];
        assert_eq!(unit.source(), Some("schema.sql"));
        assert_eq!(unit.meta_str(meta::CONTENT_CLASS), Some("schema"));
        assert_eq!(unit.metadata.get(meta::IS_SCHEMA), Some(&true.into()));
        assert!(unit.meta_str(meta::PROCESSED_AT).is_some());
    }
}
