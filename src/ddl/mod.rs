//! DDL parsing: raw SQL text to a canonical [`SchemaModel`].
//!
//! The parser is deliberately lenient in what it accepts: it walks the
//! statement list produced by [`splitter`], handles `CREATE TABLE` and
//! `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY` statements, and skips
//! everything else (views, indexes, DML). It is not a validating SQL
//! parser — semantically invalid SQL that merely lacks the expected
//! keyword shapes yields an empty or partial model rather than an error.
//! A statement that breaks mid-extraction (unbalanced parentheses, a
//! `REFERENCES` clause with no resolvable target) aborts the parse with
//! a descriptive [`ParseError`].
//!
//! Identifier casing is preserved: keyword matching is done on an
//! ASCII-uppercased shadow of each statement while extraction reads the
//! original text.

pub mod splitter;

use std::fmt;

use tracing::{debug, warn};

use crate::model::{Column, ForeignKey, Relationship, SchemaModel, Table};

/// Error raised when DDL text cannot be tokenized or a required pattern
/// breaks mid-extraction.
#[derive(Debug, Clone)]
pub enum ParseError {
    UnterminatedComment,
    UnterminatedString,
    UnbalancedParens(String),
    MalformedReference(String),
    UnknownStatement(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnterminatedComment => write!(f, "unterminated block comment"),
            ParseError::UnterminatedString => write!(f, "unterminated string literal"),
            ParseError::UnbalancedParens(text) => {
                write!(f, "unbalanced parentheses in: {}", text)
            }
            ParseError::MalformedReference(text) => {
                write!(f, "malformed REFERENCES clause in: {}", text)
            }
            ParseError::UnknownStatement(text) => {
                write!(f, "unrecognized statement in strict mode: {}", text)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Parser behavior knobs.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// When true (the default), statements that are neither `CREATE TABLE`
    /// nor `ALTER TABLE ... ADD CONSTRAINT` are skipped. When false they
    /// are rejected with [`ParseError::UnknownStatement`].
    pub lenient: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self { lenient: true }
    }
}

/// Parses SQL DDL text into a [`SchemaModel`].
#[derive(Debug, Default)]
pub struct DdlParser {
    options: ParserOptions,
}

impl DdlParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Parse a full DDL document.
    ///
    /// Statements are processed in order; tables created by earlier
    /// statements are visible to later `ALTER TABLE` statements. An
    /// `ALTER TABLE` whose target table is unknown is dropped with a
    /// warning rather than an error.
    pub fn parse(&self, content: &str) -> Result<SchemaModel, ParseError> {
        let statements = splitter::split_statements(content)?;
        let mut model = SchemaModel::default();

        for stmt in &statements {
            let upper = stmt.to_ascii_uppercase();
            if upper.contains("CREATE TABLE") {
                self.parse_create_table(stmt, &upper, &mut model)?;
            } else if upper.contains("ALTER TABLE") && upper.contains("ADD CONSTRAINT") {
                self.parse_alter_table(stmt, &upper, &mut model)?;
            } else if self.options.lenient {
                debug!(statement = %truncate(stmt), "skipping unrecognized statement");
            } else {
                return Err(ParseError::UnknownStatement(truncate(stmt)));
            }
        }

        Ok(model)
    }

    fn parse_create_table(
        &self,
        stmt: &str,
        upper: &str,
        model: &mut SchemaModel,
    ) -> Result<(), ParseError> {
        let pos = match upper.find("CREATE TABLE") {
            Some(p) => p,
            None => return Ok(()),
        };

        let mut rest = stmt[pos + "CREATE TABLE".len()..].trim_start();
        if rest.to_ascii_uppercase().starts_with("IF NOT EXISTS") {
            rest = rest["IF NOT EXISTS".len()..].trim_start();
        }

        let (name, _) = match take_identifier(rest) {
            Some(found) => found,
            None => {
                warn!(statement = %truncate(stmt), "CREATE TABLE without a table name; skipping");
                return Ok(());
            }
        };

        let mut table = Table::new(&name);
        let mut relationships = Vec::new();

        if let Some(block) = splitter::first_paren_group(stmt)? {
            for fragment in splitter::split_top_level(&block, ',')? {
                self.parse_fragment(&fragment, &mut table, &mut relationships)?;
            }
        }

        // A table redefined later in the same file keeps its original position.
        match model.table_mut(&name) {
            Some(existing) => *existing = table,
            None => model.tables.push(table),
        }
        model.relationships.extend(relationships);
        Ok(())
    }

    /// Classify one comma-separated fragment of a column block: either a
    /// table-level constraint or a column definition.
    fn parse_fragment(
        &self,
        fragment: &str,
        table: &mut Table,
        relationships: &mut Vec<Relationship>,
    ) -> Result<(), ParseError> {
        let upper = fragment.to_ascii_uppercase();

        if upper.starts_with("PRIMARY KEY") {
            if let Some(group) = splitter::first_paren_group(fragment)? {
                for part in splitter::split_top_level(&group, ',')? {
                    if let Some((col_name, _)) = take_identifier(&part) {
                        if let Some(col) = table.columns.iter_mut().find(|c| c.name == col_name) {
                            col.is_primary = true;
                        }
                        table.primary_keys.push(col_name);
                    }
                }
            }
            return Ok(());
        }

        let is_fk_constraint = upper.starts_with("FOREIGN KEY")
            || (upper.starts_with("CONSTRAINT") && upper.contains("FOREIGN KEY"));
        if is_fk_constraint {
            let fk_pos = upper
                .find("FOREIGN KEY")
                .ok_or_else(|| ParseError::MalformedReference(fragment.to_string()))?;
            let after_fk = &fragment[fk_pos + "FOREIGN KEY".len()..];

            let col_group = splitter::first_paren_group(after_fk)?
                .ok_or_else(|| ParseError::MalformedReference(fragment.to_string()))?;
            let (from_column, _) = take_identifier(&col_group)
                .ok_or_else(|| ParseError::MalformedReference(fragment.to_string()))?;
            let (ref_table, ref_column) = parse_references(after_fk)?;

            if let Some(col) = table.columns.iter_mut().find(|c| c.name == from_column) {
                col.is_foreign = true;
            }
            table.foreign_keys.push(ForeignKey {
                column: from_column.clone(),
                ref_table: ref_table.clone(),
                ref_column: ref_column.clone(),
            });
            relationships.push(Relationship {
                from_table: table.name.clone(),
                from_column,
                to_table: ref_table,
                to_column: ref_column,
            });
            return Ok(());
        }

        // Other table-level constraints carry no column information.
        if upper.starts_with("CONSTRAINT")
            || upper.starts_with("UNIQUE")
            || upper.starts_with("CHECK")
            || upper.starts_with("KEY ")
            || upper.starts_with("INDEX")
        {
            return Ok(());
        }

        // Column definition.
        let (name, after_name) = match take_identifier(fragment) {
            Some(found) => found,
            None => return Ok(()),
        };
        let col_type = parse_type(after_name);
        let nullable = !upper.contains("NOT NULL");
        let is_primary = upper.contains("PRIMARY KEY");
        let is_foreign = upper.contains("REFERENCES");

        if is_primary {
            table.primary_keys.push(name.clone());
        }
        if is_foreign {
            let (ref_table, ref_column) = parse_references(fragment)?;
            table.foreign_keys.push(ForeignKey {
                column: name.clone(),
                ref_table: ref_table.clone(),
                ref_column: ref_column.clone(),
            });
            relationships.push(Relationship {
                from_table: table.name.clone(),
                from_column: name.clone(),
                to_table: ref_table,
                to_column: ref_column,
            });
        }

        table.columns.push(Column {
            name,
            col_type,
            nullable,
            is_primary,
            is_foreign,
        });
        Ok(())
    }

    /// `ALTER TABLE <t> ADD CONSTRAINT <name> FOREIGN KEY (<col>)
    /// REFERENCES <ref_table>(<ref_col>)` as one fixed shape.
    ///
    /// The constraint is applied only if the target table already exists
    /// in the model; forward references are dropped (observably) and are
    /// not retried after later `CREATE TABLE` statements.
    fn parse_alter_table(
        &self,
        stmt: &str,
        upper: &str,
        model: &mut SchemaModel,
    ) -> Result<(), ParseError> {
        if !upper.contains("FOREIGN KEY") {
            debug!(statement = %truncate(stmt), "ADD CONSTRAINT without FOREIGN KEY; skipping");
            return Ok(());
        }

        let pos = match upper.find("ALTER TABLE") {
            Some(p) => p,
            None => return Ok(()),
        };
        let (table_name, _) = match take_identifier(&stmt[pos + "ALTER TABLE".len()..]) {
            Some(found) => found,
            None => {
                warn!(statement = %truncate(stmt), "ALTER TABLE without a table name; skipping");
                return Ok(());
            }
        };

        let fk_pos = upper
            .find("FOREIGN KEY")
            .ok_or_else(|| ParseError::MalformedReference(truncate(stmt)))?;
        let after_fk = &stmt[fk_pos + "FOREIGN KEY".len()..];

        let col_group = splitter::first_paren_group(after_fk)?
            .ok_or_else(|| ParseError::MalformedReference(truncate(stmt)))?;
        let (from_column, _) = take_identifier(&col_group)
            .ok_or_else(|| ParseError::MalformedReference(truncate(stmt)))?;
        let (ref_table, ref_column) = parse_references(after_fk)?;

        match model.table_mut(&table_name) {
            Some(table) => {
                table.foreign_keys.push(ForeignKey {
                    column: from_column.clone(),
                    ref_table: ref_table.clone(),
                    ref_column: ref_column.clone(),
                });
                model.relationships.push(Relationship {
                    from_table: table_name,
                    from_column,
                    to_table: ref_table,
                    to_column: ref_column,
                });
            }
            None => {
                warn!(
                    table = %table_name,
                    "dropping ALTER TABLE constraint for unknown table"
                );
            }
        }
        Ok(())
    }
}

/// Extract `<ref_table>(<ref_column>)` following the `REFERENCES` keyword.
fn parse_references(fragment: &str) -> Result<(String, String), ParseError> {
    let upper = fragment.to_ascii_uppercase();
    let pos = upper
        .find("REFERENCES")
        .ok_or_else(|| ParseError::MalformedReference(fragment.to_string()))?;
    let after = &fragment[pos + "REFERENCES".len()..];

    let (ref_table, rest) = take_identifier(after)
        .ok_or_else(|| ParseError::MalformedReference(fragment.to_string()))?;
    let group = splitter::first_paren_group(rest)?
        .ok_or_else(|| ParseError::MalformedReference(fragment.to_string()))?;
    let (ref_column, _) = take_identifier(&group)
        .ok_or_else(|| ParseError::MalformedReference(fragment.to_string()))?;

    Ok((ref_table, ref_column))
}

/// Read the next identifier from `input`, skipping leading whitespace.
///
/// Handles `"quoted"`, `` `quoted` ``, and `[quoted]` identifiers; bare
/// identifiers are alphanumeric plus underscore. Returns the identifier
/// and the remaining text.
fn take_identifier(input: &str) -> Option<(String, &str)> {
    let trimmed = input.trim_start();
    let mut chars = trimmed.char_indices();

    let (quote_end, first) = match chars.next() {
        Some((_, c)) => (
            match c {
                '"' => Some('"'),
                '`' => Some('`'),
                '[' => Some(']'),
                _ => None,
            },
            c,
        ),
        None => return None,
    };

    if let Some(close) = quote_end {
        for (i, c) in chars {
            if c == close {
                return Some((trimmed[1..i].to_string(), &trimmed[i + close.len_utf8()..]));
            }
        }
        return None;
    }

    if !(first.is_alphanumeric() || first == '_') {
        return None;
    }

    let mut end = trimmed.len();
    for (i, c) in trimmed.char_indices() {
        if !(c.is_alphanumeric() || c == '_') {
            end = i;
            break;
        }
    }
    if end == 0 {
        return None;
    }
    Some((trimmed[..end].to_string(), &trimmed[end..]))
}

/// Extract the declared type from the text following a column name.
///
/// The type is free text: the first word plus any attached parenthesized
/// precision (`DECIMAL(10,2)`, `DECIMAL (10, 2)`) and the multi-word
/// suffixes `PRECISION` and `VARYING`. Scanning stops at the first
/// constraint keyword.
fn parse_type(input: &str) -> String {
    let words = paren_aware_words(input);
    let mut out = String::new();

    for (i, word) in words.iter().enumerate() {
        let upper = word.to_ascii_uppercase();
        if i == 0 {
            if is_constraint_word(&upper) {
                break;
            }
            out.push_str(word);
            continue;
        }
        if word.starts_with('(') {
            out.push_str(word);
            continue;
        }
        if upper == "PRECISION" || upper == "VARYING" {
            out.push(' ');
            out.push_str(word);
            continue;
        }
        break;
    }

    out
}

fn is_constraint_word(upper: &str) -> bool {
    matches!(
        upper,
        "NOT"
            | "NULL"
            | "PRIMARY"
            | "UNIQUE"
            | "REFERENCES"
            | "DEFAULT"
            | "CHECK"
            | "CONSTRAINT"
            | "COLLATE"
            | "GENERATED"
            | "AUTO_INCREMENT"
            | "AUTOINCREMENT"
            | "COMMENT"
            | "ON"
    )
}

/// Split on whitespace, keeping parenthesized groups glued to the word
/// they follow.
fn paren_aware_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;

    for c in input.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            c if c.is_whitespace() && depth <= 0 => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn truncate(stmt: &str) -> String {
    stmt.chars().take(80).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS_POSTS: &str = "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(50) NOT NULL); \
         CREATE TABLE posts (id INT PRIMARY KEY, user_id INT, \
         FOREIGN KEY (user_id) REFERENCES users(id));";

    #[test]
    fn test_users_posts_schema() {
        let model = DdlParser::new().parse(USERS_POSTS).unwrap();

        assert_eq!(model.tables.len(), 2);
        let users = model.table("users").unwrap();
        assert!(users.columns[0].is_primary);
        assert_eq!(users.columns[0].name, "id");
        assert_eq!(users.columns[1].col_type, "VARCHAR(50)");
        assert!(!users.columns[1].nullable);
        assert_eq!(users.primary_keys, vec!["id"]);

        let posts = model.table("posts").unwrap();
        assert_eq!(posts.columns.len(), 2);
        assert_eq!(posts.foreign_keys.len(), 1);
        assert!(posts.columns.iter().any(|c| c.name == "user_id" && c.is_foreign));

        assert_eq!(model.relationships.len(), 1);
        assert_eq!(
            model.relationships[0],
            Relationship {
                from_table: "posts".to_string(),
                from_column: "user_id".to_string(),
                to_table: "users".to_string(),
                to_column: "id".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_input_yields_empty_model() {
        let model = DdlParser::new().parse("").unwrap();
        assert!(model.is_empty());
    }

    #[test]
    fn test_keyword_free_input_yields_empty_model() {
        let model = DdlParser::new().parse("hello world; this is not sql;").unwrap();
        assert!(model.is_empty());
    }

    #[test]
    fn test_table_count_matches_create_count() {
        let sql = "CREATE TABLE a (x INT); CREATE TABLE b (y INT); \
                   CREATE VIEW v AS SELECT 1; CREATE TABLE c (z INT);";
        let model = DdlParser::new().parse(sql).unwrap();
        assert_eq!(model.tables.len(), 3);
        let names: Vec<&str> = model.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_inline_reference() {
        let sql = "CREATE TABLE orders (id INT PRIMARY KEY, \
                   customer_id INT REFERENCES customers(id));";
        let model = DdlParser::new().parse(sql).unwrap();
        let orders = model.table("orders").unwrap();
        assert!(orders.columns[1].is_foreign);
        assert_eq!(orders.foreign_keys[0].ref_table, "customers");
        assert_eq!(model.relationships.len(), 1);
        assert_eq!(model.relationships[0].from_column, "customer_id");
    }

    #[test]
    fn test_alter_table_resolved() {
        let sql = "CREATE TABLE users (id INT PRIMARY KEY); \
                   CREATE TABLE posts (id INT, author_id INT); \
                   ALTER TABLE posts ADD CONSTRAINT fk_author \
                   FOREIGN KEY (author_id) REFERENCES users(id);";
        let model = DdlParser::new().parse(sql).unwrap();
        let posts = model.table("posts").unwrap();
        assert_eq!(posts.foreign_keys.len(), 1);
        assert_eq!(posts.foreign_keys[0].column, "author_id");
        assert_eq!(model.relationships.len(), 1);
    }

    #[test]
    fn test_alter_table_unknown_target_dropped() {
        let sql = "CREATE TABLE users (id INT PRIMARY KEY); \
                   ALTER TABLE ghosts ADD CONSTRAINT fk_x \
                   FOREIGN KEY (user_id) REFERENCES users(id);";
        let model = DdlParser::new().parse(sql).unwrap();
        assert_eq!(model.tables.len(), 1);
        assert!(model.relationships.is_empty());
    }

    #[test]
    fn test_alter_table_forward_reference_not_retried() {
        // The target table is created after the ALTER; the constraint stays dropped.
        let sql = "ALTER TABLE posts ADD CONSTRAINT fk_x \
                   FOREIGN KEY (user_id) REFERENCES users(id); \
                   CREATE TABLE posts (id INT, user_id INT);";
        let model = DdlParser::new().parse(sql).unwrap();
        assert!(model.relationships.is_empty());
        assert!(model.table("posts").unwrap().foreign_keys.is_empty());
    }

    #[test]
    fn test_decimal_precision_does_not_corrupt_columns() {
        let sql = "CREATE TABLE items (id INT, price DECIMAL(10,2) NOT NULL, label TEXT);";
        let model = DdlParser::new().parse(sql).unwrap();
        let items = model.table("items").unwrap();
        assert_eq!(items.columns.len(), 3);
        assert_eq!(items.columns[1].col_type, "DECIMAL(10,2)");
        assert!(!items.columns[1].nullable);
    }

    #[test]
    fn test_table_level_primary_key() {
        let sql = "CREATE TABLE pairs (a INT, b INT, PRIMARY KEY (a, b));";
        let model = DdlParser::new().parse(sql).unwrap();
        let pairs = model.table("pairs").unwrap();
        assert_eq!(pairs.columns.len(), 2);
        assert_eq!(pairs.primary_keys, vec!["a", "b"]);
        assert!(pairs.columns.iter().all(|c| c.is_primary));
    }

    #[test]
    fn test_identifier_casing_preserved() {
        let sql = "CREATE TABLE UserAccounts (AccountId INT PRIMARY KEY);";
        let model = DdlParser::new().parse(sql).unwrap();
        assert!(model.table("UserAccounts").is_some());
        assert_eq!(model.tables[0].columns[0].name, "AccountId");
    }

    #[test]
    fn test_quoted_identifiers() {
        let sql = "CREATE TABLE \"order items\" (id INT, qty INT);";
        let model = DdlParser::new().parse(sql).unwrap();
        assert!(model.table("order items").is_some());
    }

    #[test]
    fn test_if_not_exists() {
        let sql = "CREATE TABLE IF NOT EXISTS logs (id INT);";
        let model = DdlParser::new().parse(sql).unwrap();
        assert!(model.table("logs").is_some());
    }

    #[test]
    fn test_strict_mode_rejects_unknown() {
        let parser = DdlParser::with_options(ParserOptions { lenient: false });
        let err = parser.parse("DROP TABLE users;").unwrap_err();
        assert!(matches!(err, ParseError::UnknownStatement(_)));
    }

    #[test]
    fn test_malformed_references_errors() {
        let sql = "CREATE TABLE posts (user_id INT REFERENCES );";
        let err = DdlParser::new().parse(sql).unwrap_err();
        assert!(matches!(err, ParseError::MalformedReference(_)));
    }

    #[test]
    fn test_statement_order_preserved_in_relationships() {
        let sql = "CREATE TABLE a (id INT); \
                   CREATE TABLE b (id INT, a_id INT REFERENCES a(id)); \
                   CREATE TABLE c (id INT, b_id INT REFERENCES b(id));";
        let model = DdlParser::new().parse(sql).unwrap();
        assert_eq!(model.relationships.len(), 2);
        assert_eq!(model.relationships[0].from_table, "b");
        assert_eq!(model.relationships[1].from_table, "c");
    }
}
