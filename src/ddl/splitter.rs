//! Lexical pass over raw DDL text: comment stripping, statement splitting,
//! and depth-aware fragment splitting.
//!
//! A single character scan recognizes block comments (`/* ... */`, possibly
//! spanning lines), line comments (`-- ...`), and single-quoted string
//! literals (with `''` escapes). A `;` terminates a statement only outside
//! strings and comments, so literals containing semicolons do not produce
//! false statement boundaries. Statement order is preserved; it matters,
//! because later `ALTER TABLE` statements may reference tables created
//! earlier in the same file.

use super::ParseError;

/// Split raw DDL text into ordered, trimmed, non-empty statements.
pub fn split_statements(input: &str) -> Result<Vec<String>, ParseError> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                // Line comment: discard to end of line, keep the break.
                for next in chars.by_ref() {
                    if next == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut closed = false;
                while let Some(next) = chars.next() {
                    if next == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(ParseError::UnterminatedComment);
                }
                current.push(' ');
            }
            '\'' => {
                current.push('\'');
                consume_string_literal(&mut chars, &mut current)?;
            }
            ';' => {
                let stmt = current.trim();
                if !stmt.is_empty() {
                    statements.push(stmt.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let stmt = current.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }

    Ok(statements)
}

/// Copy a single-quoted literal (opening quote already consumed) into `out`,
/// honoring `''` escapes.
fn consume_string_literal(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    out: &mut String,
) -> Result<(), ParseError> {
    loop {
        match chars.next() {
            None => return Err(ParseError::UnterminatedString),
            Some('\'') => {
                out.push('\'');
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    return Ok(());
                }
            }
            Some(other) => out.push(other),
        }
    }
}

/// Split `input` on `sep` at parenthesis depth zero, string-aware.
///
/// Keeps `DECIMAL(10,2)` intact when splitting a column block on commas.
pub fn split_top_level(input: &str, sep: char) -> Result<Vec<String>, ParseError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                current.push('\'');
                consume_string_literal(&mut chars, &mut current)?;
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(ParseError::UnbalancedParens(input.trim().to_string()));
                }
                current.push(c);
            }
            _ if c == sep && depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if depth != 0 {
        return Err(ParseError::UnbalancedParens(input.trim().to_string()));
    }

    parts.push(current.trim().to_string());
    parts.retain(|p| !p.is_empty());
    Ok(parts)
}

/// Extract the first top-level parenthesized group from `input`.
///
/// Returns the inner text (parens excluded), or `None` if the input has
/// no parenthesis group at all.
pub fn first_paren_group(input: &str) -> Result<Option<String>, ParseError> {
    let mut chars = input.chars().peekable();

    // Scan to the opening paren, skipping string literals.
    loop {
        match chars.next() {
            None => return Ok(None),
            Some('\'') => {
                let mut sink = String::new();
                consume_string_literal(&mut chars, &mut sink)?;
            }
            Some('(') => break,
            Some(_) => {}
        }
    }

    let mut inner = String::new();
    let mut depth: i32 = 1;
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                inner.push('\'');
                consume_string_literal(&mut chars, &mut inner)?;
            }
            '(' => {
                depth += 1;
                inner.push(c);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(inner));
                }
                inner.push(c);
            }
            _ => inner.push(c),
        }
    }

    Err(ParseError::UnbalancedParens(input.trim().to_string()))
}
