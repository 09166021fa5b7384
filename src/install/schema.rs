//! Schema applier
//!
//! Splits a schema source into statements and applies them in order. The
//! bundled schema only uses conditional DDL, so applying it to an already
//! migrated database succeeds without changing anything.

use crate::db::InstallConnection;
use crate::install::error::SchemaError;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{debug, info};

/// Schema shipped with the binary
pub const BUNDLED_SCHEMA: &str = include_str!("../../schema/database_schema.sql");

const TERMINATOR: char = ';';
const COMMENT_MARKER: &str = "--";

/// Where the schema text comes from
#[derive(Debug, Clone)]
pub enum SchemaSource {
    Bundled,
    File(PathBuf),
}

impl SchemaSource {
    /// Read the schema text. Files are re-read on every call.
    pub async fn load(&self) -> Result<String, SchemaError> {
        match self {
            SchemaSource::Bundled => Ok(BUNDLED_SCHEMA.to_string()),
            SchemaSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|source| SchemaError::Unreadable {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

/// Result of a successful schema application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedSchema {
    pub statements: usize,
    /// Hex SHA-256 of the source text
    pub digest: String,
}

/// Split a schema into executable statements, preserving order.
///
/// `;` ends a statement unless it sits inside a single-quoted literal, a
/// `$$` body or a `--` comment. Backslash escapes are honoured inside
/// `E'...'` literals. Tagged dollar quotes (`$fn$`) and block comments are
/// not recognised.
pub fn split_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = source.chars().peekable();
    let mut in_quote = false;
    let mut escapes = false;
    let mut in_dollar = false;
    let mut in_comment = false;

    while let Some(c) = chars.next() {
        if in_comment {
            current.push(c);
            if c == '\n' {
                in_comment = false;
            }
            continue;
        }

        match c {
            '\\' if in_quote && escapes => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                continue;
            }
            '\'' if !in_dollar => {
                if !in_quote {
                    escapes = opens_escape_string(&current);
                }
                in_quote = !in_quote;
            }
            '$' if !in_quote && chars.peek() == Some(&'$') => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_dollar = !in_dollar;
                continue;
            }
            '-' if !in_quote && !in_dollar && chars.peek() == Some(&'-') => in_comment = true,
            TERMINATOR if !in_quote && !in_dollar => {
                push_statement(&mut statements, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    push_statement(&mut statements, &current);

    statements
}

/// Whether the text before a quote is an `E` prefix rather than the end of
/// an identifier.
fn opens_escape_string(before: &str) -> bool {
    let mut tail = before.chars().rev();
    matches!(tail.next(), Some('E' | 'e'))
        && !tail.next().is_some_and(|c| c.is_alphanumeric() || c == '_')
}

fn push_statement(statements: &mut Vec<String>, candidate: &str) {
    let statement = strip_leading_comments(candidate);
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
}

/// Drop leading comment lines; a comment-only segment becomes empty.
fn strip_leading_comments(segment: &str) -> &str {
    let mut rest = segment.trim();
    while rest.starts_with(COMMENT_MARKER) {
        rest = match rest.find('\n') {
            Some(pos) => rest[pos + 1..].trim_start(),
            None => "",
        };
    }
    rest.trim()
}

/// Apply every statement of `source` to `conn`, in order.
///
/// Forward-only: when statement N fails, statements 1..N-1 stay applied.
pub async fn apply_schema<C>(conn: &mut C, source: &str) -> Result<AppliedSchema, SchemaError>
where
    C: InstallConnection + ?Sized,
{
    let statements = split_statements(source);
    if statements.is_empty() {
        return Err(SchemaError::Empty);
    }

    let total = statements.len();
    for (i, statement) in statements.iter().enumerate() {
        debug!("Applying schema statement {}/{}", i + 1, total);
        conn.execute_statement(statement)
            .await
            .map_err(|source| SchemaError::Statement {
                index: i + 1,
                total,
                source,
            })?;
    }

    let digest = format!("{:x}", Sha256::digest(source.as_bytes()));
    info!("Schema applied: {} statements (sha256 {})", total, &digest[..12]);
    Ok(AppliedSchema {
        statements: total,
        digest,
    })
}
