//! Identifier firewall: validation and dialect-aware escaping for table,
//! column, and ORDER BY identifiers
//!
//! Nothing reaches emitted SQL without passing through this module first.
use crate::cache::{BoundedCache, CacheStats, cache_key};
use crate::database::DatabaseType;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{LazyLock, Mutex};
use thiserror::Error;

/// Maximum identifier length accepted by all three dialects
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Identifier cache bound and eviction batch (oldest 25%)
const IDENTIFIER_CACHE_CAPACITY: usize = 1000;
const IDENTIFIER_CACHE_EVICT_PERCENT: usize = 25;

static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("identifier pattern"));

/// Case-insensitive SQL reserved words rejected as identifiers
static RESERVED_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TABLE", "INDEX",
        "VIEW", "TRIGGER", "PROCEDURE", "FUNCTION", "FROM", "WHERE", "ORDER", "GROUP", "HAVING",
        "UNION", "JOIN", "LEFT", "RIGHT", "INNER", "OUTER", "ON", "AS", "AND", "OR", "NOT",
        "NULL", "TRUE", "FALSE", "EXISTS", "BETWEEN", "LIKE", "IN", "IS", "DISTINCT", "ALL",
        "ANY", "SOME", "LIMIT", "OFFSET",
    ]
    .into_iter()
    .collect()
});

/// What an identifier names, carried in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Table,
    Column,
    Identifier,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdentifierKind::Table => "table",
            IdentifierKind::Column => "column",
            IdentifierKind::Identifier => "identifier",
        };
        write!(f, "{name}")
    }
}

/// Validation failures for identifiers and ORDER BY clauses
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Empty {kind} name")]
    Empty { kind: IdentifierKind },

    #[error("{kind} name '{name}' exceeds {MAX_IDENTIFIER_LENGTH} characters")]
    TooLong { kind: IdentifierKind, name: String },

    #[error("{kind} name '{name}' contains invalid characters")]
    InvalidFormat { kind: IdentifierKind, name: String },

    #[error("{kind} name '{name}' is a reserved word")]
    Reserved { kind: IdentifierKind, name: String },

    #[error("Empty ORDER BY clause")]
    EmptyOrderBy,

    #[error("Malformed ORDER BY part: '{part}'")]
    MalformedOrderBy { part: String },

    #[error("Invalid sort direction: '{direction}'")]
    InvalidDirection { direction: String },
}

/// Cached validation and escaping state for one identifier
#[derive(Debug, Clone)]
struct IdentifierRecord {
    validated: bool,
    escaped: HashMap<DatabaseType, String>,
}

static IDENTIFIER_CACHE: LazyLock<Mutex<BoundedCache<IdentifierRecord>>> = LazyLock::new(|| {
    Mutex::new(BoundedCache::new(
        IDENTIFIER_CACHE_CAPACITY,
        IDENTIFIER_CACHE_EVICT_PERCENT,
    ))
});

/// Validate an identifier: non-empty, within length, shaped like
/// `[A-Za-z_][A-Za-z0-9_-]*`, and not a reserved word
pub fn validate(name: &str, kind: IdentifierKind) -> Result<(), IdentifierError> {
    if name.is_empty() {
        return Err(IdentifierError::Empty {
            kind,
        });
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(IdentifierError::TooLong {
            kind,
            name: name.to_string(),
        });
    }
    if !IDENTIFIER_PATTERN.is_match(name) {
        return Err(IdentifierError::InvalidFormat {
            kind,
            name: name.to_string(),
        });
    }
    if RESERVED_WORDS.contains(name.to_uppercase().as_str()) {
        return Err(IdentifierError::Reserved {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Escape an identifier for the dialect, doubling interior quote characters.
///
/// MySQL and SQLite use backticks; PostgreSQL uses double quotes.
pub fn escape(name: &str, database_type: DatabaseType) -> String {
    let quote = database_type.identifier_quote();
    let doubled = name.replace(quote, &format!("{quote}{quote}"));
    format!("{quote}{doubled}{quote}")
}

/// Validate and escape in one cached step
pub fn validate_and_escape(
    name: &str,
    database_type: DatabaseType,
    kind: IdentifierKind,
) -> Result<String, IdentifierError> {
    let key = cache_key(&[name]);
    let mut cache = IDENTIFIER_CACHE.lock().expect("identifier cache poisoned");

    if let Some(record) = cache.get(&key) {
        if !record.validated {
            // Re-derive the precise error so diagnostics keep the caller's kind
            validate(name, kind)?;
        }
        if let Some(escaped) = record.escaped.get(&database_type) {
            return Ok(escaped.clone());
        }
        let escaped = escape(name, database_type);
        let mut record = record.clone();
        record.escaped.insert(database_type, escaped.clone());
        cache.insert(key, record);
        return Ok(escaped);
    }

    let validated = validate(name, kind);
    let mut record = IdentifierRecord {
        validated: validated.is_ok(),
        escaped: HashMap::new(),
    };
    if let Err(e) = validated {
        cache.insert(key, record);
        return Err(e);
    }
    let escaped = escape(name, database_type);
    record.escaped.insert(database_type, escaped.clone());
    cache.insert(key, record);
    Ok(escaped)
}

/// Validate a batch of identifiers, failing on the first offender
pub fn validate_all(names: &[&str], kind: IdentifierKind) -> Result<(), IdentifierError> {
    for name in names {
        validate(name, kind)?;
    }
    Ok(())
}

/// Validate and escape a batch of identifiers, preserving order
pub fn validate_and_escape_all(
    names: &[&str],
    database_type: DatabaseType,
    kind: IdentifierKind,
) -> Result<Vec<String>, IdentifierError> {
    names
        .iter()
        .map(|name| validate_and_escape(name, database_type, kind))
        .collect()
}

/// Validate an ORDER BY clause of the form `col [ASC|DESC], …` and return
/// the dialect-escaped clause with normalized directions
pub fn validate_order_by(
    clause: &str,
    database_type: DatabaseType,
) -> Result<String, IdentifierError> {
    if clause.trim().is_empty() {
        return Err(IdentifierError::EmptyOrderBy);
    }

    let mut parts = Vec::new();
    for raw_part in clause.split(',') {
        let tokens: Vec<&str> = raw_part.split_whitespace().collect();
        match tokens.as_slice() {
            [column] => {
                let escaped = validate_and_escape(column, database_type, IdentifierKind::Column)?;
                parts.push(format!("{escaped} ASC"));
            }
            [column, direction] => {
                let escaped = validate_and_escape(column, database_type, IdentifierKind::Column)?;
                let normalized = match direction.to_uppercase().as_str() {
                    "ASC" => "ASC",
                    "DESC" => "DESC",
                    _ => {
                        return Err(IdentifierError::InvalidDirection {
                            direction: direction.to_string(),
                        });
                    }
                };
                parts.push(format!("{escaped} {normalized}"));
            }
            _ => {
                return Err(IdentifierError::MalformedOrderBy {
                    part: raw_part.trim().to_string(),
                });
            }
        }
    }
    Ok(parts.join(", "))
}

/// Check membership in the reserved-word set (case-insensitive)
pub fn is_reserved_word(word: &str) -> bool {
    RESERVED_WORDS.contains(word.to_uppercase().as_str())
}

/// Snapshot of the shared identifier cache counters
pub fn cache_stats() -> CacheStats {
    IDENTIFIER_CACHE
        .lock()
        .expect("identifier cache poisoned")
        .stats()
}

#[cfg(test)]
pub(crate) fn clear_cache() {
    IDENTIFIER_CACHE
        .lock()
        .expect("identifier cache poisoned")
        .clear();
}
