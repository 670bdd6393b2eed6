//! SQL expression sub-language validator
//!
//! Accepts a narrow whitelist of right-hand-side expressions for
//! `UPDATE … SET` and `INSERT … VALUES` slots and rejects everything else.
//! Validation is reject-first: dangerous patterns fail before any accept
//! rule runs. Successful validation yields a tagged [`ValidatedExpression`]
//! consumed by the dialect translator.
use crate::cache::{BoundedCache, cache_key};
use crate::identifier::{self, IdentifierError, IdentifierKind};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::{LazyLock, Mutex};
use thiserror::Error;

const EXPRESSION_CACHE_CAPACITY: usize = 500;
const EXPRESSION_CACHE_EVICT_PERCENT: usize = 25;

/// Functions accepted in expression position across all three dialects
static FUNCTION_WHITELIST: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "NOW",
        "COALESCE",
        "UPPER",
        "LOWER",
        "LENGTH",
        "SUBSTRING",
        "SUBSTR",
        "CURDATE",
        "CURTIME",
        "DATE",
        "TIME",
        "DATETIME",
        "CURRENT_DATE",
        "CURRENT_TIME",
        "CURRENT_TIMESTAMP",
        "CONCAT",
        "TRIM",
        "LTRIM",
        "RTRIM",
        "REPLACE",
        "ABS",
        "ROUND",
        "FLOOR",
        "RAND",
        "RANDOM",
        "NULLIF",
        "GREATEST",
        "LEAST",
    ]
    .into_iter()
    .collect()
});

/// Bare keywords accepted as complete expressions
static KEYWORD_EXPRESSIONS: &[&str] = &[
    "CURRENT_DATE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "CURRENT_USER",
    "SESSION_USER",
];

/// Keywords ignored when extracting column references from CASE expressions
static CASE_KEYWORDS: &[&str] = &["CASE", "WHEN", "THEN", "ELSE", "END", "AND", "OR"];

static NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?$").expect("number pattern"));

static STATEMENT_CHAIN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";\s*\w").expect("statement chain pattern"));

static DANGEROUS_KEYWORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(DROP|DELETE|TRUNCATE|ALTER|CREATE|UNION|SELECT|EXEC|LOAD_FILE)\b|(?i)\bINTO\s+OUTFILE\b",
    )
    .expect("dangerous keyword pattern")
});

static FUNCTION_CALL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*\((?P<args>.*)\)$").expect("call pattern")
});

static CASE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^CASE\s+WHEN\s+.+\s+THEN\s+.+\s+ELSE\s+.+\s+END$").expect("case pattern")
});

static WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("word pattern"));

/// Where an expression is being used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionContext {
    UpdateSet,
    InsertValue,
    /// Always rejected: parameter binding is the only legal WHERE input
    WhereCondition,
}

impl fmt::Display for ExpressionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpressionContext::UpdateSet => "update_set",
            ExpressionContext::InsertValue => "insert_value",
            ExpressionContext::WhereCondition => "where_condition",
        };
        write!(f, "{name}")
    }
}

/// Which accept rule an expression satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    Literal,
    Arithmetic,
    FunctionCall,
    Keyword,
    Case,
}

/// An expression that passed validation, tagged with the accepting rule.
///
/// The text is the trimmed original; dialect rewriting happens in the
/// translator, never here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedExpression {
    text: String,
    kind: ExpressionKind,
}

impl ValidatedExpression {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> ExpressionKind {
        self.kind
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for ValidatedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Expression validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Empty expression")]
    Empty,

    #[error("Expressions are not allowed in context '{context}'")]
    ContextNotAllowed { context: String },

    #[error("Dangerous pattern in expression: {expression}")]
    DangerousPattern { expression: String },

    #[error("Expression not in whitelist: {expression}")]
    NotWhitelisted { expression: String },

    #[error("Column '{column}' is not allowed in this expression")]
    ColumnNotAllowed { column: String },

    #[error(transparent)]
    Identifier(#[from] IdentifierError),
}

static EXPRESSION_CACHE: LazyLock<Mutex<BoundedCache<Result<ExpressionKind, ExpressionError>>>> =
    LazyLock::new(|| {
        Mutex::new(BoundedCache::new(
            EXPRESSION_CACHE_CAPACITY,
            EXPRESSION_CACHE_EVICT_PERCENT,
        ))
    });

/// Validate an expression for the given context.
///
/// `allowed_columns` restricts which column names may appear; an empty
/// slice allows any column that passes identifier validation.
pub fn validate(
    expression: &str,
    context: ExpressionContext,
    allowed_columns: &[&str],
) -> Result<ValidatedExpression, ExpressionError> {
    if context == ExpressionContext::WhereCondition {
        return Err(ExpressionError::ContextNotAllowed {
            context: context.to_string(),
        });
    }

    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut sorted_columns: Vec<&str> = allowed_columns.to_vec();
    sorted_columns.sort_unstable();
    let columns_key = sorted_columns.join(",");
    let key = cache_key(&[trimmed, &context.to_string(), &columns_key]);

    {
        let mut cache = EXPRESSION_CACHE.lock().expect("expression cache poisoned");
        if let Some(cached) = cache.get(&key) {
            return match cached {
                Ok(kind) => Ok(ValidatedExpression {
                    text: trimmed.to_string(),
                    kind: *kind,
                }),
                Err(e) => Err(e.clone()),
            };
        }
    }

    let outcome = validate_uncached(trimmed, allowed_columns);

    let mut cache = EXPRESSION_CACHE.lock().expect("expression cache poisoned");
    cache.insert(key, outcome.clone());
    outcome.map(|kind| ValidatedExpression {
        text: trimmed.to_string(),
        kind,
    })
}

fn validate_uncached(
    expression: &str,
    allowed_columns: &[&str],
) -> Result<ExpressionKind, ExpressionError> {
    check_dangerous_patterns(expression)?;

    // Rule 1: literal number
    if NUMBER_PATTERN.is_match(expression) {
        return Ok(ExpressionKind::Literal);
    }

    // Rules 2-4: arithmetic over operands (columns, numbers, function calls)
    if let Some((left, _op, right)) = split_top_level_operator(expression) {
        if is_valid_operand(left.trim(), allowed_columns)
            && is_valid_operand(right.trim(), allowed_columns)
        {
            return Ok(ExpressionKind::Arithmetic);
        }
    }

    // Rule 5: generic whitelisted function call with inert arguments
    if let Some(caps) = FUNCTION_CALL_PATTERN.captures(expression) {
        let name = caps.name("name").map(|m| m.as_str()).unwrap_or_default();
        let args = caps.name("args").map(|m| m.as_str()).unwrap_or_default();
        if FUNCTION_WHITELIST.contains(name.to_uppercase().as_str())
            && !args.contains(['\'', '"', ';', '(', ')'])
        {
            return Ok(ExpressionKind::FunctionCall);
        }
    }

    // Rule 6: bare keyword expression
    if KEYWORD_EXPRESSIONS.contains(&expression.to_uppercase().as_str()) {
        return Ok(ExpressionKind::Keyword);
    }

    // Rule 7: CASE WHEN … THEN … ELSE … END
    if CASE_PATTERN.is_match(expression) {
        validate_case_columns(expression, allowed_columns)?;
        return Ok(ExpressionKind::Case);
    }

    Err(ExpressionError::NotWhitelisted {
        expression: expression.to_string(),
    })
}

fn check_dangerous_patterns(expression: &str) -> Result<(), ExpressionError> {
    let dangerous = STATEMENT_CHAIN_PATTERN.is_match(expression)
        || expression.contains("/*")
        || expression.contains("--")
        || DANGEROUS_KEYWORD_PATTERN.is_match(expression)
        || has_quote_outside_functions(expression);
    if dangerous {
        return Err(ExpressionError::DangerousPattern {
            expression: expression.to_string(),
        });
    }
    Ok(())
}

/// Byte ranges lying strictly inside the parentheses of `word(...)` calls
fn function_argument_regions(expression: &str) -> Vec<(usize, usize)> {
    let bytes = expression.as_bytes();
    let mut regions = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'('
            && i > 0
            && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_')
        {
            let mut depth = 1;
            let start = i + 1;
            let mut j = start;
            while j < bytes.len() && depth > 0 {
                match bytes[j] {
                    b'(' => depth += 1,
                    b')' => depth -= 1,
                    _ => {}
                }
                j += 1;
            }
            if depth == 0 {
                regions.push((start, j - 1));
            }
            i = j;
        } else {
            i += 1;
        }
    }
    regions
}

/// String literals are tolerated only inside function parentheses; any
/// quote character elsewhere marks the expression dangerous
fn has_quote_outside_functions(expression: &str) -> bool {
    let quote_positions: Vec<usize> = expression
        .bytes()
        .enumerate()
        .filter(|(_, b)| *b == b'\'' || *b == b'"')
        .map(|(i, _)| i)
        .collect();
    if quote_positions.is_empty() {
        return false;
    }
    let regions = function_argument_regions(expression);
    quote_positions
        .iter()
        .any(|pos| !regions.iter().any(|(start, end)| pos >= start && pos < end))
}

/// Find the first `+ - * /` at parenthesis depth zero, excluding the ends
fn split_top_level_operator(expression: &str) -> Option<(&str, char, &str)> {
    let bytes = expression.as_bytes();
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'+' | b'-' | b'*' | b'/' if depth == 0 && i > 0 && i + 1 < bytes.len() => {
                return Some((&expression[..i], b as char, &expression[i + 1..]));
            }
            _ => {}
        }
    }
    None
}

/// An arithmetic operand: a number, an allowed column, or a whitelisted
/// function call whose arguments contain no statement terminator
fn is_valid_operand(operand: &str, allowed_columns: &[&str]) -> bool {
    if operand.is_empty() {
        return false;
    }
    if NUMBER_PATTERN.is_match(operand) {
        return true;
    }
    if let Some(caps) = FUNCTION_CALL_PATTERN.captures(operand) {
        let name = caps.name("name").map(|m| m.as_str()).unwrap_or_default();
        let args = caps.name("args").map(|m| m.as_str()).unwrap_or_default();
        return FUNCTION_WHITELIST.contains(name.to_uppercase().as_str()) && !args.contains(';');
    }
    if identifier::validate(operand, IdentifierKind::Column).is_ok() {
        return allowed_columns.is_empty() || allowed_columns.contains(&operand);
    }
    false
}

/// Extract bare identifiers from a CASE expression and require each to be
/// an allowed column
fn validate_case_columns(
    expression: &str,
    allowed_columns: &[&str],
) -> Result<(), ExpressionError> {
    for word in WORD_PATTERN.find_iter(expression) {
        let token = word.as_str();
        let upper = token.to_uppercase();
        if CASE_KEYWORDS.contains(&upper.as_str()) {
            continue;
        }
        identifier::validate(token, IdentifierKind::Column)?;
        if !allowed_columns.is_empty() && !allowed_columns.contains(&token) {
            return Err(ExpressionError::ColumnNotAllowed {
                column: token.to_string(),
            });
        }
    }
    Ok(())
}

/// The universal function whitelist, exposed for the profiler and tests
pub fn whitelisted_functions() -> impl Iterator<Item = &'static str> {
    FUNCTION_WHITELIST.iter().copied()
}
