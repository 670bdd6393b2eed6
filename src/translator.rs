//! Dialect translation for validated expressions
//!
//! Pure string-level function rewrites driven by per-dialect tables.
//! Rules are applied longest-match-first so `CURRENT_TIMESTAMP` is never
//! clobbered by the shorter `CURRENT_TIME` rule.
use crate::cache::{BoundedCache, cache_key};
use crate::database::DatabaseType;
use crate::expression::ValidatedExpression;
use std::sync::{LazyLock, Mutex};

const TRANSLATION_CACHE_CAPACITY: usize = 500;
const TRANSLATION_CACHE_EVICT_PERCENT: usize = 25;

/// Rewrite rules per dialect, ordered longest pattern first
fn rewrite_rules(database_type: DatabaseType) -> &'static [(&'static str, &'static str)] {
    match database_type {
        DatabaseType::MySQL => &[
            ("CURRENT_TIMESTAMP", "NOW()"),
            ("CURRENT_DATE", "CURDATE()"),
            ("CURRENT_TIME", "CURTIME()"),
            ("RANDOM()", "RAND()"),
            ("SUBSTR(", "SUBSTRING("),
        ],
        DatabaseType::SQLite => &[
            ("CURRENT_TIMESTAMP", "datetime('now')"),
            ("CURRENT_DATE", "date('now')"),
            ("CURRENT_TIME", "time('now')"),
            ("SUBSTRING(", "SUBSTR("),
            ("CURDATE()", "date('now')"),
            ("CURTIME()", "time('now')"),
            ("RAND()", "RANDOM()"),
            ("NOW()", "datetime('now')"),
        ],
        DatabaseType::PostgreSQL => &[
            ("CURDATE()", "CURRENT_DATE"),
            ("CURTIME()", "CURRENT_TIME"),
            ("SUBSTR(", "SUBSTRING("),
            ("RAND()", "RANDOM()"),
        ],
    }
}

static TRANSLATION_CACHE: LazyLock<Mutex<BoundedCache<String>>> = LazyLock::new(|| {
    Mutex::new(BoundedCache::new(
        TRANSLATION_CACHE_CAPACITY,
        TRANSLATION_CACHE_EVICT_PERCENT,
    ))
});

/// Rewrite a validated expression for the target dialect
pub fn translate(expression: &ValidatedExpression, database_type: DatabaseType) -> String {
    translate_str(expression.as_str(), database_type)
}

pub(crate) fn translate_str(expression: &str, database_type: DatabaseType) -> String {
    let key = cache_key(&[database_type.display_name(), expression]);
    {
        let mut cache = TRANSLATION_CACHE.lock().expect("translation cache poisoned");
        if let Some(cached) = cache.get(&key) {
            return cached.clone();
        }
    }

    let mut translated = expression.to_string();
    for (pattern, replacement) in rewrite_rules(database_type) {
        translated = replace_all_ascii_ci(&translated, pattern, replacement);
    }

    let mut cache = TRANSLATION_CACHE.lock().expect("translation cache poisoned");
    cache.insert(key, translated.clone());
    translated
}

/// Case-insensitive find for an ASCII needle; a match can only start on a
/// char boundary because ASCII bytes never match UTF-8 continuation bytes
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

fn replace_all_ascii_ci(haystack: &str, needle: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = find_ascii_ci(rest, needle) {
        out.push_str(&rest[..pos]);
        out.push_str(replacement);
        rest = &rest[pos + needle.len()..];
    }
    out.push_str(rest);
    out
}
