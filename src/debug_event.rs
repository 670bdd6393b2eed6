//! Structured debug events
//!
//! Components describe what happened as a category, a verbosity level, and
//! a context map; shipping the event anywhere beyond the tracing
//! subscriber is the host application's concern.
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, trace, warn};

/// Event categories mirrored in log output
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DebugCategory {
    Sql,
    Performance,
    Bulk,
    Cache,
    Transaction,
    Maintenance,
    Security,
}

impl fmt::Display for DebugCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DebugCategory::Sql => "SQL",
            DebugCategory::Performance => "PERFORMANCE",
            DebugCategory::Bulk => "BULK",
            DebugCategory::Cache => "CACHE",
            DebugCategory::Transaction => "TRANSACTION",
            DebugCategory::Maintenance => "MAINTENANCE",
            DebugCategory::Security => "SECURITY",
        };
        write!(f, "{name}")
    }
}

/// Verbosity tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum DebugLevel {
    Basic = 1,
    Detailed = 2,
    Verbose = 3,
}

/// One structured diagnostic event
#[derive(Debug, Clone, serde::Serialize)]
pub struct DebugEvent {
    pub message: String,
    pub category: DebugCategory,
    pub level: DebugLevel,
    pub context: BTreeMap<String, String>,
}

impl DebugEvent {
    pub fn new(message: impl Into<String>, category: DebugCategory, level: DebugLevel) -> Self {
        Self {
            message: message.into(),
            category,
            level,
            context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Ship the event through tracing. Security events always surface as
    /// warnings; the rest map Basic/Detailed/Verbose onto
    /// info/debug/trace.
    pub fn emit(&self) {
        let context = if self.context.is_empty() {
            String::new()
        } else {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            format!(" [{}]", pairs.join(", "))
        };
        if self.category == DebugCategory::Security {
            warn!("[{}] {}{}", self.category, self.message, context);
            return;
        }
        match self.level {
            DebugLevel::Basic => info!("[{}] {}{}", self.category, self.message, context),
            DebugLevel::Detailed => debug!("[{}] {}{}", self.category, self.message, context),
            DebugLevel::Verbose => trace!("[{}] {}{}", self.category, self.message, context),
        }
    }
}
