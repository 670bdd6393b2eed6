//! Dialect-aware query profiler
//!
//! Observes executed SQL with its wall-clock time, optionally fetches the
//! dialect's EXPLAIN plan, and produces structured, deduplicated
//! optimization suggestions plus rolling session summaries.
use crate::cache::{BoundedCache, cache_key};
use crate::database::{DatabaseClient, DatabaseType, ExplainPlan};
use crate::identifier;
use crate::plan_analyzer::{self, PlanObservation, PlanObservationKind};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

/// Execution time thresholds in seconds
const SLOW_QUERY_SECONDS: f64 = 0.1;
const VERY_SLOW_QUERY_SECONDS: f64 = 1.0;

/// Rolling window of retained analyses
const SESSION_WINDOW: usize = 100;
/// Analysis cache bound
const ANALYSIS_CACHE_CAPACITY: usize = 100;
/// A summary is logged every this many analyzed queries
const SUMMARY_INTERVAL: u64 = 5;
/// SQL retained on analysis records is truncated to this length
const SQL_TRUNCATE_LENGTH: usize = 80;
/// Complexity score ceiling
const MAX_COMPLEXITY: u32 = 100;

static STATEMENT_TYPE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(SELECT|INSERT|UPDATE|DELETE)\b").expect("type pattern"));

static FROM_TABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bFROM\s+[`"]?([A-Za-z_][A-Za-z0-9_]*)[`"]?"#).expect("from pattern")
});

static INSERT_TABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bINSERT\s+INTO\s+[`"]?([A-Za-z_][A-Za-z0-9_]*)[`"]?"#).expect("insert pattern")
});

static UPDATE_TABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*UPDATE\s+[`"]?([A-Za-z_][A-Za-z0-9_]*)[`"]?"#).expect("update pattern")
});

static WHERE_CLAUSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bWHERE\s+(.+?)(?:\bORDER\s+BY\b|\bGROUP\s+BY\b|\bLIMIT\b|\bHAVING\b|$)")
        .expect("where pattern")
});

static WHERE_COLUMN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)[`"]?([A-Za-z_][A-Za-z0-9_]*)[`"]?\s*(=|!=|<>|<=|>=|<|>|\bLIKE\b|\bIN\b|\bIS\b)"#)
        .expect("where column pattern")
});

static ORDER_BY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bORDER\s+BY\s+(.+?)(?:\bLIMIT\b|$)").expect("order by pattern")
});

static JOIN_TABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bJOIN\s+[`"]?([A-Za-z_][A-Za-z0-9_]*)[`"]?"#).expect("join pattern")
});

static NAMED_PARAM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":[A-Za-z_][A-Za-z0-9_]*").expect("param pattern"));

static SELECT_STAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\s+\*").expect("select star pattern"));

static SUBQUERY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(\s*SELECT\b").expect("subquery pattern"));

/// Statement classification from the leading keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

/// Structure extracted from a SQL statement by regex parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub statement_type: StatementType,
    pub table: Option<String>,
    pub where_columns: Vec<String>,
    pub order_columns: Vec<String>,
    pub join_tables: Vec<String>,
    pub has_limit: bool,
    pub has_select_star: bool,
    pub has_subquery: bool,
    pub has_group_by: bool,
    pub has_having: bool,
    pub has_union: bool,
}

/// Parse a statement into its structural features
pub fn parse_sql(sql: &str) -> ParsedQuery {
    let statement_type = match STATEMENT_TYPE_PATTERN
        .captures(sql)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
        .as_deref()
    {
        Some("SELECT") => StatementType::Select,
        Some("INSERT") => StatementType::Insert,
        Some("UPDATE") => StatementType::Update,
        Some("DELETE") => StatementType::Delete,
        _ => StatementType::Other,
    };

    let table = match statement_type {
        StatementType::Insert => INSERT_TABLE_PATTERN
            .captures(sql)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        StatementType::Update => UPDATE_TABLE_PATTERN
            .captures(sql)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        _ => FROM_TABLE_PATTERN
            .captures(sql)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
    };

    let where_columns = WHERE_CLAUSE_PATTERN
        .captures(sql)
        .and_then(|c| c.get(1))
        .map(|clause| {
            WHERE_COLUMN_PATTERN
                .captures_iter(clause.as_str())
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .collect()
        })
        .unwrap_or_default();

    let order_columns = ORDER_BY_PATTERN
        .captures(sql)
        .and_then(|c| c.get(1))
        .map(|clause| {
            clause
                .as_str()
                .split(',')
                .filter_map(|part| part.split_whitespace().next())
                .map(|col| col.trim_matches(['`', '"']).to_string())
                .collect()
        })
        .unwrap_or_default();

    let join_tables = JOIN_TABLE_PATTERN
        .captures_iter(sql)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect();

    let upper = sql.to_uppercase();
    ParsedQuery {
        statement_type,
        table,
        where_columns,
        order_columns,
        join_tables,
        has_limit: upper.contains("LIMIT"),
        has_select_star: SELECT_STAR_PATTERN.is_match(sql),
        has_subquery: SUBQUERY_PATTERN.is_match(sql),
        has_group_by: upper.contains("GROUP BY"),
        has_having: upper.contains("HAVING"),
        has_union: upper.contains("UNION"),
    }
}

/// Complexity score: 10 base, plus weights for joins, subqueries, UNION,
/// GROUP BY, ORDER BY, and HAVING, capped at 100
pub fn complexity_score(parsed: &ParsedQuery) -> u32 {
    let mut score = 10u32;
    score += 15 * parsed.join_tables.len() as u32;
    if parsed.has_subquery {
        score += 20;
    }
    if parsed.has_union {
        score += 10;
    }
    if parsed.has_group_by {
        score += 10;
    }
    if !parsed.order_columns.is_empty() {
        score += 5;
    }
    if parsed.has_having {
        score += 10;
    }
    score.min(MAX_COMPLEXITY)
}

/// Suggestion severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SuggestionPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for SuggestionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuggestionPriority::Critical => "critical",
            SuggestionPriority::High => "high",
            SuggestionPriority::Medium => "medium",
            SuggestionPriority::Low => "low",
        };
        write!(f, "{name}")
    }
}

/// Suggestion categories emitted by the profiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SuggestionKind {
    SlowQuery,
    MissingIndex,
    OrderByIndex,
    SelectStar,
    MissingLimit,
    ComplexQuery,
    FullIndexScan,
    CoveringIndex,
    HighCost,
    Subquery,
    TemporaryTable,
}

impl fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuggestionKind::SlowQuery => "slow_query",
            SuggestionKind::MissingIndex => "missing_index",
            SuggestionKind::OrderByIndex => "order_by_index",
            SuggestionKind::SelectStar => "select_star",
            SuggestionKind::MissingLimit => "missing_limit",
            SuggestionKind::ComplexQuery => "complex_query",
            SuggestionKind::FullIndexScan => "full_index_scan",
            SuggestionKind::CoveringIndex => "covering_index",
            SuggestionKind::HighCost => "high_cost",
            SuggestionKind::Subquery => "subquery",
            SuggestionKind::TemporaryTable => "temporary_table",
        };
        write!(f, "{name}")
    }
}

/// One optimization suggestion, tied to the query that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub priority: SuggestionPriority,
    pub query_id: String,
    pub table: Option<String>,
    pub message: String,
    pub ddl: Option<String>,
}

/// The record kept for one analyzed query
#[derive(Debug, Clone)]
pub struct QueryAnalysis {
    pub query_id: String,
    /// Truncated to 80 characters for the session window
    pub sql: String,
    pub table: Option<String>,
    pub analyzed_at: chrono::DateTime<chrono::Utc>,
    pub execution_time: f64,
    pub slow: bool,
    pub very_slow: bool,
    pub complexity_score: u32,
    pub explain_available: bool,
    pub suggestions: Vec<Suggestion>,
}

/// Session roll-up grouping suggestions by kind
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub total_queries: u64,
    pub slow_queries: usize,
    pub suggestions_by_kind: BTreeMap<String, usize>,
    /// Unique CREATE INDEX statements accumulated this session
    pub index_ddl: Vec<String>,
    pub performance_issues: Vec<String>,
}

/// Per-session query profiler; the dialect is fixed at construction
pub struct QueryProfiler {
    database_type: DatabaseType,
    query_counter: u64,
    analyses: VecDeque<QueryAnalysis>,
    suggestion_counts: HashMap<String, u32>,
    parse_cache: BoundedCache<ParsedQuery>,
}

impl QueryProfiler {
    pub fn new(database_type: DatabaseType) -> Self {
        Self {
            database_type,
            query_counter: 0,
            analyses: VecDeque::with_capacity(SESSION_WINDOW),
            suggestion_counts: HashMap::new(),
            parse_cache: BoundedCache::new(ANALYSIS_CACHE_CAPACITY, 25),
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    /// Analyze an executed statement, fetching the dialect EXPLAIN from the
    /// client for SELECTs. EXPLAIN failures degrade to structural analysis.
    pub async fn analyze(
        &mut self,
        sql: &str,
        execution_time: f64,
        client: Option<&dyn DatabaseClient>,
    ) -> QueryAnalysis {
        let parsed = self.parse_cached(sql);
        let plan = match client {
            Some(client) if parsed.statement_type == StatementType::Select => {
                match client.explain(sql).await {
                    Ok(plan) => Some(plan),
                    Err(e) => {
                        debug!("[QueryProfiler::analyze] EXPLAIN failed, structural only: {e}");
                        None
                    }
                }
            }
            _ => None,
        };
        self.record(sql, execution_time, parsed, plan.as_ref())
    }

    /// Analyze with a caller-supplied plan (or none)
    pub fn analyze_with_plan(
        &mut self,
        sql: &str,
        execution_time: f64,
        plan: Option<&ExplainPlan>,
    ) -> QueryAnalysis {
        let parsed = self.parse_cached(sql);
        self.record(sql, execution_time, parsed, plan)
    }

    fn parse_cached(&mut self, sql: &str) -> ParsedQuery {
        // Normalize named parameters to ? so textually equal templates share
        // one cache entry regardless of parameter names
        let normalized = NAMED_PARAM_PATTERN.replace_all(sql, "?").to_string();
        let key = cache_key(&[&normalized]);
        if let Some(parsed) = self.parse_cache.get(&key) {
            return parsed.clone();
        }
        let parsed = parse_sql(sql);
        self.parse_cache.insert(key, parsed.clone());
        parsed
    }

    fn record(
        &mut self,
        sql: &str,
        execution_time: f64,
        parsed: ParsedQuery,
        plan: Option<&ExplainPlan>,
    ) -> QueryAnalysis {
        self.query_counter += 1;
        let query_id = format!("Q{}", self.query_counter);
        let slow = execution_time > SLOW_QUERY_SECONDS;
        let very_slow = execution_time > VERY_SLOW_QUERY_SECONDS;

        let mut suggestions = Vec::new();
        self.performance_suggestions(&query_id, &parsed, execution_time, &mut suggestions);
        self.index_suggestions(&query_id, &parsed, slow, &mut suggestions);
        self.structural_suggestions(&query_id, &parsed, &mut suggestions);
        if let Some(plan) = plan {
            let observations = plan_analyzer::analyze_plan(plan, self.database_type);
            self.plan_suggestions(&query_id, &parsed, &observations, slow, &mut suggestions);
        }

        let analysis = QueryAnalysis {
            query_id: query_id.clone(),
            sql: truncate_sql(sql),
            table: parsed.table.clone(),
            analyzed_at: chrono::Utc::now(),
            execution_time,
            slow,
            very_slow,
            complexity_score: complexity_score(&parsed),
            explain_available: plan.is_some(),
            suggestions,
        };

        if self.analyses.len() >= SESSION_WINDOW {
            self.analyses.pop_front();
        }
        self.analyses.push_back(analysis.clone());

        if self.query_counter % SUMMARY_INTERVAL == 0 {
            let summary = self.session_summary();
            debug!(
                "[QueryProfiler::record] Session summary after {} queries: {} slow, {} suggestion kinds",
                summary.total_queries,
                summary.slow_queries,
                summary.suggestions_by_kind.len()
            );
        }

        analysis
    }

    fn performance_suggestions(
        &self,
        query_id: &str,
        parsed: &ParsedQuery,
        execution_time: f64,
        out: &mut Vec<Suggestion>,
    ) {
        if execution_time > VERY_SLOW_QUERY_SECONDS {
            out.push(Suggestion {
                kind: SuggestionKind::SlowQuery,
                priority: SuggestionPriority::Critical,
                query_id: query_id.to_string(),
                table: parsed.table.clone(),
                message: format!("Query took {execution_time:.3}s, over the 1s threshold"),
                ddl: None,
            });
        } else if execution_time > SLOW_QUERY_SECONDS {
            out.push(Suggestion {
                kind: SuggestionKind::SlowQuery,
                priority: SuggestionPriority::High,
                query_id: query_id.to_string(),
                table: parsed.table.clone(),
                message: format!("Query took {execution_time:.3}s, over the 100ms threshold"),
                ddl: None,
            });
        }
    }

    /// Structural index recommendations for WHERE columns, deduplicated per
    /// (table, column) for the session; slow queries always re-emit
    fn index_suggestions(
        &mut self,
        query_id: &str,
        parsed: &ParsedQuery,
        slow: bool,
        out: &mut Vec<Suggestion>,
    ) {
        let Some(table) = parsed.table.clone() else {
            return;
        };
        if parsed.statement_type != StatementType::Select || parsed.where_columns.is_empty() {
            return;
        }
        for column in &parsed.where_columns {
            if !self.should_emit(&table, column, slow) {
                continue;
            }
            out.push(Suggestion {
                kind: SuggestionKind::MissingIndex,
                priority: SuggestionPriority::High,
                query_id: query_id.to_string(),
                table: Some(table.clone()),
                message: format!("Verify an index exists for WHERE column '{column}' on '{table}'"),
                ddl: Some(self.index_ddl(&table, column)),
            });
        }
    }

    fn structural_suggestions(
        &self,
        query_id: &str,
        parsed: &ParsedQuery,
        out: &mut Vec<Suggestion>,
    ) {
        if parsed.has_select_star {
            out.push(Suggestion {
                kind: SuggestionKind::SelectStar,
                priority: SuggestionPriority::Low,
                query_id: query_id.to_string(),
                table: parsed.table.clone(),
                message: "SELECT * fetches every column; name the columns you need".to_string(),
                ddl: None,
            });
        }
        if parsed.statement_type == StatementType::Select && !parsed.has_limit {
            out.push(Suggestion {
                kind: SuggestionKind::MissingLimit,
                priority: SuggestionPriority::Medium,
                query_id: query_id.to_string(),
                table: parsed.table.clone(),
                message: "Unbounded SELECT; add a LIMIT to cap the result set".to_string(),
                ddl: None,
            });
        }
        let score = complexity_score(parsed);
        if score >= 80 {
            out.push(Suggestion {
                kind: SuggestionKind::ComplexQuery,
                priority: SuggestionPriority::Medium,
                query_id: query_id.to_string(),
                table: parsed.table.clone(),
                message: format!("Complexity score {score}/100; consider splitting the query"),
                ddl: None,
            });
        }
    }

    fn plan_suggestions(
        &mut self,
        query_id: &str,
        parsed: &ParsedQuery,
        observations: &[PlanObservation],
        slow: bool,
        out: &mut Vec<Suggestion>,
    ) {
        for observation in observations {
            let table = observation
                .table
                .clone()
                .or_else(|| parsed.table.clone())
                .unwrap_or_else(|| "unknown".to_string());
            match observation.kind {
                PlanObservationKind::SequentialScan => {
                    let column = parsed.where_columns.first().cloned();
                    if let Some(column) = column {
                        if !self.should_emit(&table, &column, slow) {
                            continue;
                        }
                        out.push(Suggestion {
                            kind: SuggestionKind::MissingIndex,
                            priority: SuggestionPriority::High,
                            query_id: query_id.to_string(),
                            table: Some(table.clone()),
                            message: format!(
                                "{}; add an index on '{column}'",
                                observation.detail
                            ),
                            ddl: Some(self.index_ddl(&table, &column)),
                        });
                    } else {
                        out.push(Suggestion {
                            kind: SuggestionKind::MissingIndex,
                            priority: SuggestionPriority::High,
                            query_id: query_id.to_string(),
                            table: Some(table.clone()),
                            message: format!("{} with no indexable WHERE column", observation.detail),
                            ddl: None,
                        });
                    }
                }
                PlanObservationKind::Filesort => {
                    let ddl = parsed
                        .order_columns
                        .first()
                        .map(|column| self.index_ddl(&table, column));
                    out.push(Suggestion {
                        kind: SuggestionKind::OrderByIndex,
                        priority: SuggestionPriority::Medium,
                        query_id: query_id.to_string(),
                        table: Some(table.clone()),
                        message: format!("{}; an index on the ORDER BY column avoids the sort", observation.detail),
                        ddl,
                    });
                }
                PlanObservationKind::CoveringIndex => {
                    out.push(Suggestion {
                        kind: SuggestionKind::CoveringIndex,
                        priority: SuggestionPriority::Low,
                        query_id: query_id.to_string(),
                        table: Some(table.clone()),
                        message: format!("{}; no change needed", observation.detail),
                        ddl: None,
                    });
                }
                PlanObservationKind::FullIndexScan => {
                    out.push(Suggestion {
                        kind: SuggestionKind::FullIndexScan,
                        priority: SuggestionPriority::Medium,
                        query_id: query_id.to_string(),
                        table: Some(table.clone()),
                        message: format!("{}; a more selective index would help", observation.detail),
                        ddl: None,
                    });
                }
                PlanObservationKind::HighCost => {
                    out.push(Suggestion {
                        kind: SuggestionKind::HighCost,
                        priority: SuggestionPriority::Medium,
                        query_id: query_id.to_string(),
                        table: Some(table.clone()),
                        message: observation.detail.clone(),
                        ddl: None,
                    });
                }
                PlanObservationKind::Subquery => {
                    out.push(Suggestion {
                        kind: SuggestionKind::Subquery,
                        priority: SuggestionPriority::Medium,
                        query_id: query_id.to_string(),
                        table: Some(table.clone()),
                        message: format!("{}; consider rewriting as a JOIN", observation.detail),
                        ddl: None,
                    });
                }
                PlanObservationKind::TemporaryTable => {
                    out.push(Suggestion {
                        kind: SuggestionKind::TemporaryTable,
                        priority: SuggestionPriority::Medium,
                        query_id: query_id.to_string(),
                        table: Some(table.clone()),
                        message: observation.detail.clone(),
                        ddl: None,
                    });
                }
            }
        }
    }

    /// First occurrence per (table, column) emits; later ones only when the
    /// query was slow
    fn should_emit(&mut self, table: &str, column: &str, slow: bool) -> bool {
        let dedup_key = format!("{table}.{column}");
        let count = self.suggestion_counts.entry(dedup_key).or_insert(0);
        *count += 1;
        *count == 1 || slow
    }

    fn index_ddl(&self, table: &str, column: &str) -> String {
        let escaped_table = identifier::escape(table, self.database_type);
        let escaped_column = identifier::escape(column, self.database_type);
        let index_name = identifier::escape(&format!("idx_{table}_{column}"), self.database_type);
        format!("CREATE INDEX {index_name} ON {escaped_table} ({escaped_column})")
    }

    /// Group this session's suggestions by kind and aggregate unique DDL
    pub fn session_summary(&self) -> SessionSummary {
        let mut summary = SessionSummary {
            total_queries: self.query_counter,
            ..SessionSummary::default()
        };
        for analysis in &self.analyses {
            if analysis.slow {
                summary.slow_queries += 1;
                summary.performance_issues.push(format!(
                    "{}: {:.3}s — {}",
                    analysis.query_id, analysis.execution_time, analysis.sql
                ));
            }
            for suggestion in &analysis.suggestions {
                *summary
                    .suggestions_by_kind
                    .entry(suggestion.kind.to_string())
                    .or_insert(0) += 1;
                if let Some(ddl) = &suggestion.ddl {
                    if !summary.index_ddl.contains(ddl) {
                        summary.index_ddl.push(ddl.clone());
                    }
                }
            }
        }
        summary
    }

    /// Drop all session state, including dedup counters and the query counter
    pub fn clear_session(&mut self) {
        self.query_counter = 0;
        self.analyses.clear();
        self.suggestion_counts.clear();
        self.parse_cache.clear();
    }
}

fn truncate_sql(sql: &str) -> String {
    if sql.len() <= SQL_TRUNCATE_LENGTH {
        sql.to_string()
    } else {
        let mut end = SQL_TRUNCATE_LENGTH;
        while !sql.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &sql[..end])
    }
}
