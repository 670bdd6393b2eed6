//! Schema introspection and optimization advisor
//!
//! Reads the live schema once, derives per-table performance profiles, and
//! answers operation-level questions: what to batch, what to index, what a
//! call will roughly cost. The snapshot is immutable once published;
//! re-initialization requires an explicit reset.
use crate::database::{
    DatabaseClient, DatabaseError, DatabaseType, IntrospectedColumn, IntrospectedForeignKey,
    IntrospectedIndex,
};
use crate::profiler::SuggestionPriority;
use crate::query_builder::{QueryBuildError, QueryBuilder, QueryOperation, QuerySpec};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Bulk-insert sizing bounds
const BATCH_TARGET_BYTES: u64 = 10 * 1024 * 1024;
const BATCH_MIN: u64 = 100;
const BATCH_MAX: u64 = 2000;
const BATCH_FLOOR: u64 = 50;

/// Per-table performance profile derived purely from introspected data
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PerformanceProfile {
    pub insert_complexity: u32,
    pub select_complexity: u32,
    pub update_complexity: u32,
    pub optimal_batch_size: u32,
    pub cache_priority: u32,
    /// Fraction of columns covered by at least one index
    pub index_effectiveness: f64,
    pub foreign_key_overhead: u32,
}

/// Everything known about one introspected table
#[derive(Debug, Clone, serde::Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<IntrospectedColumn>,
    pub primary_key: Option<String>,
    pub indexes: Vec<IntrospectedIndex>,
    pub foreign_keys: Vec<IntrospectedForeignKey>,
    /// Union of all index column sets
    pub indexed_columns: HashSet<String>,
    pub estimated_row_size: u64,
    pub profile: PerformanceProfile,
}

impl TableSchema {
    pub fn is_indexed(&self, column: &str) -> bool {
        self.indexed_columns.contains(column)
    }
}

/// Immutable schema snapshot published after initialization
#[derive(Debug, Clone)]
pub struct SchemaSnapshot {
    pub database_type: DatabaseType,
    pub tables: BTreeMap<String, TableSchema>,
    /// table -> tables that reference it
    pub incoming_references: HashMap<String, Vec<String>>,
}

/// The operations the advisor knows how to reason about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    BulkInsert,
    Select,
    Update,
    Delete,
}

/// Caller-supplied facts about the operation being planned
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    pub record_count: u64,
    pub where_column: Option<String>,
    pub order_by_column: Option<String>,
    pub limit: Option<u64>,
    /// The batch size the caller currently uses for bulk inserts
    pub current_batch_size: Option<u64>,
    pub updated_columns: Vec<String>,
    pub has_where: bool,
}

/// One advisor recommendation
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub priority: SuggestionPriority,
    pub table: String,
    pub message: String,
    pub ddl: Option<String>,
}

/// Heuristic cost estimate for a planned operation
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub estimated_seconds: f64,
    pub estimated_memory_bytes: u64,
}

/// Cache-warming result counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheWarmStats {
    pub tables: usize,
    pub identifiers: usize,
    pub templates: usize,
}

/// Estimate the byte footprint of one column value from its type name
pub fn estimate_column_size(data_type: &str) -> u64 {
    let upper = data_type.to_uppercase();
    if upper.contains("TIMESTAMP") || upper.contains("DATETIME") {
        return 19;
    }
    if upper.contains("TIME") {
        return 19;
    }
    if upper.contains("DATE") {
        return 10;
    }
    if upper.contains("VARCHAR") || upper.contains("CHAR") {
        return parenthesized_length(&upper).unwrap_or(255);
    }
    if upper.contains("TINYINT(1)") || upper.contains("BOOL") {
        return 1;
    }
    if upper.contains("INT") {
        return 8;
    }
    if upper.contains("JSON") {
        return 500;
    }
    if upper.contains("TEXT") || upper.contains("BLOB") || upper.contains("BYTEA") {
        return 1000;
    }
    if upper.contains("DECIMAL") || upper.contains("NUMERIC") {
        return 16;
    }
    if upper.contains("FLOAT") || upper.contains("DOUBLE") || upper.contains("REAL") {
        return 8;
    }
    if upper.contains("UUID") {
        return 36;
    }
    50
}

fn parenthesized_length(type_name: &str) -> Option<u64> {
    let start = type_name.find('(')? + 1;
    let end = type_name[start..].find(')')? + start;
    type_name[start..end].split(',').next()?.trim().parse().ok()
}

/// Derive the performance profile from table shape
pub fn build_profile(
    columns: &[IntrospectedColumn],
    indexes: &[IntrospectedIndex],
    foreign_keys: &[IntrospectedForeignKey],
    indexed_columns: &HashSet<String>,
    row_size: u64,
    incoming_references: usize,
) -> PerformanceProfile {
    let n_columns = columns.len() as u32;
    let n_indexes = indexes.len() as u32;
    let n_foreign_keys = foreign_keys.len() as u32;

    let insert_complexity = n_columns + 2 * n_indexes + 3 * n_foreign_keys;
    let select_complexity = (n_columns as i64 - 2 * n_indexes as i64).max(1) as u32;
    let update_complexity = (n_columns as f64 + 1.5 * n_indexes as f64).floor() as u32;

    let raw_batch = (BATCH_TARGET_BYTES / row_size.max(1)).clamp(BATCH_MIN, BATCH_MAX);
    let adjusted = (raw_batch as f64 / (1.0 + insert_complexity as f64 / 100.0)).floor() as u64;
    let optimal_batch_size = adjusted.max(BATCH_FLOOR) as u32;

    let relationship_weight = n_foreign_keys as usize + incoming_references;
    let cache_priority = relationship_weight as u32 * 10 + n_columns;

    let index_effectiveness = if n_columns == 0 {
        0.0
    } else {
        indexed_columns.len() as f64 / n_columns as f64
    };

    PerformanceProfile {
        insert_complexity,
        select_complexity,
        update_complexity,
        optimal_batch_size,
        cache_priority,
        index_effectiveness,
        foreign_key_overhead: 3 * n_foreign_keys,
    }
}

/// Process-wide advisor with one-shot lazy initialization
pub struct SchemaAnalyzer {
    snapshot: RwLock<Option<Arc<SchemaSnapshot>>>,
}

impl Default for SchemaAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaAnalyzer {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
        }
    }

    /// Build an analyzer over an already-constructed snapshot
    pub fn from_snapshot(snapshot: SchemaSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(Arc::new(snapshot))),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot.read().expect("snapshot lock poisoned").is_some()
    }

    /// Drop the published snapshot so the next initialize re-reads the schema
    pub fn reset(&self) {
        *self.snapshot.write().expect("snapshot lock poisoned") = None;
    }

    pub fn snapshot(&self) -> Option<Arc<SchemaSnapshot>> {
        self.snapshot
            .read()
            .expect("snapshot lock poisoned")
            .clone()
    }

    /// Read the live schema and publish the snapshot. Idempotent: a second
    /// call returns immediately. Per-table introspection failures are
    /// logged and leave that statistic at its default.
    pub async fn initialize(&self, client: &dyn DatabaseClient) -> Result<(), DatabaseError> {
        if self.is_initialized() {
            debug!("[SchemaAnalyzer::initialize] Snapshot already published, skipping");
            return Ok(());
        }

        let database_type = client.database_type();
        debug!("[SchemaAnalyzer::initialize] Reading {database_type} schema");
        let table_names = client.list_tables().await?;

        let mut raw: Vec<(String, Vec<IntrospectedColumn>, Vec<IntrospectedIndex>, Vec<IntrospectedForeignKey>)> =
            Vec::with_capacity(table_names.len());
        for name in &table_names {
            let columns = match client.get_columns(name).await {
                Ok(columns) => columns,
                Err(e) => {
                    debug!("[SchemaAnalyzer::initialize] Columns for '{name}' failed: {e}");
                    Vec::new()
                }
            };
            let indexes = match client.get_indexes(name).await {
                Ok(indexes) => indexes,
                Err(e) => {
                    debug!("[SchemaAnalyzer::initialize] Indexes for '{name}' failed: {e}");
                    Vec::new()
                }
            };
            let foreign_keys = match client.get_foreign_keys(name).await {
                Ok(foreign_keys) => foreign_keys,
                Err(e) => {
                    debug!("[SchemaAnalyzer::initialize] Foreign keys for '{name}' failed: {e}");
                    Vec::new()
                }
            };
            raw.push((name.clone(), columns, indexes, foreign_keys));
        }

        // Incoming references feed the cache-priority weight
        let mut incoming_references: HashMap<String, Vec<String>> = HashMap::new();
        for (name, _, _, foreign_keys) in &raw {
            for foreign_key in foreign_keys {
                incoming_references
                    .entry(foreign_key.referenced_table.clone())
                    .or_default()
                    .push(name.clone());
            }
        }

        let mut tables = BTreeMap::new();
        for (name, columns, indexes, foreign_keys) in raw {
            let incoming = incoming_references.get(&name).map_or(0, Vec::len);
            tables.insert(
                name.clone(),
                build_table_schema(name, columns, indexes, foreign_keys, incoming),
            );
        }

        let snapshot = SchemaSnapshot {
            database_type,
            tables,
            incoming_references,
        };
        debug!(
            "[SchemaAnalyzer::initialize] Published snapshot with {} tables",
            snapshot.tables.len()
        );
        *self.snapshot.write().expect("snapshot lock poisoned") = Some(Arc::new(snapshot));
        Ok(())
    }

    fn table(&self, name: &str) -> Option<(Arc<SchemaSnapshot>, TableSchema)> {
        let snapshot = self.snapshot()?;
        let table = snapshot.tables.get(name)?.clone();
        Some((snapshot, table))
    }

    /// Operation-level advice for a table
    pub fn recommend(
        &self,
        table: &str,
        operation: OperationKind,
        context: &OperationContext,
    ) -> Vec<Recommendation> {
        let Some((_, schema)) = self.table(table) else {
            return Vec::new();
        };
        let mut recommendations = Vec::new();
        match operation {
            OperationKind::BulkInsert => {
                self.recommend_bulk_insert(&schema, context, &mut recommendations)
            }
            OperationKind::Select => self.recommend_select(&schema, context, &mut recommendations),
            OperationKind::Update => self.recommend_update(&schema, context, &mut recommendations),
            OperationKind::Delete => self.recommend_delete(&schema, context, &mut recommendations),
        }
        recommendations
    }

    fn recommend_bulk_insert(
        &self,
        schema: &TableSchema,
        context: &OperationContext,
        out: &mut Vec<Recommendation>,
    ) {
        let optimal = schema.profile.optimal_batch_size as u64;
        if context.current_batch_size.is_some_and(|current| current != optimal) {
            out.push(Recommendation {
                priority: SuggestionPriority::Medium,
                table: schema.name.clone(),
                message: format!(
                    "Batch size {} is off target; {} rows per batch fits the {}-byte row estimate",
                    context.current_batch_size.unwrap_or(0),
                    optimal,
                    schema.estimated_row_size
                ),
                ddl: None,
            });
        }
        if !schema.foreign_keys.is_empty() && context.record_count > 100 {
            out.push(Recommendation {
                priority: SuggestionPriority::High,
                table: schema.name.clone(),
                message: format!(
                    "{} foreign keys are checked per row; consider loading parents first or batching in a transaction",
                    schema.foreign_keys.len()
                ),
                ddl: None,
            });
        }
        let text_columns = schema
            .columns
            .iter()
            .filter(|c| c.data_type.to_uppercase().contains("TEXT"))
            .count();
        if text_columns > 0 {
            out.push(Recommendation {
                priority: SuggestionPriority::Low,
                table: schema.name.clone(),
                message: format!(
                    "{text_columns} TEXT column(s); compressing large payloads before insert reduces row size"
                ),
                ddl: None,
            });
        }
        if schema.indexes.len() >= 5 && context.record_count >= 1000 {
            out.push(Recommendation {
                priority: SuggestionPriority::High,
                table: schema.name.clone(),
                message: format!(
                    "{} indexes will be maintained for {} rows; dropping and rebuilding secondary indexes may be faster",
                    schema.indexes.len(),
                    context.record_count
                ),
                ddl: None,
            });
        }
    }

    fn recommend_select(
        &self,
        schema: &TableSchema,
        context: &OperationContext,
        out: &mut Vec<Recommendation>,
    ) {
        if let Some(column) = &context.where_column {
            if !schema.is_indexed(column) {
                out.push(Recommendation {
                    priority: SuggestionPriority::High,
                    table: schema.name.clone(),
                    message: format!("WHERE column '{column}' is not covered by any index"),
                    ddl: Some(index_ddl(self, &schema.name, column)),
                });
            }
        }
        if let Some(column) = &context.order_by_column {
            if !schema.is_indexed(column) {
                out.push(Recommendation {
                    priority: SuggestionPriority::Medium,
                    table: schema.name.clone(),
                    message: format!(
                        "ORDER BY column '{column}' is unindexed; sorting will happen in memory"
                    ),
                    ddl: None,
                });
            }
        }
        if context.limit.is_some_and(|limit| limit > 1000) {
            out.push(Recommendation {
                priority: SuggestionPriority::Low,
                table: schema.name.clone(),
                message: "LIMIT above 1000; consider paginating with smaller pages".to_string(),
                ddl: None,
            });
        }
    }

    fn recommend_update(
        &self,
        schema: &TableSchema,
        context: &OperationContext,
        out: &mut Vec<Recommendation>,
    ) {
        match &context.where_column {
            Some(column) if !schema.is_indexed(column) => {
                out.push(Recommendation {
                    priority: SuggestionPriority::High,
                    table: schema.name.clone(),
                    message: format!(
                        "UPDATE filtered on unindexed column '{column}' scans the whole table"
                    ),
                    ddl: Some(index_ddl(self, &schema.name, column)),
                });
            }
            _ => {
                out.push(Recommendation {
                    priority: SuggestionPriority::Low,
                    table: schema.name.clone(),
                    message: "UPDATE filter is index-backed".to_string(),
                    ddl: None,
                });
            }
        }
        let indexed_updates = context
            .updated_columns
            .iter()
            .filter(|column| schema.is_indexed(column))
            .count();
        if indexed_updates > 3 {
            out.push(Recommendation {
                priority: SuggestionPriority::Medium,
                table: schema.name.clone(),
                message: format!(
                    "{indexed_updates} indexed columns are being rewritten; each touched index is updated per row"
                ),
                ddl: None,
            });
        }
        if context.record_count > 100 {
            out.push(Recommendation {
                priority: SuggestionPriority::Medium,
                table: schema.name.clone(),
                message: format!(
                    "{} rows to update; a single set-based UPDATE beats row-at-a-time calls",
                    context.record_count
                ),
                ddl: None,
            });
        }
    }

    fn recommend_delete(
        &self,
        schema: &TableSchema,
        context: &OperationContext,
        out: &mut Vec<Recommendation>,
    ) {
        if !context.has_where {
            out.push(Recommendation {
                priority: SuggestionPriority::Critical,
                table: schema.name.clone(),
                message: "DELETE without WHERE removes every row; TRUNCATE is faster if that is intended"
                    .to_string(),
                ddl: None,
            });
        }
        if let Some(column) = &context.where_column {
            if !schema.is_indexed(column) {
                out.push(Recommendation {
                    priority: SuggestionPriority::High,
                    table: schema.name.clone(),
                    message: format!(
                        "DELETE filtered on unindexed column '{column}' scans the whole table"
                    ),
                    ddl: Some(index_ddl(self, &schema.name, column)),
                });
            }
        }
        if context.record_count > 1000 {
            out.push(Recommendation {
                priority: SuggestionPriority::Medium,
                table: schema.name.clone(),
                message: format!(
                    "{} rows to delete; chunked deletes keep lock times and the undo log small",
                    context.record_count
                ),
                ddl: None,
            });
        }
    }

    /// Heuristic time and memory estimates for a planned operation
    pub fn predict(
        &self,
        table: &str,
        operation: OperationKind,
        record_count: u64,
        context: &OperationContext,
    ) -> Option<Prediction> {
        let (_, schema) = self.table(table)?;
        let profile = &schema.profile;
        match operation {
            OperationKind::BulkInsert => {
                let per_record = 0.0001
                    * (1.0 + profile.insert_complexity as f64 / 10.0)
                    * (1.0
                        + 0.2 * schema.indexes.len() as f64
                        + 0.1 * schema.foreign_keys.len() as f64);
                Some(Prediction {
                    estimated_seconds: per_record * record_count as f64,
                    estimated_memory_bytes: 3 * record_count * schema.estimated_row_size,
                })
            }
            OperationKind::Select => {
                let indexed = context
                    .where_column
                    .as_deref()
                    .is_some_and(|column| schema.is_indexed(column));
                let estimated_seconds = if indexed {
                    0.001
                } else {
                    0.00001 * record_count as f64
                };
                let returned = context.limit.map_or(record_count, |l| l.min(record_count));
                Some(Prediction {
                    estimated_seconds,
                    estimated_memory_bytes: returned * schema.estimated_row_size,
                })
            }
            OperationKind::Update | OperationKind::Delete => {
                let per_record = 0.0001 * (1.0 + profile.update_complexity as f64 / 10.0);
                Some(Prediction {
                    estimated_seconds: per_record * record_count as f64,
                    estimated_memory_bytes: record_count * schema.estimated_row_size,
                })
            }
        }
    }

    /// Pre-validate identifiers and pre-build the hot query templates for
    /// every table in the snapshot
    pub fn warm_caches(&self, builder: &QueryBuilder) -> Result<CacheWarmStats, QueryBuildError> {
        let Some(snapshot) = self.snapshot() else {
            return Ok(CacheWarmStats::default());
        };
        let mut stats = CacheWarmStats::default();
        for (name, schema) in &snapshot.tables {
            stats.tables += 1;
            let columns: Vec<String> = schema.columns.iter().map(|c| c.name.clone()).collect();
            stats.identifiers += 1 + columns.len();

            let select_spec = QuerySpec {
                by_id: true,
                ..QuerySpec::for_table(name.clone())
            };
            builder.build(QueryOperation::SimpleSelect, &select_spec)?;
            builder.build(QueryOperation::CountQuery, &QuerySpec::for_table(name.clone()))?;
            stats.templates += 2;

            if !columns.is_empty() {
                let insert_spec = QuerySpec {
                    columns: columns.clone(),
                    ..QuerySpec::for_table(name.clone())
                };
                builder.build(QueryOperation::SimpleInsert, &insert_spec)?;
                stats.templates += 1;
            }
        }
        debug!(
            "[SchemaAnalyzer::warm_caches] Warmed {} templates across {} tables",
            stats.templates, stats.tables
        );
        Ok(stats)
    }

    /// Human-readable schema and profile report
    pub fn report(&self) -> String {
        let Some(snapshot) = self.snapshot() else {
            return "Schema analyzer not initialized".to_string();
        };
        let mut report = format!(
            "Schema report — {} ({} tables)\n",
            snapshot.database_type,
            snapshot.tables.len()
        );
        for (name, schema) in &snapshot.tables {
            let _ = writeln!(
                report,
                "\n{name}: {} columns, {} indexes, {} foreign keys, ~{} bytes/row",
                schema.columns.len(),
                schema.indexes.len(),
                schema.foreign_keys.len(),
                schema.estimated_row_size
            );
            let profile = &schema.profile;
            let _ = writeln!(
                report,
                "  insert/select/update complexity: {}/{}/{}",
                profile.insert_complexity, profile.select_complexity, profile.update_complexity
            );
            let _ = writeln!(
                report,
                "  optimal batch size: {}, cache priority: {}, index coverage: {:.0}%",
                profile.optimal_batch_size,
                profile.cache_priority,
                profile.index_effectiveness * 100.0
            );
        }
        report
    }
}

fn index_ddl(analyzer: &SchemaAnalyzer, table: &str, column: &str) -> String {
    let database_type = analyzer
        .snapshot()
        .map(|s| s.database_type)
        .unwrap_or(DatabaseType::SQLite);
    let escaped_table = crate::identifier::escape(table, database_type);
    let escaped_column = crate::identifier::escape(column, database_type);
    let index_name =
        crate::identifier::escape(&format!("idx_{table}_{column}"), database_type);
    format!("CREATE INDEX {index_name} ON {escaped_table} ({escaped_column})")
}

/// Assemble one table's schema entry with derived values
pub fn build_table_schema(
    name: String,
    columns: Vec<IntrospectedColumn>,
    indexes: Vec<IntrospectedIndex>,
    foreign_keys: Vec<IntrospectedForeignKey>,
    incoming_references: usize,
) -> TableSchema {
    let primary_key = columns
        .iter()
        .find(|c| c.primary_key)
        .map(|c| c.name.clone());
    let indexed_columns: HashSet<String> = indexes
        .iter()
        .flat_map(|index| index.columns.iter().cloned())
        .collect();
    let estimated_row_size: u64 = columns
        .iter()
        .map(|c| estimate_column_size(&c.data_type))
        .sum();
    let profile = build_profile(
        &columns,
        &indexes,
        &foreign_keys,
        &indexed_columns,
        estimated_row_size,
        incoming_references,
    );
    TableSchema {
        name,
        columns,
        primary_key,
        indexes,
        foreign_keys,
        indexed_columns,
        estimated_row_size,
        profile,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str) -> IntrospectedColumn {
        IntrospectedColumn {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            primary_key: false,
            default_value: None,
            auto_increment: false,
        }
    }

    fn sample_snapshot() -> SchemaSnapshot {
        let users = build_table_schema(
            "users".to_string(),
            vec![
                column("id", "INTEGER"),
                column("email", "VARCHAR(255)"),
                column("bio", "TEXT"),
            ],
            vec![IntrospectedIndex {
                name: "idx_users_email".to_string(),
                columns: vec!["email".to_string()],
                unique: true,
            }],
            Vec::new(),
            1,
        );
        let posts = build_table_schema(
            "posts".to_string(),
            vec![
                column("id", "INTEGER"),
                column("user_id", "INTEGER"),
                column("title", "VARCHAR(200)"),
                column("body", "TEXT"),
            ],
            vec![IntrospectedIndex {
                name: "idx_posts_user".to_string(),
                columns: vec!["user_id".to_string()],
                unique: false,
            }],
            vec![IntrospectedForeignKey {
                name: "fk_posts_user".to_string(),
                column: "user_id".to_string(),
                referenced_table: "users".to_string(),
                referenced_column: "id".to_string(),
                on_delete: None,
                on_update: None,
            }],
            0,
        );
        let mut tables = BTreeMap::new();
        tables.insert("users".to_string(), users);
        tables.insert("posts".to_string(), posts);
        SchemaSnapshot {
            database_type: DatabaseType::SQLite,
            tables,
            incoming_references: HashMap::from([(
                "users".to_string(),
                vec!["posts".to_string()],
            )]),
        }
    }

    #[test]
    fn test_estimate_column_size() {
        assert_eq!(estimate_column_size("INTEGER"), 8);
        assert_eq!(estimate_column_size("BIGINT"), 8);
        assert_eq!(estimate_column_size("VARCHAR(100)"), 100);
        assert_eq!(estimate_column_size("varchar"), 255);
        assert_eq!(estimate_column_size("TEXT"), 1000);
        assert_eq!(estimate_column_size("BOOLEAN"), 1);
        assert_eq!(estimate_column_size("JSON"), 500);
        assert_eq!(estimate_column_size("DATE"), 10);
        assert_eq!(estimate_column_size("TIMESTAMP"), 19);
        assert_eq!(estimate_column_size("DATETIME"), 19);
    }

    #[test]
    fn test_profile_formulas() {
        let snapshot = sample_snapshot();
        let posts = &snapshot.tables["posts"];
        // 4 columns + 2*1 index + 3*1 fk
        assert_eq!(posts.profile.insert_complexity, 9);
        // max(1, 4 - 2*1)
        assert_eq!(posts.profile.select_complexity, 2);
        // floor(4 + 1.5*1)
        assert_eq!(posts.profile.update_complexity, 5);
        // 1 outgoing fk, 0 incoming → weight 1 → 10 + 4 columns
        assert_eq!(posts.profile.cache_priority, 14);
        assert_eq!(posts.profile.foreign_key_overhead, 3);
    }

    #[test]
    fn test_batch_size_bounds() {
        // Small rows hit the upper clamp before the complexity division
        let schema = build_table_schema(
            "tiny".to_string(),
            vec![column("id", "INTEGER")],
            Vec::new(),
            Vec::new(),
            0,
        );
        // raw 2000, insert_complexity 1 → 2000 / 1.01
        assert_eq!(schema.profile.optimal_batch_size, 1980);
        assert!(schema.profile.optimal_batch_size >= BATCH_FLOOR as u32);
    }

    #[test]
    fn test_indexed_columns_union() {
        let snapshot = sample_snapshot();
        let users = &snapshot.tables["users"];
        assert!(users.is_indexed("email"));
        assert!(!users.is_indexed("bio"));
        let expected: HashSet<String> = users
            .indexes
            .iter()
            .flat_map(|i| i.columns.iter().cloned())
            .collect();
        assert_eq!(users.indexed_columns, expected);
    }

    #[test]
    fn test_recommend_select_unindexed_where() {
        let analyzer = SchemaAnalyzer::from_snapshot(sample_snapshot());
        let context = OperationContext {
            where_column: Some("bio".to_string()),
            ..OperationContext::default()
        };
        let recommendations = analyzer.recommend("users", OperationKind::Select, &context);
        assert!(recommendations
            .iter()
            .any(|r| r.priority == SuggestionPriority::High && r.ddl.is_some()));
    }

    #[test]
    fn test_recommend_select_indexed_where_is_quiet() {
        let analyzer = SchemaAnalyzer::from_snapshot(sample_snapshot());
        let context = OperationContext {
            where_column: Some("email".to_string()),
            ..OperationContext::default()
        };
        let recommendations = analyzer.recommend("users", OperationKind::Select, &context);
        assert!(recommendations.is_empty());
    }

    #[test]
    fn test_recommend_bulk_insert_foreign_keys() {
        let analyzer = SchemaAnalyzer::from_snapshot(sample_snapshot());
        let context = OperationContext {
            record_count: 500,
            current_batch_size: Some(10),
            ..OperationContext::default()
        };
        let recommendations = analyzer.recommend("posts", OperationKind::BulkInsert, &context);
        assert!(recommendations.iter().any(|r| r.message.contains("foreign keys")));
        assert!(recommendations.iter().any(|r| r.message.contains("Batch size")));
    }

    #[test]
    fn test_recommend_delete_without_where() {
        let analyzer = SchemaAnalyzer::from_snapshot(sample_snapshot());
        let context = OperationContext {
            record_count: 5000,
            has_where: false,
            ..OperationContext::default()
        };
        let recommendations = analyzer.recommend("posts", OperationKind::Delete, &context);
        assert!(recommendations
            .iter()
            .any(|r| r.priority == SuggestionPriority::Critical));
        assert!(recommendations.iter().any(|r| r.message.contains("chunked") || r.message.contains("Chunked")));
    }

    #[test]
    fn test_predict_select_indexed_vs_not() {
        let analyzer = SchemaAnalyzer::from_snapshot(sample_snapshot());
        let indexed = analyzer
            .predict(
                "users",
                OperationKind::Select,
                100_000,
                &OperationContext {
                    where_column: Some("email".to_string()),
                    ..OperationContext::default()
                },
            )
            .unwrap();
        let scanned = analyzer
            .predict(
                "users",
                OperationKind::Select,
                100_000,
                &OperationContext {
                    where_column: Some("bio".to_string()),
                    ..OperationContext::default()
                },
            )
            .unwrap();
        assert!(indexed.estimated_seconds < scanned.estimated_seconds);
    }

    #[test]
    fn test_predict_bulk_insert_memory() {
        let analyzer = SchemaAnalyzer::from_snapshot(sample_snapshot());
        let snapshot = analyzer.snapshot().unwrap();
        let row_size = snapshot.tables["posts"].estimated_row_size;
        let prediction = analyzer
            .predict("posts", OperationKind::BulkInsert, 100, &OperationContext::default())
            .unwrap();
        assert_eq!(prediction.estimated_memory_bytes, 3 * 100 * row_size);
    }

    #[test]
    fn test_recommend_unknown_table_is_empty() {
        let analyzer = SchemaAnalyzer::from_snapshot(sample_snapshot());
        assert!(analyzer
            .recommend("missing", OperationKind::Select, &OperationContext::default())
            .is_empty());
    }

    #[test]
    fn test_reset_clears_snapshot() {
        let analyzer = SchemaAnalyzer::from_snapshot(sample_snapshot());
        assert!(analyzer.is_initialized());
        analyzer.reset();
        assert!(!analyzer.is_initialized());
    }

    #[test]
    fn test_warm_caches_builds_templates() {
        let analyzer = SchemaAnalyzer::from_snapshot(sample_snapshot());
        let builder = QueryBuilder::new(DatabaseType::SQLite);
        let stats = analyzer.warm_caches(&builder).unwrap();
        assert_eq!(stats.tables, 2);
        assert_eq!(stats.templates, 6);
        assert!(builder.cache_stats().insertions >= 6);
    }

    #[test]
    fn test_report_renders() {
        let analyzer = SchemaAnalyzer::from_snapshot(sample_snapshot());
        let report = analyzer.report();
        assert!(report.contains("users"));
        assert!(report.contains("optimal batch size"));
    }

    #[tokio::test]
    async fn test_initialize_from_live_sqlite() {
        use crate::database_sqlite::SqliteClient;
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for statement in [
            "CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            "CREATE TABLE books (
                id INTEGER PRIMARY KEY,
                author_id INTEGER REFERENCES authors(id),
                title VARCHAR(200)
            )",
            "CREATE INDEX idx_books_author ON books(author_id)",
        ] {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        let client = SqliteClient::from_pool(pool);
        let analyzer = SchemaAnalyzer::new();
        analyzer.initialize(&client).await.unwrap();
        assert!(analyzer.is_initialized());

        let snapshot = analyzer.snapshot().unwrap();
        assert!(snapshot.tables.contains_key("authors"));
        let books = &snapshot.tables["books"];
        assert!(books.is_indexed("author_id"));
        assert_eq!(books.foreign_keys.len(), 1);
        // Incoming reference from books raises the authors cache priority
        assert!(snapshot.incoming_references["authors"].contains(&"books".to_string()));

        // Idempotent second call
        analyzer.initialize(&client).await.unwrap();
    }
}
