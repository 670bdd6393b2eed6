//! Cross-dialect schema transformer
//!
//! Clones a source-dialect table model and rewrites columns, indexes,
//! constraints, and options for the target dialect. Non-trivial features
//! are emulated: FULLTEXT becomes a PostgreSQL tsvector + GIN index or a
//! SQLite FTS virtual table with sync triggers, ENUM becomes TEXT with a
//! CHECK constraint, SET becomes TEXT or a PostgreSQL array. Everything
//! the target cannot express is recorded as a warning; DDL that must run
//! after CREATE TABLE is returned as ordered, tagged post-actions.
use crate::database::DatabaseType;
use crate::platform::{Platform, platform_for};
use crate::schema::{
    Column, Constraint, ConstraintType, Index, IndexMethod, IndexType, ReferentialAction, Table,
};
use tracing::debug;

/// Weights cycle A..D and saturate at D for further columns
const TSVECTOR_WEIGHTS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Tunables for the transform pipeline
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Text-search language for to_tsvector()
    pub fulltext_language: String,
    /// SQLite FTS module version
    pub fts_version: u8,
    /// Add a CHECK constraint listing allowed values when ENUM degrades
    pub enum_check_constraints: bool,
    /// Convert SET columns marked is_array to TEXT[] on PostgreSQL
    pub set_as_array: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            fulltext_language: "english".to_string(),
            fts_version: 5,
            enum_check_constraints: true,
            set_as_array: true,
        }
    }
}

/// Semantic tags for post-transform DDL
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostActionKind {
    PostgresqlGinIndex,
    PostgresqlGeneratedColumn,
    SqliteFtsTable,
    SqliteFtsPopulate,
    SqliteFtsTriggers,
}

/// One ordered statement to run after CREATE TABLE
#[derive(Debug, Clone, PartialEq)]
pub struct PostTransformAction {
    pub kind: PostActionKind,
    pub sql: String,
}

/// Transform result: the rewritten model plus trigger flags for
/// downstream generation
#[derive(Debug, Clone)]
pub struct TransformedTable {
    pub table: Table,
    /// Set when ON UPDATE CURRENT_TIMESTAMP had to be dropped
    pub needs_update_trigger: bool,
    pub update_trigger_columns: Vec<String>,
}

/// Cross-dialect schema transformer; warnings and post-actions accumulate
/// per transform call
pub struct SchemaTransformer {
    options: TransformOptions,
    warnings: Vec<String>,
    post_actions: Vec<PostTransformAction>,
}

impl Default for SchemaTransformer {
    fn default() -> Self {
        Self::new(TransformOptions::default())
    }
}

impl SchemaTransformer {
    pub fn new(options: TransformOptions) -> Self {
        Self {
            options,
            warnings: Vec::new(),
            post_actions: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn post_transform_actions(&self) -> &[PostTransformAction] {
        &self.post_actions
    }

    /// Rewrite a table model for the target dialect. The input is cloned;
    /// warnings and post-actions from any previous call are discarded.
    pub fn transform(
        &mut self,
        table: &Table,
        source: DatabaseType,
        target: DatabaseType,
    ) -> TransformedTable {
        self.warnings.clear();
        self.post_actions.clear();
        debug!(
            "[SchemaTransformer::transform] '{}' {source} -> {target}",
            table.name
        );

        let platform = platform_for(target);
        let mut transformed = table.clone();
        let mut trigger_columns = Vec::new();

        self.transform_columns(&mut transformed, target, platform.as_ref(), &mut trigger_columns);
        self.transform_indexes(&mut transformed, target, platform.as_ref());
        self.transform_constraints(&mut transformed, target);

        if target != DatabaseType::MySQL {
            transformed.options.engine = None;
            transformed.options.charset = None;
            transformed.options.collation = None;
        }

        let needs_update_trigger = !trigger_columns.is_empty();
        TransformedTable {
            table: transformed,
            needs_update_trigger,
            update_trigger_columns: trigger_columns,
        }
    }

    fn transform_columns(
        &mut self,
        table: &mut Table,
        target: DatabaseType,
        platform: &dyn Platform,
        trigger_columns: &mut Vec<String>,
    ) {
        let table_name = table.name.clone();
        let mut check_constraints = Vec::new();

        for column in &mut table.columns {
            if column.is_type("ENUM") && target != DatabaseType::MySQL {
                self.warnings.push(format!(
                    "ENUM column '{}' degraded to TEXT on {target}",
                    column.name
                ));
                column.data_type = "TEXT".to_string();
                if self.options.enum_check_constraints && !column.enum_values.is_empty() {
                    let values = column
                        .enum_values
                        .iter()
                        .map(|v| format!("'{}'", v.replace('\'', "''")))
                        .collect::<Vec<_>>()
                        .join(",");
                    check_constraints.push(Constraint::check(
                        format!("chk_{table_name}_{}", column.name),
                        format!("{} IN ({values})", column.name),
                    ));
                }
                column.enum_values.clear();
            } else if column.is_type("SET") && target != DatabaseType::MySQL {
                if target == DatabaseType::PostgreSQL && self.options.set_as_array && column.is_array
                {
                    column.data_type = "TEXT".to_string();
                    if let Some(default) = column.default.clone() {
                        column.default = Some(strip_quotes(&default).to_string());
                    }
                    self.warnings.push(format!(
                        "SET column '{}' converted to TEXT[] on PostgreSQL",
                        column.name
                    ));
                } else {
                    column.data_type = "TEXT".to_string();
                    column.is_array = false;
                    self.warnings.push(format!(
                        "SET column '{}' degraded to TEXT on {target}",
                        column.name
                    ));
                }
                column.enum_values.clear();
            } else if column.is_array && target != DatabaseType::PostgreSQL {
                column.is_array = false;
                column.data_type = match target {
                    DatabaseType::MySQL => "JSON".to_string(),
                    _ => "TEXT".to_string(),
                };
                self.warnings.push(format!(
                    "Array column '{}' stored as {} on {target}",
                    column.name, column.data_type
                ));
            } else {
                column.data_type = platform.rewrite_type(&column.data_type);
            }

            if column.auto_increment && target == DatabaseType::SQLite {
                // Only INTEGER PRIMARY KEY gets rowid aliasing
                column.data_type = "INTEGER".to_string();
            }

            if column.unsigned && !platform.supports_unsigned() {
                column.unsigned = false;
                self.warnings.push(format!(
                    "UNSIGNED dropped from column '{}' on {target}",
                    column.name
                ));
            }

            if let Some(on_update) = column.on_update.clone() {
                if target != DatabaseType::MySQL {
                    if on_update.to_uppercase().contains("CURRENT_TIMESTAMP") {
                        trigger_columns.push(column.name.clone());
                        self.warnings.push(format!(
                            "ON UPDATE CURRENT_TIMESTAMP on '{}' requires a trigger on {target}",
                            column.name
                        ));
                    }
                    column.on_update = None;
                }
            }

            if !platform.supports_column_comments() {
                column.comment = None;
            }

            if let Some(default) = column.default.clone() {
                column.default = Some(normalize_default(&default, &column.data_type, target));
            }
        }

        table.constraints.extend(check_constraints);
    }

    fn transform_indexes(&mut self, table: &mut Table, target: DatabaseType, platform: &dyn Platform) {
        let original = std::mem::take(&mut table.indexes);
        let mut kept = Vec::new();

        for mut index in original {
            match index.index_type {
                IndexType::Fulltext if !platform.supports_fulltext() => {
                    match target {
                        DatabaseType::PostgreSQL => {
                            self.fulltext_to_tsvector(table, &index);
                        }
                        DatabaseType::SQLite => {
                            self.fulltext_to_fts(table, &index);
                        }
                        DatabaseType::MySQL => {
                            // Unreachable: MySQL reports fulltext support
                            index.index_type = IndexType::Index;
                            self.warnings.push(format!(
                                "FULLTEXT index '{}' degraded to a composite index",
                                index.name
                            ));
                            kept.push(index);
                        }
                    }
                    continue;
                }
                IndexType::Spatial if target != DatabaseType::MySQL => {
                    self.warnings.push(format!(
                        "SPATIAL index '{}' is not supported on {target} and was dropped",
                        index.name
                    ));
                    continue;
                }
                _ => {}
            }

            if index.where_clause.is_some() && !platform.supports_partial_indexes() {
                index.where_clause = None;
                self.warnings.push(format!(
                    "Partial index '{}' loses its WHERE clause on {target}",
                    index.name
                ));
            }
            if matches!(index.method, Some(IndexMethod::Gin) | Some(IndexMethod::Gist))
                && target != DatabaseType::PostgreSQL
            {
                index.method = None;
                self.warnings.push(format!(
                    "Index method dropped from '{}' on {target}",
                    index.name
                ));
            }
            kept.push(index);
        }

        table.indexes = kept;
    }

    /// FULLTEXT on PostgreSQL: a GIN expression index for one column, or a
    /// weighted generated tsvector column plus GIN index for several
    fn fulltext_to_tsvector(&mut self, table: &mut Table, index: &Index) {
        let language = self.options.fulltext_language.clone();
        let table_name = table.name.clone();
        let quoted_table = crate::identifier::escape(&table_name, DatabaseType::PostgreSQL);

        if index.columns.len() == 1 {
            let column = &index.columns[0];
            let index_name = crate::identifier::escape(
                &format!("idx_{table_name}_{column}_fts"),
                DatabaseType::PostgreSQL,
            );
            self.post_actions.push(PostTransformAction {
                kind: PostActionKind::PostgresqlGinIndex,
                sql: format!(
                    "CREATE INDEX {index_name} ON {quoted_table} USING gin (to_tsvector('{language}', {column}))"
                ),
            });
            self.warnings.push(format!(
                "FULLTEXT index '{}' became a GIN expression index",
                index.name
            ));
            return;
        }

        let vector_column = format!("{table_name}_search_vector");
        let expression = index
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let weight = TSVECTOR_WEIGHTS[i.min(TSVECTOR_WEIGHTS.len() - 1)];
                format!("setweight(to_tsvector('{language}', coalesce({column},'')),'{weight}')")
            })
            .collect::<Vec<_>>()
            .join(" || ");

        let mut generated = Column::new(vector_column.clone(), "TSVECTOR");
        generated.generated_expression = Some(expression.clone());
        table.columns.push(generated);

        let mut gin_index = Index::new(
            format!("idx_{vector_column}"),
            IndexType::Index,
            vec![vector_column.clone()],
        );
        gin_index.method = Some(IndexMethod::Gin);
        table.indexes.push(gin_index);

        let quoted_column = crate::identifier::escape(&vector_column, DatabaseType::PostgreSQL);
        self.post_actions.push(PostTransformAction {
            kind: PostActionKind::PostgresqlGeneratedColumn,
            sql: format!(
                "ALTER TABLE {quoted_table} ADD COLUMN {quoted_column} tsvector GENERATED ALWAYS AS ({expression}) STORED"
            ),
        });
        let quoted_index = crate::identifier::escape(
            &format!("idx_{vector_column}"),
            DatabaseType::PostgreSQL,
        );
        self.post_actions.push(PostTransformAction {
            kind: PostActionKind::PostgresqlGinIndex,
            sql: format!(
                "CREATE INDEX {quoted_index} ON {quoted_table} USING gin ({quoted_column})"
            ),
        });
        self.warnings.push(format!(
            "FULLTEXT index '{}' became generated column '{vector_column}' with a GIN index",
            index.name
        ));
    }

    /// FULLTEXT on SQLite: an external-content FTS virtual table, a rebuild
    /// insert, and insert/update/delete sync triggers
    fn fulltext_to_fts(&mut self, table: &mut Table, index: &Index) {
        let table_name = table.name.clone();
        let fts_table = format!("{table_name}_fts");
        let version = self.options.fts_version;
        let columns = index.columns.join(", ");

        self.post_actions.push(PostTransformAction {
            kind: PostActionKind::SqliteFtsTable,
            sql: format!(
                "CREATE VIRTUAL TABLE {fts_table} USING fts{version}({columns}, content='{table_name}')"
            ),
        });
        self.post_actions.push(PostTransformAction {
            kind: PostActionKind::SqliteFtsPopulate,
            sql: format!(
                "INSERT INTO {fts_table}(rowid, {columns}) SELECT rowid, {columns} FROM {table_name}"
            ),
        });

        let new_values = index
            .columns
            .iter()
            .map(|c| format!("new.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let old_values = index
            .columns
            .iter()
            .map(|c| format!("old.{c}"))
            .collect::<Vec<_>>()
            .join(", ");

        self.post_actions.push(PostTransformAction {
            kind: PostActionKind::SqliteFtsTriggers,
            sql: format!(
                "CREATE TRIGGER {table_name}_fts_ai AFTER INSERT ON {table_name} BEGIN \
                 INSERT INTO {fts_table}(rowid, {columns}) VALUES (new.rowid, {new_values}); END"
            ),
        });
        self.post_actions.push(PostTransformAction {
            kind: PostActionKind::SqliteFtsTriggers,
            sql: format!(
                "CREATE TRIGGER {table_name}_fts_ad AFTER DELETE ON {table_name} BEGIN \
                 INSERT INTO {fts_table}({fts_table}, rowid, {columns}) VALUES ('delete', old.rowid, {old_values}); END"
            ),
        });
        self.post_actions.push(PostTransformAction {
            kind: PostActionKind::SqliteFtsTriggers,
            sql: format!(
                "CREATE TRIGGER {table_name}_fts_au AFTER UPDATE ON {table_name} BEGIN \
                 INSERT INTO {fts_table}({fts_table}, rowid, {columns}) VALUES ('delete', old.rowid, {old_values}); \
                 INSERT INTO {fts_table}(rowid, {columns}) VALUES (new.rowid, {new_values}); END"
            ),
        });
        self.warnings.push(format!(
            "FULLTEXT index '{}' became FTS{version} virtual table '{fts_table}' with sync triggers",
            index.name
        ));
    }

    fn transform_constraints(&mut self, table: &mut Table, target: DatabaseType) {
        for constraint in &mut table.constraints {
            if target == DatabaseType::SQLite {
                if constraint.on_delete == Some(ReferentialAction::SetDefault) {
                    constraint.on_delete = Some(ReferentialAction::SetNull);
                    self.warnings.push(format!(
                        "ON DELETE SET DEFAULT on '{}' became SET NULL on SQLite",
                        constraint.name
                    ));
                }
                if constraint.on_update == Some(ReferentialAction::SetDefault) {
                    constraint.on_update = Some(ReferentialAction::SetNull);
                    self.warnings.push(format!(
                        "ON UPDATE SET DEFAULT on '{}' became SET NULL on SQLite",
                        constraint.name
                    ));
                }
            }
            if constraint.constraint_type == ConstraintType::Exclude
                && target != DatabaseType::PostgreSQL
            {
                constraint.constraint_type = ConstraintType::Check;
                self.warnings.push(format!(
                    "EXCLUDE constraint '{}' degraded to CHECK on {target}",
                    constraint.name
                ));
            }
        }
    }
}

fn strip_quotes(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Trim surrounding quotes, fold booleans to integers for integer types,
/// preserve CURRENT_TIMESTAMP, and map UUID generators between dialects
fn normalize_default(default: &str, data_type: &str, target: DatabaseType) -> String {
    let inner = strip_quotes(default);
    let upper = inner.to_uppercase();

    if upper == "CURRENT_TIMESTAMP" {
        return "CURRENT_TIMESTAMP".to_string();
    }
    if target == DatabaseType::MySQL && inner.eq_ignore_ascii_case("gen_random_uuid()") {
        return "UUID()".to_string();
    }

    let base = data_type
        .to_uppercase()
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    let integer_type = matches!(
        base.as_str(),
        "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT"
    );
    if integer_type {
        if upper == "TRUE" {
            return "1".to_string();
        }
        if upper == "FALSE" {
            return "0".to_string();
        }
        if inner.parse::<i64>().is_ok() {
            return inner.to_string();
        }
    }

    default.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Table;

    fn enum_table() -> Table {
        let mut status = Column::new("status", "ENUM");
        status.enum_values = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        Table::new("orders").with_columns(vec![Column::new("id", "INT").primary(), status])
    }

    fn fulltext_table(columns: Vec<&str>) -> Table {
        let mut table = Table::new("articles").with_columns(vec![
            Column::new("id", "INT").primary(),
            Column::new("title", "VARCHAR").with_length(200),
            Column::new("body", "TEXT"),
        ]);
        table.indexes.push(Index::new(
            "ft_articles",
            IndexType::Fulltext,
            columns.into_iter().map(String::from).collect(),
        ));
        table
    }

    #[test]
    fn test_enum_to_sqlite_text_with_check() {
        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(&enum_table(), DatabaseType::MySQL, DatabaseType::SQLite);
        let status = result.table.column("status").unwrap();
        assert_eq!(status.data_type, "TEXT");
        let check = result
            .table
            .constraints
            .iter()
            .find(|c| c.constraint_type == ConstraintType::Check)
            .expect("check constraint");
        assert_eq!(check.expression.as_deref(), Some("status IN ('a','b','c')"));
        assert!(!transformer.warnings().is_empty());
    }

    #[test]
    fn test_enum_kept_on_mysql_target() {
        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(&enum_table(), DatabaseType::MySQL, DatabaseType::MySQL);
        let status = result.table.column("status").unwrap();
        assert_eq!(status.data_type, "ENUM");
        assert_eq!(status.enum_values.len(), 3);
    }

    #[test]
    fn test_fulltext_multi_column_to_postgresql() {
        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(
            &fulltext_table(vec!["title", "body"]),
            DatabaseType::MySQL,
            DatabaseType::PostgreSQL,
        );

        let vector = result
            .table
            .column("articles_search_vector")
            .expect("generated tsvector column");
        assert_eq!(
            vector.generated_expression.as_deref(),
            Some(
                "setweight(to_tsvector('english', coalesce(title,'')),'A') || \
                 setweight(to_tsvector('english', coalesce(body,'')),'B')"
            )
        );
        let gin = result
            .table
            .indexes
            .iter()
            .find(|i| i.method == Some(IndexMethod::Gin))
            .expect("gin index");
        assert_eq!(gin.columns, vec!["articles_search_vector".to_string()]);

        // Exactly two post actions: add column, create index
        let actions = transformer.post_transform_actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].kind, PostActionKind::PostgresqlGeneratedColumn);
        assert!(actions[0].sql.starts_with("ALTER TABLE \"articles\" ADD COLUMN"));
        assert_eq!(actions[1].kind, PostActionKind::PostgresqlGinIndex);
        assert!(actions[1].sql.contains("USING gin"));

        // The original FULLTEXT index is gone
        assert!(!result
            .table
            .indexes
            .iter()
            .any(|i| i.index_type == IndexType::Fulltext));
    }

    #[test]
    fn test_fulltext_single_column_to_postgresql() {
        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(
            &fulltext_table(vec!["body"]),
            DatabaseType::MySQL,
            DatabaseType::PostgreSQL,
        );
        let actions = transformer.post_transform_actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, PostActionKind::PostgresqlGinIndex);
        assert!(actions[0]
            .sql
            .contains("USING gin (to_tsvector('english', body))"));
        // Expression index lives only in the post-action
        assert!(result.table.indexes.is_empty());
    }

    #[test]
    fn test_fulltext_to_sqlite_fts() {
        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(
            &fulltext_table(vec!["title", "body"]),
            DatabaseType::MySQL,
            DatabaseType::SQLite,
        );
        assert!(result.table.indexes.is_empty());

        let actions = transformer.post_transform_actions();
        assert_eq!(actions.len(), 5);
        assert_eq!(actions[0].kind, PostActionKind::SqliteFtsTable);
        assert_eq!(
            actions[0].sql,
            "CREATE VIRTUAL TABLE articles_fts USING fts5(title, body, content='articles')"
        );
        assert_eq!(actions[1].kind, PostActionKind::SqliteFtsPopulate);
        assert_eq!(
            actions
                .iter()
                .filter(|a| a.kind == PostActionKind::SqliteFtsTriggers)
                .count(),
            3
        );
        assert!(actions[2].sql.contains("AFTER INSERT"));
        assert!(actions[3].sql.contains("AFTER DELETE"));
        assert!(actions[4].sql.contains("AFTER UPDATE"));
    }

    #[test]
    fn test_unsigned_dropped_with_warning() {
        let mut table = Table::new("t");
        let mut count = Column::new("count", "INT");
        count.unsigned = true;
        table.columns.push(count);

        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(&table, DatabaseType::MySQL, DatabaseType::PostgreSQL);
        assert!(!result.table.column("count").unwrap().unsigned);
        assert!(transformer
            .warnings()
            .iter()
            .any(|w| w.contains("UNSIGNED")));
    }

    #[test]
    fn test_on_update_current_timestamp_flags_trigger() {
        let mut table = Table::new("t");
        let mut updated_at = Column::new("updated_at", "TIMESTAMP");
        updated_at.on_update = Some("CURRENT_TIMESTAMP".to_string());
        table.columns.push(updated_at);

        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(&table, DatabaseType::MySQL, DatabaseType::PostgreSQL);
        assert!(result.needs_update_trigger);
        assert_eq!(result.update_trigger_columns, vec!["updated_at".to_string()]);
        assert!(result.table.column("updated_at").unwrap().on_update.is_none());

        // MySQL target keeps the clause
        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(&table, DatabaseType::MySQL, DatabaseType::MySQL);
        assert!(!result.needs_update_trigger);
        assert!(result.table.column("updated_at").unwrap().on_update.is_some());
    }

    #[test]
    fn test_auto_increment_to_sqlite_integer() {
        let mut table = Table::new("t");
        let mut id = Column::new("id", "BIGINT UNSIGNED").primary();
        id.auto_increment = true;
        id.unsigned = true;
        table.columns.push(id);

        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(&table, DatabaseType::MySQL, DatabaseType::SQLite);
        let id = result.table.column("id").unwrap();
        assert_eq!(id.data_type, "INTEGER");
        assert!(!id.unsigned);
    }

    #[test]
    fn test_set_default_becomes_set_null_on_sqlite() {
        let mut table = Table::new("orders");
        let mut fk = Constraint::foreign_key(
            "fk_orders_user",
            vec!["user_id".to_string()],
            "users",
            vec!["id".to_string()],
        );
        fk.on_delete = Some(ReferentialAction::SetDefault);
        table.constraints.push(fk);

        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(&table, DatabaseType::PostgreSQL, DatabaseType::SQLite);
        assert_eq!(
            result.table.constraints[0].on_delete,
            Some(ReferentialAction::SetNull)
        );
    }

    #[test]
    fn test_partial_index_where_dropped_on_mysql() {
        let mut table = Table::new("jobs");
        let mut index = Index::new("idx_pending", IndexType::Index, vec!["status".to_string()]);
        index.where_clause = Some("status = 'pending'".to_string());
        table.indexes.push(index);

        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(&table, DatabaseType::PostgreSQL, DatabaseType::MySQL);
        assert!(result.table.indexes[0].where_clause.is_none());
        assert!(transformer.warnings().iter().any(|w| w.contains("Partial")));
    }

    #[test]
    fn test_default_normalization() {
        let mut table = Table::new("t");
        table
            .columns
            .push(Column::new("active", "INT").with_default("TRUE"));
        table
            .columns
            .push(Column::new("token", "UUID").with_default("gen_random_uuid()"));
        table
            .columns
            .push(Column::new("created_at", "TIMESTAMP").with_default("'CURRENT_TIMESTAMP'"));

        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(&table, DatabaseType::PostgreSQL, DatabaseType::MySQL);
        assert_eq!(result.table.column("active").unwrap().default.as_deref(), Some("1"));
        assert_eq!(
            result.table.column("token").unwrap().default.as_deref(),
            Some("UUID()")
        );
        assert_eq!(
            result.table.column("created_at").unwrap().default.as_deref(),
            Some("CURRENT_TIMESTAMP")
        );
    }

    #[test]
    fn test_table_options_stripped_for_non_mysql() {
        let mut table = Table::new("t");
        table.options.engine = Some("InnoDB".to_string());
        table.options.charset = Some("utf8mb4".to_string());

        let mut transformer = SchemaTransformer::default();
        let result = transformer.transform(&table, DatabaseType::MySQL, DatabaseType::PostgreSQL);
        assert!(result.table.options.engine.is_none());
        assert!(result.table.options.charset.is_none());

        let result = transformer.transform(&table, DatabaseType::MySQL, DatabaseType::MySQL);
        assert_eq!(result.table.options.engine.as_deref(), Some("InnoDB"));
    }

    #[test]
    fn test_transform_is_idempotent_on_its_output() {
        let mut transformer = SchemaTransformer::default();
        let first = transformer.transform(
            &fulltext_table(vec!["title", "body"]),
            DatabaseType::MySQL,
            DatabaseType::PostgreSQL,
        );
        let mut transformer = SchemaTransformer::default();
        let second = transformer.transform(
            &first.table,
            DatabaseType::PostgreSQL,
            DatabaseType::PostgreSQL,
        );
        assert_eq!(first.table, second.table);
        assert!(transformer.post_transform_actions().is_empty());
    }

    #[test]
    fn test_enum_transform_idempotent() {
        let mut transformer = SchemaTransformer::default();
        let first = transformer.transform(&enum_table(), DatabaseType::MySQL, DatabaseType::SQLite);
        let mut transformer = SchemaTransformer::default();
        let second =
            transformer.transform(&first.table, DatabaseType::SQLite, DatabaseType::SQLite);
        assert_eq!(first.table, second.table);
    }

    #[test]
    fn test_input_table_is_not_mutated() {
        let table = enum_table();
        let mut transformer = SchemaTransformer::default();
        let _ = transformer.transform(&table, DatabaseType::MySQL, DatabaseType::SQLite);
        assert_eq!(table.column("status").unwrap().data_type, "ENUM");
    }
}
