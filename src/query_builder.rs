//! Parameterized SQL generation for CRUD and bulk operations
//!
//! Every identifier passes the firewall and every expression passes the
//! validator before anything is interpolated. Bound values always travel
//! as named `:col` parameters, except bulk inserts which use positional
//! `?` placeholders.
use crate::cache::{BoundedCache, CacheStats, cache_key};
use crate::database::DatabaseType;
use crate::expression::{self, ExpressionContext, ExpressionError};
use crate::identifier::{self, IdentifierError, IdentifierKind};
use crate::translator;
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;

const SQL_CACHE_CAPACITY: usize = 500;
const SQL_CACHE_EVICT_PERCENT: usize = 50;

/// Comparison operators accepted in the WHERE slot
static WHERE_OPERATORS: &[&str] = &[
    "=", "!=", "<>", "<", "<=", ">", ">=", "LIKE", "IN", "IS",
];

/// The query templates this builder can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOperation {
    SimpleSelect,
    SimpleInsert,
    InsertWithExpressions,
    SimpleUpdate,
    UpdateWithExpressions,
    UpdateWhereWithExpressions,
    SimpleDelete,
    BulkInsert,
    CountQuery,
}

impl fmt::Display for QueryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryOperation::SimpleSelect => "simple_select",
            QueryOperation::SimpleInsert => "simple_insert",
            QueryOperation::InsertWithExpressions => "insert_with_expressions",
            QueryOperation::SimpleUpdate => "simple_update",
            QueryOperation::UpdateWithExpressions => "update_with_expressions",
            QueryOperation::UpdateWhereWithExpressions => "update_where_with_expressions",
            QueryOperation::SimpleDelete => "simple_delete",
            QueryOperation::BulkInsert => "bulk_insert",
            QueryOperation::CountQuery => "count_query",
        };
        write!(f, "{name}")
    }
}

/// Parameters for one build call.
///
/// `expressions` keeps caller order; each pair is (column, raw expression)
/// and the expression is validated and dialect-translated at build time.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QuerySpec {
    pub table: String,
    pub columns: Vec<String>,
    pub expressions: Vec<(String, String)>,
    pub allowed_columns: Vec<String>,
    /// Select/delete by primary key: `WHERE id = :id`
    pub by_id: bool,
    pub where_column: Option<String>,
    /// Defaults to `=`; must be in the operator allowlist
    pub where_operator: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Number of rows for bulk inserts
    pub row_count: Option<usize>,
}

impl QuerySpec {
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }
}

/// Query construction failures
#[derive(Error, Debug)]
pub enum QueryBuildError {
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("Operator '{operator}' is not in the WHERE allowlist")]
    OperatorNotAllowed { operator: String },

    #[error("Operation {operation} requires at least one column")]
    NoColumns { operation: QueryOperation },

    #[error("Operation {operation} requires a positive row count")]
    InvalidRowCount { operation: QueryOperation },

    #[error("Operation {operation} requires a WHERE column")]
    MissingWhereColumn { operation: QueryOperation },

    #[error("Failed to serialize query parameters: {0}")]
    Serialization(String),
}

/// Dialect-aware SQL builder with a bounded template cache
pub struct QueryBuilder {
    database_type: DatabaseType,
    cache: Mutex<BoundedCache<String>>,
}

impl QueryBuilder {
    pub fn new(database_type: DatabaseType) -> Self {
        Self {
            database_type,
            cache: Mutex::new(BoundedCache::new(
                SQL_CACHE_CAPACITY,
                SQL_CACHE_EVICT_PERCENT,
            )),
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    /// Build (or fetch from cache) the SQL for an operation
    pub fn build(
        &self,
        operation: QueryOperation,
        spec: &QuerySpec,
    ) -> Result<String, QueryBuildError> {
        let serialized = serde_json::to_string(spec)
            .map_err(|e| QueryBuildError::Serialization(e.to_string()))?;
        let key = cache_key(&[
            self.database_type.display_name(),
            &operation.to_string(),
            &serialized,
        ]);

        {
            let mut cache = self.cache.lock().expect("sql cache poisoned");
            if let Some(sql) = cache.get(&key) {
                return Ok(sql.clone());
            }
        }

        let sql = self.render(operation, spec)?;

        let mut cache = self.cache.lock().expect("sql cache poisoned");
        cache.insert(key, sql.clone());
        Ok(sql)
    }

    /// Snapshot of the template cache hit/miss counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().expect("sql cache poisoned").stats()
    }

    fn render(&self, operation: QueryOperation, spec: &QuerySpec) -> Result<String, QueryBuildError> {
        match operation {
            QueryOperation::SimpleSelect => self.render_select(spec),
            QueryOperation::SimpleInsert => self.render_insert(spec, false),
            QueryOperation::InsertWithExpressions => self.render_insert(spec, true),
            QueryOperation::SimpleUpdate => self.render_update(operation, spec, false),
            QueryOperation::UpdateWithExpressions => self.render_update(operation, spec, true),
            QueryOperation::UpdateWhereWithExpressions => {
                self.render_update(operation, spec, true)
            }
            QueryOperation::SimpleDelete => self.render_delete(spec),
            QueryOperation::BulkInsert => self.render_bulk_insert(spec),
            QueryOperation::CountQuery => self.render_count(spec),
        }
    }

    fn escaped_table(&self, spec: &QuerySpec) -> Result<String, QueryBuildError> {
        Ok(identifier::validate_and_escape(
            &spec.table,
            self.database_type,
            IdentifierKind::Table,
        )?)
    }

    fn where_clause(&self, spec: &QuerySpec) -> Result<Option<String>, QueryBuildError> {
        if let Some(column) = &spec.where_column {
            let escaped =
                identifier::validate_and_escape(column, self.database_type, IdentifierKind::Column)?;
            let operator = normalize_operator(spec.where_operator.as_deref())?;
            Ok(Some(format!("WHERE {escaped} {operator} :value")))
        } else if spec.by_id {
            let id = identifier::escape("id", self.database_type);
            Ok(Some(format!("WHERE {id} = :id")))
        } else {
            Ok(None)
        }
    }

    fn limit_clause(&self, spec: &QuerySpec) -> Option<String> {
        let limit = spec.limit?;
        let offset = spec.offset.unwrap_or(0);
        let clause = match self.database_type {
            DatabaseType::MySQL => {
                if offset > 0 {
                    format!("LIMIT {offset}, {limit}")
                } else {
                    format!("LIMIT {limit}")
                }
            }
            DatabaseType::SQLite | DatabaseType::PostgreSQL => {
                if offset > 0 {
                    format!("LIMIT {limit} OFFSET {offset}")
                } else {
                    format!("LIMIT {limit}")
                }
            }
        };
        Some(clause)
    }

    fn render_select(&self, spec: &QuerySpec) -> Result<String, QueryBuildError> {
        let table = self.escaped_table(spec)?;
        let mut sql = format!("SELECT * FROM {table}");
        if let Some(where_clause) = self.where_clause(spec)? {
            sql.push(' ');
            sql.push_str(&where_clause);
        }
        if let Some(order_by) = &spec.order_by {
            let escaped = identifier::validate_order_by(order_by, self.database_type)?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&escaped);
        }
        if let Some(limit_clause) = self.limit_clause(spec) {
            sql.push(' ');
            sql.push_str(&limit_clause);
        }
        Ok(sql)
    }

    /// Column list and VALUES list for inserts; expression slots carry the
    /// translated expression instead of a placeholder
    fn render_insert(&self, spec: &QuerySpec, with_expressions: bool) -> Result<String, QueryBuildError> {
        let table = self.escaped_table(spec)?;
        let mut column_sql = Vec::new();
        let mut value_sql = Vec::new();

        for column in &spec.columns {
            let escaped =
                identifier::validate_and_escape(column, self.database_type, IdentifierKind::Column)?;
            column_sql.push(escaped);
            value_sql.push(format!(":{column}"));
        }

        if with_expressions {
            let allowed: Vec<&str> = spec.allowed_columns.iter().map(String::as_str).collect();
            for (column, raw) in &spec.expressions {
                let escaped = identifier::validate_and_escape(
                    column,
                    self.database_type,
                    IdentifierKind::Column,
                )?;
                let validated =
                    expression::validate(raw, ExpressionContext::InsertValue, &allowed)?;
                column_sql.push(escaped);
                value_sql.push(translator::translate(&validated, self.database_type));
            }
        }

        if column_sql.is_empty() {
            return Err(QueryBuildError::NoColumns {
                operation: if with_expressions {
                    QueryOperation::InsertWithExpressions
                } else {
                    QueryOperation::SimpleInsert
                },
            });
        }

        Ok(format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            column_sql.join(", "),
            value_sql.join(", ")
        ))
    }

    fn render_update(
        &self,
        operation: QueryOperation,
        spec: &QuerySpec,
        with_expressions: bool,
    ) -> Result<String, QueryBuildError> {
        let table = self.escaped_table(spec)?;
        let mut assignments = Vec::new();

        for column in &spec.columns {
            let escaped =
                identifier::validate_and_escape(column, self.database_type, IdentifierKind::Column)?;
            assignments.push(format!("{escaped} = :{column}"));
        }

        if with_expressions {
            let allowed: Vec<&str> = spec.allowed_columns.iter().map(String::as_str).collect();
            for (column, raw) in &spec.expressions {
                let escaped = identifier::validate_and_escape(
                    column,
                    self.database_type,
                    IdentifierKind::Column,
                )?;
                let validated = expression::validate(raw, ExpressionContext::UpdateSet, &allowed)?;
                assignments.push(format!(
                    "{escaped} = {}",
                    translator::translate(&validated, self.database_type)
                ));
            }
        }

        if assignments.is_empty() {
            return Err(QueryBuildError::NoColumns { operation });
        }

        let where_clause = if operation == QueryOperation::UpdateWhereWithExpressions {
            let column = spec.where_column.as_ref().ok_or(
                QueryBuildError::MissingWhereColumn { operation },
            )?;
            let escaped =
                identifier::validate_and_escape(column, self.database_type, IdentifierKind::Column)?;
            let operator = normalize_operator(spec.where_operator.as_deref())?;
            format!("{escaped} {operator} :where_value")
        } else {
            let id = identifier::escape("id", self.database_type);
            format!("{id} = :update_id")
        };

        Ok(format!(
            "UPDATE {table} SET {} WHERE {where_clause}",
            assignments.join(", ")
        ))
    }

    fn render_delete(&self, spec: &QuerySpec) -> Result<String, QueryBuildError> {
        let table = self.escaped_table(spec)?;
        let id = identifier::escape("id", self.database_type);
        Ok(format!("DELETE FROM {table} WHERE {id} = :id"))
    }

    fn render_bulk_insert(&self, spec: &QuerySpec) -> Result<String, QueryBuildError> {
        let table = self.escaped_table(spec)?;
        if spec.columns.is_empty() {
            return Err(QueryBuildError::NoColumns {
                operation: QueryOperation::BulkInsert,
            });
        }
        let row_count = match spec.row_count {
            Some(count) if count > 0 => count,
            _ => {
                return Err(QueryBuildError::InvalidRowCount {
                    operation: QueryOperation::BulkInsert,
                });
            }
        };

        let columns: Vec<&str> = spec.columns.iter().map(String::as_str).collect();
        let escaped =
            identifier::validate_and_escape_all(&columns, self.database_type, IdentifierKind::Column)?;
        let row = format!("({})", vec!["?"; columns.len()].join(", "));
        let rows = vec![row; row_count].join(", ");
        Ok(format!(
            "INSERT INTO {table} ({}) VALUES {rows}",
            escaped.join(", ")
        ))
    }

    fn render_count(&self, spec: &QuerySpec) -> Result<String, QueryBuildError> {
        let table = self.escaped_table(spec)?;
        let mut sql = format!("SELECT COUNT(*) FROM {table}");
        if let Some(where_clause) = self.where_clause(spec)? {
            sql.push(' ');
            sql.push_str(&where_clause);
        }
        Ok(sql)
    }
}

/// Normalize and allowlist-check the WHERE operator; missing means `=`
fn normalize_operator(operator: Option<&str>) -> Result<&'static str, QueryBuildError> {
    let raw = operator.unwrap_or("=").trim();
    let upper = raw.to_uppercase();
    for candidate in WHERE_OPERATORS {
        if *candidate == upper {
            return Ok(*candidate);
        }
    }
    Err(QueryBuildError::OperatorNotAllowed {
        operator: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(db: DatabaseType) -> QueryBuilder {
        QueryBuilder::new(db)
    }

    #[test]
    fn test_mysql_select_with_order_and_limit() {
        let spec = QuerySpec {
            where_column: Some("email".to_string()),
            order_by: Some("created_at desc".to_string()),
            limit: Some(10),
            ..QuerySpec::for_table("users")
        };
        let sql = builder(DatabaseType::MySQL)
            .build(QueryOperation::SimpleSelect, &spec)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM `users` WHERE `email` = :value ORDER BY `created_at` DESC LIMIT 10"
        );
    }

    #[test]
    fn test_postgresql_update_with_expressions() {
        let spec = QuerySpec {
            columns: vec!["name".to_string()],
            expressions: vec![
                ("updated_at".to_string(), "CURRENT_TIMESTAMP".to_string()),
                ("balance".to_string(), "balance + 10".to_string()),
            ],
            allowed_columns: vec!["balance".to_string()],
            ..QuerySpec::for_table("accounts")
        };
        let sql = builder(DatabaseType::PostgreSQL)
            .build(QueryOperation::UpdateWithExpressions, &spec)
            .unwrap();
        assert_eq!(
            sql,
            "UPDATE \"accounts\" SET \"name\" = :name, \"updated_at\" = CURRENT_TIMESTAMP, \
             \"balance\" = balance + 10 WHERE \"id\" = :update_id"
        );
    }

    #[test]
    fn test_sqlite_insert_translates_functions() {
        let spec = QuerySpec {
            expressions: vec![("ts".to_string(), "NOW()".to_string())],
            ..QuerySpec::for_table("events")
        };
        let sql = builder(DatabaseType::SQLite)
            .build(QueryOperation::InsertWithExpressions, &spec)
            .unwrap();
        assert_eq!(sql, "INSERT INTO `events` (`ts`) VALUES (datetime('now'))");
    }

    #[test]
    fn test_simple_insert() {
        let spec = QuerySpec {
            columns: vec!["name".to_string(), "email".to_string()],
            ..QuerySpec::for_table("users")
        };
        let sql = builder(DatabaseType::MySQL)
            .build(QueryOperation::SimpleInsert, &spec)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `users` (`name`, `email`) VALUES (:name, :email)"
        );
    }

    #[test]
    fn test_simple_update_binds_update_id() {
        let spec = QuerySpec {
            columns: vec!["name".to_string()],
            ..QuerySpec::for_table("users")
        };
        let sql = builder(DatabaseType::SQLite)
            .build(QueryOperation::SimpleUpdate, &spec)
            .unwrap();
        assert_eq!(sql, "UPDATE `users` SET `name` = :name WHERE `id` = :update_id");
    }

    #[test]
    fn test_update_where_with_expressions() {
        let spec = QuerySpec {
            expressions: vec![("counter".to_string(), "counter + 1".to_string())],
            allowed_columns: vec!["counter".to_string()],
            where_column: Some("slug".to_string()),
            ..QuerySpec::for_table("pages")
        };
        let sql = builder(DatabaseType::MySQL)
            .build(QueryOperation::UpdateWhereWithExpressions, &spec)
            .unwrap();
        assert_eq!(
            sql,
            "UPDATE `pages` SET `counter` = counter + 1 WHERE `slug` = :where_value"
        );
    }

    #[test]
    fn test_simple_delete() {
        let sql = builder(DatabaseType::PostgreSQL)
            .build(QueryOperation::SimpleDelete, &QuerySpec::for_table("users"))
            .unwrap();
        assert_eq!(sql, "DELETE FROM \"users\" WHERE \"id\" = :id");
    }

    #[test]
    fn test_bulk_insert_positional_placeholders() {
        let spec = QuerySpec {
            columns: vec!["a".to_string(), "b".to_string()],
            row_count: Some(3),
            ..QuerySpec::for_table("samples")
        };
        let sql = builder(DatabaseType::SQLite)
            .build(QueryOperation::BulkInsert, &spec)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `samples` (`a`, `b`) VALUES (?, ?), (?, ?), (?, ?)"
        );
    }

    #[test]
    fn test_bulk_insert_requires_row_count() {
        let spec = QuerySpec {
            columns: vec!["a".to_string()],
            ..QuerySpec::for_table("samples")
        };
        assert!(matches!(
            builder(DatabaseType::SQLite).build(QueryOperation::BulkInsert, &spec),
            Err(QueryBuildError::InvalidRowCount { .. })
        ));
    }

    #[test]
    fn test_count_query_with_where() {
        let spec = QuerySpec {
            where_column: Some("status".to_string()),
            where_operator: Some("!=".to_string()),
            ..QuerySpec::for_table("jobs")
        };
        let sql = builder(DatabaseType::PostgreSQL)
            .build(QueryOperation::CountQuery, &spec)
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM \"jobs\" WHERE \"status\" != :value");
    }

    #[test]
    fn test_select_by_id() {
        let spec = QuerySpec {
            by_id: true,
            ..QuerySpec::for_table("users")
        };
        let sql = builder(DatabaseType::MySQL)
            .build(QueryOperation::SimpleSelect, &spec)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM `users` WHERE `id` = :id");
    }

    #[test]
    fn test_mysql_limit_offset_form() {
        let spec = QuerySpec {
            limit: Some(10),
            offset: Some(20),
            ..QuerySpec::for_table("users")
        };
        let sql = builder(DatabaseType::MySQL)
            .build(QueryOperation::SimpleSelect, &spec)
            .unwrap();
        assert!(sql.ends_with("LIMIT 20, 10"));

        let sql = builder(DatabaseType::PostgreSQL)
            .build(QueryOperation::SimpleSelect, &spec)
            .unwrap();
        assert!(sql.ends_with("LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn test_operator_allowlist() {
        let spec = QuerySpec {
            where_column: Some("name".to_string()),
            where_operator: Some("OR 1=1".to_string()),
            ..QuerySpec::for_table("users")
        };
        assert!(matches!(
            builder(DatabaseType::MySQL).build(QueryOperation::SimpleSelect, &spec),
            Err(QueryBuildError::OperatorNotAllowed { .. })
        ));
    }

    #[test]
    fn test_operator_case_insensitive() {
        let spec = QuerySpec {
            where_column: Some("name".to_string()),
            where_operator: Some("like".to_string()),
            ..QuerySpec::for_table("users")
        };
        let sql = builder(DatabaseType::MySQL)
            .build(QueryOperation::SimpleSelect, &spec)
            .unwrap();
        assert!(sql.contains("WHERE `name` LIKE :value"));
    }

    #[test]
    fn test_rejects_invalid_table() {
        let spec = QuerySpec::for_table("users; DROP TABLE users");
        assert!(builder(DatabaseType::MySQL)
            .build(QueryOperation::SimpleSelect, &spec)
            .is_err());
    }

    #[test]
    fn test_rejects_dangerous_expression() {
        let spec = QuerySpec {
            expressions: vec![("name".to_string(), "id; DROP TABLE x".to_string())],
            ..QuerySpec::for_table("users")
        };
        let err = builder(DatabaseType::MySQL)
            .build(QueryOperation::UpdateWithExpressions, &spec)
            .unwrap_err();
        assert!(matches!(
            err,
            QueryBuildError::Expression(ExpressionError::DangerousPattern { .. })
        ));
    }

    #[test]
    fn test_build_is_deterministic_and_cached() {
        let qb = builder(DatabaseType::MySQL);
        let spec = QuerySpec {
            columns: vec!["name".to_string()],
            ..QuerySpec::for_table("users")
        };
        let first = qb.build(QueryOperation::SimpleInsert, &spec).unwrap();
        let second = qb.build(QueryOperation::SimpleInsert, &spec).unwrap();
        assert_eq!(first, second);
        let stats = qb.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_cache_key_distinguishes_operations() {
        let qb = builder(DatabaseType::MySQL);
        let spec = QuerySpec {
            columns: vec!["name".to_string()],
            ..QuerySpec::for_table("users")
        };
        let insert = qb.build(QueryOperation::SimpleInsert, &spec).unwrap();
        let update = qb.build(QueryOperation::SimpleUpdate, &spec).unwrap();
        assert_ne!(insert, update);
    }
}
