//! PostgreSQL implementation of the database abstraction layer
use crate::database::{
    ConnectionInfo, DatabaseClient, DatabaseError, DatabaseType, ExplainPlan, IntrospectedColumn,
    IntrospectedForeignKey, IntrospectedIndex,
};
use crate::identifier::{self, IdentifierKind};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::debug;

/// Connection-startup optimization statements
pub(crate) const SESSION_SETUP: &[&str] = &[
    "SET statement_timeout = 30000",
    "SET lock_timeout = 5000",
    "SET synchronous_commit = off",
    "SET effective_cache_size = '1GB'",
];

/// PostgreSQL client over a sqlx pool
pub struct PostgreSQLClient {
    pool: PgPool,
}

impl PostgreSQLClient {
    pub async fn new(connection_info: ConnectionInfo) -> Result<Self, DatabaseError> {
        debug!("[PostgreSQLClient::new] Connecting to {connection_info}");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_info.to_connection_url())
            .await?;
        let client = Self { pool };
        client.apply_session_optimizations().await?;
        Ok(client)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabaseClient for PostgreSQLClient {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    async fn apply_session_optimizations(&self) -> Result<(), DatabaseError> {
        debug!("[PostgreSQLClient::apply_session_optimizations] Applying session settings");
        for statement in SESSION_SETUP {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        debug!("[PostgreSQLClient::list_tables] Starting query");
        let rows = sqlx::query(
            r#"
            SELECT tablename
            FROM pg_tables
            WHERE schemaname = 'public'
            ORDER BY tablename
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let tables: Vec<String> = rows
            .iter()
            .map(|row| row.get::<String, _>("tablename"))
            .collect();
        debug!("[PostgreSQLClient::list_tables] Found {} tables", tables.len());
        Ok(tables)
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<IntrospectedColumn>, DatabaseError> {
        debug!("[PostgreSQLClient::get_columns] Reading columns for '{table}'");
        identifier::validate(table, IdentifierKind::Table)?;
        let rows = sqlx::query(
            r#"
            SELECT c.column_name,
                   c.data_type,
                   c.is_nullable,
                   c.column_default,
                   (pk.column_name IS NOT NULL) AS is_primary
            FROM information_schema.columns c
            LEFT JOIN (
                SELECT kcu.column_name
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                  ON kcu.constraint_name = tc.constraint_name
                 AND kcu.table_schema = tc.table_schema
                WHERE tc.table_name = $1
                  AND tc.table_schema = 'public'
                  AND tc.constraint_type = 'PRIMARY KEY'
            ) pk ON pk.column_name = c.column_name
            WHERE c.table_name = $1
              AND c.table_schema = 'public'
            ORDER BY c.ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let columns = rows
            .iter()
            .map(|row| {
                let default_value: Option<String> =
                    row.try_get::<Option<String>, _>("column_default").unwrap_or(None);
                let auto_increment = default_value
                    .as_deref()
                    .is_some_and(|d| d.starts_with("nextval("));
                IntrospectedColumn {
                    name: row.get::<String, _>("column_name"),
                    data_type: row.get::<String, _>("data_type"),
                    nullable: row
                        .get::<String, _>("is_nullable")
                        .eq_ignore_ascii_case("YES"),
                    primary_key: row.try_get::<bool, _>("is_primary").unwrap_or(false),
                    default_value,
                    auto_increment,
                }
            })
            .collect();
        Ok(columns)
    }

    async fn get_indexes(&self, table: &str) -> Result<Vec<IntrospectedIndex>, DatabaseError> {
        debug!("[PostgreSQLClient::get_indexes] Reading indexes for '{table}'");
        identifier::validate(table, IdentifierKind::Table)?;
        // Primary-key indexes are reported through the constraint path, so
        // they are excluded here
        let rows = sqlx::query(
            r#"
            SELECT i.relname AS index_name,
                   a.attname AS column_name,
                   ix.indisunique AS is_unique
            FROM pg_class t
            JOIN pg_index ix ON t.oid = ix.indrelid
            JOIN pg_class i ON i.oid = ix.indexrelid
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE t.relname = $1
              AND NOT ix.indisprimary
            ORDER BY i.relname, a.attnum
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut indexes: Vec<IntrospectedIndex> = Vec::new();
        for row in &rows {
            let name: String = row.get("index_name");
            let column: String = row.get("column_name");
            let unique: bool = row.try_get("is_unique").unwrap_or(false);
            match indexes.iter_mut().find(|index| index.name == name) {
                Some(index) => index.columns.push(column),
                None => indexes.push(IntrospectedIndex {
                    name,
                    columns: vec![column],
                    unique,
                }),
            }
        }
        debug!("[PostgreSQLClient::get_indexes] Found {} indexes", indexes.len());
        Ok(indexes)
    }

    async fn get_foreign_keys(
        &self,
        table: &str,
    ) -> Result<Vec<IntrospectedForeignKey>, DatabaseError> {
        debug!("[PostgreSQLClient::get_foreign_keys] Reading foreign keys for '{table}'");
        identifier::validate(table, IdentifierKind::Table)?;
        let rows = sqlx::query(
            r#"
            SELECT tc.constraint_name,
                   kcu.column_name,
                   ccu.table_name AS referenced_table,
                   ccu.column_name AS referenced_column,
                   rc.delete_rule,
                   rc.update_rule
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON kcu.constraint_name = tc.constraint_name
             AND kcu.table_schema = tc.table_schema
            JOIN information_schema.constraint_column_usage ccu
              ON ccu.constraint_name = tc.constraint_name
             AND ccu.table_schema = tc.table_schema
            LEFT JOIN information_schema.referential_constraints rc
              ON rc.constraint_name = tc.constraint_name
             AND rc.constraint_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
              AND tc.table_name = $1
              AND tc.table_schema = 'public'
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let foreign_keys = rows
            .iter()
            .map(|row| IntrospectedForeignKey {
                name: row.get::<String, _>("constraint_name"),
                column: row.get::<String, _>("column_name"),
                referenced_table: row.get::<String, _>("referenced_table"),
                referenced_column: row.get::<String, _>("referenced_column"),
                on_delete: row.try_get::<Option<String>, _>("delete_rule").unwrap_or(None),
                on_update: row.try_get::<Option<String>, _>("update_rule").unwrap_or(None),
            })
            .collect();
        Ok(foreign_keys)
    }

    async fn explain(&self, sql: &str) -> Result<ExplainPlan, DatabaseError> {
        debug!("[PostgreSQLClient::explain] Executing EXPLAIN");

        // ANALYZE executes the statement; only the profiler's SELECT path
        // requests plans, so this is safe
        let json_sql = format!("EXPLAIN (FORMAT JSON, ANALYZE, BUFFERS) {sql}");
        match sqlx::query(&json_sql).fetch_all(&self.pool).await {
            Ok(rows) if !rows.is_empty() => {
                if let Ok(json) = rows[0].try_get::<serde_json::Value, _>(0) {
                    return Ok(ExplainPlan::Json(json));
                }
                debug!("[PostgreSQLClient::explain] JSON decode failed, falling back");
            }
            Err(e) => {
                debug!("[PostgreSQLClient::explain] JSON format failed: {e}, falling back");
            }
            _ => {
                debug!("[PostgreSQLClient::explain] JSON format returned empty, falling back");
            }
        }

        let rows = sqlx::query(&format!("EXPLAIN {sql}"))
            .fetch_all(&self.pool)
            .await?;
        let lines = rows
            .iter()
            .map(|row| row.try_get::<String, _>(0).unwrap_or_default())
            .collect();
        Ok(ExplainPlan::Text(lines))
    }
}
