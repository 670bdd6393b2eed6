//! MySQL implementation of the database abstraction layer
use crate::database::{
    ConnectionInfo, DatabaseClient, DatabaseError, DatabaseType, ExplainPlan, IntrospectedColumn,
    IntrospectedForeignKey, IntrospectedIndex,
};
use crate::identifier::{self, IdentifierKind};
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;
use tracing::debug;

/// Connection-startup optimization statements
pub(crate) const SESSION_SETUP: &[&str] =
    &["SET SESSION sql_mode = 'STRICT_ALL_TABLES,ERROR_FOR_DIVISION_BY_ZERO,NO_ENGINE_SUBSTITUTION'"];

/// MySQL client over a sqlx pool
pub struct MySqlClient {
    pool: MySqlPool,
}

impl MySqlClient {
    pub async fn new(connection_info: ConnectionInfo) -> Result<Self, DatabaseError> {
        debug!("[MySqlClient::new] Connecting to {connection_info}");
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(&connection_info.to_connection_url())
            .await?;
        let client = Self { pool };
        client.apply_session_optimizations().await?;
        Ok(client)
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// MySQL often hands text columns back as bytes; decode defensively
    fn string_value(row: &MySqlRow, index: usize) -> String {
        if let Ok(value) = row.try_get::<String, _>(index) {
            value
        } else if let Ok(bytes) = row.try_get::<Vec<u8>, _>(index) {
            String::from_utf8_lossy(&bytes).to_string()
        } else {
            String::new()
        }
    }

    fn optional_string_value(row: &MySqlRow, index: usize) -> Option<String> {
        if let Ok(value) = row.try_get::<Option<String>, _>(index) {
            value
        } else if let Ok(bytes) = row.try_get::<Option<Vec<u8>>, _>(index) {
            bytes.map(|b| String::from_utf8_lossy(&b).to_string())
        } else {
            None
        }
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    async fn apply_session_optimizations(&self) -> Result<(), DatabaseError> {
        debug!("[MySqlClient::apply_session_optimizations] Applying session settings");
        for statement in SESSION_SETUP {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        debug!("[MySqlClient::list_tables] Starting query");
        let rows = sqlx::query("SHOW TABLES").fetch_all(&self.pool).await?;
        let tables: Vec<String> = rows.iter().map(|row| Self::string_value(row, 0)).collect();
        debug!("[MySqlClient::list_tables] Found {} tables", tables.len());
        Ok(tables)
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<IntrospectedColumn>, DatabaseError> {
        debug!("[MySqlClient::get_columns] Describing table '{table}'");
        let escaped = identifier::validate_and_escape(table, DatabaseType::MySQL, IdentifierKind::Table)?;
        let rows = sqlx::query(&format!("DESCRIBE {escaped}"))
            .fetch_all(&self.pool)
            .await?;

        let columns = rows
            .iter()
            .map(|row| {
                // DESCRIBE columns: Field, Type, Null, Key, Default, Extra
                let nullable = Self::string_value(row, 2).eq_ignore_ascii_case("YES");
                let key = Self::string_value(row, 3);
                let extra = Self::string_value(row, 5);
                IntrospectedColumn {
                    name: Self::string_value(row, 0),
                    data_type: Self::string_value(row, 1),
                    nullable,
                    primary_key: key.eq_ignore_ascii_case("PRI"),
                    default_value: Self::optional_string_value(row, 4),
                    auto_increment: extra.to_lowercase().contains("auto_increment"),
                }
            })
            .collect();
        Ok(columns)
    }

    async fn get_indexes(&self, table: &str) -> Result<Vec<IntrospectedIndex>, DatabaseError> {
        debug!("[MySqlClient::get_indexes] Reading indexes for '{table}'");
        let escaped = identifier::validate_and_escape(table, DatabaseType::MySQL, IdentifierKind::Table)?;
        let rows = sqlx::query(&format!("SHOW INDEX FROM {escaped}"))
            .fetch_all(&self.pool)
            .await?;

        // SHOW INDEX yields one row per (index, column); group by key name
        // preserving the server's ordering
        let mut indexes: Vec<IntrospectedIndex> = Vec::new();
        for row in &rows {
            let name = Self::string_value(row, 2);
            let non_unique: i64 = row.try_get("Non_unique").unwrap_or(1);
            let column = Self::string_value(row, 4);
            match indexes.iter_mut().find(|index| index.name == name) {
                Some(index) => index.columns.push(column),
                None => indexes.push(IntrospectedIndex {
                    name,
                    columns: vec![column],
                    unique: non_unique == 0,
                }),
            }
        }
        debug!("[MySqlClient::get_indexes] Found {} indexes", indexes.len());
        Ok(indexes)
    }

    async fn get_foreign_keys(
        &self,
        table: &str,
    ) -> Result<Vec<IntrospectedForeignKey>, DatabaseError> {
        debug!("[MySqlClient::get_foreign_keys] Reading foreign keys for '{table}'");
        identifier::validate(table, IdentifierKind::Table)?;
        let rows = sqlx::query(
            r#"
            SELECT k.CONSTRAINT_NAME, k.COLUMN_NAME, k.REFERENCED_TABLE_NAME,
                   k.REFERENCED_COLUMN_NAME, r.DELETE_RULE, r.UPDATE_RULE
            FROM information_schema.KEY_COLUMN_USAGE k
            JOIN information_schema.REFERENTIAL_CONSTRAINTS r
              ON r.CONSTRAINT_NAME = k.CONSTRAINT_NAME
             AND r.CONSTRAINT_SCHEMA = k.TABLE_SCHEMA
            WHERE k.TABLE_SCHEMA = DATABASE()
              AND k.TABLE_NAME = ?
              AND k.REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY k.ORDINAL_POSITION
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let foreign_keys = rows
            .iter()
            .map(|row| IntrospectedForeignKey {
                name: Self::string_value(row, 0),
                column: Self::string_value(row, 1),
                referenced_table: Self::string_value(row, 2),
                referenced_column: Self::string_value(row, 3),
                on_delete: Self::optional_string_value(row, 4),
                on_update: Self::optional_string_value(row, 5),
            })
            .collect();
        Ok(foreign_keys)
    }

    async fn explain(&self, sql: &str) -> Result<ExplainPlan, DatabaseError> {
        debug!("[MySqlClient::explain] Executing EXPLAIN");

        // Try EXPLAIN FORMAT=JSON first for structured output
        let json_sql = format!("EXPLAIN FORMAT=JSON {sql}");
        match sqlx::query(&json_sql).fetch_all(&self.pool).await {
            Ok(rows) if !rows.is_empty() => {
                let raw = Self::string_value(&rows[0], 0);
                match serde_json::from_str(&raw) {
                    Ok(json) => return Ok(ExplainPlan::Json(json)),
                    Err(e) => {
                        debug!("[MySqlClient::explain] JSON parse failed: {e}, falling back");
                    }
                }
            }
            Err(e) => {
                debug!("[MySqlClient::explain] JSON format failed: {e}, falling back to standard");
            }
            _ => {
                debug!("[MySqlClient::explain] JSON format returned empty, falling back");
            }
        }

        // Fallback to tabular EXPLAIN: id, select_type, table, partitions,
        // type, possible_keys, key, key_len, ref, rows, filtered, Extra
        let rows = sqlx::query(&format!("EXPLAIN {sql}"))
            .fetch_all(&self.pool)
            .await?;
        let lines = rows
            .iter()
            .map(|row| {
                let access_type = Self::string_value(row, 4);
                let table_name = Self::string_value(row, 2);
                let key = Self::optional_string_value(row, 6).unwrap_or_default();
                let extra = Self::optional_string_value(row, 11).unwrap_or_default();
                format!("table={table_name} type={access_type} key={key} extra={extra}")
            })
            .collect();
        Ok(ExplainPlan::Text(lines))
    }
}
