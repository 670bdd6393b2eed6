//! SQLite implementation of the database abstraction layer
use crate::database::{
    ConnectionInfo, DatabaseClient, DatabaseError, DatabaseType, ExplainPlan, IntrospectedColumn,
    IntrospectedForeignKey, IntrospectedIndex, SqlitePlanRow,
};
use crate::identifier::{self, IdentifierKind};
use crate::sqlite_path;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::debug;

/// Connection-startup optimization statements
pub(crate) const SESSION_SETUP: &[&str] = &[
    "PRAGMA foreign_keys = ON",
    "PRAGMA journal_mode = WAL",
    "PRAGMA synchronous = NORMAL",
    "PRAGMA cache_size = -20000",
    "PRAGMA temp_store = MEMORY",
    "PRAGMA busy_timeout = 5000",
];

/// SQLite client over a sqlx pool
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    pub async fn new(connection_info: ConnectionInfo) -> Result<Self, DatabaseError> {
        debug!("[SqliteClient::new] Connecting to {connection_info}");
        let raw_path = connection_info
            .file_path
            .as_deref()
            .ok_or_else(|| DatabaseError::ConnectionError("SQLite requires a file path".into()))?;

        // The path policy runs on every file-backed connection; memory
        // databases pass through untouched
        sqlite_path::validate_sqlite_path(raw_path)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&connection_info.to_connection_url())
            .await?;
        let client = Self { pool };
        client.apply_session_optimizations().await?;
        Ok(client)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    async fn apply_session_optimizations(&self) -> Result<(), DatabaseError> {
        debug!("[SqliteClient::apply_session_optimizations] Applying PRAGMA settings");
        for statement in SESSION_SETUP {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        debug!("[SqliteClient::list_tables] Starting query");
        let rows = sqlx::query(
            r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let tables: Vec<String> = rows
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();
        debug!("[SqliteClient::list_tables] Found {} tables", tables.len());
        Ok(tables)
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<IntrospectedColumn>, DatabaseError> {
        debug!("[SqliteClient::get_columns] Reading table_info for '{table}'");
        identifier::validate(table, IdentifierKind::Table)?;
        let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(&self.pool)
            .await?;

        let columns = rows
            .iter()
            .map(|row| {
                let data_type: String = row.get("type");
                let primary_key = row.get::<i32, _>("pk") > 0;
                IntrospectedColumn {
                    name: row.get::<String, _>("name"),
                    nullable: row.get::<i32, _>("notnull") == 0 && !primary_key,
                    // Rowid aliasing: INTEGER PRIMARY KEY auto-assigns
                    auto_increment: primary_key && data_type.eq_ignore_ascii_case("INTEGER"),
                    primary_key,
                    default_value: row
                        .try_get::<Option<String>, _>("dflt_value")
                        .unwrap_or(None),
                    data_type,
                }
            })
            .collect();
        Ok(columns)
    }

    async fn get_indexes(&self, table: &str) -> Result<Vec<IntrospectedIndex>, DatabaseError> {
        debug!("[SqliteClient::get_indexes] Reading index_list for '{table}'");
        identifier::validate(table, IdentifierKind::Table)?;
        let index_rows = sqlx::query(&format!("PRAGMA index_list({table})"))
            .fetch_all(&self.pool)
            .await?;

        let mut indexes = Vec::new();
        for index_row in index_rows {
            let name: String = index_row.get("name");
            let unique: bool = index_row.get("unique");

            let detail_rows = sqlx::query(&format!("PRAGMA index_info({name})"))
                .fetch_all(&self.pool)
                .await?;
            let mut columns = Vec::new();
            for detail_row in detail_rows {
                if let Ok(Some(column)) = detail_row.try_get::<Option<String>, _>("name") {
                    columns.push(column);
                }
            }

            indexes.push(IntrospectedIndex {
                name,
                columns,
                unique,
            });
        }
        debug!("[SqliteClient::get_indexes] Found {} indexes", indexes.len());
        Ok(indexes)
    }

    async fn get_foreign_keys(
        &self,
        table: &str,
    ) -> Result<Vec<IntrospectedForeignKey>, DatabaseError> {
        debug!("[SqliteClient::get_foreign_keys] Reading foreign_key_list for '{table}'");
        identifier::validate(table, IdentifierKind::Table)?;
        let rows = sqlx::query(&format!("PRAGMA foreign_key_list({table})"))
            .fetch_all(&self.pool)
            .await?;

        let foreign_keys = rows
            .iter()
            .map(|row| {
                let id: i32 = row.get("id");
                IntrospectedForeignKey {
                    name: format!("fk_{table}_{id}"),
                    column: row.get::<String, _>("from"),
                    referenced_table: row.get::<String, _>("table"),
                    referenced_column: row
                        .try_get::<Option<String>, _>("to")
                        .unwrap_or(None)
                        .unwrap_or_else(|| "id".to_string()),
                    on_delete: row.try_get::<Option<String>, _>("on_delete").unwrap_or(None),
                    on_update: row.try_get::<Option<String>, _>("on_update").unwrap_or(None),
                }
            })
            .collect();
        Ok(foreign_keys)
    }

    async fn explain(&self, sql: &str) -> Result<ExplainPlan, DatabaseError> {
        debug!("[SqliteClient::explain] Executing EXPLAIN QUERY PLAN");
        let rows = sqlx::query(&format!("EXPLAIN QUERY PLAN {sql}"))
            .fetch_all(&self.pool)
            .await?;

        let plan_rows = rows
            .iter()
            .map(|row| SqlitePlanRow {
                id: row.try_get::<i64, _>("id").unwrap_or(0),
                parent: row.try_get::<i64, _>("parent").unwrap_or(0),
                detail: row.try_get::<String, _>("detail").unwrap_or_default(),
            })
            .collect();
        Ok(ExplainPlan::SqliteRows(plan_rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_client() -> SqliteClient {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("memory pool");
        SqliteClient::from_pool(pool)
    }

    async fn create_fixture(client: &SqliteClient) {
        for statement in [
            "CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            "CREATE TABLE posts (
                id INTEGER PRIMARY KEY,
                author_id INTEGER NOT NULL REFERENCES authors(id),
                title TEXT NOT NULL,
                body TEXT
            )",
            "CREATE INDEX idx_posts_author ON posts(author_id)",
            "CREATE UNIQUE INDEX idx_posts_title ON posts(title)",
        ] {
            sqlx::query(statement)
                .execute(&client.pool)
                .await
                .expect("fixture");
        }
    }

    #[tokio::test]
    async fn test_list_tables_excludes_sqlite_internal() {
        let client = memory_client().await;
        create_fixture(&client).await;
        let tables = client.list_tables().await.unwrap();
        assert_eq!(tables, vec!["authors".to_string(), "posts".to_string()]);
    }

    #[tokio::test]
    async fn test_get_columns_reads_types_and_pk() {
        let client = memory_client().await;
        create_fixture(&client).await;
        let columns = client.get_columns("posts").await.unwrap();
        assert_eq!(columns.len(), 4);
        let id = &columns[0];
        assert_eq!(id.name, "id");
        assert!(id.primary_key);
        assert!(id.auto_increment);
        let body = &columns[3];
        assert_eq!(body.name, "body");
        assert!(body.nullable);
        assert!(!body.primary_key);
    }

    #[tokio::test]
    async fn test_get_indexes_reads_columns() {
        let client = memory_client().await;
        create_fixture(&client).await;
        let indexes = client.get_indexes("posts").await.unwrap();
        let author_index = indexes
            .iter()
            .find(|index| index.name == "idx_posts_author")
            .expect("author index");
        assert_eq!(author_index.columns, vec!["author_id".to_string()]);
        assert!(!author_index.unique);
        let title_index = indexes
            .iter()
            .find(|index| index.name == "idx_posts_title")
            .expect("title index");
        assert!(title_index.unique);
    }

    #[tokio::test]
    async fn test_get_foreign_keys() {
        let client = memory_client().await;
        create_fixture(&client).await;
        let foreign_keys = client.get_foreign_keys("posts").await.unwrap();
        assert_eq!(foreign_keys.len(), 1);
        assert_eq!(foreign_keys[0].column, "author_id");
        assert_eq!(foreign_keys[0].referenced_table, "authors");
    }

    #[tokio::test]
    async fn test_explain_returns_plan_rows() {
        let client = memory_client().await;
        create_fixture(&client).await;
        let plan = client
            .explain("SELECT * FROM posts WHERE author_id = 1")
            .await
            .unwrap();
        match plan {
            ExplainPlan::SqliteRows(rows) => {
                assert!(!rows.is_empty());
                assert!(rows.iter().any(|row| row.detail.contains("posts")));
            }
            other => panic!("expected SQLite plan rows, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_setup_applies() {
        let client = memory_client().await;
        client.apply_session_optimizations().await.unwrap();
    }

    #[tokio::test]
    async fn test_introspection_rejects_bad_identifier() {
        let client = memory_client().await;
        assert!(client.get_columns("posts; DROP TABLE x").await.is_err());
    }
}
