//! Platform emitter trait for schema DDL
//!
//! One implementation per dialect renders the agnostic schema model into
//! final DDL. The transformer consults the feature queries to decide what
//! must be rewritten or dropped before emission.
use crate::database::DatabaseType;
use crate::schema::{Column, Constraint, ConstraintType, Index, Table};

/// Dialect-specific DDL emitter
pub trait Platform: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    /// Quote an identifier, doubling interior quote characters
    fn quote_identifier(&self, name: &str) -> String {
        crate::identifier::escape(name, self.database_type())
    }

    /// Quote a literal value, doubling interior single quotes
    fn quote_value(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Map a source-dialect type name onto this platform's type system
    fn type_mapping(&self, source_type: &str) -> String;

    /// Map a raw type string, preserving a parenthesized parameter list
    /// when the base type survives the mapping unchanged. Idempotent, so
    /// re-running a transform over its own output is stable.
    fn rewrite_type(&self, raw: &str) -> String {
        let (base, params) = split_type_params(raw);
        let mapped = self.type_mapping(raw);
        match params {
            Some(params) if mapped == base => format!("{mapped}({params})"),
            _ => mapped,
        }
    }

    /// Render a column's full type, including length/precision markers
    fn column_type_sql(&self, column: &Column) -> String;

    /// Render a complete column definition for CREATE TABLE
    fn column_sql(&self, column: &Column, table: &Table) -> String;

    /// Render a non-foreign-key constraint; None means dropped
    fn constraint_sql(&self, constraint: &Constraint) -> Option<String>;

    /// Render a foreign-key table constraint
    fn foreign_key_sql(&self, constraint: &Constraint) -> String {
        let columns = constraint
            .columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let referenced_table = constraint
            .referenced_table
            .as_deref()
            .map(|t| self.quote_identifier(t))
            .unwrap_or_default();
        let referenced_columns = constraint
            .referenced_columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "CONSTRAINT {} FOREIGN KEY ({columns}) REFERENCES {referenced_table} ({referenced_columns})",
            self.quote_identifier(&constraint.name)
        );
        if let Some(action) = constraint.on_delete {
            sql.push_str(&format!(" ON DELETE {}", action.as_sql()));
        }
        if let Some(action) = constraint.on_update {
            sql.push_str(&format!(" ON UPDATE {}", action.as_sql()));
        }
        sql
    }

    /// Render a standalone CREATE INDEX statement; None means the index
    /// cannot be expressed on this platform
    fn index_sql(&self, index: &Index, table: &Table) -> Option<String>;

    /// Whether this column's PRIMARY KEY is declared inline in column_sql
    fn inlines_primary_key(&self, column: &Column, table: &Table) -> bool {
        let _ = (column, table);
        false
    }

    /// Table-level PRIMARY KEY clause unless it was declared inline
    fn primary_key_sql(&self, table: &Table) -> Option<String> {
        let pk_columns = table.primary_key_columns();
        if pk_columns.is_empty() || pk_columns.iter().any(|c| self.inlines_primary_key(c, table)) {
            return None;
        }
        let columns = pk_columns
            .iter()
            .map(|c| self.quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!("PRIMARY KEY ({columns})"))
    }

    /// Trailing CREATE TABLE options (ENGINE/CHARSET for MySQL)
    fn table_options_sql(&self, table: &Table) -> String {
        let _ = table;
        String::new()
    }

    /// Assemble the CREATE TABLE statement from columns and constraints;
    /// secondary indexes are emitted separately through index_sql
    fn create_table_sql(&self, table: &Table) -> String {
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|column| self.column_sql(column, table))
            .collect();
        if let Some(primary_key) = self.primary_key_sql(table) {
            parts.push(primary_key);
        }
        for constraint in &table.constraints {
            match constraint.constraint_type {
                ConstraintType::ForeignKey if self.supports_foreign_keys() => {
                    parts.push(self.foreign_key_sql(constraint));
                }
                ConstraintType::ForeignKey => {}
                _ => {
                    if let Some(sql) = self.constraint_sql(constraint) {
                        parts.push(sql);
                    }
                }
            }
        }
        format!(
            "CREATE TABLE {} (\n  {}\n){}",
            self.quote_identifier(&table.name),
            parts.join(",\n  "),
            self.table_options_sql(table)
        )
    }

    fn supports_enum_types(&self) -> bool;
    fn supports_foreign_keys(&self) -> bool {
        true
    }
    fn supports_fulltext(&self) -> bool;
    fn supports_column_comments(&self) -> bool;
    fn supports_unsigned(&self) -> bool;
    fn supports_index_length(&self) -> bool;
    fn supports_partial_indexes(&self) -> bool;
    fn supports_inline_unique(&self) -> bool {
        true
    }
}

/// Split `VARCHAR(255)` into (`VARCHAR`, Some(`255`)); the base is
/// uppercased, the parameter list is preserved verbatim
pub(crate) fn split_type_params(raw: &str) -> (String, Option<String>) {
    let trimmed = raw.trim();
    if let (Some(open), Some(close)) = (trimmed.find('('), trimmed.rfind(')')) {
        if open < close {
            let base = trimmed[..open].trim().to_uppercase();
            let params = trimmed[open + 1..close].to_string();
            return (base, Some(params));
        }
    }
    (trimmed.to_uppercase(), None)
}

/// Render a default value: keywords, function calls, numbers, and
/// already-quoted literals pass through; everything else becomes a
/// quoted string literal
pub(crate) fn format_default(default: &str) -> String {
    let upper = default.to_uppercase();
    if matches!(
        upper.as_str(),
        "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME" | "NULL" | "TRUE" | "FALSE"
    ) || upper.ends_with(')')
        || default.parse::<f64>().is_ok()
        || (default.starts_with('\'') && default.ends_with('\'') && default.len() >= 2)
    {
        default.to_string()
    } else {
        format!("'{}'", default.replace('\'', "''"))
    }
}

/// Factory for platform emitters
pub fn platform_for(database_type: DatabaseType) -> Box<dyn Platform> {
    match database_type {
        DatabaseType::MySQL => Box::new(crate::platform_mysql::MySqlPlatform),
        DatabaseType::SQLite => Box::new(crate::platform_sqlite::SqlitePlatform),
        DatabaseType::PostgreSQL => Box::new(crate::platform_postgresql::PostgreSQLPlatform),
    }
}
