//! PostgreSQL platform emitter
use crate::database::DatabaseType;
use crate::platform::Platform;
use crate::schema::{Column, Constraint, ConstraintType, Index, IndexType, Table};

pub struct PostgreSQLPlatform;

impl PostgreSQLPlatform {
    fn base_type(source_type: &str) -> String {
        let upper = source_type.to_uppercase();
        let base = upper
            .split('(')
            .next()
            .unwrap_or(&upper)
            .trim_end_matches(" UNSIGNED")
            .trim()
            .to_string();
        match base.as_str() {
            "INT" | "MEDIUMINT" => "INTEGER".to_string(),
            "TINYINT" => "SMALLINT".to_string(),
            "DATETIME" => "TIMESTAMP".to_string(),
            "DOUBLE" | "FLOAT" => "DOUBLE PRECISION".to_string(),
            "BLOB" | "LONGBLOB" | "MEDIUMBLOB" | "TINYBLOB" | "VARBINARY" | "BINARY" => {
                "BYTEA".to_string()
            }
            "JSON" | "JSONB" => "JSONB".to_string(),
            "LONGTEXT" | "MEDIUMTEXT" | "TINYTEXT" => "TEXT".to_string(),
            other => other.to_string(),
        }
    }
}

impl Platform for PostgreSQLPlatform {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn type_mapping(&self, source_type: &str) -> String {
        Self::base_type(source_type)
    }

    fn column_type_sql(&self, column: &Column) -> String {
        // TINYINT(1) is the MySQL idiom for a boolean
        let (base_raw, params) = crate::platform::split_type_params(&column.data_type);
        if base_raw == "TINYINT" && (column.length == Some(1) || params.as_deref() == Some("1")) {
            return "BOOLEAN".to_string();
        }
        let base = self.type_mapping(&column.data_type);
        let type_sql = match (column.length, column.precision) {
            (Some(length), _) if base == "VARCHAR" || base == "CHAR" => {
                format!("{base}({length})")
            }
            (_, Some(precision)) if base == "DECIMAL" || base == "NUMERIC" => {
                let scale = column.scale.unwrap_or(0);
                format!("{base}({precision},{scale})")
            }
            _ => self.rewrite_type(&column.data_type),
        };
        if column.is_array {
            format!("{type_sql}[]")
        } else {
            type_sql
        }
    }

    fn column_sql(&self, column: &Column, _table: &Table) -> String {
        let type_sql = if column.auto_increment {
            // Width-preserving serial types
            match self.column_type_sql(column).as_str() {
                "SMALLINT" => "SMALLSERIAL".to_string(),
                "BIGINT" => "BIGSERIAL".to_string(),
                _ => "SERIAL".to_string(),
            }
        } else {
            self.column_type_sql(column)
        };
        let mut sql = format!("{} {type_sql}", self.quote_identifier(&column.name));
        if let Some(expression) = &column.generated_expression {
            sql.push_str(&format!(" GENERATED ALWAYS AS ({expression}) STORED"));
            return sql;
        }
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            if !column.auto_increment {
                sql.push_str(&format!(
                    " DEFAULT {}",
                    crate::platform::format_default(default)
                ));
            }
        }
        sql
    }

    fn constraint_sql(&self, constraint: &Constraint) -> Option<String> {
        match constraint.constraint_type {
            ConstraintType::Check => constraint.expression.as_ref().map(|expression| {
                format!(
                    "CONSTRAINT {} CHECK ({expression})",
                    self.quote_identifier(&constraint.name)
                )
            }),
            ConstraintType::Unique => {
                let columns = constraint
                    .columns
                    .iter()
                    .map(|c| self.quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(format!(
                    "CONSTRAINT {} UNIQUE ({columns})",
                    self.quote_identifier(&constraint.name)
                ))
            }
            ConstraintType::Exclude => constraint.expression.as_ref().map(|expression| {
                format!(
                    "CONSTRAINT {} EXCLUDE {expression}",
                    self.quote_identifier(&constraint.name)
                )
            }),
            _ => None,
        }
    }

    fn index_sql(&self, index: &Index, table: &Table) -> Option<String> {
        if matches!(index.index_type, IndexType::Primary) {
            return None;
        }
        let table_name = self.quote_identifier(&table.name);
        let index_name = self.quote_identifier(&index.name);
        let columns = index
            .columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let unique = if index.unique { "UNIQUE " } else { "" };
        let method = index
            .method
            .map(|m| format!(" USING {m}"))
            .unwrap_or_default();
        let mut sql =
            format!("CREATE {unique}INDEX {index_name} ON {table_name}{method} ({columns})");
        if let Some(where_clause) = &index.where_clause {
            sql.push_str(&format!(" WHERE {where_clause}"));
        }
        Some(sql)
    }

    fn supports_enum_types(&self) -> bool {
        // Native CREATE TYPE enums exist but the transformer normalizes to
        // TEXT + CHECK for portability
        true
    }

    fn supports_fulltext(&self) -> bool {
        false
    }

    fn supports_column_comments(&self) -> bool {
        false
    }

    fn supports_unsigned(&self) -> bool {
        false
    }

    fn supports_index_length(&self) -> bool {
        false
    }

    fn supports_partial_indexes(&self) -> bool {
        true
    }
}
