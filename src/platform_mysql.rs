//! MySQL platform emitter
use crate::database::DatabaseType;
use crate::platform::Platform;
use crate::schema::{Column, Constraint, ConstraintType, Index, IndexType, Table};

pub struct MySqlPlatform;

impl MySqlPlatform {
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
            "SERIAL" => "INT".to_string(),
            "BIGSERIAL" => "BIGINT".to_string(),
            "SMALLSERIAL" => "SMALLINT".to_string(),
            "INTEGER" => "INT".to_string(),
            "BYTEA" => "BLOB".to_string(),
            "DOUBLE PRECISION" => "DOUBLE".to_string(),
            "JSONB" => "JSON".to_string(),
            "UUID" => "CHAR(36)".to_string(),
            "BOOLEAN" | "BOOL" => "TINYINT(1)".to_string(),
            "TIMESTAMP WITHOUT TIME ZONE" | "TIMESTAMPTZ" => "DATETIME".to_string(),
            "CHARACTER VARYING" => "VARCHAR".to_string(),
            other => other.to_string(),
        }
    }
}

impl Platform for MySqlPlatform {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    fn type_mapping(&self, source_type: &str) -> String {
        Self::base_type(source_type)
    }

    fn column_type_sql(&self, column: &Column) -> String {
        let mut type_sql = if column.is_type("ENUM") && !column.enum_values.is_empty() {
            let values = column
                .enum_values
                .iter()
                .map(|v| self.quote_value(v))
                .collect::<Vec<_>>()
                .join(",");
            format!("ENUM({values})")
        } else if column.is_type("SET") && !column.enum_values.is_empty() {
            let values = column
                .enum_values
                .iter()
                .map(|v| self.quote_value(v))
                .collect::<Vec<_>>()
                .join(",");
            format!("SET({values})")
        } else {
            let base = self.type_mapping(&column.data_type);
            match (column.length, column.precision) {
                (Some(length), _) if base == "VARCHAR" || base == "CHAR" => {
                    format!("{base}({length})")
                }
                (_, Some(precision)) if base == "DECIMAL" || base == "NUMERIC" => {
                    let scale = column.scale.unwrap_or(0);
                    format!("{base}({precision},{scale})")
                }
                _ => self.rewrite_type(&column.data_type),
            }
        };
        if column.unsigned && self.supports_unsigned() {
            type_sql.push_str(" UNSIGNED");
        }
        type_sql
    }

    fn column_sql(&self, column: &Column, _table: &Table) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.column_type_sql(column)
        );
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(&format!(
                " DEFAULT {}",
                crate::platform::format_default(default)
            ));
        }
        if column.auto_increment {
            sql.push_str(" AUTO_INCREMENT");
        }
        if let Some(on_update) = &column.on_update {
            sql.push_str(&format!(" ON UPDATE {on_update}"));
        }
        if let Some(comment) = &column.comment {
            sql.push_str(&format!(" COMMENT {}", self.quote_value(comment)));
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
            _ => None,
        }
    }

    fn index_sql(&self, index: &Index, table: &Table) -> Option<String> {
        let columns = index
            .columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let table_name = self.quote_identifier(&table.name);
        let index_name = self.quote_identifier(&index.name);
        let sql = match index.index_type {
            IndexType::Primary => return None,
            IndexType::Fulltext => {
                format!("CREATE FULLTEXT INDEX {index_name} ON {table_name} ({columns})")
            }
            IndexType::Spatial => {
                format!("CREATE SPATIAL INDEX {index_name} ON {table_name} ({columns})")
            }
            IndexType::Unique => {
                format!("CREATE UNIQUE INDEX {index_name} ON {table_name} ({columns})")
            }
            IndexType::Index => {
                format!("CREATE INDEX {index_name} ON {table_name} ({columns})")
            }
        };
        Some(sql)
    }

    fn table_options_sql(&self, table: &Table) -> String {
        let mut options = String::new();
        if let Some(engine) = &table.options.engine {
            options.push_str(&format!(" ENGINE={engine}"));
        }
        if let Some(charset) = &table.options.charset {
            options.push_str(&format!(" DEFAULT CHARSET={charset}"));
        }
        if let Some(collation) = &table.options.collation {
            options.push_str(&format!(" COLLATE={collation}"));
        }
        options
    }

    fn supports_enum_types(&self) -> bool {
        true
    }

    fn supports_fulltext(&self) -> bool {
        true
    }

    fn supports_column_comments(&self) -> bool {
        true
    }

    fn supports_unsigned(&self) -> bool {
        true
    }

    fn supports_index_length(&self) -> bool {
        true
    }

    fn supports_partial_indexes(&self) -> bool {
        false
    }
}
