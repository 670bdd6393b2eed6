//! SQLite platform emitter
use crate::database::DatabaseType;
use crate::platform::Platform;
use crate::schema::{Column, Constraint, ConstraintType, Index, IndexType, Table};

pub struct SqlitePlatform;

impl Platform for SqlitePlatform {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn type_mapping(&self, source_type: &str) -> String {
        let upper = source_type.to_uppercase();
        let base = upper
            .split('(')
            .next()
            .unwrap_or(&upper)
            .trim_end_matches(" UNSIGNED")
            .trim();
        match base {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" | "SERIAL"
            | "BIGSERIAL" | "SMALLSERIAL" | "BOOLEAN" | "BOOL" => "INTEGER".to_string(),
            "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" | "REAL" => "REAL".to_string(),
            "DECIMAL" | "NUMERIC" => "NUMERIC".to_string(),
            "BLOB" | "BYTEA" | "BINARY" | "VARBINARY" => "BLOB".to_string(),
            // Strings, dates, JSON, ENUM/SET and UUIDs all land in TEXT
            _ => "TEXT".to_string(),
        }
    }

    fn column_type_sql(&self, column: &Column) -> String {
        self.type_mapping(&column.data_type)
    }

    fn column_sql(&self, column: &Column, table: &Table) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.column_type_sql(column)
        );
        if self.inlines_primary_key(column, table) {
            sql.push_str(" PRIMARY KEY");
            if column.auto_increment {
                sql.push_str(" AUTOINCREMENT");
            }
            return sql;
        }
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(&format!(
                " DEFAULT {}",
                crate::platform::format_default(default)
            ));
        }
        sql
    }

    /// A lone INTEGER primary key must be declared inline to get rowid
    /// aliasing and AUTOINCREMENT
    fn inlines_primary_key(&self, column: &Column, table: &Table) -> bool {
        column.primary_key
            && table.primary_key_columns().len() == 1
            && self.column_type_sql(column) == "INTEGER"
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
        // FULLTEXT and SPATIAL have no direct SQLite form; the transformer
        // degrades or virtualizes them before emission
        if matches!(index.index_type, IndexType::Fulltext | IndexType::Spatial | IndexType::Primary) {
            return None;
        }
        let columns = index
            .columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let unique = if index.unique { "UNIQUE " } else { "" };
        Some(format!(
            "CREATE {unique}INDEX {} ON {} ({columns})",
            self.quote_identifier(&index.name),
            self.quote_identifier(&table.name)
        ))
    }

    fn supports_enum_types(&self) -> bool {
        false
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
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping_collapses_to_affinities() {
        assert_eq!(SqlitePlatform.type_mapping("BIGINT"), "INTEGER");
        assert_eq!(SqlitePlatform.type_mapping("VARCHAR(255)"), "TEXT");
        assert_eq!(SqlitePlatform.type_mapping("ENUM('a','b')"), "TEXT");
        assert_eq!(SqlitePlatform.type_mapping("DOUBLE PRECISION"), "REAL");
        assert_eq!(SqlitePlatform.type_mapping("BYTEA"), "BLOB");
        assert_eq!(SqlitePlatform.type_mapping("BOOLEAN"), "INTEGER");
    }

    #[test]
    fn test_integer_primary_key_inline() {
        let table = Table::new("users").with_columns(vec![{
            let mut c = Column::new("id", "INT").primary();
            c.auto_increment = true;
            c
        }]);
        let sql = SqlitePlatform.create_table_sql(&table);
        assert!(sql.contains("`id` INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(!sql.contains("PRIMARY KEY (`id`)"));
    }

    #[test]
    fn test_composite_primary_key_is_table_level() {
        let table = Table::new("m2m").with_columns(vec![
            Column::new("a_id", "INT").primary(),
            Column::new("b_id", "INT").primary(),
        ]);
        let sql = SqlitePlatform.create_table_sql(&table);
        assert!(sql.contains("PRIMARY KEY (`a_id`, `b_id`)"));
    }

    #[test]
    fn test_fulltext_index_not_expressible() {
        let table = Table::new("articles");
        let index = Index::new("ft", IndexType::Fulltext, vec!["body".to_string()]);
        assert!(SqlitePlatform.index_sql(&index, &table).is_none());
    }

    #[test]
    fn test_unique_index_sql() {
        let table = Table::new("users");
        let index = Index::new("idx_email", IndexType::Unique, vec!["email".to_string()]);
        assert_eq!(
            SqlitePlatform.index_sql(&index, &table).unwrap(),
            "CREATE UNIQUE INDEX `idx_email` ON `users` (`email`)"
        );
    }
}
