//! Database-agnostic schema model
//!
//! Tables, columns, indexes, and constraints as a neutral representation
//! that the platform emitters render into dialect DDL and the transformer
//! rewrites across dialects.
use std::fmt;

/// Index categories across the three dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    Index,
    Unique,
    Primary,
    Fulltext,
    Spatial,
}

/// Index access methods (PostgreSQL)
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMethod {
    BTree,
    Gin,
    Gist,
    Hash,
}

impl fmt::Display for IndexMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexMethod::BTree => "btree",
            IndexMethod::Gin => "gin",
            IndexMethod::Gist => "gist",
            IndexMethod::Hash => "hash",
        };
        write!(f, "{name}")
    }
}

/// One index definition
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Index {
    pub name: String,
    pub index_type: IndexType,
    pub method: Option<IndexMethod>,
    pub columns: Vec<String>,
    pub unique: bool,
    /// Partial-index predicate (PostgreSQL)
    pub where_clause: Option<String>,
}

impl Index {
    pub fn new(name: impl Into<String>, index_type: IndexType, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            unique: matches!(index_type, IndexType::Unique | IndexType::Primary),
            index_type,
            method: None,
            columns,
            where_clause: None,
        }
    }
}

/// Constraint categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
    Exclude,
}

/// Referential actions on foreign keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_uppercase().replace('_', " ").as_str() {
            "NO ACTION" => Some(ReferentialAction::NoAction),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }
}

/// One table constraint
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Constraint {
    pub name: String,
    pub constraint_type: ConstraintType,
    pub columns: Vec<String>,
    pub referenced_table: Option<String>,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    /// CHECK / EXCLUDE body
    pub expression: Option<String>,
}

impl Constraint {
    pub fn check(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint_type: ConstraintType::Check,
            columns: Vec::new(),
            referenced_table: None,
            referenced_columns: Vec::new(),
            on_delete: None,
            on_update: None,
            expression: Some(expression.into()),
        }
    }

    pub fn foreign_key(
        name: impl Into<String>,
        columns: Vec<String>,
        referenced_table: impl Into<String>,
        referenced_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            constraint_type: ConstraintType::ForeignKey,
            columns,
            referenced_table: Some(referenced_table.into()),
            referenced_columns,
            on_delete: None,
            on_update: None,
            expression: None,
        }
    }
}

/// One column definition; `data_type` is the source dialect's native
/// type name until the transformer rewrites it
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unsigned: bool,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub default: Option<String>,
    pub comment: Option<String>,
    /// Allowed values for ENUM / SET columns
    pub enum_values: Vec<String>,
    /// `ON UPDATE CURRENT_TIMESTAMP` and friends
    pub on_update: Option<String>,
    pub is_array: bool,
    pub generated_expression: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            primary_key: false,
            auto_increment: false,
            unsigned: false,
            length: None,
            precision: None,
            scale: None,
            default: None,
            comment: None,
            enum_values: Vec::new(),
            on_update: None,
            is_array: false,
            generated_expression: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Case-insensitive base type check, tolerant of length suffixes
    pub fn is_type(&self, base: &str) -> bool {
        let upper = self.data_type.to_uppercase();
        upper == base.to_uppercase()
            || upper.starts_with(&format!("{}(", base.to_uppercase()))
    }
}

/// Dialect-specific table options stripped when leaving MySQL
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TableOptions {
    pub engine: Option<String>,
    pub charset: Option<String>,
    pub collation: Option<String>,
}

/// A complete table definition
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub constraints: Vec<Constraint>,
    pub options: TableOptions,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
            options: TableOptions::default(),
        }
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_builders() {
        let column = Column::new("email", "VARCHAR")
            .with_length(255)
            .not_null()
            .with_default("''");
        assert_eq!(column.name, "email");
        assert!(!column.nullable);
        assert_eq!(column.length, Some(255));
    }

    #[test]
    fn test_is_type_tolerates_length() {
        let column = Column::new("status", "ENUM('a','b')");
        assert!(column.is_type("enum"));
        let column = Column::new("n", "INT");
        assert!(column.is_type("INT"));
        assert!(!column.is_type("BIGINT"));
    }

    #[test]
    fn test_primary_implies_not_null() {
        let column = Column::new("id", "INT").primary();
        assert!(column.primary_key);
        assert!(!column.nullable);
    }

    #[test]
    fn test_referential_action_parse() {
        assert_eq!(
            ReferentialAction::parse("set null"),
            Some(ReferentialAction::SetNull)
        );
        assert_eq!(
            ReferentialAction::parse("SET_DEFAULT"),
            Some(ReferentialAction::SetDefault)
        );
        assert_eq!(ReferentialAction::parse("bogus"), None);
    }

    #[test]
    fn test_index_new_unique_flag() {
        let index = Index::new("idx", IndexType::Unique, vec!["a".to_string()]);
        assert!(index.unique);
        let index = Index::new("idx", IndexType::Fulltext, vec!["a".to_string()]);
        assert!(!index.unique);
    }

    #[test]
    fn test_table_lookup() {
        let mut table = Table::new("users").with_columns(vec![
            Column::new("id", "INT").primary(),
            Column::new("email", "VARCHAR").with_length(255),
        ]);
        assert!(table.column("email").is_some());
        table.column_mut("email").unwrap().nullable = false;
        assert!(!table.column("email").unwrap().nullable);
        assert_eq!(table.primary_key_columns().len(), 1);
    }
}
