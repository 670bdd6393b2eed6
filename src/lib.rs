//! dbbridge — portable database engine toolkit
//!
//! A dialect-aware toolkit over PostgreSQL, MySQL, and SQLite:
//!
//! - a secure query builder with an identifier firewall and a whitelisted
//!   SQL expression sub-language ([`query_builder`], [`identifier`],
//!   [`expression`], [`translator`])
//! - a schema introspection and optimization advisor ([`schema_analyzer`])
//! - a query profiler consuming dialect EXPLAIN plans ([`profiler`],
//!   [`plan_analyzer`])
//! - a cross-dialect schema transformer with platform DDL emitters
//!   ([`schema`], [`transformer`], [`platform`])
//!
//! Database access goes through the [`database::DatabaseClient`] trait,
//! implemented per dialect over sqlx pools.

pub mod cache;
pub mod database;
pub mod database_mysql;
pub mod database_postgresql;
pub mod database_sqlite;
pub mod debug_event;
pub mod expression;
pub mod identifier;
pub mod plan_analyzer;
pub mod platform;
pub mod platform_mysql;
pub mod platform_postgresql;
pub mod platform_sqlite;
pub mod profiler;
pub mod query_builder;
pub mod schema;
pub mod schema_analyzer;
pub mod sqlite_path;
pub mod transformer;
pub mod translator;

pub use cache::{BoundedCache, CacheStats};
pub use database::{
    ConnectionInfo, DatabaseClient, DatabaseError, DatabaseType, ExplainPlan,
    create_database_client, session_setup_statements,
};
pub use expression::{ExpressionContext, ExpressionError, ExpressionKind, ValidatedExpression};
pub use identifier::{IdentifierError, IdentifierKind};
pub use profiler::{
    QueryAnalysis, QueryProfiler, SessionSummary, Suggestion, SuggestionKind, SuggestionPriority,
};
pub use query_builder::{QueryBuildError, QueryBuilder, QueryOperation, QuerySpec};
pub use schema::{Column, Constraint, Index, Table};
pub use schema_analyzer::{
    OperationContext, OperationKind, Prediction, Recommendation, SchemaAnalyzer,
};
pub use sqlite_path::{PathPolicyError, validate_sqlite_path};
pub use transformer::{
    PostActionKind, PostTransformAction, SchemaTransformer, TransformOptions, TransformedTable,
};
