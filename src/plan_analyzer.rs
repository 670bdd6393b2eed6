//! Dialect EXPLAIN plan analysis
//! Walks PostgreSQL/MySQL JSON plans, SQLite query plans, and tabular
//! fallbacks, emitting structured observations for the query profiler.
use crate::database::{DatabaseType, ExplainPlan, SqlitePlanRow};
use serde_json::Value as JsonValue;

/// Cost above which a PostgreSQL plan node is flagged
const POSTGRESQL_HIGH_COST: f64 = 10_000.0;
/// Cost above which a hash-join node is flagged
const HASH_JOIN_HIGH_COST: f64 = 1_000.0;

/// Recognized plan shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanObservationKind {
    /// Sequential / full table scan
    SequentialScan,
    /// Full index scan (reads the whole index)
    FullIndexScan,
    /// Sort without index support (filesort, temp B-tree)
    Filesort,
    /// Covering / index-only access
    CoveringIndex,
    /// Plan cost above threshold
    HighCost,
    /// Subquery executed per row or materialized
    Subquery,
    /// Temporary table materialization
    TemporaryTable,
}

/// One structural finding from a plan walk.
///
/// Observations never carry SQL; the profiler attaches the analyzed
/// statement when turning them into suggestions.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanObservation {
    pub kind: PlanObservationKind,
    pub table: Option<String>,
    pub detail: String,
    pub cost: Option<f64>,
}

impl PlanObservation {
    fn new(kind: PlanObservationKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            table: None,
            detail: detail.into(),
            cost: None,
        }
    }

    fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

/// Analyze a fetched plan for the given dialect
pub fn analyze_plan(plan: &ExplainPlan, database_type: DatabaseType) -> Vec<PlanObservation> {
    match (plan, database_type) {
        (ExplainPlan::Json(json), DatabaseType::PostgreSQL) => analyze_postgresql_plan(json),
        (ExplainPlan::Json(json), DatabaseType::MySQL) => analyze_mysql_plan(json),
        (ExplainPlan::SqliteRows(rows), _) => analyze_sqlite_plan(rows),
        (ExplainPlan::Text(lines), DatabaseType::MySQL) => analyze_mysql_text(lines),
        (ExplainPlan::Text(lines), _) => analyze_text_plan(lines),
        (ExplainPlan::Json(json), DatabaseType::SQLite) => {
            // SQLite never produces JSON plans; treat as opaque
            analyze_text_plan(&[json.to_string()])
        }
    }
}

/// Analyze PostgreSQL `EXPLAIN (FORMAT JSON)` output
pub fn analyze_postgresql_plan(plan_json: &JsonValue) -> Vec<PlanObservation> {
    let mut observations = Vec::new();
    if let JsonValue::Array(plans) = plan_json {
        if let Some(plan) = plans.first() {
            if let Some(plan_node) = plan.get("Plan") {
                walk_postgresql_node(plan_node, &mut observations);
            }
        }
    }
    observations
}

/// Recursively analyze PostgreSQL plan nodes
fn walk_postgresql_node(node: &JsonValue, observations: &mut Vec<PlanObservation>) {
    let Some(node_obj) = node.as_object() else {
        return;
    };

    let node_type = node_obj
        .get("Node Type")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown");
    let relation = node_obj.get("Relation Name").and_then(|v| v.as_str());
    let total_cost = node_obj.get("Total Cost").and_then(|v| v.as_f64());

    match node_type {
        "Seq Scan" => {
            let mut observation = PlanObservation::new(
                PlanObservationKind::SequentialScan,
                format!("Sequential scan{}", relation.map(|r| format!(" on {r}")).unwrap_or_default()),
            );
            if let Some(relation) = relation {
                observation = observation.with_table(relation);
            }
            observation.cost = total_cost;
            observations.push(observation);
        }
        "Index Only Scan" => {
            let mut observation = PlanObservation::new(
                PlanObservationKind::CoveringIndex,
                "Index-only scan satisfies the query from the index",
            );
            if let Some(relation) = relation {
                observation = observation.with_table(relation);
            }
            observations.push(observation);
        }
        "Sort" => {
            observations.push(PlanObservation::new(
                PlanObservationKind::Filesort,
                "Sort node: ORDER BY is not satisfied by an index",
            ));
        }
        "Subquery Scan" => {
            observations.push(PlanObservation::new(
                PlanObservationKind::Subquery,
                "Subquery scan in plan",
            ));
        }
        _ => {}
    }

    if let Some(cost) = total_cost {
        let threshold = if node_type == "Hash Join" {
            HASH_JOIN_HIGH_COST
        } else {
            POSTGRESQL_HIGH_COST
        };
        if cost > threshold {
            let mut observation = PlanObservation::new(
                PlanObservationKind::HighCost,
                format!("{node_type} node with total cost {cost:.0}"),
            );
            observation.cost = Some(cost);
            observations.push(observation);
        }
    }

    // InitPlan / SubPlan children indicate per-row subquery execution
    if node_obj
        .get("Parent Relationship")
        .and_then(|v| v.as_str())
        .is_some_and(|r| r == "SubPlan" || r == "InitPlan")
    {
        observations.push(PlanObservation::new(
            PlanObservationKind::Subquery,
            format!("{node_type} executed as a subplan"),
        ));
    }

    if let Some(JsonValue::Array(children)) = node_obj.get("Plans") {
        for child in children {
            walk_postgresql_node(child, observations);
        }
    }
}

/// Analyze MySQL `EXPLAIN FORMAT=JSON` output
pub fn analyze_mysql_plan(plan_json: &JsonValue) -> Vec<PlanObservation> {
    let mut observations = Vec::new();
    if let Some(query_block) = plan_json.get("query_block") {
        walk_mysql_query_block(query_block, &mut observations);
    }
    observations
}

fn walk_mysql_query_block(query_block: &JsonValue, observations: &mut Vec<PlanObservation>) {
    let Some(obj) = query_block.as_object() else {
        return;
    };

    if let Some(table) = obj.get("table") {
        analyze_mysql_table(table, observations);
    }
    if let Some(JsonValue::Array(nested_loop)) = obj.get("nested_loop") {
        for entry in nested_loop {
            if let Some(table) = entry.get("table") {
                analyze_mysql_table(table, observations);
            }
        }
    }
    if let Some(ordering) = obj.get("ordering_operation") {
        if ordering
            .get("using_filesort")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            observations.push(PlanObservation::new(
                PlanObservationKind::Filesort,
                "Using filesort for ORDER BY",
            ));
        }
        walk_mysql_query_block(ordering, observations);
    }
    if obj.contains_key("subqueries") || obj.contains_key("materialized_from_subquery") {
        observations.push(PlanObservation::new(
            PlanObservationKind::Subquery,
            "Subquery in query block",
        ));
    }
}

fn analyze_mysql_table(table: &JsonValue, observations: &mut Vec<PlanObservation>) {
    let Some(obj) = table.as_object() else {
        return;
    };
    let table_name = obj
        .get("table_name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let access_type = obj
        .get("access_type")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let read_cost = obj
        .get("cost_info")
        .and_then(|c| c.get("read_cost"))
        .and_then(|v| v.as_str().map(|s| s.parse::<f64>().ok()).flatten().or(v.as_f64()));

    match access_type {
        "ALL" => {
            let mut observation = PlanObservation::new(
                PlanObservationKind::SequentialScan,
                format!("Full table scan on {table_name}"),
            )
            .with_table(table_name);
            observation.cost = read_cost;
            observations.push(observation);
        }
        "index" => {
            observations.push(
                PlanObservation::new(
                    PlanObservationKind::FullIndexScan,
                    format!("Full index scan on {table_name}"),
                )
                .with_table(table_name),
            );
        }
        _ => {}
    }

    if obj
        .get("using_index")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        observations.push(
            PlanObservation::new(
                PlanObservationKind::CoveringIndex,
                format!("Covering index on {table_name}"),
            )
            .with_table(table_name),
        );
    }
    if obj.contains_key("materialized_from_subquery") {
        observations.push(PlanObservation::new(
            PlanObservationKind::Subquery,
            format!("{table_name} materialized from a subquery"),
        ));
    }
}

/// Analyze tabular MySQL EXPLAIN fallback lines
pub fn analyze_mysql_text(lines: &[String]) -> Vec<PlanObservation> {
    let mut observations = Vec::new();
    for line in lines {
        let table = extract_field(line, "table=");
        if line.contains("type=ALL") {
            let mut observation = PlanObservation::new(
                PlanObservationKind::SequentialScan,
                format!("Full table scan{}", table.as_deref().map(|t| format!(" on {t}")).unwrap_or_default()),
            );
            observation.table = table.clone();
            observations.push(observation);
        } else if line.contains("type=index") {
            let mut observation =
                PlanObservation::new(PlanObservationKind::FullIndexScan, "Full index scan");
            observation.table = table.clone();
            observations.push(observation);
        }
        if line.contains("Using filesort") {
            observations.push(PlanObservation::new(
                PlanObservationKind::Filesort,
                "Using filesort for ORDER BY",
            ));
        }
        if line.contains("Using temporary") {
            observations.push(PlanObservation::new(
                PlanObservationKind::TemporaryTable,
                "Using temporary table",
            ));
        }
        if line.contains("Using index") && !line.contains("Using index condition") {
            let mut observation =
                PlanObservation::new(PlanObservationKind::CoveringIndex, "Covering index");
            observation.table = table;
            observations.push(observation);
        }
    }
    observations
}

/// Analyze SQLite `EXPLAIN QUERY PLAN` rows
pub fn analyze_sqlite_plan(rows: &[SqlitePlanRow]) -> Vec<PlanObservation> {
    let mut observations = Vec::new();
    for row in rows {
        let detail_upper = row.detail.to_uppercase();

        if detail_upper.contains("USING COVERING INDEX") {
            observations.push(
                PlanObservation::new(
                    PlanObservationKind::CoveringIndex,
                    row.detail.clone(),
                ),
            );
        } else if detail_upper.contains("SCAN") && !detail_upper.contains("USING INDEX") {
            let mut observation =
                PlanObservation::new(PlanObservationKind::SequentialScan, row.detail.clone());
            observation.table = extract_sqlite_table(&row.detail);
            observations.push(observation);
        }

        if detail_upper.contains("USE TEMP B-TREE") || detail_upper.contains("USING TEMP B-TREE") {
            observations.push(PlanObservation::new(
                PlanObservationKind::Filesort,
                row.detail.clone(),
            ));
        }
        if detail_upper.contains("SUBQUERY") {
            observations.push(PlanObservation::new(
                PlanObservationKind::Subquery,
                row.detail.clone(),
            ));
        }
    }
    observations
}

/// Generic textual fallback (PostgreSQL `EXPLAIN` without JSON)
pub fn analyze_text_plan(lines: &[String]) -> Vec<PlanObservation> {
    let mut observations = Vec::new();
    for line in lines {
        if let Some(rest) = line.trim().strip_prefix("Seq Scan on ") {
            let table = rest.split_whitespace().next().unwrap_or(rest);
            observations.push(
                PlanObservation::new(
                    PlanObservationKind::SequentialScan,
                    format!("Sequential scan on {table}"),
                )
                .with_table(table),
            );
        } else if line.contains("Index Only Scan") {
            observations.push(PlanObservation::new(
                PlanObservationKind::CoveringIndex,
                "Index-only scan",
            ));
        } else if line.trim_start().starts_with("Sort") {
            observations.push(PlanObservation::new(
                PlanObservationKind::Filesort,
                "Sort without index support",
            ));
        } else if line.contains("SubPlan") {
            observations.push(PlanObservation::new(
                PlanObservationKind::Subquery,
                "Subplan in query",
            ));
        }
    }
    observations
}

/// Pull `field=value` out of a rendered fallback line
fn extract_field(line: &str, prefix: &str) -> Option<String> {
    let start = line.find(prefix)? + prefix.len();
    let rest = &line[start..];
    let value: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
    if value.is_empty() { None } else { Some(value) }
}

/// `SCAN TABLE posts` / `SCAN posts` → `posts`
fn extract_sqlite_table(detail: &str) -> Option<String> {
    let upper = detail.to_uppercase();
    let offset = if let Some(pos) = upper.find("SCAN TABLE ") {
        pos + "SCAN TABLE ".len()
    } else if let Some(pos) = upper.find("SCAN ") {
        pos + "SCAN ".len()
    } else {
        return None;
    };
    detail[offset..]
        .split_whitespace()
        .next()
        .map(|t| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_postgresql_seq_scan_detected() {
        let plan = json!([{
            "Plan": {
                "Node Type": "Seq Scan",
                "Relation Name": "users",
                "Total Cost": 155.0
            }
        }]);
        let observations = analyze_postgresql_plan(&plan);
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].kind, PlanObservationKind::SequentialScan);
        assert_eq!(observations[0].table.as_deref(), Some("users"));
    }

    #[test]
    fn test_postgresql_high_cost_and_children() {
        let plan = json!([{
            "Plan": {
                "Node Type": "Hash Join",
                "Total Cost": 2500.0,
                "Plans": [
                    {"Node Type": "Seq Scan", "Relation Name": "orders", "Total Cost": 900.0},
                    {"Node Type": "Index Only Scan", "Relation Name": "users"}
                ]
            }
        }]);
        let observations = analyze_postgresql_plan(&plan);
        assert!(observations
            .iter()
            .any(|o| o.kind == PlanObservationKind::HighCost));
        assert!(observations
            .iter()
            .any(|o| o.kind == PlanObservationKind::SequentialScan
                && o.table.as_deref() == Some("orders")));
        assert!(observations
            .iter()
            .any(|o| o.kind == PlanObservationKind::CoveringIndex));
    }

    #[test]
    fn test_postgresql_subplan_detected() {
        let plan = json!([{
            "Plan": {
                "Node Type": "Seq Scan",
                "Relation Name": "users",
                "Plans": [
                    {"Node Type": "Index Scan", "Parent Relationship": "SubPlan"}
                ]
            }
        }]);
        let observations = analyze_postgresql_plan(&plan);
        assert!(observations
            .iter()
            .any(|o| o.kind == PlanObservationKind::Subquery));
    }

    #[test]
    fn test_mysql_full_scan_detected() {
        let plan = json!({
            "query_block": {
                "table": {
                    "table_name": "users",
                    "access_type": "ALL",
                    "cost_info": {"read_cost": "120.5"}
                }
            }
        });
        let observations = analyze_mysql_plan(&plan);
        assert_eq!(observations[0].kind, PlanObservationKind::SequentialScan);
        assert_eq!(observations[0].table.as_deref(), Some("users"));
    }

    #[test]
    fn test_mysql_nested_loop_and_filesort() {
        let plan = json!({
            "query_block": {
                "ordering_operation": {
                    "using_filesort": true,
                    "nested_loop": [
                        {"table": {"table_name": "a", "access_type": "ALL"}},
                        {"table": {"table_name": "b", "access_type": "eq_ref"}}
                    ]
                }
            }
        });
        let observations = analyze_mysql_plan(&plan);
        assert!(observations
            .iter()
            .any(|o| o.kind == PlanObservationKind::Filesort));
        assert!(observations
            .iter()
            .any(|o| o.kind == PlanObservationKind::SequentialScan
                && o.table.as_deref() == Some("a")));
    }

    #[test]
    fn test_mysql_text_fallback() {
        let lines = vec![
            "table=users type=ALL key= extra=Using where; Using filesort".to_string(),
        ];
        let observations = analyze_mysql_text(&lines);
        assert!(observations
            .iter()
            .any(|o| o.kind == PlanObservationKind::SequentialScan));
        assert!(observations
            .iter()
            .any(|o| o.kind == PlanObservationKind::Filesort));
    }

    #[test]
    fn test_sqlite_scan_and_temp_btree() {
        let rows = vec![
            SqlitePlanRow {
                id: 2,
                parent: 0,
                detail: "SCAN TABLE posts".to_string(),
            },
            SqlitePlanRow {
                id: 3,
                parent: 0,
                detail: "USE TEMP B-TREE FOR ORDER BY".to_string(),
            },
        ];
        let observations = analyze_sqlite_plan(&rows);
        assert!(observations.iter().any(
            |o| o.kind == PlanObservationKind::SequentialScan
                && o.table.as_deref() == Some("posts")
        ));
        assert!(observations
            .iter()
            .any(|o| o.kind == PlanObservationKind::Filesort));
    }

    #[test]
    fn test_sqlite_covering_index_positive() {
        let rows = vec![SqlitePlanRow {
            id: 2,
            parent: 0,
            detail: "SEARCH posts USING COVERING INDEX idx_posts_author (author_id=?)".to_string(),
        }];
        let observations = analyze_sqlite_plan(&rows);
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].kind, PlanObservationKind::CoveringIndex);
    }

    #[test]
    fn test_sqlite_search_with_index_not_flagged() {
        let rows = vec![SqlitePlanRow {
            id: 2,
            parent: 0,
            detail: "SEARCH posts USING INDEX idx_posts_author (author_id=?)".to_string(),
        }];
        let observations = analyze_sqlite_plan(&rows);
        assert!(observations.is_empty());
    }

    #[test]
    fn test_text_plan_fallback() {
        let lines = vec![
            "Seq Scan on users  (cost=0.00..155.00 rows=5000 width=120)".to_string(),
            "  Sort Key: created_at".to_string(),
        ];
        let observations = analyze_text_plan(&lines);
        assert!(observations.iter().any(
            |o| o.kind == PlanObservationKind::SequentialScan
                && o.table.as_deref() == Some("users")
        ));
    }
}
