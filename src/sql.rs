//! SQL fragment assembly: `SELECT`/`INSERT` statements built from
//! structured fragments, and translation of label matchers into
//! ClickHouse `WHERE` predicates.

use crate::proto::LabelMatcher;

/// Matcher operator, decoded from the wire `LabelMatcher::r#type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Equal,
    NotEqual,
    RegexMatch,
    NotRegexMatch,
}

impl MatchOp {
    pub fn from_wire(v: i32) -> Self {
        match v {
            1 => MatchOp::NotEqual,
            2 => MatchOp::RegexMatch,
            3 => MatchOp::NotRegexMatch,
            _ => MatchOp::Equal,
        }
    }
}

fn escape_literal(s: &str) -> String {
    s.replace('\'', "\\'")
}

fn escape_regex(s: &str) -> String {
    s.replace('/', "\\/")
}

/// Translates one matcher into a ClickHouse boolean expression.
///
/// `__name__` matches against the bare `name` column; every other label
/// matches against the `tags Array(String)` column via `arrayExists`.
pub fn matcher_to_sql(m: &LabelMatcher) -> String {
    let op = MatchOp::from_wire(m.r#type);

    if m.name == "__name__" {
        let v = escape_literal(&m.value);
        return match op {
            MatchOp::Equal => format!("name='{v}'"),
            MatchOp::NotEqual => format!("name!='{v}'"),
            MatchOp::RegexMatch => format!("match(name, '{v}') = 1"),
            MatchOp::NotRegexMatch => format!("match(name, '{v}') = 0"),
        };
    }

    match op {
        MatchOp::Equal | MatchOp::NotEqual => {
            let values: Vec<String> = m
                .value
                .split('|')
                .map(|v| format!("'{}={}'", m.name, escape_literal(v)))
                .collect();
            let list = values.join(",");
            let cmp = if op == MatchOp::Equal { "= 1" } else { "= 0" };
            format!("arrayExists(x -> x IN ({list}), tags) {cmp}")
        }
        MatchOp::RegexMatch | MatchOp::NotRegexMatch => {
            let stripped = m.value.strip_prefix('^').unwrap_or(&m.value);
            let v = escape_regex(stripped);
            let cmp = if op == MatchOp::RegexMatch {
                "= 1"
            } else {
                "= 0"
            };
            format!(
                "arrayExists(x -> 1 == match(x,'^{}={}'), tags) {cmp}",
                m.name, v
            )
        }
    }
}

/// Joins each matcher's SQL with `AND`. Empty matcher lists yield `1=1`.
pub fn matchers_to_sql(matchers: &[LabelMatcher]) -> String {
    if matchers.is_empty() {
        return "1=1".to_string();
    }
    matchers
        .iter()
        .map(matcher_to_sql)
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Extracts just the `__name__` matcher's SQL (used by reader mode 3's
/// subquery, which filters candidate fingerprints by metric name only).
pub fn name_matcher_to_sql(matchers: &[LabelMatcher]) -> String {
    matchers
        .iter()
        .find(|m| m.name == "__name__")
        .map(matcher_to_sql)
        .unwrap_or_else(|| "1=1".to_string())
}

/// A small builder for `SELECT ... FROM ... WHERE ... [GROUP BY ...]
/// [ORDER BY ...]` statements, mirroring the reference's `sqlQuery`
/// fragment-accumulator.
#[derive(Debug, Default)]
pub struct SelectBuilder {
    columns: Vec<String>,
    from: String,
    wheres: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
}

impl SelectBuilder {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Default::default()
        }
    }

    pub fn column(mut self, expr: impl Into<String>) -> Self {
        self.columns.push(expr.into());
        self
    }

    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.wheres.push(expr.into());
        self
    }

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    pub fn build(self) -> String {
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.columns.join(", "),
            self.from
        );
        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.wheres.join(" AND "));
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        sql
    }
}

/// DDL to bootstrap the single-table schema (modes 1/2): one row per
/// sample, tags denormalized into the row.
pub fn single_table_schema(database: &str, table: &str) -> Vec<String> {
    vec![
        format!("CREATE DATABASE IF NOT EXISTS {database}"),
        format!(
            "CREATE TABLE IF NOT EXISTS {database}.{table} \
             (date Date, name String, tags Array(String), val Float64, ts DateTime) \
             ENGINE = MergeTree() PARTITION BY toYYYYMM(date) ORDER BY (name, tags, ts)"
        ),
    ]
}

/// DDL to bootstrap the dual-table schema (mode 3): a metrics table
/// mapping fingerprint to label set, deduplicated via
/// `ReplacingMergeTree`, and a samples table keyed by fingerprint.
pub fn dual_table_schema(database: &str, table: &str) -> Vec<String> {
    vec![
        format!("CREATE DATABASE IF NOT EXISTS {database}"),
        format!(
            "CREATE TABLE IF NOT EXISTS {database}.{table}_metrics \
             (date Date, name String, tags Array(String), fingerprint UInt64) \
             ENGINE = ReplacingMergeTree() PARTITION BY toYYYYMM(date) \
             ORDER BY (date, name, tags, fingerprint)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {database}.{table}_samples \
             (fingerprint UInt64, ts DateTime, val Float64) \
             ENGINE = MergeTree() PARTITION BY toYYYYMM(ts) ORDER BY (fingerprint, ts)"
        ),
    ]
}

/// The regex used to detect a missing-schema error and trigger bootstrap.
pub fn is_missing_schema_error(message: &str) -> bool {
    static PATTERN: &str = r"(Database|Table) .* doesn't exist";
    regex::Regex::new(PATTERN)
        .expect("static regex is valid")
        .is_match(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(name: &str, value: &str, r#type: i32) -> LabelMatcher {
        LabelMatcher {
            r#type,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn equal_on_name_column() {
        let m = matcher("__name__", "up", 0);
        assert_eq!(matcher_to_sql(&m), "name='up'");
    }

    #[test]
    fn equal_on_tags_splits_pipe() {
        let m = matcher("env", "a|b", 0);
        let sql = matcher_to_sql(&m);
        assert!(sql.contains("'env=a'"));
        assert!(sql.contains("'env=b'"));
        assert!(sql.ends_with("= 1"));
    }

    #[test]
    fn not_equal_on_tags_uses_zero() {
        let m = matcher("env", "a", 1);
        assert!(matcher_to_sql(&m).ends_with("= 0"));
    }

    #[test]
    fn regex_match_strips_leading_caret() {
        let m = matcher("code", "^5..", 2);
        let sql = matcher_to_sql(&m);
        assert!(sql.contains("'^code=5..'"));
    }

    #[test]
    fn regex_on_name_column_uses_match_function() {
        let m = matcher("__name__", "^req.*", 2);
        assert_eq!(matcher_to_sql(&m), "match(name, '^req.*') = 1");
    }

    #[test]
    fn missing_schema_error_detection() {
        assert!(is_missing_schema_error(
            "code: 81, message: Table default.foo doesn't exist"
        ));
        assert!(is_missing_schema_error(
            "code: 81, message: Database foo doesn't exist"
        ));
        assert!(!is_missing_schema_error("connection refused"));
    }

    #[test]
    fn single_table_schema_has_database_and_table_statements() {
        let stmts = single_table_schema("metrics", "samples");
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("CREATE DATABASE IF NOT EXISTS metrics"));
        assert!(stmts[1].contains("metrics.samples"));
        assert!(stmts[1].contains("ORDER BY (name, tags, ts)"));
    }

    #[test]
    fn dual_table_schema_has_two_tables() {
        let stmts = dual_table_schema("metrics", "samples");
        assert_eq!(stmts.len(), 3);
        assert!(stmts[1].contains("samples_metrics"));
        assert!(stmts[2].contains("samples_samples"));
    }

    #[test]
    fn select_builder_assembles_clauses() {
        let sql = SelectBuilder::new("db.table")
            .column("name")
            .column("tags")
            .filter("ts >= 1")
            .group_by("name")
            .order_by("tags")
            .build();
        assert_eq!(
            sql,
            "SELECT name, tags FROM db.table WHERE ts >= 1 GROUP BY name ORDER BY tags"
        );
    }
}
