//! Query model for PostgREST-style table reads

use serde::{Deserialize, Serialize};
use std::fmt;

/// A read against one table: projection, row filters, ordering and limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Table (or view) name
    pub table: String,
    /// Columns to return (empty = *)
    pub select: Vec<String>,
    /// Row filters, all of which must hold
    pub filters: Vec<Filter>,
    /// ORDER clauses, applied left to right
    pub order: Vec<OrderBy>,
    /// Maximum number of rows
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            select: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.filter(Filter::new(column, FilterOp::Eq, value))
    }

    pub fn order(mut self, column: impl Into<String>, direction: OrderDirection) -> Self {
        self.order.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render as URL query parameters, in the order the service expects them
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 3);

        let select = if self.select.is_empty() {
            "*".to_string()
        } else {
            self.select.join(",")
        };
        params.push(("select".to_string(), select));

        params.extend(self.filters.iter().map(Filter::to_param));

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, o.direction))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }
}

/// A single `column=op.value` row filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Literal,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Literal>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Render as a `(column, "op.value")` query parameter
    pub fn to_param(&self) -> (String, String) {
        (self.column.clone(), format!("{}.{}", self.op, self.value))
    }

    /// Evaluate the filter against a JSON cell
    ///
    /// `None` and JSON null only satisfy `is.null`, matching SQL comparison
    /// semantics on the server.
    pub fn matches(&self, cell: Option<&serde_json::Value>) -> bool {
        let cell = match cell {
            None | Some(serde_json::Value::Null) => {
                return self.op == FilterOp::Is && self.value == Literal::Null;
            }
            Some(v) => v,
        };

        match self.op {
            FilterOp::Is => match &self.value {
                Literal::Null => false,
                Literal::Bool(b) => cell.as_bool() == Some(*b),
                _ => false,
            },
            FilterOp::Eq => compare(cell, &self.value) == Some(std::cmp::Ordering::Equal),
            FilterOp::Neq => matches!(
                compare(cell, &self.value),
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Greater)
            ),
            FilterOp::Gt => compare(cell, &self.value) == Some(std::cmp::Ordering::Greater),
            FilterOp::Gte => matches!(
                compare(cell, &self.value),
                Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
            ),
            FilterOp::Lt => compare(cell, &self.value) == Some(std::cmp::Ordering::Less),
            FilterOp::Lte => matches!(
                compare(cell, &self.value),
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
            ),
            FilterOp::Like => cell
                .as_str()
                .map(|s| wildcard_match(s, &self.value.to_string()))
                .unwrap_or(false),
            FilterOp::ILike => cell
                .as_str()
                .map(|s| {
                    wildcard_match(&s.to_lowercase(), &self.value.to_string().to_lowercase())
                })
                .unwrap_or(false),
        }
    }
}

/// Comparison operators understood by the table API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    Is,
}

impl FilterOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Like => "like",
            FilterOp::ILike => "ilike",
            FilterOp::Is => "is",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Literal values on the right-hand side of a filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Int(v.into())
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::String(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::String(v)
    }
}

/// ORDER clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => f.write_str("asc"),
            OrderDirection::Desc => f.write_str("desc"),
        }
    }
}

/// Parsed `Content-Range` response header (`0-24/573`, `*/0`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRange {
    /// First and last row index of the returned page, absent for empty pages
    pub range: Option<(u64, u64)>,
    /// Total row count, absent when the server did not count
    pub total: Option<u64>,
}

fn compare(cell: &serde_json::Value, literal: &Literal) -> Option<std::cmp::Ordering> {
    use serde_json::Value;

    match (cell, literal) {
        (Value::Number(n), Literal::Int(i)) => match n.as_i64() {
            Some(c) => Some(c.cmp(i)),
            None => n.as_f64().and_then(|c| c.partial_cmp(&(*i as f64))),
        },
        (Value::Number(n), Literal::Float(x)) => n.as_f64().and_then(|c| c.partial_cmp(x)),
        (Value::Bool(c), Literal::Bool(b)) => Some(c.cmp(b)),
        (Value::String(s), lit) => Some(s.as_str().cmp(lit.to_string().as_str())),
        (Value::Number(n), Literal::String(s)) => Some(n.to_string().as_str().cmp(s.as_str())),
        _ => None,
    }
}

/// `*` matches any run of characters, everything else is literal
fn wildcard_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            t += 1;
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_params() {
        let q = Query::table("incident_records")
            .eq("status", "Pendiente")
            .order("date", OrderDirection::Desc)
            .limit(10);

        assert_eq!(
            q.to_params(),
            vec![
                ("select".to_string(), "*".to_string()),
                ("status".to_string(), "eq.Pendiente".to_string()),
                ("order".to_string(), "date.desc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_matches_numbers_and_strings() {
        assert!(Filter::new("id", FilterOp::Eq, 3).matches(Some(&json!(3))));
        assert!(Filter::new("id", FilterOp::Neq, 0).matches(Some(&json!(7))));
        assert!(Filter::new("date", FilterOp::Gte, "2025-01-01").matches(Some(&json!("2025-03-04"))));
        assert!(!Filter::new("date", FilterOp::Lt, "2025-01-01").matches(Some(&json!("2025-03-04"))));
    }

    #[test]
    fn test_null_only_matches_is_null() {
        let is_null = Filter::new("enlace", FilterOp::Is, Literal::Null);
        assert!(is_null.matches(None));
        assert!(is_null.matches(Some(&serde_json::Value::Null)));
        assert!(!Filter::new("enlace", FilterOp::Neq, "x").matches(None));
    }

    #[test]
    fn test_like() {
        let f = Filter::new("name", FilterOp::ILike, "bodega*");
        assert!(f.matches(Some(&json!("Bodega PENEDÈS"))));
        assert!(!Filter::new("name", FilterOp::Like, "bodega*").matches(Some(&json!("Bodega A"))));
    }
}
