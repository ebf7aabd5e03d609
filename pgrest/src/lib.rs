//! pgrest - row queries for PostgREST-style table APIs
//!
//! Hosted backends built on PostgREST expose every table as an HTTP
//! resource and encode reads in the query string.
//!
//! # Syntax Overview
//!
//! ```text
//! GET /rest/v1/incident_records?select=*&status=neq.Solucionado&order=date.desc&limit=10
//!
//! status=neq.Solucionado      -- row filter: column=op.value
//! warehouse_zone=eq.PENEDÈS   -- values run to the end of the expression
//! code=eq."A,B"               -- double quotes for values with reserved characters
//! enlace=is.null              -- null test
//! date=gte.2025-01-01         -- ISO dates compare lexically
//! order=date.desc             -- ordering
//! Content-Range: 0-24/573     -- page bounds and exact count
//! ```
//!
//! The same filters evaluate locally against JSON rows through
//! [`Filter::matches`], so in-memory tables and tabular read models honour
//! the server's semantics.

mod ast;
mod error;
mod parser;

pub use ast::*;
pub use error::ParseError;

/// Parse a `column=op.value` filter expression
pub fn parse_filter(input: &str) -> Result<Filter, ParseError> {
    parser::parse_filter(input)
}

/// Parse several filter expressions, stopping at the first invalid one
pub fn parse_filters<I, S>(inputs: I) -> Result<Vec<Filter>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, s)| parser::parse_filter(s.as_ref()).map_err(|e| e.with_position(i)))
        .collect()
}

/// Parse an `order` spec such as `date.desc`
pub fn parse_order(input: &str) -> Result<OrderBy, ParseError> {
    parser::parse_order(input)
}

/// Parse a `Content-Range` header value
pub fn parse_content_range(input: &str) -> Result<ContentRange, ParseError> {
    parser::parse_content_range(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filters() {
        let filters = parse_filters(["status=eq.Pendiente", "id=gt.3"]).unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[1].op, FilterOp::Gt);
    }

    #[test]
    fn test_parse_filters_reports_index() {
        let err = parse_filters(["status=eq.Pendiente", "nonsense"]).unwrap_err();
        assert_eq!(err.position, Some(1));
    }

    #[test]
    fn test_filter_renders_back() {
        let f = parse_filter("date=gte.2025-01-01").unwrap();
        assert_eq!(f.to_param(), ("date".to_string(), "gte.2025-01-01".to_string()));
    }
}
