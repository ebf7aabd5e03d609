//! Filter expression and header parsers using nom
//!
//! Parses `column=op.value` expressions, `column.direction` order specs and
//! `Content-Range` headers.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, map_res, opt, rest, value},
    sequence::{delimited, preceded, separated_pair, tuple},
};

use crate::ast::*;
use crate::error::ParseError;

/// Parse a complete filter expression such as `status=neq.Solucionado`
pub fn parse_filter(input: &str) -> Result<Filter, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseError::new("Empty filter expression"));
    }

    let (_, filter) = filter(input)?;
    Ok(filter)
}

/// Parse an order spec such as `date.desc` (direction defaults to ascending)
pub fn parse_order(input: &str) -> Result<OrderBy, ParseError> {
    let input = input.trim();
    let (remaining, order) = order_by(input)?;
    if !remaining.is_empty() {
        return Err(ParseError::new(format!("Unexpected trailing content: {}", remaining)));
    }
    Ok(order)
}

/// Parse a `Content-Range` header value
pub fn parse_content_range(input: &str) -> Result<ContentRange, ParseError> {
    let input = input.trim();
    let (remaining, range) = content_range(input)?;
    if !remaining.trim().is_empty() {
        return Err(ParseError::new(format!("Unexpected trailing content: {}", remaining)));
    }
    Ok(range)
}

// ============================================================================
// Filters
// ============================================================================

fn filter(input: &str) -> IResult<&str, Filter> {
    let (input, column) = identifier(input)?;
    let (input, _) = tuple((multispace0, char('='), multispace0))(input)?;
    let (input, op) = filter_op(input)?;
    let (input, _) = char('.')(input)?;
    let (input, value) = literal(input)?;

    Ok((input, Filter {
        column: column.to_string(),
        op,
        value,
    }))
}

fn filter_op(input: &str) -> IResult<&str, FilterOp> {
    // Longer keywords first so `gte` is not read as `gt`
    alt((
        value(FilterOp::Neq, tag_no_case("neq")),
        value(FilterOp::Eq, tag_no_case("eq")),
        value(FilterOp::Gte, tag_no_case("gte")),
        value(FilterOp::Gt, tag_no_case("gt")),
        value(FilterOp::Lte, tag_no_case("lte")),
        value(FilterOp::Lt, tag_no_case("lt")),
        value(FilterOp::ILike, tag_no_case("ilike")),
        value(FilterOp::Like, tag_no_case("like")),
        value(FilterOp::Is, tag_no_case("is")),
    ))(input)
}

// ============================================================================
// ORDER
// ============================================================================

fn order_by(input: &str) -> IResult<&str, OrderBy> {
    let (input, column) = take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)?;
    let (input, direction) = opt(preceded(
        char('.'),
        alt((
            value(OrderDirection::Asc, tag_no_case("asc")),
            value(OrderDirection::Desc, tag_no_case("desc")),
        )),
    ))(input)?;

    Ok((input, OrderBy {
        column: column.to_string(),
        direction: direction.unwrap_or_default(),
    }))
}

// ============================================================================
// Content-Range
// ============================================================================

fn content_range(input: &str) -> IResult<&str, ContentRange> {
    let (input, range) = alt((
        map(tag("*"), |_| None),
        map(separated_pair(number, char('-'), number), Some),
    ))(input)?;
    let (input, _) = char('/')(input)?;
    let (input, total) = alt((
        map(tag("*"), |_| None),
        map(number, Some),
    ))(input)?;

    Ok((input, ContentRange { range, total }))
}

fn number(input: &str) -> IResult<&str, u64> {
    map_res(digit1, |s: &str| s.parse::<u64>())(input)
}

// ============================================================================
// Primitives
// ============================================================================

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(quoted_string, Literal::String),
        map(rest, bare_literal),
    ))(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(opt(take_while1(|c: char| c != '"')), |s: Option<&str>| {
            s.unwrap_or_default().to_string()
        }),
        char('"'),
    )(input)
}

/// Classify an unquoted value
///
/// Numbers only become numeric when they print back identically, so codes
/// such as `001` stay strings.
fn bare_literal(raw: &str) -> Literal {
    match raw.to_ascii_lowercase().as_str() {
        "null" => return Literal::Null,
        "true" => return Literal::Bool(true),
        "false" => return Literal::Bool(false),
        _ => {}
    }

    if let Ok(i) = raw.parse::<i64>() {
        if i.to_string() == raw {
            return Literal::Int(i);
        }
    }
    if raw.contains('.') {
        if let Ok(f) = raw.parse::<f64>() {
            if raw.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
                return Literal::Float(f);
            }
        }
    }

    Literal::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_filter() {
        let f = parse_filter("status=neq.Solucionado").unwrap();
        assert_eq!(f.column, "status");
        assert_eq!(f.op, FilterOp::Neq);
        assert_eq!(f.value, Literal::String("Solucionado".to_string()));
    }

    #[test]
    fn test_parse_filter_keeps_spaces_and_dots() {
        let f = parse_filter("warehouse_zone=eq.CONCA DE BARBERÀ").unwrap();
        assert_eq!(f.value, Literal::String("CONCA DE BARBERÀ".to_string()));

        let f = parse_filter("enlace=like.https://example.com*").unwrap();
        assert_eq!(f.op, FilterOp::Like);
        assert_eq!(f.value, Literal::String("https://example.com*".to_string()));
    }

    #[test]
    fn test_parse_filter_literals() {
        assert_eq!(parse_filter("id=gte.12").unwrap().value, Literal::Int(12));
        assert_eq!(parse_filter("code=eq.001").unwrap().value, Literal::String("001".to_string()));
        assert_eq!(parse_filter("enlace=is.null").unwrap().value, Literal::Null);
        assert_eq!(parse_filter("date=gt.2025-01-01").unwrap().value, Literal::String("2025-01-01".to_string()));
        assert_eq!(parse_filter(r#"name=eq."a,b""#).unwrap().value, Literal::String("a,b".to_string()));
    }

    #[test]
    fn test_parse_filter_errors() {
        assert!(parse_filter("").is_err());
        assert!(parse_filter("status").is_err());
        assert!(parse_filter("status=between.1").is_err());
    }

    #[test]
    fn test_parse_order() {
        let o = parse_order("date.desc").unwrap();
        assert_eq!(o.column, "date");
        assert_eq!(o.direction, OrderDirection::Desc);
        assert_eq!(parse_order("id").unwrap().direction, OrderDirection::Asc);
        assert!(parse_order("id.sideways").is_err());
    }

    #[test]
    fn test_parse_content_range() {
        let r = parse_content_range("0-24/573").unwrap();
        assert_eq!(r.range, Some((0, 24)));
        assert_eq!(r.total, Some(573));

        let r = parse_content_range("*/0").unwrap();
        assert_eq!(r.range, None);
        assert_eq!(r.total, Some(0));

        assert_eq!(parse_content_range("0-9/*").unwrap().total, None);
        assert!(parse_content_range("bogus").is_err());
    }
}
