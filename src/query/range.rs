use nom::{
    IResult, Parser,
    bytes::complete::take_while,
    character::complete::char,
    combinator::{all_consuming, opt},
};
use crate::core::error::{Error, Result};

/// One side of a range literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// Omitted, the field's domain bound applies
    Open,
    Min,
    Max,
    Value(String),
}

/// `[lo,hi]` with `(` after the opening bracket making the lower bound
/// exclusive and `)` before the closing bracket making the upper one
/// exclusive, e.g. `[(2,4]`, `[min,10)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeLiteral {
    pub lower: Endpoint,
    pub lower_exclusive: bool,
    pub upper: Endpoint,
    pub upper_exclusive: bool,
}

pub fn is_range(value: &str) -> bool {
    value.starts_with('[')
}

fn endpoint(input: &str) -> IResult<&str, Endpoint> {
    let (input, raw) = take_while(|c: char| !matches!(c, ',' | '[' | ']' | '(' | ')')).parse(input)?;
    let endpoint = match raw.trim() {
        "" => Endpoint::Open,
        word if word.eq_ignore_ascii_case("min") => Endpoint::Min,
        word if word.eq_ignore_ascii_case("max") => Endpoint::Max,
        word => Endpoint::Value(word.to_string()),
    };
    Ok((input, endpoint))
}

fn range(input: &str) -> IResult<&str, RangeLiteral> {
    let (input, _) = char('[').parse(input)?;
    let (input, lower_exclusive) = opt(char('(')).parse(input)?;
    let (input, lower) = endpoint(input)?;
    let (input, _) = char(',').parse(input)?;
    let (input, upper) = endpoint(input)?;
    let (input, upper_exclusive) = opt(char(')')).parse(input)?;
    let (input, _) = char(']').parse(input)?;

    Ok((
        input,
        RangeLiteral {
            lower,
            lower_exclusive: lower_exclusive.is_some(),
            upper,
            upper_exclusive: upper_exclusive.is_some(),
        },
    ))
}

pub fn parse_range(input: &str) -> Result<RangeLiteral> {
    all_consuming(range)
        .parse(input.trim())
        .map(|(_, literal)| literal)
        .map_err(|_| Error::query(format!("invalid range '{}'", input)))
}
