//! Parser for the `field[$op]=value&...` filter-query mini-language.
//!
//! Grounded on `filter/filter.go`.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static PARAMETER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_-]+\[\$[a-z]+\]$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    LesserThan,
    GreaterThanOrEqual,
    LesserThanOrEqual,
}

impl Operator {
    fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "eq" => Some(Operator::Equal),
            "ne" => Some(Operator::NotEqual),
            "gt" => Some(Operator::GreaterThan),
            "lt" => Some(Operator::LesserThan),
            "gte" => Some(Operator::GreaterThanOrEqual),
            "lte" => Some(Operator::LesserThanOrEqual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub attribute: String,
    pub operator: Operator,
    pub value: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("malformed filter parameter: {0}")]
    Malformed(String),

    #[error("unknown operator '{0}' in parameter: {1}")]
    UnknownOperator(String, String),
}

/// Parses a query string of the form `attr[$op]=value&attr2[$op2]=value2`.
pub fn parse(query: &str) -> Result<Vec<Parameter>, FilterError> {
    if query.is_empty() {
        return Ok(Vec::new());
    }

    query.split('&').map(parse_one).collect()
}

fn parse_one(part: &str) -> Result<Parameter, FilterError> {
    let (key, value) = part.split_once('=').ok_or_else(|| FilterError::Malformed(part.to_string()))?;

    if !PARAMETER_PATTERN.is_match(key) {
        return Err(FilterError::Malformed(part.to_string()));
    }

    let bracket_start = key.find('[').ok_or_else(|| FilterError::Malformed(part.to_string()))?;
    let attribute = key[..bracket_start].to_string();
    let operator_raw = &key[bracket_start + 2..key.len() - 1];

    let operator = Operator::from_str(operator_raw).ok_or_else(|| FilterError::UnknownOperator(operator_raw.to_string(), part.to_string()))?;

    Ok(Parameter { attribute, operator, value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_parameter() {
        let params = parse("age[$gt]=18").unwrap();
        assert_eq!(params, vec![Parameter { attribute: "age".to_string(), operator: Operator::GreaterThan, value: "18".to_string() }]);
    }

    #[test]
    fn parses_multiple_parameters() {
        let params = parse("age[$gt]=18&name[$eq]=bob").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].attribute, "name");
        assert_eq!(params[1].operator, Operator::Equal);
    }

    #[test]
    fn empty_query_yields_no_parameters() {
        assert_eq!(parse("").unwrap(), Vec::new());
    }

    #[test]
    fn rejects_malformed_attribute_without_brackets() {
        assert!(matches!(parse("age=18"), Err(FilterError::Malformed(_))));
    }

    #[test]
    fn rejects_unknown_operator() {
        assert!(matches!(parse("age[$xx]=18"), Err(FilterError::UnknownOperator(_, _))));
    }

    #[test]
    fn rejects_uppercase_attribute() {
        assert!(matches!(parse("Age[$eq]=18"), Err(FilterError::Malformed(_))));
    }
}
