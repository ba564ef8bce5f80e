//! Sense readings, literal coercion and comparison operators.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static INT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A(0|-?[1-9]\d*|0[0-7]+|0[xX][0-9a-fA-F]+)[lL]?\z").expect("int literal regex")
});

static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A-?(\d*\.\d+|\d+\.)([eE][+-]?\d+)?\z").expect("float literal regex")
});

/// A value returned by a sense, or a literal it is compared against.
///
/// The derived `PartialEq` is structural. Use [`SenseValue::matches`] for the
/// comparison semantics of sense checks, where `Int(1)` equals `Float(1.0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SenseValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SenseValue {
    /// Classify a plan literal: integer, then float, then boolean, then text.
    pub fn parse_literal(text: &str) -> SenseValue {
        if INT_RE.is_match(text)
            && let Some(n) = parse_int(text)
        {
            return SenseValue::Int(n);
        }
        if FLOAT_RE.is_match(text)
            && let Ok(f) = text.parse::<f64>()
        {
            return SenseValue::Float(f);
        }
        match text {
            "true" | "True" => SenseValue::Bool(true),
            "false" | "False" => SenseValue::Bool(false),
            _ => SenseValue::Text(text.strip_prefix('\'').unwrap_or(text).to_string()),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            SenseValue::Bool(b) => *b,
            SenseValue::Int(n) => *n != 0,
            SenseValue::Float(f) => *f != 0.0,
            SenseValue::Text(s) => !s.is_empty(),
        }
    }

    /// Ordering between comparable kinds; `None` when the kinds differ.
    pub fn partial_compare(&self, other: &SenseValue) -> Option<Ordering> {
        match (self, other) {
            (SenseValue::Int(a), SenseValue::Int(b)) => Some(a.cmp(b)),
            (SenseValue::Int(a), SenseValue::Float(b)) => (*a as f64).partial_cmp(b),
            (SenseValue::Float(a), SenseValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (SenseValue::Float(a), SenseValue::Float(b)) => a.partial_cmp(b),
            (SenseValue::Bool(a), SenseValue::Bool(b)) => Some(a.cmp(b)),
            (SenseValue::Text(a), SenseValue::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Evaluate `self <op> literal`.
    pub fn matches(&self, op: Predicate, literal: &SenseValue) -> bool {
        let ordering = self.partial_compare(literal);
        match op {
            Predicate::Eq => ordering == Some(Ordering::Equal),
            Predicate::Ne => ordering != Some(Ordering::Equal),
            Predicate::Lt => ordering == Some(Ordering::Less),
            Predicate::Gt => ordering == Some(Ordering::Greater),
            Predicate::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Predicate::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let digits = text.trim_end_matches(['l', 'L']);
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).ok();
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return i64::from_str_radix(&digits[1..], 8).ok();
    }
    digits.parse().ok()
}

impl fmt::Display for SenseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenseValue::Bool(b) => write!(f, "{b}"),
            SenseValue::Int(n) => write!(f, "{n}"),
            SenseValue::Float(x) => write!(f, "{x}"),
            SenseValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for SenseValue {
    fn from(value: bool) -> Self {
        SenseValue::Bool(value)
    }
}

impl From<i64> for SenseValue {
    fn from(value: i64) -> Self {
        SenseValue::Int(value)
    }
}

impl From<f64> for SenseValue {
    fn from(value: f64) -> Self {
        SenseValue::Float(value)
    }
}

impl From<&str> for SenseValue {
    fn from(value: &str) -> Self {
        SenseValue::Text(value.to_string())
    }
}

/// Comparison operator of a full sense. Defaults to equality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    #[default]
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Predicate {
    /// Map operator text; `=` is accepted as a synonym of `==`.
    pub fn from_token(text: &str) -> Option<Predicate> {
        match text {
            "==" | "=" => Some(Predicate::Eq),
            "!=" => Some(Predicate::Ne),
            "<" => Some(Predicate::Lt),
            ">" => Some(Predicate::Gt),
            "<=" => Some(Predicate::Le),
            ">=" => Some(Predicate::Ge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Predicate::Eq => "==",
            Predicate::Ne => "!=",
            Predicate::Lt => "<",
            Predicate::Gt => ">",
            Predicate::Le => "<=",
            Predicate::Ge => ">=",
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_coercion_order() {
        assert_eq!(SenseValue::parse_literal("42"), SenseValue::Int(42));
        assert_eq!(SenseValue::parse_literal("-7"), SenseValue::Int(-7));
        assert_eq!(SenseValue::parse_literal("017"), SenseValue::Int(15));
        assert_eq!(SenseValue::parse_literal("0x1F"), SenseValue::Int(31));
        assert_eq!(SenseValue::parse_literal("10L"), SenseValue::Int(10));
        assert_eq!(SenseValue::parse_literal("2.5"), SenseValue::Float(2.5));
        assert_eq!(SenseValue::parse_literal(".5"), SenseValue::Float(0.5));
        assert_eq!(SenseValue::parse_literal("True"), SenseValue::Bool(true));
        assert_eq!(SenseValue::parse_literal("false"), SenseValue::Bool(false));
        assert_eq!(
            SenseValue::parse_literal("'visible"),
            SenseValue::Text("visible".to_string())
        );
        assert_eq!(
            SenseValue::parse_literal("ready"),
            SenseValue::Text("ready".to_string())
        );
    }

    #[test]
    fn numbers_compare_across_kinds() {
        let read = SenseValue::Int(3);
        assert!(read.matches(Predicate::Eq, &SenseValue::Float(3.0)));
        assert!(read.matches(Predicate::Lt, &SenseValue::Float(3.5)));
        assert!(read.matches(Predicate::Ge, &SenseValue::Int(3)));
        assert!(!read.matches(Predicate::Gt, &SenseValue::Int(3)));
    }

    #[test]
    fn incomparable_kinds() {
        let read = SenseValue::Text("3".to_string());
        let literal = SenseValue::Int(3);
        assert!(!read.matches(Predicate::Eq, &literal));
        assert!(read.matches(Predicate::Ne, &literal));
        assert!(!read.matches(Predicate::Lt, &literal));
        assert!(!read.matches(Predicate::Ge, &literal));
    }

    #[test]
    fn truthiness() {
        assert!(SenseValue::Int(-1).truthy());
        assert!(!SenseValue::Float(0.0).truthy());
        assert!(!SenseValue::Text(String::new()).truthy());
        assert!(SenseValue::Bool(true).truthy());
    }

    #[test]
    fn predicate_tokens() {
        assert_eq!(Predicate::from_token("="), Some(Predicate::Eq));
        assert_eq!(Predicate::from_token("<="), Some(Predicate::Le));
        assert_eq!(Predicate::from_token("~"), None);
    }
}
