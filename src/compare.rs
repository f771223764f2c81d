//! Scalar comparison used by condition plugins.
//!
//! Comparison never errors: mismatched operand types coerce through the
//! permissive conversions on [`Value`], so a misconfigured rule yields a
//! boolean rather than a failure.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::value::Value;

/// Comparison operator names as rule configuration spells them.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompareOperator {
    #[default]
    Equals,
    BeginsWith,
    EndsWith,
    Contains,
    #[strum(serialize = "greaterthan")]
    #[serde(rename = "greaterthan")]
    GreaterThan,
    #[strum(serialize = "lessthan")]
    #[serde(rename = "lessthan")]
    LessThan,
    #[strum(serialize = "atmost")]
    #[serde(rename = "atmost")]
    AtMost,
    #[strum(serialize = "atleast")]
    #[serde(rename = "atleast")]
    AtLeast,
}

/// Comparison domain: lexical text or coerced numbers.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComparisonType {
    #[default]
    Value,
    Numeric,
}

/// Compare two scalars.
///
/// `case_sensitive` only matters for lexical comparison; when false both
/// operands are case folded first. `negate` inverts the final result. The
/// substring operators always work on text renditions, even under
/// [`ComparisonType::Numeric`].
pub fn evaluate(
    left: &Value,
    right: &Value,
    operator: CompareOperator,
    comparison: ComparisonType,
    case_sensitive: bool,
    negate: bool,
) -> bool {
    let raw = match operator {
        CompareOperator::Equals => {
            compare_ordering(left, right, comparison, case_sensitive, |ordering| {
                ordering == Ordering::Equal
            })
        }
        CompareOperator::GreaterThan => {
            compare_ordering(left, right, comparison, case_sensitive, |ordering| {
                ordering == Ordering::Greater
            })
        }
        CompareOperator::LessThan => {
            compare_ordering(left, right, comparison, case_sensitive, |ordering| {
                ordering == Ordering::Less
            })
        }
        CompareOperator::AtMost => {
            compare_ordering(left, right, comparison, case_sensitive, |ordering| {
                ordering != Ordering::Greater
            })
        }
        CompareOperator::AtLeast => {
            compare_ordering(left, right, comparison, case_sensitive, |ordering| {
                ordering != Ordering::Less
            })
        }
        CompareOperator::BeginsWith => {
            let (l, r) = folded(left, right, case_sensitive);
            l.starts_with(&r)
        }
        CompareOperator::EndsWith => {
            let (l, r) = folded(left, right, case_sensitive);
            l.ends_with(&r)
        }
        CompareOperator::Contains => {
            let (l, r) = folded(left, right, case_sensitive);
            l.contains(&r)
        }
    };
    if negate {
        !raw
    } else {
        raw
    }
}

fn compare_ordering<F>(
    left: &Value,
    right: &Value,
    comparison: ComparisonType,
    case_sensitive: bool,
    op: F,
) -> bool
where
    F: Fn(Ordering) -> bool,
{
    match comparison {
        ComparisonType::Numeric => op(left
            .to_number()
            .partial_cmp(&right.to_number())
            .unwrap_or(Ordering::Equal)),
        ComparisonType::Value => {
            let (l, r) = folded(left, right, case_sensitive);
            op(l.cmp(&r))
        }
    }
}

fn folded(left: &Value, right: &Value, case_sensitive: bool) -> (String, String) {
    let l = left.to_text();
    let r = right.to_text();
    if case_sensitive {
        (l, r)
    } else {
        (l.to_lowercase(), r.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn text(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn test_equals_value() {
        assert!(evaluate(
            &text("my test string"),
            &text("my test string"),
            CompareOperator::Equals,
            ComparisonType::Value,
            false,
            false,
        ));
    }

    #[test]
    fn test_case_sensitive_equals_negated() {
        // Case-sensitive compare of differently cased operands is false,
        // negation turns it true.
        assert!(evaluate(
            &text("my test string"),
            &text("My Test String"),
            CompareOperator::Equals,
            ComparisonType::Value,
            true,
            true,
        ));
    }

    #[test]
    fn test_case_insensitive_equals() {
        assert!(evaluate(
            &text("my test string"),
            &text("My Test String"),
            CompareOperator::Equals,
            ComparisonType::Value,
            false,
            false,
        ));
    }

    #[test]
    fn test_contains() {
        assert!(evaluate(
            &text("my test string"),
            &text("test"),
            CompareOperator::Contains,
            ComparisonType::Value,
            false,
            false,
        ));
        assert!(!evaluate(
            &text("my test string"),
            &text("TEST"),
            CompareOperator::Contains,
            ComparisonType::Value,
            true,
            false,
        ));
    }

    #[test]
    fn test_begins_and_ends() {
        assert!(evaluate(
            &text("my test string"),
            &text("my"),
            CompareOperator::BeginsWith,
            ComparisonType::Value,
            false,
            false,
        ));
        assert!(evaluate(
            &text("my test string"),
            &text("string"),
            CompareOperator::EndsWith,
            ComparisonType::Value,
            false,
            false,
        ));
    }

    #[test]
    fn test_numeric_greaterthan() {
        assert!(evaluate(
            &Value::Integer(5),
            &Value::Integer(4),
            CompareOperator::GreaterThan,
            ComparisonType::Numeric,
            false,
            false,
        ));
    }

    #[test]
    fn test_numeric_bounds() {
        let five = Value::Integer(5);
        assert!(evaluate(
            &five,
            &five,
            CompareOperator::AtMost,
            ComparisonType::Numeric,
            false,
            false,
        ));
        assert!(evaluate(
            &five,
            &five,
            CompareOperator::AtLeast,
            ComparisonType::Numeric,
            false,
            false,
        ));
        assert!(!evaluate(
            &five,
            &five,
            CompareOperator::LessThan,
            ComparisonType::Numeric,
            false,
            false,
        ));
    }

    #[test]
    fn test_lexical_atmost() {
        assert!(evaluate(
            &text("my test string"),
            &text("your test string"),
            CompareOperator::AtMost,
            ComparisonType::Value,
            false,
            false,
        ));
    }

    #[test]
    fn test_unparseable_numeric_coerces_to_zero() {
        // "5abc" does not parse as a number and counts as 0.
        assert!(evaluate(
            &text("5abc"),
            &Value::Integer(0),
            CompareOperator::Equals,
            ComparisonType::Numeric,
            false,
            false,
        ));
        assert!(evaluate(
            &Value::Integer(1),
            &text("abc"),
            CompareOperator::GreaterThan,
            ComparisonType::Numeric,
            false,
            false,
        ));
    }

    #[test]
    fn test_numeric_from_string_operands() {
        assert!(evaluate(
            &text("10"),
            &text("9"),
            CompareOperator::GreaterThan,
            ComparisonType::Numeric,
            false,
            false,
        ));
        // Lexically "10" < "9", numerically it is not.
        assert!(evaluate(
            &text("10"),
            &text("9"),
            CompareOperator::LessThan,
            ComparisonType::Value,
            false,
            false,
        ));
    }

    #[test]
    fn test_substring_under_numeric_uses_text() {
        assert!(evaluate(
            &text("12345"),
            &text("234"),
            CompareOperator::Contains,
            ComparisonType::Numeric,
            false,
            false,
        ));
    }

    #[test]
    fn test_operator_names_parse() {
        assert_eq!(
            CompareOperator::from_str("greaterthan").unwrap(),
            CompareOperator::GreaterThan
        );
        assert_eq!(
            CompareOperator::from_str("begins_with").unwrap(),
            CompareOperator::BeginsWith
        );
        assert_eq!(
            CompareOperator::from_str("atleast").unwrap(),
            CompareOperator::AtLeast
        );
        assert!(CompareOperator::from_str("greater_than").is_err());
        assert_eq!(
            ComparisonType::from_str("numeric").unwrap(),
            ComparisonType::Numeric
        );
    }
}
