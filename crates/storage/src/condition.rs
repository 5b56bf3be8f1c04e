//! Native comparison conditions evaluated against a single field.
//!
//! A `Condition` is what a where-clause operator resolves to. Records whose field is
//! missing or null never match, the same way they are absent from an index.

use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::Value;

/// A comparison applied to one field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Equals(Value),
    NotEqual(Value),
    Above(Value),
    AboveOrEqual(Value),
    Below(Value),
    BelowOrEqual(Value),
    Between {
        lower: Value,
        upper: Value,
        include_lower: bool,
        include_upper: bool,
    },
    AnyOf(Vec<Value>),
    NoneOf(Vec<Value>),
    StartsWith(String),
    StartsWithAnyOf(Vec<String>),
    EqualsIgnoreCase(String),
    AnyOfIgnoreCase(Vec<String>),
    StartsWithIgnoreCase(String),
    StartsWithAnyOfIgnoreCase(Vec<String>),
}

impl Condition {
    /// Evaluates the condition against a field value.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => return false,
        };

        match self {
            Condition::Equals(target) => value.key_eq(target),
            Condition::NotEqual(target) => !value.key_eq(target),
            Condition::Above(target) => value > target,
            Condition::AboveOrEqual(target) => value >= target,
            Condition::Below(target) => value < target,
            Condition::BelowOrEqual(target) => value <= target,
            Condition::Between {
                lower,
                upper,
                include_lower,
                include_upper,
            } => {
                let above = if *include_lower {
                    value >= lower
                } else {
                    value > lower
                };
                let below = if *include_upper {
                    value <= upper
                } else {
                    value < upper
                };
                above && below
            }
            Condition::AnyOf(targets) => targets.iter().any(|t| value.key_eq(t)),
            Condition::NoneOf(targets) => !targets.iter().any(|t| value.key_eq(t)),
            Condition::StartsWith(prefix) => {
                value.as_str().is_some_and(|s| s.starts_with(prefix.as_str()))
            }
            Condition::StartsWithAnyOf(prefixes) => value
                .as_str()
                .is_some_and(|s| prefixes.iter().any(|p| s.starts_with(p.as_str()))),
            Condition::EqualsIgnoreCase(target) => value
                .as_str()
                .is_some_and(|s| s.to_lowercase() == target.to_lowercase()),
            Condition::AnyOfIgnoreCase(targets) => value.as_str().is_some_and(|s| {
                let s = s.to_lowercase();
                targets.iter().any(|t| s == t.to_lowercase())
            }),
            Condition::StartsWithIgnoreCase(prefix) => value
                .as_str()
                .is_some_and(|s| s.to_lowercase().starts_with(&prefix.to_lowercase())),
            Condition::StartsWithAnyOfIgnoreCase(prefixes) => value.as_str().is_some_and(|s| {
                let s = s.to_lowercase();
                prefixes.iter().any(|p| s.starts_with(&p.to_lowercase()))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn test_equality_conditions() {
        let five = Value::Int64(5);
        assert!(Condition::Equals(5.into()).matches(Some(&five)));
        assert!(Condition::Equals(Value::Float64(5.0)).matches(Some(&five)));
        assert!(!Condition::Equals(9.into()).matches(Some(&five)));
        assert!(Condition::NotEqual(9.into()).matches(Some(&five)));
        assert!(!Condition::NotEqual(5.into()).matches(Some(&five)));
    }

    #[test]
    fn test_missing_values_never_match() {
        assert!(!Condition::NotEqual(5.into()).matches(None));
        assert!(!Condition::NoneOf(vec![1.into()]).matches(Some(&Value::Null)));
        assert!(!Condition::Below(5.into()).matches(None));
    }

    #[test]
    fn test_range_conditions() {
        let v = Value::Int64(10);
        assert!(Condition::Above(5.into()).matches(Some(&v)));
        assert!(!Condition::Above(10.into()).matches(Some(&v)));
        assert!(Condition::AboveOrEqual(10.into()).matches(Some(&v)));
        assert!(Condition::Below(10.5.into()).matches(Some(&v)));
        assert!(Condition::BelowOrEqual(10.into()).matches(Some(&v)));

        let between = |include_lower, include_upper| Condition::Between {
            lower: 10.into(),
            upper: 20.into(),
            include_lower,
            include_upper,
        };
        assert!(between(true, false).matches(Some(&v)));
        assert!(!between(false, false).matches(Some(&v)));
        assert!(!between(true, false).matches(Some(&Value::Int64(20))));
        assert!(between(true, true).matches(Some(&Value::Int64(20))));
    }

    #[test]
    fn test_list_conditions() {
        let v = Value::Int64(3);
        assert!(Condition::AnyOf(vec![1.into(), 3.into()]).matches(Some(&v)));
        assert!(!Condition::AnyOf(vec![]).matches(Some(&v)));
        assert!(Condition::NoneOf(vec![1.into(), 2.into()]).matches(Some(&v)));
        assert!(!Condition::NoneOf(vec![3.into()]).matches(Some(&v)));
    }

    #[test]
    fn test_string_conditions() {
        let v = Value::String("Alice".into());
        assert!(Condition::StartsWith("Al".into()).matches(Some(&v)));
        assert!(!Condition::StartsWith("al".into()).matches(Some(&v)));
        assert!(Condition::StartsWithIgnoreCase("al".into()).matches(Some(&v)));
        assert!(Condition::EqualsIgnoreCase("ALICE".into()).matches(Some(&v)));
        assert!(Condition::AnyOfIgnoreCase(vec!["bob".into(), "alice".into()]).matches(Some(&v)));
        assert!(Condition::StartsWithAnyOf(vec!["B".into(), "A".into()]).matches(Some(&v)));
        assert!(Condition::StartsWithAnyOfIgnoreCase(vec!["x".to_string(), "a".to_string()])
            .matches(Some(&v)));
        assert!(!Condition::StartsWith("1".into()).matches(Some(&Value::Int64(12))));
    }
}
