//! Operator dispatch and operand coercion.
//!
//! Where-clause operators arrive as engine operator names (`"equals"`, `"anyOf"`, ...)
//! and their values in loosely typed form. `Operator` is the closed table of names the
//! engine understands; `Operand` is the coerced value; together they resolve to a
//! storage [`Condition`].

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;
use ripple_core::{Error, Result, Value};
use ripple_storage::Condition;

/// A native range/equality operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEqual,
    Above,
    AboveOrEqual,
    Below,
    BelowOrEqual,
    Between,
    AnyOf,
    NoneOf,
    StartsWith,
    StartsWithAnyOf,
    EqualsIgnoreCase,
    AnyOfIgnoreCase,
    StartsWithIgnoreCase,
    StartsWithAnyOfIgnoreCase,
}

impl Operator {
    /// Every operator, in table order.
    pub const ALL: [Operator; 15] = [
        Operator::Equals,
        Operator::NotEqual,
        Operator::Above,
        Operator::AboveOrEqual,
        Operator::Below,
        Operator::BelowOrEqual,
        Operator::Between,
        Operator::AnyOf,
        Operator::NoneOf,
        Operator::StartsWith,
        Operator::StartsWithAnyOf,
        Operator::EqualsIgnoreCase,
        Operator::AnyOfIgnoreCase,
        Operator::StartsWithIgnoreCase,
        Operator::StartsWithAnyOfIgnoreCase,
    ];

    /// Returns the engine name of the operator.
    pub fn name(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEqual => "notEqual",
            Operator::Above => "above",
            Operator::AboveOrEqual => "aboveOrEqual",
            Operator::Below => "below",
            Operator::BelowOrEqual => "belowOrEqual",
            Operator::Between => "between",
            Operator::AnyOf => "anyOf",
            Operator::NoneOf => "noneOf",
            Operator::StartsWith => "startsWith",
            Operator::StartsWithAnyOf => "startsWithAnyOf",
            Operator::EqualsIgnoreCase => "equalsIgnoreCase",
            Operator::AnyOfIgnoreCase => "anyOfIgnoreCase",
            Operator::StartsWithIgnoreCase => "startsWithIgnoreCase",
            Operator::StartsWithAnyOfIgnoreCase => "startsWithAnyOfIgnoreCase",
        }
    }

    /// Returns true for operators taking a list of values.
    pub fn takes_list(self) -> bool {
        matches!(
            self,
            Operator::AnyOf
                | Operator::NoneOf
                | Operator::StartsWithAnyOf
                | Operator::AnyOfIgnoreCase
                | Operator::StartsWithAnyOfIgnoreCase
        )
    }

    /// Resolves the operator and its operand into a storage condition.
    pub fn condition(self, operand: &Operand) -> Result<Condition> {
        let condition = match self {
            Operator::Equals => Condition::Equals(operand.scalar()),
            Operator::NotEqual => Condition::NotEqual(operand.scalar()),
            Operator::Above => Condition::Above(operand.scalar()),
            Operator::AboveOrEqual => Condition::AboveOrEqual(operand.scalar()),
            Operator::Below => Condition::Below(operand.scalar()),
            Operator::BelowOrEqual => Condition::BelowOrEqual(operand.scalar()),
            Operator::Between => {
                let values = operand.list();
                let (lower, upper) = match values {
                    [lower, upper, ..] => (lower.clone(), upper.clone()),
                    _ => {
                        return Err(Error::invalid_operand(
                            self.name(),
                            format!("expected two bounds, got {}", values.len()),
                        ))
                    }
                };
                let flag = |i: usize, default: bool| {
                    values.get(i).and_then(Value::as_bool).unwrap_or(default)
                };
                Condition::Between {
                    lower,
                    upper,
                    include_lower: flag(2, true),
                    include_upper: flag(3, false),
                }
            }
            Operator::AnyOf => Condition::AnyOf(self.values(operand)?),
            Operator::NoneOf => Condition::NoneOf(self.values(operand)?),
            Operator::StartsWith => Condition::StartsWith(self.text(&operand.scalar())?),
            Operator::StartsWithAnyOf => Condition::StartsWithAnyOf(self.texts(operand)?),
            Operator::EqualsIgnoreCase => {
                Condition::EqualsIgnoreCase(self.text(&operand.scalar())?)
            }
            Operator::AnyOfIgnoreCase => Condition::AnyOfIgnoreCase(self.texts(operand)?),
            Operator::StartsWithIgnoreCase => {
                Condition::StartsWithIgnoreCase(self.text(&operand.scalar())?)
            }
            Operator::StartsWithAnyOfIgnoreCase => {
                Condition::StartsWithAnyOfIgnoreCase(self.texts(operand)?)
            }
        };
        Ok(condition)
    }

    fn values(self, operand: &Operand) -> Result<Vec<Value>> {
        if operand.is_null() {
            return Err(Error::invalid_operand(self.name(), "expected a list of values"));
        }
        Ok(operand.list().to_vec())
    }

    fn texts(self, operand: &Operand) -> Result<Vec<String>> {
        self.values(operand)?.iter().map(|v| self.text(v)).collect()
    }

    fn text(self, value: &Value) -> Result<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Int64(_) | Value::Float64(_) | Value::Boolean(_) => Ok(value.to_string()),
            other => Err(Error::invalid_operand(
                self.name(),
                format!("expected text, got {}", other),
            )),
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.name() == name)
            .ok_or_else(|| Error::invalid_operator(name))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A coerced where-clause value.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// One value (`Null` when the clause had none).
    Value(Value),
    /// An array value: list operators use its elements, scalar operators the whole array.
    Array(Vec<Value>),
    /// Several arguments split from a comma-separated string.
    Args(Vec<Value>),
}

impl Operand {
    /// Coerces a raw clause value.
    ///
    /// - arrays stay one array-valued argument,
    /// - numeric-looking strings become numbers (integral ones `Int64`),
    /// - strings containing commas split into arguments, each coerced the same way,
    /// - anything else passes through; an absent value is `Null`.
    pub fn coerce(value: Option<&Value>) -> Self {
        match value {
            None => Operand::Value(Value::Null),
            Some(Value::Array(items)) => Operand::Array(items.clone()),
            Some(Value::String(s)) => {
                if let Some(number) = parse_number(s) {
                    Operand::Value(number)
                } else if s.contains(',') {
                    Operand::Args(s.split(',').map(coerce_arg).collect())
                } else {
                    Operand::Value(Value::String(s.clone()))
                }
            }
            Some(other) => Operand::Value(other.clone()),
        }
    }

    /// Returns true when the operand is a single `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Value(Value::Null))
    }

    /// The value scalar operators compare against.
    pub fn scalar(&self) -> Value {
        match self {
            Operand::Value(value) => value.clone(),
            Operand::Array(items) => Value::Array(items.clone()),
            Operand::Args(args) => args.first().cloned().unwrap_or_default(),
        }
    }

    /// The values list operators use.
    pub fn list(&self) -> &[Value] {
        match self {
            Operand::Value(Value::Null) => &[],
            Operand::Value(value) => core::slice::from_ref(value),
            Operand::Array(items) | Operand::Args(items) => items,
        }
    }
}

fn coerce_arg(part: &str) -> Value {
    parse_number(part).unwrap_or_else(|| Value::String(part.to_string()))
}

/// Parses a numeric-looking string. Non-finite results are not numbers.
///
/// Follows JS numeric conversion: a blank string is zero and `0x`, `0o` and
/// `0b` literals are integers.
fn parse_number(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(Value::Int64(0));
    }
    if let Some(n) = parse_prefixed(trimmed) {
        return Some(Value::Int64(n));
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(Value::Int64(n));
    }
    let f = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
    // 2^63: beyond this an integral f64 no longer fits i64
    if f.abs() < 9.223_372_036_854_776e18 && (f as i64) as f64 == f {
        Some(Value::Int64(f as i64))
    } else {
        Some(Value::Float64(f))
    }
}

fn parse_prefixed(s: &str) -> Option<i64> {
    let radix = match s.get(..2)? {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    let digits = &s[2..];
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    i64::from_str_radix(digits, radix).ok()
}
