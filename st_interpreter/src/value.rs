//! Runtime value representation and IEC 61131-3 coercion rules

use serde::{Deserialize, Serialize};
use st_parser::ast::DataType;
use std::cmp::Ordering;
use std::fmt;

/// Values produced by expression evaluation
///
/// TIME is kept as non-negative whole milliseconds. REAL uses f64, so
/// IEEE-754 NaN and infinities are representable and storable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(f64),
    Time(u64),
    Str(String),
}

/// The five scalar storage kinds of the tag store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Int,
    Real,
    Time,
    Str,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "BOOL"),
            ValueKind::Int => write!(f, "INT"),
            ValueKind::Real => write!(f, "REAL"),
            ValueKind::Time => write!(f, "TIME"),
            ValueKind::Str => write!(f, "STRING"),
        }
    }
}

/// Errors from value-level operations; the evaluator maps these onto
/// spanned interpreter errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    DivisionByZero,
    Mismatch(String),
}

impl ValueError {
    fn mismatch(op: &str, a: &Value, b: &Value) -> Self {
        ValueError::Mismatch(format!(
            "cannot apply '{}' to {} and {}",
            op,
            a.type_name(),
            b.type_name()
        ))
    }
}

/// The scalar kind a declared type stores under, if it is scalar
pub fn kind_of_type(data_type: &DataType) -> Option<ValueKind> {
    match data_type {
        DataType::Bool => Some(ValueKind::Bool),
        DataType::Int | DataType::Dint => Some(ValueKind::Int),
        DataType::Real => Some(ValueKind::Real),
        DataType::Time => Some(ValueKind::Time),
        DataType::StringType => Some(ValueKind::Str),
        DataType::Array { .. } | DataType::Named(_) => None,
    }
}

/// The default value seeded for an uninitialized declaration
pub fn default_of(kind: ValueKind) -> Value {
    match kind {
        ValueKind::Bool => Value::Bool(false),
        ValueKind::Int => Value::Int(0),
        ValueKind::Real => Value::Real(0.0),
        ValueKind::Time => Value::Time(0),
        ValueKind::Str => Value::Str(String::new()),
    }
}

/// Coerce an evaluated value to a declared storage kind
///
/// This is the assignment table: the declared type of the target, not
/// the value's current tag, decides the conversion. Real-to-integer
/// truncates toward zero; real-to-time floors; string parses fall back
/// to the kind's zero value.
pub fn coerce(value: Value, target: ValueKind) -> Result<Value, ValueError> {
    let coerced = match (target, value) {
        (ValueKind::Bool, Value::Bool(b)) => Value::Bool(b),
        (ValueKind::Bool, Value::Int(v)) => Value::Bool(v != 0),
        (ValueKind::Bool, Value::Real(v)) => Value::Bool(v != 0.0),
        (ValueKind::Bool, Value::Str(s)) => {
            let upper = s.trim().to_ascii_uppercase();
            Value::Bool(upper == "TRUE" || upper == "1")
        }

        (ValueKind::Int, Value::Bool(b)) => Value::Int(if b { 1 } else { 0 }),
        (ValueKind::Int, Value::Int(v)) => Value::Int(v),
        (ValueKind::Int, Value::Real(v)) => Value::Int(truncate_toward_zero(v)),
        (ValueKind::Int, Value::Str(s)) => Value::Int(parse_int_lenient(&s)),

        (ValueKind::Real, Value::Bool(b)) => Value::Real(if b { 1.0 } else { 0.0 }),
        (ValueKind::Real, Value::Int(v)) => Value::Real(v as f64),
        (ValueKind::Real, Value::Real(v)) => Value::Real(v),
        (ValueKind::Real, Value::Str(s)) => Value::Real(s.trim().parse().unwrap_or(0.0)),

        (ValueKind::Time, Value::Int(v)) => Value::Time(v.max(0) as u64),
        (ValueKind::Time, Value::Real(v)) => Value::Time(v.floor().max(0.0) as u64),
        (ValueKind::Time, Value::Time(ms)) => Value::Time(ms),
        (ValueKind::Time, Value::Str(s)) => Value::Time(s.trim().parse().unwrap_or(0)),

        (ValueKind::Str, Value::Bool(b)) => {
            Value::Str(if b { "TRUE" } else { "FALSE" }.to_string())
        }
        (ValueKind::Str, Value::Int(v)) => Value::Str(v.to_string()),
        (ValueKind::Str, Value::Real(v)) => Value::Str(v.to_string()),
        (ValueKind::Str, Value::Time(ms)) => Value::Str(ms.to_string()),
        (ValueKind::Str, Value::Str(s)) => Value::Str(s),

        (target, value) => {
            return Err(ValueError::Mismatch(format!(
                "cannot store {} into {}",
                value.type_name(),
                target
            )))
        }
    };
    Ok(coerced)
}

/// Truncation toward zero, the mandated REAL -> integer rule
pub fn truncate_toward_zero(v: f64) -> i64 {
    v.trunc() as i64
}

fn parse_int_lenient(s: &str) -> i64 {
    let trimmed = s.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return v;
    }
    trimmed
        .parse::<f64>()
        .map(truncate_toward_zero)
        .unwrap_or(0)
}

impl Value {
    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "BOOL",
            Value::Int(_) => "INT",
            Value::Real(_) => "REAL",
            Value::Time(_) => "TIME",
            Value::Str(_) => "STRING",
        }
    }

    /// The storage kind this value's tag corresponds to
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Real(_) => ValueKind::Real,
            Value::Time(_) => ValueKind::Time,
            Value::Str(_) => ValueKind::Str,
        }
    }

    /// Strict BOOL accessor
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Strict integer accessor
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Perform arithmetic addition with IEC promotion
    pub fn add(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a + b)),
            (Value::Int(a), Value::Real(b)) => Ok(Value::Real(*a as f64 + b)),
            (Value::Real(a), Value::Int(b)) => Ok(Value::Real(a + *b as f64)),
            (Value::Time(a), Value::Time(b)) => Ok(Value::Time(a.saturating_add(*b))),
            _ => Err(ValueError::mismatch("+", self, other)),
        }
    }

    /// Perform arithmetic subtraction; TIME stays non-negative
    pub fn subtract(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
            (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a - b)),
            (Value::Int(a), Value::Real(b)) => Ok(Value::Real(*a as f64 - b)),
            (Value::Real(a), Value::Int(b)) => Ok(Value::Real(a - *b as f64)),
            (Value::Time(a), Value::Time(b)) => Ok(Value::Time(a.saturating_sub(*b))),
            _ => Err(ValueError::mismatch("-", self, other)),
        }
    }

    /// Perform arithmetic multiplication
    pub fn multiply(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
            (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a * b)),
            (Value::Int(a), Value::Real(b)) => Ok(Value::Real(*a as f64 * b)),
            (Value::Real(a), Value::Int(b)) => Ok(Value::Real(a * *b as f64)),
            _ => Err(ValueError::mismatch("*", self, other)),
        }
    }

    /// Perform division
    ///
    /// Integer division truncates toward zero and fails on a zero
    /// divisor. REAL division by zero yields an IEEE infinity (or NaN
    /// for 0.0/0.0) without failing.
    pub fn divide(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(ValueError::DivisionByZero)
                } else {
                    Ok(Value::Int(a.wrapping_div(*b)))
                }
            }
            (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a / b)),
            (Value::Int(a), Value::Real(b)) => Ok(Value::Real(*a as f64 / b)),
            (Value::Real(a), Value::Int(b)) => Ok(Value::Real(a / *b as f64)),
            _ => Err(ValueError::mismatch("/", self, other)),
        }
    }

    /// Remainder; the sign follows the dividend
    pub fn modulo(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(ValueError::DivisionByZero)
                } else {
                    Ok(Value::Int(a.wrapping_rem(*b)))
                }
            }
            (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a % b)),
            (Value::Int(a), Value::Real(b)) => Ok(Value::Real(*a as f64 % b)),
            (Value::Real(a), Value::Int(b)) => Ok(Value::Real(a % *b as f64)),
            _ => Err(ValueError::mismatch("MOD", self, other)),
        }
    }

    /// Exponentiation; integer base with a non-negative integer
    /// exponent stays integer, every other combination is REAL
    pub fn power(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int(base), Value::Int(exp)) if *exp >= 0 => {
                match u32::try_from(*exp).ok().and_then(|e| base.checked_pow(e)) {
                    Some(v) => Ok(Value::Int(v)),
                    None => Ok(Value::Real((*base as f64).powf(*exp as f64))),
                }
            }
            (Value::Int(base), Value::Int(exp)) => {
                Ok(Value::Real((*base as f64).powf(*exp as f64)))
            }
            (Value::Real(base), Value::Real(exp)) => Ok(Value::Real(base.powf(*exp))),
            (Value::Int(base), Value::Real(exp)) => Ok(Value::Real((*base as f64).powf(*exp))),
            (Value::Real(base), Value::Int(exp)) => Ok(Value::Real(base.powf(*exp as f64))),
            _ => Err(ValueError::mismatch("**", self, other)),
        }
    }

    /// Equality per IEC rules; numeric operands promote, BOOL compares
    /// only with BOOL
    pub fn equals(&self, other: &Value) -> Result<bool, ValueError> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Real(a), Value::Real(b)) => Ok(a == b),
            (Value::Int(a), Value::Real(b)) => Ok(*a as f64 == *b),
            (Value::Real(a), Value::Int(b)) => Ok(*a == *b as f64),
            (Value::Time(a), Value::Time(b)) => Ok(a == b),
            (Value::Str(a), Value::Str(b)) => Ok(a == b),
            _ => Err(ValueError::mismatch("=", self, other)),
        }
    }

    /// Ordering comparison; `None` when IEEE says unordered (NaN)
    pub fn partial_compare(&self, other: &Value) -> Result<Option<Ordering>, ValueError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(b))),
            (Value::Real(a), Value::Real(b)) => Ok(a.partial_cmp(b)),
            (Value::Int(a), Value::Real(b)) => Ok((*a as f64).partial_cmp(b)),
            (Value::Real(a), Value::Int(b)) => Ok(a.partial_cmp(&(*b as f64))),
            (Value::Time(a), Value::Time(b)) => Ok(Some(a.cmp(b))),
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            _ => Err(ValueError::mismatch("<", self, other)),
        }
    }

    /// Bitwise AND on integers; the evaluator handles the BOOL
    /// (short-circuit) form before reaching here
    pub fn bit_and(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a & b)),
            _ => Err(ValueError::mismatch("AND", self, other)),
        }
    }

    /// Bitwise OR on integers
    pub fn bit_or(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a | b)),
            _ => Err(ValueError::mismatch("OR", self, other)),
        }
    }

    /// XOR: logical on BOOL, bitwise on integers; never short-circuits
    pub fn xor(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a ^ b)),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a ^ b)),
            _ => Err(ValueError::mismatch("XOR", self, other)),
        }
    }

    /// Arithmetic negation
    pub fn negate(&self) -> Result<Value, ValueError> {
        match self {
            Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
            Value::Real(v) => Ok(Value::Real(-v)),
            _ => Err(ValueError::Mismatch(format!(
                "cannot negate {}",
                self.type_name()
            ))),
        }
    }

    /// NOT: logical on BOOL, bitwise complement on integers
    pub fn not(&self) -> Result<Value, ValueError> {
        match self {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::Int(v) => Ok(Value::Int(!v)),
            _ => Err(ValueError::Mismatch(format!(
                "cannot apply NOT to {}",
                self.type_name()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Int(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Time(ms) => write!(f, "T#{}ms", ms),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(3.7, 3 ; "positive fraction")]
    #[test_case(-3.7, -3 ; "negative fraction")]
    #[test_case(2.5, 2 ; "half rounds toward zero")]
    #[test_case(-2.5, -2 ; "negative half rounds toward zero")]
    fn test_truncation_toward_zero(input: f64, expected: i64) {
        assert_eq!(truncate_toward_zero(input), expected);
        assert_eq!(
            coerce(Value::Real(input), ValueKind::Int),
            Ok(Value::Int(expected))
        );
    }

    #[test]
    fn test_mixed_arithmetic_promotes_to_real() {
        let sum = Value::Int(1).add(&Value::Real(2.5)).unwrap();
        assert_eq!(sum, Value::Real(3.5));
        let product = Value::Real(2.0).multiply(&Value::Int(3)).unwrap();
        assert_eq!(product, Value::Real(6.0));
    }

    #[test]
    fn test_integer_division_truncates_toward_zero() {
        assert_eq!(Value::Int(7).divide(&Value::Int(2)), Ok(Value::Int(3)));
        assert_eq!(Value::Int(-7).divide(&Value::Int(2)), Ok(Value::Int(-3)));
        assert_eq!(Value::Int(7).divide(&Value::Int(-2)), Ok(Value::Int(-3)));
    }

    #[test]
    fn test_integer_division_by_zero_fails() {
        assert_eq!(
            Value::Int(1).divide(&Value::Int(0)),
            Err(ValueError::DivisionByZero)
        );
        assert_eq!(
            Value::Int(1).modulo(&Value::Int(0)),
            Err(ValueError::DivisionByZero)
        );
    }

    #[test]
    fn test_real_division_by_zero_is_ieee() {
        let Value::Real(inf) = Value::Real(1.0).divide(&Value::Real(0.0)).unwrap() else {
            panic!("expected REAL");
        };
        assert!(inf.is_infinite() && inf.is_sign_positive());
        let Value::Real(nan) = Value::Real(0.0).divide(&Value::Real(0.0)).unwrap() else {
            panic!("expected REAL");
        };
        assert!(nan.is_nan());
    }

    #[test_case(7, 3, 1 ; "positive dividend")]
    #[test_case(-7, 3, -1 ; "negative dividend keeps sign")]
    #[test_case(7, -3, 1 ; "negative divisor ignored")]
    fn test_mod_sign_follows_dividend(a: i64, b: i64, expected: i64) {
        assert_eq!(Value::Int(a).modulo(&Value::Int(b)), Ok(Value::Int(expected)));
    }

    #[test]
    fn test_integer_power_stays_integer() {
        assert_eq!(Value::Int(2).power(&Value::Int(10)), Ok(Value::Int(1024)));
    }

    #[test]
    fn test_negative_exponent_promotes_to_real() {
        assert_eq!(Value::Int(2).power(&Value::Int(-1)), Ok(Value::Real(0.5)));
    }

    #[test]
    fn test_time_is_closed_under_add_and_sub() {
        assert_eq!(
            Value::Time(400).add(&Value::Time(100)),
            Ok(Value::Time(500))
        );
        assert_eq!(
            Value::Time(100).subtract(&Value::Time(400)),
            Ok(Value::Time(0))
        );
        assert!(Value::Time(100).add(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_string_comparison_is_lexicographic() {
        let ord = Value::Str("abc".into())
            .partial_compare(&Value::Str("abd".into()))
            .unwrap();
        assert_eq!(ord, Some(Ordering::Less));
    }

    #[test]
    fn test_bool_does_not_order() {
        assert!(Value::Bool(true)
            .partial_compare(&Value::Bool(false))
            .is_err());
    }

    #[test]
    fn test_coerce_bool_from_string_is_case_insensitive() {
        assert_eq!(
            coerce(Value::Str("tRuE".into()), ValueKind::Bool),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            coerce(Value::Str("0".into()), ValueKind::Bool),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn test_coerce_string_parse_failure_falls_back_to_zero() {
        assert_eq!(
            coerce(Value::Str("garbage".into()), ValueKind::Int),
            Ok(Value::Int(0))
        );
        assert_eq!(
            coerce(Value::Str("garbage".into()), ValueKind::Real),
            Ok(Value::Real(0.0))
        );
    }

    #[test]
    fn test_coerce_real_to_time_floors() {
        assert_eq!(
            coerce(Value::Real(99.9), ValueKind::Time),
            Ok(Value::Time(99))
        );
        assert_eq!(
            coerce(Value::Real(-5.0), ValueKind::Time),
            Ok(Value::Time(0))
        );
    }

    #[test]
    fn test_coerce_time_into_numeric_is_a_mismatch() {
        assert!(coerce(Value::Time(5), ValueKind::Int).is_err());
        assert!(coerce(Value::Bool(true), ValueKind::Time).is_err());
    }

    #[test]
    fn test_coerce_to_string_renders() {
        assert_eq!(
            coerce(Value::Bool(true), ValueKind::Str),
            Ok(Value::Str("TRUE".into()))
        );
        assert_eq!(
            coerce(Value::Real(3.7), ValueKind::Str),
            Ok(Value::Str("3.7".into()))
        );
        assert_eq!(
            coerce(Value::Time(500), ValueKind::Str),
            Ok(Value::Str("500".into()))
        );
    }

    #[test]
    fn test_nan_and_infinity_are_storable() {
        let stored = coerce(Value::Real(f64::NAN), ValueKind::Real).unwrap();
        let Value::Real(v) = stored else {
            panic!("expected REAL");
        };
        assert!(v.is_nan());
    }
}
