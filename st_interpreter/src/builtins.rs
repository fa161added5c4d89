//! Built-in function library
//!
//! ABS, the REAL transcendentals, MIN/MAX/LIMIT, TRUNC, the X_TO_Y
//! conversion family and a handful of string functions. Numeric domain
//! errors follow IEEE-754: `SQRT(-1)` is NaN and `LN(0)` is negative
//! infinity; nothing here makes a scan fatal except calling with the
//! wrong argument count or an unconvertible type.

use crate::errors::{InterpreterError, InterpreterResult};
use crate::value::{coerce, truncate_toward_zero, Value, ValueKind};
use st_common::Span;
use std::collections::HashMap;

/// Type signature for built-in functions
pub type BuiltinFunction = fn(&[Value], Span) -> InterpreterResult<Value>;

/// Registry of built-in functions, keyed by upper-cased name
pub struct BuiltinRegistry {
    functions: HashMap<String, (BuiltinFunction, usize)>, // (function, arity)
}

impl BuiltinRegistry {
    /// Create a new registry with the full standard set
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        // Numeric
        registry.register("ABS", builtin_abs, 1);
        registry.register("SQRT", builtin_sqrt, 1);
        registry.register("SIN", builtin_sin, 1);
        registry.register("COS", builtin_cos, 1);
        registry.register("TAN", builtin_tan, 1);
        registry.register("ASIN", builtin_asin, 1);
        registry.register("ACOS", builtin_acos, 1);
        registry.register("ATAN", builtin_atan, 1);
        registry.register("LN", builtin_ln, 1);
        registry.register("LOG", builtin_log, 1);
        registry.register("EXP", builtin_exp, 1);

        // Selection
        registry.register("MIN", builtin_min, 2);
        registry.register("MAX", builtin_max, 2);
        registry.register("LIMIT", builtin_limit, 3);

        // Conversion
        registry.register("TRUNC", builtin_trunc, 1);
        for name in ["INT_TO_BOOL", "DINT_TO_BOOL", "REAL_TO_BOOL", "STRING_TO_BOOL"] {
            registry.register(name, builtin_to_bool, 1);
        }
        for name in [
            "BOOL_TO_INT",
            "REAL_TO_INT",
            "STRING_TO_INT",
            "DINT_TO_INT",
            "INT_TO_DINT",
            "BOOL_TO_DINT",
            "REAL_TO_DINT",
            "STRING_TO_DINT",
        ] {
            registry.register(name, builtin_to_int, 1);
        }
        for name in ["BOOL_TO_REAL", "INT_TO_REAL", "DINT_TO_REAL", "STRING_TO_REAL"] {
            registry.register(name, builtin_to_real, 1);
        }
        for name in ["INT_TO_TIME", "DINT_TO_TIME", "REAL_TO_TIME", "STRING_TO_TIME"] {
            registry.register(name, builtin_to_time, 1);
        }
        for name in [
            "BOOL_TO_STRING",
            "INT_TO_STRING",
            "DINT_TO_STRING",
            "REAL_TO_STRING",
            "TIME_TO_STRING",
        ] {
            registry.register(name, builtin_to_string, 1);
        }

        // Strings
        registry.register("LEN", builtin_len, 1);
        registry.register("CONCAT", builtin_concat, 2);
        registry.register("LEFT", builtin_left, 2);
        registry.register("RIGHT", builtin_right, 2);
        registry.register("MID", builtin_mid, 3);

        registry
    }

    fn register(&mut self, name: &str, function: BuiltinFunction, arity: usize) {
        self.functions.insert(name.to_string(), (function, arity));
    }

    /// Check if an upper-cased name is a built-in
    pub fn is_builtin(&self, upper_name: &str) -> bool {
        self.functions.contains_key(upper_name)
    }

    /// Call a built-in by upper-cased name
    pub fn call(&self, upper_name: &str, args: &[Value], span: Span) -> InterpreterResult<Value> {
        let (function, expected_arity) = self
            .functions
            .get(upper_name)
            .ok_or_else(|| InterpreterError::unknown_function(upper_name, span))?;
        if args.len() != *expected_arity {
            return Err(InterpreterError::argument_count_mismatch(
                upper_name,
                *expected_arity,
                args.len(),
                span,
            ));
        }
        function(args, span)
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Argument helpers

fn numeric_arg(value: &Value, span: Span) -> InterpreterResult<f64> {
    match value {
        Value::Int(v) => Ok(*v as f64),
        Value::Real(v) => Ok(*v),
        other => Err(InterpreterError::type_mismatch(
            format!("expected a numeric argument, got {}", other.type_name()),
            span,
        )),
    }
}

fn string_arg(value: &Value, span: Span) -> InterpreterResult<String> {
    match coerce(value.clone(), ValueKind::Str) {
        Ok(Value::Str(s)) => Ok(s),
        _ => Err(InterpreterError::type_mismatch(
            format!("expected a string argument, got {}", value.type_name()),
            span,
        )),
    }
}

fn int_arg(value: &Value, span: Span) -> InterpreterResult<i64> {
    value.as_int().ok_or_else(|| {
        InterpreterError::type_mismatch(
            format!("expected an integer argument, got {}", value.type_name()),
            span,
        )
    })
}

fn convert(value: &Value, target: ValueKind, span: Span) -> InterpreterResult<Value> {
    coerce(value.clone(), target).map_err(|_| {
        InterpreterError::type_mismatch(
            format!("no conversion from {} to {}", value.type_name(), target),
            span,
        )
    })
}

// Built-in implementations

fn builtin_abs(args: &[Value], span: Span) -> InterpreterResult<Value> {
    match &args[0] {
        Value::Int(v) => Ok(Value::Int(v.wrapping_abs())),
        Value::Real(v) => Ok(Value::Real(v.abs())),
        other => Err(InterpreterError::type_mismatch(
            format!("ABS expects a numeric argument, got {}", other.type_name()),
            span,
        )),
    }
}

fn builtin_sqrt(args: &[Value], span: Span) -> InterpreterResult<Value> {
    Ok(Value::Real(numeric_arg(&args[0], span)?.sqrt()))
}

fn builtin_sin(args: &[Value], span: Span) -> InterpreterResult<Value> {
    Ok(Value::Real(numeric_arg(&args[0], span)?.sin()))
}

fn builtin_cos(args: &[Value], span: Span) -> InterpreterResult<Value> {
    Ok(Value::Real(numeric_arg(&args[0], span)?.cos()))
}

fn builtin_tan(args: &[Value], span: Span) -> InterpreterResult<Value> {
    Ok(Value::Real(numeric_arg(&args[0], span)?.tan()))
}

fn builtin_asin(args: &[Value], span: Span) -> InterpreterResult<Value> {
    Ok(Value::Real(numeric_arg(&args[0], span)?.asin()))
}

fn builtin_acos(args: &[Value], span: Span) -> InterpreterResult<Value> {
    Ok(Value::Real(numeric_arg(&args[0], span)?.acos()))
}

fn builtin_atan(args: &[Value], span: Span) -> InterpreterResult<Value> {
    Ok(Value::Real(numeric_arg(&args[0], span)?.atan()))
}

fn builtin_ln(args: &[Value], span: Span) -> InterpreterResult<Value> {
    Ok(Value::Real(numeric_arg(&args[0], span)?.ln()))
}

fn builtin_log(args: &[Value], span: Span) -> InterpreterResult<Value> {
    Ok(Value::Real(numeric_arg(&args[0], span)?.log10()))
}

fn builtin_exp(args: &[Value], span: Span) -> InterpreterResult<Value> {
    Ok(Value::Real(numeric_arg(&args[0], span)?.exp()))
}

/// Type-preserving on matching operand types, REAL-promoting when mixed
fn builtin_min(args: &[Value], span: Span) -> InterpreterResult<Value> {
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(*a.min(b))),
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a.min(*b))),
        (Value::Time(a), Value::Time(b)) => Ok(Value::Time(*a.min(b))),
        _ => {
            let a = numeric_arg(&args[0], span)?;
            let b = numeric_arg(&args[1], span)?;
            Ok(Value::Real(a.min(b)))
        }
    }
}

fn builtin_max(args: &[Value], span: Span) -> InterpreterResult<Value> {
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(*a.max(b))),
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a.max(*b))),
        (Value::Time(a), Value::Time(b)) => Ok(Value::Time(*a.max(b))),
        _ => {
            let a = numeric_arg(&args[0], span)?;
            let b = numeric_arg(&args[1], span)?;
            Ok(Value::Real(a.max(b)))
        }
    }
}

/// LIMIT(MN, IN, MX) clamps IN into the closed range
fn builtin_limit(args: &[Value], span: Span) -> InterpreterResult<Value> {
    let low = builtin_max(&[args[0].clone(), args[1].clone()], span)?;
    builtin_min(&[low, args[2].clone()], span)
}

fn builtin_trunc(args: &[Value], span: Span) -> InterpreterResult<Value> {
    match &args[0] {
        Value::Real(v) => Ok(Value::Int(truncate_toward_zero(*v))),
        Value::Int(v) => Ok(Value::Int(*v)),
        other => Err(InterpreterError::type_mismatch(
            format!("TRUNC expects a numeric argument, got {}", other.type_name()),
            span,
        )),
    }
}

fn builtin_to_bool(args: &[Value], span: Span) -> InterpreterResult<Value> {
    convert(&args[0], ValueKind::Bool, span)
}

fn builtin_to_int(args: &[Value], span: Span) -> InterpreterResult<Value> {
    convert(&args[0], ValueKind::Int, span)
}

fn builtin_to_real(args: &[Value], span: Span) -> InterpreterResult<Value> {
    convert(&args[0], ValueKind::Real, span)
}

fn builtin_to_time(args: &[Value], span: Span) -> InterpreterResult<Value> {
    convert(&args[0], ValueKind::Time, span)
}

fn builtin_to_string(args: &[Value], span: Span) -> InterpreterResult<Value> {
    convert(&args[0], ValueKind::Str, span)
}

fn builtin_len(args: &[Value], span: Span) -> InterpreterResult<Value> {
    let s = string_arg(&args[0], span)?;
    Ok(Value::Int(s.chars().count() as i64))
}

fn builtin_concat(args: &[Value], span: Span) -> InterpreterResult<Value> {
    let mut a = string_arg(&args[0], span)?;
    let b = string_arg(&args[1], span)?;
    a.push_str(&b);
    Ok(Value::Str(a))
}

fn builtin_left(args: &[Value], span: Span) -> InterpreterResult<Value> {
    let s = string_arg(&args[0], span)?;
    let n = int_arg(&args[1], span)?.max(0) as usize;
    Ok(Value::Str(s.chars().take(n).collect()))
}

fn builtin_right(args: &[Value], span: Span) -> InterpreterResult<Value> {
    let s = string_arg(&args[0], span)?;
    let n = int_arg(&args[1], span)?.max(0) as usize;
    let total = s.chars().count();
    Ok(Value::Str(s.chars().skip(total.saturating_sub(n)).collect()))
}

/// MID(IN, L, P): L characters starting at 1-based position P
fn builtin_mid(args: &[Value], span: Span) -> InterpreterResult<Value> {
    let s = string_arg(&args[0], span)?;
    let len = int_arg(&args[1], span)?.max(0) as usize;
    let pos = int_arg(&args[2], span)?.max(1) as usize;
    Ok(Value::Str(s.chars().skip(pos - 1).take(len).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn call(name: &str, args: &[Value]) -> Value {
        BuiltinRegistry::new()
            .call(name, args, Span::default())
            .expect("builtin call should succeed")
    }

    fn call_real(name: &str, args: &[Value]) -> f64 {
        match call(name, args) {
            Value::Real(v) => v,
            other => panic!("expected REAL from {}, got {:?}", name, other),
        }
    }

    #[test]
    fn test_abs_is_type_preserving() {
        assert_eq!(call("ABS", &[Value::Int(-5)]), Value::Int(5));
        assert_eq!(call("ABS", &[Value::Real(-2.5)]), Value::Real(2.5));
    }

    #[test]
    fn test_abs_of_int_minimum_widens() {
        assert_eq!(call("ABS", &[Value::Int(-32768)]), Value::Int(32768));
    }

    #[test]
    fn test_domain_errors_yield_nan() {
        assert!(call_real("SQRT", &[Value::Real(-1.0)]).is_nan());
        assert!(call_real("LN", &[Value::Real(-1.0)]).is_nan());
        assert!(call_real("ASIN", &[Value::Real(2.0)]).is_nan());
        assert!(call_real("ACOS", &[Value::Real(1.5)]).is_nan());
    }

    #[test]
    fn test_ln_of_zero_is_negative_infinity() {
        let v = call_real("LN", &[Value::Real(0.0)]);
        assert!(v.is_infinite() && v.is_sign_negative());
    }

    #[test]
    fn test_log_is_base_ten() {
        assert!((call_real("LOG", &[Value::Real(1000.0)]) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_max_type_preserving_and_promoting() {
        assert_eq!(call("MIN", &[Value::Int(3), Value::Int(7)]), Value::Int(3));
        assert_eq!(
            call("MAX", &[Value::Time(100), Value::Time(400)]),
            Value::Time(400)
        );
        assert_eq!(
            call("MIN", &[Value::Int(3), Value::Real(2.5)]),
            Value::Real(2.5)
        );
    }

    #[test]
    fn test_limit_clamps() {
        assert_eq!(
            call("LIMIT", &[Value::Int(0), Value::Int(12), Value::Int(10)]),
            Value::Int(10)
        );
        assert_eq!(
            call("LIMIT", &[Value::Int(0), Value::Int(-3), Value::Int(10)]),
            Value::Int(0)
        );
        assert_eq!(
            call("LIMIT", &[Value::Int(0), Value::Int(5), Value::Int(10)]),
            Value::Int(5)
        );
    }

    #[test]
    fn test_trunc_truncates_toward_zero() {
        assert_eq!(call("TRUNC", &[Value::Real(3.9)]), Value::Int(3));
        assert_eq!(call("TRUNC", &[Value::Real(-3.9)]), Value::Int(-3));
    }

    #[test]
    fn test_string_to_bool_accepts_spellings() {
        assert_eq!(
            call("STRING_TO_BOOL", &[Value::Str("true".into())]),
            Value::Bool(true)
        );
        assert_eq!(
            call("STRING_TO_BOOL", &[Value::Str("1".into())]),
            Value::Bool(true)
        );
        assert_eq!(
            call("STRING_TO_BOOL", &[Value::Str("FALSE".into())]),
            Value::Bool(false)
        );
        assert_eq!(
            call("STRING_TO_BOOL", &[Value::Str("0".into())]),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_conversion_follows_assignment_table() {
        assert_eq!(call("REAL_TO_INT", &[Value::Real(-3.7)]), Value::Int(-3));
        assert_eq!(call("INT_TO_TIME", &[Value::Int(1500)]), Value::Time(1500));
        assert_eq!(
            call("TIME_TO_STRING", &[Value::Time(500)]),
            Value::Str("500".into())
        );
        assert_eq!(
            call("BOOL_TO_STRING", &[Value::Bool(false)]),
            Value::Str("FALSE".into())
        );
    }

    #[test]
    fn test_wrong_arity_is_an_error() {
        let result = BuiltinRegistry::new().call("MIN", &[Value::Int(1)], Span::default());
        assert!(matches!(
            result,
            Err(InterpreterError::ArgumentCountMismatch { .. })
        ));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call("LEN", &[Value::Str("motor".into())]), Value::Int(5));
        assert_eq!(
            call("CONCAT", &[Value::Str("ab".into()), Value::Str("cd".into())]),
            Value::Str("abcd".into())
        );
        assert_eq!(
            call("LEFT", &[Value::Str("sensor".into()), Value::Int(3)]),
            Value::Str("sen".into())
        );
        assert_eq!(
            call("RIGHT", &[Value::Str("sensor".into()), Value::Int(3)]),
            Value::Str("sor".into())
        );
        assert_eq!(
            call(
                "MID",
                &[Value::Str("conveyor".into()), Value::Int(3), Value::Int(4)]
            ),
            Value::Str("vey".into())
        );
    }

    proptest! {
        #[test]
        fn prop_int_to_real_round_trips(v in -1_000_000i64..1_000_000) {
            let real = call("INT_TO_REAL", &[Value::Int(v)]);
            prop_assert_eq!(call("REAL_TO_INT", &[real]), Value::Int(v));
        }

        #[test]
        fn prop_exp_ln_round_trips(x in 1e-6f64..1e6) {
            let ln = call_real("LN", &[Value::Real(x)]);
            let back = call_real("EXP", &[Value::Real(ln)]);
            prop_assert!((back - x).abs() <= x * 1e-12);
        }

        #[test]
        fn prop_sin_cos_pythagorean(x in -1e3f64..1e3) {
            let s = call_real("SIN", &[Value::Real(x)]);
            let c = call_real("COS", &[Value::Real(x)]);
            prop_assert!((s * s + c * c - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_asin_inverts_sin_on_principal_range(
            x in -std::f64::consts::FRAC_PI_2..std::f64::consts::FRAC_PI_2
        ) {
            let s = call_real("SIN", &[Value::Real(x)]);
            let back = call_real("ASIN", &[Value::Real(s)]);
            prop_assert!((back - x).abs() < 1e-9);
        }
    }
}
