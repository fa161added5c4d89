//! Fatal and non-fatal error behavior: what aborts a scan, what the
//! store looks like afterwards, and what continues silently.

use pretty_assertions::assert_eq;
use st_interpreter::{
    create_runtime_state, initialize, run_scan, InterpreterError, RuntimeState, TagStore,
};
use st_parser::ast::CompilationUnit;
use st_parser::parse_source;

fn setup(source: &str) -> (CompilationUnit, TagStore, RuntimeState) {
    let unit = parse_source(source).expect("source should parse");
    let mut store = TagStore::new();
    initialize(&unit, &mut store).expect("initialization should succeed");
    let state = create_runtime_state(&unit);
    (unit, store, state)
}

#[test]
fn test_integer_division_by_zero_is_fatal() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    zero : INT;
    x : INT;
END_VAR
x := 1 / zero;
END_PROGRAM"#,
    );
    let result = run_scan(&unit, &mut store, &mut state, 100);
    assert!(matches!(
        result,
        Err(InterpreterError::DivisionByZero { .. })
    ));
}

#[test]
fn test_mod_by_zero_is_fatal() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    zero : INT;
    x : INT;
END_VAR
x := 7 MOD zero;
END_PROGRAM"#,
    );
    assert!(matches!(
        run_scan(&unit, &mut store, &mut state, 100),
        Err(InterpreterError::DivisionByZero { .. })
    ));
}

#[test]
fn test_real_division_by_zero_is_not_fatal() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    r : REAL;
    n : REAL;
END_VAR
r := 1.0 / 0.0;
n := 0.0 / 0.0;
END_PROGRAM"#,
    );
    run_scan(&unit, &mut store, &mut state, 100).expect("IEEE division never faults");
    let r = store.get_real("r").unwrap();
    assert!(r.is_infinite() && r.is_sign_positive());
    assert!(store.get_real("n").unwrap().is_nan());
}

#[test]
fn test_undeclared_read_is_fatal() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    x : INT;
END_VAR
x := nowhere;
END_PROGRAM"#,
    );
    let result = run_scan(&unit, &mut store, &mut state, 100);
    match result {
        Err(InterpreterError::UndeclaredVariable { name, .. }) => assert_eq!(name, "nowhere"),
        other => panic!("expected UndeclaredVariable, got {:?}", other),
    }
}

#[test]
fn test_undeclared_write_is_fatal() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    x : INT;
END_VAR
nowhere := x;
END_PROGRAM"#,
    );
    assert!(matches!(
        run_scan(&unit, &mut store, &mut state, 100),
        Err(InterpreterError::UndeclaredVariable { .. })
    ));
}

#[test]
fn test_storing_bool_into_time_is_a_type_mismatch() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    flag : BOOL := TRUE;
    window : TIME;
END_VAR
window := flag;
END_PROGRAM"#,
    );
    assert!(matches!(
        run_scan(&unit, &mut store, &mut state, 100),
        Err(InterpreterError::TypeMismatch { .. })
    ));
}

#[test]
fn test_mixing_time_with_numbers_is_a_type_mismatch() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    t : TIME := T#1s;
    x : TIME;
END_VAR
x := t + 5;
END_PROGRAM"#,
    );
    assert!(matches!(
        run_scan(&unit, &mut store, &mut state, 100),
        Err(InterpreterError::TypeMismatch { .. })
    ));
}

#[test]
fn test_fatal_error_keeps_earlier_effects() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    zero : INT;
    a : INT;
    b : INT;
END_VAR
a := 1;
b := 1 / zero;
b := 2;
END_PROGRAM"#,
    );
    assert!(run_scan(&unit, &mut store, &mut state, 100).is_err());
    // No rollback: the first statement's write stays
    assert_eq!(store.get_int("a"), Some(1));
    assert_eq!(store.get_int("b"), Some(0));
}

#[test]
fn test_scans_resume_after_a_fatal_error() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    divisor : INT;
    result : INT;
END_VAR
result := 100 / divisor;
END_PROGRAM"#,
    );
    assert!(run_scan(&unit, &mut store, &mut state, 100).is_err());

    store.set_int("divisor", 4);
    run_scan(&unit, &mut store, &mut state, 100).expect("later scans run normally");
    assert_eq!(store.get_int("result"), Some(25));
}

#[test]
fn test_array_access_out_of_bounds_is_silent() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    arr : ARRAY[0..2] OF INT := [1, 2, 3];
    ghost : INT;
END_VAR
arr[99] := 42;
ghost := arr[-1];
END_PROGRAM"#,
    );
    run_scan(&unit, &mut store, &mut state, 100).expect("bounds misses never fault");
    assert_eq!(store.get_int("ghost"), Some(0));
    assert_eq!(store.get_array_element("arr", 0), Some(st_interpreter::Value::Int(1)));
}

#[test]
fn test_numeric_domain_errors_are_silent() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    a : REAL;
    b : REAL;
END_VAR
a := SQRT(-1.0);
b := LN(0.0);
END_PROGRAM"#,
    );
    run_scan(&unit, &mut store, &mut state, 100).expect("domain errors never fault");
    assert!(store.get_real("a").unwrap().is_nan());
    let b = store.get_real("b").unwrap();
    assert!(b.is_infinite() && b.is_sign_negative());
}

#[test]
fn test_unknown_function_is_fatal() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    x : INT;
END_VAR
x := Mystery(1);
END_PROGRAM"#,
    );
    assert!(matches!(
        run_scan(&unit, &mut store, &mut state, 100),
        Err(InterpreterError::UnknownFunction { .. })
    ));
}

#[test]
fn test_runaway_recursion_hits_the_depth_limit() {
    let (unit, mut store, mut state) = setup(
        r#"FUNCTION Spiral : INT
VAR_INPUT
    n : INT;
END_VAR
Spiral := Spiral(n + 1);
END_FUNCTION

PROGRAM P
VAR
    x : INT;
END_VAR
x := Spiral(0);
END_PROGRAM"#,
    );
    assert!(matches!(
        run_scan(&unit, &mut store, &mut state, 100),
        Err(InterpreterError::CallDepthExceeded { .. })
    ));
}

#[test]
fn test_calling_an_fb_instance_as_expression_is_a_mismatch() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    t : TON;
    x : BOOL;
END_VAR
x := t(IN := TRUE, PT := T#1s);
END_PROGRAM"#,
    );
    assert!(matches!(
        run_scan(&unit, &mut store, &mut state, 100),
        Err(InterpreterError::TypeMismatch { .. })
    ));
}

#[test]
fn test_wrong_argument_count_is_fatal() {
    let (unit, mut store, mut state) = setup(
        r#"FUNCTION Twice : INT
VAR_INPUT
    n : INT;
END_VAR
Twice := n * 2;
END_FUNCTION

PROGRAM P
VAR
    x : INT;
END_VAR
x := Twice(1, 2);
END_PROGRAM"#,
    );
    assert!(matches!(
        run_scan(&unit, &mut store, &mut state, 100),
        Err(InterpreterError::ArgumentCountMismatch { .. })
    ));
}

#[test]
fn test_errors_carry_the_failing_span() {
    let (unit, mut store, mut state) = setup(
        r#"PROGRAM P
VAR
    zero : INT;
    x : INT;
END_VAR
x := 1 / zero;
END_PROGRAM"#,
    );
    let error = run_scan(&unit, &mut store, &mut state, 100).unwrap_err();
    let span = error.span().expect("scan errors name their site");
    assert_eq!(span.start.line, 6);
}
