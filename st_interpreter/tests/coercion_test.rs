//! Declared-type storage and assignment coercion, end to end: the
//! expression's result type never decides the bucket, the declaration
//! does.

use pretty_assertions::assert_eq;
use rstest::rstest;
use st_interpreter::{create_runtime_state, initialize, run_scan, TagStore};
use st_parser::parse_source;

fn run_once(source: &str) -> TagStore {
    let unit = parse_source(source).expect("source should parse");
    let mut store = TagStore::new();
    initialize(&unit, &mut store).expect("initialization should succeed");
    let mut state = create_runtime_state(&unit);
    run_scan(&unit, &mut store, &mut state, 100).expect("scan should succeed");
    store
}

#[test]
fn test_integer_expression_stored_in_integer_bucket() {
    let store = run_once(
        r#"PROGRAM P
VAR
    result : INT;
END_VAR
result := 10 / 2;
END_PROGRAM"#,
    );
    assert_eq!(store.get_int("result"), Some(5));
    assert_eq!(store.get_real("result"), None);
    assert_eq!(store.get_bool("result"), None);
}

#[test]
fn test_integer_division_then_real_storage() {
    // 7 / 2 is integer division; only the store coerces to REAL
    let store = run_once(
        r#"PROGRAM P
VAR
    r : REAL;
END_VAR
r := 7 / 2;
END_PROGRAM"#,
    );
    assert_eq!(store.get_real("r"), Some(3.0));
}

#[test]
fn test_real_division_keeps_the_fraction() {
    let store = run_once(
        r#"PROGRAM P
VAR
    r : REAL;
END_VAR
r := 7.0 / 2;
END_PROGRAM"#,
    );
    assert_eq!(store.get_real("r"), Some(3.5));
}

#[rstest]
#[case("3.7", 3)]
#[case("-3.7", -3)]
#[case("2.5", 2)]
#[case("-2.5", -2)]
fn test_real_into_int_truncates_toward_zero(#[case] literal: &str, #[case] expected: i64) {
    let store = run_once(&format!(
        r#"PROGRAM P
VAR
    v : INT;
END_VAR
v := {};
END_PROGRAM"#,
        literal
    ));
    assert_eq!(store.get_int("v"), Some(expected));
}

#[test]
fn test_int_into_bool_is_nonzero_test() {
    let store = run_once(
        r#"PROGRAM P
VAR
    n : INT := 5;
    z : INT := 0;
    a : BOOL;
    b : BOOL;
END_VAR
a := n;
b := z;
END_PROGRAM"#,
    );
    assert_eq!(store.get_bool("a"), Some(true));
    assert_eq!(store.get_bool("b"), Some(false));
}

#[test]
fn test_bool_into_numeric_buckets() {
    let store = run_once(
        r#"PROGRAM P
VAR
    flag : BOOL := TRUE;
    n : INT;
    r : REAL;
    s : STRING;
END_VAR
n := flag;
r := flag;
s := flag;
END_PROGRAM"#,
    );
    assert_eq!(store.get_int("n"), Some(1));
    assert_eq!(store.get_real("r"), Some(1.0));
    assert_eq!(store.get_string("s"), Some("TRUE"));
}

#[test]
fn test_string_parses_into_numeric_buckets() {
    let store = run_once(
        r#"PROGRAM P
VAR
    good : INT;
    bad : INT;
    ratio : REAL;
END_VAR
good := '42';
bad := 'not a number';
ratio := '2.5';
END_PROGRAM"#,
    );
    assert_eq!(store.get_int("good"), Some(42));
    assert_eq!(store.get_int("bad"), Some(0));
    assert_eq!(store.get_real("ratio"), Some(2.5));
}

#[test]
fn test_numeric_into_time_bucket() {
    let store = run_once(
        r#"PROGRAM P
VAR
    a : TIME;
    b : TIME;
END_VAR
a := 1500;
b := 2.9;
END_PROGRAM"#,
    );
    assert_eq!(store.get_time("a"), Some(1500));
    assert_eq!(store.get_time("b"), Some(2));
}

#[test]
fn test_time_arithmetic_stays_time() {
    let store = run_once(
        r#"PROGRAM P
VAR
    total : TIME;
    shortfall : TIME;
END_VAR
total := T#1s + T#500ms;
shortfall := T#100ms - T#400ms;
END_PROGRAM"#,
    );
    assert_eq!(store.get_time("total"), Some(1500));
    // TIME is non-negative; subtraction saturates
    assert_eq!(store.get_time("shortfall"), Some(0));
}

#[test]
fn test_values_render_into_string_bucket() {
    let store = run_once(
        r#"PROGRAM P
VAR
    a : STRING;
    b : STRING;
    c : STRING;
END_VAR
a := 3.7;
b := 42;
c := T#500ms;
END_PROGRAM"#,
    );
    assert_eq!(store.get_string("a"), Some("3.7"));
    assert_eq!(store.get_string("b"), Some("42"));
    assert_eq!(store.get_string("c"), Some("500"));
}

#[test]
fn test_dint_shares_the_integer_bucket() {
    let store = run_once(
        r#"PROGRAM P
VAR
    wide : DINT := 100000;
    narrow : INT := 7;
END_VAR
wide := wide * 2;
narrow := wide;
END_PROGRAM"#,
    );
    assert_eq!(store.get_int("wide"), Some(200_000));
    assert_eq!(store.get_int("narrow"), Some(200_000));
}

#[test]
fn test_integer_power_and_real_power() {
    let store = run_once(
        r#"PROGRAM P
VAR
    n : INT;
    r : REAL;
END_VAR
n := 2 ** 10;
r := 2 ** -1;
END_PROGRAM"#,
    );
    assert_eq!(store.get_int("n"), Some(1024));
    assert_eq!(store.get_real("r"), Some(0.5));
}

#[test]
fn test_bitwise_logic_on_integers() {
    let store = run_once(
        r#"PROGRAM P
VAR
    a : INT;
    b : INT;
    c : INT;
END_VAR
a := 12 AND 10;
b := 12 OR 10;
c := 12 XOR 10;
END_PROGRAM"#,
    );
    assert_eq!(store.get_int("a"), Some(8));
    assert_eq!(store.get_int("b"), Some(14));
    assert_eq!(store.get_int("c"), Some(6));
}

#[test]
fn test_string_comparison_by_code_point() {
    let store = run_once(
        r#"PROGRAM P
VAR
    before : BOOL;
    same : BOOL;
END_VAR
before := 'abc' < 'abd';
same := 'abc' = 'abc';
END_PROGRAM"#,
    );
    assert_eq!(store.get_bool("before"), Some(true));
    assert_eq!(store.get_bool("same"), Some(true));
}

#[test]
fn test_array_elements_coerce_to_element_type() {
    let store = run_once(
        r#"PROGRAM P
VAR
    readings : ARRAY[0..3] OF INT := [1, 2, 3, 4];
    sum : INT;
    i : INT;
END_VAR
readings[0] := 9.7;
FOR i := 0 TO 3 DO
    sum := sum + readings[i];
END_FOR;
END_PROGRAM"#,
    );
    // 9 + 2 + 3 + 4
    assert_eq!(store.get_int("sum"), Some(18));
}

#[test]
fn test_function_arguments_coerce_like_assignments() {
    let store = run_once(
        r#"FUNCTION Half : INT
VAR_INPUT
    n : INT;
END_VAR
Half := n / 2;
END_FUNCTION

PROGRAM P
VAR
    v : INT;
END_VAR
v := Half(9.9);
END_PROGRAM"#,
    );
    // 9.9 truncates to 9 on binding, then 9 / 2 = 4
    assert_eq!(store.get_int("v"), Some(4));
}
