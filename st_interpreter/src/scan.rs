//! Scan-cycle driver and variable initializer
//!
//! The host-facing surface: seed the tag store from declarations,
//! allocate the per-program runtime state, then run one scan at a time.
//! Each scan walks every PROGRAM body in source order; timers consume
//! the scan's elapsed time at their call sites.

use crate::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::Interpreter;
use crate::pou::{BistableKind, CounterKind, EdgeKind};
use crate::runtime::RuntimeState;
use crate::store::{ArrayMeta, FbInstance, FieldCell, TagStore};
use crate::value::{coerce, default_of, kind_of_type};
use log::{debug, trace};
use st_parser::ast::{CompilationUnit, DataType, Initializer, VarBlockKind, VarDecl};
use std::collections::HashMap;
use std::time::Instant;

/// Seed the tag store from every PROGRAM's declarations
///
/// Running this against a populated store re-seeds the declared
/// entries, which is the reset semantics: scalars return to their
/// declared initial values and FB instance records are recreated cold.
pub fn initialize(unit: &CompilationUnit, store: &mut TagStore) -> InterpreterResult<()> {
    let mut state = RuntimeState::new(unit);
    for program in unit.programs() {
        for block in &program.var_blocks {
            for decl in &block.declarations {
                init_declaration(store, &mut state, decl)?;
            }
        }
    }
    Ok(())
}

/// Allocate the per-program transient state
pub fn create_runtime_state(unit: &CompilationUnit) -> RuntimeState {
    RuntimeState::new(unit)
}

/// Execute one scan cycle: every PROGRAM body once, in source order
///
/// The tag store at scan end is a pure function of the store at scan
/// start, `delta_ms`, and whatever inputs the host wrote in between.
/// A fatal error aborts the scan; earlier statements' effects stay in
/// the store.
pub fn run_scan(
    unit: &CompilationUnit,
    store: &mut TagStore,
    state: &mut RuntimeState,
    delta_ms: u64,
) -> InterpreterResult<()> {
    debug!("scan start, delta {} ms", delta_ms);
    for program in unit.programs() {
        let mut interpreter = Interpreter::new(store, state, delta_ms);
        let flow = interpreter.execute_statements(&program.body)?;
        trace!("program '{}' finished with {:?}", program.name, flow);
    }
    Ok(())
}

/// Like [`run_scan`], with a host-imposed wall-clock budget
///
/// The scan always runs to completion; if it took longer than the
/// budget the host gets a fatal overrun after the fact.
pub fn run_scan_budgeted(
    unit: &CompilationUnit,
    store: &mut TagStore,
    state: &mut RuntimeState,
    delta_ms: u64,
    budget_ms: u64,
) -> InterpreterResult<()> {
    let started = Instant::now();
    run_scan(unit, store, state, delta_ms)?;
    if started.elapsed().as_millis() as u64 > budget_ms {
        return Err(InterpreterError::ScanOverrun { budget_ms });
    }
    Ok(())
}

fn init_declaration(
    store: &mut TagStore,
    state: &mut RuntimeState,
    decl: &VarDecl,
) -> InterpreterResult<()> {
    match &decl.data_type {
        DataType::Array { start, end, element } => {
            let elem_kind = kind_of_type(element).ok_or_else(|| {
                InterpreterError::type_mismatch(
                    format!("unsupported array element type {}", element),
                    decl.span,
                )
            })?;
            let values = match &decl.initial {
                None => Vec::new(),
                Some(Initializer::Array(exprs)) => {
                    let mut values = Vec::with_capacity(exprs.len());
                    for expr in exprs {
                        let evaluated =
                            Interpreter::new(store, state, 0).eval_expression(expr)?;
                        let coerced = coerce(evaluated, elem_kind).map_err(|_| {
                            InterpreterError::type_mismatch(
                                format!("array element initializer for '{}'", decl.name),
                                expr.span,
                            )
                        })?;
                        values.push(coerced);
                    }
                    values
                }
                Some(Initializer::Expr(expr)) => {
                    return Err(InterpreterError::type_mismatch(
                        format!(
                            "array '{}' needs a bracketed initializer list",
                            decl.name
                        ),
                        expr.span,
                    ));
                }
            };
            store.init_array(
                &decl.name,
                ArrayMeta {
                    start: *start,
                    end: *end,
                    elem_kind,
                },
                values,
            );
            Ok(())
        }
        DataType::Named(type_name) => init_instance(store, state, decl, type_name),
        scalar => {
            let kind = kind_of_type(scalar).expect("non-scalar types handled above");
            let value = match &decl.initial {
                None => default_of(kind),
                Some(Initializer::Expr(expr)) => {
                    let evaluated = Interpreter::new(store, state, 0).eval_expression(expr)?;
                    coerce(evaluated, kind).map_err(|_| {
                        InterpreterError::type_mismatch(
                            format!("initializer for '{}' does not fit {}", decl.name, kind),
                            expr.span,
                        )
                    })?
                }
                Some(Initializer::Array(_)) => {
                    return Err(InterpreterError::type_mismatch(
                        format!("'{}' is scalar but has an array initializer", decl.name),
                        decl.span,
                    ));
                }
            };
            store.write_scalar(&decl.name, value);
            Ok(())
        }
    }
}

/// Create the instance record for a function-block-typed declaration
///
/// Timer and counter presets stay 0 until the first call binds them.
fn init_instance(
    store: &mut TagStore,
    state: &mut RuntimeState,
    decl: &VarDecl,
    type_name: &str,
) -> InterpreterResult<()> {
    match type_name.to_ascii_uppercase().as_str() {
        "TON" => store.init_timer(&decl.name, 0),
        "CTU" => store.init_counter(&decl.name, CounterKind::Up),
        "CTD" => store.init_counter(&decl.name, CounterKind::Down),
        "CTUD" => store.init_counter(&decl.name, CounterKind::UpDown),
        "R_TRIG" => store.init_edge_detector(&decl.name, EdgeKind::Rising),
        "F_TRIG" => store.init_edge_detector(&decl.name, EdgeKind::Falling),
        "SR" => store.init_bistable(&decl.name, BistableKind::SetDominant),
        "RS" => store.init_bistable(&decl.name, BistableKind::ResetDominant),
        upper => {
            let fb = state.function_block(upper).cloned().ok_or_else(|| {
                InterpreterError::type_mismatch(
                    format!("unknown type '{}' for '{}'", type_name, decl.name),
                    decl.span,
                )
            })?;

            // Persistent fields: VAR_INPUT, VAR_OUTPUT and VAR.
            // VAR_TEMP is rebuilt on every invocation and never lands
            // in the record.
            let mut fields = HashMap::new();
            for block in fb
                .var_blocks
                .iter()
                .filter(|b| b.kind != VarBlockKind::Temp)
            {
                for field_decl in &block.declarations {
                    let kind = kind_of_type(&field_decl.data_type).ok_or_else(|| {
                        InterpreterError::type_mismatch(
                            format!(
                                "unsupported type {} for field '{}' of '{}'",
                                field_decl.data_type, field_decl.name, type_name
                            ),
                            field_decl.span,
                        )
                    })?;
                    let value = match &field_decl.initial {
                        Some(Initializer::Expr(expr)) => {
                            let evaluated =
                                Interpreter::new(store, state, 0).eval_expression(expr)?;
                            coerce(evaluated, kind).map_err(|_| {
                                InterpreterError::type_mismatch(
                                    format!(
                                        "initializer for field '{}' of '{}'",
                                        field_decl.name, type_name
                                    ),
                                    expr.span,
                                )
                            })?
                        }
                        _ => default_of(kind),
                    };
                    fields.insert(
                        field_decl.name.to_ascii_uppercase(),
                        FieldCell { kind, value },
                    );
                }
            }

            store.init_fb_instance(
                &decl.name,
                FbInstance {
                    type_name: upper.to_string(),
                    fields,
                },
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, ValueKind};
    use pretty_assertions::assert_eq;
    use st_parser::parse_source;

    fn setup(source: &str) -> (CompilationUnit, TagStore) {
        let unit = parse_source(source).expect("source should parse");
        let mut store = TagStore::new();
        initialize(&unit, &mut store).expect("initialization should succeed");
        (unit, store)
    }

    #[test]
    fn test_declarations_seed_defaults() {
        let (_, store) = setup(
            r#"PROGRAM P
VAR
    flag : BOOL;
    count : INT;
    ratio : REAL;
    delay : TIME;
    label : STRING;
END_VAR
END_PROGRAM"#,
        );
        assert_eq!(store.get_bool("flag"), Some(false));
        assert_eq!(store.get_int("count"), Some(0));
        assert_eq!(store.get_real("ratio"), Some(0.0));
        assert_eq!(store.get_time("delay"), Some(0));
        assert_eq!(store.get_string("label"), Some(""));
    }

    #[test]
    fn test_initializer_expressions_are_coerced() {
        let (_, store) = setup(
            r#"PROGRAM P
VAR
    count : INT := 3.9;
    greeting : STRING := 'hi';
    window : TIME := T#1m30s;
END_VAR
END_PROGRAM"#,
        );
        assert_eq!(store.get_int("count"), Some(3));
        assert_eq!(store.get_string("greeting"), Some("hi"));
        assert_eq!(store.get_time("window"), Some(90_000));
    }

    #[test]
    fn test_fb_declarations_create_instance_records() {
        let (_, store) = setup(
            r#"PROGRAM P
VAR
    t1 : TON;
    c1 : CTU;
    e1 : F_TRIG;
    b1 : SR;
END_VAR
END_PROGRAM"#,
        );
        assert_eq!(store.get_timer("t1").map(|t| t.preset_ms), Some(0));
        assert_eq!(store.get_counter("c1").map(|c| c.kind), Some(CounterKind::Up));
        assert_eq!(
            store.get_edge_detector("e1").map(|e| e.kind),
            Some(EdgeKind::Falling)
        );
        assert_eq!(
            store.get_bistable("b1").map(|b| b.kind),
            Some(BistableKind::SetDominant)
        );
    }

    #[test]
    fn test_user_fb_record_carries_initialized_fields() {
        let (_, store) = setup(
            r#"FUNCTION_BLOCK Acc
VAR_INPUT
    amount : INT;
END_VAR
VAR
    total : INT := 100;
END_VAR
VAR_TEMP
    scratch : INT;
END_VAR
scratch := amount;
total := total + scratch;
END_FUNCTION_BLOCK

PROGRAM P
VAR
    a : Acc;
END_VAR
END_PROGRAM"#,
        );
        let instance = store.fb_instance("a").expect("record should exist");
        assert_eq!(instance.type_name, "ACC");
        assert_eq!(
            instance.fields.get("TOTAL").map(|c| c.value.clone()),
            Some(Value::Int(100))
        );
        assert_eq!(
            instance.fields.get("AMOUNT").map(|c| c.kind),
            Some(ValueKind::Int)
        );
        assert!(!instance.fields.contains_key("SCRATCH"));
    }

    #[test]
    fn test_unknown_type_is_a_mismatch() {
        let unit = parse_source(
            r#"PROGRAM P
VAR
    x : Widget;
END_VAR
END_PROGRAM"#,
        )
        .unwrap();
        let mut store = TagStore::new();
        let result = initialize(&unit, &mut store);
        assert!(matches!(
            result,
            Err(InterpreterError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_reinitialize_resets_declared_values() {
        let source = r#"PROGRAM P
VAR
    count : INT := 7;
END_VAR
END_PROGRAM"#;
        let (unit, mut store) = setup(source);
        store.set_int("count", 99);
        initialize(&unit, &mut store).unwrap();
        assert_eq!(store.get_int("count"), Some(7));
    }
}
