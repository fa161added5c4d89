//! The tree walk: expression evaluation and statement execution
//!
//! One `Interpreter` is borrowed against the tag store and runtime
//! state for the duration of a scan. Expression evaluation reads the
//! store but never writes it; all side effects go through statement
//! execution. FB instance updates happen atomically at their call
//! site, so later statements in the same scan observe the new outputs.

use crate::builtins::BuiltinRegistry;
use crate::errors::{InterpreterError, InterpreterResult};
use crate::pou::{BistableKind, CounterKind, EdgeKind};
use crate::runtime::{CallFrame, ControlFlow, FrameCell, RuntimeState};
use crate::store::TagStore;
use crate::value::{coerce, default_of, kind_of_type, Value, ValueError};
use log::trace;
use st_common::{Span, Spanned};
use st_parser::ast::*;
use std::collections::HashMap;

/// Tree-walking interpreter for one scan
pub struct Interpreter<'a> {
    store: &'a mut TagStore,
    state: &'a mut RuntimeState,
    builtins: BuiltinRegistry,
    delta_ms: u64,
}

impl<'a> Interpreter<'a> {
    /// Borrow the store and state for one scan with the given elapsed
    /// time per timer update
    pub fn new(store: &'a mut TagStore, state: &'a mut RuntimeState, delta_ms: u64) -> Self {
        Self {
            store,
            state,
            builtins: BuiltinRegistry::new(),
            delta_ms,
        }
    }

    /// Execute a statement list, stopping at the first Exit/Return
    pub fn execute_statements(
        &mut self,
        body: &[Spanned<Statement>],
    ) -> InterpreterResult<ControlFlow> {
        for statement in body {
            match self.execute_statement(statement)? {
                ControlFlow::Continue => {}
                signal => return Ok(signal),
            }
        }
        Ok(ControlFlow::Continue)
    }

    /// Apply the side effects of one statement
    pub fn execute_statement(
        &mut self,
        statement: &Spanned<Statement>,
    ) -> InterpreterResult<ControlFlow> {
        trace!("executing statement at {}", statement.span);
        match &statement.value {
            Statement::Empty => Ok(ControlFlow::Continue),
            Statement::Assignment { target, value } => {
                let evaluated = self.eval_expression(value)?;
                self.assign(&target.value, target.span, evaluated)?;
                Ok(ControlFlow::Continue)
            }
            Statement::If(if_stmt) => self.execute_if(if_stmt),
            Statement::Case(case_stmt) => self.execute_case(case_stmt),
            Statement::For(for_stmt) => self.execute_for(for_stmt, statement.span),
            Statement::While(while_stmt) => self.execute_while(while_stmt),
            Statement::Repeat(repeat_stmt) => self.execute_repeat(repeat_stmt),
            Statement::Exit => Ok(ControlFlow::Exit),
            Statement::Return => Ok(ControlFlow::Return),
            Statement::Call(call) => {
                self.execute_call_statement(call, statement.span)?;
                Ok(ControlFlow::Continue)
            }
        }
    }

    fn execute_if(&mut self, if_stmt: &IfStatement) -> InterpreterResult<ControlFlow> {
        if self.eval_bool(&if_stmt.condition)? {
            return self.execute_statements(&if_stmt.then_branch);
        }
        for branch in &if_stmt.elsif_branches {
            if self.eval_bool(&branch.condition)? {
                return self.execute_statements(&branch.statements);
            }
        }
        if let Some(else_branch) = &if_stmt.else_branch {
            return self.execute_statements(else_branch);
        }
        Ok(ControlFlow::Continue)
    }

    fn execute_case(&mut self, case_stmt: &CaseStatement) -> InterpreterResult<ControlFlow> {
        let selector = self.eval_int(&case_stmt.selector)?;

        for branch in &case_stmt.branches {
            for label in &branch.labels {
                let matched = match label {
                    CaseLabel::Value(expr) => self.eval_int(expr)? == selector,
                    CaseLabel::Range(low, high) => {
                        self.eval_int(low)? <= selector && selector <= self.eval_int(high)?
                    }
                };
                if matched {
                    return self.execute_statements(&branch.statements);
                }
            }
        }

        if let Some(else_branch) = &case_stmt.else_branch {
            return self.execute_statements(else_branch);
        }
        Ok(ControlFlow::Continue)
    }

    /// Integer FOR loop; the control variable is written at the top of
    /// each iteration and keeps its last-assigned value afterwards. A
    /// zero step never enters the body.
    fn execute_for(
        &mut self,
        for_stmt: &ForStatement,
        span: Span,
    ) -> InterpreterResult<ControlFlow> {
        let from = self.eval_int(&for_stmt.from)?;
        let to = self.eval_int(&for_stmt.to)?;
        let step = match &for_stmt.by {
            Some(expr) => self.eval_int(expr)?,
            None => 1,
        };

        let mut counter = from;
        loop {
            let in_range = if step > 0 {
                counter <= to
            } else if step < 0 {
                counter >= to
            } else {
                false
            };
            if !in_range {
                break;
            }

            self.assign(
                &Target::Variable(for_stmt.variable.clone()),
                span,
                Value::Int(counter),
            )?;

            match self.execute_statements(&for_stmt.body)? {
                ControlFlow::Continue => {}
                ControlFlow::Exit => break,
                ControlFlow::Return => return Ok(ControlFlow::Return),
            }

            counter = counter.wrapping_add(step);
        }

        Ok(ControlFlow::Continue)
    }

    fn execute_while(&mut self, while_stmt: &WhileStatement) -> InterpreterResult<ControlFlow> {
        loop {
            if !self.eval_bool(&while_stmt.condition)? {
                break;
            }
            match self.execute_statements(&while_stmt.body)? {
                ControlFlow::Continue => {}
                ControlFlow::Exit => break,
                ControlFlow::Return => return Ok(ControlFlow::Return),
            }
        }
        Ok(ControlFlow::Continue)
    }

    fn execute_repeat(&mut self, repeat_stmt: &RepeatStatement) -> InterpreterResult<ControlFlow> {
        loop {
            match self.execute_statements(&repeat_stmt.body)? {
                ControlFlow::Continue => {}
                ControlFlow::Exit => break,
                ControlFlow::Return => return Ok(ControlFlow::Return),
            }
            if self.eval_bool(&repeat_stmt.until)? {
                break;
            }
        }
        Ok(ControlFlow::Continue)
    }

    // Assignment

    /// Coerce `value` to the declared type of the target and write it
    fn assign(&mut self, target: &Target, span: Span, value: Value) -> InterpreterResult<()> {
        match target {
            Target::Variable(name) => self.assign_variable(name, span, value),
            Target::Field { instance, field } => {
                let kind = self
                    .store
                    .instance_field_kind(instance, field)
                    .ok_or_else(|| {
                        InterpreterError::undeclared_variable(
                            format!("{}.{}", instance, field),
                            span,
                        )
                    })?;
                let coerced = coerce(value, kind).map_err(|e| value_error_at(e, span))?;
                self.store.set_instance_field(instance, field, coerced);
                Ok(())
            }
            Target::ArrayElement { name, index } => {
                let idx = self.eval_int(index)?;
                let kind = self
                    .store
                    .array_elem_kind(name)
                    .ok_or_else(|| InterpreterError::undeclared_variable(name.clone(), span))?;
                let coerced = coerce(value, kind).map_err(|e| value_error_at(e, span))?;
                self.store.set_array_element(name, idx, coerced);
                Ok(())
            }
        }
    }

    /// Bare-name write: frame cell, return slot, backing FB instance
    /// field, then global tag, in that order
    fn assign_variable(&mut self, name: &str, span: Span, value: Value) -> InterpreterResult<()> {
        let upper = name.to_ascii_uppercase();

        let mut instance_key = None;
        if let Some(frame) = self.state.current_frame_mut() {
            if let Some(cell) = frame.cells.get_mut(&upper) {
                cell.value =
                    coerce(value, cell.kind).map_err(|e| value_error_at(e, span))?;
                return Ok(());
            }
            if frame.return_slot.is_some() && upper == frame.pou_name {
                let slot = frame.return_slot.as_mut().expect("checked above");
                slot.value =
                    coerce(value, slot.kind).map_err(|e| value_error_at(e, span))?;
                return Ok(());
            }
            instance_key = frame.instance.clone();
        }

        if let Some(instance) = instance_key {
            if let Some(kind) = self.store.instance_field_kind(&instance, name) {
                let coerced = coerce(value, kind).map_err(|e| value_error_at(e, span))?;
                self.store.set_instance_field(&instance, name, coerced);
                return Ok(());
            }
        }

        if let Some(kind) = self.store.scalar_kind(name) {
            let coerced = coerce(value, kind).map_err(|e| value_error_at(e, span))?;
            self.store.write_scalar(name, coerced);
            return Ok(());
        }

        Err(InterpreterError::undeclared_variable(name, span))
    }

    // Expression evaluation

    /// Produce a typed value from an expression node
    pub fn eval_expression(&mut self, expr: &Spanned<Expression>) -> InterpreterResult<Value> {
        match &expr.value {
            Expression::Literal(literal) => Ok(eval_literal(literal)),
            Expression::Variable(name) => self.resolve_variable(name, expr.span),
            Expression::FieldAccess { instance, field } => self
                .store
                .instance_field(instance, field)
                .ok_or_else(|| {
                    InterpreterError::undeclared_variable(
                        format!("{}.{}", instance, field),
                        expr.span,
                    )
                }),
            Expression::ArrayAccess { name, index } => {
                let idx = self.eval_int(index)?;
                self.store
                    .get_array_element(name, idx)
                    .ok_or_else(|| InterpreterError::undeclared_variable(name.clone(), expr.span))
            }
            Expression::Binary { left, op, right } => {
                self.eval_binary(left, *op, right, expr.span)
            }
            Expression::Unary { op, operand } => {
                let value = self.eval_expression(operand)?;
                let result = match op {
                    UnaryOp::Neg => value.negate(),
                    UnaryOp::Not => value.not(),
                };
                result.map_err(|e| value_error_at(e, expr.span))
            }
            Expression::Call { name, arguments } => self.eval_call(name, arguments, expr.span),
        }
    }

    /// Bare identifier resolution: frame cells, the implicit return
    /// slot, the enclosing FB instance's cells, then the global store
    fn resolve_variable(&mut self, name: &str, span: Span) -> InterpreterResult<Value> {
        let upper = name.to_ascii_uppercase();

        if let Some(frame) = self.state.current_frame() {
            if let Some(cell) = frame.cells.get(&upper) {
                return Ok(cell.value.clone());
            }
            if let Some(slot) = &frame.return_slot {
                if upper == frame.pou_name {
                    return Ok(slot.value.clone());
                }
            }
            if let Some(instance) = &frame.instance {
                if let Some(value) = self.store.instance_field(instance, name) {
                    return Ok(value);
                }
            }
        }

        if let Some(value) = self.store.read_scalar(name) {
            return Ok(value);
        }

        Err(InterpreterError::undeclared_variable(name, span))
    }

    fn eval_binary(
        &mut self,
        left: &Spanned<Expression>,
        op: BinaryOp,
        right: &Spanned<Expression>,
        span: Span,
    ) -> InterpreterResult<Value> {
        // AND and OR short-circuit on BOOL; their integer (bitwise)
        // forms and XOR always evaluate both sides
        match op {
            BinaryOp::And => {
                let lhs = self.eval_expression(left)?;
                return match lhs {
                    Value::Bool(false) => Ok(Value::Bool(false)),
                    Value::Bool(true) => {
                        let rhs = self.eval_expression(right)?;
                        rhs.as_bool().map(Value::Bool).ok_or_else(|| {
                            InterpreterError::type_mismatch(
                                format!("AND expects BOOL, got {}", rhs.type_name()),
                                span,
                            )
                        })
                    }
                    lhs @ Value::Int(_) => {
                        let rhs = self.eval_expression(right)?;
                        lhs.bit_and(&rhs).map_err(|e| value_error_at(e, span))
                    }
                    other => Err(InterpreterError::type_mismatch(
                        format!("AND expects BOOL or integer, got {}", other.type_name()),
                        span,
                    )),
                };
            }
            BinaryOp::Or => {
                let lhs = self.eval_expression(left)?;
                return match lhs {
                    Value::Bool(true) => Ok(Value::Bool(true)),
                    Value::Bool(false) => {
                        let rhs = self.eval_expression(right)?;
                        rhs.as_bool().map(Value::Bool).ok_or_else(|| {
                            InterpreterError::type_mismatch(
                                format!("OR expects BOOL, got {}", rhs.type_name()),
                                span,
                            )
                        })
                    }
                    lhs @ Value::Int(_) => {
                        let rhs = self.eval_expression(right)?;
                        lhs.bit_or(&rhs).map_err(|e| value_error_at(e, span))
                    }
                    other => Err(InterpreterError::type_mismatch(
                        format!("OR expects BOOL or integer, got {}", other.type_name()),
                        span,
                    )),
                };
            }
            _ => {}
        }

        let lhs = self.eval_expression(left)?;
        let rhs = self.eval_expression(right)?;

        let result = match op {
            BinaryOp::Add => lhs.add(&rhs),
            BinaryOp::Sub => lhs.subtract(&rhs),
            BinaryOp::Mul => lhs.multiply(&rhs),
            BinaryOp::Div => lhs.divide(&rhs),
            BinaryOp::Mod => lhs.modulo(&rhs),
            BinaryOp::Pow => lhs.power(&rhs),
            BinaryOp::Xor => lhs.xor(&rhs),
            BinaryOp::Eq => lhs.equals(&rhs).map(Value::Bool),
            BinaryOp::Ne => lhs.equals(&rhs).map(|eq| Value::Bool(!eq)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                lhs.partial_compare(&rhs).map(|ordering| {
                    let holds = match (op, ordering) {
                        (BinaryOp::Lt, Some(std::cmp::Ordering::Less)) => true,
                        (BinaryOp::Le, Some(ord)) => ord != std::cmp::Ordering::Greater,
                        (BinaryOp::Gt, Some(std::cmp::Ordering::Greater)) => true,
                        (BinaryOp::Ge, Some(ord)) => ord != std::cmp::Ordering::Less,
                        // NaN compares false under every ordering
                        _ => false,
                    };
                    Value::Bool(holds)
                })
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };

        result.map_err(|e| value_error_at(e, span))
    }

    // Calls

    /// Function invocation in expression position: built-ins first,
    /// then user FUNCTIONs. FB instances are not expressions.
    fn eval_call(
        &mut self,
        name: &str,
        arguments: &[CallArgument],
        span: Span,
    ) -> InterpreterResult<Value> {
        let upper = name.to_ascii_uppercase();

        if self.builtins.is_builtin(&upper) {
            let mut values = Vec::with_capacity(arguments.len());
            for argument in arguments {
                values.push(self.eval_expression(&argument.value)?);
            }
            return self.builtins.call(&upper, &values, span);
        }

        if self.state.function(&upper).is_some() {
            return self.call_user_function(&upper, arguments, span);
        }

        if self.store.has_instance(name) {
            return Err(InterpreterError::type_mismatch(
                format!(
                    "'{}' is a function block instance; call it as a statement and read its outputs as fields",
                    name
                ),
                span,
            ));
        }

        Err(InterpreterError::unknown_function(name, span))
    }

    /// Call a user FUNCTION: bind inputs, fresh locals, run the body,
    /// return whatever the implicit return slot holds
    fn call_user_function(
        &mut self,
        upper_name: &str,
        arguments: &[CallArgument],
        span: Span,
    ) -> InterpreterResult<Value> {
        let function = self
            .state
            .function(upper_name)
            .cloned()
            .expect("caller checked the function exists");

        let input_names: Vec<String> = function
            .var_blocks
            .iter()
            .filter(|b| b.kind == VarBlockKind::Input)
            .flat_map(|b| b.declarations.iter())
            .map(|d| d.name.to_ascii_uppercase())
            .collect();

        // Arguments evaluate in the caller's context, before the frame
        let mut bound: HashMap<String, Value> = HashMap::new();
        let mut positional = 0usize;
        for argument in arguments {
            let value = self.eval_expression(&argument.value)?;
            match &argument.name {
                Some(param) => {
                    bound.insert(param.to_ascii_uppercase(), value);
                }
                None => {
                    let param = input_names.get(positional).ok_or_else(|| {
                        InterpreterError::argument_count_mismatch(
                            upper_name,
                            input_names.len(),
                            arguments.len(),
                            span,
                        )
                    })?;
                    bound.insert(param.clone(), value);
                    positional += 1;
                }
            }
        }
        for named in bound.keys() {
            if !input_names.contains(named) {
                return Err(InterpreterError::type_mismatch(
                    format!("'{}' has no input '{}'", upper_name, named),
                    span,
                ));
            }
        }

        let mut cells = HashMap::new();
        for block in &function.var_blocks {
            for decl in &block.declarations {
                let kind = kind_of_type(&decl.data_type).ok_or_else(|| {
                    InterpreterError::type_mismatch(
                        format!(
                            "unsupported type {} for '{}' inside a FUNCTION",
                            decl.data_type, decl.name
                        ),
                        decl.span,
                    )
                })?;
                let mut value = default_of(kind);
                if let Some(Initializer::Expr(init)) = &decl.initial {
                    let evaluated = self.eval_expression(init)?;
                    value = coerce(evaluated, kind).map_err(|e| value_error_at(e, init.span))?;
                }
                if block.kind == VarBlockKind::Input {
                    if let Some(argument) = bound.remove(&decl.name.to_ascii_uppercase()) {
                        value = coerce(argument, kind).map_err(|e| value_error_at(e, span))?;
                    }
                }
                cells.insert(decl.name.to_ascii_uppercase(), FrameCell::new(kind, value));
            }
        }

        let return_kind = kind_of_type(&function.return_type).ok_or_else(|| {
            InterpreterError::type_mismatch(
                format!(
                    "unsupported return type {} for '{}'",
                    function.return_type, upper_name
                ),
                span,
            )
        })?;

        let frame = CallFrame {
            pou_name: upper_name.to_string(),
            cells,
            return_slot: Some(FrameCell::new(return_kind, default_of(return_kind))),
            instance: None,
        };
        self.state.push_frame(frame, span)?;
        let result = self.execute_statements(&function.body);
        let frame = self.state.pop_frame().expect("frame pushed above");
        result?;

        Ok(frame.return_slot.expect("FUNCTION frames carry a slot").value)
    }

    /// FB-instance call statement: latch the supplied inputs and run
    /// the instance's state machine (or user FB body) in place
    fn execute_call_statement(
        &mut self,
        call: &CallStatement,
        span: Span,
    ) -> InterpreterResult<()> {
        let name = &call.name;

        if self.store.get_timer(name).is_some() {
            let supplied = self.bind_arguments(&call.arguments, &["IN", "PT"], name, span)?;
            let (input0, preset0) = {
                let t = self.store.get_timer(name).expect("checked above");
                (t.input, t.preset_ms)
            };
            let input = match supplied.get("IN") {
                Some(v) => self.coerce_bool(v, span)?,
                None => input0,
            };
            let preset = match supplied.get("PT") {
                Some(v) => self.coerce_time(v, span)?,
                None => preset0,
            };
            self.store.set_timer_input(name, input);
            self.store.set_timer_pt(name, preset);
            self.store.update_timer(name, self.delta_ms);
            return Ok(());
        }

        if let Some(counter) = self.store.get_counter(name) {
            let kind = counter.kind;
            let (cu0, cd0, r0, ld0, pv0) = (
                counter.count_up,
                counter.count_down,
                counter.reset,
                counter.load,
                counter.preset,
            );
            match kind {
                CounterKind::Up => {
                    let supplied =
                        self.bind_arguments(&call.arguments, &["CU", "R", "PV", "LD"], name, span)?;
                    let cu = self.bool_or(&supplied, "CU", cu0, span)?;
                    let reset = self.bool_or(&supplied, "R", r0, span)?;
                    let preset = self.int_or(&supplied, "PV", pv0, span)?;
                    self.store.pulse_count_up(name, cu, reset, preset);
                }
                CounterKind::Down => {
                    let supplied =
                        self.bind_arguments(&call.arguments, &["CD", "LD", "PV"], name, span)?;
                    let cd = self.bool_or(&supplied, "CD", cd0, span)?;
                    let load = self.bool_or(&supplied, "LD", ld0, span)?;
                    let preset = self.int_or(&supplied, "PV", pv0, span)?;
                    self.store.pulse_count_down(name, cd, load, preset);
                }
                CounterKind::UpDown => {
                    let supplied = self.bind_arguments(
                        &call.arguments,
                        &["CU", "CD", "R", "LD", "PV"],
                        name,
                        span,
                    )?;
                    let cu = self.bool_or(&supplied, "CU", cu0, span)?;
                    let cd = self.bool_or(&supplied, "CD", cd0, span)?;
                    let reset = self.bool_or(&supplied, "R", r0, span)?;
                    let load = self.bool_or(&supplied, "LD", ld0, span)?;
                    let preset = self.int_or(&supplied, "PV", pv0, span)?;
                    self.store
                        .pulse_count_up_down(name, cu, cd, reset, load, preset);
                }
            }
            return Ok(());
        }

        if let Some(edge) = self.store.get_edge_detector(name) {
            let kind = edge.kind;
            let clk0 = edge.clk;
            let supplied = self.bind_arguments(&call.arguments, &["CLK"], name, span)?;
            let clk = self.bool_or(&supplied, "CLK", clk0, span)?;
            // The record's declared kind picks the machine, never the
            // instance name
            match kind {
                EdgeKind::Rising => self.store.update_rtrig(name, clk),
                EdgeKind::Falling => self.store.update_ftrig(name, clk),
            }
            return Ok(());
        }

        if let Some(bistable) = self.store.get_bistable(name) {
            let kind = bistable.kind;
            let (set0, reset0) = (bistable.set, bistable.reset);
            match kind {
                BistableKind::SetDominant => {
                    let supplied =
                        self.bind_arguments(&call.arguments, &["S1", "R"], name, span)?;
                    let set = self.bool_or(&supplied, "S1", set0, span)?;
                    let reset = self.bool_or(&supplied, "R", reset0, span)?;
                    self.store.update_sr(name, set, reset);
                }
                BistableKind::ResetDominant => {
                    let supplied =
                        self.bind_arguments(&call.arguments, &["S", "R1"], name, span)?;
                    let set = self.bool_or(&supplied, "S", set0, span)?;
                    let reset = self.bool_or(&supplied, "R1", reset0, span)?;
                    self.store.update_rs(name, set, reset);
                }
            }
            return Ok(());
        }

        if self.store.fb_instance(name).is_some() {
            return self.call_user_fb(name, &call.arguments, span);
        }

        // Plain function used as a statement: evaluate and discard
        let upper = name.to_ascii_uppercase();
        if self.builtins.is_builtin(&upper) || self.state.function(&upper).is_some() {
            self.eval_call(name, &call.arguments, span)?;
            return Ok(());
        }

        Err(InterpreterError::undeclared_variable(name, span))
    }

    /// Invoke a user FUNCTION_BLOCK against its persistent record
    fn call_user_fb(
        &mut self,
        name: &str,
        arguments: &[CallArgument],
        span: Span,
    ) -> InterpreterResult<()> {
        let instance_key = name.to_ascii_uppercase();
        let type_name = self
            .store
            .fb_instance(name)
            .expect("caller checked the instance exists")
            .type_name
            .clone();
        let fb = self.state.function_block(&type_name).cloned().ok_or_else(|| {
            InterpreterError::type_mismatch(
                format!("unknown function block type '{}'", type_name),
                span,
            )
        })?;

        let input_names: Vec<String> = fb
            .var_blocks
            .iter()
            .filter(|b| b.kind == VarBlockKind::Input)
            .flat_map(|b| b.declarations.iter())
            .map(|d| d.name.to_ascii_uppercase())
            .collect();
        let input_refs: Vec<&str> = input_names.iter().map(|s| s.as_str()).collect();
        let supplied = self.bind_arguments(arguments, &input_refs, name, span)?;

        // Latch the supplied inputs into the instance record
        for (param, value) in supplied {
            let kind = self
                .store
                .instance_field_kind(name, &param)
                .ok_or_else(|| {
                    InterpreterError::type_mismatch(
                        format!("'{}' has no input '{}'", type_name, param),
                        span,
                    )
                })?;
            let coerced = coerce(value, kind).map_err(|e| value_error_at(e, span))?;
            self.store.set_instance_field(name, &param, coerced);
        }

        // VAR_TEMP cells are rebuilt from their initializers on every
        // invocation
        let mut cells = HashMap::new();
        for block in fb.var_blocks.iter().filter(|b| b.kind == VarBlockKind::Temp) {
            for decl in &block.declarations {
                let kind = kind_of_type(&decl.data_type).ok_or_else(|| {
                    InterpreterError::type_mismatch(
                        format!(
                            "unsupported type {} for VAR_TEMP '{}'",
                            decl.data_type, decl.name
                        ),
                        decl.span,
                    )
                })?;
                let mut value = default_of(kind);
                if let Some(Initializer::Expr(init)) = &decl.initial {
                    let evaluated = self.eval_expression(init)?;
                    value = coerce(evaluated, kind).map_err(|e| value_error_at(e, init.span))?;
                }
                cells.insert(decl.name.to_ascii_uppercase(), FrameCell::new(kind, value));
            }
        }

        let frame = CallFrame {
            pou_name: type_name,
            cells,
            return_slot: None,
            instance: Some(instance_key),
        };
        self.state.push_frame(frame, span)?;
        let result = self.execute_statements(&fb.body);
        self.state.pop_frame();
        result?;
        Ok(())
    }

    /// Evaluate call-site arguments into a supplied-input map; unknown
    /// named inputs and excess positional arguments are errors
    fn bind_arguments(
        &mut self,
        arguments: &[CallArgument],
        accepted: &[&str],
        pou_name: &str,
        span: Span,
    ) -> InterpreterResult<HashMap<String, Value>> {
        let mut supplied = HashMap::new();
        let mut positional = 0usize;

        for argument in arguments {
            let value = self.eval_expression(&argument.value)?;
            let param = match &argument.name {
                Some(named) => {
                    let upper = named.to_ascii_uppercase();
                    if !accepted.contains(&upper.as_str()) {
                        return Err(InterpreterError::type_mismatch(
                            format!("'{}' has no input '{}'", pou_name, named),
                            span,
                        ));
                    }
                    upper
                }
                None => {
                    let param = accepted.get(positional).ok_or_else(|| {
                        InterpreterError::argument_count_mismatch(
                            pou_name,
                            accepted.len(),
                            arguments.len(),
                            span,
                        )
                    })?;
                    positional += 1;
                    param.to_string()
                }
            };
            supplied.insert(param, value);
        }

        Ok(supplied)
    }

    // Coercion helpers for FB input latching

    fn coerce_bool(&self, value: &Value, span: Span) -> InterpreterResult<bool> {
        match coerce(value.clone(), crate::value::ValueKind::Bool) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => Err(InterpreterError::type_mismatch(
                format!("expected BOOL input, got {}", value.type_name()),
                span,
            )),
        }
    }

    fn coerce_time(&self, value: &Value, span: Span) -> InterpreterResult<u64> {
        match coerce(value.clone(), crate::value::ValueKind::Time) {
            Ok(Value::Time(ms)) => Ok(ms),
            _ => Err(InterpreterError::type_mismatch(
                format!("expected TIME input, got {}", value.type_name()),
                span,
            )),
        }
    }

    fn coerce_int(&self, value: &Value, span: Span) -> InterpreterResult<i64> {
        match coerce(value.clone(), crate::value::ValueKind::Int) {
            Ok(Value::Int(v)) => Ok(v),
            _ => Err(InterpreterError::type_mismatch(
                format!("expected an integer input, got {}", value.type_name()),
                span,
            )),
        }
    }

    fn bool_or(
        &self,
        supplied: &HashMap<String, Value>,
        param: &str,
        latched: bool,
        span: Span,
    ) -> InterpreterResult<bool> {
        match supplied.get(param) {
            Some(value) => self.coerce_bool(value, span),
            None => Ok(latched),
        }
    }

    fn int_or(
        &self,
        supplied: &HashMap<String, Value>,
        param: &str,
        latched: i64,
        span: Span,
    ) -> InterpreterResult<i64> {
        match supplied.get(param) {
            Some(value) => self.coerce_int(value, span),
            None => Ok(latched),
        }
    }

    // Small evaluation helpers

    fn eval_bool(&mut self, expr: &Spanned<Expression>) -> InterpreterResult<bool> {
        let value = self.eval_expression(expr)?;
        value.as_bool().ok_or_else(|| {
            InterpreterError::type_mismatch(
                format!("condition must be BOOL, got {}", value.type_name()),
                expr.span,
            )
        })
    }

    fn eval_int(&mut self, expr: &Spanned<Expression>) -> InterpreterResult<i64> {
        let value = self.eval_expression(expr)?;
        value.as_int().ok_or_else(|| {
            InterpreterError::type_mismatch(
                format!("expected an integer, got {}", value.type_name()),
                expr.span,
            )
        })
    }

}

fn value_error_at(error: ValueError, span: Span) -> InterpreterError {
    match error {
        ValueError::DivisionByZero => InterpreterError::division_by_zero(span),
        ValueError::Mismatch(message) => InterpreterError::type_mismatch(message, span),
    }
}

fn eval_literal(literal: &Literal) -> Value {
    match literal {
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(v) => Value::Int(*v),
        Literal::Real(v) => Value::Real(*v),
        Literal::Time(ms) => Value::Time((*ms).max(0) as u64),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}
