//! Tree-walking evaluator. Executes a validated `Program` against a single
//! top-level `Environment`; no closures — user functions run against the
//! program's top-level scope, never the caller's.
//!
//! Uses a trampoline-loop shape for tail calls (`mut expr` + `loop { ...
//! continue }`) and a name-keyed, populated-once `FunctionTable` for
//! no-closure function dispatch.

use crate::ast::{BinOp, Expr, FnDecl, Program, RecordEntry, Stmt, ToolMode};
use crate::diagnostic::Diagnostic;
use crate::env::Environment;
use crate::policy::{Budgets, CancellationToken, Policy};
use crate::span::Span;
use crate::stdlib::StdlibRegistry;
use crate::tools::ToolRegistry;
use crate::trace::{Evidence, TraceEvent, TraceSink};
use crate::value::{Record, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// Top-level `fn` declarations, keyed by name. Populated once from
/// `program.fns` and treated as read-only for the run, same as the stdlib and
/// tool registries.
pub struct FunctionTable {
    fns: HashMap<String, FnDecl>,
}

impl FunctionTable {
    pub fn new(fns: &[FnDecl]) -> Self {
        FunctionTable { fns: fns.iter().map(|f| (f.name.clone(), f.clone())).collect() }
    }

    pub fn get(&self, name: &str) -> Option<&FnDecl> {
        self.fns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fns.contains_key(name)
    }
}

/// Result of evaluating a function body: either a final value, or a detected
/// tail call to another user function, which `call_function`'s trampoline
/// loops on instead of recursing (avoids stack growth on deep A0 recursion).
enum BlockOutcome {
    Value(Value),
    TailCall { name: String, args: Record },
}

pub struct Evaluator<'a> {
    top_env: Rc<Environment>,
    functions: FunctionTable,
    stdlib: &'a StdlibRegistry,
    tools: &'a ToolRegistry,
    policy: &'a Policy,
    declared_caps: std::collections::HashSet<String>,
    budgets: Budgets,
    cancel: CancellationToken,
    trace: &'a mut dyn TraceSink,
    evidence: crate::trace::EvidenceAccumulator,
    run_id: String,
}

/// Outcome of a full program run: the final value plus everything
/// accumulated along the way, for the host to serialize/write out.
pub struct RunOutcome {
    pub value: Value,
    pub evidence: crate::trace::EvidenceAccumulator,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        program: &Program,
        stdlib: &'a StdlibRegistry,
        tools: &'a ToolRegistry,
        policy: &'a Policy,
        trace: &'a mut dyn TraceSink,
        run_id: String,
    ) -> Self {
        let declared_caps: std::collections::HashSet<String> =
            program.cap.as_ref().map(|c| c.names.iter().map(|(n, _)| n.clone()).collect()).unwrap_or_default();
        let budgets = Budgets::from_header(&program.budget);
        let cancel = budgets.cancellation();
        Evaluator {
            top_env: Environment::new(),
            functions: FunctionTable::new(&program.fns),
            stdlib,
            tools,
            policy,
            declared_caps,
            budgets,
            cancel,
            trace,
            evidence: crate::trace::EvidenceAccumulator::new(),
            run_id,
        }
    }

    /// Runs the whole program: checks the capability gate at entry, then
    /// evaluates the body as a block against the top-level scope (spec
    /// §4.4's "State machine: program lifecycle").
    pub fn run(mut self, program: &Program) -> Result<RunOutcome, Diagnostic> {
        for cap in &self.declared_caps {
            self.policy.check(cap, program.cap.as_ref().map(|c| c.span.clone()))?;
        }

        self.trace.emit(TraceEvent::new(&self.run_id, "run_start", Some(program.span.clone()), Value::Null));
        let result = self.eval_block(&program.body, &self.top_env.clone());
        match &result {
            Ok(v) => {
                self.trace.emit(TraceEvent::new(
                    &self.run_id,
                    "run_end",
                    Some(program.span.clone()),
                    v.clone(),
                ));
            }
            Err(e) => {
                if matches!(e, Diagnostic::Budget { .. }) {
                    self.trace.emit(TraceEvent::new(&self.run_id, "budget_exceeded", e.span().cloned(), Value::Null));
                }
                self.trace.emit(TraceEvent::new(
                    &self.run_id,
                    "run_end",
                    e.span().cloned(),
                    Value::String(e.to_string()),
                ));
            }
        }
        result.map(|value| RunOutcome { value, evidence: self.evidence })
    }

    // --- capability checks ---

    fn check_tool_capability(&self, tool_name: &str, mode: ToolMode, span: &Span) -> Result<(), Diagnostic> {
        let cap_id = crate::capability::capability_id_for_tool(tool_name)
            .ok_or_else(|| Diagnostic::unknown_tool(tool_name, span.clone()))?;
        if !self.declared_caps.contains(cap_id) {
            return Err(Diagnostic::cap_denied(cap_id, Some(span.clone())));
        }
        self.policy.check(cap_id, Some(span.clone()))?;
        if mode == ToolMode::Call && crate::capability::mode_of(cap_id) != crate::capability::CapabilityMode::Read {
            return Err(Diagnostic::CallEffect { name: tool_name.to_string(), span: span.clone() });
        }
        Ok(())
    }

    // --- statements ---

    /// Evaluates one statement. Returns `Some(value)` only for `return`; the
    /// validator guarantees every block ends in exactly one terminal
    /// `return`, so callers never need to handle fallthrough.
    fn eval_stmt(&mut self, stmt: &Stmt, scope: &Rc<Environment>) -> Result<Option<Value>, Diagnostic> {
        self.budgets.check_time()?;
        match stmt {
            Stmt::Let { name, expr, span } => {
                let value = self.eval_expr(expr, scope)?;
                scope.define(name, value, span.clone())?;
                Ok(None)
            }
            Stmt::Arrow { expr, name, span } => {
                let value = self.eval_expr(expr, scope)?;
                scope.define(name, value, span.clone())?;
                Ok(None)
            }
            Stmt::Expr { expr, .. } => {
                self.eval_expr(expr, scope)?;
                Ok(None)
            }
            Stmt::Return { expr, .. } => Ok(Some(self.eval_expr(expr, scope)?)),
        }
    }

    /// Evaluates a block in its own child scope, returning the terminal
    /// `return`'s value.
    fn eval_block(&mut self, stmts: &[Stmt], parent: &Rc<Environment>) -> Result<Value, Diagnostic> {
        let scope = Environment::with_parent(parent.clone());
        for stmt in stmts {
            if let Some(value) = self.eval_stmt(stmt, &scope)? {
                return Ok(value);
            }
        }
        unreachable!("validator guarantees every block ends in a terminal return")
    }

    /// Like `eval_block`, but used only for function bodies: if the terminal
    /// `return`'s expression is itself a call to a user-defined function,
    /// evaluates just its argument record and reports a tail call instead of
    /// recursing, so `call_function`'s loop can continue without growing the
    /// Rust stack.
    fn eval_block_tail(&mut self, stmts: &[Stmt], parent: &Rc<Environment>) -> Result<BlockOutcome, Diagnostic> {
        let scope = Environment::with_parent(parent.clone());
        for (i, stmt) in stmts.iter().enumerate() {
            let is_last = i == stmts.len() - 1;
            if is_last {
                if let Stmt::Return { expr: Expr::FnCall { name, args, .. }, .. } = stmt {
                    if self.functions.contains(name) {
                        let args_value = self.eval_expr(args, &scope)?;
                        let args_record = self.expect_record(args_value, stmt.span())?;
                        return Ok(BlockOutcome::TailCall { name: name.clone(), args: args_record });
                    }
                }
            }
            if let Some(value) = self.eval_stmt(stmt, &scope)? {
                return Ok(BlockOutcome::Value(value));
            }
        }
        unreachable!("validator guarantees every block ends in a terminal return")
    }

    fn expect_record(&self, value: Value, span: &Span) -> Result<Record, Diagnostic> {
        match value {
            Value::Record(r) => Ok(r),
            other => Err(Diagnostic::type_error(
                format!("function call arguments must be a record, found {}", other.type_name()),
                span.clone(),
            )),
        }
    }

    /// Calls a user-defined function. Runs as a trampoline: each iteration
    /// binds the call's arguments into a fresh child scope of the *top-level*
    /// environment (not the caller's — no closures, spec §9) and either
    /// returns a final value or loops on a detected tail call. Every
    /// iteration counts against `maxIterations`, not only tail calls, so
    /// unbounded recursion is bounded the same way unbounded loops are.
    fn call_function(&mut self, name: &str, args: Record, span: &Span) -> Result<Value, Diagnostic> {
        let mut name = name.to_string();
        let mut args = args;
        loop {
            self.budgets.note_iteration()?;
            let decl = self.functions.get(&name).ok_or_else(|| Diagnostic::unknown_fn(name.clone(), span.clone()))?.clone();

            let call_scope = Environment::with_parent(self.top_env.clone());
            for param in &decl.params {
                let value = args.get(param).cloned().unwrap_or(Value::Null);
                call_scope.define(param, value, span.clone())?;
            }

            self.trace.emit(TraceEvent::new(&self.run_id, "fn_call_start", Some(span.clone()), Value::String(name.clone())));
            let outcome = self.eval_block_tail(&decl.body, &call_scope);
            self.trace.emit(TraceEvent::new(&self.run_id, "fn_call_end", Some(span.clone()), Value::String(name.clone())));

            match outcome? {
                BlockOutcome::Value(v) => return Ok(v),
                BlockOutcome::TailCall { name: next_name, args: next_args } => {
                    name = next_name;
                    args = next_args;
                }
            }
        }
    }

    // --- expressions ---

    fn eval_expr(&mut self, expr: &Expr, scope: &Rc<Environment>) -> Result<Value, Diagnostic> {
        match expr {
            Expr::Null { .. } => Ok(Value::Null),
            Expr::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expr::Int { value, .. } => Ok(Value::Number(*value as f64)),
            Expr::Float { value, .. } => Ok(Value::Number(*value)),
            Expr::Str { value, .. } => Ok(Value::String(value.clone())),

            Expr::Ident { name, span } => {
                scope.get(name).ok_or_else(|| Diagnostic::unbound(name.clone(), span.clone()))
            }

            Expr::Field { base, name, span } => {
                let base_value = self.eval_expr(base, scope)?;
                match base_value {
                    Value::Record(r) => r.get(name).cloned().ok_or_else(|| {
                        Diagnostic::path_error(format!("record has no field '{}'", name), span.clone())
                    }),
                    other => Err(Diagnostic::path_error(
                        format!("cannot read field '{}' of {}", name, other.type_name()),
                        span.clone(),
                    )),
                }
            }

            Expr::Index { base, index, span } => {
                let base_value = self.eval_expr(base, scope)?;
                match base_value {
                    Value::List(items) => {
                        let idx = if *index < 0 { *index + items.len() as i64 } else { *index };
                        items.get(idx as usize).cloned().ok_or_else(|| {
                            Diagnostic::path_error(format!("index {} out of bounds", index), span.clone())
                        })
                    }
                    other => Err(Diagnostic::path_error(
                        format!("cannot index a {}", other.type_name()),
                        span.clone(),
                    )),
                }
            }

            Expr::List { items, .. } => {
                let values = items.iter().map(|e| self.eval_expr(e, scope)).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(values))
            }

            Expr::Record { entries, span } => self.eval_record_literal(entries, span, scope),

            Expr::Binary { op, lhs, rhs, span } => {
                let l = self.eval_expr(lhs, scope)?;
                let r = self.eval_expr(rhs, scope)?;
                self.eval_binary(*op, l, r, span)
            }

            Expr::Neg { expr, span } => match self.eval_expr(expr, scope)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(Diagnostic::type_error(format!("cannot negate {}", other.type_name()), span.clone())),
            },

            Expr::ToolCall { mode, name, args, span } => {
                self.check_tool_capability(name, *mode, span)?;
                self.budgets.note_tool_call()?;
                let args_value = self.eval_expr(args, scope)?;
                let args_record = self.expect_record(args_value, span)?;

                let mode_name = match mode {
                    ToolMode::Call => "read",
                    ToolMode::Do => "effect",
                };
                let mut start_data = Record::new();
                start_data.insert("name", Value::String(name.clone()));
                start_data.insert("mode", Value::String(mode_name.to_string()));
                self.trace.emit(TraceEvent::new(&self.run_id, "tool_start", Some(span.clone()), Value::Record(start_data)));
                let started = std::time::Instant::now();
                let result = self.tools.dispatch(name, &args_record, &self.cancel, span.clone());
                let mut end_data = Record::new();
                end_data.insert("name", Value::String(name.clone()));
                end_data.insert("outcome", Value::String(if result.is_ok() { "ok".to_string() } else { "err".to_string() }));
                end_data.insert("durationMs", Value::Number(started.elapsed().as_millis() as f64));
                self.trace.emit(TraceEvent::new(&self.run_id, "tool_end", Some(span.clone()), Value::Record(end_data)));
                if let Ok(Value::Record(r)) = &result {
                    if let Some(Value::Number(bytes)) = r.get("bytes") {
                        self.budgets.note_bytes_written(*bytes as i64)?;
                    }
                }
                result
            }

            Expr::Assert { that, msg, details, span } => {
                self.eval_assert_or_check(that, msg, details, span, scope, true)
            }
            Expr::Check { that, msg, details, span } => {
                self.eval_assert_or_check(that, msg, details, span, scope, false)
            }

            Expr::FnCall { name, args, span } => self.eval_fn_call(name, args, span, scope),

            Expr::IfBlock { cond, then_body, else_body, .. } => {
                if self.eval_expr(cond, scope)?.is_truthy() {
                    self.eval_block(then_body, scope)
                } else if let Some(else_body) = else_body {
                    self.eval_block(else_body, scope)
                } else {
                    Ok(Value::Null)
                }
            }

            Expr::IfRecord { cond, then, els, .. } => {
                if self.eval_expr(cond, scope)?.is_truthy() {
                    self.eval_expr(then, scope)
                } else {
                    self.eval_expr(els, scope)
                }
            }

            Expr::For { iter, binder, body, span } => self.eval_for(iter, binder, body, span, scope),
            Expr::Loop { init, times, binder, body, span } => self.eval_loop(init, times, binder, body, span, scope),
            Expr::Match { subject, ok_name, ok_body, err_name, err_body, span } => {
                self.eval_match(subject, ok_name, ok_body, err_name, err_body, span, scope)
            }
            Expr::Try { body, catch_name, catch_body, .. } => self.eval_try(body, catch_name, catch_body, scope),

            Expr::FilterBlock { input, binder, body, span } => self.eval_filter_block(input, binder, body, span, scope),
            Expr::FilterFn { input, fn_name, span } => self.eval_filter_fn(input, fn_name, span, scope),
            Expr::FilterBy { input, key, span } => {
                let list_value = self.eval_expr(input, scope)?;
                let mut args = Record::new();
                args.insert("in", list_value);
                args.insert("by", Value::String(key.clone()));
                self.stdlib.call("filter", &args, span.clone())
            }
        }
    }

    fn eval_record_literal(&mut self, entries: &[RecordEntry], span: &Span, scope: &Rc<Environment>) -> Result<Value, Diagnostic> {
        let mut out = Record::new();
        let mut explicit_keys = std::collections::HashSet::new();
        for entry in entries {
            match entry {
                RecordEntry::Pair { key, value } => {
                    if !explicit_keys.insert(key.clone()) {
                        return Err(Diagnostic::ast(
                            format!("duplicate literal key '{}' in record", key),
                            span.clone(),
                        ));
                    }
                    let v = self.eval_expr(value, scope)?;
                    out.insert(key.clone(), v);
                }
                RecordEntry::Spread { expr } => {
                    let spread_span = expr.span().clone();
                    let spread_value = self.eval_expr(expr, scope)?;
                    match spread_value {
                        Value::Record(r) => {
                            for (k, v) in r.iter() {
                                out.insert(k.clone(), v.clone());
                            }
                        }
                        other => {
                            return Err(Diagnostic::type_error(
                                format!("spread requires a record, found {}", other.type_name()),
                                spread_span,
                            ))
                        }
                    }
                }
            }
        }
        Ok(Value::Record(out))
    }

    fn eval_binary(&self, op: BinOp, l: Value, r: Value, span: &Span) -> Result<Value, Diagnostic> {
        match op {
            BinOp::Eq => return Ok(Value::Bool(l == r)),
            BinOp::Ne => return Ok(Value::Bool(l != r)),
            _ => {}
        }

        match op {
            BinOp::Gt | BinOp::Lt | BinOp::Ge | BinOp::Le => match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(match op {
                    BinOp::Gt => a > b,
                    BinOp::Lt => a < b,
                    BinOp::Ge => a >= b,
                    BinOp::Le => a <= b,
                    _ => unreachable!(),
                })),
                (Value::String(a), Value::String(b)) => Ok(Value::Bool(match op {
                    BinOp::Gt => a > b,
                    BinOp::Lt => a < b,
                    BinOp::Ge => a >= b,
                    BinOp::Le => a <= b,
                    _ => unreachable!(),
                })),
                _ => Err(Diagnostic::type_error(
                    format!("cannot compare {} and {}", l.type_name(), r.type_name()),
                    span.clone(),
                )),
            },
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => {
                    if matches!(op, BinOp::Div | BinOp::Mod) && *b == 0.0 {
                        return Err(Diagnostic::type_error("division by zero", span.clone()));
                    }
                    let result = match op {
                        BinOp::Add => a + b,
                        BinOp::Sub => a - b,
                        BinOp::Mul => a * b,
                        BinOp::Div => a / b,
                        BinOp::Mod => a % b,
                        _ => unreachable!(),
                    };
                    Ok(Value::Number(result))
                }
                _ => Err(Diagnostic::type_error(
                    format!("arithmetic requires numbers, found {} and {}", l.type_name(), r.type_name()),
                    span.clone(),
                )),
            },
            BinOp::Eq | BinOp::Ne => unreachable!(),
        }
    }

    fn eval_assert_or_check(
        &mut self,
        that: &Expr,
        msg: &Expr,
        details: &Option<Box<Expr>>,
        span: &Span,
        scope: &Rc<Environment>,
        is_assert: bool,
    ) -> Result<Value, Diagnostic> {
        let that_value = self.eval_expr(that, scope)?;
        let ok = that_value.is_truthy();
        let msg_value = self.eval_expr(msg, scope)?;
        let msg_str = match &msg_value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let details_value = match details {
            Some(d) => Some(self.eval_expr(d, scope)?),
            None => None,
        };

        let evidence = Evidence { kind: if is_assert { "assert" } else { "check" }, ok, msg: msg_str.clone(), details: details_value, span: span.clone() };
        self.trace.emit(TraceEvent::new(&self.run_id, "evidence", Some(span.clone()), Value::Record(evidence.to_record())));
        self.evidence.push(evidence);

        if is_assert && !ok {
            return Err(Diagnostic::Assert { message: msg_str, span: span.clone() });
        }
        Ok(Value::Bool(ok))
    }

    fn eval_fn_call(&mut self, name: &str, args: &Expr, span: &Span, scope: &Rc<Environment>) -> Result<Value, Diagnostic> {
        match name {
            "map" => return self.eval_map(args, span, scope),
            "reduce" => return self.eval_reduce(args, span, scope),
            _ => {}
        }

        let args_value = self.eval_expr(args, scope)?;
        let args_record = self.expect_record(args_value, span)?;

        if self.functions.contains(name) {
            return self.call_function(name, args_record, span);
        }
        if self.stdlib.contains(name) {
            return self.stdlib.call(name, &args_record, span.clone());
        }
        Err(Diagnostic::unknown_fn(name, span.clone()))
    }

    /// `map { in: list, fn: "name" }` — evaluator special form: resolves
    /// `fn` against the function table and applies it to each element,
    /// binding the element under the key `it`. Each application counts
    /// against `maxIterations`.
    fn eval_map(&mut self, args: &Expr, span: &Span, scope: &Rc<Environment>) -> Result<Value, Diagnostic> {
        let args_value = self.eval_expr(args, scope)?;
        let args_record = self.expect_record(args_value, span)?;
        let items = match args_record.get("in") {
            Some(Value::List(items)) => items.clone(),
            _ => return Err(Diagnostic::type_error("'map' requires a list 'in' field", span.clone())),
        };
        let fn_name = match args_record.get("fn") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(Diagnostic::type_error("'map' requires a string 'fn' field", span.clone())),
        };

        self.trace.emit(TraceEvent::new(&self.run_id, "map_start", Some(span.clone()), Value::Null));
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            // `call_function`'s trampoline charges `maxIterations` once per
            // call; charging here too would double-count each element.
            let mut call_args = Record::new();
            call_args.insert("it", item);
            out.push(self.call_function(&fn_name, call_args, span)?);
        }
        self.trace.emit(TraceEvent::new(&self.run_id, "map_end", Some(span.clone()), Value::Null));
        Ok(Value::List(out))
    }

    /// `reduce { in: list, init, fn: "name" }` — threads an accumulator
    /// (bound as `acc`) and the current element (bound as `it`) through a
    /// user function call per element.
    fn eval_reduce(&mut self, args: &Expr, span: &Span, scope: &Rc<Environment>) -> Result<Value, Diagnostic> {
        let args_value = self.eval_expr(args, scope)?;
        let args_record = self.expect_record(args_value, span)?;
        let items = match args_record.get("in") {
            Some(Value::List(items)) => items.clone(),
            _ => return Err(Diagnostic::type_error("'reduce' requires a list 'in' field", span.clone())),
        };
        let init = args_record.get("init").cloned().unwrap_or(Value::Null);
        let fn_name = match args_record.get("fn") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(Diagnostic::type_error("'reduce' requires a string 'fn' field", span.clone())),
        };

        let mut acc = init;
        for item in items {
            // `call_function`'s trampoline already charges `maxIterations`
            // once per call; see `eval_map`.
            let mut call_args = Record::new();
            call_args.insert("acc", acc);
            call_args.insert("it", item);
            acc = self.call_function(&fn_name, call_args, span)?;
        }
        Ok(acc)
    }

    fn eval_for(&mut self, iter: &Expr, binder: &str, body: &[Stmt], span: &Span, scope: &Rc<Environment>) -> Result<Value, Diagnostic> {
        let iter_value = self.eval_expr(iter, scope)?;
        let items = match iter_value {
            Value::List(items) => items,
            other => return Err(Diagnostic::ForNotList { found: other.type_name().to_string(), span: span.clone() }),
        };

        self.trace.emit(TraceEvent::new(&self.run_id, "for_start", Some(span.clone()), Value::Null));
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            self.budgets.note_iteration()?;
            let iter_scope = Environment::with_parent(scope.clone());
            iter_scope.define(binder, item, span.clone())?;
            out.push(self.eval_block(body, &iter_scope)?);
            self.trace.emit(TraceEvent::new(&self.run_id, "for_end", Some(span.clone()), Value::Null));
        }
        Ok(Value::List(out))
    }

    fn eval_loop(
        &mut self,
        init: &Expr,
        times: &Expr,
        binder: &str,
        body: &[Stmt],
        span: &Span,
        scope: &Rc<Environment>,
    ) -> Result<Value, Diagnostic> {
        let mut state = self.eval_expr(init, scope)?;
        let times_value = self.eval_expr(times, scope)?;
        let n = match times_value {
            Value::Number(n) if n >= 0.0 && n.fract() == 0.0 => n as i64,
            other => {
                return Err(Diagnostic::type_error(
                    format!("'loop' requires a non-negative integer 'times', found {}", other),
                    span.clone(),
                ))
            }
        };

        for _ in 0..n {
            self.budgets.note_iteration()?;
            let iter_scope = Environment::with_parent(scope.clone());
            iter_scope.define(binder, state, span.clone())?;
            state = self.eval_block(body, &iter_scope)?;
        }
        Ok(state)
    }

    fn eval_match(
        &mut self,
        subject: &Expr,
        ok_name: &str,
        ok_body: &[Stmt],
        err_name: &str,
        err_body: &[Stmt],
        span: &Span,
        scope: &Rc<Environment>,
    ) -> Result<Value, Diagnostic> {
        let subject_value = self.eval_expr(subject, scope)?;
        let record = match subject_value {
            Value::Record(r) => r,
            other => return Err(Diagnostic::MatchNotRecord { found: other.type_name().to_string(), span: span.clone() }),
        };

        self.trace.emit(TraceEvent::new(&self.run_id, "match_start", Some(span.clone()), Value::Null));
        let result = if let Some(inner) = record.get("ok") {
            let arm_scope = Environment::with_parent(scope.clone());
            arm_scope.define(ok_name, inner.clone(), span.clone())?;
            self.eval_block(ok_body, &arm_scope)
        } else if let Some(inner) = record.get("err") {
            let arm_scope = Environment::with_parent(scope.clone());
            arm_scope.define(err_name, inner.clone(), span.clone())?;
            self.eval_block(err_body, &arm_scope)
        } else {
            Err(Diagnostic::MatchNoArm { span: span.clone() })
        };
        self.trace.emit(TraceEvent::new(&self.run_id, "match_end", Some(span.clone()), Value::Null));
        result
    }

    fn eval_try(&mut self, body: &[Stmt], catch_name: &str, catch_body: &[Stmt], scope: &Rc<Environment>) -> Result<Value, Diagnostic> {
        self.trace.emit(TraceEvent::new(&self.run_id, "try_start", None, Value::Null));
        let result = self.eval_block(body, scope);
        self.trace.emit(TraceEvent::new(&self.run_id, "try_end", None, Value::Null));

        match result {
            Ok(v) => Ok(v),
            Err(e) if e.recoverable() => {
                let catch_scope = Environment::with_parent(scope.clone());
                catch_scope.define(catch_name, Value::Record(e.catch_record()), e.span().cloned().unwrap_or(Span::point("", 0, 0)))?;
                self.eval_block(catch_body, &catch_scope)
            }
            Err(e) => Err(e),
        }
    }

    fn eval_filter_block(&mut self, input: &Expr, binder: &str, body: &[Stmt], span: &Span, scope: &Rc<Environment>) -> Result<Value, Diagnostic> {
        let items = match self.eval_expr(input, scope)? {
            Value::List(items) => items,
            other => return Err(Diagnostic::type_error(format!("'filter' requires a list, found {}", other.type_name()), span.clone())),
        };

        let mut out = Vec::new();
        for item in items {
            self.budgets.note_iteration()?;
            let iter_scope = Environment::with_parent(scope.clone());
            iter_scope.define(binder, item.clone(), span.clone())?;
            let result = self.eval_block(body, &iter_scope)?;
            let keep = match &result {
                Value::Record(r) => r.values().next().map(|v| v.is_truthy()).unwrap_or(false),
                other => other.is_truthy(),
            };
            if keep {
                out.push(item);
            }
        }
        Ok(Value::List(out))
    }

    fn eval_filter_fn(&mut self, input: &Expr, fn_name: &str, span: &Span, scope: &Rc<Environment>) -> Result<Value, Diagnostic> {
        let items = match self.eval_expr(input, scope)? {
            Value::List(items) => items,
            other => return Err(Diagnostic::type_error(format!("'filter' requires a list, found {}", other.type_name()), span.clone())),
        };

        let mut out = Vec::new();
        for item in items {
            // `call_function`'s trampoline already charges `maxIterations`
            // once per call; see `eval_map`.
            let mut call_args = Record::new();
            call_args.insert("it", item.clone());
            let result = self.call_function(fn_name, call_args, span)?;
            if result.is_truthy() {
                out.push(item);
            }
        }
        Ok(Value::List(out))
    }
}

/// Entry point for hosts: runs `program` to completion (or a fault) with the
/// given injected registries/policy/trace sink.
#[allow(clippy::too_many_arguments)]
pub fn run_program(
    program: &Program,
    stdlib: &StdlibRegistry,
    tools: &ToolRegistry,
    policy: &Policy,
    trace: &mut dyn TraceSink,
    run_id: String,
) -> Result<RunOutcome, Diagnostic> {
    let evaluator = Evaluator::new(program, stdlib, tools, policy, trace, run_id);
    evaluator.run(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;
    use crate::policy::Policy;
    use crate::trace::NullSink;

    fn run_src(src: &str, policy: &Policy) -> Result<Value, Diagnostic> {
        let program = parse_program("t.a0", src).unwrap();
        let stdlib = StdlibRegistry::new();
        let tools = ToolRegistry::new();
        let mut sink = NullSink;
        run_program(&program, &stdlib, &tools, policy, &mut sink, "run-1".to_string()).map(|o| o.value)
    }

    fn allow_all_policy() -> Policy {
        Policy::resolve(std::path::Path::new("/nonexistent-a0-test-dir"), true)
    }

    #[test]
    fn hello_returns_the_bound_value() {
        let policy = allow_all_policy();
        let result = run_src("let x = 42\nreturn { value: x }", &policy).unwrap();
        let record = result.as_record().unwrap();
        assert_eq!(record.get("value"), Some(&Value::Number(42.0)));
    }

    #[test]
    fn spread_then_explicit_key_overrides_in_place() {
        let policy = allow_all_policy();
        let result = run_src("let base = {a:1,b:2}\nreturn {...base, b:3}", &policy).unwrap();
        let record = result.as_record().unwrap();
        assert_eq!(record.get("a"), Some(&Value::Number(1.0)));
        assert_eq!(record.get("b"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn assert_failure_raises_e_assert() {
        let policy = allow_all_policy();
        let err = run_src("assert { that: false, msg: \"no\" }\nreturn {}", &policy).unwrap_err();
        assert_eq!(err.code(), "E_ASSERT");
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn for_budget_trips_after_limit() {
        let policy = allow_all_policy();
        let err = run_src(
            "budget { maxIterations: 2 }\nlet xs = [1,2,3,4]\nlet ys = for { in: xs, as: \"i\" } { return i + 1 }\nreturn { ys }",
            &policy,
        )
        .unwrap_err();
        assert_eq!(err.code(), "E_BUDGET");
    }

    #[test]
    fn try_catch_binds_the_error_code() {
        let policy = allow_all_policy();
        let result = run_src(
            "let r = try { let bad = 1 / 0\nreturn bad } catch e { return e.code }\nreturn { code: r }",
            &policy,
        )
        .unwrap();
        let record = result.as_record().unwrap();
        assert_eq!(record.get("code"), Some(&Value::String("E_TYPE".to_string())));
    }

    #[test]
    fn duplicate_literal_keys_are_rejected() {
        let policy = allow_all_policy();
        let err = run_src("return { a: 1, a: 2 }", &policy).unwrap_err();
        assert_eq!(err.code(), "E_AST");
    }

    #[test]
    fn deep_equality_ignores_record_key_order() {
        let policy = allow_all_policy();
        let result = run_src(
            "return eq { a: { x: 1, y: 2 }, b: { y: 2, x: 1 } }",
            &policy,
        )
        .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn cap_denied_at_program_entry_stops_before_execution() {
        let policy = Policy::resolve(std::path::Path::new("/nonexistent-a0-test-dir"), false);
        let err = run_src("cap { fs.read: true }\nreturn {}", &policy).unwrap_err();
        assert_eq!(err.code(), "E_CAP_DENIED");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn map_charges_exactly_one_iteration_per_element() {
        let policy = allow_all_policy();
        let src = "budget { maxIterations: 3 }\nfn f(it) {\n  return it + 1\n}\nlet xs = [1,2]\nlet ys = map { in: xs, fn: \"f\" }\nreturn { ys }";
        let result = run_src(src, &policy).unwrap();
        let record = result.as_record().unwrap();
        assert_eq!(record.get("ys"), Some(&Value::List(vec![Value::Number(2.0), Value::Number(3.0)])));
    }

    #[test]
    fn filter_fn_charges_exactly_one_iteration_per_element() {
        let policy = allow_all_policy();
        let src = "budget { maxIterations: 4 }\nfn is_even(it) {\n  return it % 2 == 0\n}\nlet xs = [1,2,3,4]\nlet ys = filter { in: xs, fn: \"is_even\" }\nreturn { ys }";
        let result = run_src(src, &policy).unwrap();
        let record = result.as_record().unwrap();
        assert_eq!(record.get("ys"), Some(&Value::List(vec![Value::Number(2.0), Value::Number(4.0)])));
    }
}
