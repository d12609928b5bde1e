//! Static checks that run between parsing and evaluation. Unlike the parser,
//! the validator does not stop at the first fault: it walks the whole program
//! and returns every diagnostic it finds, so `a0 check` can report them all at
//! once.

use crate::ast::*;
use crate::capability::{capability_id_for_tool, CapabilityMode, KNOWN_CAPABILITIES};
use crate::diagnostic::Diagnostic;
use std::collections::HashSet;

const KNOWN_BUDGET_FIELDS: &[&str] = &["timeMs", "maxToolCalls", "maxBytesWritten", "maxIterations"];

pub fn validate(program: &Program, stdlib_names: &HashSet<String>) -> Vec<Diagnostic> {
    let mut v = Validator {
        errors: Vec::new(),
        declared_caps: HashSet::new(),
        stdlib_names,
        fn_names: HashSet::new(),
        scopes: vec![HashSet::new()],
    };
    v.program(program);
    v.errors
}

struct Validator<'a> {
    errors: Vec<Diagnostic>,
    declared_caps: HashSet<String>,
    stdlib_names: &'a HashSet<String>,
    fn_names: HashSet<String>,
    scopes: Vec<HashSet<String>>,
}

impl<'a> Validator<'a> {
    fn program(&mut self, program: &Program) {
        if let Some(cap) = &program.cap {
            for (name, span) in &cap.names {
                if !KNOWN_CAPABILITIES.contains(&name.as_str()) {
                    self.errors.push(Diagnostic::UnknownCap { name: name.clone(), span: span.clone() });
                } else {
                    self.declared_caps.insert(name.clone());
                }
            }
        }
        if let Some(budget) = &program.budget {
            for (name, _value, span) in &budget.fields {
                if !KNOWN_BUDGET_FIELDS.contains(&name.as_str()) {
                    self.errors.push(Diagnostic::UnknownBudget { name: name.clone(), span: span.clone() });
                }
            }
        }

        for f in &program.fns {
            if self.stdlib_names.contains(&f.name) || !self.fn_names.insert(f.name.clone()) {
                self.errors.push(Diagnostic::FnDup { name: f.name.clone(), span: f.span.clone() });
            }
        }
        for f in &program.fns {
            self.push_scope();
            for p in &f.params {
                self.bind(p, &f.span);
            }
            self.block(&f.body, &f.span);
            self.pop_scope();
        }

        self.block(&program.body, &program.span);
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashSet::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: &str, span: &crate::span::Span) {
        let scope = self.scopes.last_mut().expect("at least one scope");
        if !scope.insert(name.to_string()) {
            self.errors.push(Diagnostic::DupBinding { name: name.to_string(), span: span.clone() });
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|s| s.contains(name))
    }

    /// Validates a statement sequence, including the "exactly one terminal
    /// `return`, nothing after it" rule.
    fn block(&mut self, stmts: &[Stmt], enclosing: &crate::span::Span) {
        let mut seen_return = false;
        for (i, stmt) in stmts.iter().enumerate() {
            if seen_return {
                self.errors.push(Diagnostic::ReturnNotLast { span: stmt.span().clone() });
            }
            if let Stmt::Return { .. } = stmt {
                seen_return = true;
            }
            self.stmt(stmt);
            let _ = i;
        }
        if !seen_return {
            self.errors.push(Diagnostic::NoReturn { span: enclosing.clone() });
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let { name, expr, span } => {
                self.expr(expr);
                self.bind(name, span);
            }
            Stmt::Arrow { expr, name, span } => {
                self.expr(expr);
                self.bind(name, span);
            }
            Stmt::Expr { expr, .. } => self.expr(expr),
            Stmt::Return { expr, .. } => self.expr(expr),
        }
    }

    fn expr(&mut self, e: &Expr) {
        match e {
            Expr::Null { .. } | Expr::Bool { .. } | Expr::Int { .. } | Expr::Float { .. } | Expr::Str { .. } => {}
            Expr::Ident { name, span } => {
                if !self.is_bound(name) {
                    self.errors.push(Diagnostic::Unbound { name: name.clone(), span: span.clone() });
                }
            }
            Expr::Field { base, .. } => self.expr(base),
            Expr::Index { base, .. } => self.expr(base),
            Expr::List { items, .. } => items.iter().for_each(|i| self.expr(i)),
            Expr::Record { entries, .. } => {
                for entry in entries {
                    match entry {
                        RecordEntry::Pair { value, .. } => self.expr(value),
                        RecordEntry::Spread { expr } => self.expr(expr),
                    }
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            Expr::Neg { expr, .. } => self.expr(expr),
            Expr::ToolCall { mode, name, args, span } => {
                self.expr(args);
                let cap_id = capability_id_for_tool(name);
                match cap_id {
                    None => self.errors.push(Diagnostic::UnknownTool { name: name.clone(), span: span.clone() }),
                    Some(cap_id) => {
                        if !self.declared_caps.contains(cap_id) {
                            self.errors.push(Diagnostic::UndeclaredCap { name: cap_id.to_string(), span: span.clone() });
                        }
                        if *mode == ToolMode::Call
                            && crate::capability::mode_of(cap_id) != CapabilityMode::Read
                        {
                            self.errors.push(Diagnostic::CallEffect { name: name.clone(), span: span.clone() });
                        }
                    }
                }
            }
            Expr::Assert { that, msg, details, .. } => {
                self.expr(that);
                self.expr(msg);
                if let Some(d) = details {
                    self.expr(d);
                }
            }
            Expr::Check { that, msg, details, .. } => {
                self.expr(that);
                self.expr(msg);
                if let Some(d) = details {
                    self.expr(d);
                }
            }
            Expr::FnCall { name, args, span } => {
                self.expr(args);
                if !self.stdlib_names.contains(name) && !self.fn_names.contains(name) {
                    self.errors.push(Diagnostic::UnknownFn { name: name.clone(), span: span.clone() });
                }
            }
            Expr::IfBlock { cond, then_body, else_body, span } => {
                self.expr(cond);
                self.push_scope();
                self.block(then_body, span);
                self.pop_scope();
                if let Some(body) = else_body {
                    self.push_scope();
                    self.block(body, span);
                    self.pop_scope();
                }
            }
            Expr::IfRecord { cond, then, els, .. } => {
                self.expr(cond);
                self.expr(then);
                self.expr(els);
            }
            Expr::For { iter, binder, body, span } => {
                self.expr(iter);
                self.push_scope();
                self.bind(binder, span);
                self.block(body, span);
                self.pop_scope();
            }
            Expr::Loop { init, times, binder, body, span } => {
                self.expr(init);
                self.expr(times);
                self.push_scope();
                self.bind(binder, span);
                self.block(body, span);
                self.pop_scope();
            }
            Expr::Match { subject, ok_name, ok_body, err_name, err_body, span } => {
                self.expr(subject);
                self.push_scope();
                self.bind(ok_name, span);
                self.block(ok_body, span);
                self.pop_scope();
                self.push_scope();
                self.bind(err_name, span);
                self.block(err_body, span);
                self.pop_scope();
            }
            Expr::Try { body, catch_name, catch_body, span } => {
                self.push_scope();
                self.block(body, span);
                self.pop_scope();
                self.push_scope();
                self.bind(catch_name, span);
                self.block(catch_body, span);
                self.pop_scope();
            }
            Expr::FilterBlock { input, binder, body, span } => {
                self.expr(input);
                self.push_scope();
                self.bind(binder, span);
                self.block(body, span);
                self.pop_scope();
            }
            Expr::FilterFn { input, fn_name, span } => {
                self.expr(input);
                if !self.stdlib_names.contains(fn_name) && !self.fn_names.contains(fn_name) {
                    self.errors.push(Diagnostic::UnknownFn { name: fn_name.clone(), span: span.clone() });
                }
            }
            Expr::FilterBy { input, .. } => self.expr(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn check(src: &str) -> Vec<Diagnostic> {
        let program = parse_program("t.a0", src).expect("parse failed");
        validate(&program, &HashSet::new())
    }

    #[test]
    fn well_formed_program_has_no_errors() {
        let errs = check("let x = 1\nreturn { value: x }");
        assert!(errs.is_empty(), "{:?}", errs);
    }

    #[test]
    fn missing_terminal_return_is_an_error() {
        let errs = check("let x = 1");
        assert!(errs.iter().any(|e| e.code() == "E_NO_RETURN"));
    }

    #[test]
    fn statement_after_return_is_an_error() {
        let errs = check("return 1\nreturn 2");
        assert!(errs.iter().any(|e| e.code() == "E_RETURN_NOT_LAST"));
    }

    #[test]
    fn duplicate_let_binding_is_an_error() {
        let errs = check("let x = 1\nlet x = 2\nreturn x");
        assert!(errs.iter().any(|e| e.code() == "E_DUP_BINDING"));
    }

    #[test]
    fn arrow_binding_colliding_with_let_is_an_error() {
        let errs = check("let x = 1\n2 -> x\nreturn x");
        assert!(errs.iter().any(|e| e.code() == "E_DUP_BINDING"));
    }

    #[test]
    fn unbound_identifier_is_an_error() {
        let errs = check("return y");
        assert!(errs.iter().any(|e| e.code() == "E_UNBOUND"));
    }

    #[test]
    fn undeclared_capability_use_is_an_error() {
        let errs = check(r#"return do fs.read { path: "x" }"#);
        assert!(errs.iter().any(|e| e.code() == "E_UNDECLARED_CAP"));
    }

    #[test]
    fn unknown_capability_in_header_is_an_error() {
        let errs = check("cap { nope.bogus: true }\nreturn null");
        assert!(errs.iter().any(|e| e.code() == "E_UNKNOWN_CAP"));
    }

    #[test]
    fn call_on_an_effect_tool_is_an_error() {
        let errs = check(r#"cap { fs.write: true }
return call? fs.write { path: "x", bytes: "y" }"#);
        assert!(errs.iter().any(|e| e.code() == "E_CALL_EFFECT"));
    }

    #[test]
    fn do_on_a_read_tool_is_allowed() {
        let errs = check(r#"cap { fs.read: true }
return do fs.read { path: "x" }"#);
        assert!(!errs.iter().any(|e| e.code() == "E_CALL_EFFECT"));
    }

    #[test]
    fn unknown_budget_field_is_an_error() {
        let errs = check("budget { bogusField: 1 }\nreturn null");
        assert!(errs.iter().any(|e| e.code() == "E_UNKNOWN_BUDGET"));
    }

    #[test]
    fn duplicate_fn_name_is_an_error() {
        let errs = check("fn f(a) { return a }\nfn f(b) { return b }\nreturn null");
        assert!(errs.iter().any(|e| e.code() == "E_FN_DUP"));
    }

    #[test]
    fn fn_colliding_with_stdlib_name_is_an_error() {
        let program = crate::parser::parse_program("t.a0", "fn len(a) { return a }\nreturn null").unwrap();
        let mut stdlib = HashSet::new();
        stdlib.insert("len".to_string());
        let errs = validate(&program, &stdlib);
        assert!(errs.iter().any(|e| e.code() == "E_FN_DUP"));
    }

    #[test]
    fn for_binder_is_scoped_to_its_body() {
        let errs = check(r#"for { in: [1,2], as: "i" } { return i }
return i"#);
        assert!(errs.iter().any(|e| e.code() == "E_UNBOUND"));
    }

    #[test]
    fn unknown_stdlib_or_user_function_call_is_an_error() {
        let errs = check("return bogusFn { x: 1 }");
        assert!(errs.iter().any(|e| e.code() == "E_UNKNOWN_FN"));
    }
}
