//! Canonical pretty-printer. Walks the AST the parser produces and re-emits
//! source text; never touches the token stream directly, so it automatically
//! stays in sync with whatever the grammar accepts.
//!
//! Comments are not part of the AST, so they cannot round-trip. Callers that
//! care should check `contains_comment` themselves and warn before writing.

use crate::ast::{BinOp, CapHeader, BudgetHeader, Expr, FnDecl, Program, RecordEntry, Stmt, ToolMode};
use crate::diagnostic::Diagnostic;
use crate::parser::parse_program;

const INDENT: &str = "  ";

/// Formats A0 source. Parses first (so malformed input is rejected the same
/// way `a0 check` would reject it), then re-emits canonically.
pub fn format_source(file: &str, src: &str) -> Result<String, Diagnostic> {
    let program = parse_program(file, src)?;
    Ok(format_program(&program))
}

/// True if `src` contains a `#` line comment. The formatter drops comments
/// (they are not part of the AST), so callers should surface this as a
/// warning before overwriting a file.
pub fn contains_comment(src: &str) -> bool {
    // A `#` inside a string literal is not a comment, so this has to track
    // quoting rather than scanning the raw byte. Escapes only ever precede
    // the char they escape, so a single "are we inside a string" flag and a
    // one-shot "skip next char" flag are enough.
    let mut in_string = false;
    let mut escape = false;
    for ch in src.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '#' if !in_string => return true,
            _ => {}
        }
    }
    false
}

pub fn format_program(program: &Program) -> String {
    let mut out = String::new();
    if let Some(cap) = &program.cap {
        format_cap_header(cap, &mut out);
        out.push('\n');
    }
    if let Some(budget) = &program.budget {
        format_budget_header(budget, &mut out);
        out.push('\n');
    }
    for f in &program.fns {
        format_fn_decl(f, &mut out);
        out.push('\n');
    }
    format_block_bare(&program.body, 0, &mut out);

    // Canonical output has no trailing blank lines and ends with exactly one
    // newline.
    while out.ends_with('\n') {
        out.pop();
    }
    out.push('\n');
    out
}

fn format_cap_header(cap: &CapHeader, out: &mut String) {
    out.push_str("cap {\n");
    for (name, _) in &cap.names {
        out.push_str(INDENT);
        out.push_str(name);
        out.push_str(": true\n");
    }
    out.push_str("}\n");
}

fn format_budget_header(budget: &BudgetHeader, out: &mut String) {
    out.push_str("budget {\n");
    for (name, value, _) in &budget.fields {
        out.push_str(INDENT);
        out.push_str(name);
        out.push_str(": ");
        out.push_str(&value.to_string());
        out.push('\n');
    }
    out.push_str("}\n");
}

fn format_fn_decl(f: &FnDecl, out: &mut String) {
    out.push_str("fn ");
    out.push_str(&f.name);
    out.push('(');
    out.push_str(&f.params.join(", "));
    out.push_str(") {\n");
    format_block_bare(&f.body, 1, out);
    out.push_str("}\n");
}

fn push_indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn format_block_bare(stmts: &[Stmt], depth: usize, out: &mut String) {
    for stmt in stmts {
        push_indent(depth, out);
        format_stmt(stmt, depth, out);
        out.push('\n');
    }
}

/// A braced block: `{ ... }` with the opening/closing braces printed inline
/// at the caller's current indent depth.
fn format_braced_block(stmts: &[Stmt], depth: usize, out: &mut String) {
    out.push_str("{\n");
    format_block_bare(stmts, depth + 1, out);
    push_indent(depth, out);
    out.push('}');
}

fn format_stmt(stmt: &Stmt, depth: usize, out: &mut String) {
    match stmt {
        Stmt::Let { name, expr, .. } => {
            out.push_str("let ");
            out.push_str(name);
            out.push_str(" = ");
            format_expr(expr, depth, out);
        }
        Stmt::Return { expr, .. } => {
            out.push_str("return ");
            format_expr(expr, depth, out);
        }
        Stmt::Arrow { expr, name, .. } => {
            format_expr(expr, depth, out);
            out.push_str(" -> ");
            out.push_str(name);
        }
        Stmt::Expr { expr, .. } => {
            format_expr(expr, depth, out);
        }
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

fn format_binop(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Gt => ">",
        BinOp::Lt => "<",
        BinOp::Ge => ">=",
        BinOp::Le => "<=",
    }
}

fn format_record_entries(entries: &[RecordEntry], depth: usize, out: &mut String) {
    // Short records print inline; once they'd need to wrap, one entry per
    // line. The parser doesn't distinguish these stylistically, so this is
    // a formatter-only convenience, not a grammar concern.
    let inline = fits_inline(entries);
    if entries.is_empty() {
        out.push_str("{}");
        return;
    }
    if inline {
        out.push_str("{ ");
        for (i, e) in entries.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            format_record_entry(e, depth, out);
        }
        out.push_str(" }");
    } else {
        out.push_str("{\n");
        for e in entries {
            push_indent(depth + 1, out);
            format_record_entry(e, depth + 1, out);
            out.push_str(",\n");
        }
        push_indent(depth, out);
        out.push('}');
    }
}

fn fits_inline(entries: &[RecordEntry]) -> bool {
    entries.len() <= 3
        && entries.iter().all(|e| match e {
            RecordEntry::Pair { value, .. } => is_simple(value),
            RecordEntry::Spread { expr } => is_simple(expr),
        })
}

fn is_simple(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Null { .. }
            | Expr::Bool { .. }
            | Expr::Int { .. }
            | Expr::Float { .. }
            | Expr::Str { .. }
            | Expr::Ident { .. }
            | Expr::Field { .. }
            | Expr::Index { .. }
    )
}

fn format_record_entry(entry: &RecordEntry, depth: usize, out: &mut String) {
    match entry {
        RecordEntry::Pair { key, value } => {
            // Shorthand `{ ys }` round-trips only when the value is exactly
            // `Ident(key)`; otherwise the explicit `key: value` form is used.
            if let Expr::Ident { name, .. } = value {
                if name == key {
                    out.push_str(key);
                    return;
                }
            }
            out.push_str(key);
            out.push_str(": ");
            format_expr(value, depth, out);
        }
        RecordEntry::Spread { expr } => {
            out.push_str("...");
            format_expr(expr, depth, out);
        }
    }
}

fn format_expr(expr: &Expr, depth: usize, out: &mut String) {
    match expr {
        Expr::Null { .. } => out.push_str("null"),
        Expr::Bool { value, .. } => out.push_str(if *value { "true" } else { "false" }),
        Expr::Int { value, .. } => out.push_str(&value.to_string()),
        Expr::Float { value, .. } => out.push_str(&format_number(*value)),
        Expr::Str { value, .. } => out.push_str(&quote_string(value)),
        Expr::Ident { name, .. } => out.push_str(name),
        Expr::Field { base, name, .. } => {
            format_expr(base, depth, out);
            out.push('.');
            out.push_str(name);
        }
        Expr::Index { base, index, .. } => {
            format_expr(base, depth, out);
            out.push('[');
            out.push_str(&index.to_string());
            out.push(']');
        }
        Expr::List { items, .. } => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                format_expr(item, depth, out);
            }
            out.push(']');
        }
        Expr::Record { entries, .. } => format_record_entries(entries, depth, out),
        Expr::Binary { op, lhs, rhs, .. } => {
            format_expr(lhs, depth, out);
            out.push(' ');
            out.push_str(format_binop(*op));
            out.push(' ');
            format_expr(rhs, depth, out);
        }
        Expr::Neg { expr, .. } => {
            out.push('-');
            format_expr(expr, depth, out);
        }
        Expr::ToolCall { mode, name, args, .. } => {
            out.push_str(match mode {
                ToolMode::Call => "call? ",
                ToolMode::Do => "do ",
            });
            out.push_str(name);
            out.push(' ');
            format_expr(args, depth, out);
        }
        Expr::Assert { that, msg, details, .. } => {
            format_assert_or_check("assert", that, msg, details, depth, out);
        }
        Expr::Check { that, msg, details, .. } => {
            format_assert_or_check("check", that, msg, details, depth, out);
        }
        Expr::FnCall { name, args, .. } => {
            out.push_str(name);
            out.push(' ');
            format_expr(args, depth, out);
        }
        Expr::IfBlock { cond, then_body, else_body, .. } => {
            out.push_str("if ");
            format_expr(cond, depth, out);
            out.push(' ');
            format_braced_block(then_body, depth, out);
            if let Some(else_body) = else_body {
                out.push_str(" else ");
                format_braced_block(else_body, depth, out);
            }
        }
        Expr::IfRecord { cond, then, els, .. } => {
            out.push_str("if {\n");
            push_indent(depth + 1, out);
            out.push_str("cond: ");
            format_expr(cond, depth + 1, out);
            out.push_str(",\n");
            push_indent(depth + 1, out);
            out.push_str("then: ");
            format_expr(then, depth + 1, out);
            out.push_str(",\n");
            push_indent(depth + 1, out);
            out.push_str("else: ");
            format_expr(els, depth + 1, out);
            out.push('\n');
            push_indent(depth, out);
            out.push('}');
        }
        Expr::For { iter, binder, body, .. } => {
            out.push_str("for { in: ");
            format_expr(iter, depth, out);
            out.push_str(", as: ");
            out.push_str(&quote_string(binder));
            out.push_str(" } ");
            format_braced_block(body, depth, out);
        }
        Expr::Loop { init, times, binder, body, .. } => {
            out.push_str("loop { in: ");
            format_expr(init, depth, out);
            out.push_str(", times: ");
            format_expr(times, depth, out);
            out.push_str(", as: ");
            out.push_str(&quote_string(binder));
            out.push_str(" } ");
            format_braced_block(body, depth, out);
        }
        Expr::Match { subject, ok_name, ok_body, err_name, err_body, .. } => {
            out.push_str("match ");
            format_expr(subject, depth, out);
            out.push_str(" {\n");
            push_indent(depth + 1, out);
            out.push_str("ok ");
            out.push_str(ok_name);
            out.push(' ');
            format_braced_block(ok_body, depth + 1, out);
            out.push('\n');
            push_indent(depth + 1, out);
            out.push_str("err ");
            out.push_str(err_name);
            out.push(' ');
            format_braced_block(err_body, depth + 1, out);
            out.push('\n');
            push_indent(depth, out);
            out.push('}');
        }
        Expr::Try { body, catch_name, catch_body, .. } => {
            out.push_str("try ");
            format_braced_block(body, depth, out);
            out.push_str(" catch ");
            out.push_str(catch_name);
            out.push(' ');
            format_braced_block(catch_body, depth, out);
        }
        Expr::FilterBlock { input, binder, body, .. } => {
            out.push_str("filter { in: ");
            format_expr(input, depth, out);
            out.push_str(", as: ");
            out.push_str(&quote_string(binder));
            out.push_str(" } ");
            format_braced_block(body, depth, out);
        }
        Expr::FilterFn { input, fn_name, .. } => {
            out.push_str("filter { in: ");
            format_expr(input, depth, out);
            out.push_str(", fn: ");
            out.push_str(&quote_string(fn_name));
            out.push_str(" }");
        }
        Expr::FilterBy { input, key, .. } => {
            out.push_str("filter { in: ");
            format_expr(input, depth, out);
            out.push_str(", by: ");
            out.push_str(&quote_string(key));
            out.push_str(" }");
        }
    }
}

fn format_assert_or_check(keyword: &str, that: &Expr, msg: &Expr, details: &Option<Box<Expr>>, depth: usize, out: &mut String) {
    out.push_str(keyword);
    out.push_str(" { that: ");
    format_expr(that, depth, out);
    out.push_str(", msg: ");
    format_expr(msg, depth, out);
    if let Some(details) = details {
        out.push_str(", details: ");
        format_expr(details, depth, out);
    }
    out.push_str(" }");
}
