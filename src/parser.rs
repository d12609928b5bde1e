//! Recursive-descent parser: token stream (see `lexer.rs`) to the typed AST in
//! `ast.rs`. One function per grammar production, left-associative
//! throughout, fixed precedence ladder. Stops at the first parse error.

use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::span::Span;

pub fn parse_program(file: &str, src: &str) -> Result<Program, Diagnostic> {
    let tokens = tokenize(file, src)?;
    let mut p = Parser { tokens, pos: 0, file: file.to_string() };
    p.program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: String,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].span.clone()
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span.clone()
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Span, Diagnostic> {
        if self.check(&kind) {
            Ok(self.advance().span)
        } else {
            Err(Diagnostic::parse(
                format!("expected {}, found {:?}", what, self.peek()),
                self.peek_span(),
                Some(format!("expected {}", what)),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), Diagnostic> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                let span = self.advance().span;
                Ok((name, span))
            }
            other => Err(Diagnostic::parse(
                format!("expected identifier, found {:?}", other),
                self.peek_span(),
                None,
            )),
        }
    }

    fn expect_str(&mut self) -> Result<(String, Span), Diagnostic> {
        match self.peek().clone() {
            TokenKind::Str(s) => {
                let span = self.advance().span;
                Ok((s, span))
            }
            other => Err(Diagnostic::parse(
                format!("expected string literal, found {:?}", other),
                self.peek_span(),
                None,
            )),
        }
    }

    /// Parses `ident ("." ident)*` and joins with `.`, for capability ids and
    /// tool names written in source as bare dotted paths.
    fn dotted_name(&mut self) -> Result<(String, Span), Diagnostic> {
        let (first, mut span) = self.expect_ident()?;
        let mut parts = vec![first];
        while self.check(&TokenKind::Dot) {
            self.advance();
            let (part, part_span) = self.expect_ident()?;
            parts.push(part);
            span = span.cover(&part_span);
        }
        Ok((parts.join("."), span))
    }

    // ---- program ----

    fn program(&mut self) -> Result<Program, Diagnostic> {
        let start = self.peek_span();
        let cap = if self.check(&TokenKind::Cap) { Some(self.cap_header()?) } else { None };
        let budget = if self.check(&TokenKind::Budget) { Some(self.budget_header()?) } else { None };

        let mut fns = Vec::new();
        while self.check(&TokenKind::Fn) {
            fns.push(self.fn_decl()?);
        }

        let mut body = Vec::new();
        while !self.check(&TokenKind::Eof) {
            body.push(self.stmt()?);
        }
        let end = self.prev_span();

        Ok(Program { cap, budget, fns, body, span: start.cover(&end) })
    }

    fn cap_header(&mut self) -> Result<CapHeader, Diagnostic> {
        let start = self.expect(TokenKind::Cap, "'cap'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut names = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let (name, span) = self.dotted_name()?;
            self.expect(TokenKind::Colon, "':'")?;
            // value is `true`/`false`; we only need the capability name.
            if self.check(&TokenKind::True) || self.check(&TokenKind::False) {
                self.advance();
            } else {
                return Err(Diagnostic::parse("expected boolean value in cap header", self.peek_span(), None));
            }
            names.push((name, span));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?;
        Ok(CapHeader { names, span: start.cover(&end) })
    }

    fn budget_header(&mut self) -> Result<BudgetHeader, Diagnostic> {
        let start = self.expect(TokenKind::Budget, "'budget'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let (name, span) = self.expect_ident()?;
            self.expect(TokenKind::Colon, "':'")?;
            let value = match self.peek().clone() {
                TokenKind::Int(n) => {
                    self.advance();
                    n
                }
                other => return Err(Diagnostic::parse(format!("expected integer, found {:?}", other), self.peek_span(), None)),
            };
            fields.push((name, value, span));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?;
        Ok(BudgetHeader { fields, span: start.cover(&end) })
    }

    fn fn_decl(&mut self) -> Result<FnDecl, Diagnostic> {
        let start = self.expect(TokenKind::Fn, "'fn'")?;
        let (name, _) = self.expect_ident()?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let (p, _) = self.expect_ident()?;
            params.push(p);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let body = self.block_until(&TokenKind::RBrace)?;
        let end = self.expect(TokenKind::RBrace, "'}'")?;
        Ok(FnDecl { name, params, body, span: start.cover(&end) })
    }

    fn block_until(&mut self, closer: &TokenKind) -> Result<Vec<Stmt>, Diagnostic> {
        let mut stmts = Vec::new();
        while !self.check(closer) && !self.check(&TokenKind::Eof) {
            stmts.push(self.stmt()?);
        }
        Ok(stmts)
    }

    fn braced_block(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let body = self.block_until(&TokenKind::RBrace)?;
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(body)
    }

    // ---- statements ----

    fn stmt(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.peek_span();
        if self.check(&TokenKind::Let) {
            self.advance();
            let (name, _) = self.expect_ident()?;
            self.expect(TokenKind::Eq, "'='")?;
            let expr = self.expr()?;
            let end = expr.span().clone();
            return Ok(Stmt::Let { name, expr, span: start.cover(&end) });
        }
        if self.check(&TokenKind::Return) {
            self.advance();
            let expr = self.expr()?;
            let end = expr.span().clone();
            return Ok(Stmt::Return { expr, span: start.cover(&end) });
        }
        let expr = self.expr()?;
        if self.check(&TokenKind::Arrow) {
            self.advance();
            let (name, end) = self.expect_ident()?;
            let span = start.cover(&end);
            return Ok(Stmt::Arrow { expr, name, span });
        }
        let end = expr.span().clone();
        Ok(Stmt::Expr { expr, span: start.cover(&end) })
    }

    // ---- expressions: precedence ladder ----

    fn expr(&mut self) -> Result<Expr, Diagnostic> {
        self.equality()
    }

    fn equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.compare()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.compare()?;
            let span = lhs.span().cover(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn compare(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Ge => BinOp::Ge,
                TokenKind::Le => BinOp::Le,
                _ => break,
            };
            self.advance();
            let rhs = self.additive()?;
            let span = lhs.span().cover(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.multiplicative()?;
            let span = lhs.span().cover(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            let span = lhs.span().cover(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, Diagnostic> {
        if self.check(&TokenKind::Minus) {
            let start = self.advance().span;
            let expr = self.unary()?;
            let span = start.cover(expr.span());
            return Ok(Expr::Neg { expr: Box::new(expr), span });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut base = self.primary()?;
        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let (name, end) = self.expect_ident()?;
                let span = base.span().cover(&end);
                base = Expr::Field { base: Box::new(base), name, span };
            } else if self.check(&TokenKind::LBracket) {
                self.advance();
                let (idx, _) = match self.peek().clone() {
                    TokenKind::Int(n) => (n, self.advance().span),
                    other => {
                        return Err(Diagnostic::parse(
                            format!("expected integer index, found {:?}", other),
                            self.peek_span(),
                            None,
                        ))
                    }
                };
                let end = self.expect(TokenKind::RBracket, "']'")?;
                let span = base.span().cover(&end);
                base = Expr::Index { base: Box::new(base), index: idx, span };
            } else {
                break;
            }
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, Diagnostic> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null { span })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool { value: true, span })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool { value: false, span })
            }
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Int { value: n, span })
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::Float { value: n, span })
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str { value: s, span })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.list_lit(),
            TokenKind::LBrace => self.record_lit(),
            TokenKind::CallQ => self.tool_call(ToolMode::Call),
            TokenKind::Do => self.tool_call(ToolMode::Do),
            TokenKind::Assert => self.assert_or_check(true),
            TokenKind::Check => self.assert_or_check(false),
            TokenKind::If => self.if_expr(),
            TokenKind::For => self.for_expr(),
            TokenKind::Loop => self.loop_expr(),
            TokenKind::Match => self.match_expr(),
            TokenKind::Try => self.try_expr(),
            TokenKind::Filter => self.filter_expr(),
            TokenKind::Ident(_) => self.ident_path_or_call(),
            other => Err(Diagnostic::parse(format!("unexpected token {:?}", other), span, None)),
        }
    }

    fn ident_path_or_call(&mut self) -> Result<Expr, Diagnostic> {
        let (first, mut span) = self.expect_ident()?;
        let mut parts = vec![first];
        while self.check(&TokenKind::Dot) {
            self.advance();
            let (part, part_span) = self.expect_ident()?;
            parts.push(part);
            span = span.cover(&part_span);
        }
        if self.check(&TokenKind::LBrace) {
            let args = self.record_lit()?;
            let call_span = span.cover(args.span());
            return Ok(Expr::FnCall { name: parts.join("."), args: Box::new(args), span: call_span });
        }
        let mut expr = Expr::Ident { name: parts[0].clone(), span: span.clone() };
        for part in &parts[1..] {
            expr = Expr::Field { base: Box::new(expr), name: part.clone(), span: span.clone() };
        }
        Ok(expr)
    }

    fn list_lit(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.expect(TokenKind::LBracket, "'['")?;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            items.push(self.expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBracket, "']'")?;
        Ok(Expr::List { items, span: start.cover(&end) })
    }

    fn record_lit(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.expect(TokenKind::LBrace, "'{'")?;
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::DotDotDot) {
                self.advance();
                let expr = self.expr()?;
                entries.push(RecordEntry::Spread { expr });
            } else {
                let (key, key_span) = self.expect_ident()?;
                if self.check(&TokenKind::Colon) {
                    self.advance();
                    let value = self.expr()?;
                    entries.push(RecordEntry::Pair { key, value });
                } else {
                    // shorthand: `{ ys }` means `{ ys: ys }`.
                    entries.push(RecordEntry::Pair {
                        key: key.clone(),
                        value: Expr::Ident { name: key, span: key_span },
                    });
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Expr::Record { entries, span: start.cover(&end) })
    }

    fn tool_call(&mut self, mode: ToolMode) -> Result<Expr, Diagnostic> {
        let start = self.advance().span; // `call?` or `do`
        let (name, _) = self.dotted_name()?;
        let args = self.record_lit()?;
        let span = start.cover(args.span());
        Ok(Expr::ToolCall { mode, name, args: Box::new(args), span })
    }

    fn assert_or_check(&mut self, is_assert: bool) -> Result<Expr, Diagnostic> {
        let start = self.advance().span; // `assert` or `check`
        let record = self.record_lit()?;
        let entries = match &record {
            Expr::Record { entries, .. } => entries,
            _ => unreachable!(),
        };
        let mut that = None;
        let mut msg = None;
        let mut details = None;
        for e in entries {
            if let RecordEntry::Pair { key, value } = e {
                match key.as_str() {
                    "that" => that = Some(value.clone()),
                    "msg" => msg = Some(value.clone()),
                    "details" => details = Some(Box::new(value.clone())),
                    _ => {}
                }
            }
        }
        let that = that.ok_or_else(|| Diagnostic::parse("missing 'that' field", start.clone(), None))?;
        let msg = msg.ok_or_else(|| Diagnostic::parse("missing 'msg' field", start.clone(), None))?;
        let span = start.cover(record.span());
        if is_assert {
            Ok(Expr::Assert { that: Box::new(that), msg: Box::new(msg), details, span })
        } else {
            Ok(Expr::Check { that: Box::new(that), msg: Box::new(msg), details, span })
        }
    }

    fn if_expr(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.expect(TokenKind::If, "'if'")?;
        if self.check(&TokenKind::LBrace) {
            let record = self.record_lit()?;
            let entries = match &record {
                Expr::Record { entries, .. } => entries,
                _ => unreachable!(),
            };
            let mut cond = None;
            let mut then = None;
            let mut els = None;
            for e in entries {
                if let RecordEntry::Pair { key, value } = e {
                    match key.as_str() {
                        "cond" => cond = Some(value.clone()),
                        "then" => then = Some(value.clone()),
                        "else" => els = Some(value.clone()),
                        _ => {}
                    }
                }
            }
            let cond = cond.ok_or_else(|| Diagnostic::parse("missing 'cond' field", start.clone(), None))?;
            let then = then.ok_or_else(|| Diagnostic::parse("missing 'then' field", start.clone(), None))?;
            let els = els.ok_or_else(|| Diagnostic::parse("missing 'else' field", start.clone(), None))?;
            let span = start.cover(record.span());
            return Ok(Expr::IfRecord { cond: Box::new(cond), then: Box::new(then), els: Box::new(els), span });
        }

        let cond = self.expr()?;
        let then_body = self.braced_block()?;
        let (else_body, end) = if self.eat(&TokenKind::Else) {
            let body = self.braced_block()?;
            (Some(body), self.prev_span())
        } else {
            (None, self.prev_span())
        };
        let span = start.cover(&end);
        Ok(Expr::IfBlock { cond: Box::new(cond), then_body, else_body, span })
    }

    fn for_expr(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.expect(TokenKind::For, "'for'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut iter = None;
        let mut binder = None;
        while !self.check(&TokenKind::RBrace) {
            let (key, _) = self.expect_ident()?;
            self.expect(TokenKind::Colon, "':'")?;
            match key.as_str() {
                "in" => iter = Some(self.expr()?),
                "as" => {
                    let (name, _) = self.expect_str()?;
                    binder = Some(name);
                }
                _ => {
                    self.expr()?;
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        let iter = iter.ok_or_else(|| Diagnostic::parse("missing 'in' field", start.clone(), None))?;
        let binder = binder.ok_or_else(|| Diagnostic::parse("missing 'as' field", start.clone(), None))?;
        let body = self.braced_block()?;
        let end = self.prev_span();
        Ok(Expr::For { iter: Box::new(iter), binder, body, span: start.cover(&end) })
    }

    fn loop_expr(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.expect(TokenKind::Loop, "'loop'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut init = None;
        let mut times = None;
        let mut binder = None;
        while !self.check(&TokenKind::RBrace) {
            let (key, _) = self.expect_ident()?;
            self.expect(TokenKind::Colon, "':'")?;
            match key.as_str() {
                "in" => init = Some(self.expr()?),
                "times" => times = Some(self.expr()?),
                "as" => {
                    let (name, _) = self.expect_str()?;
                    binder = Some(name);
                }
                _ => {
                    self.expr()?;
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        let init = init.ok_or_else(|| Diagnostic::parse("missing 'in' field", start.clone(), None))?;
        let times = times.ok_or_else(|| Diagnostic::parse("missing 'times' field", start.clone(), None))?;
        let binder = binder.ok_or_else(|| Diagnostic::parse("missing 'as' field", start.clone(), None))?;
        let body = self.braced_block()?;
        let end = self.prev_span();
        Ok(Expr::Loop { init: Box::new(init), times: Box::new(times), binder, body, span: start.cover(&end) })
    }

    fn match_expr(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.expect(TokenKind::Match, "'match'")?;
        let subject = self.expr()?;
        self.expect(TokenKind::LBrace, "'{'")?;

        let mut ok_arm = None;
        let mut err_arm = None;
        while !self.check(&TokenKind::RBrace) {
            let (arm, arm_span) = self.expect_ident()?;
            let (name, _) = self.expect_ident()?;
            let body = self.braced_block()?;
            match arm.as_str() {
                "ok" => ok_arm = Some((name, body)),
                "err" => err_arm = Some((name, body)),
                other => {
                    return Err(Diagnostic::parse(format!("expected 'ok' or 'err', found '{}'", other), arm_span, None))
                }
            }
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?;
        let (ok_name, ok_body) = ok_arm.ok_or_else(|| Diagnostic::parse("missing 'ok' arm", start.clone(), None))?;
        let (err_name, err_body) = err_arm.ok_or_else(|| Diagnostic::parse("missing 'err' arm", start.clone(), None))?;
        Ok(Expr::Match {
            subject: Box::new(subject),
            ok_name,
            ok_body,
            err_name,
            err_body,
            span: start.cover(&end),
        })
    }

    fn try_expr(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.expect(TokenKind::Try, "'try'")?;
        let body = self.braced_block()?;
        self.expect(TokenKind::Catch, "'catch'")?;
        let (catch_name, _) = self.expect_ident()?;
        let catch_body = self.braced_block()?;
        let end = self.prev_span();
        Ok(Expr::Try { body, catch_name, catch_body, span: start.cover(&end) })
    }

    fn filter_expr(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.expect(TokenKind::Filter, "'filter'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut input = None;
        let mut as_name = None;
        let mut fn_name = None;
        let mut by_key = None;
        while !self.check(&TokenKind::RBrace) {
            let (key, _) = self.expect_ident()?;
            self.expect(TokenKind::Colon, "':'")?;
            match key.as_str() {
                "in" => input = Some(self.expr()?),
                "as" => {
                    let (s, _) = self.expect_str()?;
                    as_name = Some(s);
                }
                "fn" => {
                    let (s, _) = self.expect_str()?;
                    fn_name = Some(s);
                }
                "by" => {
                    let (s, _) = self.expect_str()?;
                    by_key = Some(s);
                }
                _ => {
                    self.expr()?;
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let header_end = self.expect(TokenKind::RBrace, "'}'")?;
        let input = input.ok_or_else(|| Diagnostic::parse("missing 'in' field", start.clone(), None))?;

        if let Some(binder) = as_name {
            let body = self.braced_block()?;
            let end = self.prev_span();
            return Ok(Expr::FilterBlock { input: Box::new(input), binder, body, span: start.cover(&end) });
        }
        if let Some(name) = fn_name {
            return Ok(Expr::FilterFn { input: Box::new(input), fn_name: name, span: start.cover(&header_end) });
        }
        if let Some(key) = by_key {
            return Ok(Expr::FilterBy { input: Box::new(input), key, span: start.cover(&header_end) });
        }
        Err(Diagnostic::parse("'filter' requires one of 'as', 'fn', or 'by'", start, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        parse_program("t.a0", src).expect("parse failed")
    }

    #[test]
    fn hello_program() {
        let prog = parse("let x = 42\nreturn { value: x }");
        assert_eq!(prog.body.len(), 2);
        match &prog.body[1] {
            Stmt::Return { expr: Expr::Record { entries, .. }, .. } => {
                assert_eq!(entries.len(), 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn record_shorthand_field() {
        let prog = parse("let ys = 1\nreturn { ys }");
        match &prog.body[1] {
            Stmt::Return { expr: Expr::Record { entries, .. }, .. } => match &entries[0] {
                RecordEntry::Pair { key, value } => {
                    assert_eq!(key, "ys");
                    assert!(matches!(value, Expr::Ident { name, .. } if name == "ys"));
                }
                _ => panic!("expected pair"),
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn spread_override() {
        let prog = parse("let base = {a:1,b:2}\nreturn {...base, b:3}");
        match &prog.body[1] {
            Stmt::Return { expr: Expr::Record { entries, .. }, .. } => {
                assert_eq!(entries.len(), 2);
                assert!(matches!(entries[0], RecordEntry::Spread { .. }));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn precedence_ladder() {
        let prog = parse("return 1 + 2 * 3 == 7");
        match &prog.body[0] {
            Stmt::Return { expr: Expr::Binary { op: BinOp::Eq, lhs, .. }, .. } => {
                assert!(matches!(**lhs, Expr::Binary { op: BinOp::Add, .. }));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn left_associative_subtraction() {
        // 10 - 3 - 2 should parse as (10 - 3) - 2, not 10 - (3 - 2).
        let prog = parse("return 10 - 3 - 2");
        match &prog.body[0] {
            Stmt::Return { expr: Expr::Binary { op: BinOp::Sub, lhs, rhs, .. }, .. } => {
                assert!(matches!(**rhs, Expr::Int { value: 2, .. }));
                assert!(matches!(**lhs, Expr::Binary { op: BinOp::Sub, .. }));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn dotted_field_access() {
        let prog = parse("return a.b.c");
        match &prog.body[0] {
            Stmt::Return { expr: Expr::Field { name, base, .. }, .. } => {
                assert_eq!(name, "c");
                assert!(matches!(**base, Expr::Field { .. }));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn arrow_binding_statement() {
        let prog = parse("1 + 1 -> x\nreturn x");
        assert!(matches!(prog.body[0], Stmt::Arrow { .. }));
    }

    #[test]
    fn arrow_binding_rejects_a_dotted_target() {
        let err = parse_program("t.a0", "let a = {b:1}\na.b -> a.b\nreturn a").unwrap_err();
        assert_eq!(err.code(), "E_PARSE");
    }

    #[test]
    fn cap_and_budget_headers() {
        let prog = parse("cap { fs.read: true }\nbudget { maxIterations: 3 }\nreturn null");
        assert_eq!(prog.cap.as_ref().unwrap().names[0].0, "fs.read");
        assert_eq!(prog.budget.as_ref().unwrap().fields[0].0, "maxIterations");
        assert_eq!(prog.budget.as_ref().unwrap().fields[0].1, 3);
    }

    #[test]
    fn fn_decl_and_call() {
        let prog = parse("fn add(a, b) { return a + b }\nreturn add { a: 1, b: 2 }");
        assert_eq!(prog.fns.len(), 1);
        assert_eq!(prog.fns[0].params, vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(prog.body[0], Stmt::Return { expr: Expr::FnCall { .. }, .. }));
    }

    #[test]
    fn tool_call_forms() {
        let prog = parse(r#"cap { fs.read: true }
return call? fs.read { path: "x" }"#);
        match &prog.body[0] {
            Stmt::Return { expr: Expr::ToolCall { mode, name, .. }, .. } => {
                assert_eq!(*mode, ToolMode::Call);
                assert_eq!(name, "fs.read");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn if_block_form() {
        let prog = parse("return if true { return 1 } else { return 2 }");
        assert!(matches!(prog.body[0], Stmt::Return { expr: Expr::IfBlock { .. }, .. }));
    }

    #[test]
    fn if_record_form() {
        let prog = parse("return if { cond: true, then: 1, else: 2 }");
        assert!(matches!(prog.body[0], Stmt::Return { expr: Expr::IfRecord { .. }, .. }));
    }

    #[test]
    fn for_loop_match_try_filter_forms() {
        parse(r#"return for { in: [1,2], as: "i" } { return i }"#);
        parse(r#"return loop { in: 0, times: 3, as: "acc" } { return acc }"#);
        parse(r#"return match { ok: 1 } { ok v { return v } err e { return e } }"#);
        parse(r#"return try { return 1 / 0 } catch e { return e.code }"#);
        parse(r#"return filter { in: [1,2,3], as: "i" } { return i }"#);
        parse(r#"return filter { in: [1,2,3], fn: "pos" }"#);
        parse(r#"return filter { in: [1,2,3], by: "ok" }"#);
    }

    #[test]
    fn assert_and_check_forms() {
        parse(r#"assert { that: true, msg: "ok" }
return null"#);
        parse(r#"check { that: false, msg: "meh", details: { x: 1 } }
return null"#);
    }

    #[test]
    fn exponent_in_number_consumed_correctly() {
        let prog = parse("return 1e3");
        assert!(matches!(prog.body[0], Stmt::Return { expr: Expr::Float { value, .. }, .. } if value == 1000.0));
    }
}
