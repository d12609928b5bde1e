//! The stable error taxonomy. Every fault in the pipeline — lexing, parsing,
//! validation, evaluation, tool dispatch — flows through this one type, so
//! `try/catch` can reason about recoverability structurally rather than by
//! code string.

use crate::span::Span;
use serde::Serialize;
use thiserror::Error;

/// A single diagnostic: stable code, human message, source span, optional hint.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Diagnostic {
    #[error("lex error: {message}")]
    Lex { message: String, span: Span, hint: Option<String> },
    #[error("parse error: {message}")]
    Parse { message: String, span: Span, hint: Option<String> },
    #[error("ast error: {message}")]
    Ast { message: String, span: Span, hint: Option<String> },
    #[error("program has no terminal return")]
    NoReturn { span: Span },
    #[error("statement follows return in the same block")]
    ReturnNotLast { span: Span },
    #[error("unknown capability '{name}'")]
    UnknownCap { name: String, span: Span },
    #[error("capability '{name}' used but not declared in the program header")]
    UndeclaredCap { name: String, span: Span },
    #[error("unknown budget field '{name}'")]
    UnknownBudget { name: String, span: Span },
    #[error("'{name}' is already bound in this scope")]
    DupBinding { name: String, span: Span },
    #[error("'{name}' is not bound")]
    Unbound { name: String, span: Span },
    #[error("'call?' may only be used with read-mode tools ('{name}' is effect-mode)")]
    CallEffect { name: String, span: Span },
    #[error("function '{name}' is declared more than once")]
    FnDup { name: String, span: Span },
    #[error("type error: {message}")]
    Type { message: String, span: Span },
    #[error("path error: {message}")]
    Path { message: String, span: Span },
    #[error("'for' requires a list, got {actual}")]
    ForNotList { actual: String, span: Span },
    #[error("'match' requires a record subject, got {actual}")]
    MatchNotRecord { actual: String, span: Span },
    #[error("no 'match' arm matched the subject")]
    MatchNoArm { span: Span },
    #[error("unknown function '{name}'")]
    UnknownFn { name: String, span: Span },
    #[error("function '{name}' failed: {message}")]
    Fn { name: String, message: String, span: Span },
    #[error("tool '{name}' received arguments that do not match its schema: {message}")]
    ToolArgs { name: String, message: String, span: Span },
    #[error("unknown tool '{name}'")]
    UnknownTool { name: String, span: Span },
    #[error("tool '{name}' failed: {message}")]
    Tool { name: String, message: String, span: Span },
    #[error("capability '{name}' denied by policy")]
    CapDenied { name: String, span: Option<Span> },
    #[error("budget '{field}' exceeded")]
    Budget { field: String, span: Option<Span> },
    #[error("assertion failed: {message}")]
    Assert { message: String, span: Span },
    #[error("check failed: {message}")]
    Check { message: String, span: Span },
    #[error("io error: {message}")]
    Io { message: String, span: Option<Span> },
}

impl Diagnostic {
    pub fn code(&self) -> &'static str {
        match self {
            Diagnostic::Lex { .. } => "E_LEX",
            Diagnostic::Parse { .. } => "E_PARSE",
            Diagnostic::Ast { .. } => "E_AST",
            Diagnostic::NoReturn { .. } => "E_NO_RETURN",
            Diagnostic::ReturnNotLast { .. } => "E_RETURN_NOT_LAST",
            Diagnostic::UnknownCap { .. } => "E_UNKNOWN_CAP",
            Diagnostic::UndeclaredCap { .. } => "E_UNDECLARED_CAP",
            Diagnostic::UnknownBudget { .. } => "E_UNKNOWN_BUDGET",
            Diagnostic::DupBinding { .. } => "E_DUP_BINDING",
            Diagnostic::Unbound { .. } => "E_UNBOUND",
            Diagnostic::CallEffect { .. } => "E_CALL_EFFECT",
            Diagnostic::FnDup { .. } => "E_FN_DUP",
            Diagnostic::Type { .. } => "E_TYPE",
            Diagnostic::Path { .. } => "E_PATH",
            Diagnostic::ForNotList { .. } => "E_FOR_NOT_LIST",
            Diagnostic::MatchNotRecord { .. } => "E_MATCH_NOT_RECORD",
            Diagnostic::MatchNoArm { .. } => "E_MATCH_NO_ARM",
            Diagnostic::UnknownFn { .. } => "E_UNKNOWN_FN",
            Diagnostic::Fn { .. } => "E_FN",
            Diagnostic::ToolArgs { .. } => "E_TOOL_ARGS",
            Diagnostic::UnknownTool { .. } => "E_UNKNOWN_TOOL",
            Diagnostic::Tool { .. } => "E_TOOL",
            Diagnostic::CapDenied { .. } => "E_CAP_DENIED",
            Diagnostic::Budget { .. } => "E_BUDGET",
            Diagnostic::Assert { .. } => "E_ASSERT",
            Diagnostic::Check { .. } => "E_CHECK",
            Diagnostic::Io { .. } => "E_IO",
        }
    }

    /// Stable process exit code per spec §6/§7.
    pub fn exit_code(&self) -> i32 {
        match self {
            Diagnostic::Lex { .. } | Diagnostic::Parse { .. } | Diagnostic::Ast { .. } => 2,
            Diagnostic::NoReturn { .. }
            | Diagnostic::ReturnNotLast { .. }
            | Diagnostic::UnknownCap { .. }
            | Diagnostic::UndeclaredCap { .. }
            | Diagnostic::UnknownBudget { .. }
            | Diagnostic::DupBinding { .. }
            | Diagnostic::Unbound { .. }
            | Diagnostic::CallEffect { .. }
            | Diagnostic::FnDup { .. } => 2,
            Diagnostic::CapDenied { .. } => 3,
            Diagnostic::Assert { .. } | Diagnostic::Check { .. } => 5,
            _ => 4,
        }
    }

    /// Whether `try/catch` may intercept this fault. Capability denial, budget
    /// exceedance, and assertion failure are deliberately excluded — they are
    /// meant to terminate the program, not to be handled in-language.
    pub fn recoverable(&self) -> bool {
        !matches!(
            self,
            Diagnostic::CapDenied { .. } | Diagnostic::Budget { .. } | Diagnostic::Assert { .. }
        )
    }

    pub fn span(&self) -> Option<&Span> {
        match self {
            Diagnostic::Lex { span, .. }
            | Diagnostic::Parse { span, .. }
            | Diagnostic::Ast { span, .. }
            | Diagnostic::NoReturn { span }
            | Diagnostic::ReturnNotLast { span }
            | Diagnostic::UnknownCap { span, .. }
            | Diagnostic::UndeclaredCap { span, .. }
            | Diagnostic::UnknownBudget { span, .. }
            | Diagnostic::DupBinding { span, .. }
            | Diagnostic::Unbound { span, .. }
            | Diagnostic::CallEffect { span, .. }
            | Diagnostic::FnDup { span, .. }
            | Diagnostic::Type { span, .. }
            | Diagnostic::Path { span, .. }
            | Diagnostic::ForNotList { span, .. }
            | Diagnostic::MatchNotRecord { span, .. }
            | Diagnostic::MatchNoArm { span }
            | Diagnostic::UnknownFn { span, .. }
            | Diagnostic::Fn { span, .. }
            | Diagnostic::ToolArgs { span, .. }
            | Diagnostic::UnknownTool { span, .. }
            | Diagnostic::Tool { span, .. }
            | Diagnostic::Assert { span, .. }
            | Diagnostic::Check { span, .. } => Some(span),
            Diagnostic::CapDenied { span, .. } | Diagnostic::Budget { span, .. } | Diagnostic::Io { span, .. } => {
                span.as_ref()
            }
        }
    }

    /// The `{ code, message }` record bound by a `try/catch` arm.
    pub fn catch_record(&self) -> crate::value::Record {
        let mut r = crate::value::Record::new();
        r.insert("code", crate::value::Value::String(self.code().to_string()));
        r.insert("message", crate::value::Value::String(self.to_string()));
        r
    }

    // --- helper constructors ---

    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        Diagnostic::Lex { message: message.into(), span, hint: None }
    }

    pub fn ast(message: impl Into<String>, span: Span) -> Self {
        Diagnostic::Ast { message: message.into(), span, hint: None }
    }

    pub fn parse(message: impl Into<String>, span: Span, hint: Option<String>) -> Self {
        Diagnostic::Parse { message: message.into(), span, hint }
    }

    pub fn dup_binding(name: impl Into<String>, span: Span) -> Self {
        Diagnostic::DupBinding { name: name.into(), span }
    }

    pub fn unbound(name: impl Into<String>, span: Span) -> Self {
        Diagnostic::Unbound { name: name.into(), span }
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        Diagnostic::Type { message: message.into(), span }
    }

    pub fn path_error(message: impl Into<String>, span: Span) -> Self {
        Diagnostic::Path { message: message.into(), span }
    }

    pub fn unknown_fn(name: impl Into<String>, span: Span) -> Self {
        Diagnostic::UnknownFn { name: name.into(), span }
    }

    pub fn fn_error(name: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Diagnostic::Fn { name: name.into(), message: message.into(), span }
    }

    pub fn unknown_tool(name: impl Into<String>, span: Span) -> Self {
        Diagnostic::UnknownTool { name: name.into(), span }
    }

    pub fn tool_error(name: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Diagnostic::Tool { name: name.into(), message: message.into(), span }
    }

    pub fn cap_denied(name: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic::CapDenied { name: name.into(), span }
    }

    pub fn budget(field: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic::Budget { field: field.into(), span }
    }

    pub fn io(message: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic::Io { message: message.into(), span }
    }
}
