//! # Tool Registry
//!
//! The host-provided effectful/read-only operations A0 programs invoke via
//! `call?`/`do`. A capability-aware, schema-checked, cancellation-aware
//! contract for out-of-process effects.
//!
//! - [`fs`]: `fs.read`, `fs.write`, `fs.list`, `fs.exists`, sandboxed with
//!   `cap-std`, rooted at the policy's allowed paths.
//! - [`http`]: `http.get`, a single outbound GET via `ureq`.
//! - [`sh`]: `sh.exec`, a sandboxed subprocess spawn with captured output.

mod fs;
mod http;
pub(crate) mod schema;
mod sh;

use crate::capability::CapabilityMode;
use crate::diagnostic::Diagnostic;
use crate::policy::CancellationToken;
use crate::span::Span;
use crate::value::{Record, Value};
use schema::Schema;
use std::collections::HashMap;
use std::path::PathBuf;

pub use fs::{FsExistsTool, FsListTool, FsReadTool, FsWriteTool};
pub use http::HttpGetTool;
pub use sh::ShExecTool;

/// A host-provided operation invoked from A0 source via `call?`/`do`.
pub trait Tool {
    fn name(&self) -> &'static str;
    fn mode(&self) -> CapabilityMode;
    fn capability_id(&self) -> &'static str;
    fn input_schema(&self) -> Schema;
    fn execute(&self, args: &Record, cancel: &CancellationToken) -> Result<Value, String>;
}

/// Name-keyed collection of tools, built once at program start and treated
/// as a read-only snapshot for the duration of a run.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|b| b.as_ref())
    }

    /// The four reference tools from spec §6, rooted at `fs_root` for
    /// filesystem access.
    pub fn with_defaults(fs_root: PathBuf) -> Self {
        let mut reg = ToolRegistry::new();
        reg.register(Box::new(FsReadTool::new(fs_root.clone())));
        reg.register(Box::new(FsWriteTool::new(fs_root.clone())));
        reg.register(Box::new(FsListTool::new(fs_root.clone())));
        reg.register(Box::new(FsExistsTool::new(fs_root)));
        reg.register(Box::new(HttpGetTool));
        reg.register(Box::new(ShExecTool));
        reg
    }

    /// Dispatches a call-site invocation: schema-validates, runs, and maps
    /// any failure into the stable `E_TOOL_ARGS`/`E_UNKNOWN_TOOL`/`E_TOOL`
    /// diagnostics. Capability and budget checks happen in `eval.rs` before
    /// this is reached.
    pub fn dispatch(&self, name: &str, args: &Record, cancel: &CancellationToken, span: Span) -> Result<Value, Diagnostic> {
        let tool = self.get(name).ok_or_else(|| Diagnostic::unknown_tool(name, span.clone()))?;
        tool.input_schema()
            .validate(args)
            .map_err(|msg| Diagnostic::ToolArgs { name: name.to_string(), message: msg, span: span.clone() })?;
        tool.execute(args, cancel).map_err(|msg| Diagnostic::tool_error(name, msg, span))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        ToolRegistry::new()
    }
}

/// Record returned by an effect-mode tool describing a produced side effect
/// (glossary: "Artifact"). `fs.write` is the only reference tool that
/// produces one.
pub fn artifact(path: impl Into<String>, bytes: usize, hash: impl Into<String>) -> Value {
    let mut r = Record::new();
    r.insert("path", Value::String(path.into()));
    r.insert("bytes", Value::Number(bytes as f64));
    r.insert("hash", Value::String(hash.into()));
    Value::Record(r)
}
