//! Capability policy resolution and runtime budget enforcement.
//!
//! Policy files are small JSON documents naming an `allow` and `deny` list of
//! capability ids. Resolution order is project (`./.a0policy.json`) then user
//! (`$HOME/.a0/policy.json`, falling back to `$USERPROFILE` where `HOME` is
//! absent) then deny-all — the first one found wins outright, they do not
//! merge.

use crate::ast::BudgetHeader;
use crate::diagnostic::Diagnostic;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyFile {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    /// Surfaced by the `policy` subcommand for inspection; not auto-applied as
    /// a runtime budget (program `budget {}` headers are authoritative, §6).
    #[serde(default)]
    pub limits: serde_json::Map<String, serde_json::Value>,
}

/// Which source won policy resolution — surfaced by `a0 policy` so an operator
/// can see which file (if any) is actually in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    Project,
    User,
    DenyAll,
    UnsafeAllowAll,
}

#[derive(Debug, Clone)]
pub struct Policy {
    effective: HashSet<String>,
    source: PolicySource,
    limits: serde_json::Map<String, serde_json::Value>,
}

impl Policy {
    /// Resolves the effective capability set for `project_dir`. `--unsafe-allow-all`
    /// bypasses policy files entirely and allows the whole known capability set.
    pub fn resolve(project_dir: &Path, unsafe_allow_all: bool) -> Policy {
        if unsafe_allow_all {
            return Policy {
                effective: crate::capability::KNOWN_CAPABILITIES.iter().map(|s| s.to_string()).collect(),
                source: PolicySource::UnsafeAllowAll,
                limits: serde_json::Map::new(),
            };
        }

        let project_file = project_dir.join(".a0policy.json");
        if let Some(f) = read_policy_file(&project_file) {
            return Policy::from_file(f, PolicySource::Project);
        }
        if let Some(f) = user_policy_path().and_then(|p| read_policy_file(&p)) {
            return Policy::from_file(f, PolicySource::User);
        }
        Policy { effective: HashSet::new(), source: PolicySource::DenyAll, limits: serde_json::Map::new() }
    }

    fn from_file(f: PolicyFile, source: PolicySource) -> Policy {
        let deny: HashSet<String> = f.deny.into_iter().collect();
        let effective = f.allow.into_iter().filter(|c| !deny.contains(c)).collect();
        Policy { effective, source, limits: f.limits }
    }

    pub fn is_allowed(&self, capability_id: &str) -> bool {
        self.effective.contains(capability_id)
    }

    pub fn source(&self) -> PolicySource {
        self.source
    }

    pub fn limits(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.limits
    }

    pub fn effective_capabilities(&self) -> Vec<String> {
        let mut caps: Vec<String> = self.effective.iter().cloned().collect();
        caps.sort();
        caps
    }

    pub fn check(&self, capability_id: &str, span: Option<Span>) -> Result<(), Diagnostic> {
        if self.is_allowed(capability_id) {
            Ok(())
        } else {
            Err(Diagnostic::cap_denied(capability_id, span))
        }
    }
}

/// Cooperative cancellation shared between the evaluator and tool
/// implementations. Set on `timeMs` expiry or a host-requested
/// cancellation; checked at statement boundaries, before each loop iteration,
/// and before each tool call. Tools that want tighter `timeMs` behavior than
/// the evaluator's statement-boundary granularity can poll this directly
/// (`http.get` derives its request timeout from `deadline`; `sh.exec` polls
/// `is_cancelled` between output reads).
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new(time_ms: Option<u64>) -> Self {
        CancellationToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: time_ms.map(|ms| Instant::now() + Duration::from_millis(ms)),
        }
    }

    pub fn none() -> Self {
        CancellationToken { flag: Arc::new(AtomicBool::new(false)), deadline: None }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    /// Time left before `timeMs` trips, if a deadline was set. Tools (notably
    /// `http.get`) use this to bound their own blocking I/O.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }
}

fn read_policy_file(path: &Path) -> Option<PolicyFile> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

fn user_policy_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".a0").join("policy.json"))
}

/// Runtime budget counters. Checked at statement boundaries, before each loop
/// iteration, and before each tool/function call (spec §5, §9 "budgets as
/// invariants"). Exceeding any limit is an unrecoverable `E_BUDGET` fault.
#[derive(Debug)]
pub struct Budgets {
    start: Instant,
    time_ms: Option<u64>,
    max_tool_calls: Option<i64>,
    max_bytes_written: Option<i64>,
    max_iterations: Option<i64>,

    tool_calls_used: Cell<i64>,
    bytes_written_used: Cell<i64>,
    iterations_used: Cell<i64>,
    cancel: CancellationToken,
}

impl Budgets {
    pub fn from_header(header: &Option<BudgetHeader>) -> Budgets {
        let mut time_ms = None;
        let mut max_tool_calls = None;
        let mut max_bytes_written = None;
        let mut max_iterations = None;
        if let Some(h) = header {
            for (name, value, _) in &h.fields {
                match name.as_str() {
                    "timeMs" => time_ms = Some(*value as u64),
                    "maxToolCalls" => max_tool_calls = Some(*value),
                    "maxBytesWritten" => max_bytes_written = Some(*value),
                    "maxIterations" => max_iterations = Some(*value),
                    _ => {}
                }
            }
        }
        Budgets {
            start: Instant::now(),
            time_ms,
            max_tool_calls,
            max_bytes_written,
            max_iterations,
            tool_calls_used: Cell::new(0),
            bytes_written_used: Cell::new(0),
            iterations_used: Cell::new(0),
            cancel: CancellationToken::new(time_ms),
        }
    }

    /// The token passed to tool `execute` calls, so a tool can honor
    /// cancellation/`timeMs` more tightly than the statement-boundary
    /// checkpoints below.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests cancellation from outside the evaluator (e.g. a host-level
    /// Ctrl-C handler). Checked at the same checkpoints as `timeMs`.
    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    /// Checked at every statement boundary and before each iteration/call —
    /// the conformance-minimum granularity for `timeMs` (spec §9 Open
    /// Question resolution: wall-clock enforcement is statement-grained, not
    /// preemptive).
    pub fn check_time(&self) -> Result<(), Diagnostic> {
        if let Some(limit) = self.time_ms {
            if self.start.elapsed().as_millis() as u64 > limit {
                return Err(Diagnostic::budget("timeMs", None));
            }
        }
        if self.cancel.is_cancelled() {
            return Err(Diagnostic::budget("timeMs", None));
        }
        Ok(())
    }

    pub fn note_tool_call(&self) -> Result<(), Diagnostic> {
        self.check_time()?;
        let used = self.tool_calls_used.get() + 1;
        self.tool_calls_used.set(used);
        if let Some(limit) = self.max_tool_calls {
            if used > limit {
                return Err(Diagnostic::budget("maxToolCalls", None));
            }
        }
        Ok(())
    }

    pub fn note_bytes_written(&self, n: i64) -> Result<(), Diagnostic> {
        let used = self.bytes_written_used.get() + n;
        self.bytes_written_used.set(used);
        if let Some(limit) = self.max_bytes_written {
            if used > limit {
                return Err(Diagnostic::budget("maxBytesWritten", None));
            }
        }
        Ok(())
    }

    pub fn note_iteration(&self) -> Result<(), Diagnostic> {
        self.check_time()?;
        let used = self.iterations_used.get() + 1;
        self.iterations_used.set(used);
        if let Some(limit) = self.max_iterations {
            if used > limit {
                return Err(Diagnostic::budget("maxIterations", None));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsafe_allow_all_allows_every_known_capability() {
        let policy = Policy::resolve(Path::new("/nonexistent"), true);
        assert!(policy.is_allowed("fs.read"));
        assert!(policy.is_allowed("sh.exec"));
    }

    #[test]
    fn missing_policy_files_deny_everything() {
        let policy = Policy::resolve(Path::new("/nonexistent-a0-test-dir"), false);
        assert!(!policy.is_allowed("fs.read"));
    }

    #[test]
    fn deny_list_removes_from_allow_list() {
        let f = PolicyFile {
            allow: vec!["fs.read".into(), "fs.write".into()],
            deny: vec!["fs.write".into()],
            ..Default::default()
        };
        let deny: HashSet<String> = f.deny.into_iter().collect();
        let effective: HashSet<String> = f.allow.into_iter().filter(|c| !deny.contains(c)).collect();
        assert!(effective.contains("fs.read"));
        assert!(!effective.contains("fs.write"));
    }

    #[test]
    fn max_tool_calls_budget_trips_after_limit() {
        let header = BudgetHeader { fields: vec![("maxToolCalls".to_string(), 2, Span::point("t.a0", 1, 1))], span: Span::point("t.a0", 1, 1) };
        let budgets = Budgets::from_header(&Some(header));
        assert!(budgets.note_tool_call().is_ok());
        assert!(budgets.note_tool_call().is_ok());
        assert!(budgets.note_tool_call().is_err());
    }

    #[test]
    fn max_bytes_written_budget_trips_after_limit() {
        let header = BudgetHeader { fields: vec![("maxBytesWritten".to_string(), 10, Span::point("t.a0", 1, 1))], span: Span::point("t.a0", 1, 1) };
        let budgets = Budgets::from_header(&Some(header));
        assert!(budgets.note_bytes_written(5).is_ok());
        assert!(budgets.note_bytes_written(10).is_err());
    }

    #[test]
    fn no_budget_header_means_unbounded() {
        let budgets = Budgets::from_header(&None);
        for _ in 0..1000 {
            assert!(budgets.note_iteration().is_ok());
        }
    }
}
