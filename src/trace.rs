//! Structured event stream and evidence accumulator.
//!
//! Every run gets a `uuid`-generated run id and `chrono`-stamped RFC-3339
//! timestamps on each event, so a trace file can be replayed and summarized
//! independent of the process that produced it.

use crate::span::Span;
use crate::value::{Record, Value};
use serde::Serialize;

/// One structured event in a run's trace. Emitted in strict execution order
///.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub ts: String,
    #[serde(rename = "runId")]
    pub run_id: String,
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    pub data: Value,
}

impl TraceEvent {
    pub fn new(run_id: &str, event: &'static str, span: Option<Span>, data: Value) -> Self {
        TraceEvent { ts: chrono::Utc::now().to_rfc3339(), run_id: run_id.to_string(), event, span, data }
    }

    /// Newline-delimited JSON rendering of this event, trailing `\n` included,
    /// ready to append directly to a trace file.
    pub fn to_ndjson_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        line
    }
}

/// Host-injected sink for trace events. The evaluator calls this at every
/// checkpoint named in spec §4.7; a host not interested in tracing can pass a
/// no-op implementation.
pub trait TraceSink {
    fn emit(&mut self, event: TraceEvent);
}

/// Writes nothing; the zero-cost default for `a0 check`/tests that don't
/// care about trace output.
pub struct NullSink;

impl TraceSink for NullSink {
    fn emit(&mut self, _event: TraceEvent) {}
}

/// Buffers every event in memory, for `a0 trace` summarization or
/// in-process test assertions.
#[derive(Default)]
pub struct BufferSink {
    pub events: Vec<TraceEvent>,
}

impl TraceSink for BufferSink {
    fn emit(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

/// Wraps any `FnMut(TraceEvent)`, e.g. one that appends NDJSON lines to an
/// open file handle — the shape a CLI host actually wants.
pub struct CallbackSink<F: FnMut(TraceEvent)>(pub F);

impl<F: FnMut(TraceEvent)> TraceSink for CallbackSink<F> {
    fn emit(&mut self, event: TraceEvent) {
        (self.0)(event)
    }
}

/// One `assert`/`check` outcome (glossary: "Evidence"). Returned to the host
/// via `EvidenceAccumulator` independent of the trace stream, so it can be
/// serialized to an evidence file even when tracing is off.
#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    pub kind: &'static str,
    pub ok: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub span: Span,
}

impl Evidence {
    /// The record shape bound in a trace `evidence` event's `data` field and
    /// in a `try/catch` handler's view of failed assertions.
    pub fn to_record(&self) -> Record {
        let mut r = Record::new();
        r.insert("kind", Value::String(self.kind.to_string()));
        r.insert("ok", Value::Bool(self.ok));
        r.insert("msg", Value::String(self.msg.clone()));
        r.insert("details", self.details.clone().unwrap_or(Value::Null));
        r
    }
}

#[derive(Default)]
pub struct EvidenceAccumulator {
    records: Vec<Evidence>,
}

impl EvidenceAccumulator {
    pub fn new() -> Self {
        EvidenceAccumulator::default()
    }

    pub fn push(&mut self, evidence: Evidence) {
        self.records.push(evidence);
    }

    pub fn records(&self) -> &[Evidence] {
        &self.records
    }

    pub fn failures(&self) -> usize {
        self.records.iter().filter(|e| !e.ok).count()
    }

    pub fn to_json(&self) -> Value {
        Value::List(
            self.records
                .iter()
                .map(|e| Value::Record(e.to_record()))
                .collect(),
        )
    }
}

/// Summary emitted by `a0 trace` over a recorded NDJSON file.
#[derive(Debug, Clone, Serialize)]
pub struct TraceSummary {
    #[serde(rename = "runId")]
    pub run_id: String,
    #[serde(rename = "totalEvents")]
    pub total_events: usize,
    #[serde(rename = "toolInvocations")]
    pub tool_invocations: usize,
    #[serde(rename = "toolsByName")]
    pub tools_by_name: std::collections::BTreeMap<String, usize>,
    #[serde(rename = "evidenceCount")]
    pub evidence_count: usize,
    pub failures: usize,
    #[serde(rename = "budgetExceeded")]
    pub budget_exceeded: bool,
    #[serde(rename = "startTime")]
    pub start_time: Option<String>,
    #[serde(rename = "endTime")]
    pub end_time: Option<String>,
    #[serde(rename = "durationMs")]
    pub duration_ms: Option<i64>,
}

/// Builds a `TraceSummary` from an already-parsed stream of NDJSON events,
/// each decoded into a `serde_json::Value`. Kept separate from `TraceEvent`
/// parsing so `a0 trace` can summarize a trace file written by a different
/// process/run without re-deserializing into the full typed event.
pub fn summarize(events: &[serde_json::Value]) -> TraceSummary {
    let mut tools_by_name: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    let mut tool_invocations = 0usize;
    let mut evidence_count = 0usize;
    let mut failures = 0usize;
    let mut budget_exceeded = false;
    let mut run_id = String::new();
    let mut start_time = None;
    let mut end_time = None;

    for event in events {
        let tag = event.get("event").and_then(|v| v.as_str()).unwrap_or("");
        if let Some(id) = event.get("runId").and_then(|v| v.as_str()) {
            run_id = id.to_string();
        }
        match tag {
            "run_start" => start_time = event.get("ts").and_then(|v| v.as_str()).map(|s| s.to_string()),
            "run_end" => end_time = event.get("ts").and_then(|v| v.as_str()).map(|s| s.to_string()),
            "tool_start" => {
                tool_invocations += 1;
                if let Some(name) = event.get("data").and_then(|d| d.get("name")).and_then(|v| v.as_str()) {
                    *tools_by_name.entry(name.to_string()).or_insert(0) += 1;
                }
            }
            "evidence" => {
                evidence_count += 1;
                if matches!(event.get("data").and_then(|d| d.get("ok")), Some(serde_json::Value::Bool(false))) {
                    failures += 1;
                }
            }
            "budget_exceeded" => budget_exceeded = true,
            _ => {}
        }
    }

    let duration_ms = match (&start_time, &end_time) {
        (Some(s), Some(e)) => {
            let start = chrono::DateTime::parse_from_rfc3339(s).ok();
            let end = chrono::DateTime::parse_from_rfc3339(e).ok();
            match (start, end) {
                (Some(s), Some(e)) => Some((e - s).num_milliseconds()),
                _ => None,
            }
        }
        _ => None,
    };

    TraceSummary {
        run_id,
        total_events: events.len(),
        tool_invocations,
        tools_by_name,
        evidence_count,
        failures,
        budget_exceeded,
        start_time,
        end_time,
        duration_ms,
    }
}
