// Integration tests for the concrete end-to-end scenarios and quantified
// invariants named in the language specification: hello, spread override,
// assert failure, capability denial, budget enforcement, and try/catch scope.

use a0::diagnostic::Diagnostic;
use a0::eval::run_program;
use a0::parser::parse_program;
use a0::policy::Policy;
use a0::stdlib::StdlibRegistry;
use a0::tools::ToolRegistry;
use a0::trace::{BufferSink, TraceSink};
use a0::validator::validate;
use a0::value::Value;

fn allow_all_policy() -> Policy {
    Policy::resolve(std::path::Path::new("/nonexistent-a0-scenario-dir"), true)
}

fn deny_all_policy() -> Policy {
    Policy::resolve(std::path::Path::new("/nonexistent-a0-scenario-dir"), false)
}

fn run_with(src: &str, policy: &Policy, sink: &mut dyn TraceSink) -> Result<Value, Diagnostic> {
    let program = parse_program("t.a0", src).expect("parses");
    let stdlib = StdlibRegistry::new();
    let mut reserved = stdlib.names();
    reserved.insert("map".to_string());
    reserved.insert("reduce".to_string());
    let errs = validate(&program, &reserved);
    assert!(errs.is_empty(), "unexpected validation errors: {errs:?}");
    let tools = ToolRegistry::new();
    run_program(&program, &stdlib, &tools, policy, sink, "scenario-run".to_string()).map(|o| o.value)
}

fn run_ok(src: &str, policy: &Policy) -> Value {
    let mut sink = BufferSink::default();
    run_with(src, policy, &mut sink).expect("program should succeed")
}

#[test]
fn hello() {
    let policy = allow_all_policy();
    let result = run_ok("let x = 42\nreturn { value: x }", &policy);
    let json = serde_json::to_string(&result).unwrap();
    assert_eq!(json, r#"{"value":42}"#);
}

#[test]
fn spread_override() {
    let policy = allow_all_policy();
    let result = run_ok("let base = {a:1,b:2}\nreturn {...base, b:3}", &policy);
    let json = serde_json::to_string(&result).unwrap();
    assert_eq!(json, r#"{"a":1,"b":3}"#);
}

#[test]
fn assert_fail_raises_e_assert_and_records_evidence() {
    let policy = allow_all_policy();
    let mut sink = BufferSink::default();
    let program = parse_program("t.a0", "assert { that: false, msg: \"no\" }\nreturn {}").unwrap();
    let stdlib = StdlibRegistry::new();
    let tools = ToolRegistry::new();
    let err = run_program(&program, &stdlib, &tools, &policy, &mut sink, "scenario-run".to_string()).unwrap_err();
    assert_eq!(err.code(), "E_ASSERT");
    assert_eq!(err.exit_code(), 5);

    let evidence_events: Vec<_> = sink.events.iter().filter(|e| e.event == "evidence").collect();
    assert_eq!(evidence_events.len(), 1);
    let data = &evidence_events[0].data;
    let record = data.as_record().unwrap();
    assert_eq!(record.get("ok"), Some(&Value::Bool(false)));
    assert_eq!(record.get("msg"), Some(&Value::String("no".to_string())));
}

#[test]
fn cap_denied_when_policy_allows_nothing() {
    let policy = deny_all_policy();
    let mut sink = BufferSink::default();
    let err = run_with("cap {\n  fs.read: true\n}\nreturn {}", &policy, &mut sink).unwrap_err();
    assert_eq!(err.code(), "E_CAP_DENIED");
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn for_budget_stops_after_the_declared_iteration_count() {
    let policy = allow_all_policy();
    let mut sink = BufferSink::default();
    let src = "budget { maxIterations: 2 }\nlet xs=[1,2,3,4]\nlet ys = for { in: xs, as:\"i\" } { return i+1 }\nreturn { ys }";
    let err = run_with(src, &policy, &mut sink).unwrap_err();
    assert_eq!(err.code(), "E_BUDGET");
    assert_eq!(err.exit_code(), 4);

    let for_ends = sink.events.iter().filter(|e| e.event == "for_end").count();
    assert_eq!(for_ends, 2, "expected exactly 2 completed iterations before the budget tripped");
    let budget_exceeded = sink.events.iter().filter(|e| e.event == "budget_exceeded").count();
    assert_eq!(budget_exceeded, 1);
}

#[test]
fn try_catch_binds_the_originating_error_code() {
    let policy = allow_all_policy();
    let src = "let r = try { let bad = 1 / 0\nreturn bad } catch e { return e.code }\nreturn { code: r }";
    let result = run_ok(src, &policy);
    let json = serde_json::to_string(&result).unwrap();
    assert_eq!(json, r#"{"code":"E_TYPE"}"#);
}

#[test]
fn deep_equality_ignores_record_key_order() {
    let policy = allow_all_policy();
    let result = run_ok("return eq { a: {x:1,y:2}, b: {y:2,x:1} }", &policy);
    assert_eq!(result, Value::Bool(true));
}

#[test]
fn policy_precedence_project_over_user_capability() {
    // Project policy allows fs.read only; a program declaring fs.read runs,
    // one declaring sh.exec (not allowed) fails at entry.
    let dir = std::env::temp_dir().join(format!("a0-scenario-policy-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(".a0policy.json"),
        r#"{"version":1,"allow":["fs.read"]}"#,
    )
    .unwrap();
    let policy = Policy::resolve(&dir, false);

    let mut sink = BufferSink::default();
    let ok = run_with("cap {\n  fs.read: true\n}\nreturn {}", &policy, &mut sink);
    assert!(ok.is_ok());

    let mut sink2 = BufferSink::default();
    let denied = run_with("cap {\n  sh.exec: true\n}\nreturn {}", &policy, &mut sink2).unwrap_err();
    assert_eq!(denied.code(), "E_CAP_DENIED");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn trace_ordering_run_start_first_run_end_last() {
    let policy = allow_all_policy();
    let mut sink = BufferSink::default();
    run_with("return { value: 1 }", &policy, &mut sink).unwrap();
    assert_eq!(sink.events.first().unwrap().event, "run_start");
    assert_eq!(sink.events.last().unwrap().event, "run_end");
}
