// Integration tests for capability policy resolution (spec §5 / §6):
// project file, user file, deny-all, and `--unsafe-allow-all` precedence.
//
// Resolution itself takes `project_dir` and reads `$HOME` directly (no
// injectable clock/env like the rest of the crate), so the handful of cases
// here that touch the process-wide `HOME` variable share one mutex rather
// than pulling in a `#[serial]`-style crate for a single shared variable
// (see DESIGN.md's note on why `serial_test` was dropped).

use a0::policy::{Policy, PolicySource};
use std::sync::Mutex;

static HOME_GUARD: Mutex<()> = Mutex::new(());

fn temp_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("a0-policy-test-{}-{}", tag, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn missing_policy_files_resolve_to_deny_all() {
    let dir = temp_dir("missing");
    let policy = Policy::resolve(&dir, false);
    assert_eq!(policy.source(), PolicySource::DenyAll);
    assert!(policy.effective_capabilities().is_empty());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unsafe_allow_all_wins_even_with_a_deny_all_project_dir() {
    let dir = temp_dir("unsafe");
    let policy = Policy::resolve(&dir, true);
    assert_eq!(policy.source(), PolicySource::UnsafeAllowAll);
    let caps = policy.effective_capabilities();
    assert!(caps.contains(&"fs.read".to_string()));
    assert!(caps.contains(&"fs.write".to_string()));
    assert!(caps.contains(&"http.get".to_string()));
    assert!(caps.contains(&"sh.exec".to_string()));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn project_policy_file_is_read_and_applies_its_deny_list() {
    let dir = temp_dir("project");
    std::fs::write(
        dir.join(".a0policy.json"),
        r#"{"version": 1, "allow": ["fs.read", "fs.write"], "deny": ["fs.write"]}"#,
    )
    .unwrap();

    let policy = Policy::resolve(&dir, false);
    assert_eq!(policy.source(), PolicySource::Project);
    assert!(policy.is_allowed("fs.read"));
    assert!(!policy.is_allowed("fs.write"));
    assert!(!policy.is_allowed("sh.exec"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn project_policy_limits_are_surfaced_but_not_applied_as_caps() {
    let dir = temp_dir("limits");
    std::fs::write(
        dir.join(".a0policy.json"),
        r#"{"version": 1, "allow": ["fs.read"], "limits": {"maxToolCalls": 10}}"#,
    )
    .unwrap();

    let policy = Policy::resolve(&dir, false);
    assert_eq!(policy.limits().get("maxToolCalls").and_then(|v| v.as_i64()), Some(10));
    // `limits` is informational only — the declared program `budget {}` header
    // is what the evaluator actually enforces, not this file (spec §6).
    assert!(!policy.is_allowed("sh.exec"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn malformed_project_policy_file_falls_through_to_the_next_source() {
    let dir = temp_dir("malformed");
    std::fs::write(dir.join(".a0policy.json"), "not valid json").unwrap();

    let policy = Policy::resolve(&dir, false);
    // A broken project file is silently skipped (not a parse error that aborts
    // resolution), so this should proceed to the user file or deny-all.
    assert_ne!(policy.source(), PolicySource::Project);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn user_policy_file_applies_when_no_project_file_is_present() {
    let _guard = HOME_GUARD.lock().unwrap_or_else(|e| e.into_inner());

    let home = temp_dir("home");
    let project = temp_dir("project-empty");
    std::fs::create_dir_all(home.join(".a0")).unwrap();
    std::fs::write(home.join(".a0").join("policy.json"), r#"{"version": 1, "allow": ["http.get"]}"#).unwrap();

    let previous_home = std::env::var_os("HOME");
    std::env::set_var("HOME", &home);

    let policy = Policy::resolve(&project, false);
    assert_eq!(policy.source(), PolicySource::User);
    assert!(policy.is_allowed("http.get"));
    assert!(!policy.is_allowed("sh.exec"));

    match previous_home {
        Some(v) => std::env::set_var("HOME", v),
        None => std::env::remove_var("HOME"),
    }
    std::fs::remove_dir_all(&home).ok();
    std::fs::remove_dir_all(&project).ok();
}

#[test]
fn project_policy_takes_precedence_over_user_policy() {
    let _guard = HOME_GUARD.lock().unwrap_or_else(|e| e.into_inner());

    let home = temp_dir("home-precedence");
    let project = temp_dir("project-precedence");
    std::fs::create_dir_all(home.join(".a0")).unwrap();
    std::fs::write(home.join(".a0").join("policy.json"), r#"{"version": 1, "allow": ["sh.exec"]}"#).unwrap();
    std::fs::write(project.join(".a0policy.json"), r#"{"version": 1, "allow": ["fs.read"]}"#).unwrap();

    let previous_home = std::env::var_os("HOME");
    std::env::set_var("HOME", &home);

    let policy = Policy::resolve(&project, false);
    assert_eq!(policy.source(), PolicySource::Project);
    assert!(policy.is_allowed("fs.read"));
    assert!(!policy.is_allowed("sh.exec"), "project file should not merge with the user file");

    match previous_home {
        Some(v) => std::env::set_var("HOME", v),
        None => std::env::remove_var("HOME"),
    }
    std::fs::remove_dir_all(&home).ok();
    std::fs::remove_dir_all(&project).ok();
}
