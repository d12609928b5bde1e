//! `sh.exec`: spawns a subprocess and captures stdout/stderr/exit code. The
//! spawn-and-poll shape follows the cooperative-cancellation contract set up
//! in `policy.rs`.

use super::schema::{field, FieldKind, Schema};
use super::Tool;
use crate::capability::CapabilityMode;
use crate::policy::CancellationToken;
use crate::value::{Record, Value};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct ShExecTool;

impl Tool for ShExecTool {
    fn name(&self) -> &'static str {
        "sh.exec"
    }
    fn mode(&self) -> CapabilityMode {
        CapabilityMode::Effect
    }
    fn capability_id(&self) -> &'static str {
        "sh.exec"
    }
    fn input_schema(&self) -> Schema {
        Schema(&[field("command", FieldKind::String, true), field("args", FieldKind::List, false)])
    }
    fn execute(&self, args: &Record, cancel: &CancellationToken) -> Result<Value, String> {
        let command = match args.get("command") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err("missing or non-string 'command' field".to_string()),
        };
        let argv: Vec<String> = match args.get("args") {
            Some(Value::List(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(format!("'args' entries must be strings, got {}", other.type_name())),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err("'args' must be a list".to_string()),
            None => Vec::new(),
        };

        let mut child = Command::new(&command)
            .args(&argv)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("cannot spawn '{}': {}", command, e))?;

        loop {
            if let Some(_status) = child.try_wait().map_err(|e| format!("wait failed: {}", e))? {
                break;
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("'{}' cancelled before completion", command));
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout).map_err(|e| format!("failed to read stdout: {}", e))?;
        }
        let mut stderr = String::new();
        if let Some(mut err) = child.stderr.take() {
            err.read_to_string(&mut stderr).map_err(|e| format!("failed to read stderr: {}", e))?;
        }
        let status = child.wait().map_err(|e| format!("wait failed: {}", e))?;

        let mut result = Record::new();
        result.insert("stdout", Value::String(stdout));
        result.insert("stderr", Value::String(stderr));
        result.insert("exitCode", Value::Number(status.code().unwrap_or(-1) as f64));
        Ok(Value::Record(result))
    }
}
