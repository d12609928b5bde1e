//! `fs.read` / `fs.write` / `fs.list` / `fs.exists`: manual path-traversal
//! rejection performed *before* delegating to `cap-std`'s own
//! ambient-authority sandboxing, never relying solely on the primitive's
//! safety net.

use super::schema::{field, FieldKind, Schema};
use super::{artifact, Tool};
use crate::capability::CapabilityMode;
use crate::policy::CancellationToken;
use crate::value::{Record, Value};
use cap_std::fs::Dir;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

fn reject_traversal(path: &str) -> Result<(), String> {
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(format!("path '{}' must be relative to the sandbox root", path));
    }
    if path.split(['/', '\\']).any(|seg| seg == "..") {
        return Err(format!("path '{}' may not contain '..'", path));
    }
    Ok(())
}

fn open_root(root: &std::path::Path) -> Result<Dir, String> {
    std::fs::create_dir_all(root).map_err(|e| format!("cannot create sandbox root {}: {}", root.display(), e))?;
    Dir::open_ambient_dir(root, cap_std::ambient_authority())
        .map_err(|e| format!("cannot open sandbox root {}: {}", root.display(), e))
}

fn path_arg(args: &Record) -> Result<String, String> {
    match args.get("path") {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err("missing or non-string 'path' field".to_string()),
    }
}

pub struct FsReadTool {
    root: PathBuf,
}

impl FsReadTool {
    pub fn new(root: PathBuf) -> Self {
        FsReadTool { root }
    }
}

impl Tool for FsReadTool {
    fn name(&self) -> &'static str {
        "fs.read"
    }
    fn mode(&self) -> CapabilityMode {
        CapabilityMode::Read
    }
    fn capability_id(&self) -> &'static str {
        "fs.read"
    }
    fn input_schema(&self) -> Schema {
        Schema(&[field("path", FieldKind::String, true)])
    }
    fn execute(&self, args: &Record, _cancel: &CancellationToken) -> Result<Value, String> {
        let path = path_arg(args)?;
        reject_traversal(&path)?;
        let dir = open_root(&self.root)?;
        let contents = dir.read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                format!("file not found: {}", path)
            } else {
                format!("cannot read {}: {}", path, e)
            }
        })?;
        Ok(Value::String(contents))
    }
}

pub struct FsWriteTool {
    root: PathBuf,
}

impl FsWriteTool {
    pub fn new(root: PathBuf) -> Self {
        FsWriteTool { root }
    }
}

impl Tool for FsWriteTool {
    fn name(&self) -> &'static str {
        "fs.write"
    }
    fn mode(&self) -> CapabilityMode {
        CapabilityMode::Effect
    }
    fn capability_id(&self) -> &'static str {
        "fs.write"
    }
    fn input_schema(&self) -> Schema {
        Schema(&[field("path", FieldKind::String, true), field("bytes", FieldKind::String, true)])
    }
    fn execute(&self, args: &Record, _cancel: &CancellationToken) -> Result<Value, String> {
        let path = path_arg(args)?;
        reject_traversal(&path)?;
        let contents = match args.get("bytes") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err("missing or non-string 'bytes' field".to_string()),
        };
        let dir = open_root(&self.root)?;
        dir.write(&path, contents.as_bytes()).map_err(|e| format!("cannot write {}: {}", path, e))?;

        let hash = {
            let mut hasher = Sha256::new();
            hasher.update(contents.as_bytes());
            format!("{:x}", hasher.finalize())
        };
        Ok(artifact(path, contents.len(), hash))
    }
}

pub struct FsListTool {
    root: PathBuf,
}

impl FsListTool {
    pub fn new(root: PathBuf) -> Self {
        FsListTool { root }
    }
}

impl Tool for FsListTool {
    fn name(&self) -> &'static str {
        "fs.list"
    }
    fn mode(&self) -> CapabilityMode {
        CapabilityMode::Read
    }
    fn capability_id(&self) -> &'static str {
        "fs.read"
    }
    fn input_schema(&self) -> Schema {
        Schema(&[field("path", FieldKind::String, true)])
    }
    fn execute(&self, args: &Record, _cancel: &CancellationToken) -> Result<Value, String> {
        let path = path_arg(args)?;
        reject_traversal(&path)?;
        let dir = open_root(&self.root)?;
        let entries = dir.read_dir(&path).map_err(|e| format!("cannot list {}: {}", path, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("cannot list {}: {}", path, e))?;
            let name = entry.file_name().into_string().map_err(|_| "invalid UTF-8 in filename".to_string())?;
            names.push(Value::String(name));
        }
        Ok(Value::List(names))
    }
}

pub struct FsExistsTool {
    root: PathBuf,
}

impl FsExistsTool {
    pub fn new(root: PathBuf) -> Self {
        FsExistsTool { root }
    }
}

impl Tool for FsExistsTool {
    fn name(&self) -> &'static str {
        "fs.exists"
    }
    fn mode(&self) -> CapabilityMode {
        CapabilityMode::Read
    }
    fn capability_id(&self) -> &'static str {
        "fs.read"
    }
    fn input_schema(&self) -> Schema {
        Schema(&[field("path", FieldKind::String, true)])
    }
    fn execute(&self, args: &Record, _cancel: &CancellationToken) -> Result<Value, String> {
        let path = path_arg(args)?;
        reject_traversal(&path)?;
        let dir = open_root(&self.root)?;
        Ok(Value::Bool(dir.try_exists(&path).unwrap_or(false)))
    }
}
