//! `str.concat`, `str.split`, `str.starts`, `str.ends`, `str.replace`,
//! `str.template`.

use crate::value::{Record, Value};

fn require_str<'a>(args: &'a Record, field: &str, fn_name: &str) -> Result<&'a str, String> {
    match args.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        _ => Err(format!("'{}' requires a string '{}' field", fn_name, field)),
    }
}

/// `str.concat { values }` — concatenates a list of strings in order.
pub fn concat(args: &Record) -> Result<Value, String> {
    let values = match args.get("values") {
        Some(Value::List(items)) => items,
        _ => return Err("'str.concat' requires a list 'values' field".to_string()),
    };
    let mut out = String::new();
    for v in values {
        match v {
            Value::String(s) => out.push_str(s),
            other => return Err(format!("'str.concat' requires all elements to be strings, found {}", other.type_name())),
        }
    }
    Ok(Value::String(out))
}

/// `str.split { in, sep }` — splits `in` on `sep`; an empty `sep` splits into
/// individual characters.
pub fn split(args: &Record) -> Result<Value, String> {
    let text = require_str(args, "in", "str.split")?;
    let sep = require_str(args, "sep", "str.split")?;
    let parts: Vec<Value> = if sep.is_empty() {
        text.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        text.split(sep).map(|p| Value::String(p.to_string())).collect()
    };
    Ok(Value::List(parts))
}

/// `str.starts { in, prefix }`
pub fn starts(args: &Record) -> Result<Value, String> {
    let text = require_str(args, "in", "str.starts")?;
    let prefix = require_str(args, "prefix", "str.starts")?;
    Ok(Value::Bool(text.starts_with(prefix)))
}

/// `str.ends { in, suffix }`
pub fn ends(args: &Record) -> Result<Value, String> {
    let text = require_str(args, "in", "str.ends")?;
    let suffix = require_str(args, "suffix", "str.ends")?;
    Ok(Value::Bool(text.ends_with(suffix)))
}

/// `str.replace { in, from, to }` — replaces every non-overlapping
/// occurrence of `from` with `to`.
pub fn replace(args: &Record) -> Result<Value, String> {
    let text = require_str(args, "in", "str.replace")?;
    let from = require_str(args, "from", "str.replace")?;
    let to = require_str(args, "to", "str.replace")?;
    Ok(Value::String(text.replace(from, to)))
}

/// `str.template { template, with }` — substitutes `{name}` placeholders
/// from the `with` record; an unresolved placeholder is left verbatim.
pub fn template(args: &Record) -> Result<Value, String> {
    let text = require_str(args, "template", "str.template")?;
    let with = match args.get("with") {
        Some(Value::Record(r)) => r,
        _ => return Err("'str.template' requires a record 'with' field".to_string()),
    };

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        let mut name = String::new();
        let mut closed = false;
        for next in chars.by_ref() {
            if next == '}' {
                closed = true;
                break;
            }
            name.push(next);
        }
        if !closed {
            out.push('{');
            out.push_str(&name);
            continue;
        }
        match with.get(&name) {
            Some(value) => out.push_str(&template_stringify(value)),
            None => {
                out.push('{');
                out.push_str(&name);
                out.push('}');
            }
        }
    }
    Ok(Value::String(out))
}

/// Plain (non-JSON-quoted) rendering of a placeholder value for
/// `str.template`. Lists/records fall back to their `Display` form.
fn template_stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
