//! `parse.json`, `get`, `put`, `patch` — JSON interop and path-addressed
//! record/list access. `patch` implements the subset of RFC 6902 named in the
//! spec (`add`, `remove`, `replace`, `move`, `copy`, `test`).

use crate::value::{Record, Value};

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => {
            let mut record = Record::new();
            for (k, v) in map {
                record.insert(k.clone(), json_to_value(v));
            }
            Value::Record(record)
        }
    }
}

/// `parse.json { text }` — parses a JSON string into an A0 value.
pub fn parse_json(args: &Record) -> Result<Value, String> {
    let text = match args.get("text") {
        Some(Value::String(s)) => s,
        _ => return Err("'parse.json' requires a string 'text' field".to_string()),
    };
    let parsed: serde_json::Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
    Ok(json_to_value(&parsed))
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

fn get_path<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    match segments.split_first() {
        None => Some(value),
        Some((head, rest)) => match value {
            Value::Record(r) => r.get(head).and_then(|v| get_path(v, rest)),
            _ => None,
        },
    }
}

/// `get { in, path }` — reads a dotted path out of a record, returning `null`
/// when any intermediate segment is absent (unlike identifier-path lookup in
/// the evaluator, which raises `E_PATH` — `get` is the forgiving stdlib form).
pub fn get(args: &Record) -> Result<Value, String> {
    let target = args.get("in").ok_or_else(|| "'get' requires an 'in' field".to_string())?;
    let path = match args.get("path") {
        Some(Value::String(s)) => s,
        _ => return Err("'get' requires a string 'path' field".to_string()),
    };
    let segments = split_path(path);
    Ok(get_path(target, &segments).cloned().unwrap_or(Value::Null))
}

fn put_path(value: &Value, segments: &[&str], new_value: &Value) -> Result<Value, String> {
    match segments.split_first() {
        None => Ok(new_value.clone()),
        Some((head, rest)) => {
            let mut record = match value {
                Value::Record(r) => r.clone(),
                Value::Null => Record::new(),
                other => return Err(format!("cannot set a path through a {}", other.type_name())),
            };
            let child = record.get(*head).cloned().unwrap_or(Value::Null);
            record.insert(head.to_string(), put_path(&child, rest, new_value)?);
            Ok(Value::Record(record))
        }
    }
}

/// `put { in, path, value }` — returns a new record with `value` set at the
/// dotted `path`, creating intermediate records as needed.
pub fn put(args: &Record) -> Result<Value, String> {
    let target = args.get("in").ok_or_else(|| "'put' requires an 'in' field".to_string())?;
    let path = match args.get("path") {
        Some(Value::String(s)) => s,
        _ => return Err("'put' requires a string 'path' field".to_string()),
    };
    let new_value = args.get("value").ok_or_else(|| "'put' requires a 'value' field".to_string())?;
    let segments = split_path(path);
    if segments.is_empty() {
        return Err("'put' requires a non-empty 'path'".to_string());
    }
    put_path(target, &segments, new_value)
}

fn remove_path(value: &Value, segments: &[&str]) -> Result<Value, String> {
    let record = match value {
        Value::Record(r) => r,
        other => return Err(format!("cannot remove a path through a {}", other.type_name())),
    };
    match segments.split_first() {
        None => Err("'patch' remove requires a non-empty path".to_string()),
        Some((head, [])) => {
            let mut out = Record::new();
            for (k, v) in record.iter() {
                if k != head {
                    out.insert(k.clone(), v.clone());
                }
            }
            Ok(Value::Record(out))
        }
        Some((head, rest)) => {
            let child = record.get(*head).ok_or_else(|| format!("path segment '{}' not found", head))?;
            let updated = remove_path(child, rest)?;
            let mut out = record.clone();
            out.insert(head.to_string(), updated);
            Ok(Value::Record(out))
        }
    }
}

/// `patch { in, ops }` — applies an RFC-6902 ("JSON Patch") subset: `add`,
/// `remove`, `replace`, `move`, `copy`, `test`. Each op is a record
/// `{ op, path, value?, from? }`; `test` failing makes the whole patch fail.
pub fn patch(args: &Record) -> Result<Value, String> {
    let mut current = args.get("in").ok_or_else(|| "'patch' requires an 'in' field".to_string())?.clone();
    let ops = match args.get("ops") {
        Some(Value::List(items)) => items,
        _ => return Err("'patch' requires a list 'ops' field".to_string()),
    };

    for op_value in ops {
        let op_record = match op_value {
            Value::Record(r) => r,
            _ => return Err("each patch op must be a record".to_string()),
        };
        let op = match op_record.get("op") {
            Some(Value::String(s)) => s.as_str(),
            _ => return Err("patch op requires a string 'op' field".to_string()),
        };
        let path = match op_record.get("path") {
            Some(Value::String(s)) => s.as_str(),
            _ => return Err("patch op requires a string 'path' field".to_string()),
        };
        let segments = split_path(path);

        current = match op {
            "add" | "replace" => {
                let value = op_record.get("value").ok_or_else(|| format!("patch op '{}' requires a 'value' field", op))?;
                put_path(&current, &segments, value)?
            }
            "remove" => remove_path(&current, &segments)?,
            "test" => {
                let expected = op_record.get("value").ok_or_else(|| "patch op 'test' requires a 'value' field".to_string())?;
                let actual = get_path(&current, &segments).cloned().unwrap_or(Value::Null);
                if actual != *expected {
                    return Err(format!("patch 'test' failed at path '{}'", path));
                }
                current
            }
            "move" | "copy" => {
                let from = match op_record.get("from") {
                    Some(Value::String(s)) => s.as_str(),
                    _ => return Err(format!("patch op '{}' requires a string 'from' field", op)),
                };
                let from_segments = split_path(from);
                let value = get_path(&current, &from_segments)
                    .cloned()
                    .ok_or_else(|| format!("patch 'from' path '{}' not found", from))?;
                let mut next = put_path(&current, &segments, &value)?;
                if op == "move" {
                    next = remove_path(&next, &from_segments)?;
                }
                next
            }
            other => return Err(format!("unknown patch op '{}'", other)),
        };
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_builds_a_record() {
        let mut args = Record::new();
        args.insert("text", Value::String(r#"{"a":1,"b":[2,3]}"#.to_string()));
        let result = parse_json(&args).unwrap();
        let record = result.as_record().unwrap();
        assert_eq!(record.get("a"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn get_reads_a_dotted_path() {
        let mut inner = Record::new();
        inner.insert("b", Value::Number(7.0));
        let mut outer = Record::new();
        outer.insert("a", Value::Record(inner));

        let mut args = Record::new();
        args.insert("in", Value::Record(outer));
        args.insert("path", Value::String("a.b".to_string()));
        assert_eq!(get(&args).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn get_missing_path_yields_null() {
        let mut args = Record::new();
        args.insert("in", Value::Record(Record::new()));
        args.insert("path", Value::String("missing.path".to_string()));
        assert_eq!(get(&args).unwrap(), Value::Null);
    }

    #[test]
    fn put_creates_intermediate_records() {
        let mut args = Record::new();
        args.insert("in", Value::Record(Record::new()));
        args.insert("path", Value::String("a.b".to_string()));
        args.insert("value", Value::Number(5.0));
        let result = put(&args).unwrap();

        let mut get_args = Record::new();
        get_args.insert("in", result);
        get_args.insert("path", Value::String("a.b".to_string()));
        assert_eq!(get(&get_args).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn patch_add_then_remove() {
        let mut record = Record::new();
        record.insert("a", Value::Number(1.0));

        let mut add_op = Record::new();
        add_op.insert("op", Value::String("add".to_string()));
        add_op.insert("path", Value::String("b".to_string()));
        add_op.insert("value", Value::Number(2.0));

        let mut remove_op = Record::new();
        remove_op.insert("op", Value::String("remove".to_string()));
        remove_op.insert("path", Value::String("a".to_string()));

        let mut args = Record::new();
        args.insert("in", Value::Record(record));
        args.insert("ops", Value::List(vec![Value::Record(add_op), Value::Record(remove_op)]));

        let result = patch(&args).unwrap();
        let out = result.as_record().unwrap();
        assert_eq!(out.get("b"), Some(&Value::Number(2.0)));
        assert_eq!(out.get("a"), None);
    }

    #[test]
    fn patch_test_failure_rejects_the_whole_patch() {
        let mut record = Record::new();
        record.insert("a", Value::Number(1.0));

        let mut test_op = Record::new();
        test_op.insert("op", Value::String("test".to_string()));
        test_op.insert("path", Value::String("a".to_string()));
        test_op.insert("value", Value::Number(99.0));

        let mut args = Record::new();
        args.insert("in", Value::Record(record));
        args.insert("ops", Value::List(vec![Value::Record(test_op)]));

        assert!(patch(&args).is_err());
    }
}
