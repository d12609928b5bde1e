//! `len`, `append`, `concat`, `sort`, `find`, `range`, `join`, `unique`,
//! `pluck`, `flat`. The pure `by`-key form of `filter` lives here too;
//! `fn`-form `filter` and `map`/`reduce` resolve user function names and are
//! implemented in `eval.rs` as evaluator special forms.

use crate::value::{Record, Value};
use std::cmp::Ordering;

fn require_list<'a>(args: &'a Record, field: &str, fn_name: &str) -> Result<&'a [Value], String> {
    match args.get(field) {
        Some(Value::List(items)) => Ok(items),
        _ => Err(format!("'{}' requires a list '{}' field", fn_name, field)),
    }
}

/// `len { in }` — works over lists, strings (char count), and records (key
/// count).
pub fn len(args: &Record) -> Result<Value, String> {
    let target = args.get("in").ok_or_else(|| "'len' requires an 'in' field".to_string())?;
    let n = match target {
        Value::List(items) => items.len(),
        Value::String(s) => s.chars().count(),
        Value::Record(r) => r.len(),
        other => return Err(format!("'len' is not defined for {}", other.type_name())),
    };
    Ok(Value::Number(n as f64))
}

/// `append { in, value }` — new list with `value` pushed to the end.
pub fn append(args: &Record) -> Result<Value, String> {
    let items = require_list(args, "in", "append")?;
    let value = args.get("value").ok_or_else(|| "'append' requires a 'value' field".to_string())?;
    let mut out = items.to_vec();
    out.push(value.clone());
    Ok(Value::List(out))
}

/// `concat { a, b }` — new list with `b`'s elements after `a`'s.
pub fn concat(args: &Record) -> Result<Value, String> {
    let a = require_list(args, "a", "concat")?;
    let b = require_list(args, "b", "concat")?;
    let mut out = a.to_vec();
    out.extend_from_slice(b);
    Ok(Value::List(out))
}

fn compare_values(a: &Value, b: &Value) -> Result<Ordering, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(x.partial_cmp(y).unwrap_or(Ordering::Equal)),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(format!("cannot order {} against {}", a.type_name(), b.type_name())),
    }
}

fn sort_key<'a>(item: &'a Value, key: &str) -> &'a Value {
    match item {
        Value::Record(r) => r.get(key).unwrap_or(&Value::Null),
        _ => item,
    }
}

/// `sort { in, by?, keys? }` — `by` sorts on a single record field; `keys`
/// sorts on a sequence of fields in order (tie-break chain); with neither,
/// sorts by the bare element value.
pub fn sort(args: &Record) -> Result<Value, String> {
    let items = require_list(args, "in", "sort")?;
    let mut out = items.to_vec();

    if let Some(Value::List(keys)) = args.get("keys") {
        let keys: Vec<String> = keys
            .iter()
            .map(|k| match k {
                Value::String(s) => Ok(s.clone()),
                _ => Err("'sort' keys entries must be strings".to_string()),
            })
            .collect::<Result<_, _>>()?;
        let mut err = None;
        out.sort_by(|a, b| {
            for key in &keys {
                match compare_values(sort_key(a, key), sort_key(b, key)) {
                    Ok(Ordering::Equal) => continue,
                    Ok(ord) => return ord,
                    Err(e) => {
                        err = Some(e);
                        return Ordering::Equal;
                    }
                }
            }
            Ordering::Equal
        });
        if let Some(e) = err {
            return Err(e);
        }
    } else if let Some(Value::String(key)) = args.get("by") {
        let mut err = None;
        out.sort_by(|a, b| match compare_values(sort_key(a, key), sort_key(b, key)) {
            Ok(ord) => ord,
            Err(e) => {
                err = Some(e);
                Ordering::Equal
            }
        });
        if let Some(e) = err {
            return Err(e);
        }
    } else {
        let mut err = None;
        out.sort_by(|a, b| match compare_values(a, b) {
            Ok(ord) => ord,
            Err(e) => {
                err = Some(e);
                Ordering::Equal
            }
        });
        if let Some(e) = err {
            return Err(e);
        }
    }

    Ok(Value::List(out))
}

/// `filter { in, by: "key" }` — keeps elements whose `key` field is truthy.
/// The block (`as`) and function-reference (`fn`) forms are evaluator
/// special forms, not this function.
pub fn filter_by(args: &Record) -> Result<Value, String> {
    let items = require_list(args, "in", "filter")?;
    let key = match args.get("by") {
        Some(Value::String(s)) => s,
        _ => return Err("'filter' (pure form) requires a string 'by' field".to_string()),
    };
    let out: Vec<Value> = items.iter().filter(|item| sort_key(item, key).is_truthy()).cloned().collect();
    Ok(Value::List(out))
}

/// `find { in, by, equals }` — first element whose `by` field equals
/// `equals`, or `null` if none match.
pub fn find(args: &Record) -> Result<Value, String> {
    let items = require_list(args, "in", "find")?;
    let key = match args.get("by") {
        Some(Value::String(s)) => s,
        _ => return Err("'find' requires a string 'by' field".to_string()),
    };
    let equals = args.get("equals").ok_or_else(|| "'find' requires an 'equals' field".to_string())?;
    Ok(items.iter().find(|item| sort_key(item, key) == equals).cloned().unwrap_or(Value::Null))
}

/// `range { from, to, step? }` — `[from, to)` with `step` defaulting to `1`.
pub fn range(args: &Record) -> Result<Value, String> {
    let from = match args.get("from") {
        Some(Value::Number(n)) => *n,
        _ => return Err("'range' requires a number 'from' field".to_string()),
    };
    let to = match args.get("to") {
        Some(Value::Number(n)) => *n,
        _ => return Err("'range' requires a number 'to' field".to_string()),
    };
    let step = match args.get("step") {
        Some(Value::Number(n)) => *n,
        None => 1.0,
        _ => return Err("'range' step must be a number".to_string()),
    };
    if step == 0.0 {
        return Err("'range' step must not be zero".to_string());
    }

    let mut out = Vec::new();
    let mut current = from;
    if step > 0.0 {
        while current < to {
            out.push(Value::Number(current));
            current += step;
        }
    } else {
        while current > to {
            out.push(Value::Number(current));
            current += step;
        }
    }
    Ok(Value::List(out))
}

/// `join { in, sep }` — joins a list of strings with `sep`.
pub fn join(args: &Record) -> Result<Value, String> {
    let items = require_list(args, "in", "join")?;
    let sep = match args.get("sep") {
        Some(Value::String(s)) => s,
        _ => return Err("'join' requires a string 'sep' field".to_string()),
    };
    let parts: Vec<&str> = items
        .iter()
        .map(|v| match v {
            Value::String(s) => Ok(s.as_str()),
            other => Err(format!("'join' requires all elements to be strings, found {}", other.type_name())),
        })
        .collect::<Result<_, _>>()?;
    Ok(Value::String(parts.join(sep)))
}

/// `unique { in }` — de-duplicates preserving first-seen order, by deep
/// equality.
pub fn unique(args: &Record) -> Result<Value, String> {
    let items = require_list(args, "in", "unique")?;
    let mut out: Vec<Value> = Vec::new();
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    Ok(Value::List(out))
}

/// `pluck { in, key }` — the `key` field from each record in a list of
/// records (`null` where absent).
pub fn pluck(args: &Record) -> Result<Value, String> {
    let items = require_list(args, "in", "pluck")?;
    let key = match args.get("key") {
        Some(Value::String(s)) => s,
        _ => return Err("'pluck' requires a string 'key' field".to_string()),
    };
    let out: Vec<Value> = items
        .iter()
        .map(|item| match item {
            Value::Record(r) => r.get(key).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        })
        .collect();
    Ok(Value::List(out))
}

/// `flat { in }` — flattens one level of list nesting; non-list elements
/// pass through unchanged.
pub fn flat(args: &Record) -> Result<Value, String> {
    let items = require_list(args, "in", "flat")?;
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::List(inner) => out.extend(inner.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::List(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_arg(name: &str, items: Vec<Value>) -> Record {
        let mut r = Record::new();
        r.insert(name, Value::List(items));
        r
    }

    #[test]
    fn len_counts_list_string_and_record() {
        let mut args = Record::new();
        args.insert("in", Value::String("hello".to_string()));
        assert_eq!(len(&args).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn append_adds_to_the_end() {
        let args = list_arg("in", vec![Value::Number(1.0)]);
        let mut args = args;
        args.insert("value", Value::Number(2.0));
        assert_eq!(append(&args).unwrap(), Value::List(vec![Value::Number(1.0), Value::Number(2.0)]));
    }

    #[test]
    fn sort_by_single_key() {
        let mut a = Record::new();
        a.insert("n", Value::Number(3.0));
        let mut b = Record::new();
        b.insert("n", Value::Number(1.0));
        let mut args = list_arg("in", vec![Value::Record(a), Value::Record(b)]);
        args.insert("by", Value::String("n".to_string()));
        let sorted = sort(&args).unwrap();
        let items = sorted.as_list().unwrap();
        assert_eq!(items[0].as_record().unwrap().get("n"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn range_with_negative_step() {
        let mut args = Record::new();
        args.insert("from", Value::Number(3.0));
        args.insert("to", Value::Number(0.0));
        args.insert("step", Value::Number(-1.0));
        assert_eq!(range(&args).unwrap(), Value::List(vec![Value::Number(3.0), Value::Number(2.0), Value::Number(1.0)]));
    }

    #[test]
    fn unique_preserves_first_seen_order() {
        let args = list_arg("in", vec![Value::Number(1.0), Value::Number(2.0), Value::Number(1.0)]);
        assert_eq!(unique(&args).unwrap(), Value::List(vec![Value::Number(1.0), Value::Number(2.0)]));
    }

    #[test]
    fn flat_flattens_one_level() {
        let args = list_arg(
            "in",
            vec![Value::List(vec![Value::Number(1.0), Value::Number(2.0)]), Value::Number(3.0)],
        );
        assert_eq!(flat(&args).unwrap(), Value::List(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]));
    }

    #[test]
    fn find_returns_null_when_no_match() {
        let mut args = list_arg("in", vec![]);
        args.insert("by", Value::String("n".to_string()));
        args.insert("equals", Value::Number(1.0));
        assert_eq!(find(&args).unwrap(), Value::Null);
    }
}
