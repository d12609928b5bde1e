//! `keys`, `values`, `merge`, `entries`.

use crate::value::{Record, Value};

fn require_record<'a>(args: &'a Record, field: &str, fn_name: &str) -> Result<&'a Record, String> {
    match args.get(field) {
        Some(Value::Record(r)) => Ok(r),
        _ => Err(format!("'{}' requires a record '{}' field", fn_name, field)),
    }
}

/// `keys { in }` — keys in insertion order.
pub fn keys(args: &Record) -> Result<Value, String> {
    let record = require_record(args, "in", "keys")?;
    Ok(Value::List(record.keys().map(|k| Value::String(k.clone())).collect()))
}

/// `values { in }` — values in insertion order.
pub fn values(args: &Record) -> Result<Value, String> {
    let record = require_record(args, "in", "values")?;
    Ok(Value::List(record.values().cloned().collect()))
}

/// `merge { a, b }` — shallow merge; `b`'s keys win on conflict, and the
/// first-seen-key-wins-position rule from record-spread applies.
pub fn merge(args: &Record) -> Result<Value, String> {
    let a = require_record(args, "a", "merge")?;
    let b = require_record(args, "b", "merge")?;
    let mut out = a.clone();
    for (k, v) in b.iter() {
        out.insert(k.clone(), v.clone());
    }
    Ok(Value::Record(out))
}

/// `entries { in }` — list of `{ key, value }` records, in insertion order.
pub fn entries(args: &Record) -> Result<Value, String> {
    let record = require_record(args, "in", "entries")?;
    let out: Vec<Value> = record
        .iter()
        .map(|(k, v)| {
            let mut entry = Record::new();
            entry.insert("key", Value::String(k.clone()));
            entry.insert("value", v.clone());
            Value::Record(entry)
        })
        .collect();
    Ok(Value::List(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_preserves_insertion_order() {
        let mut record = Record::new();
        record.insert("b", Value::Number(1.0));
        record.insert("a", Value::Number(2.0));
        let mut args = Record::new();
        args.insert("in", Value::Record(record));
        assert_eq!(keys(&args).unwrap(), Value::List(vec![Value::String("b".into()), Value::String("a".into())]));
    }

    #[test]
    fn merge_lets_b_win_on_conflict() {
        let mut a = Record::new();
        a.insert("x", Value::Number(1.0));
        let mut b = Record::new();
        b.insert("x", Value::Number(2.0));
        let mut args = Record::new();
        args.insert("a", Value::Record(a));
        args.insert("b", Value::Record(b));
        let result = merge(&args).unwrap();
        assert_eq!(result.as_record().unwrap().get("x"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn entries_produces_key_value_records() {
        let mut record = Record::new();
        record.insert("a", Value::Number(1.0));
        let mut args = Record::new();
        args.insert("in", Value::Record(record));
        let result = entries(&args).unwrap();
        let list = result.as_list().unwrap();
        let entry = list[0].as_record().unwrap();
        assert_eq!(entry.get("key"), Some(&Value::String("a".into())));
        assert_eq!(entry.get("value"), Some(&Value::Number(1.0)));
    }
}
