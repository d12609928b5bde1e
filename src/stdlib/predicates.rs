//! `eq`, `contains`, `not`, `and`, `or`, `coalesce`, `typeof`.

use crate::value::{Record, Value};

/// `eq { a, b }` — deep structural equality, key order ignored in records
///.
pub fn eq(args: &Record) -> Result<Value, String> {
    let a = args.get("a").ok_or_else(|| "'eq' requires an 'a' field".to_string())?;
    let b = args.get("b").ok_or_else(|| "'eq' requires a 'b' field".to_string())?;
    Ok(Value::Bool(a == b))
}

/// `contains { in, value }` — polymorphic: substring for strings, membership
/// for lists, key presence for records.
pub fn contains(args: &Record) -> Result<Value, String> {
    let haystack = args.get("in").ok_or_else(|| "'contains' requires an 'in' field".to_string())?;
    let needle = args.get("value").ok_or_else(|| "'contains' requires a 'value' field".to_string())?;
    let found = match haystack {
        Value::String(s) => match needle {
            Value::String(n) => s.contains(n.as_str()),
            _ => return Err("'contains' on a string requires a string 'value'".to_string()),
        },
        Value::List(items) => items.iter().any(|v| v == needle),
        Value::Record(r) => match needle {
            Value::String(key) => r.contains_key(key),
            _ => return Err("'contains' on a record requires a string 'value' (a key)".to_string()),
        },
        other => return Err(format!("'contains' is not defined for {}", other.type_name())),
    };
    Ok(Value::Bool(found))
}

/// `not { value }` — boolean negation of truthiness, not a strict-bool check.
pub fn not(args: &Record) -> Result<Value, String> {
    let value = args.get("value").ok_or_else(|| "'not' requires a 'value' field".to_string())?;
    Ok(Value::Bool(!value.is_truthy()))
}

/// `and { a, b }` — truthiness conjunction; short-circuiting is irrelevant
/// here since both arguments are already evaluated records fields.
pub fn and(args: &Record) -> Result<Value, String> {
    let a = args.get("a").ok_or_else(|| "'and' requires an 'a' field".to_string())?;
    let b = args.get("b").ok_or_else(|| "'and' requires a 'b' field".to_string())?;
    Ok(Value::Bool(a.is_truthy() && b.is_truthy()))
}

/// `or { a, b }` — truthiness disjunction.
pub fn or(args: &Record) -> Result<Value, String> {
    let a = args.get("a").ok_or_else(|| "'or' requires an 'a' field".to_string())?;
    let b = args.get("b").ok_or_else(|| "'or' requires a 'b' field".to_string())?;
    Ok(Value::Bool(a.is_truthy() || b.is_truthy()))
}

/// `coalesce { values }` — first value in `values` that is not `null`
/// (strictly null-only defaulting — falsy-but-non-null values like `0`/`""`
/// are returned as-is, unlike a truthiness-based `or` chain).
pub fn coalesce(args: &Record) -> Result<Value, String> {
    let values = match args.get("values") {
        Some(Value::List(items)) => items,
        _ => return Err("'coalesce' requires a list 'values' field".to_string()),
    };
    for v in values {
        if *v != Value::Null {
            return Ok(v.clone());
        }
    }
    Ok(Value::Null)
}

/// `typeof { value }` — one of `"null"`, `"bool"`, `"number"`, `"string"`,
/// `"list"`, `"record"`.
pub fn type_of(args: &Record) -> Result<Value, String> {
    let value = args.get("value").ok_or_else(|| "'typeof' requires a 'value' field".to_string())?;
    Ok(Value::String(value.type_name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_ignores_record_key_order() {
        let mut a = Record::new();
        a.insert("x", Value::Number(1.0));
        a.insert("y", Value::Number(2.0));
        let mut b = Record::new();
        b.insert("y", Value::Number(2.0));
        b.insert("x", Value::Number(1.0));

        let mut args = Record::new();
        args.insert("a", Value::Record(a));
        args.insert("b", Value::Record(b));
        assert_eq!(eq(&args).unwrap(), Value::Bool(true));
    }

    #[test]
    fn contains_checks_record_keys() {
        let mut record = Record::new();
        record.insert("name", Value::String("a".to_string()));
        let mut args = Record::new();
        args.insert("in", Value::Record(record));
        args.insert("value", Value::String("name".to_string()));
        assert_eq!(contains(&args).unwrap(), Value::Bool(true));
    }

    #[test]
    fn coalesce_skips_null_but_keeps_falsy_non_null() {
        let mut args = Record::new();
        args.insert("values", Value::List(vec![Value::Null, Value::Number(0.0), Value::String("x".to_string())]));
        assert_eq!(coalesce(&args).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn typeof_names_each_variant() {
        let mut args = Record::new();
        args.insert("value", Value::List(vec![]));
        assert_eq!(type_of(&args).unwrap(), Value::String("list".to_string()));
    }
}
