//! The A0 value universe: exactly six variants, plus the ordered `Record` type.
//!
//! Records preserve insertion order (load-bearing for canonical JSON serialization
//! and the formatter) but compare equal regardless of key order, so `Record` wraps
//! an `IndexMap` rather than a plain `HashMap` and implements `PartialEq` itself.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

/// An insertion-ordered, key-unique mapping from string keys to values.
#[derive(Debug, Clone, Default)]
pub struct Record(IndexMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(IndexMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Inserts or overwrites `key`. Overwriting preserves the key's original
    /// insertion position, matching IndexMap semantics and the
    /// first-seen-key-wins-position rule for record spread.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        let mut r = Record::new();
        for (k, v) in pairs {
            r.insert(k, v);
        }
        r
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        self.0.iter().all(|(k, v)| other.0.get(k).map(|ov| ov == v).unwrap_or(false))
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut r = Record::new();
        for (k, v) in iter {
            r.insert(k, v);
        }
        r
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in self.0.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let map = IndexMap::<String, Value>::deserialize(deserializer)?;
        Ok(Record(map))
    }
}

/// The universe of A0 values: null, boolean, number (IEEE-754 double), string,
/// ordered list, ordered record. There is no seventh variant — functions, tools,
/// and macros all live outside the value universe (see `eval::FunctionTable`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Record(Record),
}

impl Serialize for Value {
    /// Hand-written rather than derived: a derived `#[serde(untagged)]` impl
    /// serializes `Number` via `f64`'s own `Serialize`, which always renders a
    /// decimal point (`42.0`). Canonical JSON output requires whole numbers
    /// to render as integers (`{"value":42}`, not `{"value":42.0}`), so the
    /// numeric case is special-cased here.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => items.serialize(serializer),
            Value::Record(r) => r.serialize(serializer),
        }
    }
}

impl PartialEq for Value {
    /// Deep structural equality. Record comparison ignores key order, per the
    /// language's equality predicate.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Truthiness per spec §4.4: `false`, `null`, `0`, and `""` are falsy;
    /// everything else is truthy. This is the single authority for the rule —
    /// never re-derive it inline at a call site.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(_) | Value::Record(_) => true,
        }
    }

    /// The `typeof` name used by the stdlib predicate of the same name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Json {
        serde_json::to_value(self).unwrap_or(Json::Null)
    }
}

impl fmt::Display for Value {
    /// Human-readable rendering used by diagnostics and `a0 trace --text`. Not
    /// the canonical serialization (see `to_json`/`Serialize`), which is what
    /// actually reaches stdout and the trace file.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Record(r) => {
                write!(f, "{{")?;
                for (i, (k, v)) in r.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falsy_values() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
    }

    #[test]
    fn truthy_values_diverge_from_lisp_truthiness() {
        // Unlike a Lisp-family truthiness rule, 0 and "" are falsy here, and any
        // list/record (even empty) is truthy.
        assert!(Value::Number(1.0).is_truthy());
        assert!(Value::String("x".into()).is_truthy());
        assert!(Value::List(vec![]).is_truthy());
        assert!(Value::Record(Record::new()).is_truthy());
    }

    #[test]
    fn record_equality_ignores_key_order() {
        let mut a = Record::new();
        a.insert("x", Value::Number(1.0));
        a.insert("y", Value::Number(2.0));

        let mut b = Record::new();
        b.insert("y", Value::Number(2.0));
        b.insert("x", Value::Number(1.0));

        assert_eq!(Value::Record(a), Value::Record(b));
    }

    #[test]
    fn record_serializes_in_insertion_order() {
        let mut r = Record::new();
        r.insert("b", Value::Number(2.0));
        r.insert("a", Value::Number(1.0));
        let json = serde_json::to_string(&Value::Record(r)).unwrap();
        assert_eq!(json, r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn whole_numbers_serialize_without_a_decimal_point() {
        assert_eq!(serde_json::to_string(&Value::Number(42.0)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&Value::Number(1.5)).unwrap(), "1.5");
    }

    #[test]
    fn number_display_drops_trailing_fraction_for_whole_numbers() {
        assert_eq!(Value::Number(42.0).to_string(), "42");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
    }
}
