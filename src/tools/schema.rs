//! A small JSON-Schema subset used to validate tool argument records before
//! `execute` runs. Not a general JSON Schema implementation — just enough to
//! express "this field is required and must be this value kind," which is all
//! the four reference tools need.

use crate::value::{Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    List,
    Record,
    Any,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::Any => true,
            FieldKind::String => matches!(value, Value::String(_)),
            FieldKind::Number => matches!(value, Value::Number(_)),
            FieldKind::Bool => matches!(value, Value::Bool(_)),
            FieldKind::List => matches!(value, Value::List(_)),
            FieldKind::Record => matches!(value, Value::Record(_)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

/// A tool's input (or output) schema: a flat list of named, typed fields.
#[derive(Debug, Clone, Copy)]
pub struct Schema(pub &'static [Field]);

impl Schema {
    /// Validates `args` against this schema. Extra fields not named in the
    /// schema are ignored, matching the record's own "open" nature.
    pub fn validate(&self, args: &Record) -> Result<(), String> {
        for field in self.0 {
            match args.get(field.name) {
                Some(value) if field.kind.matches(value) => {}
                Some(value) => {
                    return Err(format!(
                        "field '{}' must be a {:?}, got {}",
                        field.name,
                        field.kind,
                        value.type_name()
                    ))
                }
                None if field.required => return Err(format!("missing required field '{}'", field.name)),
                None => {}
            }
        }
        Ok(())
    }
}

pub const fn field(name: &'static str, kind: FieldKind, required: bool) -> Field {
    Field { name, kind, required }
}
