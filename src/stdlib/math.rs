//! `math.max`, `math.min`.

use crate::value::{Record, Value};

fn numbers(args: &Record, fn_name: &str) -> Result<Vec<f64>, String> {
    match args.get("values") {
        Some(Value::List(items)) if !items.is_empty() => items
            .iter()
            .map(|v| match v {
                Value::Number(n) => Ok(*n),
                other => Err(format!("'{}' requires every element to be a number, found {}", fn_name, other.type_name())),
            })
            .collect(),
        Some(Value::List(_)) => Err(format!("'{}' requires a non-empty 'values' list", fn_name)),
        _ => Err(format!("'{}' requires a list 'values' field", fn_name)),
    }
}

/// `math.max { values }`
pub fn max(args: &Record) -> Result<Value, String> {
    let nums = numbers(args, "math.max")?;
    Ok(Value::Number(nums.into_iter().fold(f64::NEG_INFINITY, f64::max)))
}

/// `math.min { values }`
pub fn min(args: &Record) -> Result<Value, String> {
    let nums = numbers(args, "math.min")?;
    Ok(Value::Number(nums.into_iter().fold(f64::INFINITY, f64::min)))
}
