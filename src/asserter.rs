use std::fmt;

use serde_json::Number;
use serde_json::Value;

/// A response that did not deep-equal the expected value.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub name: String,
    pub expected: Value,
    pub actual: Value,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} {}",
            console::style("✘").red().bold(),
            console::style("FAIL!").red().bold(),
            console::style(&self.name).bold(),
        )?;
        writeln!(f, "  {}", console::style("Expected JSON:").green())?;
        writeln!(
            f,
            "{}",
            console::style(serde_json::to_string_pretty(&self.expected).unwrap_or_default()).green()
        )?;
        writeln!(f, "  {}", console::style("Actual JSON:").red())?;
        write!(
            f,
            "{}",
            console::style(serde_json::to_string_pretty(&self.actual).unwrap_or_default()).red()
        )
    }
}

pub fn assert_response(name: &str, expected: &Value, actual: Value) -> Result<(), Mismatch> {
    if json_eq(expected, &actual) {
        return Ok(());
    }

    Err(Mismatch {
        name: name.to_string(),
        expected: expected.clone(),
        actual,
    })
}

/// Deep structural equality.
///
/// Object key order is ignored, array order is not. Numbers compare by value,
/// so `1` equals `1.0`.
pub fn json_eq(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            expected.len() == actual.len()
                && expected
                    .iter()
                    .all(|(key, value)| actual.get(key).is_some_and(|other| json_eq(value, other)))
        }
        (Value::Array(expected), Value::Array(actual)) => {
            expected.len() == actual.len()
                && expected.iter().zip(actual).all(|(a, b)| json_eq(a, b))
        }
        (Value::Number(expected), Value::Number(actual)) => numbers_eq(expected, actual),
        _ => expected == actual,
    }
}

fn numbers_eq(a: &Number, b: &Number) -> bool {
    if a.is_f64() || b.is_f64() {
        return a.as_f64() == b.as_f64();
    }

    a == b
}
