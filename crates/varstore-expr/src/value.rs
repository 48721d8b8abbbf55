//! Runtime values and the canonical string coercion.

use chrono::{DateTime, FixedOffset, SecondsFormat, TimeDelta};
use cel_interpreter::Value as CelValue;

use crate::{EvalError, ValueType};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Null,
    List(Vec<Value>),
    Map,
    Timestamp(DateTime<FixedOffset>),
    Duration(TimeDelta),
    /// Function values and anything else the interpreter can produce.
    Opaque,
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::UInt(_) => ValueType::UInt,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Bool(_) => ValueType::Bool,
            Value::Bytes(_) => ValueType::Bytes,
            Value::Null => ValueType::Null,
            Value::List(_) => ValueType::List,
            Value::Map => ValueType::Map,
            Value::Timestamp(_) => ValueType::Timestamp,
            Value::Duration(_) => ValueType::Duration,
            Value::Opaque => ValueType::Opaque,
        }
    }

    /// Type a raw context string by literal inference: integers, then
    /// decimal/exponent doubles, then `true`/`false`, otherwise a string.
    pub fn from_context(raw: &str) -> Value {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int(i);
        }
        let numeric = !raw.is_empty()
            && raw.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+')
            && raw
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'));
        if numeric {
            if let Ok(d) = raw.parse::<f64>() {
                return Value::Double(d);
            }
        }
        match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        }
    }

    /// The engine's external, string-typed representation of a value.
    ///
    /// Bytes must be valid UTF-8. `null`, lists, maps and opaque values have
    /// no string form and fail with [`EvalError::NoStringForm`].
    pub fn to_canonical_string(&self) -> Result<String, EvalError> {
        match self {
            Value::Int(i) => Ok(i.to_string()),
            Value::UInt(u) => Ok(u.to_string()),
            Value::Double(d) => Ok(d.to_string()),
            Value::String(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Bytes(bytes) => String::from_utf8(bytes.clone())
                .map_err(|_| EvalError::NoStringForm(ValueType::Bytes)),
            Value::Timestamp(ts) => Ok(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Duration(d) => Ok(duration_string(d)),
            Value::Null | Value::List(_) | Value::Map | Value::Opaque => {
                Err(EvalError::NoStringForm(self.value_type()))
            }
        }
    }

    /// Bind a context string as an interpreter value.
    pub(crate) fn bind(raw: &str) -> CelValue {
        match Value::from_context(raw) {
            Value::Int(i) => CelValue::Int(i),
            Value::Double(d) => CelValue::Float(d),
            Value::Bool(b) => CelValue::Bool(b),
            _ => CelValue::String(raw.to_string().into()),
        }
    }
}

impl From<CelValue> for Value {
    fn from(value: CelValue) -> Self {
        match value {
            CelValue::Int(i) => Value::Int(i),
            CelValue::UInt(u) => Value::UInt(u),
            CelValue::Float(d) => Value::Double(d),
            CelValue::String(s) => Value::String(s.to_string()),
            CelValue::Bool(b) => Value::Bool(b),
            CelValue::Bytes(bytes) => Value::Bytes(bytes.to_vec()),
            CelValue::Null => Value::Null,
            CelValue::List(items) => Value::List(items.iter().cloned().map(Value::from).collect()),
            CelValue::Map(_) => Value::Map,
            CelValue::Timestamp(ts) => Value::Timestamp(ts),
            CelValue::Duration(d) => Value::Duration(d),
            _ => Value::Opaque,
        }
    }
}

/// Seconds with a trimmed fraction, e.g. `90s` or `1.5s`.
fn duration_string(d: &TimeDelta) -> String {
    let secs = d.num_seconds();
    let nanos = d.subsec_nanos();
    if nanos == 0 {
        return format!("{secs}s");
    }
    let fraction = format!("{:09}", nanos.unsigned_abs());
    let sign = if secs == 0 && nanos < 0 { "-" } else { "" };
    format!("{sign}{secs}.{}s", fraction.trim_end_matches('0'))
}
