//! Typed access to fields of a parsed JSON document.
//!
//! Composition documents are read field by field so that a malformed optional
//! field can be skipped without rejecting the whole document. Every accessor
//! reports a [`FieldError`] naming the field; the caller decides whether the
//! failure is fatal.
//!
//! Numeric accessors coerce the way lenient JSON readers do: floating point
//! values are truncated toward zero and numeric strings are parsed.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    #[error("missing field `{0}`")]
    Missing(String),
    #[error("field `{field}` is not {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
    #[error("field `{field}` value {value} is out of range")]
    OutOfRange { field: String, value: String },
}

impl FieldError {
    pub fn field(&self) -> &str {
        match self {
            FieldError::Missing(field) => field,
            FieldError::WrongType { field, .. } => field,
            FieldError::OutOfRange { field, .. } => field,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldError::Missing(_))
    }
}

/// A borrowed view of one JSON object.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> Document<'a> {
    /// Wraps `value`, failing if it is not a JSON object.
    pub fn new(value: &'a Value) -> Option<Self> {
        value.as_object().map(|fields| Self { fields })
    }

    pub fn raw(&self, key: &str) -> Result<&'a Value, FieldError> {
        match self.fields.get(key) {
            Some(Value::Null) | None => Err(FieldError::Missing(key.to_string())),
            Some(v) => Ok(v),
        }
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, FieldError> {
        let v = self.raw(key)?;
        coerce_i64(v).ok_or_else(|| FieldError::WrongType {
            field: key.to_string(),
            expected: "an integer",
        })
    }

    pub fn get_i32(&self, key: &str) -> Result<i32, FieldError> {
        let v = self.get_i64(key)?;
        i32::try_from(v).map_err(|_| FieldError::OutOfRange {
            field: key.to_string(),
            value: v.to_string(),
        })
    }

    pub fn get_array(&self, key: &str) -> Result<&'a [Value], FieldError> {
        self.raw(key)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| FieldError::WrongType {
                field: key.to_string(),
                expected: "an array",
            })
    }
}

fn coerce_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_coercion() {
        let v = json!({ "a": 60, "b": 29.97, "c": "30", "d": "12.9", "e": true });
        let doc = Document::new(&v).unwrap();

        assert_eq!(doc.get_i64("a"), Ok(60));
        assert_eq!(doc.get_i64("b"), Ok(29));
        assert_eq!(doc.get_i64("c"), Ok(30));
        assert_eq!(doc.get_i64("d"), Ok(12));
        assert!(matches!(
            doc.get_i64("e"),
            Err(FieldError::WrongType { .. })
        ));
    }

    #[test]
    fn test_missing_and_null_are_missing() {
        let v = json!({ "a": null });
        let doc = Document::new(&v).unwrap();

        assert!(doc.get_i64("a").unwrap_err().is_missing());
        assert!(doc.get_array("b").unwrap_err().is_missing());
        assert_eq!(doc.get_array("b").unwrap_err().field(), "b");
    }

    #[test]
    fn test_range_checks() {
        let v = json!({ "w": -5, "big": 10_000_000_000i64 });
        let doc = Document::new(&v).unwrap();

        assert_eq!(doc.get_i32("w"), Ok(-5));
        assert!(matches!(
            doc.get_i32("big"),
            Err(FieldError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_container_accessors() {
        let v = json!({ "layers": [1, 2], "bad": 3 });
        let doc = Document::new(&v).unwrap();

        assert_eq!(doc.get_array("layers").unwrap().len(), 2);
        assert!(matches!(
            doc.get_array("bad"),
            Err(FieldError::WrongType { expected: "an array", .. })
        ));
        assert!(Document::new(&json!([1])).is_none());
    }
}
