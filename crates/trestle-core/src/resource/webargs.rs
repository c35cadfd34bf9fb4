//! Validated web method arguments with typed accessors.

use chrono::{DateTime, FixedOffset, TimeDelta};
use serde_json::{Map, Value};

use trestle_types::error::WebError;
use trestle_types::webtype::{json_type_name, parse_datetime, parse_timedelta};

/// The validated arguments handed to a web method.
///
/// Values are canonical: each passed its declared type's coercion before
/// arriving here. The typed accessors stay total anyway and report an
/// argument type error on a mismatch.
#[derive(Debug, Clone, Default)]
pub struct WebArgs {
    values: Map<String, Value>,
}

impl WebArgs {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.values
    }

    pub fn unicode(&self, name: &str) -> Result<&str, WebError> {
        self.str_arg(name, "unicode")
    }

    pub fn opt_unicode(&self, name: &str) -> Result<Option<&str>, WebError> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(self.type_error(name, "unicode")),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, WebError> {
        self.values
            .get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| self.type_error(name, "int"))
    }

    pub fn opt_int(&self, name: &str) -> Result<Option<i64>, WebError> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.type_error(name, "int")),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64, WebError> {
        self.values
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.type_error(name, "float"))
    }

    pub fn boolean(&self, name: &str) -> Result<bool, WebError> {
        self.values
            .get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| self.type_error(name, "bool"))
    }

    pub fn datetime(&self, name: &str) -> Result<DateTime<FixedOffset>, WebError> {
        let raw = self.str_arg(name, "datetime")?;
        parse_datetime(raw).ok_or_else(|| WebError::ArgPrimValue {
            name: name.to_string(),
            value: Value::String(raw.to_string()),
            message: Some(format!("unparsable datetime '{raw}'")),
            expected_value: None,
        })
    }

    pub fn timedelta(&self, name: &str) -> Result<TimeDelta, WebError> {
        let raw = self.str_arg(name, "timedelta")?;
        parse_timedelta(raw).ok_or_else(|| WebError::ArgPrimValue {
            name: name.to_string(),
            value: Value::String(raw.to_string()),
            message: Some(format!("unparsable timedelta '{raw}'")),
            expected_value: None,
        })
    }

    pub fn list(&self, name: &str) -> Result<&[Value], WebError> {
        self.values
            .get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| self.type_error(name, "list"))
    }

    pub fn dict(&self, name: &str) -> Result<&Map<String, Value>, WebError> {
        self.values
            .get(name)
            .and_then(Value::as_object)
            .ok_or_else(|| self.type_error(name, "dict"))
    }

    fn str_arg(&self, name: &str, expected: &str) -> Result<&str, WebError> {
        match self.values.get(name) {
            Some(Value::String(s)) => Ok(s),
            _ => Err(self.type_error(name, expected)),
        }
    }

    fn type_error(&self, name: &str, expected: &str) -> WebError {
        let found = self
            .values
            .get(name)
            .map(json_type_name)
            .unwrap_or("missing");
        WebError::ArgPrimType {
            name: name.to_string(),
            type_name: found.to_string(),
            message: None,
            expected_type: Some(expected.to_string()),
        }
    }
}
