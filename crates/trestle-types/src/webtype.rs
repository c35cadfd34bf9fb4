//! Web-transmittable type descriptors.
//!
//! A [`WebTypeDef`] describes the declared type of a web method argument or
//! return value. Its [`from_prim`](WebTypeDef::from_prim) validates a JSON
//! primitive against the descriptor and canonicalizes it (for example,
//! datetimes are re-rendered in the canonical wire format).

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, TimeZone};
use regex::Regex;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::class_def::ClassDefInfo;

/// Why a primitive failed coercion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimCoerceError {
    /// The primitive's JSON type does not fit the descriptor.
    #[error("invalid primitive type '{found}'; expecting {expected}")]
    Type { found: String, expected: String },

    /// The primitive has an acceptable shape but an unparsable value.
    #[error("{0}")]
    Value(String),
}

/// The declared type of a web method argument or return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebTypeDef {
    Null,
    Bool,
    Int,
    Float,
    Bytes,
    Unicode,
    DateTime,
    TimeDelta,
    ClassDef,
    List(Box<WebTypeDef>),
    Dict(Box<WebTypeDef>, Box<WebTypeDef>),
}

impl WebTypeDef {
    /// Human-readable name used in error messages.
    pub fn display_name(&self) -> String {
        match self {
            WebTypeDef::Null => "null".to_string(),
            WebTypeDef::Bool => "bool".to_string(),
            WebTypeDef::Int => "int".to_string(),
            WebTypeDef::Float => "float".to_string(),
            WebTypeDef::Bytes => "bytes".to_string(),
            WebTypeDef::Unicode => "unicode".to_string(),
            WebTypeDef::DateTime => "datetime".to_string(),
            WebTypeDef::TimeDelta => "timedelta".to_string(),
            WebTypeDef::ClassDef => "class definition".to_string(),
            WebTypeDef::List(item) => format!("list({})", item.display_name()),
            WebTypeDef::Dict(key, value) => {
                format!("dict({}, {})", key.display_name(), value.display_name())
            }
        }
    }

    /// Validate `prim` against this descriptor and return its canonical form.
    ///
    /// Scalar coercion is deliberately loose, matching how dynamic clients
    /// send primitives: ints accept numeric strings, bools accept any scalar
    /// by truthiness, unicode accepts scalars by display conversion.
    pub fn from_prim(&self, prim: &Value) -> Result<Value, PrimCoerceError> {
        match self {
            WebTypeDef::Null => match prim {
                Value::Null => Ok(Value::Null),
                other => Err(self.type_error(other)),
            },
            WebTypeDef::Bool => Ok(Value::Bool(truthy(prim))),
            WebTypeDef::Int => self.coerce_int(prim),
            WebTypeDef::Float => self.coerce_float(prim),
            WebTypeDef::Bytes => match prim {
                Value::String(s) => Ok(Value::String(s.clone())),
                other => Err(self.type_error(other)),
            },
            WebTypeDef::Unicode => match prim {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                other => Err(self.type_error(other)),
            },
            WebTypeDef::DateTime => match prim {
                Value::String(s) => match parse_datetime(s) {
                    Some(dt) => Ok(Value::String(format_datetime(&dt))),
                    None => Err(PrimCoerceError::Value(format!(
                        "unparsable datetime '{s}'"
                    ))),
                },
                other => Err(self.type_error(other)),
            },
            WebTypeDef::TimeDelta => match prim {
                Value::String(s) => match parse_timedelta(s) {
                    Some(td) => Ok(Value::String(format_timedelta(&td))),
                    None => Err(PrimCoerceError::Value(format!(
                        "unparsable timedelta '{s}'"
                    ))),
                },
                other => Err(self.type_error(other)),
            },
            WebTypeDef::ClassDef => match prim {
                Value::String(s) => match ClassDefInfo::from_prim(s) {
                    Some(info) => Ok(Value::String(info.prim())),
                    None => Err(PrimCoerceError::Value(format!(
                        "unparsable class definition '{s}'"
                    ))),
                },
                other => Err(self.type_error(other)),
            },
            WebTypeDef::List(item) => match prim {
                Value::Array(items) => {
                    let mut coerced = Vec::with_capacity(items.len());
                    for entry in items {
                        coerced.push(item.from_prim(entry)?);
                    }
                    Ok(Value::Array(coerced))
                }
                other => Err(self.type_error(other)),
            },
            WebTypeDef::Dict(key, value) => match prim {
                Value::Object(entries) => {
                    let mut coerced = Map::new();
                    for (k, v) in entries {
                        key.from_prim(&Value::String(k.clone()))?;
                        coerced.insert(k.clone(), value.from_prim(v)?);
                    }
                    Ok(Value::Object(coerced))
                }
                other => Err(self.type_error(other)),
            },
        }
    }

    fn coerce_int(&self, prim: &Value) -> Result<Value, PrimCoerceError> {
        match prim {
            Value::Bool(b) => Ok(Value::Number(Number::from(*b as i64))),
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    Ok(Value::Number(n.clone()))
                } else {
                    // fractional input truncates toward zero
                    let f = n.as_f64().unwrap_or(f64::NAN);
                    if f.is_finite() {
                        Ok(Value::Number(Number::from(f.trunc() as i64)))
                    } else {
                        Err(PrimCoerceError::Value(format!("cannot convert {n} to int")))
                    }
                }
            }
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(i) => Ok(Value::Number(Number::from(i))),
                Err(_) => Err(PrimCoerceError::Value(format!("cannot parse '{s}' as int"))),
            },
            other => Err(self.type_error(other)),
        }
    }

    fn coerce_float(&self, prim: &Value) -> Result<Value, PrimCoerceError> {
        let f = match prim {
            Value::Bool(b) => *b as i64 as f64,
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| PrimCoerceError::Value(format!("cannot parse '{s}' as float")))?,
            other => return Err(self.type_error(other)),
        };
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| PrimCoerceError::Value(format!("non-finite float {f}")))
    }

    fn type_error(&self, found: &Value) -> PrimCoerceError {
        PrimCoerceError::Type {
            found: json_type_name(found).to_string(),
            expected: self.display_name(),
        }
    }
}

impl fmt::Display for WebTypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// The JSON type name of a value, distinguishing int from float.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

static DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<year>\d+)-(?P<month>\d+)-(?P<day>\d+)( (?P<hour>\d+):(?P<minute>\d+):(?P<second>\d+)\.(?P<micro>\d+)( (?P<tz_sign>[-+])(?P<tz_hours>\d{2})(?P<tz_minutes>\d{2})?)?)?$",
    )
    .expect("valid datetime regex")
});

static TIMEDELTA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<days>[+-]\d+) days (?P<seconds>[+-]\d+)\.(?P<micros>\d+) s$")
        .expect("valid timedelta regex")
});

/// Parse the canonical datetime wire format,
/// `YYYY-MM-DD[ HH:MM:SS.ffffff[ ±HHMM]]`. A missing zone means UTC.
pub fn parse_datetime(prim: &str) -> Option<DateTime<FixedOffset>> {
    let caps = DATETIME_RE.captures(prim)?;
    let num = |name: &str| {
        caps.name(name)
            .and_then(|m| m.as_str().parse::<u32>().ok())
    };

    let year: i32 = caps.name("year")?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, num("month")?, num("day")?)?;
    let time = date.and_hms_micro_opt(
        num("hour").unwrap_or(0),
        num("minute").unwrap_or(0),
        num("second").unwrap_or(0),
        num("micro").unwrap_or(0),
    )?;

    let offset_minutes = match caps.name("tz_sign") {
        Some(sign) => {
            let hours = num("tz_hours")? as i32;
            let minutes = num("tz_minutes").unwrap_or(0) as i32;
            let magnitude = hours * 60 + minutes;
            if sign.as_str() == "-" { -magnitude } else { magnitude }
        }
        None => 0,
    };
    let offset = FixedOffset::east_opt(offset_minutes * 60)?;
    offset.from_local_datetime(&time).single()
}

/// Render a datetime in the canonical wire format.
pub fn format_datetime(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f %z").to_string()
}

/// Parse the canonical timedelta wire format,
/// `{days:+} days {seconds:+}.{micros:06} s`.
pub fn parse_timedelta(prim: &str) -> Option<TimeDelta> {
    let caps = TIMEDELTA_RE.captures(prim)?;
    let days: i64 = caps["days"].parse().ok()?;
    let seconds: i64 = caps["seconds"].parse().ok()?;
    let micros: i64 = caps["micros"].parse().ok()?;
    TimeDelta::try_days(days)?
        .checked_add(&TimeDelta::try_seconds(seconds)?)?
        .checked_add(&TimeDelta::microseconds(micros))
}

/// Render a timedelta in the canonical wire format. Components are
/// normalized so the sub-day part is always nonnegative.
pub fn format_timedelta(td: &TimeDelta) -> String {
    let total_micros = td
        .num_microseconds()
        .unwrap_or_else(|| td.num_seconds().saturating_mul(1_000_000));
    let days = total_micros.div_euclid(86_400_000_000);
    let rem = total_micros.rem_euclid(86_400_000_000);
    let seconds = rem / 1_000_000;
    let micros = rem % 1_000_000;
    format!("{days:+} days {seconds:+}.{micros:06} s")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
