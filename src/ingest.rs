//! ==============================================================================
//! ingest.rs - reading validator and timestamp normalization
//! ==============================================================================
//!
//! purpose:
//!     turns an untrusted json submission (POST /data body or an
//!     `update-location` event) into a validated Measurement.
//!
//! schemas:
//!     - node   (default, or kind:"node"):  pm25, pm10, lat, lon required
//!     - mobile (kind:"mobile", and every update-location event):
//!              pm25, lat, lon required; pm10 optional, never synthesized
//!
//! coercion:
//!     numeric fields accept numbers or numeric strings (" 12.5 " -> 12.5).
//!     null and "" count as missing.
//!
//! ==============================================================================

use serde_json::{Map, Value};

use crate::domain::{Measurement, ReadingKind};
use crate::error::ValidationError;

/// epoch values below this are seconds, at or above are milliseconds.
///
/// heuristic, not a protocol guarantee: 10^11 s is year 5138 and 10^11 ms is
/// march 1973, so anything between those is classified by magnitude alone.
pub const EPOCH_SECONDS_CEILING: f64 = 1e11;

/// normalize an epoch number of unknown unit to milliseconds
pub fn normalize_epoch(t: f64) -> i64 {
    if t < EPOCH_SECONDS_CEILING {
        (t * 1000.0).round() as i64
    } else {
        t.round() as i64
    }
}

/// pick the schema a POST /data body asks for (node when `kind` is absent)
pub fn schema_of(raw: &Value) -> Result<ReadingKind, ValidationError> {
    let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;
    match obj.get("kind") {
        None | Some(Value::Null) => Ok(ReadingKind::Node),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "node" => Ok(ReadingKind::Node),
            "mobile" => Ok(ReadingKind::Mobile),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        },
        Some(other) => Err(ValidationError::UnknownKind(other.to_string())),
    }
}

/// validate `raw` against `kind`; `now_ms` is used when no timestamp is given
pub fn validate(raw: &Value, kind: ReadingKind, now_ms: i64) -> Result<Measurement, ValidationError> {
    let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    let pm25 = required(obj, "pm25")?;
    let pm10 = match kind {
        ReadingKind::Node => Some(required(obj, "pm10")?),
        ReadingKind::Mobile => number(obj, "pm10")?,
    };
    let lat = required(obj, "lat")?;
    let lon = required(obj, "lon")?;

    check_concentration("pm25", pm25)?;
    if let Some(pm10) = pm10 {
        check_concentration("pm10", pm10)?;
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::OutOfRange { field: "lat" });
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(ValidationError::OutOfRange { field: "lon" });
    }

    Ok(Measurement {
        kind,
        node: node_id(obj)?,
        pm25,
        pm10,
        lat,
        lon,
        timestamp: timestamp(obj.get("timestamp"), now_ms)?,
    })
}

fn required(obj: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    number(obj, field)?.ok_or(ValidationError::MissingField { field })
}

fn number(obj: &Map<String, Value>, field: &'static str) -> Result<Option<f64>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or(ValidationError::NotNumeric { field }),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ValidationError::NotNumeric { field }),
        Some(_) => Err(ValidationError::NotNumeric { field }),
    }
}

fn check_concentration(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field })
    }
}

fn node_id(obj: &Map<String, Value>) -> Result<Option<String>, ValidationError> {
    match obj.get("node") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        // firmware sometimes sends a numeric chip id
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(ValidationError::InvalidNode),
    }
}

fn timestamp(value: Option<&Value>, now_ms: i64) -> Result<i64, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(now_ms),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|t| t.is_finite())
            .map(normalize_epoch)
            .ok_or(ValidationError::InvalidTimestamp),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(now_ms);
            }
            if let Ok(t) = s.parse::<f64>() {
                return if t.is_finite() {
                    Ok(normalize_epoch(t))
                } else {
                    Err(ValidationError::InvalidTimestamp)
                };
            }
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.timestamp_millis())
                .map_err(|_| ValidationError::InvalidTimestamp)
        }
        Some(_) => Err(ValidationError::InvalidTimestamp),
    }
}
