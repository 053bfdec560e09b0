//! Configuration snapshot → typed [`Sensor`] records.
//!
//! The bridge's `/get_config` service returns a JSON object keyed by sensor
//! id:
//!
//! ```json
//! {
//!   "imu": {
//!     "type": "accelerometer",
//!     "enabled": true,
//!     "package_name": "core_package",
//!     "node_name": "imu_node",
//!     "params": {
//!       "rate": { "type": "int", "value": 100, "range": [1, 400] },
//!       "mode": { "type": "string", "value": "fast", "options": ["fast", "slow"], "requires_reboot": true }
//!     }
//!   }
//! }
//! ```
//!
//! Sensors and parameters keep the order they appear in.  A single invalid
//! parameter rejects the whole snapshot so the session never shows a
//! partially loaded configuration.

use orinx_types::{ConfigError, ParamKind, ParamSet, ParamValue, Sensor, SensorParameter};
use serde_json::{Map, Value};

/// Parse and validate a configuration snapshot.
///
/// # Errors
///
/// - [`ConfigError::MalformedSnapshot`] – not JSON, or not an object.
/// - [`ConfigError::InvalidSensor`] – a sensor or parameter entry has the
///   wrong shape.
/// - [`ConfigError::UnknownKind`], [`ConfigError::KindMismatch`],
///   [`ConfigError::OutOfRange`], [`ConfigError::InvalidRange`],
///   [`ConfigError::NotAnOption`] – a parameter failed validation.  The
///   parameter is named `sensor.param`.
pub fn parse_snapshot(json: &str) -> Result<Vec<Sensor>, ConfigError> {
    let root: Value =
        serde_json::from_str(json).map_err(|e| ConfigError::MalformedSnapshot(e.to_string()))?;
    let Value::Object(entries) = root else {
        return Err(ConfigError::MalformedSnapshot(format!(
            "expected an object of sensors, found {}",
            json_kind(&root)
        )));
    };

    entries
        .iter()
        .map(|(id, entry)| parse_sensor(id, entry))
        .collect()
}

fn parse_sensor(id: &str, entry: &Value) -> Result<Sensor, ConfigError> {
    let invalid = |details: String| ConfigError::InvalidSensor {
        sensor: id.to_string(),
        details,
    };
    let Value::Object(fields) = entry else {
        return Err(invalid(format!("expected an object, found {}", json_kind(entry))));
    };

    let text = |key: &str| fields.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

    let mut params = ParamSet::new();
    match fields.get("params") {
        None | Some(Value::Null) => {}
        Some(Value::Object(raw)) => {
            for (name, raw_param) in raw {
                let param = parse_param(id, name, raw_param)?;
                params.insert(name.clone(), param);
            }
        }
        Some(other) => {
            return Err(invalid(format!("params must be an object, found {}", json_kind(other))));
        }
    }

    Ok(Sensor {
        id: id.to_string(),
        display_name: id.to_string(),
        type_tag: text("type"),
        owner_package: text("package_name"),
        owner_node: text("node_name"),
        enabled: fields.get("enabled").and_then(Value::as_bool).unwrap_or(true),
        params,
    })
}

fn parse_param(sensor: &str, name: &str, raw: &Value) -> Result<SensorParameter, ConfigError> {
    let qualified = format!("{sensor}.{name}");
    let invalid = |details: String| ConfigError::InvalidSensor {
        sensor: sensor.to_string(),
        details: format!("parameter '{name}': {details}"),
    };
    let Value::Object(fields) = raw else {
        return Err(invalid(format!("expected an object, found {}", json_kind(raw))));
    };

    let tag = fields
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing type".to_string()))?;
    let kind = match tag {
        "int" => ParamKind::Int {
            range: parse_range(fields).map_err(invalid)?,
        },
        "boolean" => ParamKind::Bool,
        "string" => ParamKind::Text {
            options: parse_options(fields).map_err(invalid)?,
        },
        other => {
            return Err(ConfigError::UnknownKind {
                param: qualified,
                tag: other.to_string(),
            });
        }
    };

    let raw_value = fields.get("value").unwrap_or(&Value::Null);
    let value = match kind {
        ParamKind::Int { .. } => raw_value.as_i64().map(ParamValue::Int),
        ParamKind::Bool => raw_value.as_bool().map(ParamValue::Bool),
        ParamKind::Text { .. } => raw_value.as_str().map(|s| ParamValue::Text(s.to_string())),
    }
    .ok_or_else(|| ConfigError::KindMismatch {
        param: qualified.clone(),
        expected: kind.tag(),
        found: json_kind(raw_value).to_string(),
    })?;

    let requires_reboot = fields
        .get("requires_reboot")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let param = SensorParameter::new(&qualified, kind, value, requires_reboot)?;
    Ok(match fields.get("description").and_then(Value::as_str) {
        Some(description) => param.with_description(description),
        None => param,
    })
}

fn parse_range(fields: &Map<String, Value>) -> Result<Option<(i64, i64)>, String> {
    match fields.get("range") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(bounds)) => match bounds.as_slice() {
            [min, max] => match (min.as_i64(), max.as_i64()) {
                (Some(min), Some(max)) => Ok(Some((min, max))),
                _ => Err("range bounds must be integers".to_string()),
            },
            _ => Err(format!("range must have two bounds, found {}", bounds.len())),
        },
        Some(other) => Err(format!("range must be an array, found {}", json_kind(other))),
    }
}

fn parse_options(fields: &Map<String, Value>) -> Result<Option<Vec<String>>, String> {
    match fields.get("options") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| "options must be strings".to_string())
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(format!("options must be an array, found {}", json_kind(other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
