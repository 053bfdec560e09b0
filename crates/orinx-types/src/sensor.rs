//! Sensor records and their typed parameters.
//!
//! The bridge describes parameters with a runtime `type` tag.  At the
//! ingestion boundary that loose shape is turned into a [`ParamKind`] /
//! [`ParamValue`] pair, and [`SensorParameter::new`] refuses any pair whose
//! value does not fit its kind.  Past that point, a value that does not
//! match its parameter cannot be represented.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

// ────────────────────────────────────────────────────────────────────────────
// Values and kinds
// ────────────────────────────────────────────────────────────────────────────

/// A concrete parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl ParamValue {
    /// The bridge type tag this value naturally belongs to.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "int",
            Self::Text(_) => "string",
        }
    }
}

/// Values are sent to the bridge as text; the remote side does the parsing.
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// The declared type of a parameter together with its constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Integer, optionally bounded by an inclusive `(min, max)` range.
    Int { range: Option<(i64, i64)> },
    Bool,
    /// Free text, optionally restricted to a fixed set of options.
    Text { options: Option<Vec<String>> },
}

impl ParamKind {
    /// The bridge type tag (`"int"`, `"boolean"`, `"string"`).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Int { .. } => "int",
            Self::Bool => "boolean",
            Self::Text { .. } => "string",
        }
    }

    /// Check that `value` is acceptable for a parameter of this kind.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::KindMismatch`] – the value has the wrong variant.
    /// - [`ConfigError::OutOfRange`] – an integer falls outside the range.
    /// - [`ConfigError::NotAnOption`] – a text value is not one of the options.
    pub fn check(&self, param: &str, value: &ParamValue) -> Result<(), ConfigError> {
        match (self, value) {
            (Self::Int { range }, ParamValue::Int(v)) => {
                if let Some((min, max)) = *range
                    && (*v < min || *v > max)
                {
                    return Err(ConfigError::OutOfRange {
                        param: param.to_string(),
                        value: *v,
                        min,
                        max,
                    });
                }
                Ok(())
            }
            (Self::Bool, ParamValue::Bool(_)) => Ok(()),
            (Self::Text { options }, ParamValue::Text(v)) => {
                if let Some(options) = options
                    && !options.iter().any(|o| o == v)
                {
                    return Err(ConfigError::NotAnOption {
                        param: param.to_string(),
                        value: v.clone(),
                        options: options.clone(),
                    });
                }
                Ok(())
            }
            (kind, value) => Err(ConfigError::KindMismatch {
                param: param.to_string(),
                expected: kind.tag(),
                found: value.kind_name().to_string(),
            }),
        }
    }

    /// Parse operator-typed text into a value of this kind and validate it.
    pub fn parse(&self, param: &str, input: &str) -> Result<ParamValue, ConfigError> {
        let value = match self {
            Self::Int { .. } => input.trim().parse::<i64>().map(ParamValue::Int).map_err(|_| {
                ConfigError::Unparseable {
                    param: param.to_string(),
                    input: input.to_string(),
                    expected: "int",
                }
            })?,
            Self::Bool => match input.trim().to_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => ParamValue::Bool(true),
                "false" | "off" | "no" | "0" => ParamValue::Bool(false),
                _ => {
                    return Err(ConfigError::Unparseable {
                        param: param.to_string(),
                        input: input.to_string(),
                        expected: "boolean",
                    });
                }
            },
            Self::Text { .. } => ParamValue::Text(input.to_string()),
        };
        self.check(param, &value)?;
        Ok(value)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SensorParameter
// ────────────────────────────────────────────────────────────────────────────

/// One named setting of a sensor.
///
/// Fields are private so the kind/value invariant cannot be broken after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorParameter {
    kind: ParamKind,
    value: ParamValue,
    description: Option<String>,
    requires_reboot: bool,
}

impl SensorParameter {
    /// Build a parameter, validating `value` against `kind`.
    ///
    /// `name` is only used to give errors context.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidRange`] when `min > max`, or any error from
    /// [`ParamKind::check`].
    pub fn new(
        name: &str,
        kind: ParamKind,
        value: ParamValue,
        requires_reboot: bool,
    ) -> Result<Self, ConfigError> {
        if let ParamKind::Int { range: Some((min, max)) } = kind
            && min > max
        {
            return Err(ConfigError::InvalidRange {
                param: name.to_string(),
                min,
                max,
            });
        }
        kind.check(name, &value)?;
        Ok(Self {
            kind,
            value,
            description: None,
            requires_reboot,
        })
    }

    /// Attach a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// `true` for boot parameters, which only take effect after a reboot.
    pub fn requires_reboot(&self) -> bool {
        self.requires_reboot
    }

    fn set_value(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        self.kind.check(name, &value)?;
        self.value = value;
        Ok(())
    }
}

/// Which half of a sensor's parameters an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamScope {
    /// Parameters that can be changed while the robot runs.
    Live,
    /// Parameters that need a reboot to take effect.
    Boot,
}

impl ParamScope {
    pub fn includes(self, param: &SensorParameter) -> bool {
        match self {
            Self::Live => !param.requires_reboot(),
            Self::Boot => param.requires_reboot(),
        }
    }
}

impl fmt::Display for ParamScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Boot => write!(f, "boot"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ParamSet
// ────────────────────────────────────────────────────────────────────────────

/// Parameters of one sensor, kept in the order the snapshot listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSet {
    entries: Vec<(String, SensorParameter)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `param` under `name`.  An existing entry keeps its position and
    /// is returned.
    pub fn insert(&mut self, name: impl Into<String>, param: SensorParameter) -> Option<SensorParameter> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, param)),
            None => {
                self.entries.push((name, param));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SensorParameter> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SensorParameter)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    /// Parameters belonging to `scope`, in snapshot order.
    pub fn in_scope(&self, scope: ParamScope) -> impl Iterator<Item = (&str, &SensorParameter)> {
        self.iter().filter(move |(_, p)| scope.includes(p))
    }

    /// Replace the committed value of `name`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownParameter`] if `name` is absent, or a validation
    /// error if `value` does not fit the parameter.
    pub fn set_value(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        let (_, param) = self
            .entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| ConfigError::UnknownParameter {
                param: name.to_string(),
            })?;
        param.set_value(name, value)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensor
// ────────────────────────────────────────────────────────────────────────────

/// A configurable sensor as reported by the bridge's config snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    /// Snapshot key; unique and stable for the session.
    pub id: String,
    pub display_name: String,
    /// Sensor family, e.g. `"accelerometer"`.
    pub type_tag: String,
    pub owner_package: String,
    pub owner_node: String,
    pub enabled: bool,
    pub params: ParamSet,
}

impl Sensor {
    /// Copy of every parameter's current value, in snapshot order.
    pub fn current_values(&self) -> Vec<(String, ParamValue)> {
        self.params
            .iter()
            .map(|(name, p)| (name.to_string(), p.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_param(value: i64, range: Option<(i64, i64)>, reboot: bool) -> SensorParameter {
        SensorParameter::new("p", ParamKind::Int { range }, ParamValue::Int(value), reboot).unwrap()
    }

    #[test]
    fn int_outside_range_is_rejected() {
        let err = SensorParameter::new(
            "sensitivity",
            ParamKind::Int { range: Some((1, 16)) },
            ParamValue::Int(32),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { value: 32, min: 1, max: 16, .. }));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = SensorParameter::new(
            "bandwidth",
            ParamKind::Int { range: Some((100, 1)) },
            ParamValue::Int(50),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRange { .. }));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let err = SensorParameter::new("enabled", ParamKind::Bool, ParamValue::Int(1), false)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::KindMismatch {
                param: "enabled".into(),
                expected: "boolean",
                found: "int".into(),
            }
        );
    }

    #[test]
    fn text_must_be_an_option_when_options_exist() {
        let kind = ParamKind::Text {
            options: Some(vec!["low".into(), "high".into()]),
        };
        assert!(kind.check("gain", &ParamValue::Text("high".into())).is_ok());
        assert!(matches!(
            kind.check("gain", &ParamValue::Text("max".into())),
            Err(ConfigError::NotAnOption { .. })
        ));
        let free = ParamKind::Text { options: None };
        assert!(free.check("label", &ParamValue::Text("anything".into())).is_ok());
    }

    #[test]
    fn parse_follows_kind() {
        let int = ParamKind::Int { range: Some((0, 10)) };
        assert_eq!(int.parse("rate", " 7 "), Ok(ParamValue::Int(7)));
        assert!(matches!(int.parse("rate", "7.5"), Err(ConfigError::Unparseable { .. })));
        assert!(matches!(int.parse("rate", "11"), Err(ConfigError::OutOfRange { .. })));
        assert_eq!(ParamKind::Bool.parse("on", "off"), Ok(ParamValue::Bool(false)));
        assert!(ParamKind::Bool.parse("on", "maybe").is_err());
    }

    #[test]
    fn values_stringify_for_the_wire() {
        assert_eq!(ParamValue::Int(-3).to_string(), "-3");
        assert_eq!(ParamValue::Bool(true).to_string(), "true");
        assert_eq!(ParamValue::Text("hd".into()).to_string(), "hd");
    }

    #[test]
    fn param_set_keeps_insertion_order_and_replaces_in_place() {
        let mut set = ParamSet::new();
        set.insert("b", int_param(1, None, false));
        set.insert("a", int_param(2, None, true));
        assert!(set.insert("b", int_param(3, None, false)).is_some());

        let names: Vec<&str> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(set.get("b").unwrap().value(), &ParamValue::Int(3));
    }

    #[test]
    fn scopes_partition_parameters() {
        let mut set = ParamSet::new();
        set.insert("live", int_param(1, None, false));
        set.insert("boot", int_param(2, None, true));
        let live: Vec<&str> = set.in_scope(ParamScope::Live).map(|(n, _)| n).collect();
        let boot: Vec<&str> = set.in_scope(ParamScope::Boot).map(|(n, _)| n).collect();
        assert_eq!(live, vec!["live"]);
        assert_eq!(boot, vec!["boot"]);
    }

    #[test]
    fn set_value_validates_and_reports_unknown_names() {
        let mut set = ParamSet::new();
        set.insert("rate", int_param(5, Some((1, 10)), false));
        assert!(set.set_value("rate", ParamValue::Int(9)).is_ok());
        assert!(set.set_value("rate", ParamValue::Int(99)).is_err());
        assert_eq!(set.get("rate").unwrap().value(), &ParamValue::Int(9));
        assert!(matches!(
            set.set_value("ghost", ParamValue::Int(1)),
            Err(ConfigError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn untagged_values_deserialize_from_plain_json() {
        let v: ParamValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, ParamValue::Bool(true));
        let v: ParamValue = serde_json::from_str("42").unwrap();
        assert_eq!(v, ParamValue::Int(42));
        let v: ParamValue = serde_json::from_str("\"fast\"").unwrap();
        assert_eq!(v, ParamValue::Text("fast".into()));
    }
}
