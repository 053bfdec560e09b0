//! [`SensorConfigStore`] – sensors, the selected sensor, and its pending
//! edits.
//!
//! The store holds two views of the selected sensor's parameters:
//!
//! | View | Changes when |
//! |---|---|
//! | committed values (inside each [`Sensor`]) | a snapshot is ingested, or the bridge acknowledges an update |
//! | pending buffer | the operator edits a value, or selects a sensor |
//!
//! Every key in the pending buffer names a parameter of the selected sensor.
//! A generation counter increments on every ingest so a completion handler
//! can tell whether the sensor set was replaced while its call was in
//! flight.

use std::collections::HashMap;

use orinx_middleware::ParameterBatch;
use orinx_types::{ConfigError, ParamScope, ParamValue, PreconditionFailure, Sensor, SessionError};
use tracing::{debug, warn};

use crate::snapshot::parse_snapshot;

/// A batch of values ready to send, remembering where it came from so the
/// acknowledged values can be committed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub generation: u64,
    pub sensor_id: String,
    pub scope: ParamScope,
    pub entries: Vec<(String, ParamValue)>,
}

impl PendingUpdate {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The wire form of this update.
    pub fn to_batch(&self) -> ParameterBatch {
        let mut batch = ParameterBatch::new(&self.sensor_id);
        for (name, value) in &self.entries {
            batch.push(name, value);
        }
        batch
    }
}

#[derive(Debug, Default)]
pub struct SensorConfigStore {
    sensors: Vec<Sensor>,
    selected: Option<String>,
    pending: HashMap<String, ParamValue>,
    generation: u64,
}

impl SensorConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every sensor with `sensors` and select the first one.
    ///
    /// Returns the new generation.
    pub fn ingest(&mut self, sensors: Vec<Sensor>) -> u64 {
        self.generation += 1;
        self.sensors = sensors;
        self.selected = None;
        self.pending.clear();
        if let Some(first) = self.sensors.first().map(|s| s.id.clone()) {
            self.reseed(first);
        }
        debug!(
            generation = self.generation,
            sensors = self.sensors.len(),
            selected = ?self.selected,
            "configuration ingested"
        );
        self.generation
    }

    /// Parse `json` and [`ingest`][Self::ingest] it.  An invalid snapshot
    /// leaves the store untouched.
    pub fn ingest_snapshot(&mut self, json: &str) -> Result<u64, ConfigError> {
        let sensors = parse_snapshot(json)?;
        Ok(self.ingest(sensors))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn sensor(&self, id: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.id == id)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&Sensor> {
        self.selected.as_deref().and_then(|id| self.sensor(id))
    }

    /// Select `id` and reset the pending buffer to its committed values.
    ///
    /// # Errors
    ///
    /// [`PreconditionFailure::UnknownSensorId`]; selection and buffer are
    /// left as they were.
    pub fn select(&mut self, id: &str) -> Result<(), PreconditionFailure> {
        if self.sensor(id).is_none() {
            return Err(PreconditionFailure::UnknownSensorId(id.to_string()));
        }
        self.reseed(id.to_string());
        Ok(())
    }

    /// Pending value of `name`, if the selected sensor has that parameter.
    pub fn pending_value(&self, name: &str) -> Option<&ParamValue> {
        self.pending.get(name)
    }

    /// Pending values of the selected sensor, in parameter order.
    pub fn pending_values(&self) -> Vec<(String, ParamValue)> {
        let Some(sensor) = self.selected() else {
            return Vec::new();
        };
        sensor
            .params
            .iter()
            .filter_map(|(name, _)| Some((name.to_string(), self.pending.get(name)?.clone())))
            .collect()
    }

    /// `true` if any pending value in `scope` differs from its committed one.
    pub fn has_changes(&self, scope: ParamScope) -> bool {
        self.selected().is_some_and(|sensor| {
            sensor
                .params
                .in_scope(scope)
                .any(|(name, p)| self.pending.get(name).is_some_and(|v| v != p.value()))
        })
    }

    /// Stage `value` for parameter `name` of the selected sensor.
    ///
    /// # Errors
    ///
    /// - [`PreconditionFailure::NoSensorSelected`]
    /// - [`ConfigError::UnknownParameter`] – the selected sensor has no such
    ///   parameter.
    /// - any validation error for `value`.
    ///
    /// The buffer is unchanged on error.
    pub fn edit(&mut self, name: &str, value: ParamValue) -> Result<(), SessionError> {
        let sensor = self.selected().ok_or(PreconditionFailure::NoSensorSelected)?;
        let param = sensor
            .params
            .get(name)
            .ok_or_else(|| ConfigError::UnknownParameter {
                param: name.to_string(),
            })?;
        param.kind().check(name, &value)?;
        self.pending.insert(name.to_string(), value);
        Ok(())
    }

    /// Like [`edit`][Self::edit], parsing `input` according to the
    /// parameter's kind.
    pub fn edit_text(&mut self, name: &str, input: &str) -> Result<ParamValue, SessionError> {
        let sensor = self.selected().ok_or(PreconditionFailure::NoSensorSelected)?;
        let param = sensor
            .params
            .get(name)
            .ok_or_else(|| ConfigError::UnknownParameter {
                param: name.to_string(),
            })?;
        let value = param.kind().parse(name, input)?;
        self.pending.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Collect the selected sensor's `scope` parameters, in parameter order,
    /// with their pending values.
    ///
    /// # Errors
    ///
    /// [`PreconditionFailure::NoSensorSelected`].
    pub fn pending_update(&self, scope: ParamScope) -> Result<PendingUpdate, PreconditionFailure> {
        let sensor = self.selected().ok_or(PreconditionFailure::NoSensorSelected)?;
        let entries = sensor
            .params
            .in_scope(scope)
            .map(|(name, p)| {
                let value = self.pending.get(name).unwrap_or(p.value()).clone();
                (name.to_string(), value)
            })
            .collect();
        Ok(PendingUpdate {
            generation: self.generation,
            sensor_id: sensor.id.clone(),
            scope,
            entries,
        })
    }

    /// Write acknowledged values into their sensor.
    ///
    /// Returns `false` without touching anything if the sensor set was
    /// replaced since `update` was built, or the sensor is gone.
    pub fn commit(&mut self, update: &PendingUpdate) -> bool {
        if update.generation != self.generation {
            debug!(
                sensor = %update.sensor_id,
                built_for = update.generation,
                current = self.generation,
                "stale update not committed"
            );
            return false;
        }
        let Some(sensor) = self.sensors.iter_mut().find(|s| s.id == update.sensor_id) else {
            return false;
        };
        for (name, value) in &update.entries {
            if let Err(e) = sensor.params.set_value(name, value.clone()) {
                warn!(sensor = %update.sensor_id, error = %e, "acknowledged value rejected locally");
            }
        }
        true
    }

    fn reseed(&mut self, id: String) {
        self.pending = self
            .sensor(&id)
            .map(|s| s.current_values().into_iter().collect::<HashMap<_, _>>())
            .unwrap_or_default();
        self.selected = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "imu": {
            "type": "accelerometer",
            "params": {
                "a": { "type": "int", "value": 1, "range": [0, 10] },
                "b": { "type": "int", "value": 2, "requires_reboot": true }
            }
        },
        "cam": {
            "type": "camera",
            "params": {
                "res": { "type": "string", "value": "hd", "options": ["hd", "4k"] },
                "on": { "type": "boolean", "value": true }
            }
        }
    }"#;

    fn loaded() -> SensorConfigStore {
        let mut store = SensorConfigStore::new();
        store.ingest_snapshot(SNAPSHOT).unwrap();
        store
    }

    #[test]
    fn ingest_selects_the_first_sensor_and_seeds_the_buffer() {
        let store = loaded();
        assert_eq!(store.selected_id(), Some("imu"));
        assert_eq!(store.pending_value("a"), Some(&ParamValue::Int(1)));
        assert_eq!(store.pending_value("b"), Some(&ParamValue::Int(2)));
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn empty_snapshot_selects_nothing() {
        let mut store = loaded();
        store.ingest_snapshot("{}").unwrap();
        assert!(store.selected().is_none());
        assert!(store.pending_values().is_empty());
        assert_eq!(
            store.pending_update(ParamScope::Live),
            Err(PreconditionFailure::NoSensorSelected)
        );
        assert!(matches!(
            store.edit("a", ParamValue::Int(3)),
            Err(SessionError::Precondition(PreconditionFailure::NoSensorSelected))
        ));
    }

    #[test]
    fn invalid_snapshot_leaves_the_store_untouched() {
        let mut store = loaded();
        store.edit("a", ParamValue::Int(9)).unwrap();
        assert!(store.ingest_snapshot(r#"{ "x": { "params": { "p": { "type": "int", "value": true } } } }"#).is_err());
        assert_eq!(store.generation(), 1);
        assert_eq!(store.pending_value("a"), Some(&ParamValue::Int(9)));
    }

    #[test]
    fn select_reseeds_from_committed_values() {
        let mut store = loaded();
        store.edit("a", ParamValue::Int(7)).unwrap();
        store.select("cam").unwrap();
        assert_eq!(
            store.pending_values(),
            vec![
                ("res".to_string(), ParamValue::Text("hd".into())),
                ("on".to_string(), ParamValue::Bool(true)),
            ]
        );
        store.select("imu").unwrap();
        assert_eq!(store.pending_value("a"), Some(&ParamValue::Int(1)));
    }

    #[test]
    fn unknown_sensor_keeps_selection_and_buffer() {
        let mut store = loaded();
        store.edit("a", ParamValue::Int(5)).unwrap();
        assert_eq!(
            store.select("lidar"),
            Err(PreconditionFailure::UnknownSensorId("lidar".into()))
        );
        assert_eq!(store.selected_id(), Some("imu"));
        assert_eq!(store.pending_value("a"), Some(&ParamValue::Int(5)));
    }

    #[test]
    fn edits_are_validated_against_the_parameter() {
        let mut store = loaded();
        assert!(matches!(
            store.edit("a", ParamValue::Int(11)),
            Err(SessionError::Config(ConfigError::OutOfRange { .. }))
        ));
        assert!(matches!(
            store.edit("a", ParamValue::Bool(true)),
            Err(SessionError::Config(ConfigError::KindMismatch { .. }))
        ));
        assert!(matches!(
            store.edit("zzz", ParamValue::Int(1)),
            Err(SessionError::Config(ConfigError::UnknownParameter { .. }))
        ));
        assert_eq!(store.pending_value("a"), Some(&ParamValue::Int(1)));
        assert!(!store.has_changes(ParamScope::Live));

        assert_eq!(store.edit_text("a", "4"), Ok(ParamValue::Int(4)));
        assert!(store.has_changes(ParamScope::Live));
        assert!(!store.has_changes(ParamScope::Boot));
    }

    #[test]
    fn pending_update_covers_one_scope_in_param_order() {
        let mut store = loaded();
        store.edit("a", ParamValue::Int(3)).unwrap();
        store.edit("b", ParamValue::Int(4)).unwrap();

        let live = store.pending_update(ParamScope::Live).unwrap();
        assert_eq!(live.sensor_id, "imu");
        assert_eq!(live.entries, vec![("a".to_string(), ParamValue::Int(3))]);

        let boot = store.pending_update(ParamScope::Boot).unwrap();
        assert_eq!(boot.entries, vec![("b".to_string(), ParamValue::Int(4))]);
        let batch = boot.to_batch();
        assert_eq!(batch.names(), ["b".to_string()]);
        assert_eq!(batch.values(), ["4".to_string()]);
    }

    #[test]
    fn commit_writes_only_the_acknowledged_entries() {
        let mut store = loaded();
        store.edit("a", ParamValue::Int(3)).unwrap();
        store.edit("b", ParamValue::Int(4)).unwrap();
        let live = store.pending_update(ParamScope::Live).unwrap();

        assert!(store.commit(&live));
        let imu = store.sensor("imu").unwrap();
        assert_eq!(imu.params.get("a").unwrap().value(), &ParamValue::Int(3));
        assert_eq!(imu.params.get("b").unwrap().value(), &ParamValue::Int(2));
    }

    #[test]
    fn stale_commit_is_dropped() {
        let mut store = loaded();
        store.edit("a", ParamValue::Int(3)).unwrap();
        let live = store.pending_update(ParamScope::Live).unwrap();

        store.ingest_snapshot(SNAPSHOT).unwrap();
        assert!(!store.commit(&live));
        let imu = store.sensor("imu").unwrap();
        assert_eq!(imu.params.get("a").unwrap().value(), &ParamValue::Int(1));
    }
}
