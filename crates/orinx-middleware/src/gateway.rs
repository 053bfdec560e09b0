//! The robot's remote operations.
//!
//! [`CommandGateway`] shapes each request, makes exactly one attempt through
//! its [`ServiceCaller`], and classifies the outcome.  It keeps no state of
//! its own; concurrent calls are allowed and callers sequence logically
//! dependent ones.
//!
//! | Operation | Service | Arguments |
//! |---|---|---|
//! | [`change_mode`][CommandGateway::change_mode] | `/set_mode` | `{mode: int}` |
//! | [`change_status`][CommandGateway::change_status] | `/set_status` | `{status: int}` |
//! | [`update_parameters`][CommandGateway::update_parameters] | `/update_params` | `{sensor_name, param_names, new_values}` |
//! | [`reboot`][CommandGateway::reboot] | `/reboot` | `{}` |
//! | [`fetch_config`][CommandGateway::fetch_config] | `/get_config` | `{}` |

use std::sync::Arc;

use orinx_types::{OperationMode, ParamValue, RemoteFault, RobotStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::adapter::ServiceCaller;

/// Service names on the bridge.  Every field falls back to its default when
/// absent from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNames {
    #[serde(default = "default_get_config")]
    pub get_config: String,
    #[serde(default = "default_set_mode")]
    pub set_mode: String,
    #[serde(default = "default_set_status")]
    pub set_status: String,
    #[serde(default = "default_update_params")]
    pub update_params: String,
    #[serde(default = "default_reboot")]
    pub reboot: String,
}

fn default_get_config() -> String {
    "/get_config".to_string()
}
fn default_set_mode() -> String {
    "/set_mode".to_string()
}
fn default_set_status() -> String {
    "/set_status".to_string()
}
fn default_update_params() -> String {
    "/update_params".to_string()
}
fn default_reboot() -> String {
    "/reboot".to_string()
}

impl Default for ServiceNames {
    fn default() -> Self {
        Self {
            get_config: default_get_config(),
            set_mode: default_set_mode(),
            set_status: default_set_status(),
            update_params: default_update_params(),
            reboot: default_reboot(),
        }
    }
}

/// Parameter names and their new values for one sensor.
///
/// Names and values can only be added in pairs, so the two lists always have
/// equal length and matching order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBatch {
    sensor_id: String,
    names: Vec<String>,
    values: Vec<String>,
}

impl ParameterBatch {
    pub fn new(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            names: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append `name = value`.  The value is stringified for the wire.
    pub fn push(&mut self, name: impl Into<String>, value: &ParamValue) {
        self.names.push(name.into());
        self.values.push(value.to_string());
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Stateless front for the robot's remote operations.
#[derive(Clone)]
pub struct CommandGateway {
    caller: Arc<dyn ServiceCaller>,
    services: ServiceNames,
}

impl CommandGateway {
    pub fn new(caller: Arc<dyn ServiceCaller>, services: ServiceNames) -> Self {
        Self { caller, services }
    }

    pub fn services(&self) -> &ServiceNames {
        &self.services
    }

    pub async fn change_mode(&self, mode: OperationMode) -> Result<(), RemoteFault> {
        self.call(&self.services.set_mode, json!({ "mode": mode.code() }))
            .await
            .map(drop)
    }

    pub async fn change_status(&self, status: RobotStatus) -> Result<(), RemoteFault> {
        self.call(&self.services.set_status, json!({ "status": status.code() }))
            .await
            .map(drop)
    }

    /// Send one sensor's new parameter values.
    pub async fn update_parameters(&self, batch: &ParameterBatch) -> Result<(), RemoteFault> {
        let args = json!({
            "sensor_name": batch.sensor_id(),
            "param_names": batch.names(),
            "new_values": batch.values(),
        });
        self.call(&self.services.update_params, args).await.map(drop)
    }

    pub async fn reboot(&self) -> Result<(), RemoteFault> {
        self.call(&self.services.reboot, json!({})).await.map(drop)
    }

    /// Fetch the sensor configuration snapshot as JSON text.
    ///
    /// The bridge returns the snapshot as a JSON-encoded string in
    /// `values.config`; an inline object is accepted too.
    ///
    /// # Errors
    ///
    /// Any [`RemoteFault`] from the call, or [`RemoteFault::Remote`] when the
    /// response carries no `config`.
    pub async fn fetch_config(&self) -> Result<String, RemoteFault> {
        let service = &self.services.get_config;
        let values = self.call(service, json!({})).await?;
        match values.get("config") {
            Some(Value::String(text)) => Ok(text.clone()),
            Some(obj @ Value::Object(_)) => Ok(obj.to_string()),
            _ => Err(RemoteFault::Remote {
                service: service.clone(),
                message: "response carries no config".to_string(),
            }),
        }
    }

    async fn call(&self, service: &str, args: Value) -> Result<Value, RemoteFault> {
        let outcome = self
            .caller
            .call_service(service, args)
            .await
            .and_then(|values| check_success(service, values));
        match &outcome {
            Ok(_) => info!(service, "service call acknowledged"),
            Err(e) => warn!(service, error = %e, "service call failed"),
        }
        outcome
    }
}

/// Services that report their own outcome do it with `success` and
/// `message` fields in the response body.
fn check_success(service: &str, values: Value) -> Result<Value, RemoteFault> {
    if values.get("success").and_then(Value::as_bool) == Some(false) {
        let message = values
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("request was rejected")
            .to_string();
        return Err(RemoteFault::Remote {
            service: service.to_string(),
            message,
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Records every call and answers from a script (default: `{}`).
    #[derive(Default)]
    struct ScriptedCaller {
        calls: Mutex<Vec<(String, Value)>>,
        replies: Mutex<VecDeque<Result<Value, RemoteFault>>>,
    }

    impl ScriptedCaller {
        fn replying(replies: Vec<Result<Value, RemoteFault>>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl ServiceCaller for ScriptedCaller {
        async fn call_service(&self, service: &str, args: Value) -> Result<Value, RemoteFault> {
            self.calls.lock().push((service.to_string(), args));
            self.replies.lock().pop_front().unwrap_or_else(|| Ok(json!({})))
        }
    }

    fn gateway(caller: &Arc<ScriptedCaller>) -> CommandGateway {
        CommandGateway::new(caller.clone(), ServiceNames::default())
    }

    #[tokio::test]
    async fn mode_and_status_send_integer_codes() {
        let caller = ScriptedCaller::replying(vec![]);
        let gw = gateway(&caller);
        gw.change_mode(OperationMode::Debugging).await.unwrap();
        gw.change_status(RobotStatus::Paused).await.unwrap();

        let calls = caller.calls.lock();
        assert_eq!(calls[0], ("/set_mode".to_string(), json!({ "mode": 2 })));
        assert_eq!(calls[1], ("/set_status".to_string(), json!({ "status": 2 })));
    }

    #[tokio::test]
    async fn update_parameters_sends_parallel_string_lists() {
        let caller = ScriptedCaller::replying(vec![]);
        let mut batch = ParameterBatch::new("imu");
        batch.push("rate", &ParamValue::Int(200));
        batch.push("enabled", &ParamValue::Bool(false));
        batch.push("profile", &ParamValue::Text("high".into()));
        gateway(&caller).update_parameters(&batch).await.unwrap();

        let calls = caller.calls.lock();
        assert_eq!(calls[0].0, "/update_params");
        assert_eq!(
            calls[0].1,
            json!({
                "sensor_name": "imu",
                "param_names": ["rate", "enabled", "profile"],
                "new_values": ["200", "false", "high"],
            })
        );
    }

    #[tokio::test]
    async fn success_false_is_a_remote_fault() {
        let caller = ScriptedCaller::replying(vec![Ok(json!({
            "success": false,
            "message": "sensor busy",
        }))]);
        let err = gateway(&caller).reboot().await.unwrap_err();
        assert_eq!(
            err,
            RemoteFault::Remote {
                service: "/reboot".into(),
                message: "sensor busy".into(),
            }
        );
    }

    #[tokio::test]
    async fn transport_faults_pass_through_untouched() {
        let fault = RemoteFault::Transport("socket closed".into());
        let caller = ScriptedCaller::replying(vec![Err(fault.clone())]);
        assert_eq!(gateway(&caller).change_mode(OperationMode::Manual).await, Err(fault));
        assert_eq!(caller.calls.lock().len(), 1, "no retry");
    }

    #[tokio::test]
    async fn fetch_config_returns_the_embedded_json_text() {
        let caller = ScriptedCaller::replying(vec![
            Ok(json!({ "config": "{\"imu\":{}}" })),
            Ok(json!({ "config": { "imu": {} } })),
            Ok(json!({})),
        ]);
        let gw = gateway(&caller);
        assert_eq!(gw.fetch_config().await.unwrap(), "{\"imu\":{}}");
        assert_eq!(gw.fetch_config().await.unwrap(), "{\"imu\":{}}");
        assert!(matches!(gw.fetch_config().await, Err(RemoteFault::Remote { .. })));
        assert_eq!(caller.calls.lock()[0], ("/get_config".to_string(), json!({})));
    }

    #[tokio::test]
    async fn custom_service_names_are_used() {
        let caller = ScriptedCaller::replying(vec![]);
        let services = ServiceNames {
            reboot: "/robot/reboot".into(),
            ..ServiceNames::default()
        };
        CommandGateway::new(caller.clone(), services).reboot().await.unwrap();
        assert_eq!(caller.calls.lock()[0].0, "/robot/reboot");
    }

    #[test]
    fn empty_batch_reports_empty() {
        let batch = ParameterBatch::new("imu");
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
