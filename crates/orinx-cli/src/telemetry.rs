//! Tracing initialisation for the console.
//!
//! | Source | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `ORINX_LOG_FORMAT=json`, or `log_format = "json"` in the config | Newline-delimited JSON logs. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT`, or `otlp_endpoint` in the config | Export spans over OTLP/HTTP. |
//!
//! Environment variables win over the config file.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Install the global subscriber.  Hold the returned guard until exit.
pub fn init_tracing(service_name: &str, cfg: &Config) -> TracerProviderGuard {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let format = std::env::var("ORINX_LOG_FORMAT").ok().or_else(|| cfg.log_format.clone());
    let use_json = format.as_deref() == Some("json");

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .or_else(|| cfg.otlp_endpoint.clone());
    let provider = endpoint.and_then(|e| build_provider(service_name, e));

    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("orinx")));
    let registry = tracing_subscriber::registry().with(env_filter).with(otel_layer);
    if use_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    TracerProviderGuard(provider)
}

/// Shuts the OTel provider down on drop, flushing pending spans.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[orinx] OpenTelemetry provider shutdown error: {e}");
        }
    }
}

fn build_provider(service_name: &str, endpoint: String) -> Option<SdkTracerProvider> {
    if endpoint.trim().is_empty() {
        return None;
    }
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[orinx] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder().with_service_name(service_name.to_string()).build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // Tracing is installed before the Tokio runtime exists, so the
            // batch exporter (which spawns tasks) cannot be used.
            .with_simple_exporter(exporter)
            .build(),
    )
}
