//! Tracing initialization
//!
//! Structured JSON logs through `tracing-subscriber`, plus an optional
//! OpenTelemetry OTLP/HTTP span exporter when an endpoint is configured.

use opentelemetry::{global, trace::TracerProvider as _};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
    Resource,
};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP endpoint for traces (e.g. "http://localhost:4318/v1/traces")
    pub otlp_endpoint: Option<String>,
    /// Service name for traces
    pub service_name: String,
    /// Fallback filter when `RUST_LOG` is unset
    pub default_filter: String,
    /// Trace sampling ratio (0.0 to 1.0)
    pub trace_sample_rate: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: "taskboard-api".to_string(),
            default_filter: "taskboard_api=info,taskboard_loader=info,tower_http=info,info"
                .to_string(),
            trace_sample_rate: 1.0,
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: enables span export
    /// - `TASKBOARD_SERVICE_NAME`: service name (default: taskboard-api)
    /// - `TASKBOARD_TRACE_SAMPLE_RATE`: sampling ratio (default: 1.0)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            service_name: std::env::var("TASKBOARD_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            default_filter: defaults.default_filter,
            trace_sample_rate: std::env::var("TASKBOARD_TRACE_SAMPLE_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.trace_sample_rate),
        }
    }

    fn sampler(&self) -> Sampler {
        if self.trace_sample_rate >= 1.0 {
            Sampler::AlwaysOn
        } else if self.trace_sample_rate <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.trace_sample_rate)
        }
    }
}

/// Flushes and shuts down the tracer provider when dropped.
#[must_use = "dropping the guard shuts telemetry down"]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shut down tracer provider: {}", e);
            }
        }
    }
}

/// Initialize the tracing subscriber and, if configured, the OTLP exporter.
///
/// Call once at startup; keep the returned guard alive until exit.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let fmt_layer = tracing_subscriber::fmt::layer().json();

    let provider = match &config.otlp_endpoint {
        Some(endpoint) => {
            global::set_text_map_propagator(TraceContextPropagator::new());

            let exporter = SpanExporter::builder()
                .with_http()
                .with_endpoint(endpoint)
                .build()
                .map_err(|e| {
                    ApiError::internal_error(format!("Failed to create OTLP exporter: {}", e))
                })?;

            let provider = SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_sampler(config.sampler())
                .with_resource(
                    Resource::builder()
                        .with_service_name(config.service_name.clone())
                        .build(),
                )
                .build();

            let tracer = provider.tracer(config.service_name.clone());
            global::set_tracer_provider(provider.clone());

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .with(OpenTelemetryLayer::new(tracer))
                .try_init()
                .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;
            Some(provider)
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;
            None
        }
    };

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = ?config.otlp_endpoint,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { provider })
}
