//! Logging and trace export for Axon
//!
//! Installs a `tracing-subscriber` stack with a human-readable or JSON
//! formatter, and exports spans over OTLP when an exporter is configured.

use axon_config::telemetry::exporters::{ExportProtocol, ExporterConfig};
use axon_config::{LogFormat, TelemetryConfig};
use opentelemetry::{KeyValue, global};
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_semantic_conventions::resource as semconv;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// Guard that flushes and shuts down the tracer provider on drop
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("failed to shutdown tracer provider: {e}");
        }
    }
}

/// Initialize logging and optional trace export
///
/// `log_filter` is used when `RUST_LOG` is unset. The returned guard must be
/// held for the lifetime of the application.
///
/// # Errors
///
/// Returns an error if the OTLP span exporter cannot be built
pub fn init(config: Option<&TelemetryConfig>, log_filter: &str) -> anyhow::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.map_or(LogFormat::Pretty, |c| c.log_format);
    let mut guard = TelemetryGuard { tracer_provider: None };

    let otel_layer = match config {
        Some(telemetry_config) => match telemetry_config.exporter.as_ref() {
            Some(exporter) => {
                let provider = init_tracer(telemetry_config, exporter)?;
                let tracer = provider.tracer("axon");
                global::set_tracer_provider(provider.clone());
                guard.tracer_provider = Some(provider);
                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            }
            None => None,
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(format))
        .with(otel_layer)
        .init();

    Ok(guard)
}

/// Build the log formatting layer for the chosen format
fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Pretty => layer.boxed(),
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
    }
}

/// Build a tracer provider exporting spans over OTLP
fn init_tracer(config: &TelemetryConfig, exporter: &ExporterConfig) -> anyhow::Result<SdkTracerProvider> {
    let span_exporter = build_span_exporter(exporter)?;

    let sampling_rate = config.tracing.as_ref().map_or(1.0, |t| t.sampling_rate);
    let sampler = if sampling_rate >= 1.0 {
        Sampler::AlwaysOn
    } else if sampling_rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(sampling_rate)
    };

    let sampler = if config.tracing.as_ref().is_none_or(|t| t.parent_based) {
        Sampler::ParentBased(Box::new(sampler))
    } else {
        sampler
    };

    Ok(SdkTracerProvider::builder()
        .with_resource(resource(config))
        .with_sampler(sampler)
        .with_batch_exporter(span_exporter)
        .build())
}

/// Service identity attached to every exported span
///
/// Configured resource attributes cannot override the service name or
/// version.
fn resource(config: &TelemetryConfig) -> Resource {
    let extra = config
        .resource_attributes
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), semconv::SERVICE_NAME | semconv::SERVICE_VERSION))
        .map(|(key, value)| KeyValue::new(key.clone(), value.clone()));

    Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attribute(KeyValue::new(semconv::SERVICE_VERSION, env!("CARGO_PKG_VERSION")))
        .with_attributes(extra)
        .build()
}

/// Build OTLP span exporter based on protocol
fn build_span_exporter(config: &ExporterConfig) -> anyhow::Result<opentelemetry_otlp::SpanExporter> {
    use opentelemetry_otlp::{SpanExporter, WithExportConfig, WithHttpConfig};

    let exporter = match config.protocol {
        ExportProtocol::Grpc => SpanExporter::builder()
            .with_tonic()
            .with_endpoint(config.endpoint.as_str())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build gRPC span exporter: {e}"))?,
        ExportProtocol::HttpProto => SpanExporter::builder()
            .with_http()
            .with_endpoint(config.endpoint.as_str())
            .with_headers(config.headers.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP span exporter: {e}"))?,
    };

    Ok(exporter)
}
