//! Demonstration runner for the order saga.
//!
//! Runs the canonical saga scenarios, optionally mirroring every event to a
//! RabbitMQ broker, and serves Prometheus metrics and a health check over
//! HTTP.

pub mod config;
pub mod error;
pub mod routes;
pub mod scenarios;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use common::metrics::DURATION_BUCKETS;
use event_bus::{NoopTransport, RabbitMqTransport, Transport};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tower_http::trace::TraceLayer;

use config::Config;
use error::DemoError;

/// Creates the Axum router serving `/metrics` and `/healthz`.
pub fn create_app(metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/healthz", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle)
        .layer(TraceLayer::new_for_http())
}

/// Builds a Prometheus recorder with the saga duration buckets configured.
///
/// The recorder is not installed globally; wrap it in
/// [`common::SagaMetrics::new`] and keep its handle for rendering.
pub fn build_recorder() -> Result<PrometheusRecorder, DemoError> {
    Ok(PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("saga_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )?
        .build_recorder())
}

/// Selects the transport described by `config`.
///
/// Without a broker URL, or when the broker cannot be configured, events
/// stay in-process. Blocking: connecting declares the exchange over HTTP.
pub fn build_transport(config: &Config) -> Arc<dyn Transport> {
    let Some(rabbitmq) = config.rabbitmq() else {
        tracing::info!("RABBITMQ_HTTP_URL not set, using in-memory transport only");
        return Arc::new(NoopTransport);
    };

    match RabbitMqTransport::connect(rabbitmq) {
        Ok(transport) => {
            tracing::info!(
                exchange = transport.exchange(),
                "RabbitMQ transport enabled via management HTTP API"
            );
            Arc::new(transport)
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                "failed to configure RabbitMQ transport, using in-memory transport only"
            );
            Arc::new(NoopTransport)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_transport_without_broker() {
        let transport = build_transport(&Config::default());
        transport.close().unwrap();
    }

    #[test]
    fn test_unreachable_broker_falls_back() {
        let config = Config {
            rabbitmq_url: Some("not a url".to_string()),
            ..Config::default()
        };
        let transport = build_transport(&config);
        transport
            .publish(&common::Event::new("inventory.reserved", "SAGA-1"))
            .unwrap();
    }

    #[test]
    fn test_recorder_uses_duration_buckets() {
        let recorder = build_recorder().unwrap();
        let handle = recorder.handle();
        let metrics = common::SagaMetrics::new(recorder);
        metrics.saga_finished(
            common::SagaStatus::Completed,
            std::time::Duration::from_millis(300),
        );

        let output = handle.render();
        assert!(output.contains("saga_duration_seconds_bucket{le=\"0.5\"} 1"));
        assert!(output.contains("saga_duration_seconds_bucket{le=\"0.1\"} 0"));
    }
}
