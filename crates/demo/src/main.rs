//! Saga demo entry point.

use std::sync::mpsc;
use std::time::Duration;

use common::SagaMetrics;
use demo::config::Config;
use demo::error::DemoError;
use tokio::signal;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), DemoError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Build the Prometheus recorder handed to every saga runtime
    let recorder = demo::build_recorder()?;
    let metrics_handle = recorder.handle();
    let metrics = SagaMetrics::new(recorder);

    let upkeep_handle = metrics_handle.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPKEEP_INTERVAL);
        loop {
            interval.tick().await;
            upkeep_handle.run_upkeep();
        }
    });

    // 3. Serve /metrics and /healthz
    let addr = config.metrics_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "metrics endpoint listening");

    let (server_stop_tx, server_stop_rx) = oneshot::channel::<()>();
    let app = demo::create_app(metrics_handle);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_stop_rx.await;
            })
            .await
    });

    // 4. Run the scenarios on a blocking thread: the bus and the RabbitMQ
    //    transport are synchronous.
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let runner_config = config.clone();
    let mut runner = tokio::task::spawn_blocking(move || {
        let transport = demo::build_transport(&runner_config);
        demo::scenarios::run_loop(&runner_config, transport, &metrics, &stop_rx)
    });

    tokio::select! {
        joined = &mut runner => joined??,
        () = shutdown_signal() => {
            let _ = stop_tx.send(());
            runner.await??;
        }
    }

    let _ = server_stop_tx.send(());
    server.await??;

    tracing::info!("saga demo shut down");
    Ok(())
}
