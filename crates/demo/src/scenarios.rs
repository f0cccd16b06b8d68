//! The four canonical order saga scenarios.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};

use common::{SagaMetrics, SagaResult};
use event_bus::Transport;
use saga::{FailFor, SagaError, SagaRequest, SagaRuntime};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;

pub const QUANTITY: u32 = 2;
pub const AMOUNT: f64 = 199.90;
pub const ADDRESS: &str = "123 Flower Street, Sao Paulo";

/// Participant whose request is made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailingStep {
    Inventory,
    Payment,
    Shipping,
}

/// One demonstration run.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub title: &'static str,
    pub order_id: &'static str,
    pub saga_prefix: &'static str,
    pub failing: Option<FailingStep>,
}

pub const SCENARIOS: [Scenario; 4] = [
    Scenario {
        title: "SCENARIO 1: SUCCESS",
        order_id: "ORDER-OK",
        saga_prefix: "SAGA-OK",
        failing: None,
    },
    Scenario {
        title: "SCENARIO 2: PAYMENT FAILURE (inventory compensation)",
        order_id: "ORDER-PAY-FAIL",
        saga_prefix: "SAGA-PAY-FAIL",
        failing: Some(FailingStep::Payment),
    },
    Scenario {
        title: "SCENARIO 3: SHIPPING FAILURE (refund + release)",
        order_id: "ORDER-SHIP-FAIL",
        saga_prefix: "SAGA-SHIP-FAIL",
        failing: Some(FailingStep::Shipping),
    },
    Scenario {
        title: "SCENARIO 4: INVENTORY FAILURE (no compensation)",
        order_id: "ORDER-INV-FAIL",
        saga_prefix: "SAGA-INV-FAIL",
        failing: Some(FailingStep::Inventory),
    },
];

impl Scenario {
    /// Runs the scenario on a fresh runtime sharing `transport` and `metrics`.
    ///
    /// A transport failure is logged; the saga result is still reported.
    #[tracing::instrument(skip_all, fields(scenario = self.title))]
    pub fn run(&self, transport: Arc<dyn Transport>, metrics: SagaMetrics) -> Result<ScenarioReport> {
        let failing = FailFor::order(self.order_id);
        let builder = SagaRuntime::builder().transport(transport).metrics(metrics);
        let runtime = match self.failing {
            None => builder,
            Some(FailingStep::Inventory) => builder.inventory_failure(failing),
            Some(FailingStep::Payment) => builder.payment_failure(failing),
            Some(FailingStep::Shipping) => builder.shipping_failure(failing),
        }
        .build();

        let saga_id = format!("{}-{}", self.saga_prefix, Uuid::new_v4());
        let request = SagaRequest::new(self.order_id, QUANTITY, AMOUNT, ADDRESS);
        let result = match runtime.start(&saga_id, request) {
            Ok(result) => result,
            Err(SagaError::Bus(err)) => {
                tracing::warn!(%saga_id, error = %err, "event mirroring failed");
                runtime
                    .orchestrator()
                    .result(&saga_id)
                    .ok_or(SagaError::Bus(err))?
            }
            Err(err) => return Err(err.into()),
        };

        Ok(ScenarioReport {
            title: self.title,
            result,
            total_events: runtime.bus().event_count(),
        })
    }
}

/// Outcome of one scenario, printed by the demo.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub title: &'static str,
    pub result: SagaResult,
    pub total_events: usize,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "=".repeat(80))?;
        writeln!(f, "Saga result:")?;
        writeln!(f, "- saga_id: {}", self.result.saga_id)?;
        writeln!(f, "- status: {}", self.result.status)?;
        writeln!(f, "- steps: {:?}", self.result.steps)?;
        writeln!(f, "- compensations: {:?}", self.result.compensations)?;
        writeln!(f, "- errors: {:?}", self.result.errors)?;
        write!(f, "- total_events: {}", self.total_events)
    }
}

/// Runs every canonical scenario once, in order.
pub fn run_all(transport: &Arc<dyn Transport>, metrics: &SagaMetrics) -> Result<Vec<ScenarioReport>> {
    SCENARIOS
        .iter()
        .map(|scenario| scenario.run(Arc::clone(transport), metrics.clone()))
        .collect()
}

/// Runs the scenarios, repeating them while `config.run_continuous` is set
/// until `stop` fires or its sender is dropped. Closes the transport on exit.
///
/// Blocking: call from a dedicated thread.
pub fn run_loop(
    config: &Config,
    transport: Arc<dyn Transport>,
    metrics: &SagaMetrics,
    stop: &Receiver<()>,
) -> Result<()> {
    let mut round: u64 = 0;
    loop {
        round += 1;
        tracing::info!(round, "running saga scenarios");
        for report in run_all(&transport, metrics)? {
            println!("{report}");
        }

        if !config.run_continuous {
            break;
        }
        match stop.recv_timeout(config.run_interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    transport.close()?;
    Ok(())
}
