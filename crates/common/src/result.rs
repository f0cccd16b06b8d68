//! Saga status and result record.

use serde::{Deserialize, Serialize};

/// Step labels recorded in [`SagaResult::steps`].
pub mod step {
    pub const SAGA_STARTED: &str = "SAGA_STARTED";
    pub const INVENTORY_RESERVED: &str = "INVENTORY_RESERVED";
    pub const INVENTORY_FAILED: &str = "INVENTORY_FAILED";
    pub const PAYMENT_CHARGED: &str = "PAYMENT_CHARGED";
    pub const PAYMENT_FAILED: &str = "PAYMENT_FAILED";
    pub const SHIPPING_CREATED: &str = "SHIPPING_CREATED";
    pub const SHIPPING_FAILED: &str = "SHIPPING_FAILED";
    pub const SAGA_COMPLETED: &str = "SAGA_COMPLETED";
    pub const SAGA_FAILED_COMPENSATED: &str = "SAGA_FAILED_COMPENSATED";
}

/// Compensation labels recorded in [`SagaResult::compensations`].
pub mod compensation {
    pub const INVENTORY_RELEASE_REQUESTED: &str = "INVENTORY_RELEASE_REQUESTED";
    pub const INVENTORY_RELEASED: &str = "INVENTORY_RELEASED";
    pub const PAYMENT_REFUND_REQUESTED: &str = "PAYMENT_REFUND_REQUESTED";
    pub const PAYMENT_REFUNDED: &str = "PAYMENT_REFUNDED";
}

/// The status of a saga in its lifecycle.
///
/// State transitions:
/// ```text
/// Started ──► InProgress ──┬──► Completed
///    │                     └──► Failed ──► FailedCompensated
///    └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    /// Saga created, first request issued.
    #[default]
    Started,

    /// Inventory reserved, later steps pending.
    InProgress,

    /// Every forward step succeeded (terminal state).
    Completed,

    /// A step failed. Terminal unless compensation completes.
    Failed,

    /// A step failed and every required compensation was confirmed (terminal state).
    FailedCompensated,
}

impl SagaStatus {
    /// Returns true if no further transition can occur from this status.
    ///
    /// `Failed` is not included: it may still be upgraded once compensation
    /// is confirmed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::FailedCompensated)
    }

    /// Returns true if forward steps are still being executed.
    pub fn is_active(&self) -> bool {
        matches!(self, SagaStatus::Started | SagaStatus::InProgress)
    }

    /// Returns true if the saga failed, compensated or not.
    pub fn is_failure(&self) -> bool {
        matches!(self, SagaStatus::Failed | SagaStatus::FailedCompensated)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "STARTED",
            SagaStatus::InProgress => "IN_PROGRESS",
            SagaStatus::Completed => "COMPLETED",
            SagaStatus::Failed => "FAILED",
            SagaStatus::FailedCompensated => "FAILED_COMPENSATED",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome record of one saga, keyed by `saga_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaResult {
    pub saga_id: String,
    pub status: SagaStatus,
    pub steps: Vec<String>,
    pub compensations: Vec<String>,
    pub errors: Vec<String>,
}

impl SagaResult {
    /// Creates an empty result in the `Started` status.
    pub fn new(saga_id: impl Into<String>) -> Self {
        Self {
            saga_id: saga_id.into(),
            status: SagaStatus::Started,
            steps: Vec::new(),
            compensations: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Returns true if `label` was recorded as a step.
    pub fn has_step(&self, label: &str) -> bool {
        self.steps.iter().any(|s| s == label)
    }

    /// Returns true if `label` was recorded as a compensation.
    pub fn has_compensation(&self, label: &str) -> bool {
        self.compensations.iter().any(|c| c == label)
    }
}
