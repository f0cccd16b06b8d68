//! Per-saga state tracked by the orchestrator.

use std::time::Instant;

use common::{SagaResult, SagaStatus, compensation, names, step};

/// A compensating action the orchestrator can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompensationKind {
    /// Undo a successful inventory reservation.
    ReleaseInventory,
    /// Undo a successful payment charge.
    RefundPayment,
}

impl CompensationKind {
    /// Label recorded when the request is issued.
    pub fn requested_label(&self) -> &'static str {
        match self {
            CompensationKind::ReleaseInventory => compensation::INVENTORY_RELEASE_REQUESTED,
            CompensationKind::RefundPayment => compensation::PAYMENT_REFUND_REQUESTED,
        }
    }

    /// Label recorded when the participant confirms completion.
    pub fn confirmed_label(&self) -> &'static str {
        match self {
            CompensationKind::ReleaseInventory => compensation::INVENTORY_RELEASED,
            CompensationKind::RefundPayment => compensation::PAYMENT_REFUNDED,
        }
    }

    /// Name of the request event sent to the participant.
    pub fn request_event(&self) -> &'static str {
        match self {
            CompensationKind::ReleaseInventory => names::INVENTORY_RELEASE_REQUESTED,
            CompensationKind::RefundPayment => names::PAYMENT_REFUND_REQUESTED,
        }
    }
}

/// Request/confirmation markers for one compensating action.
///
/// The two markers are independent: a request alone never counts as
/// completed compensation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompensationProgress {
    requested: bool,
    confirmed: bool,
}

impl CompensationProgress {
    /// Marks the action as requested. Returns false if it already was.
    pub fn request(&mut self) -> bool {
        !std::mem::replace(&mut self.requested, true)
    }

    /// Marks the action as confirmed.
    ///
    /// Returns false if it was never requested or is already confirmed.
    pub fn confirm(&mut self) -> bool {
        if !self.requested || self.confirmed {
            return false;
        }
        self.confirmed = true;
        true
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }
}

/// Everything the orchestrator knows about one saga.
#[derive(Debug, Clone)]
pub(crate) struct SagaRecord {
    pub(crate) result: SagaResult,
    pub(crate) payment_charged: bool,
    release: CompensationProgress,
    refund: CompensationProgress,
    pub(crate) started_at: Instant,
}

impl SagaRecord {
    pub(crate) fn new(saga_id: &str) -> Self {
        let mut result = SagaResult::new(saga_id);
        result.steps.push(step::SAGA_STARTED.to_string());
        Self {
            result,
            payment_charged: false,
            release: CompensationProgress::default(),
            refund: CompensationProgress::default(),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn status(&self) -> SagaStatus {
        self.result.status
    }

    pub(crate) fn record_step(&mut self, label: &str) {
        self.result.steps.push(label.to_string());
    }

    /// Moves to `Failed`, recording the step label and the error message.
    pub(crate) fn fail(&mut self, label: &str, error: String) {
        self.result.status = SagaStatus::Failed;
        self.result.errors.push(error);
        self.record_step(label);
    }

    fn progress_mut(&mut self, kind: CompensationKind) -> &mut CompensationProgress {
        match kind {
            CompensationKind::ReleaseInventory => &mut self.release,
            CompensationKind::RefundPayment => &mut self.refund,
        }
    }

    /// Records a compensation request. Returns false if already requested.
    pub(crate) fn request_compensation(&mut self, kind: CompensationKind) -> bool {
        if !self.progress_mut(kind).request() {
            return false;
        }
        self.result
            .compensations
            .push(kind.requested_label().to_string());
        true
    }

    /// Records a compensation confirmation.
    ///
    /// Returns false for confirmations that were never requested or were
    /// already received.
    pub(crate) fn confirm_compensation(&mut self, kind: CompensationKind) -> bool {
        if !self.progress_mut(kind).confirm() {
            return false;
        }
        self.result
            .compensations
            .push(kind.confirmed_label().to_string());
        true
    }

    /// Upgrades `Failed` to `FailedCompensated` once every required
    /// compensation is confirmed. Returns true if the upgrade happened.
    ///
    /// Inventory release is always required after a failure past the first
    /// step; a refund is required only if payment had been charged.
    pub(crate) fn refresh_failed_compensated(&mut self) -> bool {
        if self.result.status != SagaStatus::Failed {
            return false;
        }

        let released = self.release.is_confirmed();
        let refunded = !self.payment_charged || self.refund.is_confirmed();
        if !(released && refunded) {
            return false;
        }

        self.result.status = SagaStatus::FailedCompensated;
        self.record_step(step::SAGA_FAILED_COMPENSATED);
        true
    }
}
