//! Integration tests for the order saga running over the event bus.

use std::sync::Arc;

use common::metrics::DURATION_BUCKETS;
use common::{Event, SagaMetrics, SagaResult, SagaStatus, compensation, names, step};
use event_bus::{BusError, InMemoryTransport, TransportError};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use saga::{FailFor, SagaError, SagaRequest, SagaRuntime};

const ADDRESS: &str = "123 Flower Street, Sao Paulo";

fn request(order_id: &str) -> SagaRequest {
    SagaRequest::new(order_id, 2, 199.90, ADDRESS)
}

fn runtime() -> SagaRuntime {
    SagaRuntime::builder()
        .inventory_failure(FailFor::order("ORDER-INV-FAIL"))
        .payment_failure(FailFor::order("ORDER-PAY-FAIL"))
        .shipping_failure(FailFor::order("ORDER-SHIP-FAIL"))
        .build()
}

fn history_names(runtime: &SagaRuntime, saga_id: &str) -> Vec<String> {
    runtime
        .bus()
        .history_for(saga_id)
        .into_iter()
        .map(|event| event.name)
        .collect()
}

/// Checks the properties every settled saga must satisfy.
fn assert_invariants(result: &SagaResult) {
    assert_eq!(result.steps.first().map(String::as_str), Some(step::SAGA_STARTED));
    assert!(!result.status.is_active(), "saga did not settle: {result:?}");

    match result.status {
        SagaStatus::Completed => {
            assert!(result.compensations.is_empty());
            assert!(result.errors.is_empty());
        }
        SagaStatus::Failed => assert!(!result.errors.is_empty()),
        SagaStatus::FailedCompensated => {
            assert!(!result.errors.is_empty());
            assert_eq!(
                result.steps.last().map(String::as_str),
                Some(step::SAGA_FAILED_COMPENSATED)
            );
        }
        SagaStatus::Started | SagaStatus::InProgress => unreachable!(),
    }

    if result.has_compensation(compensation::PAYMENT_REFUND_REQUESTED) {
        assert!(result.has_step(step::SHIPPING_FAILED));
    }
    if result.has_compensation(compensation::INVENTORY_RELEASE_REQUESTED) {
        assert!(result.has_step(step::PAYMENT_FAILED) || result.has_step(step::SHIPPING_FAILED));
    }
}

#[test]
fn test_happy_path_completes() {
    let runtime = runtime();

    let result = runtime.start("SAGA-OK", request("ORDER-OK")).unwrap();

    assert_invariants(&result);
    assert_eq!(result.status, SagaStatus::Completed);
    assert_eq!(
        result.steps,
        [
            step::SAGA_STARTED,
            step::INVENTORY_RESERVED,
            step::PAYMENT_CHARGED,
            step::SHIPPING_CREATED,
            step::SAGA_COMPLETED,
        ]
    );
    assert_eq!(
        history_names(&runtime, "SAGA-OK"),
        [
            names::INVENTORY_RESERVE_REQUESTED,
            names::INVENTORY_RESERVED,
            names::PAYMENT_CHARGE_REQUESTED,
            names::PAYMENT_CHARGED,
            names::SHIPPING_CREATE_REQUESTED,
            names::SHIPPING_CREATED,
        ]
    );

    assert_eq!(runtime.inventory().reserved_quantity("ORDER-OK"), Some(2));
    assert_eq!(runtime.payment().charged_amount("ORDER-OK"), Some(199.90));
    assert_eq!(
        runtime.shipping().tracking_id("ORDER-OK").as_deref(),
        Some("TRK-ORDER-OK")
    );
}

#[test]
fn test_payment_failure_releases_inventory() {
    let runtime = runtime();

    let result = runtime
        .start("SAGA-PAY-FAIL", request("ORDER-PAY-FAIL"))
        .unwrap();

    assert_invariants(&result);
    assert_eq!(result.status, SagaStatus::FailedCompensated);
    assert_eq!(
        result.steps,
        [
            step::SAGA_STARTED,
            step::INVENTORY_RESERVED,
            step::PAYMENT_FAILED,
            step::SAGA_FAILED_COMPENSATED,
        ]
    );
    assert_eq!(
        result.compensations,
        [
            compensation::INVENTORY_RELEASE_REQUESTED,
            compensation::INVENTORY_RELEASED,
        ]
    );
    assert_eq!(result.errors, ["card declined for order ORDER-PAY-FAIL"]);

    assert_eq!(runtime.inventory().reservation_count(), 0);
    assert_eq!(runtime.payment().charge_count(), 0);
}

#[test]
fn test_shipping_failure_refunds_then_releases() {
    let runtime = runtime();

    let result = runtime
        .start("SAGA-SHIP-FAIL", request("ORDER-SHIP-FAIL"))
        .unwrap();

    assert_invariants(&result);
    assert_eq!(result.status, SagaStatus::FailedCompensated);
    assert_eq!(
        result.steps,
        [
            step::SAGA_STARTED,
            step::INVENTORY_RESERVED,
            step::PAYMENT_CHARGED,
            step::SHIPPING_FAILED,
            step::SAGA_FAILED_COMPENSATED,
        ]
    );
    assert_eq!(
        result.compensations,
        [
            compensation::PAYMENT_REFUND_REQUESTED,
            compensation::PAYMENT_REFUNDED,
            compensation::INVENTORY_RELEASE_REQUESTED,
            compensation::INVENTORY_RELEASED,
        ]
    );
    assert_eq!(result.errors, ["shipping unavailable for order ORDER-SHIP-FAIL"]);
    assert_eq!(
        history_names(&runtime, "SAGA-SHIP-FAIL"),
        [
            names::INVENTORY_RESERVE_REQUESTED,
            names::INVENTORY_RESERVED,
            names::PAYMENT_CHARGE_REQUESTED,
            names::PAYMENT_CHARGED,
            names::SHIPPING_CREATE_REQUESTED,
            names::SHIPPING_CREATE_FAILED,
            names::PAYMENT_REFUND_REQUESTED,
            names::PAYMENT_REFUNDED,
            names::INVENTORY_RELEASE_REQUESTED,
            names::INVENTORY_RELEASED,
        ]
    );

    let refunded = runtime
        .bus()
        .latest(names::PAYMENT_REFUNDED, "SAGA-SHIP-FAIL")
        .unwrap();
    assert_eq!(refunded.payload["amount"], 199.90);
    assert_eq!(runtime.shipping().shipment_count(), 0);
}

#[test]
fn test_inventory_failure_is_not_compensated() {
    let runtime = runtime();

    let result = runtime
        .start("SAGA-INV-FAIL", request("ORDER-INV-FAIL"))
        .unwrap();

    assert_invariants(&result);
    assert_eq!(result.status, SagaStatus::Failed);
    assert_eq!(result.steps, [step::SAGA_STARTED, step::INVENTORY_FAILED]);
    assert!(result.compensations.is_empty());
    assert_eq!(result.errors, ["insufficient stock for order ORDER-INV-FAIL"]);
    assert_eq!(
        history_names(&runtime, "SAGA-INV-FAIL"),
        [
            names::INVENTORY_RESERVE_REQUESTED,
            names::INVENTORY_RESERVE_FAILED
        ]
    );
}

#[test]
fn test_concurrent_sagas_do_not_mix() {
    let runtime = runtime();
    let cases = [
        ("SAGA-A", "ORDER-OK", SagaStatus::Completed),
        ("SAGA-B", "ORDER-PAY-FAIL", SagaStatus::FailedCompensated),
        ("SAGA-C", "ORDER-SHIP-FAIL", SagaStatus::FailedCompensated),
        ("SAGA-D", "ORDER-INV-FAIL", SagaStatus::Failed),
    ];

    std::thread::scope(|scope| {
        for (saga_id, order_id, _) in cases {
            let runtime = &runtime;
            scope.spawn(move || runtime.start(saga_id, request(order_id)).unwrap());
        }
    });

    for (saga_id, order_id, expected) in cases {
        let result = runtime.orchestrator().result(saga_id).unwrap();
        assert_invariants(&result);
        assert_eq!(result.saga_id, saga_id);
        assert_eq!(result.status, expected, "unexpected status for {saga_id}");

        for event in runtime.bus().history_for(saga_id) {
            assert_eq!(event.payload["order_id"], order_id);
        }
    }
    assert_eq!(
        runtime.orchestrator().saga_ids(),
        ["SAGA-A", "SAGA-B", "SAGA-C", "SAGA-D"]
    );
    // 6 + 4 + 10 + 2 events.
    assert_eq!(runtime.bus().event_count(), 22);
}

#[test]
fn test_transport_receives_wire_round_trip() {
    let transport = InMemoryTransport::new();
    let runtime = SagaRuntime::builder()
        .transport(Arc::new(transport.clone()))
        .build();

    runtime.start("SAGA-OK", request("ORDER-OK")).unwrap();

    let mirrored = transport.decoded().unwrap();
    let history = runtime.bus().history();
    assert_eq!(mirrored.len(), history.len());

    let mut mirrored_sorted = mirrored.clone();
    let mut history_sorted = history.clone();
    mirrored_sorted.sort_by(|a, b| a.name.cmp(&b.name));
    history_sorted.sort_by(|a, b| a.name.cmp(&b.name));
    assert_eq!(mirrored_sorted, history_sorted);

    // Nested events finish dispatch, and are forwarded, before their parent.
    assert_eq!(mirrored.first().unwrap().name, names::SHIPPING_CREATED);
    assert_eq!(
        mirrored.last().unwrap().name,
        names::INVENTORY_RESERVE_REQUESTED
    );
}

#[test]
fn test_transport_failure_does_not_stop_the_saga() {
    let transport = InMemoryTransport::new();
    transport.set_fail_on_publish(true);
    let runtime = SagaRuntime::builder()
        .transport(Arc::new(transport.clone()))
        .shipping_failure(FailFor::order("ORDER-SHIP-FAIL"))
        .build();

    let err = runtime
        .start("SAGA-SHIP-FAIL", request("ORDER-SHIP-FAIL"))
        .unwrap_err();

    assert!(matches!(
        err,
        SagaError::Bus(BusError::Transport(TransportError::Unroutable { .. }))
    ));
    let result = runtime.orchestrator().result("SAGA-SHIP-FAIL").unwrap();
    assert_invariants(&result);
    assert_eq!(result.status, SagaStatus::FailedCompensated);
    assert_eq!(result.compensations.len(), 4);
    assert_eq!(transport.published_count(), 0);
}

#[test]
fn test_closed_bus_still_runs_sagas() {
    let transport = InMemoryTransport::new();
    let runtime = SagaRuntime::builder()
        .transport(Arc::new(transport.clone()))
        .build();

    runtime.bus().close().unwrap();
    let result = runtime.start("SAGA-OK", request("ORDER-OK")).unwrap();

    assert_eq!(result.status, SagaStatus::Completed);
    assert!(transport.is_closed());
    assert_eq!(transport.published_count(), 0);
}

#[test]
fn test_saga_id_cannot_be_reused() {
    let runtime = runtime();
    runtime.start("SAGA-1", request("ORDER-OK")).unwrap();
    let events = runtime.bus().event_count();

    let err = runtime.start("SAGA-1", request("ORDER-PAY-FAIL")).unwrap_err();

    assert!(matches!(err, SagaError::AlreadyStarted(ref id) if id == "SAGA-1"));
    assert_eq!(runtime.bus().event_count(), events);
    assert_eq!(
        runtime.orchestrator().result("SAGA-1").unwrap().status,
        SagaStatus::Completed
    );
}

#[test]
fn test_late_confirmations_do_not_regress_status() {
    let runtime = runtime();
    runtime
        .start("SAGA-PAY-FAIL", request("ORDER-PAY-FAIL"))
        .unwrap();

    // Duplicate confirmation and an unrequested refund confirmation.
    for name in [names::INVENTORY_RELEASED, names::PAYMENT_REFUNDED] {
        let mut event = Event::new(name, "SAGA-PAY-FAIL");
        event
            .payload
            .insert("order_id".into(), "ORDER-PAY-FAIL".into());
        runtime.bus().publish(event).unwrap();
    }

    let result = runtime.orchestrator().result("SAGA-PAY-FAIL").unwrap();
    assert_eq!(result.status, SagaStatus::FailedCompensated);
    assert_eq!(result.compensations.len(), 2);
    assert!(!result.has_compensation(compensation::PAYMENT_REFUNDED));
}

#[test]
fn test_closure_failure_policy() {
    let runtime = SagaRuntime::builder()
        .payment_failure(|order_id: &str| order_id.starts_with("VIP-"))
        .build();

    let declined = runtime.start("SAGA-1", request("VIP-1")).unwrap();
    let accepted = runtime.start("SAGA-2", request("ORDER-2")).unwrap();

    assert_eq!(declined.status, SagaStatus::FailedCompensated);
    assert_eq!(accepted.status, SagaStatus::Completed);
}

fn prometheus() -> (SagaMetrics, PrometheusHandle) {
    let recorder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("saga_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )
        .unwrap()
        .build_recorder();
    let handle = recorder.handle();
    (SagaMetrics::new(recorder), handle)
}

#[test]
fn test_metrics_for_canonical_scenarios() {
    let (metrics, handle) = prometheus();
    let runtime = SagaRuntime::builder()
        .metrics(metrics)
        .inventory_failure(FailFor::order("ORDER-INV-FAIL"))
        .payment_failure(FailFor::order("ORDER-PAY-FAIL"))
        .shipping_failure(FailFor::order("ORDER-SHIP-FAIL"))
        .build();

    for (saga_id, order_id) in [
        ("SAGA-OK", "ORDER-OK"),
        ("SAGA-PAY-FAIL", "ORDER-PAY-FAIL"),
        ("SAGA-SHIP-FAIL", "ORDER-SHIP-FAIL"),
        ("SAGA-INV-FAIL", "ORDER-INV-FAIL"),
    ] {
        runtime.start(saga_id, request(order_id)).unwrap();
    }

    let output = handle.render();
    for check in [
        "saga_started_total 4",
        "saga_completed_total 1",
        "saga_failed_total 1",
        "saga_failed_compensated_total 2",
        "saga_duration_seconds_count 4",
        "saga_events_published_total{event=\"shipping.created\"} 1",
        "saga_events_published_total{event=\"inventory.reserve.requested\"} 4",
        "saga_events_published_total{event=\"inventory.released\"} 2",
    ] {
        assert!(output.contains(check), "missing {check:?} in:\n{output}");
    }
}

#[test]
fn test_non_finite_amount_starts_nothing() {
    let (metrics, handle) = prometheus();
    let runtime = SagaRuntime::builder().metrics(metrics).build();

    let err = runtime
        .start("SAGA-NAN", SagaRequest::new("ORDER-OK", 1, f64::NAN, ADDRESS))
        .unwrap_err();

    assert!(matches!(err, SagaError::InvalidRequest(_)));
    assert!(runtime.orchestrator().result("SAGA-NAN").is_none());
    assert_eq!(runtime.bus().event_count(), 0);
    assert!(!handle.render().contains("saga_started_total"));

    let result = runtime.start("SAGA-NAN", request("ORDER-OK")).unwrap();
    assert_eq!(result.status, SagaStatus::Completed);
}
