//! HTTP handlers for the observability endpoints.

pub mod health;
pub mod metrics;
