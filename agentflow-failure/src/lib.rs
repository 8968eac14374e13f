#![deny(missing_docs)]
//! Consecutive-failure tracking and per-tool circuit breakers (C7 / C8).

pub mod breaker;
pub mod signature;
pub mod tracker;

pub use breaker::{BreakerConfig, CircuitBreaker, GuardrailEngine};
pub use signature::{canonical_signature, is_truncated_input};
pub use tracker::FailureTracker;
