//! Outbound delivery with rate-limit-aware retry.
//!
//! Every send goes through [`DeliveryEngine`]. It waits out the shared
//! [`RateLimiter`] cooldown, classifies failures (rate limit, terminal,
//! transient) and retries transient ones within a per-call [`RetryPolicy`].
//! This crate is the only place that interprets transmission error codes.

pub mod classify;
pub mod engine;
pub mod error;
pub mod policy;
pub mod rate_limit;

pub use {
    classify::{Outcome, classify},
    engine::{DeliveryEngine, DeliveryRequest},
    error::{DeliveryError, Result},
    policy::{DeliveryPolicies, RetryPolicy},
    rate_limit::RateLimiter,
};
