//! This crate provides approximate quantiles over unbounded data streams in
//! a moderate amount of memory.
//!
//! The estimator here is built for telemetry: producers continuously report
//! scalar measurements, latencies and sizes and the like, and a monitoring
//! reader periodically asks for the p50/p90/p99 of everything seen so far
//! without ever holding the raw stream. Memory grows with the requested
//! precision, not with the number of observations. Each configured target
//! carries its own rank tolerance, so one summary answers several quantiles
//! at once with per-target error bounds.
//!
//! The [`summary`] module holds the single-threaded estimator core; the
//! [`sync`] module wraps it for the usual many-writers, periodic-reader
//! deployment.
#![deny(
    missing_docs,
    missing_copy_implementations,
    missing_debug_implementations,
    unused_import_braces
)]

pub mod summary;
pub mod sync;
