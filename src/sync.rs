//! Shared-state wrapper for concurrent instrumentation.
//!
//! The estimator core is a plain single-threaded value. In its intended
//! deployment many producer threads observe into one summary while a
//! periodic reader scrapes it, so every mutation and every read must apply
//! as one atomic unit: no torn reads of a half-applied insert, no
//! interleaved structural edits. A mutex around the whole estimator gives
//! exactly that. Every critical section is a short, bounded, CPU-only walk
//! of the in-memory entry list; nothing blocks indefinitely and nothing
//! needs cancellation.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::summary::{Error, Estimator, Export, Quantile};

/// A cloneable handle to a mutex-guarded [`Estimator`].
///
/// Clones share the same underlying summary. Writers call
/// [`Shared::observe`]; readers call [`Shared::read`] or
/// [`Shared::export`], each of which is a single compress-then-query
/// transaction.
///
/// # Examples
/// ```
/// use targeted_quantiles::sync::Shared;
///
/// let summary = Shared::default();
/// let writer = summary.clone();
///
/// let handle = std::thread::spawn(move || {
///     for i in 1..=100 {
///         writer.observe(f64::from(i)).unwrap();
///     }
/// });
/// handle.join().unwrap();
///
/// let export = summary.export();
/// assert_eq!(export.count, 100);
/// assert_eq!(export.sum, 5050.0);
/// ```
#[derive(Debug, Clone)]
pub struct Shared {
    inner: Arc<Mutex<Estimator>>,
}

impl Shared {
    /// Create a shared estimator tracking the given targets.
    pub fn new(targets: Vec<Quantile>) -> Result<Shared, Error> {
        Ok(Shared {
            inner: Arc::new(Mutex::new(Estimator::new(targets)?)),
        })
    }

    /// Fold one observation into the shared summary.
    ///
    /// One locked insert; no compression, so writers never pay the merge
    /// cost.
    pub fn observe(&self, v: f64) -> Result<(), Error> {
        self.inner.lock().insert(v)
    }

    /// Compress once, then query every configured target.
    ///
    /// Returns `(quantile, estimate)` pairs in configuration order, all
    /// from one consistent view of the stream.
    pub fn read(&self) -> Vec<(f64, f64)> {
        self.inner.lock().snapshot()
    }

    /// Everything a collector scrapes: the snapshot plus the exact `sum`
    /// and `count` scalars, from one consistent view of the stream.
    pub fn export(&self) -> Export {
        self.inner.lock().export()
    }

    /// A consistent copy of the full estimator state, for introspection
    /// and testing.
    pub fn dump(&self) -> Estimator {
        self.inner.lock().clone()
    }
}

impl Default for Shared {
    /// A shared estimator over [`Quantile::default_targets`].
    fn default() -> Shared {
        Shared {
            inner: Arc::new(Mutex::new(Estimator::default())),
        }
    }
}
