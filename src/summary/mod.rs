//! A streaming summary of targeted quantiles.
//!
//! This is an implementation of the targeted variant of the algorithm
//! presented in Cormode, Korn, Muthukrishnan, Srivastava's paper "Effective
//! Computation of Biased Quantiles over Data Streams". The summary is
//! configured with a fixed set of `(quantile, tolerance)` targets and keeps
//! a compressed list of entries whose rank uncertainty is pinched near each
//! target and allowed to spread far from it. The result is the shape of
//! estimator that telemetry systems report as p50/p90/p99 series: writers
//! fold in one observation at a time, readers periodically pull back
//! quantile estimates, and nobody ever holds the raw stream.
//!
//! Insertion never merges; it is a linear seek over the current entry list
//! so that producers stay cheap. Compression is deferred to read time,
//! where one pass amortizes the cleanup across all the inserts since the
//! last read.

use std::error;
use std::fmt;

mod entry;
mod store;

pub use self::entry::Entry;

use self::store::Store;

/// A quantile target: the quantile itself and the acceptable absolute rank
/// error when querying for it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde_support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Quantile {
    quantile: f64,
    error: f64,
}

impl Quantile {
    /// Create a target for `quantile` with rank tolerance `error`.
    ///
    /// `quantile` must lie strictly between 0 and 1 and `error` must be a
    /// positive finite number.
    ///
    /// # Examples
    /// ```
    /// use targeted_quantiles::summary::Quantile;
    ///
    /// assert!(Quantile::new(0.99, 0.001).is_ok());
    /// assert!(Quantile::new(1.2, 0.001).is_err());
    /// assert!(Quantile::new(0.5, 0.0).is_err());
    /// ```
    pub fn new(quantile: f64, error: f64) -> Result<Quantile, Error> {
        if !(quantile > 0.0 && quantile < 1.0) {
            return Err(Error::InvalidQuantile(quantile));
        }
        if !error.is_finite() || error <= 0.0 {
            return Err(Error::InvalidTolerance(error));
        }
        Ok(Quantile { quantile, error })
    }

    /// The target quantile, in (0, 1).
    pub fn quantile(&self) -> f64 {
        self.quantile
    }

    /// The acceptable rank error around the target.
    pub fn error(&self) -> f64 {
        self.error
    }

    /// The conventional telemetry target set: the median within 5%, the
    /// 90th percentile within 1% and the 99th within 0.1%.
    ///
    /// This is an explicit value to hand to [`Estimator::new`], not
    /// implicit global configuration.
    pub fn default_targets() -> Vec<Quantile> {
        vec![
            Quantile {
                quantile: 0.5,
                error: 0.05,
            },
            Quantile {
                quantile: 0.9,
                error: 0.01,
            },
            Quantile {
                quantile: 0.99,
                error: 0.001,
            },
        ]
    }
}

/// Construction and observation errors.
///
/// Every variant is detectable at the call site; none of them correspond to
/// a retryable runtime condition. Violations of the summary's internal
/// invariants are defects, not errors, and are caught by debug assertions
/// rather than surfaced here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// An estimator was constructed with no targets at all.
    EmptyTargets,
    /// A target quantile fell outside (0, 1).
    InvalidQuantile(f64),
    /// A target tolerance was zero, negative or non-finite.
    InvalidTolerance(f64),
    /// An observed value was NaN or infinite. The entry list is totally
    /// ordered by value and cannot place such observations.
    NotFinite(f64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyTargets => write!(f, "at least one quantile target is required"),
            Error::InvalidQuantile(q) => {
                write!(f, "quantile {} is outside the open interval (0, 1)", q)
            }
            Error::InvalidTolerance(e) => {
                write!(f, "tolerance {} is not a positive finite number", e)
            }
            Error::NotFinite(v) => write!(f, "observation {} is not a finite number", v),
        }
    }
}

impl error::Error for Error {}

/// The scalar samples a collector renders from one summary: the per-target
/// quantile estimates plus the `_sum` and `_count` sibling series.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde_support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Export {
    /// `(quantile, estimate)` pairs, in configuration order.
    pub quantiles: Vec<(f64, f64)>,
    /// Exact running sum of every observation.
    pub sum: f64,
    /// Exact number of observations.
    pub count: u64,
}

/// A structure to provide approximate quantile queries over a stream in
/// bounded memory and with per-target error bounds.
///
/// # Examples
/// ```
/// use targeted_quantiles::summary::Estimator;
///
/// let mut est = Estimator::default();
/// for i in 1..=10 {
///     est.insert(f64::from(i)).unwrap();
/// }
///
/// assert_eq!(est.count(), 10);
/// assert_eq!(est.sum(), 55.0);
/// assert_eq!(est.query(0.5), 5.0);
/// assert_eq!(est.query(0.9), 9.0);
/// ```
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(
    feature = "serde_support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Estimator {
    sum: f64,
    samples: Store,
}

impl Estimator {
    /// Create an estimator tracking the given targets.
    ///
    /// The target set is fixed for the life of the estimator. An empty set
    /// is rejected here rather than discovered at query time.
    ///
    /// # Examples
    /// ```
    /// use targeted_quantiles::summary::{Estimator, Quantile};
    ///
    /// let targets = vec![Quantile::new(0.5, 0.05).unwrap()];
    /// let est = Estimator::new(targets).unwrap();
    /// assert_eq!(est.count(), 0);
    ///
    /// assert!(Estimator::new(vec![]).is_err());
    /// ```
    pub fn new(targets: Vec<Quantile>) -> Result<Estimator, Error> {
        if targets.is_empty() {
            return Err(Error::EmptyTargets);
        }
        Ok(Estimator {
            sum: 0.0,
            samples: Store::new(targets),
        })
    }

    /// Fold one observation into the summary.
    ///
    /// Exactly one rank is added: `count` grows by one and `sum` by `v`,
    /// both exactly. Non-finite observations are rejected; the entry list
    /// has no total order to offer them. No compression happens here, so
    /// writers pay a linear seek over the current entry list and nothing
    /// more.
    pub fn insert(&mut self, v: f64) -> Result<(), Error> {
        if !v.is_finite() {
            return Err(Error::NotFinite(v));
        }
        self.sum += v;
        self.samples.insert(v);
        Ok(())
    }

    /// Merge adjacent entries while the error budget allows it.
    ///
    /// `count` and `sum` are untouched and every configured target remains
    /// answerable within its tolerance. Readers call this once before a
    /// round of queries; calling it again immediately finds nothing more to
    /// merge.
    pub fn compress(&mut self) {
        self.samples.compress();
    }

    /// Query for an approximation of quantile `q`.
    ///
    /// For a configured target `(q, e)` the returned value's true rank is
    /// within `e * count` of `q * count`. Any other `q` is answered by the
    /// same scan as a best-effort estimate without a tightened bound. The
    /// boundary quantiles 0 and 1 are always exact, and an empty estimator
    /// reports 0.
    ///
    /// This is a pure read; pair it with [`Estimator::compress`], or use
    /// [`Estimator::snapshot`] which does both.
    pub fn query(&self, q: f64) -> f64 {
        self.samples.query(q)
    }

    /// Compress, then query every configured target.
    ///
    /// Returns `(quantile, estimate)` pairs in configuration order.
    ///
    /// # Examples
    /// ```
    /// use targeted_quantiles::summary::Estimator;
    ///
    /// let mut est = Estimator::default();
    /// for i in 1..=10 {
    ///     est.insert(f64::from(i)).unwrap();
    /// }
    ///
    /// let snap = est.snapshot();
    /// assert_eq!(snap.len(), 3);
    /// assert_eq!(snap[0].0, 0.5);
    /// assert_eq!(snap[0].1, 5.0);
    /// ```
    pub fn snapshot(&mut self) -> Vec<(f64, f64)> {
        self.compress();
        let targets: Vec<f64> = self.samples.targets().iter().map(|t| t.quantile()).collect();
        targets
            .into_iter()
            .map(|q| (q, self.samples.query(q)))
            .collect()
    }

    /// Everything a collector scrapes from one summary: the snapshot plus
    /// the exact `sum` and `count` scalars.
    pub fn export(&mut self) -> Export {
        let quantiles = self.snapshot();
        Export {
            quantiles,
            sum: self.sum,
            count: self.samples.count(),
        }
    }

    /// Query the estimator for the count of its observations.
    ///
    /// This is the total number of observations seen over the lifetime of
    /// the structure, _not_ the number of entries currently stored.
    pub fn count(&self) -> u64 {
        self.samples.count()
    }

    /// The exact running sum of every observation.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// The arithmetic mean of the observations, if there are any.
    ///
    /// # Examples
    /// ```
    /// use targeted_quantiles::summary::Estimator;
    ///
    /// let mut est = Estimator::default();
    /// assert_eq!(est.mean(), None);
    /// est.insert(0.0).unwrap();
    /// est.insert(100.0).unwrap();
    /// assert_eq!(est.mean(), Some(50.0));
    /// ```
    pub fn mean(&self) -> Option<f64> {
        if self.samples.count() == 0 {
            None
        } else {
            Some(self.sum / (self.samples.count() as f64))
        }
    }

    /// True if nothing has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The configured targets, in configuration order.
    pub fn targets(&self) -> &[Quantile] {
        self.samples.targets()
    }

    /// The full compressed entry list, for introspection and testing.
    pub fn entries(&self) -> &[Entry] {
        self.samples.entries()
    }
}

impl Default for Estimator {
    /// An estimator over [`Quantile::default_targets`].
    fn default() -> Estimator {
        Estimator {
            sum: 0.0,
            samples: Store::new(Quantile::default_targets()),
        }
    }
}
