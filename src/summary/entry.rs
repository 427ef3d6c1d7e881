use std::cmp;

/// A single entry in the compressed summary.
///
/// An entry stands in for one or more coalesced observations. Where `r` is
/// the sum of `g` over all preceding entries, the true rank of `v` lies
/// somewhere in `[r + g, r + g + delta]`.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(
    feature = "serde_support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Entry {
    /// The representative observed value.
    pub v: f64,
    /// Minimum number of ranks between this entry and its predecessor. A
    /// freshly inserted entry has `g = 1`; merges accumulate the `g` of
    /// absorbed neighbors.
    pub g: u64,
    /// Additional rank uncertainty beyond `g`. Always `0.0` for the
    /// boundary entries, which are known exactly.
    pub delta: f64,
}

// The derivation of PartialEq for Entry is not appropriate. The sole
// ordering value in an Entry is the value 'v'.
impl PartialEq for Entry {
    fn eq(&self, other: &Entry) -> bool {
        self.v == other.v
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Entry) -> Option<cmp::Ordering> {
        self.v.partial_cmp(&other.v)
    }
}
