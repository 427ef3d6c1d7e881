use crate::summary::entry::Entry;
use crate::summary::Quantile;

/// The error envelope shared by insert, compress and query.
///
/// For a rank position `r` in a stream of `n` observations, returns the
/// minimum allowed positional error over every configured target. The
/// envelope widens away from each target's critical rank `q * n` and
/// tightens near it, which is what lets one summary track several
/// quantiles at once in sub-linear space.
pub fn invariant(targets: &[Quantile], n: u64, r: f64) -> f64 {
    let n = n as f64;
    let mut min = f64::MAX;
    for t in targets {
        let f = if t.quantile() * n <= r {
            (2.0 * t.error() * r) / t.quantile()
        } else {
            (2.0 * t.error() * (n - r)) / (1.0 - t.quantile())
        };
        if f < min {
            min = f;
        }
    }
    min
}

/// The ordered entry list and the operations over it.
///
/// Entries are kept sorted ascending by value in a flat `Vec`. Insertion is
/// a linear seek with no merging so that writers stay cheap; merging is done
/// in `compress`, which callers are expected to invoke once per read.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(
    feature = "serde_support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Store {
    targets: Vec<Quantile>,
    data: Vec<Entry>,
    n: u64,
}

impl Store {
    pub fn new(targets: Vec<Quantile>) -> Store {
        Store {
            targets,
            data: Vec::new(),
            n: 0,
        }
    }

    /// Fold one observation into the entry list.
    ///
    /// The new entry lands immediately before the first entry whose value
    /// is >= `element`. A new global minimum or maximum is exact, `delta =
    /// 0`. An interior entry gets the worst-case slack the envelope allows
    /// at its rank, so that `g + delta` stays within `invariant`.
    pub fn insert(&mut self, element: f64) {
        // insert at the front
        if self.data.is_empty() || element <= self.data[0].v {
            self.data.insert(
                0,
                Entry {
                    v: element,
                    g: 1,
                    delta: 0.0,
                },
            );
            self.n += 1;
            return;
        }

        // insert at the back
        if self.data[self.data.len() - 1].v < element {
            self.data.push(Entry {
                v: element,
                g: 1,
                delta: 0.0,
            });
            self.n += 1;
            return;
        }

        // insert in the middle, summing the ranks walked over
        let mut idx = 0;
        let mut r: u64 = 0;
        while self.data[idx].v < element {
            r += self.data[idx].g;
            idx += 1;
        }

        let delta = (invariant(&self.targets, self.n, r as f64).floor() - 1.0).max(0.0);
        self.data.insert(
            idx,
            Entry {
                v: element,
                g: 1,
                delta,
            },
        );
        self.n += 1;
    }

    /// Merge adjacent entries whose combined rank slack still fits the
    /// envelope.
    ///
    /// One left-to-right pass. `r1` tracks the ranks already emitted to the
    /// output; a pair merges while `g1 + g2 + delta2` is under the envelope
    /// at `r1`. A merge leaves the survivor with the right entry's `delta`,
    /// which can be smaller than what the pair on its left was rejected
    /// against, so the pass backtracks one step after every merge; that is
    /// what makes the result a fixed point. The first and last entries are
    /// never absorbed, which keeps the observed minimum and maximum exact.
    pub fn compress(&mut self) {
        if self.data.len() < 3 {
            return;
        }

        let mut r1 = self.data[0].g;
        let mut idx = 1;
        while idx + 1 < self.data.len() {
            let cur = self.data[idx];
            let nxt = self.data[idx + 1];

            if (cur.g + nxt.g) as f64 + nxt.delta < invariant(&self.targets, self.n, r1 as f64) {
                self.data[idx] = Entry {
                    v: nxt.v,
                    g: cur.g + nxt.g,
                    delta: nxt.delta,
                };
                self.data.remove(idx + 1);
                // The merged entry carries the absorbed entry's delta, so
                // the pair on its left may have become mergeable; retest it
                // before moving on. Staying put covers the right neighbor.
                if idx > 1 {
                    idx -= 1;
                    r1 -= self.data[idx].g;
                }
            } else {
                r1 += cur.g;
                idx += 1;
            }
        }

        debug_assert_eq!(
            self.n,
            self.data.iter().map(|e| e.g).sum::<u64>(),
            "compress lost ranks"
        );
    }

    /// Walk the entry list for an approximation of quantile `q`.
    ///
    /// The acceptance band is half the envelope at the target rank: the
    /// envelope carries a factor of two per target tolerance, so half of it
    /// is the advertised rank error. Quantiles at or beyond the boundaries
    /// are answered from the exact boundary entries. An empty summary
    /// reports 0.
    pub fn query(&self, q: f64) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        if q <= 0.0 {
            return self.data[0].v;
        }
        let last = self.data.len() - 1;
        if q >= 1.0 {
            return self.data[last].v;
        }

        let target = q * (self.n as f64);
        let bound = target + invariant(&self.targets, self.n, target) / 2.0;

        let mut r: u64 = 0;
        for idx in 1..self.data.len() {
            let prev = &self.data[idx - 1];
            let cur = &self.data[idx];

            r += prev.g;

            if (r + cur.g) as f64 + cur.delta > bound {
                return prev.v;
            }
        }

        // Only reachable when the target rank sits against the upper
        // boundary; the last entry is exact there. Anything else would mean
        // insert or compress broke the envelope.
        self.data[last].v
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entries currently stored.
    ///
    /// This value will fluctuate as compression happens.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Total observations, ever
    ///
    /// This value will never decrease and may or may not be equivalent to
    /// `Self::len`
    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn entries(&self) -> &[Entry] {
        &self.data
    }

    pub fn targets(&self) -> &[Quantile] {
        &self.targets
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};

    fn default_store() -> Store {
        Store::new(Quantile::default_targets())
    }

    #[test]
    fn invariant_at_known_ranks() {
        let targets = Quantile::default_targets();

        // All three targets pin the envelope to exactly 1.0 at the median
        // rank of a ten element stream.
        assert!((invariant(&targets, 10, 5.0) - 1.0).abs() < 1e-12);
        // Near the 0.9 target the envelope tightens to 0.2.
        assert!((invariant(&targets, 10, 9.0) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn boundary_entries_are_exact() {
        let mut store = default_store();
        for v in &[10.0, 1.0, 5.0, 7.0, 3.0] {
            store.insert(*v);
        }

        let entries = store.entries();
        assert_eq!(entries[0].v, 1.0);
        assert_eq!(entries[0].delta, 0.0);
        assert_eq!(entries[entries.len() - 1].v, 10.0);
        assert_eq!(entries[entries.len() - 1].delta, 0.0);
    }

    #[test]
    fn query_small_sorted_stream() {
        let mut store = default_store();
        for i in 1..=10 {
            store.insert(f64::from(i));
        }

        assert_eq!(store.query(0.0), 1.0);
        assert_eq!(store.query(0.5), 5.0);
        assert_eq!(store.query(0.9), 9.0);
        assert_eq!(store.query(1.0), 10.0);
    }

    #[test]
    fn query_empty_is_zero() {
        let store = default_store();
        assert_eq!(store.query(0.5), 0.0);
    }

    #[test]
    fn compression_bounds_storage() {
        let mut store = default_store();
        for i in 0..10_000 {
            store.insert(f64::from(i));
            // Read cadence of a scrape loop: merge once in a while.
            if i % 1_000 == 999 {
                store.compress();
            }
        }
        store.compress();

        assert_eq!(10_000, store.count());
        assert!(store.len() < 1_000);
        assert!(store.len() >= 2);
    }

    #[test]
    fn compress_preserves_rank_total() {
        fn inner(data: Vec<f64>) -> TestResult {
            let data: Vec<f64> = data.into_iter().filter(|v| v.is_finite()).collect();
            if data.is_empty() {
                return TestResult::discard();
            }

            let mut store = default_store();
            for d in &data {
                store.insert(*d);
            }
            store.compress();

            let total: u64 = store.entries().iter().map(|e| e.g).sum();
            TestResult::from_bool(total == data.len() as u64)
        }
        QuickCheck::new().quickcheck(inner as fn(Vec<f64>) -> TestResult);
    }

    // prop: v_i-1 <= v_i for all stored entries
    #[test]
    fn asc_entries() {
        fn inner(data: Vec<f64>) -> TestResult {
            let data: Vec<f64> = data.into_iter().filter(|v| v.is_finite()).collect();

            let mut store = default_store();
            for d in &data {
                store.insert(*d);
            }
            store.compress();

            let mut cur = f64::MIN;
            for ent in store.entries() {
                if ent.v < cur {
                    return TestResult::failed();
                }
                cur = ent.v;
            }
            TestResult::passed()
        }
        QuickCheck::new().quickcheck(inner as fn(Vec<f64>) -> TestResult);
    }

    // prop: forall coalesced entries. g_i + delta_i =< f(r_i, n). Fresh
    // singleton entries are exact and sit under the envelope trivially.
    #[test]
    fn envelope_invariant() {
        fn inner(data: Vec<f64>) -> TestResult {
            let data: Vec<f64> = data.into_iter().filter(|v| v.is_finite()).collect();

            let mut store = default_store();
            for d in &data {
                store.insert(*d);
            }
            store.compress();

            let mut r: u64 = 0;
            let entries = store.entries();
            for idx in 1..entries.len() {
                let prev = &entries[idx - 1];
                let cur = &entries[idx];

                r += prev.g;

                if cur.g == 1 && cur.delta == 0.0 {
                    continue;
                }
                let budget = invariant(store.targets(), store.count(), r as f64);
                if (cur.g as f64 + cur.delta) > budget + 1e-9 {
                    return TestResult::failed();
                }
            }
            TestResult::passed()
        }
        QuickCheck::new().quickcheck(inner as fn(Vec<f64>) -> TestResult);
    }

    // Duplicate-heavy streams leave interior entries with large deltas
    // next to exact ones; merging replaces a survivor's delta with its
    // absorbed neighbor's smaller one, so pairs already passed over become
    // mergeable and must be revisited within the same pass.
    #[test]
    fn compress_revisits_left_pairs_after_a_merge() {
        let mut store = default_store();
        for _ in 0..13 {
            store.insert(0.0);
        }
        for v in &[-1.0, 0.0, 0.0, -2.0, -1.0, -1.0] {
            store.insert(*v);
        }

        store.compress();
        let once: Vec<(f64, u64, f64)> =
            store.entries().iter().map(|e| (e.v, e.g, e.delta)).collect();
        store.compress();
        let twice: Vec<(f64, u64, f64)> =
            store.entries().iter().map(|e| (e.v, e.g, e.delta)).collect();

        assert_eq!(once, twice);
        assert_eq!(store.count(), 19);
        let total: u64 = store.entries().iter().map(|e| e.g).sum();
        assert_eq!(total, 19);
    }

    // prop: a second compress finds nothing left to merge
    #[test]
    fn compress_is_idempotent() {
        fn inner(data: Vec<f64>) -> TestResult {
            let data: Vec<f64> = data.into_iter().filter(|v| v.is_finite()).collect();

            let mut store = default_store();
            for d in &data {
                store.insert(*d);
            }
            store.compress();
            let once: Vec<(f64, u64, f64)> =
                store.entries().iter().map(|e| (e.v, e.g, e.delta)).collect();
            store.compress();
            let twice: Vec<(f64, u64, f64)> =
                store.entries().iter().map(|e| (e.v, e.g, e.delta)).collect();

            TestResult::from_bool(once == twice)
        }
        QuickCheck::new().quickcheck(inner as fn(Vec<f64>) -> TestResult);
    }
}
