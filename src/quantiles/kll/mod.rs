//! A mergeable streaming quantile sketch with bounded rank error.
//!
//! The KLL sketch (Karnin, Lang & Liberty, 2016) keeps a small, leveled
//! buffer of retained items. Each level holds roughly the same number of
//! items but represents exponentially more input weight as its index grows;
//! when a level overflows its budget, [`compaction`] randomly discards half
//! of it and promotes the other half one level up. The result is an
//! approximate sorted view whose rank error is bounded in terms of `k`
//! regardless of the stream length, and which merges with other sketches of
//! the same `k` without losing that guarantee.

mod compaction;
mod level_geometry;

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::common::validation::{validate_fraction, validate_k};
use crate::common::{Result, SketchError};

use compaction::{compress_while_updating, general_compress};
use level_geometry::MIN_LEVEL_CAPACITY;

const MAX_K: u16 = 65535;

/// A boxed, clonable three-way comparator over `T`.
pub type Comparator<T> = Rc<dyn Fn(&T, &T) -> Ordering>;

/// A streaming KLL quantile sketch over items of type `T`.
///
/// `T` need not implement `Ord`: the sketch is handed a comparator at
/// construction time, so it works equally well over types with only a
/// partial order (floats) or an externally supplied rule (descending
/// order, multi-key tuples).
pub struct KllSketch<T: Clone> {
    k: u16,
    compare: Comparator<T>,
    rng: SmallRng,
    levels: Vec<Vec<T>>,
    is_level_zero_sorted: bool,
    n: u64,
    min_value: Option<T>,
    max_value: Option<T>,
}

impl<T: Clone> fmt::Debug for KllSketch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KllSketch")
            .field("k", &self.k)
            .field("n", &self.n)
            .field("num_levels", &self.levels.len())
            .field("retained", &self.get_num_retained())
            .finish()
    }
}

impl<T: Clone> Clone for KllSketch<T> {
    fn clone(&self) -> Self {
        KllSketch {
            k: self.k,
            compare: Rc::clone(&self.compare),
            rng: self.rng.clone(),
            levels: self.levels.clone(),
            is_level_zero_sorted: self.is_level_zero_sorted,
            n: self.n,
            min_value: self.min_value.clone(),
            max_value: self.max_value.clone(),
        }
    }
}

impl<T: Clone> KllSketch<T> {
    /// Builds an empty sketch with accuracy parameter `k` and an explicit
    /// PRNG seed, for reproducible compaction decisions.
    ///
    /// Larger `k` retains more items and tightens the rank-error bound;
    /// smaller `k` uses less memory at the cost of accuracy. `k` must be
    /// in `[8, 65535]`.
    pub fn new(k: u16, compare: impl Fn(&T, &T) -> Ordering + 'static, seed: u64) -> Result<Self> {
        validate_k(k, MIN_LEVEL_CAPACITY, MAX_K)?;
        Ok(KllSketch {
            k,
            compare: Rc::new(compare),
            rng: SmallRng::seed_from_u64(seed),
            levels: vec![Vec::new()],
            is_level_zero_sorted: true,
            n: 0,
            min_value: None,
            max_value: None,
        })
    }

    /// Builds an empty sketch seeded from the operating system's entropy
    /// source rather than a caller-supplied seed.
    pub fn with_default_seed(k: u16, compare: impl Fn(&T, &T) -> Ordering + 'static) -> Result<Self> {
        validate_k(k, MIN_LEVEL_CAPACITY, MAX_K)?;
        Ok(KllSketch {
            k,
            compare: Rc::new(compare),
            rng: SmallRng::from_os_rng(),
            levels: vec![Vec::new()],
            is_level_zero_sorted: true,
            n: 0,
            min_value: None,
            max_value: None,
        })
    }

    /// The accuracy parameter this sketch was constructed with.
    pub fn k(&self) -> u16 {
        self.k
    }

    /// Total number of items ever inserted (or contributed via merge).
    pub fn total_count(&self) -> u64 {
        self.n
    }

    /// Whether any item has ever been inserted.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Number of items physically retained across all levels.
    pub fn get_num_retained(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// The smallest item ever inserted, tracked exactly (not an estimate).
    pub fn min(&self) -> Option<&T> {
        self.min_value.as_ref()
    }

    /// The largest item ever inserted, tracked exactly (not an estimate).
    pub fn max(&self) -> Option<&T> {
        self.max_value.as_ref()
    }

    /// Feeds one item into the sketch.
    pub fn insert(&mut self, item: T) {
        self.track_min_max(&item);
        self.n += 1;
        self.levels[0].push(item);
        self.is_level_zero_sorted = false;

        if self.levels[0].len() >= self.level_zero_capacity() {
            self.compact_for_insert();
        }

        debug_assert!(self.invariants_hold(), "invariant violated after insert");
    }

    fn track_min_max(&mut self, item: &T) {
        let is_new_min = match &self.min_value {
            None => true,
            Some(current) => (self.compare)(item, current) == Ordering::Less,
        };
        if is_new_min {
            self.min_value = Some(item.clone());
        }
        let is_new_max = match &self.max_value {
            None => true,
            Some(current) => (self.compare)(item, current) == Ordering::Greater,
        };
        if is_new_max {
            self.max_value = Some(item.clone());
        }
    }

    fn level_zero_capacity(&self) -> usize {
        level_geometry::level_capacity(self.k, self.levels.len(), 0)
    }

    /// Compacts exactly the level(s) that are at or over their own capacity,
    /// regardless of whether the sketch is globally over budget. This is the
    /// path `insert` needs: it must free the slot it just filled, not decide
    /// whether compacting is worth it yet.
    fn compact_for_insert(&mut self) {
        let compare = Rc::clone(&self.compare);
        self.is_level_zero_sorted = compress_while_updating(
            &mut self.levels,
            self.k,
            self.is_level_zero_sorted,
            &|a: &T, b: &T| compare(a, b),
            &mut self.rng,
        );
        self.drop_trailing_empty_levels();
    }

    /// Rebalances the whole level layout after folding in a peer's data,
    /// deferring compaction (and the new top level it implies) until the
    /// combined sketch is actually over its global budget.
    fn compact_after_merge(&mut self) {
        let levels = std::mem::take(&mut self.levels);
        let compare = Rc::clone(&self.compare);
        let (compacted, is_level_zero_sorted) = general_compress(
            levels,
            self.k,
            self.is_level_zero_sorted,
            &|a: &T, b: &T| compare(a, b),
            &mut self.rng,
        );
        self.levels = compacted;
        self.is_level_zero_sorted = is_level_zero_sorted;
        self.drop_trailing_empty_levels();
    }

    fn total_weight(&self) -> u64 {
        self.levels.iter().enumerate().map(|(level, bucket)| (bucket.len() as u64) << level).sum()
    }

    /// Checked only from behind `debug_assert!`, so release builds never
    /// pay for it: retained weight must equal the insert count, and every
    /// level whose sortedness is claimed must actually be sorted.
    fn invariants_hold(&self) -> bool {
        if self.total_weight() != self.n {
            return false;
        }
        for (level, bucket) in self.levels.iter().enumerate() {
            if level == 0 && !self.is_level_zero_sorted {
                continue;
            }
            if !bucket.windows(2).all(|w| (self.compare)(&w[0], &w[1]) != Ordering::Greater) {
                return false;
            }
        }
        true
    }

    fn drop_trailing_empty_levels(&mut self) {
        while self.levels.len() > 1 && self.levels.last().map_or(false, Vec::is_empty) {
            self.levels.pop();
        }
        if self.levels.is_empty() {
            self.levels.push(Vec::new());
        }
    }

    /// Merges the contents of `peers` into this sketch in place.
    ///
    /// All sketches (`self` and every entry in `peers`) must share the same
    /// `k`; the comparator is trusted to be equivalent since closures can't
    /// be compared for identity at runtime.
    pub fn merge(&mut self, peers: &[&KllSketch<T>]) -> Result<()> {
        for peer in peers {
            if peer.k != self.k {
                return Err(SketchError::IncompatibleParameters {
                    reason: format!("k mismatch: {} vs {}", self.k, peer.k),
                });
            }
        }

        for peer in peers {
            if peer.n == 0 {
                continue;
            }
            self.merge_one(peer);
        }

        debug_assert!(self.invariants_hold(), "invariant violated after merge");
        Ok(())
    }

    fn merge_one(&mut self, peer: &KllSketch<T>) {
        let compare = Rc::clone(&self.compare);
        let is_new_min = match (&self.min_value, &peer.min_value) {
            (None, Some(_)) => true,
            (Some(a), Some(b)) => compare(b, a) == Ordering::Less,
            _ => false,
        };
        if is_new_min {
            self.min_value = peer.min_value.clone();
        }
        let is_new_max = match (&self.max_value, &peer.max_value) {
            (None, Some(_)) => true,
            (Some(a), Some(b)) => compare(b, a) == Ordering::Greater,
            _ => false,
        };
        if is_new_max {
            self.max_value = peer.max_value.clone();
        }

        let target_levels = self.levels.len().max(peer.levels.len());
        self.levels.resize_with(target_levels, Vec::new);

        if !self.is_level_zero_sorted {
            self.levels[0].sort_by(|a, b| compare(a, b));
            self.is_level_zero_sorted = true;
        }

        let mut peer_levels = peer.levels.clone();
        peer_levels.resize_with(target_levels, Vec::new);

        for (level, mut incoming) in peer_levels.into_iter().enumerate() {
            if incoming.is_empty() {
                continue;
            }
            if level == 0 && !peer.is_level_zero_sorted {
                incoming.sort_by(|a, b| compare(a, b));
            }
            let existing = std::mem::take(&mut self.levels[level]);
            self.levels[level] = compaction::merge_overlap(existing, incoming, &|a: &T, b: &T| compare(a, b));
        }

        self.n += peer.n;
        self.compact_after_merge();
    }

    /// Returns the sketch's items with their approximate weights, sorted
    /// under the comparator. Weight at level `l` is `2^l`.
    fn sorted_view(&self) -> Vec<(T, u64)> {
        let mut items: Vec<(T, u64)> = Vec::with_capacity(self.get_num_retained());
        for (level, bucket) in self.levels.iter().enumerate() {
            let weight = 1u64 << level;
            for item in bucket {
                items.push((item.clone(), weight));
            }
        }
        let compare = Rc::clone(&self.compare);
        items.sort_by(|a, b| compare(&a.0, &b.0));
        items
    }

    /// Estimates the value at quantile fraction `q` in `[0, 1]`.
    ///
    /// `q = 0.0` returns the tracked minimum, `q = 1.0` the tracked maximum;
    /// both are exact. Interior quantiles are approximate with error
    /// bounded by the sketch's accuracy parameter.
    pub fn estimate_quantile(&self, q: f64) -> Result<T> {
        validate_fraction(q)?;
        if self.n == 0 {
            return Err(SketchError::EmptySketch);
        }
        if q == 0.0 {
            return Ok(self.min_value.clone().unwrap());
        }
        if q == 1.0 {
            return Ok(self.max_value.clone().unwrap());
        }

        let items = self.sorted_view();
        let target = (q * self.n as f64).ceil() as u64;
        let target = target.max(1).min(self.n);

        let mut cumulative = 0u64;
        for (item, weight) in &items {
            cumulative += weight;
            if cumulative >= target {
                return Ok(item.clone());
            }
        }
        Ok(items.last().map(|(item, _)| item.clone()).unwrap())
    }

    /// Estimates the values at each quantile fraction in `qs`, in one pass
    /// over the sorted view.
    pub fn estimate_quantiles(&self, qs: &[f64]) -> Result<Vec<T>> {
        qs.iter().map(|&q| self.estimate_quantile(q)).collect()
    }
}
