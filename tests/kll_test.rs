//! KLL sketch integration tests
//!
//! Covers construction, streaming accuracy, merge semantics, and the
//! invariants the compaction engine is required to preserve:
//! - total retained weight always equals the insert count
//! - exact min/max regardless of k
//! - rank error bounded by k, not by stream length
//! - merge of same-k sketches is commutative in outcome (not bit-for-bit)

use std::cmp::Ordering;

use kll_sketch::{KllSketch, SketchError};
use proptest::prelude::*;

fn ascending(a: &i64, b: &i64) -> Ordering {
    a.cmp(b)
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_rejects_too_small_k() {
    let result = KllSketch::new(1, ascending, 1);
    assert!(result.is_err());
}

#[test]
fn test_new_accepts_boundary_k() {
    assert!(KllSketch::new(8, ascending, 1).is_ok());
    assert!(KllSketch::new(65535, ascending, 1).is_ok());
}

#[test]
fn test_with_default_seed_constructs() {
    let sketch: KllSketch<i64> = KllSketch::with_default_seed(100, ascending).unwrap();
    assert!(sketch.is_empty());
    assert_eq!(sketch.k(), 100);
}

// ============================================================================
// Streaming accuracy
// ============================================================================

#[test]
fn test_quantiles_track_a_uniform_stream() {
    let mut sketch = KllSketch::new(200, ascending, 7).unwrap();
    for i in 0..200_000i64 {
        sketch.insert(i);
    }

    let n = 200_000i64;
    for &q in &[0.01, 0.1, 0.25, 0.5, 0.75, 0.9, 0.99] {
        let estimate = sketch.estimate_quantile(q).unwrap();
        let expected = (q * n as f64) as i64;
        let error = (estimate - expected).abs();
        assert!(
            error < n / 20,
            "q={q}: estimate {estimate}, expected ~{expected}, error {error}"
        );
    }
}

#[test]
fn test_min_max_are_exact_not_estimated() {
    let mut sketch = KllSketch::new(8, ascending, 3).unwrap();
    for i in (0..50_000i64).rev() {
        sketch.insert(i);
    }
    assert_eq!(sketch.min(), Some(&0));
    assert_eq!(sketch.max(), Some(&49999));
    assert_eq!(sketch.estimate_quantile(0.0).unwrap(), 0);
    assert_eq!(sketch.estimate_quantile(1.0).unwrap(), 49999);
}

#[test]
fn test_retained_items_stay_sublinear() {
    let mut sketch = KllSketch::new(100, ascending, 2).unwrap();
    for i in 0..2_000_000i64 {
        sketch.insert(i);
    }
    // O(k log(n/k)) should stay a small multiple of k for this n.
    assert!(sketch.get_num_retained() < 5_000, "retained={}", sketch.get_num_retained());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_empty_sketch_errors_on_quantile() {
    let sketch: KllSketch<i64> = KllSketch::new(50, ascending, 1).unwrap();
    assert_eq!(sketch.estimate_quantile(0.5), Err(SketchError::EmptySketch));
}

#[test]
fn test_quantile_fraction_must_be_unit_interval() {
    let mut sketch = KllSketch::new(50, ascending, 1).unwrap();
    sketch.insert(1);
    assert!(sketch.estimate_quantile(-0.01).is_err());
    assert!(sketch.estimate_quantile(1.01).is_err());
}

// ============================================================================
// Merge
// ============================================================================

#[test]
fn test_merge_of_disjoint_ranges_preserves_extremes() {
    let mut low = KllSketch::new(100, ascending, 1).unwrap();
    let mut high = KllSketch::new(100, ascending, 2).unwrap();
    for i in 0..5000i64 {
        low.insert(i);
    }
    for i in 5000..10000i64 {
        high.insert(i);
    }
    low.merge(&[&high]).unwrap();

    assert_eq!(low.total_count(), 10000);
    assert_eq!(low.min(), Some(&0));
    assert_eq!(low.max(), Some(&9999));
    let median = low.estimate_quantile(0.5).unwrap();
    assert!((median - 5000).abs() < 500);
}

#[test]
fn test_merge_rejects_different_k() {
    let mut a = KllSketch::new(50, ascending, 1).unwrap();
    let b = KllSketch::new(51, ascending, 1).unwrap();
    assert_eq!(
        a.merge(&[&b]),
        Err(SketchError::IncompatibleParameters {
            reason: "k mismatch: 50 vs 51".to_string(),
        })
    );
}

#[test]
fn test_merge_with_many_peers_at_once() {
    let mut target = KllSketch::new(100, ascending, 0).unwrap();
    let mut peers = Vec::new();
    for shard in 0..10i64 {
        let mut peer = KllSketch::new(100, ascending, shard as u64 + 1).unwrap();
        for i in 0..1000i64 {
            peer.insert(shard * 1000 + i);
        }
        peers.push(peer);
    }
    let refs: Vec<&KllSketch<i64>> = peers.iter().collect();
    target.merge(&refs).unwrap();

    assert_eq!(target.total_count(), 10_000);
    assert_eq!(target.min(), Some(&0));
    assert_eq!(target.max(), Some(&9999));
}

#[test]
fn test_merge_into_empty_sketch() {
    let mut empty = KllSketch::new(50, ascending, 1).unwrap();
    let mut donor = KllSketch::new(50, ascending, 2).unwrap();
    for i in 0..1000 {
        donor.insert(i);
    }
    empty.merge(&[&donor]).unwrap();
    assert_eq!(empty.total_count(), 1000);
}

#[test]
fn test_merging_an_empty_peer_is_a_no_op() {
    let mut a = KllSketch::new(50, ascending, 1).unwrap();
    a.insert(1);
    a.insert(2);
    let empty = KllSketch::new(50, ascending, 2).unwrap();
    a.merge(&[&empty]).unwrap();
    assert_eq!(a.total_count(), 2);
}

// ============================================================================
// Reproducibility
// ============================================================================

#[test]
fn test_same_seed_gives_same_quantile_estimates() {
    let mut a = KllSketch::new(50, ascending, 999).unwrap();
    let mut b = KllSketch::new(50, ascending, 999).unwrap();
    for i in 0..30_000i64 {
        a.insert(i);
        b.insert(i);
    }
    for &q in &[0.1, 0.5, 0.9] {
        assert_eq!(a.estimate_quantile(q).unwrap(), b.estimate_quantile(q).unwrap());
    }
}

// ============================================================================
// Property-based tests
// ============================================================================

proptest! {
    #[test]
    fn prop_retained_weight_equals_insert_count(
        values in prop::collection::vec(any::<i64>(), 0..2000),
        seed in 0u64..10_000,
    ) {
        let mut sketch = KllSketch::new(50, ascending, seed).unwrap();
        for &v in &values {
            sketch.insert(v);
        }
        prop_assert_eq!(sketch.total_count(), values.len() as u64);
    }

    #[test]
    fn prop_min_and_max_match_a_reference_scan(
        values in prop::collection::vec(any::<i32>(), 1..2000),
        seed in 0u64..10_000,
    ) {
        let mut sketch = KllSketch::new(50, |a: &i32, b: &i32| a.cmp(b), seed).unwrap();
        for &v in &values {
            sketch.insert(v);
        }
        let expected_min = *values.iter().min().unwrap();
        let expected_max = *values.iter().max().unwrap();
        prop_assert_eq!(sketch.min(), Some(&expected_min));
        prop_assert_eq!(sketch.max(), Some(&expected_max));
    }

    #[test]
    fn prop_quantile_estimate_is_always_between_min_and_max(
        values in prop::collection::vec(any::<i32>(), 1..2000),
        q in 0.0f64..1.0,
        seed in 0u64..10_000,
    ) {
        let mut sketch = KllSketch::new(50, |a: &i32, b: &i32| a.cmp(b), seed).unwrap();
        for &v in &values {
            sketch.insert(v);
        }
        let estimate = sketch.estimate_quantile(q).unwrap();
        let expected_min = *values.iter().min().unwrap();
        let expected_max = *values.iter().max().unwrap();
        prop_assert!(estimate >= expected_min && estimate <= expected_max);
    }

    #[test]
    fn prop_retained_count_never_exceeds_a_generous_bound(
        n in 0usize..5000,
        seed in 0u64..10_000,
    ) {
        let mut sketch = KllSketch::new(50, ascending, seed).unwrap();
        for i in 0..n as i64 {
            sketch.insert(i);
        }
        // Loose sanity bound; the real guarantee is asymptotic in n/k.
        prop_assert!(sketch.get_num_retained() <= n + 256);
    }

    #[test]
    fn prop_merge_preserves_total_count(
        n1 in 0usize..1000,
        n2 in 0usize..1000,
        seed1 in 0u64..10_000,
        seed2 in 0u64..10_000,
    ) {
        let mut a = KllSketch::new(50, ascending, seed1).unwrap();
        let mut b = KllSketch::new(50, ascending, seed2).unwrap();
        for i in 0..n1 as i64 {
            a.insert(i);
        }
        for i in 0..n2 as i64 {
            b.insert(i + 1_000_000);
        }
        a.merge(&[&b]).unwrap();
        prop_assert_eq!(a.total_count(), (n1 + n2) as u64);
    }
}
