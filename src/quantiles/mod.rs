//! Quantile estimation over a data stream.
//!
//! # KLL Sketch
//!
//! [`KllSketch`] tracks approximate quantiles of a stream using a leveled
//! buffer with randomized compaction (Karnin, Lang & Liberty, 2016).
//!
//! **Use when:**
//! - You need rank-error guarantees independent of stream length
//! - You need to merge sketches built on different shards or machines
//! - Your items don't implement `Ord` (floats, custom tie-breaking)
//!
//! **Characteristics:**
//! - Rank error bounded by a function of `k`, not of `n`
//! - Space: `O(k log(n/k))`
//! - Exact min/max regardless of `k`
//!
//! ```
//! use kll_sketch::quantiles::KllSketch;
//!
//! let mut sketch = KllSketch::with_default_seed(200, |a: &i32, b: &i32| a.cmp(b)).unwrap();
//! for i in 0..10_000 {
//!     sketch.insert(i);
//! }
//! let median = sketch.estimate_quantile(0.5).unwrap();
//! assert!((median - 5000).abs() < 500);
//! ```

mod kll;

pub use kll::{Comparator, KllSketch};
