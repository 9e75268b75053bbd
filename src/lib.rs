//! kll-sketch: a mergeable streaming quantile sketch with bounded rank error.
//!
//! This crate implements the KLL algorithm (Karnin, Lang & Liberty, 2016):
//! a leveled buffer of retained items with randomized compaction, giving
//! rank-error guarantees that depend only on the accuracy parameter `k`,
//! not on the length of the stream. Sketches built with the same `k` merge
//! without degrading that guarantee, which makes the structure suitable for
//! distributed aggregation of quantile statistics.
//!
//! ```
//! use kll_sketch::KllSketch;
//!
//! let mut sketch = KllSketch::with_default_seed(200, |a: &f64, b: &f64| a.partial_cmp(b).unwrap()).unwrap();
//! for i in 0..10_000 {
//!     sketch.insert(i as f64);
//! }
//! println!("p50: {}", sketch.estimate_quantile(0.5).unwrap());
//! println!("p99: {}", sketch.estimate_quantile(0.99).unwrap());
//! ```

#![warn(clippy::all)]

pub mod common;
pub mod quantiles;

pub use common::{Result, SketchError};
pub use quantiles::KllSketch;
