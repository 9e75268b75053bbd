//! Pure arithmetic describing how much each level of a KLL sketch may hold.
//!
//! Capacity is assigned geometrically, shrinking by a factor of `2/3` per
//! level *away from* the current top: the newest (topmost) level always has
//! the full `k` items of room, and each level below it has progressively
//! less room before it must compact, floored at [`MIN_LEVEL_CAPACITY`].

/// Smallest capacity any level is ever allowed to shrink to.
pub const MIN_LEVEL_CAPACITY: u16 = 8;

const GROWTH_FACTOR: f64 = 2.0 / 3.0;

/// Capacity of `level` (0-indexed, 0 is the raw incoming buffer) out of
/// `num_levels` total levels, for accuracy parameter `k`.
pub fn level_capacity(k: u16, num_levels: usize, level: usize) -> usize {
    debug_assert!(
        level < num_levels,
        "level {level} out of range for {num_levels} levels"
    );
    let depth = (num_levels - level - 1) as i32;
    let raw = (k as f64) * GROWTH_FACTOR.powi(depth);
    (raw.ceil() as usize).max(MIN_LEVEL_CAPACITY as usize)
}

/// Total retained-item budget across all `num_levels` levels.
pub fn compute_total_capacity(k: u16, num_levels: usize) -> usize {
    (0..num_levels)
        .map(|level| level_capacity(k, num_levels, level))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_level_capacity_is_k() {
        assert_eq!(level_capacity(200, 1, 0), 200);
        assert_eq!(compute_total_capacity(200, 1), 200);
    }

    #[test]
    fn top_level_always_has_full_capacity() {
        for num_levels in 1..10 {
            assert_eq!(level_capacity(200, num_levels, num_levels - 1), 200);
        }
    }

    #[test]
    fn capacity_shrinks_away_from_the_top() {
        let num_levels = 5;
        let caps: Vec<usize> = (0..num_levels)
            .map(|l| level_capacity(200, num_levels, l))
            .collect();
        for window in caps.windows(2) {
            assert!(window[0] <= window[1], "capacities: {:?}", caps);
        }
    }

    #[test]
    fn capacity_is_floored_at_min() {
        // With enough levels, the bottom level's capacity bottoms out at MIN_LEVEL_CAPACITY.
        let cap = level_capacity(8, 40, 0);
        assert_eq!(cap, MIN_LEVEL_CAPACITY as usize);
    }

    #[test]
    fn total_capacity_grows_with_num_levels() {
        let two = compute_total_capacity(200, 2);
        let three = compute_total_capacity(200, 3);
        assert!(three > two);
    }
}
