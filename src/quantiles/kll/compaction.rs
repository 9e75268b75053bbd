//! The randomized compaction primitives that keep a KLL sketch within budget.
//!
//! Each level is represented as an owned, densely packed `Vec<T>` rather than
//! a slice into one flat buffer: compaction rebuilds the affected levels
//! instead of shuffling indices in place (see `DESIGN.md` for why). The
//! observable behavior — one random bit consumed per halving, stable-merge
//! semantics for `merge_overlap` — matches the in-place reference exactly.

use std::cmp::Ordering;

use rand::rngs::SmallRng;
use rand::Rng;

use super::level_geometry::{compute_total_capacity, level_capacity};

fn select_parity<T>(items: Vec<T>, parity: usize) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| if i % 2 == parity { Some(item) } else { None })
        .collect()
}

/// Randomly keeps half of an even-length level, biased toward the lower
/// index parity. Consumes exactly one random bit.
pub fn randomly_halve_down<T>(items: Vec<T>, rng: &mut SmallRng) -> Vec<T> {
    debug_assert_eq!(items.len() % 2, 0, "halve_down requires an even-length level");
    let bit = rng.random_bool(0.5) as usize;
    select_parity(items, bit)
}

/// Randomly keeps half of an even-length level, biased toward the upper
/// index parity. Consumes exactly one random bit.
pub fn randomly_halve_up<T>(items: Vec<T>, rng: &mut SmallRng) -> Vec<T> {
    debug_assert_eq!(items.len() % 2, 0, "halve_up requires an even-length level");
    let len = items.len();
    let bit = rng.random_bool(0.5) as usize;
    let parity = (len - 1).wrapping_sub(bit) % 2;
    select_parity(items, parity)
}

/// Merges two already-sorted owned vectors under `compare`, preserving
/// stability (ties resolve in favor of `a`).
pub fn merge_overlap<T>(a: Vec<T>, b: Vec<T>, compare: &dyn Fn(&T, &T) -> Ordering) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let mut a_iter = a.into_iter().peekable();
    let mut b_iter = b.into_iter().peekable();
    loop {
        match (a_iter.peek(), b_iter.peek()) {
            (Some(x), Some(y)) => {
                if compare(x, y) != Ordering::Greater {
                    out.push(a_iter.next().unwrap());
                } else {
                    out.push(b_iter.next().unwrap());
                }
            }
            (Some(_), None) => out.push(a_iter.next().unwrap()),
            (None, Some(_)) => out.push(b_iter.next().unwrap()),
            (None, None) => break,
        }
    }
    out
}

/// The lowest level whose population is at or over its own capacity, if any.
fn find_level_to_compact<T>(levels: &[Vec<T>], k: u16) -> Option<usize> {
    let num_levels = levels.len();
    (0..num_levels).find(|&level| levels[level].len() >= level_capacity(k, num_levels, level))
}

/// Compacts exactly `level` in place: splits off an odd-length orphan, sorts
/// level 0 first if it isn't already, halves the remainder (up if the level
/// above is empty, down otherwise) and merges the survivors into the level
/// above, growing the sketch by one level if `level` was the top one.
///
/// Returns the number of items promoted out of `level` (i.e. how much its
/// weighted occupancy shrank).
fn compact_one_level<T>(
    levels: &mut Vec<Vec<T>>,
    level: usize,
    is_level_zero_sorted: bool,
    compare: &dyn Fn(&T, &T) -> Ordering,
    rng: &mut SmallRng,
) -> usize {
    if level + 1 >= levels.len() {
        levels.push(Vec::new());
    }

    let mut current = std::mem::take(&mut levels[level]);
    let above = std::mem::take(&mut levels[level + 1]);

    let orphan = if current.len() % 2 == 1 {
        Some(current.remove(0))
    } else {
        None
    };

    if level == 0 && !is_level_zero_sorted {
        current.sort_by(|a, b| compare(a, b));
    }

    let promoted = if above.is_empty() {
        randomly_halve_up(current, rng)
    } else {
        randomly_halve_down(current, rng)
    };
    let promoted_len = promoted.len();

    levels[level + 1] = if above.is_empty() {
        promoted
    } else {
        merge_overlap(promoted, above, compare)
    };

    let mut out_level = Vec::new();
    if let Some(item) = orphan {
        out_level.push(item);
    }
    levels[level] = out_level;

    promoted_len
}

/// Rebalances a possibly over-full multi-level layout into a valid one,
/// deferring compaction of any level whose population is below its own
/// capacity AND whose compaction isn't yet justified by the sketch's
/// overall occupancy (`current_item_count < target_item_count`).
///
/// This is the policy used after a merge, where growing a new top level is
/// only worthwhile once the combined sketch is actually over its global
/// budget. Returns the compacted levels and the resulting level-0
/// sortedness: unchanged if level 0 was carried over untouched, `true` if
/// it was compacted (its output is at most one orphan item, trivially
/// sorted).
pub fn general_compress<T>(
    mut levels: Vec<Vec<T>>,
    k: u16,
    is_level_zero_sorted: bool,
    compare: &dyn Fn(&T, &T) -> Ordering,
    rng: &mut SmallRng,
) -> (Vec<Vec<T>>, bool) {
    let mut current_num_levels = levels.len();
    let mut current_item_count: usize = levels.iter().map(Vec::len).sum();
    let mut target_item_count = compute_total_capacity(k, current_num_levels);
    let mut level_zero_sorted_out = is_level_zero_sorted;

    let mut level = 0usize;
    while level < current_num_levels {
        if level + 1 >= levels.len() {
            levels.push(Vec::new());
        }

        let pop = levels[level].len();
        let cap = level_capacity(k, current_num_levels, level);

        if current_item_count < target_item_count || pop < cap {
            level += 1;
            continue;
        }

        let was_top = level == current_num_levels - 1;
        let promoted_len = compact_one_level(&mut levels, level, level_zero_sorted_out, compare, rng);
        if level == 0 {
            level_zero_sorted_out = true;
        }
        current_item_count = current_item_count.saturating_sub(promoted_len);

        if was_top {
            current_num_levels += 1;
            target_item_count += level_capacity(k, current_num_levels, 0);
        }

        level += 1;
    }

    levels.truncate(current_num_levels);
    (levels, level_zero_sorted_out)
}

/// Compacts every level that is at or over its own capacity, independent of
/// the sketch's overall occupancy. This is the per-insert hot path: unlike
/// [`general_compress`], it has no "is this globally worth it" gate, because
/// its job is to free the exact slot `insert` just needs, not to decide
/// whether growing a new top level pays for itself yet.
///
/// Loops because promoting survivors into the level above can, in rare
/// cases, push that level over its own capacity too. Bounded by the number
/// of levels: each compaction strictly shrinks the level it acts on to at
/// most one orphan item, so a level already visited can't become a target
/// again without `insert` adding more items first.
pub fn compress_while_updating<T>(
    levels: &mut Vec<Vec<T>>,
    k: u16,
    is_level_zero_sorted: bool,
    compare: &dyn Fn(&T, &T) -> Ordering,
    rng: &mut SmallRng,
) -> bool {
    let mut level_zero_sorted_out = is_level_zero_sorted;
    let mut guard = levels.len() + 1;

    while let Some(level) = find_level_to_compact(levels, k) {
        debug_assert!(guard > 0, "compress_while_updating did not converge");
        guard = guard.saturating_sub(1);

        compact_one_level(levels, level, level_zero_sorted_out, compare, rng);
        if level == 0 {
            level_zero_sorted_out = true;
        }
    }

    level_zero_sorted_out
}
