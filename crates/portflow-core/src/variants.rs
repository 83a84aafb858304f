//! # Variant Enumeration
//!
//! Enumerates the Cartesian product of per-slot index ranges.
//!
//! Given `limits = [l0, l1, ...]`, every produced tuple `t` satisfies
//! `0 <= t[i] < limits[i]`, and every such tuple is produced exactly once.
//!
//! Two orderings are available:
//! - **Lexicographic** (mixed radix, slot 0 fastest): `t[0] = k mod l0`,
//!   `t[1] = (k / l0) mod l1`, and so on.
//! - **Snake** (boustrophedon): each slot sweeps up and then back down instead
//!   of wrapping to 0, so consecutive tuples differ by exactly one step in a
//!   single slot.
//!
//! An empty `limits` slice, or any zero limit, yields no tuples.

/// Number of combinations for `limits`, or `None` on overflow.
///
/// Returns `Some(0)` for an empty slice or any zero limit.
#[must_use]
pub fn combination_count(limits: &[usize]) -> Option<usize> {
    if limits.is_empty() {
        return Some(0);
    }
    limits
        .iter()
        .try_fold(1usize, |acc, &limit| acc.checked_mul(limit))
}

/// Lazy lexicographic enumeration of the Cartesian product.
///
/// Yields tuples in mixed-radix order with slot 0 varying fastest.
#[derive(Debug, Clone)]
pub struct VariantIter {
    limits: Vec<usize>,
    current: Option<Vec<usize>>,
}

impl VariantIter {
    #[must_use]
    pub fn new(limits: &[usize]) -> Self {
        let current = if limits.is_empty() || limits.contains(&0) {
            None
        } else {
            Some(vec![0; limits.len()])
        };
        Self {
            limits: limits.to_vec(),
            current,
        }
    }
}

impl Iterator for VariantIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.current.take()?;

        // Odometer increment: bump slot 0, carry into higher slots.
        let mut next = item.clone();
        let mut carried_out = true;
        for (digit, &limit) in next.iter_mut().zip(&self.limits) {
            *digit += 1;
            if *digit < limit {
                carried_out = false;
                break;
            }
            *digit = 0;
        }
        if !carried_out {
            self.current = Some(next);
        }

        Some(item)
    }
}

/// All tuples in lexicographic (mixed-radix, slot 0 fastest) order.
#[must_use]
pub fn variants(limits: &[usize]) -> Vec<Vec<usize>> {
    VariantIter::new(limits).collect()
}

/// All tuples in snake (boustrophedon) order.
///
/// Slot `j` changes every `l0 * ... * l(j-1)` steps and oscillates between
/// `0` and `limits[j] - 1`, repeating the boundary value before turning.
#[must_use]
pub fn snake_variants(limits: &[usize]) -> Vec<Vec<usize>> {
    let total = match combination_count(limits) {
        Some(0) | None => return Vec::new(),
        Some(total) => total,
    };

    let mut divisors = Vec::with_capacity(limits.len());
    let mut stride = 1usize;
    for &limit in limits {
        divisors.push(stride);
        stride = stride.saturating_mul(limit);
    }

    let snakes: Vec<Vec<usize>> = limits
        .iter()
        .zip(&divisors)
        .map(|(&limit, &divisor)| snake_ints(0, limit - 1, total / divisor))
        .collect();

    (0..total)
        .map(|k| {
            snakes
                .iter()
                .zip(&divisors)
                .map(|(snake, &divisor)| snake.get(k / divisor).copied().unwrap_or(0))
                .collect()
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
    Stay,
}

/// Oscillating sequence of `len` integers between `start` and `end`.
///
/// The sequence climbs from `start` to `end`, repeats `end` once, descends to
/// `start`, repeats `start` once, and so on:
/// `snake_ints(0, 2, 8) == [0, 1, 2, 2, 1, 0, 0, 1]`.
#[must_use]
pub fn snake_ints(start: usize, end: usize, len: usize) -> Vec<usize> {
    let mut result = Vec::with_capacity(len);
    let mut current = start;
    let mut direction = Direction::Up;

    for _ in 0..len {
        result.push(current);

        if current == start {
            direction = match direction {
                Direction::Down => Direction::Stay,
                Direction::Stay => Direction::Up,
                Direction::Up => Direction::Up,
            };
        } else if current == end {
            direction = match direction {
                Direction::Up => Direction::Stay,
                Direction::Stay => Direction::Down,
                Direction::Down => Direction::Down,
            };
        }

        match direction {
            Direction::Up if current < end => current += 1,
            Direction::Down if current > start => current -= 1,
            _ => {}
        }
    }
    result
}

// =============================================================================
// TESTS
// =============================================================================
