use serde::{Deserialize, Serialize};
use std::cmp::min;
use std::fmt::{Display, Formatter};

/// The reachability tree label: a closed integer range `[start, end]`.
/// A tree node's interval strictly contains the intervals of all its
/// descendants, hence tree ancestry reduces to interval containment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

impl From<Interval> for (u64, u64) {
    fn from(val: Interval) -> Self {
        (val.start, val.end)
    }
}

impl Interval {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start > 0 && end < u64::MAX && end >= start - 1); // TODO: make sure this is actually debug-only
        Interval { start, end }
    }

    pub fn empty() -> Self {
        Self::new(1, 0)
    }

    /// Returns the maximally allowed interval. The reserved margins on both
    /// sides allow safe "capacity" queries on any node including the root.
    pub fn maximal() -> Self {
        Self::new(1, u64::MAX - 1)
    }

    pub fn size(&self) -> u64 {
        // Empty intervals are indicated by `self.end == self.start - 1`, so
        // we avoid the overflow by order of operations
        (self.end + 1) - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn increase_start(&self, offset: u64) -> Self {
        Self::new(self.start + offset, self.end)
    }

    pub fn decrease_start(&self, offset: u64) -> Self {
        Self::new(self.start - offset, self.end)
    }

    pub fn increase_end(&self, offset: u64) -> Self {
        Self::new(self.start, self.end + offset)
    }

    pub fn decrease_end(&self, offset: u64) -> Self {
        Self::new(self.start, self.end - offset)
    }

    /// Returns whether `other` is contained in this interval
    pub fn contains(&self, other: Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns whether `other` is a proper (strict) subset of this interval
    pub fn strictly_contains(&self, other: Self) -> bool {
        self.start <= other.start && other.end < self.end
    }

    /// Splits this interval to exactly `sizes.len()` parts where
    /// `|part_i| = sizes[i]`. This method expects `sum(sizes)` to be exactly
    /// equal to the interval's size.
    pub fn split_exact(&self, sizes: &[u64]) -> Vec<Self> {
        assert_eq!(sizes.iter().sum::<u64>(), self.size(), "sum of sizes must be equal to the interval's size");
        let mut start = self.start;
        sizes
            .iter()
            .map(|size| {
                let interval = Self::new(start, start + size - 1);
                start += size;
                interval
            })
            .collect()
    }

    /// Splits this interval into two halves
    pub fn split_half(&self) -> (Self, Self) {
        let left_size = (self.size() + 1) / 2;
        let splits = self.split_exact(&[left_size, self.size() - left_size]);
        (splits[0], splits[1])
    }

    /// Splits this interval to `sizes.len()` parts by the allocation rule
    /// below. This method expects `sum(sizes)` to be smaller or equal to the
    /// interval's size. Every part_i is allocated at least sizes[i] capacity.
    /// The remaining budget is split by an exponentially biased rule described
    /// below.
    ///
    /// This rule follows the GHOSTDAG protocol behavior where the child with
    /// the largest subtree is expected to dominate the competition for new
    /// blocks and thus grow the most. However, we may need to add slack for
    /// non-largest subtrees in order to make CPU reindexing attacks unworthy.
    pub fn split_exponential(&self, sizes: &[u64]) -> Vec<Self> {
        let interval_size = self.size();
        let sizes_sum = sizes.iter().sum::<u64>();
        assert!(interval_size >= sizes_sum, "interval's size must be greater than or equal to sum of sizes");
        assert!(sizes_sum > 0, "cannot split to zero parts");
        if interval_size == sizes_sum {
            return self.split_exact(sizes);
        }

        // Add a fractional bias to every size in the provided sizes
        let mut remaining_bias = interval_size - sizes_sum;
        let total_bias = remaining_bias as f64;

        let mut biased_sizes = Vec::<u64>::with_capacity(sizes.len());
        let exp_fractions = exponential_fractions(sizes);
        for (i, fraction) in exp_fractions.iter().enumerate() {
            let bias: u64 = if i == exp_fractions.len() - 1 {
                remaining_bias
            } else {
                min(remaining_bias, (total_bias * fraction).round() as u64)
            };
            biased_sizes.push(sizes[i] + bias);
            remaining_bias -= bias;
        }

        self.split_exact(biased_sizes.as_slice())
    }
}

/// Returns exponential fractions, such that if `size[i] = 2*size[j]`, then
/// `fraction[i] = 2^32*fraction[j]`, i.e., if a subtree is twice as big as
/// its sibling, it is expected to grow exponentially more rapidly
fn exponential_fractions(sizes: &[u64]) -> Vec<f64> {
    let max_size = sizes.iter().copied().max().unwrap_or_default();

    let mut fractions: Vec<f64> = sizes.iter().map(|s| 2f64.powf(32f64 * *s as f64 / max_size as f64)).collect();

    let fractions_sum: f64 = fractions.iter().sum();
    for fraction in fractions.iter_mut() {
        *fraction /= fractions_sum;
    }

    fractions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_basics() {
        let interval = Interval::new(101, 164);
        let increased = interval.increase_start(10);
        let decreased = increased.decrease_start(5);

        assert_eq!(interval.start + 10, increased.start);
        assert_eq!(interval.start + 5, decreased.start);

        assert_eq!(interval.size(), 64);
        assert_eq!(Interval::maximal().size(), u64::MAX - 1);
        assert_eq!(Interval::empty().size(), 0);
        assert!(Interval::empty().is_empty());
    }

    #[test]
    fn test_containment() {
        let parent = Interval::new(10, 100);
        assert!(parent.contains(Interval::new(10, 100)));
        assert!(!parent.strictly_contains(Interval::new(10, 100)));
        assert!(parent.strictly_contains(Interval::new(10, 99)));
        assert!(!parent.contains(Interval::new(9, 100)));
        assert!(!parent.contains(Interval::new(50, 101)));
    }

    #[test]
    fn test_split_exact() {
        let sizes = [5u64, 10, 15, 20];
        let intervals = Interval::new(1, 50).split_exact(&sizes);
        assert_eq!(intervals.len(), sizes.len());
        for i in 0..intervals.len() {
            assert_eq!(intervals[i].size(), sizes[i]);
            if i > 0 {
                assert_eq!(intervals[i - 1].end + 1, intervals[i].start);
            }
        }
    }

    #[test]
    fn test_exponential_fractions() {
        let fractions = exponential_fractions(&[2, 4]);
        assert!((fractions[0] * 2f64.powf(16f64) - fractions[1] * 2f64.powf(-16f64)).abs() < 1e-9);
        assert!((fractions.iter().sum::<f64>() - 1f64).abs() < 1e-9);
    }

    #[test]
    fn test_split_exponential() {
        struct Test {
            interval: Interval,
            sizes: Vec<u64>,
        }

        let tests = [
            Test { interval: Interval::new(1, 100), sizes: vec![100] },
            Test { interval: Interval::new(1, 100), sizes: vec![50, 50] },
            Test { interval: Interval::new(1, 100), sizes: vec![10, 20, 30, 40] },
            Test { interval: Interval::new(1, 100), sizes: vec![25, 25] },
            Test { interval: Interval::new(1, 100), sizes: vec![1, 1] },
            Test { interval: Interval::new(1, 100), sizes: vec![33, 33, 33] },
            Test { interval: Interval::new(1, 10_000), sizes: vec![10, 10, 20] },
            Test { interval: Interval::new(1, 100_000), sizes: vec![31_000, 31_000, 31_001] },
        ];

        for test in &tests {
            let intervals = test.interval.split_exponential(&test.sizes);
            assert_eq!(intervals.len(), test.sizes.len());
            // Full space is allocated, parts are consecutive, and each part
            // is at least as large as requested
            assert_eq!(intervals.iter().map(|i| i.size()).sum::<u64>(), test.interval.size());
            assert_eq!(intervals.first().unwrap().start, test.interval.start);
            assert_eq!(intervals.last().unwrap().end, test.interval.end);
            for (i, interval) in intervals.iter().enumerate() {
                assert!(interval.size() >= test.sizes[i]);
                if i > 0 {
                    assert_eq!(intervals[i - 1].end + 1, interval.start);
                }
            }
        }
    }
}
