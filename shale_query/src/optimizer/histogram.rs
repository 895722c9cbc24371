use crate::predicate::Op;

/// Fixed-width histogram over one integer column. Space and time per
/// value are constant: only the per-bucket counts are kept.
#[derive(Debug, Clone)]
pub struct IntHistogram {
    buckets: Vec<usize>,
    min: i64,
    max: i64,
    width: f64,
    num_values: usize,
}

impl IntHistogram {
    /// `buckets` must be at least 1 (enforced by config validation);
    /// `min..=max` is the range of values the histogram will be fed.
    pub fn new(buckets: usize, min: i32, max: i32) -> Self {
        let buckets = buckets.max(1);
        let (min, max) = (min as i64, max as i64);
        let width = (max - min + 1) as f64 / buckets as f64;
        Self {
            buckets: vec![0; buckets],
            min,
            max,
            width,
            num_values: 0,
        }
    }

    fn bucket_of(&self, v: i64) -> Option<usize> {
        if v < self.min || v > self.max {
            return None;
        }
        let pos = ((v - self.min) as f64 / self.width) as usize;
        Some(pos.min(self.buckets.len() - 1))
    }

    /// Records one value. Values outside `[min, max]` are ignored.
    pub fn add_value(&mut self, v: i32) {
        if let Some(pos) = self.bucket_of(v as i64) {
            self.buckets[pos] += 1;
            self.num_values += 1;
        }
    }

    /// Fraction of recorded values strictly below `v`: full buckets below
    /// the target bucket, plus a linear share of the target bucket.
    fn fraction_below(&self, v: i64) -> f64 {
        if self.num_values == 0 || v <= self.min {
            return 0.0;
        }
        if v > self.max {
            return 1.0;
        }
        let pos = self
            .bucket_of(v)
            .expect("v within range checked above");
        let mut count: f64 = self.buckets[..pos].iter().sum::<usize>() as f64;
        let bucket_left = self.min as f64 + pos as f64 * self.width;
        count += self.buckets[pos] as f64 * ((v as f64 - bucket_left) / self.width);
        count / self.num_values as f64
    }

    /// Estimated selectivity of `column op v`. `Like` has no meaning over
    /// integers and is estimated as equality.
    pub fn estimate(&self, op: Op, v: i32) -> f64 {
        let v = v as i64;
        let est = match op {
            Op::Lt => self.fraction_below(v),
            Op::LtEq => self.fraction_below(v + 1),
            Op::Gt => 1.0 - self.fraction_below(v + 1),
            Op::GtEq => 1.0 - self.fraction_below(v),
            Op::Eq | Op::Like => self.fraction_below(v + 1) - self.fraction_below(v),
            Op::NotEq => 1.0 - (self.fraction_below(v + 1) - self.fraction_below(v)),
        };
        est.clamp(0.0, 1.0)
    }

    pub fn total_values(&self) -> usize {
        self.num_values
    }
}

/// Histogram over a text column: each string maps to a deterministic
/// integer key (its first four bytes, base-128), and estimation delegates
/// to an [`IntHistogram`] spanning the coding's full range.
#[derive(Debug, Clone)]
pub struct StringHistogram {
    inner: IntHistogram,
}

const KEY_PREFIX_LEN: usize = 4;
const KEY_BASE: i64 = 128;
const KEY_MAX: i64 = KEY_BASE * KEY_BASE * KEY_BASE * KEY_BASE - 1;

fn string_key(s: &str) -> i32 {
    let mut key: i64 = 0;
    let bytes = s.as_bytes();
    for i in 0..KEY_PREFIX_LEN {
        let digit = bytes.get(i).map_or(0, |b| (*b).min(127) as i64);
        key = key * KEY_BASE + digit;
    }
    key as i32
}

impl StringHistogram {
    pub fn new(buckets: usize) -> Self {
        Self {
            inner: IntHistogram::new(buckets, 0, KEY_MAX as i32),
        }
    }

    pub fn add_value(&mut self, s: &str) {
        self.inner.add_value(string_key(s));
    }

    /// `Like` cannot be estimated from a prefix coding and is treated as
    /// equality.
    pub fn estimate(&self, op: Op, s: &str) -> f64 {
        self.inner.estimate(op, string_key(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_histogram() -> IntHistogram {
        let mut h = IntHistogram::new(10, 0, 99);
        for v in 0..100 {
            h.add_value(v);
        }
        h
    }

    #[test]
    fn less_than_midpoint_is_about_half() {
        let h = identity_histogram();
        let est = h.estimate(Op::Lt, 50);
        assert!((est - 0.5).abs() < 0.05, "estimate was {}", est);
    }

    #[test]
    fn equality_is_small_but_positive() {
        let h = identity_histogram();
        let est = h.estimate(Op::Eq, 50);
        assert!(est > 0.0 && est < 0.02, "estimate was {}", est);
    }

    #[test]
    fn partition_sums_to_one() {
        let h = identity_histogram();
        for v in [0, 13, 50, 99] {
            let total =
                h.estimate(Op::Lt, v) + h.estimate(Op::Eq, v) + h.estimate(Op::Gt, v);
            assert!((total - 1.0).abs() < 1e-9, "partition at {} was {}", v, total);
        }
    }

    #[test]
    fn range_edges() {
        let h = identity_histogram();
        assert_eq!(h.estimate(Op::Lt, 0), 0.0);
        assert_eq!(h.estimate(Op::Lt, 100), 1.0);
        assert_eq!(h.estimate(Op::Gt, 99), 0.0);
        assert_eq!(h.estimate(Op::GtEq, 0), 1.0);
        assert_eq!(h.estimate(Op::LtEq, 99), 1.0);
    }

    #[test]
    fn out_of_range_values_are_ignored() {
        let mut h = IntHistogram::new(4, 0, 9);
        h.add_value(-5);
        h.add_value(12);
        h.add_value(3);
        assert_eq!(h.total_values(), 1);
    }

    #[test]
    fn empty_histogram_estimates_zero() {
        let h = IntHistogram::new(10, 0, 9);
        assert_eq!(h.estimate(Op::Lt, 5), 0.0);
        assert_eq!(h.estimate(Op::Eq, 5), 0.0);
    }

    #[test]
    fn skewed_distribution_shifts_estimates() {
        let mut h = IntHistogram::new(10, 0, 99);
        for _ in 0..90 {
            h.add_value(5);
        }
        for v in 90..100 {
            h.add_value(v);
        }
        assert!(h.estimate(Op::Lt, 50) > 0.8);
        assert!(h.estimate(Op::Gt, 50) < 0.2);
    }

    #[test]
    fn string_keys_preserve_prefix_order() {
        assert!(string_key("") < string_key("a"));
        assert!(string_key("a") < string_key("b"));
        assert!(string_key("ab") < string_key("ac"));
        assert_eq!(string_key("same"), string_key("same-suffix-ignored"));
    }

    #[test]
    fn string_histogram_orders_by_prefix() {
        let mut h = StringHistogram::new(100);
        for s in ["apple", "banana", "cherry", "mango", "peach"] {
            h.add_value(s);
        }
        assert_eq!(h.estimate(Op::Lt, ""), 0.0);
        assert!(h.estimate(Op::Lt, "zzzz") > 0.9);
        assert!(h.estimate(Op::Eq, "banana") > 0.0);
        assert_eq!(h.estimate(Op::Eq, "AAAA"), 0.0);
    }
}
