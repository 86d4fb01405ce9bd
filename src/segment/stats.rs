use std::fmt;

use serde::Serialize;

/// Running count/min/max/sum over a sequence of observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    count: u64,
    min: Option<i64>,
    max: Option<i64>,
    sum: i64,
}

impl SummaryStats {
    pub fn new() -> SummaryStats {
        SummaryStats::default()
    }

    pub fn accept(&mut self, value: i64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Option<i64> {
        self.min
    }

    pub fn max(&self) -> Option<i64> {
        self.max
    }

    pub fn sum(&self) -> i64 {
        self.sum
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum as f64 / self.count as f64)
        }
    }
}

impl fmt::Display for SummaryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max, self.mean()) {
            (Some(min), Some(max), Some(mean)) => write!(
                f,
                "count={} min={} max={} sum={} mean={:.1}",
                self.count, min, max, self.sum, mean
            ),
            _ => write!(f, "count=0"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let stats = SummaryStats::new();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.min(), None);
        assert_eq!(stats.max(), None);
        assert_eq!(stats.sum(), 0);
        assert_eq!(stats.mean(), None);
        assert_eq!(stats.to_string(), "count=0");
    }

    #[test]
    fn test_single_observation() {
        let mut stats = SummaryStats::new();
        stats.accept(5);
        assert_eq!(stats.count(), 1);
        assert_eq!(stats.min(), Some(5));
        assert_eq!(stats.max(), Some(5));
        assert_eq!(stats.sum(), 5);
        assert_eq!(stats.mean(), Some(5.0));
    }

    #[test]
    fn test_multiple_observations() {
        let mut stats = SummaryStats::new();
        for v in [3, -1, 4, 0] {
            stats.accept(v);
        }
        assert_eq!(stats.count(), 4);
        assert_eq!(stats.min(), Some(-1));
        assert_eq!(stats.max(), Some(4));
        assert_eq!(stats.sum(), 6);
        assert_eq!(stats.mean(), Some(1.5));
        assert_eq!(stats.to_string(), "count=4 min=-1 max=4 sum=6 mean=1.5");
    }
}
