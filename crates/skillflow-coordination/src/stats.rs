//! Running counters for executor dispatch decisions

use serde::{Deserialize, Serialize};

/// Dispatch counters kept by one executor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorStats {
    /// Calls received; a batch counts once
    pub total_requests: u64,
    /// Calls completed through a coordinated workflow
    pub coordinated_count: u64,
    /// Calls that ran each request directly
    pub independent_count: u64,
    /// Calls that fell back to the degrader
    pub degraded_count: u64,
    /// Coordinated attempts that failed at the orchestration level
    pub coordination_failure_count: u64,
}

impl ExecutorStats {
    /// Share of calls completed through coordination, in percent.
    pub fn coordination_success_rate(&self) -> f64 {
        self.percent_of_total(self.coordinated_count)
    }

    /// Share of calls that were degraded, in percent.
    pub fn degradation_rate(&self) -> f64 {
        self.percent_of_total(self.degraded_count)
    }

    fn percent_of_total(&self, count: u64) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        count as f64 / self.total_requests as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_without_requests() {
        let stats = ExecutorStats::default();
        assert!(stats.coordination_success_rate().abs() < f64::EPSILON);
        assert!(stats.degradation_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_rates() {
        let stats = ExecutorStats {
            total_requests: 4,
            coordinated_count: 2,
            independent_count: 1,
            degraded_count: 1,
            coordination_failure_count: 1,
        };
        assert!((stats.coordination_success_rate() - 50.0).abs() < f64::EPSILON);
        assert!((stats.degradation_rate() - 25.0).abs() < f64::EPSILON);
    }
}
