//! Token usage accounting for a single generation call.
//!
//! A [`UsageTracker`] is started before the call, fed whatever usage the
//! remote endpoint reports while the response streams, and read once the
//! stream is exhausted to produce a [`UsageReport`].

use std::fmt;

use serde::Deserialize;

/// Token counts reported by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounters {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UsageCounters {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// USD per thousand tokens.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CostRates {
    pub per_thousand_prompt: f64,
    pub per_thousand_completion: f64,
}

/// Claude 3.5 Sonnet on-demand pricing.
pub const CLAUDE_3_5_SONNET_RATES: CostRates = CostRates {
    per_thousand_prompt: 0.003,
    per_thousand_completion: 0.015,
};

impl Default for CostRates {
    fn default() -> Self {
        CLAUDE_3_5_SONNET_RATES
    }
}

/// Collects usage while a request is in flight.
#[derive(Debug, Default)]
pub struct UsageTracker {
    counters: UsageCounters,
    reports: usize,
}

impl UsageTracker {
    pub fn begin() -> Self {
        Self::default()
    }

    /// Adds a usage report from the endpoint. Bedrock sends one per call, at
    /// the end of the stream.
    pub fn record(&mut self, usage: UsageCounters) {
        self.counters.prompt_tokens += usage.prompt_tokens;
        self.counters.completion_tokens += usage.completion_tokens;
        self.reports += 1;
    }

    /// True once at least one usage report has been recorded.
    pub fn has_reports(&self) -> bool {
        self.reports > 0
    }

    pub fn counters(&self) -> UsageCounters {
        self.counters
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageReport {
    pub counters: UsageCounters,
    pub input_cost: f64,
    pub output_cost: f64,
}

impl UsageReport {
    pub fn new(counters: UsageCounters, rates: &CostRates) -> Self {
        Self {
            counters,
            input_cost: counters.prompt_tokens as f64 / 1000.0 * rates.per_thousand_prompt,
            output_cost: counters.completion_tokens as f64 / 1000.0
                * rates.per_thousand_completion,
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.input_cost + self.output_cost
    }
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tokens: prompt:({}/{:.6}), completion:({}/{:.6}), total:({}/{:.6})",
            self.counters.prompt_tokens,
            self.input_cost,
            self.counters.completion_tokens,
            self.output_cost,
            self.counters.total_tokens(),
            self.total_cost()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_uses_default_rates() {
        let report = UsageReport::new(UsageCounters::new(1000, 200), &CostRates::default());

        assert!((report.input_cost - 0.003).abs() < 1e-12);
        assert!((report.output_cost - 0.003).abs() < 1e-12);
        assert!((report.total_cost() - 0.006).abs() < 1e-12);
        assert_eq!(
            report.to_string(),
            "Tokens: prompt:(1000/0.003000), completion:(200/0.003000), total:(1200/0.006000)"
        );
    }

    #[test]
    fn report_honours_custom_rates() {
        let rates = CostRates {
            per_thousand_prompt: 0.25,
            per_thousand_completion: 1.25,
        };
        let report = UsageReport::new(UsageCounters::new(2000, 4000), &rates);
        assert_eq!(
            report.to_string(),
            "Tokens: prompt:(2000/0.500000), completion:(4000/5.000000), total:(6000/5.500000)"
        );
    }

    #[test]
    fn tracker_starts_empty_and_accumulates() {
        let mut tracker = UsageTracker::begin();
        assert!(!tracker.has_reports());
        assert_eq!(tracker.counters(), UsageCounters::default());

        tracker.record(UsageCounters::new(10, 5));
        tracker.record(UsageCounters::new(1, 2));
        assert!(tracker.has_reports());
        assert_eq!(tracker.counters(), UsageCounters::new(11, 7));
        assert_eq!(tracker.counters().total_tokens(), 18);
    }

    #[test]
    fn zero_usage_costs_nothing() {
        let report = UsageReport::new(UsageCounters::default(), &CostRates::default());
        assert_eq!(
            report.to_string(),
            "Tokens: prompt:(0/0.000000), completion:(0/0.000000), total:(0/0.000000)"
        );
    }
}
