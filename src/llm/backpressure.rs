//! KV-cache utilization backpressure gate (§4.2 "Backpressure").
//!
//! Each expert backend periodically reports a KV-cache utilization fraction
//! in [0.0, 1.0]; the gateway consults this gate before issuing a request.

use std::time::Duration;

use crate::config::BackpressureConfig;

/// What the caller should do before issuing a request, given current utilization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackpressureDecision {
    Proceed,
    Delay(Duration),
    RetryLater,
}

/// Evaluate the backpressure gate for a single utilization reading.
pub fn evaluate(utilization: f64, config: &BackpressureConfig) -> BackpressureDecision {
    if utilization >= config.retry_later_threshold {
        BackpressureDecision::RetryLater
    } else if utilization >= config.delay_threshold {
        BackpressureDecision::Delay(config.delay)
    } else {
        BackpressureDecision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_utilization_proceeds() {
        let config = BackpressureConfig::default();
        assert_eq!(evaluate(0.1, &config), BackpressureDecision::Proceed);
    }

    #[test]
    fn mid_band_delays() {
        let config = BackpressureConfig::default();
        assert_eq!(evaluate(0.9, &config), BackpressureDecision::Delay(config.delay));
    }

    #[test]
    fn saturated_retries_later() {
        let config = BackpressureConfig::default();
        assert_eq!(evaluate(0.96, &config), BackpressureDecision::RetryLater);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let config = BackpressureConfig::default();
        assert_eq!(evaluate(config.retry_later_threshold, &config), BackpressureDecision::RetryLater);
        assert_eq!(evaluate(config.delay_threshold, &config), BackpressureDecision::Delay(config.delay));
    }
}
