//! kaplan-meier estimation
//!
//! non-parametric survival curve over the raw years-to-event column. one step
//! per distinct event time, with Greenwood pointwise variance and clamped
//! confidence bounds. censoring only thins the risk set; it never moves the
//! curve.

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SurvivalError};
use crate::stats;

/// A single step of the survival curve.
#[derive(Debug, Clone, Serialize)]
pub struct KmStep {
    /// event time
    pub time: f64,
    /// estimated survival probability just after `time`
    pub survival: f64,
    /// Greenwood pointwise standard error
    pub se: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    /// subjects still at risk entering this time
    pub at_risk: usize,
    /// events at this time
    pub n_events: usize,
}

/// Fitted survival curve.
#[derive(Debug, Clone, Serialize)]
pub struct KmCurve {
    pub steps: Vec<KmStep>,
    pub n: usize,
    pub n_events: usize,
}

impl KmCurve {
    /// survival probability at time `t` (step function, right-continuous)
    pub fn survival_at(&self, t: f64) -> f64 {
        let mut survival = 1.0;
        for step in &self.steps {
            if step.time > t {
                break;
            }
            survival = step.survival;
        }
        survival
    }

    /// largest observed event time, if any event occurred
    pub fn max_event_time(&self) -> Option<f64> {
        self.steps.last().map(|s| s.time)
    }
}

/// Kaplan-Meier estimator, lifecycle-free: configure, call `fit`, read the
/// returned curve.
#[derive(Debug, Clone)]
pub struct KaplanMeierFitter {
    conf_level: f64,
}

impl Default for KaplanMeierFitter {
    fn default() -> Self {
        Self { conf_level: 0.95 }
    }
}

impl KaplanMeierFitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conf_level(mut self, conf_level: f64) -> Self {
        self.conf_level = conf_level;
        self
    }

    pub fn fit(&self, times: &[f64], events: &[bool]) -> Result<KmCurve> {
        let n = times.len();
        if n == 0 {
            return Err(SurvivalError::invalid_survival_data(
                "duration series is empty",
            ));
        }
        if events.len() != n {
            return Err(SurvivalError::invalid_dimensions(format!(
                "times len ({}) != events len ({})",
                n,
                events.len()
            )));
        }
        if times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(SurvivalError::invalid_survival_data(
                "survival times must be finite and non-negative",
            ));
        }
        if !(self.conf_level > 0.0 && self.conf_level < 1.0) {
            return Err(SurvivalError::numerical_error(
                "confidence level must be in (0, 1)",
            ));
        }

        // ascending sweep: the risk set shrinks as time passes
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

        let z = stats::normal_quantile(1.0 - (1.0 - self.conf_level) / 2.0);

        let mut steps = Vec::new();
        let mut at_risk = n;
        let mut survival = 1.0_f64;
        let mut greenwood_sum = 0.0_f64;
        let mut n_events_total = 0usize;

        let mut i = 0;
        while i < n {
            let time = times[order[i]];

            // tally events and censorings tied at this time
            let mut d = 0usize;
            let mut c = 0usize;
            let mut j = i;
            while j < n && times[order[j]] == time {
                if events[order[j]] {
                    d += 1;
                } else {
                    c += 1;
                }
                j += 1;
            }

            if d > 0 {
                let nk = at_risk as f64;
                survival *= 1.0 - d as f64 / nk;
                if at_risk > d {
                    greenwood_sum += d as f64 / (nk * (nk - d as f64));
                }
                let se = if survival > 0.0 {
                    survival * greenwood_sum.sqrt()
                } else {
                    0.0
                };
                steps.push(KmStep {
                    time,
                    survival,
                    se,
                    ci_lower: (survival - z * se).max(0.0),
                    ci_upper: (survival + z * se).min(1.0),
                    at_risk,
                    n_events: d,
                });
                n_events_total += d;
            }

            at_risk -= d + c;
            i = j;
        }

        debug!(
            n,
            events = n_events_total,
            steps = steps.len(),
            "kaplan-meier curve fitted"
        );

        Ok(KmCurve {
            steps,
            n,
            n_events: n_events_total,
        })
    }
}
