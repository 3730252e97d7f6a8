//! penalized partial-likelihood optimization
//!
//! Newton-Raphson on the ridge-penalized Cox partial log-likelihood, with
//! Breslow handling of tied event times. The one-hot design matrices this
//! crate produces are wide and sparse, so every coefficient carries the same
//! ridge penalty; the penalized information matrix is also what the summary
//! table's standard errors come from.

use ndarray::{Array1, Array2};
use tracing::debug;

use crate::data::SurvivalData;
use crate::error::{Result, SurvivalError};

/// Configuration for the Newton-Raphson fit.
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    /// ridge strength applied to every coefficient
    pub penalizer: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            penalizer: 0.1,
            max_iterations: 500,
            tolerance: 1e-7,
        }
    }
}

/// A converged fit: coefficients plus the pieces inference needs.
#[derive(Debug, Clone)]
pub struct CoxFit {
    pub beta: Array1<f64>,
    /// inverse of the penalized observed information at `beta`
    pub covariance: Array2<f64>,
    /// unpenalized partial log-likelihood at `beta`
    pub log_likelihood: f64,
    pub iterations: usize,
}

pub struct CoxOptimizer {
    config: OptimizationConfig,
}

impl CoxOptimizer {
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config }
    }

    pub fn fit(&self, data: &SurvivalData) -> Result<CoxFit> {
        let p = data.n_features();
        let penalizer = self.config.penalizer;
        let mut beta = Array1::zeros(p);
        let mut prev_penalized = f64::NEG_INFINITY;
        let mut log_likelihood = 0.0;
        let mut iterations = 0;

        for iteration in 0..self.config.max_iterations {
            iterations = iteration + 1;
            let (loglik, gradient, hessian) = partial_likelihood_derivatives(data, &beta)?;
            log_likelihood = loglik;

            let penalized = loglik - 0.5 * penalizer * beta.dot(&beta);
            if (penalized - prev_penalized).abs() < self.config.tolerance {
                break;
            }
            if iteration == self.config.max_iterations - 1 {
                return Err(SurvivalError::fit_failed(
                    "Newton-Raphson failed to converge",
                ));
            }

            let penalized_gradient = &gradient - &(penalizer * &beta);
            let information = penalized_information(&hessian, penalizer);

            // Newton step; fall back to a plain gradient step when the
            // information matrix cannot be solved
            let step = match solve_linear_system(&information, &penalized_gradient) {
                Ok(step) => step,
                Err(_) => {
                    let step_size = 0.01;
                    step_size * &penalized_gradient
                }
            };

            // halve the step while it lowers the penalized likelihood - wide
            // one-hot designs can make a raw Newton step overshoot
            let mut scale = 1.0;
            loop {
                let candidate = &beta + &(scale * &step);
                // an overflowing candidate just means the step was too long
                let candidate_penalized = match partial_log_likelihood(data, &candidate) {
                    Ok(ll) => ll - 0.5 * penalizer * candidate.dot(&candidate),
                    Err(_) => f64::NEG_INFINITY,
                };
                if candidate_penalized >= penalized || scale <= 1.0 / 32.0 {
                    beta = candidate;
                    break;
                }
                scale *= 0.5;
            }

            if beta.iter().any(|b| !b.is_finite()) {
                return Err(SurvivalError::numerical_error(
                    "coefficients diverged during optimization",
                ));
            }

            prev_penalized = penalized;
        }

        debug!(iterations, log_likelihood, "Newton-Raphson converged");

        // variance of the estimates: invert the penalized observed
        // information at the optimum. a singular matrix here means the
        // design is rank-deficient even after the ridge.
        let (_, _, hessian) = partial_likelihood_derivatives(data, &beta)?;
        let information = penalized_information(&hessian, penalizer);
        let covariance = invert_symmetric(&information).map_err(|_| {
            SurvivalError::fit_failed(
                "information matrix is singular - the design matrix is rank-deficient",
            )
        })?;

        Ok(CoxFit {
            beta,
            covariance,
            log_likelihood,
            iterations,
        })
    }
}

/// -H + penalizer * I, where H is the partial-likelihood Hessian
fn penalized_information(hessian: &Array2<f64>, penalizer: f64) -> Array2<f64> {
    let mut information = hessian.mapv(|h| -h);
    for i in 0..information.nrows() {
        information[[i, i]] += penalizer;
    }
    information
}

/// Breslow partial log-likelihood alone, for the step-halving check. Same
/// sweep as the derivative computation without the gradient/Hessian work.
fn partial_log_likelihood(data: &SurvivalData, beta: &Array1<f64>) -> Result<f64> {
    let n = data.n_samples();
    let durations = data.durations();
    let events = data.events();
    let covariates = data.covariates();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| durations[b].total_cmp(&durations[a]));

    let mut s0 = 0.0;
    let mut loglik = 0.0;

    let mut i = 0;
    while i < n {
        let time = durations[order[i]];

        let mut j = i;
        while j < n && durations[order[j]] == time {
            let weight = covariates.row(order[j]).dot(beta).exp();
            if !weight.is_finite() || weight <= 0.0 {
                return Err(SurvivalError::numerical_error(format!(
                    "invalid exponential prediction: {weight}"
                )));
            }
            s0 += weight;
            j += 1;
        }

        for &idx in &order[i..j] {
            if events[idx] {
                loglik += covariates.row(idx).dot(beta) - s0.ln();
            }
        }

        i = j;
    }

    Ok(loglik)
}

/// Breslow partial log-likelihood with gradient and Hessian.
///
/// Rows are swept in descending duration order so the risk-set accumulators
/// (S0, S1, S2) grow as time falls; ties enter the risk set before any event
/// at that time is scored, and tied events share one risk set.
pub fn partial_likelihood_derivatives(
    data: &SurvivalData,
    beta: &Array1<f64>,
) -> Result<(f64, Array1<f64>, Array2<f64>)> {
    let n = data.n_samples();
    let p = data.n_features();
    let durations = data.durations();
    let events = data.events();
    let covariates = data.covariates();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| durations[b].total_cmp(&durations[a]));

    let mut s0 = 0.0;
    let mut s1 = Array1::<f64>::zeros(p);
    let mut s2 = Array2::<f64>::zeros((p, p));

    let mut loglik = 0.0;
    let mut gradient = Array1::<f64>::zeros(p);
    let mut hessian = Array2::<f64>::zeros((p, p));

    let mut i = 0;
    while i < n {
        let time = durations[order[i]];

        // everyone tied at this duration joins the risk set first
        let mut j = i;
        while j < n && durations[order[j]] == time {
            let idx = order[j];
            let linear_pred = covariates.row(idx).dot(beta);
            let weight = linear_pred.exp();
            if !weight.is_finite() || weight <= 0.0 {
                return Err(SurvivalError::numerical_error(format!(
                    "invalid exponential prediction: {weight}"
                )));
            }
            s0 += weight;
            for a in 0..p {
                let xa = covariates[[idx, a]];
                s1[a] += weight * xa;
                for b in 0..p {
                    s2[[a, b]] += weight * xa * covariates[[idx, b]];
                }
            }
            j += 1;
        }

        // score the events tied at this time against the shared risk set
        let mut n_events = 0usize;
        let mut event_lp_sum = 0.0;
        let mut event_x_sum = Array1::<f64>::zeros(p);
        for &idx in &order[i..j] {
            if events[idx] {
                n_events += 1;
                event_lp_sum += covariates.row(idx).dot(beta);
                for a in 0..p {
                    event_x_sum[a] += covariates[[idx, a]];
                }
            }
        }

        if n_events > 0 {
            if s0 <= 0.0 {
                return Err(SurvivalError::numerical_error(
                    "risk set sum is non-positive",
                ));
            }
            let d = n_events as f64;
            loglik += event_lp_sum - d * s0.ln();
            for a in 0..p {
                let mean_a = s1[a] / s0;
                gradient[a] += event_x_sum[a] - d * mean_a;
                for b in 0..p {
                    hessian[[a, b]] -= d * (s2[[a, b]] / s0 - mean_a * s1[b] / s0);
                }
            }
        }

        i = j;
    }

    Ok((loglik, gradient, hessian))
}

/// Solve Ax = b by Gaussian elimination with partial pivoting.
fn solve_linear_system(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return Err(SurvivalError::invalid_dimensions(
            "matrix dimensions mismatch",
        ));
    }

    let mut a_copy = a.clone();
    let mut b_copy = b.clone();

    for i in 0..n {
        let mut max_row = i;
        for k in i + 1..n {
            if a_copy[[k, i]].abs() > a_copy[[max_row, i]].abs() {
                max_row = k;
            }
        }

        if a_copy[[max_row, i]].abs() < 1e-12 {
            return Err(SurvivalError::numerical_error("matrix is singular"));
        }

        if max_row != i {
            for j in 0..n {
                a_copy.swap([i, j], [max_row, j]);
            }
            b_copy.swap(i, max_row);
        }

        for k in i + 1..n {
            let factor = a_copy[[k, i]] / a_copy[[i, i]];
            for j in i..n {
                a_copy[[k, j]] -= factor * a_copy[[i, j]];
            }
            b_copy[k] -= factor * b_copy[i];
        }
    }

    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        x[i] = b_copy[i];
        for j in i + 1..n {
            x[i] -= a_copy[[i, j]] * x[j];
        }
        x[i] /= a_copy[[i, i]];
    }

    Ok(x)
}

/// Invert a symmetric matrix via Gauss-Jordan elimination with partial
/// pivoting. Errors instead of regularizing when the matrix is singular.
fn invert_symmetric(a: &Array2<f64>) -> Result<Array2<f64>> {
    let p = a.nrows();
    if p != a.ncols() {
        return Err(SurvivalError::invalid_dimensions("matrix must be square"));
    }

    let width = 2 * p;
    let mut aug = Array2::<f64>::zeros((p, width));
    for i in 0..p {
        for j in 0..p {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, p + i]] = 1.0;
    }

    for col in 0..p {
        let mut max_row = col;
        let mut max_val = aug[[col, col]].abs();
        for row in (col + 1)..p {
            let v = aug[[row, col]].abs();
            if v > max_val {
                max_val = v;
                max_row = row;
            }
        }
        if max_val < 1e-12 {
            return Err(SurvivalError::numerical_error("matrix is singular"));
        }
        if max_row != col {
            for k in 0..width {
                aug.swap([col, k], [max_row, k]);
            }
        }

        let pivot = aug[[col, col]];
        let inv_pivot = 1.0 / pivot;
        for k in 0..width {
            aug[[col, k]] *= inv_pivot;
        }
        for row in 0..p {
            if row == col {
                continue;
            }
            let factor = aug[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..width {
                aug[[row, k]] -= factor * aug[[col, k]];
            }
        }
    }

    let mut inverse = Array2::<f64>::zeros((p, p));
    for i in 0..p {
        for j in 0..p {
            inverse[[i, j]] = aug[[i, p + j]];
        }
    }
    Ok(inverse)
}
