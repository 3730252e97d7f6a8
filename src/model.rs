use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::Serialize;

use crate::{
    data::SurvivalData,
    error::{Result, SurvivalError},
    metrics,
    optimization::{CoxFit, CoxOptimizer, OptimizationConfig},
    stats,
};

/// proportional-hazards regression w/ ridge penalization
///
/// the penalizer stabilizes the many one-hot coefficients a categorical-heavy
/// design matrix produces. builder-style configuration, `fit` does the work.
#[derive(Debug, Clone)]
pub struct CoxModel {
    penalizer: f64,
    max_iterations: usize,
    tolerance: f64,
    feature_names: Option<Vec<String>>,
    fit_result: Option<CoxFit>,
    concordance: Option<f64>,
    n_observations: usize,
    n_events: usize,
}

impl Default for CoxModel {
    fn default() -> Self {
        Self {
            penalizer: 0.1,
            max_iterations: 500,
            tolerance: 1e-7,
            feature_names: None,
            fit_result: None,
            concordance: None,
            n_observations: 0,
            n_events: 0,
        }
    }
}

impl CoxModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// ridge penalty on every coefficient
    pub fn with_penalizer(mut self, penalizer: f64) -> Self {
        self.penalizer = penalizer.max(0.0);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// give names to your predictors for a readable summary
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    /// fit the model - this does the actual work
    pub fn fit(&mut self, data: &SurvivalData) -> Result<&mut Self> {
        let config = OptimizationConfig {
            penalizer: self.penalizer,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        };

        let optimizer = CoxOptimizer::new(config);
        let fit = optimizer.fit(data)?;

        let risk_scores = data.covariates().dot(&fit.beta);
        self.concordance =
            metrics::harrell_c_index(risk_scores.view(), data.durations(), data.events()).ok();
        self.n_observations = data.n_samples();
        self.n_events = data.n_events();
        self.fit_result = Some(fit);

        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        self.fit_result.is_some()
    }

    pub fn penalizer(&self) -> f64 {
        self.penalizer
    }

    fn fit_result(&self) -> Result<&CoxFit> {
        self.fit_result.as_ref().ok_or(SurvivalError::ModelNotFitted)
    }

    /// fitted coefficients (betas)
    pub fn coefficients(&self) -> Result<ArrayView1<'_, f64>> {
        Ok(self.fit_result()?.beta.view())
    }

    /// linear predictors (risk scores) for new rows
    pub fn predict(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        let fit = self.fit_result()?;
        if covariates.ncols() != fit.beta.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "feature count mismatch: expected {}, got {}",
                fit.beta.len(),
                covariates.ncols()
            )));
        }
        Ok(covariates.dot(&fit.beta))
    }

    /// hazard ratios (exp of risk scores)
    pub fn predict_hazard_ratios(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict(covariates)?.mapv(f64::exp))
    }

    /// build the regression report: one row per predictor with the usual
    /// columns (coef, exp(coef), se, CI bounds, z, p)
    pub fn summary(&self) -> Result<CoxSummary> {
        let fit = self.fit_result()?;
        let z_crit = stats::normal_quantile(0.975);

        let mut rows = Vec::with_capacity(fit.beta.len());
        for i in 0..fit.beta.len() {
            let coef = fit.beta[i];
            let se = fit.covariance[[i, i]].max(0.0).sqrt();
            let z = if se > 0.0 { coef / se } else { f64::NAN };
            let name = match &self.feature_names {
                Some(names) => names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("x{i}")),
                None => format!("x{i}"),
            };
            rows.push(CoxSummaryRow {
                name,
                coef,
                exp_coef: coef.exp(),
                se,
                ci_lower: coef - z_crit * se,
                ci_upper: coef + z_crit * se,
                z,
                p: stats::wald_p_value(z),
            });
        }

        Ok(CoxSummary {
            rows,
            penalizer: self.penalizer,
            log_likelihood: fit.log_likelihood,
            concordance: self.concordance,
            n_observations: self.n_observations,
            n_events: self.n_events,
        })
    }
}

/// the fitted-model report, rendered as-is by the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct CoxSummary {
    pub rows: Vec<CoxSummaryRow>,
    pub penalizer: f64,
    pub log_likelihood: f64,
    pub concordance: Option<f64>,
    pub n_observations: usize,
    pub n_events: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoxSummaryRow {
    pub name: String,
    pub coef: f64,
    pub exp_coef: f64,
    pub se: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub z: f64,
    pub p: f64,
}

impl CoxSummary {
    /// print what the model learned
    pub fn print(&self) {
        println!("cox proportional hazards summary");
        println!("================================");
        println!("penalizer: {:.4}", self.penalizer);
        println!(
            "observations: {}   events: {}   partial log-likelihood: {:.4}",
            self.n_observations, self.n_events, self.log_likelihood
        );
        if let Some(c) = self.concordance {
            println!("concordance: {c:.4}");
        }
        println!();
        println!(
            "{:<28} {:>10} {:>10} {:>8} {:>9} {:>9} {:>7} {:>8}",
            "covariate", "coef", "exp(coef)", "se", "ci lower", "ci upper", "z", "p"
        );
        for row in &self.rows {
            println!(
                "{:<28} {:>10.4} {:>10.4} {:>8.4} {:>9.4} {:>9.4} {:>7.2} {:>8.4}",
                row.name, row.coef, row.exp_coef, row.se, row.ci_lower, row.ci_upper, row.z, row.p
            );
        }
    }
}
