use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{Result, SurvivalError};

/// survival observations - durations, event flags, and encoded predictors
///
/// the partial likelihood only ever looks at the *ordering* of durations, so
/// a standardized (zero-mean) duration column is a perfectly good input here.
/// durations just have to be finite.
#[derive(Debug, Clone)]
pub struct SurvivalData {
    durations: Array1<f64>,  // time to event/censoring, any finite scale
    events: Vec<bool>,       // true = event, false = censored
    covariates: Array2<f64>, // encoded predictors (n_samples x n_features)
}

impl SurvivalData {
    pub fn new(durations: Vec<f64>, events: Vec<bool>, covariates: Array2<f64>) -> Result<Self> {
        let n_samples = durations.len();

        if n_samples == 0 {
            return Err(SurvivalError::invalid_survival_data(
                "duration series is empty",
            ));
        }

        if events.len() != n_samples {
            return Err(SurvivalError::invalid_dimensions(format!(
                "durations len ({}) != events len ({})",
                n_samples,
                events.len()
            )));
        }

        if covariates.nrows() != n_samples {
            return Err(SurvivalError::invalid_dimensions(format!(
                "covariates rows ({}) != n_samples ({})",
                covariates.nrows(),
                n_samples
            )));
        }

        if durations.iter().any(|t| !t.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(
                "durations must be finite",
            ));
        }

        if covariates.iter().any(|x| !x.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(
                "covariates must be finite",
            ));
        }

        if !events.iter().any(|&e| e) {
            return Err(SurvivalError::invalid_survival_data(
                "no events observed - the partial likelihood is undefined",
            ));
        }

        Ok(Self {
            durations: Array1::from(durations),
            events,
            covariates,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.durations.len()
    }

    pub fn n_features(&self) -> usize {
        self.covariates.ncols()
    }

    pub fn n_events(&self) -> usize {
        self.events.iter().filter(|&&e| e).count()
    }

    pub fn durations(&self) -> ArrayView1<'_, f64> {
        self.durations.view()
    }

    /// event indicators (true = event, false = censored)
    pub fn events(&self) -> &[bool] {
        &self.events
    }

    pub fn covariates(&self) -> ArrayView2<'_, f64> {
        self.covariates.view()
    }

    /// unique event times, ascending
    pub fn event_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .durations
            .iter()
            .zip(self.events.iter())
            .filter_map(|(t, e)| if *e { Some(*t) } else { None })
            .collect();
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();
        times
    }
}
