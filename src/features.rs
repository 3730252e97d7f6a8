//! feature preparation - event indicator, one-hot encoding, duration coercion
//! and standardization
//!
//! everything the regression needs is assembled here from the raw table. rows
//! the models cannot use (missing disbursement percentage or an unparseable
//! duration) are screened out and *counted*, never silently passed along.

use std::collections::BTreeSet;

use ndarray::{Array1, Array2};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SurvivalError};
use crate::intake::RawTable;

pub const PERCENT_COLUMN: &str = "PorcentajeDesembolsado";
pub const DURATION_COLUMN: &str = "Meses";
pub const YEARS_COLUMN: &str = "Años";
pub const CATEGORICAL_COLUMNS: [&str; 3] = ["Sector", "SubSectorNombre", "Pais"];

/// The event of interest is *failing* to reach full disbursement: a loan at
/// exactly 100% is event-free.
pub fn event_occurred(disbursed_fraction: f64) -> bool {
    disbursed_fraction < 1.0
}

/// Per-run tally of rows that never reached the models.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoercionReport {
    pub rows_total: usize,
    pub rows_used: usize,
    pub dropped_missing_percentage: usize,
    pub dropped_missing_duration: usize,
}

impl CoercionReport {
    pub fn rows_dropped(&self) -> usize {
        self.dropped_missing_percentage + self.dropped_missing_duration
    }
}

/// z-score scaler fit on one upload's duration column, never persisted
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: f64,
    std: f64,
}

impl StandardScaler {
    /// fit on a column (population std, ddof = 0)
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(SurvivalError::invalid_survival_data(
                "can't standardize an empty column",
            ));
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        if std == 0.0 {
            return Err(SurvivalError::numerical_error(
                "duration column has zero variance - can't standardize",
            ));
        }
        Ok(Self { mean, std })
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std(&self) -> f64 {
        self.std
    }
}

/// Encoded design matrix ready for the regression: standardized duration,
/// event indicator, and one dummy column per non-reference category level.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub durations: Array1<f64>,
    pub events: Vec<bool>,
    pub covariates: Array2<f64>,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub report: CoercionReport,
}

impl DesignMatrix {
    pub fn n_rows(&self) -> usize {
        self.durations.len()
    }

    pub fn n_features(&self) -> usize {
        self.covariates.ncols()
    }
}

/// Kaplan-Meier input series. The survival curve is deliberately fit on the
/// raw years column, not the standardized months the regression sees.
#[derive(Debug, Clone)]
pub struct KmInput {
    pub times: Vec<f64>,
    pub events: Vec<bool>,
    pub rows_dropped: usize,
}

/// build the encoded design matrix from the raw table
pub fn build_design_matrix(table: &RawTable) -> Result<DesignMatrix> {
    let percents = table.column(PERCENT_COLUMN)?;
    let months = table.column(DURATION_COLUMN)?;
    let categoricals: Vec<Vec<&crate::intake::Cell>> = CATEGORICAL_COLUMNS
        .iter()
        .map(|name| table.column(name))
        .collect::<Result<_>>()?;

    let mut report = CoercionReport {
        rows_total: table.n_rows(),
        ..Default::default()
    };

    // screen rows: both the percentage and the duration must coerce
    let mut durations_raw = Vec::new();
    let mut events = Vec::new();
    let mut labels: Vec<[Option<String>; 3]> = Vec::new();

    for row in 0..table.n_rows() {
        let Some(pct) = percents[row].as_number() else {
            report.dropped_missing_percentage += 1;
            continue;
        };
        let Some(duration) = months[row].as_number() else {
            report.dropped_missing_duration += 1;
            continue;
        };
        durations_raw.push(duration);
        events.push(event_occurred(pct));
        labels.push([
            categoricals[0][row].as_label(),
            categoricals[1][row].as_label(),
            categoricals[2][row].as_label(),
        ]);
    }
    report.rows_used = durations_raw.len();

    if report.rows_dropped() > 0 {
        warn!(
            dropped = report.rows_dropped(),
            missing_percentage = report.dropped_missing_percentage,
            missing_duration = report.dropped_missing_duration,
            "rows excluded from the design matrix during coercion"
        );
    }

    if report.rows_used == 0 {
        return Err(SurvivalError::invalid_survival_data(
            "no usable rows after coercion - nothing to fit",
        ));
    }

    // category levels come from this upload only; the first (smallest) level
    // of each field is the dropped reference
    let mut feature_names = Vec::new();
    let mut level_offsets: Vec<Vec<(String, usize)>> = Vec::new();
    for (field_idx, field) in CATEGORICAL_COLUMNS.iter().enumerate() {
        let levels: BTreeSet<String> = labels
            .iter()
            .filter_map(|row| row[field_idx].clone())
            .collect();
        let mut offsets = Vec::new();
        for level in levels.iter().skip(1) {
            offsets.push((level.clone(), feature_names.len()));
            feature_names.push(format!("{field}_{level}"));
        }
        level_offsets.push(offsets);
    }

    let n_rows = report.rows_used;
    let n_features = feature_names.len();
    let mut covariates = Array2::zeros((n_rows, n_features));
    for (row_idx, row_labels) in labels.iter().enumerate() {
        for (field_idx, label) in row_labels.iter().enumerate() {
            // a missing categorical encodes as all-zeros for its field
            let Some(label) = label else { continue };
            if let Some((_, col)) = level_offsets[field_idx]
                .iter()
                .find(|(level, _)| level == label)
            {
                covariates[[row_idx, *col]] = 1.0;
            }
        }
    }

    let scaler = StandardScaler::fit(&durations_raw)?;
    let durations = Array1::from(
        durations_raw
            .iter()
            .map(|&d| scaler.transform(d))
            .collect::<Vec<_>>(),
    );

    debug!(
        rows = n_rows,
        features = n_features,
        events = events.iter().filter(|&&e| e).count(),
        "design matrix assembled"
    );

    Ok(DesignMatrix {
        durations,
        events,
        covariates,
        feature_names,
        scaler,
        report,
    })
}

/// build the survival-curve series (raw years + event indicator)
pub fn km_input(table: &RawTable) -> Result<KmInput> {
    let percents = table.column(PERCENT_COLUMN)?;
    let years = table.column(YEARS_COLUMN)?;

    let mut times = Vec::new();
    let mut events = Vec::new();
    let mut rows_dropped = 0usize;
    for row in 0..table.n_rows() {
        match (years[row].as_number(), percents[row].as_number()) {
            (Some(t), Some(pct)) => {
                times.push(t);
                events.push(event_occurred(pct));
            }
            _ => rows_dropped += 1,
        }
    }

    if rows_dropped > 0 {
        warn!(rows_dropped, "rows excluded from the survival curve series");
    }

    Ok(KmInput {
        times,
        events,
        rows_dropped,
    })
}
