//! # loan survival
//!
//! survival analysis for loan disbursement schedules - upload a spreadsheet of
//! operations, get back a penalized cox regression and a kaplan-meier curve
//! describing time until full disbursement.
//!
//! ## what you get
//!
//! - spreadsheet intake (`.xlsx` / `.csv`) with schema validation up front
//! - event derivation + one-hot encoding w/ dropped reference levels
//! - ridge-penalized cox proportional hazards w/ wald inference
//! - kaplan-meier estimation w/ greenwood confidence bands
//! - a single pure `analyze` pass, plus a small axum dashboard on top
//!
//! ## quick start
//!
//! ```rust
//! use loan_survival::report::{analyze, AnalyzeOptions};
//! use loan_survival::intake::FileFormat;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let csv = "\
//! NoOperacion,PorcentajeDesembolsado,Meses,Años,Sector,SubSectorNombre,Pais
//! OP-001,1.0,24,2,Energia,Solar,Peru
//! OP-002,0.5,12,1,Energia,Eolica,Chile
//! OP-003,0.8,36,3,Transporte,Vial,Peru
//! OP-004,0.3,18,1.5,Agua,Riego,Bolivia
//! ";
//!
//! let report = analyze(csv.as_bytes(), FileFormat::Csv, &AnalyzeOptions::default())?;
//! report.summary.print();
//! println!("curve has {} steps", report.curve.steps.len());
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod features;
pub mod intake;
pub mod km;
pub mod metrics;
pub mod model;
pub mod optimization;
pub mod report;
pub mod stats;
pub mod web;

pub use data::SurvivalData;
pub use error::{Result, SurvivalError};
pub use km::{KaplanMeierFitter, KmCurve};
pub use model::{CoxModel, CoxSummary};
pub use report::{analyze, AnalyzeOptions, Report};
