use loan_survival::features::{build_design_matrix, km_input};
use loan_survival::intake::{FileFormat, RawTable};
use loan_survival::report::{analyze, AnalyzeOptions};
use loan_survival::SurvivalError;

use approx::assert_relative_eq;

const HEADER: &str = "NoOperacion,PorcentajeDesembolsado,Meses,Años,Sector,SubSectorNombre,Pais\n";

fn csv(rows: &[&str]) -> Vec<u8> {
    let mut out = String::from(HEADER);
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out.into_bytes()
}

/// a realistic little portfolio: three sectors, three countries, a mix of
/// fully and partially disbursed operations
fn sample_portfolio() -> Vec<u8> {
    csv(&[
        "OP-001,1.0,24,2.0,Energia,Solar,Peru",
        "OP-002,0.45,12,1.0,Energia,Eolica,Chile",
        "OP-003,0.80,36,3.0,Transporte,Vial,Peru",
        "OP-004,1.0,18,1.5,Energia,Solar,Bolivia",
        "OP-005,0.20,6,0.5,Transporte,Vial,Chile",
        "OP-006,0.90,30,2.5,Agua,Riego,Peru",
        "OP-007,1.0,48,4.0,Agua,Riego,Bolivia",
        "OP-008,0.65,20,1.7,Energia,Solar,Chile",
        "OP-009,0.30,9,0.75,Transporte,Ferroviario,Peru",
        "OP-010,1.0,40,3.3,Energia,Eolica,Bolivia",
        "OP-011,0.55,15,1.25,Agua,Saneamiento,Chile",
        "OP-012,0.75,27,2.25,Transporte,Vial,Bolivia",
        "OP-013,1.0,33,2.75,Energia,Solar,Peru",
        "OP-014,0.10,3,0.25,Agua,Riego,Chile",
        "OP-015,0.85,21,1.75,Transporte,Ferroviario,Bolivia",
        "OP-016,0.95,42,3.5,Energia,Eolica,Peru",
        "OP-017,1.0,28,2.3,Agua,Saneamiento,Peru",
        "OP-018,0.40,14,1.2,Energia,Solar,Bolivia",
        "OP-019,0.70,22,1.8,Transporte,Vial,Chile",
        "OP-020,0.25,8,0.6,Agua,Riego,Bolivia",
    ])
}

#[test]
fn full_pipeline_on_clean_portfolio() {
    let bytes = sample_portfolio();
    let report = analyze(&bytes, FileFormat::Csv, &AnalyzeOptions::default()).unwrap();

    assert_eq!(report.preview.total_rows, 20);
    assert_eq!(report.preview.rows.len(), 5);
    assert_eq!(report.coercion.rows_used, 20);
    assert_eq!(report.coercion.rows_dropped(), 0);

    // every summary row carries the standard report columns
    assert!(!report.summary.rows.is_empty());
    for row in &report.summary.rows {
        assert!(row.coef.is_finite());
        assert_relative_eq!(row.exp_coef, row.coef.exp(), epsilon = 1e-12);
        assert!(row.se > 0.0);
        assert!(row.ci_lower <= row.coef && row.coef <= row.ci_upper);
        assert!(row.p >= 0.0 && row.p <= 1.0);
    }

    // the curve is a proper step function over the years column
    assert_eq!(report.curve.n, 20);
    assert!(report.curve.n_events > 0);
    for pair in report.curve.steps.windows(2) {
        assert!(pair[1].survival <= pair[0].survival);
    }

    assert!(report.plot_svg.contains("Curva de Supervivencia de Kaplan-Meier"));
    assert!(report.plot_svg.contains("Tiempo"));
}

#[test]
fn event_indicator_boundary_is_strict() {
    // exactly 100% disbursed is event-free; anything below is an event
    let bytes = csv(&[
        "OP-1,1.0,10,1,A,S,P",
        "OP-2,0.999,20,2,A,S,P",
        "OP-3,1.2,30,3,B,S,P",
        "OP-4,0.0,40,4,B,S,P",
    ]);
    let table = RawTable::parse(&bytes, FileFormat::Csv).unwrap();
    let design = build_design_matrix(&table).unwrap();
    assert_eq!(design.events, vec![false, true, false, true]);
}

#[test]
fn one_hot_layout_matches_distinct_levels_minus_one() {
    let bytes = sample_portfolio();
    let table = RawTable::parse(&bytes, FileFormat::Csv).unwrap();
    let design = build_design_matrix(&table).unwrap();

    // Sector: Agua/Energia/Transporte -> 2; SubSector: Eolica/Ferroviario/
    // Riego/Saneamiento/Solar/Vial -> 5; Pais: Bolivia/Chile/Peru -> 2
    assert_eq!(design.n_features(), 9);
    let sector_cols = design
        .feature_names
        .iter()
        .filter(|n| n.starts_with("Sector_"))
        .count();
    let subsector_cols = design
        .feature_names
        .iter()
        .filter(|n| n.starts_with("SubSectorNombre_"))
        .count();
    let pais_cols = design
        .feature_names
        .iter()
        .filter(|n| n.starts_with("Pais_"))
        .count();
    assert_eq!((sector_cols, subsector_cols, pais_cols), (2, 5, 2));

    // dummies are 0/1 and no row is all-ones within a field
    assert!(design.covariates.iter().all(|&v| v == 0.0 || v == 1.0));
}

#[test]
fn three_row_portfolio_encodes_one_dummy() {
    let bytes = csv(&[
        "OP-1,1.0,10,1,A,S,P",
        "OP-2,0.5,20,2,A,S,P",
        "OP-3,1.0,30,3,B,S,P",
    ]);
    let table = RawTable::parse(&bytes, FileFormat::Csv).unwrap();
    let design = build_design_matrix(&table).unwrap();

    assert_eq!(design.events, vec![false, true, false]);
    assert_eq!(design.feature_names, vec!["Sector_B"]);
    assert_eq!(design.covariates.column(0).to_vec(), vec![0.0, 0.0, 1.0]);
}

#[test]
fn standardized_duration_is_zero_mean_unit_variance() {
    let bytes = sample_portfolio();
    let table = RawTable::parse(&bytes, FileFormat::Csv).unwrap();
    let design = build_design_matrix(&table).unwrap();

    let n = design.durations.len() as f64;
    let mean = design.durations.sum() / n;
    let std = (design.durations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n).sqrt();
    assert_relative_eq!(mean, 0.0, epsilon = 1e-10);
    assert_relative_eq!(std, 1.0, epsilon = 1e-10);
}

#[test]
fn reanalyzing_the_same_bytes_is_bit_identical() {
    let bytes = sample_portfolio();
    let options = AnalyzeOptions::default();
    let first = analyze(&bytes, FileFormat::Csv, &options).unwrap();
    let second = analyze(&bytes, FileFormat::Csv, &options).unwrap();

    assert_eq!(first.summary.rows.len(), second.summary.rows.len());
    for (a, b) in first.summary.rows.iter().zip(second.summary.rows.iter()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.coef.to_bits(), b.coef.to_bits());
        assert_eq!(a.se.to_bits(), b.se.to_bits());
        assert_eq!(a.p.to_bits(), b.p.to_bits());
    }
    for (a, b) in first.curve.steps.iter().zip(second.curve.steps.iter()) {
        assert_eq!(a.survival.to_bits(), b.survival.to_bits());
    }
}

#[test]
fn unparseable_duration_is_reported_not_silent() {
    let bytes = csv(&[
        "OP-1,0.5,10,1,A,S,P",
        "OP-2,0.5,N/A,2,A,S,P",
        "OP-3,0.5,30,3,B,S,P",
        "OP-4,1.0,40,4,B,S,P",
    ]);
    let report = analyze(&bytes, FileFormat::Csv, &AnalyzeOptions::default()).unwrap();

    // the bad row is excluded from the regression but counted...
    assert_eq!(report.coercion.rows_total, 4);
    assert_eq!(report.coercion.rows_used, 3);
    assert_eq!(report.coercion.dropped_missing_duration, 1);
    // ...while the survival curve, which reads the years column, keeps it
    assert_eq!(report.curve.n, 4);
}

#[test]
fn header_only_upload_fails_both_fits() {
    let bytes = csv(&[]);
    let err = analyze(&bytes, FileFormat::Csv, &AnalyzeOptions::default()).unwrap_err();
    assert!(matches!(err, SurvivalError::InvalidSurvivalData { .. }));
}

#[test]
fn missing_years_column_is_a_schema_error() {
    let bytes = b"NoOperacion,PorcentajeDesembolsado,Meses,Sector,SubSectorNombre,Pais\n\
                  OP-1,0.5,10,A,S,P\n"
        .to_vec();
    let err = analyze(&bytes, FileFormat::Csv, &AnalyzeOptions::default()).unwrap_err();
    match err {
        SurvivalError::MissingColumn { column } => assert_eq!(column, "Años"),
        other => panic!("expected MissingColumn, got {other:?}"),
    }
}

#[test]
fn fully_disbursed_portfolio_has_no_events_and_fails() {
    let bytes = csv(&[
        "OP-1,1.0,10,1,A,S,P",
        "OP-2,1.0,20,2,A,S,P",
        "OP-3,1.0,30,3,B,S,P",
    ]);
    let err = analyze(&bytes, FileFormat::Csv, &AnalyzeOptions::default()).unwrap_err();
    assert!(matches!(err, SurvivalError::InvalidSurvivalData { .. }));
}

#[test]
fn km_series_reads_years_not_months() {
    let bytes = csv(&[
        "OP-1,0.5,120,10,A,S,P",
        "OP-2,1.0,60,5,A,S,P",
        "OP-3,0.7,24,2,B,S,P",
    ]);
    let table = RawTable::parse(&bytes, FileFormat::Csv).unwrap();
    let input = km_input(&table).unwrap();
    assert_eq!(input.times, vec![10.0, 5.0, 2.0]);
    assert_eq!(input.events, vec![true, false, true]);

    let report = analyze(&bytes, FileFormat::Csv, &AnalyzeOptions::default()).unwrap();
    let max_step = report.curve.max_event_time().unwrap();
    assert!(max_step <= 10.0, "curve must run on the years scale");
}

#[test]
fn penalizer_option_reaches_the_model() {
    let bytes = sample_portfolio();
    let light = analyze(
        &bytes,
        FileFormat::Csv,
        &AnalyzeOptions { penalizer: 0.1, ..Default::default() },
    )
    .unwrap();
    let heavy = analyze(
        &bytes,
        FileFormat::Csv,
        &AnalyzeOptions { penalizer: 50.0, ..Default::default() },
    )
    .unwrap();

    let light_norm: f64 = light.summary.rows.iter().map(|r| r.coef * r.coef).sum();
    let heavy_norm: f64 = heavy.summary.rows.iter().map(|r| r.coef * r.coef).sum();
    assert!(heavy_norm < light_norm);
    assert_relative_eq!(heavy.summary.penalizer, 50.0, epsilon = 1e-12);
}
