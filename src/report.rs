//! the render pass - one pure function from uploaded bytes to a report
//!
//! `analyze` owns the whole pipeline: parse, check schema, encode features,
//! fit the regression, fit the survival curve, and build the plot. it holds
//! no state between calls; the hosting layer decides when to run it and what
//! to do with the result.

use serde::Serialize;
use tracing::info;

use crate::{
    data::SurvivalData,
    error::Result,
    features::{self, CoercionReport},
    intake::{FileFormat, RawTable},
    km::{KaplanMeierFitter, KmCurve},
    model::{CoxModel, CoxSummary},
};

/// knobs the hosting layer may tune; defaults mirror the dashboard
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// ridge strength for the regression
    pub penalizer: f64,
    /// rows shown in the raw-data preview
    pub preview_rows: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            penalizer: 0.1,
            preview_rows: 5,
        }
    }
}

/// first rows of the upload, stringified for display
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

/// everything one upload produces
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub preview: Preview,
    pub coercion: CoercionReport,
    pub summary: CoxSummary,
    pub curve: KmCurve,
    pub curve_rows_dropped: usize,
    pub plot_svg: String,
}

/// run the full pipeline over one uploaded file
pub fn analyze(bytes: &[u8], format: FileFormat, options: &AnalyzeOptions) -> Result<Report> {
    let table = RawTable::parse(bytes, format)?;
    table.check_schema()?;

    let preview = Preview {
        headers: table.headers().to_vec(),
        rows: table
            .head(options.preview_rows)
            .iter()
            .map(|row| row.iter().map(|cell| cell.display()).collect())
            .collect(),
        total_rows: table.n_rows(),
    };

    let design = features::build_design_matrix(&table)?;
    let survival = SurvivalData::new(
        design.durations.to_vec(),
        design.events.clone(),
        design.covariates.clone(),
    )?;

    let mut model = CoxModel::new()
        .with_penalizer(options.penalizer)
        .with_feature_names(design.feature_names.clone());
    model.fit(&survival)?;
    let summary = model.summary()?;

    let km_in = features::km_input(&table)?;
    let curve = KaplanMeierFitter::new().fit(&km_in.times, &km_in.events)?;
    let t_max = km_in.times.iter().copied().fold(0.0_f64, f64::max);
    let plot_svg = render_km_svg(&curve, t_max);

    info!(
        rows = preview.total_rows,
        rows_used = design.report.rows_used,
        predictors = summary.rows.len(),
        curve_steps = curve.steps.len(),
        "analysis complete"
    );

    Ok(Report {
        preview,
        coercion: design.report,
        summary,
        curve,
        curve_rows_dropped: km_in.rows_dropped,
        plot_svg,
    })
}

const PLOT_WIDTH: f64 = 720.0;
const PLOT_HEIGHT: f64 = 440.0;
const MARGIN_LEFT: f64 = 64.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 44.0;
const MARGIN_BOTTOM: f64 = 52.0;

/// draw the survival curve as an inline SVG step plot with the fixed labels
/// the dashboard always uses
pub fn render_km_svg(curve: &KmCurve, t_max: f64) -> String {
    let inner_w = PLOT_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let inner_h = PLOT_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let x_max = curve.max_event_time().unwrap_or(0.0).max(t_max).max(1.0) * 1.05;
    let x = |t: f64| MARGIN_LEFT + t / x_max * inner_w;
    let y = |s: f64| MARGIN_TOP + (1.0 - s) * inner_h;

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {PLOT_WIDTH} {PLOT_HEIGHT}" font-family="sans-serif">"#
    ));

    // title + axis labels
    svg.push_str(&format!(
        r##"<text x="{:.1}" y="24" text-anchor="middle" font-size="15" fill="#1f2430">Curva de Supervivencia de Kaplan-Meier</text>"##,
        PLOT_WIDTH / 2.0
    ));
    svg.push_str(&format!(
        r##"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12" fill="#1f2430">Tiempo</text>"##,
        MARGIN_LEFT + inner_w / 2.0,
        PLOT_HEIGHT - 12.0
    ));
    svg.push_str(&format!(
        r##"<text x="16" y="{:.1}" text-anchor="middle" font-size="10" fill="#1f2430" transform="rotate(-90 16 {:.1})">Probabilidad de no haber alcanzado el 100% del desembolso</text>"##,
        MARGIN_TOP + inner_h / 2.0,
        MARGIN_TOP + inner_h / 2.0
    ));

    // horizontal gridlines + y ticks
    for i in 0..=4 {
        let s = i as f64 * 0.25;
        let yy = y(s);
        svg.push_str(&format!(
            r##"<line x1="{:.1}" y1="{yy:.1}" x2="{:.1}" y2="{yy:.1}" stroke="#d8dbe2" stroke-width="1"/>"##,
            MARGIN_LEFT,
            MARGIN_LEFT + inner_w
        ));
        svg.push_str(&format!(
            r##"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="11" fill="#5a5f6e">{s:.2}</text>"##,
            MARGIN_LEFT - 8.0,
            yy + 4.0
        ));
    }

    // x ticks
    for i in 0..=5 {
        let t = x_max * i as f64 / 5.0;
        let xx = x(t);
        svg.push_str(&format!(
            r##"<line x1="{xx:.1}" y1="{:.1}" x2="{xx:.1}" y2="{:.1}" stroke="#9aa0ad" stroke-width="1"/>"##,
            MARGIN_TOP + inner_h,
            MARGIN_TOP + inner_h + 5.0
        ));
        svg.push_str(&format!(
            r##"<text x="{xx:.1}" y="{:.1}" text-anchor="middle" font-size="11" fill="#5a5f6e">{t:.1}</text>"##,
            MARGIN_TOP + inner_h + 18.0
        ));
    }

    // confidence band, stepwise like the curve itself: upper bound forward,
    // lower bound back
    if let (Some(first), Some(last)) = (curve.steps.first(), curve.steps.last()) {
        let steps = &curve.steps;
        let mut points = Vec::new();
        points.push((first.time, first.ci_upper));
        for pair in steps.windows(2) {
            points.push((pair[1].time, pair[0].ci_upper));
            points.push((pair[1].time, pair[1].ci_upper));
        }
        points.push((x_max, last.ci_upper));
        points.push((x_max, last.ci_lower));
        for pair in steps.windows(2).rev() {
            points.push((pair[1].time, pair[1].ci_lower));
            points.push((pair[1].time, pair[0].ci_lower));
        }
        points.push((first.time, first.ci_lower));

        let mut band = String::new();
        for (i, (t, s)) in points.iter().enumerate() {
            let command = if i == 0 { 'M' } else { 'L' };
            band.push_str(&format!("{command}{:.1},{:.1} ", x(*t), y(*s)));
        }
        band.push('Z');
        svg.push_str(&format!(
            r##"<path d="{band}" fill="#3558a6" fill-opacity="0.15" stroke="none"/>"##
        ));
    }

    // the survival step function, starting at S(0) = 1
    let mut path = format!("M{:.1},{:.1}", x(0.0), y(1.0));
    let mut current = 1.0;
    for step in &curve.steps {
        path.push_str(&format!(
            " L{:.1},{:.1} L{:.1},{:.1}",
            x(step.time),
            y(current),
            x(step.time),
            y(step.survival)
        ));
        current = step.survival;
    }
    path.push_str(&format!(" L{:.1},{:.1}", x(x_max), y(current)));
    svg.push_str(&format!(
        r##"<path d="{path}" fill="none" stroke="#3558a6" stroke-width="2"/>"##
    ));

    // axes on top of everything
    svg.push_str(&format!(
        r##"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#1f2430" stroke-width="1.5"/>"##,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + inner_h
    ));
    svg.push_str(&format!(
        r##"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#1f2430" stroke-width="1.5"/>"##,
        MARGIN_LEFT,
        MARGIN_TOP + inner_h,
        MARGIN_LEFT + inner_w,
        MARGIN_TOP + inner_h
    ));

    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SurvivalError;

    const SAMPLE_CSV: &str = "\
NoOperacion,PorcentajeDesembolsado,Meses,Años,Sector,SubSectorNombre,Pais
OP-001,1.0,24,2,Energia,Solar,Peru
OP-002,0.5,12,1,Energia,Eolica,Chile
OP-003,0.8,36,3,Transporte,Vial,Peru
OP-004,1.0,18,1.5,Energia,Solar,Bolivia
OP-005,0.2,6,0.5,Transporte,Vial,Chile
OP-006,0.9,30,2.5,Agua,Riego,Peru
";

    #[test]
    fn analyze_happy_path() {
        let report = analyze(
            SAMPLE_CSV.as_bytes(),
            FileFormat::Csv,
            &AnalyzeOptions::default(),
        )
        .unwrap();

        assert_eq!(report.preview.total_rows, 6);
        assert_eq!(report.preview.rows.len(), 5); // default preview size
        assert_eq!(report.coercion.rows_used, 6);
        assert!(!report.summary.rows.is_empty());
        assert_eq!(report.curve.n, 6);
        assert!(report.plot_svg.contains("Curva de Supervivencia de Kaplan-Meier"));
    }

    #[test]
    fn analyze_is_deterministic() {
        let options = AnalyzeOptions::default();
        let first = analyze(SAMPLE_CSV.as_bytes(), FileFormat::Csv, &options).unwrap();
        let second = analyze(SAMPLE_CSV.as_bytes(), FileFormat::Csv, &options).unwrap();

        assert_eq!(first.summary.rows.len(), second.summary.rows.len());
        for (a, b) in first.summary.rows.iter().zip(second.summary.rows.iter()) {
            assert_eq!(a.coef.to_bits(), b.coef.to_bits());
            assert_eq!(a.se.to_bits(), b.se.to_bits());
        }
        assert_eq!(first.plot_svg, second.plot_svg);
    }

    #[test]
    fn schema_failure_comes_before_any_fit() {
        let csv = "NoOperacion,PorcentajeDesembolsado,Meses,Sector,SubSectorNombre,Pais\nOP-1,0.5,10,A,S,P\n";
        let err = analyze(csv.as_bytes(), FileFormat::Csv, &AnalyzeOptions::default()).unwrap_err();
        assert!(matches!(err, SurvivalError::MissingColumn { .. }));
    }

    #[test]
    fn svg_carries_the_fixed_labels() {
        let curve = KaplanMeierFitter::new()
            .fit(&[1.0, 2.0, 3.0], &[true, true, false])
            .unwrap();
        let svg = render_km_svg(&curve, 3.0);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Tiempo"));
        assert!(svg.contains("Probabilidad de no haber alcanzado el 100% del desembolso"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn svg_handles_an_eventless_curve() {
        let curve = KaplanMeierFitter::new()
            .fit(&[1.0, 2.0], &[false, false])
            .unwrap();
        let svg = render_km_svg(&curve, 2.0);
        assert!(svg.contains("<path"));
    }
}
