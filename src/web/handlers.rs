//! Dashboard handlers - upload page and the analyze endpoint.

use axum::{
    extract::{Multipart, State},
    response::Html,
};
use tracing::{error, info};

use crate::intake::FileFormat;
use crate::report::{analyze, Report};

use super::state::SharedState;

pub async fn index() -> Html<String> {
    Html(render_page(None))
}

pub async fn analyze_upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Html<String> {
    // pull the uploaded spreadsheet out of the form
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            match field.bytes().await {
                Ok(bytes) => upload = Some((filename, bytes.to_vec())),
                Err(e) => {
                    return Html(render_page(Some(Err(format!("upload failed: {e}")))))
                }
            }
        }
    }

    let Some((filename, bytes)) = upload else {
        return Html(render_page(Some(Err("no file was uploaded".to_string()))));
    };

    let Some(format) = FileFormat::from_filename(&filename) else {
        return Html(render_page(Some(Err(format!(
            "unsupported file type '{filename}' - upload .xlsx or .csv"
        )))));
    };

    info!(filename = %filename, size = bytes.len(), "running analysis");
    let outcome = analyze(&bytes, format, &state.options).map_err(|e| {
        error!(error = %e, "analysis failed");
        e.to_string()
    });

    Html(render_page(Some(outcome)))
}

// ── Renderer ──────────────────────────────────────────────────────────────────

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn render_page(outcome: Option<Result<Report, String>>) -> String {
    let body = match outcome {
        None => String::new(),
        Some(Err(message)) => format!(
            r#"<div class="alert alert-danger">{}</div>"#,
            escape(&message)
        ),
        Some(Ok(report)) => render_report(&report),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Modelo de Supervivencia para Préstamos</title>
    <style>
        body {{ font-family: system-ui, sans-serif; margin: 0; background: #f3f4f7; color: #1f2430; }}
        .main-content {{ max-width: 860px; margin: 0 auto; padding: 24px 16px 48px; }}
        .page-title {{ font-size: 26px; margin-bottom: 4px; }}
        .text-muted {{ color: #5a5f6e; }}
        .card {{ background: #fff; border: 1px solid #e2e4ea; border-radius: 8px; padding: 18px 20px; margin-top: 18px; }}
        .card-header {{ font-weight: 600; margin-bottom: 12px; }}
        .table {{ border-collapse: collapse; width: 100%; font-size: 13px; }}
        .table th, .table td {{ border-bottom: 1px solid #e2e4ea; padding: 6px 10px; text-align: left; }}
        .table th {{ background: #f7f8fa; }}
        .table td.num {{ text-align: right; font-variant-numeric: tabular-nums; }}
        .alert {{ border-radius: 6px; padding: 12px 16px; margin-top: 18px; }}
        .alert-danger {{ background: #fdecea; border: 1px solid #f4b9b2; color: #8a2018; }}
        .alert-info {{ background: #eaf2fd; border: 1px solid #b6d0f2; color: #1d4f91; }}
        .btn {{ background: #3558a6; color: #fff; border: none; border-radius: 6px; padding: 8px 18px; font-size: 14px; cursor: pointer; }}
        input[type="file"] {{ margin-right: 12px; }}
    </style>
</head>
<body>
<main class="main-content">
    <h1 class="page-title">Modelo de Supervivencia para Préstamos</h1>
    <p class="text-muted">Regresión de Cox penalizada y curva de Kaplan-Meier sobre los desembolsos.</p>

    <div class="card">
        <div class="card-header">Carga de Datos</div>
        <form method="POST" action="/analyze" enctype="multipart/form-data">
            <input type="file" name="file" accept=".xlsx,.csv" required>
            <button type="submit" class="btn">Analizar</button>
        </form>
    </div>

    {body}
</main>
</body>
</html>"#
    )
}

fn render_report(report: &Report) -> String {
    let mut html = String::new();

    // raw-data preview
    let header_cells: String = report
        .preview
        .headers
        .iter()
        .map(|h| format!("<th>{}</th>", escape(h)))
        .collect();
    let preview_rows: String = report
        .preview
        .rows
        .iter()
        .map(|row| {
            let cells: String = row
                .iter()
                .map(|cell| format!("<td>{}</td>", escape(cell)))
                .collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();
    html.push_str(&format!(
        r#"<div class="card">
        <div class="card-header">Vista Previa de los Datos</div>
        <table class="table"><thead><tr>{header_cells}</tr></thead><tbody>{preview_rows}</tbody></table>
        <p class="text-muted">{} filas en total.</p>
    </div>"#,
        report.preview.total_rows
    ));

    // coercion outcome, only when something was dropped
    let dropped = report.coercion.rows_dropped() + report.curve_rows_dropped;
    if dropped > 0 {
        html.push_str(&format!(
            r#"<div class="alert alert-info">{} filas excluidas del ajuste ({} sin porcentaje de desembolso, {} sin duración numérica; {} excluidas de la curva).</div>"#,
            dropped,
            report.coercion.dropped_missing_percentage,
            report.coercion.dropped_missing_duration,
            report.curve_rows_dropped
        ));
    }

    // regression summary, rendered as-is in fit order
    let summary_rows: String = report
        .summary
        .rows
        .iter()
        .map(|row| {
            format!(
                r#"<tr><td>{}</td><td class="num">{:.4}</td><td class="num">{:.4}</td><td class="num">{:.4}</td><td class="num">{:.4}</td><td class="num">{:.4}</td><td class="num">{:.2}</td><td class="num">{:.4}</td></tr>"#,
                escape(&row.name),
                row.coef,
                row.exp_coef,
                row.se,
                row.ci_lower,
                row.ci_upper,
                row.z,
                row.p
            )
        })
        .collect();
    let concordance = report
        .summary
        .concordance
        .map(|c| format!(" &middot; concordancia {c:.3}"))
        .unwrap_or_default();
    html.push_str(&format!(
        r#"<div class="card">
        <div class="card-header">Resumen del Modelo de Cox</div>
        <table class="table">
            <thead><tr><th>covariable</th><th>coef</th><th>exp(coef)</th><th>se(coef)</th><th>coef lower 95%</th><th>coef upper 95%</th><th>z</th><th>p</th></tr></thead>
            <tbody>{summary_rows}</tbody>
        </table>
        <p class="text-muted">{} observaciones, {} eventos, penalizador {:.2}{concordance}</p>
    </div>"#,
        report.summary.n_observations, report.summary.n_events, report.summary.penalizer
    ));

    // the survival curve
    html.push_str(&format!(
        r#"<div class="card">{}</div>"#,
        report.plot_svg
    ));

    html
}
