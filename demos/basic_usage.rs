use loan_survival::intake::FileFormat;
use loan_survival::report::{analyze, AnalyzeOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Loan Survival Analysis - Basic Usage Example");
    println!("============================================\n");

    // a small portfolio of loan operations, the same shape an uploaded
    // spreadsheet would have
    let csv = "\
NoOperacion,PorcentajeDesembolsado,Meses,Años,Sector,SubSectorNombre,Pais
OP-001,1.0,24,2.0,Energia,Solar,Peru
OP-002,0.45,12,1.0,Energia,Eolica,Chile
OP-003,0.80,36,3.0,Transporte,Vial,Peru
OP-004,1.0,18,1.5,Energia,Solar,Bolivia
OP-005,0.20,6,0.5,Transporte,Vial,Chile
OP-006,0.90,30,2.5,Agua,Riego,Peru
OP-007,1.0,48,4.0,Agua,Riego,Bolivia
OP-008,0.65,20,1.7,Energia,Solar,Chile
OP-009,0.30,9,0.75,Transporte,Ferroviario,Peru
OP-010,1.0,40,3.3,Energia,Eolica,Bolivia
OP-011,0.55,15,1.25,Agua,Saneamiento,Chile
OP-012,0.75,27,2.25,Transporte,Vial,Bolivia
";

    let report = analyze(csv.as_bytes(), FileFormat::Csv, &AnalyzeOptions::default())?;

    println!("Uploaded {} operations; {} used for the regression ({} dropped).\n",
        report.preview.total_rows,
        report.coercion.rows_used,
        report.coercion.rows_dropped());

    // the regression report, same columns the dashboard renders
    report.summary.print();

    // the survival curve over the years column
    println!("\nKaplan-Meier curve ({} events):", report.curve.n_events);
    println!("{:>8} {:>10} {:>10} {:>10}", "time", "survival", "ci lower", "ci upper");
    for step in &report.curve.steps {
        println!(
            "{:>8.2} {:>10.4} {:>10.4} {:>10.4}",
            step.time, step.survival, step.ci_lower, step.ci_upper
        );
    }

    println!("\nPlot SVG is {} bytes; the dashboard embeds it inline.", report.plot_svg.len());

    Ok(())
}
