//! Loan survival dashboard server
//!
//! Run with: cargo run -- --bind 127.0.0.1:3001

use std::net::SocketAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use loan_survival::report::AnalyzeOptions;
use loan_survival::web::{build_router, state::AppState};

#[derive(Parser, Debug)]
#[command(name = "loan-survival", about = "survival analysis dashboard for loan disbursement data")]
struct Args {
    /// address the dashboard listens on
    #[arg(long, default_value = "127.0.0.1:3001")]
    bind: SocketAddr,

    /// ridge penalty for the regression fit
    #[arg(long, default_value_t = 0.1)]
    penalizer: f64,

    /// rows shown in the raw-data preview
    #[arg(long, default_value_t = 5)]
    preview_rows: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let state = AppState::new(AnalyzeOptions {
        penalizer: args.penalizer,
        preview_rows: args.preview_rows,
    });
    let app = build_router(state);

    info!("dashboard listening on http://{}", args.bind);
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
