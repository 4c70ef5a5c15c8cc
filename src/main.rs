//! SegmentScope CLI entrypoint
//!
//! Loads the tables once, builds the dashboard report and prints it, with
//! optional CSV exports for external chart renderers.

use anyhow::{Context, Result};
use clap::Parser;
use segmentscope::dashboard::ProjectionPanel;
use segmentscope::{build_dashboard, export, logging, render_text, Args, DashboardData};
use std::time::Instant;

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_cli_logger(args.verbose);
    args.validate()?;

    let start_time = Instant::now();

    tracing::debug!(rfm = %args.rfm.display(), transactions = %args.transactions.display(), "loading tables");
    let data = DashboardData::load(&args.rfm, &args.transactions, &args.rules, args.top_rules)?;
    tracing::debug!(
        customers = data.customers.len(),
        lines = data.transactions.len(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "tables loaded"
    );

    let report = build_dashboard(&data, &args.dashboard_options())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }

    if let Some(path) = &args.export_rfm {
        export::write_rfm_csv(&data.customers, path)
            .with_context(|| format!("failed to export RFM table to {}", path.display()))?;
        tracing::info!(path = %path.display(), "RFM segment table exported");
        if !args.json {
            println!("\nRFM segment table saved to: {}", path.display());
        }
    }

    if let Some(path) = &args.projection_out {
        match &report.projection {
            ProjectionPanel::Ready { projection } => {
                export::write_projection_csv(&projection.points, path)
                    .with_context(|| format!("failed to write projection to {}", path.display()))?;
                if !args.json {
                    println!("Projection saved to: {}", path.display());
                }
            }
            ProjectionPanel::Unavailable { notice } => {
                tracing::warn!("skipping projection export: {}", notice);
            }
        }
    }

    tracing::debug!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "report complete"
    );

    Ok(())
}
