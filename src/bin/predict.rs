//! Scores a JSON batch of survey items against the deployed model.
//!
//! Usage: `predict [--plot] [items.json]`. With no path the batch is
//! read from stdin. The input is a JSON array of flat objects keyed by
//! the lowercase external field names.

use std::io::Read as _;
use std::process::ExitCode;

use tracing::error;

use mindcast::config::Settings;
use mindcast::pipeline::ModelRegistry;
use mindcast::serve::{build_report, FeatureItem, InferenceService};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(cause = %e, "prediction failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut plot = false;
    let mut path: Option<String> = None;
    for arg in std::env::args().skip(1) {
        if arg == "--plot" {
            plot = true;
        } else {
            path = Some(arg);
        }
    }

    let raw = match path {
        Some(p) => std::fs::read_to_string(p)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let items: Vec<FeatureItem> = serde_json::from_str(&raw)?;

    let settings = Settings::from_env()?;
    let registry = ModelRegistry::open(&settings.model_dir, &settings.model_name)?;
    let service = InferenceService::new(&settings, &registry)?;

    let probabilities = service.predict(&items)?;
    for (i, row) in probabilities.rows().into_iter().enumerate() {
        let report = build_report(row, plot)?;
        println!("item {i}: dominant {}", report.dominant);
        for (label, pct) in &report.percentages {
            println!("  {label}: {pct}%");
        }
        if let Some(chart) = &report.chart {
            println!("  chart (base64 svg): {chart}");
        }
    }
    Ok(())
}
