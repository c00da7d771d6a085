//! Runs the full training pipeline and publishes the resulting model.

use std::process::ExitCode;

use rusqlite::Connection;
use tracing::error;

use mindcast::config::Settings;
use mindcast::pipeline::{run_training, ModelRegistry, TunerBudget};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(model_name) => {
            println!("published {model_name}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(cause = %e, "training run failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<String, Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    let conn = Connection::open(&settings.db_path)?;
    let mut registry = ModelRegistry::open(&settings.model_dir, &settings.model_name)?;

    let outcome = run_training(&conn, &mut registry, TunerBudget::default(), 42)?;
    Ok(outcome.model_name)
}
