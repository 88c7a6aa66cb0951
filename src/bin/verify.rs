// src/bin/verify.rs
//
// Re-run the post-load checks against an existing database and rewrite the
// report, without fetching anything.

use acs_loader::{
    config::{StorageConfig, DEFAULT_VERIFY_LOG_FILE},
    logging,
    pipeline::{verify, VerificationReport},
    store::{Connector, DuckConnector},
};
use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> Result<ExitCode> {
    let config = StorageConfig::from_env(DEFAULT_VERIFY_LOG_FILE)?;
    logging::init(&config.log_level, &config.log_file)?;
    info!("Starting data load verification");

    let report = match DuckConnector::new(config.database.clone())
        .connect()
        .and_then(|store| verify(&store).context("running verification queries"))
    {
        Ok(verification) => VerificationReport::verified(verification, Vec::new()),
        Err(e) => {
            let cause = format!("{:#}", e);
            error!(error = %cause, "Verification failed");
            VerificationReport::failed(cause)
        }
    };
    report.write(&config.report_path)?;

    let ok = report.error.is_none();
    if ok {
        info!("Data verification successful");
    }
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
