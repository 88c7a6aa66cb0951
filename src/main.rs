use acs_loader::{
    config::Config,
    fetch::{CensusClient, HttpTransport, ThreadSleeper},
    logging,
    pipeline::Pipeline,
    store::DuckConnector,
};
use anyhow::Result;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> Result<ExitCode> {
    // ─── 1) config + logging ─────────────────────────────────────────
    let config = Config::from_env()?;
    logging::init(&config.storage.log_level, &config.storage.log_file)?;
    info!("startup");

    // ─── 2) wire collaborators ───────────────────────────────────────
    let transport = HttpTransport::new(config.request_timeout)?;
    let client = CensusClient::new(transport, ThreadSleeper, config.retry_policy()?);
    let pipeline = Pipeline::new(
        DuckConnector::new(config.storage.database.clone()),
        client,
        config.pipeline_settings(),
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    if pipeline.run() {
        info!("Successfully completed Census data pipeline");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(report = %config.storage.report_path.display(), "Census data pipeline failed");
        Ok(ExitCode::FAILURE)
    }
}
