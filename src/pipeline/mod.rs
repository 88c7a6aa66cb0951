// src/pipeline/mod.rs

pub mod report;
pub mod verify;

pub use report::{DataQuality, Metrics, Status, VerificationReport};
pub use verify::{verify, Verification};

use anyhow::{Context, Result};
use chrono::Utc;
use std::{collections::HashMap, fmt, path::PathBuf};
use tracing::{error, info, instrument, warn};
use url::Url;

use crate::derive::{derive_probabilities, probabilities_schema};
use crate::fetch::{CensusClient, CensusQuery, Sleeper, Transport};
use crate::records::{map_records, Dataset, DatasetKind, MappedRecord};
use crate::store::{Connector, TableStore};
use crate::validate::{validate, Severity};

/// Where a run is. Stages only move forward; `Failed` is followed only by
/// `Reported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Connected,
    Loaded(DatasetKind),
    ProbabilitiesDerived,
    Verified,
    Failed,
    Reported,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Init => f.write_str("INIT"),
            Stage::Connected => f.write_str("CONNECTED"),
            Stage::Loaded(kind) => write!(f, "{}_LOADED", kind.table().to_uppercase()),
            Stage::ProbabilitiesDerived => f.write_str("PROBABILITIES_DERIVED"),
            Stage::Verified => f.write_str("VERIFIED"),
            Stage::Failed => f.write_str("FAILED"),
            Stage::Reported => f.write_str("REPORTED"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub endpoint: Url,
    pub api_key: String,
    pub geography: String,
    pub report_path: PathBuf,
    pub derive_probabilities: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub trace: Vec<Stage>,
    pub report: VerificationReport,
    pub report_written: bool,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.report.status == Status::Success && self.report_written
    }

    pub fn reached(&self, stage: Stage) -> bool {
        self.trace.contains(&stage)
    }
}

/// Validation findings collected while loading.
#[derive(Default)]
struct Findings {
    blocking: Vec<String>,
    notes: Vec<String>,
}

/// fetch → map → validate → replace for each dataset, then derive, verify
/// and report.
pub struct Pipeline<C, T, S> {
    connector: C,
    client: CensusClient<T, S>,
    datasets: Vec<Dataset>,
    settings: PipelineSettings,
}

impl<C, T, S> Pipeline<C, T, S>
where
    C: Connector,
    T: Transport,
    S: Sleeper,
{
    pub fn new(connector: C, client: CensusClient<T, S>, settings: PipelineSettings) -> Self {
        Self {
            connector,
            client,
            datasets: Dataset::all(),
            settings,
        }
    }

    /// Full run; true when every table loaded, verified and the report was written.
    pub fn run(&self) -> bool {
        self.execute().succeeded()
    }

    #[instrument(level = "info", skip_all)]
    pub fn execute(&self) -> RunOutcome {
        info!("Starting Census household and family type data pipeline");
        let mut trace = vec![Stage::Init];

        let report = match self.load_and_verify(&mut trace) {
            Ok((mut verification, findings)) => {
                let mut problems = findings.blocking;
                problems.append(&mut verification.problems);
                verification.problems = problems;
                VerificationReport::verified(verification, findings.notes)
            }
            Err(e) => {
                let cause = format!("{:#}", e);
                error!(error = %cause, "Pipeline failed");
                advance(&mut trace, Stage::Failed);
                VerificationReport::failed(cause)
            }
        };

        let report_written = match report.write(&self.settings.report_path) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %format!("{:#}", e), "could not write report");
                false
            }
        };
        advance(&mut trace, Stage::Reported);

        info!(status = ?report.status, "pipeline finished");
        RunOutcome {
            trace,
            report,
            report_written,
        }
    }

    fn load_and_verify(&self, trace: &mut Vec<Stage>) -> Result<(Verification, Findings)> {
        let mut store = self
            .connector
            .connect()
            .context("database connection failed")?;
        advance(trace, Stage::Connected);

        let mut findings = Findings::default();
        let mut loaded: HashMap<DatasetKind, Vec<MappedRecord>> = HashMap::new();
        for dataset in &self.datasets {
            let records = self.load_dataset(&mut store, dataset, &mut findings)?;
            loaded.insert(dataset.kind, records);
            advance(trace, Stage::Loaded(dataset.kind));
        }

        if self.settings.derive_probabilities {
            let empty = Vec::new();
            let get = |k: DatasetKind| loaded.get(&k).unwrap_or(&empty);
            let probabilities = derive_probabilities(
                get(DatasetKind::States),
                get(DatasetKind::HouseholdType),
                get(DatasetKind::FamilyType),
                Utc::now(),
            );
            let n = store
                .replace_table(&probabilities_schema(), &probabilities)
                .context("storing household_family_type_probabilities")?;
            info!("Calculated probabilities for {} states", n);
            advance(trace, Stage::ProbabilitiesDerived);
        }

        let verification = verify(&store).context("verification queries failed")?;
        advance(trace, Stage::Verified);
        Ok((verification, findings))
    }

    #[instrument(level = "info", skip_all, fields(dataset = %dataset.kind))]
    fn load_dataset<St: TableStore>(
        &self,
        store: &mut St,
        dataset: &Dataset,
        findings: &mut Findings,
    ) -> Result<Vec<MappedRecord>> {
        info!("Fetching {} data", dataset.kind);
        let query = CensusQuery {
            endpoint: self.settings.endpoint.clone(),
            variables: dataset.fields.codes(),
            geography: self.settings.geography.clone(),
            key: self.settings.api_key.clone(),
        };
        let raw = self
            .client
            .fetch(&query)
            .with_context(|| format!("fetching {} data", dataset.kind))?;
        let records = map_records(&raw, &dataset.fields, Utc::now())
            .with_context(|| format!("mapping {} data", dataset.kind))?;

        let result = validate(&records, &dataset.required_fields());
        for problem in &result.problems {
            let line = format!("{}: {}", dataset.kind, problem);
            match problem.severity {
                Severity::Error => findings.blocking.push(line),
                Severity::Warning => findings.notes.push(line),
            }
        }
        if !result.ok {
            warn!("{} failed validation; loading anyway", dataset.kind);
        }

        let n = store
            .replace_table(&dataset.schema, &records)
            .with_context(|| format!("storing {} data", dataset.kind))?;
        info!("Stored {} rows in {}", n, dataset.kind);
        Ok(records)
    }
}

fn advance(trace: &mut Vec<Stage>, stage: Stage) {
    info!(stage = %stage, "stage");
    trace.push(stage);
}
