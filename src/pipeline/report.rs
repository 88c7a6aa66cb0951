// src/pipeline/report.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::info;

use super::verify::Verification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

/// Row count per table; `None` when the table does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub state_count: Option<u64>,
    pub household_type_count: Option<u64>,
    pub family_type_count: Option<u64>,
    pub probabilities_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuality {
    pub missing_values: u64,
    pub invalid_probabilities: u64,
}

/// Snapshot written once at the end of every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verification_time: DateTime<Utc>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_quality: Option<DataQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<String>,
}

impl VerificationReport {
    /// Report for a run that reached verification. `notes` are non-blocking
    /// findings (validation warnings) listed after the blocking ones.
    pub fn verified(verification: Verification, notes: Vec<String>) -> Self {
        let status = if verification.passed() {
            Status::Success
        } else {
            Status::Failure
        };
        let error = (!verification.passed()).then(|| verification.problems.join("; "));
        let mut problems = verification.problems;
        problems.extend(notes);
        Self {
            verification_time: Utc::now(),
            status,
            metrics: Some(verification.metrics),
            data_quality: Some(verification.data_quality),
            error,
            problems,
        }
    }

    /// Report for a run that aborted before verification.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            verification_time: Utc::now(),
            status: Status::Failure,
            metrics: None,
            data_quality: None,
            error: Some(error.into()),
            problems: Vec::new(),
        }
    }

    /// Replace the report at `path`. Written to a sibling temp file first so
    /// readers never see a partial document.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating report directory {:?}", parent))?;
        }
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(self).context("serializing report")?;
        fs::write(&tmp, body).with_context(|| format!("writing {:?}", tmp))?;
        fs::rename(&tmp, path).with_context(|| format!("moving report into {:?}", path))?;
        info!(path = %path.display(), status = ?self.status, "report written");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {:?}", path))
    }
}
