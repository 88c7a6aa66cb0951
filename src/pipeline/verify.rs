use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{error, info, instrument};

use super::report::{DataQuality, Metrics};
use crate::derive::{PROBABILITIES_TABLE, PROBABILITY_FIELDS};
use crate::records::DatasetKind;
use crate::store::TableStore;

/// Outcome of the cross-table checks. `problems` are all blocking.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub metrics: Metrics,
    pub data_quality: DataQuality,
    pub problems: Vec<String>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Count every table, require the same states exactly once in each, and check
/// the probabilities table (when present) for NULLs and values outside [0, 1].
#[instrument(level = "info", skip_all)]
pub fn verify<S: TableStore>(store: &S) -> Result<Verification> {
    let mut problems = Vec::new();

    let mut counts = Vec::new();
    for kind in DatasetKind::ALL {
        let count = store.row_count(kind.table())?;
        match count {
            Some(n) => info!(table = kind.table(), rows = n, "counted"),
            None => problems.push(format!("table {} does not exist", kind.table())),
        }
        counts.push((kind.table(), count));
    }
    let probabilities = store.row_count(PROBABILITIES_TABLE)?;
    if let Some(n) = probabilities {
        info!(table = PROBABILITIES_TABLE, rows = n, "counted");
        counts.push((PROBABILITIES_TABLE, probabilities));
    }

    let present: Vec<(&str, u64)> = counts
        .iter()
        .filter_map(|(t, c)| c.map(|c| (*t, c)))
        .collect();
    if present.windows(2).any(|w| w[0].1 != w[1].1) {
        let detail: Vec<String> = present.iter().map(|(t, c)| format!("{t}={c}")).collect();
        problems.push(format!(
            "Data count mismatch across tables ({})",
            detail.join(", ")
        ));
    }

    // Every present table must hold the same states, each exactly once.
    let mut reference: Option<(&str, BTreeSet<String>)> = None;
    for (table, _) in &present {
        let codes = store.state_codes(table)?;
        let unique: BTreeSet<String> = codes.iter().cloned().collect();
        if unique.len() != codes.len() {
            problems.push(format!(
                "Table {} has {} duplicate state codes",
                table,
                codes.len() - unique.len()
            ));
        }
        match &reference {
            None => reference = Some((*table, unique)),
            Some((base, expected)) if *expected != unique => {
                let dropped: Vec<&str> = expected.difference(&unique).map(String::as_str).collect();
                let extra: Vec<&str> = unique.difference(expected).map(String::as_str).collect();
                problems.push(format!(
                    "State codes in {} differ from {} (missing: [{}], extra: [{}])",
                    table,
                    base,
                    dropped.join(", "),
                    extra.join(", ")
                ));
            }
            Some(_) => {}
        }
    }

    let mut data_quality = DataQuality::default();
    if probabilities.is_some() {
        data_quality.missing_values =
            store.count_null_rows(PROBABILITIES_TABLE, &PROBABILITY_FIELDS)?;
        data_quality.invalid_probabilities =
            store.count_out_of_range(PROBABILITIES_TABLE, &PROBABILITY_FIELDS, 0.0, 1.0)?;
        if data_quality.missing_values > 0 {
            problems.push(format!(
                "Found {} records with missing values",
                data_quality.missing_values
            ));
        }
        if data_quality.invalid_probabilities > 0 {
            problems.push(format!(
                "Found {} records with invalid probabilities",
                data_quality.invalid_probabilities
            ));
        }
    }

    for p in &problems {
        error!("{}", p);
    }

    let metrics = Metrics {
        state_count: counts[0].1,
        household_type_count: counts[1].1,
        family_type_count: counts[2].1,
        probabilities_count: probabilities,
    };
    Ok(Verification {
        metrics,
        data_quality,
        problems,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::probabilities_schema;
    use crate::records::{Dataset, MappedRecord, Value};
    use crate::store::{Connector, DuckConnector};
    use chrono::Utc;

    fn rows(n: usize) -> Vec<MappedRecord> {
        (0..n)
            .map(|i| MappedRecord::new(format!("{:02}", i + 1), Utc::now()))
            .collect()
    }

    fn probability_row(code: &str, p: Value) -> MappedRecord {
        PROBABILITY_FIELDS.iter().fold(
            MappedRecord::new(code, Utc::now()).with("state_name", Value::Text("X".into())),
            |r, f| r.with(f, p.clone()),
        )
    }

    #[test]
    fn test_consistent_tables_pass() -> Result<()> {
        let mut store = DuckConnector::in_memory().connect()?;
        for ds in Dataset::all() {
            store.replace_table(&ds.schema, &rows(2))?;
        }
        let v = verify(&store)?;
        assert!(v.passed(), "{:?}", v.problems);
        assert_eq!(v.metrics.state_count, Some(2));
        assert_eq!(v.metrics.probabilities_count, None);
        Ok(())
    }

    #[test]
    fn test_empty_sibling_flags_mismatch() -> Result<()> {
        let mut store = DuckConnector::in_memory().connect()?;
        for ds in Dataset::all() {
            let n = if ds.kind == DatasetKind::FamilyType { 0 } else { 2 };
            store.replace_table(&ds.schema, &rows(n))?;
        }
        let v = verify(&store)?;
        assert!(!v.passed());
        assert!(v.problems[0].starts_with("Data count mismatch"));
        assert_eq!(v.metrics.family_type_count, Some(0));
        Ok(())
    }

    #[test]
    fn test_different_states_with_equal_counts_flagged() -> Result<()> {
        let mut store = DuckConnector::in_memory().connect()?;
        for ds in Dataset::all() {
            let codes: &[&str] = if ds.kind == DatasetKind::HouseholdType {
                &["01", "03"]
            } else {
                &["01", "02"]
            };
            let table: Vec<MappedRecord> = codes
                .iter()
                .map(|c| MappedRecord::new(*c, Utc::now()))
                .collect();
            store.replace_table(&ds.schema, &table)?;
        }
        let v = verify(&store)?;
        assert!(!v.passed());
        assert_eq!(v.problems.len(), 1);
        assert_eq!(
            v.problems[0],
            "State codes in household_type differ from states (missing: [02], extra: [03])"
        );
        Ok(())
    }

    #[test]
    fn test_duplicate_state_codes_flagged() -> Result<()> {
        let mut store = DuckConnector::in_memory().connect()?;
        for ds in Dataset::all() {
            let mut table = rows(2);
            if ds.kind == DatasetKind::FamilyType {
                table[1].state_code = "01".into();
            }
            store.replace_table(&ds.schema, &table)?;
        }
        let v = verify(&store)?;
        assert!(!v.passed());
        assert!(v
            .problems
            .contains(&"Table family_type has 1 duplicate state codes".to_string()));
        Ok(())
    }

    #[test]
    fn test_missing_table_reported() -> Result<()> {
        let store = DuckConnector::in_memory().connect()?;
        let v = verify(&store)?;
        assert_eq!(v.problems.len(), 3);
        assert_eq!(v.metrics, Metrics::default());
        Ok(())
    }

    #[test]
    fn test_probability_quality_checks() -> Result<()> {
        let mut store = DuckConnector::in_memory().connect()?;
        for ds in Dataset::all() {
            store.replace_table(&ds.schema, &rows(3))?;
        }
        store.replace_table(
            &probabilities_schema(),
            &[
                probability_row("01", Value::Ratio(0.1)),
                probability_row("02", Value::Missing),
                probability_row("03", Value::Ratio(1.5)),
            ],
        )?;
        let v = verify(&store)?;
        assert_eq!(v.metrics.probabilities_count, Some(3));
        assert_eq!(v.data_quality.missing_values, 1);
        assert_eq!(v.data_quality.invalid_probabilities, 1);
        assert_eq!(v.problems.len(), 2);
        Ok(())
    }
}
