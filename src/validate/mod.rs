// src/validate/mod.rs

use std::fmt;
use tracing::{error, warn};

use crate::records::{MappedRecord, Value};

/// Share of missing values in a required field above which a warning is raised.
pub const MISSING_WARN_RATIO: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub severity: Severity,
    pub field: Option<String>,
    pub message: String,
}

impl Problem {
    fn error(field: Option<&str>, message: String) -> Self {
        error!(field = field.unwrap_or("-"), "{}", message);
        Self {
            severity: Severity::Error,
            field: field.map(str::to_string),
            message,
        }
    }

    fn warning(field: &str, message: String) -> Self {
        warn!(field, "{}", message);
        Self {
            severity: Severity::Warning,
            field: Some(field.to_string()),
            message,
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub ok: bool,
    pub problems: Vec<Problem>,
}

impl ValidationResult {
    pub fn errors(&self) -> impl Iterator<Item = &Problem> {
        self.problems
            .iter()
            .filter(|p| p.severity == Severity::Error)
    }
}

/// Check a mapped table. `ok` is false on any error-class problem;
/// warnings are reported but do not fail the table.
pub fn validate(table: &[MappedRecord], required_fields: &[&str]) -> ValidationResult {
    let mut problems = Vec::new();

    if table.is_empty() {
        problems.push(Problem::error(None, "table is empty".to_string()));
    }

    let absent: Vec<&str> = required_fields
        .iter()
        .copied()
        .filter(|f| !table.iter().any(|r| r.has_field(f)))
        .collect();
    if !table.is_empty() && !absent.is_empty() {
        problems.push(Problem::error(
            None,
            format!("missing required columns: {}", absent.join(", ")),
        ));
    }

    if !table.is_empty() {
        for field in required_fields.iter().copied().filter(|f| !absent.contains(f)) {
            let missing = table.iter().filter(|r| is_missing(r, field)).count();
            let ratio = missing as f64 / table.len() as f64;
            if ratio > MISSING_WARN_RATIO {
                problems.push(Problem::warning(
                    field,
                    format!(
                        "column {} has {} of {} values missing ({:.0}%)",
                        field,
                        missing,
                        table.len(),
                        ratio * 100.0
                    ),
                ));
            }
        }
    }

    // One problem per offending field, not per cell.
    let mut negative: Vec<&str> = Vec::new();
    let mut out_of_range: Vec<&str> = Vec::new();
    for record in table {
        for (name, value) in &record.fields {
            match value {
                Value::Count(n) if *n < 0 => push_once(&mut negative, name),
                Value::Ratio(p) if !p.is_finite() || *p < 0.0 => push_once(&mut negative, name),
                Value::Ratio(p) if *p > 1.0 => push_once(&mut out_of_range, name),
                _ => {}
            }
        }
    }
    for field in negative {
        problems.push(Problem::error(
            Some(field),
            format!("column {} contains negative or invalid values", field),
        ));
    }
    for field in out_of_range {
        problems.push(Problem::error(
            Some(field),
            format!("column {} contains probabilities above 1", field),
        ));
    }

    let ok = !problems.iter().any(|p| p.severity == Severity::Error);
    ValidationResult { ok, problems }
}

fn is_missing(record: &MappedRecord, field: &str) -> bool {
    field != "state_code" && record.get(field).is_missing()
}

fn push_once<'a>(seen: &mut Vec<&'a str>, name: &'a str) {
    if !seen.contains(&name) {
        seen.push(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn household(code: &str, total: Value) -> MappedRecord {
        MappedRecord::new(code, Utc::now()).with("total_households", total)
    }

    const REQUIRED: &[&str] = &["state_code", "total_households"];

    #[test]
    fn test_clean_table_passes() {
        let table = vec![
            household("01", Value::Count(100)),
            household("02", Value::Count(0)),
        ];
        let result = validate(&table, REQUIRED);
        assert!(result.ok);
        assert!(result.problems.is_empty());
    }

    #[test]
    fn test_negative_count_fails() {
        let table = vec![
            household("01", Value::Count(100)),
            household("02", Value::Count(-666_666_666)),
        ];
        let result = validate(&table, REQUIRED);
        assert!(!result.ok);
        assert_eq!(
            result.errors().next().unwrap().field.as_deref(),
            Some("total_households")
        );
    }

    #[test]
    fn test_empty_table_fails() {
        let result = validate(&[], REQUIRED);
        assert!(!result.ok);
        assert_eq!(result.errors().count(), 1);
    }

    #[test]
    fn test_absent_required_field_fails() {
        let table = vec![household("01", Value::Count(5))];
        let result = validate(&table, &["state_code", "married_couple"]);
        assert!(!result.ok);
        assert!(result.problems[0].message.contains("married_couple"));
    }

    #[test]
    fn test_many_missing_values_only_warn() {
        let mut table: Vec<_> = (0..9)
            .map(|i| household(&format!("{:02}", i), Value::Count(10)))
            .collect();
        table.push(household("10", Value::Missing));
        // 1 of 10 is exactly the limit
        assert!(validate(&table, REQUIRED).problems.is_empty());

        table.push(household("11", Value::Missing));
        let result = validate(&table, REQUIRED);
        assert!(result.ok);
        assert_eq!(result.problems.len(), 1);
        assert_eq!(result.problems[0].severity, Severity::Warning);
    }

    #[test]
    fn test_probability_range() {
        let table = vec![
            MappedRecord::new("01", Utc::now()).with("single_person", Value::Ratio(0.25)),
            MappedRecord::new("02", Utc::now()).with("single_person", Value::Ratio(1.5)),
        ];
        let result = validate(&table, &["state_code", "single_person"]);
        assert!(!result.ok);

        let nan =
            vec![MappedRecord::new("01", Utc::now()).with("single_person", Value::Ratio(f64::NAN))];
        assert!(!validate(&nan, &["state_code"]).ok);
    }
}
