//! Household/family-type probability distribution per state.
//!
//! Every share is a count divided by `total_households`. States without a
//! positive total, or without a household, family and states row, are left
//! out. A missing operand makes only that share `Missing`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::records::{MappedRecord, Value};
use crate::store::schema::{ColumnType, TableSchema};

pub const PROBABILITIES_TABLE: &str = "household_family_type_probabilities";

pub const PROBABILITY_FIELDS: [&str; 8] = [
    "married_with_children",
    "married_no_children",
    "single_parent_male",
    "single_parent_female",
    "single_person",
    "other_nonfamily",
    "other_family_male",
    "other_family_female",
];

pub fn probabilities_schema() -> TableSchema {
    TableSchema::keyed(
        PROBABILITIES_TABLE,
        std::iter::once(("state_name", ColumnType::Text))
            .chain(PROBABILITY_FIELDS.iter().map(|f| (*f, ColumnType::Float))),
    )
    .with_primary_key()
}

/// `(minuend - subtrahend) / total`, or the plain share when `subtrahend` is `None`.
/// A difference that overflows `i64` is `Missing`.
fn share(minuend: Option<i64>, subtrahend: Option<Option<i64>>, total: i64) -> Value {
    let numerator = match (minuend, subtrahend) {
        (Some(a), None) => a,
        (Some(a), Some(Some(b))) => match a.checked_sub(b) {
            Some(n) => n,
            None => return Value::Missing,
        },
        _ => return Value::Missing,
    };
    Value::Ratio(numerator as f64 / total as f64)
}

pub fn derive_probabilities(
    states: &[MappedRecord],
    households: &[MappedRecord],
    families: &[MappedRecord],
    last_updated: DateTime<Utc>,
) -> Vec<MappedRecord> {
    let names: HashMap<&str, &MappedRecord> =
        states.iter().map(|r| (r.state_code.as_str(), r)).collect();
    let family: HashMap<&str, &MappedRecord> =
        families.iter().map(|r| (r.state_code.as_str(), r)).collect();

    let mut out = Vec::with_capacity(households.len());
    for h in households {
        let code = h.state_code.as_str();
        let (Some(s), Some(f)) = (names.get(code), family.get(code)) else {
            warn!(state = code, "no matching states/family_type row; skipped");
            continue;
        };
        let total = match h.count("total_households") {
            Some(t) if t > 0 => t,
            _ => {
                debug!(state = code, "no positive total_households; skipped");
                continue;
            }
        };

        let f_married = f.count("married_with_children");
        let f_male = f.count("male_with_children");
        let f_female = f.count("female_with_children");

        let shares = [
            share(f_married, None, total),
            share(h.count("married_couple"), Some(f_married), total),
            share(f_male, None, total),
            share(f_female, None, total),
            share(h.count("living_alone"), None, total),
            share(h.count("not_living_alone"), None, total),
            share(h.count("male_householder"), Some(f_male), total),
            share(h.count("female_householder"), Some(f_female), total),
        ];

        let mut record = MappedRecord::new(code, last_updated)
            .with("state_name", s.get("state_name").clone());
        for (name, value) in PROBABILITY_FIELDS.iter().zip(shares) {
            record = record.with(name, value);
        }
        out.push(record);
    }

    debug!(states = out.len(), "derived probabilities");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(code: &str, name: &str) -> MappedRecord {
        MappedRecord::new(code, Utc::now()).with("state_name", Value::Text(name.into()))
    }

    fn household(code: &str, total: i64) -> MappedRecord {
        MappedRecord::new(code, Utc::now())
            .with("total_households", Value::Count(total))
            .with("married_couple", Value::Count(500))
            .with("male_householder", Value::Count(60))
            .with("female_householder", Value::Count(140))
            .with("living_alone", Value::Count(250))
            .with("not_living_alone", Value::Count(50))
    }

    fn family(code: &str) -> MappedRecord {
        MappedRecord::new(code, Utc::now())
            .with("married_with_children", Value::Count(200))
            .with("male_with_children", Value::Count(20))
            .with("female_with_children", Value::Count(80))
    }

    #[test]
    fn test_shares_follow_household_totals() {
        let out = derive_probabilities(
            &[state("01", "Alabama")],
            &[household("01", 1000)],
            &[family("01")],
            Utc::now(),
        );
        assert_eq!(out.len(), 1);
        let r = &out[0];
        assert_eq!(r.get("state_name"), &Value::Text("Alabama".into()));
        assert_eq!(r.get("married_with_children"), &Value::Ratio(0.2));
        assert_eq!(r.get("married_no_children"), &Value::Ratio(0.3));
        assert_eq!(r.get("single_parent_male"), &Value::Ratio(0.02));
        assert_eq!(r.get("single_parent_female"), &Value::Ratio(0.08));
        assert_eq!(r.get("single_person"), &Value::Ratio(0.25));
        assert_eq!(r.get("other_nonfamily"), &Value::Ratio(0.05));
        assert_eq!(r.get("other_family_male"), &Value::Ratio(0.04));
        assert_eq!(r.get("other_family_female"), &Value::Ratio(0.06));
    }

    #[test]
    fn test_zero_total_and_unmatched_states_skipped() {
        let out = derive_probabilities(
            &[state("01", "Alabama"), state("02", "Alaska")],
            &[household("01", 0), household("02", 100), household("04", 100)],
            &[family("01"), family("02")],
            Utc::now(),
        );
        let codes: Vec<_> = out.iter().map(|r| r.state_code.as_str()).collect();
        assert_eq!(codes, vec!["02"]);
    }

    #[test]
    fn test_missing_operand_yields_missing_not_nan() {
        let f = MappedRecord::new("01", Utc::now())
            .with("married_with_children", Value::Missing)
            .with("male_with_children", Value::Count(20))
            .with("female_with_children", Value::Count(80));
        let out = derive_probabilities(
            &[state("01", "Alabama")],
            &[household("01", 1000)],
            &[f],
            Utc::now(),
        );
        assert!(out[0].get("married_with_children").is_missing());
        assert!(out[0].get("married_no_children").is_missing());
        assert_eq!(out[0].get("single_parent_male"), &Value::Ratio(0.02));
    }

    #[test]
    fn test_extreme_counts_do_not_overflow() {
        let h = household("01", 1000).with("married_couple", Value::Count(-i64::MAX));
        let f = family("01").with("male_with_children", Value::Count(i64::MIN));
        let out = derive_probabilities(&[state("01", "Alabama")], &[h], &[f], Utc::now());

        assert_eq!(out.len(), 1);
        assert!(out[0].get("married_no_children").is_missing());
        assert!(out[0].get("other_family_male").is_missing());
        assert_eq!(out[0].get("married_with_children"), &Value::Ratio(0.2));
    }

    #[test]
    fn test_schema_has_primary_key() {
        let s = probabilities_schema();
        assert_eq!(s.primary_key.as_deref(), Some("state_code"));
        assert_eq!(s.columns_of(ColumnType::Float).len(), 8);
        assert_eq!(s.columns.len(), 11);
    }
}
