//! The three ACS topics loaded on every run.

use std::fmt;

use super::field_map::{FieldKind, FieldMap};
use crate::store::schema::{ColumnType, TableSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    States,
    HouseholdType,
    FamilyType,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::States,
        DatasetKind::HouseholdType,
        DatasetKind::FamilyType,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            DatasetKind::States => "states",
            DatasetKind::HouseholdType => "household_type",
            DatasetKind::FamilyType => "family_type",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Variables to request, how to name them, and where they land.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub kind: DatasetKind,
    pub fields: FieldMap,
    pub schema: TableSchema,
}

impl Dataset {
    pub fn new(kind: DatasetKind) -> Self {
        let fields: FieldMap = match kind {
            DatasetKind::States => [("NAME", "state_name")].into_iter().collect(),
            DatasetKind::HouseholdType => [
                ("B11001_001E", "total_households"),
                ("B11001_003E", "married_couple"),
                ("B11001_005E", "male_householder"),
                ("B11001_006E", "female_householder"),
                ("B11001_008E", "living_alone"),
                ("B11001_009E", "not_living_alone"),
            ]
            .into_iter()
            .collect(),
            DatasetKind::FamilyType => [
                ("B11003_003E", "married_with_children"),
                ("B11003_011E", "male_with_children"),
                ("B11003_017E", "female_with_children"),
            ]
            .into_iter()
            .collect(),
        };

        let schema = TableSchema::keyed(
            kind.table(),
            fields.iter().map(|f| {
                let ty = match f.kind {
                    FieldKind::Count => ColumnType::Integer,
                    FieldKind::Text => ColumnType::Text,
                };
                (f.name.as_str(), ty)
            }),
        );

        Self {
            kind,
            fields,
            schema,
        }
    }

    /// Every run loads these, in this order.
    pub fn all() -> Vec<Dataset> {
        DatasetKind::ALL.into_iter().map(Dataset::new).collect()
    }

    /// Fields a loaded table must carry: the key plus every declared field.
    pub fn required_fields(&self) -> Vec<&str> {
        std::iter::once("state_code")
            .chain(self.fields.names())
            .collect()
    }
}
