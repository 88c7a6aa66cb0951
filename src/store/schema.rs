// src/store/schema.rs

/// Semantic column type; each backend picks its own physical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

/// Table layout shared by every loaded dataset:
/// `state_code`, the dataset's fields, then `last_updated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Option<String>,
}

pub const KEY_COLUMN: &str = "state_code";
pub const UPDATED_COLUMN: &str = "last_updated";

impl TableSchema {
    pub fn keyed<'a, I>(name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, ColumnType)>,
    {
        let mut columns = vec![ColumnDef {
            name: KEY_COLUMN.to_string(),
            ty: ColumnType::Text,
        }];
        columns.extend(fields.into_iter().map(|(name, ty)| ColumnDef {
            name: name.to_string(),
            ty,
        }));
        columns.push(ColumnDef {
            name: UPDATED_COLUMN.to_string(),
            ty: ColumnType::Timestamp,
        });
        Self {
            name: name.to_string(),
            columns,
            primary_key: None,
        }
    }

    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = Some(KEY_COLUMN.to_string());
        self
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Columns of the given type, e.g. every probability column.
    pub fn columns_of(&self, ty: ColumnType) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.ty == ty)
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_layout() {
        let s = TableSchema::keyed("family_type", [("married_with_children", ColumnType::Integer)]);
        let names: Vec<_> = s.column_names().collect();
        assert_eq!(
            names,
            vec!["state_code", "married_with_children", "last_updated"]
        );
        assert_eq!(s.primary_key, None);
        assert_eq!(s.columns_of(ColumnType::Integer), vec!["married_with_children"]);
        assert_eq!(s.with_primary_key().primary_key.as_deref(), Some("state_code"));
    }
}
