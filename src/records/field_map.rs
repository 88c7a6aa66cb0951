use once_cell::sync::Lazy;
use regex::Regex;

/// ACS estimate columns, e.g. `B11001_001E` or `B01001A_002E`.
static ESTIMATE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]\d{5}[A-Z]{0,3}_\d{3}E$").expect("static regex"));

/// How a raw cell is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Count,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub code: String,
    pub name: String,
    pub kind: FieldKind,
}

/// Ordered variable code → semantic field mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: Vec<FieldSpec>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field whose kind follows from the code: estimates are counts,
    /// anything else (`NAME`, annotations) stays text.
    pub fn infer(self, code: &str, name: &str) -> Self {
        let kind = if ESTIMATE_CODE.is_match(code) {
            FieldKind::Count
        } else {
            FieldKind::Text
        };
        self.with(code, name, kind)
    }

    pub fn with(mut self, code: &str, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            code: code.to_string(),
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    /// Variable codes in declaration order, as sent in the `get` parameter.
    pub fn codes(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.code.clone()).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(FieldMap::new(), |map, (code, name)| map.infer(code, name))
    }
}
