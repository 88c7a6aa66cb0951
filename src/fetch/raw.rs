// src/fetch/raw.rs

use serde_json::Value as Json;
use thiserror::Error;

/// Payload shape problems. These are never retried.
#[derive(Debug, Error, PartialEq)]
pub enum ResponseParseError {
    #[error("response is not valid JSON: {0}")]
    Json(String),
    #[error("response is not an array of rows")]
    NotTabular,
    #[error("response has no header row")]
    MissingHeader,
    #[error("header cell {index} is not a string")]
    BadHeaderCell { index: usize },
    #[error("row {row} has {found} cells, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {row} cell {index} is not a scalar")]
    BadCell { row: usize, index: usize },
}

/// Header row plus data rows exactly as the API returned them.
/// `None` cells were JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawResponse {
    /// Decode an API body (`[[header..], [row..], ..]`).
    pub fn from_json(body: &str) -> Result<Self, ResponseParseError> {
        let parsed: Json =
            serde_json::from_str(body).map_err(|e| ResponseParseError::Json(e.to_string()))?;
        let Json::Array(mut outer) = parsed else {
            return Err(ResponseParseError::NotTabular);
        };
        if outer.is_empty() {
            return Err(ResponseParseError::MissingHeader);
        }

        let header = match outer.remove(0) {
            Json::Array(cells) => cells
                .into_iter()
                .enumerate()
                .map(|(index, cell)| match cell {
                    Json::String(s) => Ok(s),
                    _ => Err(ResponseParseError::BadHeaderCell { index }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(ResponseParseError::NotTabular),
        };

        let mut rows = Vec::with_capacity(outer.len());
        for (i, row) in outer.into_iter().enumerate() {
            // row numbers in errors count the header as row 0
            let row_no = i + 1;
            let Json::Array(cells) = row else {
                return Err(ResponseParseError::NotTabular);
            };
            if cells.len() != header.len() {
                return Err(ResponseParseError::RaggedRow {
                    row: row_no,
                    expected: header.len(),
                    found: cells.len(),
                });
            }
            let cells = cells
                .into_iter()
                .enumerate()
                .map(|(index, cell)| match cell {
                    Json::Null => Ok(None),
                    Json::String(s) => Ok(Some(s)),
                    Json::Number(n) => Ok(Some(n.to_string())),
                    Json::Bool(b) => Ok(Some(b.to_string())),
                    _ => Err(ResponseParseError::BadCell { row: row_no, index }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(cells);
        }

        Ok(Self { header, rows })
    }

    /// Position of `name` in the header.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
