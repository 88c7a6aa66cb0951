// src/store/duck.rs

use anyhow::{Context, Result};
use duckdb::{params, params_from_iter, types::Value as DuckValue, Connection};
use std::{fs, path::PathBuf};
use tracing::{debug, info, instrument};

use super::schema::{ColumnType, TableSchema, KEY_COLUMN, UPDATED_COLUMN};
use super::{Connector, TableStore};
use crate::records::{MappedRecord, Value};

pub const IN_MEMORY: &str = ":memory:";

/// Opens a DuckDB file (created on demand) or an in-memory database.
#[derive(Debug, Clone)]
pub struct DuckConnector {
    target: String,
}

impl DuckConnector {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }
}

impl Connector for DuckConnector {
    type Store = DuckStore;

    fn connect(&self) -> Result<DuckStore> {
        if self.target == IN_MEMORY {
            return Ok(DuckStore {
                conn: Connection::open_in_memory().context("opening in-memory DuckDB")?,
            });
        }
        let path = PathBuf::from(&self.target);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {:?}", parent))?;
        }
        let conn =
            Connection::open(&path).with_context(|| format!("opening DuckDB at {:?}", path))?;
        info!(path = %path.display(), "database connection established");
        Ok(DuckStore { conn })
    }
}

pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn sql_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Text => "VARCHAR",
        ColumnType::Integer => "BIGINT",
        ColumnType::Float => "DOUBLE",
        ColumnType::Timestamp => "TIMESTAMP",
    }
}

fn create_sql(schema: &TableSchema) -> String {
    let mut defs: Vec<String> = schema
        .columns
        .iter()
        .map(|c| format!("{} {}", quote(&c.name), sql_type(c.ty)))
        .collect();
    if let Some(pk) = &schema.primary_key {
        defs.push(format!("PRIMARY KEY ({})", quote(pk)));
    }
    format!("CREATE TABLE {} ({})", quote(&schema.name), defs.join(", "))
}

fn insert_sql(schema: &TableSchema) -> String {
    let cols: Vec<String> = schema.columns.iter().map(|c| quote(&c.name)).collect();
    let slots: Vec<&str> = schema
        .columns
        .iter()
        .map(|c| match c.ty {
            ColumnType::Timestamp => "CAST(? AS TIMESTAMP)",
            _ => "?",
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(&schema.name),
        cols.join(", "),
        slots.join(", ")
    )
}

/// Bind values for one record in schema column order.
fn row_values(schema: &TableSchema, record: &MappedRecord) -> Vec<DuckValue> {
    schema
        .columns
        .iter()
        .map(|c| match c.name.as_str() {
            KEY_COLUMN => DuckValue::Text(record.state_code.clone()),
            UPDATED_COLUMN => DuckValue::Text(
                record
                    .last_updated
                    .naive_utc()
                    .format("%Y-%m-%d %H:%M:%S%.6f")
                    .to_string(),
            ),
            name => match record.get(name) {
                Value::Count(n) => DuckValue::BigInt(*n),
                Value::Ratio(p) => DuckValue::Double(*p),
                Value::Text(s) => DuckValue::Text(s.clone()),
                Value::Missing => DuckValue::Null,
            },
        })
        .collect()
}

impl TableStore for DuckStore {
    /// Drop, create and fill inside one transaction: readers see either the
    /// old table or the complete new one, and a failed insert keeps the old one.
    #[instrument(level = "info", skip_all, fields(table = %schema.name, rows = records.len()))]
    fn replace_table(&mut self, schema: &TableSchema, records: &[MappedRecord]) -> Result<usize> {
        let tx = self.conn.transaction().context("starting transaction")?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {}; {};",
            quote(&schema.name),
            create_sql(schema)
        ))
        .with_context(|| format!("recreating table {}", schema.name))?;

        {
            let mut stmt = tx
                .prepare(&insert_sql(schema))
                .with_context(|| format!("preparing insert into {}", schema.name))?;
            for record in records {
                stmt.execute(params_from_iter(row_values(schema, record)))
                    .with_context(|| {
                        format!("inserting {} into {}", record.state_code, schema.name)
                    })?;
            }
        }

        tx.commit()
            .with_context(|| format!("committing table {}", schema.name))?;
        debug!("table replaced");
        Ok(records.len())
    }

    fn row_count(&self, table: &str) -> Result<Option<u64>> {
        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            params![table],
            |r| r.get(0),
        )?;
        if exists == 0 {
            return Ok(None);
        }
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote(table)), [], |r| {
                r.get(0)
            })
            .with_context(|| format!("counting rows in {}", table))?;
        Ok(Some(n as u64))
    }

    fn state_codes(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT {0} FROM {1} ORDER BY {0}",
            quote(KEY_COLUMN),
            quote(table)
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("reading state codes from {}", table))?;
        let codes = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("reading state codes from {}", table))?;
        Ok(codes)
    }

    fn count_null_rows(&self, table: &str, columns: &[&str]) -> Result<u64> {
        if columns.is_empty() {
            return Ok(0);
        }
        let cond: Vec<String> = columns
            .iter()
            .map(|c| format!("{} IS NULL", quote(c)))
            .collect();
        self.count_where(table, &cond.join(" OR "))
    }

    fn count_out_of_range(&self, table: &str, columns: &[&str], lo: f64, hi: f64) -> Result<u64> {
        if columns.is_empty() {
            return Ok(0);
        }
        let cond: Vec<String> = columns
            .iter()
            .map(|c| format!("{0} < {1} OR {0} > {2}", quote(c), lo, hi))
            .collect();
        self.count_where(table, &cond.join(" OR "))
    }
}

impl DuckStore {
    fn count_where(&self, table: &str, cond: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", quote(table), cond);
        let n: i64 = self
            .conn
            .query_row(&sql, [], |r| r.get(0))
            .with_context(|| format!("querying {}", table))?;
        Ok(n as u64)
    }
}
