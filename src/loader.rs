use log::warn;
use polars::prelude::*;
use rusqlite::{types::ValueRef, Connection, OpenFlags};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::errors::{DataError, Result};
use crate::record::{MeasurementRecord, TableMap};

/// Loads a measurement file and its companion metadata into a
/// [`MeasurementRecord`].
///
/// The data-file kind is determined strictly by extension: `.db` is a
/// sweep-database snapshot, `.csv` a flat spectral table. Metadata
/// resolution order: the explicit `metadata_path` argument, else a
/// non-empty same-stem `.json` sibling, else no metadata (a warning is
/// logged and the mapping is left empty).
pub fn load(data_path: &Path, metadata_path: Option<&Path>) -> Result<MeasurementRecord> {
    // Missing or unreadable paths surface as IO errors before dispatch.
    std::fs::metadata(data_path)?;

    let ext = data_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let tables = match ext.as_str() {
        "db" => read_db_tables(data_path)?,
        "csv" => {
            let stem = data_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("data");
            let mut tables = TableMap::new();
            tables.insert(stem, read_csv_table(data_path)?);
            tables
        }
        _ => return Err(DataError::UnsupportedFormat(data_path.display().to_string())),
    };

    let resolved = resolve_metadata_path(data_path, metadata_path);
    let metadata = match &resolved {
        Some(path) => read_metadata_json(path)?,
        None => {
            warn!(
                "no metadata file for {}; continuing with an empty mapping",
                data_path.display()
            );
            Map::new()
        }
    };

    Ok(MeasurementRecord::new(
        tables,
        metadata,
        data_path.to_path_buf(),
        resolved,
    ))
}

/// Writes a metadata mapping to the same-stem `.json` sibling of
/// `data_path`. The one write path in the crate; useful when data arrives
/// without a recorded metadata file.
pub fn write_metadata_json(data_path: &Path, metadata: &Map<String, Value>) -> Result<PathBuf> {
    let path = data_path.with_extension("json");
    let file = File::create(&path)?;
    serde_json::to_writer_pretty(file, &Value::Object(metadata.clone()))?;
    Ok(path)
}

/// Reads a sweep database: the fixed `experiments` and `runs` tables, then
/// one result table per row of `runs`, grouped by the first entry of the
/// run's comma-separated parameter list and aggregated by mean with
/// missing values dropped. Each run is a repeated sweep; grouping
/// collapses repeats at the same sweep-parameter value into one averaged
/// row.
fn read_db_tables(path: &Path) -> Result<TableMap> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let experiments = read_sql_table(&conn, "experiments")?;
    let runs = read_sql_table(&conn, "runs")?;

    let result_names = runs
        .column("result_table_name")
        .map_err(|_| DataError::MissingColumn("result_table_name".to_string()))?
        .str()?
        .clone();
    let parameters = runs
        .column("parameters")
        .map_err(|_| DataError::MissingColumn("parameters".to_string()))?
        .str()?
        .clone();

    let run_specs: Vec<(String, String)> = result_names
        .into_iter()
        .zip(parameters.into_iter())
        .filter_map(|(name, params)| match (name, params) {
            (Some(name), Some(params)) => Some((name.to_string(), params.to_string())),
            _ => None,
        })
        .collect();

    let mut tables = TableMap::new();
    tables.insert("experiments", experiments);
    tables.insert("runs", runs);
    for (table_name, params) in run_specs {
        let key = params.split(',').next().unwrap_or("").trim().to_string();
        let raw = read_sql_table(&conn, &table_name)?;
        tables.insert(table_name, group_mean(raw, &key)?);
    }
    Ok(tables)
}

/// Groups repeated rows by the sweep key and takes the NaN-ignoring mean
/// of every other column, sorted by the key.
fn group_mean(df: DataFrame, key: &str) -> Result<DataFrame> {
    if df.column(key).is_err() {
        return Err(DataError::MissingColumn(key.to_string()));
    }
    let grouped = df
        .lazy()
        .group_by([col(key)])
        .agg([col("*")
            .cast(DataType::Float64)
            .fill_nan(lit(NULL))
            .mean()])
        .sort([key], Default::default())
        .collect()?;
    Ok(grouped)
}

fn read_csv_table(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// One SQLite storage cell; used to infer a polars dtype per column.
#[derive(Clone)]
enum SqlCell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

/// Reads an entire SQLite table into a DataFrame. Column dtypes follow the
/// observed storage classes: any text makes a string column, any real a
/// float column, otherwise integers; NULLs are preserved.
fn read_sql_table(conn: &Connection, table: &str) -> Result<DataFrame> {
    let quoted = table.replace('"', "\"\"");
    let mut stmt = conn.prepare(&format!("SELECT * FROM \"{}\"", quoted))?;
    let names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut cells: Vec<Vec<SqlCell>> = vec![Vec::new(); names.len()];

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(match row.get_ref(i)? {
                ValueRef::Null => SqlCell::Null,
                ValueRef::Integer(v) => SqlCell::Int(v),
                ValueRef::Real(v) => SqlCell::Float(v),
                ValueRef::Text(t) => SqlCell::Text(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Blob(_) => SqlCell::Null,
            });
        }
    }

    let columns: Vec<Column> = names
        .into_iter()
        .zip(cells)
        .map(|(name, values)| column_from_cells(name, values))
        .collect();
    DataFrame::new(columns).map_err(DataError::from)
}

fn column_from_cells(name: String, cells: Vec<SqlCell>) -> Column {
    let name: PlSmallStr = name.into();
    let has_text = cells.iter().any(|c| matches!(c, SqlCell::Text(_)));
    let has_float = cells.iter().any(|c| matches!(c, SqlCell::Float(_)));
    let has_int = cells.iter().any(|c| matches!(c, SqlCell::Int(_)));

    if has_text {
        let values: Vec<Option<String>> = cells
            .into_iter()
            .map(|c| match c {
                SqlCell::Text(s) => Some(s),
                SqlCell::Int(v) => Some(v.to_string()),
                SqlCell::Float(v) => Some(v.to_string()),
                SqlCell::Null => None,
            })
            .collect();
        Series::new(name, values).into_column()
    } else if has_float {
        let values: Vec<Option<f64>> = cells
            .into_iter()
            .map(|c| match c {
                SqlCell::Float(v) => Some(v),
                SqlCell::Int(v) => Some(v as f64),
                _ => None,
            })
            .collect();
        Series::new(name, values).into_column()
    } else if has_int {
        let values: Vec<Option<i64>> = cells
            .into_iter()
            .map(|c| match c {
                SqlCell::Int(v) => Some(v),
                _ => None,
            })
            .collect();
        Series::new(name, values).into_column()
    } else {
        // Empty or all-NULL; a float column keeps aggregation uniform.
        let values: Vec<Option<f64>> = vec![None; cells.len()];
        Series::new(name, values).into_column()
    }
}

fn resolve_metadata_path(data_path: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let sibling = data_path.with_extension("json");
    match std::fs::metadata(&sibling) {
        Ok(meta) if meta.len() > 0 => Some(sibling),
        _ => None,
    }
}

fn read_metadata_json(path: &Path) -> Result<Map<String, Value>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "json" {
        return Err(DataError::UnsupportedFormat(path.display().to_string()));
    }
    let file = File::open(path)?;
    let document: Value = serde_json::from_reader(BufReader::new(file))?;
    match document {
        Value::Object(map) => Ok(map),
        _ => Err(DataError::Validation(
            "metadata document must be a JSON object".to_string(),
        )),
    }
}
