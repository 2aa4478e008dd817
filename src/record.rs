use polars::prelude::*;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::errors::{DataError, Result};

/// Insertion-ordered mapping from table name to its DataFrame.
///
/// Transport databases yield the bookkeeping tables first (`experiments`,
/// `runs`) followed by one grouped result table per run, in the order the
/// runs were recorded; that order is preserved here.
#[derive(Debug, Default, Clone)]
pub struct TableMap {
    entries: Vec<(String, DataFrame)>,
}

impl TableMap {
    pub fn new() -> Self {
        TableMap::default()
    }

    /// Inserts a table, replacing any existing table of the same name.
    pub fn insert(&mut self, name: impl Into<String>, table: DataFrame) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = table,
            None => self.entries.push((name, table)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DataFrame> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DataFrame> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataFrame)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    fn first_mut(&mut self) -> Option<(&str, &mut DataFrame)> {
        self.entries.first_mut().map(|(n, t)| (n.as_str(), t))
    }
}

/// A scale factor argument that is either given directly or looked up in
/// the record's metadata by key. Explicit values override metadata.
#[derive(Debug, Clone)]
pub enum Param {
    Fixed(f64),
    Key(String),
}

/// A loaded measurement: the table collection, its metadata mapping, and
/// references to the originating files.
///
/// Created once by the loader; signal processors only ever append columns
/// to `tables` and never touch `metadata`.
#[derive(Debug, Clone)]
pub struct MeasurementRecord {
    tables: TableMap,
    metadata: Map<String, Value>,
    source_path: PathBuf,
    metadata_path: Option<PathBuf>,
}

impl MeasurementRecord {
    pub(crate) fn new(
        tables: TableMap,
        metadata: Map<String, Value>,
        source_path: PathBuf,
        metadata_path: Option<PathBuf>,
    ) -> Self {
        MeasurementRecord {
            tables,
            metadata,
            source_path,
            metadata_path,
        }
    }

    pub fn tables(&self) -> &TableMap {
        &self.tables
    }

    /// Looks up a table by experiment/result-table name.
    pub fn table(&self, name: &str) -> Result<&DataFrame> {
        self.tables
            .get(name)
            .ok_or_else(|| DataError::MissingExperiment(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut DataFrame> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DataError::MissingExperiment(name.to_string()))
    }

    /// The single table of a spectral record (the first table loaded).
    pub fn primary_table(&self) -> Result<&DataFrame> {
        self.tables
            .iter()
            .next()
            .map(|(_, t)| t)
            .ok_or_else(|| DataError::Validation("record holds no tables".to_string()))
    }

    pub fn primary_table_mut(&mut self) -> Result<&mut DataFrame> {
        self.tables
            .first_mut()
            .map(|(_, t)| t)
            .ok_or_else(|| DataError::Validation("record holds no tables".to_string()))
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Numeric metadata lookup; integers widen to f64.
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }

    /// Resolves an optional scale factor: explicit values pass through,
    /// keys must name a numeric metadata entry.
    pub fn resolve_param(&self, param: Option<&Param>) -> Result<Option<f64>> {
        match param {
            None => Ok(None),
            Some(Param::Fixed(value)) => Ok(Some(*value)),
            Some(Param::Key(key)) => self
                .metadata_f64(key)
                .map(Some)
                .ok_or_else(|| DataError::MissingMetadataKey(key.clone())),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn metadata_path(&self) -> Option<&Path> {
        self.metadata_path.as_deref()
    }
}

/// Reads a column as f64 values, widening integers and mapping nulls to
/// NaN. Absence is a `MissingColumn` precondition violation.
pub(crate) fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| DataError::MissingColumn(name.to_string()))?;
    let casted = column.cast(&DataType::Float64)?;
    let values = casted.f64()?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Reads a column by position, same widening rules as [`column_f64`].
pub(crate) fn column_f64_at(df: &DataFrame, index: usize) -> Result<Vec<f64>> {
    let columns = df.get_columns();
    let column = columns.get(index).ok_or_else(|| {
        DataError::MissingColumn(format!("column index {} out of range", index))
    })?;
    let casted = column.cast(&DataType::Float64)?;
    let values = casted.f64()?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str) -> DataFrame {
        DataFrame::new(vec![Column::new(name.into(), &[1.0f64, 2.0])]).unwrap()
    }

    #[test]
    fn test_table_map_preserves_insertion_order() {
        let mut tables = TableMap::new();
        tables.insert("experiments", frame("a"));
        tables.insert("runs", frame("b"));
        tables.insert("results-1-1", frame("c"));
        let names: Vec<&str> = tables.names().collect();
        assert_eq!(names, vec!["experiments", "runs", "results-1-1"]);
    }

    #[test]
    fn test_table_map_insert_replaces() {
        let mut tables = TableMap::new();
        tables.insert("t", frame("a"));
        tables.insert("t", frame("b"));
        assert_eq!(tables.len(), 1);
        assert!(tables.get("t").unwrap().column("b").is_ok());
    }

    #[test]
    fn test_resolve_param() {
        let mut metadata = Map::new();
        metadata.insert("gain".to_string(), serde_json::json!(100.0));
        let mut tables = TableMap::new();
        tables.insert("t", frame("a"));
        let record = MeasurementRecord::new(tables, metadata, PathBuf::new(), None);

        assert_eq!(record.resolve_param(None).unwrap(), None);
        assert_eq!(
            record
                .resolve_param(Some(&Param::Fixed(2.0)))
                .unwrap(),
            Some(2.0)
        );
        assert_eq!(
            record
                .resolve_param(Some(&Param::Key("gain".to_string())))
                .unwrap(),
            Some(100.0)
        );
        let missing = record.resolve_param(Some(&Param::Key("sens".to_string())));
        assert!(matches!(missing, Err(DataError::MissingMetadataKey(_))));
    }

    #[test]
    fn test_missing_table_is_missing_experiment() {
        let mut tables = TableMap::new();
        tables.insert("t", frame("a"));
        let record = MeasurementRecord::new(tables, Map::new(), PathBuf::new(), None);
        assert!(matches!(
            record.table("nope"),
            Err(DataError::MissingExperiment(_))
        ));
    }
}
