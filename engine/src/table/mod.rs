//! Column-oriented tables and data subjects.
//!
//! [`Table`] is the in-memory table the engine consumes and produces: an
//! ordered set of named columns of equal length. Column order is insertion
//! order; replacing a column keeps its position.
//!
//! A [`DataSubject`] pairs a table with the [`FieldMetadata`] that describes
//! it. Jobs own their subjects; transform units see translated copies.

pub mod loader;

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{TableError, TableResult};
use crate::metadata::{FieldMap, FieldMetadata};

/// An ordered collection of named, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
    positions: HashMap<String, usize>,
    row_count: usize,
}

impl Table {
    /// Create an empty table; the first column written sets the row count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(name, values)` pairs, in order.
    pub fn from_columns<I, S>(columns: I) -> TableResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, values) in columns {
            table.set_column(name, values)?;
        }
        Ok(table)
    }

    /// Build a table from JSON objects, one per row, keeping `headers` order.
    ///
    /// Keys missing from a record load as `null`.
    pub fn from_records(headers: &[String], records: &[Value]) -> Self {
        let columns: Vec<Vec<Value>> = headers
            .iter()
            .map(|h| {
                records
                    .iter()
                    .map(|r| r.get(h).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        let positions = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();

        Self {
            names: headers.to_vec(),
            columns,
            positions,
            row_count: records.len(),
        }
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.names
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.names.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.positions.get(name).map(|&i| self.columns[i].as_slice())
    }

    /// Values of column `name`, failing with `UnknownColumn` if absent.
    pub fn get_column(&self, name: &str) -> TableResult<&[Value]> {
        self.column(name)
            .ok_or_else(|| TableError::unknown_column(name))
    }

    /// Whether a column of `len` values could be written.
    pub fn accepts_len(&self, len: usize) -> bool {
        self.names.is_empty() || len == self.row_count
    }

    /// Add or replace a column. The table is unchanged on error.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> TableResult<()> {
        let name = name.into();
        if !self.accepts_len(values.len()) {
            return Err(TableError::LengthMismatch {
                name,
                expected: self.row_count,
                actual: values.len(),
            });
        }

        if self.names.is_empty() {
            self.row_count = values.len();
        }

        match self.positions.get(&name) {
            Some(&i) => self.columns[i] = values,
            None => {
                self.positions.insert(name.clone(), self.names.len());
                self.names.push(name);
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// Remove a column, returning its values.
    pub fn remove_column(&mut self, name: &str) -> Option<Vec<Value>> {
        let idx = self.positions.remove(name)?;
        self.names.remove(idx);
        let values = self.columns.remove(idx);
        for pos in self.positions.values_mut() {
            if *pos > idx {
                *pos -= 1;
            }
        }
        if self.names.is_empty() {
            self.row_count = 0;
        }
        Some(values)
    }

    /// Copy the columns named by `map` under their local names.
    ///
    /// Parent columns that do not exist are skipped.
    pub fn to_local(&self, map: &FieldMap) -> Table {
        let mut out = Table::new();
        for (parent, local) in map.pairs() {
            if let Some(values) = self.column(parent) {
                out.positions.insert(local.to_string(), out.names.len());
                out.names.push(local.to_string());
                out.columns.push(values.to_vec());
            }
        }
        out.row_count = if out.names.is_empty() { 0 } else { self.row_count };
        out
    }

    /// Rows as JSON objects, keys in column order.
    pub fn to_records(&self) -> Vec<Value> {
        (0..self.row_count)
            .map(|row| {
                let obj: Map<String, Value> = self
                    .names
                    .iter()
                    .zip(&self.columns)
                    .map(|(name, col)| (name.clone(), col[row].clone()))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }
}

/// A table together with the field metadata describing its columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSubject {
    pub name: String,
    pub table: Table,
    pub fields: FieldMetadata,
}

impl DataSubject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: Table::new(),
            fields: FieldMetadata::new(),
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.table = table;
        self
    }

    pub fn with_fields(mut self, fields: FieldMetadata) -> Self {
        self.fields = fields;
        self
    }

    /// A renamed snapshot of this subject restricted to the fields of `map`.
    pub fn translated(&self, name: impl Into<String>, map: &FieldMap) -> DataSubject {
        DataSubject {
            name: name.into(),
            table: self.table.to_local(map),
            fields: self.fields.to_local(map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn abc() -> Table {
        Table::from_columns([
            ("a", vec![json!(1), json!(2), json!(3)]),
            ("b", vec![json!("x"), json!("y"), json!("z")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_columns_keep_insertion_order() {
        let mut table = abc();
        table.set_column("c", vec![json!(null); 3]).unwrap();
        table.set_column("a", vec![json!(0); 3]).unwrap();

        assert_eq!(table.columns(), &["a", "b", "c"]);
        assert_eq!(table.get_column("a").unwrap()[2], json!(0));
    }

    #[test]
    fn test_length_mismatch_leaves_table_unchanged() {
        let mut table = abc();
        let err = table.set_column("c", vec![json!(1)]).unwrap_err();

        assert_eq!(
            err,
            TableError::LengthMismatch {
                name: "c".into(),
                expected: 3,
                actual: 1
            }
        );
        assert!(!table.has_column("c"));
    }

    #[test]
    fn test_first_column_sets_row_count() {
        let mut table = Table::new();
        assert_eq!(table.row_count(), 0);
        table.set_column("a", vec![json!(1), json!(2)]).unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_unknown_column() {
        let table = abc();
        assert_eq!(
            table.get_column("nope").unwrap_err(),
            TableError::unknown_column("nope")
        );
    }

    #[test]
    fn test_remove_column_reindexes() {
        let mut table = abc();
        table.remove_column("a").unwrap();
        assert_eq!(table.columns(), &["b"]);
        assert_eq!(table.get_column("b").unwrap()[0], json!("x"));
    }

    #[test]
    fn test_records_round_trip() {
        let table = abc();
        let records = table.to_records();
        assert_eq!(records[1], json!({"a": 2, "b": "y"}));

        let back = Table::from_records(&table.columns().to_vec(), &records);
        assert_eq!(back, table);
    }

    #[test]
    fn test_translated_subject() {
        let mut subject = DataSubject::new("job_source").with_table(abc());
        subject.fields.annotate("b", "type", json!("string"));

        let view = subject.translated("ph", &FieldMap::new([("b", "letters"), ("missing", "m")]));

        assert_eq!(view.name, "ph");
        assert_eq!(view.table.columns(), &["letters"]);
        assert_eq!(view.table.row_count(), 3);
        assert_eq!(view.fields.get("letters")["type"], "string");
    }
}
