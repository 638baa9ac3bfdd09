//! Rows over a shared column index.
//!
//! A [`ColumnIndex`] maps column names to positions in a row's value array.
//! It is built once per `Map` execution and borrowed by every [`Row`], so the
//! name lookup is never rebuilt per row.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::error::{TableError, TableResult};

/// Immutable name -> position lookup shared by many rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    /// Build an index from names; duplicates keep their first position.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for name in names {
            let name = name.into();
            if !index.positions.contains_key(&name) {
                index.positions.insert(name.clone(), index.names.len());
                index.names.push(name);
            }
        }
        index
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Set of column names treated as sources within a row.
pub type KeySet = HashSet<String>;

/// One logical row: a borrowed index plus owned values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<'a> {
    index: &'a ColumnIndex,
    values: Vec<Value>,
    source_keys: Option<&'a KeySet>,
    targets: Option<&'a [String]>,
}

impl<'a> Row<'a> {
    /// Create a row holding exactly one value per index position.
    pub fn new(index: &'a ColumnIndex, values: Vec<Value>) -> TableResult<Self> {
        if values.len() != index.len() {
            return Err(TableError::RowWidth {
                expected: index.len(),
                actual: values.len(),
            });
        }
        Ok(Self::padded(index, values))
    }

    /// Create a row, padding with `null` or cutting to the index size.
    pub(crate) fn padded(index: &'a ColumnIndex, mut values: Vec<Value>) -> Self {
        values.resize(index.len(), Value::Null);
        Self {
            index,
            values,
            source_keys: None,
            targets: None,
        }
    }

    /// Restrict which keys count as sources; the rest are targets.
    pub fn with_source_keys(mut self, keys: &'a KeySet) -> Self {
        self.source_keys = Some(keys);
        self
    }

    /// Declare the vectors a map writes, which may overlap the sources.
    pub fn with_targets(mut self, targets: &'a [String]) -> Self {
        self.targets = Some(targets);
        self
    }

    pub fn index(&self) -> &ColumnIndex {
        self.index
    }

    fn position(&self, key: &str) -> TableResult<usize> {
        self.index
            .position(key)
            .ok_or_else(|| TableError::unknown_column(key))
    }

    pub fn get(&self, key: &str) -> TableResult<&Value> {
        let pos = self.position(key)?;
        Ok(&self.values[pos])
    }

    pub fn set(&mut self, key: &str, value: Value) -> TableResult<()> {
        let pos = self.position(key)?;
        self.values[pos] = value;
        Ok(())
    }

    pub(crate) fn value_at(&self, pos: usize) -> &Value {
        &self.values[pos]
    }

    pub(crate) fn set_at(&mut self, pos: usize, value: Value) {
        self.values[pos] = value;
    }

    pub fn is_source_key(&self, key: &str) -> bool {
        match self.source_keys {
            Some(keys) => keys.contains(key),
            None => self.index.position(key).is_some(),
        }
    }

    /// `(name, value)` pairs in index order.
    pub fn each(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.index
            .names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Pairs whose key is a source key, in index order.
    pub fn each_source(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.each().filter(move |(k, _)| self.is_source_key(k))
    }

    /// Pairs whose key is not a source key, in index order.
    pub fn each_target(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.each().filter(move |(k, _)| !self.is_source_key(k))
    }

    pub fn source_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.each_source().map(|(k, _)| k)
    }

    pub fn target_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.each_target().map(|(k, _)| k)
    }

    /// Vectors to write: the declared targets, or [`Row::target_keys`]
    /// when none were declared.
    pub fn write_keys(&self) -> Vec<&str> {
        match self.targets {
            Some(targets) => {
                let mut keys: Vec<&str> = Vec::with_capacity(targets.len());
                for name in targets {
                    if !keys.contains(&name.as_str()) {
                        keys.push(name);
                    }
                }
                keys
            }
            None => self.target_keys().collect(),
        }
    }

    /// Raw values in index order.
    pub fn to_sequence(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index() -> ColumnIndex {
        ColumnIndex::new(["a", "b", "c", "a"])
    }

    #[test]
    fn test_index_dedups_first_seen() {
        let index = index();
        assert_eq!(index.names(), &["a", "b", "c"]);
        assert_eq!(index.position("c"), Some(2));
    }

    #[test]
    fn test_get_and_set() {
        let index = index();
        let mut row = Row::new(&index, vec![json!(1), json!(2), json!(3)]).unwrap();

        row.set("b", json!("two")).unwrap();
        assert_eq!(row.get("b").unwrap(), &json!("two"));
        assert_eq!(row.to_sequence(), &[json!(1), json!("two"), json!(3)]);
    }

    #[test]
    fn test_unknown_key_fails() {
        let index = index();
        let mut row = Row::padded(&index, vec![]);

        assert_eq!(row.get("z").unwrap_err(), TableError::unknown_column("z"));
        assert!(row.set("z", json!(1)).is_err());
    }

    #[test]
    fn test_default_source_keys_are_all_keys() {
        let index = index();
        let row = Row::padded(&index, vec![]);

        assert_eq!(row.source_keys().count(), 3);
        assert_eq!(row.target_keys().count(), 0);
    }

    #[test]
    fn test_partitioned_keys_cover_row() {
        let index = index();
        let sources: KeySet = ["a", "c"].iter().map(|s| s.to_string()).collect();
        let row = Row::new(&index, vec![json!(1), json!(2), json!(3)]).unwrap().with_source_keys(&sources);

        let source: Vec<&str> = row.source_keys().collect();
        let target: Vec<&str> = row.target_keys().collect();
        assert_eq!(source, vec!["a", "c"]);
        assert_eq!(target, vec!["b"]);

        let mut union: Vec<&str> = source.iter().chain(&target).copied().collect();
        union.sort_unstable();
        let mut all: Vec<&str> = row.each().map(|(k, _)| k).collect();
        all.sort_unstable();
        assert_eq!(union, all);
    }

    #[test]
    fn test_each_is_restartable() {
        let index = index();
        let row = Row::new(&index, vec![json!(1), json!(2), json!(3)]).unwrap();

        let first: Vec<_> = row.each().collect();
        let second: Vec<_> = row.each().collect();
        assert_eq!(first, second);
        assert_eq!(first[1], ("b", &json!(2)));
    }

    #[test]
    fn test_width_must_match_index() {
        let index = index();

        let err = Row::new(&index, vec![json!(1)]).unwrap_err();
        assert_eq!(err, TableError::RowWidth { expected: 3, actual: 1 });
        assert_eq!(Row::padded(&index, vec![json!(1)]).to_sequence(), &[json!(1), Value::Null, Value::Null]);
    }

    #[test]
    fn test_declared_targets_may_overlap_sources() {
        let index = ColumnIndex::new(["first", "last"]);
        let sources: KeySet = ["first", "last"].iter().map(|s| s.to_string()).collect();
        let targets = vec!["first".to_string(), "first".to_string()];

        let row = Row::padded(&index, vec![])
            .with_source_keys(&sources)
            .with_targets(&targets);
        assert_eq!(row.target_keys().count(), 0);
        assert_eq!(row.write_keys(), vec!["first"]);

        let undeclared = Row::padded(&index, vec![]).with_source_keys(&sources);
        assert!(undeclared.write_keys().is_empty());
    }
}
