//! Field metadata: per-column annotation records and their merge rule.
//!
//! A [`FieldMetadata`] store maps a column name to an [`Annotations`] record
//! (type, format, lineage tags, anything a job wants to attach). Stores are
//! owned by the data subject they describe. Metadata for a column that does
//! not exist yet is legal and stays inert until the column is created.
//!
//! Merging is a shallow union where the incoming record wins on conflicting
//! keys, so lineage tags accumulate across composition boundaries instead of
//! being overwritten.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Annotation record for a single field.
pub type Annotations = Map<String, Value>;

static EMPTY: Lazy<Annotations> = Lazy::new(Annotations::new);

/// Merge `incoming` into `base`: keys from `incoming` win, all others are kept.
pub fn merge_annotations(base: &mut Annotations, incoming: &Annotations) {
    for (key, value) in incoming {
        base.insert(key.clone(), value.clone());
    }
}

/// Mapping from column name to its annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMetadata {
    fields: BTreeMap<String, Annotations>,
}

impl FieldMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotations for `name`, or an empty record if undeclared.
    pub fn get(&self, name: &str) -> &Annotations {
        self.fields.get(name).unwrap_or(&EMPTY)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Replace the annotations for `name`.
    pub fn set(&mut self, name: impl Into<String>, annotations: Annotations) {
        self.fields.insert(name.into(), annotations);
    }

    /// Set a single annotation key on `name`, creating the record if needed.
    pub fn annotate(&mut self, name: impl Into<String>, key: impl Into<String>, value: Value) {
        self.fields
            .entry(name.into())
            .or_default()
            .insert(key.into(), value);
    }

    /// Merge `incoming` into the record for `name` (see [`merge_annotations`]).
    pub fn merge(&mut self, name: impl Into<String>, incoming: &Annotations) {
        let entry = self.fields.entry(name.into()).or_default();
        merge_annotations(entry, incoming);
    }

    /// Merge every record of `other` into this store.
    pub fn merge_all(&mut self, other: &FieldMetadata) {
        for (name, annotations) in &other.fields {
            self.merge(name.clone(), annotations);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Annotations)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy the records named by `map` under their local names.
    pub fn to_local(&self, map: &FieldMap) -> FieldMetadata {
        let mut out = FieldMetadata::new();
        for (parent, local) in map.pairs() {
            if let Some(annotations) = self.fields.get(parent) {
                out.set(local, annotations.clone());
            }
        }
        out
    }

    /// Copy the records named by `map` back under their parent names.
    pub fn to_parent(&self, map: &FieldMap) -> FieldMetadata {
        let mut out = FieldMetadata::new();
        for (parent, local) in map.pairs() {
            if let Some(annotations) = self.fields.get(local) {
                out.set(parent, annotations.clone());
            }
        }
        out
    }
}

impl<K: Into<String>> FromIterator<(K, Annotations)> for FieldMetadata {
    fn from_iter<I: IntoIterator<Item = (K, Annotations)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Ordered field-name translation from a parent's names to a placeholder's
/// local names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMap {
    pairs: Vec<(String, String)>,
}

impl FieldMap {
    pub fn new<I, P, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, L)>,
        P: Into<String>,
        L: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(p, l)| (p.into(), l.into()))
                .collect(),
        }
    }

    /// A map that keeps every name unchanged.
    pub fn identity<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pairs: names
                .into_iter()
                .map(|n| {
                    let n = n.into();
                    (n.clone(), n)
                })
                .collect(),
        }
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(p, l)| (p.as_str(), l.as_str()))
    }

    pub fn locals(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, l)| l.as_str())
    }

    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(p, _)| p.as_str())
    }

    pub fn to_local(&self, parent: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(p, _)| p == parent)
            .map(|(_, l)| l.as_str())
    }

    pub fn to_parent(&self, local: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(_, l)| l == local)
            .map(|(p, _)| p.as_str())
    }

    /// Append pairs from `other` whose local name is not mapped yet.
    pub fn extend(&mut self, other: FieldMap) {
        for (parent, local) in other.pairs {
            if self.to_parent(&local).is_none() {
                self.pairs.push((parent, local));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
