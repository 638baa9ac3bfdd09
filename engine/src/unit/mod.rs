//! Transform units and composition.
//!
//! A [`TransformUnit`] is a named, parameterized body of mapping logic. Before
//! it runs, its placeholders are bound to subjects of an enclosing
//! [`SubjectHost`] (a [`Job`], or the placeholders of a parent unit) with a
//! [`FieldMap`] translating parent field names to local ones.
//!
//! On execution every placeholder gets a translated snapshot of the mapped
//! columns and metadata of its subject. When the body succeeds, target
//! columns and metadata are translated back and applied to the host:
//! columns are replaced, metadata records are merged. Source snapshots are
//! discarded.
//!
//! ```text
//! declared --bind--> bound --execute--> executing --> completed
//!                                            \------> failed
//! ```

mod context;

pub use context::{Composer, UnitContext};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

use crate::error::{TableError, UnitError, UnitResult};
use crate::metadata::{FieldMap, FieldMetadata};
use crate::table::DataSubject;
use context::{Placeholder, Registry};

// =============================================================================
// Hosts
// =============================================================================

/// Anything that owns named data subjects a unit can bind to.
pub trait SubjectHost {
    fn subject(&self, name: &str) -> Option<&DataSubject>;

    fn subject_mut(&mut self, name: &str) -> Option<&mut DataSubject>;
}

/// The top-level owner of the data subjects of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Job {
    name: String,
    subjects: Vec<DataSubject>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subjects: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_subject(mut self, subject: DataSubject) -> Self {
        self.insert(subject);
        self
    }

    /// Add a subject, replacing any subject with the same name.
    pub fn insert(&mut self, subject: DataSubject) {
        match self.subjects.iter().position(|s| s.name == subject.name) {
            Some(idx) => self.subjects[idx] = subject,
            None => self.subjects.push(subject),
        }
    }

    pub fn subjects(&self) -> &[DataSubject] {
        &self.subjects
    }

    /// Remove and return a subject.
    pub fn take(&mut self, name: &str) -> Option<DataSubject> {
        let idx = self.subjects.iter().position(|s| s.name == name)?;
        Some(self.subjects.remove(idx))
    }

    /// Execute `unit` against this job's subjects.
    pub fn run(&mut self, unit: &mut TransformUnit) -> UnitResult<()> {
        info!(job = %self.name, unit = %unit.name(), "running unit");
        unit.execute(self)
    }
}

impl SubjectHost for Job {
    fn subject(&self, name: &str) -> Option<&DataSubject> {
        self.subjects.iter().find(|s| s.name == name)
    }

    fn subject_mut(&mut self, name: &str) -> Option<&mut DataSubject> {
        self.subjects.iter_mut().find(|s| s.name == name)
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Named parameters of a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params {
    values: BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// =============================================================================
// Unit
// =============================================================================

/// Which side of a unit a placeholder is declared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

/// Lifecycle of a [`TransformUnit`]. Failure is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Declared,
    Bound,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UnitState::Declared => "declared",
            UnitState::Bound => "bound",
            UnitState::Executing => "executing",
            UnitState::Completed => "completed",
            UnitState::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
struct Binding {
    side: Side,
    subject: String,
    placeholder: String,
    fields: FieldMap,
}

type Body = Box<dyn FnMut(&mut UnitContext<'_>) -> UnitResult<()>>;

/// A named, parameterized block of mapping logic.
pub struct TransformUnit {
    name: String,
    params: Params,
    bindings: Vec<Binding>,
    body: Body,
    state: UnitState,
}

impl fmt::Debug for TransformUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformUnit")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("bindings", &self.bindings)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl TransformUnit {
    pub fn new<F>(name: impl Into<String>, params: Params, body: F) -> Self
    where
        F: FnMut(&mut UnitContext<'_>) -> UnitResult<()> + 'static,
    {
        Self {
            name: name.into(),
            params,
            bindings: Vec::new(),
            body: Box::new(body),
            state: UnitState::Declared,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Declared source placeholders, in binding order.
    pub fn source_placeholders(&self) -> impl Iterator<Item = &str> {
        self.placeholders(Side::Source)
    }

    /// Declared target placeholders, in binding order.
    pub fn target_placeholders(&self) -> impl Iterator<Item = &str> {
        self.placeholders(Side::Target)
    }

    fn placeholders(&self, side: Side) -> impl Iterator<Item = &str> {
        self.bindings
            .iter()
            .filter(move |b| b.side == side)
            .map(|b| b.placeholder.as_str())
    }

    /// Bind `placeholder` to `subject` of the host as a read-only source.
    pub fn map_source_fields(
        &mut self,
        subject: &str,
        placeholder: &str,
        fields: FieldMap,
    ) -> UnitResult<&mut Self> {
        self.bind(Side::Source, subject, placeholder, fields)
    }

    /// Bind `placeholder` to `subject` of the host as a write-back target.
    pub fn map_target_fields(
        &mut self,
        subject: &str,
        placeholder: &str,
        fields: FieldMap,
    ) -> UnitResult<&mut Self> {
        self.bind(Side::Target, subject, placeholder, fields)
    }

    fn bind(
        &mut self,
        side: Side,
        subject: &str,
        placeholder: &str,
        fields: FieldMap,
    ) -> UnitResult<&mut Self> {
        if !matches!(self.state, UnitState::Declared | UnitState::Bound) {
            return Err(self.invalid_state());
        }

        match self.bindings.iter().position(|b| b.placeholder == placeholder) {
            Some(idx) => {
                let existing = &mut self.bindings[idx];
                if existing.side != side || existing.subject != subject {
                    return Err(UnitError::ConflictingBinding {
                        unit: self.name.clone(),
                        placeholder: placeholder.to_string(),
                    });
                }
                existing.fields.extend(fields);
            }
            None => self.bindings.push(Binding {
                side,
                subject: subject.to_string(),
                placeholder: placeholder.to_string(),
                fields,
            }),
        }

        self.state = UnitState::Bound;
        Ok(self)
    }

    fn invalid_state(&self) -> UnitError {
        UnitError::InvalidState {
            unit: self.name.clone(),
            state: self.state.to_string(),
        }
    }

    /// Run the body against `host` and write target placeholders back.
    ///
    /// A unit runs at most once; a failed unit must be rebuilt.
    pub fn execute(&mut self, host: &mut dyn SubjectHost) -> UnitResult<()> {
        if !matches!(self.state, UnitState::Declared | UnitState::Bound) {
            return Err(self.invalid_state());
        }

        self.state = UnitState::Executing;
        let outcome = self.run(host);
        self.state = match outcome {
            Ok(()) => UnitState::Completed,
            Err(_) => UnitState::Failed,
        };

        match &outcome {
            Ok(()) => debug!(unit = %self.name, "unit completed"),
            Err(e) => debug!(unit = %self.name, error = %e, "unit failed"),
        }
        outcome
    }

    fn run(&mut self, host: &mut dyn SubjectHost) -> UnitResult<()> {
        let mut registry = self.bind_views(&*host)?;

        {
            let mut ctx = UnitContext::new(&self.name, &self.params, &mut registry, &*host);
            (self.body)(&mut ctx)?;
        }

        let deltas: Vec<Delta> = registry
            .into_entries()
            .into_iter()
            .filter(|p| p.side == Side::Target)
            .map(Delta::from_placeholder)
            .collect();

        for delta in &deltas {
            delta.check(&self.name, &*host)?;
        }
        for delta in deltas {
            delta.apply(&self.name, host)?;
        }
        Ok(())
    }

    fn bind_views(&self, host: &dyn SubjectHost) -> UnitResult<Registry> {
        let mut registry = Registry::default();

        for binding in &self.bindings {
            let subject = host
                .subject(&binding.subject)
                .ok_or_else(|| UnitError::UnknownSubject {
                    unit: self.name.clone(),
                    subject: binding.subject.clone(),
                })?;

            let view = subject.translated(binding.placeholder.as_str(), &binding.fields);

            registry.push(Placeholder {
                name: binding.placeholder.clone(),
                side: binding.side,
                subject: binding.subject.clone(),
                fields: binding.fields.clone(),
                view,
            });
        }
        Ok(registry)
    }
}

// =============================================================================
// Write-back
// =============================================================================

/// Changes a target placeholder hands back to its host, in host names.
#[derive(Debug)]
struct Delta {
    subject: String,
    columns: Vec<(String, Vec<Value>)>,
    fields: FieldMetadata,
}

impl Delta {
    fn from_placeholder(placeholder: Placeholder) -> Self {
        let Placeholder {
            subject,
            fields: map,
            mut view,
            ..
        } = placeholder;

        let columns = map
            .pairs()
            .filter_map(|(parent, local)| {
                view.table
                    .remove_column(local)
                    .map(|values| (parent.to_string(), values))
            })
            .collect();

        Self {
            subject,
            columns,
            fields: view.fields.to_parent(&map),
        }
    }

    fn unknown_subject(&self, unit: &str) -> UnitError {
        UnitError::UnknownSubject {
            unit: unit.to_string(),
            subject: self.subject.clone(),
        }
    }

    fn check(&self, unit: &str, host: &dyn SubjectHost) -> UnitResult<()> {
        let subject = host
            .subject(&self.subject)
            .ok_or_else(|| self.unknown_subject(unit))?;

        for (name, values) in &self.columns {
            if !subject.table.accepts_len(values.len()) {
                return Err(TableError::LengthMismatch {
                    name: name.clone(),
                    expected: subject.table.row_count(),
                    actual: values.len(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn apply(self, unit: &str, host: &mut dyn SubjectHost) -> UnitResult<()> {
        let subject = host
            .subject_mut(&self.subject)
            .ok_or_else(|| self.unknown_subject(unit))?;

        for (name, values) in self.columns {
            subject.table.set_column(name, values)?;
        }
        subject.fields.merge_all(&self.fields);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use crate::transform::{row, scalar};
    use serde_json::json;

    fn job() -> Job {
        let source = DataSubject::new("raw").with_table(
            Table::from_columns([
                ("Titre", vec![json!(" a "), json!(" b ")]),
                ("Code", vec![json!("1"), json!("2")]),
            ])
            .unwrap(),
        );
        Job::new("test")
            .with_subject(source)
            .with_subject(DataSubject::new("clean"))
    }

    fn trim_unit() -> TransformUnit {
        TransformUnit::new("trim", Params::new(), |ctx| {
            ctx.map("in", "out")?
                .source(["title"])
                .target(["title"])
                .transform(scalar(|v: Value| Ok(json!(v.as_str().unwrap_or_default().trim()))))
                .execute()?;
            Ok(())
        })
    }

    #[test]
    fn test_unit_writes_back_translated_columns() {
        let mut job = job();
        let mut unit = trim_unit();
        unit.map_source_fields("raw", "in", FieldMap::new([("Titre", "title")]))
            .unwrap()
            .map_target_fields("clean", "out", FieldMap::new([("Title", "title")]))
            .unwrap();

        job.run(&mut unit).unwrap();

        let clean = job.subject("clean").unwrap();
        assert_eq!(clean.table.columns(), &["Title"]);
        assert_eq!(clean.table.get_column("Title").unwrap(), &[json!("a"), json!("b")]);
        assert_eq!(unit.state(), UnitState::Completed);
        // sources are snapshots
        assert_eq!(job.subject("raw").unwrap().table.get_column("Titre").unwrap()[0], json!(" a "));
    }

    #[test]
    fn test_target_view_keeps_existing_columns() {
        let mut job = job();
        job.insert(DataSubject::new("clean").with_table(
            Table::from_columns([("b", vec![json!("keep"), json!("keep")])]).unwrap(),
        ));
        let mut unit = TransformUnit::new("partial", Params::new(), |ctx| {
            assert_eq!(ctx.placeholder("out")?.table.columns(), &["b"]);
            ctx.map("in", "out")?
                .source(["code"])
                .target(["b", "c"])
                .transform(row(|r| {
                    let code = r.get("code")?.clone();
                    r.set("c", code)?;
                    Ok(())
                }))
                .execute()?;
            Ok(())
        });
        unit.map_source_fields("raw", "in", FieldMap::new([("Code", "code")]))
            .unwrap()
            .map_target_fields("clean", "out", FieldMap::identity(["b", "c"]))
            .unwrap();

        job.run(&mut unit).unwrap();

        let clean = job.subject("clean").unwrap();
        assert_eq!(clean.table.get_column("b").unwrap(), &[json!("keep"), json!("keep")]);
        assert_eq!(clean.table.get_column("c").unwrap(), &[json!("1"), json!("2")]);
    }

    #[test]
    fn test_state_transitions() {
        let mut job = job();
        let mut unit = trim_unit();
        assert_eq!(unit.state(), UnitState::Declared);

        unit.map_source_fields("raw", "in", FieldMap::new([("Titre", "title")])).unwrap();
        unit.map_target_fields("clean", "out", FieldMap::identity(["title"])).unwrap();
        assert_eq!(unit.state(), UnitState::Bound);

        job.run(&mut unit).unwrap();
        let err = job.run(&mut unit).unwrap_err();
        assert!(matches!(err, UnitError::InvalidState { ref state, .. } if state == "completed"));

        let err = unit
            .map_source_fields("raw", "other", FieldMap::identity(["Code"]))
            .unwrap_err();
        assert!(matches!(err, UnitError::InvalidState { .. }));
    }

    #[test]
    fn test_field_contract_mismatch() {
        let mut job = job();
        let mut unit = TransformUnit::new("contract", Params::new(), |ctx| {
            ctx.source("ph", &["x"])?;
            Ok(())
        });
        unit.map_source_fields("raw", "ph", FieldMap::new([("Titre", "y")])).unwrap();

        let err = job.run(&mut unit).unwrap_err();
        match err {
            UnitError::FieldMismatch { placeholder, expected, bound, .. } => {
                assert_eq!(placeholder, "ph");
                assert_eq!(expected, vec!["x"]);
                assert_eq!(bound, vec!["y"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(unit.state(), UnitState::Failed);
    }

    #[test]
    fn test_field_contract_is_order_insensitive() {
        let mut job = job();
        let mut unit = TransformUnit::new("contract", Params::new(), |ctx| {
            let view = ctx.source("ph", &["code", "title"])?;
            assert_eq!(view.table.columns(), &["title", "code"]);
            Ok(())
        });
        unit.map_source_fields("raw", "ph", FieldMap::new([("Titre", "title"), ("Code", "code")]))
            .unwrap();

        job.run(&mut unit).unwrap();
    }

    #[test]
    fn test_undeclared_placeholder_and_parameter() {
        let mut job = job();
        let mut unit = TransformUnit::new("missing", Params::new(), |ctx| {
            ctx.placeholder("nope")?;
            Ok(())
        });
        let err = job.run(&mut unit).unwrap_err();
        assert!(matches!(err, UnitError::UndeclaredPlaceholder { ref placeholder, .. } if placeholder == "nope"));

        let params: Params = [("known", json!(1))].into_iter().collect();
        let mut unit = TransformUnit::new("params", params, |ctx| {
            assert_eq!(ctx.param("known")?, &json!(1));
            ctx.param("unknown")?;
            Ok(())
        });
        let err = job.run(&mut unit).unwrap_err();
        assert!(matches!(err, UnitError::UndefinedParameter { ref key, .. } if key == "unknown"));
    }

    #[test]
    fn test_source_placeholder_is_not_a_target() {
        let mut job = job();
        let mut unit = TransformUnit::new("sides", Params::new(), |ctx| {
            ctx.target("in", &["title"])?;
            Ok(())
        });
        unit.map_source_fields("raw", "in", FieldMap::new([("Titre", "title")])).unwrap();

        let err = job.run(&mut unit).unwrap_err();
        assert!(matches!(err, UnitError::UndeclaredPlaceholder { .. }));
    }

    #[test]
    fn test_unknown_subject() {
        let mut job = job();
        let mut unit = trim_unit();
        unit.map_source_fields("nowhere", "in", FieldMap::identity(["title"])).unwrap();

        let err = job.run(&mut unit).unwrap_err();
        assert!(matches!(err, UnitError::UnknownSubject { ref subject, .. } if subject == "nowhere"));
    }

    #[test]
    fn test_conflicting_and_extending_bindings() {
        let mut unit = trim_unit();
        unit.map_source_fields("raw", "in", FieldMap::new([("Titre", "title")])).unwrap();
        unit.map_source_fields("raw", "in", FieldMap::new([("Code", "code")])).unwrap();

        let err = unit
            .map_source_fields("clean", "in", FieldMap::identity(["x"]))
            .unwrap_err();
        assert!(matches!(err, UnitError::ConflictingBinding { .. }));

        let err = unit
            .map_target_fields("raw", "in", FieldMap::identity(["x"]))
            .unwrap_err();
        assert!(matches!(err, UnitError::ConflictingBinding { .. }));
        assert_eq!(unit.source_placeholders().collect::<Vec<_>>(), vec!["in"]);
    }

    #[test]
    fn test_failed_body_leaves_host_untouched() {
        let mut job = job();
        let mut unit = TransformUnit::new("fails", Params::new(), |ctx| {
            ctx.map("in", "out")?.source(["title"]).target(["title"]).execute()?;
            ctx.placeholder_mut("out")?
                .fields
                .annotate("title", "touched", json!(true));
            ctx.param("missing")?;
            Ok(())
        });
        unit.map_source_fields("raw", "in", FieldMap::new([("Titre", "title")])).unwrap();
        unit.map_target_fields("clean", "out", FieldMap::identity(["title"])).unwrap();

        assert!(job.run(&mut unit).is_err());
        let clean = job.subject("clean").unwrap();
        assert_eq!(clean.table.column_count(), 0);
        assert!(clean.fields.is_empty());
    }

    #[test]
    fn test_job_insert_replaces() {
        let mut job = job();
        job.insert(DataSubject::new("clean").with_table(
            Table::from_columns([("x", vec![json!(1)])]).unwrap(),
        ));
        assert_eq!(job.subjects().len(), 2);
        assert_eq!(job.take("clean").unwrap().table.row_count(), 1);
        assert!(job.subject("clean").is_none());
    }
}
