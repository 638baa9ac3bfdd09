//! Execution context handed to a unit body.
//!
//! Placeholders live in a [`Registry`] keyed by name; a body reaches them
//! through [`UnitContext::placeholder`] (or the contract-checked
//! [`UnitContext::source`] / [`UnitContext::target`]) instead of generated
//! accessors. Child units run against the registry as their subject host.

use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use super::{Params, Side, SubjectHost, TransformUnit};
use crate::error::{UnitError, UnitResult};
use crate::map::Map;
use crate::metadata::FieldMap;
use crate::table::DataSubject;

/// A bound placeholder: where it came from and its translated view.
#[derive(Debug, Clone)]
pub(crate) struct Placeholder {
    pub(crate) name: String,
    pub(crate) side: Side,
    pub(crate) subject: String,
    pub(crate) fields: FieldMap,
    pub(crate) view: DataSubject,
}

/// Placeholder views of one unit execution.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: Vec<Placeholder>,
}

impl Registry {
    pub(crate) fn push(&mut self, placeholder: Placeholder) {
        self.entries.push(placeholder);
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|p| p.name == name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Placeholder> {
        self.entries.iter().find(|p| p.name == name)
    }

    pub(crate) fn into_entries(self) -> Vec<Placeholder> {
        self.entries
    }

    fn view_mut(&mut self, idx: usize) -> &mut DataSubject {
        &mut self.entries[idx].view
    }

    /// Borrow one view for reading and a different one for writing.
    fn pair_mut(&mut self, read: usize, write: usize) -> (&DataSubject, &mut DataSubject) {
        if read < write {
            let (left, right) = self.entries.split_at_mut(write);
            (&left[read].view, &mut right[0].view)
        } else {
            let (left, right) = self.entries.split_at_mut(read);
            (&right[0].view, &mut left[write].view)
        }
    }
}

impl SubjectHost for Registry {
    fn subject(&self, name: &str) -> Option<&DataSubject> {
        self.get(name).map(|p| &p.view)
    }

    fn subject_mut(&mut self, name: &str) -> Option<&mut DataSubject> {
        self.entries
            .iter_mut()
            .find(|p| p.name == name)
            .map(|p| &mut p.view)
    }
}

/// What a unit body sees while it runs.
pub struct UnitContext<'c> {
    unit: &'c str,
    params: &'c Params,
    placeholders: &'c mut Registry,
    host: &'c dyn SubjectHost,
}

impl<'c> UnitContext<'c> {
    pub(crate) fn new(
        unit: &'c str,
        params: &'c Params,
        placeholders: &'c mut Registry,
        host: &'c dyn SubjectHost,
    ) -> Self {
        Self {
            unit,
            params,
            placeholders,
            host,
        }
    }

    /// Name of the running unit.
    pub fn unit(&self) -> &str {
        self.unit
    }

    /// The enclosing job (or parent unit) the placeholders were bound from.
    pub fn host(&self) -> &dyn SubjectHost {
        self.host
    }

    pub fn params(&self) -> &Params {
        self.params
    }

    /// Bound parameter `key`.
    pub fn param(&self, key: &str) -> UnitResult<&Value> {
        self.params
            .get(key)
            .ok_or_else(|| UnitError::UndefinedParameter {
                unit: self.unit.to_string(),
                key: key.to_string(),
            })
    }

    fn undeclared(&self, placeholder: &str) -> UnitError {
        UnitError::UndeclaredPlaceholder {
            unit: self.unit.to_string(),
            placeholder: placeholder.to_string(),
        }
    }

    fn index(&self, placeholder: &str) -> UnitResult<usize> {
        self.placeholders
            .position(placeholder)
            .ok_or_else(|| self.undeclared(placeholder))
    }

    /// View bound to `placeholder`, without a field contract check.
    pub fn placeholder(&self, placeholder: &str) -> UnitResult<&DataSubject> {
        self.placeholders
            .get(placeholder)
            .map(|p| &p.view)
            .ok_or_else(|| self.undeclared(placeholder))
    }

    pub fn placeholder_mut(&mut self, placeholder: &str) -> UnitResult<&mut DataSubject> {
        let idx = self.index(placeholder)?;
        Ok(self.placeholders.view_mut(idx))
    }

    /// Local field names bound to `placeholder`, in binding order.
    pub fn fields(&self, placeholder: &str) -> UnitResult<Vec<String>> {
        self.placeholders
            .get(placeholder)
            .map(|p| p.fields.locals().map(str::to_string).collect())
            .ok_or_else(|| self.undeclared(placeholder))
    }

    /// Source view, asserting it is bound to exactly `expected` fields.
    pub fn source(&self, placeholder: &str, expected: &[&str]) -> UnitResult<&DataSubject> {
        let idx = self.checked(Side::Source, placeholder, expected)?;
        Ok(&self.placeholders.entries[idx].view)
    }

    /// Target view, asserting it is bound to exactly `expected` fields.
    pub fn target(&mut self, placeholder: &str, expected: &[&str]) -> UnitResult<&mut DataSubject> {
        let idx = self.checked(Side::Target, placeholder, expected)?;
        Ok(self.placeholders.view_mut(idx))
    }

    fn checked(&self, side: Side, placeholder: &str, expected: &[&str]) -> UnitResult<usize> {
        let idx = self
            .placeholders
            .position(placeholder)
            .filter(|&i| self.placeholders.entries[i].side == side)
            .ok_or_else(|| self.undeclared(placeholder))?;

        let bound: BTreeSet<&str> = self.placeholders.entries[idx].fields.locals().collect();
        let wanted: BTreeSet<&str> = expected.iter().copied().collect();
        if wanted.is_empty() || wanted != bound {
            return Err(UnitError::FieldMismatch {
                unit: self.unit.to_string(),
                placeholder: placeholder.to_string(),
                expected: expected.iter().map(|s| s.to_string()).collect(),
                bound: bound.into_iter().map(str::to_string).collect(),
            });
        }
        Ok(idx)
    }

    /// Start a [`Map`] reading from one placeholder and writing into another.
    ///
    /// Mapping a placeholder onto itself maps in place.
    pub fn map(&mut self, source: &str, target: &str) -> UnitResult<Map<'_>> {
        let read = self.index(source)?;
        let write = self.index(target)?;

        if read == write {
            return Ok(Map::within(self.placeholders.view_mut(write)));
        }
        let (source, target) = self.placeholders.pair_mut(read, write);
        Ok(Map::between(source, target))
    }

    /// Run `child` inside this unit.
    ///
    /// `compose` binds the child's placeholders to this unit's placeholders
    /// and may override its parameters. The child's target columns and field
    /// metadata are merged back into the placeholders they were bound to.
    pub fn import<F>(&mut self, child: &mut TransformUnit, compose: F) -> UnitResult<()>
    where
        F: FnOnce(&mut Composer<'_>) -> UnitResult<()>,
    {
        debug!(parent = %self.unit, child = %child.name(), "importing unit");
        {
            let mut composer = Composer {
                parent: self.unit,
                placeholders: &*self.placeholders,
                child: &mut *child,
            };
            compose(&mut composer)?;
        }
        child.execute(&mut *self.placeholders)
    }
}

/// Binding capabilities available while composing a child unit.
pub struct Composer<'p> {
    parent: &'p str,
    placeholders: &'p Registry,
    child: &'p mut TransformUnit,
}

impl Composer<'_> {
    fn require(&self, placeholder: &str) -> UnitResult<Side> {
        self.placeholders
            .get(placeholder)
            .map(|p| p.side)
            .ok_or_else(|| UnitError::UndeclaredPlaceholder {
                unit: self.parent.to_string(),
                placeholder: placeholder.to_string(),
            })
    }

    /// Bind the child's source placeholder to one of the parent's views.
    pub fn map_source_fields(
        &mut self,
        parent_placeholder: &str,
        child_placeholder: &str,
        fields: FieldMap,
    ) -> UnitResult<&mut Self> {
        self.require(parent_placeholder)?;
        self.child
            .map_source_fields(parent_placeholder, child_placeholder, fields)?;
        Ok(self)
    }

    /// Bind the child's target placeholder to one of the parent's target
    /// views. Parent sources are snapshots and cannot take writes.
    pub fn map_target_fields(
        &mut self,
        parent_placeholder: &str,
        child_placeholder: &str,
        fields: FieldMap,
    ) -> UnitResult<&mut Self> {
        if self.require(parent_placeholder)? == Side::Source {
            return Err(UnitError::ReadOnlyPlaceholder {
                unit: self.parent.to_string(),
                placeholder: parent_placeholder.to_string(),
            });
        }
        self.child
            .map_target_fields(parent_placeholder, child_placeholder, fields)?;
        Ok(self)
    }

    /// Override a child parameter; the last write wins.
    pub fn set_param(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.child.params_mut().set(key, value);
        self
    }
}
