//! Map execution engine.
//!
//! A [`Map`] is a single-use builder: declare source vectors, target vectors
//! and a transform chain, then [`Map::execute`] it once. Execution runs in
//! four steps:
//!
//! 1. inject declared field metadata into transforms that accept it
//! 2. build one working row per source row over a shared [`ColumnIndex`]
//! 3. run the chain on every row with the calling convention picked from
//!    the source/target arity (see [`CallingConvention`])
//! 4. materialize the target vectors as columns of the target table
//!
//! Nothing is written to the target table unless every row succeeded and
//! every produced column fits the table.

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{MapError, MapResult, TableError};
use crate::metadata::FieldMetadata;
use crate::row::{ColumnIndex, KeySet, Row};
use crate::table::{DataSubject, Table};
use crate::transform::{Identity, Input, MetadataBinding, Transform};

/// How each transform in the chain is invoked, decided by arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    /// No sources, one target: called with no input.
    Nullary,
    /// One source, one target: called with the source scalar; the result is
    /// written to the target slot and back into the source slot.
    Scalar,
    /// Anything else: called with the whole working row.
    Row,
}

impl CallingConvention {
    pub fn for_arity(sources: usize, targets: usize) -> Self {
        match (sources, targets) {
            (0, 1) => CallingConvention::Nullary,
            (1, 1) => CallingConvention::Scalar,
            _ => CallingConvention::Row,
        }
    }
}

enum Tables<'a> {
    Split {
        source: &'a Table,
        target: &'a mut Table,
    },
    Same(&'a mut Table),
}

impl<'a> Tables<'a> {
    fn source(&self) -> &Table {
        match self {
            Tables::Split { source, .. } => *source,
            Tables::Same(table) => &**table,
        }
    }

    fn target(&self) -> &Table {
        match self {
            Tables::Split { target, .. } => &**target,
            Tables::Same(table) => &**table,
        }
    }

    fn into_target(self) -> &'a mut Table {
        match self {
            Tables::Split { target, .. } => target,
            Tables::Same(table) => table,
        }
    }
}

/// One source-to-target mapping step.
pub struct Map<'a> {
    tables: Tables<'a>,
    source_vectors: Vec<String>,
    target_vectors: Vec<String>,
    transforms: Vec<Box<dyn Transform + 'a>>,
    source_fields: Option<&'a FieldMetadata>,
    target_fields: Option<&'a FieldMetadata>,
}

impl<'a> Map<'a> {
    /// Map from `source` into a different `target` table.
    pub fn new(source: &'a Table, target: &'a mut Table) -> Self {
        Self::with_tables(Tables::Split { source, target })
    }

    /// Map within one table: sources are read from it and targets written back.
    pub fn in_place(table: &'a mut Table) -> Self {
        Self::with_tables(Tables::Same(table))
    }

    /// Map between two data subjects, using their field metadata.
    pub fn between(source: &'a DataSubject, target: &'a mut DataSubject) -> Self {
        let mut map = Self::new(&source.table, &mut target.table);
        map.source_fields = Some(&source.fields);
        map.target_fields = Some(&target.fields);
        map
    }

    /// Map within one data subject.
    pub fn within(subject: &'a mut DataSubject) -> Self {
        let mut map = Self::in_place(&mut subject.table);
        map.source_fields = Some(&subject.fields);
        map.target_fields = Some(&subject.fields);
        map
    }

    fn with_tables(tables: Tables<'a>) -> Self {
        Self {
            tables,
            source_vectors: Vec::new(),
            target_vectors: Vec::new(),
            transforms: Vec::new(),
            source_fields: None,
            target_fields: None,
        }
    }

    /// Append source vectors. Repeated names are kept.
    pub fn source<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_vectors.extend(names.into_iter().map(Into::into));
        self
    }

    /// Append target vectors. Repeated names are kept.
    pub fn target<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_vectors.extend(names.into_iter().map(Into::into));
        self
    }

    /// Append a transform to the chain.
    pub fn transform<T: Transform + 'a>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Use `fields` as the metadata of the source vectors.
    pub fn source_metadata(mut self, fields: &'a FieldMetadata) -> Self {
        self.source_fields = Some(fields);
        self
    }

    /// Use `fields` as the metadata of the target vectors.
    pub fn target_metadata(mut self, fields: &'a FieldMetadata) -> Self {
        self.target_fields = Some(fields);
        self
    }

    pub fn source_vectors(&self) -> &[String] {
        &self.source_vectors
    }

    pub fn target_vectors(&self) -> &[String] {
        &self.target_vectors
    }

    pub fn convention(&self) -> CallingConvention {
        CallingConvention::for_arity(self.source_vectors.len(), self.target_vectors.len())
    }

    /// Run the map and return the target table.
    pub fn execute(mut self) -> MapResult<&'a mut Table> {
        if self.transforms.is_empty() {
            self.transforms.push(Box::new(Identity));
        }
        self.inject_metadata();

        let convention = self.convention();
        let index = ColumnIndex::new(
            self.source_vectors
                .iter()
                .chain(&self.target_vectors)
                .cloned(),
        );
        let source_keys: KeySet = self.source_vectors.iter().cloned().collect();
        let row_count = self.tables.source().row_count();

        debug!(
            sources = ?self.source_vectors,
            targets = ?self.target_vectors,
            ?convention,
            rows = row_count,
            transforms = self.transforms.len(),
            "executing map"
        );

        let mut columns: Vec<std::vec::IntoIter<Value>> = self
            .working_columns(&index, &source_keys, row_count)?
            .into_iter()
            .map(Vec::into_iter)
            .collect();

        // Target columns to materialize, one per distinct name.
        let outputs: Vec<(String, usize)> = {
            let mut seen = KeySet::new();
            self.target_vectors
                .iter()
                .filter(|name| seen.insert((*name).clone()))
                .filter_map(|name| index.position(name).map(|pos| (name.clone(), pos)))
                .collect()
        };
        let mut buffers: Vec<Vec<Value>> = vec![Vec::with_capacity(row_count); outputs.len()];

        let scalar_slots = match convention {
            CallingConvention::Scalar => Some((
                index.position(&self.source_vectors[0]),
                index.position(&self.target_vectors[0]),
            )),
            _ => None,
        };

        for row_idx in 0..row_count {
            let values: Vec<Value> = columns
                .iter_mut()
                .map(|col| col.next().unwrap_or(Value::Null))
                .collect();
            let mut row = Row::padded(&index, values)
                .with_source_keys(&source_keys)
                .with_targets(&self.target_vectors);

            for (t_idx, transform) in self.transforms.iter_mut().enumerate() {
                let outcome = match (convention, scalar_slots) {
                    (CallingConvention::Scalar, Some((Some(src), Some(tgt)))) => {
                        let input = row.value_at(src).clone();
                        transform.call(Input::Value(input)).map(|out| {
                            row.set_at(tgt, out.clone());
                            row.set_at(src, out);
                        })
                    }
                    (CallingConvention::Nullary, _) => {
                        let target = &self.target_vectors[0];
                        transform
                            .call(Input::None)
                            .and_then(|out| row.set(target, out).map_err(Into::into))
                    }
                    _ => transform.call(Input::Row(&mut row)).map(|_| ()),
                };

                if let Err(source) = outcome {
                    debug!(row = row_idx, transform = t_idx, error = %source, "map aborted");
                    return Err(MapError::TransformExecution {
                        row: row_idx,
                        transform: t_idx,
                        source,
                    });
                }
            }

            let mut values = row.into_values();
            for (buffer, (_, pos)) in buffers.iter_mut().zip(&outputs) {
                buffer.push(std::mem::take(&mut values[*pos]));
            }
        }

        let target = self.tables.into_target();
        for ((name, _), buffer) in outputs.iter().zip(&buffers) {
            if !target.accepts_len(buffer.len()) {
                return Err(TableError::LengthMismatch {
                    name: name.clone(),
                    expected: target.row_count(),
                    actual: buffer.len(),
                }
                .into());
            }
        }
        for ((name, _), buffer) in outputs.into_iter().zip(buffers) {
            trace!(column = %name, "materializing column");
            target.set_column(name, buffer)?;
        }

        Ok(target)
    }

    fn inject_metadata(&mut self) {
        let empty = FieldMetadata::new();
        let source_fields = self.source_fields.unwrap_or(&empty);
        let target_fields = self.target_fields.unwrap_or(&empty);

        for transform in &mut self.transforms {
            if transform.accepts_source_metadata() {
                transform.set_source_metadata(MetadataBinding::for_vectors(
                    source_fields,
                    &self.source_vectors,
                ));
            }
            if transform.accepts_target_metadata() {
                transform.set_target_metadata(MetadataBinding::for_vectors(
                    target_fields,
                    &self.target_vectors,
                ));
            }
        }
    }

    /// Initial values for every index position.
    ///
    /// Source vectors come from the source table, falling back to the target
    /// table; pure targets start from their current column or `null`.
    fn working_columns(
        &self,
        index: &ColumnIndex,
        source_keys: &KeySet,
        row_count: usize,
    ) -> MapResult<Vec<Vec<Value>>> {
        let source = self.tables.source();
        let target = self.tables.target();

        index
            .names()
            .iter()
            .map(|name| {
                if source_keys.contains(name) {
                    source
                        .column(name)
                        .or_else(|| target.column(name))
                        .map(<[Value]>::to_vec)
                        .ok_or_else(|| MapError::from(TableError::unknown_column(name)))
                } else {
                    Ok(target
                        .column(name)
                        .map(<[Value]>::to_vec)
                        .unwrap_or_else(|| vec![Value::Null; row_count]))
                }
            })
            .collect()
    }
}
