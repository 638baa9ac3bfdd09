//! Transform callables.
//!
//! A [`Transform`] is one element of a `Map`'s transform chain. The map picks
//! the calling convention from its source/target arity and hands the transform
//! an [`Input`]:
//!
//! | sources | targets | input |
//! |---------|---------|-------|
//! | 0 | 1 | [`Input::None`] |
//! | 1 | 1 | [`Input::Value`] |
//! | 1 | N | [`Input::Row`] |
//! | N | any | [`Input::Row`] |
//!
//! Transforms that want to inspect declared field metadata opt in through
//! [`Transform::accepts_source_metadata`] / [`Transform::accepts_target_metadata`];
//! the map then injects a [`MetadataBinding`] before the first row.
//!
//! - [`ops`] - serializable library of reusable operations

pub mod ops;

use serde_json::Value;
use std::fmt;

use crate::error::{TransformError, TransformResult};
use crate::metadata::{Annotations, FieldMetadata};
use crate::row::Row;

pub use ops::{operations_description, Operation, OperationTransform};

/// What a transform receives for one working row.
pub enum Input<'r, 'a> {
    /// No source vectors: produce a value from nothing.
    None,
    /// Exactly one source and one target: the source scalar.
    Value(Value),
    /// Any other arity: the whole working row, mutated in place.
    Row(&'r mut Row<'a>),
}

impl Input<'_, '_> {
    /// Short label used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Input::None => "no",
            Input::Value(_) => "scalar",
            Input::Row(_) => "row",
        }
    }
}

impl fmt::Debug for Input<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::None => f.write_str("Input::None"),
            Input::Value(v) => f.debug_tuple("Input::Value").field(v).finish(),
            Input::Row(row) => f.debug_tuple("Input::Row").field(row).finish(),
        }
    }
}

/// Field metadata for the declared vectors of a map.
///
/// One record when exactly one vector is declared, otherwise one record per
/// vector in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataBinding {
    Single(Annotations),
    Many(Vec<Annotations>),
}

impl MetadataBinding {
    pub fn for_vectors(fields: &FieldMetadata, names: &[String]) -> Self {
        match names {
            [only] => MetadataBinding::Single(fields.get(only).clone()),
            _ => MetadataBinding::Many(names.iter().map(|n| fields.get(n).clone()).collect()),
        }
    }

    /// Record for the single declared vector, if there is exactly one.
    pub fn single(&self) -> Option<&Annotations> {
        match self {
            MetadataBinding::Single(a) => Some(a),
            MetadataBinding::Many(_) => None,
        }
    }

    /// Annotation `key` of the single declared vector.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.single().and_then(|a| a.get(key))
    }
}

/// One callable element of a transform chain.
pub trait Transform {
    /// Label used in logs and errors.
    fn name(&self) -> &str {
        "transform"
    }

    fn call(&mut self, input: Input<'_, '_>) -> TransformResult<Value>;

    fn accepts_source_metadata(&self) -> bool {
        false
    }

    fn accepts_target_metadata(&self) -> bool {
        false
    }

    fn set_source_metadata(&mut self, _metadata: MetadataBinding) {}

    fn set_target_metadata(&mut self, _metadata: MetadataBinding) {}
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn call(&mut self, input: Input<'_, '_>) -> TransformResult<Value> {
        (**self).call(input)
    }

    fn accepts_source_metadata(&self) -> bool {
        (**self).accepts_source_metadata()
    }

    fn accepts_target_metadata(&self) -> bool {
        (**self).accepts_target_metadata()
    }

    fn set_source_metadata(&mut self, metadata: MetadataBinding) {
        (**self).set_source_metadata(metadata)
    }

    fn set_target_metadata(&mut self, metadata: MetadataBinding) {
        (**self).set_target_metadata(metadata)
    }
}

pub(crate) fn unsupported(transform: &str, input: &Input<'_, '_>) -> TransformError {
    TransformError::UnsupportedInput {
        transform: transform.to_string(),
        input: input.kind().to_string(),
    }
}

/// Returns its input unchanged; installed when a map has no transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn call(&mut self, input: Input<'_, '_>) -> TransformResult<Value> {
        match input {
            Input::Value(v) => Ok(v),
            Input::None | Input::Row(_) => Ok(Value::Null),
        }
    }
}

/// Closure over a single scalar value.
pub struct Scalar<F>(F);

/// Closure that takes no input.
pub struct Nullary<F>(F);

/// Closure over the whole working row.
pub struct RowFn<F>(F);

/// Closure that handles every calling convention itself.
pub struct FromFn<F>(F);

/// Wrap `f: Value -> Value` as a transform for 1-to-1 maps.
pub fn scalar<F>(f: F) -> Scalar<F>
where
    F: FnMut(Value) -> TransformResult<Value>,
{
    Scalar(f)
}

/// Wrap `f: () -> Value` as a transform; any input is ignored.
pub fn nullary<F>(f: F) -> Nullary<F>
where
    F: FnMut() -> TransformResult<Value>,
{
    Nullary(f)
}

/// Wrap `f: &mut Row` as a transform for row-convention maps.
pub fn row<F>(f: F) -> RowFn<F>
where
    F: FnMut(&mut Row<'_>) -> TransformResult<()>,
{
    RowFn(f)
}

/// Wrap a closure that dispatches on [`Input`] itself.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut(Input<'_, '_>) -> TransformResult<Value>,
{
    FromFn(f)
}

impl<F> Transform for Scalar<F>
where
    F: FnMut(Value) -> TransformResult<Value>,
{
    fn name(&self) -> &str {
        "scalar"
    }

    fn call(&mut self, input: Input<'_, '_>) -> TransformResult<Value> {
        match input {
            Input::Value(v) => (self.0)(v),
            other => Err(unsupported("scalar", &other)),
        }
    }
}

impl<F> Transform for Nullary<F>
where
    F: FnMut() -> TransformResult<Value>,
{
    fn name(&self) -> &str {
        "nullary"
    }

    fn call(&mut self, input: Input<'_, '_>) -> TransformResult<Value> {
        match input {
            Input::None | Input::Value(_) => (self.0)(),
            Input::Row(_) => Err(unsupported("nullary", &input)),
        }
    }
}

impl<F> Transform for RowFn<F>
where
    F: FnMut(&mut Row<'_>) -> TransformResult<()>,
{
    fn name(&self) -> &str {
        "row"
    }

    fn call(&mut self, input: Input<'_, '_>) -> TransformResult<Value> {
        match input {
            Input::Row(row) => (self.0)(row).map(|()| Value::Null),
            other => Err(unsupported("row", &other)),
        }
    }
}

impl<F> Transform for FromFn<F>
where
    F: FnMut(Input<'_, '_>) -> TransformResult<Value>,
{
    fn name(&self) -> &str {
        "from_fn"
    }

    fn call(&mut self, input: Input<'_, '_>) -> TransformResult<Value> {
        (self.0)(input)
    }
}
