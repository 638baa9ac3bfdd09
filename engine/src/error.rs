//! Error types for the field-mapping engine.
//!
//! This module defines one error type per area:
//!
//! - [`TableError`] - Column lookups and column writes
//! - [`TransformError`] - Failures raised inside a transform callable
//! - [`MapError`] - `Map` execution errors
//! - [`UnitError`] - Transform unit binding, contracts and composition
//! - [`LoadError`] - CSV loading errors
//! - [`PlanError`] - Declarative plan and pipeline errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Table Errors
// =============================================================================

/// Errors raised by tables and rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A row or table was accessed by a name it does not carry.
    #[error("Unknown column: {name}")]
    UnknownColumn { name: String },

    /// A column write does not match the table's row count.
    #[error("Column '{name}' has {actual} values, table has {expected} rows")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A row was built with a different number of values than its index.
    #[error("Row has {actual} values, index has {expected} columns")]
    RowWidth { expected: usize, actual: usize },
}

impl TableError {
    pub fn unknown_column(name: impl Into<String>) -> Self {
        Self::UnknownColumn { name: name.into() }
    }
}

// =============================================================================
// Transform Errors
// =============================================================================

/// Errors raised by a transform callable.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The transform touched a column the working row does not carry.
    #[error(transparent)]
    Column(#[from] TableError),

    /// The transform could not convert the value it received.
    #[error("{transform}: cannot handle value {value}: {message}")]
    InvalidValue {
        transform: String,
        value: String,
        message: String,
    },

    /// The transform does not support the calling convention it was given.
    #[error("{transform} does not accept {input} input")]
    UnsupportedInput { transform: String, input: String },

    /// A regex pattern failed to compile.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Free-form failure from a user-supplied closure.
    #[error("{0}")]
    Failed(String),
}

// =============================================================================
// Map Errors
// =============================================================================

/// Errors during `Map` execution.
#[derive(Debug, Error)]
pub enum MapError {
    /// A declared vector could not be resolved, or a column write was rejected.
    #[error(transparent)]
    Column(#[from] TableError),

    /// A transform failed; the whole map is aborted.
    #[error("Transform #{transform} failed on row {row}: {source}")]
    TransformExecution {
        row: usize,
        transform: usize,
        source: TransformError,
    },
}

// =============================================================================
// Unit Errors
// =============================================================================

/// Errors raised while binding, executing or composing transform units.
#[derive(Debug, Error)]
pub enum UnitError {
    /// A placeholder was used before it was bound.
    #[error("{unit}: no such placeholder '{placeholder}'")]
    UndeclaredPlaceholder { unit: String, placeholder: String },

    /// The asserted field contract does not match the bound fields.
    #[error("{unit}: placeholder '{placeholder}' expects fields {expected:?} but is bound to {bound:?}")]
    FieldMismatch {
        unit: String,
        placeholder: String,
        expected: Vec<String>,
        bound: Vec<String>,
    },

    /// A parameter was referenced but never bound.
    #[error("{unit}: undefined parameter '{key}'")]
    UndefinedParameter { unit: String, key: String },

    /// A binding refers to a subject the enclosing context does not have.
    #[error("{unit}: unknown subject '{subject}'")]
    UnknownSubject { unit: String, subject: String },

    /// A placeholder was bound twice to different subjects.
    #[error("{unit}: placeholder '{placeholder}' is already bound to another subject")]
    ConflictingBinding { unit: String, placeholder: String },

    /// A child target was bound to a read-only source placeholder.
    #[error("{unit}: placeholder '{placeholder}' is a source and cannot receive writes")]
    ReadOnlyPlaceholder { unit: String, placeholder: String },

    /// The unit is not in a state that allows the requested operation.
    #[error("{unit}: operation not allowed in state {state}")]
    InvalidState { unit: String, state: String },

    /// A map inside the unit body failed.
    #[error("Map error: {0}")]
    Map(#[from] MapError),

    /// A table operation inside the unit failed.
    #[error(transparent)]
    Column(#[from] TableError),
}

// =============================================================================
// Load Errors
// =============================================================================

/// Errors while loading a CSV file into a table.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Content could not be decoded.
    #[error("Failed to decode content as {encoding}")]
    Encoding { encoding: String },

    /// Invalid CSV format.
    #[error("Invalid CSV format: {0}")]
    Csv(#[from] csv::Error),

    /// Empty file.
    #[error("CSV input is empty")]
    EmptyInput,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Plan Errors (top-level)
// =============================================================================

/// Top-level plan and pipeline errors.
///
/// This is the main error type returned by [`crate::pipeline::run_csv`].
#[derive(Debug, Error)]
pub enum PlanError {
    /// Plan JSON could not be parsed or written.
    #[error("Plan JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The plan is structurally invalid.
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// The plan unit failed.
    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),

    /// The input could not be loaded.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// IO error while reading the plan or writing output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for transform callables.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for map execution.
pub type MapResult<T> = Result<T, MapError>;

/// Result type for transform units.
pub type UnitResult<T> = Result<T, UnitError>;

/// Result type for CSV loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for plans and pipelines.
pub type PlanResult<T> = Result<T, PlanError>;
