//! # Fieldmap - field mapping and transform composition for columnar data
//!
//! Fieldmap maps source columns ("vectors") of an in-memory table onto target
//! columns through ordered transform chains, and composes named mapping
//! units hierarchically with field renaming, parameter overrides and
//! field-level lineage metadata.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │    Table    │────▶│     Map     │────▶│    Unit     │────▶│    Table    │
//! │  (+fields)  │     │ (transforms)│     │ (composed)  │     │  (+lineage) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fieldmap::{scalar, Map, Table};
//! use serde_json::json;
//!
//! let source = Table::from_columns([("a", vec![json!(1), json!(2), json!(3)])])?;
//! let mut target = Table::new();
//!
//! Map::new(&source, &mut target)
//!     .source(["a"])
//!     .target(["b"])
//!     .transform(scalar(|v| Ok(json!(v.as_i64().unwrap_or(0) * 2))))
//!     .execute()?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`table`] - Tables, data subjects and CSV loading
//! - [`row`] - Shared column index and working rows
//! - [`metadata`] - Field metadata and name translation
//! - [`transform`] - Transform trait and operation library
//! - [`map`] - Map execution engine
//! - [`unit`] - Transform units and composition
//! - [`plan`] - Declarative JSON mapping plans
//! - [`pipeline`] - CSV-to-output driver
//! - [`config`] - Environment configuration
//! - [`logs`] - Progress logs

// Core modules
pub mod error;
pub mod metadata;
pub mod row;
pub mod table;

// Mapping
pub mod map;
pub mod transform;
pub mod unit;

// Plans and pipeline
pub mod config;
pub mod logs;
pub mod pipeline;
pub mod plan;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    LoadError, MapError, PlanError, TableError, TransformError, UnitError,
};

// =============================================================================
// Re-exports - Data model
// =============================================================================

pub use metadata::{merge_annotations, Annotations, FieldMap, FieldMetadata};
pub use row::{ColumnIndex, KeySet, Row};
pub use table::loader::{
    decode_content, detect_delimiter, detect_encoding, load_bytes_auto, load_file_auto, load_str,
    write_csv, LoadOptions, LoadedTable,
};
pub use table::{DataSubject, Table};

// =============================================================================
// Re-exports - Mapping
// =============================================================================

pub use map::{CallingConvention, Map};
pub use transform::{
    from_fn, nullary, operations_description, row as row_fn, scalar, Identity, Input,
    MetadataBinding, Operation, OperationTransform, Transform,
};
pub use unit::{Composer, Job, Params, SubjectHost, TransformUnit, UnitContext, UnitState};

// =============================================================================
// Re-exports - Plans and pipeline
// =============================================================================

pub use config::EngineConfig;
pub use pipeline::{run_csv, run_plan, CsvInfo, OutputFormat, RunOptions, RunResult};
pub use plan::{example_plan, MappingPlan, MappingStep};
