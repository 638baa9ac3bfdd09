//! Declarative mapping plans.
//!
//! A plan is a JSON document listing mapping steps. Each step is one [`Map`]
//! from the `input` placeholder to the `output` placeholder, with an
//! operation chain. [`MappingPlan::into_unit`] compiles a plan into a
//! [`TransformUnit`]; steps may read columns produced by earlier steps.
//!
//! [`Map`]: crate::map::Map

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{PlanError, PlanResult};
use crate::metadata::FieldMetadata;
use crate::transform::Operation;
use crate::unit::{Params, TransformUnit};

/// Placeholder the plan reads from.
pub const INPUT: &str = "input";
/// Placeholder the plan writes to.
pub const OUTPUT: &str = "output";

/// A complete mapping plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingPlan {
    /// Version of the plan format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Annotations declared for input columns
    #[serde(default)]
    pub source_fields: FieldMetadata,

    /// Annotations declared for output columns
    #[serde(default)]
    pub target_fields: FieldMetadata,

    /// Mapping steps, executed in order
    pub steps: Vec<MappingStep>,
}

/// One source-to-target mapping step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingStep {
    /// Columns read by the step (may be empty for constants)
    #[serde(default)]
    pub sources: Vec<String>,

    /// Columns written by the step
    pub targets: Vec<String>,

    /// Ordered list of operations to apply
    #[serde(default)]
    pub operations: Vec<Operation>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl MappingStep {
    pub fn new<S: Into<String>>(sources: impl IntoIterator<Item = S>, targets: impl IntoIterator<Item = S>) -> Self {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            targets: targets.into_iter().map(Into::into).collect(),
            operations: Vec::new(),
        }
    }

    /// Add an operation to the chain
    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }
}

impl MappingPlan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            source_fields: FieldMetadata::new(),
            target_fields: FieldMetadata::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: MappingStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Parse a plan from JSON string
    pub fn from_json(json: &str) -> PlanResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a plan from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PlanResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> PlanResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Input columns the plan reads, in first-use order.
    ///
    /// Columns produced by an earlier step are not input columns.
    pub fn source_columns(&self) -> Vec<String> {
        let mut produced = HashSet::new();
        let mut seen = HashSet::new();
        let mut columns = Vec::new();

        for step in &self.steps {
            for source in &step.sources {
                if !produced.contains(source) && seen.insert(source.clone()) {
                    columns.push(source.clone());
                }
            }
            produced.extend(step.targets.iter().cloned());
        }
        columns
    }

    /// Output columns the plan writes, in first-write order.
    pub fn target_columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .flat_map(|s| s.targets.iter())
            .filter(|t| seen.insert((*t).clone()))
            .cloned()
            .collect()
    }

    /// Check the plan's structure.
    pub fn validate(&self) -> PlanResult<()> {
        if self.steps.is_empty() {
            return Err(PlanError::InvalidPlan("plan has no steps".to_string()));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.targets.is_empty() {
                return Err(PlanError::InvalidPlan(format!("step {} has no targets", i + 1)));
            }
        }
        Ok(())
    }

    /// Validate that all input columns exist in the CSV headers
    pub fn validate_headers(&self, headers: &[String]) -> Result<(), Vec<String>> {
        let missing: Vec<String> = self
            .source_columns()
            .into_iter()
            .filter(|col| !headers.iter().any(|h| h == col))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Compile the plan into a unit reading `input` and writing `output`.
    ///
    /// Every target field is annotated with the sources it was derived from.
    pub fn into_unit(self, name: impl Into<String>) -> TransformUnit {
        let steps = self.steps;

        TransformUnit::new(name, Params::new(), move |ctx| {
            for (i, step) in steps.iter().enumerate() {
                let map = ctx
                    .map(INPUT, OUTPUT)?
                    .source(step.sources.iter().cloned())
                    .target(step.targets.iter().cloned());
                let map = step
                    .operations
                    .iter()
                    .fold(map, |map, op| map.transform(op.clone().into_transform()));
                map.execute()?;

                let output = ctx.placeholder_mut(OUTPUT)?;
                for target in &step.targets {
                    output.fields.annotate(target.as_str(), "derived_from", json!(step.sources));
                    output.fields.annotate(target.as_str(), "step", json!(i + 1));
                }
            }
            Ok(())
        })
    }
}

impl Default for MappingPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate an example plan for documentation
pub fn example_plan() -> MappingPlan {
    let mut plan = MappingPlan::new()
        .with_step(
            MappingStep::new(["Titre"], ["title"])
                .with_operation(Operation::Trim)
                .with_operation(Operation::Uppercase),
        )
        .with_step(
            MappingStep::new(["Code ISWC"], ["iswc"])
                .with_operation(Operation::Trim)
                .with_operation(Operation::Replace {
                    pattern: "[-. ]".to_string(),
                    value: String::new(),
                })
                .with_operation(Operation::Prefix {
                    value: "T".to_string(),
                }),
        )
        .with_step(
            MappingStep::new(["Prenom", "Nom"], ["creator"]).with_operation(Operation::Concatenate {
                separator: " ".to_string(),
            }),
        )
        .with_step(
            MappingStep::new(["Date"], ["created_on"])
                .with_operation(Operation::ParseDate { format: None }),
        )
        .with_step(
            MappingStep::new(Vec::<String>::new(), vec!["source_system".to_string()]).with_operation(
                Operation::Constant {
                    value: json!("catalog-import"),
                },
            ),
        );

    plan.description = "Example mapping plan".to_string();
    plan.source_fields
        .annotate("Date", "in_format", json!("%d/%m/%Y"));
    plan.target_fields
        .annotate("created_on", "type", json!("date"));
    plan
}
