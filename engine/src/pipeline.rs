//! High-level pipeline API: CSV in, mapping plan, table out.
//!
//! The pipeline plays the enclosing job. It owns an `input` subject holding
//! the loaded table and an `output` subject that receives the plan's
//! columns and field metadata.
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldmap::pipeline::{run_csv, OutputFormat, RunOptions};
//! use fieldmap::plan::MappingPlan;
//!
//! let plan = MappingPlan::from_file("plan.json")?;
//! let result = run_csv("catalog.csv", &plan, &RunOptions::default())?;
//! println!("{}", result.render(OutputFormat::Json)?);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::error::{PlanError, PlanResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::metadata::{FieldMap, FieldMetadata};
use crate::plan::{MappingPlan, INPUT, OUTPUT};
use crate::table::loader::{load_file_auto, write_csv, LoadOptions};
use crate::table::{DataSubject, Table};
use crate::unit::Job;

/// Output rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format '{}' (expected json or csv)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Csv => f.write_str("csv"),
        }
    }
}

/// Options for one pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOptions {
    /// Plan file to load
    pub plan_path: Option<PathBuf>,

    /// Force the CSV delimiter instead of auto-detection
    pub delimiter: Option<char>,

    /// Load blank CSV cells as null
    pub blanks_as_null: bool,

    /// How [`RunResult::render`] formats the output
    pub format: OutputFormat,
}

impl RunOptions {
    /// Options seeded from the environment configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            plan_path: None,
            delimiter: config.delimiter,
            blanks_as_null: config.blanks_as_null,
            format: OutputFormat::default(),
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            delimiter: self.delimiter,
            blanks_as_null: self.blanks_as_null,
        }
    }

    /// Load the plan named by `plan_path`.
    pub fn load_plan(&self) -> PlanResult<MappingPlan> {
        let path = self
            .plan_path
            .as_ref()
            .ok_or_else(|| PlanError::InvalidPlan("no plan file given".to_string()))?;
        MappingPlan::from_file(path)
    }
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Columns written by the plan
    pub table: Table,

    /// Field metadata of the output, including lineage annotations
    pub fields: FieldMetadata,

    pub row_count: usize,
    pub column_count: usize,

    /// Input details when the run started from a CSV file
    pub input: Option<CsvInfo>,
}

impl RunResult {
    /// Output rows as JSON objects
    pub fn records(&self) -> Vec<Value> {
        self.table.to_records()
    }

    pub fn render(&self, format: OutputFormat) -> PlanResult<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&self.records())?),
            OutputFormat::Csv => {
                let mut out = Vec::new();
                write_csv(&self.table, &mut out, ',')?;
                Ok(String::from_utf8_lossy(&out).into_owned())
            }
        }
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!("Mapped: {} rows, {} columns", self.row_count, self.column_count)
    }
}

/// Run `plan` over an in-memory table.
pub fn run_plan(table: Table, plan: &MappingPlan) -> PlanResult<RunResult> {
    plan.validate()?;

    if let Err(missing) = plan.validate_headers(table.columns()) {
        return Err(PlanError::InvalidPlan(format!(
            "input is missing columns: {}",
            missing.join(", ")
        )));
    }

    log_info(format!("Running plan with {} steps", plan.steps.len()));
    for (i, step) in plan.steps.iter().enumerate() {
        log_info_indent(
            format!("[{:2}] {:?} -> {:?}", i + 1, step.sources, step.targets),
            1,
        );
    }

    let headers = table.columns().to_vec();
    let mut job = Job::new("pipeline")
        .with_subject(
            DataSubject::new(INPUT)
                .with_table(table)
                .with_fields(plan.source_fields.clone()),
        )
        .with_subject(DataSubject::new(OUTPUT).with_fields(plan.target_fields.clone()));

    let mut unit = plan.clone().into_unit("plan");
    unit.map_source_fields(INPUT, INPUT, FieldMap::identity(headers))?
        .map_target_fields(OUTPUT, OUTPUT, FieldMap::identity(plan.target_columns()))?;

    job.run(&mut unit)?;

    let output = job
        .take(OUTPUT)
        .ok_or_else(|| PlanError::InvalidPlan("output subject disappeared".to_string()))?;

    if output.table.row_count() == 0 {
        log_warning("Plan produced no rows");
    }
    log_success(format!(
        "Mapped {} rows into {} columns",
        output.table.row_count(),
        output.table.column_count()
    ));

    Ok(RunResult {
        row_count: output.table.row_count(),
        column_count: output.table.column_count(),
        table: output.table,
        fields: output.fields,
        input: None,
    })
}

/// Load a CSV file and run `plan` over it.
pub fn run_csv<P: AsRef<Path>>(path: P, plan: &MappingPlan, options: &RunOptions) -> PlanResult<RunResult> {
    log_info(format!("Reading CSV file {}...", path.as_ref().display()));
    let loaded = load_file_auto(path.as_ref(), &options.load_options())?;

    log_success(format!("Detected encoding: {}", loaded.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(loaded.delimiter)));
    log_success(format!("Read {} rows", loaded.table.row_count()));

    let info = CsvInfo {
        encoding: loaded.encoding.clone(),
        delimiter: loaded.delimiter,
        headers: loaded.headers().to_vec(),
        row_count: loaded.table.row_count(),
    };

    let mut result = run_plan(loaded.table, plan)?;
    result.input = Some(info);
    Ok(result)
}

pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::MappingStep;
    use crate::transform::Operation;
    use serde_json::json;

    fn input() -> Table {
        Table::from_columns([
            ("first", vec![json!(" Ada "), json!("Alan")]),
            ("last", vec![json!("Lovelace"), json!("Turing")]),
        ])
        .unwrap()
    }

    fn plan() -> MappingPlan {
        MappingPlan::new()
            .with_step(MappingStep::new(["first"], ["first_name"]).with_operation(Operation::Trim))
            .with_step(
                MappingStep::new(["first_name", "last"], ["full_name"])
                    .with_operation(Operation::Concatenate { separator: " ".into() }),
            )
    }

    #[test]
    fn test_run_plan() {
        let result = run_plan(input(), &plan()).unwrap();

        assert_eq!(result.table.columns(), &["first_name", "full_name"]);
        assert_eq!(result.row_count, 2);
        assert_eq!(result.records()[0], json!({"first_name": "Ada", "full_name": "Ada Lovelace"}));
        assert_eq!(result.fields.get("full_name")["derived_from"], json!(["first_name", "last"]));
    }

    #[test]
    fn test_missing_input_column() {
        let plan = MappingPlan::new().with_step(MappingStep::new(["nope"], ["x"]));
        let err = run_plan(input(), &plan).unwrap_err();
        assert!(matches!(err, PlanError::InvalidPlan(ref msg) if msg.contains("nope")));
    }

    #[test]
    fn test_render_csv() {
        let result = run_plan(input(), &plan()).unwrap();
        let csv = result.render(OutputFormat::Csv).unwrap();
        assert_eq!(csv, "first_name,full_name\nAda,Ada Lovelace\nAlan,Alan Turing\n");
    }

    #[test]
    fn test_run_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("people.csv");
        std::fs::write(&csv_path, "first;last\nAda;Lovelace\n").unwrap();

        let result = run_csv(&csv_path, &plan(), &RunOptions::default()).unwrap();
        let info = result.input.as_ref().unwrap();
        assert_eq!(info.delimiter, ';');
        assert_eq!(info.headers, vec!["first", "last"]);
        assert_eq!(result.records()[0]["full_name"], json!("Ada Lovelace"));
    }

    #[test]
    fn test_load_plan_from_options() {
        let dir = tempfile::tempdir().unwrap();
        let plan_path = dir.path().join("plan.json");
        std::fs::write(&plan_path, plan().to_json().unwrap()).unwrap();

        let options = RunOptions {
            plan_path: Some(plan_path),
            ..RunOptions::default()
        };
        assert_eq!(options.load_plan().unwrap(), plan());
        assert!(RunOptions::default().load_plan().is_err());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
