//! Fieldmap CLI - map CSV files through declarative plans
//!
//! ```bash
//! fieldmap run input.csv --plan plan.json      # Run a plan, JSON to stdout
//! fieldmap run input.csv -p plan.json -f csv   # Same, CSV output
//! fieldmap inspect input.csv                   # Show detected encoding, separator, columns
//! fieldmap operations                          # Show available operations
//! fieldmap example-plan                        # Show an example plan
//! ```

use clap::{Parser, Subcommand};
use fieldmap::pipeline::format_delimiter;
use fieldmap::{
    example_plan, load_file_auto, operations_description, run_csv, EngineConfig, OutputFormat,
    RunOptions,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fieldmap")]
#[command(about = "Map CSV columns through transform chains", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a mapping plan over a CSV file
    Run {
        /// Input CSV file
        input: PathBuf,

        /// Mapping plan (JSON)
        #[arg(short, long)]
        plan: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: json or csv
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Load blank cells as null
        #[arg(long)]
        null_blanks: bool,
    },

    /// Show what the loader detects in a CSV file
    Inspect {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Show available operations
    Operations,

    /// Show example mapping plan
    ExamplePlan,
}

fn main() {
    let config = EngineConfig::load();
    init_tracing(&config);

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            plan,
            output,
            format,
            delimiter,
            null_blanks,
        } => {
            let mut options = RunOptions::from_config(&config);
            options.plan_path = Some(plan);
            options.format = format;
            if delimiter.is_some() {
                options.delimiter = delimiter;
            }
            options.blanks_as_null |= null_blanks;
            cmd_run(&input, &options, output.as_deref())
        }

        Commands::Inspect { input, delimiter } => {
            let mut options = RunOptions::from_config(&config);
            if delimiter.is_some() {
                options.delimiter = delimiter;
            }
            cmd_inspect(&input, &options)
        }

        Commands::Operations => cmd_operations(),

        Commands::ExamplePlan => cmd_example_plan(),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_run(
    input: &Path,
    options: &RunOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let plan = options.load_plan()?;
    let result = run_csv(input, &plan, options)?;

    eprintln!("{}", result.summary());

    let rendered = result.render(options.format)?;
    write_output(&rendered, output)?;
    Ok(())
}

fn cmd_inspect(input: &Path, options: &RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_file_auto(input, &options.load_options())?;

    println!("File: {}", input.display());
    println!("Encoding: {}", loaded.encoding);
    println!(
        "Delimiter: '{}'{}",
        format_delimiter(loaded.delimiter),
        if options.delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    println!("Rows: {}", loaded.table.row_count());
    println!("Columns ({}):", loaded.headers().len());
    for (i, col) in loaded.headers().iter().enumerate() {
        println!("  [{:2}] {}", i + 1, col);
    }
    Ok(())
}

fn cmd_example_plan() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", example_plan().to_json()?);
    Ok(())
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", operations_description());
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
