//! sedbn CLI - exact inference over the sediment quality Bayesian network
//!
//! Usage:
//!   sedbn validate <model>                                  # Build and check a model file
//!   sedbn describe <model>                                  # List variables and topological order
//!   sedbn query <model> -q VAR [-e VAR=STATE]... [-o json]  # Posterior marginals
//!   sedbn scenarios <model> <batch> [--compare VAR=STATE]   # Evaluate a scenario batch
//!   sedbn predict <model> < requests.ndjson                 # Serve JSON prediction requests

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sedbn_cli::args::{evidence_from_assignments, parse_assignment};
use sedbn_cli::telemetry;
use sedbn_core::engine::scenario::ScenarioReport;
use sedbn_core::{
    evaluate_with_config, infer_with_diagnostics, load_model, InferenceConfig,
    LoadedModel, PosteriorResult, QueryAdapter, ResponseMode, ScenarioFile,
};

#[derive(Parser)]
#[command(name = "sedbn")]
#[command(version)]
#[command(about = "Exact inference over discrete sediment quality Bayesian networks")]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, env = "SEDBN_LOG_JSON")]
    log_json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Override the model file's cap on intermediate factor size
    #[arg(long, global = true, value_name = "CELLS", env = "SEDBN_MAX_FACTOR_CELLS")]
    max_factor_cells: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the model and report whether it is valid
    Validate {
        #[arg(value_name = "MODEL", env = "SEDBN_MODEL")]
        model: PathBuf,
    },

    /// Print variables, states, parents and the topological order
    Describe {
        #[arg(value_name = "MODEL", env = "SEDBN_MODEL")]
        model: PathBuf,
    },

    /// Compute posterior marginals for one query
    Query {
        #[arg(value_name = "MODEL", env = "SEDBN_MODEL")]
        model: PathBuf,

        /// Variable whose posterior is wanted (repeatable)
        #[arg(short, long = "query", value_name = "VAR", required = true)]
        query: Vec<String>,

        /// Observed state, as VAR=STATE (repeatable)
        #[arg(short, long = "evidence", value_name = "VAR=STATE", value_parser = parse_assignment)]
        evidence: Vec<(String, String)>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
        output: OutputFormat,

        /// Also print the elimination order and factor sizes
        #[arg(long)]
        diagnostics: bool,
    },

    /// Evaluate a batch of named scenarios
    Scenarios {
        #[arg(value_name = "MODEL", env = "SEDBN_MODEL")]
        model: PathBuf,

        #[arg(value_name = "BATCH")]
        batch: PathBuf,

        /// Tabulate P(VAR=STATE) across scenarios
        #[arg(long, value_name = "VAR=STATE", value_parser = parse_assignment)]
        compare: Option<(String, String)>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
        output: OutputFormat,
    },

    /// Answer JSON prediction requests read line by line from stdin
    Predict {
        #[arg(value_name = "MODEL", env = "SEDBN_MODEL")]
        model: PathBuf,

        /// Target variable (defaults to the model file's [adapter] target)
        #[arg(long, value_name = "VAR")]
        target: Option<String>,

        /// Response mode (defaults to the model file's [adapter] response)
        #[arg(long, value_enum)]
        mode: Option<Mode>,

        /// Print the status payload and exit
        #[arg(long)]
        status: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Summary,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Label,
    Distribution,
}

impl From<Mode> for ResponseMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Label => ResponseMode::Label,
            Mode::Distribution => ResponseMode::Distribution,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json, telemetry::level_for_verbosity(cli.verbose));

    match cli.command {
        Command::Validate { model } => {
            let loaded = open_model(&model)?;
            println!(
                "✓ Model '{}' is valid: {} variables, {} feature bindings",
                model.display(),
                loaded.model.len(),
                loaded.model.features().len()
            );
            Ok(())
        }
        Command::Describe { model } => {
            let loaded = open_model(&model)?;
            describe(&loaded);
            Ok(())
        }
        Command::Query {
            model,
            query,
            evidence,
            output,
            diagnostics,
        } => {
            let loaded = open_model(&model)?;
            let config = inference_config(&loaded, cli.max_factor_cells);
            let evidence = evidence_from_assignments(evidence)?;
            let (result, diag) = infer_with_diagnostics(&loaded.model, &evidence, &query, config)
                .with_context(|| format!("query {:?} failed", query))?;
            match output {
                OutputFormat::Json => {
                    let json = if diagnostics {
                        serde_json::json!({ "posterior": result, "diagnostics": diag })
                    } else {
                        serde_json::to_value(&result)?
                    };
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                OutputFormat::Summary => {
                    print_posterior(&result);
                    if diagnostics {
                        println!("\nElimination order: {}", diag.elimination_order.join(" -> "));
                        println!("Pruned variables: {}", diag.pruned_variables);
                        println!("Largest factor: {} cells", diag.max_factor_cells);
                    }
                }
            }
            Ok(())
        }
        Command::Scenarios {
            model,
            batch,
            compare,
            output,
        } => {
            let loaded = open_model(&model)?;
            let config = inference_config(&loaded, cli.max_factor_cells);
            let file = ScenarioFile::load(&batch)
                .with_context(|| format!("failed to load scenarios '{}'", batch.display()))?;
            let report = evaluate_with_config(&loaded.model, &file.scenarios, config)?;
            match output {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report_json(&report))?)
                }
                OutputFormat::Summary => print_report(&report, compare.as_ref()),
            }
            Ok(())
        }
        Command::Predict {
            model,
            target,
            mode,
            status,
        } => {
            let loaded = open_model(&model)?;
            let config = inference_config(&loaded, cli.max_factor_cells);
            let adapter = build_adapter(loaded, target, mode)?.with_config(config);
            if status {
                println!("{}", serde_json::to_string(&adapter.status())?);
                return Ok(());
            }
            serve(&adapter)
        }
    }
}

fn open_model(path: &Path) -> Result<LoadedModel> {
    load_model(path).with_context(|| format!("failed to load model '{}'", path.display()))
}

fn inference_config(loaded: &LoadedModel, override_cells: Option<usize>) -> InferenceConfig {
    match override_cells {
        Some(cells) => InferenceConfig::with_max_factor_cells(cells),
        None => loaded.inference,
    }
}

fn build_adapter(
    loaded: LoadedModel,
    target: Option<String>,
    mode: Option<Mode>,
) -> Result<QueryAdapter> {
    let target = match (target, loaded.adapter.as_ref()) {
        (Some(target), _) => target,
        (None, Some(def)) => def.target.clone(),
        (None, None) => bail!("no target variable: pass --target or add an [adapter] table"),
    };
    let mode = mode
        .map(ResponseMode::from)
        .or_else(|| loaded.adapter.as_ref().map(|def| def.response))
        .unwrap_or_default();
    QueryAdapter::new(Arc::new(loaded.model), &target, mode)
        .with_context(|| format!("cannot serve predictions for '{}'", target))
}

/// One JSON request per non-empty stdin line, one JSON response per stdout line.
fn serve(adapter: &QueryAdapter) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        writeln!(out, "{}", adapter.predict_json(&line))?;
        out.flush()?;
    }
    Ok(())
}

fn describe(loaded: &LoadedModel) {
    let model = &loaded.model;
    println!("Variables ({}):", model.len());
    for var in model.iter_variables() {
        let parents: Vec<&str> = model
            .parents(var.id())
            .iter()
            .map(|p| model.var(*p).name())
            .collect();
        let states: Vec<&str> = var.states().iter().map(|s| &**s).collect();
        print!("  {} [{}]", var.name(), states.join(", "));
        if !parents.is_empty() {
            print!(" <- {}", parents.join(", "));
        }
        if let Some(unit) = var.unit() {
            print!(" ({})", unit);
        }
        println!();
    }

    let order: Vec<&str> = model
        .topological_order()
        .iter()
        .map(|id| model.var(*id).name())
        .collect();
    println!("\nTopological order: {}", order.join(" -> "));
    println!("Joint state space: {} cells", model.joint_state_space());

    if !model.features().is_empty() {
        println!("\nFeatures:");
        for binding in model.features().iter() {
            let kind = if binding.accepts_numbers() {
                "numeric or label"
            } else {
                "label"
            };
            println!(
                "  {} -> {} ({})",
                binding.name(),
                model.var(binding.variable()).name(),
                kind
            );
        }
    }
    if let Some(adapter) = &loaded.adapter {
        println!("\nPrediction target: {}", adapter.target);
    }
}

fn print_posterior(result: &PosteriorResult) {
    for (variable, distribution) in result.iter() {
        println!("{}", variable);
        for (state, p) in distribution.iter() {
            println!("  {:<12} {:.4}", state, p);
        }
    }
}

fn print_report(report: &ScenarioReport, compare: Option<&(String, String)>) {
    println!(
        "✓ Evaluated {} scenarios ({} succeeded, {} failed)\n",
        report.len(),
        report.succeeded(),
        report.failed()
    );
    for outcome in report.outcomes() {
        println!("[{}]", outcome.name);
        match &outcome.result {
            Ok(result) => print_posterior(result),
            Err(err) => println!("  error: {}", err),
        }
        println!();
    }

    if let Some((variable, state)) = compare {
        println!("P({} = {}):", variable, state);
        for (name, p) in report.compare(variable, state) {
            match p {
                Some(p) => println!("  {:<32} {:.4}", name, p),
                None => println!("  {:<32} -", name),
            }
        }
    }
}

fn report_json(report: &ScenarioReport) -> serde_json::Value {
    let outcomes: serde_json::Map<String, serde_json::Value> = report
        .outcomes()
        .iter()
        .map(|o| {
            let value = match &o.result {
                Ok(result) => serde_json::json!({ "posterior": result }),
                Err(err) => serde_json::json!({ "error": err.to_string(), "kind": err.kind() }),
            };
            (o.name.clone(), value)
        })
        .collect();
    serde_json::Value::Object(outcomes)
}
