use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use recovery_selector::*;
use serde::Deserialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "recovery-selector")]
#[command(about = "Pick recovery strategies for classified errors and learn from outcomes")]
#[command(version = "1.0.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    /// Selector configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "RECOVERY_SELECTOR_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Select a strategy for a classified error
    Select {
        /// JSON request file with `classification` and `context` (stdin if omitted)
        input: Option<PathBuf>,

        /// Print the selection report alongside the strategy
        #[arg(long)]
        report: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// List the built-in strategy catalog
    Catalog {
        /// Output the catalog as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Replay recorded outcomes and print learned effectiveness
    Simulate {
        /// JSON-lines file, one outcome per line
        outcomes: PathBuf,

        /// Select a strategy for this request after replaying
        #[arg(long)]
        then_select: Option<PathBuf>,
    },
}

/// Request accepted by `select`
#[derive(Debug, Deserialize)]
struct SelectRequest {
    classification: ErrorClassification,
    context: ErrorContext,
}

/// One line of a `simulate` input file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeRecord {
    strategy: StrategyType,
    classification: ErrorClassification,
    context: ErrorContext,
    success: bool,
    #[serde(default)]
    duration_ms: f64,
    #[serde(default)]
    resource_cost: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug, cli.json_logs);

    let config = SelectorConfig::load(cli.config.as_deref()).context("Failed to load selector configuration")?;
    let selector = RecoveryStrategySelector::with_config(config).context("Invalid selector configuration")?;

    match &cli.command {
        Commands::Select {
            input,
            report,
            pretty,
        } => select(&selector, input.as_deref(), *report, *pretty)?,
        Commands::Catalog { json } => print_catalog(&selector, *json)?,
        Commands::Simulate {
            outcomes,
            then_select,
        } => simulate(&selector, outcomes, then_select.as_deref())?,
    }

    Ok(())
}

fn init_logging(debug: bool, json: bool) {
    let env_filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    if json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(env_filter);
        tracing_subscriber::registry().with(layer).init();
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_filter(env_filter);
        tracing_subscriber::registry().with(layer).init();
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read request from stdin")?;
            Ok(buffer)
        }
    }
}

fn parse_request(path: Option<&Path>) -> Result<SelectRequest> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).context("Request must be JSON with `classification` and `context`")
}

fn select(
    selector: &RecoveryStrategySelector,
    input: Option<&Path>,
    with_report: bool,
    pretty: bool,
) -> Result<()> {
    let request = parse_request(input)?;
    let (strategy, report) = selector.select_with_report(&request.classification, &request.context);

    let output = if with_report {
        serde_json::json!({ "strategy": strategy, "report": report })
    } else {
        serde_json::to_value(&strategy)?
    };

    if pretty {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", serde_json::to_string(&output)?);
    }

    Ok(())
}

fn print_catalog(selector: &RecoveryStrategySelector, json: bool) -> Result<()> {
    let database = selector.database();

    if json {
        let strategies: Vec<_> = database.iter().collect();
        println!("{}", serde_json::to_string_pretty(&strategies)?);
        return Ok(());
    }

    println!(
        "{:<22} {:<9} {:<19} {:<10} {:<9} {:<8} {:<10}",
        "Strategy", "Attempts", "Backoff", "Timeout", "Priority", "Rate", "Conditions"
    );
    println!("{}", "-".repeat(92));

    for strategy in database.iter() {
        let backoff = format!("{:?}", strategy.backoff_strategy.backoff_type);
        let timeout = humantime::format_duration(Duration::from_millis(strategy.timeout_ms)).to_string();

        println!(
            "{:<22} {:<9} {:<19} {:<10} {:<9.2} {:<8.2} {:<10}",
            strategy.strategy_type.as_str(),
            strategy.max_attempts,
            truncate_string(&backoff, 19),
            truncate_string(&timeout, 10),
            strategy.priority,
            strategy.estimated_success_rate,
            strategy.conditions.len()
        );
    }

    println!("\n{} strategies", database.len());
    Ok(())
}

fn simulate(
    selector: &RecoveryStrategySelector,
    outcomes: &Path,
    then_select: Option<&Path>,
) -> Result<()> {
    let raw = fs::read_to_string(outcomes)
        .with_context(|| format!("Failed to read {}", outcomes.display()))?;
    let started = Instant::now();
    let mut replayed = 0usize;

    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record: OutcomeRecord = serde_json::from_str(line)
            .with_context(|| format!("Invalid outcome on line {}", index + 1))?;
        selector.record_outcome(
            record.strategy,
            &record.classification,
            &record.context,
            record.success,
            record.duration_ms,
            record.resource_cost,
        );
        replayed += 1;
    }

    if replayed == 0 {
        bail!("No outcomes found in {}", outcomes.display());
    }

    tracing::info!(
        outcomes = replayed,
        elapsed = %humantime::format_duration(started.elapsed()),
        "Replayed outcomes"
    );

    let statistics = selector.effectiveness_statistics();
    println!("{}", serde_json::to_string_pretty(&statistics)?);

    if let Some(request_path) = then_select {
        let request = parse_request(Some(request_path))?;
        let (strategy, report) =
            selector.select_with_report(&request.classification, &request.context);
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "strategy": strategy, "report": report }))?
        );
    }

    Ok(())
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
