//! AgentHelm CLI Entry Point
//!
//! Validates plan files and runs them through the orchestrator with the
//! built-in echo agent.
//!
//! # Usage
//!
//! ```bash
//! # Validate a plan and preview its execution waves
//! agenthelm plan.yaml
//!
//! # Execute it, approving the plan up front
//! agenthelm plan.yaml --run --approve
//!
//! # Custom settings and trace file
//! agenthelm plan.yaml --run --config helm.yaml --trace-file runs/trace.json
//!
//! # Set maximum parallel steps
//! agenthelm plan.yaml --run --parallel 8
//! ```

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use log::{error, info};

use agenthelm::agent::AgentRegistry;
use agenthelm::builtin::{register_builtin_tools, EchoAgent};
use agenthelm::plan::{execution_waves, load_plan, Plan, StepStatus};
use agenthelm::storage::JsonFileStorage;
use agenthelm::trace::{ApprovalGate, AutoApprove, ConsoleApproval};
use agenthelm::{ExecutionTracer, HelmConfig, Orchestrator, ToolRegistry, APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct CliArgs {
    plan_path: Option<String>,
    run: bool,
    approve: bool,
    config_path: Option<PathBuf>,
    trace_file: Option<PathBuf>,
    max_parallel: Option<usize>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Execution and Recovery Engine for Agent Workflows");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: agenthelm [OPTIONS] <PLAN_FILE>");
    println!();
    println!("Arguments:");
    println!("  <PLAN_FILE>         Path to a plan file (.yaml or .json)");
    println!();
    println!("Options:");
    println!("  --run               Execute the plan (default: validate and preview)");
    println!("  --approve           Approve the plan without prompting");
    println!("  --config PATH       Load settings from a YAML file");
    println!("  --trace-file PATH   Write events to this JSON file");
    println!("  --parallel N        Maximum parallel steps (default: CPU count)");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  agenthelm refund_plan.yaml");
    println!("  agenthelm refund_plan.yaml --run --approve");
    println!("  agenthelm refund_plan.yaml --run --parallel 2 --trace-file trace.json");
}

/// Parses command-line arguments into a CliArgs struct.
fn parse_arguments(args: &[String]) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--run" => cli.run = true,
            "--approve" | "-y" => cli.approve = true,
            "--verbose" | "-v" => cli.verbose = true,
            "--config" => {
                i += 1;
                let path = args.get(i).ok_or("--config requires a path argument")?;
                cli.config_path = Some(PathBuf::from(path));
            }
            "--trace-file" => {
                i += 1;
                let path = args.get(i).ok_or("--trace-file requires a path argument")?;
                cli.trace_file = Some(PathBuf::from(path));
            }
            "--parallel" => {
                i += 1;
                let value = args.get(i).ok_or("--parallel requires a number argument")?;
                let parsed: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid parallel value: {}", value))?;
                if parsed == 0 {
                    return Err("--parallel must be at least 1".to_string());
                }
                cli.max_parallel = Some(parsed);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if cli.plan_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                cli.plan_path = Some(arg.clone());
            }
        }
        i += 1;
    }

    if cli.plan_path.is_none() {
        return Err("No plan file given".to_string());
    }

    Ok(cli)
}

/// Merges the config file and command-line overrides.
fn resolve_config(cli: &CliArgs) -> Result<HelmConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config_path {
        Some(path) => HelmConfig::load(path)?,
        None => HelmConfig::default(),
    };

    if let Some(path) = &cli.trace_file {
        config.trace_file = path.clone();
    }
    if let Some(n) = cli.max_parallel {
        config.max_parallel = Some(n);
    }
    if cli.approve {
        config.auto_approve = true;
    }

    Ok(config)
}

fn print_waves(plan: &Plan) -> Result<(), Box<dyn std::error::Error>> {
    let waves = execution_waves(plan)?;

    println!("{} ({} steps, {} rounds)", plan.goal.bold(), plan.steps.len(), waves.len());
    if !plan.reasoning.is_empty() {
        println!("  {}", plan.reasoning.dimmed());
    }
    for (round, wave) in waves.iter().enumerate() {
        println!("  Round {}: {}", round + 1, wave.join(", "));
    }
    println!();
    Ok(())
}

/// Asks the operator to approve the whole plan.
fn confirm_plan(plan: &Plan) -> bool {
    print!("Approve plan '{}' with {} steps? [y/N] ", plan.goal, plan.steps.len());
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn print_summary(plan: &Plan) {
    println!();
    for step in &plan.steps {
        let status = match step.status {
            StepStatus::Completed => "completed".green(),
            StepStatus::Failed => "failed".red(),
            StepStatus::Running => "running".yellow(),
            StepStatus::Pending => "pending".dimmed(),
        };
        match &step.error {
            Some(e) => println!("  {:<16} {}  {}", step.id, status, e),
            None => println!("  {:<16} {}", step.id, status),
        }
    }
    println!();
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let cli = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(cli.verbose);
    print_banner();

    let config = resolve_config(&cli)?;
    let plan_path = cli.plan_path.clone().unwrap_or_default();

    let mut plan = load_plan(&plan_path).map_err(|e| {
        error!("Failed to load plan: {}", e);
        format!("Could not load plan from '{}': {}", plan_path, e)
    })?;

    print_waves(&plan)?;

    if !cli.run {
        println!("{}", "Plan is valid. Use --run to execute it.".green());
        return Ok(());
    }

    if config.auto_approve || plan.approved || confirm_plan(&plan) {
        plan.approve();
    } else {
        return Err("Plan was not approved".into());
    }

    let mut tools = ToolRegistry::new();
    register_builtin_tools(&mut tools)?;

    let gate: Arc<dyn ApprovalGate> = if config.auto_approve {
        Arc::new(AutoApprove)
    } else {
        Arc::new(ConsoleApproval::stdio())
    };
    let storage = Arc::new(JsonFileStorage::new(&config.trace_file));
    let tracer = Arc::new(
        ExecutionTracer::new(Arc::new(tools), storage)
            .with_approval_gate(gate)
            .with_retry_backoff(config.retry_backoff()),
    );

    let max_parallel = config.max_parallel.unwrap_or_else(num_cpus::get);
    info!("Running with up to {} parallel steps", max_parallel);

    let orchestrator = Orchestrator::new(AgentRegistry::new())
        .with_default_agent(Arc::new(EchoAgent::new("echo", tracer)))
        .with_max_parallel(max_parallel);

    let (result, timeline) = orchestrator.execute_with_timeline(&mut plan)?;

    println!("{}", timeline.gantt_chart());
    print_summary(&plan);
    info!(
        "{} event(s), {:.3}s of tool time, written to {}",
        result.events.len(),
        result.total_execution_time(),
        config.trace_file.display()
    );

    if result.success {
        println!("{}", "Plan completed successfully".green().bold());
        Ok(())
    } else {
        Err(result
            .error
            .unwrap_or_else(|| "Plan failed".to_string())
            .into())
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}
