use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sposh::agent::Agent;
use sposh::exit_codes;
use sposh::io::config::{EngineConfig, load_config};
use sposh::io::plan_file::{load_plan, read_plan_text};
use sposh::io::script::load_script;
use sposh::lap::lexer::tokenize;
use sposh::lap::plan::PlanSource;
use sposh::logging;
use sposh::looping::{LoopStop, run_loop};

#[derive(Parser)]
#[command(name = "sposh", version, about = "Slip-stack reactive plan engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the tokens of a plan file, one per line.
    Lex { plan: PathBuf },
    /// Parse a plan and, given behaviours, check that every name resolves.
    Check {
        plan: PathBuf,
        /// Scripted behaviours (TOML) to build the plan against.
        #[arg(long)]
        behaviours: Option<PathBuf>,
        /// Print the parsed plan as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print a plan in canonical form.
    Fmt { plan: PathBuf },
    /// Run a plan against scripted behaviours.
    Run {
        plan: PathBuf,
        #[arg(long)]
        behaviours: PathBuf,
        /// Engine config (TOML). Defaults apply when omitted or missing.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override `max_steps` from the config.
        #[arg(long)]
        max_steps: Option<u64>,
        /// Stop on the first step where no drive element is ready.
        #[arg(long)]
        stop_on_lost: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Lex { plan } => cmd_lex(&plan),
        Command::Check {
            plan,
            behaviours,
            json,
        } => cmd_check(&plan, behaviours.as_deref(), json),
        Command::Fmt { plan } => cmd_fmt(&plan),
        Command::Run {
            plan,
            behaviours,
            config,
            max_steps,
            stop_on_lost,
        } => cmd_run(&plan, &behaviours, config.as_deref(), max_steps, stop_on_lost),
    }
}

fn cmd_lex(path: &Path) -> Result<i32> {
    let text = read_plan_text(path)?;
    let (tokens, errors) = tokenize(&text);
    for token in &tokens {
        println!("{}\t{}", token.kind, token.text);
    }
    for err in &errors {
        eprintln!("{}: {err}", path.display());
    }
    Ok(if errors.is_empty() {
        exit_codes::OK
    } else {
        exit_codes::INVALID
    })
}

fn cmd_check(path: &Path, behaviours: Option<&Path>, json: bool) -> Result<i32> {
    let plan = load_plan(path)?;
    if let Some(behaviours) = behaviours {
        let world = load_script(behaviours)?.build()?;
        Agent::from_plan(&plan, &world.registry)
            .with_context(|| format!("build plan {}", path.display()))?;
    }
    if json {
        let out = serde_json::to_string_pretty(&plan).context("serialize plan")?;
        println!("{out}");
    } else {
        println!("{}", summary(&plan));
    }
    Ok(exit_codes::OK)
}

fn summary(plan: &PlanSource) -> String {
    let drives = plan
        .drive_collection
        .as_ref()
        .map(|dc| {
            format!(
                "{} '{}' with {} drive elements",
                dc.kind,
                dc.name,
                dc.priorities.iter().map(Vec::len).sum::<usize>()
            )
        })
        .unwrap_or_else(|| "no drive collection".to_string());
    format!(
        "ok: {drives}, {} competences, {} action patterns",
        plan.competences.len(),
        plan.action_patterns.len()
    )
}

fn cmd_fmt(path: &Path) -> Result<i32> {
    let plan = load_plan(path)?;
    println!("{plan}");
    Ok(exit_codes::OK)
}

fn cmd_run(
    path: &Path,
    behaviours: &Path,
    config: Option<&Path>,
    max_steps: Option<u64>,
    stop_on_lost: bool,
) -> Result<i32> {
    let mut config = match config {
        Some(config) => load_config(config)?,
        None => EngineConfig::default(),
    };
    if let Some(max_steps) = max_steps {
        config.max_steps = max_steps;
    }
    config.stop_on_lost |= stop_on_lost;

    let plan = load_plan(path)?;
    let world = load_script(behaviours)?.build()?;
    let mut agent = Agent::from_plan(&plan, &world.registry)
        .with_context(|| format!("build plan {}", path.display()))?;

    let outcome = run_loop(&mut agent, &config, |report| {
        println!("{}\t{}\t{}", report.step, report.time, report.outcome);
    })?;
    let fired = world.activity.borrow().len();
    println!(
        "stopped: {} after {} steps ({} lost, {} actions fired)",
        outcome.stop, outcome.steps_executed, outcome.lost_steps, fired
    );

    Ok(match outcome.stop {
        LoopStop::Won => exit_codes::OK,
        LoopStop::Lost => exit_codes::LOST,
        LoopStop::StepLimit => exit_codes::STEP_LIMIT,
    })
}
