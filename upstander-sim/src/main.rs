mod logic;
mod util;

use anyhow::{Context, Result, bail, ensure};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::future::Future;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use logic::reports::{
    generate_console_report, generate_csv_report, generate_json_report, generate_markdown_report,
};
use logic::{
    BatchConfig, PacingProfile, RunReport, SimAssets, Strategy, SurveyParser, SyntheticRespondent,
    attach_feedback, run_batch,
};
use upstander_engine::{DecisionPolicy, Persona, PersonaRoster, StudyEngine, TraversalConfig};
use util::split_csv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored summary for terminals
    Console,
    /// Full metrics and journeys as JSON
    Json,
    /// Study write-up with a criteria table
    Markdown,
    /// One row per journey
    Csv,
}

#[derive(Debug, Parser)]
#[command(name = "upstander-sim", version)]
#[command(
    about = "Walk synthetic personas through a bystander-intervention scenario and score the pilot study"
)]
struct Args {
    /// Scenario graph JSON (defaults to the bundled module)
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Persona roster JSON (defaults to the bundled roster)
    #[arg(long)]
    personas: Option<PathBuf>,

    /// Study configuration JSON with criteria and themes
    #[arg(long)]
    study: Option<PathBuf>,

    /// Decision strategy applied to every persona
    #[arg(long, value_enum, default_value_t = Strategy::TraitAligned)]
    strategy: Strategy,

    /// Run seed for policies, pacing and survey answers
    #[arg(long, default_value_t = 1337)]
    seed: u64,

    /// Per-decision policy timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    policy_timeout_ms: u64,

    /// Journeys walked at once
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Only walk the first N personas
    #[arg(long)]
    max_personas: Option<usize>,

    /// Only walk these persona ids (comma-separated)
    #[arg(long)]
    only: Option<String>,

    /// Step budget per journey (defaults to the node count)
    #[arg(long)]
    max_steps: Option<usize>,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Exit with an error when any success criterion fails
    #[arg(long)]
    fail_on_criteria: bool,
}

/// How long shutdown waits for blocking policy calls that outlived their timeout.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    announce_banner();

    let start_time = Instant::now();
    let report = block_on_runtime(run_study(&args))??;
    write_report(&args, &report)?;
    eprintln!("🏁 Total time: {:?}", start_time.elapsed());

    let metrics = &report.metrics;
    if args.fail_on_criteria && !metrics.all_criteria_passed() {
        bail!(
            "{}/{} success criteria met",
            metrics.criteria_passed(),
            metrics.success_criteria_status.len()
        );
    }
    Ok(())
}

/// Drive `future` on a fresh runtime, then shut it down without waiting on
/// hung blocking tasks beyond [`SHUTDOWN_GRACE`].
fn block_on_runtime<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(output)
}

fn announce_banner() {
    eprintln!("{}", "🧭 Upstander Pilot Simulator".bright_cyan().bold());
    eprintln!("{}", "================================".cyan());
}

async fn run_study(args: &Args) -> Result<RunReport> {
    let assets = SimAssets::with_overrides(
        args.scenario.clone(),
        args.personas.clone(),
        args.study.clone(),
    );
    let traversal = TraversalConfig {
        max_steps: args.max_steps,
    };
    let study = StudyEngine::with_traversal(assets, traversal)
        .prepare()
        .context("failed to prepare study")?;

    let personas = select_personas(&study.roster, args.only.as_deref(), args.max_personas)?;
    ensure!(!personas.is_empty(), "no personas selected");

    let policy: Arc<dyn DecisionPolicy> = Arc::from(args.strategy.create_policy(args.seed));
    let config = BatchConfig {
        run_seed: args.seed,
        policy_timeout: Duration::from_millis(args.policy_timeout_ms),
        concurrency: args.concurrency,
        pacing: PacingProfile::default(),
    };
    log::info!(
        "walking {} personas with {} (seed {})",
        personas.len(),
        args.strategy,
        args.seed
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = run_batch(&study.engine, personas, policy, &config, cancel_rx).await?;
    if outcome.abandoned > 0 {
        log::warn!("{} journeys abandoned on interrupt", outcome.abandoned);
    }
    if args.verbose {
        for record in &outcome.store {
            let mark = if record.completed() {
                "✓".green()
            } else {
                "✗".red()
            };
            eprintln!(
                "  {mark} {} {} ({:.1} min)",
                record.persona_id().bold(),
                record.outcome(),
                record.elapsed_minutes()
            );
        }
    }

    let parser = SurveyParser::new().context("failed to compile survey patterns")?;
    let journeys = attach_feedback(
        outcome.store,
        study.engine.graph(),
        &study.roster,
        &SyntheticRespondent::new(args.seed),
        &parser,
    )
    .context("failed to survey journeys")?;
    let metrics = study.aggregate(&journeys);

    let title = study.engine.graph().title();
    Ok(RunReport {
        title: if title.is_empty() {
            "Upstander".to_string()
        } else {
            title.to_string()
        },
        strategy: args.strategy.label().to_string(),
        seed: args.seed,
        generated_at: Utc::now(),
        abandoned: outcome.abandoned,
        metrics,
        journeys,
    })
}

fn select_personas(
    roster: &PersonaRoster,
    only: Option<&str>,
    max_personas: Option<usize>,
) -> Result<Vec<Persona>> {
    let mut selected: Vec<Persona> = match only {
        Some(ids) => split_csv(ids)
            .iter()
            .map(|id| {
                roster
                    .get_by_id(id)
                    .cloned()
                    .with_context(|| format!("unknown persona `{id}`"))
            })
            .collect::<Result<_>>()?,
        None => roster.iter().cloned().collect(),
    };
    if let Some(limit) = max_personas {
        selected.truncate(limit);
    }
    Ok(selected)
}

fn write_report(args: &Args, report: &RunReport) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.report {
        ReportFormat::Console => generate_console_report(&mut output_target, report)?,
        ReportFormat::Json => generate_json_report(&mut output_target, report)?,
        ReportFormat::Markdown => generate_markdown_report(&mut output_target, report)?,
        ReportFormat::Csv => generate_csv_report(&mut output_target, &report.journeys)?,
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
