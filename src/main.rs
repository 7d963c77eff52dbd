use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use herald_agent::time_match::parse_posting_time;
use herald_agent::{
    EngineSettings, GraphEngine, RunLog, RunReport, ScheduleMode, SchedulerLoop, StateStore,
    Workflow,
};
use herald_core::traits::SystemClock;
use herald_core::types::{HumanFeedback, Preferences};
use herald_core::{AppConfig, HeraldError, WorkflowState};

#[derive(Parser)]
#[command(name = "herald", version, about = "Human-approved, time-gated posting to LinkedIn")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "herald.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate, review, and post one article on a fresh state
    Run {
        /// Comma-separated topics
        #[arg(long, value_delimiter = ',', required = true)]
        topics: Vec<String>,
        #[arg(long, default_value = "Professional")]
        tone: String,
        /// Preferred posting time, HH:MM
        #[arg(long, default_value = "09:00")]
        posting_time: String,
        /// Approve the first draft without asking
        #[arg(long)]
        auto_approve: bool,
        /// Post immediately instead of waiting for the posting window
        #[arg(long, env = "HERALD_FORCE_POST")]
        force: bool,
    },
    /// Tick the persisted workflow on a timer until Ctrl-C
    Schedule {
        /// Seconds between ticks
        #[arg(long, conflicts_with = "at")]
        interval_secs: Option<u64>,
        /// Tick once a day at HH:MM instead
        #[arg(long)]
        at: Option<String>,
        /// Post immediately instead of waiting for the posting window
        #[arg(long, env = "HERALD_FORCE_POST")]
        force: bool,
    },
    /// Replace the posting preferences
    Preferences {
        #[arg(long, value_delimiter = ',', required = true)]
        topics: Vec<String>,
        #[arg(long, default_value = "Professional")]
        tone: String,
        #[arg(long, default_value = "09:00")]
        posting_time: String,
    },
    /// Approve the current draft and run once
    Approve {
        #[arg(long, default_value = "")]
        feedback: String,
    },
    /// Reject the current draft and run once (a new draft is generated)
    Reject {
        #[arg(long)]
        feedback: String,
    },
    /// Run the workflow once on the persisted state
    Tick,
    /// Show the persisted state
    Status,
    /// Show a day's persisted workflow log
    Logs {
        /// Day to show, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Start a new posting cycle, keeping preferences and logs
    Reset,
    /// Clear the workflow log held in the state
    ClearLogs {
        /// Also delete the persisted day files
        #[arg(long)]
        files: bool,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("herald=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "herald", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&cli.config)?;
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "No config file, using defaults");
    }

    match cli.command {
        Commands::Completions { .. } => unreachable!("handled before config load"),
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Status => {
            let store = StateStore::open(&config.state_path())?;
            match store.load()? {
                Some(state) => print_state(&state),
                None => println!("No workflow state yet. Run `herald preferences` or `herald run` first."),
            }
        }
        Commands::Logs { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let run_log = RunLog::new(config.log_dir());
            let entries = run_log.read_day(date).await?;
            if entries.is_empty() {
                println!("No log entries for {} in {}", date, run_log.log_dir().display());
            }
            for entry in entries {
                println!("{}", entry);
            }
        }
        Commands::Run {
            topics,
            tone,
            posting_time,
            auto_approve,
            force,
        } => {
            config.scheduling.force_post |= force;
            let preferences = Preferences::new(topics, tone, posting_time.clone())?;
            warn_on_bad_time(&posting_time);

            let engine = build_engine(&config)?;
            let workflow = Workflow::new(
                engine,
                Arc::new(StateStore::open_in_memory()?),
                WorkflowState::with_preferences(preferences),
            );
            run_interactive(&workflow, auto_approve).await?;
        }
        Commands::Schedule {
            interval_secs,
            at,
            force,
        } => {
            config.scheduling.force_post |= force;
            if let Some(secs) = interval_secs {
                config.scheduler.interval_secs = secs;
            }
            if at.is_some() {
                config.scheduler.daily_at = at;
            }
            config.validate()?;
            let mode = ScheduleMode::from_config(&config.scheduler)?;

            let workflow = Arc::new(open_workflow(&config).await?);
            run_scheduler(workflow, mode).await?;
        }
        Commands::Preferences {
            topics,
            tone,
            posting_time,
        } => {
            let preferences = Preferences::new(topics, tone, posting_time.clone())?;
            warn_on_bad_time(&posting_time);
            let workflow = open_workflow(&config).await?;
            workflow.set_preferences(preferences).await?;
            print_state(&workflow.snapshot().await);
        }
        Commands::Approve { feedback } => {
            let workflow = open_workflow(&config).await?;
            submit_review(&workflow, HumanFeedback::approve(feedback)).await?;
        }
        Commands::Reject { feedback } => {
            let workflow = open_workflow(&config).await?;
            submit_review(&workflow, HumanFeedback::reject(feedback)).await?;
        }
        Commands::Tick => {
            let workflow = open_workflow(&config).await?;
            let report = workflow.tick().await?;
            print_run(&workflow.snapshot().await, &report);
        }
        Commands::Reset => {
            let workflow = open_workflow(&config).await?;
            workflow.reset().await?;
            println!("Started a new posting cycle.");
        }
        Commands::ClearLogs { files } => {
            let workflow = open_workflow(&config).await?;
            let cleared = workflow.clear_logs().await?;
            println!("Cleared {} log entries from the state.", cleared);
            if files {
                let removed = workflow.engine().run_log().clear().await?;
                println!("Deleted {} log files.", removed);
            }
        }
    }

    Ok(())
}

/// Build the engine with real collaborators. Missing credentials fail here.
fn build_engine(config: &AppConfig) -> anyhow::Result<Arc<GraphEngine>> {
    let generator = herald_llm::create_generator(&config.model)?;
    let linkedin = config.linkedin.as_ref().ok_or_else(|| {
        HeraldError::Config("a [linkedin] section with access_token is required".into())
    })?;
    let publisher = herald_channels::LinkedInPublisher::new(linkedin)?;

    Ok(Arc::new(GraphEngine::new(
        Arc::new(generator),
        Arc::new(publisher),
        Arc::new(SystemClock),
        RunLog::new(config.log_dir()),
        EngineSettings::from_config(config),
    )))
}

/// Open the persisted workflow, seeding preferences from config when the
/// state has none.
async fn open_workflow(config: &AppConfig) -> anyhow::Result<Workflow> {
    let engine = build_engine(config)?;
    let store = Arc::new(StateStore::open(&config.state_path())?);
    let workflow = Workflow::open(engine, store, WorkflowState::new())?;

    if workflow.snapshot().await.preferences.is_none() {
        if let Some(prefs) = &config.preferences {
            workflow.set_preferences(prefs.to_preferences()?).await?;
            info!("Seeded preferences from config");
        }
    }
    Ok(workflow)
}

/// Hand a verdict to the current draft. Having no draft is not a failure.
async fn submit_review(workflow: &Workflow, feedback: HumanFeedback) -> anyhow::Result<()> {
    match workflow.submit_feedback(feedback).await {
        Ok(report) => print_run(&workflow.snapshot().await, &report),
        Err(HeraldError::NoDraftToReview) => {
            println!("Nothing to review yet. Run `herald tick` to generate a draft first.")
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// One-shot mode: generate, ask for review on stdin, and run to completion.
async fn run_interactive(workflow: &Workflow, auto_approve: bool) -> anyhow::Result<()> {
    let report = workflow.tick().await?;
    let mut state = workflow.snapshot().await;
    print_run(&state, &report);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while state.content.is_some() && !state.status.status.is_terminal() {
        let feedback = if auto_approve {
            HumanFeedback::approve("auto-approved")
        } else {
            println!("\nApprove this article? [y]es / [n]o <feedback> / [q]uit");
            let Some(line) = lines.next_line().await? else {
                break;
            };
            match parse_review(&line) {
                Some(feedback) => feedback,
                None => break,
            }
        };

        let report = workflow.submit_feedback(feedback).await?;
        state = workflow.snapshot().await;
        print_run(&state, &report);
    }

    if !state.status.status.is_terminal() {
        println!("\nLeft unposted (status: {}).", state.status.status);
    }
    Ok(())
}

/// `y`/`yes` approves, `n <feedback>`/`no <feedback>` rejects, anything else quits.
fn parse_review(line: &str) -> Option<HumanFeedback> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match word.to_ascii_lowercase().as_str() {
        "y" | "yes" | "approve" => Some(HumanFeedback::approve(rest.trim())),
        "n" | "no" | "reject" => Some(HumanFeedback::reject(rest.trim())),
        _ => None,
    }
}

/// Continuous mode: the scheduler loop plus a stdin driver for reviews.
async fn run_scheduler(workflow: Arc<Workflow>, mode: ScheduleMode) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down scheduler...");
        cancel_clone.cancel();
    });

    let driver = workflow.clone();
    let driver_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("Commands: approve [feedback] | reject <feedback> | status | tick | quit");
        loop {
            let line = tokio::select! {
                _ = driver_cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            match line {
                Ok(Some(line)) => {
                    if !handle_driver_line(&driver, &line).await {
                        driver_cancel.cancel();
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    });

    let scheduler = SchedulerLoop::new(workflow, mode, cancel);
    match scheduler.run().await {
        Ok(ticks) => {
            info!(ticks, "Scheduler stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Scheduler aborted");
            Err(e.into())
        }
    }
}

/// Returns false when the operator asked to quit.
async fn handle_driver_line(workflow: &Workflow, line: &str) -> bool {
    let line = line.trim();
    let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    let result = match cmd {
        "" => return true,
        "quit" | "exit" => return false,
        "status" => {
            print_state(&workflow.snapshot().await);
            return true;
        }
        "approve" => workflow.submit_feedback(HumanFeedback::approve(rest.trim())).await,
        "reject" => workflow.submit_feedback(HumanFeedback::reject(rest.trim())).await,
        "tick" => workflow.tick().await,
        other => {
            println!("Unknown command: {}", other);
            return true;
        }
    };

    match result {
        Ok(report) => print_run(&workflow.snapshot().await, &report),
        Err(e) => println!("Error: {}", e),
    }
    true
}

fn warn_on_bad_time(posting_time: &str) {
    if parse_posting_time(posting_time).is_none() {
        warn!(posting_time, "Posting time is not HH:MM; posting will only happen once forced");
    }
}

fn print_run(state: &WorkflowState, report: &RunReport) {
    println!();
    if let Some(article) = &state.content {
        println!("{}\n", article.render_markdown());
    }
    println!("Status: {}", state.status.status);
    if let Some(url) = &state.status.post_url {
        println!("Post URL: {}", url);
    }
    if let Some(err) = &state.status.error {
        println!("Error: {}", err);
    }
    if !report.new_entries.is_empty() {
        println!("\nThis run ({}, {} ms):", report.trail_display(), report.elapsed_ms);
        for entry in &report.new_entries {
            println!("  {}", entry);
        }
    }
}

fn print_state(state: &WorkflowState) {
    match &state.preferences {
        Some(p) => println!(
            "Preferences: {} | tone: {} | posting at {}",
            p.topics_display(),
            p.tone,
            p.posting_time
        ),
        None => println!("Preferences: (none)"),
    }
    println!("Status: {} (revision {})", state.status.status, state.revision);
    if let Some(url) = &state.status.post_url {
        println!("Post URL: {}", url);
    }
    if let Some(err) = &state.status.error {
        println!("Error: {}", err);
    }
    println!("Scheduler attempts: {}", state.scheduler_attempts);
    if let Some(at) = state.current_time {
        println!("Authorized at: {}", at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(article) = &state.content {
        println!("\n{}", article.render_markdown());
    }
    if let Some(entry) = state.logs.last() {
        println!("\nLast log: {}", entry);
    }
}
