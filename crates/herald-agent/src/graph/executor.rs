use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};
use uuid::Uuid;

use herald_core::config::{AppConfig, SchedulingConfig};
use herald_core::traits::{Clock, ContentGenerator, Publisher};
use herald_core::types::LogEntry;
use herald_core::{HeraldError, Result, StateUpdate, WorkflowState};

use super::edge::next_stage;
use super::stage::Stage;
use crate::run_log::RunLog;
use crate::stages;

/// Knobs for a [`GraphEngine`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Hard cap on stage executions per run.
    pub max_steps: usize,
    pub scheduling: SchedulingConfig,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_steps: config.workflow.max_steps,
            scheduling: config.scheduling.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What happened during one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    /// Stages in execution order.
    pub trail: Vec<Stage>,
    /// Log entries appended by this run.
    pub new_entries: Vec<LogEntry>,
    /// Whether any non-log field changed.
    pub changed: bool,
    /// The run halted at input collection for lack of preferences.
    pub missing_preferences: bool,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn trail_display(&self) -> String {
        render_trail(&self.trail)
    }
}

/// Walks the workflow graph from input collection to logging.
///
/// Collaborators are injected once; the engine itself holds no state
/// between runs, so it can be shared behind an `Arc`.
pub struct GraphEngine {
    generator: Arc<dyn ContentGenerator>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    run_log: RunLog,
    settings: EngineSettings,
}

impl GraphEngine {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
        run_log: RunLog,
        settings: EngineSettings,
    ) -> Self {
        Self {
            generator,
            publisher,
            clock,
            run_log,
            settings,
        }
    }

    pub fn run_log(&self) -> &RunLog {
        &self.run_log
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Run the graph once and return the resulting state.
    ///
    /// Missing preferences surface as an error here, after the failure entry
    /// has been written to the day file.
    pub async fn run(&self, state: WorkflowState) -> Result<WorkflowState> {
        let (state, report) = self.run_with_report(state).await?;
        if report.missing_preferences {
            return Err(HeraldError::MissingPreferences);
        }
        Ok(state)
    }

    /// Run the graph once, also returning a [`RunReport`].
    ///
    /// Only a runaway graph escapes as an error; every collaborator failure
    /// is recorded in the state instead. A run without preferences still
    /// returns its logged state, flagged by `missing_preferences`.
    pub async fn run_with_report(&self, initial: WorkflowState) -> Result<(WorkflowState, RunReport)> {
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let log_start = initial.logs.len();
        let start_revision = initial.revision;

        let mut state = initial;
        let mut trail: Vec<Stage> = Vec::new();
        let mut stage = Stage::ENTRY;

        info!(run_id = %run_id, revision = start_revision, "Workflow run started");

        loop {
            if trail.len() >= self.settings.max_steps {
                trail.push(stage);
                let trail = render_trail(&trail);
                error!(run_id = %run_id, limit = self.settings.max_steps, trail = %trail, "Engine step limit exceeded");
                return Err(HeraldError::EngineRecursionExceeded {
                    limit: self.settings.max_steps,
                    trail,
                });
            }
            trail.push(stage);

            let update = self.execute(stage, &state, log_start).await;
            let changed = state.apply(update);
            debug!(run_id = %run_id, stage = %stage, changed, "Stage complete");

            match next_stage(stage, &state) {
                Some(next) => stage = next,
                None => break,
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            status = %state.status.status,
            steps = trail.len(),
            elapsed_ms,
            "Workflow run finished"
        );

        let report = RunReport {
            run_id,
            new_entries: state.logs[log_start..].to_vec(),
            changed: state.revision != start_revision,
            missing_preferences: state.preferences.is_none(),
            trail,
            elapsed_ms,
        };
        Ok((state, report))
    }

    async fn execute(&self, stage: Stage, state: &WorkflowState, log_start: usize) -> StateUpdate {
        let clock = self.clock.as_ref();
        match stage {
            Stage::InputCollection => stages::collect_input(state, clock.now()),
            Stage::ContentCreation => {
                stages::create_content(state, self.generator.as_ref(), clock).await
            }
            Stage::ContentApproval => stages::review(state, clock.now()),
            Stage::Scheduling => stages::schedule(state, &self.settings.scheduling, clock.now()),
            Stage::Posting => stages::post(state, self.publisher.as_ref(), clock).await,
            Stage::Logging => {
                stages::flush_logs(&self.run_log, &state.logs[log_start..]).await;
                StateUpdate::none()
            }
        }
    }
}

fn render_trail(trail: &[Stage]) -> String {
    trail
        .iter()
        .map(Stage::as_str)
        .collect::<Vec<_>>()
        .join(" > ")
}
