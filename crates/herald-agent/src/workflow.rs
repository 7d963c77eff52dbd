use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use herald_core::types::{HumanFeedback, Preferences};
use herald_core::{HeraldError, Result, WorkflowState};

use crate::graph::{GraphEngine, RunReport};
use crate::store::StateStore;

/// The shared state record and the engine that advances it.
///
/// Interactive commands and the scheduler loop both go through this handle.
/// Each operation holds the lock for its whole duration, so two runs never
/// interleave.
pub struct Workflow {
    engine: Arc<GraphEngine>,
    store: Arc<StateStore>,
    state: Mutex<WorkflowState>,
}

impl Workflow {
    /// Load the persisted state, or start from `initial` on first use.
    pub fn open(engine: Arc<GraphEngine>, store: Arc<StateStore>, initial: WorkflowState) -> Result<Self> {
        let state = match store.load()? {
            Some(state) => {
                info!(revision = state.revision, status = %state.status.status, "Loaded workflow state");
                state
            }
            None => initial,
        };
        Ok(Self::new(engine, store, state))
    }

    pub fn new(engine: Arc<GraphEngine>, store: Arc<StateStore>, state: WorkflowState) -> Self {
        Self {
            engine,
            store,
            state: Mutex::new(state),
        }
    }

    pub fn engine(&self) -> &GraphEngine {
        &self.engine
    }

    pub async fn snapshot(&self) -> WorkflowState {
        self.state.lock().await.clone()
    }

    /// Run the graph once on the shared state.
    pub async fn tick(&self) -> Result<RunReport> {
        let mut guard = self.state.lock().await;
        let pending = guard.clone();
        self.advance(&mut guard, pending).await
    }

    /// Apply the reviewer's verdict to the current draft, then run.
    ///
    /// A verdict only ever applies to the draft that exists when it is
    /// given. Without one this fails with `NoDraftToReview` and nothing is
    /// stored.
    pub async fn submit_feedback(&self, feedback: HumanFeedback) -> Result<RunReport> {
        let mut guard = self.state.lock().await;
        if guard.content.is_none() {
            warn!(status = %guard.status.status, "Feedback refused, no draft to review");
            return Err(HeraldError::NoDraftToReview);
        }
        let mut pending = guard.clone();
        pending.human_feedback = Some(feedback);
        self.advance(&mut guard, pending).await
    }

    /// Run the engine, then replace and persist the shared state.
    async fn advance(&self, current: &mut WorkflowState, pending: WorkflowState) -> Result<RunReport> {
        let (next, report) = self.engine.run_with_report(pending).await?;
        *current = next;
        self.store.save(current)?;
        if report.missing_preferences {
            return Err(HeraldError::MissingPreferences);
        }
        Ok(report)
    }

    /// Replace the user's preferences. Content already generated is kept.
    pub async fn set_preferences(&self, preferences: Preferences) -> Result<()> {
        self.mutate(|state| {
            state.preferences = Some(preferences);
            state.revision += 1;
        })
        .await
    }

    /// Start a new posting cycle. Preferences and logs survive.
    pub async fn reset(&self) -> Result<()> {
        self.mutate(WorkflowState::reset_cycle).await
    }

    /// Operator action: drop the in-state log. Returns how many entries went.
    pub async fn clear_logs(&self) -> Result<usize> {
        let mut cleared = 0;
        self.mutate(|state| {
            cleared = state.logs.len();
            state.logs.clear();
        })
        .await?;
        if cleared > 0 {
            warn!(cleared, "Workflow log cleared by operator");
        }
        Ok(cleared)
    }

    async fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut WorkflowState),
    {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        f(&mut next);
        self.store.save(&next)?;
        *guard = next;
        Ok(())
    }
}
