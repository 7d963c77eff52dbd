use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, Timelike};
use cron::Schedule;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use herald_core::config::SchedulerConfig;
use herald_core::{HeraldError, Result};

use crate::time_match::parse_posting_time;
use crate::workflow::Workflow;

/// When the loop fires.
#[derive(Debug, Clone)]
pub enum ScheduleMode {
    /// Every fixed interval, starting immediately.
    Interval(Duration),
    /// Once a day at a fixed local time.
    DailyAt(NaiveTime),
}

impl ScheduleMode {
    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        match config.daily_at.as_deref() {
            Some(at) => parse_posting_time(at).map(ScheduleMode::DailyAt).ok_or_else(|| {
                HeraldError::Config(format!("scheduler.daily_at must be HH:MM, got '{}'", at))
            }),
            None => Ok(ScheduleMode::Interval(Duration::from_secs(config.interval_secs))),
        }
    }

    /// How long to sleep from `now` until the next tick.
    pub fn next_delay(&self, now: DateTime<Local>) -> Duration {
        match self {
            ScheduleMode::Interval(every) => *every,
            ScheduleMode::DailyAt(at) => {
                let expr = format!("0 {} {} * * *", at.minute(), at.hour());
                let next = Schedule::from_str(&expr)
                    .ok()
                    .and_then(|schedule| schedule.after(&now).next());
                match next {
                    Some(fire_at) => (fire_at - now).to_std().unwrap_or(Duration::from_secs(1)),
                    None => {
                        warn!(expr = %expr, "No upcoming fire time, retrying in an hour");
                        Duration::from_secs(3600)
                    }
                }
            }
        }
    }
}

/// Background driver that ticks the workflow until cancelled.
pub struct SchedulerLoop {
    workflow: Arc<Workflow>,
    mode: ScheduleMode,
    cancel: CancellationToken,
}

impl SchedulerLoop {
    pub fn new(workflow: Arc<Workflow>, mode: ScheduleMode, cancel: CancellationToken) -> Self {
        Self {
            workflow,
            mode,
            cancel,
        }
    }

    /// Run until cancelled. Returns the number of ticks performed.
    ///
    /// Cancellation is only observed between ticks; a tick in progress
    /// always finishes and persists. Fatal engine errors end the loop.
    pub async fn run(&self) -> Result<u64> {
        info!(mode = ?self.mode, "Scheduler loop started");
        let mut ticks = 0u64;

        if matches!(self.mode, ScheduleMode::Interval(_)) && !self.cancel.is_cancelled() {
            self.tick(&mut ticks).await?;
        }

        loop {
            let delay = self.mode.next_delay(self.workflow.engine().clock().now());

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(ticks, "Scheduler loop shutting down");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    self.tick(&mut ticks).await?;
                }
            }
        }

        Ok(ticks)
    }

    async fn tick(&self, ticks: &mut u64) -> Result<()> {
        *ticks += 1;
        match self.workflow.tick().await {
            Ok(report) => {
                info!(
                    tick = *ticks,
                    run_id = %report.run_id,
                    entries = report.new_entries.len(),
                    changed = report.changed,
                    elapsed_ms = report.elapsed_ms,
                    "Scheduled run complete"
                );
                Ok(())
            }
            Err(e) if e.is_fatal() => {
                error!(tick = *ticks, error = %e, "Scheduled run hit a fatal error");
                Err(e)
            }
            Err(e) => {
                warn!(tick = *ticks, error = %e, "Scheduled run failed, will retry next tick");
                Ok(())
            }
        }
    }
}
