use tracing::{debug, warn};

use herald_core::types::LogEntry;

use crate::run_log::RunLog;

/// Persist the entries accumulated during this run. Never changes state.
pub async fn flush_logs(run_log: &RunLog, entries: &[LogEntry]) {
    if entries.is_empty() {
        debug!("No new log entries this run");
        return;
    }

    match run_log.append(entries).await {
        Ok(written) => debug!(written, "Run log flushed"),
        Err(e) => warn!(error = %e, count = entries.len(), "Failed to persist run log"),
    }
}
