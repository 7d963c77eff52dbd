use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use herald_core::types::LogEntry;
use herald_core::Result;

/// Append-only JSONL log, one file per calendar day.
///
/// Entries land in `{log_dir}/herald_{YYYY-MM-DD}.log`, chosen by each
/// entry's own timestamp, so a run that crosses midnight splits cleanly.
/// One JSON object per line keeps earlier lines intact if a write is cut
/// short.
#[derive(Debug, Clone)]
pub struct RunLog {
    log_dir: PathBuf,
}

impl RunLog {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// File holding the entries for `date`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.log_dir
            .join(format!("herald_{}.log", date.format("%Y-%m-%d")))
    }

    /// Append entries, grouped by day. Returns the number of lines written.
    pub async fn append(&self, entries: &[LogEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        tokio::fs::create_dir_all(&self.log_dir).await?;

        let mut by_day: BTreeMap<NaiveDate, Vec<&LogEntry>> = BTreeMap::new();
        for entry in entries {
            by_day.entry(entry.timestamp.date_naive()).or_default().push(entry);
        }

        let mut written = 0;
        for (date, day_entries) in by_day {
            let path = self.path_for(date);
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            let mut writer = tokio::io::BufWriter::new(file);

            for entry in day_entries {
                let mut line = serde_json::to_string(entry)?;
                line.push('\n');
                writer.write_all(line.as_bytes()).await?;
                written += 1;
            }
            writer.flush().await?;
            debug!(path = %path.display(), "Appended run log entries");
        }

        Ok(written)
    }

    /// Read back one day's entries. Missing files read as empty; malformed
    /// lines are skipped.
    pub async fn read_day(&self, date: NaiveDate) -> Result<Vec<LogEntry>> {
        let path = self.path_for(date);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let entries = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<LogEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed log line");
                    None
                }
            })
            .collect();

        Ok(entries)
    }

    /// Delete every day file. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut dir = match tokio::fs::read_dir(&self.log_dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("herald_") && name.ends_with(".log") {
                tokio::fs::remove_file(item.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
