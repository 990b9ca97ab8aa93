//! Persistent job queue backed by a plain-text file.
//!
//! The queue file holds one URL per line and always lists exactly the URLs
//! that have not completed yet. [`Queue::run`] processes entries strictly in
//! order, one at a time, and rewrites the file after every success. A crash
//! mid-job leaves that job's URL queued for the next run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use m3u8dl_common::{Error, Result};
use tracing::{info, warn};

/// Runs a single queue entry to completion.
#[async_trait]
pub trait JobRunner: Send {
    /// Process `url`. `label` is the entry's position, e.g. `3/12`.
    async fn run_job(&mut self, url: &str, label: &str) -> Result<()>;
}

/// A pending URL and the slot it occupied when the file was loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    slot: usize,
    url: String,
}

/// Outcome of a [`Queue::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSummary {
    /// Number of entries when the run started.
    pub total: usize,
    /// URLs completed and removed from the file, in order.
    pub completed: Vec<String>,
    /// URLs that failed and remain in the file, in order.
    pub failed: Vec<String>,
}

/// The in-memory view of a queue file.
#[derive(Debug, Clone)]
pub struct Queue {
    path: PathBuf,
    entries: Vec<Entry>,
}

impl Queue {
    /// Read the queue file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueRead`] if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::queue_read(path, e))?;

        let entries = parse(&content)
            .into_iter()
            .enumerate()
            .map(|(slot, url)| Entry { slot, url })
            .collect::<Vec<_>>();

        info!(path = %path.display(), entries = entries.len(), "Loaded queue");

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending URLs in file order.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.url.as_str())
    }

    /// Remove the first pending entry equal to `url` and rewrite the file.
    ///
    /// Returns `false` without touching the file when `url` is not queued.
    pub fn remove(&mut self, url: &str) -> Result<bool> {
        match self.entries.iter().position(|e| e.url == url) {
            Some(index) => {
                self.entries.remove(index);
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Process every pending entry in order.
    ///
    /// Labels count against the number of entries at the start of the run.
    /// Job-local failures are reported and leave the URL queued; any other
    /// error stops the run.
    pub async fn run<R>(&mut self, runner: &mut R) -> Result<QueueSummary>
    where
        R: JobRunner + ?Sized,
    {
        let pending = self.entries.clone();
        let mut summary = QueueSummary {
            total: pending.len(),
            ..Default::default()
        };

        for (index, entry) in pending.into_iter().enumerate() {
            let label = format!("{}/{}", index + 1, summary.total);

            match runner.run_job(&entry.url, &label).await {
                Ok(()) => {
                    self.complete(entry.slot)?;
                    summary.completed.push(entry.url);
                }
                Err(e) if e.is_job_local() => {
                    warn!(url = %entry.url, label = %label, "Job failed: {}", e);
                    eprintln!("{}", e.report());
                    summary.failed.push(entry.url);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            "Queue drained"
        );
        Ok(summary)
    }

    /// Drop the entry loaded at `slot` and checkpoint the file.
    fn complete(&mut self, slot: usize) -> Result<()> {
        self.entries.retain(|e| e.slot != slot);
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let content = self
            .entries
            .iter()
            .map(|e| e.url.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&self.path, content).map_err(|e| Error::queue_write(&self.path, e))
    }
}

/// Split queue file content into trimmed, non-empty lines.
pub fn parse(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
