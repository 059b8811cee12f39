//! Scanning a job's build archive into a [`BuildSink`].
//!
//! The job's `builds` directory is walked on a blocking thread first. One
//! producer then feeds the complete build directories into a bounded queue.
//! A fixed number of workers drain the queue, analyze each build off the
//! async runtime and hand the record to the sink. The run ends once the
//! queue is closed and every worker is done.

use std::collections::HashSet;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use crate::buildlog::extract_from_file;
use crate::error::{OELensError, Result};
use crate::jenkins::{builds_dir, list_build_dirs, read_report, BuildDirectory};
use crate::normalize::{normalize, Normalized};
use crate::store::BuildSink;

#[derive(Debug, Clone)]
pub struct HarvestRequest {
    pub jenkins_home: PathBuf,
    pub job: String,
    pub threads: usize,
    /// Leave builds alone that the sink already holds
    pub skip_existing: bool,
}

/// Counts of what happened to each build directory in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildCounts {
    /// Numbered directories found under the job's `builds` directory
    pub listed: usize,
    /// Directories missing their log or build report
    pub incomplete: usize,
    /// Builds the sink already held
    pub existing: usize,
    pub stored: usize,
    /// Stored builds where some values fell back to defaults
    pub partial: usize,
    pub failed: usize,
}

impl AddAssign for BuildCounts {
    fn add_assign(&mut self, other: Self) {
        self.listed += other.listed;
        self.incomplete += other.incomplete;
        self.existing += other.existing;
        self.stored += other.stored;
        self.partial += other.partial;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub job: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: BuildCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildOutcome {
    Stored { partial: bool },
    AlreadyPresent,
    Failed,
}

impl From<BuildOutcome> for BuildCounts {
    fn from(outcome: BuildOutcome) -> Self {
        let mut counts = Self::default();
        match outcome {
            BuildOutcome::Stored { partial } => {
                counts.stored = 1;
                counts.partial = usize::from(partial);
            }
            BuildOutcome::AlreadyPresent => counts.existing = 1,
            BuildOutcome::Failed => counts.failed = 1,
        }
        counts
    }
}

/// Reads the log and build report of one build and merges them.
///
/// # Errors
///
/// Returns an error if the build report cannot be read or decoded. A missing
/// or unreadable log only yields empty log metrics.
pub fn analyze_build(dir: &BuildDirectory) -> Result<Normalized> {
    let metrics = extract_from_file(&dir.log_file());
    debug!("{} metrics in log of build {}", metrics.len(), dir.number);
    let report = read_report(&dir.report_file())?;
    Ok(normalize(dir, &metrics, &report))
}

/// Harvests every complete build of `request.job` into `sink`.
///
/// `progress` is advanced once per build handed to a worker.
///
/// # Errors
///
/// Returns an error if the job's builds directory cannot be listed or the
/// sink cannot be prepared. Failures of single builds are counted in the
/// summary instead.
pub async fn run<S: BuildSink>(
    request: &HarvestRequest,
    sink: &S,
    progress: &ProgressBar,
) -> Result<RunSummary> {
    if request.threads == 0 {
        return Err(OELensError::Config(
            "At least one worker thread is required".to_string(),
        ));
    }

    let started_at = Utc::now();
    let root = builds_dir(&request.jenkins_home, &request.job);
    info!(
        "Scanning {} with {} workers",
        root.display(),
        request.threads
    );

    let (builds, mut counts) = tokio::task::spawn_blocking(move || discover_builds(&root))
        .await
        .map_err(|e| OELensError::Layout(format!("Build discovery did not finish: {e}")))??;
    sink.prepare().await?;
    let existing = if request.skip_existing {
        sink.existing_builds(&request.job).await?
    } else {
        HashSet::new()
    };

    let (sender, receiver) = mpsc::channel(request.threads);
    let receiver = Mutex::new(receiver);

    let producer = async move {
        for dir in builds {
            if sender.send(dir).await.is_err() {
                break;
            }
        }
    };

    let workers = (0..request.threads).map(|worker| {
        let receiver = &receiver;
        let existing = &existing;
        async move {
            let mut counts = BuildCounts::default();
            loop {
                let next = receiver.lock().await.recv().await;
                let Some(dir) = next else { break };
                counts += BuildCounts::from(process_build(dir, sink, existing).await);
                progress.inc(1);
            }
            debug!("Worker {worker} done");
            counts
        }
    });

    let ((), worker_counts) = tokio::join!(producer, join_all(workers));
    for worker_counts in worker_counts {
        counts += worker_counts;
    }

    Ok(RunSummary {
        job: request.job.clone(),
        started_at,
        finished_at: Utc::now(),
        counts,
    })
}

/// Lists the numbered build directories under `root` and keeps the complete
/// ones, in build order. Touches the filesystem only.
fn discover_builds(root: &Path) -> Result<(Vec<BuildDirectory>, BuildCounts)> {
    let candidates = list_build_dirs(root)?;
    let mut counts = BuildCounts {
        listed: candidates.len(),
        ..BuildCounts::default()
    };

    let builds = candidates
        .iter()
        .filter_map(|path| {
            let dir = complete_build(path);
            counts.incomplete += usize::from(dir.is_none());
            dir
        })
        .collect();
    Ok((builds, counts))
}

fn complete_build(path: &Path) -> Option<BuildDirectory> {
    let dir = match BuildDirectory::from_path(path) {
        Ok(dir) => dir,
        Err(e) => {
            debug!("{e}");
            return None;
        }
    };

    if dir.is_complete() {
        Some(dir)
    } else {
        info!("{} can't be added: log or build.xml is missing", path.display());
        None
    }
}

async fn process_build<S: BuildSink>(
    dir: BuildDirectory,
    sink: &S,
    existing: &HashSet<u32>,
) -> BuildOutcome {
    if existing.contains(&dir.number) {
        info!("{} #{} already exists", dir.job_name, dir.number);
        return BuildOutcome::AlreadyPresent;
    }

    let number = dir.number;
    let analyzed = match tokio::task::spawn_blocking(move || analyze_build(&dir)).await {
        Ok(Ok(normalized)) => normalized,
        Ok(Err(e)) => {
            warn!("Skipping build {number}: {e}");
            return BuildOutcome::Failed;
        }
        Err(e) => {
            warn!("Analysis of build {number} did not finish: {e}");
            return BuildOutcome::Failed;
        }
    };

    for warning in &analyzed.warnings {
        warn!("Build {number}: {warning}");
    }

    if let Err(e) = sink.upsert(&analyzed.record).await {
        warn!("Cannot store build {number}: {e}");
        return BuildOutcome::Failed;
    }

    info!("Added build {number} ({})", analyzed.record.result);
    BuildOutcome::Stored {
        partial: analyzed.is_partial(),
    }
}
