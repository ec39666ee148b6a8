//! Bounded candidate pipeline.
//!
//! Each candidate runs as its own task: pre-filter, download into a private
//! temp directory, analysis on a blocking thread, decision. At most
//! `max_concurrent_videos` candidates hold a slot at once; a timed-out
//! analysis keeps its slot until its blocking thread has returned. Records
//! come back in submission order whatever order the tasks finish in.
//!
//! [`FilterPipeline::shutdown`] stops the run early: no new candidates start,
//! in-flight tasks are aborted, running analyses stop at their next frame and
//! only the finished records are returned.

use async_trait::async_trait;
use reelsift_media::{
    fetch_candidate_video, AnalysisError, Deadline, MediaError, MediaResult, VideoContentAnalyzer,
};
use reelsift_models::{Candidate, ObservedMetadata, ResultRecord, VideoAnalysis};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

use crate::cleanup::VIDEO_DIR_PREFIX;
use crate::config::{FilterConfig, WorkerConfig};
use crate::decision::{compose, VideoOutcome};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::VideoLogger;
use crate::metrics;
use crate::prefilter::{self, MetadataProbe, Prefilter};

/// Downloads a candidate into a directory.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dir: &Path) -> MediaResult<PathBuf>;
}

/// Downloads with yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    timeout: Duration,
    max_duration: Option<u64>,
}

impl YtDlpFetcher {
    pub fn new(timeout: Duration, max_duration: Option<u64>) -> Self {
        Self {
            timeout,
            max_duration,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.download_timeout, config.filters.download_max_duration())
    }
}

#[async_trait]
impl VideoFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str, dir: &Path) -> MediaResult<PathBuf> {
        fetch_candidate_video(url, dir, self.timeout, self.max_duration).await
    }
}

/// Blocking per-file analysis.
///
/// Implementations should give up with `AnalysisError::Scan(MediaError::Timeout)`
/// once `deadline` passes.
pub trait ContentAnalyzer: Send + Sync {
    fn analyze(&self, path: &Path, deadline: &Deadline) -> Result<VideoAnalysis, AnalysisError>;
}

impl ContentAnalyzer for VideoContentAnalyzer {
    fn analyze(&self, path: &Path, deadline: &Deadline) -> Result<VideoAnalysis, AnalysisError> {
        VideoContentAnalyzer::analyze_until(self, path, Some(deadline))
    }
}

/// Shared, read-only state of every candidate task.
struct PipelineContext {
    filters: FilterConfig,
    temp_root: PathBuf,
    analysis_timeout: Duration,
    /// Set on shutdown; running analyses poll it through their deadline
    cancelled: Arc<AtomicBool>,
    probe: Arc<dyn MetadataProbe>,
    fetcher: Arc<dyn VideoFetcher>,
    analyzer: Arc<dyn ContentAnalyzer>,
}

/// Runs candidates through the whole filter chain.
pub struct FilterPipeline {
    ctx: Arc<PipelineContext>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    shutdown: watch::Sender<bool>,
}

impl FilterPipeline {
    pub fn new(
        config: &WorkerConfig,
        probe: Arc<dyn MetadataProbe>,
        fetcher: Arc<dyn VideoFetcher>,
        analyzer: Arc<dyn ContentAnalyzer>,
    ) -> Self {
        let max_concurrent = config.max_concurrent_videos.max(1);
        let (shutdown, _) = watch::channel(false);
        Self {
            ctx: Arc::new(PipelineContext {
                filters: config.filters,
                temp_root: config.temp_dir.clone(),
                analysis_timeout: config.analysis_timeout,
                cancelled: Arc::new(AtomicBool::new(false)),
                probe,
                fetcher,
                analyzer,
            }),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            shutdown,
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.ctx.cancelled.store(true, Ordering::Relaxed);
        // Stored even while no run is subscribed
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Process every candidate and return one record per candidate, in input order.
    ///
    /// After a shutdown only the candidates that finished have a record.
    pub async fn run(&self, candidates: Vec<Candidate>) -> WorkerResult<Vec<ResultRecord>> {
        tokio::fs::create_dir_all(&self.ctx.temp_root).await?;
        info!(
            candidates = candidates.len(),
            max_concurrent = self.max_concurrent,
            temp_dir = %self.ctx.temp_root.display(),
            "Starting filter run"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut tasks = JoinSet::new();
        for (index, candidate) in candidates.iter().cloned().enumerate() {
            if *shutdown_rx.borrow() {
                break;
            }
            let permit = tokio::select! {
                permit = self.semaphore.clone().acquire_owned() => {
                    permit.map_err(|_| WorkerError::config_error("Semaphore closed"))?
                }
                _ = stopped(&mut shutdown_rx) => break,
            };
            let ctx = Arc::clone(&self.ctx);
            let logger = VideoLogger::new(index, &candidate);
            let span = logger.create_span();

            tasks.spawn(
                async move {
                    let record = process_candidate(&ctx, &logger, &candidate, permit).await;
                    (index, record)
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<ResultRecord>> = vec![None; candidates.len()];
        let mut aborted = false;
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((index, record))) => slots[index] = Some(record),
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => error!(error = %e, "Candidate task died"),
                },
                _ = stopped(&mut shutdown_rx), if !aborted => {
                    aborted = true;
                    warn!(in_flight = tasks.len(), "Shutdown requested; abandoning in-flight candidates");
                    tasks.abort_all();
                }
            }
        }

        if self.is_shutting_down() {
            let records: Vec<ResultRecord> = slots.into_iter().flatten().collect();
            info!(
                finished = records.len(),
                skipped = candidates.len() - records.len(),
                "Filter run interrupted"
            );
            return Ok(records);
        }

        // A task that panicked leaves its slot empty
        let records = slots
            .into_iter()
            .zip(candidates.iter())
            .map(|(slot, candidate)| {
                slot.unwrap_or_else(|| {
                    compose(
                        candidate,
                        ObservedMetadata::default(),
                        VideoOutcome::AnalysisFailed("candidate task died".to_string()),
                        &self.ctx.filters,
                    )
                })
            })
            .collect();
        Ok(records)
    }
}

/// Resolves once shutdown has been signalled.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            // Sender gone: shutdown can no longer be signalled
            std::future::pending::<()>().await;
        }
    }
}

async fn process_candidate(
    ctx: &PipelineContext,
    logger: &VideoLogger,
    candidate: &Candidate,
    permit: OwnedSemaphorePermit,
) -> ResultRecord {
    let started = Instant::now();
    logger.log_start("pre-filter");

    let (metadata, outcome) = match prefilter::evaluate(candidate, ctx.probe.as_ref(), &ctx.filters).await {
        Prefilter::Reject {
            metadata,
            reason,
            error,
        } => {
            logger.log_progress(&format!("rejected before download: {}", reason));
            (metadata, VideoOutcome::Prefiltered { reason, error })
        }
        Prefilter::Pass(metadata) => (
            metadata,
            fetch_and_analyze(ctx, logger, candidate, permit).await,
        ),
    };

    let record = compose(candidate, metadata, outcome, &ctx.filters);
    metrics::record_video(&record, started.elapsed().as_secs_f64());
    if record.is_accepted() {
        logger.log_completion("aceptado");
    } else {
        let reasons: Vec<&str> = record.razones.iter().map(|r| r.as_str()).collect();
        logger.log_completion(&format!("descartado ({})", reasons.join(", ")));
    }
    record
}

async fn fetch_and_analyze(
    ctx: &PipelineContext,
    logger: &VideoLogger,
    candidate: &Candidate,
    permit: OwnedSemaphorePermit,
) -> VideoOutcome {
    let workdir = match tempfile::Builder::new()
        .prefix(VIDEO_DIR_PREFIX)
        .tempdir_in(&ctx.temp_root)
    {
        Ok(dir) => dir,
        Err(e) => {
            logger.log_error(&format!("cannot create download directory: {}", e));
            return VideoOutcome::DownloadFailed(e.to_string());
        }
    };

    logger.log_progress("downloading");
    let download_started = Instant::now();
    let path = match ctx.fetcher.fetch(&candidate.url, workdir.path()).await {
        Ok(path) => path,
        Err(e) => {
            logger.log_error(&format!("download failed: {}", e));
            return VideoOutcome::DownloadFailed(e.to_string());
        }
    };
    metrics::record_download(download_started.elapsed().as_secs_f64());

    logger.log_progress("analyzing");
    let analyzer = Arc::clone(&ctx.analyzer);
    let deadline = Deadline::after(ctx.analysis_timeout).or_cancelled(Arc::clone(&ctx.cancelled));
    // Directory and slot both stay with the blocking thread until it returns
    let analysis = tokio::task::spawn_blocking(move || {
        let result = analyzer.analyze(&path, &deadline);
        drop(workdir);
        drop(permit);
        result
    });

    match tokio::time::timeout(ctx.analysis_timeout, analysis).await {
        Err(_) | Ok(Ok(Err(AnalysisError::Scan(MediaError::Timeout(_))))) => {
            logger.log_error(&format!(
                "analysis timed out after {}s",
                ctx.analysis_timeout.as_secs()
            ));
            VideoOutcome::AnalysisTimedOut
        }
        Ok(Err(join_error)) => {
            logger.log_error(&format!("analysis task failed: {}", join_error));
            VideoOutcome::AnalysisFailed(join_error.to_string())
        }
        Ok(Ok(Err(AnalysisError::Probe(e)))) => {
            logger.log_error(&format!("downloaded file unreadable: {}", e));
            VideoOutcome::ProbeFailed(e.to_string())
        }
        Ok(Ok(Err(e @ AnalysisError::Scan(_)))) => {
            logger.log_error(&e.to_string());
            VideoOutcome::AnalysisFailed(e.to_string())
        }
        Ok(Ok(Ok(analysis))) => {
            debug!(
                has_face = analysis.has_face,
                has_text = analysis.has_text,
                frames_scanned = analysis.frames_scanned,
                "Analysis finished"
            );
            VideoOutcome::Analyzed(analysis)
        }
    }
}
