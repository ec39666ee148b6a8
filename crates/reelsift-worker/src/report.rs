//! Run reports: `results.json`, `accepted_list.txt` and a summary log.

use reelsift_models::{RejectReason, ResultRecord, Verdict};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

pub const RESULTS_FILE: &str = "results.json";
pub const ACCEPTED_LIST_FILE: &str = "accepted_list.txt";

/// Counts over a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub accepted: usize,
    pub discarded: usize,
    /// Rejection reasons in pipeline order, only those that occurred
    pub reasons: Vec<(RejectReason, usize)>,
}

/// Files written by [`write_reports`].
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub results: PathBuf,
    pub accepted_list: PathBuf,
}

/// Tally verdicts and reasons.
pub fn summarize(records: &[ResultRecord]) -> RunSummary {
    let accepted = records.iter().filter(|r| r.estado == Verdict::Aceptado).count();
    let reasons = RejectReason::ALL
        .iter()
        .filter_map(|reason| {
            let count = records
                .iter()
                .flat_map(|r| r.razones.iter())
                .filter(|r| *r == reason)
                .count();
            (count > 0).then_some((*reason, count))
        })
        .collect();

    RunSummary {
        total: records.len(),
        accepted,
        discarded: records.len() - accepted,
        reasons,
    }
}

/// Numbered human-readable list of accepted videos.
pub fn render_accepted_list(records: &[ResultRecord]) -> String {
    let mut out = String::new();
    out.push_str("==============================\n");
    out.push_str("VIDEOS QUE PASARON LOS FILTROS\n");
    out.push_str("==============================\n\n");

    for (i, record) in records.iter().filter(|r| r.is_accepted()).enumerate() {
        // Writing into a String cannot fail
        let _ = writeln!(out, "{}) \"{}\"", i + 1, record.titulo);
        let _ = writeln!(out, "   • Enlace: {}", record.enlace);
        let _ = writeln!(out, "   • Duración: {} s", record.duracion_sec);
        let _ = writeln!(out, "   • Resolución: {}", record.resolution);
        let _ = writeln!(out, "   • Plataforma: {}", record.platform.title());
        out.push('\n');
    }
    out
}

/// Write both report files into `output_dir`, creating it if needed.
pub async fn write_reports(output_dir: &Path, records: &[ResultRecord]) -> WorkerResult<ReportPaths> {
    tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
        WorkerError::report_failed(format!("cannot create {}: {}", output_dir.display(), e))
    })?;

    let paths = ReportPaths {
        results: output_dir.join(RESULTS_FILE),
        accepted_list: output_dir.join(ACCEPTED_LIST_FILE),
    };

    let json = serde_json::to_vec_pretty(records)?;
    tokio::fs::write(&paths.results, json).await?;
    tokio::fs::write(&paths.accepted_list, render_accepted_list(records)).await?;

    info!(
        results = %paths.results.display(),
        accepted_list = %paths.accepted_list.display(),
        "Reports written"
    );
    Ok(paths)
}

/// Log the run totals and the per-reason histogram.
pub fn log_summary(summary: &RunSummary) {
    info!(
        total = summary.total,
        accepted = summary.accepted,
        discarded = summary.discarded,
        "Run summary"
    );
    for (reason, count) in &summary.reasons {
        info!(reason = %reason, key = reason.key(), count, "Discard reason");
    }
}
