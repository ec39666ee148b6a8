//! Where candidate records come from.
//!
//! Discovery (platform search and scraping) happens upstream; the worker only
//! reads its output.

use async_trait::async_trait;
use reelsift_models::Candidate;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};

/// A provider of candidate videos.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> String;

    /// Load every candidate, in the order they should be reported.
    async fn load(&self) -> WorkerResult<Vec<Candidate>>;
}

/// Accepted layouts of the candidates file.
#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateFile {
    List(Vec<Candidate>),
    Wrapped { candidates: Vec<Candidate> },
}

/// Candidates stored as a JSON array (or `{"candidates": [...]}`).
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CandidateSource for JsonFileSource {
    fn name(&self) -> String {
        format!("json:{}", self.path.display())
    }

    async fn load(&self) -> WorkerResult<Vec<Candidate>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            WorkerError::candidates_failed(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let candidates = parse_candidates(&bytes)?;
        info!(
            path = %self.path.display(),
            count = candidates.len(),
            "Loaded candidates"
        );
        Ok(candidates)
    }
}

/// Parse, normalize and deduplicate candidate records.
///
/// Records without a URL are dropped; repeated URLs keep their first
/// occurrence.
pub fn parse_candidates(bytes: &[u8]) -> WorkerResult<Vec<Candidate>> {
    let raw = match serde_json::from_slice::<CandidateFile>(bytes)
        .map_err(|e| WorkerError::candidates_failed(format!("invalid candidates file: {}", e)))?
    {
        CandidateFile::List(list) => list,
        CandidateFile::Wrapped { candidates } => candidates,
    };

    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(raw.len());
    for candidate in raw {
        let url = candidate.url.trim();
        if url.is_empty() {
            warn!(id = %candidate.id, "Skipping candidate without URL");
            continue;
        }
        if !seen.insert(url.to_string()) {
            warn!(url = %url, "Skipping duplicate candidate");
            continue;
        }
        candidates.push(candidate.normalized());
    }
    Ok(candidates)
}
