//! Candidate filtering worker.
//!
//! This crate provides:
//! - Environment-driven worker configuration
//! - Candidate loading and the metadata pre-filter
//! - A bounded download-and-analyze pipeline
//! - The accept/reject decision and run reports

pub mod candidates;
pub mod cleanup;
pub mod config;
pub mod decision;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod prefilter;
pub mod report;

pub use candidates::{CandidateSource, JsonFileSource};
pub use config::{FilterConfig, WorkerConfig};
pub use decision::{compose, VideoOutcome};
pub use error::{WorkerError, WorkerResult};
pub use logging::VideoLogger;
pub use pipeline::{ContentAnalyzer, FilterPipeline, VideoFetcher, YtDlpFetcher};
pub use prefilter::{MetadataProbe, Prefilter, YtDlpProbe};
pub use report::{summarize, write_reports, RunSummary};
