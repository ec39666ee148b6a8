//! Metadata pre-filter.
//!
//! Cheap checks that run before anything is downloaded. Candidate metadata is
//! used as delivered; missing fields are looked up remotely. Checks run in a
//! fixed order (metadata, orientation, duration) and the first failure is the
//! only reason reported.

use async_trait::async_trait;
use reelsift_media::{probe_remote, MediaResult, RemoteMetadata};
use reelsift_models::{Candidate, ObservedMetadata, RejectReason};
use tracing::debug;

use crate::config::FilterConfig;

/// Remote metadata lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe(&self, url: &str) -> MediaResult<RemoteMetadata>;
}

/// Looks metadata up with `yt-dlp --print`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YtDlpProbe;

#[async_trait]
impl MetadataProbe for YtDlpProbe {
    async fn probe(&self, url: &str) -> MediaResult<RemoteMetadata> {
        probe_remote(url).await
    }
}

/// Result of the pre-filter for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Prefilter {
    /// Go on to download and analysis.
    Pass(ObservedMetadata),
    /// Rejected with exactly one reason.
    Reject {
        metadata: ObservedMetadata,
        reason: RejectReason,
        error: Option<String>,
    },
}

impl Prefilter {
    pub fn metadata(&self) -> ObservedMetadata {
        match self {
            Prefilter::Pass(metadata) | Prefilter::Reject { metadata, .. } => *metadata,
        }
    }
}

/// Candidate fields first, remote lookup only for what is missing.
///
/// Returns the merged metadata and the lookup error, if one happened.
pub async fn resolve_metadata(
    candidate: &Candidate,
    probe: &dyn MetadataProbe,
) -> (RemoteMetadata, Option<String>) {
    let mut known = RemoteMetadata {
        duration: candidate.known_duration(),
        width: candidate.known_dimensions().map(|(w, _)| w),
        height: candidate.known_dimensions().map(|(_, h)| h),
    };
    if known.is_complete() {
        return (known, None);
    }

    match probe.probe(&candidate.url).await {
        Ok(remote) => {
            debug!(url = %candidate.url, ?remote, "Remote metadata");
            known.duration = known.duration.or(remote.duration);
            if known.width.is_none() || known.height.is_none() {
                known.width = remote.width;
                known.height = remote.height;
            }
            (known, None)
        }
        Err(e) => (known, Some(e.to_string())),
    }
}

/// Apply the metadata checks to already resolved metadata.
pub fn check(metadata: &RemoteMetadata, filters: &FilterConfig) -> Result<ObservedMetadata, RejectReason> {
    if metadata.duration.is_none() && metadata.width.is_none() && metadata.height.is_none() {
        return Err(RejectReason::MetadataUnavailable);
    }

    let observed = ObservedMetadata {
        duration: metadata.duration.unwrap_or(0.0),
        width: metadata.width.unwrap_or(0),
        height: metadata.height.unwrap_or(0),
    };

    // Unknown dimensions never count as vertical
    let vertical = observed.width > 0 && observed.height > 0 && observed.height > observed.width;
    if filters.vertical && !vertical {
        return Err(RejectReason::Horizontal);
    }
    if !filters.duration_in_range(observed.duration) {
        return Err(RejectReason::DurationOutOfRange);
    }
    Ok(observed)
}

/// Resolve metadata and run the checks for one candidate.
pub async fn evaluate(
    candidate: &Candidate,
    probe: &dyn MetadataProbe,
    filters: &FilterConfig,
) -> Prefilter {
    let (metadata, error) = resolve_metadata(candidate, probe).await;
    match check(&metadata, filters) {
        Ok(observed) => Prefilter::Pass(observed),
        Err(reason) => Prefilter::Reject {
            metadata: ObservedMetadata {
                duration: metadata.duration.unwrap_or(0.0),
                width: metadata.width.unwrap_or(0),
                height: metadata.height.unwrap_or(0),
            },
            reason,
            // Only surface the lookup error when it explains the rejection
            error: error.filter(|_| reason == RejectReason::MetadataUnavailable),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsift_media::MediaError;

    fn candidate(duration: Option<f64>, width: Option<u32>, height: Option<u32>) -> Candidate {
        let mut c = Candidate::from_url("https://www.youtube.com/shorts/abc");
        c.duration = duration;
        c.width = width;
        c.height = height;
        c
    }

    fn known(duration: Option<f64>, width: Option<u32>, height: Option<u32>) -> RemoteMetadata {
        RemoteMetadata {
            duration,
            width,
            height,
        }
    }

    fn filters() -> FilterConfig {
        FilterConfig {
            min_duration: 5.0,
            max_duration: 60.0,
            ..FilterConfig::default()
        }
    }

    #[test]
    fn test_check_order_is_exclusive() {
        let f = filters();
        assert_eq!(check(&known(None, None, None), &f), Err(RejectReason::MetadataUnavailable));
        // Horizontal and too long: orientation wins
        assert_eq!(
            check(&known(Some(600.0), Some(1920), Some(1080)), &f),
            Err(RejectReason::Horizontal)
        );
        assert_eq!(
            check(&known(Some(600.0), Some(720), Some(1280)), &f),
            Err(RejectReason::DurationOutOfRange)
        );
        let ok = check(&known(Some(30.0), Some(720), Some(1280)), &f).unwrap();
        assert_eq!(ok.width, 720);
    }

    #[test]
    fn test_square_and_unknown_dimensions_are_not_vertical() {
        let f = filters();
        assert_eq!(check(&known(Some(30.0), Some(720), Some(720)), &f), Err(RejectReason::Horizontal));
        assert_eq!(check(&known(Some(30.0), None, None), &f), Err(RejectReason::Horizontal));

        let no_orientation = FilterConfig {
            vertical: false,
            ..filters()
        };
        assert!(check(&known(Some(30.0), None, None), &no_orientation).is_ok());
    }

    #[test]
    fn test_unknown_duration_is_out_of_range() {
        assert_eq!(
            check(&known(None, Some(720), Some(1280)), &filters()),
            Err(RejectReason::DurationOutOfRange)
        );
    }

    #[tokio::test]
    async fn test_complete_candidate_skips_remote_probe() {
        let mut probe = MockMetadataProbe::new();
        probe.expect_probe().times(0);

        let outcome = evaluate(&candidate(Some(30.0), Some(720), Some(1280)), &probe, &filters()).await;
        assert!(matches!(outcome, Prefilter::Pass(m) if m.height == 1280));
    }

    #[tokio::test]
    async fn test_missing_fields_filled_remotely() {
        let mut probe = MockMetadataProbe::new();
        probe
            .expect_probe()
            .times(1)
            .returning(|_| Ok(known(Some(20.0), Some(1080), Some(1920))));

        // Zero dimensions from a scraper count as unknown
        let outcome = evaluate(&candidate(Some(45.0), Some(0), Some(0)), &probe, &filters()).await;
        assert_eq!(
            outcome,
            Prefilter::Pass(ObservedMetadata {
                duration: 45.0,
                width: 1080,
                height: 1920,
            })
        );
    }

    #[tokio::test]
    async fn test_failed_lookup_without_metadata() {
        let mut probe = MockMetadataProbe::new();
        probe
            .expect_probe()
            .returning(|_| Err(MediaError::download_failed("private video")));

        let outcome = evaluate(&candidate(None, None, None), &probe, &filters()).await;
        match outcome {
            Prefilter::Reject { reason, error, .. } => {
                assert_eq!(reason, RejectReason::MetadataUnavailable);
                assert!(error.unwrap().contains("private video"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
