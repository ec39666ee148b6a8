//! Candidate filtering worker binary.

use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelsift_media::{DetectionConfig, ModelHandle, VideoContentAnalyzer};
use reelsift_worker::cleanup::sweep_stale_downloads;
use reelsift_worker::report::log_summary;
use reelsift_worker::{
    metrics, summarize, write_reports, CandidateSource, FilterPipeline, JsonFileSource,
    WorkerConfig, YtDlpFetcher, YtDlpProbe,
};

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("reelsift=info".parse()?)
        .add_directive("ort=warn".parse()?);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();
    init_tracing(config.log_json)?;

    info!("Starting reelsift-worker");
    info!("Worker config: {:?}", config);
    config.validate()?;

    if let Some(addr) = config.metrics_addr {
        metrics::init_metrics(addr)?;
        info!(addr = %addr, "Prometheus exporter listening");
    }

    if let Err(e) = sweep_stale_downloads(&config.temp_dir, config.stale_temp_age).await {
        warn!(error = %e, "Stale download sweep failed");
    }

    // Detectors load once; every task shares them
    let detection = DetectionConfig::from_env();
    info!(
        tier_short_max = detection.sampling.short_max,
        confirm_faces = detection.face.confirm,
        aggressiveness = %detection.text.aggressiveness,
        use_gpu = detection.use_gpu,
        "Detection config"
    );
    let model = ModelHandle::load(&detection.face, detection.use_gpu)
        .context("failed to load face model")?;
    let analyzer = VideoContentAnalyzer::from_config(&detection, model)
        .context("failed to initialize video analyzer")?;

    let source = JsonFileSource::new(&config.candidates_file);
    let candidates = source.load().await?;
    if candidates.is_empty() {
        warn!(source = %source.name(), "No candidates to process");
    }

    let pipeline = Arc::new(FilterPipeline::new(
        &config,
        Arc::new(YtDlpProbe),
        Arc::new(YtDlpFetcher::from_config(&config)),
        Arc::new(analyzer),
    ));

    // Setup signal handler
    let signal_pipeline = Arc::clone(&pipeline);
    let shutdown_handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_pipeline.shutdown();
        }
    });

    let records = pipeline.run(candidates).await?;
    shutdown_handle.abort();
    if pipeline.is_shutting_down() {
        warn!(
            finished = records.len(),
            "Run interrupted; reporting finished candidates only"
        );
    }

    if let Err(e) = write_reports(&config.output_dir, &records).await {
        error!("Failed to write reports: {}", e);
        return Err(e.into());
    }
    log_summary(&summarize(&records));

    info!("Worker shutdown complete");
    Ok(())
}
