//! Text Fusion Benchmarks
//!
//! Measures the per-frame costs that do not depend on external engines.
//!
//! # Running Benchmarks
//! ```bash
//! cargo bench --package reelsift-media --bench text_fusion
//! ```
//!
//! # Metrics Measured
//! - Overlap deduplication over fused layer output
//! - Tesseract input binarization
//! - Skip-sampled scan loop overhead

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{GrayImage, Luma, Rgb, RgbImage};
use reelsift_media::error::MediaResult;
use reelsift_media::text::{binarize_for_ocr, dedup_overlapping};
use reelsift_media::{scan_with_early_exit, Frame, FrameSource, ScanPlan};
use reelsift_models::{Detection, PixelBox, TextMethod, VideoProps};
use std::time::Duration;

/// Heuristic-style output: many small, partly overlapping boxes.
fn synthetic_detections(count: usize) -> Vec<Detection> {
    (0..count)
        .map(|i| {
            let x = ((i * 37) % 1000) as u32;
            let y = ((i * 53) % 1800) as u32;
            let w = 8 + (i % 40) as u32;
            let h = 6 + (i % 25) as u32;
            Detection::text(
                PixelBox::new(x, y, w, h).expect("non-empty box"),
                0.8,
                TextMethod::Edge,
                format!("EDGE_{}", i),
                0,
                0.0,
            )
        })
        .collect()
}

fn synthetic_gray(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 11) % 256) as u8]))
}

/// Uniform in-memory source; frames are never inspected by the callback.
struct SyntheticSource {
    props: VideoProps,
    next: u64,
    image: RgbImage,
}

impl SyntheticSource {
    fn new(frame_count: u64) -> Self {
        Self {
            props: VideoProps {
                fps: 30.0,
                frame_count,
                width: 32,
                height: 32,
            },
            next: 0,
            image: RgbImage::from_pixel(32, 32, Rgb([16, 16, 16])),
        }
    }
}

impl FrameSource for SyntheticSource {
    fn props(&self) -> VideoProps {
        self.props
    }

    fn position(&self) -> u64 {
        self.next
    }

    fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.next >= self.props.frame_count {
            return Ok(None);
        }
        let index = self.next;
        self.next += 1;
        Ok(Some(Frame::new(index, index as f64 / 30.0, self.image.clone())))
    }

    fn skip_frame(&mut self) -> MediaResult<bool> {
        if self.next >= self.props.frame_count {
            return Ok(false);
        }
        self.next += 1;
        Ok(true)
    }
}

fn bench_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    for count in [50usize, 500, 2000] {
        let detections = synthetic_detections(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &detections, |b, d| {
            b.iter(|| black_box(dedup_overlapping(black_box(d.clone()))))
        });
    }
    group.finish();
}

fn bench_binarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("binarize");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    for (width, height) in [(1080u32, 1920u32), (720, 1280), (480, 854)] {
        let gray = synthetic_gray(width, height);
        group.bench_with_input(
            BenchmarkId::new("resolution", format!("{}x{}", width, height)),
            &gray,
            |b, g| b.iter(|| black_box(binarize_for_ocr(black_box(g), 640))),
        );
    }
    group.finish();
}

fn bench_scan_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_loop");

    for skip in [1u64, 15, 60] {
        group.bench_with_input(BenchmarkId::new("skip", skip), &skip, |b, &skip| {
            b.iter(|| {
                let mut source = SyntheticSource::new(1800);
                let outcome = scan_with_early_exit(&mut source, ScanPlan::new(skip, None), "bench", |_| {
                    Vec::new()
                });
                black_box(outcome.map(|o| o.frames_visited).unwrap_or(0))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dedup, bench_binarize, bench_scan_loop);
criterion_main!(benches);
