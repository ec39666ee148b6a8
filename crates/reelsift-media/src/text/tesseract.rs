//! Tesseract CLI engine.
//!
//! The binarized frame is piped to `tesseract stdin stdout ... tsv` as PNG and
//! the word rows of the TSV report are turned into [`OcrWord`]s.

use image::{DynamicImage, ImageOutputFormat};
use reelsift_models::{PixelBox, TextMethod};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info};

use super::engine::{OcrEngine, OcrInput, OcrWord};
use crate::config::TextConfig;
use crate::error::{MediaError, MediaResult};

const ENGINE: &str = "tesseract";

/// TSV row level for individual words.
const WORD_LEVEL: u32 = 5;

/// Tesseract invoked as a child process per frame.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    lang: String,
    psm: u8,
    oem: u8,
}

impl TesseractEngine {
    /// Locate the binary configured in `config`.
    pub fn new(config: &TextConfig) -> MediaResult<Self> {
        let binary = which::which(&config.tesseract_cmd).map_err(|_| {
            MediaError::engine_unavailable(
                ENGINE,
                format!("`{}` not found in PATH", config.tesseract_cmd),
            )
        })?;

        info!(
            binary = %binary.display(),
            lang = %config.tesseract_lang,
            psm = config.tesseract_psm,
            oem = config.tesseract_oem,
            "Tesseract engine ready"
        );

        Ok(Self {
            binary,
            lang: config.tesseract_lang.clone(),
            psm: config.tesseract_psm,
            oem: config.tesseract_oem,
        })
    }

    fn args(&self) -> Vec<String> {
        vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "--psm".to_string(),
            self.psm.to_string(),
            "--oem".to_string(),
            self.oem.to_string(),
            "-l".to_string(),
            self.lang.clone(),
            "tsv".to_string(),
        ]
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        ENGINE
    }

    fn method(&self) -> TextMethod {
        TextMethod::Tesseract
    }

    fn input(&self) -> OcrInput {
        OcrInput::Binarized
    }

    fn recognize(&self, image: &DynamicImage) -> MediaResult<Vec<OcrWord>> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .map_err(|e| MediaError::engine_failed(ENGINE, format!("PNG encode failed: {}", e)))?;

        let mut child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaError::engine_failed(ENGINE, format!("spawn failed: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("tesseract stdin not captured"))?;
        // Write from a separate thread so a full stdout pipe cannot deadlock us
        let writer = std::thread::spawn(move || stdin.write_all(&png));

        let output = child.wait_with_output()?;
        writer
            .join()
            .map_err(|_| MediaError::internal("tesseract stdin writer panicked"))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::engine_failed(
                ENGINE,
                format!("exit {:?}: {}", output.status.code(), stderr.trim()),
            ));
        }

        let words = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(words = words.len(), "Tesseract pass finished");
        Ok(words)
    }
}

/// Parse Tesseract TSV output.
///
/// Keeps word-level rows with a non-negative confidence and non-blank text;
/// confidence is rescaled from percent to `[0, 1]`.
pub fn parse_tsv(tsv: &str) -> Vec<OcrWord> {
    tsv.lines().filter_map(parse_row).collect()
}

fn parse_row(line: &str) -> Option<OcrWord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 12 {
        return None;
    }
    let level: u32 = fields[0].trim().parse().ok()?;
    if level != WORD_LEVEL {
        return None;
    }
    let conf: f32 = fields[10].trim().parse().ok()?;
    if conf < 0.0 {
        return None;
    }
    let text = fields[11..].join("\t").trim().to_string();
    if text.is_empty() {
        return None;
    }

    let left: i64 = fields[6].trim().parse().ok()?;
    let top: i64 = fields[7].trim().parse().ok()?;
    let width: i64 = fields[8].trim().parse().ok()?;
    let height: i64 = fields[9].trim().parse().ok()?;

    Some(OcrWord {
        bbox: PixelBox::from_signed(left, top, width, height)?,
        text,
        confidence: (conf / 100.0).clamp(0.0, 1.0),
    })
}
