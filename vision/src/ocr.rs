//! OCR wrapper.
//!
//! The default engine is `ocr-rs` (Rust PaddleOCR bindings). Anything that can
//! turn an RGB view into word boxes can stand in through [`TextEngine`].

use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;

use crate::{Error, Frame, Image};

/// One recognized word in frame-local pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct WordBox {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    /// 0-100.
    pub confidence: f32,
}

impl WordBox {
    pub fn new(text: impl Into<String>, left: i32, top: i32, width: i32, height: i32, confidence: f32) -> Self {
        Self {
            text: text.into(),
            left,
            top,
            width,
            height,
            confidence,
        }
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }
}

/// An OCR primitive.
pub trait TextEngine: Send + Sync {
    /// Recognize words in an RGB view. Confidence must be on a 0-100 scale.
    fn recognize(&self, image: Image) -> anyhow::Result<Vec<WordBox>>;
}

/// Turns frames into filtered word boxes.
pub struct TextRecognizer {
    engine: Box<dyn TextEngine>,
    min_confidence: f32,
}

impl TextRecognizer {
    pub const DEFAULT_MIN_CONFIDENCE: f32 = 50.0;

    pub fn new(engine: impl TextEngine + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            min_confidence: Self::DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Recognize a frame, degrading to no words on failure.
    pub fn ocr_image(&self, frame: &Frame) -> Vec<WordBox> {
        match self.try_ocr_image(frame) {
            Ok(words) => words,
            Err(err) => {
                tracing::warn!(error = %err, "ocr failed; treating frame as empty");
                Vec::new()
            }
        }
    }

    pub fn try_ocr_image(&self, frame: &Frame) -> Result<Vec<WordBox>, Error> {
        if frame.is_empty() {
            return Err(Error::EmptyImage);
        }
        let rgb = frame.to_rgb();
        self.try_ocr_view(rgb.as_image())
    }

    pub fn try_ocr_view(&self, image: Image) -> Result<Vec<WordBox>, Error> {
        if image.is_empty() {
            return Err(Error::EmptyImage);
        }
        let words = self
            .engine
            .recognize(image)
            .map_err(|err| Error::RecognitionFailed(format!("{err:#}")))?;

        let min = self.min_confidence;
        Ok(words
            .into_iter()
            .filter_map(|mut w| {
                let trimmed = w.text.trim();
                if trimmed.is_empty() || w.confidence < min {
                    return None;
                }
                if trimmed.len() != w.text.len() {
                    w.text = trimmed.to_owned();
                }
                Some(w)
            })
            .collect())
    }
}

// ----------

/// PaddleOCR via `ocr-rs`.
pub struct PaddleEngine {
    engine: Mutex<ocr_rs::OcrEngine>,
}

impl PaddleEngine {
    /// Initialize the OCR engine with the given model paths.
    pub fn try_new(
        detection: impl AsRef<Path>,
        recognition: impl AsRef<Path>,
        charsset: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        let thread_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let engine = ocr_rs::OcrEngine::new(
            detection,
            recognition,
            charsset,
            Some(ocr_rs::OcrEngineConfig {
                backend: ocr_rs::Backend::CPU,
                thread_count: i32::try_from(thread_count).unwrap_or(i32::MAX),
                // UI text is small and anti-aliased; High trades CPU for recall.
                precision_mode: ocr_rs::PrecisionMode::High,
                enable_parallel: thread_count > 1,
                // Filtering happens in TextRecognizer against the configured threshold.
                min_result_confidence: 0.0,
                ..Default::default()
            }),
        )
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("failed to initialize OCR engine")?;

        Ok(Self {
            engine: Mutex::new(engine),
        })
    }
}

impl TextEngine for PaddleEngine {
    fn recognize(&self, image: Image) -> anyhow::Result<Vec<WordBox>> {
        let input = ocr_rs::preprocess::rgb_to_image(&image.get_bytes(), image.width(), image.height());

        let engine = self.engine.lock().unwrap_or_else(|e| e.into_inner());
        let results = engine
            .recognize(&input)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("ocr-rs recognize")?;

        let mut words = Vec::new();
        for r in results {
            let rect = r.bbox.rect;
            words.extend(split_words(
                &r.text,
                rect.left(),
                rect.top(),
                rect.width() as i32,
                rect.height() as i32,
                r.confidence * 100.0,
            ));
        }
        Ok(words)
    }
}

/// Split a recognized text line into per-word boxes.
///
/// Paddle detects whole lines. Word extents are approximated by giving each
/// character an equal share of the line width, which is close enough for
/// proportional UI fonts to click the right word.
pub fn split_words(text: &str, left: i32, top: i32, width: i32, height: i32, confidence: f32) -> Vec<WordBox> {
    let total = text.chars().count();
    if total == 0 {
        return Vec::new();
    }
    let per_char = width as f32 / total as f32;

    let mut words = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in text.chars().chain(std::iter::once(' ')).enumerate() {
        match (ch.is_whitespace(), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                let word: String = text.chars().skip(s).take(i - s).collect();
                let x1 = (s as f32 * per_char).round() as i32;
                let x2 = (i as f32 * per_char).round() as i32;
                words.push(WordBox::new(word, left + x1, top, (x2 - x1).max(1), height, confidence));
                start = None;
            }
            _ => {}
        }
    }
    words
}
