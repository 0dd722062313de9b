//! The screen monitor service.
//!
//! Owns the capture loop and answers "where is X on screen" queries against
//! the latest frame. Every public query degrades to `None`/`false` on failure;
//! the reason is logged, never returned.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use vision::ocr::PaddleEngine;
use vision::template::TemplateDir;
use vision::{
	lines, Candidate, Frame, FuzzyMatcher, MatchResult, Region, TemplateMatch, TemplateMatcher, TextRecognizer,
};

use crate::assets::resolve_ocr_assets;
use crate::capture::XcapGrabber;
use crate::config::{self, Config};
use crate::debug::DebugSink;
use crate::input::{paste_chord, EnigoDriver, InputDriver};
use crate::source::FrameSource;

pub const DEFAULT_TEXT_THRESHOLD: f32 = 0.75;
pub const DEFAULT_TEMPLATE_THRESHOLD: f32 = 0.8;
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
	Stopped,
	/// Loop running, no frame yet.
	Starting,
	Running,
}

pub struct ScreenMonitorService {
	source: FrameSource,
	recognizer: Option<TextRecognizer>,
	fuzzy: FuzzyMatcher,
	templates: TemplateMatcher,
	input: Box<dyn InputDriver>,
	debug: RwLock<Option<Arc<DebugSink>>>,
	default_debug_dir: PathBuf,
	ready_timeout: Duration,
}

impl ScreenMonitorService {
	/// `recognizer: None` runs without OCR; `find_text` then always misses.
	pub fn new(
		source: FrameSource,
		recognizer: Option<TextRecognizer>,
		templates: TemplateMatcher,
		input: impl InputDriver + 'static,
	) -> Self {
		Self {
			source,
			recognizer,
			fuzzy: FuzzyMatcher::default(),
			templates,
			input: Box::new(input),
			debug: RwLock::new(None),
			default_debug_dir: config::default_debug_dir(),
			ready_timeout: DEFAULT_READY_TIMEOUT,
		}
	}

	pub fn with_fuzzy(mut self, fuzzy: FuzzyMatcher) -> Self {
		self.fuzzy = fuzzy;
		self
	}

	pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
		self.ready_timeout = timeout;
		self
	}

	/// Directory used by `set_debug(true, None)`.
	pub fn with_default_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.default_debug_dir = dir.into();
		self
	}

	/// Wire the real desktop: xcap capture, PaddleOCR, enigo input.
	///
	/// Missing OCR models are logged and leave text lookup disabled; only a
	/// failure to reach the display is an error.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let source = FrameSource::new(Arc::new(XcapGrabber), cfg.region)
			.context("failed to set up screen capture")?
			.with_interval(cfg.capture_interval())
			.with_capture_wait(cfg.capture_wait());

		let recognizer = match load_recognizer(cfg) {
			Ok(recognizer) => Some(recognizer),
			Err(err) => {
				tracing::warn!(error = %format!("{err:#}"), "OCR unavailable; text lookup disabled");
				None
			}
		};

		let template_dir = cfg.template_dir();
		tracing::debug!(dir = %template_dir.display(), "template directory");
		let templates = TemplateMatcher::new(TemplateDir::new(template_dir));

		let service = Self::new(source, recognizer, templates, EnigoDriver)
			.with_fuzzy(cfg.fuzzy())
			.with_ready_timeout(cfg.ready_timeout())
			.with_default_debug_dir(cfg.debug_dir());
		if cfg.debug {
			service.set_debug(true, None);
		}
		Ok(service)
	}

	#[inline]
	pub fn region(&self) -> Region {
		self.source.region()
	}

	pub fn source(&self) -> &FrameSource {
		&self.source
	}

	pub fn ready_timeout(&self) -> Duration {
		self.ready_timeout
	}

	pub fn state(&self) -> MonitorState {
		if !self.source.is_running() {
			MonitorState::Stopped
		} else if self.source.has_frame() {
			MonitorState::Running
		} else {
			MonitorState::Starting
		}
	}

	pub fn is_running(&self) -> bool {
		self.source.is_running()
	}

	pub fn start(&self) -> bool {
		self.source.start()
	}

	pub fn stop(&self) {
		self.source.stop();
	}

	pub fn wait_until_ready(&self, timeout: Duration) -> bool {
		self.source.wait_until_ready(timeout)
	}

	fn frame(&self) -> Option<Arc<Frame>> {
		let frame = self.source.capture();
		if frame.is_none() {
			tracing::debug!(error = %vision::Error::NoFrameAvailable, "query skipped");
		}
		frame
	}

	/// Locate `query` on screen. The point is absolute; for a multi-word line
	/// it sits on the words that matched.
	pub fn find_text(&self, query: &str, threshold: f32) -> Option<MatchResult> {
		let Some(recognizer) = &self.recognizer else {
			tracing::debug!(query, "find_text without OCR engine");
			return None;
		};
		let frame = self.frame()?;

		let words = recognizer.ocr_image(&frame);
		let lines = lines::reconstruct(&words);
		let candidates = Candidate::gather(words, lines);
		let eval = self.fuzzy.evaluate(&candidates, query, threshold, frame.region());

		if let Some(sink) = self.debug_sink() {
			sink.emit(&frame, query, &candidates, &eval);
		}

		match &eval.result {
			Some(m) => tracing::debug!(query, text = %m.text, x = m.x, y = m.y, score = m.score, "text found"),
			None => tracing::debug!(query, threshold = eval.threshold, candidates = candidates.len(), "text not found"),
		}
		eval.result
	}

	/// Best match of template `name` anywhere in the frame, absolute center.
	pub fn match_template(&self, name: &str, threshold: f32) -> Option<TemplateMatch> {
		let frame = self.frame()?;
		let rgb = frame.to_rgb();
		let found = self.templates.locate(rgb.as_image(), name, threshold)?;
		Some(absolute(frame.region(), found))
	}

	/// Like [`match_template`](Self::match_template), searching only a square
	/// of side `2 * radius` around the absolute point `center`.
	pub fn match_template_near(&self, name: &str, center: (i32, i32), radius: u32, threshold: f32) -> Option<TemplateMatch> {
		let frame = self.frame()?;
		let region = frame.region();
		let local = region.to_local(center.0, center.1);
		let rgb = frame.to_rgb();
		let found = self.templates.locate_near(rgb.as_image(), name, local, radius, threshold)?;
		Some(absolute(region, found))
	}

	/// Move the pointer to the absolute point and left click.
	pub fn click_at(&self, x: i32, y: i32) -> bool {
		let clicked = self.input.move_to(x, y).and_then(|()| self.input.click());
		match clicked {
			Ok(()) => {
				tracing::debug!(x, y, "clicked");
				true
			}
			Err(err) => {
				tracing::warn!(x, y, error = %format!("{err:#}"), "click failed");
				false
			}
		}
	}

	/// Send the paste shortcut to whatever has focus.
	pub fn paste(&self) -> bool {
		match self.input.hotkey(&paste_chord()) {
			Ok(()) => true,
			Err(err) => {
				tracing::warn!(error = %format!("{err:#}"), "paste failed");
				false
			}
		}
	}

	/// Toggle debug artifacts. Returns the directory in use while enabled.
	pub fn set_debug(&self, enabled: bool, dir: Option<PathBuf>) -> Option<PathBuf> {
		let mut debug = self.debug.write().unwrap_or_else(PoisonError::into_inner);
		if !enabled {
			if debug.take().is_some() {
				tracing::info!("debug artifacts disabled");
			}
			return None;
		}

		let dir = dir.unwrap_or_else(|| self.default_debug_dir.clone());
		match DebugSink::new(&dir) {
			Ok(sink) => {
				tracing::info!(dir = %dir.display(), "debug artifacts enabled");
				*debug = Some(sink);
				Some(dir)
			}
			Err(err) => {
				tracing::warn!(error = %format!("{err:#}"), "cannot enable debug artifacts");
				*debug = None;
				None
			}
		}
	}

	pub fn debug_dir(&self) -> Option<PathBuf> {
		self.debug_sink().map(|sink| sink.dir().to_path_buf())
	}

	/// The guard is dropped before returning; snapshots are written without it.
	fn debug_sink(&self) -> Option<Arc<DebugSink>> {
		self.debug.read().unwrap_or_else(PoisonError::into_inner).clone()
	}
}

fn absolute(region: Region, m: TemplateMatch) -> TemplateMatch {
	let (x, y) = region.to_absolute(m.x, m.y);
	TemplateMatch { x, y, score: m.score }
}

fn load_recognizer(cfg: &Config) -> Result<TextRecognizer> {
	let assets = resolve_ocr_assets(&cfg.ocr_language)?;
	tracing::info!(detection = %assets.detection.display(), recognition = %assets.recognition.display(), "loading OCR models");
	let engine = PaddleEngine::try_new(&assets.detection, &assets.recognition, &assets.charset)?;
	Ok(TextRecognizer::new(engine).with_min_confidence(cfg.ocr_confidence))
}
