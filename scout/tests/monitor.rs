//! End-to-end lookups against a fake desktop.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::GrayImage;
use scout::input::paste_chord;
use scout::{FrameSource, InputDriver, Key, MonitorState, MonitorSupervisor, ScreenGrabber, ScreenMonitorService};
use vision::{Color, Error, Frame, Image, OwnedImage, Region, TemplateMatcher, TemplateSource, TextEngine, TextRecognizer, WordBox};

const ICON: &str = "three_dot_icon.png";

/// Three dark dots on a light tile, 16x16.
fn three_dots() -> OwnedImage {
	let mut icon = OwnedImage::new(16, 16, Color::gray(230));
	for top in [1, 6, 11] {
		icon.fill_rect(6, top, 4, 4, Color::gray(30));
	}
	icon
}

/// 800x600 desktop with the icon centered at local (400, 300).
fn desktop() -> OwnedImage {
	let mut img = OwnedImage::new(800, 600, Color::gray(120));
	for y in (0..600).step_by(10) {
		img.fill_rect(0, y, 800, 1, Color::gray(110));
	}
	img.paste(three_dots().as_image(), 392, 292);
	img
}

struct StaticScreen(OwnedImage);

impl ScreenGrabber for StaticScreen {
	fn virtual_desktop(&self) -> anyhow::Result<Region> {
		Ok(Region::new(0, 0, self.0.width(), self.0.height()))
	}

	fn grab(&self, region: Region) -> anyhow::Result<Frame> {
		Ok(Frame::from_image(region, &self.0))
	}
}

struct CannedOcr(Vec<WordBox>);

impl TextEngine for CannedOcr {
	fn recognize(&self, _image: Image) -> anyhow::Result<Vec<WordBox>> {
		Ok(self.0.clone())
	}
}

struct Icons;

impl TemplateSource for Icons {
	fn load(&self, name: &str) -> Result<GrayImage, Error> {
		match name {
			ICON => Ok(three_dots().to_gray_image()),
			_ => Err(Error::TemplateNotFound(name.to_owned())),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
	Move(i32, i32),
	Click,
	Hotkey(Vec<Key>),
}

#[derive(Clone, Default)]
struct Recorder {
	events: Arc<Mutex<Vec<Event>>>,
	broken: bool,
}

impl Recorder {
	fn events(&self) -> Vec<Event> {
		self.events.lock().expect("events").clone()
	}

	fn record(&self, event: Event) -> anyhow::Result<()> {
		if self.broken {
			anyhow::bail!("no input device");
		}
		self.events.lock().expect("events").push(event);
		Ok(())
	}
}

impl InputDriver for Recorder {
	fn move_to(&self, x: i32, y: i32) -> anyhow::Result<()> {
		self.record(Event::Move(x, y))
	}

	fn click(&self) -> anyhow::Result<()> {
		self.record(Event::Click)
	}

	fn hotkey(&self, keys: &[Key]) -> anyhow::Result<()> {
		self.record(Event::Hotkey(keys.to_vec()))
	}
}

fn home_and_history() -> Vec<WordBox> {
	vec![
		WordBox::new("Home", 50, 200, 60, 20, 96.0),
		WordBox::new("History", 50, 260, 80, 20, 94.0),
	]
}

fn build(region: Option<Region>, words: Vec<WordBox>, input: Recorder) -> ScreenMonitorService {
	let source = FrameSource::new(Arc::new(StaticScreen(desktop())), region)
		.expect("source")
		.with_interval(Duration::from_millis(10))
		.with_capture_wait(Duration::from_millis(500));
	ScreenMonitorService::new(
		source,
		Some(TextRecognizer::new(CannedOcr(words))),
		TemplateMatcher::new(Icons),
		input,
	)
}

fn running(region: Option<Region>) -> (ScreenMonitorService, Recorder) {
	let input = Recorder::default();
	let service = build(region, home_and_history(), input.clone());
	assert!(service.start());
	assert!(service.wait_until_ready(Duration::from_secs(2)));
	(service, input)
}

#[test]
fn finds_history_below_home() {
	let (service, _) = running(None);
	let m = service.find_text("history", 0.75).expect("match");
	assert_eq!(m.text, "History");
	assert!(m.score >= 0.75);
	assert_eq!((m.x, m.y), (90, 270));
	assert!((m.y - 260).abs() <= 20);
}

#[test]
fn strict_threshold_behaves_like_ceiling() {
	let (service, _) = running(None);
	// "histroy" is two edits away from "history": about 0.71.
	let strict = service.find_text("histroy", 0.95);
	let ceiling = service.find_text("histroy", 0.65);
	assert!(strict.is_some());
	assert_eq!(strict, ceiling);
}

#[test]
fn unknown_text_is_absent() {
	let (service, _) = running(None);
	assert!(service.find_text("subscriptions", 0.75).is_none());
	assert!(service.find_text("", 0.75).is_none());
}

#[test]
fn text_coordinates_include_region_offset() {
	let (service, _) = running(Some(Region::new(100, 50, 800, 600)));
	let m = service.find_text("history", 0.75).expect("match");
	assert_eq!((m.x, m.y), (190, 320));
}

#[test]
fn finds_icon_anywhere() {
	let (service, _) = running(None);
	let m = service.match_template(ICON, 0.8).expect("icon");
	assert_eq!((m.x, m.y), (400, 300));
	assert!(m.score > 0.99);
	assert!(service.match_template("missing.png", 0.8).is_none());
}

#[test]
fn finds_icon_near_anchor() {
	let (service, _) = running(None);
	let m = service.match_template_near(ICON, (390, 310), 50, 0.8).expect("icon");
	assert!((m.x - 400).abs() <= 1 && (m.y - 300).abs() <= 1, "{m:?}");

	// Anchor 50px away with a tiny radius.
	assert!(service.match_template_near(ICON, (450, 300), 5, 0.8).is_none());
}

#[test]
fn near_search_uses_absolute_anchor() {
	let (service, _) = running(Some(Region::new(1000, 200, 800, 600)));
	let m = service.match_template_near(ICON, (1390, 510), 50, 0.8).expect("icon");
	assert_eq!((m.x, m.y), (1400, 500));
	// Same numbers taken as local coordinates would miss.
	assert!(service.match_template_near(ICON, (390, 310), 50, 0.8).is_none());
}

#[test]
fn click_and_paste_reach_the_input_driver() {
	let (service, input) = running(None);
	let m = service.find_text("history", 0.75).expect("match");
	assert!(service.click_at(m.x, m.y));
	assert!(service.paste());
	assert_eq!(
		input.events(),
		vec![Event::Move(90, 270), Event::Click, Event::Hotkey(paste_chord().to_vec())]
	);
}

#[test]
fn input_failures_read_as_false() {
	let input = Recorder {
		broken: true,
		..Default::default()
	};
	let service = build(None, home_and_history(), input);
	assert!(!service.click_at(10, 10));
	assert!(!service.paste());
}

#[test]
fn queries_before_start_return_promptly() {
	let source = FrameSource::new(Arc::new(StaticScreen(desktop())), None)
		.expect("source")
		.with_capture_wait(Duration::ZERO);
	let service = ScreenMonitorService::new(
		source,
		Some(TextRecognizer::new(CannedOcr(home_and_history()))),
		TemplateMatcher::new(Icons),
		Recorder::default(),
	);
	assert_eq!(service.state(), MonitorState::Stopped);

	let started = Instant::now();
	assert!(service.find_text("history", 0.75).is_none());
	assert!(service.match_template(ICON, 0.8).is_none());
	assert!(started.elapsed() < Duration::from_millis(200));
}

#[test]
fn missing_ocr_engine_disables_text_only() {
	let source = FrameSource::new(Arc::new(StaticScreen(desktop())), None)
		.expect("source")
		.with_interval(Duration::from_millis(10));
	let service = ScreenMonitorService::new(source, None, TemplateMatcher::new(Icons), Recorder::default());
	assert!(service.start());
	assert!(service.wait_until_ready(Duration::from_secs(2)));
	assert_eq!(service.state(), MonitorState::Running);

	assert!(service.find_text("history", 0.75).is_none());
	assert!(service.match_template(ICON, 0.8).is_some());
}

#[test]
fn stopped_monitor_still_answers_from_last_frame() {
	let (service, _) = running(None);
	service.stop();
	assert_eq!(service.state(), MonitorState::Stopped);
	assert!(service.find_text("history", 0.75).is_some());
}

#[test]
fn debug_mode_writes_snapshots() {
	let dir = tempfile::tempdir().expect("tempdir");
	let (service, _) = running(None);

	let target = dir.path().join("ScreenDebug");
	assert_eq!(service.set_debug(true, Some(target.clone())), Some(target.clone()));
	assert_eq!(service.debug_dir(), Some(target.clone()));
	service.find_text("history", 0.75).expect("match");

	let written = std::fs::read_dir(&target)
		.expect("debug dir")
		.filter_map(|e| e.ok())
		.map(|e| e.file_name().to_string_lossy().into_owned())
		.collect::<Vec<_>>();
	assert!(written.iter().any(|n| n.starts_with("ocr_debug_") && n.ends_with(".png")), "{written:?}");
	assert!(written.iter().any(|n| n.ends_with(".txt")), "{written:?}");

	assert_eq!(service.set_debug(false, None), None);
	assert_eq!(service.debug_dir(), None);
}

#[test]
fn debug_defaults_to_configured_dir() {
	let dir = tempfile::tempdir().expect("tempdir");
	let input = Recorder::default();
	let service = build(None, home_and_history(), input).with_default_debug_dir(dir.path().join("dbg"));
	assert_eq!(service.set_debug(true, None), Some(dir.path().join("dbg")));
	assert!(dir.path().join("dbg").is_dir());
}

#[test]
fn supervisor_runs_one_monitor_at_a_time() {
	let supervisor = MonitorSupervisor::new(|region| {
		let source = FrameSource::new(Arc::new(StaticScreen(desktop())), region)?.with_interval(Duration::from_millis(10));
		Ok(ScreenMonitorService::new(
			source,
			Some(TextRecognizer::new(CannedOcr(home_and_history()))),
			TemplateMatcher::new(Icons),
			Recorder::default(),
		))
	});

	assert!(supervisor.get().is_none());
	assert!(!supervisor.stop());

	assert!(supervisor.start(None));
	assert!(!supervisor.start(None), "already running");
	let monitor = supervisor.get().expect("live monitor");
	assert_eq!(monitor.state(), MonitorState::Running);
	assert!(monitor.find_text("home", 0.75).is_some());

	assert!(supervisor.stop());
	assert!(supervisor.get().is_none());
	assert!(!monitor.is_running());

	assert!(supervisor.start(Some(Region::new(0, 0, 400, 400))));
	assert_eq!(supervisor.get().expect("live monitor").region(), Region::new(0, 0, 400, 400));
	assert!(supervisor.stop());
}

#[test]
fn supervisor_reports_factory_failure() {
	let supervisor = MonitorSupervisor::new(|_| anyhow::bail!("no display"));
	assert!(!supervisor.start(None));
	assert!(supervisor.get().is_none());
}
