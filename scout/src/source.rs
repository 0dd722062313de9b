//! Background capture loop.
//!
//! One worker thread owns the grabber and keeps replacing the "latest frame"
//! slot. Readers clone the `Arc` out of the slot, so a query never observes a
//! half-written buffer and never copies pixels just to look at them.

use std::{
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc, Condvar, Mutex, MutexGuard, PoisonError,
	},
	thread::JoinHandle,
	time::Duration,
};

use anyhow::Result;
use vision::{Frame, Region};

use crate::capture::ScreenGrabber;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_CAPTURE_WAIT: Duration = Duration::from_secs(1);

type Latest = (Mutex<Option<Arc<Frame>>>, Condvar);
/// Run flag of one capture session. The condvar lets `stop` cut a sleep short.
type RunFlag = Arc<(Mutex<bool>, Condvar)>;

#[derive(Debug, Default)]
pub struct CaptureStats {
	pub frames: AtomicU64,
	pub failures: AtomicU64,
}

struct Session {
	running: RunFlag,
	worker: JoinHandle<()>,
}

pub struct FrameSource {
	region: Region,
	interval: Duration,
	capture_wait: Duration,
	grabber: Arc<dyn ScreenGrabber>,
	latest: Arc<Latest>,
	stats: Arc<CaptureStats>,
	session: Mutex<Option<Session>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
	m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FrameSource {
	/// `region: None` captures the whole virtual desktop, queried once here.
	pub fn new(grabber: Arc<dyn ScreenGrabber>, region: Option<Region>) -> Result<Self> {
		let region = match region {
			Some(region) => region,
			None => grabber.virtual_desktop()?,
		};
		Ok(Self {
			region,
			interval: DEFAULT_INTERVAL,
			capture_wait: DEFAULT_CAPTURE_WAIT,
			grabber,
			latest: Arc::new((Mutex::new(None), Condvar::new())),
			stats: Arc::new(CaptureStats::default()),
			session: Mutex::new(None),
		})
	}

	/// Pause between grabs.
	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	/// How long `capture` waits for a first frame.
	pub fn with_capture_wait(mut self, wait: Duration) -> Self {
		self.capture_wait = wait;
		self
	}

	#[inline]
	pub fn region(&self) -> Region {
		self.region
	}

	pub fn stats(&self) -> &CaptureStats {
		&self.stats
	}

	pub fn is_running(&self) -> bool {
		lock(&self.session)
			.as_ref()
			.is_some_and(|s| *lock(&s.running.0))
	}

	pub fn has_frame(&self) -> bool {
		lock(&self.latest.0).is_some()
	}

	/// Spawn the capture worker. Returns `false` if it is already running or
	/// the thread could not be created.
	///
	/// A worker left over from a previous session is joined first (at most one
	/// grab away from exiting), and the previous session's frame is dropped so
	/// readiness starts over.
	pub fn start(&self) -> bool {
		let mut session = lock(&self.session);
		if session.as_ref().is_some_and(|s| *lock(&s.running.0)) {
			return false;
		}
		if let Some(old) = session.take()
			&& old.worker.join().is_err()
		{
			tracing::warn!("previous capture worker panicked");
		}
		lock(&self.latest.0).take();

		let running: RunFlag = Arc::new((Mutex::new(true), Condvar::new()));
		let worker = {
			let running = running.clone();
			let latest = self.latest.clone();
			let stats = self.stats.clone();
			let grabber = self.grabber.clone();
			let region = self.region;
			let interval = self.interval;
			std::thread::Builder::new()
				.name("scout-capture".into())
				.spawn(move || capture_loop(grabber.as_ref(), region, interval, &running, &latest, &stats))
		};

		match worker {
			Ok(handle) => {
				tracing::info!(?self.region, interval_ms = self.interval.as_millis() as u64, "capture loop started");
				*session = Some(Session { running, worker: handle });
				true
			}
			Err(err) => {
				tracing::error!(error = %err, "failed to spawn capture thread");
				false
			}
		}
	}

	/// Ask the worker to exit. Does not wait; the worker leaves within one
	/// interval and the latest frame stays frozen from here on.
	pub fn stop(&self) {
		let session = lock(&self.session);
		let Some(session) = session.as_ref() else {
			return;
		};
		let (flag, cv) = &*session.running;
		// The worker publishes only while holding the slot and seeing the flag
		// set, so clearing it under the slot lock freezes the frame.
		let _slot = lock(&self.latest.0);
		let mut running = lock(flag);
		if !*running {
			return;
		}
		*running = false;
		cv.notify_all();
		tracing::info!("capture loop stopping");
	}

	/// Latest frame, waiting up to the configured capture wait if none exists yet.
	pub fn capture(&self) -> Option<Arc<Frame>> {
		self.capture_within(self.capture_wait)
	}

	pub fn capture_within(&self, wait: Duration) -> Option<Arc<Frame>> {
		let (slot, ready) = &*self.latest;
		let guard = lock(slot);
		if let Some(frame) = guard.as_ref() {
			return Some(frame.clone());
		}
		if wait.is_zero() {
			return None;
		}
		let (guard, _timeout) = ready
			.wait_timeout_while(guard, wait, |f| f.is_none())
			.unwrap_or_else(PoisonError::into_inner);
		guard.clone()
	}

	/// Block until a first frame exists or `timeout` passes.
	pub fn wait_until_ready(&self, timeout: Duration) -> bool {
		self.capture_within(timeout).is_some()
	}
}

impl Drop for FrameSource {
	fn drop(&mut self) {
		self.stop();
	}
}

fn capture_loop(
	grabber: &dyn ScreenGrabber,
	region: Region,
	interval: Duration,
	running: &(Mutex<bool>, Condvar),
	latest: &Latest,
	stats: &CaptureStats,
) {
	let (flag, stop_cv) = running;
	loop {
		if !*lock(flag) {
			break;
		}

		// Grab without holding any lock.
		match grabber.grab(region) {
			Ok(frame) => {
				let (slot, ready) = latest;
				let mut slot = lock(slot);
				if !*lock(flag) {
					// Stopped mid-grab.
					break;
				}
				let first = slot.replace(Arc::new(frame)).is_none();
				drop(slot);
				if first {
					ready.notify_all();
					tracing::debug!("first frame captured");
				}
				stats.frames.fetch_add(1, Ordering::Relaxed);
			}
			Err(err) => {
				stats.failures.fetch_add(1, Ordering::Relaxed);
				tracing::warn!(error = %format!("{err:#}"), "frame grab failed; retrying next interval");
			}
		}

		let guard = lock(flag);
		let (guard, _timeout) = stop_cv
			.wait_timeout_while(guard, interval, |running| *running)
			.unwrap_or_else(PoisonError::into_inner);
		if !*guard {
			break;
		}
	}
	tracing::debug!("capture loop exited");
}
