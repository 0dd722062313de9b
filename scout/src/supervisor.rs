//! Lifecycle handle for one monitor at a time.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use vision::Region;

use crate::config::Config;
use crate::monitor::ScreenMonitorService;

type Factory = Box<dyn Fn(Option<Region>) -> Result<ScreenMonitorService> + Send + Sync>;

/// Starts, stops and hands out the live [`ScreenMonitorService`].
pub struct MonitorSupervisor {
	factory: Factory,
	current: Mutex<Option<Arc<ScreenMonitorService>>>,
}

impl MonitorSupervisor {
	/// `factory` builds a service for the requested region (`None` = whole desktop).
	pub fn new<F>(factory: F) -> Self
	where
		F: Fn(Option<Region>) -> Result<ScreenMonitorService> + Send + Sync + 'static,
	{
		Self {
			factory: Box::new(factory),
			current: Mutex::new(None),
		}
	}

	/// Supervisor building real desktop services from `cfg`.
	pub fn from_config(cfg: Config) -> Self {
		Self::new(move |region| {
			let mut cfg = cfg.clone();
			if region.is_some() {
				cfg.region = region;
			}
			ScreenMonitorService::from_config(&cfg)
		})
	}

	/// Build and start a monitor, then wait briefly for its first frame.
	///
	/// Returns `false` if one is already running or it could not be started.
	pub fn start(&self, region: Option<Region>) -> bool {
		let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
		if current.as_ref().is_some_and(|m| m.is_running()) {
			tracing::debug!("monitor already running");
			return false;
		}

		let service = match (self.factory)(region) {
			Ok(service) => service,
			Err(err) => {
				tracing::error!(error = %format!("{err:#}"), "failed to create screen monitor");
				return false;
			}
		};
		if !service.start() {
			return false;
		}
		if !service.wait_until_ready(service.ready_timeout()) {
			tracing::warn!(timeout_ms = service.ready_timeout().as_millis() as u64, "monitor started without a first frame");
		}

		*current = Some(Arc::new(service));
		true
	}

	/// Returns `false` if nothing was running.
	pub fn stop(&self) -> bool {
		match self.current.lock().unwrap_or_else(PoisonError::into_inner).take() {
			Some(service) => {
				service.stop();
				true
			}
			None => false,
		}
	}

	pub fn get(&self) -> Option<Arc<ScreenMonitorService>> {
		self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
	}
}
