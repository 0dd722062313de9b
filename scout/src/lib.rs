//! Screen observation and target resolution.
//!
//! A background loop keeps the latest desktop frame; [`ScreenMonitorService`]
//! turns text queries and icon names into absolute click points, and drives
//! the mouse and keyboard to act on them.

pub mod assets;
pub mod capture;
pub mod config;
pub mod debug;
pub mod input;
pub mod monitor;
pub mod query;
pub mod source;
pub mod supervisor;

pub use capture::{ScreenGrabber, XcapGrabber};
pub use config::Config;
pub use input::{EnigoDriver, InputDriver, Key};
pub use monitor::{MonitorState, ScreenMonitorService};
pub use query::extract_title;
pub use source::FrameSource;
pub use supervisor::MonitorSupervisor;
