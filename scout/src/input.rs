use anyhow::{Context, Result};
use enigo::{Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};

/// Keys the service ever presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
	Control,
	Meta,
	Char(char),
}

impl Key {
	/// Platform paste modifier.
	pub const PASTE_MODIFIER: Key = if cfg!(target_os = "macos") { Key::Meta } else { Key::Control };

	fn to_enigo(self) -> enigo::Key {
		match self {
			Key::Control => enigo::Key::Control,
			Key::Meta => enigo::Key::Meta,
			Key::Char(c) => enigo::Key::Unicode(c),
		}
	}
}

/// Synthetic mouse and keyboard input.
pub trait InputDriver: Send + Sync {
	fn move_to(&self, x: i32, y: i32) -> Result<()>;

	/// Left click at the current pointer position.
	fn click(&self) -> Result<()>;

	/// Press `keys` in order, then release them in reverse.
	fn hotkey(&self, keys: &[Key]) -> Result<()>;
}

/// OS input through `enigo`.
///
/// A fresh connection is opened for every action so the driver can be shared
/// across threads without holding a display handle.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnigoDriver;

impl EnigoDriver {
	fn connect() -> Result<Enigo> {
		Enigo::new(&Settings::default()).context("failed to open input connection")
	}
}

impl InputDriver for EnigoDriver {
	fn move_to(&self, x: i32, y: i32) -> Result<()> {
		Self::connect()?
			.move_mouse(x, y, Coordinate::Abs)
			.with_context(|| format!("failed to move pointer to ({x}, {y})"))
	}

	fn click(&self) -> Result<()> {
		Self::connect()?
			.button(Button::Left, Direction::Click)
			.context("failed to click")
	}

	fn hotkey(&self, keys: &[Key]) -> Result<()> {
		let mut enigo = Self::connect()?;
		let mut pressed = Vec::with_capacity(keys.len());
		let mut outcome = Ok(());
		for key in keys {
			if let Err(err) = enigo.key(key.to_enigo(), Direction::Press) {
				outcome = Err(err).with_context(|| format!("failed to press {key:?}"));
				break;
			}
			pressed.push(*key);
		}
		// Always release what went down, even after a failure.
		for key in pressed.iter().rev() {
			if let Err(err) = enigo.key(key.to_enigo(), Direction::Release) {
				tracing::warn!(?key, error = %err, "failed to release key");
			}
		}
		outcome
	}
}

/// Keys for the platform paste shortcut.
pub fn paste_chord() -> [Key; 2] {
	[Key::PASTE_MODIFIER, Key::Char('v')]
}
