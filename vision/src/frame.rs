use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{Error, OwnedImage};

/// Pixel rectangle on the virtual desktop.
///
/// The origin is the multi-monitor virtual-desktop origin, so `left`/`top`
/// can be negative when a monitor sits left of or above the primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
	pub left: i32,
	pub top: i32,
	pub width: u32,
	pub height: u32,
}

impl Region {
	pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
		Self { left, top, width, height }
	}

	#[inline]
	pub fn right(&self) -> i32 {
		self.left + self.width as i32
	}

	#[inline]
	pub fn bottom(&self) -> i32 {
		self.top + self.height as i32
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.width == 0 || self.height == 0
	}

	/// Translate a point local to this region into absolute screen coordinates.
	#[inline]
	pub fn to_absolute(&self, x: i32, y: i32) -> (i32, i32) {
		(x + self.left, y + self.top)
	}

	/// Translate an absolute screen point into coordinates local to this region.
	#[inline]
	pub fn to_local(&self, x: i32, y: i32) -> (i32, i32) {
		(x - self.left, y - self.top)
	}

	pub fn intersect(&self, other: &Region) -> Option<Region> {
		let left = self.left.max(other.left);
		let top = self.top.max(other.top);
		let right = self.right().min(other.right());
		let bottom = self.bottom().min(other.bottom());
		if right <= left || bottom <= top {
			return None;
		}
		Some(Region::new(left, top, (right - left) as u32, (bottom - top) as u32))
	}

	/// Smallest region covering all of `regions`.
	pub fn bounding(regions: impl IntoIterator<Item = Region>) -> Option<Region> {
		regions.into_iter().fold(None, |acc, r| {
			Some(match acc {
				None => r,
				Some(a) => {
					let left = a.left.min(r.left);
					let top = a.top.min(r.top);
					let right = a.right().max(r.right());
					let bottom = a.bottom().max(r.bottom());
					Region::new(left, top, (right - left) as u32, (bottom - top) as u32)
				}
			})
		})
	}
}

impl std::str::FromStr for Region {
	type Err = Error;

	/// Parses `LEFT,TOP,WIDTH,HEIGHT`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let parts = s.split(',').map(str::trim).collect::<Vec<_>>();
		let [left, top, width, height] = parts.as_slice() else {
			return Err(Error::InvalidRegion(s.to_owned()));
		};
		let bad = |_| Error::InvalidRegion(s.to_owned());
		Ok(Region::new(
			left.parse().map_err(bad)?,
			top.parse().map_err(bad)?,
			width.parse().map_err(bad)?,
			height.parse().map_err(bad)?,
		))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
	Rgb,
	Rgba,
}

impl PixelLayout {
	#[inline]
	pub fn channels(self) -> usize {
		match self {
			PixelLayout::Rgb => 3,
			PixelLayout::Rgba => 4,
		}
	}
}

/// One captured screen image and the region it was taken from.
///
/// Frames are immutable once built; the capture loop shares them behind an
/// `Arc` so readers always see a complete buffer.
#[derive(Debug, Clone)]
pub struct Frame {
	region: Region,
	layout: PixelLayout,
	width: u32,
	height: u32,
	bytes: Vec<u8>,
	captured_at: Instant,
}

impl Frame {
	pub fn from_raw(region: Region, layout: PixelLayout, width: u32, height: u32, bytes: Vec<u8>) -> Result<Self, Error> {
		let expected = width as usize * height as usize * layout.channels();
		if bytes.len() != expected {
			return Err(Error::BufferSize { expected, actual: bytes.len() });
		}
		Ok(Self {
			region,
			layout,
			width,
			height,
			bytes,
			captured_at: Instant::now(),
		})
	}

	pub fn from_rgba(region: Region, width: u32, height: u32, bytes: Vec<u8>) -> Result<Self, Error> {
		Self::from_raw(region, PixelLayout::Rgba, width, height, bytes)
	}

	/// Wrap an already decoded RGB image.
	pub fn from_image(region: Region, image: &OwnedImage) -> Self {
		Self {
			region,
			layout: PixelLayout::Rgb,
			width: image.width(),
			height: image.height(),
			bytes: image.as_image().get_bytes(),
			captured_at: Instant::now(),
		}
	}

	#[inline]
	pub fn region(&self) -> Region {
		self.region
	}

	#[inline]
	pub fn layout(&self) -> PixelLayout {
		self.layout
	}

	#[inline]
	pub fn width(&self) -> u32 {
		self.width
	}

	#[inline]
	pub fn height(&self) -> u32 {
		self.height
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.width == 0 || self.height == 0
	}

	#[inline]
	pub fn captured_at(&self) -> Instant {
		self.captured_at
	}

	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// RGB copy of the frame, alpha stripped if present.
	pub fn to_rgb(&self) -> OwnedImage {
		match self.layout {
			PixelLayout::Rgb => OwnedImage::from_rgb(self.width as usize, &self.bytes),
			PixelLayout::Rgba => OwnedImage::from_rgba(self.width as usize, &self.bytes),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Color;

	#[test]
	fn absolute_offset() {
		let region = Region::new(100, 50, 800, 600);
		assert_eq!(region.to_absolute(30, 40), (130, 90));
		assert_eq!(region.to_local(130, 90), (30, 40));
	}

	#[test]
	fn bounding_covers_negative_monitors() {
		let left = Region::new(-1280, 0, 1280, 1024);
		let primary = Region::new(0, 0, 1920, 1080);
		assert_eq!(Region::bounding([left, primary]), Some(Region::new(-1280, 0, 3200, 1080)));
		assert_eq!(Region::bounding([]), None);
	}

	#[test]
	fn intersection() {
		let a = Region::new(0, 0, 100, 100);
		assert_eq!(a.intersect(&Region::new(50, 60, 100, 100)), Some(Region::new(50, 60, 50, 40)));
		assert_eq!(a.intersect(&Region::new(100, 0, 10, 10)), None);
	}

	#[test]
	fn parse_region() {
		assert_eq!("10, -20,300,400".parse::<Region>().ok(), Some(Region::new(10, -20, 300, 400)));
		assert!("10,20,300".parse::<Region>().is_err());
		assert!("a,b,c,d".parse::<Region>().is_err());
	}

	#[test]
	fn rgba_frame_strips_alpha() {
		let region = Region::new(0, 0, 2, 1);
		let frame = Frame::from_rgba(region, 2, 1, vec![1, 2, 3, 255, 4, 5, 6, 128]).expect("frame");
		let rgb = frame.to_rgb();
		assert_eq!(rgb.pixel(0, 0), Some(Color::new(1, 2, 3)));
		assert_eq!(rgb.pixel(1, 0), Some(Color::new(4, 5, 6)));
	}

	#[test]
	fn rejects_short_buffer() {
		let err = Frame::from_rgba(Region::new(0, 0, 2, 2), 2, 2, vec![0; 15]).unwrap_err();
		assert!(matches!(err, Error::BufferSize { expected: 16, actual: 15 }));
	}
}
