use xcap::image::{imageops, imageops::FilterType, RgbaImage};

use anyhow::{bail, Context, Result};
use vision::{Frame, Region};

/// Something that can photograph a region of the virtual desktop.
pub trait ScreenGrabber: Send + Sync {
	/// Bounding rectangle of every attached monitor.
	fn virtual_desktop(&self) -> Result<Region>;

	fn grab(&self, region: Region) -> Result<Frame>;
}

/// Grabs monitors through `xcap`.
///
/// Regions spanning several monitors are stitched together; areas not covered
/// by any monitor stay transparent black.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapGrabber;

fn monitor_region(monitor: &xcap::Monitor) -> Result<Region> {
	Ok(Region::new(
		monitor.x().context("monitor x")?,
		monitor.y().context("monitor y")?,
		monitor.width().context("monitor width")?,
		monitor.height().context("monitor height")?,
	))
}

impl ScreenGrabber for XcapGrabber {
	fn virtual_desktop(&self) -> Result<Region> {
		let monitors = xcap::Monitor::all().context("failed to enumerate monitors")?;
		let regions = monitors
			.iter()
			.map(monitor_region)
			.collect::<Result<Vec<_>>>()?;
		Region::bounding(regions).context("no monitor found")
	}

	fn grab(&self, region: Region) -> Result<Frame> {
		if region.is_empty() {
			bail!("capture region {region:?} is empty");
		}
		let monitors = xcap::Monitor::all().context("failed to enumerate monitors")?;

		let mut canvas = RgbaImage::new(region.width, region.height);
		let mut covered = false;
		for monitor in &monitors {
			let bounds = monitor_region(monitor)?;
			if bounds.intersect(&region).is_none() {
				continue;
			}

			let shot = monitor.capture_image().context("failed to capture monitor")?;
			covered |= blit_monitor(&mut canvas, region, bounds, &shot);
		}

		if !covered {
			bail!("capture region {region:?} does not intersect any monitor");
		}
		Ok(Frame::from_rgba(region, region.width, region.height, canvas.into_raw())?)
	}
}

/// Copy the part of `shot` that falls inside `region` onto `canvas`.
///
/// `bounds` is the monitor in desktop coordinates. `shot` may be larger than
/// `bounds` on HiDPI displays; the ratio between the two maps the overlap to
/// shot pixels and the crop is resampled back to desktop units.
fn blit_monitor(canvas: &mut RgbaImage, region: Region, bounds: Region, shot: &RgbaImage) -> bool {
	if bounds.is_empty() || shot.width() == 0 || shot.height() == 0 {
		return false;
	}
	let Some(overlap) = bounds.intersect(&region) else {
		return false;
	};

	let sx = f64::from(shot.width()) / f64::from(bounds.width);
	let sy = f64::from(shot.height()) / f64::from(bounds.height);
	let px = ((f64::from(overlap.left - bounds.left) * sx).round() as u32).min(shot.width() - 1);
	let py = ((f64::from(overlap.top - bounds.top) * sy).round() as u32).min(shot.height() - 1);
	let pw = ((f64::from(overlap.width) * sx).round() as u32).clamp(1, shot.width() - px);
	let ph = ((f64::from(overlap.height) * sy).round() as u32).clamp(1, shot.height() - py);

	let mut part = imageops::crop_imm(shot, px, py, pw, ph).to_image();
	if part.dimensions() != (overlap.width, overlap.height) {
		part = imageops::resize(&part, overlap.width, overlap.height, FilterType::Triangle);
	}
	imageops::replace(
		canvas,
		&part,
		i64::from(overlap.left - region.left),
		i64::from(overlap.top - region.top),
	);
	true
}

#[cfg(test)]
mod tests {
	use super::*;
	use xcap::image::Rgba;

	const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
	const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

	/// Left half red, right half blue.
	fn split(width: u32, height: u32) -> RgbaImage {
		RgbaImage::from_fn(width, height, |x, _| if x < width / 2 { RED } else { BLUE })
	}

	fn close(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
		a.0.iter().zip(b.0).all(|(&x, y)| x.abs_diff(y) <= 1)
	}

	#[test]
	fn same_scale_copies_pixels() {
		let bounds = Region::new(0, 0, 4, 2);
		let region = Region::new(2, 0, 2, 2);
		let mut canvas = RgbaImage::new(2, 2);
		assert!(blit_monitor(&mut canvas, region, bounds, &split(4, 2)));
		assert!(canvas.pixels().all(|p| *p == BLUE));
	}

	#[test]
	fn hidpi_shot_is_mapped_by_scale() {
		// Monitor reports 4x2 logical pixels, screenshot is 8x4 physical.
		let bounds = Region::new(0, 0, 4, 2);
		let region = Region::new(2, 0, 2, 2);
		let mut canvas = RgbaImage::new(2, 2);
		assert!(blit_monitor(&mut canvas, region, bounds, &split(8, 4)));
		assert!(canvas.pixels().all(|p| close(p, &BLUE)), "{canvas:?}");

		let mut left = RgbaImage::new(2, 2);
		assert!(blit_monitor(&mut left, Region::new(0, 0, 2, 2), bounds, &split(8, 4)));
		assert!(left.pixels().all(|p| close(p, &RED)), "{left:?}");
	}

	#[test]
	fn offset_monitor_lands_at_region_offset() {
		let bounds = Region::new(-4, 0, 4, 2);
		let region = Region::new(-2, 0, 4, 2);
		let mut canvas = RgbaImage::new(4, 2);
		assert!(blit_monitor(&mut canvas, region, bounds, &split(8, 4)));
		for (x, _, p) in canvas.enumerate_pixels() {
			if x < 2 {
				assert!(close(p, &BLUE), "x={x} {p:?}");
			} else {
				assert_eq!(p.0[3], 0, "uncovered area stays transparent");
			}
		}
	}

	#[test]
	fn disjoint_monitor_is_skipped() {
		let mut canvas = RgbaImage::new(2, 2);
		assert!(!blit_monitor(&mut canvas, Region::new(10, 10, 2, 2), Region::new(0, 0, 4, 2), &split(4, 2)));
	}
}
