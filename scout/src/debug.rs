//! Debug artifacts for text lookups.
//!
//! Each `find_text` call with debugging on writes `ocr_debug_<ms>.png` (the
//! frame with the ten best candidates boxed and scored) and a matching `.txt`
//! listing, and logs the same listing. Names already taken get a `_<n>`
//! suffix, so lookups in the same millisecond never overwrite each other.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use vision::fuzzy::Evaluation;
use vision::{Candidate, Frame};

/// How many candidates are drawn and listed.
pub const TOP_N: usize = 10;

const CANDIDATE: Rgb<u8> = Rgb([255, 220, 0]);
const WINNER: Rgb<u8> = Rgb([0, 220, 0]);
const MAX_SUFFIX: usize = 1000;

#[derive(Debug, Clone)]
pub struct DebugSink {
	dir: PathBuf,
}

impl DebugSink {
	/// Create the sink, making `dir` if needed.
	pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
		let dir = dir.into();
		fs::create_dir_all(&dir).with_context(|| format!("create {:?}", dir))?;
		Ok(Self { dir })
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Write artifacts for one lookup. Failures are logged and swallowed;
	/// returns the image path on success.
	pub fn emit(&self, frame: &Frame, query: &str, candidates: &[Candidate], eval: &Evaluation) -> Option<PathBuf> {
		let listing = listing(query, candidates, eval);
		tracing::info!(target: "scout::debug", "{listing}");

		match self.try_emit(frame, &listing, candidates, eval) {
			Ok(path) => {
				tracing::info!(path = %path.display(), "debug image written");
				Some(path)
			}
			Err(err) => {
				tracing::warn!(error = %format!("{err:#}"), "failed to write debug artifacts");
				None
			}
		}
	}

	fn try_emit(&self, frame: &Frame, listing: &str, candidates: &[Candidate], eval: &Evaluation) -> Result<PathBuf> {
		let base = format!("ocr_debug_{}", chrono::Utc::now().timestamp_millis());
		let (file, png) = claim(&self.dir, &base)?;
		let txt = png.with_extension("txt");

		let img = annotate(frame, candidates, eval);
		let mut out = BufWriter::new(file);
		img.write_to(&mut out, ImageFormat::Png)
			.with_context(|| format!("write {:?}", png))?;
		out.flush().with_context(|| format!("write {:?}", png))?;
		fs::write(&txt, listing).with_context(|| format!("write {:?}", txt))?;
		Ok(png)
	}
}

/// Create `<base>.png` in `dir`, or `<base>_<n>.png` if lookups in the same
/// millisecond already took the name.
fn claim(dir: &Path, base: &str) -> Result<(File, PathBuf)> {
	for n in 0..MAX_SUFFIX {
		let name = match n {
			0 => format!("{base}.png"),
			n => format!("{base}_{n}.png"),
		};
		let path = dir.join(name);
		match OpenOptions::new().write(true).create_new(true).open(&path) {
			Ok(file) => return Ok((file, path)),
			Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
			Err(err) => return Err(err).with_context(|| format!("create {:?}", path)),
		}
	}
	bail!("no free debug file name for {base:?} in {:?}", dir)
}

/// Human-readable ranking of the best candidates.
pub fn listing(query: &str, candidates: &[Candidate], eval: &Evaluation) -> String {
	let mut out = format!("query={query:?} threshold={:.2} candidates={}\n", eval.threshold, candidates.len());
	for (rank, (i, score)) in eval.top(TOP_N).into_iter().enumerate() {
		let (l, t, w, h) = candidates[i].bounds();
		let _ = writeln!(
			out,
			"{:02}. score={score:.3} text={:?} box=({l},{t},{w},{h})",
			rank + 1,
			candidates[i].text()
		);
	}
	match &eval.result {
		Some(m) => {
			let _ = writeln!(out, "match: {:?} at ({}, {}) score={:.3}", m.text, m.x, m.y, m.score);
		}
		None => out.push_str("match: none\n"),
	}
	out
}

/// The frame with candidate boxes drawn on it.
pub fn annotate(frame: &Frame, candidates: &[Candidate], eval: &Evaluation) -> RgbImage {
	let mut img = frame.to_rgb().to_rgb_image();
	for (i, score) in eval.top(TOP_N) {
		if eval.best == Some(i) {
			continue;
		}
		let (l, t, w, h) = candidates[i].bounds();
		draw_box(&mut img, l, t, w, h, CANDIDATE);
		draw_label(&mut img, l, t - 9, &format!("{score:.2}"), CANDIDATE);
	}
	// Winner last so it stays on top.
	if let Some(best) = eval.best {
		let (l, t, w, h) = candidates[best].bounds();
		draw_box(&mut img, l, t, w, h, WINNER);
		draw_label(&mut img, l, t - 9, &format!("{:.2}", eval.scores[best]), WINNER);
	}
	img
}

fn draw_box(img: &mut RgbImage, left: i32, top: i32, width: i32, height: i32, color: Rgb<u8>) {
	if width <= 0 || height <= 0 {
		return;
	}
	let rect = Rect::at(left, top).of_size(width as u32, height as u32);
	draw_hollow_rect_mut(img, rect, color);
}

/// 8x8 bitmap text; pixels outside the image are skipped.
fn draw_label(img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
	let (w, h) = (img.width() as i32, img.height() as i32);
	let mut cursor = x;
	for ch in text.chars() {
		let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
			cursor += 8;
			continue;
		};
		for (row, bits) in glyph.iter().enumerate() {
			for col in 0..8 {
				if (bits >> col) & 1 == 0 {
					continue;
				}
				let (px, py) = (cursor + col, y + row as i32);
				if px >= 0 && py >= 0 && px < w && py < h {
					img.put_pixel(px as u32, py as u32, color);
				}
			}
		}
		cursor += 8;
	}
}
