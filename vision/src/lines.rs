//! Merge word boxes into text lines.
//!
//! OCR emits one box per word, but UI titles span several words. Words whose
//! vertical centers are close are folded into a [`LineBox`]; the original
//! words are kept on the line so a click can target just the matching span.

use crate::ocr::WordBox;

/// Vertical-center tolerance floor, in pixels.
pub const LINE_TOLERANCE_MIN: f32 = 10.0;
/// Vertical-center tolerance as a fraction of the taller box.
pub const LINE_TOLERANCE_RATIO: f32 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct LineBox {
	pub text: String,
	pub left: i32,
	pub top: i32,
	pub width: i32,
	pub height: i32,
	/// Ordered by ascending `left`.
	pub words: Vec<WordBox>,
}

impl LineBox {
	fn from_word(word: &WordBox) -> Self {
		Self {
			text: word.text.clone(),
			left: word.left,
			top: word.top,
			width: word.width,
			height: word.height,
			words: vec![word.clone()],
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

	/// Whether `word` sits on this line.
	pub fn accepts(&self, word: &WordBox) -> bool {
		let ln_mid = self.top as f32 + self.height as f32 / 2.0;
		let b_mid = word.top as f32 + word.height as f32 / 2.0;
		let tolerance = LINE_TOLERANCE_MIN.max(LINE_TOLERANCE_RATIO * self.height.max(word.height) as f32);
		(ln_mid - b_mid).abs() <= tolerance
	}

	fn push(&mut self, word: &WordBox) {
		let at = self.words.partition_point(|w| w.left <= word.left);
		self.words.insert(at, word.clone());

		let right = self.right().max(word.right());
		let bottom = self.bottom().max(word.bottom());
		self.left = self.left.min(word.left);
		self.top = self.top.min(word.top);
		self.width = right - self.left;
		self.height = bottom - self.top;

		self.text = self.words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
	}
}

/// Group `words` into lines.
///
/// Words are visited top to bottom; each joins the first existing line that
/// accepts it, otherwise it opens a new one. Every word lands in exactly one
/// line.
pub fn reconstruct(words: &[WordBox]) -> Vec<LineBox> {
	let mut order = words.iter().collect::<Vec<_>>();
	order.sort_by_key(|w| w.top);

	let mut lines: Vec<LineBox> = Vec::new();
	for word in order {
		match lines.iter_mut().find(|ln| ln.accepts(word)) {
			Some(line) => line.push(word),
			None => lines.push(LineBox::from_word(word)),
		}
	}
	lines
}
