/// Failures inside the recognition pipeline.
///
/// None of these escape the monitor service; they are logged at the
/// primitive boundary and turned into "no result".
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("no frame has been captured yet")]
	NoFrameAvailable,

	#[error("text recognition failed: {0}")]
	RecognitionFailed(String),

	#[error("template {0:?} not found")]
	TemplateNotFound(String),

	#[error("failed to decode template {name:?}")]
	TemplateDecode {
		name: String,
		#[source]
		source: image::ImageError,
	},

	#[error("template {name:?} ({template_w}x{template_h}) does not fit in a {image_w}x{image_h} search area")]
	TemplateTooLarge {
		name: String,
		template_w: u32,
		template_h: u32,
		image_w: u32,
		image_h: u32,
	},

	#[error("image is empty")]
	EmptyImage,

	#[error("pixel buffer has {actual} bytes, expected {expected}")]
	BufferSize { expected: usize, actual: usize },

	#[error("invalid region {0:?}, expected LEFT,TOP,WIDTH,HEIGHT")]
	InvalidRegion(String),
}
