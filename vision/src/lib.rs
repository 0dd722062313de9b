//! Screen understanding primitives: pixel buffers, OCR word boxes, line
//! reconstruction, fuzzy text scoring and template search.

mod error;
pub use error::Error;
mod frame;
pub use frame::*;
mod pixels;
pub use pixels::*;

pub mod fuzzy;
pub mod lines;
pub mod ocr;
pub mod template;

pub use fuzzy::{Candidate, FuzzyMatcher, MatchResult};
pub use lines::LineBox;
pub use ocr::{TextEngine, TextRecognizer, WordBox};
pub use template::{TemplateMatch, TemplateMatcher, TemplateSource};
