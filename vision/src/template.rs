//! Icon lookup by template matching.
//!
//! Templates are decoded once per name and shared read-only afterwards.
//! Scores are zero-mean normalized cross-correlation in `[0, 1]`, so a flat
//! patch never matches a textured icon however bright it is.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use image::GrayImage;
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{match_template, MatchTemplateMethod};

use crate::{Error, Image};

/// Best location of a template, center point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub x: i32,
    pub y: i32,
    pub score: f32,
}

/// Where template bitmaps come from.
pub trait TemplateSource: Send + Sync {
    fn load(&self, name: &str) -> Result<GrayImage, Error>;
}

/// Templates stored as image files in one directory.
#[derive(Debug, Clone)]
pub struct TemplateDir {
    dir: PathBuf,
}

impl TemplateDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

impl TemplateSource for TemplateDir {
    fn load(&self, name: &str) -> Result<GrayImage, Error> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(Error::TemplateNotFound(name.to_owned()));
        }
        let img = image::open(&path).map_err(|source| Error::TemplateDecode {
            name: name.to_owned(),
            source,
        })?;
        Ok(img.to_luma8())
    }
}

pub struct TemplateMatcher {
    source: Box<dyn TemplateSource>,
    cache: RwLock<HashMap<String, Arc<GrayImage>>>,
}

impl TemplateMatcher {
    pub fn new(source: impl TemplateSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Cached template, loading it on first use.
    ///
    /// The decode runs without holding the lock; two racing loads of the same
    /// name both decode and the first insert wins.
    pub fn template(&self, name: &str) -> Result<Arc<GrayImage>, Error> {
        if let Some(tpl) = self.cache.read().unwrap_or_else(|e| e.into_inner()).get(name) {
            return Ok(tpl.clone());
        }

        let loaded = Arc::new(self.source.load(name)?);
        tracing::debug!(name, width = loaded.width(), height = loaded.height(), "template loaded");

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Ok(cache.entry(name.to_owned()).or_insert(loaded).clone())
    }

    pub fn cached(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Best match of `name` in `image`, in coordinates local to `image`.
    pub fn try_locate(&self, image: Image, name: &str, threshold: f32) -> Result<Option<TemplateMatch>, Error> {
        let tpl = self.template(name)?;
        if image.is_empty() || tpl.width() == 0 || tpl.height() == 0 {
            return Err(Error::EmptyImage);
        }
        if tpl.width() > image.width() || tpl.height() > image.height() {
            return Err(Error::TemplateTooLarge {
                name: name.to_owned(),
                template_w: tpl.width(),
                template_h: tpl.height(),
                image_w: image.width(),
                image_h: image.height(),
            });
        }

        let haystack = image.to_gray_image();
        let Some((x, y, score)) = best_correlation(&haystack, &tpl) else {
            return Ok(None);
        };
        if score < threshold {
            return Ok(None);
        }
        Ok(Some(TemplateMatch {
            x: (x + tpl.width() / 2) as i32,
            y: (y + tpl.height() / 2) as i32,
            score,
        }))
    }

    /// Like [`try_locate`](Self::try_locate), but any failure reads as no match.
    pub fn locate(&self, image: Image, name: &str, threshold: f32) -> Option<TemplateMatch> {
        self.try_locate(image, name, threshold).unwrap_or_else(|err| {
            tracing::warn!(name, error = %err, "template match failed");
            None
        })
    }

    /// Search only a `2 * radius` square around `center` (coordinates local to `image`).
    ///
    /// The returned point is translated back to `image` coordinates.
    pub fn locate_near(&self, image: Image, name: &str, center: (i32, i32), radius: u32, threshold: f32) -> Option<TemplateMatch> {
        let (roi, (ox, oy)) = image.square_around(center.0 as i64, center.1 as i64, radius);
        if roi.is_empty() {
            tracing::debug!(name, ?center, radius, "search square lies outside the frame");
            return None;
        }
        let found = match self.try_locate(roi, name, threshold) {
            Ok(found) => found,
            Err(Error::TemplateTooLarge { .. }) => {
                tracing::debug!(name, radius, "search square smaller than template");
                None
            }
            Err(err) => {
                tracing::warn!(name, error = %err, "template match failed");
                None
            }
        };
        found.map(|m| TemplateMatch {
            x: m.x + ox as i32,
            y: m.y + oy as i32,
            score: m.score,
        })
    }
}

/// Top-left corner and score of the global maximum of zero-mean NCC.
///
/// `match_template` gives the raw sum of products per offset; window sums
/// from integral images turn that into the correlation coefficient.
fn best_correlation(haystack: &GrayImage, needle: &GrayImage) -> Option<(u32, u32, f32)> {
    let (tw, th) = needle.dimensions();
    let n = (tw as f64) * (th as f64);

    let (t_sum, t_sq) = needle.pixels().fold((0f64, 0f64), |(s, q), p| {
        let v = p.0[0] as f64;
        (s + v, q + v * v)
    });
    let t_var = t_sq - t_sum * t_sum / n;
    if t_var <= f64::EPSILON {
        // Flat template: correlation is undefined.
        return None;
    }

    let cross = match_template(haystack, needle, MatchTemplateMethod::CrossCorrelation);
    let sums = integral_image::<_, u64>(haystack);
    let squares = integral_squared_image::<_, u64>(haystack);

    let window = |table: &image::ImageBuffer<image::Luma<u64>, Vec<u64>>, x: u32, y: u32| -> f64 {
        let at = |x: u32, y: u32| table.get_pixel(x, y).0[0] as f64;
        at(x + tw, y + th) - at(x, y + th) - at(x + tw, y) + at(x, y)
    };

    let mut best: Option<(u32, u32, f32)> = None;
    for (x, y, p) in cross.enumerate_pixels() {
        let i_sum = window(&sums, x, y);
        let i_var = window(&squares, x, y) - i_sum * i_sum / n;
        if i_var <= f64::EPSILON {
            continue;
        }
        let numerator = p.0[0] as f64 - i_sum * t_sum / n;
        let score = (numerator / (t_var * i_var).sqrt()).clamp(0.0, 1.0) as f32;
        if best.is_none_or(|(_, _, b)| score > b) {
            best = Some((x, y, score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, OwnedImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Three dark dots on a light tile.
    fn three_dots() -> OwnedImage {
        let mut icon = OwnedImage::new(16, 16, Color::gray(230));
        for top in [1, 6, 11] {
            icon.fill_rect(6, top, 4, 4, Color::gray(30));
        }
        icon
    }

    /// Lightly textured background with the icon's top-left at `(x, y)`.
    fn scene(x: u32, y: u32) -> OwnedImage {
        let mut img = OwnedImage::new(400, 300, Color::gray(120));
        for yy in (0..300).step_by(10) {
            img.fill_rect(0, yy, 400, 1, Color::gray(110));
        }
        img.paste(three_dots().as_image(), x, y);
        img
    }

    struct Fixed {
        icon: GrayImage,
        loads: Arc<AtomicUsize>,
    }

    impl TemplateSource for Fixed {
        fn load(&self, name: &str) -> Result<GrayImage, Error> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            match name {
                "three_dot_icon.png" => Ok(self.icon.clone()),
                _ => Err(Error::TemplateNotFound(name.to_owned())),
            }
        }
    }

    fn matcher() -> (TemplateMatcher, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let source = Fixed {
            icon: three_dots().to_gray_image(),
            loads: loads.clone(),
        };
        (TemplateMatcher::new(source), loads)
    }

    #[test]
    fn finds_icon_center() {
        let (matcher, _) = matcher();
        let img = scene(200, 120);
        let m = matcher.locate(img.as_image(), "three_dot_icon.png", 0.8).expect("match");
        assert_eq!((m.x, m.y), (208, 128));
        assert!(m.score > 0.99);
    }

    #[test]
    fn loads_each_template_once() {
        let (matcher, loads) = matcher();
        let img = scene(10, 10);
        matcher.locate(img.as_image(), "three_dot_icon.png", 0.8);
        matcher.locate(img.as_image(), "three_dot_icon.png", 0.8);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(matcher.cached(), 1);
    }

    #[test]
    fn missing_template_is_no_match() {
        let (matcher, _) = matcher();
        let img = scene(10, 10);
        assert!(matcher.locate(img.as_image(), "nope.png", 0.8).is_none());
        assert!(matches!(
            matcher.try_locate(img.as_image(), "nope.png", 0.8),
            Err(Error::TemplateNotFound(_))
        ));
    }

    #[test]
    fn absent_icon_is_no_match() {
        let (matcher, _) = matcher();
        let img = scene(10, 10);
        let crop = img.as_image().sub_image(200, 100, 150, 150);
        assert!(matcher.locate(crop, "three_dot_icon.png", 0.8).is_none());
    }

    #[test]
    fn near_search_translates_back() {
        let (matcher, _) = matcher();
        let img = scene(300, 200);
        let m = matcher
            .locate_near(img.as_image(), "three_dot_icon.png", (290, 215), 50, 0.8)
            .expect("match");
        assert_eq!((m.x, m.y), (308, 208));
    }

    #[test]
    fn near_search_misses_distant_icon() {
        let (matcher, _) = matcher();
        let img = scene(300, 200);
        // Square big enough for the template but 100px away from the icon.
        assert!(matcher
            .locate_near(img.as_image(), "three_dot_icon.png", (150, 150), 30, 0.8)
            .is_none());
        // Square smaller than the template.
        assert!(matcher
            .locate_near(img.as_image(), "three_dot_icon.png", (258, 208), 5, 0.8)
            .is_none());
    }

    #[test]
    fn template_dir_reports_missing_file() {
        let dir = TemplateDir::new(std::env::temp_dir().join("vision-no-such-template-dir"));
        assert!(matches!(dir.load("icon.png"), Err(Error::TemplateNotFound(_))));
    }
}
