//! Pixel primitives.
//!
//! `OwnedImage` is a lightweight owned RGB image (no alpha). Screen captures
//! arrive as RGBA and are stripped on the way in, which is also the layout
//! the OCR and template primitives want.
//!
//! For cropping we borrow a view (`Image<'a>`) instead of copying pixels. A
//! bounded template search only pays for the bytes of its search square.

/// Owned RGB image (no alpha).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedImage {
    width: u32,
    height: u32,
    data: Vec<Color>,
}

impl OwnedImage {
    /// Solid image filled with one color.
    pub fn new(width: u32, height: u32, fill: Color) -> Self {
        Self {
            width,
            height,
            data: vec![fill; (width as usize) * (height as usize)],
        }
    }

    /// Build an `OwnedImage` from RGBA bytes (alpha is discarded).
    ///
    /// The buffer is expected to be tightly packed: `width * height * 4` bytes.
    pub fn from_rgba(width: usize, bytes: &[u8]) -> Self {
        Self::from_packed(width, bytes, 4)
    }

    /// Build an `OwnedImage` from tightly packed RGB bytes.
    pub fn from_rgb(width: usize, bytes: &[u8]) -> Self {
        Self::from_packed(width, bytes, 3)
    }

    fn from_packed(width: usize, bytes: &[u8], channels: usize) -> Self {
        if width == 0 {
            return Self::new(0, 0, Color::BLACK);
        }
        let height = bytes.len() / width / channels;
        let data = bytes
            .chunks_exact(channels)
            .take(width * height)
            .map(|v| Color::new(v[0], v[1], v[2]))
            .collect::<Vec<_>>();

        Self {
            width: width as u32,
            height: height as u32,
            data,
        }
    }

    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[(x + y * self.width) as usize])
    }

    /// Fill a rectangle, clipped to the image.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Color) {
        let x2 = x.saturating_add(width).min(self.width);
        let y2 = y.saturating_add(height).min(self.height);
        for yy in y.min(y2)..y2 {
            for xx in x.min(x2)..x2 {
                self.data[(xx + yy * self.width) as usize] = color;
            }
        }
    }

    /// Copy `src` into this image with its top-left corner at `(x, y)`, clipped.
    pub fn paste(&mut self, src: Image, x: u32, y: u32) {
        for sy in 0..src.height() {
            let ty = y + sy;
            if ty >= self.height {
                break;
            }
            for sx in 0..src.width() {
                let tx = x + sx;
                if tx >= self.width {
                    break;
                }
                self.data[(tx + ty * self.width) as usize] = *src.pixel(src.x1 + sx, src.y1 + sy);
            }
        }
    }

    /// Create a borrowed view of this entire image.
    pub fn as_image<'a>(&'a self) -> Image<'a> {
        Image {
            x1: 0,
            y1: 0,
            x2: self.width,
            y2: self.height,
            true_width: self.width,
            data: &self.data,
        }
    }

    /// Convert to a grayscale `GrayImage` (luma).
    pub fn to_gray_image(&self) -> image::GrayImage {
        self.as_image().to_gray_image()
    }

    pub fn to_rgb_image(&self) -> image::RgbImage {
        self.as_image().to_rgb_image()
    }
}

// ----------

/// Borrowed image view into an `OwnedImage`.
#[derive(Clone, Copy)]
pub struct Image<'a> {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
    true_width: u32,
    data: &'a [Color],
}

impl<'a> Image<'a> {
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Offset of this view's top-left corner inside the owning image.
    #[inline]
    pub fn origin(&self) -> (u32, u32) {
        (self.x1, self.y1)
    }

    #[inline(always)]
    fn pixel(&self, x: u32, y: u32) -> &Color {
        &self.data[(x + y * self.true_width) as usize]
    }

    /// Tightly packed RGB bytes of the view.
    pub fn get_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0; (self.width() * self.height() * 3) as usize];
        let mut i = 0;
        for y in self.y1..self.y2 {
            for x in self.x1..self.x2 {
                let clr = self.pixel(x, y);
                bytes[i] = clr.r;
                bytes[i + 1] = clr.g;
                bytes[i + 2] = clr.b;
                i += 3;
            }
        }
        bytes
    }

    pub fn to_rgb_image(&self) -> image::RgbImage {
        // Length always matches width * height * 3.
        image::RgbImage::from_raw(self.width(), self.height(), self.get_bytes())
            .unwrap_or_else(|| image::RgbImage::new(self.width(), self.height()))
    }

    pub fn to_gray_image(&self) -> image::GrayImage {
        use image::{GrayImage, Luma};
        let mut out = GrayImage::new(self.width(), self.height());
        for y in 0..self.height() {
            for x in 0..self.width() {
                let c = self.pixel(self.x1 + x, self.y1 + y);
                out.put_pixel(x, y, Luma([c.luma()]));
            }
        }
        out
    }

    /// Create an arbitrary subimage (relative coordinates), clamped to this view.
    pub fn sub_image(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let x = x.min(self.width());
        let y = y.min(self.height());
        let width = width.min(self.width() - x);
        let height = height.min(self.height() - y);

        Self {
            x1: self.x1 + x,
            y1: self.y1 + y,
            x2: self.x1 + x + width,
            y2: self.y1 + y + height,
            true_width: self.true_width,
            data: self.data,
        }
    }

    /// Square of side `2 * radius` centered on `(cx, cy)`, clamped to the view.
    ///
    /// Returns the view together with its top-left corner relative to `self`,
    /// so local coordinates can be translated back.
    pub fn square_around(&self, cx: i64, cy: i64, radius: u32) -> (Self, (u32, u32)) {
        let r = radius as i64;
        let x1 = (cx - r).clamp(0, self.width() as i64) as u32;
        let y1 = (cy - r).clamp(0, self.height() as i64) as u32;
        let x2 = (cx + r).clamp(0, self.width() as i64) as u32;
        let y2 = (cy + r).clamp(0, self.height() as i64) as u32;
        (
            self.sub_image(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1)),
            (x1, y1),
        )
    }
}

// ----------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline]
    pub const fn gray(v: u8) -> Self {
        Self::new(v, v, v)
    }

    /// Compute luma (grayscale intensity).
    pub fn luma(&self) -> u8 {
        let r = self.r as u32;
        let g = self.g as u32;
        let b = self.b as u32;
        ((299 * r + 587 * g + 114 * b) / 1000) as u8
    }
}
