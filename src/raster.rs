use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, RgbaImage};

use crate::bitmap::Bitmap;
use crate::config::RasterParams;
use crate::error::{RecognizeError, Result};

// ── Drawing surface ───────────────────────────────────────────────────────────

/// Caller's drawing, copied into an owned white-background RGB buffer.
///
/// Transparent pixels are composited over white so an untouched RGBA canvas
/// reads as empty.
#[derive(Debug, Clone)]
pub struct DrawingSurface {
    rgb: RgbImage,
}

impl DrawingSurface {
    pub fn from_image(img: &DynamicImage) -> Result<Self> {
        Self::from_rgba_image(&img.to_rgba8())
    }

    /// Interleaved RGBA bytes, as handed over by a canvas.
    pub fn from_rgba(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        let img = RgbaImage::from_raw(width, height, bytes.to_vec()).ok_or_else(|| {
            RecognizeError::InvalidInput(format!(
                "RGBA buffer of {} bytes does not match {width}×{height}",
                bytes.len()
            ))
        })?;
        Self::from_rgba_image(&img)
    }

    /// Single-channel bytes with 0 = black ink, 255 = white paper.
    pub fn from_luma(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        let img = GrayImage::from_raw(width, height, bytes.to_vec()).ok_or_else(|| {
            RecognizeError::InvalidInput(format!(
                "grayscale buffer of {} bytes does not match {width}×{height}",
                bytes.len()
            ))
        })?;
        Self::from_rgba_image(&DynamicImage::ImageLuma8(img).to_rgba8())
    }

    fn from_rgba_image(img: &RgbaImage) -> Result<Self> {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(RecognizeError::InvalidInput(format!("empty surface {w}×{h}")));
        }
        let rgb = RgbImage::from_fn(w, h, |x, y| {
            let [r, g, b, a] = img.get_pixel(x, y).0;
            let alpha = a as u32;
            let over_white = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
            Rgb([over_white(r), over_white(g), over_white(b)])
        });
        Ok(Self { rgb })
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height() as f64
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        self.rgb.clone()
    }

    /// Inverted luma at native resolution: ink high, paper 0.
    pub fn ink_image(&self) -> GrayImage {
        invert_luma(&self.rgb)
    }

    fn resized(&self, w: u32, h: u32, filter: FilterType) -> RgbImage {
        if self.rgb.dimensions() == (w, h) {
            return self.rgb.clone();
        }
        imageops::resize(&self.rgb, w, h, filter)
    }
}

/// Perceptual luma, inverted so dark ink scores high.
#[inline]
pub fn ink_intensity(px: &Rgb<u8>) -> u8 {
    let [r, g, b] = px.0;
    let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    (255.0 - luma).round().clamp(0.0, 255.0) as u8
}

fn invert_luma(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([ink_intensity(img.get_pixel(x, y))])
    })
}

fn gray_to_bitmap(img: &GrayImage) -> Bitmap {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut out = Bitmap::new(w, h);
    for (x, y, p) in img.enumerate_pixels() {
        out.set(x as usize, y as usize, p[0]);
    }
    out
}

// ── Rasterizer ────────────────────────────────────────────────────────────────

/// Outcome of normalizing a drawing for the chamfer path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rasterized {
    /// Binary, bounding-box fitted bitmap with enough ink to compare.
    Ink(Bitmap),
    /// Too little ink to say anything.
    Insufficient { ink_pixels: usize },
}

/// Turns drawing surfaces into canonical bitmaps.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    params: RasterParams,
    min_ink_pixels: usize,
}

impl Rasterizer {
    pub fn new(params: RasterParams, min_ink_pixels: usize) -> Self {
        Self {
            params,
            min_ink_pixels,
        }
    }

    pub fn params(&self) -> &RasterParams {
        &self.params
    }

    /// Scale the surface onto the square working canvas as inverted grayscale.
    pub fn grayscale(&self, surface: &DrawingSurface) -> Bitmap {
        let size = self.params.canvas_size;
        let scaled = surface.resized(size, size, FilterType::Triangle);
        gray_to_bitmap(&invert_luma(&scaled))
    }

    /// 0/1 bitmap: strictly above the ink threshold is ink.
    pub fn binarize(&self, gray: &Bitmap) -> Bitmap {
        let t = self.params.ink_threshold;
        Bitmap::from_fn(gray.width(), gray.height(), |x, y| gray.get(x, y) > t)
    }

    /// Stretch the ink bounding box over the padded inner area.
    ///
    /// Nearest-neighbour sampled. A box thinner than `min_bbox_extent` in
    /// either direction is returned untouched.
    pub fn fit_to_box(&self, binary: &Bitmap) -> Bitmap {
        let Some((min_x, min_y, max_x, max_y)) = binary.ink_bounds() else {
            return binary.clone();
        };
        let bw = max_x - min_x + 1;
        let bh = max_y - min_y + 1;
        let min_extent = self.params.min_bbox_extent as usize;
        if bw < min_extent || bh < min_extent {
            return binary.clone();
        }

        let pad = self.params.padding as usize;
        let (w, h) = (binary.width(), binary.height());
        let inner_w = w.saturating_sub(2 * pad);
        let inner_h = h.saturating_sub(2 * pad);
        let mut out = Bitmap::new(w, h);
        for ty in 0..inner_h {
            let sy = min_y + ty * bh / inner_h;
            for tx in 0..inner_w {
                let sx = min_x + tx * bw / inner_w;
                if binary.is_ink(sx, sy) {
                    out.set(pad + tx, pad + ty, 1);
                }
            }
        }
        out
    }

    /// Full pipeline for chamfer matching: scale, binarize, fit.
    ///
    /// A drawing whose ink box is too thin to fit counts as insufficient,
    /// whatever its pixel count.
    pub fn normalize(&self, surface: &DrawingSurface) -> Rasterized {
        let binary = self.binarize(&self.grayscale(surface));
        if self.is_degenerate(&binary) {
            return Rasterized::Insufficient {
                ink_pixels: binary.ink_count(),
            };
        }
        self.check_mass(self.fit_to_box(&binary))
    }

    /// Ink check at the surface's own resolution.
    ///
    /// Decides whether anything was drawn at all. The fitted canvas is no
    /// use for that: on a wide surface thin strokes blur below the ink
    /// threshold when squeezed onto it.
    pub fn native_ink(&self, surface: &DrawingSurface) -> Rasterized {
        let binary = self.binarize(&gray_to_bitmap(&surface.ink_image()));
        if self.is_degenerate(&binary) {
            return Rasterized::Insufficient {
                ink_pixels: binary.ink_count(),
            };
        }
        self.check_mass(binary)
    }

    fn is_degenerate(&self, binary: &Bitmap) -> bool {
        let min_extent = self.params.min_bbox_extent as usize;
        match binary.ink_bounds() {
            Some((x0, y0, x1, y1)) => x1 - x0 + 1 < min_extent || y1 - y0 + 1 < min_extent,
            None => false,
        }
    }

    fn check_mass(&self, binary: Bitmap) -> Rasterized {
        let ink_pixels = binary.ink_count();
        if ink_pixels < self.min_ink_pixels {
            Rasterized::Insufficient { ink_pixels }
        } else {
            Rasterized::Ink(binary)
        }
    }

    /// Classifier input: centred square crop, resized and binarized.
    ///
    /// Wide conjuncts routed here by the column-group rule lose whatever
    /// lies outside the central `min(w, h)` square. No letterboxing.
    pub fn glyph_input(&self, surface: &DrawingSurface) -> Bitmap {
        let (w, h) = (surface.width(), surface.height());
        let side = w.min(h);
        let (x, y) = ((w - side) / 2, (h - side) / 2);
        let crop = imageops::crop_imm(&surface.rgb, x, y, side, side).to_image();
        let n = self.params.glyph_input_size;
        let scaled = if side == n {
            crop
        } else {
            imageops::resize(&crop, n, n, FilterType::Triangle)
        };
        self.binarize(&gray_to_bitmap(&invert_luma(&scaled)))
    }

    /// Sequence model input: whole surface stretched to the model's
    /// width × height, `1 − luma/255` per pixel, row-major.
    pub fn sequence_input(&self, surface: &DrawingSurface) -> Vec<f32> {
        let (w, h) = (self.params.sequence_width, self.params.sequence_height);
        let scaled = surface.resized(w, h, FilterType::Lanczos3);
        scaled.pixels().map(|p| ink_intensity(p) as f32 / 255.0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn rasterizer() -> Rasterizer {
        Rasterizer::new(RasterParams::default(), 8)
    }

    fn white(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    fn surface(img: RgbImage) -> DrawingSurface {
        DrawingSurface::from_image(&DynamicImage::ImageRgb8(img)).unwrap()
    }

    fn bar(img: &mut RgbImage, x: i32, y: i32, w: u32, h: u32) {
        draw_filled_rect_mut(img, Rect::at(x, y).of_size(w, h), Rgb([0, 0, 0]));
    }

    #[test]
    fn luma_weights_and_inversion() {
        assert_eq!(ink_intensity(&Rgb([255, 255, 255])), 0);
        assert_eq!(ink_intensity(&Rgb([0, 0, 0])), 255);
        // Pure red has luma 0.299·255 ≈ 76.
        assert_eq!(ink_intensity(&Rgb([255, 0, 0])), 179);
    }

    #[test]
    fn transparent_rgba_is_empty() {
        let bytes = vec![0u8; 10 * 10 * 4];
        let surface = DrawingSurface::from_rgba(10, 10, &bytes).unwrap();
        assert_eq!(surface.ink_image().pixels().filter(|p| p[0] > 0).count(), 0);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        assert!(DrawingSurface::from_rgba(10, 10, &[0u8; 12]).is_err());
        assert!(DrawingSurface::from_luma(0, 10, &[]).is_err());
    }

    #[test]
    fn blank_drawing_is_insufficient() {
        let blank = surface(white(200, 200));
        assert_eq!(
            rasterizer().normalize(&blank),
            Rasterized::Insufficient { ink_pixels: 0 }
        );
    }

    #[test]
    fn fit_fills_inner_area() {
        let mut img = white(200, 200);
        bar(&mut img, 80, 90, 30, 20);
        let Rasterized::Ink(bmp) = rasterizer().normalize(&surface(img)) else {
            panic!("expected ink");
        };
        assert_eq!(bmp.ink_bounds(), Some((4, 4, 59, 59)));
    }

    #[test]
    fn degenerate_box_is_left_alone() {
        let r = rasterizer();
        let line = Bitmap::from_fn(64, 64, |x, y| y == 10 && (20..40).contains(&x));
        assert_eq!(r.fit_to_box(&line), line);
    }

    #[test]
    fn hairline_drawing_is_insufficient() {
        let mut img = white(64, 64);
        bar(&mut img, 10, 30, 40, 1);
        assert_eq!(
            rasterizer().normalize(&surface(img)),
            Rasterized::Insufficient { ink_pixels: 40 }
        );
    }

    #[test]
    fn native_ink_counts_thin_strokes_on_wide_surfaces() {
        let mut img = white(1200, 100);
        for i in 0..25 {
            bar(&mut img, 20 + 46 * i, 20, 2, 60);
        }
        let Rasterized::Ink(native) = rasterizer().native_ink(&surface(img)) else {
            panic!("expected ink at native resolution");
        };
        assert_eq!(native.ink_count(), 25 * 2 * 60);
        assert_eq!((native.width(), native.height()), (1200, 100));
    }

    #[test]
    fn native_ink_rejects_blank_and_hairline() {
        let r = rasterizer();
        let blank = surface(white(300, 80));
        assert_eq!(
            r.native_ink(&blank),
            Rasterized::Insufficient { ink_pixels: 0 }
        );

        let mut img = white(300, 80);
        bar(&mut img, 10, 40, 200, 1);
        assert_eq!(
            r.native_ink(&surface(img)),
            Rasterized::Insufficient { ink_pixels: 200 }
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let r = rasterizer();
        let l_shape = Bitmap::from_fn(64, 64, |x, y| {
            ((10..=15).contains(&x) && (10..=40).contains(&y))
                || ((10..=40).contains(&x) && (35..=40).contains(&y))
        });
        let once = r.fit_to_box(&l_shape);
        let twice = r.fit_to_box(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn glyph_input_uses_centred_square() {
        let mut img = white(300, 100);
        bar(&mut img, 140, 40, 20, 20);
        // Ink outside the centred 100×100 square is cropped away.
        bar(&mut img, 5, 5, 20, 20);
        let input = rasterizer().glyph_input(&surface(img));
        assert_eq!((input.width(), input.height()), (32, 32));
        let (x0, y0, x1, y1) = input.ink_bounds().unwrap();
        assert!(x0 >= 10 && x1 <= 21 && y0 >= 10 && y1 <= 21);
    }

    #[test]
    fn sequence_input_has_model_shape() {
        let input = rasterizer().sequence_input(&surface(white(400, 120)));
        assert_eq!(input.len(), 128 * 32);
        assert!(input.iter().all(|&v| v < 0.01));
    }
}
