//! Shared drawings and mock model plumbing for the scenario tests.
#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::sync::atomic::{AtomicUsize, Ordering};

use glyphscribe_lib::model::{ModelArtifacts, ModelBackend, ModelKind, ModelSource, Tensor};
use glyphscribe_lib::{DrawingSurface, GlyphRenderer};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

pub fn blank(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, WHITE)
}

pub fn surface(img: RgbImage) -> DrawingSurface {
    DrawingSurface::from_image(&DynamicImage::ImageRgb8(img)).unwrap()
}

fn bar(img: &mut RgbImage, x: i32, y: i32, w: u32, h: u32) {
    draw_filled_rect_mut(img, Rect::at(x, y).of_size(w, h), BLACK);
}

/// Three clearly different test shapes: क a plus, ख an L, ग and ड a frame.
pub fn paint(symbol: &str, size: u32) -> Option<RgbImage> {
    let mut img = blank(size, size);
    let s = size as i32;
    let t = (size / 8).max(2);
    let m = s / 8;
    let span = (s - 2 * m) as u32;
    match symbol {
        "क" => {
            bar(&mut img, s / 2 - t as i32 / 2, m, t, span);
            bar(&mut img, m, s / 2 - t as i32 / 2, span, t);
        }
        "ख" => {
            bar(&mut img, m, m, t, span);
            bar(&mut img, m, s - m - t as i32, span, t);
        }
        "ग" | "ड" => {
            bar(&mut img, m, m, span, t);
            bar(&mut img, m, s - m - t as i32, span, t);
            bar(&mut img, m, m, t, span);
            bar(&mut img, s - m - t as i32, m, t, span);
        }
        _ => return None,
    }
    Some(img)
}

pub fn drawing(symbol: &str, size: u32) -> DrawingSurface {
    surface(paint(symbol, size).unwrap())
}

/// A wide strip of `strokes` separate vertical marks.
pub fn word_strip(strokes: u32) -> DrawingSurface {
    let mut img = blank(10 * strokes + 6, 64);
    for i in 0..strokes {
        bar(&mut img, 3 + 10 * i as i32, 12, 3, 40);
    }
    surface(img)
}

/// 1200×100 strip of 25 hairline marks, 2 px wide and 60 px tall.
pub fn thin_word_strip() -> DrawingSurface {
    let mut img = blank(1200, 100);
    for i in 0..25 {
        bar(&mut img, 20 + 46 * i, 20, 2, 60);
    }
    surface(img)
}

/// Renders the shapes of [`paint`] as synthetic references.
pub struct ShapeRenderer;

impl GlyphRenderer for ShapeRenderer {
    fn name(&self) -> &str {
        "shapes"
    }

    fn render(&self, symbol: &str, size: u32) -> Option<DrawingSurface> {
        paint(symbol, size).map(surface)
    }
}

// ── Mock models ──────────────────────────────────────────────────────────────

/// Answers every call with the same tensor.
pub struct Fixed(pub Tensor);

impl ModelBackend for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    fn infer(&self, _input: Tensor) -> Result<Tensor, String> {
        Ok(self.0.clone())
    }
}

/// Serves fixed-output models and counts load attempts.
#[derive(Default)]
pub struct MockSource {
    pub glyph: Option<(Vec<String>, Tensor)>,
    pub sequence: Option<(Vec<String>, Tensor)>,
    pub loads: AtomicUsize,
}

impl MockSource {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn with_glyph(mut self, labels: &[&str], probs: Vec<f32>) -> Self {
        let n = probs.len();
        self.glyph = Some((strings(labels), Tensor::new(vec![1, n], probs)));
        self
    }

    /// One frame per entry of `steps`, each a clear win for that class.
    pub fn with_sequence(mut self, labels: &[&str], steps: &[usize]) -> Self {
        let classes = labels.len();
        let mut data = Vec::new();
        for &s in steps {
            let mut row = vec![0.0f32; classes];
            row[s] = 6.0;
            data.extend(row);
        }
        let output = Tensor::new(vec![1, steps.len(), classes], data);
        self.sequence = Some((strings(labels), output));
        self
    }
}

impl ModelSource for MockSource {
    fn load(&self, kind: ModelKind) -> Result<ModelArtifacts, String> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let entry = match kind {
            ModelKind::Glyph => &self.glyph,
            ModelKind::Sequence => &self.sequence,
        };
        let (labels, output) = entry.clone().ok_or_else(|| format!("no {kind} in this test"))?;
        Ok(ModelArtifacts {
            backend: Box::new(Fixed(output)),
            labels,
        })
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
