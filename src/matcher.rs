use ab_glyph::{Font, FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::bitmap::Bitmap;
use crate::config::MatchParams;
use crate::distance::DistanceField;
use crate::error::{RecognizeError, Result};
use crate::raster::{DrawingSurface, Rasterized, Rasterizer};
use crate::references::ReferenceSet;

// ── Synthetic references ──────────────────────────────────────────────────────

/// Produces a canonical drawing of a symbol when the user saved none.
pub trait GlyphRenderer: Send + Sync {
    fn name(&self) -> &str;
    /// Black-on-white rendering on a `size`×`size` surface, or `None` when
    /// the symbol cannot be drawn (e.g. the font has no glyph for it).
    fn render(&self, symbol: &str, size: u32) -> Option<DrawingSurface>;
}

/// Renders symbols with a TrueType/OpenType font (e.g. Noto Sans Devanagari).
///
/// No shaping is applied, so conjuncts render as their component glyphs.
pub struct FontRenderer {
    font: FontVec,
    /// Glyph height relative to the canvas side.
    scale: f32,
}

impl FontRenderer {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| RecognizeError::Config(format!("invalid font: {e}")))?;
        Ok(Self { font, scale: 0.85 })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| RecognizeError::Config(format!("Cannot read {}: {e}", path.display())))?;
        Self::from_bytes(bytes)
    }

    /// `true` when every character has a real glyph. Missing ones map to
    /// glyph 0 (`.notdef`), which would draw the same box for any symbol.
    pub fn covers(&self, symbol: &str) -> bool {
        symbol.chars().all(|c| self.font.glyph_id(c).0 != 0)
    }
}

impl GlyphRenderer for FontRenderer {
    fn name(&self) -> &str {
        "font"
    }

    fn render(&self, symbol: &str, size: u32) -> Option<DrawingSurface> {
        if symbol.is_empty() || !self.covers(symbol) {
            return None;
        }
        let mut img = RgbImage::from_pixel(size, size, Rgb([255, 255, 255]));
        let scale = PxScale::from(size as f32 * self.scale);
        let (tw, th) = text_size(scale, &self.font, symbol);
        if tw == 0 || th == 0 {
            return None;
        }
        let x = (size as i32 - tw as i32) / 2;
        let y = (size as i32 - th as i32) / 2;
        draw_text_mut(&mut img, Rgb([0, 0, 0]), x, y, scale, &self.font, symbol);
        DrawingSurface::from_image(&DynamicImage::ImageRgb8(img)).ok()
    }
}

// ── Similarity ────────────────────────────────────────────────────────────────

/// Symmetric chamfer similarity in (0, 1]; 1.0 means the ink coincides.
///
/// Averages the mean reference-field distance at the user's ink and the
/// mean user-field distance at the reference's ink, then maps `d` to
/// `1 / (1 + d)`.
pub fn chamfer_similarity(user: &Bitmap, reference: &Bitmap) -> Result<f64> {
    if !user.same_size(reference) {
        return Err(RecognizeError::InvalidInput(format!(
            "cannot compare {}×{} with {}×{}",
            user.width(),
            user.height(),
            reference.width(),
            reference.height()
        )));
    }
    Ok(similarity_with_field(user, &DistanceField::compute(user), reference))
}

fn similarity_with_field(user: &Bitmap, user_field: &DistanceField, reference: &Bitmap) -> f64 {
    let ref_field = DistanceField::compute(reference);
    let avg_user = ref_field.mean_at_ink(user);
    let avg_ref = user_field.mean_at_ink(reference);
    1.0 / (1.0 + (avg_user + avg_ref) / 2.0)
}

// ── Matching ──────────────────────────────────────────────────────────────────

/// Where the reference a candidate was scored against came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    User,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub symbol: String,
    pub score: f64,
    pub source: ReferenceSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(CandidateScore),
    Unmatched(Unmatched),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Unmatched {
    InsufficientInk { ink_pixels: usize },
    /// No candidate had a usable reference (none saved, none renderable).
    NoReferences,
    /// Best candidate did not clear the similarity threshold.
    BelowThreshold { best: CandidateScore },
}

/// Geometric template matcher: the offline fallback when no model answers.
pub struct ChamferMatcher {
    rasterizer: Rasterizer,
    params: MatchParams,
    renderer: Option<Arc<dyn GlyphRenderer>>,
}

impl ChamferMatcher {
    pub fn new(
        rasterizer: Rasterizer,
        params: MatchParams,
        renderer: Option<Arc<dyn GlyphRenderer>>,
    ) -> Self {
        Self {
            rasterizer,
            params,
            renderer,
        }
    }

    /// Normalize the drawing and match it against `candidates`.
    pub fn match_drawing(
        &self,
        surface: &DrawingSurface,
        candidates: &[String],
        refs: Option<&ReferenceSet>,
    ) -> MatchOutcome {
        match self.rasterizer.normalize(surface) {
            Rasterized::Ink(drawn) => self.match_bitmap(&drawn, candidates, refs),
            Rasterized::Insufficient { ink_pixels } => {
                MatchOutcome::Unmatched(Unmatched::InsufficientInk { ink_pixels })
            }
        }
    }

    /// Match an already normalized drawing.
    ///
    /// Candidates are scored in parallel; the first candidate in input order
    /// wins ties.
    pub fn match_bitmap(
        &self,
        drawn: &Bitmap,
        candidates: &[String],
        refs: Option<&ReferenceSet>,
    ) -> MatchOutcome {
        let ink_pixels = drawn.ink_count();
        if ink_pixels < self.params.min_ink_pixels {
            return MatchOutcome::Unmatched(Unmatched::InsufficientInk { ink_pixels });
        }

        let drawn_field = DistanceField::compute(drawn);
        let scores: Vec<CandidateScore> = candidates
            .par_iter()
            .filter_map(|symbol| {
                let (reference, source) = self.reference_for(symbol, refs)?;
                if !reference.same_size(drawn) {
                    warn!(symbol = %symbol, "reference canvas differs from drawing, skipped");
                    return None;
                }
                let score = similarity_with_field(drawn, &drawn_field, &reference);
                Some(CandidateScore {
                    symbol: symbol.clone(),
                    score,
                    source,
                })
            })
            .collect();

        let mut best: Option<&CandidateScore> = None;
        for c in &scores {
            debug!("[chamfer]  {:8}  {:?}  score={:.3}", c.symbol, c.source, c.score);
            if best.map_or(true, |b| c.score > b.score) {
                best = Some(c);
            }
        }

        match best {
            None => MatchOutcome::Unmatched(Unmatched::NoReferences),
            Some(b) if b.score > self.params.min_similarity => MatchOutcome::Matched(b.clone()),
            Some(b) => {
                debug!(
                    "[chamfer] best {} score={:.3} ≤ {:.3}, no match",
                    b.symbol, b.score, self.params.min_similarity
                );
                MatchOutcome::Unmatched(Unmatched::BelowThreshold { best: b.clone() })
            }
        }
    }

    /// The active reference for one candidate: the user's drawing when it
    /// has enough ink, otherwise the synthetic rendering.
    fn reference_for(
        &self,
        symbol: &str,
        refs: Option<&ReferenceSet>,
    ) -> Option<(Bitmap, ReferenceSource)> {
        if let Some(drawing) = refs.and_then(|r| r.get(symbol)) {
            match self.rasterizer.normalize(drawing) {
                Rasterized::Ink(bmp) => return Some((bmp, ReferenceSource::User)),
                Rasterized::Insufficient { ink_pixels } => warn!(
                    symbol = %symbol,
                    ink_pixels,
                    "user reference is nearly empty, using synthetic glyph"
                ),
            }
        }

        let renderer = self.renderer.as_ref()?;
        let size = self.rasterizer.params().canvas_size;
        let Some(rendered) = renderer.render(symbol, size) else {
            debug!(symbol = %symbol, renderer = renderer.name(), "no rendering available");
            return None;
        };
        match self.rasterizer.normalize(&rendered) {
            Rasterized::Ink(bmp) => Some((bmp, ReferenceSource::Synthetic)),
            Rasterized::Insufficient { .. } => {
                debug!(symbol = %symbol, renderer = renderer.name(), "rendering has no ink");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RasterParams;

    fn bar(x0: usize, x1: usize) -> Bitmap {
        Bitmap::from_fn(64, 64, |x, y| (x0..=x1).contains(&x) && (4..60).contains(&y))
    }

    fn matcher() -> ChamferMatcher {
        let rasterizer = Rasterizer::new(RasterParams::default(), 8);
        ChamferMatcher::new(rasterizer, MatchParams::default(), None)
    }

    #[test]
    fn identical_bitmaps_score_one() {
        let a = bar(20, 24);
        assert_eq!(chamfer_similarity(&a, &a.clone()).unwrap(), 1.0);
    }

    #[test]
    fn similarity_stays_in_unit_interval() {
        let a = bar(4, 6);
        let b = Bitmap::from_fn(64, 64, |x, y| x + y == 60);
        let s = chamfer_similarity(&a, &b).unwrap();
        assert!(s > 0.0 && s < 1.0);
        // Symmetric by construction.
        assert_eq!(s, chamfer_similarity(&b, &a).unwrap());
    }

    #[test]
    fn closer_shapes_score_higher() {
        let user = bar(20, 24);
        let near = chamfer_similarity(&user, &bar(22, 26)).unwrap();
        let far = chamfer_similarity(&user, &bar(40, 44)).unwrap();
        assert!(near > far);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        assert!(chamfer_similarity(&Bitmap::new(8, 8), &Bitmap::new(8, 9)).is_err());
    }

    #[test]
    fn near_empty_drawing_never_matches() {
        let dot = Bitmap::from_fn(64, 64, |x, y| x == 10 && y == 10);
        let outcome = matcher().match_bitmap(&dot, &["क".to_string()], None);
        assert_eq!(
            outcome,
            MatchOutcome::Unmatched(Unmatched::InsufficientInk { ink_pixels: 1 })
        );
    }

    #[test]
    fn no_renderer_and_no_refs_means_no_references() {
        let outcome = matcher().match_bitmap(&bar(20, 24), &["क".to_string()], None);
        assert_eq!(outcome, MatchOutcome::Unmatched(Unmatched::NoReferences));
    }

    // Latin-only monospace font: no Devanagari coverage at all.
    fn latin_font() -> FontRenderer {
        let bytes = include_bytes!("../tests/fixtures/DejaVuSansMono.ttf");
        FontRenderer::from_bytes(bytes.to_vec()).unwrap()
    }

    #[test]
    fn font_renders_covered_symbols_centred() {
        let font = latin_font();
        assert!(font.covers("A"));
        let surface = font.render("A", 64).unwrap();
        let rasterizer = Rasterizer::new(RasterParams::default(), 8);
        let ink = rasterizer.binarize(&rasterizer.grayscale(&surface));
        let (x0, _, x1, _) = ink.ink_bounds().unwrap();
        let centre = (x0 + x1) as f64 / 2.0;
        assert!((centre - 32.0).abs() <= 6.0, "centre {centre}");
    }

    #[test]
    fn font_without_glyph_renders_nothing() {
        let font = latin_font();
        assert!(!font.covers("क"));
        assert!(font.render("क", 64).is_none());
        // One missing character is enough.
        assert!(font.render("Aक", 64).is_none());
        assert!(font.render("", 64).is_none());
    }

    #[test]
    fn uncovered_candidates_have_no_reference() {
        let rasterizer = Rasterizer::new(RasterParams::default(), 8);
        let renderer: Arc<dyn GlyphRenderer> = Arc::new(latin_font());
        let m = ChamferMatcher::new(rasterizer, MatchParams::default(), Some(renderer));
        let outcome = m.match_bitmap(&bar(20, 24), &["क".to_string(), "ख".to_string()], None);
        assert_eq!(outcome, MatchOutcome::Unmatched(Unmatched::NoReferences));
    }
}
