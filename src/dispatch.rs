use serde::{Deserialize, Serialize};

use crate::config::DispatchParams;
use crate::raster::DrawingSurface;

/// Which pipeline a drawing goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Glyph,
    Word,
}

/// Shape measurements behind a dispatch decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShapeStats {
    pub aspect_ratio: f64,
    pub column_groups: usize,
}

/// Count runs of adjacent columns that hold at least one ink pixel.
pub fn count_ink_column_groups(surface: &DrawingSurface, ink_threshold: u8) -> usize {
    let ink = surface.ink_image();
    let (w, h) = ink.dimensions();
    let mut groups = 0;
    let mut in_run = false;
    for x in 0..w {
        let has_ink = (0..h).any(|y| ink.get_pixel(x, y)[0] > ink_threshold);
        if has_ink && !in_run {
            groups += 1;
        }
        in_run = has_ink;
    }
    groups
}

/// Glyph when the surface is not wide, or wide but with few column groups
/// (a single wide conjunct); word otherwise.
pub fn decide(stats: ShapeStats, params: &DispatchParams) -> Mode {
    if stats.aspect_ratio <= params.max_glyph_aspect
        || stats.column_groups <= params.max_glyph_column_groups
    {
        Mode::Glyph
    } else {
        Mode::Word
    }
}

pub fn measure(surface: &DrawingSurface, ink_threshold: u8) -> ShapeStats {
    ShapeStats {
        aspect_ratio: surface.aspect_ratio(),
        column_groups: count_ink_column_groups(surface, ink_threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn stats(aspect_ratio: f64, column_groups: usize) -> ShapeStats {
        ShapeStats {
            aspect_ratio,
            column_groups,
        }
    }

    #[test]
    fn square_is_always_glyph() {
        let p = DispatchParams::default();
        assert_eq!(decide(stats(1.0, 0), &p), Mode::Glyph);
        assert_eq!(decide(stats(1.0, 500), &p), Mode::Glyph);
    }

    #[test]
    fn wide_with_many_groups_is_word() {
        assert_eq!(decide(stats(4.0, 25), &DispatchParams::default()), Mode::Word);
    }

    #[test]
    fn wide_conjunct_stays_glyph() {
        assert_eq!(decide(stats(4.0, 10), &DispatchParams::default()), Mode::Glyph);
    }

    #[test]
    fn boundaries_are_inclusive() {
        let p = DispatchParams::default();
        assert_eq!(decide(stats(2.0, 100), &p), Mode::Glyph);
        assert_eq!(decide(stats(2.01, 20), &p), Mode::Glyph);
        assert_eq!(decide(stats(2.01, 21), &p), Mode::Word);
    }

    #[test]
    fn column_groups_count_separate_strokes() {
        let mut img = RgbImage::from_pixel(40, 10, Rgb([255, 255, 255]));
        for x in [2u32, 3, 10, 20, 21, 22, 39] {
            img.put_pixel(x, 5, Rgb([0, 0, 0]));
        }
        let surface = DrawingSurface::from_image(&DynamicImage::ImageRgb8(img)).unwrap();
        assert_eq!(count_ink_column_groups(&surface, 48), 4);
        let s = measure(&surface, 48);
        assert!((s.aspect_ratio - 4.0).abs() < 1e-12);
    }

    #[test]
    fn faint_pixels_below_threshold_are_ignored() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        img.put_pixel(4, 4, Rgb([230, 230, 230]));
        let surface = DrawingSurface::from_image(&DynamicImage::ImageRgb8(img)).unwrap();
        assert_eq!(count_ink_column_groups(&surface, 48), 0);
    }
}
