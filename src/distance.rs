//! Two-pass 3-4 chamfer distance transform.

use crate::bitmap::Bitmap;

/// Weight of a step to a horizontal or vertical neighbour.
pub const ORTHOGONAL_WEIGHT: f32 = 4.0;
/// Weight of a step to a diagonal neighbour.
pub const DIAGONAL_WEIGHT: f32 = 3.0;

/// Stand-in for "no ink reachable"; large enough to dominate any real path.
const FAR: f32 = 1e6;

/// Per-pixel chamfer distance to the nearest ink pixel of a source bitmap.
///
/// Values are in weighted chamfer units, so only fields computed with the
/// same weights are comparable. Ink pixels are exactly 0.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceField {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DistanceField {
    pub fn compute(bitmap: &Bitmap) -> Self {
        let (w, h) = (bitmap.width(), bitmap.height());
        let mut d: Vec<f32> = bitmap
            .as_raw()
            .iter()
            .map(|&v| if v > 0 { 0.0 } else { FAR })
            .collect();

        // Forward: left, up, up-left, up-right.
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                if d[i] == 0.0 {
                    continue;
                }
                let mut m = d[i];
                if x > 0 {
                    m = m.min(d[i - 1] + ORTHOGONAL_WEIGHT);
                }
                if y > 0 {
                    m = m.min(d[i - w] + ORTHOGONAL_WEIGHT);
                    if x > 0 {
                        m = m.min(d[i - w - 1] + DIAGONAL_WEIGHT);
                    }
                    if x + 1 < w {
                        m = m.min(d[i - w + 1] + DIAGONAL_WEIGHT);
                    }
                }
                d[i] = m;
            }
        }

        // Backward: right, down, down-right, down-left.
        for y in (0..h).rev() {
            for x in (0..w).rev() {
                let i = y * w + x;
                if d[i] == 0.0 {
                    continue;
                }
                let mut m = d[i];
                if x + 1 < w {
                    m = m.min(d[i + 1] + ORTHOGONAL_WEIGHT);
                }
                if y + 1 < h {
                    m = m.min(d[i + w] + ORTHOGONAL_WEIGHT);
                    if x + 1 < w {
                        m = m.min(d[i + w + 1] + DIAGONAL_WEIGHT);
                    }
                    if x > 0 {
                        m = m.min(d[i + w - 1] + DIAGONAL_WEIGHT);
                    }
                }
                d[i] = m;
            }
        }

        Self {
            width: w,
            height: h,
            data: d,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn as_raw(&self) -> &[f32] {
        &self.data
    }

    /// Mean field value over the ink pixels of `bitmap`, or 0 when it has none.
    ///
    /// `bitmap` must have the field's dimensions.
    pub fn mean_at_ink(&self, bitmap: &Bitmap) -> f64 {
        debug_assert_eq!((bitmap.width(), bitmap.height()), (self.width, self.height));
        let (sum, count) = bitmap
            .as_raw()
            .iter()
            .zip(&self.data)
            .filter(|(&v, _)| v > 0)
            .fold((0.0f64, 0usize), |(s, c), (_, &d)| (s + d as f64, c + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}
