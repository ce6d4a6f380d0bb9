use crate::error::{RecognizeError, Result};

/// Fixed-size row-major grid of intensities. 0 is background.
///
/// Used both for inverted grayscale (0–255, ink high) and for binary
/// bitmaps (0/1) after thresholding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// All-background bitmap.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        if data.len() != width * height {
            return Err(RecognizeError::InvalidInput(format!(
                "bitmap buffer holds {} values, expected {width}×{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a binary bitmap from a closure over coordinates.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(u8::from(f(x, y)));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    #[inline]
    pub fn is_ink(&self, x: usize, y: usize) -> bool {
        self.get(x, y) > 0
    }

    /// Number of non-background pixels.
    pub fn ink_count(&self) -> usize {
        self.data.iter().filter(|&&v| v > 0).count()
    }

    pub fn same_size(&self, other: &Bitmap) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Tight `(min_x, min_y, max_x, max_y)` box around ink, inclusive.
    pub fn ink_bounds(&self) -> Option<(usize, usize, usize, usize)> {
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.is_ink(x, y) {
                    continue;
                }
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bounds
    }

    /// Ink as flat `f32` values (1.0 ink, 0.0 background), row-major.
    pub fn to_unit_floats(&self) -> Vec<f32> {
        self.data.iter().map(|&v| if v > 0 { 1.0 } else { 0.0 }).collect()
    }
}
