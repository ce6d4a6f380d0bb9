use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::confusable::DEFAULT_CONFUSABLE_PAIRS;
use crate::error::{RecognizeError, Result};
use crate::labels::DHCD_CLASSES;

/// Rasterization and model-input geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterParams {
    /// Side of the square working canvas used for chamfer matching.
    pub canvas_size: u32,
    /// Blank border kept around the fitted ink box.
    pub padding: u32,
    /// Inverted-luma cutoff; pixels strictly above it count as ink.
    pub ink_threshold: u8,
    /// Ink boxes narrower or shorter than this are left unfitted.
    pub min_bbox_extent: u32,
    /// Side of the glyph classifier's square input.
    pub glyph_input_size: u32,
    pub sequence_width: u32,
    pub sequence_height: u32,
}

impl Default for RasterParams {
    fn default() -> Self {
        Self {
            canvas_size: 64,
            padding: 4,
            // Permissive: faint strokes still count.
            ink_threshold: 48,
            min_bbox_extent: 2,
            glyph_input_size: 32,
            sequence_width: 128,
            sequence_height: 32,
        }
    }
}

/// Acceptance thresholds of the chamfer path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// A match must score strictly above this.
    pub min_similarity: f64,
    /// Normalized drawings with fewer ink pixels are rejected outright.
    pub min_ink_pixels: usize,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            min_similarity: 0.35,
            min_ink_pixels: 8,
        }
    }
}

/// Shape heuristic that routes a drawing to the glyph or the sequence model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchParams {
    pub max_glyph_aspect: f64,
    /// Wide drawings with at most this many ink column groups still count
    /// as one glyph (wide conjuncts).
    pub max_glyph_column_groups: usize,
}

impl Default for DispatchParams {
    fn default() -> Self {
        Self {
            max_glyph_aspect: 2.0,
            max_glyph_column_groups: 20,
        }
    }
}

fn default_glyph_confidence() -> f64 {
    0.5
}

/// Where the model artifacts live. Any missing path makes that model unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub glyph_model: Option<PathBuf>,
    pub glyph_labels: Option<PathBuf>,
    pub sequence_model: Option<PathBuf>,
    pub sequence_labels: Option<PathBuf>,
    /// Classifier predictions below this are low confidence and the chamfer
    /// path gets a say.
    #[serde(default = "default_glyph_confidence")]
    pub glyph_confidence_threshold: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            glyph_model: None,
            glyph_labels: None,
            sequence_model: None,
            sequence_labels: None,
            glyph_confidence_threshold: default_glyph_confidence(),
        }
    }
}

fn default_alphabet() -> Vec<String> {
    DHCD_CLASSES.iter().map(|s| s.to_string()).collect()
}

fn default_confusable_pairs() -> Vec<[String; 2]> {
    DEFAULT_CONFUSABLE_PAIRS
        .iter()
        .map(|(a, b)| [a.to_string(), b.to_string()])
        .collect()
}

/// Complete recognizer configuration.
///
/// Every field has a default, so `{}` is a valid config file. Old files
/// missing newer sections keep working.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    #[serde(default)]
    pub raster: RasterParams,
    #[serde(default)]
    pub matching: MatchParams,
    #[serde(default)]
    pub dispatch: DispatchParams,
    #[serde(default)]
    pub models: ModelConfig,
    /// Symbols the chamfer fallback tries when the caller gives no candidates.
    #[serde(default = "default_alphabet")]
    pub alphabet: Vec<String>,
    #[serde(default = "default_confusable_pairs")]
    pub confusable_pairs: Vec<[String; 2]>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            raster: RasterParams::default(),
            matching: MatchParams::default(),
            dispatch: DispatchParams::default(),
            models: ModelConfig::default(),
            alphabet: default_alphabet(),
            confusable_pairs: default_confusable_pairs(),
        }
    }
}

impl RecognizerConfig {
    /// Reject geometry that would make the rasterizer degenerate.
    pub fn validate(&self) -> Result<()> {
        let r = &self.raster;
        if r.canvas_size <= 2 * r.padding {
            return Err(RecognizeError::Config(format!(
                "canvas_size {} leaves no room inside padding {}",
                r.canvas_size, r.padding
            )));
        }
        if r.glyph_input_size == 0 || r.sequence_width == 0 || r.sequence_height == 0 {
            return Err(RecognizeError::Config("model input sizes must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.matching.min_similarity) {
            return Err(RecognizeError::Config(format!(
                "min_similarity {} outside [0, 1]",
                self.matching.min_similarity
            )));
        }
        Ok(())
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<RecognizerConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| RecognizeError::Config(format!("Cannot read {}: {e}", path.display())))?;
    let cfg: RecognizerConfig = serde_json::from_str(&text)
        .map_err(|e| RecognizeError::Config(format!("Parse error in {}: {e}", path.display())))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn save_config(path: impl AsRef<Path>, config: &RecognizerConfig) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| RecognizeError::Config(format!("Cannot create dirs: {e}")))?;
    }
    let text = serde_json::to_string_pretty(config)
        .map_err(|e| RecognizeError::Config(format!("Serialise error: {e}")))?;
    fs::write(path, text)
        .map_err(|e| RecognizeError::Config(format!("Cannot write {}: {e}", path.display())))
}
