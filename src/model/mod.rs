//! Neural recognition: a single-glyph classifier and a sequence model.
//!
//! Models come from a [`ModelSource`] and run on a [`ModelBackend`]. Both
//! are loaded lazily, once, and cached for the lifetime of the
//! [`InferenceEngine`]; load problems become a [`ModelState`] instead of an
//! error so callers can fall back.

#[cfg(feature = "onnx")]
pub mod onnx;

use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

use crate::bitmap::Bitmap;
use crate::config::{ModelConfig, RasterParams};
use crate::decode::{greedy_decode, DecodedSequence, FrameGrid};
use crate::error::{RecognizeError, Result};
use crate::labels::{read_label_file, Alphabet, LabelTable};

// ── Backend seam ──────────────────────────────────────────────────────────────

/// Owned dense `f32` tensor. Input layout is NHWC.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let n = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; n],
        }
    }
}

/// Runs one loaded model.
///
/// `infer` takes its input by value; the buffers of a call are dropped when
/// it returns, whatever the outcome.
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;
    fn infer(&self, input: Tensor) -> std::result::Result<Tensor, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Glyph,
    Sequence,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ModelKind::Glyph => "glyph classifier",
            ModelKind::Sequence => "sequence model",
        })
    }
}

/// A model plus the symbol table for its outputs.
pub struct ModelArtifacts {
    pub backend: Box<dyn ModelBackend>,
    pub labels: Vec<String>,
}

/// Loads model artifacts. An `Err` means "not available here".
pub trait ModelSource: Send + Sync {
    fn load(&self, kind: ModelKind) -> std::result::Result<ModelArtifacts, String>;
}

/// Source for chamfer-only operation.
pub struct NoModels;

impl ModelSource for NoModels {
    fn load(&self, kind: ModelKind) -> std::result::Result<ModelArtifacts, String> {
        Err(format!("no {kind} configured"))
    }
}

/// Loads the model files named in [`ModelConfig`].
///
/// The glyph label table falls back to the built-in DHCD classes; the
/// sequence model needs its own alphabet file.
pub struct FileModelSource {
    config: ModelConfig,
}

impl FileModelSource {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }
}

impl ModelSource for FileModelSource {
    fn load(&self, kind: ModelKind) -> std::result::Result<ModelArtifacts, String> {
        let (model, labels) = match kind {
            ModelKind::Glyph => (&self.config.glyph_model, &self.config.glyph_labels),
            ModelKind::Sequence => (&self.config.sequence_model, &self.config.sequence_labels),
        };
        let model = model.as_ref().ok_or_else(|| format!("no {kind} path configured"))?;
        if !model.exists() {
            return Err(format!("{kind} not found at {}", model.display()));
        }
        let labels = match (labels, kind) {
            (Some(path), _) => read_label_file(path)?,
            (None, ModelKind::Glyph) => LabelTable::dhcd().iter().map(str::to_string).collect(),
            (None, ModelKind::Sequence) => return Err("no sequence alphabet configured".into()),
        };
        let backend = open_backend(model)?;
        Ok(ModelArtifacts { backend, labels })
    }
}

#[cfg(feature = "onnx")]
fn open_backend(path: &std::path::Path) -> std::result::Result<Box<dyn ModelBackend>, String> {
    Ok(Box::new(onnx::OnnxBackend::from_file(path)?))
}

#[cfg(not(feature = "onnx"))]
fn open_backend(path: &std::path::Path) -> std::result::Result<Box<dyn ModelBackend>, String> {
    Err(format!("cannot open {}: built without the `onnx` feature", path.display()))
}

// ── Load state ────────────────────────────────────────────────────────────────

/// Cached outcome of loading one model.
pub enum ModelState<T> {
    Loaded(T),
    /// Missing or unloadable; callers fall back.
    Unavailable(String),
    /// Loaded, but its outputs do not fit its label table. Calls that need
    /// this model fail with [`RecognizeError::InvalidModelOutput`].
    Misconfigured(String),
}

impl<T> ModelState<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelState::Loaded(_))
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            ModelState::Loaded(m) => Some(m),
            _ => None,
        }
    }
}

enum LoadFailure {
    Unavailable(String),
    Misconfigured(String),
}

fn into_state<T>(kind: ModelKind, result: std::result::Result<T, LoadFailure>) -> ModelState<T> {
    match result {
        Ok(model) => {
            info!("{kind} ready");
            ModelState::Loaded(model)
        }
        Err(LoadFailure::Unavailable(reason)) => {
            warn!("{kind} unavailable: {reason}");
            ModelState::Unavailable(reason)
        }
        Err(LoadFailure::Misconfigured(reason)) => {
            error!("{kind} misconfigured: {reason}");
            ModelState::Misconfigured(reason)
        }
    }
}

// ── Glyph classifier ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct GlyphPrediction {
    pub symbol: String,
    pub class_index: usize,
    pub confidence: f64,
}

pub struct GlyphClassifier {
    backend: Box<dyn ModelBackend>,
    labels: LabelTable,
    input_size: usize,
}

impl GlyphClassifier {
    fn load(
        artifacts: ModelArtifacts,
        input_size: usize,
    ) -> std::result::Result<Self, LoadFailure> {
        let labels = LabelTable::new(artifacts.labels).map_err(LoadFailure::Misconfigured)?;
        let backend = artifacts.backend;

        // One trial run so a label/output mismatch surfaces now, not mid-drill.
        let trial = backend
            .infer(Tensor::zeros(vec![1, input_size, input_size, 1]))
            .map_err(|e| LoadFailure::Unavailable(format!("trial inference failed: {e}")))?;
        if trial.data.len() != labels.len() {
            return Err(LoadFailure::Misconfigured(format!(
                "classifier emits {} scores but has {} labels",
                trial.data.len(),
                labels.len()
            )));
        }
        Ok(Self {
            backend,
            labels,
            input_size,
        })
    }

    /// Classify a binarized `input_size`² bitmap.
    pub fn classify(&self, input: &Bitmap) -> Result<GlyphPrediction> {
        let n = self.input_size;
        if (input.width(), input.height()) != (n, n) {
            return Err(RecognizeError::InvalidInput(format!(
                "classifier expects {n}×{n}, got {}×{}",
                input.width(),
                input.height()
            )));
        }
        let output = self
            .backend
            .infer(Tensor::new(vec![1, n, n, 1], input.to_unit_floats()))
            .map_err(|message| RecognizeError::Inference {
                backend: self.backend.name().to_string(),
                message,
            })?;
        if output.data.len() != self.labels.len() {
            return Err(RecognizeError::InvalidModelOutput(format!(
                "classifier emitted {} scores for {} labels",
                output.data.len(),
                self.labels.len()
            )));
        }

        let probs = as_distribution(output.data);
        let (class_index, &confidence) = probs
            .iter()
            .enumerate()
            .fold((0, &probs[0]), |best, cur| if cur.1 > best.1 { cur } else { best });
        let symbol = self.labels.get(class_index).unwrap_or_default().to_string();
        debug!("[glyph] {symbol:?} class={class_index} conf={confidence:.3}");
        Ok(GlyphPrediction {
            symbol,
            class_index,
            confidence: confidence as f64,
        })
    }
}

/// Pass probabilities through; softmax anything that is not one (logits).
fn as_distribution(scores: Vec<f32>) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    if scores.iter().all(|&v| (0.0..=1.0).contains(&v)) && (sum - 1.0).abs() < 1e-3 {
        return scores;
    }
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

// ── Sequence model ────────────────────────────────────────────────────────────

pub struct SequenceModel {
    backend: Box<dyn ModelBackend>,
    alphabet: Alphabet,
    width: usize,
    height: usize,
}

impl SequenceModel {
    fn load(
        artifacts: ModelArtifacts,
        width: usize,
        height: usize,
    ) -> std::result::Result<Self, LoadFailure> {
        let alphabet = Alphabet::new(artifacts.labels).map_err(LoadFailure::Misconfigured)?;
        let backend = artifacts.backend;

        let trial = backend
            .infer(Tensor::zeros(vec![1, height, width, 1]))
            .map_err(|e| LoadFailure::Unavailable(format!("trial inference failed: {e}")))?;
        let classes = trial.shape.last().copied().unwrap_or(0);
        if classes != alphabet.len() {
            return Err(LoadFailure::Misconfigured(format!(
                "sequence model emits {classes} classes per step but the alphabet has {}",
                alphabet.len()
            )));
        }
        Ok(Self {
            backend,
            alphabet,
            width,
            height,
        })
    }

    /// Run the model on a `height`×`width` row-major intensity buffer.
    pub fn frames(&self, input: Vec<f32>) -> Result<FrameGrid> {
        if input.len() != self.width * self.height {
            return Err(RecognizeError::InvalidInput(format!(
                "sequence model expects {}×{} values, got {}",
                self.width,
                self.height,
                input.len()
            )));
        }
        let output = self
            .backend
            .infer(Tensor::new(vec![1, self.height, self.width, 1], input))
            .map_err(|message| RecognizeError::Inference {
                backend: self.backend.name().to_string(),
                message,
            })?;
        let classes = output.shape.last().copied().unwrap_or(0);
        if classes == 0 {
            return Err(RecognizeError::InvalidModelOutput(format!(
                "sequence output shape {:?} has no class axis",
                output.shape
            )));
        }
        let steps = output.data.len() / classes;
        FrameGrid::new(steps, classes, output.data)
    }

    pub fn recognize(&self, input: Vec<f32>) -> Result<DecodedSequence> {
        let grid = self.frames(input)?;
        let decoded = greedy_decode(&grid, &self.alphabet)?;
        debug!(
            "[sequence] {:?} steps={} conf={:.3}",
            decoded.text,
            grid.steps(),
            decoded.confidence
        );
        Ok(decoded)
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Owns the lazily loaded models.
///
/// The first caller of [`glyph`](Self::glyph) or [`sequence`](Self::sequence)
/// performs the load; concurrent callers block on that same load and then
/// share its result.
pub struct InferenceEngine {
    source: Arc<dyn ModelSource>,
    glyph_input: usize,
    sequence_input: (usize, usize),
    glyph: OnceLock<ModelState<GlyphClassifier>>,
    sequence: OnceLock<ModelState<SequenceModel>>,
}

impl InferenceEngine {
    pub fn new(source: Arc<dyn ModelSource>, raster: &RasterParams) -> Self {
        Self {
            source,
            glyph_input: raster.glyph_input_size as usize,
            sequence_input: (raster.sequence_width as usize, raster.sequence_height as usize),
            glyph: OnceLock::new(),
            sequence: OnceLock::new(),
        }
    }

    pub fn glyph(&self) -> &ModelState<GlyphClassifier> {
        self.glyph.get_or_init(|| {
            let loaded = self
                .source
                .load(ModelKind::Glyph)
                .map_err(LoadFailure::Unavailable)
                .and_then(|a| GlyphClassifier::load(a, self.glyph_input));
            into_state(ModelKind::Glyph, loaded)
        })
    }

    pub fn sequence(&self) -> &ModelState<SequenceModel> {
        self.sequence.get_or_init(|| {
            let (w, h) = self.sequence_input;
            let loaded = self
                .source
                .load(ModelKind::Sequence)
                .map_err(LoadFailure::Unavailable)
                .and_then(|a| SequenceModel::load(a, w, h));
            into_state(ModelKind::Sequence, loaded)
        })
    }

    /// Start loading both models on the rayon pool and return immediately.
    pub fn warm_up(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        rayon::spawn(move || {
            engine.glyph();
            engine.sequence();
        });
    }
}
