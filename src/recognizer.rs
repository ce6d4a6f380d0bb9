use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assess::{assess, Assessment};
use crate::config::RecognizerConfig;
use crate::confusable::ConfusableTable;
use crate::dispatch::{decide, measure, Mode, ShapeStats};
use crate::error::{RecognizeError, Result};
use crate::matcher::{ChamferMatcher, GlyphRenderer, MatchOutcome, ReferenceSource, Unmatched};
use crate::model::{FileModelSource, InferenceEngine, ModelSource, ModelState};
use crate::raster::{DrawingSurface, Rasterized, Rasterizer};
use crate::references::ReferenceSet;

// ── Public types ─────────────────────────────────────────────────────────────

/// One recognition call's inputs. Only the surface is required.
#[derive(Clone, Copy)]
pub struct RecognitionRequest<'a> {
    pub surface: &'a DrawingSurface,
    /// Skip the shape heuristic and force a pipeline.
    pub mode: Option<Mode>,
    /// Restrict the chamfer fallback to these symbols (e.g. the options of a
    /// multiple-choice drill). Defaults to the configured alphabet.
    pub candidates: Option<&'a [String]>,
    pub references: Option<&'a ReferenceSet>,
}

impl<'a> RecognitionRequest<'a> {
    pub fn new(surface: &'a DrawingSurface) -> Self {
        Self {
            surface,
            mode: None,
            candidates: None,
            references: None,
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn candidates(mut self, candidates: &'a [String]) -> Self {
        self.candidates = Some(candidates);
        self
    }

    pub fn references(mut self, references: &'a ReferenceSet) -> Self {
        self.references = Some(references);
        self
    }
}

/// How a single glyph was recognised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum GlyphMethod {
    Model { class_index: usize },
    Chamfer { reference: ReferenceSource },
}

/// Why nothing was recognised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoResultReason {
    /// Too little ink; nothing was run.
    InsufficientInk { ink_pixels: usize },
    /// Best guess fell below its acceptance threshold.
    LowConfidence { best: Option<String>, score: f64 },
    /// The pipeline this drawing needs is not available.
    Unsupported { detail: String },
    /// No candidate had a reference to compare against.
    NoReferences,
    /// The sequence model saw only blanks.
    EmptySequence { confidence: f64 },
}

/// Outcome of one recognition call: exactly one of glyph, sequence or nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recognition {
    Glyph {
        symbol: String,
        confidence: f64,
        #[serde(flatten)]
        method: GlyphMethod,
    },
    Sequence {
        text: String,
        confidence: f64,
    },
    NoResult {
        #[serde(flatten)]
        reason: NoResultReason,
    },
}

impl Recognition {
    fn no_result(reason: NoResultReason) -> Self {
        Recognition::NoResult { reason }
    }

    pub fn is_no_result(&self) -> bool {
        matches!(self, Recognition::NoResult { .. })
    }

    /// Recognised text, whether a glyph or a sequence.
    pub fn text(&self) -> Option<&str> {
        match self {
            Recognition::Glyph { symbol, .. } => Some(symbol),
            Recognition::Sequence { text, .. } => Some(text),
            Recognition::NoResult { .. } => None,
        }
    }
}

// ── Orchestration ────────────────────────────────────────────────────────────

/// Public entry point tying rasterization, dispatch, the models and the
/// chamfer fallback together.
///
/// Glyph path: classifier first; when it is unavailable, or below
/// `glyph_confidence_threshold`, the chamfer matcher decides. Word path:
/// sequence model only; without it the answer is `Unsupported`.
pub struct Recognizer {
    config: RecognizerConfig,
    rasterizer: Rasterizer,
    matcher: ChamferMatcher,
    engine: Arc<InferenceEngine>,
    confusables: ConfusableTable,
}

impl Recognizer {
    pub fn new(
        config: RecognizerConfig,
        source: Arc<dyn ModelSource>,
        renderer: Option<Arc<dyn GlyphRenderer>>,
    ) -> Result<Self> {
        config.validate()?;
        let rasterizer = Rasterizer::new(config.raster.clone(), config.matching.min_ink_pixels);
        let matcher = ChamferMatcher::new(rasterizer.clone(), config.matching.clone(), renderer);
        let engine = Arc::new(InferenceEngine::new(source, &config.raster));
        let confusables = ConfusableTable::from_pairs(&config.confusable_pairs);
        Ok(Self {
            config,
            rasterizer,
            matcher,
            engine,
            confusables,
        })
    }

    /// Models from the paths in `config.models`, no synthetic renderer.
    pub fn from_config(config: RecognizerConfig) -> Result<Self> {
        let source = Arc::new(FileModelSource::new(config.models.clone()));
        Self::new(config, source, None)
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<InferenceEngine> {
        &self.engine
    }

    pub fn confusables(&self) -> &ConfusableTable {
        &self.confusables
    }

    /// Begin loading models in the background.
    pub fn warm_up(&self) {
        self.engine.warm_up();
    }

    pub fn dispatch(&self, surface: &DrawingSurface) -> (Mode, ShapeStats) {
        let stats = measure(surface, self.config.raster.ink_threshold);
        (decide(stats, &self.config.dispatch), stats)
    }

    pub fn recognize(&self, req: &RecognitionRequest<'_>) -> Result<Recognition> {
        if let Rasterized::Insufficient { ink_pixels } = self.rasterizer.native_ink(req.surface) {
            debug!("[recognize] insufficient ink ({ink_pixels} px), nothing run");
            let reason = NoResultReason::InsufficientInk { ink_pixels };
            return Ok(Recognition::no_result(reason));
        }

        let mode = match req.mode {
            Some(m) => m,
            None => {
                let (m, stats) = self.dispatch(req.surface);
                debug!(
                    "[recognize] dispatch {:?} (aspect={:.2}, column groups={})",
                    m, stats.aspect_ratio, stats.column_groups
                );
                m
            }
        };

        match mode {
            Mode::Glyph => self.recognize_glyph(req),
            Mode::Word => self.recognize_word(req),
        }
    }

    /// Recognize and grade against `target` in one step.
    pub fn assess(&self, req: &RecognitionRequest<'_>, target: &str) -> Result<Assessment> {
        let recognition = self.recognize(req)?;
        Ok(assess(&recognition, target, &self.confusables))
    }

    fn recognize_glyph(&self, req: &RecognitionRequest<'_>) -> Result<Recognition> {
        match self.engine.glyph() {
            ModelState::Loaded(model) => {
                let pred = model.classify(&self.rasterizer.glyph_input(req.surface))?;
                let threshold = self.config.models.glyph_confidence_threshold;
                if pred.confidence >= threshold {
                    return Ok(Recognition::Glyph {
                        symbol: pred.symbol,
                        confidence: pred.confidence,
                        method: GlyphMethod::Model {
                            class_index: pred.class_index,
                        },
                    });
                }
                info!(
                    "[recognize] classifier unsure ({:?} conf={:.3} < {:.3}), trying chamfer",
                    pred.symbol, pred.confidence, threshold
                );
                Ok(match self.chamfer(req) {
                    MatchOutcome::Matched(m) => Self::chamfer_glyph(m.symbol, m.score, m.source),
                    MatchOutcome::Unmatched(_) => {
                        Recognition::no_result(NoResultReason::LowConfidence {
                            best: Some(pred.symbol),
                            score: pred.confidence,
                        })
                    }
                })
            }
            ModelState::Unavailable(reason) => {
                debug!("[recognize] classifier unavailable ({reason}), chamfer only");
                Ok(match self.chamfer(req) {
                    MatchOutcome::Matched(m) => Self::chamfer_glyph(m.symbol, m.score, m.source),
                    MatchOutcome::Unmatched(u) => Recognition::no_result(match u {
                        Unmatched::InsufficientInk { ink_pixels } => {
                            NoResultReason::InsufficientInk { ink_pixels }
                        }
                        Unmatched::NoReferences => NoResultReason::NoReferences,
                        Unmatched::BelowThreshold { best } => NoResultReason::LowConfidence {
                            best: Some(best.symbol),
                            score: best.score,
                        },
                    }),
                })
            }
            ModelState::Misconfigured(reason) => {
                Err(RecognizeError::InvalidModelOutput(reason.clone()))
            }
        }
    }

    fn recognize_word(&self, req: &RecognitionRequest<'_>) -> Result<Recognition> {
        match self.engine.sequence() {
            ModelState::Loaded(model) => {
                let decoded = model.recognize(self.rasterizer.sequence_input(req.surface))?;
                if decoded.text.is_empty() {
                    return Ok(Recognition::no_result(NoResultReason::EmptySequence {
                        confidence: decoded.confidence,
                    }));
                }
                Ok(Recognition::Sequence {
                    text: decoded.text,
                    confidence: decoded.confidence,
                })
            }
            ModelState::Unavailable(reason) => {
                warn!("[recognize] word drawing but {reason}");
                Ok(Recognition::no_result(NoResultReason::Unsupported {
                    detail: format!("sequence model unavailable: {reason}"),
                }))
            }
            ModelState::Misconfigured(reason) => {
                Err(RecognizeError::InvalidModelOutput(reason.clone()))
            }
        }
    }

    /// Chamfer pass on the drawing fitted to the working canvas.
    fn chamfer(&self, req: &RecognitionRequest<'_>) -> MatchOutcome {
        let candidates = req.candidates.unwrap_or(&self.config.alphabet);
        self.matcher
            .match_drawing(req.surface, candidates, req.references)
    }

    fn chamfer_glyph(symbol: String, score: f64, reference: ReferenceSource) -> Recognition {
        Recognition::Glyph {
            symbol,
            confidence: score,
            method: GlyphMethod::Chamfer { reference },
        }
    }
}
