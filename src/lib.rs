//! Offline recognition of hand-drawn Devanagari glyphs and short words.
//!
//! A [`Recognizer`] takes a drawing surface, decides whether it holds a
//! single glyph or a word, and answers with a neural model when one is
//! available or with chamfer template matching against reference
//! drawings otherwise.

pub mod assess;
pub mod bitmap;
pub mod config;
pub mod confusable;
pub mod decode;
pub mod dispatch;
pub mod distance;
pub mod error;
pub mod labels;
pub mod matcher;
pub mod model;
pub mod raster;
pub mod recognizer;
pub mod references;

pub use assess::{assess, Assessment};
pub use bitmap::Bitmap;
pub use config::{load_config, save_config, RecognizerConfig};
pub use confusable::ConfusableTable;
pub use dispatch::Mode;
pub use error::{RecognizeError, Result};
pub use matcher::{FontRenderer, GlyphRenderer};
pub use model::{FileModelSource, InferenceEngine, ModelSource, ModelState, NoModels};
pub use raster::DrawingSurface;
pub use recognizer::{GlyphMethod, NoResultReason, Recognition, RecognitionRequest, Recognizer};
pub use references::{load_references, save_references, ReferenceSet};
