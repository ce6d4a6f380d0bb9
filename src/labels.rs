//! Output symbol tables for the two models.

use std::fs;
use std::path::Path;

/// Glyph-classifier classes: Devanagari digits ०–९, then 36 consonants.
///
/// Conjuncts (क्ष, त्र, ज्ञ) are single symbols here even though they span
/// several code points.
pub const DHCD_CLASSES: [&str; 46] = [
    "०", "१", "२", "३", "४", "५", "६", "७", "८", "९",
    "क", "ख", "ग", "घ", "ङ",
    "च", "छ", "ज", "झ", "ञ",
    "ट", "ठ", "ड", "ढ", "ण",
    "त", "थ", "द", "ध", "न",
    "प", "फ", "ब", "भ", "म",
    "य", "र", "ल", "व",
    "श", "ष", "स", "ह",
    "क्ष", "त्र", "ज्ञ",
];

/// Conventional spelling of the sequence model's blank entry.
pub const BLANK_LABEL: &str = "<blank>";

/// Parse a JSON array of strings (`class_labels.json`, `charlist.json`).
pub fn parse_label_json(text: &str) -> Result<Vec<String>, String> {
    serde_json::from_str::<Vec<String>>(text).map_err(|e| format!("label table: {e}"))
}

pub fn read_label_file(path: &Path) -> Result<Vec<String>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    parse_label_json(&text)
}

/// Fixed, immutable label table of the single-glyph classifier.
///
/// Its length is checked against the classifier's output width once, when
/// the model is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Result<Self, String> {
        if labels.is_empty() {
            return Err("label table is empty".into());
        }
        Ok(Self { labels })
    }

    pub fn dhcd() -> Self {
        Self {
            labels: DHCD_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// Ordered symbol list of the sequence model, including the blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<String>,
    blank: usize,
}

impl Alphabet {
    /// Alphabet with the blank at index 0.
    pub fn new(symbols: Vec<String>) -> Result<Self, String> {
        Self::with_blank(symbols, 0)
    }

    pub fn with_blank(symbols: Vec<String>, blank: usize) -> Result<Self, String> {
        if symbols.len() < 2 {
            return Err(format!(
                "alphabet needs a blank plus at least one symbol, got {} entries",
                symbols.len()
            ));
        }
        if blank >= symbols.len() {
            return Err(format!("blank index {blank} outside alphabet of {}", symbols.len()));
        }
        Ok(Self { symbols, blank })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn blank_index(&self) -> usize {
        self.blank
    }

    /// Symbol text for a non-blank index. The blank and any `<blank>`-spelled
    /// padding entry yield `None`.
    pub fn symbol(&self, index: usize) -> Option<&str> {
        if index == self.blank {
            return None;
        }
        self.symbols
            .get(index)
            .map(String::as_str)
            .filter(|s| !s.is_empty() && *s != BLANK_LABEL)
    }
}
