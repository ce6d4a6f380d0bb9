use serde::Serialize;

use crate::confusable::ConfusableTable;
use crate::recognizer::{NoResultReason, Recognition};

/// Grade of one recognition against the symbol the learner was asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Assessment {
    /// `exact` is false when accepted only through a confusable pair.
    Correct { predicted: String, exact: bool },
    Incorrect { predicted: String },
    NoResult {
        #[serde(flatten)]
        reason: NoResultReason,
    },
}

impl Assessment {
    pub fn is_correct(&self) -> bool {
        matches!(self, Assessment::Correct { .. })
    }
}

/// Compare a recognition with `target`.
///
/// Glyphs are accepted when equal or confusable with the target; sequences
/// must equal it after trimming surrounding whitespace.
pub fn assess(
    recognition: &Recognition,
    target: &str,
    confusables: &ConfusableTable,
) -> Assessment {
    let target = target.trim();
    match recognition {
        Recognition::Glyph { symbol, .. } => {
            let predicted = symbol.clone();
            if symbol == target {
                Assessment::Correct {
                    predicted,
                    exact: true,
                }
            } else if confusables.accepts(symbol, target) {
                Assessment::Correct {
                    predicted,
                    exact: false,
                }
            } else {
                Assessment::Incorrect { predicted }
            }
        }
        Recognition::Sequence { text, .. } => {
            let predicted = text.clone();
            if text.trim() == target {
                Assessment::Correct {
                    predicted,
                    exact: true,
                }
            } else {
                Assessment::Incorrect { predicted }
            }
        }
        Recognition::NoResult { reason } => Assessment::NoResult {
            reason: reason.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::GlyphMethod;

    fn glyph(symbol: &str) -> Recognition {
        Recognition::Glyph {
            symbol: symbol.into(),
            confidence: 0.9,
            method: GlyphMethod::Model { class_index: 0 },
        }
    }

    #[test]
    fn exact_glyph_is_correct() {
        let a = assess(&glyph("क"), "क", &ConfusableTable::builtin());
        assert_eq!(
            a,
            Assessment::Correct {
                predicted: "क".into(),
                exact: true
            }
        );
    }

    #[test]
    fn confusable_glyph_is_accepted_both_ways() {
        let t = ConfusableTable::builtin();
        assert_eq!(
            assess(&glyph("ढ"), "ड", &t),
            Assessment::Correct {
                predicted: "ढ".into(),
                exact: false
            }
        );
        assert!(assess(&glyph("ड"), "ढ", &t).is_correct());
    }

    #[test]
    fn pa_and_pha_are_not_interchangeable() {
        let a = assess(&glyph("फ"), "प", &ConfusableTable::builtin());
        assert_eq!(
            a,
            Assessment::Incorrect {
                predicted: "फ".into()
            }
        );
    }

    #[test]
    fn sequences_compare_exactly() {
        let t = ConfusableTable::builtin();
        let seq = Recognition::Sequence {
            text: "कमल".into(),
            confidence: 0.7,
        };
        assert!(assess(&seq, " कमल ", &t).is_correct());
        // Confusables do not apply inside words.
        assert!(!assess(&seq, "खमल", &t).is_correct());
    }

    #[test]
    fn no_result_carries_reason() {
        let r = Recognition::NoResult {
            reason: NoResultReason::NoReferences,
        };
        let a = assess(&r, "क", &ConfusableTable::builtin());
        assert_eq!(
            a,
            Assessment::NoResult {
                reason: NoResultReason::NoReferences
            }
        );
        assert!(!a.is_correct());
    }
}
