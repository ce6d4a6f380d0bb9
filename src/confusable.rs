use std::collections::HashSet;

/// Visually or phonetically close Devanagari pairs accepted as a match.
///
/// Grouped by place of articulation, then cross-group look-alikes.
/// प/फ is intentionally absent: the classifier mixes them up, but they are
/// distinct phonemes a learner must tell apart.
pub const DEFAULT_CONFUSABLE_PAIRS: &[(&str, &str)] = &[
    // Velars
    ("क", "ख"),
    ("ग", "घ"),
    ("ङ", "ञ"),
    // Palatals
    ("च", "छ"),
    ("ज", "झ"),
    // Retroflexes
    ("ट", "ठ"),
    ("ड", "ढ"),
    ("ण", "न"),
    // Dentals
    ("त", "थ"),
    ("द", "ध"),
    // Labials
    ("ब", "भ"),
    // Across groups
    ("ज", "ड"),
    ("ग", "ङ"),
    ("द", "ड"),
    ("ब", "व"),
    ("र", "ड"),
    ("घ", "ध"),
];

/// Undirected equivalence table consulted only when grading an answer.
#[derive(Debug, Clone, Default)]
pub struct ConfusableTable {
    pairs: HashSet<(String, String)>,
}

impl ConfusableTable {
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for (a, b) in pairs {
            table.insert(a, b);
        }
        table
    }

    pub fn builtin() -> Self {
        Self::new(DEFAULT_CONFUSABLE_PAIRS.iter().copied())
    }

    /// Table from config-style `[a, b]` entries.
    pub fn from_pairs(pairs: &[[String; 2]]) -> Self {
        Self::new(pairs.iter().map(|[a, b]| (a.as_str(), b.as_str())))
    }

    pub fn insert(&mut self, a: impl Into<String>, b: impl Into<String>) {
        let (a, b) = (a.into(), b.into());
        self.pairs.insert((b.clone(), a.clone()));
        self.pairs.insert((a, b));
    }

    /// Stored pair count, each direction counted once.
    pub fn len(&self) -> usize {
        self.pairs.iter().filter(|(a, b)| a <= b).count()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `true` when `predicted` is `target` or a listed look-alike of it.
    pub fn accepts(&self, predicted: &str, target: &str) -> bool {
        predicted == target || self.pairs.contains(&(predicted.to_owned(), target.to_owned()))
    }
}
