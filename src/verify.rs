use crate::plan::ExpectedResultTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No expected value is known for this routine and size
    Unchecked,
    Match,
    Mismatch { expected: String },
}

impl Verdict {
    pub fn as_verified(&self) -> Option<bool> {
        match self {
            Verdict::Unchecked => None,
            Verdict::Match => Some(true),
            Verdict::Mismatch { .. } => Some(false),
        }
    }
}

/// Compare a routine's return value with its family's canonical output.
///
/// Surrounding whitespace is ignored on both sides.
pub fn check(expected: &ExpectedResultTable, routine: &str, size: u64, observed: &str) -> Verdict {
    match expected.lookup(routine, size) {
        None => Verdict::Unchecked,
        Some(want) if want.trim() == observed.trim() => Verdict::Match,
        Some(want) => Verdict::Mismatch {
            expected: want.to_string(),
        },
    }
}
