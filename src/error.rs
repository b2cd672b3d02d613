//! Error types.
//!
//! Permissive broadcasting never fails: mismatched shapes and non-numeric
//! leaves degrade to NaN, infinities or pass-through. Strict broadcasting
//! reports those same situations as a [`BroadcastError`].

use thiserror::Error;

/// Which operand of a binary operation an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// A shape or type problem found by strict broadcasting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BroadcastError {
    /// A flattened operand holds a leaf that is not a number.
    #[error("Non-numeric leaf in {operand} operand at index {index}")]
    NonNumericLeaf { operand: Side, index: usize },

    /// Element-wise operands flatten to different lengths.
    #[error("Length mismatch: left has {left} leaves, right has {right}")]
    LengthMismatch { left: usize, right: usize },

    /// No broadcasting rule covers this pair of operand kinds.
    #[error("Unsupported operands: {left} and {right}")]
    UnsupportedOperands {
        left: &'static str,
        right: &'static str,
    },
}

/// A variance kind name that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown variance kind: {0} (expected unbiased, biased or population)")]
pub struct ParseKindError(pub String);
