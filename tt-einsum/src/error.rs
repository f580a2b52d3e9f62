//! Errors raised while declaring, fusing, or evaluating tt-einsums

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Subscripts cannot be parsed, or violate the tt-einsum invariants
    #[error("Invalid subscripts: {0}")]
    InvalidSubscripts(String),

    /// The kind of tt-einsum is unknown, or does not fit the evaluator
    #[error("Unsupported tt-einsum kind: {0}")]
    UnsupportedEinsumKind(String),

    /// Operand chains or cores do not agree with each other or with the subscripts
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The producer's result cannot be spliced into the consumer's argument
    #[error("Cannot splice producer result `{producer}` into argument `{target}`")]
    IncompatibleFusionShape { target: String, producer: String },

    /// The label pool has fewer vacant labels than fusion requires
    #[error("Label alphabet exhausted: {required} vacant labels required, {available} available")]
    AlphabetExhausted { required: usize, available: usize },

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}
