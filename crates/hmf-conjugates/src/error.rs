//! Error taxonomy of the completion engine.
//!
//! Field-level variants (`MissingAutomorphismData`, `UnmatchedConjugateIdeal`)
//! cause one field to be skipped; form-level variants (`InconsistentAlData`,
//! `UnknownLevelLabel`, `NonParallelWeight`) cause one `(form, automorphism)`
//! pair to be skipped. Neither aborts a run. Store and field errors are passed through.

use hmf_field::FieldError;
use hmf_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ConjugationError {
    #[error("no automorphism or ideal data for field {field_label}: {reason}")]
    MissingAutomorphismData { field_label: String, reason: String },

    #[error(
        "field {field_label}: image {image} of ideal {ideal_label} under automorphism \
         {automorphism_index} is not in the canonical ideal list"
    )]
    UnmatchedConjugateIdeal {
        field_label: String,
        ideal_label: String,
        automorphism_index: usize,
        image: String,
    },

    #[error(
        "{label}: AL eigenvalue {value} at {prime} (automorphism {automorphism_index}) \
         does not fit exponent {exponent} in the level"
    )]
    InconsistentAlData {
        label: String,
        automorphism_index: usize,
        prime: String,
        exponent: u32,
        value: String,
    },

    #[error("field {field_label}: level {level_label} has no conjugate under automorphism {automorphism_index}")]
    UnknownLevelLabel {
        field_label: String,
        level_label: String,
        automorphism_index: usize,
    },

    #[error("{label}: weight {weight} is not parallel; conjugation cannot place it")]
    NonParallelWeight { label: String, weight: String },

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ConjugationError>;
