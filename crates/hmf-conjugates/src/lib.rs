//! Galois-conjugate completion for Hilbert modular newforms
//!
//! A newform over a field `F` with a nontrivial automorphism `g` has a
//! conjugate newform: its level is `g(level)`, its Atkin–Lehner primes are
//! the images of the original ones, and its Hecke eigenvalues are the
//! original ones re-indexed by how `g` permutes the primes. Stored datasets
//! are frequently missing some of these conjugates. This crate finds and
//! (optionally) adds them.
//!
//! ```text
//!   FieldRecord ──adapter──► FieldData ──index──► ConjugationIndex
//!                                                   │  conjideals[(label, g)]
//!                                                   │  perm[g][i]
//!                                                   ▼
//!   stored form ──labels──► conjugate label ──present?──► synth ──► insert / stage
//!
//!   audit: (field, level) groups ──pairwise prefix compare──► duplicate pairs
//! ```
//!
//! Per-field state (field, automorphisms, index) is built once and reused for
//! every form of that field; fields are independent and can be processed by
//! separate workers ([`run_fields_parallel`]) sharing only the store handle.

pub mod adapter;
pub mod audit;
pub mod driver;
pub mod error;
pub mod index;
pub mod labels;
pub mod maintenance;
pub mod synth;

#[cfg(test)]
mod test_support;

pub use adapter::{FieldAdapter, FieldData, StoredFieldAdapter};
pub use audit::{check_multiplicity_one, forms_equal, DuplicatePair};
pub use driver::{
    run_fields_parallel, CachedField, CompletionDriver, CompletionOptions, FieldCache, FieldReport,
    FieldStatus, RunSummary,
};
pub use error::{ConjugationError, Result};
pub use index::{build_index, ConjugationIndex, IndexOutcome, PrimePermutation};
pub use labels::{conjugate_level_label, full_label, short_label, Weight};
pub use maintenance::{
    add_numeric_label_suffixes, automorphism_count, check_primes, class_to_int, fix_data_fields,
    fix_labels, fix_one_label, MaintenanceReport,
};
pub use synth::{
    conjugate_form_label, conjugate_hecke, synthesize_conjugate, Conjugate, HeckeConjugate,
};
