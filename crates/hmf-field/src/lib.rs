//! Number-field adapter for Hilbert modular form data
//!
//! The stored datasets describe every object of a base field as text:
//!
//! - the field itself by its label (`deg.sig.disc.idx`) and a monic defining
//!   polynomial,
//! - automorphisms by the image of the generator (`-w + 1`),
//! - ideals by a descriptor `[N,n,gen]` (norm, least positive rational
//!   integer in the ideal, one further generator).
//!
//! This crate turns that text into something that can be compared and acted
//! on: elements of the equation order `Z[w]`, automorphisms applied to them,
//! and ideals keyed by the Hermite normal form of their Z-lattice. The HNF key
//! is what makes two descriptors with different generators recognisable as
//! the same ideal.
//!
//! ```text
//!   "[11,11,w + 3]" ──parse──► IdealDescriptor ──span──► Ideal (HNF) ──► IdealKey
//!          ▲                          │
//!          └──────── to_text ◄── conjugate(g)
//! ```

pub mod element;
pub mod field;
pub mod ideal;

pub use element::{format_terms, parse_terms, FieldElement};
pub use field::{Automorphism, FieldLabel, NumberField};
pub use ideal::{
    canonical_ideals, conjugate_descriptor_text, find_variable, valuation, CanonicalIdeal, Ideal,
    IdealDescriptor, IdealKey,
};

/// Errors raised while interpreting stored field data.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("defining polynomial must be monic of degree >= 1, got {0:?}")]
    BadPolynomial(Vec<i64>),

    #[error("cannot parse field element `{text}`: {reason}")]
    BadElement { text: String, reason: String },

    #[error("cannot parse ideal descriptor `{text}`: {reason}")]
    BadIdeal { text: String, reason: String },

    #[error("ideal `{text}` has norm {computed}, descriptor declares {declared}")]
    NormMismatch {
        text: String,
        declared: u64,
        computed: u128,
    },

    #[error("ideal {0} does not span a full-rank lattice")]
    DegenerateIdeal(String),

    #[error("`{image}` is not a root of the defining polynomial of {field_label}")]
    NotAnAutomorphism { field_label: String, image: String },

    #[error("bad field label `{0}` (expected deg.sig.disc.idx)")]
    BadFieldLabel(String),

    #[error("integer overflow in {0}")]
    Overflow(String),
}

pub type Result<T> = std::result::Result<T, FieldError>;
