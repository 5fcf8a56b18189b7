//! Record store for Hilbert newform data
//!
//! The conjugation engine only needs a handful of primitives from its store:
//!
//! ```text
//!   find(filter)         -> records        (_id, field_label, level_label, label, level_norm range)
//!   find_one(filter)     -> record | none
//!   insert(record)
//!   update(filter, $set, upsert)
//!   field(label)         -> FieldRecord    (polynomial, automorphisms, ideals, primes)
//! ```
//!
//! [`FormStore`] is that seam. [`JsonStore`] is the bundled implementation: a
//! directory of JSONL files loaded at `open`, mutated in memory, and written
//! back atomically at `flush`/`close`. The handle is explicitly constructed
//! and passed around; there is no process-wide connection.
//!
//! [`upload`] holds the batch staging format (`|`-delimited, two header
//! lines, blank separator) used to hand rows to bulk loaders.

pub mod filter;
pub mod json_store;
pub mod record;
pub mod upload;


use std::path::PathBuf;

pub use filter::{FormFilter, FormPatch, NormRange};
pub use json_store::JsonStore;
pub use record::{AlEigenvalue, FieldRecord, HilbertNewform, Tristate};
pub use upload::{read_upload_file, UploadTable, UploadWriter};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record in {path} line {line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot patch {label}: {message}")]
    Patch { label: String, message: String },

    #[error("upload file {path} line {line}: {message}")]
    Upload {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Store interface
// ============================================================================

/// Outcome of [`FormStore::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: usize,
    pub modified: usize,
    pub upserted: Option<u64>,
}

/// The persistent record store.
///
/// Implementations must be shareable between independent per-field workers.
/// Nothing here is transactional: an insert is visible to the next `find`,
/// and two writers inserting the same label both succeed.
pub trait FormStore: Send + Sync {
    fn find(&self, filter: &FormFilter) -> Result<Vec<HilbertNewform>>;

    fn find_one(&self, filter: &FormFilter) -> Result<Option<HilbertNewform>> {
        Ok(self.find(filter)?.into_iter().next())
    }

    fn count(&self, filter: &FormFilter) -> Result<usize> {
        Ok(self.find(filter)?.len())
    }

    /// Insert a new record. Any `id` on the input is replaced; returns the new id.
    fn insert(&self, form: HilbertNewform) -> Result<u64>;

    fn update(&self, filter: &FormFilter, patch: &FormPatch, upsert: bool)
        -> Result<UpdateOutcome>;

    fn field(&self, label: &str) -> Result<Option<FieldRecord>>;

    fn put_field(&self, record: FieldRecord) -> Result<()>;
}
