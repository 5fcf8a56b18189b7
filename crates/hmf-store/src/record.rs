//! Typed records, field-for-field compatible with the stored documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Yes / no / unknown classification of the stored flag strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tristate {
    Yes,
    No,
    Unknown,
}

impl Tristate {
    /// `yes`, `yes?` and `yes,<detail>` count as yes; only `no` counts as no.
    pub fn classify(text: &str) -> Self {
        if text.starts_with("yes") {
            Tristate::Yes
        } else if text == "no" {
            Tristate::No
        } else {
            Tristate::Unknown
        }
    }
}

fn unknown_flag() -> String {
    "?".to_string()
}

/// One Atkin–Lehner entry: `[prime descriptor, eigenvalue]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlEigenvalue(pub String, pub String);

impl AlEigenvalue {
    pub fn prime(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> &str {
        &self.1
    }
}

/// A stored Hilbert modular newform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HilbertNewform {
    /// Store-assigned identity; never copied into a derived record.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub field_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deg: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc: Option<u64>,
    pub level_label: String,
    /// `[N,n,gen]`
    pub level_ideal: String,
    pub level_norm: u64,
    pub label_suffix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_nsuffix: Option<u64>,
    pub short_label: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_weight: Option<u32>,
    pub dimension: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hecke_polynomial: Option<String>,
    /// Indexed 1:1 with the field's canonical prime list.
    pub hecke_eigenvalues: Vec<String>,
    #[serde(rename = "AL_eigenvalues", default)]
    pub al_eigenvalues: Vec<AlEigenvalue>,
    #[serde(rename = "is_CM", default = "unknown_flag")]
    pub is_cm: String,
    #[serde(default = "unknown_flag")]
    pub is_base_change: String,
    /// Keys this schema does not know about, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HilbertNewform {
    pub fn base_change(&self) -> Tristate {
        Tristate::classify(&self.is_base_change)
    }

    pub fn cm(&self) -> Tristate {
        Tristate::classify(&self.is_cm)
    }
}

/// Per-field data: defining polynomial, automorphisms, ideal and prime lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub label: String,
    /// Monic defining polynomial, constant term first.
    pub polynomial: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen_name: Option<String>,
    /// Images of the generator, identity included.
    #[serde(default)]
    pub automorphisms: Vec<String>,
    /// `[N,n,gen]` strings in canonical order.
    pub ideals: Vec<String>,
    /// Prime ideals, same ordering convention; a sub-list of `ideals`.
    pub primes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
