//! Run configuration: a JSON file, overridden by command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hmf_conjugates::CompletionOptions;
use serde::{Deserialize, Serialize};

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmfConfig {
    /// Directory holding `forms.jsonl` and `fields.jsonl`
    pub store_dir: PathBuf,
    /// Default level-norm window
    pub min_level_norm: u64,
    pub max_level_norm: Option<u64>,
    /// Do not synthesize conjugates of base-change forms
    pub skip_base_change: bool,
    /// Worker threads for per-field runs (0: one per core)
    pub jobs: usize,
}

impl Default for HmfConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("./hmf-data"),
            min_level_norm: 0,
            max_level_norm: None,
            skip_base_change: false,
            jobs: 0,
        }
    }
}

impl HmfConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Completion options for this configuration, norm window overridable.
    pub fn completion_options(&self, min_norm: Option<u64>, max_norm: Option<u64>) -> CompletionOptions {
        CompletionOptions {
            skip_base_change: self.skip_base_change,
            ..CompletionOptions::check_only()
        }
        .norms(
            min_norm.unwrap_or(self.min_level_norm),
            max_norm.or(self.max_level_norm),
        )
    }
}
