//! Query filters and `$set`-style patches.

use serde_json::{Map, Value};

use crate::record::HilbertNewform;
use crate::{Result, StoreError};

/// Inclusive level-norm window; an open end is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl NormRange {
    pub fn new(min: u64, max: Option<u64>) -> Self {
        Self {
            min: Some(min),
            max,
        }
    }

    pub fn contains(&self, norm: u64) -> bool {
        self.min.map_or(true, |lo| norm >= lo) && self.max.map_or(true, |hi| norm <= hi)
    }
}

/// Equality on `_id` / `field_label` / `level_label` / `label`, range on `level_norm`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFilter {
    pub id: Option<u64>,
    pub field_label: Option<String>,
    pub level_label: Option<String>,
    pub label: Option<String>,
    pub level_norm: NormRange,
}

impl FormFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_label(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Self::default()
        }
    }

    pub fn by_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_field(field_label: &str) -> Self {
        Self {
            field_label: Some(field_label.to_string()),
            ..Self::default()
        }
    }

    pub fn level(mut self, level_label: &str) -> Self {
        self.level_label = Some(level_label.to_string());
        self
    }

    pub fn norms(mut self, range: NormRange) -> Self {
        self.level_norm = range;
        self
    }

    pub fn matches(&self, form: &HilbertNewform) -> bool {
        self.id.map_or(true, |id| form.id == Some(id))
            && self
                .field_label
                .as_deref()
                .map_or(true, |v| v == form.field_label)
            && self
                .level_label
                .as_deref()
                .map_or(true, |v| v == form.level_label)
            && self.label.as_deref().map_or(true, |v| v == form.label)
            && self.level_norm.contains(form.level_norm)
    }

    /// Equality keys, as the seed document of an upsert.
    fn seed(&self) -> Map<String, Value> {
        let mut doc = Map::new();
        if let Some(v) = &self.field_label {
            doc.insert("field_label".into(), Value::String(v.clone()));
        }
        if let Some(v) = &self.level_label {
            doc.insert("level_label".into(), Value::String(v.clone()));
        }
        if let Some(v) = &self.label {
            doc.insert("label".into(), Value::String(v.clone()));
        }
        doc
    }
}

/// Fields to overwrite on every matching record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormPatch {
    set: Map<String, Value>,
}

impl FormPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.set
    }

    /// Merge into `form`; returns whether anything changed.
    pub fn apply(&self, form: &mut HilbertNewform) -> Result<bool> {
        let Value::Object(mut doc) = serde_json::to_value(&*form)? else {
            return Err(StoreError::Patch {
                label: form.label.clone(),
                message: "record does not serialize to an object".into(),
            });
        };
        let mut changed = false;
        for (k, v) in &self.set {
            if doc.get(k) != Some(v) {
                doc.insert(k.clone(), v.clone());
                changed = true;
            }
        }
        if changed {
            let label = form.label.clone();
            let patched = serde_json::from_value(Value::Object(doc)).map_err(|e| StoreError::Patch {
                label,
                message: e.to_string(),
            })?;
            *form = patched;
        }
        Ok(changed)
    }

    /// The record an upsert inserts when `filter` matched nothing.
    pub fn upsert_document(&self, filter: &FormFilter) -> Result<HilbertNewform> {
        let mut doc = filter.seed();
        for (k, v) in &self.set {
            doc.insert(k.clone(), v.clone());
        }
        let label = filter.label.clone().unwrap_or_default();
        serde_json::from_value(Value::Object(doc)).map_err(|e| StoreError::Patch {
            label,
            message: format!("upsert does not produce a complete record: {e}"),
        })
    }
}
