//! Directory-backed JSONL store.
//!
//! Layout:
//!
//! ```text
//!   <dir>/forms.jsonl    one HilbertNewform per line
//!   <dir>/fields.jsonl   one FieldRecord per line
//! ```
//!
//! Everything is loaded at [`JsonStore::open`]; mutations stay in memory
//! until [`JsonStore::flush`], which rewrites each file through a temporary
//! sibling and a rename so a crash never leaves a half-written file.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::filter::{FormFilter, FormPatch};
use crate::record::{FieldRecord, HilbertNewform};
use crate::{FormStore, Result, StoreError, UpdateOutcome};

const FORMS_FILE: &str = "forms.jsonl";
const FIELDS_FILE: &str = "fields.jsonl";

#[derive(Default)]
struct StoreState {
    forms: Vec<HilbertNewform>,
    /// label -> positions in `forms` (duplicates are possible).
    by_label: HashMap<String, Vec<usize>>,
    fields: BTreeMap<String, FieldRecord>,
    next_id: u64,
    dirty: bool,
}

impl StoreState {
    fn push_form(&mut self, mut form: HilbertNewform) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        form.id = Some(id);
        self.by_label
            .entry(form.label.clone())
            .or_default()
            .push(self.forms.len());
        self.forms.push(form);
        id
    }

    fn reindex(&mut self) {
        self.by_label.clear();
        for (i, f) in self.forms.iter().enumerate() {
            self.by_label.entry(f.label.clone()).or_default().push(i);
        }
    }

    fn matching(&self, filter: &FormFilter) -> Vec<usize> {
        match &filter.label {
            Some(label) => self
                .by_label
                .get(label)
                .map(|ix| {
                    ix.iter()
                        .copied()
                        .filter(|&i| filter.matches(&self.forms[i]))
                        .collect()
                })
                .unwrap_or_default(),
            None => (0..self.forms.len())
                .filter(|&i| filter.matches(&self.forms[i]))
                .collect(),
        }
    }
}

/// The bundled [`FormStore`] implementation.
pub struct JsonStore {
    dir: Option<PathBuf>,
    state: RwLock<StoreState>,
}

impl JsonStore {
    /// Open (creating if needed) a store directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let forms: Vec<HilbertNewform> = read_jsonl(&dir.join(FORMS_FILE))?;
        let fields: Vec<FieldRecord> = read_jsonl(&dir.join(FIELDS_FILE))?;

        let mut state = StoreState {
            next_id: forms.iter().filter_map(|f| f.id).max().map_or(0, |m| m + 1),
            forms,
            fields: fields.into_iter().map(|f| (f.label.clone(), f)).collect(),
            ..StoreState::default()
        };
        // Records written by other tools may lack an id.
        for f in state.forms.iter_mut() {
            if f.id.is_none() {
                f.id = Some(state.next_id);
                state.next_id += 1;
                state.dirty = true;
            }
        }
        state.reindex();

        tracing::debug!(
            dir = %dir.display(),
            forms = state.forms.len(),
            fields = state.fields.len(),
            "opened store"
        );
        Ok(Self {
            dir: Some(dir),
            state: RwLock::new(state),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn len(&self) -> usize {
        self.state.read().forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels of every stored field.
    pub fn field_labels(&self) -> Vec<String> {
        self.state.read().fields.keys().cloned().collect()
    }

    /// Write pending changes back to disk.
    pub fn flush(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let mut state = self.state.write();
        if !state.dirty {
            return Ok(());
        }
        write_jsonl(&dir.join(FORMS_FILE), state.forms.iter())?;
        write_jsonl(&dir.join(FIELDS_FILE), state.fields.values())?;
        state.dirty = false;
        tracing::debug!(dir = %dir.display(), forms = state.forms.len(), "flushed store");
        Ok(())
    }

    /// Flush and release the handle.
    pub fn close(self) -> Result<()> {
        self.flush()
    }
}

impl FormStore for JsonStore {
    fn find(&self, filter: &FormFilter) -> Result<Vec<HilbertNewform>> {
        let state = self.state.read();
        Ok(state
            .matching(filter)
            .into_iter()
            .map(|i| state.forms[i].clone())
            .collect())
    }

    fn find_one(&self, filter: &FormFilter) -> Result<Option<HilbertNewform>> {
        let state = self.state.read();
        Ok(state
            .matching(filter)
            .first()
            .map(|&i| state.forms[i].clone()))
    }

    fn count(&self, filter: &FormFilter) -> Result<usize> {
        Ok(self.state.read().matching(filter).len())
    }

    fn insert(&self, form: HilbertNewform) -> Result<u64> {
        let mut state = self.state.write();
        let id = state.push_form(form);
        state.dirty = true;
        Ok(id)
    }

    fn update(
        &self,
        filter: &FormFilter,
        patch: &FormPatch,
        upsert: bool,
    ) -> Result<UpdateOutcome> {
        let mut state = self.state.write();
        let hits = state.matching(filter);
        let mut outcome = UpdateOutcome {
            matched: hits.len(),
            ..UpdateOutcome::default()
        };

        if hits.is_empty() {
            if upsert {
                let doc = patch.upsert_document(filter)?;
                outcome.upserted = Some(state.push_form(doc));
                state.dirty = true;
            }
            return Ok(outcome);
        }

        let mut relabelled = false;
        for i in hits {
            let before = state.forms[i].label.clone();
            if patch.apply(&mut state.forms[i])? {
                outcome.modified += 1;
                relabelled |= state.forms[i].label != before;
            }
        }
        if outcome.modified > 0 {
            state.dirty = true;
        }
        if relabelled {
            state.reindex();
        }
        Ok(outcome)
    }

    fn field(&self, label: &str) -> Result<Option<FieldRecord>> {
        Ok(self.state.read().fields.get(label).cloned())
    }

    fn put_field(&self, record: FieldRecord) -> Result<()> {
        let mut state = self.state.write();
        state.fields.insert(record.label.clone(), record);
        state.dirty = true;
        Ok(())
    }
}

// ============================================================================
// JSONL helpers
// ============================================================================

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        out.push(value);
    }
    Ok(out)
}

fn write_jsonl<'a, T: Serialize + 'a>(
    path: &Path,
    items: impl Iterator<Item = &'a T>,
) -> Result<()> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp).map_err(io_err)?);
        for item in items {
            serde_json::to_writer(&mut out, item)?;
            out.write_all(b"\n").map_err(io_err)?;
        }
        out.flush().map_err(io_err)?;
    }
    fs::rename(&tmp, path).map_err(io_err)
}
