//! Completion driver: find missing conjugates, optionally build and add them.
//!
//! Per field, once per run:
//!
//! ```text
//!   START ─► BUILD_INDEX ─┬─► SKIP (trivial group / no forms / bad field data)
//!                         └─► for form × nontrivial g:
//!                               CHECK_PRESENT ─┬─► present
//!                                              └─► missing ─► SYNTHESIZE ─► INSERT | STAGE
//! ```
//!
//! Presence is an exact label lookup; there is no second lookup right before
//! the insert. Two runs over the same field at the same time can therefore
//! both insert one conjugate, so callers partition fields across workers.
//! Form-level failures are logged and counted; field-level failures mark the
//! field and the run moves on.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hmf_store::{FormFilter, FormStore, HilbertNewform, NormRange, Tristate, UploadWriter};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::adapter::{FieldAdapter, FieldData};
use crate::error::{ConjugationError, Result};
use crate::index::{build_index, ConjugationIndex, IndexOutcome};
use crate::synth::{conjugate_form_label, synthesize_conjugate};

// ============================================================================
// Options and reports
// ============================================================================

/// What a run is allowed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionOptions {
    pub min_level_norm: u64,
    /// Inclusive; `None` means unbounded.
    pub max_level_norm: Option<u64>,
    /// Synthesize missing conjugates (without storing them).
    pub build_forms: bool,
    /// Insert synthesized conjugates; implies `build_forms`.
    pub insert: bool,
    /// Do not synthesize conjugates of base-change forms.
    pub skip_base_change: bool,
    /// Write synthesized conjugates to this upload file instead of inserting.
    pub stage: Option<PathBuf>,
}

impl CompletionOptions {
    /// Count missing conjugates only.
    pub fn check_only() -> Self {
        Self::default()
    }

    /// Build and insert missing conjugates.
    pub fn add() -> Self {
        Self {
            build_forms: true,
            insert: true,
            ..Self::default()
        }
    }

    pub fn norms(mut self, min: u64, max: Option<u64>) -> Self {
        self.min_level_norm = min;
        self.max_level_norm = max;
        self
    }

    fn builds(&self) -> bool {
        self.build_forms || self.insert || self.stage.is_some()
    }

    fn norm_range(&self) -> NormRange {
        NormRange::new(self.min_level_norm, self.max_level_norm)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldStatus {
    Completed,
    /// Nothing to do (trivial automorphism group, no forms in range).
    Skipped(String),
    /// Field data could not be indexed; no form was touched.
    Failed(String),
}

/// Counts for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    pub field_label: String,
    pub status: FieldStatus,
    pub forms_examined: usize,
    /// Missing (form, automorphism) pairs; a form can count once per automorphism.
    pub missing: usize,
    pub built: usize,
    pub added: usize,
    pub staged: usize,
    pub truncated: usize,
    pub base_change_skipped: usize,
    /// Pairs abandoned on a form-level error, whether or not the conjugate
    /// was already known to be missing.
    pub failed: usize,
}

impl FieldReport {
    fn new(field_label: &str) -> Self {
        Self {
            field_label: field_label.to_string(),
            status: FieldStatus::Completed,
            forms_examined: 0,
            missing: 0,
            built: 0,
            added: 0,
            staged: 0,
            truncated: 0,
            base_change_skipped: 0,
            failed: 0,
        }
    }

    fn with_status(mut self, status: FieldStatus) -> Self {
        self.status = status;
        self
    }
}

/// All fields of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub fields: Vec<FieldReport>,
    /// Rows written to the stage file, if one was configured.
    pub staged_rows: usize,
}

impl RunSummary {
    fn total(&self, count: impl Fn(&FieldReport) -> usize) -> usize {
        self.fields.iter().map(count).sum()
    }

    pub fn forms_examined(&self) -> usize {
        self.total(|r| r.forms_examined)
    }

    pub fn missing(&self) -> usize {
        self.total(|r| r.missing)
    }

    pub fn added(&self) -> usize {
        self.total(|r| r.added)
    }

    pub fn truncated(&self) -> usize {
        self.total(|r| r.truncated)
    }

    pub fn failed(&self) -> usize {
        self.total(|r| r.failed)
    }

    pub fn failed_fields(&self) -> impl Iterator<Item = &FieldReport> {
        self.fields
            .iter()
            .filter(|r| matches!(r.status, FieldStatus::Failed(_)))
    }
}

// ============================================================================
// Run-scoped cache
// ============================================================================

/// Field data and its index, built together.
#[derive(Debug)]
pub struct CachedField {
    pub data: FieldData,
    pub index: IndexOutcome,
}

/// Insert-if-absent cache of per-field state for one run. Failures are not cached.
#[derive(Debug, Default)]
pub struct FieldCache {
    fields: HashMap<String, Arc<CachedField>>,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(
        &mut self,
        field_label: &str,
        adapter: &dyn FieldAdapter,
    ) -> Result<Arc<CachedField>> {
        if let Some(hit) = self.fields.get(field_label) {
            return Ok(Arc::clone(hit));
        }
        let data = adapter.load(field_label)?;
        let index = build_index(&data)?;
        let entry = Arc::new(CachedField { data, index });
        self.fields
            .insert(field_label.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    pub fn contains(&self, field_label: &str) -> bool {
        self.fields.contains_key(field_label)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// Driver
// ============================================================================

enum PairOutcome {
    Missing,
    Built { truncated: bool },
    Added { truncated: bool },
    Staged { truncated: bool },
    BaseChangeSkipped,
}

/// Sequential worker for one or more fields.
pub struct CompletionDriver<'a> {
    store: &'a dyn FormStore,
    adapter: &'a dyn FieldAdapter,
    options: CompletionOptions,
    cache: FieldCache,
    staged: Vec<HilbertNewform>,
    staged_labels: HashSet<String>,
}

impl<'a> CompletionDriver<'a> {
    pub fn new(
        store: &'a dyn FormStore,
        adapter: &'a dyn FieldAdapter,
        options: CompletionOptions,
    ) -> Self {
        Self {
            store,
            adapter,
            options,
            cache: FieldCache::new(),
            staged: Vec::new(),
            staged_labels: HashSet::new(),
        }
    }

    pub fn options(&self) -> &CompletionOptions {
        &self.options
    }

    pub fn cache(&self) -> &FieldCache {
        &self.cache
    }

    /// Process each field in turn, then write the stage file if configured.
    pub fn run(&mut self, field_labels: &[String]) -> Result<RunSummary> {
        let fields = field_labels
            .iter()
            .map(|label| self.run_field(label))
            .collect();
        let staged_rows = match &self.options.stage {
            Some(path) => write_stage(path, std::mem::take(&mut self.staged))?,
            None => 0,
        };
        Ok(RunSummary {
            fields,
            staged_rows,
        })
    }

    /// One field, start to finish. Never fails: problems end up in the report.
    pub fn run_field(&mut self, field_label: &str) -> FieldReport {
        let mut report = FieldReport::new(field_label);
        let range = self.options.norm_range();
        let filter = FormFilter::by_field(field_label).norms(range);
        let forms = match self.store.find(&filter) {
            Ok(forms) => forms,
            Err(err) => {
                tracing::error!(field_label, error = %err, "cannot read forms");
                return report.with_status(FieldStatus::Failed(err.to_string()));
            }
        };
        tracing::info!(
            field_label,
            forms = forms.len(),
            min_level_norm = self.options.min_level_norm,
            max_level_norm = ?self.options.max_level_norm,
            "forms to examine"
        );
        if forms.is_empty() {
            return report.with_status(FieldStatus::Skipped("no forms in norm range".into()));
        }

        let entry = match self.cache.get_or_load(field_label, self.adapter) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(field_label, error = %err, "skipping field");
                return report.with_status(FieldStatus::Failed(err.to_string()));
            }
        };
        let index = match &entry.index {
            IndexOutcome::Built(index) => index,
            IndexOutcome::Skipped(reason) => {
                return report.with_status(FieldStatus::Skipped(reason.clone()));
            }
        };
        tracing::info!(
            field_label,
            automorphisms = index.nontrivial_automorphisms().len(),
            "applying nontrivial automorphisms"
        );

        for form in &forms {
            report.forms_examined += 1;
            tracing::debug!(label = %form.label, "testing form");
            for &ig in index.nontrivial_automorphisms() {
                let degree = entry.data.field.degree();
                let outcome = match self.absent_conjugate(form, ig, index, degree) {
                    Ok(Some(_)) => {
                        report.missing += 1;
                        self.fill_missing(form, ig, index, &entry.data).map(Some)
                    }
                    Ok(None) => Ok(None),
                    Err(err) => Err(err),
                };
                match outcome {
                    Ok(Some(outcome)) => tally(&mut report, outcome),
                    Ok(None) => {}
                    Err(err) => {
                        report.failed += 1;
                        tracing::warn!(
                            label = %form.label,
                            automorphism_index = ig,
                            error = %err,
                            "conjugate skipped"
                        );
                    }
                }
            }
        }

        tracing::info!(
            field_label,
            missing = report.missing,
            added = report.added,
            staged = report.staged,
            "field done"
        );
        report
    }

    /// The conjugate's label if no stored or staged form carries it; the
    /// pair counts as missing only once this returns `Some`.
    fn absent_conjugate(
        &self,
        form: &HilbertNewform,
        ig: usize,
        index: &ConjugationIndex,
        degree: usize,
    ) -> Result<Option<String>> {
        let conj_label = conjugate_form_label(form, ig, index, degree)?;
        if self.staged_labels.contains(&conj_label)
            || self
                .store
                .find_one(&FormFilter::by_label(&conj_label))?
                .is_some()
        {
            return Ok(None);
        }
        tracing::info!(
            label = %form.label,
            conjugate = %conj_label,
            automorphism_index = ig,
            "conjugate not present"
        );
        Ok(Some(conj_label))
    }

    fn fill_missing(
        &mut self,
        form: &HilbertNewform,
        ig: usize,
        index: &ConjugationIndex,
        data: &FieldData,
    ) -> Result<PairOutcome> {
        if !self.options.builds() {
            return Ok(PairOutcome::Missing);
        }
        if self.options.skip_base_change && form.base_change() == Tristate::Yes {
            tracing::info!(label = %form.label, automorphism_index = ig, "base change, not synthesized");
            return Ok(PairOutcome::BaseChangeSkipped);
        }

        let Some(g) = data.automorphisms.get(ig) else {
            return Err(ConjugationError::MissingAutomorphismData {
                field_label: data.label().to_string(),
                reason: format!("automorphism {ig} is not in the field data"),
            });
        };
        let conj = synthesize_conjugate(form, g, index, data)?;
        let truncated = conj.truncated_from.is_some();

        if self.options.stage.is_some() {
            self.staged_labels.insert(conj.form.label.clone());
            self.staged.push(conj.form);
            Ok(PairOutcome::Staged { truncated })
        } else if self.options.insert {
            let label = conj.form.label.clone();
            let id = self.store.insert(conj.form)?;
            tracing::info!(label = %label, id, "added conjugate");
            Ok(PairOutcome::Added { truncated })
        } else {
            Ok(PairOutcome::Built { truncated })
        }
    }
}

fn tally(report: &mut FieldReport, outcome: PairOutcome) {
    let truncated = match outcome {
        PairOutcome::Missing => false,
        PairOutcome::BaseChangeSkipped => {
            report.base_change_skipped += 1;
            false
        }
        PairOutcome::Built { truncated } => {
            report.built += 1;
            truncated
        }
        PairOutcome::Added { truncated } => {
            report.built += 1;
            report.added += 1;
            truncated
        }
        PairOutcome::Staged { truncated } => {
            report.built += 1;
            report.staged += 1;
            truncated
        }
    };
    if truncated {
        report.truncated += 1;
    }
}

/// Write staged conjugates to one upload file.
fn write_stage(path: &Path, forms: Vec<HilbertNewform>) -> Result<usize> {
    let mut writer = UploadWriter::new(path);
    for form in &forms {
        writer.push(form)?;
    }
    Ok(writer.finish()?)
}

/// One driver per field on a rayon pool of `jobs` threads (`0`: rayon's default).
///
/// Drivers share nothing but the store; staged rows from all of them go to
/// one file at the end. A label given twice is run once, so no two workers
/// ever complete the same field.
pub fn run_fields_parallel(
    store: &dyn FormStore,
    adapter: &dyn FieldAdapter,
    field_labels: &[String],
    options: &CompletionOptions,
    jobs: usize,
) -> Result<RunSummary> {
    let mut seen = HashSet::new();
    let unique: Vec<&String> = field_labels
        .iter()
        .filter(|label| seen.insert(label.as_str()))
        .collect();
    if unique.len() < field_labels.len() {
        tracing::info!(
            given = field_labels.len(),
            unique = unique.len(),
            "dropped repeated field labels"
        );
    }

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
    let results: Vec<(FieldReport, Vec<HilbertNewform>)> = pool.install(|| {
        unique
            .par_iter()
            .map(|label| {
                let mut driver = CompletionDriver::new(store, adapter, options.clone());
                let report = driver.run_field(label);
                (report, driver.staged)
            })
            .collect()
    });

    let mut summary = RunSummary::default();
    let mut staged = Vec::new();
    for (report, forms) in results {
        summary.fields.push(report);
        staged.extend(forms);
    }
    if let Some(path) = &options.stage {
        summary.staged_rows = write_stage(path, staged)?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::StoredFieldAdapter;
    use crate::test_support::{form, q_sqrt5_record, strings, FIELD};
    use hmf_store::JsonStore;

    fn seeded() -> JsonStore {
        let store = JsonStore::in_memory();
        store.put_field(q_sqrt5_record()).unwrap();
        store
            .insert(form(
                "11.1",
                "[11,11,w + 3]",
                "a",
                &["1", "-2", "3"],
                &[("[11,11,w + 3]", "-1")],
            ))
            .unwrap();
        store
            .insert(form("4.1", "[4,2,2]", "a", &["0", "1", "2"], &[("[4,2,2]", "1")]))
            .unwrap();
        store
    }

    #[test]
    fn check_only_counts_missing() {
        let store = seeded();
        let adapter = StoredFieldAdapter::new(&store);
        let mut driver = CompletionDriver::new(&store, &adapter, CompletionOptions::check_only());
        let report = driver.run_field(FIELD);
        assert_eq!(report.status, FieldStatus::Completed);
        assert_eq!(report.forms_examined, 2);
        // 4.1-a is its own conjugate.
        assert_eq!(report.missing, 1);
        assert_eq!(report.added, 0);
        assert_eq!(store.len(), 2);
        assert!(driver.cache().contains(FIELD));
    }

    #[test]
    fn add_is_idempotent() {
        let store = seeded();
        let adapter = StoredFieldAdapter::new(&store);
        let labels = strings(&[FIELD]);

        let first = CompletionDriver::new(&store, &adapter, CompletionOptions::add())
            .run(&labels)
            .unwrap();
        assert_eq!(first.added(), 1);
        let added = store
            .find_one(&FormFilter::by_label("2.2.5.1-11.2-a"))
            .unwrap()
            .unwrap();
        assert_eq!(added.hecke_eigenvalues, vec!["1", "-2", "3"]);

        let second = CompletionDriver::new(&store, &adapter, CompletionOptions::add())
            .run(&labels)
            .unwrap();
        assert_eq!(second.missing(), 0);
        assert_eq!(second.added(), 0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn norm_window_limits_forms() {
        let store = seeded();
        let adapter = StoredFieldAdapter::new(&store);
        let options = CompletionOptions::add().norms(5, Some(10));
        let report = CompletionDriver::new(&store, &adapter, options).run_field(FIELD);
        assert!(matches!(report.status, FieldStatus::Skipped(_)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn base_change_policy() {
        let store = JsonStore::in_memory();
        store.put_field(q_sqrt5_record()).unwrap();
        let mut f = form("11.1", "[11,11,w + 3]", "a", &["1"], &[]);
        f.is_base_change = "yes".into();
        store.insert(f).unwrap();
        let adapter = StoredFieldAdapter::new(&store);

        let options = CompletionOptions {
            skip_base_change: true,
            ..CompletionOptions::add()
        };
        let report = CompletionDriver::new(&store, &adapter, options).run_field(FIELD);
        assert_eq!(report.missing, 1);
        assert_eq!(report.base_change_skipped, 1);
        assert_eq!(report.added, 0);

        let report =
            CompletionDriver::new(&store, &adapter, CompletionOptions::add()).run_field(FIELD);
        assert_eq!(report.added, 1);
    }

    #[test]
    fn bad_field_data_fails_only_that_field() {
        let store = seeded();
        let mut broken = q_sqrt5_record();
        broken.label = "2.2.8.1".into();
        broken.polynomial = vec![-2, 0, 1];
        broken.automorphisms = strings(&["w", "-w"]);
        broken.ideals = strings(&["[1,1,1]", "[2,2,w]", "[7,7,w + 3]"]);
        broken.primes = strings(&["[2,2,w]"]);
        store.put_field(broken).unwrap();
        let mut other = form("7.1", "[7,7,w + 3]", "a", &["1"], &[]);
        other.field_label = "2.2.8.1".into();
        other.label = "2.2.8.1-7.1-a".into();
        store.insert(other).unwrap();

        let adapter = StoredFieldAdapter::new(&store);
        let summary = CompletionDriver::new(&store, &adapter, CompletionOptions::add())
            .run(&strings(&["2.2.8.1", FIELD]))
            .unwrap();
        assert!(matches!(summary.fields[0].status, FieldStatus::Failed(_)));
        assert_eq!(summary.fields[1].added, 1);
        assert_eq!(summary.failed_fields().count(), 1);
    }

    #[test]
    fn staging_writes_upload_file() {
        let dir = tempfile::tempdir().unwrap();
        let stage = dir.path().join("conjugates.upload");
        let store = seeded();
        let adapter = StoredFieldAdapter::new(&store);
        let options = CompletionOptions {
            stage: Some(stage.clone()),
            ..CompletionOptions::add()
        };
        let summary = run_fields_parallel(&store, &adapter, &strings(&[FIELD]), &options, 2).unwrap();
        assert_eq!(summary.staged_rows, 1);
        assert_eq!(summary.added(), 0);
        assert_eq!(store.len(), 2);

        let table = hmf_store::read_upload_file(&stage).unwrap();
        let rows = table.records().unwrap();
        assert_eq!(rows[0].label, "2.2.5.1-11.2-a");
    }

    #[test]
    fn staging_keeps_forms_with_different_optional_keys() {
        let dir = tempfile::tempdir().unwrap();
        let stage = dir.path().join("conjugates.upload");
        let store = seeded();
        let mut with_deg = form(
            "19.1",
            "[19,19,w + 4]",
            "a",
            &["2", "0", "-1"],
            &[("[19,19,w + 4]", "1")],
        );
        with_deg.deg = Some(2);
        store.insert(with_deg).unwrap();
        let adapter = StoredFieldAdapter::new(&store);
        let options = CompletionOptions {
            stage: Some(stage.clone()),
            ..CompletionOptions::add()
        };

        let summary = CompletionDriver::new(&store, &adapter, options)
            .run(&strings(&[FIELD]))
            .unwrap();
        assert_eq!(summary.missing(), 2);
        assert_eq!(summary.fields[0].staged, 2);
        assert_eq!(summary.staged_rows, 2);

        let rows = hmf_store::read_upload_file(&stage).unwrap().records().unwrap();
        let mut labels: Vec<_> = rows.iter().map(|r| r.label.as_str()).collect();
        labels.sort_unstable();
        assert_eq!(labels, vec!["2.2.5.1-11.2-a", "2.2.5.1-19.2-a"]);
        let nineteen = rows.iter().find(|r| r.level_label == "19.2").unwrap();
        assert_eq!(nineteen.deg, Some(2));
        let eleven = rows.iter().find(|r| r.level_label == "11.2").unwrap();
        assert_eq!(eleven.deg, None);
    }

    #[test]
    fn unknown_level_is_failed_not_missing() {
        let store = JsonStore::in_memory();
        store.put_field(q_sqrt5_record()).unwrap();
        store
            .insert(form("31.1", "[31,31,w + 6]", "a", &["1"], &[]))
            .unwrap();
        let adapter = StoredFieldAdapter::new(&store);

        let report =
            CompletionDriver::new(&store, &adapter, CompletionOptions::check_only()).run_field(FIELD);
        assert_eq!(report.status, FieldStatus::Completed);
        assert_eq!(report.forms_examined, 1);
        assert_eq!(report.missing, 0);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn repeated_field_label_runs_once() {
        let store = seeded();
        let adapter = StoredFieldAdapter::new(&store);
        let summary = run_fields_parallel(
            &store,
            &adapter,
            &strings(&[FIELD, FIELD, FIELD]),
            &CompletionOptions::add(),
            3,
        )
        .unwrap();
        assert_eq!(summary.fields.len(), 1);
        assert_eq!(summary.added(), 1);
        assert_eq!(store.len(), 3);
    }
}
