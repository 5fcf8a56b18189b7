//! One-off repairs and checks on stored data.
//!
//! Every repair walks the forms in a level-norm window, computes a `$set`
//! patch per form, logs it, and only writes it when `apply` is set. The
//! returned [`MaintenanceReport`] has the same counts either way.

use hmf_field::FieldLabel;
use hmf_store::{FormFilter, FormPatch, FormStore, HilbertNewform, NormRange};
use serde::Serialize;

use crate::adapter::FieldData;
use crate::error::Result;

/// Counts from one maintenance pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub examined: usize,
    /// Forms whose patch changes something.
    pub changed: usize,
    /// Forms left alone because their data could not be interpreted.
    pub skipped: usize,
    /// Whether patches were written.
    pub applied: bool,
    /// Label of the form that stopped the pass, if one did.
    pub stopped_at: Option<String>,
}

// ============================================================================
// Field checks
// ============================================================================

/// Labels of primes whose ideal differs from the ideal with the same label.
pub fn check_primes(data: &FieldData) -> Vec<String> {
    data.primes
        .iter()
        .filter(|p| {
            data.ideal_by_label(&p.label)
                .map_or(true, |ideal| ideal.key != p.key)
        })
        .map(|p| p.label.clone())
        .collect()
}

/// Size of the automorphism group, identity included.
pub fn automorphism_count(data: &FieldData) -> usize {
    data.automorphisms.len()
}

// ============================================================================
// Form repairs
// ============================================================================

fn forms_in(store: &dyn FormStore, range: NormRange) -> Result<Vec<HilbertNewform>> {
    let forms = store.find(&FormFilter::all().norms(range))?;
    tracing::info!(
        forms = forms.len(),
        min_level_norm = ?range.min,
        max_level_norm = ?range.max,
        "forms to examine"
    );
    Ok(forms)
}

/// Record the patch for `form`; write it when `apply` is set.
fn patch_form(
    store: &dyn FormStore,
    form: &HilbertNewform,
    patch: &FormPatch,
    apply: bool,
    report: &mut MaintenanceReport,
) -> Result<()> {
    if patch.is_empty() || !patch.apply(&mut form.clone())? {
        return Ok(());
    }
    report.changed += 1;
    tracing::info!(label = %form.label, patch = ?patch.fields(), "fix");
    if apply {
        let filter = match form.id {
            Some(id) => FormFilter::by_id(id),
            None => FormFilter::by_label(&form.label),
        };
        store.update(&filter, patch, false)?;
    }
    Ok(())
}

/// Fill `deg`/`disc` from the field label and settle `"yes?"` flags to `"yes"`.
pub fn fix_data_fields(
    store: &dyn FormStore,
    range: NormRange,
    apply: bool,
) -> Result<MaintenanceReport> {
    let mut report = MaintenanceReport {
        applied: apply,
        ..MaintenanceReport::default()
    };
    for form in forms_in(store, range)? {
        report.examined += 1;
        let field: FieldLabel = match form.field_label.parse() {
            Ok(field) => field,
            Err(err) => {
                tracing::warn!(label = %form.label, error = %err, "skipped");
                report.skipped += 1;
                continue;
            }
        };
        let mut patch = FormPatch::new()
            .set("deg", field.degree)
            .set("disc", field.discriminant);
        if form.is_cm == "yes?" {
            patch = patch.set("is_CM", "yes");
        }
        if form.is_base_change == "yes?" {
            patch = patch.set("is_base_change", "yes");
        }
        patch_form(store, &form, &patch, apply, &mut report)?;
    }
    Ok(report)
}

/// Shift the first letter of a two-letter suffix (`aa` -> `ba`, or back).
///
/// Other lengths, and shifts that would leave `a..=z`, return the suffix unchanged.
pub fn fix_one_label(suffix: &str, reverse: bool) -> String {
    let mut chars = suffix.chars();
    let (Some(first), Some(second), None) = (chars.next(), chars.next(), chars.next()) else {
        return suffix.to_string();
    };
    let shifted = if reverse {
        (first as u8).checked_sub(1)
    } else {
        (first as u8).checked_add(1)
    };
    match shifted.map(char::from) {
        Some(c) if first.is_ascii_lowercase() && c.is_ascii_lowercase() => format!("{c}{second}"),
        _ => suffix.to_string(),
    }
}

fn replace_suffix(text: &str, old: &str, new: &str) -> String {
    match text.strip_suffix(old) {
        Some(stem) => format!("{stem}{new}"),
        None => text.replace(old, new),
    }
}

/// Re-letter two-letter suffixes. Stops at the first form whose label does
/// not end in its own suffix.
pub fn fix_labels(
    store: &dyn FormStore,
    range: NormRange,
    reverse: bool,
    apply: bool,
) -> Result<MaintenanceReport> {
    let mut report = MaintenanceReport {
        applied: apply,
        ..MaintenanceReport::default()
    };
    for form in forms_in(store, range)? {
        report.examined += 1;
        let old = form.label_suffix.as_str();
        if old.chars().count() != 2 {
            continue;
        }
        if !form.label.ends_with(old) {
            tracing::error!(label = %form.label, suffix = old, "incorrect label_suffix; stopping");
            report.stopped_at = Some(form.label.clone());
            break;
        }
        let new = fix_one_label(old, reverse);
        let patch = FormPatch::new()
            .set("label_suffix", new.as_str())
            .set("label", replace_suffix(&form.label, old, &new))
            .set("short_label", replace_suffix(&form.short_label, old, &new));
        patch_form(store, &form, &patch, apply, &mut report)?;
    }
    Ok(report)
}

/// Base-26 value of a letter suffix: `a` -> 0, `z` -> 25, `ba` -> 26.
pub fn class_to_int(suffix: &str) -> Option<u64> {
    if suffix.is_empty() {
        return None;
    }
    suffix.chars().try_fold(0u64, |acc, c| {
        c.is_ascii_lowercase()
            .then(|| acc.checked_mul(26)?.checked_add(c as u64 - 'a' as u64))
            .flatten()
    })
}

/// Set `label_nsuffix` from the letter suffix.
pub fn add_numeric_label_suffixes(
    store: &dyn FormStore,
    range: NormRange,
    apply: bool,
) -> Result<MaintenanceReport> {
    let mut report = MaintenanceReport {
        applied: apply,
        ..MaintenanceReport::default()
    };
    for form in forms_in(store, range)? {
        report.examined += 1;
        let Some(n) = class_to_int(&form.label_suffix) else {
            tracing::warn!(label = %form.label, suffix = %form.label_suffix, "not a letter suffix");
            report.skipped += 1;
            continue;
        };
        let patch = FormPatch::new().set("label_nsuffix", n);
        patch_form(store, &form, &patch, apply, &mut report)?;
    }
    Ok(report)
}
