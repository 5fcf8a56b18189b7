//! Multiplicity-one audit.
//!
//! Two newforms of the same field and level should never share their Hecke
//! eigenvalues. Forms whose sequences agree on the common prefix are
//! reported as candidate duplicates; nothing is changed.

use std::collections::BTreeMap;

use hmf_store::{FormFilter, FormStore, HilbertNewform};
use serde::Serialize;

use crate::error::Result;

/// Two forms at one level whose eigenvalues agree on their common prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicatePair {
    pub field_label: String,
    pub level_label: String,
    pub first: String,
    pub second: String,
    /// Number of eigenvalues compared.
    pub compared: usize,
}

/// Agreement on the first `min(len f, len g)` eigenvalues.
pub fn forms_equal(f: &HilbertNewform, g: &HilbertNewform) -> bool {
    f.hecke_eigenvalues
        .iter()
        .zip(&g.hecke_eigenvalues)
        .all(|(a, b)| a == b)
}

pub fn check_multiplicity_one(
    store: &dyn FormStore,
    field_label: &str,
) -> Result<Vec<DuplicatePair>> {
    let mut by_level: BTreeMap<(u64, String), Vec<HilbertNewform>> = BTreeMap::new();
    for form in store.find(&FormFilter::by_field(field_label))? {
        by_level
            .entry((form.level_norm, form.level_label.clone()))
            .or_default()
            .push(form);
    }

    let mut pairs = Vec::new();
    for ((_, level_label), forms) in &by_level {
        for (i, f) in forms.iter().enumerate() {
            for g in &forms[i + 1..] {
                if forms_equal(f, g) {
                    tracing::warn!(
                        field_label,
                        first = %f.label,
                        second = %g.label,
                        "duplicates"
                    );
                    pairs.push(DuplicatePair {
                        field_label: field_label.to_string(),
                        level_label: level_label.clone(),
                        first: f.label.clone(),
                        second: g.label.clone(),
                        compared: f.hecke_eigenvalues.len().min(g.hecke_eigenvalues.len()),
                    });
                }
            }
        }
    }
    tracing::info!(field_label, duplicates = pairs.len(), "multiplicity-one check done");
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::form;
    use hmf_store::JsonStore;

    #[test]
    fn shared_prefix_is_a_duplicate() {
        let store = JsonStore::in_memory();
        store
            .insert(form("11.1", "[11,11,w + 3]", "a", &["1", "-2", "3", "4"], &[]))
            .unwrap();
        store
            .insert(form("11.1", "[11,11,w + 3]", "b", &["1", "-2", "3", "4", "9"], &[]))
            .unwrap();
        store
            .insert(form("11.1", "[11,11,w + 3]", "c", &["1", "-2", "3", "5"], &[]))
            .unwrap();
        // Same eigenvalues, different level: not compared.
        store
            .insert(form("11.2", "[11,11,w - 4]", "a", &["1", "-2", "3", "4"], &[]))
            .unwrap();

        let pairs = check_multiplicity_one(&store, "2.2.5.1").unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].first, "2.2.5.1-11.1-a");
        assert_eq!(pairs[0].second, "2.2.5.1-11.1-b");
        assert_eq!(pairs[0].compared, 4);
    }

    #[test]
    fn empty_sequences_agree() {
        let f = form("11.1", "[11,11,w + 3]", "a", &[], &[]);
        let g = form("11.1", "[11,11,w + 3]", "b", &["1"], &[]);
        assert!(forms_equal(&f, &g));
    }
}
