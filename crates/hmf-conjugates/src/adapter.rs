//! Field data as the engine consumes it.

use hmf_field::{
    canonical_ideals, find_variable, Automorphism, CanonicalIdeal, IdealKey, NumberField,
};
use hmf_store::{FieldRecord, FormStore};

use crate::error::{ConjugationError, Result};

/// Everything the engine needs to know about one field.
#[derive(Debug, Clone)]
pub struct FieldData {
    pub field: NumberField,
    /// Full automorphism list in stored order, identity included.
    pub automorphisms: Vec<Automorphism>,
    /// Canonical ideal list (bounded by norm).
    pub ideals: Vec<CanonicalIdeal>,
    /// Canonical prime list; the enumeration the Hecke sequences are indexed by.
    pub primes: Vec<CanonicalIdeal>,
}

impl FieldData {
    pub fn from_record(record: &FieldRecord) -> Result<Self> {
        if record.automorphisms.is_empty() {
            return Err(ConjugationError::MissingAutomorphismData {
                field_label: record.label.clone(),
                reason: "automorphism list is empty".into(),
            });
        }
        if record.ideals.is_empty() {
            return Err(ConjugationError::MissingAutomorphismData {
                field_label: record.label.clone(),
                reason: "ideal list is empty".into(),
            });
        }
        let gen_name = record
            .gen_name
            .clone()
            .unwrap_or_else(|| find_variable(&record.ideals));
        let field = NumberField::new(&record.label, &record.polynomial, &gen_name)?;
        let automorphisms = field.automorphisms(&record.automorphisms)?;
        let ideals = canonical_ideals(&field, &record.ideals)?;
        let primes = canonical_ideals(&field, &record.primes)?;
        Ok(Self {
            field,
            automorphisms,
            ideals,
            primes,
        })
    }

    pub fn label(&self) -> &str {
        self.field.label()
    }

    pub fn nontrivial_automorphisms(&self) -> impl Iterator<Item = &Automorphism> {
        self.automorphisms.iter().filter(|g| !g.is_identity())
    }

    pub fn ideal_by_label(&self, label: &str) -> Option<&CanonicalIdeal> {
        self.ideals.iter().find(|i| i.label == label)
    }

    pub fn ideal_by_key(&self, key: &IdealKey) -> Option<&CanonicalIdeal> {
        self.ideals.iter().find(|i| &i.key == key)
    }
}

/// Source of per-field data.
pub trait FieldAdapter: Send + Sync {
    fn load(&self, field_label: &str) -> Result<FieldData>;
}

/// Reads [`FieldRecord`]s from a store.
pub struct StoredFieldAdapter<'s> {
    store: &'s dyn FormStore,
}

impl<'s> StoredFieldAdapter<'s> {
    pub fn new(store: &'s dyn FormStore) -> Self {
        Self { store }
    }
}

impl FieldAdapter for StoredFieldAdapter<'_> {
    fn load(&self, field_label: &str) -> Result<FieldData> {
        let record =
            self.store
                .field(field_label)?
                .ok_or_else(|| ConjugationError::MissingAutomorphismData {
                    field_label: field_label.to_string(),
                    reason: "no field record in store".into(),
                })?;
        let data = FieldData::from_record(&record)?;
        tracing::debug!(
            field_label,
            automorphisms = data.automorphisms.len(),
            ideals = data.ideals.len(),
            primes = data.primes.len(),
            "loaded field data"
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmf_store::JsonStore;

    fn record(automorphisms: &[&str]) -> FieldRecord {
        FieldRecord {
            label: "2.2.5.1".into(),
            polynomial: vec![-1, -1, 1],
            gen_name: None,
            automorphisms: automorphisms.iter().map(|s| s.to_string()).collect(),
            ideals: vec!["[1,1,1]".into(), "[4,2,2]".into(), "[5,5,2*w - 1]".into()],
            primes: vec!["[4,2,2]".into(), "[5,5,2*w - 1]".into()],
            extra: Default::default(),
        }
    }

    #[test]
    fn loads_from_store() {
        let store = JsonStore::in_memory();
        store.put_field(record(&["w", "-w + 1"])).unwrap();
        let data = StoredFieldAdapter::new(&store).load("2.2.5.1").unwrap();
        assert_eq!(data.field.gen_name(), "w");
        assert_eq!(data.nontrivial_automorphisms().count(), 1);
        assert_eq!(data.ideals[2].label, "5.1");
        assert!(data.ideal_by_label("4.1").is_some());
    }

    #[test]
    fn missing_record_is_reported() {
        let store = JsonStore::in_memory();
        let err = StoredFieldAdapter::new(&store).load("2.2.8.1").unwrap_err();
        assert!(matches!(err, ConjugationError::MissingAutomorphismData { .. }));
    }

    #[test]
    fn empty_automorphism_list_is_missing_data() {
        let err = FieldData::from_record(&record(&[])).unwrap_err();
        assert!(matches!(err, ConjugationError::MissingAutomorphismData { .. }));
    }
}
