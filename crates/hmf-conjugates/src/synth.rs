//! Conjugate form synthesis.
//!
//! Given a stored form `f` and an automorphism `g`:
//!
//! ```text
//!   level_label      conjideals[(f.level_label, g)]
//!   level_ideal      [N,n,gen] -> [N,n,g(gen)]
//!   AL_eigenvalues   [(P, e)]  -> [(g(P), e)]        e checked against v_{g(P)}(g(level))
//!   hecke            H         -> H'                 re-indexed by perm[g], maybe truncated
//! ```
//!
//! Everything else is copied, except the store identity.

use hmf_field::{conjugate_descriptor_text, valuation, Automorphism, IdealDescriptor};
use hmf_store::{AlEigenvalue, HilbertNewform, Tristate};

use crate::adapter::FieldData;
use crate::error::{ConjugationError, Result};
use crate::index::{ConjugationIndex, PrimePermutation};
use crate::labels::{conjugate_level_label, full_label, short_label, Weight};

// ============================================================================
// Hecke sequence
// ============================================================================

/// A permuted Hecke sequence and the length of the sequence it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeckeConjugate<T> {
    pub values: Vec<T>,
    pub source_len: usize,
}

impl<T> HeckeConjugate<T> {
    pub fn is_truncated(&self) -> bool {
        self.values.len() < self.source_len
    }
}

/// Re-index `hecke` by `perm`.
///
/// Slot `j` of the result holds `hecke[i]` where `perm[i] = j`. The result
/// stops at the first slot `< hecke.len()` that no source index maps to,
/// since from there on the values are not known.
pub fn conjugate_hecke<T: Clone>(hecke: &[T], perm: &PrimePermutation) -> HeckeConjugate<T> {
    let n = hecke.len();
    let mut attained = vec![false; n];
    for i in 0..n {
        if let Some(j) = perm.image(i).filter(|&j| j < n) {
            attained[j] = true;
        }
    }
    let maxi = attained.iter().position(|a| !a).unwrap_or(n);

    let mut slots: Vec<Option<T>> = vec![None; maxi];
    for (i, value) in hecke.iter().enumerate() {
        if let Some(j) = perm.image(i).filter(|&j| j < maxi) {
            slots[j] = Some(value.clone());
        }
    }
    HeckeConjugate {
        values: slots.into_iter().map_while(|v| v).collect(),
        source_len: n,
    }
}

// ============================================================================
// Whole record
// ============================================================================

/// A synthesized conjugate, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct Conjugate {
    pub form: HilbertNewform,
    pub automorphism_index: usize,
    /// Original Hecke length when the sequence had to be shortened.
    pub truncated_from: Option<usize>,
}

/// The label the conjugate of `form` under automorphism `ig` would carry.
pub fn conjugate_form_label(
    form: &HilbertNewform,
    ig: usize,
    index: &ConjugationIndex,
    degree: usize,
) -> Result<String> {
    let level_label = conjugate_level_label(&form.level_label, ig, index)?;
    let weight = Weight::of_form(form, degree);
    Ok(full_label(
        &form.field_label,
        &weight,
        &level_label,
        &form.label_suffix,
    ))
}

pub fn synthesize_conjugate(
    form: &HilbertNewform,
    g: &Automorphism,
    index: &ConjugationIndex,
    data: &FieldData,
) -> Result<Conjugate> {
    let ig = g.index();
    let field = &data.field;

    let weight = Weight::of_form(form, field.degree());
    if weight.parallel_value().is_none() {
        return Err(ConjugationError::NonParallelWeight {
            label: form.label.clone(),
            weight: weight.to_string(),
        });
    }
    let perm = index
        .permutation(ig)
        .ok_or_else(|| ConjugationError::MissingAutomorphismData {
            field_label: index.field_label().to_string(),
            reason: format!("automorphism {ig} is not indexed"),
        })?;

    if form.base_change() == Tristate::Yes {
        tracing::info!(
            label = %form.label,
            automorphism_index = ig,
            "source is a base change; its conjugate may already be stored"
        );
    }

    let level_label = conjugate_level_label(&form.level_label, ig, index)?;
    let level_ideal = conjugate_descriptor_text(field, &form.level_ideal, g)?;
    let level = IdealDescriptor::parse(field, &level_ideal)?.to_ideal(field)?;

    let mut al_eigenvalues = Vec::with_capacity(form.al_eigenvalues.len());
    for entry in &form.al_eigenvalues {
        let prime_text = conjugate_descriptor_text(field, entry.prime(), g)?;
        let prime = IdealDescriptor::parse(field, &prime_text)?.to_ideal(field)?;
        let exponent = valuation(field, &prime, &level)?;
        let consistent = match (exponent, entry.value().trim().parse::<i64>()) {
            (1, Ok(e)) => e == 1 || e == -1,
            (k, Ok(e)) if k > 1 => e == 0,
            _ => false,
        };
        if !consistent {
            return Err(ConjugationError::InconsistentAlData {
                label: form.label.clone(),
                automorphism_index: ig,
                prime: prime_text,
                exponent,
                value: entry.value().to_string(),
            });
        }
        al_eigenvalues.push(AlEigenvalue(prime_text, entry.value().to_string()));
    }

    let hecke = conjugate_hecke(&form.hecke_eigenvalues, perm);
    let truncated_from = hecke.is_truncated().then_some(hecke.source_len);
    if let Some(len) = truncated_from {
        tracing::warn!(
            label = %form.label,
            automorphism_index = ig,
            from = len,
            to = hecke.values.len(),
            "truncating Hecke eigenvalues: missing conjugate prime"
        );
    }

    let mut conj = form.clone();
    conj.id = None;
    conj.label = full_label(&form.field_label, &weight, &level_label, &form.label_suffix);
    conj.short_label = short_label(&level_label, &form.label_suffix);
    conj.level_label = level_label;
    conj.level_ideal = level_ideal;
    conj.al_eigenvalues = al_eigenvalues;
    conj.hecke_eigenvalues = hecke.values;

    Ok(Conjugate {
        form: conj,
        automorphism_index: ig,
        truncated_from,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{build_index, IndexOutcome};
    use crate::test_support::{form, q_sqrt5, q_sqrt5_record};

    fn setup(data: &FieldData) -> ConjugationIndex {
        match build_index(data).unwrap() {
            IndexOutcome::Built(index) => index,
            IndexOutcome::Skipped(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn full_permutation_keeps_everything() {
        let perm = PrimePermutation::from(vec![0, 1, 2]);
        let out = conjugate_hecke(&[1, -2, 3], &perm);
        assert_eq!(out.values, vec![1, -2, 3]);
        assert!(!out.is_truncated());
    }

    #[test]
    fn first_gap_truncates() {
        let h = [10, 11, 12, 13, 14];
        let perm = PrimePermutation::new(vec![Some(1), Some(0), None, Some(4), Some(3)]);
        let out = conjugate_hecke(&h, &perm);
        assert_eq!(out.values, vec![11, 10]);
        assert!(out.is_truncated());

        // Images at or past the source length do not fill a slot.
        let perm = PrimePermutation::new(vec![Some(0), Some(1), Some(7), Some(3), Some(4)]);
        assert_eq!(conjugate_hecke(&h, &perm).values, vec![10, 11]);
    }

    #[test]
    fn short_permutation_counts_as_unmapped() {
        let perm = PrimePermutation::from(vec![0]);
        assert_eq!(conjugate_hecke(&["a", "b"], &perm).values, vec!["a"]);
        assert!(conjugate_hecke::<i32>(&[], &perm).values.is_empty());
    }

    #[test]
    fn conjugates_split_level() {
        let data = q_sqrt5();
        let index = setup(&data);
        let g = &data.automorphisms[1];
        let f = form(
            "11.1",
            "[11,11,w + 3]",
            "a",
            &["1", "-2", "3", "4", "5", "6", "7"],
            &[("[11,11,w + 3]", "-1")],
        );
        let c = synthesize_conjugate(&f, g, &index, &data).unwrap();
        assert_eq!(c.form.id, None);
        assert_eq!(c.form.label, "2.2.5.1-11.2-a");
        assert_eq!(c.form.short_label, "11.2-a");
        assert_eq!(c.form.level_ideal, "[11,11,-w + 4]");
        assert_eq!(
            c.form.al_eigenvalues,
            vec![AlEigenvalue("[11,11,-w + 4]".into(), "-1".into())]
        );
        assert_eq!(
            c.form.hecke_eigenvalues,
            vec!["1", "-2", "3", "5", "4", "7", "6"]
        );
        assert_eq!(c.truncated_from, None);
        assert_eq!(c.form.dimension, f.dimension);

        // Back again under the inverse: the original label, a prefix of H.
        let back = index.inverse_of(1).unwrap();
        let again = synthesize_conjugate(&c.form, &data.automorphisms[back], &index, &data).unwrap();
        assert_eq!(again.form.label, f.label);
        assert_eq!(again.form.level_ideal, f.level_ideal);
        assert!(f.hecke_eigenvalues.starts_with(&again.form.hecke_eigenvalues));
    }

    #[test]
    fn missing_prime_partner_truncates() {
        let mut record = q_sqrt5_record();
        record.primes.pop();
        let data = FieldData::from_record(&record).unwrap();
        let index = setup(&data);
        let f = form(
            "11.1",
            "[11,11,w + 3]",
            "a",
            &["1", "-2", "3", "4", "5", "6"],
            &[("[11,11,w + 3]", "1")],
        );
        let c = synthesize_conjugate(&f, &data.automorphisms[1], &index, &data).unwrap();
        assert_eq!(c.form.hecke_eigenvalues, vec!["1", "-2", "3", "5", "4"]);
        assert_eq!(c.truncated_from, Some(6));
        // Exponent 1 with eigenvalue +1 carries over unchanged.
        assert_eq!(c.form.al_eigenvalues.len(), 1);
        assert_eq!(c.form.al_eigenvalues[0].prime(), "[11,11,-w + 4]");
        assert_eq!(c.form.al_eigenvalues[0].value(), "1");
    }

    #[test]
    fn higher_exponent_requires_zero() {
        let data = q_sqrt5();
        let index = setup(&data);
        let g = &data.automorphisms[1];

        let bad = form("25.1", "[25,5,5]", "a", &["1"], &[("[5,5,2*w - 1]", "1")]);
        match synthesize_conjugate(&bad, g, &index, &data) {
            Err(ConjugationError::InconsistentAlData { exponent, .. }) => assert_eq!(exponent, 2),
            other => panic!("expected InconsistentAlData, got {other:?}"),
        }

        let good = form("25.1", "[25,5,5]", "a", &["1"], &[("[5,5,2*w - 1]", "0")]);
        let c = synthesize_conjugate(&good, g, &index, &data).unwrap();
        assert_eq!(c.form.al_eigenvalues[0].value(), "0");
        assert_eq!(c.form.level_label, "25.1");
    }

    #[test]
    fn non_parallel_weight_is_refused() {
        let data = q_sqrt5();
        let index = setup(&data);
        let mut f = form("11.1", "[11,11,w + 3]", "a", &["1"], &[]);
        f.weight = Some("[2, 4]".into());
        assert!(matches!(
            synthesize_conjugate(&f, &data.automorphisms[1], &index, &data),
            Err(ConjugationError::NonParallelWeight { .. })
        ));
    }
}
