//! Conjugation index: how each automorphism moves ideals and primes.
//!
//! ```text
//!   ideals:  I ──g──► g(I) ──key lookup──► label      conjideals[(I.label, g)]
//!   primes:  P_i ──g──► g(P_i) ──key lookup──► j       perm[g][i] = j | unmapped
//! ```
//!
//! Images are located by [`IdealKey`], never by descriptor text, because the
//! generator in a descriptor is not canonical. The ideal table must be total:
//! an image outside the canonical list means the list's norm bound is too
//! small, and the whole field is refused. The prime permutation may be
//! partial: an image beyond the enumerated primes is unmapped.

use std::collections::{BTreeMap, HashMap};

use hmf_field::IdealKey;

use crate::adapter::FieldData;
use crate::error::{ConjugationError, Result};

/// `perm[i] = Some(j)`: the image of the i-th canonical prime is the j-th.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimePermutation(Vec<Option<usize>>);

impl PrimePermutation {
    pub fn new(images: Vec<Option<usize>>) -> Self {
        Self(images)
    }

    /// Image of prime `i`; `None` when unmapped or beyond the enumeration.
    pub fn image(&self, i: usize) -> Option<usize> {
        self.0.get(i).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Option<usize>] {
        &self.0
    }

    /// Undo the permutation; an index whose preimage is unknown stays unmapped.
    pub fn inverse(&self) -> Self {
        let mut out = vec![None; self.0.len()];
        for (i, j) in self.0.iter().enumerate() {
            if let Some(j) = *j {
                if j < out.len() {
                    out[j] = Some(i);
                }
            }
        }
        Self(out)
    }
}

impl From<Vec<usize>> for PrimePermutation {
    fn from(images: Vec<usize>) -> Self {
        Self(images.into_iter().map(Some).collect())
    }
}

/// The fully built per-field index. Never exposed half-built.
#[derive(Debug, Clone)]
pub struct ConjugationIndex {
    field_label: String,
    conjideals: HashMap<(String, usize), String>,
    perms: BTreeMap<usize, PrimePermutation>,
    nontrivial: Vec<usize>,
}

impl ConjugationIndex {
    pub fn field_label(&self) -> &str {
        &self.field_label
    }

    /// `conjideals[(label, ig)]`.
    pub fn conjugate_label(&self, ideal_label: &str, ig: usize) -> Option<&str> {
        self.conjideals
            .get(&(ideal_label.to_string(), ig))
            .map(String::as_str)
    }

    pub fn permutation(&self, ig: usize) -> Option<&PrimePermutation> {
        self.perms.get(&ig)
    }

    /// Indices (in the full automorphism list) of the non-identity automorphisms.
    pub fn nontrivial_automorphisms(&self) -> &[usize] {
        &self.nontrivial
    }

    /// The automorphism whose action undoes `ig` on every indexed ideal and prime.
    pub fn inverse_of(&self, ig: usize) -> Option<usize> {
        let forward = self.perms.get(&ig)?;
        self.perms.iter().find_map(|(&ih, backward)| {
            let ideals_return = self
                .conjideals
                .iter()
                .filter(|((_, g), _)| *g == ig)
                .all(|((label, _), image)| {
                    self.conjugate_label(image, ih) == Some(label.as_str())
                });
            let primes_return = forward
                .as_slice()
                .iter()
                .enumerate()
                .all(|(i, j)| j.map_or(true, |j| backward.image(j).map_or(true, |back| back == i)));
            (ideals_return && primes_return).then_some(ih)
        })
    }
}

/// Result of [`build_index`].
#[derive(Debug, Clone)]
pub enum IndexOutcome {
    /// Nothing to do for this field (not an error).
    Skipped(String),
    Built(ConjugationIndex),
}

pub fn build_index(data: &FieldData) -> Result<IndexOutcome> {
    let field_label = data.label().to_string();
    if data.nontrivial_automorphisms().next().is_none() {
        tracing::info!(field_label = %field_label, "no nontrivial automorphisms");
        return Ok(IndexOutcome::Skipped(
            "automorphism group is trivial".to_string(),
        ));
    }

    let ideal_labels: HashMap<&IdealKey, &str> = data
        .ideals
        .iter()
        .map(|i| (&i.key, i.label.as_str()))
        .collect();
    let prime_positions: HashMap<&IdealKey, usize> = data
        .primes
        .iter()
        .enumerate()
        .map(|(pos, p)| (&p.key, pos))
        .collect();

    let mut conjideals = HashMap::new();
    let mut perms = BTreeMap::new();
    for g in &data.automorphisms {
        let ig = g.index();
        for entry in &data.ideals {
            let image = entry.descriptor.conjugate(&data.field, g);
            let key = image.to_ideal(&data.field)?.key();
            let Some(label) = ideal_labels.get(&key) else {
                return Err(ConjugationError::UnmatchedConjugateIdeal {
                    field_label,
                    ideal_label: entry.label.clone(),
                    automorphism_index: ig,
                    image: image.to_text(&data.field),
                });
            };
            conjideals.insert((entry.label.clone(), ig), label.to_string());
        }

        let mut images = Vec::with_capacity(data.primes.len());
        for prime in &data.primes {
            let image = prime.descriptor.conjugate(&data.field, g);
            let key = image.to_ideal(&data.field)?.key();
            images.push(prime_positions.get(&key).copied());
        }
        let unmapped = images.iter().filter(|j| j.is_none()).count();
        if unmapped > 0 {
            tracing::debug!(
                field_label = %field_label,
                automorphism_index = ig,
                unmapped,
                "prime images beyond the enumerated primes"
            );
        }
        perms.insert(ig, PrimePermutation(images));
    }

    let nontrivial = data.nontrivial_automorphisms().map(|g| g.index()).collect();
    tracing::debug!(
        field_label = %field_label,
        ideals = data.ideals.len(),
        primes = data.primes.len(),
        "built conjugation index"
    );
    Ok(IndexOutcome::Built(ConjugationIndex {
        field_label,
        conjideals,
        perms,
        nontrivial,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{q_sqrt5, q_sqrt5_record, strings};

    fn built(data: &FieldData) -> ConjugationIndex {
        match build_index(data).unwrap() {
            IndexOutcome::Built(index) => index,
            IndexOutcome::Skipped(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn swaps_split_primes() {
        let index = built(&q_sqrt5());
        assert_eq!(index.nontrivial_automorphisms(), &[1]);
        assert_eq!(index.conjugate_label("11.1", 1), Some("11.2"));
        assert_eq!(index.conjugate_label("19.2", 1), Some("19.1"));
        assert_eq!(index.conjugate_label("20.1", 1), Some("20.1"));
        assert_eq!(index.conjugate_label("11.1", 0), Some("11.1"));
        assert_eq!(
            index.permutation(1).unwrap(),
            &PrimePermutation::from(vec![0, 1, 2, 4, 3, 6, 5])
        );
        assert_eq!(index.inverse_of(1), Some(1));
        assert_eq!(index.inverse_of(0), Some(0));
    }

    #[test]
    fn missing_prime_partner_is_unmapped() {
        let mut record = q_sqrt5_record();
        record.primes.pop();
        let data = FieldData::from_record(&record).unwrap();
        let index = built(&data);
        let perm = index.permutation(1).unwrap();
        assert_eq!(perm.image(5), None);
        assert_eq!(perm.image(3), Some(4));
    }

    #[test]
    fn missing_ideal_partner_refuses_field() {
        let mut record = q_sqrt5_record();
        record.ideals.retain(|i| i != "[11,11,w - 4]");
        let data = FieldData::from_record(&record).unwrap();
        match build_index(&data) {
            Err(ConjugationError::UnmatchedConjugateIdeal {
                ideal_label,
                automorphism_index,
                ..
            }) => {
                assert_eq!(ideal_label, "11.1");
                assert_eq!(automorphism_index, 1);
            }
            other => panic!("expected UnmatchedConjugateIdeal, got {other:?}"),
        }
    }

    #[test]
    fn trivial_group_is_skipped() {
        let mut record = q_sqrt5_record();
        record.automorphisms = strings(&["w"]);
        let data = FieldData::from_record(&record).unwrap();
        assert!(matches!(
            build_index(&data).unwrap(),
            IndexOutcome::Skipped(_)
        ));
    }

    #[test]
    fn inverse_permutation() {
        let perm = PrimePermutation::new(vec![Some(1), Some(0), None]);
        assert_eq!(
            perm.inverse(),
            PrimePermutation::new(vec![Some(1), Some(0), None])
        );
        let cycle = PrimePermutation::from(vec![1, 2, 0]);
        assert_eq!(cycle.inverse(), PrimePermutation::from(vec![2, 0, 1]));
    }
}
