//! Ideals: stored descriptors, HNF lattices, canonical lists.
//!
//! A descriptor `[N,n,gen]` names the ideal `(n, gen)` of `Z[w]`. Different
//! descriptors (different `gen`) can name the same ideal, so identity is
//! decided on the Hermite normal form of the ideal's Z-lattice, never on the
//! descriptor text.

use crate::element::FieldElement;
use crate::field::{Automorphism, NumberField};
use crate::{FieldError, Result};

// ============================================================================
// Descriptors
// ============================================================================

/// The stored `[N,n,gen]` form of an ideal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdealDescriptor {
    /// Absolute norm.
    pub norm: u64,
    /// Least positive rational integer in the ideal.
    pub min_integer: u64,
    pub generator: FieldElement,
}

impl IdealDescriptor {
    pub fn parse(field: &NumberField, text: &str) -> Result<Self> {
        let bad = |reason: &str| FieldError::BadIdeal {
            text: text.to_string(),
            reason: reason.to_string(),
        };
        let inner = text
            .trim()
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| bad("expected `[N,n,gen]`"))?;
        let mut parts = inner.splitn(3, ',');
        let (Some(norm), Some(min_integer), Some(generator)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(bad("expected three comma-separated components"));
        };
        Ok(Self {
            norm: norm.trim().parse().map_err(|_| bad("norm is not an integer"))?,
            min_integer: min_integer
                .trim()
                .parse()
                .map_err(|_| bad("second component is not an integer"))?,
            generator: field.parse_element(generator)?,
        })
    }

    /// Re-encode as `[N,n,gen]`, no spaces after the commas.
    pub fn to_text(&self, field: &NumberField) -> String {
        format!(
            "[{},{},{}]",
            self.norm,
            self.min_integer,
            field.format_element(&self.generator)
        )
    }

    /// Apply `g`: norm and least integer are invariant, only the generator moves.
    pub fn conjugate(&self, field: &NumberField, g: &Automorphism) -> Self {
        Self {
            norm: self.norm,
            min_integer: self.min_integer,
            generator: g.apply(field, &self.generator),
        }
    }

    pub fn to_ideal(&self, field: &NumberField) -> Result<Ideal> {
        let ideal = if self.min_integer > 0 {
            Ideal::generated_modulo(field, &[self.generator.clone()], self.min_integer as i128)
        } else {
            Ideal::generated_by(field, &[field.integer(0), self.generator.clone()])
        }
        .map_err(|err| match err {
            FieldError::DegenerateIdeal(_) => FieldError::DegenerateIdeal(self.to_text(field)),
            other => other,
        })?;
        if ideal.norm() != self.norm as u128 {
            return Err(FieldError::NormMismatch {
                text: self.to_text(field),
                declared: self.norm,
                computed: ideal.norm(),
            });
        }
        Ok(ideal)
    }
}

/// Conjugate a stored descriptor string under `g`.
pub fn conjugate_descriptor_text(
    field: &NumberField,
    text: &str,
    g: &Automorphism,
) -> Result<String> {
    Ok(IdealDescriptor::parse(field, text)?
        .conjugate(field, g)
        .to_text(field))
}

// ============================================================================
// HNF lattices
// ============================================================================

/// Canonical identity of an ideal: its HNF, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdealKey(Vec<i128>);

/// A nonzero ideal of `Z[w]` as an upper-triangular HNF basis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ideal {
    rows: Vec<Vec<i128>>,
}

fn overflow(what: &str) -> FieldError {
    FieldError::Overflow(what.to_string())
}

impl Ideal {
    /// The ideal generated by `gens`: Z-span of `g * w^k`.
    pub fn generated_by(field: &NumberField, gens: &[FieldElement]) -> Result<Self> {
        let basis = field.basis();
        let mut rows = Vec::with_capacity(gens.len() * basis.len());
        for g in gens {
            for b in &basis {
                let row = field
                    .checked_mul(g, b)
                    .ok_or_else(|| overflow("ideal generators"))?;
                rows.push(row.coeffs);
            }
        }
        Self::from_rows(rows, field.degree())
    }

    /// The ideal generated by `gens` and the positive integer `modulus`.
    ///
    /// `modulus * Z[w]` lies in the result, so generator rows are reduced
    /// into `[0, modulus)` before elimination and entries stay bounded.
    pub fn generated_modulo(
        field: &NumberField,
        gens: &[FieldElement],
        modulus: i128,
    ) -> Result<Self> {
        let n = field.degree();
        let basis = field.basis();
        let mut rows = Vec::with_capacity(n + gens.len() * n);
        for i in 0..n {
            let mut row = vec![0i128; n];
            row[i] = modulus;
            rows.push(row);
        }
        for g in gens {
            let g = field.reduce_modulo(g, modulus);
            for b in &basis {
                let row = field
                    .checked_mul(&g, b)
                    .ok_or_else(|| overflow("ideal generators"))?;
                rows.push(field.reduce_modulo(&row, modulus).coeffs);
            }
        }
        Self::from_rows(rows, n)
    }

    fn from_rows(rows: Vec<Vec<i128>>, degree: usize) -> Result<Self> {
        Ok(Self {
            rows: hermite_normal_form(rows, degree)?,
        })
    }

    pub fn norm(&self) -> u128 {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, r)| r[i] as u128)
            .fold(1u128, u128::saturating_mul)
    }

    pub fn key(&self) -> IdealKey {
        IdealKey(self.rows.iter().flatten().copied().collect())
    }

    /// `self ⊆ other`.
    pub fn is_contained_in(&self, other: &Ideal) -> Result<bool> {
        let degree = other.rows.len();
        let mut rows = other.rows.clone();
        rows.extend(self.rows.iter().cloned());
        Ok(hermite_normal_form(rows, degree)? == other.rows)
    }

    /// Product ideal. `N(self) * N(other)` lies in it and bounds every entry.
    pub fn mul(&self, field: &NumberField, other: &Ideal) -> Result<Ideal> {
        let modulus = self
            .norm()
            .checked_mul(other.norm())
            .and_then(|d| i128::try_from(d).ok())
            .ok_or_else(|| overflow("ideal product"))?;
        let n = field.degree();
        let mut rows = Vec::with_capacity(n + self.rows.len() * other.rows.len());
        for i in 0..n {
            let mut row = vec![0i128; n];
            row[i] = modulus;
            rows.push(row);
        }
        for a in &self.rows {
            let a = field.element(a);
            for b in &other.rows {
                let ab = field
                    .checked_mul(&a, &field.element(b))
                    .ok_or_else(|| overflow("ideal product"))?;
                rows.push(field.reduce_modulo(&ab, modulus).coeffs);
            }
        }
        Self::from_rows(rows, n)
    }
}

/// Exponent of `prime` in `ideal`.
pub fn valuation(field: &NumberField, prime: &Ideal, ideal: &Ideal) -> Result<u32> {
    if prime.norm() <= 1 {
        return Ok(0);
    }
    let mut k = 0;
    let mut power = prime.clone();
    while power.norm() <= ideal.norm() && ideal.is_contained_in(&power)? {
        k += 1;
        power = power.mul(field, prime)?;
    }
    Ok(k)
}

/// `row[k] -= q * pivot[k]` for `k >= from`.
fn sub_multiple(row: &mut [i128], q: i128, pivot: &[i128], from: usize) -> Result<()> {
    for k in from..row.len() {
        row[k] = q
            .checked_mul(pivot[k])
            .and_then(|delta| row[k].checked_sub(delta))
            .ok_or_else(|| overflow("Hermite normal form"))?;
    }
    Ok(())
}

/// Row-style HNF of the lattice spanned by `rows` in `Z^degree`.
///
/// Pivots are positive and sit on the diagonal; entries above a pivot lie in
/// `[0, pivot)`. Fails if the rows do not span a full-rank sublattice or an
/// entry leaves the `i128` range.
fn hermite_normal_form(mut rows: Vec<Vec<i128>>, degree: usize) -> Result<Vec<Vec<i128>>> {
    let degenerate = || FieldError::DegenerateIdeal(format!("of rank < {degree}"));
    for col in 0..degree {
        loop {
            let Some(pivot) = (col..rows.len())
                .filter(|&r| rows[r][col] != 0)
                .min_by_key(|&r| rows[r][col].unsigned_abs())
            else {
                return Err(degenerate());
            };
            rows.swap(col, pivot);
            let pivot_row = rows[col].clone();
            let mut cleared = true;
            for row in rows.iter_mut().skip(col + 1) {
                if row[col] == 0 {
                    continue;
                }
                let q = row[col] / pivot_row[col];
                sub_multiple(row, q, &pivot_row, col)?;
                if row[col] != 0 {
                    cleared = false;
                }
            }
            if cleared {
                break;
            }
        }
        if rows[col][col] < 0 {
            for k in col..degree {
                rows[col][k] = rows[col][k]
                    .checked_neg()
                    .ok_or_else(|| overflow("Hermite normal form"))?;
            }
        }
    }
    rows.truncate(degree);
    for i in 0..degree {
        let pivot_row = rows[i].clone();
        for row in rows.iter_mut().take(i) {
            let q = row[i].div_euclid(pivot_row[i]);
            if q != 0 {
                sub_multiple(row, q, &pivot_row, i)?;
            }
        }
    }
    Ok(rows)
}

// ============================================================================
// Canonical lists
// ============================================================================

/// One entry of a canonical ideal (or prime) list.
#[derive(Debug, Clone)]
pub struct CanonicalIdeal {
    pub key: IdealKey,
    pub descriptor: IdealDescriptor,
    pub ideal: Ideal,
    /// `N.k`: k-th entry of norm N in list order.
    pub label: String,
}

/// Interpret stored ideal strings in their stored order and label them.
pub fn canonical_ideals(field: &NumberField, texts: &[String]) -> Result<Vec<CanonicalIdeal>> {
    let mut out = Vec::with_capacity(texts.len());
    let mut current_norm = 0u64;
    let mut k = 0u32;
    for text in texts {
        let descriptor = IdealDescriptor::parse(field, text)?;
        let ideal = descriptor.to_ideal(field)?;
        if descriptor.norm != current_norm {
            current_norm = descriptor.norm;
            k = 0;
        }
        k += 1;
        out.push(CanonicalIdeal {
            key: ideal.key(),
            label: format!("{}.{}", descriptor.norm, k),
            descriptor,
            ideal,
        });
    }
    Ok(out)
}

/// Generator name used in stored ideal strings (`w` if none appears).
pub fn find_variable(texts: &[String]) -> String {
    texts
        .iter()
        .flat_map(|t| t.chars())
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_string())
        .unwrap_or_else(|| "w".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q_sqrt5() -> NumberField {
        NumberField::new("2.2.5.1", &[-1, -1, 1], "w").unwrap()
    }

    fn ideal(k: &NumberField, text: &str) -> Ideal {
        IdealDescriptor::parse(k, text).unwrap().to_ideal(k).unwrap()
    }

    #[test]
    fn descriptor_text_is_stable() {
        let k = q_sqrt5();
        let d = IdealDescriptor::parse(&k, "[31, 31, w + 12]").unwrap();
        assert_eq!(d.to_text(&k), "[31,31,w + 12]");
    }

    #[test]
    fn norm_is_checked() {
        let k = q_sqrt5();
        assert_eq!(ideal(&k, "[11,11,w + 3]").norm(), 11);
        assert_eq!(ideal(&k, "[4,2,2]").norm(), 4);
        let err = IdealDescriptor::parse(&k, "[121,11,w + 3]")
            .unwrap()
            .to_ideal(&k)
            .unwrap_err();
        assert!(matches!(err, FieldError::NormMismatch { computed: 11, .. }));
    }

    #[test]
    fn key_ignores_choice_of_generator() {
        let k = q_sqrt5();
        // -w + 4 and w - 4 and w + 7 all generate the same prime over 11 with 11.
        let a = ideal(&k, "[11,11,-w + 4]");
        let b = ideal(&k, "[11,11,w + 7]");
        let c = ideal(&k, "[11,11,w + 3]");
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn conjugate_prime_over_11() {
        let k = q_sqrt5();
        let g = k.automorphism(1, "-w + 1").unwrap();
        let text = conjugate_descriptor_text(&k, "[11,11,w + 3]", &g).unwrap();
        assert_eq!(text, "[11,11,-w + 4]");
        assert_eq!(ideal(&k, &text).key(), ideal(&k, "[11,11,w - 4]").key());
    }

    #[test]
    fn valuations_in_levels() {
        let k = q_sqrt5();
        let p5 = ideal(&k, "[5,5,2*w - 1]");
        let p2 = ideal(&k, "[4,2,2]");
        assert_eq!(valuation(&k, &p5, &ideal(&k, "[20,10,4*w - 2]")).unwrap(), 1);
        assert_eq!(valuation(&k, &p2, &ideal(&k, "[20,10,4*w - 2]")).unwrap(), 1);
        assert_eq!(valuation(&k, &p5, &ideal(&k, "[25,5,5]")).unwrap(), 2);
        assert_eq!(valuation(&k, &p5, &ideal(&k, "[11,11,w + 3]")).unwrap(), 0);
    }

    #[test]
    fn product_of_split_primes() {
        let k = q_sqrt5();
        let p = ideal(&k, "[11,11,w + 3]");
        let q = ideal(&k, "[11,11,w - 4]");
        let pq = p.mul(&k, &q).unwrap();
        assert_eq!(pq.key(), ideal(&k, "[121,11,11]").key());
        let pp = p.mul(&k, &p).unwrap();
        assert_eq!(pp.norm(), 121);
        assert_ne!(pp.key(), pq.key());
    }

    #[test]
    fn overflow_is_an_error() {
        let k = q_sqrt5();
        let huge = k.element(&[i128::MAX, i128::MAX]);
        assert!(k.checked_mul(&huge, &k.generator()).is_none());
        assert!(matches!(
            Ideal::generated_by(&k, &[huge]),
            Err(FieldError::Overflow(_))
        ));
    }

    #[test]
    fn labels_count_within_norm() {
        let k = q_sqrt5();
        let texts: Vec<String> = ["[1,1,1]", "[4,2,2]", "[11,11,w + 3]", "[11,11,w - 4]"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let labels: Vec<String> = canonical_ideals(&k, &texts)
            .unwrap()
            .into_iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(labels, vec!["1.1", "4.1", "11.1", "11.2"]);
    }

    #[test]
    fn finds_variable_name() {
        assert_eq!(find_variable(&["[4,2,2]".to_string(), "[5,5,2*a - 1]".to_string()]), "a");
        assert_eq!(find_variable(&["[4,2,2]".to_string()]), "w");
    }
}
