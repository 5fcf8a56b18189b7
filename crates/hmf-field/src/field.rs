//! Number fields in power-basis form and their automorphisms.

use std::fmt;
use std::str::FromStr;

use crate::element::{format_terms, parse_terms, FieldElement};
use crate::{FieldError, Result};

// ============================================================================
// Field labels
// ============================================================================

/// A parsed field label `deg.sig.disc.idx` (e.g. `2.2.5.1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldLabel {
    pub degree: u32,
    pub real_places: u32,
    pub discriminant: u64,
    pub index: u32,
}

impl FromStr for FieldLabel {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        let bad = || FieldError::BadFieldLabel(s.to_string());
        if parts.len() != 4 {
            return Err(bad());
        }
        Ok(Self {
            degree: parts[0].parse().map_err(|_| bad())?,
            real_places: parts[1].parse().map_err(|_| bad())?,
            discriminant: parts[2].parse().map_err(|_| bad())?,
            index: parts[3].parse().map_err(|_| bad())?,
        })
    }
}

impl fmt::Display for FieldLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.degree, self.real_places, self.discriminant, self.index
        )
    }
}

// ============================================================================
// Number field
// ============================================================================

/// `Q(w)` with `w` a root of a monic integer polynomial.
///
/// Arithmetic happens in the equation order `Z[w]`; every element handed
/// out is reduced to degree `< n`.
#[derive(Debug, Clone)]
pub struct NumberField {
    label: String,
    /// Defining polynomial, constant term first, leading coefficient 1.
    polynomial: Vec<i128>,
    gen_name: String,
}

impl NumberField {
    pub fn new(label: &str, polynomial: &[i64], gen_name: &str) -> Result<Self> {
        if polynomial.len() < 2 || polynomial.last() != Some(&1) {
            return Err(FieldError::BadPolynomial(polynomial.to_vec()));
        }
        Ok(Self {
            label: label.to_string(),
            polynomial: polynomial.iter().map(|c| *c as i128).collect(),
            gen_name: gen_name.to_string(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn degree(&self) -> usize {
        self.polynomial.len() - 1
    }

    pub fn gen_name(&self) -> &str {
        &self.gen_name
    }

    /// Reduce arbitrary power-basis coefficients modulo the defining polynomial.
    pub fn element(&self, coeffs: &[i128]) -> FieldElement {
        let n = self.degree();
        let mut c = coeffs.to_vec();
        for i in (n..c.len()).rev() {
            let lead = c[i];
            if lead == 0 {
                continue;
            }
            c[i] = 0;
            for j in 0..n {
                c[i - n + j] -= lead * self.polynomial[j];
            }
        }
        c.resize(n, 0);
        FieldElement { coeffs: c }
    }

    pub fn integer(&self, value: i128) -> FieldElement {
        self.element(&[value])
    }

    pub fn generator(&self) -> FieldElement {
        self.element(&[0, 1])
    }

    pub fn add(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        let coeffs: Vec<i128> = a.coeffs.iter().zip(&b.coeffs).map(|(x, y)| x + y).collect();
        FieldElement { coeffs }
    }

    pub fn scale(&self, a: &FieldElement, k: i128) -> FieldElement {
        FieldElement {
            coeffs: a.coeffs.iter().map(|x| x * k).collect(),
        }
    }

    pub fn mul(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        let mut prod = vec![0i128; a.coeffs.len() + b.coeffs.len()];
        for (i, x) in a.coeffs.iter().enumerate() {
            if *x == 0 {
                continue;
            }
            for (j, y) in b.coeffs.iter().enumerate() {
                prod[i + j] += x * y;
            }
        }
        self.element(&prod)
    }

    /// `a * b`, or `None` if a coefficient leaves the `i128` range.
    pub fn checked_mul(&self, a: &FieldElement, b: &FieldElement) -> Option<FieldElement> {
        let n = self.degree();
        let mut c = vec![0i128; a.coeffs.len() + b.coeffs.len()];
        for (i, x) in a.coeffs.iter().enumerate() {
            for (j, y) in b.coeffs.iter().enumerate() {
                c[i + j] = c[i + j].checked_add(x.checked_mul(*y)?)?;
            }
        }
        for i in (n..c.len()).rev() {
            let lead = c[i];
            if lead == 0 {
                continue;
            }
            c[i] = 0;
            for j in 0..n {
                c[i - n + j] = c[i - n + j].checked_sub(lead.checked_mul(self.polynomial[j])?)?;
            }
        }
        c.resize(n, 0);
        Some(FieldElement { coeffs: c })
    }

    /// Coefficients of `a` reduced into `[0, modulus)`.
    pub fn reduce_modulo(&self, a: &FieldElement, modulus: i128) -> FieldElement {
        FieldElement {
            coeffs: a.coeffs.iter().map(|c| c.rem_euclid(modulus)).collect(),
        }
    }

    /// `w^k` for `k = 0..degree`, the Z-basis of the order.
    pub fn basis(&self) -> Vec<FieldElement> {
        (0..self.degree())
            .map(|k| {
                let mut c = vec![0i128; k + 1];
                c[k] = 1;
                self.element(&c)
            })
            .collect()
    }

    /// Evaluate the defining polynomial at `x`.
    pub fn minimal_polynomial_at(&self, x: &FieldElement) -> FieldElement {
        // Horner, leading coefficient first.
        let mut acc = self.integer(0);
        for c in self.polynomial.iter().rev() {
            acc = self.mul(&acc, x);
            acc = self.add(&acc, &self.integer(*c));
        }
        acc
    }

    pub fn parse_element(&self, text: &str) -> Result<FieldElement> {
        let terms = parse_terms(text, &self.gen_name)?;
        let top = terms.iter().map(|(_, e)| *e as usize).max().unwrap_or(0);
        let mut coeffs = vec![0i128; top + 1];
        for (c, e) in terms {
            coeffs[e as usize] += c;
        }
        Ok(self.element(&coeffs))
    }

    pub fn format_element(&self, x: &FieldElement) -> String {
        format_terms(&x.coeffs, &self.gen_name)
    }

    /// Build the automorphism sending the generator to `image`.
    pub fn automorphism(&self, index: usize, image: &str) -> Result<Automorphism> {
        let image_elt = self.parse_element(image)?;
        if !self.minimal_polynomial_at(&image_elt).is_zero() {
            return Err(FieldError::NotAnAutomorphism {
                field_label: self.label.clone(),
                image: image.to_string(),
            });
        }
        let mut powers = Vec::with_capacity(self.degree());
        let mut acc = self.integer(1);
        for _ in 0..self.degree() {
            powers.push(acc.clone());
            acc = self.mul(&acc, &image_elt);
        }
        Ok(Automorphism {
            index,
            identity: image_elt == self.generator(),
            image: image_elt,
            powers,
        })
    }

    /// Build the whole automorphism list, preserving the stored order.
    pub fn automorphisms(&self, images: &[String]) -> Result<Vec<Automorphism>> {
        images
            .iter()
            .enumerate()
            .map(|(i, image)| self.automorphism(i, image))
            .collect()
    }
}

// ============================================================================
// Automorphisms
// ============================================================================

/// A field automorphism, determined by the image of the generator.
#[derive(Debug, Clone)]
pub struct Automorphism {
    index: usize,
    image: FieldElement,
    /// `g(w)^k` for `k < degree`.
    powers: Vec<FieldElement>,
    identity: bool,
}

impl Automorphism {
    /// Position in the field's automorphism list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn image(&self) -> &FieldElement {
        &self.image
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    pub fn apply(&self, field: &NumberField, x: &FieldElement) -> FieldElement {
        let mut acc = field.integer(0);
        for (c, p) in x.coeffs.iter().zip(&self.powers) {
            if *c != 0 {
                acc = field.add(&acc, &field.scale(p, *c));
            }
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q_sqrt5() -> NumberField {
        NumberField::new("2.2.5.1", &[-1, -1, 1], "w").unwrap()
    }

    #[test]
    fn reduces_modulo_defining_polynomial() {
        let k = q_sqrt5();
        let w = k.generator();
        // w^2 = w + 1
        assert_eq!(k.mul(&w, &w).coeffs(), &[1, 1]);
        assert_eq!(k.format_element(&k.parse_element("w^3").unwrap()), "2*w + 1");
    }

    #[test]
    fn galois_conjugation_of_q_sqrt5() {
        let k = q_sqrt5();
        let auts = k
            .automorphisms(&["w".to_string(), "-w + 1".to_string()])
            .unwrap();
        assert!(auts[0].is_identity());
        assert!(!auts[1].is_identity());

        let x = k.parse_element("w + 3").unwrap();
        let gx = auts[1].apply(&k, &x);
        assert_eq!(k.format_element(&gx), "-w + 4");
        assert_eq!(auts[1].apply(&k, &gx), x);
    }

    #[test]
    fn rejects_non_root_images() {
        let k = q_sqrt5();
        let err = k.automorphism(1, "w + 1").unwrap_err();
        assert!(matches!(err, FieldError::NotAnAutomorphism { .. }));
    }

    #[test]
    fn parses_field_labels() {
        let l: FieldLabel = "3.3.49.1".parse().unwrap();
        assert_eq!(l.degree, 3);
        assert_eq!(l.discriminant, 49);
        assert_eq!(l.to_string(), "3.3.49.1");
        assert!("3.3.49".parse::<FieldLabel>().is_err());
    }
}
