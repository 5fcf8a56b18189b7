//! Label algebra.
//!
//! ```text
//!   label       = field_label '-' [weight '-'] level_label '-' suffix
//!   short_label =                              level_label '-' suffix
//! ```
//!
//! The weight part is empty for parallel weight 2, the common weight `k`
//! for parallel weight `k`, and the literal sequence (`[2, 4]`) otherwise.

use std::fmt;

use hmf_store::HilbertNewform;

use crate::error::{ConjugationError, Result};
use crate::index::ConjugationIndex;

/// Weight at each real place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Weight(Vec<u32>);

impl Weight {
    pub fn new(weights: Vec<u32>) -> Self {
        Self(weights)
    }

    pub fn parallel(k: u32, degree: usize) -> Self {
        Self(vec![k; degree])
    }

    /// Parse the stored `[2, 2]` form.
    pub fn parse(text: &str) -> Option<Self> {
        let inner = text.trim().strip_prefix('[')?.strip_suffix(']')?;
        inner
            .split(',')
            .map(|w| w.trim().parse().ok())
            .collect::<Option<Vec<u32>>>()
            .filter(|w| !w.is_empty())
            .map(Self)
    }

    /// The weight of a stored form: `weight` if it parses, else
    /// `parallel_weight`, else parallel weight 2.
    pub fn of_form(form: &HilbertNewform, degree: usize) -> Self {
        form.weight
            .as_deref()
            .and_then(Self::parse)
            .unwrap_or_else(|| Self::parallel(form.parallel_weight.unwrap_or(2), degree))
    }

    /// The common value when every place carries the same weight.
    pub fn parallel_value(&self) -> Option<u32> {
        let first = *self.0.first()?;
        self.0.iter().all(|&w| w == first).then_some(first)
    }

    fn label_part(&self) -> String {
        match self.parallel_value() {
            Some(2) => String::new(),
            Some(k) => format!("{k}-"),
            None => format!("{self}-"),
        }
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, w) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{w}")?;
        }
        write!(f, "]")
    }
}

pub fn full_label(field_label: &str, weight: &Weight, level_label: &str, suffix: &str) -> String {
    format!(
        "{field_label}-{}{}",
        weight.label_part(),
        short_label(level_label, suffix)
    )
}

pub fn short_label(level_label: &str, suffix: &str) -> String {
    format!("{level_label}-{suffix}")
}

/// `conjideals[(level_label, ig)]`; a level missing from the table is an error.
pub fn conjugate_level_label(
    level_label: &str,
    ig: usize,
    index: &ConjugationIndex,
) -> Result<String> {
    index
        .conjugate_label(level_label, ig)
        .map(str::to_string)
        .ok_or_else(|| ConjugationError::UnknownLevelLabel {
            field_label: index.field_label().to_string(),
            level_label: level_label.to_string(),
            automorphism_index: ig,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{build_index, IndexOutcome};
    use crate::test_support::q_sqrt5;

    #[test]
    fn weight_encoding() {
        let two = Weight::parallel(2, 2);
        let four = Weight::parallel(4, 2);
        let mixed = Weight::new(vec![2, 4]);
        assert_eq!(full_label("2.2.5.1", &two, "11.1", "a"), "2.2.5.1-11.1-a");
        assert_eq!(full_label("2.2.5.1", &four, "11.1", "a"), "2.2.5.1-4-11.1-a");
        assert_eq!(
            full_label("2.2.5.1", &mixed, "11.1", "a"),
            "2.2.5.1-[2, 4]-11.1-a"
        );
        assert_eq!(short_label("11.1", "ba"), "11.1-ba");
    }

    #[test]
    fn parses_stored_weight() {
        assert_eq!(Weight::parse("[2, 2]"), Some(Weight::parallel(2, 2)));
        assert_eq!(Weight::parse("[3,3,3]"), Some(Weight::parallel(3, 3)));
        assert_eq!(Weight::parse("[]"), None);
        assert_eq!(Weight::parse("2"), None);
    }

    #[test]
    fn conjugate_level_lookup() {
        let IndexOutcome::Built(index) = build_index(&q_sqrt5()).unwrap() else {
            panic!("index should build");
        };
        assert_eq!(conjugate_level_label("11.1", 1, &index).unwrap(), "11.2");
        assert!(matches!(
            conjugate_level_label("12.1", 1, &index),
            Err(ConjugationError::UnknownLevelLabel { .. })
        ));
    }
}
