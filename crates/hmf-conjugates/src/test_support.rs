//! Shared fixtures for unit tests: Q(sqrt 5) with its ideals up to norm 25.

use hmf_store::{FieldRecord, HilbertNewform};
use serde_json::json;

use crate::adapter::FieldData;

pub const FIELD: &str = "2.2.5.1";

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Ideals 1.1 4.1 5.1 9.1 11.1 11.2 16.1 19.1 19.2 20.1 25.1.
pub fn q_sqrt5_record() -> FieldRecord {
    FieldRecord {
        label: FIELD.into(),
        polynomial: vec![-1, -1, 1],
        gen_name: Some("w".into()),
        automorphisms: strings(&["w", "-w + 1"]),
        ideals: strings(&[
            "[1,1,1]",
            "[4,2,2]",
            "[5,5,2*w - 1]",
            "[9,3,3]",
            "[11,11,w + 3]",
            "[11,11,w - 4]",
            "[16,4,4]",
            "[19,19,w + 4]",
            "[19,19,w - 5]",
            "[20,10,4*w - 2]",
            "[25,5,5]",
        ]),
        primes: strings(&[
            "[4,2,2]",
            "[5,5,2*w - 1]",
            "[9,3,3]",
            "[11,11,w + 3]",
            "[11,11,w - 4]",
            "[19,19,w + 4]",
            "[19,19,w - 5]",
        ]),
        extra: Default::default(),
    }
}

pub fn q_sqrt5() -> FieldData {
    FieldData::from_record(&q_sqrt5_record()).unwrap()
}

/// A form at `level` with the given Hecke and AL data.
pub fn form(
    level_label: &str,
    level_ideal: &str,
    suffix: &str,
    hecke: &[&str],
    al: &[(&str, &str)],
) -> HilbertNewform {
    let norm: u64 = level_label.split('.').next().unwrap().parse().unwrap();
    serde_json::from_value(json!({
        "_id": 7,
        "field_label": FIELD,
        "level_label": level_label,
        "level_ideal": level_ideal,
        "level_norm": norm,
        "label_suffix": suffix,
        "short_label": format!("{level_label}-{suffix}"),
        "label": format!("{FIELD}-{level_label}-{suffix}"),
        "weight": "[2, 2]",
        "parallel_weight": 2,
        "dimension": 1,
        "hecke_polynomial": "x",
        "hecke_eigenvalues": hecke,
        "AL_eigenvalues": al.iter().map(|(p, e)| vec![*p, *e]).collect::<Vec<_>>(),
        "is_CM": "no",
        "is_base_change": "no",
    }))
    .unwrap()
}
