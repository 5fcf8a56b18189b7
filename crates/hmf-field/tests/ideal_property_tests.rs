use hmf_field::{Ideal, IdealDescriptor, NumberField};
use proptest::prelude::*;

fn q_sqrt5() -> NumberField {
    NumberField::new("2.2.5.1", &[-1, -1, 1], "w").unwrap()
}

fn small_element() -> impl Strategy<Value = (i128, i128)> {
    (-40i128..40, -40i128..40).prop_filter("nonzero", |(a, b)| *a != 0 || *b != 0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Shifting the generator by a multiple of the least integer never changes the ideal.
    #[test]
    fn key_is_independent_of_generator_representative(
        (a, b) in small_element(),
        n in 1i128..30,
        t in -5i128..5,
        s in -5i128..5,
    ) {
        let k = q_sqrt5();
        let gen = k.element(&[a, b]);
        let shifted = k.element(&[a + n * t, b + n * s]);
        let i1 = Ideal::generated_by(&k, &[k.integer(n), gen]).unwrap();
        let i2 = Ideal::generated_by(&k, &[k.integer(n), shifted]).unwrap();
        prop_assert_eq!(i1.key(), i2.key());
        prop_assert_eq!(i1.norm(), i2.norm());
    }

    /// Conjugation preserves the norm and is an involution for a quadratic field.
    #[test]
    fn conjugation_preserves_norm((a, b) in small_element(), n in 1u64..30) {
        let k = q_sqrt5();
        let g = k.automorphism(1, "-w + 1").unwrap();
        let gen = k.element(&[a, b]);
        let ideal = Ideal::generated_by(&k, &[k.integer(n as i128), gen.clone()]).unwrap();
        let d = IdealDescriptor {
            norm: ideal.norm() as u64,
            min_integer: n,
            generator: gen,
        };
        let conj = d.conjugate(&k, &g);
        prop_assert_eq!(conj.to_ideal(&k).unwrap().norm(), ideal.norm());
        prop_assert_eq!(conj.conjugate(&k, &g), d);
    }
}
