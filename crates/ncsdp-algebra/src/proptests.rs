//! Property-based tests for the operator algebra.

#[cfg(test)]
mod tests {
    use num_complex::Complex64;
    use proptest::prelude::*;

    use crate::poly::Polynomial;
    use crate::substitution::{RuleSet, SubstitutionRule};
    use crate::symbol::{Letter, SymbolTable};
    use crate::word::Word;

    // Two Hermitian letters, one non-Hermitian, one commuting
    fn letters() -> Vec<Letter> {
        let mut table = SymbolTable::new();
        vec![
            table.hermitian("X"),
            table.hermitian("Y"),
            table.operator("A"),
            table.commuting("c"),
        ]
    }

    fn letter() -> impl Strategy<Value = Letter> {
        let all = letters();
        (0..all.len(), any::<bool>()).prop_map(move |(i, dag)| {
            if dag {
                all[i].dagger()
            } else {
                all[i]
            }
        })
    }

    fn word() -> impl Strategy<Value = Word> {
        proptest::collection::vec(letter(), 0..=5).prop_map(Word::from_letters)
    }

    fn coeff() -> impl Strategy<Value = Complex64> {
        (-10i32..10, -10i32..10).prop_map(|(re, im)| Complex64::new(f64::from(re), f64::from(im)))
    }

    fn poly() -> impl Strategy<Value = Polynomial> {
        proptest::collection::vec((word(), coeff()), 0..=4).prop_map(Polynomial::from_terms)
    }

    fn projector_rules() -> RuleSet {
        let all = letters();
        let (x, y) = (all[0], all[1]);
        [
            SubstitutionRule::new(Word::from_letters([x, x]), Polynomial::from(Word::from(x))),
            SubstitutionRule::new(Word::from_letters([y, y]), Polynomial::from(Word::from(y))),
        ]
        .into_iter()
        .map(Result::unwrap)
        .collect()
    }

    proptest! {
        #[test]
        fn word_adjoint_involution(w in word()) {
            prop_assert_eq!(w.adjoint().adjoint(), w);
        }

        #[test]
        fn word_degree_additive(a in word(), b in word()) {
            prop_assert_eq!(a.mul(&b).degree(), a.degree() + b.degree());
        }

        #[test]
        fn word_mul_associative(a in word(), b in word(), c in word()) {
            prop_assert_eq!(a.mul(&b).mul(&c), a.mul(&b.mul(&c)));
        }

        #[test]
        fn adjoint_reverses_products(a in word(), b in word()) {
            // (ab)† = b† a†
            prop_assert_eq!(a.mul(&b).adjoint(), b.adjoint().mul(&a.adjoint()));
        }

        #[test]
        fn poly_adjoint_involution(p in poly()) {
            prop_assert_eq!(p.adjoint().adjoint(), p);
        }

        #[test]
        fn poly_sub_self_is_zero(p in poly()) {
            prop_assert!(p.sub(&p).is_zero());
        }

        #[test]
        fn substitution_is_idempotent(p in poly()) {
            let rules = projector_rules();
            let once = rules.apply(&p).unwrap();
            let twice = rules.apply(&once).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn substitution_never_raises_degree(w in word()) {
            let rules = projector_rules();
            let reduced = rules.reduce_word(&w).unwrap();
            prop_assert!(reduced.degree() <= w.degree());
        }
    }
}
