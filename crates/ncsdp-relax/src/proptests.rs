//! Property-based tests for relaxation builds.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use ncsdp_algebra::{Letter, Polynomial, SymbolTable, Word};
    use ncsdp_linalg::ParallelConfig;

    use crate::config::RelaxationConfig;
    use crate::constraints::{Constraints, MomentExpr};
    use crate::relaxation::{Problem, Relaxation};

    fn letters() -> Vec<Letter> {
        let mut table = SymbolTable::new();
        vec![table.hermitian("X"), table.hermitian("Y"), table.operator("A")]
    }

    fn word() -> impl Strategy<Value = Word> {
        let all = letters();
        proptest::collection::vec(0..all.len(), 0..=3)
            .prop_map(move |picks| Word::from_letters(picks.into_iter().map(|k| all[k])))
    }

    fn poly() -> impl Strategy<Value = Polynomial> {
        proptest::collection::vec((word(), -3i32..=3), 1..=3).prop_map(|terms| {
            Polynomial::from_terms(terms.into_iter().map(|(w, c)| (w, f64::from(c).into())))
        })
    }

    fn problem() -> impl Strategy<Value = (usize, i32, Vec<Polynomial>)> {
        (1..=3usize, 0..=2i32, proptest::collection::vec(poly(), 0..=2))
    }

    fn build(n_letters: usize, level: i32, inequalities: &[Polynomial], config: RelaxationConfig) -> Relaxation {
        let group: Vec<Letter> = letters().into_iter().take(n_letters).collect();
        let constraints = inequalities
            .iter()
            .fold(Constraints::new(), |c, g| c.inequality(g.clone()));
        let mut r = Relaxation::new(vec![group]).with_config(config);
        r.build(Problem::new(level).constraints(constraints)).unwrap();
        r
    }

    fn restricted(inequalities: &[Polynomial], n_letters: usize) -> Vec<Polynomial> {
        let allowed: Vec<u32> = letters().iter().take(n_letters).map(|l| l.id()).collect();
        inequalities
            .iter()
            .filter(|g| g.symbols().iter().all(|s| allowed.contains(s)))
            .cloned()
            .collect()
    }

    proptest! {
        #[test]
        fn prop_rows_match_block_structure((n, level, gs) in problem()) {
            let gs = restricted(&gs, n);
            let r = build(n, level, &gs, RelaxationConfig::default());

            let rows: usize = r.block_struct().iter().map(|s| s.unsigned_abs() as usize).map(|k| k * k).sum();
            prop_assert_eq!(r.f().num_rows(), rows);
            prop_assert_eq!(r.block_struct().len(), 1 + gs.len());
            prop_assert_eq!(r.obj_facvar().len(), r.n_vars());
            for (_, col, _) in r.f().triplets() {
                prop_assert!(col <= r.n_vars());
            }
        }

        #[test]
        fn prop_parallel_matches_sequential((n, level, gs) in problem()) {
            let gs = restricted(&gs, n);
            let pool = ParallelConfig { enabled: true, parallel_threshold: 1, chunk_size: 2 };
            let sequential = build(n, level, &gs, RelaxationConfig::default());
            let parallel = build(n, level, &gs, RelaxationConfig::default().parallel(pool));

            prop_assert_eq!(parallel.block_struct(), sequential.block_struct());
            prop_assert_eq!(parallel.f(), sequential.f());
        }

        #[test]
        fn prop_reprocessing_same_constraints_keeps_f((n, level, gs) in problem()) {
            let gs = restricted(&gs, n);
            let mut r = build(n, level, &gs, RelaxationConfig::default());
            let f = r.f().clone();

            let constraints = gs.iter().fold(Constraints::new(), |c, g| c.inequality(g.clone()));
            r.process_constraints(&constraints).unwrap();
            prop_assert_eq!(r.f(), &f);
        }

        #[test]
        fn prop_moment_expr_text_is_stable(
            terms in proptest::collection::vec((-20i32..20, 0usize..4, 0usize..4, 0usize..4), 0..4),
            constant in -20i32..20,
        ) {
            let e = terms.into_iter().fold(MomentExpr::constant(f64::from(constant) / 4.0), |e, (c, b, i, j)| {
                e.term(f64::from(c) / 4.0, b, i, j)
            });
            let parsed: MomentExpr = e.to_string().parse().unwrap();
            prop_assert_eq!(parsed.to_string(), e.to_string());
        }
    }
}
