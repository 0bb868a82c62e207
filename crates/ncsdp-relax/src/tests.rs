//! Integration tests for ncsdp-relax.

#[cfg(test)]
mod integration_tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use nalgebra::DMatrix;
    use num_complex::Complex64;
    use tracing_subscriber::fmt::MakeWriter;

    use ncsdp_algebra::{AlgebraError, Letter, Polynomial, RuleSet, SubstitutionRule, SymbolTable, Word};
    use ncsdp_linalg::ParallelConfig;

    use crate::config::RelaxationConfig;
    use crate::constraints::{Constraints, MomentExpr};
    use crate::error::{RelaxationError, Result};
    use crate::export::LiftedProblem;
    use crate::moment::MomentBasis;
    use crate::relaxation::{ExtraMomentMatrix, Problem, Relaxation};
    use crate::solve::{RawSolution, SdpSolver, SolveStatus, SolverParams};

    fn xy() -> (SymbolTable, Letter, Letter) {
        let mut table = SymbolTable::new();
        let x = table.hermitian("X");
        let y = table.hermitian("Y");
        (table, x, y)
    }

    fn w(letters: &[Letter]) -> Word {
        Word::from_letters(letters.iter().copied())
    }

    fn p(letters: &[Letter]) -> Polynomial {
        Polynomial::from(w(letters))
    }

    fn row_count(r: &Relaxation) -> usize {
        r.block_struct().iter().map(|s| s.unsigned_abs() as usize).map(|n| n * n).sum()
    }

    /// Returns fixed variable values and all-ones dual matrices.
    struct MockSolver {
        x: Vec<f64>,
    }

    impl SdpSolver for MockSolver {
        fn name(&self) -> &str {
            "mock"
        }

        fn solve(&self, problem: &LiftedProblem, params: &SolverParams) -> Result<RawSolution> {
            params.ensure_known(self.name(), &["tolerance"])?;
            let mut x = self.x.clone();
            x.resize(problem.n_vars(), 0.0);
            let primal: f64 = problem.objective.iter().zip(&x).map(|(c, v)| c * v).sum();
            let mats: Vec<DMatrix<f64>> = problem
                .block_struct
                .sizes()
                .iter()
                .map(|s| {
                    let n = s.unsigned_abs() as usize;
                    DMatrix::from_element(n, n, 1.0)
                })
                .collect();
            Ok(RawSolution {
                primal,
                dual: primal,
                x_mat: mats.clone(),
                y_mat: mats,
                x_vec: x,
                status: SolveStatus::Optimal,
            })
        }
    }

    /// Log output collected from a scoped subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn count(&self, needle: &str) -> usize {
            String::from_utf8_lossy(&self.0.lock().unwrap()).matches(needle).count()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_block_structure_with_localizing_block() {
        let (_, x, y) = xy();
        let mut r = Relaxation::new(vec![vec![x, y]]);
        let g = Polynomial::one().sub(&p(&[x])).sub(&p(&[y]));
        let problem = Problem::new(1)
            .objective(p(&[x]).add(&p(&[y])))
            .constraints(Constraints::new().inequality(g));
        r.build(problem).unwrap();

        assert_eq!(r.block_struct(), &[3, 1]);
        // X, Y, X², XY, Y²
        assert_eq!(r.n_vars(), 5);
        assert_eq!(r.f().num_rows(), row_count(&r));
        assert_eq!(r.obj_facvar(), &[1.0, 1.0, 0.0, 0.0, 0.0]);

        let one = Complex64::new(1.0, 0.0);
        assert_eq!(r.f().get(r.blocks().cell_row(0, 0, 0), 0), one);
        assert_eq!(r.f().get(r.blocks().cell_row(0, 0, 1), 1), one);
        let localizing = r.blocks().cell_row(1, 0, 0);
        assert_eq!(r.f().get(localizing, 0), one);
        assert_eq!(r.f().get(localizing, 1), -one);
        assert_eq!(r.f().get(localizing, 2), -one);
        assert_eq!(r.monomial_index().lookup(&w(&[x, y])), Some(4));
        assert_eq!(r.monomial_index().lookup(&w(&[y, x])), None);
    }

    #[test]
    fn test_idempotent_operator() {
        let (_, x, _) = xy();
        let rules: RuleSet = std::iter::once(SubstitutionRule::new(w(&[x, x]), p(&[x])).unwrap()).collect();
        let mut r = Relaxation::new(vec![vec![x]]);
        r.build(Problem::new(2).substitutions(rules)).unwrap();

        assert_eq!(r.monomial_sets()[0].a(), &[Word::identity(), w(&[x])]);
        assert_eq!(r.block_struct(), &[2]);
        assert_eq!(r.n_vars(), 1);
        let one = Complex64::new(1.0, 0.0);
        assert_eq!(r.f().get(r.blocks().cell_row(0, 1, 1), 1), one);
    }

    #[test]
    fn test_non_terminating_rules() {
        let (_, x, y) = xy();
        let rules: RuleSet = [
            SubstitutionRule::new(w(&[x]), p(&[y])).unwrap(),
            SubstitutionRule::new(w(&[y]), p(&[x])).unwrap(),
        ]
        .into_iter()
        .collect();
        let mut r = Relaxation::new(vec![vec![x, y]]).with_config(RelaxationConfig::default().max_rewrites(50));
        let err = r.build(Problem::new(1).substitutions(rules)).unwrap_err();
        assert_eq!(
            err,
            RelaxationError::Algebra(AlgebraError::NonTerminatingSubstitution { limit: 50 })
        );
        assert!(!r.is_built());
    }

    #[test]
    fn test_not_built() {
        let (table, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        assert_eq!(
            r.process_constraints(&Constraints::new()).unwrap_err(),
            RelaxationError::NotBuilt
        );
        assert_eq!(r.lifted().unwrap_err(), RelaxationError::NotBuilt);
        assert_eq!(r.set_objective(None, None).unwrap_err(), RelaxationError::NotBuilt);
        assert_eq!(r.human_readable(&table).unwrap_err(), RelaxationError::NotBuilt);
        assert_eq!(r.value_of(&p(&[x])).unwrap_err(), RelaxationError::NotSolved);
    }

    #[test]
    fn test_invalid_levels() {
        let (_, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        assert_eq!(r.build(Problem::new(-2)).unwrap_err(), RelaxationError::InvalidLevel(-2));
        assert_eq!(
            r.build(Problem::new(-1)).unwrap_err(),
            RelaxationError::MissingBasis { group: 0 }
        );
    }

    #[test]
    fn test_extra_moment_matrices() {
        let (_, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        let problem = Problem::new(1)
            .extra_moment_matrix(ExtraMomentMatrix { copy: true, ppt: false })
            .extra_moment_matrix(ExtraMomentMatrix::default());
        r.build(problem).unwrap();

        assert_eq!(r.block_struct(), &[2, 2, 2]);
        for i in 0..2 {
            for j in i..2 {
                let original = r.f().row(r.blocks().cell_row(0, i, j));
                assert_eq!(r.f().row(r.blocks().cell_row(1, i, j)), original);
            }
        }
        // X, X² and three fresh cells
        assert_eq!(r.n_vars(), 5);
        assert_eq!(r.monomial_index().len(), 2);
        assert_eq!(r.f().num_rows(), row_count(&r));
    }

    #[test]
    fn test_product_basis_with_partial_transpose() {
        let (_, x, y) = xy();
        let one = Word::identity();
        let basis = MomentBasis::product(vec![one.clone(), w(&[x])], vec![one, w(&[y])]).unwrap();
        let mut r = Relaxation::new(vec![vec![x, y]]);
        let problem = Problem::new(-1)
            .basis(basis)
            .ppt(true)
            .extra_moment_matrix(ExtraMomentMatrix { copy: true, ppt: true });
        r.build(problem).unwrap();

        assert_eq!(r.block_struct(), &[4, 4]);
        assert_eq!(r.f().num_rows(), row_count(&r));
        assert!(r.monomial_index().lookup(&w(&[x, y])).is_some());

        // over Hermitian letters of degree one the partial transpose only
        // swaps equal entries, so the transposed copy matches the original
        for i in 0..4 {
            for j in i..4 {
                let blocks = r.blocks();
                assert_eq!(r.f().row(blocks.cell_row(0, i, j)), r.f().row(blocks.cell_row(1, i, j)));
            }
        }
    }

    #[test]
    fn test_parameters_block() {
        let (mut table, x, _) = xy();
        let lambda = table.commuting("lambda");
        let mut r = Relaxation::new(vec![vec![x]]).with_parameters(vec![lambda]);
        let objective = Polynomial::from(Word::from(lambda));
        r.build(Problem::new(1).objective(objective)).unwrap();

        assert_eq!(r.block_struct(), &[-1, 2]);
        assert_eq!(r.f().num_rows(), row_count(&r));
        assert_eq!(r.monomial_index().lookup(&Word::from(lambda)), Some(1));
        assert_eq!(r.f().get(r.blocks().cell_row(0, 0, 0), 1), Complex64::new(1.0, 0.0));
        assert_eq!(r.obj_facvar(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_reprocessing_is_idempotent() {
        let (_, x, _) = xy();
        let constraints = Constraints::new().inequality(p(&[x]));
        let mut r = Relaxation::new(vec![vec![x]]);
        r.build(Problem::new(1).constraints(constraints.clone())).unwrap();
        let f = r.f().clone();
        let n_vars = r.n_vars();

        r.process_constraints(&constraints).unwrap();
        assert_eq!(r.f(), &f);
        assert_eq!(r.n_vars(), n_vars);

        // same shape, different coefficients
        let shifted = Constraints::new().inequality(Polynomial::one().sub(&p(&[x])));
        r.process_constraints(&shifted).unwrap();
        let row = r.blocks().cell_row(1, 0, 0);
        assert_eq!(r.f().get(row, 0), Complex64::new(1.0, 0.0));
        assert_eq!(r.f().get(row, 1), Complex64::new(-1.0, 0.0));
        assert_eq!(r.n_vars(), n_vars);

        let wider = Constraints::new().inequality(p(&[x])).inequality(p(&[x]));
        assert_eq!(
            r.process_constraints(&wider).unwrap_err(),
            RelaxationError::BlockMismatch {
                expected: vec![1],
                found: vec![1, 1]
            }
        );
    }

    #[test]
    fn test_reprocessing_rolls_back_new_monomials() {
        let (_, x, y) = xy();
        let mut r = Relaxation::new(vec![vec![x, y]]);
        let first = Constraints::new().inequality(p(&[x, y, x]));
        r.build(Problem::new(1).constraints(first)).unwrap();
        assert_eq!(r.n_vars(), 6);
        assert_eq!(r.monomial_index().lookup(&w(&[x, y, x])), Some(6));

        r.process_constraints(&Constraints::new().inequality(p(&[y, x, y]))).unwrap();
        assert_eq!(r.n_vars(), 6);
        assert_eq!(r.monomial_index().lookup(&w(&[x, y, x])), None);
        assert_eq!(r.monomial_index().lookup(&w(&[y, x, y])), Some(6));
    }

    #[test]
    fn test_moment_reuse_across_blocks() {
        let (_, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        // localizing over {1, X}: 1 - X², X - X³, X² - X⁴
        let constraints = Constraints::new().inequality(Polynomial::one().sub(&p(&[x, x])));
        r.build(Problem::new(2).constraints(constraints)).unwrap();

        assert_eq!(r.block_struct(), &[3, 2]);
        assert_eq!(r.n_vars(), 4);
        // X² sits at (0, 2) and (1, 1)
        let blocks = r.blocks();
        assert_eq!(r.f().row(blocks.cell_row(0, 0, 2)), r.f().row(blocks.cell_row(0, 1, 1)));
    }

    #[test]
    fn test_equality_blocks_without_elimination() {
        let (_, x, y) = xy();
        let mut r = Relaxation::new(vec![vec![x, y]]);
        let eq = p(&[x]).sub(&p(&[y]));
        r.build(Problem::new(1).constraints(Constraints::new().equality(eq))).unwrap();

        assert_eq!(r.block_struct(), &[3, 1, 1]);
        let (plus, minus) = (r.blocks().cell_row(1, 0, 0), r.blocks().cell_row(2, 0, 0));
        assert_eq!(r.f().get(plus, 1), Complex64::new(1.0, 0.0));
        assert_eq!(r.f().get(minus, 1), Complex64::new(-1.0, 0.0));
        assert_eq!(r.f().get(minus, 2), Complex64::new(1.0, 0.0));
    }

    #[test]
    fn test_equality_elimination() {
        let (_, x, y) = xy();
        let mut r = Relaxation::new(vec![vec![x, y]]);
        let constraints = Constraints::new()
            .equality(p(&[x]).sub(&p(&[y])))
            .remove_equalities(true);
        let objective = p(&[x]).add(&p(&[y]));
        r.build(Problem::new(1).objective(objective).constraints(constraints.clone()))
            .unwrap();

        assert_eq!(r.block_struct(), &[3]);
        assert_eq!(r.n_vars(), 4);
        assert_eq!(r.obj_facvar().len(), 4);
        assert!(r.elimination().is_some());

        let z = vec![1.0, 2.0, -0.5, 3.0];
        let solver = MockSolver { x: z.clone() };
        let solution = r.solve(&solver, &SolverParams::new()).unwrap().clone();
        assert_eq!(solution.moments.len(), 5);
        assert!((solution.moments[0] - solution.moments[1]).abs() < 1e-9);

        // F over z reproduces the moment of X at cell (0, 1)
        let row = r.blocks().cell_row(0, 0, 1);
        let at_z = r.f().get(row, 0).re + z.iter().enumerate().map(|(k, v)| r.f().get(row, k + 1).re * v).sum::<f64>();
        assert!((at_z - solution.moments[0]).abs() < 1e-9);
        assert!((solution.primal - (solution.moments[0] + solution.moments[1])).abs() < 1e-9);

        assert_eq!(
            r.process_constraints(&constraints).unwrap_err(),
            RelaxationError::AlreadyEliminated
        );
        assert_eq!(
            r.extract_dual_value(&w(&[x]), None).unwrap_err(),
            RelaxationError::AlreadyEliminated
        );
    }

    #[test]
    fn test_equality_degree_too_high() {
        let (_, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        let constraints = Constraints::new()
            .equality(p(&[x, x, x]))
            .remove_equalities(true);
        assert_eq!(
            r.build(Problem::new(1).constraints(constraints)).unwrap_err(),
            RelaxationError::EqualityDegree { degree: 3, needed: 2 }
        );
    }

    #[test]
    fn test_simple_moment_equality() {
        let (_, x, y) = xy();
        let mut r = Relaxation::new(vec![vec![x, y]]);
        let half = p(&[x]).sub(&Polynomial::constant(0.5));
        let constraints = Constraints::new().moment_equality(half);
        r.build(Problem::new(1).constraints(constraints.clone())).unwrap();

        // X is pinned, so it never becomes a variable
        assert_eq!(r.block_struct(), &[3]);
        assert_eq!(r.n_vars(), 4);
        assert_eq!(r.monomial_index().lookup(&w(&[x])), None);
        assert_eq!(r.f().get(r.blocks().cell_row(0, 0, 1), 0), Complex64::new(0.5, 0.0));

        r.process_constraints(&constraints.clone().inequality(p(&[y]))).unwrap();
        let quarter = Constraints::new().moment_equality(p(&[x]).sub(&Polynomial::constant(0.25)));
        assert_eq!(
            r.process_constraints(&quarter).unwrap_err(),
            RelaxationError::MomentSubstitutionsChanged
        );
    }

    #[test]
    fn test_chained_moment_equalities() {
        let (_, x, y) = xy();
        let half = p(&[x]).sub(&Polynomial::constant(0.5));
        let double = p(&[x]).sub(&p(&[y]).scale(Complex64::new(2.0, 0.0)));

        let mut built = Vec::new();
        for constraints in [
            Constraints::new().moment_equality(half.clone()).moment_equality(double.clone()),
            Constraints::new().moment_equality(double).moment_equality(half),
        ] {
            let mut r = Relaxation::new(vec![vec![x, y]]);
            r.build(Problem::new(1).constraints(constraints)).unwrap();

            // ⟨X⟩ = 0.5 and ⟨X⟩ = 2⟨Y⟩ pin both moments
            assert_eq!(r.block_struct(), &[3]);
            assert_eq!(r.f().row(r.blocks().cell_row(0, 0, 1)), &[(0, Complex64::new(0.5, 0.0))]);
            assert_eq!(r.f().row(r.blocks().cell_row(0, 0, 2)), &[(0, Complex64::new(0.25, 0.0))]);
            assert_eq!(r.monomial_index().lookup(&w(&[x])), None);
            assert_eq!(r.monomial_index().lookup(&w(&[y])), None);
            // X², XY, Y²
            assert_eq!(r.n_vars(), 3);
            built.push(r.f().clone());
        }
        assert_eq!(built[0], built[1]);
    }

    #[test]
    fn test_redundant_moment_equality_is_consumed() {
        let (_, x, y) = xy();
        let mut r = Relaxation::new(vec![vec![x, y]]);
        let same = p(&[x]).sub(&p(&[y]));
        let constraints = Constraints::new().moment_equality(same.clone()).moment_equality(same);
        r.build(Problem::new(1).constraints(constraints)).unwrap();

        assert_eq!(r.block_struct(), &[3]);
        let blocks = r.blocks();
        assert_eq!(r.f().row(blocks.cell_row(0, 0, 1)), r.f().row(blocks.cell_row(0, 0, 2)));
    }

    #[test]
    fn test_general_moment_equality_becomes_blocks() {
        let (_, x, y) = xy();
        let mut r = Relaxation::new(vec![vec![x, y]]);
        let sphere = p(&[x, x]).add(&p(&[y, y])).sub(&Polynomial::one());
        r.build(Problem::new(1).constraints(Constraints::new().moment_equality(sphere)))
            .unwrap();

        assert_eq!(r.block_struct(), &[3, 1, 1]);
        let row = r.blocks().cell_row(1, 0, 0);
        assert_eq!(r.f().get(row, 0), Complex64::new(-1.0, 0.0));
        assert_eq!(r.f().get(row, 3), Complex64::new(1.0, 0.0));
        assert_eq!(r.f().get(row, 5), Complex64::new(1.0, 0.0));
    }

    #[test]
    fn test_moment_expr_blocks() {
        let (_, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        let bound: MomentExpr = "-0[0,1] + 1".parse().unwrap();
        r.build(Problem::new(1).constraints(Constraints::new().moment_inequality(bound)))
            .unwrap();

        assert_eq!(r.block_struct(), &[2, 1]);
        let row = r.blocks().cell_row(1, 0, 0);
        assert_eq!(r.f().get(row, 0), Complex64::new(1.0, 0.0));
        assert_eq!(r.f().get(row, 1), Complex64::new(-1.0, 0.0));

        let f = r.f().clone();
        for bad in ["1[0,0]", "0[2,0]", "7[0,0] + 1"] {
            let e: MomentExpr = bad.parse().unwrap();
            let err = r.process_constraints(&Constraints::new().moment_inequality(e)).unwrap_err();
            assert!(matches!(err, RelaxationError::InvalidMomentReference { .. }), "{bad}");
            assert_eq!(r.f(), &f, "{bad}");
        }
    }

    #[test]
    fn test_failed_reprocessing_keeps_built_state() {
        let (_, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        let bound: MomentExpr = "-0[0,1] + 1".parse().unwrap();
        let original = Constraints::new().moment_inequality(bound);
        r.build(Problem::new(1).constraints(original.clone())).unwrap();
        let f = r.f().clone();
        let row = r.blocks().cell_row(1, 0, 0);

        let broken: MomentExpr = "7[0,0] + 1".parse().unwrap();
        assert!(r.process_constraints(&Constraints::new().moment_inequality(broken)).is_err());
        assert!(r.is_built());
        assert_eq!(r.block_struct(), &[2, 1]);
        assert_eq!(r.f(), &f);

        // resubmitting the original set is a no-op on intact state
        r.process_constraints(&original).unwrap();
        assert_eq!(r.f().get(row, 0), Complex64::new(1.0, 0.0));
        assert_eq!(r.f().get(row, 1), Complex64::new(-1.0, 0.0));

        // and a different set still replaces it
        let other: MomentExpr = "0[1,1] - 2".parse().unwrap();
        r.process_constraints(&Constraints::new().moment_inequality(other)).unwrap();
        assert_eq!(r.f().get(row, 0), Complex64::new(-2.0, 0.0));
        assert_eq!(r.f().get(row, 2), Complex64::new(1.0, 0.0));
    }

    #[test]
    fn test_failed_elimination_keeps_built_state() {
        let mut table = SymbolTable::new();
        let a = table.operator("A");
        let mut r = Relaxation::new(vec![vec![a]]);
        let objective = Polynomial::monomial(Word::from(a), Complex64::new(0.0, 1.0));
        r.build(Problem::new(1).objective(objective)).unwrap();
        let (f, n_vars) = (r.f().clone(), r.n_vars());

        let eq = Constraints::new()
            .equality(Polynomial::from(Word::from(a)).sub(&Polynomial::from(Word::from(a.dagger()))))
            .remove_equalities(true);
        assert_eq!(r.process_constraints(&eq).unwrap_err(), RelaxationError::ComplexElimination);
        assert_eq!(r.f(), &f);
        assert_eq!(r.n_vars(), n_vars);
        assert_eq!(r.obj_facvar().len(), n_vars);
        assert!(r.elimination().is_none());
    }

    #[test]
    fn test_mixed_variable_groups() {
        let (_, x, y) = xy();
        let mut r = Relaxation::new(vec![vec![x], vec![y]]);
        r.build(Problem::new(1)).unwrap();
        assert_eq!(r.block_struct(), &[2, 2]);

        let err = r
            .process_constraints(&Constraints::new().inequality(p(&[x, y])))
            .unwrap_err();
        assert_eq!(err, RelaxationError::MixedVariableGroups { index: 0 });
    }

    #[test]
    fn test_localizing_overrides() {
        let (_, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        let constraints = Constraints::new()
            .inequality(p(&[x]))
            .localizing_monomials(vec![Some(vec![Word::identity(), w(&[x]), w(&[x])])]);
        r.build(Problem::new(1).constraints(constraints)).unwrap();
        assert_eq!(r.block_struct(), &[2, 2]);

        let mut r = Relaxation::new(vec![vec![x]]);
        let constraints = Constraints::new().inequality(p(&[x])).localizing_monomials(Vec::new());
        assert_eq!(
            r.build(Problem::new(1).constraints(constraints)).unwrap_err(),
            RelaxationError::LocalizingOverrideCount { expected: 1, given: 0 }
        );
    }

    #[test]
    fn test_real_lifting_is_noop() {
        let (_, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        r.build(Problem::new(1).constraints(Constraints::new().inequality(p(&[x]))))
            .unwrap();
        let lifted = r.lifted().unwrap();

        assert!(!r.is_complex());
        assert_eq!(&lifted.block_struct, r.blocks());
        assert_eq!(lifted.f, r.f().map(|v| v.re));
    }

    #[test]
    fn test_complex_lifting_doubles_blocks() {
        let mut table = SymbolTable::new();
        let a = table.operator("A");
        let mut r = Relaxation::new(vec![vec![a]]);
        let objective = Polynomial::monomial(Word::from(a), Complex64::new(0.0, 1.0));
        r.build(Problem::new(1).objective(objective)).unwrap();

        assert!(r.is_complex());
        assert_eq!(r.block_struct(), &[3]);
        // A and A† are distinct moments
        assert_eq!(r.n_vars(), 5);

        let lifted = r.lifted().unwrap();
        assert_eq!(lifted.block_struct.sizes(), &[6]);
        assert_eq!(lifted.f.num_rows(), 36);
        assert_eq!(lifted.objective, vec![0.0; 5]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (_, x, y) = xy();
        let ball = Polynomial::one().sub(&p(&[x, x])).sub(&p(&[y, y]));
        let problem = Problem::new(2)
            .objective(p(&[x, y]).add(&p(&[y, x])))
            .constraints(Constraints::new().inequality(ball));

        let mut sequential = Relaxation::new(vec![vec![x, y]]);
        sequential.build(problem.clone()).unwrap();

        let pool = ParallelConfig {
            enabled: true,
            parallel_threshold: 1,
            chunk_size: 1,
        };
        let mut parallel = Relaxation::new(vec![vec![x, y]]).with_config(RelaxationConfig::default().parallel(pool));
        parallel.build(problem).unwrap();

        assert_eq!(parallel.block_struct(), sequential.block_struct());
        assert_eq!(parallel.f(), sequential.f());
        assert_eq!(parallel.obj_facvar(), sequential.obj_facvar());
        let words = |r: &Relaxation| r.monomial_index().iter().map(|(k, w)| (k, w.clone())).collect::<Vec<_>>();
        assert_eq!(words(&parallel), words(&sequential));
    }

    #[test]
    fn test_solve_and_query() {
        let (_, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        let objective = Polynomial::one().add(&p(&[x]));
        r.build(Problem::new(1).objective(objective)).unwrap();
        assert_eq!(r.constant_term(), 1.0);

        let solver = MockSolver { x: vec![0.25, 0.5] };
        let bad = SolverParams::new().set("iterations", 3);
        assert!(matches!(
            r.solve(&solver, &bad).unwrap_err(),
            RelaxationError::UnknownSolverParameter { .. }
        ));

        let solution = r.solve(&solver, &SolverParams::new().set("tolerance", 1e-8)).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_eq!(solution.solver, "mock");
        assert!((solution.primal - 1.25).abs() < 1e-12);

        let value = r.value_of(&Polynomial::one().add(&p(&[x, x]).scale(Complex64::new(2.0, 0.0))))
            .unwrap();
        assert!((value.re - 2.0).abs() < 1e-12);
        assert!(matches!(
            r.value_of(&p(&[x, x, x])).unwrap_err(),
            RelaxationError::MonomialNotFound(_)
        ));

        // X sits at (0, 1) and (1, 0) of the all-ones dual matrix
        assert!((r.extract_dual_value(&w(&[x]), None).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(r.extract_dual_value(&w(&[x]), Some(&[])).unwrap(), 0.0);
    }

    #[test]
    fn test_solution_ranks_and_sos() {
        let (_, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        r.build(Problem::new(1).objective(p(&[x])).constraints(Constraints::new().inequality(p(&[x]))))
            .unwrap();
        assert_eq!(r.sos_decomposition(0.0).unwrap_err(), RelaxationError::NotSolved);
        assert_eq!(r.find_solution_ranks(Some(&DMatrix::identity(2, 2)), 0).unwrap(), vec![2]);

        r.solve(&MockSolver { x: vec![0.0, 1.0] }, &SolverParams::new()).unwrap();
        assert_eq!(r.find_solution_ranks(None, 0).unwrap(), vec![1]);
        assert!(matches!(
            r.find_solution_ranks(Some(&DMatrix::identity(3, 3)), 0).unwrap_err(),
            RelaxationError::UnmatchedBlocks(_)
        ));

        // all-ones dual blocks: (1 + X)² for the moment block, 1 for X ≥ 0
        let sos = r.sos_decomposition(1e-9).unwrap();
        assert_eq!(sos.len(), 2);
        let coeff = |poly: &Polynomial, word: &Word| {
            poly.terms().iter().find(|(t, _)| t == word).map_or(0.0, |(_, c)| c.re)
        };
        assert!((coeff(&sos[0], &Word::identity()) - 1.0).abs() < 1e-9);
        assert!((coeff(&sos[0], &w(&[x])) - 2.0).abs() < 1e-9);
        assert!((coeff(&sos[0], &w(&[x, x])) - 1.0).abs() < 1e-9);
        assert_eq!(sos[1].len(), 1);
        assert!((sos[1].constant_term().re - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_post_processing_needs_one_basis() {
        let (_, x, y) = xy();
        let mut r = Relaxation::new(vec![vec![x], vec![y]]);
        r.build(Problem::new(1)).unwrap();
        r.solve(&MockSolver { x: Vec::new() }, &SolverParams::new()).unwrap();

        assert!(matches!(r.find_solution_ranks(None, 0).unwrap_err(), RelaxationError::UnmatchedBlocks(_)));
        assert!(matches!(r.sos_decomposition(0.0).unwrap_err(), RelaxationError::UnmatchedBlocks(_)));
    }

    #[test]
    fn test_degree_warning_once_per_build() {
        let (_, x, _) = xy();
        let cubic = Constraints::new()
            .inequality(p(&[x, x, x]))
            .inequality(Polynomial::one().sub(&p(&[x, x, x])));
        let warned = |f: &mut dyn FnMut()| {
            let logs = CapturedLogs::default();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(logs.clone())
                .with_max_level(tracing::Level::WARN)
                .with_ansi(false)
                .finish();
            tracing::subscriber::with_default(subscriber, f);
            logs.count("degree beyond the relaxation level")
        };

        let mut r = Relaxation::new(vec![vec![x]]);
        assert_eq!(warned(&mut || r.build(Problem::new(1).constraints(cubic.clone())).unwrap()), 1);
        // reprocessing belongs to the same build
        let shifted = Constraints::new()
            .inequality(p(&[x, x, x]).add(&Polynomial::one()))
            .inequality(p(&[x, x, x]));
        assert_eq!(warned(&mut || r.process_constraints(&shifted).unwrap()), 0);
        assert_eq!(warned(&mut || r.build(Problem::new(1).constraints(cubic.clone())).unwrap()), 1);
        assert_eq!(warned(&mut || r.build(Problem::new(2).constraints(cubic.clone())).unwrap()), 0);

        // level -1 has no degree budget
        let basis = MomentBasis::single(vec![Word::identity(), w(&[x])]);
        let linear = Constraints::new().inequality(p(&[x]));
        assert_eq!(
            warned(&mut || r.build(Problem::new(-1).basis(basis.clone()).constraints(linear.clone())).unwrap()),
            1
        );
    }

    #[test]
    fn test_set_objective_after_build() {
        let (_, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        r.build(Problem::new(1)).unwrap();

        r.set_objective(Some(&p(&[x, x])), None).unwrap();
        assert_eq!(r.obj_facvar(), &[0.0, 1.0]);

        let extra = MomentExpr::constant(0.5).term(2.0, 0, 0, 1);
        r.set_objective(None, Some(&extra)).unwrap();
        assert_eq!(r.obj_facvar(), &[2.0, 0.0]);
        assert_eq!(r.constant_term(), 0.5);

        assert!(matches!(
            r.set_objective(Some(&p(&[x, x, x])), None).unwrap_err(),
            RelaxationError::MonomialNotFound(_)
        ));
    }

    #[test]
    fn test_exports() {
        let (table, x, _) = xy();
        let mut r = Relaxation::new(vec![vec![x]]);
        r.build(Problem::new(1).objective(p(&[x]))).unwrap();

        let entries = r.sdpa_entries().unwrap();
        assert_eq!((entries[0].var, entries[0].i, entries[0].j), (0, 1, 1));
        assert_eq!(entries[0].value, -1.0);
        assert_eq!(entries.len(), 3);

        let hr = r.human_readable(&table).unwrap();
        assert_eq!(hr.objective, "X");
        assert_eq!(hr.blocks[0][0][0], "1");
        assert_eq!(hr.blocks[0][1][0], "X");
    }
}
