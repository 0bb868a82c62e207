//! The relaxation build context.
//!
//! A [`Relaxation`] owns the monomial index and the constraint structure
//! `F` for one problem. [`Relaxation::build`] lays out, in order:
//! 1. a free block for the parameters, if any
//! 2. one moment block per monomial set
//! 3. the extra moment matrices
//! 4. the constraint blocks
//!
//! Everything up to the extra moment matrices, together with the
//! objective, is fixed at build time. Constraints can be replaced later
//! with [`Relaxation::process_constraints`], which rolls the index back to
//! the variables that existed before the first constraint block.

use nalgebra::DMatrix;
use num_complex::Complex64;
use tracing::{debug, info, warn};

use ncsdp_algebra::{
    find_variable_group, generate_basis, unique_words, Letter, Polynomial, RuleSet, SymbolTable, Word,
};
use ncsdp_linalg::SparseRows;

use crate::analysis::{solution_ranks, sos_polynomial};
use crate::assembler::{BlockStructure, ConstraintAssembler};
use crate::canonical::{
    dense_row, insert_moment_substitution, substitute_moments, Canonicalizer, IndexMode, MomentSubstitutions,
    ResolvedTerm,
};
use crate::complex::{has_imaginary, lift};
use crate::config::RelaxationConfig;
use crate::constraints::{simple_moment_substitution, Constraints, MomentConstraint, MomentExpr, MomentTerm};
use crate::eliminate::Elimination;
use crate::error::{RelaxationError, Result};
use crate::export::{human_readable, HumanReadable, LiftedProblem, SdpaEntry};
use crate::index::{MonomialIndex, CONSTANT};
use crate::localizing::{localization_order, localizing_monomials, LocalizingGenerator};
use crate::moment::{MomentBasis, MomentGenerator};
use crate::solve::{SdpSolution, SdpSolver, SolverParams};

/// An additional block derived from the principal moment matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtraMomentMatrix {
    /// Reuse the principal block's entries instead of fresh variables.
    pub copy: bool,
    /// Apply the partial transpose on the second tensor factor.
    pub ppt: bool,
}

/// Everything needed to build a relaxation.
#[derive(Clone, Debug, Default)]
pub struct Problem {
    /// Relaxation level; `-1` uses only the explicit bases.
    pub level: i32,
    /// Objective to minimize.
    pub objective: Option<Polynomial>,
    /// Affine combination of moment-matrix cells added to the objective.
    pub extra_objective: Option<MomentExpr>,
    /// Operator substitution rules.
    pub substitutions: RuleSet,
    /// Constraints.
    pub constraints: Constraints,
    /// Extra monomials per variable group, appended to its basis.
    pub extra_monomials: Vec<Vec<Word>>,
    /// Explicit bases. At level `-1` they replace the generated ones,
    /// otherwise they are appended as further moment blocks.
    pub bases: Vec<MomentBasis>,
    /// Build product-basis moment blocks partially transposed.
    pub ppt: bool,
    /// Extra moment matrices.
    pub extra_moment_matrices: Vec<ExtraMomentMatrix>,
}

impl Problem {
    /// A problem at the given level with nothing else set.
    #[must_use]
    pub fn new(level: i32) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Sets the objective.
    #[must_use]
    pub fn objective(mut self, objective: impl Into<Polynomial>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    /// Sets the extra objective term.
    #[must_use]
    pub fn extra_objective(mut self, expr: MomentExpr) -> Self {
        self.extra_objective = Some(expr);
        self
    }

    /// Sets the substitution rules.
    #[must_use]
    pub fn substitutions(mut self, rules: RuleSet) -> Self {
        self.substitutions = rules;
        self
    }

    /// Sets the constraints.
    #[must_use]
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Sets the extra monomials of every group.
    #[must_use]
    pub fn extra_monomials(mut self, per_group: Vec<Vec<Word>>) -> Self {
        self.extra_monomials = per_group;
        self
    }

    /// Adds an explicit basis.
    #[must_use]
    pub fn basis(mut self, basis: MomentBasis) -> Self {
        self.bases.push(basis);
        self
    }

    /// Requests partially transposed product-basis blocks.
    #[must_use]
    pub fn ppt(mut self, ppt: bool) -> Self {
        self.ppt = ppt;
        self
    }

    /// Adds an extra moment matrix.
    #[must_use]
    pub fn extra_moment_matrix(mut self, extra: ExtraMomentMatrix) -> Self {
        self.extra_moment_matrices.push(extra);
        self
    }
}

/// A block waiting to be written during constraint processing.
enum Pending {
    Localizing { g: Polynomial, monomials: Vec<Word> },
    Expr(MomentExpr),
}

impl Pending {
    fn moment(m: &MomentConstraint) -> Self {
        match m {
            MomentConstraint::Poly(p) => Self::Localizing {
                g: p.clone(),
                monomials: vec![Word::identity()],
            },
            MomentConstraint::Expr(e) => Self::Expr(e.clone()),
        }
    }

    fn size(&self) -> i64 {
        match self {
            Self::Localizing { monomials, .. } => i64::try_from(monomials.len()).unwrap_or(i64::MAX),
            Self::Expr(_) => 1,
        }
    }

    /// The words indexing the rows of the block.
    fn into_basis(self) -> Vec<Word> {
        match self {
            Self::Localizing { monomials, .. } => monomials,
            Self::Expr(_) => vec![Word::identity()],
        }
    }
}

/// An equality handed to the eliminator.
enum EqualitySource {
    Localizing { g: Polynomial, monomials: Vec<Word> },
    Moment(MomentConstraint),
}

/// Recognizes the simple moment equalities and turns them into
/// substitutions. The flags mark which equalities were consumed.
///
/// Each equality is first rewritten through the substitutions found
/// before it, so chained equalities compose. One that vanishes entirely
/// is redundant and consumed as well.
fn split_moment_equalities(
    canon: &Canonicalizer<'_>,
    equalities: &[MomentConstraint],
    complex: bool,
) -> Result<(MomentSubstitutions, Vec<bool>)> {
    let mut subs = MomentSubstitutions::default();
    let mut simple = Vec::with_capacity(equalities.len());
    for eq in equalities {
        let MomentConstraint::Poly(p) = eq else {
            simple.push(false);
            continue;
        };
        let rewritten = substitute_moments(&subs, &canon.reduce(p)?, !complex);
        if rewritten.is_zero() {
            simple.push(true);
            continue;
        }
        let found = simple_moment_substitution(&rewritten);
        simple.push(found.is_some());
        if let Some((word, value)) = found {
            insert_moment_substitution(&mut subs, word, value, !complex);
        }
    }
    Ok((subs, simple))
}

/// Row of `F` holding a referenced cell, from blocks before `limit`.
fn cell_source(blocks: &BlockStructure, limit: usize, t: &MomentTerm) -> Result<usize> {
    let invalid = RelaxationError::InvalidMomentReference {
        block: t.block,
        i: t.i,
        j: t.j,
    };
    if t.block >= limit.min(blocks.len()) {
        return Err(invalid);
    }
    let width = blocks.width(t.block);
    if t.i >= width || t.j >= width {
        return Err(invalid);
    }
    Ok(blocks.cell_row(t.block, t.i.min(t.j), t.i.max(t.j)))
}

/// Writes a moment expression into the 1×1 block `block`.
fn write_moment_expr(asm: &mut ConstraintAssembler, block: usize, e: &MomentExpr) -> Result<()> {
    let row = asm.blocks().cell_row(block, 0, 0);
    for t in &e.terms {
        let source = cell_source(asm.blocks(), block, t)?;
        asm.add_scaled_row(row, source, Complex64::new(t.coeff, 0.0));
    }
    asm.push_constant(row, Complex64::new(e.constant, 0.0));
    Ok(())
}

/// The terms of a moment expression over the variables.
fn moment_expr_terms(asm: &ConstraintAssembler, e: &MomentExpr) -> Result<Vec<ResolvedTerm>> {
    let mut terms = vec![ResolvedTerm {
        var: CONSTANT,
        coeff: Complex64::new(e.constant, 0.0),
        via_adjoint: false,
    }];
    for t in &e.terms {
        let source = cell_source(asm.blocks(), asm.blocks().len(), t)?;
        terms.extend(asm.f().row(source).iter().map(|&(var, v)| ResolvedTerm {
            var,
            coeff: v * t.coeff,
            via_adjoint: false,
        }));
    }
    Ok(terms)
}

/// Splits resolved objective terms into the variable coefficients and
/// the constant.
fn split_objective(terms: &[ResolvedTerm], n_vars: usize) -> (Vec<f64>, f64) {
    let dense = dense_row(terms, n_vars);
    if dense.iter().any(|c| c.im != 0.0) {
        warn!("objective has complex coefficients; only their real parts are optimized");
    }
    let constant = dense[0].re;
    if constant != 0.0 {
        info!(constant, "objective has a non-zero constant term; it is not part of the SDP objective");
    }
    (dense[1..].iter().map(|c| c.re).collect(), constant)
}

/// Adds a moment expression onto an objective over the current columns
/// of `F`.
fn add_extra_objective(
    objective: &mut Vec<f64>,
    constant_term: &mut f64,
    asm: &ConstraintAssembler,
    e: &MomentExpr,
) -> Result<()> {
    for term in moment_expr_terms(asm, e)? {
        if term.var == CONSTANT {
            *constant_term += term.coeff.re;
            continue;
        }
        if term.var > objective.len() {
            objective.resize(term.var, 0.0);
        }
        objective[term.var - 1] += term.coeff.re;
    }
    Ok(())
}

/// An NPA relaxation of a noncommutative polynomial optimization problem.
#[derive(Debug)]
pub struct Relaxation {
    groups: Vec<Vec<Letter>>,
    parameters: Vec<Letter>,
    config: RelaxationConfig,

    level: i32,
    rules: RuleSet,
    pure_rules: RuleSet,
    moment_subs: MomentSubstitutions,
    complex: bool,
    monomial_sets: Vec<MomentBasis>,

    asm: ConstraintAssembler,
    index: MonomialIndex,
    objective: Vec<f64>,
    constant_term: f64,

    built: bool,
    constraint_start: usize,
    watermark: usize,
    constraint_sizes: Vec<i64>,
    constraint_bases: Vec<Vec<Word>>,
    constraints_hash: Option<u64>,
    degree_warned: bool,
    elimination: Option<Elimination>,
    solution: Option<SdpSolution>,
}

impl Relaxation {
    /// Creates a relaxation over the given variable groups.
    #[must_use]
    pub fn new(groups: Vec<Vec<Letter>>) -> Self {
        Self {
            groups,
            parameters: Vec::new(),
            config: RelaxationConfig::default(),
            level: 0,
            rules: RuleSet::new(),
            pure_rules: RuleSet::new(),
            moment_subs: MomentSubstitutions::default(),
            complex: false,
            monomial_sets: Vec::new(),
            asm: ConstraintAssembler::new(),
            index: MonomialIndex::new(),
            objective: Vec::new(),
            constant_term: 0.0,
            built: false,
            constraint_start: 0,
            watermark: 0,
            constraint_sizes: Vec::new(),
            constraint_bases: Vec::new(),
            constraints_hash: None,
            degree_warned: false,
            elimination: None,
            solution: None,
        }
    }

    /// Sets symbolic parameters, each an SDP variable of its own.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<Letter>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the build configuration.
    #[must_use]
    pub fn with_config(mut self, config: RelaxationConfig) -> Self {
        self.config = config;
        self
    }

    fn log_summary(&self) {
        let letters = || self.groups.iter().flatten();
        let hermitian = letters().filter(|l| l.is_hermitian()).count();
        let commuting = letters().filter(|l| l.is_commutative()).count();
        let total = letters().count();
        info!(
            hermitian,
            non_hermitian = total - hermitian,
            commuting,
            noncommuting = total - commuting,
            parameters = self.parameters.len(),
            groups = self.groups.len(),
            "building relaxation"
        );
    }

    fn generate_monomial_sets(
        &self,
        level: i32,
        rules: &RuleSet,
        extra: &[Vec<Word>],
        bases: Vec<MomentBasis>,
    ) -> Result<Vec<MomentBasis>> {
        if level == -1 {
            if bases.len() < self.groups.len().max(1) {
                return Err(RelaxationError::MissingBasis { group: bases.len() });
            }
            return Ok(bases);
        }
        let degree = usize::try_from(level).map_err(|_| RelaxationError::InvalidLevel(level))?;
        let mut sets = Vec::with_capacity(self.groups.len() + bases.len());
        for (k, group) in self.groups.iter().enumerate() {
            let extra = extra.get(k).map_or(&[][..], Vec::as_slice);
            sets.push(MomentBasis::single(generate_basis(group, degree, rules, extra)?));
        }
        sets.extend(bases);
        Ok(sets)
    }

    fn estimate_n_vars(&self) -> usize {
        let per_block = self.monomial_sets.iter().map(|b| {
            let n = b.len();
            let cells = n * (n + 1) / 2;
            if self.config.normalized {
                cells.saturating_sub(1)
            } else {
                cells
            }
        });
        self.parameters.len() + per_block.sum::<usize>()
    }

    /// Builds the relaxation of a problem, replacing any previous build.
    ///
    /// # Errors
    ///
    /// Configuration errors for invalid levels, missing bases or bad
    /// constraints, and algebraic errors from the substitution rules.
    pub fn build(&mut self, problem: Problem) -> Result<()> {
        let Problem {
            level,
            objective,
            extra_objective,
            substitutions,
            constraints,
            extra_monomials,
            bases,
            ppt,
            extra_moment_matrices,
        } = problem;
        if level < -1 {
            return Err(RelaxationError::InvalidLevel(level));
        }
        self.log_summary();

        let rules = substitutions.with_max_rewrites(self.config.max_rewrites);
        let pure_rules = rules.pure_subset();
        let objective = objective.unwrap_or_else(Polynomial::zero);
        let complex = rules.is_complex() || objective.is_complex() || constraints.is_complex();
        let monomial_sets = self.generate_monomial_sets(level, &rules, &extra_monomials, bases)?;

        let no_subs = MomentSubstitutions::default();
        let (moment_subs, _) = split_moment_equalities(
            &Canonicalizer::new(&rules, &pure_rules, &no_subs, !complex),
            &constraints.moment_equalities,
            complex,
        )?;

        self.built = false;
        self.level = level;
        self.rules = rules;
        self.pure_rules = pure_rules;
        self.moment_subs = moment_subs;
        self.complex = complex;
        self.monomial_sets = monomial_sets;
        self.asm = ConstraintAssembler::new();
        self.index = MonomialIndex::new();
        self.constraint_sizes.clear();
        self.constraint_bases.clear();
        self.constraints_hash = None;
        self.degree_warned = false;
        self.elimination = None;
        self.solution = None;
        debug!(estimate = self.estimate_n_vars(), "estimated number of SDP variables");

        let one = Complex64::new(1.0, 0.0);
        if !self.parameters.is_empty() {
            let size = i64::try_from(self.parameters.len()).unwrap_or(i64::MAX);
            let block = self.asm.add_block(-size);
            for (k, &param) in self.parameters.iter().enumerate() {
                let (var, _) = self.index.lookup_or_create(&Word::from(param));
                let row = self.asm.blocks().cell_row(block, k, k);
                self.asm.push(row, var, one);
            }
        }

        let canon = Canonicalizer::new(&self.rules, &self.pure_rules, &self.moment_subs, !self.complex);
        let generator = MomentGenerator {
            canon,
            normalized: self.config.normalized,
            parallel: &self.config.parallel,
        };
        let principal = self.asm.blocks().len();
        for basis in &self.monomial_sets {
            let size = i64::try_from(basis.len()).unwrap_or(i64::MAX);
            let block = self.asm.add_block(size);
            generator.generate(&mut self.asm, &mut self.index, block, basis, ppt && basis.is_product())?;
        }
        debug!(n_vars = self.index.n_vars(), "moment matrices generated");

        if let Some(basis) = self.monomial_sets.first() {
            for extra in &extra_moment_matrices {
                let size = i64::try_from(basis.len()).unwrap_or(i64::MAX);
                let block = self.asm.add_block(size);
                if extra.copy {
                    self.asm.copy_block(principal, block);
                } else {
                    self.asm.fresh_block(block, &mut self.index);
                }
                if extra.ppt {
                    self.asm.impose_ppt(block, basis.a().len(), basis.b().len());
                }
            }
        }

        let terms = canon.resolve_polynomial(&mut self.index, &objective, IndexMode::Create)?;
        let (obj, constant) = split_objective(&terms, self.index.n_vars());
        self.objective = obj;
        self.constant_term = constant;
        if let Some(e) = &extra_objective {
            add_extra_objective(&mut self.objective, &mut self.constant_term, &self.asm, e)?;
        }

        self.constraint_start = self.asm.blocks().len();
        self.watermark = self.index.n_vars();
        self.apply_constraints(&constraints, true)?;
        self.built = true;
        info!(
            n_vars = self.n_vars(),
            blocks = self.asm.blocks().len(),
            rows = self.asm.blocks().total_rows(),
            "relaxation built"
        );
        Ok(())
    }

    /// Replaces the constraints of a built relaxation.
    ///
    /// Calling it again with an identical constraint set does nothing.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::NotBuilt`] before a build,
    /// [`RelaxationError::AlreadyEliminated`] after equality elimination,
    /// [`RelaxationError::BlockMismatch`] if the constraint blocks change
    /// size and [`RelaxationError::MomentSubstitutionsChanged`] if the
    /// simple moment equalities change.
    pub fn process_constraints(&mut self, constraints: &Constraints) -> Result<()> {
        if !self.built {
            return Err(RelaxationError::NotBuilt);
        }
        self.apply_constraints(constraints, false)
    }

    /// Localizing monomials of the polynomial constraint at `position`.
    fn localizing_set(
        &mut self,
        position: usize,
        g: &Polynomial,
        overrides: Option<&[Option<Vec<Word>>]>,
    ) -> Result<Vec<Word>> {
        let degree = g.degree();
        // level -1 has no degree budget, so it always warns
        let beyond = i64::try_from(degree).unwrap_or(i64::MAX) > 2 * i64::from(self.level);
        if beyond && !self.degree_warned {
            warn!(
                degree,
                level = self.level,
                "a constraint has degree beyond the relaxation level; choose a higher level or supply the necessary monomials"
            );
            self.degree_warned = true;
        }

        if let Some(Some(set)) = overrides.and_then(|o| o.get(position)) {
            if set.is_empty() {
                return Ok(vec![Word::identity()]);
            }
            return Ok(unique_words(set.clone()));
        }

        let mut symbols = g.symbols();
        symbols.retain(|s| !self.parameters.iter().any(|p| p.id() == *s));
        let group = find_variable_group(&self.groups, &symbols)
            .ok_or(RelaxationError::MixedVariableGroups { index: position })?;
        let basis = self.monomial_sets.get(group).map_or(&[][..], MomentBasis::a);
        let order = localization_order(self.level, degree);
        Ok(unique_words(localizing_monomials(basis, order)))
    }

    fn apply_constraints(&mut self, constraints: &Constraints, first: bool) -> Result<()> {
        if self.elimination.is_some() {
            return Err(RelaxationError::AlreadyEliminated);
        }
        let hash = constraints.content_hash();
        if !first && self.constraints_hash == Some(hash) {
            debug!("constraints unchanged");
            return Ok(());
        }

        let (subs, simple) = split_moment_equalities(
            &Canonicalizer::new(&self.rules, &self.pure_rules, &self.moment_subs, !self.complex),
            &constraints.moment_equalities,
            self.complex,
        )?;
        if subs != self.moment_subs {
            return Err(RelaxationError::MomentSubstitutionsChanged);
        }

        let expected = constraints.inequalities.len() + constraints.equalities.len();
        let overrides = constraints.localizing_monomials.as_deref();
        if let Some(o) = overrides {
            if o.len() != expected {
                return Err(RelaxationError::LocalizingOverrideCount {
                    expected,
                    given: o.len(),
                });
            }
        }

        let remove = constraints.remove_equalities;
        let mut pending = Vec::new();
        let mut eliminate = Vec::new();
        for (k, g) in constraints.inequalities.iter().enumerate() {
            let monomials = self.localizing_set(k, g, overrides)?;
            pending.push(Pending::Localizing {
                g: g.clone(),
                monomials,
            });
        }
        let offset = constraints.inequalities.len();
        for (k, g) in constraints.equalities.iter().enumerate() {
            if remove {
                let degree = g.degree();
                if let Ok(level) = usize::try_from(self.level) {
                    if degree > 2 * level {
                        return Err(RelaxationError::EqualityDegree {
                            degree,
                            needed: degree.div_ceil(2),
                        });
                    }
                }
            }
            let monomials = self.localizing_set(offset + k, g, overrides)?;
            if remove {
                eliminate.push(EqualitySource::Localizing {
                    g: g.clone(),
                    monomials,
                });
            } else {
                pending.push(Pending::Localizing {
                    g: g.clone(),
                    monomials: monomials.clone(),
                });
                pending.push(Pending::Localizing { g: g.neg(), monomials });
            }
        }
        for m in &constraints.moment_inequalities {
            pending.push(Pending::moment(m));
        }
        for (m, &consumed) in constraints.moment_equalities.iter().zip(&simple) {
            if consumed {
                continue;
            }
            if remove {
                eliminate.push(EqualitySource::Moment(m.clone()));
            } else {
                pending.push(Pending::moment(m));
                pending.push(Pending::moment(&m.neg()));
            }
        }

        let sizes: Vec<i64> = pending.iter().map(Pending::size).collect();
        if !first && sizes != self.constraint_sizes {
            return Err(RelaxationError::BlockMismatch {
                expected: self.constraint_sizes.clone(),
                found: sizes,
            });
        }

        // assemble into copies; the built state only changes on success
        let mut asm = self.asm.clone();
        let mut index = self.index.clone();
        let mut objective = self.objective.clone();
        let mut constant_term = self.constant_term;
        asm.truncate_blocks(self.constraint_start);
        index.truncate(self.watermark);
        asm.set_n_vars(self.watermark);
        objective.resize(self.watermark, 0.0);

        let canon = Canonicalizer::new(&self.rules, &self.pure_rules, &self.moment_subs, !self.complex);
        let localizer = LocalizingGenerator {
            canon,
            parallel: &self.config.parallel,
        };
        let total = pending.len();
        for (k, item) in pending.iter().enumerate() {
            let block = asm.add_block(item.size());
            match item {
                Pending::Localizing { g, monomials } => {
                    localizer.generate(&mut asm, &mut index, block, monomials, g)?;
                }
                Pending::Expr(e) => write_moment_expr(&mut asm, block, e)?,
            }
            debug!(constraint = k + 1, total, block, "constraint processed");
        }

        let mut elimination = None;
        if !eliminate.is_empty() {
            if self.complex {
                return Err(RelaxationError::ComplexElimination);
            }
            let mut term_lists = Vec::new();
            for source in &eliminate {
                match source {
                    EqualitySource::Localizing { g, monomials } => {
                        for (r, left) in monomials.iter().enumerate() {
                            for right in &monomials[r..] {
                                let poly = g.sandwich(&left.adjoint(), right);
                                term_lists.push(canon.resolve_polynomial(&mut index, &poly, IndexMode::Create)?);
                            }
                        }
                    }
                    EqualitySource::Moment(MomentConstraint::Poly(p)) => {
                        term_lists.push(canon.resolve_polynomial(&mut index, p, IndexMode::Create)?);
                    }
                    EqualitySource::Moment(MomentConstraint::Expr(e)) => {
                        term_lists.push(moment_expr_terms(&asm, e)?);
                    }
                }
            }

            let n_vars = index.n_vars();
            asm.set_n_vars(n_vars);
            objective.resize(n_vars, 0.0);
            let rows: Vec<Vec<Complex64>> = term_lists.iter().map(|t| dense_row(t, n_vars)).collect();
            if let Some(elim) = Elimination::compute(&rows, n_vars, self.config.elimination_tolerance)? {
                let f = elim.transform_f(asm.f(), &self.config.parallel)?;
                asm.replace_f(f);
                let (reduced, shift) = elim.transform_objective(&objective);
                objective = reduced;
                constant_term += shift;
                info!(
                    before = elim.original_n_vars(),
                    after = elim.n_vars(),
                    "equality constraints removed"
                );
                elimination = Some(elim);
            }
        }
        if elimination.is_none() {
            let n_vars = index.n_vars();
            asm.set_n_vars(n_vars);
            objective.resize(n_vars, 0.0);
        }

        self.asm = asm;
        self.index = index;
        self.objective = objective;
        self.constant_term = constant_term;
        self.elimination = elimination;
        self.solution = None;
        self.constraint_bases = pending.into_iter().map(Pending::into_basis).collect();
        self.constraint_sizes = sizes;
        self.constraints_hash = Some(hash);
        debug!(n_vars = self.n_vars(), "constraints processed");
        Ok(())
    }

    /// Replaces the objective of a built relaxation.
    ///
    /// Every monomial of the objective must already have a variable.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::NotBuilt`] before a build,
    /// [`RelaxationError::MonomialNotFound`] for unknown monomials and
    /// [`RelaxationError::InvalidMomentReference`] for a bad extra term.
    pub fn set_objective(&mut self, objective: Option<&Polynomial>, extra: Option<&MomentExpr>) -> Result<()> {
        if !self.built {
            return Err(RelaxationError::NotBuilt);
        }
        let zero = Polynomial::zero();
        let canon = Canonicalizer::new(&self.rules, &self.pure_rules, &self.moment_subs, !self.complex);
        let terms = canon.resolve_polynomial(&mut self.index, objective.unwrap_or(&zero), IndexMode::Lookup)?;
        let (mut obj, mut constant) = split_objective(&terms, self.index.n_vars());
        if let Some(elim) = &self.elimination {
            let (reduced, shift) = elim.transform_objective(&obj);
            obj = reduced;
            constant += shift;
        }
        if let Some(e) = extra {
            add_extra_objective(&mut obj, &mut constant, &self.asm, e)?;
        }
        obj.resize(self.n_vars(), 0.0);
        self.objective = obj;
        self.constant_term = constant;
        self.solution = None;
        Ok(())
    }

    /// The real problem handed to solvers and writers.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::NotBuilt`] before a build.
    pub fn lifted(&self) -> Result<LiftedProblem> {
        if !self.built {
            return Err(RelaxationError::NotBuilt);
        }
        let needs_lift = self.complex || has_imaginary(self.asm.f());
        let (block_struct, f) = lift(self.asm.blocks(), self.asm.f(), needs_lift);
        Ok(LiftedProblem {
            block_struct,
            f,
            objective: self.objective.clone(),
            constant_term: self.constant_term,
        })
    }

    /// SDPA-style sparse entries of the lifted problem.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::NotBuilt`] before a build.
    pub fn sdpa_entries(&self) -> Result<Vec<SdpaEntry>> {
        Ok(self.lifted()?.sdpa_entries())
    }

    /// Every block cell spelled out in monomials.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::NotBuilt`] before a build.
    pub fn human_readable(&self, table: &SymbolTable) -> Result<HumanReadable> {
        if !self.built {
            return Err(RelaxationError::NotBuilt);
        }
        let names: Vec<String> = if self.elimination.is_some() {
            Vec::new()
        } else {
            (1..=self.n_vars())
                .map(|k| {
                    self.index
                        .word(k)
                        .map_or_else(|| format!("y{k}"), |w| w.display(table).to_string())
                })
                .collect()
        };
        Ok(human_readable(
            self.asm.blocks(),
            self.asm.f(),
            &self.objective,
            self.constant_term,
            &names,
        ))
    }

    /// Solves the relaxation and stores the solution.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::NotBuilt`] before a build, and whatever the
    /// solver reports.
    pub fn solve(&mut self, solver: &dyn SdpSolver, params: &SolverParams) -> Result<&SdpSolution> {
        let problem = self.lifted()?;
        let raw = solver.solve(&problem, params)?;
        let moments = match &self.elimination {
            Some(elim) => elim.expand_back(&raw.x_vec),
            None => raw.x_vec.clone(),
        };
        info!(
            solver = solver.name(),
            primal = raw.primal + self.constant_term,
            dual = raw.dual + self.constant_term,
            status = ?raw.status,
            "relaxation solved"
        );
        Ok(&*self.solution.insert(SdpSolution {
            primal: raw.primal + self.constant_term,
            dual: raw.dual + self.constant_term,
            x_mat: raw.x_mat,
            y_mat: raw.y_mat,
            x_vec: raw.x_vec,
            moments,
            status: raw.status,
            solver: solver.name().to_string(),
        }))
    }

    fn solved(&self) -> Result<&SdpSolution> {
        self.solution.as_ref().ok_or(RelaxationError::NotSolved)
    }

    /// Moment value of a polynomial in the current solution.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::NotSolved`] without a solution and
    /// [`RelaxationError::MonomialNotFound`] for unknown monomials.
    pub fn value_of(&self, poly: &Polynomial) -> Result<Complex64> {
        let solution = self.solved()?;
        let canon = Canonicalizer::new(&self.rules, &self.pure_rules, &self.moment_subs, !self.complex);
        let reduced = canon.reduce(poly)?;
        let mut value = Complex64::new(0.0, 0.0);
        for (word, coeff) in reduced.terms() {
            let term = canon.lookup(&self.index, word, *coeff)?;
            let moment = if term.var == CONSTANT {
                1.0
            } else {
                solution.moments.get(term.var - 1).copied().unwrap_or(0.0)
            };
            value += term.coeff * moment;
        }
        Ok(value)
    }

    /// Dual value `⟨F_k, Y⟩` of the variables of a monomial, summed over
    /// the selected blocks (all blocks when `None`).
    ///
    /// # Errors
    ///
    /// [`RelaxationError::NotSolved`] without a solution,
    /// [`RelaxationError::AlreadyEliminated`] after equality elimination
    /// and [`RelaxationError::MonomialNotFound`] for unknown monomials.
    pub fn extract_dual_value(&self, monomial: &Word, blocks: Option<&[usize]>) -> Result<f64> {
        let solution = self.solved()?;
        if self.elimination.is_some() {
            return Err(RelaxationError::AlreadyEliminated);
        }
        let canon = Canonicalizer::new(&self.rules, &self.pure_rules, &self.moment_subs, !self.complex);
        let reduced = canon.reduce(&Polynomial::from(monomial.clone()))?;
        let problem = self.lifted()?;
        let structure = &problem.block_struct;
        let all: Vec<usize> = (0..structure.len()).collect();
        let selected = blocks.unwrap_or(&all[..]);

        let by_var = problem.by_variable();
        let mut result = 0.0;
        for (word, coeff) in reduced.terms() {
            let term = canon.lookup(&self.index, word, *coeff)?;
            let mut inner = 0.0;
            for (row, value) in by_var.row_iter(term.var) {
                let Some((b, i, j)) = structure.locate(row) else {
                    continue;
                };
                if !selected.contains(&b) {
                    continue;
                }
                let Some(y) = solution.y_mat.get(b) else {
                    continue;
                };
                let at = |r: usize, c: usize| y.get((r, c)).copied().unwrap_or(0.0);
                inner += value * at(i, j);
                if i != j {
                    inner += value * at(j, i);
                }
            }
            result += term.coeff.re * inner;
        }
        Ok(result)
    }

    /// Index of the first moment block.
    fn principal_block(&self) -> usize {
        usize::from(!self.parameters.is_empty())
    }

    /// The basis pairing solution blocks with monomials.
    fn analysis_basis(&self) -> Result<&[Word]> {
        if self.complex {
            return Err(RelaxationError::UnmatchedBlocks(
                "complex relaxations are solved in lifted form".into(),
            ));
        }
        match self.monomial_sets.as_slice() {
            [basis] if !basis.is_product() => Ok(basis.a()),
            _ => Err(RelaxationError::UnmatchedBlocks(
                "post-processing needs exactly one moment matrix over a single basis".into(),
            )),
        }
    }

    /// Ranks of the moment-matrix solution by degree. Equal consecutive
    /// ranks indicate a rank loop.
    ///
    /// `x_mat` stands in for the solved moment matrix; see
    /// [`solution_ranks`] for `base_level`.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::NotBuilt`] before a build,
    /// [`RelaxationError::NotSolved`] with neither a solution nor `x_mat`,
    /// and [`RelaxationError::UnmatchedBlocks`] when the moment matrix
    /// cannot be paired with a basis.
    pub fn find_solution_ranks(&self, x_mat: Option<&DMatrix<f64>>, base_level: usize) -> Result<Vec<usize>> {
        if !self.built {
            return Err(RelaxationError::NotBuilt);
        }
        let basis = self.analysis_basis()?;
        let x = match x_mat {
            Some(x) => x,
            None => self
                .solved()?
                .x_mat
                .get(self.principal_block())
                .ok_or_else(|| RelaxationError::UnmatchedBlocks("the solution has no moment block".into()))?,
        };
        if x.nrows() != basis.len() || x.ncols() != basis.len() {
            return Err(RelaxationError::UnmatchedBlocks(format!(
                "a {}x{} moment matrix for {} monomials",
                x.nrows(),
                x.ncols(),
                basis.len()
            )));
        }
        Ok(solution_ranks(x, basis, self.level, base_level))
    }

    /// Sum-of-squares decomposition of the dual solution: the polynomial
    /// of the moment block, then one per constraint block.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::NotSolved`] without a solution,
    /// [`RelaxationError::UnmatchedBlocks`] when blocks cannot be paired
    /// with monomials and [`RelaxationError::NegativeEigenvalue`] for an
    /// indefinite dual block.
    pub fn sos_decomposition(&self, threshold: f64) -> Result<Vec<Polynomial>> {
        let solution = self.solved()?;
        let basis = self.analysis_basis()?;
        if solution.y_mat.len() != self.asm.blocks().len() {
            return Err(RelaxationError::UnmatchedBlocks(format!(
                "{} dual blocks for {} blocks",
                solution.y_mat.len(),
                self.asm.blocks().len()
            )));
        }
        let canon = Canonicalizer::new(&self.rules, &self.pure_rules, &self.moment_subs, !self.complex);
        let constraint_blocks = self
            .constraint_bases
            .iter()
            .enumerate()
            .map(|(k, words)| (self.constraint_start + k, words.as_slice()));
        std::iter::once((self.principal_block(), basis))
            .chain(constraint_blocks)
            .map(|(block, words)| {
                let y = &solution.y_mat[block];
                if y.nrows() != words.len() {
                    return Err(RelaxationError::UnmatchedBlocks(format!(
                        "dual block {block} has {} rows for {} monomials",
                        y.nrows(),
                        words.len()
                    )));
                }
                canon.reduce(&sos_polynomial(y, words, threshold, block)?)
            })
            .collect()
    }

    /// Signed block sizes.
    #[must_use]
    pub fn block_struct(&self) -> &[i64] {
        self.asm.blocks().sizes()
    }

    /// The block structure with row offsets.
    #[must_use]
    pub fn blocks(&self) -> &BlockStructure {
        self.asm.blocks()
    }

    /// The constraint structure, before complex lifting.
    #[must_use]
    pub fn f(&self) -> &SparseRows<Complex64> {
        self.asm.f()
    }

    /// Objective coefficients of the variables.
    #[must_use]
    pub fn obj_facvar(&self) -> &[f64] {
        &self.objective
    }

    /// Constant part of the objective.
    #[must_use]
    pub fn constant_term(&self) -> f64 {
        self.constant_term
    }

    /// Number of SDP variables.
    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.asm.f().num_cols().saturating_sub(1)
    }

    /// The monomial index.
    #[must_use]
    pub fn monomial_index(&self) -> &MonomialIndex {
        &self.index
    }

    /// The bases of the moment blocks.
    #[must_use]
    pub fn monomial_sets(&self) -> &[MomentBasis] {
        &self.monomial_sets
    }

    /// Returns true if the relaxation needs complex lifting.
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.complex
    }

    /// Returns true once [`Relaxation::build`] has succeeded.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// The equality elimination, if one was performed.
    #[must_use]
    pub fn elimination(&self) -> Option<&Elimination> {
        self.elimination.as_ref()
    }

    /// The last solution, if any.
    #[must_use]
    pub fn solution(&self) -> Option<&SdpSolution> {
        self.solution.as_ref()
    }

    /// Relaxation level of the last build.
    #[must_use]
    pub fn level(&self) -> i32 {
        self.level
    }
}
