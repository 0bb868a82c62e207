//! Constraint sets and affine moment expressions.

use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;

use num_complex::Complex64;
use rustc_hash::FxHasher;

use ncsdp_algebra::{Polynomial, Relation, RelationKind, Word};

use crate::canonical::MomentValue;
use crate::error::{RelaxationError, Result};

/// One `coeff * block[i, j]` term of a [`MomentExpr`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MomentTerm {
    /// Multiplier of the cell.
    pub coeff: f64,
    /// Block index in the block structure.
    pub block: usize,
    /// Row of the cell.
    pub i: usize,
    /// Column of the cell.
    pub j: usize,
}

/// An affine combination of block cells, `Σ cᵢ · block[i, j] + c₀`.
///
/// The textual form is `2*0[0,1] - 1[0,0] + 0.5`: a term is an optional
/// `coefficient*`, a block index and a bracketed cell; a bare number is
/// the constant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MomentExpr {
    /// Cell terms.
    pub terms: Vec<MomentTerm>,
    /// Constant part.
    pub constant: f64,
}

impl MomentExpr {
    /// Creates an expression with no terms.
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Adds `coeff * block[i, j]`.
    #[must_use]
    pub fn term(mut self, coeff: f64, block: usize, i: usize, j: usize) -> Self {
        self.terms.push(MomentTerm { coeff, block, i, j });
        self
    }

    /// Flips the sign of every term and the constant.
    #[must_use]
    pub fn neg(&self) -> Self {
        Self {
            terms: self
                .terms
                .iter()
                .map(|t| MomentTerm { coeff: -t.coeff, ..*t })
                .collect(),
            constant: -self.constant,
        }
    }
}

fn sign_prefix(first: bool, negative: bool) -> &'static str {
    match (first, negative) {
        (true, true) => "-",
        (true, false) => "",
        (false, true) => " - ",
        (false, false) => " + ",
    }
}

impl fmt::Display for MomentExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for t in &self.terms {
            f.write_str(sign_prefix(first, t.coeff < 0.0))?;
            first = false;
            let c = t.coeff.abs();
            if (c - 1.0).abs() > f64::EPSILON {
                write!(f, "{c}*")?;
            }
            write!(f, "{}[{},{}]", t.block, t.i, t.j)?;
        }
        if self.constant != 0.0 || self.terms.is_empty() {
            f.write_str(sign_prefix(first, self.constant < 0.0))?;
            write!(f, "{}", self.constant.abs())?;
        }
        Ok(())
    }
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> RelaxationError {
        RelaxationError::MomentExprParse {
            input: self.input.to_string(),
            reason: format!("{} at offset {}", reason.into(), self.pos),
        }
    }

    fn skip_ws(&mut self) {
        let rest = &self.input[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.input[self.pos..].chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    /// An unsigned decimal number, with optional fraction and exponent.
    fn number(&mut self) -> Result<&'a str> {
        self.skip_ws();
        let bytes = self.input.as_bytes();
        let start = self.pos;
        let mut end = start;
        while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
            end += 1;
        }
        if end > start && end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut k = end + 1;
            if k < bytes.len() && (bytes[k] == b'+' || bytes[k] == b'-') {
                k += 1;
            }
            if k < bytes.len() && bytes[k].is_ascii_digit() {
                while k < bytes.len() && bytes[k].is_ascii_digit() {
                    k += 1;
                }
                end = k;
            }
        }
        if end == start {
            return Err(self.error("expected a number"));
        }
        self.pos = end;
        Ok(&self.input[start..end])
    }

    fn index(&mut self) -> Result<usize> {
        let text = self.number()?;
        text.parse().map_err(|_| self.error(format!("invalid index '{text}'")))
    }

    fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }
}

impl FromStr for MomentExpr {
    type Err = RelaxationError;

    fn from_str(s: &str) -> Result<Self> {
        let mut cur = Cursor::new(s);
        let mut expr = Self::default();
        if cur.at_end() {
            return Err(cur.error("empty expression"));
        }

        let mut first = true;
        while !cur.at_end() {
            let negative = if cur.eat('-') {
                true
            } else if cur.eat('+') {
                false
            } else if first {
                false
            } else {
                return Err(cur.error("expected '+' or '-'"));
            };
            first = false;
            let sign = if negative { -1.0 } else { 1.0 };

            let lead = cur.number()?;
            let (coeff, block) = if cur.eat('*') {
                let c: f64 = lead
                    .parse()
                    .map_err(|_| cur.error(format!("invalid number '{lead}'")))?;
                (c, cur.index()?)
            } else if cur.peek() == Some('[') {
                let b = lead
                    .parse()
                    .map_err(|_| cur.error(format!("invalid index '{lead}'")))?;
                (1.0, b)
            } else {
                let c: f64 = lead
                    .parse()
                    .map_err(|_| cur.error(format!("invalid number '{lead}'")))?;
                expr.constant += sign * c;
                continue;
            };

            cur.expect('[')?;
            let i = cur.index()?;
            cur.expect(',')?;
            let j = cur.index()?;
            cur.expect(']')?;
            expr.terms.push(MomentTerm {
                coeff: sign * coeff,
                block,
                i,
                j,
            });
        }
        Ok(expr)
    }
}

/// A constraint stated directly on moments, materialized as a 1×1 block.
#[derive(Clone, Debug, PartialEq)]
pub enum MomentConstraint {
    /// Every monomial of the polynomial stands for its moment.
    Poly(Polynomial),
    /// An affine combination of existing cells.
    Expr(MomentExpr),
}

impl MomentConstraint {
    /// Returns the negated constraint.
    #[must_use]
    pub fn neg(&self) -> Self {
        match self {
            Self::Poly(p) => Self::Poly(p.neg()),
            Self::Expr(e) => Self::Expr(e.neg()),
        }
    }

    /// Returns true if the constraint carries imaginary coefficients.
    #[must_use]
    pub fn is_complex(&self) -> bool {
        match self {
            Self::Poly(p) => p.is_complex(),
            Self::Expr(_) => false,
        }
    }
}

impl From<Polynomial> for MomentConstraint {
    fn from(p: Polynomial) -> Self {
        Self::Poly(p)
    }
}

impl From<MomentExpr> for MomentConstraint {
    fn from(e: MomentExpr) -> Self {
        Self::Expr(e)
    }
}

impl From<Relation> for MomentConstraint {
    fn from(r: Relation) -> Self {
        Self::Poly(r.to_polynomial())
    }
}

/// Everything that becomes constraint blocks after the moment matrices.
///
/// Polynomial constraints read as `g >= 0` and `g == 0`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Constraints {
    /// Localizing constraints `g >= 0`.
    pub inequalities: Vec<Polynomial>,
    /// Localizing constraints `g == 0`.
    pub equalities: Vec<Polynomial>,
    /// 1×1 blocks `m >= 0`.
    pub moment_inequalities: Vec<MomentConstraint>,
    /// Moment constraints `m == 0`.
    pub moment_equalities: Vec<MomentConstraint>,
    /// Eliminate equalities numerically instead of splitting them into
    /// opposite inequalities.
    pub remove_equalities: bool,
    /// Per-constraint localizing monomials for the inequalities followed
    /// by the equalities; `None` entries are chosen automatically.
    pub localizing_monomials: Option<Vec<Option<Vec<Word>>>>,
}

impl Constraints {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an inequality `g >= 0`.
    #[must_use]
    pub fn inequality(mut self, g: impl Into<Polynomial>) -> Self {
        self.inequalities.push(g.into());
        self
    }

    /// Adds an equality `g == 0`.
    #[must_use]
    pub fn equality(mut self, g: impl Into<Polynomial>) -> Self {
        self.equalities.push(g.into());
        self
    }

    /// Adds a relation, sorting it by kind.
    #[must_use]
    pub fn relation(self, r: &Relation) -> Self {
        match r.kind() {
            RelationKind::Equal => self.equality(r.to_polynomial()),
            RelationKind::GreaterEq | RelationKind::LessEq => self.inequality(r.to_polynomial()),
        }
    }

    /// Adds a moment inequality.
    #[must_use]
    pub fn moment_inequality(mut self, m: impl Into<MomentConstraint>) -> Self {
        self.moment_inequalities.push(m.into());
        self
    }

    /// Adds a moment equality.
    #[must_use]
    pub fn moment_equality(mut self, m: impl Into<MomentConstraint>) -> Self {
        self.moment_equalities.push(m.into());
        self
    }

    /// Turns numerical elimination of equalities on or off.
    #[must_use]
    pub fn remove_equalities(mut self, remove: bool) -> Self {
        self.remove_equalities = remove;
        self
    }

    /// Sets per-constraint localizing monomials.
    #[must_use]
    pub fn localizing_monomials(mut self, sets: Vec<Option<Vec<Word>>>) -> Self {
        self.localizing_monomials = Some(sets);
        self
    }

    /// Returns true if no constraint is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inequalities.is_empty()
            && self.equalities.is_empty()
            && self.moment_inequalities.is_empty()
            && self.moment_equalities.is_empty()
    }

    /// Hash of the textual form of the whole set.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write(format!("{self:?}").as_bytes());
        hasher.finish()
    }

    /// Returns true if any polynomial carries imaginary coefficients.
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.inequalities.iter().any(Polynomial::is_complex)
            || self.equalities.iter().any(Polynomial::is_complex)
            || self.moment_inequalities.iter().any(MomentConstraint::is_complex)
            || self.moment_equalities.iter().any(MomentConstraint::is_complex)
    }
}

/// Recognizes a moment equality that pins one moment.
///
/// `a·w + b = 0` gives `w = -b/a`; `a·w₁ + b·w₂ = 0` expresses the larger
/// of the two words through the smaller one. Returns `None` for any other
/// shape, including a lone constant.
#[must_use]
pub fn simple_moment_substitution(poly: &Polynomial) -> Option<(Word, MomentValue)> {
    let zero = Complex64::new(0.0, 0.0);
    match poly.terms() {
        [(w, _)] if !w.is_identity() => Some((w.clone(), MomentValue::Constant(zero))),
        [(one, b), (w, a)] if one.is_identity() && !w.is_identity() => {
            Some((w.clone(), MomentValue::Constant(-*b / *a)))
        }
        [(w1, a), (w2, b)] if !w1.is_identity() => {
            // terms are sorted, so w2 is the larger word
            debug_assert!(w1 < w2);
            Some((
                w2.clone(),
                MomentValue::Scaled {
                    ratio: -*a / *b,
                    word: w1.clone(),
                },
            ))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncsdp_algebra::SymbolTable;

    #[test]
    fn test_parse_moment_expr() {
        let e: MomentExpr = "2*0[0,1] - 1[0,0] + 0.5".parse().unwrap();
        assert_eq!(
            e,
            MomentExpr::constant(0.5).term(2.0, 0, 0, 1).term(-1.0, 1, 0, 0)
        );

        let e: MomentExpr = "-0[1, 2] +1.5e1* 2[0,0]-3".parse().unwrap();
        assert_eq!(e.terms[0], MomentTerm { coeff: -1.0, block: 0, i: 1, j: 2 });
        assert_eq!(e.terms[1], MomentTerm { coeff: 15.0, block: 2, i: 0, j: 0 });
        assert_eq!(e.constant, -3.0);
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "0[1,2", "2*[0,0]", "0[0,0] 1[0,0]", "x", "1.2[0,0]"] {
            let err = bad.parse::<MomentExpr>().unwrap_err();
            assert!(matches!(err, RelaxationError::MomentExprParse { .. }), "{bad}");
        }
    }

    #[test]
    fn test_display_and_neg() {
        let e: MomentExpr = "2*0[0,1] - 1[0,0] + 0.5".parse().unwrap();
        assert_eq!(e.to_string(), "2*0[0,1] - 1[0,0] + 0.5");
        assert_eq!(e.neg().to_string(), "-2*0[0,1] + 1[0,0] - 0.5");
        assert_eq!(e.to_string().parse::<MomentExpr>().unwrap(), e);
    }

    #[test]
    fn test_content_hash() {
        let mut table = SymbolTable::new();
        let x = Word::from(table.hermitian("X"));
        let a = Constraints::new().inequality(Polynomial::one().sub(&Polynomial::from(x.clone())));
        let b = a.clone();
        assert_eq!(a.content_hash(), b.content_hash());
        let c = a.clone().remove_equalities(true);
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_simple_substitutions() {
        let mut table = SymbolTable::new();
        let x = Word::from(table.hermitian("X"));
        let y = Word::from(table.hermitian("Y"));
        let c = |v: f64| Complex64::new(v, 0.0);

        // 2X - 1 = 0
        let p = Polynomial::monomial(x.clone(), 2.0).sub(&Polynomial::one());
        assert_eq!(simple_moment_substitution(&p), Some((x.clone(), MomentValue::Constant(c(0.5)))));

        // X - 2Y = 0: Y = X / 2
        let p = Polynomial::from(x.clone()).sub(&Polynomial::monomial(y.clone(), 2.0));
        assert_eq!(
            simple_moment_substitution(&p),
            Some((y.clone(), MomentValue::Scaled { ratio: c(0.5), word: x.clone() }))
        );

        let p = Polynomial::from(x).add(&Polynomial::from(y)).add(&Polynomial::one());
        assert_eq!(simple_moment_substitution(&p), None);
        assert_eq!(simple_moment_substitution(&Polynomial::one()), None);
    }
}
