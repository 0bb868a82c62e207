//! Symbolic expressions as handed over by the caller.
//!
//! [`Expr`] is a small tagged tree over constants, operator letters,
//! sums and (ordered) products. It is the boundary type: everything the
//! relaxation engine consumes is first expanded into a [`Polynomial`].

use std::ops::{Add, Mul, Neg, Sub};

use num_complex::Complex64;
use num_traits::{One, Zero};

use crate::poly::Polynomial;
use crate::symbol::Letter;
use crate::word::Word;

/// A symbolic expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A scalar constant.
    Constant(Complex64),
    /// A single operator.
    Variable(Letter),
    /// Sum of expressions.
    Sum(Vec<Expr>),
    /// Ordered product of expressions.
    Product(Vec<Expr>),
}

impl Expr {
    /// A scalar constant.
    pub fn constant(c: impl Into<Complex64>) -> Self {
        Self::Constant(c.into())
    }

    /// The imaginary unit.
    #[must_use]
    pub fn i() -> Self {
        Self::Constant(Complex64::i())
    }

    /// Raises the expression to a non-negative integer power.
    #[must_use]
    pub fn pow(self, n: u32) -> Self {
        match n {
            0 => Self::Constant(Complex64::one()),
            1 => self,
            _ => Self::Product(vec![self; n as usize]),
        }
    }

    /// Returns the adjoint (conjugate transpose) of the expression.
    #[must_use]
    pub fn adjoint(&self) -> Self {
        match self {
            Self::Constant(c) => Self::Constant(c.conj()),
            Self::Variable(l) => Self::Variable(l.dagger()),
            Self::Sum(args) => Self::Sum(args.iter().map(Self::adjoint).collect()),
            Self::Product(args) => Self::Product(args.iter().rev().map(Self::adjoint).collect()),
        }
    }

    /// Expands the expression into a polynomial.
    #[must_use]
    pub fn expand(&self) -> Polynomial {
        match self {
            Self::Constant(c) => Polynomial::constant(*c),
            Self::Variable(l) => Polynomial::from(Word::from_letter(*l)),
            Self::Sum(args) => args
                .iter()
                .fold(Polynomial::zero(), |acc, arg| acc.add(&arg.expand())),
            Self::Product(args) => args
                .iter()
                .fold(Polynomial::one(), |acc, arg| acc.mul(&arg.expand())),
        }
    }

    /// The relation `self >= rhs`.
    pub fn ge(self, rhs: impl Into<Self>) -> Relation {
        Relation::new(self, rhs.into(), RelationKind::GreaterEq)
    }

    /// The relation `self <= rhs`.
    pub fn le(self, rhs: impl Into<Self>) -> Relation {
        Relation::new(self, rhs.into(), RelationKind::LessEq)
    }

    /// The relation `self == rhs`.
    pub fn equals(self, rhs: impl Into<Self>) -> Relation {
        Relation::new(self, rhs.into(), RelationKind::Equal)
    }

    fn is_zero_constant(&self) -> bool {
        matches!(self, Self::Constant(c) if c.is_zero())
    }
}

impl From<Letter> for Expr {
    fn from(letter: Letter) -> Self {
        Self::Variable(letter)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::Constant(Complex64::new(value, 0.0))
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Self::Constant(Complex64::new(f64::from(value), 0.0))
    }
}

impl From<Complex64> for Expr {
    fn from(value: Complex64) -> Self {
        Self::Constant(value)
    }
}

impl<T: Into<Expr>> Add<T> for Expr {
    type Output = Expr;

    fn add(self, rhs: T) -> Expr {
        let rhs = rhs.into();
        if rhs.is_zero_constant() {
            return self;
        }
        match self {
            Expr::Sum(mut args) => {
                args.push(rhs);
                Expr::Sum(args)
            }
            lhs => Expr::Sum(vec![lhs, rhs]),
        }
    }
}

impl<T: Into<Expr>> Sub<T> for Expr {
    type Output = Expr;

    fn sub(self, rhs: T) -> Expr {
        self + (-rhs.into())
    }
}

impl<T: Into<Expr>> Mul<T> for Expr {
    type Output = Expr;

    fn mul(self, rhs: T) -> Expr {
        match self {
            Expr::Product(mut args) => {
                args.push(rhs.into());
                Expr::Product(args)
            }
            lhs => Expr::Product(vec![lhs, rhs.into()]),
        }
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        match self {
            Expr::Constant(c) => Expr::Constant(-c),
            other => Expr::Product(vec![Expr::Constant(-Complex64::one()), other]),
        }
    }
}

impl<T: Into<Expr>> Add<T> for Letter {
    type Output = Expr;

    fn add(self, rhs: T) -> Expr {
        Expr::from(self) + rhs
    }
}

impl<T: Into<Expr>> Sub<T> for Letter {
    type Output = Expr;

    fn sub(self, rhs: T) -> Expr {
        Expr::from(self) - rhs
    }
}

impl<T: Into<Expr>> Mul<T> for Letter {
    type Output = Expr;

    fn mul(self, rhs: T) -> Expr {
        Expr::from(self) * rhs
    }
}

impl Neg for Letter {
    type Output = Expr;

    fn neg(self) -> Expr {
        -Expr::from(self)
    }
}

macro_rules! scalar_lhs_ops {
    ($scalar:ty => $($rhs:ty),*) => {$(
        impl Add<$rhs> for $scalar {
            type Output = Expr;
            fn add(self, rhs: $rhs) -> Expr {
                Expr::from(self) + rhs
            }
        }

        impl Sub<$rhs> for $scalar {
            type Output = Expr;
            fn sub(self, rhs: $rhs) -> Expr {
                Expr::from(self) - rhs
            }
        }

        impl Mul<$rhs> for $scalar {
            type Output = Expr;
            fn mul(self, rhs: $rhs) -> Expr {
                Expr::from(self) * rhs
            }
        }
    )*};
}

scalar_lhs_ops!(f64 => Expr, Letter);
scalar_lhs_ops!(i32 => Expr, Letter);

/// Direction of a relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    /// `lhs >= rhs`
    GreaterEq,
    /// `lhs <= rhs`
    LessEq,
    /// `lhs == rhs`
    Equal,
}

/// A relation between two expressions.
#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    lhs: Expr,
    rhs: Expr,
    kind: RelationKind,
}

impl Relation {
    /// Creates a relation.
    #[must_use]
    pub fn new(lhs: Expr, rhs: Expr, kind: RelationKind) -> Self {
        Self { lhs, rhs, kind }
    }

    /// Returns the direction of the relation.
    #[must_use]
    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Converts to the polynomial `g` with `g >= 0` (or `g == 0`).
    #[must_use]
    pub fn to_polynomial(&self) -> Polynomial {
        let lhs = self.lhs.expand();
        let rhs = self.rhs.expand();
        match self.kind {
            RelationKind::GreaterEq | RelationKind::Equal => lhs.sub(&rhs),
            RelationKind::LessEq => rhs.sub(&lhs),
        }
    }
}
