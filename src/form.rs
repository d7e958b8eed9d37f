//! Weak forms as sums of integrals over marked measures.
use crate::expr::Expr;
use std::fmt;
use std::fmt::Display;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Integration domain of an integral.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Measure {
    /// The whole mesh.
    Domain,
    /// Cells carrying the given volume marker.
    Volume(usize),
    /// Vertices carrying the given surface marker.
    Surface(usize),
}

impl Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Domain => write!(f, "dx"),
            Measure::Volume(id) => write!(f, "dx({})", id),
            Measure::Surface(id) => write!(f, "ds({})", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Integral {
    pub integrand: Expr,
    pub measure: Measure,
}

impl Integral {
    pub fn new(integrand: Expr, measure: Measure) -> Self {
        Self { integrand, measure }
    }
}

impl Neg for Integral {
    type Output = Integral;

    fn neg(self) -> Integral {
        Integral::new(-self.integrand, self.measure)
    }
}

impl Mul<Measure> for Expr {
    type Output = Integral;

    fn mul(self, measure: Measure) -> Integral {
        Integral::new(self, measure)
    }
}

impl Mul<Measure> for &Expr {
    type Output = Integral;

    fn mul(self, measure: Measure) -> Integral {
        Integral::new(self.clone(), measure)
    }
}

/// An ordered sum of integrals.
///
/// Term order is preserved so that forms built from the same inputs compare equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form {
    integrals: Vec<Integral>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integrals(&self) -> &[Integral] {
        &self.integrals
    }

    pub fn len(&self) -> usize {
        self.integrals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.integrals.is_empty()
    }

    pub fn push(&mut self, integral: Integral) {
        self.integrals.push(integral);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Integral> {
        self.integrals.iter()
    }
}

impl From<Integral> for Form {
    fn from(integral: Integral) -> Self {
        Self {
            integrals: vec![integral],
        }
    }
}

impl AddAssign<Integral> for Form {
    fn add_assign(&mut self, integral: Integral) {
        self.push(integral);
    }
}

impl SubAssign<Integral> for Form {
    fn sub_assign(&mut self, integral: Integral) {
        self.push(-integral);
    }
}

impl AddAssign<Form> for Form {
    fn add_assign(&mut self, other: Form) {
        self.integrals.extend(other.integrals);
    }
}

impl Add<Form> for Form {
    type Output = Form;

    fn add(mut self, other: Form) -> Form {
        self += other;
        self
    }
}

impl Sub<Form> for Form {
    type Output = Form;

    fn sub(mut self, other: Form) -> Form {
        self.integrals
            .extend(other.integrals.into_iter().map(Neg::neg));
        self
    }
}

impl Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.integrals.is_empty() {
            return write!(f, "0");
        }
        for (i, integral) in self.integrals.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{} * {}", integral.integrand, integral.measure)?;
        }
        Ok(())
    }
}
