//! Symbolic scalar expressions in one spatial dimension.
//!
//! An [`Expr`] is a closed algebraic tree over the coordinate `x`, the time `t`, shared
//! parameters, discrete functions and test function placeholders. Expressions are folded
//! on construction, so that e.g. `0 * a` becomes `0` and `exp(0)` becomes `1`. This keeps
//! derivatives obtained through [`Expr::grad`] and [`Expr::diff`] compact.
//!
//! Weak forms are built from expressions that are linear in the test placeholders
//! [`Expr::test`] and [`Expr::test_grad`]. The assembler extracts the coefficients of the
//! test placeholders with [`Expr::diff`] and differentiates them once more with respect
//! to the unknown in order to form Jacobians.
use crate::space::Function;
use parking_lot::RwLock;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::sync::Arc;

/// A named scalar value that can be changed after expressions referencing it are built.
///
/// Clones share the same value. Two parameters compare equal only if they share storage.
#[derive(Clone)]
pub struct Parameter {
    name: Arc<str>,
    value: Arc<RwLock<f64>>,
}

impl Parameter {
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: Arc::from(name),
            value: Arc::new(RwLock::new(value)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> f64 {
        *self.value.read()
    }

    pub fn set(&self, value: f64) {
        *self.value.write() = value;
    }

    pub fn ptr_eq(&self, other: &Parameter) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Parameter({} = {})", self.name, self.get())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparison {
    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Less => lhs < rhs,
            Comparison::LessOrEqual => lhs <= rhs,
            Comparison::Greater => lhs > rhs,
            Comparison::GreaterOrEqual => lhs >= rhs,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
        }
    }
}

/// The location at which an expression is evaluated.
///
/// Coefficients are evaluated through the cell index and the reference coordinate
/// `xi` in `[-1, 1]`, while `x` is the corresponding physical coordinate.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EvaluationPoint {
    pub cell: usize,
    pub xi: f64,
    pub x: f64,
    pub t: f64,
}

/// The independent variable of a partial derivative taken with [`Expr::diff`].
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    /// Value of a component of a discrete function.
    Value(Function, usize),
    /// Spatial derivative of a component of a discrete function.
    Gradient(Function, usize),
    Test(usize),
    TestGradient(usize),
    Time,
}

impl Variable {
    fn matches(&self, expr: &Expr) -> bool {
        match (self, expr) {
            (Variable::Value(f, i), Expr::Coefficient { function, component }) => {
                f.ptr_eq(function) && i == component
            }
            (Variable::Gradient(f, i), Expr::CoefficientGrad { function, component }) => {
                f.ptr_eq(function) && i == component
            }
            (Variable::Test(i), Expr::Test(k)) => i == k,
            (Variable::TestGradient(i), Expr::TestGrad(k)) => i == k,
            (Variable::Time, Expr::Time) => true,
            _ => false,
        }
    }
}

#[derive(Clone)]
pub enum Expr {
    Constant(f64),
    X,
    Time,
    Parameter(Parameter),
    /// A sub-expression evaluated at the time held by its own clock instead of the global time.
    Timed {
        expr: Arc<Expr>,
        clock: Parameter,
    },
    Coefficient {
        function: Function,
        component: usize,
    },
    CoefficientGrad {
        function: Function,
        component: usize,
    },
    Test(usize),
    TestGrad(usize),
    Neg(Arc<Expr>),
    Add(Arc<Expr>, Arc<Expr>),
    Sub(Arc<Expr>, Arc<Expr>),
    Mul(Arc<Expr>, Arc<Expr>),
    Div(Arc<Expr>, Arc<Expr>),
    Powi(Arc<Expr>, i32),
    Exp(Arc<Expr>),
    Ln(Arc<Expr>),
    Sqrt(Arc<Expr>),
    Sin(Arc<Expr>),
    Cos(Arc<Expr>),
    /// Evaluates to 1 where the comparison holds and 0 elsewhere.
    Indicator(Arc<Expr>, Comparison, Arc<Expr>),
}

impl Expr {
    pub fn constant(value: f64) -> Self {
        Expr::Constant(value)
    }

    pub fn zero() -> Self {
        Expr::Constant(0.0)
    }

    pub fn one() -> Self {
        Expr::Constant(1.0)
    }

    pub fn x() -> Self {
        Expr::X
    }

    pub fn time() -> Self {
        Expr::Time
    }

    pub fn parameter(parameter: &Parameter) -> Self {
        Expr::Parameter(parameter.clone())
    }

    /// Wraps `expr` so that it is evaluated at the time stored in `clock`.
    ///
    /// Constants are returned unchanged.
    pub fn timed(expr: Expr, clock: &Parameter) -> Self {
        match expr {
            Expr::Constant(_) => expr,
            expr => Expr::Timed {
                expr: Arc::new(expr),
                clock: clock.clone(),
            },
        }
    }

    pub fn coefficient(function: &Function, component: usize) -> Self {
        Expr::Coefficient {
            function: function.clone(),
            component,
        }
    }

    pub fn coefficient_grad(function: &Function, component: usize) -> Self {
        Expr::CoefficientGrad {
            function: function.clone(),
            component,
        }
    }

    pub fn test(component: usize) -> Self {
        Expr::Test(component)
    }

    pub fn test_grad(component: usize) -> Self {
        Expr::TestGrad(component)
    }

    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Expr::Constant(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_constant() == Some(0.0)
    }

    pub fn is_one(&self) -> bool {
        self.as_constant() == Some(1.0)
    }

    pub fn powi(self, n: i32) -> Self {
        match (self.as_constant(), n) {
            (Some(value), _) => Expr::Constant(value.powi(n)),
            (_, 0) => Expr::one(),
            (_, 1) => self,
            _ => Expr::Powi(Arc::new(self), n),
        }
    }

    pub fn exp(self) -> Self {
        fold_unary(self, f64::exp, Expr::Exp)
    }

    pub fn ln(self) -> Self {
        fold_unary(self, f64::ln, Expr::Ln)
    }

    pub fn sqrt(self) -> Self {
        fold_unary(self, f64::sqrt, Expr::Sqrt)
    }

    pub fn sin(self) -> Self {
        fold_unary(self, f64::sin, Expr::Sin)
    }

    pub fn cos(self) -> Self {
        fold_unary(self, f64::cos, Expr::Cos)
    }

    pub fn compare(self, comparison: Comparison, rhs: impl Into<Expr>) -> Self {
        let rhs = rhs.into();
        match (self.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) => Expr::Constant(if comparison.holds(a, b) { 1.0 } else { 0.0 }),
            _ => Expr::Indicator(Arc::new(self), comparison, Arc::new(rhs)),
        }
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Self {
        self.compare(Comparison::Less, rhs)
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Self {
        self.compare(Comparison::LessOrEqual, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Self {
        self.compare(Comparison::Greater, rhs)
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Self {
        self.compare(Comparison::GreaterOrEqual, rhs)
    }

    /// Evaluates the expression at the given point.
    ///
    /// Test placeholders evaluate to zero. Residual integrands must therefore be split into
    /// their test coefficients with [`Expr::diff`] before evaluation.
    pub fn eval(&self, point: &EvaluationPoint) -> f64 {
        match self {
            Expr::Constant(value) => *value,
            Expr::X => point.x,
            Expr::Time => point.t,
            Expr::Parameter(parameter) => parameter.get(),
            Expr::Timed { expr, clock } => expr.eval(&EvaluationPoint {
                t: clock.get(),
                ..*point
            }),
            Expr::Coefficient { function, component } => function.evaluate_in_cell(point.cell, point.xi, *component),
            Expr::CoefficientGrad { function, component } => function.gradient_in_cell(point.cell, *component),
            Expr::Test(_) | Expr::TestGrad(_) => 0.0,
            Expr::Neg(a) => -a.eval(point),
            Expr::Add(a, b) => a.eval(point) + b.eval(point),
            Expr::Sub(a, b) => a.eval(point) - b.eval(point),
            Expr::Mul(a, b) => a.eval(point) * b.eval(point),
            Expr::Div(a, b) => a.eval(point) / b.eval(point),
            Expr::Powi(a, n) => a.eval(point).powi(*n),
            Expr::Exp(a) => a.eval(point).exp(),
            Expr::Ln(a) => a.eval(point).ln(),
            Expr::Sqrt(a) => a.eval(point).sqrt(),
            Expr::Sin(a) => a.eval(point).sin(),
            Expr::Cos(a) => a.eval(point).cos(),
            Expr::Indicator(a, comparison, b) => {
                if comparison.holds(a.eval(point), b.eval(point)) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Evaluates an expression that only depends on `x` and `t`.
    ///
    /// Coefficients are not available without a cell and must not appear in the expression.
    pub fn eval_at(&self, x: f64, t: f64) -> f64 {
        self.eval(&EvaluationPoint { cell: 0, xi: 0.0, x, t })
    }

    /// Total derivative with respect to the spatial coordinate.
    ///
    /// Coefficients are piecewise linear, so the derivative of a coefficient gradient vanishes.
    pub fn grad(&self) -> Expr {
        self.derivative(&|leaf| match leaf {
            Expr::X => Expr::one(),
            Expr::Coefficient { function, component } => Expr::coefficient_grad(function, *component),
            Expr::Test(k) => Expr::TestGrad(*k),
            Expr::Timed { expr, clock } => Expr::timed(expr.grad(), clock),
            _ => Expr::zero(),
        })
    }

    /// Partial derivative with respect to `variable`.
    ///
    /// All other leaves are held fixed. Sub-expressions running on their own clock do not
    /// depend on the global time.
    pub fn diff(&self, variable: &Variable) -> Expr {
        self.derivative(&|leaf| {
            if variable.matches(leaf) {
                Expr::one()
            } else {
                match (leaf, variable) {
                    (Expr::Timed { .. }, Variable::Time) => Expr::zero(),
                    (Expr::Timed { expr, clock }, _) => Expr::timed(expr.diff(variable), clock),
                    _ => Expr::zero(),
                }
            }
        })
    }

    fn derivative(&self, leaf: &dyn Fn(&Expr) -> Expr) -> Expr {
        let d = |e: &Arc<Expr>| e.derivative(leaf);
        match self {
            Expr::Neg(a) => -d(a),
            Expr::Add(a, b) => d(a) + d(b),
            Expr::Sub(a, b) => d(a) - d(b),
            Expr::Mul(a, b) => d(a) * b.as_ref() + a.as_ref() * d(b),
            Expr::Div(a, b) => d(a) / b.as_ref() - a.as_ref() * d(b) / b.as_ref().clone().powi(2),
            Expr::Powi(a, n) => f64::from(*n) * a.as_ref().clone().powi(n - 1) * d(a),
            Expr::Exp(a) => self * d(a),
            Expr::Ln(a) => d(a) / a.as_ref(),
            Expr::Sqrt(a) => d(a) / (2.0 * self),
            Expr::Sin(a) => a.as_ref().clone().cos() * d(a),
            Expr::Cos(a) => -a.as_ref().clone().sin() * d(a),
            Expr::Indicator(..) => Expr::zero(),
            _ => leaf(self),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Arc<Expr>> {
        match self {
            Expr::Timed { expr, .. } => vec![expr],
            Expr::Neg(a)
            | Expr::Powi(a, _)
            | Expr::Exp(a)
            | Expr::Ln(a)
            | Expr::Sqrt(a)
            | Expr::Sin(a)
            | Expr::Cos(a) => vec![a],
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Indicator(a, _, b) => {
                vec![a, b]
            }
            _ => Vec::new(),
        }
    }

    /// Returns true if any node of the tree satisfies the predicate.
    pub fn any(&self, predicate: &dyn Fn(&Expr) -> bool) -> bool {
        predicate(self) || self.children().into_iter().any(|child| child.any(predicate))
    }

    pub fn contains_test(&self) -> bool {
        self.any(&|e| matches!(e, Expr::Test(_) | Expr::TestGrad(_)))
    }

    /// Returns true if the expression depends on the global time.
    pub fn depends_on_time(&self) -> bool {
        match self {
            Expr::Time => true,
            Expr::Timed { .. } => false,
            _ => self
                .children()
                .into_iter()
                .any(|child| child.depends_on_time()),
        }
    }

    /// Returns true if the expression references the given function.
    pub fn references(&self, function: &Function) -> bool {
        self.any(&|e| match e {
            Expr::Coefficient { function: f, .. } | Expr::CoefficientGrad { function: f, .. } => f.ptr_eq(function),
            _ => false,
        })
    }
}

fn fold_unary(expr: Expr, op: fn(f64) -> f64, build: fn(Arc<Expr>) -> Expr) -> Expr {
    match expr.as_constant() {
        Some(value) => Expr::Constant(op(value)),
        None => build(Arc::new(expr)),
    }
}

fn sum(a: Expr, b: Expr) -> Expr {
    match (a.as_constant(), b.as_constant()) {
        (Some(x), Some(y)) => Expr::Constant(x + y),
        (Some(x), _) if x == 0.0 => b,
        (_, Some(y)) if y == 0.0 => a,
        _ => Expr::Add(Arc::new(a), Arc::new(b)),
    }
}

fn difference(a: Expr, b: Expr) -> Expr {
    match (a.as_constant(), b.as_constant()) {
        (Some(x), Some(y)) => Expr::Constant(x - y),
        (Some(x), _) if x == 0.0 => -b,
        (_, Some(y)) if y == 0.0 => a,
        _ => Expr::Sub(Arc::new(a), Arc::new(b)),
    }
}

fn product(a: Expr, b: Expr) -> Expr {
    match (a.as_constant(), b.as_constant()) {
        (Some(x), Some(y)) => Expr::Constant(x * y),
        (Some(x), _) | (_, Some(x)) if x == 0.0 => Expr::zero(),
        (Some(x), _) if x == 1.0 => b,
        (_, Some(y)) if y == 1.0 => a,
        _ => Expr::Mul(Arc::new(a), Arc::new(b)),
    }
}

fn quotient(a: Expr, b: Expr) -> Expr {
    match (a.as_constant(), b.as_constant()) {
        (Some(x), Some(y)) if y != 0.0 => Expr::Constant(x / y),
        (Some(x), _) if x == 0.0 => Expr::zero(),
        (_, Some(y)) if y == 1.0 => a,
        _ => Expr::Div(Arc::new(a), Arc::new(b)),
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        match self {
            Expr::Constant(value) => Expr::Constant(-value),
            Expr::Neg(inner) => inner.as_ref().clone(),
            expr => Expr::Neg(Arc::new(expr)),
        }
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        -self.clone()
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $build:ident) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(self, rhs)
            }
        }

        impl $trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $build(self, rhs.clone())
            }
        }

        impl $trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(self.clone(), rhs)
            }
        }

        impl $trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $build(self.clone(), rhs.clone())
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                $build(self, Expr::Constant(rhs))
            }
        }

        impl $trait<f64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                $build(self.clone(), Expr::Constant(rhs))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(Expr::Constant(self), rhs)
            }
        }

        impl $trait<&Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $build(Expr::Constant(self), rhs.clone())
            }
        }
    };
}

impl_binary_op!(Add, add, sum);
impl_binary_op!(Sub, sub, difference);
impl_binary_op!(Mul, mul, product);
impl_binary_op!(Div, div, quotient);

impl AddAssign<Expr> for Expr {
    fn add_assign(&mut self, rhs: Expr) {
        let lhs = std::mem::replace(self, Expr::zero());
        *self = sum(lhs, rhs);
    }
}

impl SubAssign<Expr> for Expr {
    fn sub_assign(&mut self, rhs: Expr) {
        let lhs = std::mem::replace(self, Expr::zero());
        *self = difference(lhs, rhs);
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Constant(value)
    }
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}

impl From<&Parameter> for Expr {
    fn from(parameter: &Parameter) -> Self {
        Expr::parameter(parameter)
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Constant(a), Expr::Constant(b)) => a == b,
            (Expr::X, Expr::X) | (Expr::Time, Expr::Time) => true,
            (Expr::Parameter(a), Expr::Parameter(b)) => a.ptr_eq(b),
            // Clocks are recreated whenever a form is rebuilt
            (Expr::Timed { expr: a, .. }, Expr::Timed { expr: b, .. }) => a == b,
            (
                Expr::Coefficient { function: f, component: i },
                Expr::Coefficient { function: g, component: j },
            )
            | (
                Expr::CoefficientGrad { function: f, component: i },
                Expr::CoefficientGrad { function: g, component: j },
            ) => {
                f.ptr_eq(g) && i == j
            }
            (Expr::Test(i), Expr::Test(j)) | (Expr::TestGrad(i), Expr::TestGrad(j)) => i == j,
            (Expr::Neg(a), Expr::Neg(b))
            | (Expr::Exp(a), Expr::Exp(b))
            | (Expr::Ln(a), Expr::Ln(b))
            | (Expr::Sqrt(a), Expr::Sqrt(b))
            | (Expr::Sin(a), Expr::Sin(b))
            | (Expr::Cos(a), Expr::Cos(b)) => a == b,
            (Expr::Powi(a, n), Expr::Powi(b, m)) => n == m && a == b,
            (Expr::Add(a1, b1), Expr::Add(a2, b2))
            | (Expr::Sub(a1, b1), Expr::Sub(a2, b2))
            | (Expr::Mul(a1, b1), Expr::Mul(a2, b2))
            | (Expr::Div(a1, b1), Expr::Div(a2, b2)) => a1 == a2 && b1 == b2,
            (Expr::Indicator(a1, c1, b1), Expr::Indicator(a2, c2, b2)) => c1 == c2 && a1 == a2 && b1 == b2,
            _ => false,
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(value) => write!(f, "{}", value),
            Expr::X => write!(f, "x"),
            Expr::Time => write!(f, "t"),
            Expr::Parameter(parameter) => write!(f, "{}", parameter.name()),
            Expr::Timed { expr, clock } => write!(f, "{{{}}}@{}", expr, clock.name()),
            Expr::Coefficient { function, component } => write!(f, "{}[{}]", function.name(), component),
            Expr::CoefficientGrad { function, component } => write!(f, "grad({}[{}])", function.name(), component),
            Expr::Test(k) => write!(f, "v[{}]", k),
            Expr::TestGrad(k) => write!(f, "grad(v[{}])", k),
            Expr::Neg(a) => write!(f, "-({})", a),
            Expr::Add(a, b) => write!(f, "({} + {})", a, b),
            Expr::Sub(a, b) => write!(f, "({} - {})", a, b),
            Expr::Mul(a, b) => write!(f, "{} * {}", a, b),
            Expr::Div(a, b) => write!(f, "{} / ({})", a, b),
            Expr::Powi(a, n) => write!(f, "({})^{}", a, n),
            Expr::Exp(a) => write!(f, "exp({})", a),
            Expr::Ln(a) => write!(f, "ln({})", a),
            Expr::Sqrt(a) => write!(f, "sqrt({})", a),
            Expr::Sin(a) => write!(f, "sin({})", a),
            Expr::Cos(a) => write!(f, "cos({})", a),
            Expr::Indicator(a, comparison, b) => write!(f, "[{} {} {}]", a, comparison.symbol(), b),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Sub-expressions running on their own clocks.
///
/// Forms wrap user-supplied expressions with [`SubExpressions::register`]. The simulation then
/// advances every registered clock with [`SubExpressions::set_time`] before each solve.
#[derive(Debug, Clone, Default)]
pub struct SubExpressions {
    clocks: Vec<Parameter>,
    exprs: Vec<Expr>,
}

impl SubExpressions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `expr` with a fresh clock and records it. Constants are returned unchanged.
    pub fn register(&mut self, expr: Expr) -> Expr {
        let clock = Parameter::new("t", 0.0);
        let timed = Expr::timed(expr, &clock);
        if let Expr::Timed { .. } = timed {
            self.clocks.push(clock);
            self.exprs.push(timed.clone());
        }
        timed
    }

    /// Records an expression whose clock is managed elsewhere.
    pub fn push(&mut self, expr: Expr) {
        if let Expr::Timed { clock, .. } = &expr {
            self.clocks.push(clock.clone());
            self.exprs.push(expr);
        }
    }

    pub fn extend(&mut self, other: SubExpressions) {
        self.clocks.extend(other.clocks);
        self.exprs.extend(other.exprs);
    }

    pub fn set_time(&self, t: f64) {
        for clock in &self.clocks {
            clock.set(t);
        }
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Expr> {
        self.exprs.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Expr> {
        self.exprs.get(index)
    }
}
