use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, RealField};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum BandError {
    /// A pivot column contained only zeros below (and including) the diagonal.
    SingularMatrix { column: usize },
    /// The right-hand side does not match the dimension of the matrix.
    DimensionMismatch { expected: usize, actual: usize },
}

impl Display for BandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            BandError::SingularMatrix { column } => {
                write!(f, "Matrix is singular: no non-zero pivot found in column {}.", column)
            }
            BandError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {} entries, got {}.", expected, actual)
            }
        }
    }
}

impl Error for BandError {}

/// A square matrix whose non-zeros satisfy `i - lower <= j <= i + upper`.
///
/// Each row stores the columns `i - lower ..= i + upper + lower`. The extra `lower`
/// super-diagonals are zero on construction and absorb the fill-in produced by row
/// interchanges during factorization.
#[derive(Debug, Clone, PartialEq)]
pub struct BandMatrix<T> {
    n: usize,
    lower: usize,
    upper: usize,
    width: usize,
    data: Vec<T>,
}

impl<T> BandMatrix<T>
where
    T: RealField + Copy,
{
    pub fn zeros(n: usize, lower: usize, upper: usize) -> Self {
        let width = 2 * lower + upper + 1;
        Self {
            n,
            lower,
            upper,
            width,
            data: vec![T::zero(); n * width],
        }
    }

    pub fn nrows(&self) -> usize {
        self.n
    }

    pub fn lower_bandwidth(&self) -> usize {
        self.lower
    }

    pub fn upper_bandwidth(&self) -> usize {
        self.upper
    }

    /// Whether `(i, j)` lies inside the band given at construction.
    pub fn in_band(&self, i: usize, j: usize) -> bool {
        i < self.n && j < self.n && j + self.lower >= i && j <= i + self.upper
    }

    #[inline(always)]
    fn offset(&self, i: usize, j: usize) -> usize {
        debug_assert!(j + self.lower >= i && j <= i + self.upper + self.lower);
        i * self.width + (j + self.lower - i)
    }

    /// Returns the entry at `(i, j)`, which is zero outside of the band.
    pub fn get(&self, i: usize, j: usize) -> T {
        if self.in_band(i, j) {
            self.data[self.offset(i, j)]
        } else {
            T::zero()
        }
    }

    /// Adds `value` to the entry at `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if `(i, j)` is outside of the band.
    pub fn add_to(&mut self, i: usize, j: usize, value: T) {
        assert!(self.in_band(i, j), "Entry ({}, {}) is outside of the band.", i, j);
        let idx = self.offset(i, j);
        self.data[idx] += value;
    }

    pub fn set(&mut self, i: usize, j: usize, value: T) {
        assert!(self.in_band(i, j), "Entry ({}, {}) is outside of the band.", i, j);
        let idx = self.offset(i, j);
        self.data[idx] = value;
    }

    pub fn fill_zero(&mut self) {
        self.data.iter_mut().for_each(|x| *x = T::zero());
    }

    /// Replaces row `i` by the corresponding row of the identity matrix.
    pub fn set_identity_row(&mut self, i: usize) {
        let first = i.saturating_sub(self.lower);
        let last = (i + self.upper).min(self.n - 1);
        for j in first..=last {
            self.set(i, j, T::zero());
        }
        self.set(i, i, T::one());
    }

    /// Computes `y = A x`.
    pub fn mul_vector(&self, x: &DVector<T>) -> DVector<T> {
        assert_eq!(x.len(), self.n);
        DVector::from_fn(self.n, |i, _| {
            let first = i.saturating_sub(self.lower);
            let last = (i + self.upper).min(self.n - 1);
            (first..=last).fold(T::zero(), |acc, j| acc + self.get(i, j) * x[j])
        })
    }

    pub fn to_dense(&self) -> DMatrix<T> {
        DMatrix::from_fn(self.n, self.n, |i, j| self.get(i, j))
    }

    /// Computes the LU factorization with partial (row) pivoting, consuming the matrix.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn factor(mut self) -> Result<BandLu<T>, BandError> {
        let n = self.n;
        let lower = self.lower;
        let reach = self.upper + self.lower;
        let mut pivots = Vec::with_capacity(n);
        let mut multipliers = vec![T::zero(); n * lower];

        for k in 0..n {
            let last_row = (k + lower).min(n - 1);
            let last_col = (k + reach).min(n - 1);

            let mut pivot_row = k;
            let mut pivot_abs = self.data[self.offset(k, k)].abs();
            for r in (k + 1)..=last_row {
                let candidate = self.data[self.offset(r, k)].abs();
                if candidate > pivot_abs {
                    pivot_abs = candidate;
                    pivot_row = r;
                }
            }

            if pivot_abs == 0.0 {
                return Err(BandError::SingularMatrix { column: k });
            }

            if pivot_row != k {
                for c in k..=last_col {
                    let a = self.offset(k, c);
                    let b = self.offset(pivot_row, c);
                    self.data.swap(a, b);
                }
            }
            pivots.push(pivot_row);

            let pivot = self.data[self.offset(k, k)];
            for r in (k + 1)..=last_row {
                let idx = self.offset(r, k);
                let m = self.data[idx] / pivot;
                self.data[idx] = T::zero();
                multipliers[k * lower + (r - k - 1)] = m;
                if m != 0.0 {
                    for c in (k + 1)..=last_col {
                        let target = self.offset(r, c);
                        let source = self.offset(k, c);
                        let update = m * self.data[source];
                        self.data[target] -= update;
                    }
                }
            }
        }

        Ok(BandLu {
            factors: self,
            pivots,
            multipliers,
        })
    }
}

/// LU factors of a [`BandMatrix`].
#[derive(Debug, Clone)]
pub struct BandLu<T> {
    factors: BandMatrix<T>,
    pivots: Vec<usize>,
    // Row k holds the multipliers used to eliminate the `lower` rows below pivot k
    multipliers: Vec<T>,
}

impl<T> BandLu<T>
where
    T: RealField + Copy,
{
    /// Solves `A x = b`, writing `x` into `solution`.
    pub fn solve_into(&self, mut solution: DVectorViewMut<T>, rhs: DVectorView<T>) -> Result<(), BandError> {
        let n = self.factors.n;
        if rhs.len() != n || solution.len() != n {
            return Err(BandError::DimensionMismatch {
                expected: n,
                actual: rhs.len().min(solution.len()),
            });
        }
        let lower = self.factors.lower;
        let reach = self.factors.upper + self.factors.lower;

        solution.copy_from(&rhs);

        // Forward substitution with the recorded row interchanges
        for k in 0..n {
            let p = self.pivots[k];
            if p != k {
                solution.swap_rows(k, p);
            }
            let last_row = (k + lower).min(n - 1);
            let b_k = solution[k];
            for r in (k + 1)..=last_row {
                let m = self.multipliers[k * lower + (r - k - 1)];
                solution[r] -= m * b_k;
            }
        }

        // Back substitution
        for k in (0..n).rev() {
            let last_col = (k + reach).min(n - 1);
            let mut acc = solution[k];
            for c in (k + 1)..=last_col {
                acc -= self.factors.data[self.factors.offset(k, c)] * solution[c];
            }
            solution[k] = acc / self.factors.data[self.factors.offset(k, k)];
        }

        Ok(())
    }

    pub fn solve(&self, rhs: &DVector<T>) -> Result<DVector<T>, BandError> {
        let mut x = DVector::zeros(rhs.len());
        self.solve_into(DVectorViewMut::from(&mut x), DVectorView::from(rhs))?;
        Ok(x)
    }
}
