//! Dense LU factorization of the Newton Jacobian.
//!
//! The system is assembled in an `ndarray` buffer and factored with
//! `nalgebra`'s partial-pivoting LU. A pivot is rejected only when it is
//! negligible next to the entries of its own column, so nodes that are held by
//! tiny junction conductances next to a stiff source still factor.
use nalgebra::{DMatrix, DVector, Dyn, LU};
use ndarray::{Array1, Array2};

use super::error::LuError;

/// Pivots smaller than this fraction of their column's largest entry are treated as zero.
const PIVOT_TOLERANCE: f64 = 1e-13;

#[derive(Debug, Clone)]
pub(crate) struct DenseLu {
    lu: LU<f64, Dyn, Dyn>,
}

impl DenseLu {
    pub(crate) fn factor(a: &Array2<f64>) -> Result<Self, LuError> {
        let n = a.nrows();
        let lu = DMatrix::from_fn(n, n, |r, c| a[[r, c]]).lu();

        // rows are permuted but columns are not, so u[k][k] belongs to column k of `a`
        let u = lu.u();
        for (column, pivot) in u.diagonal().iter().enumerate() {
            let scale = a
                .column(column)
                .iter()
                .fold(0.0_f64, |acc, x| acc.max(x.abs()));
            if !pivot.is_finite() || pivot.abs() <= scale * PIVOT_TOLERANCE {
                return Err(LuError::Singular { column });
            }
        }

        Ok(Self { lu })
    }

    /// Solve `A x = b` with the stored factors. `b` must match the factored
    /// dimension; a mismatch is a caller bug and panics inside `nalgebra`.
    pub(crate) fn solve(&self, b: &Array1<f64>) -> Result<Vec<f64>, LuError> {
        let rhs = DVector::from_iterator(b.len(), b.iter().copied());
        let x = self.lu.solve(&rhs).ok_or_else(|| LuError::Singular {
            column: self
                .lu
                .u()
                .diagonal()
                .iter()
                .position(|d| *d == 0.0)
                .unwrap_or_default(),
        })?;
        Ok(x.iter().copied().collect())
    }
}
