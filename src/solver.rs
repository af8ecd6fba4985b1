//! # Linear and nonlinear solvers
//!
//! Sparse matrices are factorized directly: the unknowns are reordered with
//! reverse Cuthill-McKee and the permuted matrix is decomposed with a banded
//! LU. Nonlinear systems are solved with a damped Newton method on top of it.
#![allow(clippy::module_name_repetitions)]
pub mod banded;
pub mod newton;
pub mod reorder;
pub mod sparse;
pub use banded::BandedLu;
pub use newton::{newton, NewtonReport, NonlinearProblem};
pub use sparse::{CsrMatrix, Triplets};

use crate::error::Result;
use ndarray::{Array1, ArrayBase, Data, DataMut, Ix1};

/// Solve linear algebraic systems of the form: M x = b.
pub trait Solve {
    /// Solves M x = b and writes x into `output`
    fn solve<S1, S2>(&self, input: &ArrayBase<S1, Ix1>, output: &mut ArrayBase<S2, Ix1>)
    where
        S1: Data<Elem = f64>,
        S2: DataMut<Elem = f64>;

    /// Solves M x = b, returns x
    fn solve_vec<S1: Data<Elem = f64>>(&self, input: &ArrayBase<S1, Ix1>) -> Array1<f64> {
        let mut output = Array1::zeros(input.len());
        self.solve(input, &mut output);
        output
    }
}

/// Direct solver for general sparse matrices
#[derive(Debug, Clone)]
pub struct SparseLu {
    /// Row `i` of the factorized matrix is row `perm[i]` of the input
    perm: Vec<usize>,
    lu: BandedLu,
}

impl SparseLu {
    /// Reorder and factorize
    ///
    /// # Errors
    /// Singular matrix
    pub fn from_matrix(a: &CsrMatrix) -> Result<Self> {
        let perm = reorder::reverse_cuthill_mckee(&a.adjacency());
        let lu = BandedLu::from_matrix(&a.permute(&perm))?;
        tracing::trace!(n = lu.n, kl = lu.kl, ku = lu.ku, "factorized sparse matrix");
        Ok(Self { perm, lu })
    }

    /// Size of the system
    pub fn len(&self) -> usize {
        self.perm.len()
    }

    /// Empty system
    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }
}

impl Solve for SparseLu {
    fn solve<S1, S2>(&self, input: &ArrayBase<S1, Ix1>, output: &mut ArrayBase<S2, Ix1>)
    where
        S1: Data<Elem = f64>,
        S2: DataMut<Elem = f64>,
    {
        let mut b = Array1::from_shape_fn(self.perm.len(), |i| input[self.perm[i]]);
        self.lu.solve_inplace(&mut b);
        for (i, &p) in self.perm.iter().enumerate() {
            output[p] = b[i];
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::prelude::*;

    fn approx_eq(result: &Array1<f64>, expected: &Array1<f64>) {
        let dif = 1e-9;
        for (a, b) in expected.iter().zip(result.iter()) {
            if (a - b).abs() > dif {
                panic!("Large difference of values, got {} expected {}.", b, a)
            }
        }
    }

    #[test]
    fn test_sparse_lu_scattered_pattern() {
        // Laplacian of a ring with a long-range coupling and shuffled labels
        let n = 40;
        let label = |i: usize| (i * 13) % n;
        let mut t = Triplets::default();
        for i in 0..n {
            let (a, b) = (label(i), label((i + 1) % n));
            t.push(a, a, 4.);
            t.push(a, b, -1.);
            t.push(b, a, -1.5);
        }
        t.push(label(0), label(n / 2), 0.3);
        let a = CsrMatrix::from_triplets(n, n, &t);
        let x = Array1::from_shape_fn(n, |i| 1. + (i as f64).cos());
        let b = a.dot(&x);
        let lu = SparseLu::from_matrix(&a).unwrap();
        approx_eq(&lu.solve_vec(&b), &x);
    }
}
