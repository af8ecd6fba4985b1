//! Banded LU decomposition with partial pivoting
//!
//! Row interchanges are restricted to the `kl` rows below the diagonal, so
//! the upper factor has bandwidth `kl + ku`. Storage is `O(n (2 kl + ku))`.
use crate::error::{FlowError, Result};
use crate::solver::sparse::CsrMatrix;
use ndarray::prelude::*;
use std::collections::VecDeque;

/// Pivots smaller than this are treated as zero
const PIVOT_TOL: f64 = 1e-300;

/// Factorized banded matrix
#[derive(Debug, Clone)]
pub struct BandedLu {
    /// Size of matrix
    pub n: usize,
    /// Lower bandwidth
    pub kl: usize,
    /// Upper bandwidth (before pivoting)
    pub ku: usize,
    /// Rows of U, `upper[[k, t]] = U(k, k + t)`
    upper: Array2<f64>,
    /// Multipliers of elimination step k
    lower: Array2<f64>,
    /// Row swapped with row k in step k
    piv: Vec<usize>,
}

impl BandedLu {
    /// Factorize a sparse matrix whose pattern lies within (kl, ku)
    ///
    /// # Errors
    /// Matrix is not square or singular
    pub fn from_matrix(a: &CsrMatrix) -> Result<Self> {
        let (n, m) = a.shape();
        if n != m {
            return Err(FlowError::singular(format!(
                "banded lu needs a square matrix, got {}x{}",
                n, m
            )));
        }
        let (kl, ku) = a.bandwidth();
        let width = kl + ku + 1;
        let mut upper = Array2::<f64>::zeros((n, width));
        let mut lower = Array2::<f64>::zeros((n, kl));
        let mut piv = vec![0; n];

        // Active rows k..=k+kl, stored over columns k..k+width
        let load = |r: usize, k: usize| -> Vec<f64> {
            let mut row = vec![0.; width];
            for (j, v) in a.row(r) {
                row[j - k] += v;
            }
            row
        };
        let mut active: VecDeque<Vec<f64>> = (0..=kl.min(n.saturating_sub(1)))
            .map(|r| load(r, 0))
            .collect();

        for k in 0..n {
            // pivot search
            let (p, pval) = active
                .iter()
                .enumerate()
                .map(|(s, row)| (s, row[0].abs()))
                .fold((0, -1.), |acc, x| if x.1 > acc.1 { x } else { acc });
            if pval < PIVOT_TOL {
                return Err(FlowError::singular(format!(
                    "zero pivot in column {} of banded lu",
                    k
                )));
            }
            active.swap(0, p);
            piv[k] = k + p;
            // eliminate
            let (head, tail) = active.as_mut_slices();
            let (pivot_row, rest_head) = match head.split_first_mut() {
                Some(split) => split,
                None => return Err(FlowError::singular("empty active window")),
            };
            let pivot = pivot_row[0];
            for (s, row) in rest_head.iter_mut().chain(tail.iter_mut()).enumerate() {
                let m = row[0] / pivot;
                lower[[k, s]] = m;
                if m != 0. {
                    for t in 1..width {
                        row[t] -= m * pivot_row[t];
                    }
                }
            }
            for (t, v) in pivot_row.iter().enumerate() {
                upper[[k, t]] = *v;
            }
            // shift window to column k + 1
            active.pop_front();
            for row in active.iter_mut() {
                row.rotate_left(1);
                row[width - 1] = 0.;
            }
            let next = k + 1 + kl;
            if next < n {
                active.push_back(load(next, k + 1));
            }
        }
        Ok(Self {
            n,
            kl,
            ku,
            upper,
            lower,
            piv,
        })
    }

    /// Solve `A x = b` in place
    ///
    /// # Panics
    /// Size mismatch
    pub fn solve_inplace(&self, b: &mut Array1<f64>) {
        assert!(b.len() == self.n, "Size mismatch in banded solve.");
        let n = self.n;
        // forward
        for k in 0..n {
            b.swap(k, self.piv[k]);
            let bk = b[k];
            if bk != 0. {
                for s in 0..self.kl.min(n - k - 1) {
                    b[k + 1 + s] -= self.lower[[k, s]] * bk;
                }
            }
        }
        // backward
        let width = self.upper.shape()[1];
        for k in (0..n).rev() {
            let mut acc = b[k];
            for t in 1..width.min(n - k) {
                acc -= self.upper[[k, t]] * b[k + t];
            }
            b[k] = acc / self.upper[[k, 0]];
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::solver::sparse::Triplets;

    fn approx_eq(result: &Array1<f64>, expected: &Array1<f64>) {
        let dif = 1e-10;
        for (a, b) in expected.iter().zip(result.iter()) {
            if (a - b).abs() > dif {
                panic!("Large difference of values, got {} expected {}.", b, a)
            }
        }
    }

    /// Nonsymmetric band matrix with a zero diagonal entry
    fn band_matrix(n: usize, kl: usize, ku: usize) -> CsrMatrix {
        let mut t = Triplets::default();
        for i in 0..n {
            for j in i.saturating_sub(kl)..(i + ku + 1).min(n) {
                let v = if i == j {
                    if i == 2 {
                        0.
                    } else {
                        3. + (i % 3) as f64
                    }
                } else {
                    1. / (1. + (i as f64) - 0.5 * (j as f64)).abs().max(0.5)
                };
                t.push(i, j, v);
            }
        }
        CsrMatrix::from_triplets(n, n, &t)
    }

    #[test]
    fn test_banded_lu() {
        let (n, kl, ku) = (14, 2, 3);
        let a = band_matrix(n, kl, ku);
        let x = Array1::from_shape_fn(n, |i| (i as f64).sin() + 0.1 * i as f64);
        let b = a.dot(&x);
        let lu = BandedLu::from_matrix(&a).unwrap();
        assert_eq!((lu.kl, lu.ku), (kl, ku));
        let mut y = b.clone();
        lu.solve_inplace(&mut y);
        approx_eq(&y, &x);
    }

    #[test]
    fn test_banded_lu_needs_pivoting() {
        // [[0, 1], [1, 0]]
        let mut t = Triplets::default();
        t.push(0, 1, 1.);
        t.push(1, 0, 1.);
        let a = CsrMatrix::from_triplets(2, 2, &t);
        let lu = BandedLu::from_matrix(&a).unwrap();
        let mut y = array![2., 3.];
        lu.solve_inplace(&mut y);
        approx_eq(&y, &array![3., 2.]);
    }

    #[test]
    fn test_banded_lu_singular() {
        let mut t = Triplets::default();
        t.push(0, 0, 1.);
        t.push(0, 1, 1.);
        t.push(1, 0, 1.);
        t.push(1, 1, 1.);
        let a = CsrMatrix::from_triplets(2, 2, &t);
        assert!(BandedLu::from_matrix(&a).is_err());
    }
}
