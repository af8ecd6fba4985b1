//! Compressed sparse row matrices
use ndarray::prelude::*;
use ndarray::Data;

/// Coordinate list used while assembling, duplicates are summed
#[derive(Debug, Clone, Default)]
pub struct Triplets {
    rows: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<f64>,
}

impl Triplets {
    /// Reserve space for `n` entries
    pub fn with_capacity(n: usize) -> Self {
        Self {
            rows: Vec::with_capacity(n),
            cols: Vec::with_capacity(n),
            vals: Vec::with_capacity(n),
        }
    }

    /// Add `v` at `(i, j)`
    pub fn push(&mut self, i: usize, j: usize, v: f64) {
        self.rows.push(i);
        self.cols.push(j);
        self.vals.push(v);
    }

    /// Number of stored entries (with duplicates)
    pub fn len(&self) -> usize {
        self.vals.len()
    }

    /// No entries stored
    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }
}

/// Sparse matrix in csr format
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// Build from coordinate list. Entries with equal position are summed,
    /// column indices are sorted within each row.
    ///
    /// # Panics
    /// Index out of bounds
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &Triplets) -> Self {
        let mut counts = vec![0_usize; nrows + 1];
        for (&i, &j) in triplets.rows.iter().zip(triplets.cols.iter()) {
            assert!(i < nrows && j < ncols, "Entry ({}, {}) out of bounds.", i, j);
            counts[i + 1] += 1;
        }
        for i in 0..nrows {
            counts[i + 1] += counts[i];
        }
        // bucket by row
        let mut next = counts.clone();
        let mut cols = vec![0; triplets.len()];
        let mut vals = vec![0.; triplets.len()];
        for k in 0..triplets.len() {
            let i = triplets.rows[k];
            cols[next[i]] = triplets.cols[k];
            vals[next[i]] = triplets.vals[k];
            next[i] += 1;
        }
        // sort and merge each row
        let mut indptr = Vec::with_capacity(nrows + 1);
        let mut indices = Vec::with_capacity(triplets.len());
        let mut data = Vec::with_capacity(triplets.len());
        indptr.push(0);
        let mut row: Vec<(usize, f64)> = Vec::new();
        for i in 0..nrows {
            row.clear();
            row.extend((counts[i]..counts[i + 1]).map(|k| (cols[k], vals[k])));
            row.sort_unstable_by_key(|e| e.0);
            for &(j, v) in &row {
                match indices.last() {
                    Some(&last) if last == j && data.len() > indptr[i] => {
                        if let Some(d) = data.last_mut() {
                            *d += v;
                        }
                    }
                    _ => {
                        indices.push(j);
                        data.push(v);
                    }
                }
            }
            indptr.push(indices.len());
        }
        Self {
            nrows,
            ncols,
            indptr,
            indices,
            data,
        }
    }

    /// Square identity
    pub fn identity(n: usize) -> Self {
        Self {
            nrows: n,
            ncols: n,
            indptr: (0..=n).collect(),
            indices: (0..n).collect(),
            data: vec![1.; n],
        }
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Column indices and values of row `i`
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.indptr[i]..self.indptr[i + 1];
        self.indices[range.clone()]
            .iter()
            .copied()
            .zip(self.data[range].iter().copied())
    }

    /// Entry `(i, j)`, zero if not stored
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let range = self.indptr[i]..self.indptr[i + 1];
        match self.indices[range.clone()].binary_search(&j) {
            Ok(k) => self.data[range.start + k],
            Err(_) => 0.,
        }
    }

    /// Matrix vector product
    ///
    /// # Panics
    /// Length of `x` differs from the number of columns
    pub fn dot<S: Data<Elem = f64>>(&self, x: &ArrayBase<S, Ix1>) -> Array1<f64> {
        assert!(x.len() == self.ncols, "Size mismatch in matvec.");
        Array1::from_shape_fn(self.nrows, |i| self.row(i).map(|(j, v)| v * x[j]).sum())
    }

    /// Dense copy
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.nrows, self.ncols));
        for i in 0..self.nrows {
            for (j, v) in self.row(i) {
                dense[[i, j]] += v;
            }
        }
        dense
    }

    /// Return `a * self + b * other`, patterns are merged
    ///
    /// # Panics
    /// Shape mismatch
    pub fn add_scaled(&self, a: f64, other: &Self, b: f64) -> Self {
        assert!(self.shape() == other.shape(), "Shape mismatch in add.");
        let mut triplets = Triplets::with_capacity(self.nnz() + other.nnz());
        for i in 0..self.nrows {
            for (j, v) in self.row(i) {
                triplets.push(i, j, a * v);
            }
            for (j, v) in other.row(i) {
                triplets.push(i, j, b * v);
            }
        }
        Self::from_triplets(self.nrows, self.ncols, &triplets)
    }

    /// Return `a * self`
    pub fn scaled(&self, a: f64) -> Self {
        let mut out = self.clone();
        out.data.iter_mut().for_each(|v| *v *= a);
        out
    }

    /// Replace masked rows by rows of the identity
    pub fn with_identity_rows(&self, mask: &[bool]) -> Self {
        self.filtered(mask, false, 1.)
    }

    /// Zero masked rows and columns, put `diag` on their diagonal
    pub fn with_symmetric_rows(&self, mask: &[bool], diag: f64) -> Self {
        self.filtered(mask, true, diag)
    }

    fn filtered(&self, mask: &[bool], columns: bool, diag: f64) -> Self {
        let mut triplets = Triplets::with_capacity(self.nnz());
        for i in 0..self.nrows {
            if mask[i] {
                triplets.push(i, i, diag);
                continue;
            }
            for (j, v) in self.row(i) {
                if !(columns && mask[j]) {
                    triplets.push(i, j, v);
                }
            }
        }
        Self::from_triplets(self.nrows, self.ncols, &triplets)
    }

    /// Symmetric permutation, `B[i, j] = A[perm[i], perm[j]]`
    pub fn permute(&self, perm: &[usize]) -> Self {
        let mut inv = vec![0; perm.len()];
        for (new, &old) in perm.iter().enumerate() {
            inv[old] = new;
        }
        let mut triplets = Triplets::with_capacity(self.nnz());
        for (new_i, &old_i) in perm.iter().enumerate() {
            for (j, v) in self.row(old_i) {
                triplets.push(new_i, inv[j], v);
            }
        }
        Self::from_triplets(self.nrows, self.ncols, &triplets)
    }

    /// Lower and upper bandwidth of the stored pattern
    pub fn bandwidth(&self) -> (usize, usize) {
        let (mut kl, mut ku) = (0, 0);
        for i in 0..self.nrows {
            for (j, _) in self.row(i) {
                if j < i {
                    kl = kl.max(i - j);
                } else {
                    ku = ku.max(j - i);
                }
            }
        }
        (kl, ku)
    }

    /// Neighbours of every row in the symmetrized pattern, without the diagonal
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.nrows];
        for i in 0..self.nrows {
            for (j, _) in self.row(i) {
                if i != j {
                    adj[i].push(j);
                    adj[j].push(i);
                }
            }
        }
        for nbrs in &mut adj {
            nbrs.sort_unstable();
            nbrs.dedup();
        }
        adj
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn example() -> CsrMatrix {
        let mut t = Triplets::default();
        t.push(0, 0, 2.);
        t.push(0, 2, 1.);
        t.push(1, 1, 3.);
        t.push(2, 0, 1.);
        t.push(2, 2, 4.);
        // duplicate
        t.push(2, 2, 1.);
        CsrMatrix::from_triplets(3, 3, &t)
    }

    #[test]
    fn test_triplets_merge() {
        let a = example();
        assert_eq!(a.nnz(), 5);
        assert!((a.get(2, 2) - 5.).abs() < 1e-14);
        assert!(a.get(1, 0).abs() < 1e-14);
    }

    #[test]
    fn test_dot() {
        let a = example();
        let x = array![1., 2., 3.];
        let y = a.dot(&x);
        let y_dense = a.to_dense().dot(&x);
        for (u, v) in y.iter().zip(y_dense.iter()) {
            assert!((u - v).abs() < 1e-14);
        }
        assert!((y[0] - 5.).abs() < 1e-14);
    }

    #[test]
    fn test_symmetric_rows() {
        let a = example().with_symmetric_rows(&[true, false, false], 1.);
        let d = a.to_dense();
        assert!((d[[0, 0]] - 1.).abs() < 1e-14);
        assert!(d[[0, 2]].abs() < 1e-14);
        assert!(d[[2, 0]].abs() < 1e-14);
        assert!((d[[2, 2]] - 5.).abs() < 1e-14);
    }

    #[test]
    fn test_identity_rows_keep_columns() {
        let d = example().with_identity_rows(&[true, false, false]).to_dense();
        assert!(d[[0, 2]].abs() < 1e-14);
        assert!((d[[2, 0]] - 1.).abs() < 1e-14);
    }

    #[test]
    fn test_permute() {
        let a = example();
        let perm = [2, 0, 1];
        let b = a.permute(&perm);
        for i in 0..3 {
            for j in 0..3 {
                assert!((b.get(i, j) - a.get(perm[i], perm[j])).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn test_add_scaled() {
        let a = example();
        let c = a.add_scaled(2., &CsrMatrix::identity(3), -1.);
        assert!((c.get(1, 1) - 5.).abs() < 1e-14);
        assert!((c.get(0, 2) - 2.).abs() < 1e-14);
    }
}
