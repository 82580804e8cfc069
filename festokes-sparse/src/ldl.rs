//! Sparse up-looking $LDL^T$ factorization.
//!
//! The factorization follows the classic two-phase approach: a symbolic phase computes the
//! elimination tree and the column counts of $L$, after which a numeric phase computes one
//! row of $L$ at a time by a sparse triangular solve guided by the elimination tree.
//!
//! No pivoting is performed. The factorization is therefore only guaranteed to succeed for
//! symmetric positive definite or quasi-definite matrices.
use crate::ordering::Permutation;
use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use std::error::Error;
use std::fmt;

/// Pivots with magnitude at or below this fraction of the diagonal scale are rejected.
const RELATIVE_PIVOT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LdlError {
    /// The matrix is not square.
    NotSquare { rows: usize, cols: usize },
    /// The permutation does not match the matrix dimensions.
    PermutationMismatch { matrix_dim: usize, permutation_len: usize },
    /// Elimination produced a pivot that is numerically zero.
    ZeroPivot { index: usize, pivot: f64 },
    /// Elimination produced a pivot that is infinite or NaN.
    NonFinitePivot { index: usize },
}

impl fmt::Display for LdlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSquare { rows, cols } => {
                write!(f, "cannot factor non-square matrix of size {rows} x {cols}")
            }
            Self::PermutationMismatch {
                matrix_dim,
                permutation_len,
            } => write!(
                f,
                "permutation of length {permutation_len} does not match matrix dimension {matrix_dim}"
            ),
            Self::ZeroPivot { index, pivot } => write!(
                f,
                "matrix is numerically singular: pivot {pivot:e} at (permuted) row {index}"
            ),
            Self::NonFinitePivot { index } => {
                write!(f, "non-finite pivot encountered at (permuted) row {index}")
            }
        }
    }
}

impl Error for LdlError {}

/// A sparse factorization $P A P^T = L D L^T$ with $L$ unit lower triangular and $D$ diagonal.
///
/// Only the lower triangle of $P A P^T$ is read, so the input matrix must be symmetric and
/// store both triangles (as is the case for assembled finite element matrices).
#[derive(Debug, Clone)]
pub struct LdlFactorization {
    permutation: Permutation,
    // Strictly lower part of L stored by columns.
    l_offsets: Vec<usize>,
    l_indices: Vec<usize>,
    l_values: Vec<f64>,
    d: Vec<f64>,
}

impl LdlFactorization {
    pub fn factor(matrix: &CsrMatrix<f64>) -> Result<Self, LdlError> {
        Self::factor_permuted(matrix, Permutation::identity(matrix.nrows()))
    }

    /// Factors the symmetrically permuted matrix $P A P^T$.
    ///
    /// Row `i` of the permuted matrix corresponds to row `permutation.source_index(i)` of
    /// the input.
    pub fn factor_permuted(matrix: &CsrMatrix<f64>, permutation: Permutation) -> Result<Self, LdlError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(LdlError::NotSquare {
                rows: matrix.nrows(),
                cols: matrix.ncols(),
            });
        }
        let n = matrix.nrows();
        if permutation.len() != n {
            return Err(LdlError::PermutationMismatch {
                matrix_dim: n,
                permutation_len: permutation.len(),
            });
        }
        let inverse = permutation.inverse();

        // Iterates over the entries (j, a_kj) with j <= k of row k of the permuted matrix.
        let (row_offsets, col_indices, values) = matrix.csr_data();
        let inverse = &inverse;
        let permutation_ref = &permutation;
        let lower_row = move |k: usize| {
            let source_row = permutation_ref.source_index(k);
            let range = row_offsets[source_row]..row_offsets[source_row + 1];
            col_indices[range.clone()]
                .iter()
                .zip(&values[range])
                .map(move |(&j, &v)| (inverse.source_index(j), v))
                .filter(move |&(j, _)| j <= k)
        };

        let diagonal_scale = {
            let max_abs_diagonal = (0..n)
                .flat_map(|k| lower_row(k).filter(move |&(j, _)| j == k).map(|(_, v)| v.abs()))
                .fold(0.0, f64::max);
            if max_abs_diagonal > 0.0 {
                max_abs_diagonal
            } else {
                1.0
            }
        };

        // Symbolic phase: elimination tree and column counts
        const NONE: usize = usize::MAX;
        let mut parent = vec![NONE; n];
        let mut flag = vec![NONE; n];
        let mut column_counts = vec![0usize; n];
        for k in 0..n {
            flag[k] = k;
            for (mut i, _) in lower_row(k) {
                while flag[i] != k {
                    if parent[i] == NONE {
                        parent[i] = k;
                    }
                    column_counts[i] += 1;
                    flag[i] = k;
                    i = parent[i];
                }
            }
        }

        let mut l_offsets = Vec::with_capacity(n + 1);
        l_offsets.push(0);
        for k in 0..n {
            l_offsets.push(l_offsets[k] + column_counts[k]);
        }
        let nnz = l_offsets[n];
        debug!("LDL^T symbolic factorization: n = {n}, nnz(L) = {nnz}");

        // Numeric phase
        let mut l_indices = vec![0usize; nnz];
        let mut l_values = vec![0.0; nnz];
        let mut d = vec![0.0; n];
        let mut y = vec![0.0; n];
        let mut pattern = vec![0usize; n];
        let mut filled = vec![0usize; n];
        flag.fill(NONE);

        for k in 0..n {
            let mut top = n;
            flag[k] = k;
            let mut a_kk = 0.0;
            for (mut i, a_ki) in lower_row(k) {
                y[i] += a_ki;
                if i == k {
                    a_kk += a_ki;
                }
                let mut len = 0;
                while flag[i] != k {
                    pattern[len] = i;
                    len += 1;
                    flag[i] = k;
                    i = parent[i];
                }
                while len > 0 {
                    top -= 1;
                    len -= 1;
                    pattern[top] = pattern[len];
                }
            }

            d[k] = y[k];
            y[k] = 0.0;
            for &i in &pattern[top..n] {
                let y_i = y[i];
                y[i] = 0.0;
                let begin = l_offsets[i];
                let end = begin + filled[i];
                for p in begin..end {
                    y[l_indices[p]] -= l_values[p] * y_i;
                }
                let l_ki = y_i / d[i];
                d[k] -= l_ki * y_i;
                l_indices[end] = k;
                l_values[end] = l_ki;
                filled[i] += 1;
            }

            if !d[k].is_finite() {
                return Err(LdlError::NonFinitePivot { index: k });
            }
            let scale = if a_kk != 0.0 { a_kk.abs() } else { diagonal_scale };
            if d[k].abs() <= RELATIVE_PIVOT_TOLERANCE * scale {
                return Err(LdlError::ZeroPivot { index: k, pivot: d[k] });
            }
        }

        Ok(Self {
            permutation,
            l_offsets,
            l_indices,
            l_values,
            d,
        })
    }

    pub fn dim(&self) -> usize {
        self.d.len()
    }

    /// Number of stored (strictly lower) entries in $L$.
    pub fn nnz(&self) -> usize {
        self.l_values.len()
    }

    pub fn permutation(&self) -> &Permutation {
        &self.permutation
    }

    pub fn d(&self) -> &[f64] {
        &self.d
    }

    /// Solves $A x = b$, overwriting `b` with `x`.
    ///
    /// # Panics
    ///
    /// Panics if `b` does not have the dimension of the factored matrix.
    pub fn solve_in_place(&self, b: &mut [f64]) {
        assert_eq!(b.len(), self.dim(), "Right-hand side dimension mismatch.");
        let mut x = self.permutation.apply_to_slice(b);

        for j in 0..self.dim() {
            let x_j = x[j];
            for p in self.l_offsets[j]..self.l_offsets[j + 1] {
                x[self.l_indices[p]] -= self.l_values[p] * x_j;
            }
        }
        for (x_j, d_j) in x.iter_mut().zip(&self.d) {
            *x_j /= d_j;
        }
        for j in (0..self.dim()).rev() {
            let mut x_j = x[j];
            for p in self.l_offsets[j]..self.l_offsets[j + 1] {
                x_j -= self.l_values[p] * x[self.l_indices[p]];
            }
            x[j] = x_j;
        }

        for (target, &x_i) in x.iter().enumerate() {
            b[self.permutation.source_index(target)] = x_i;
        }
    }

    pub fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        let mut x = b.clone();
        self.solve_in_place(x.as_mut_slice());
        x
    }
}
