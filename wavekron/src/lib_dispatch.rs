//! Thin dispatch layer over the dense linear-algebra kernels.
//!
//! All entry points use the standard column-major, leading-dimension ABI so
//! that call sites translate one-to-one onto BLAS/LAPACK. The default build
//! routes `gemm` through the strided `matrixmultiply` kernels; enabling the
//! `blas` cargo feature substitutes CBLAS.

use super::error::{Error, Result};
use super::real::Real;

/// `C = alpha * op(A) * op(B) + beta * C` on raw column-major operands.
///
/// `op(A)` is `m x k`, `op(B)` is `k x n`, `C` is `m x n`; `lda`, `ldb` and
/// `ldc` are the leading dimensions of the untransposed storage.
///
/// # Safety
///
/// Every pointer must be valid for the full extent implied by its dimensions
/// and leading dimension, and `c` must not alias `a` or `b`.
#[allow(clippy::too_many_arguments)]
pub unsafe fn gemm_raw<T: Real>(
    trans_a: bool,
    trans_b: bool,
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    a: *const T,
    lda: usize,
    b: *const T,
    ldb: usize,
    beta: T,
    c: *mut T,
    ldc: usize,
) {
    #[cfg(feature = "blas")]
    // SAFETY: contract forwarded to the caller.
    unsafe {
        T::cblas_gemm(trans_a, trans_b, m, n, k, alpha, a, lda, b, ldb, beta, c, ldc);
    }

    #[cfg(not(feature = "blas"))]
    {
        // A transposed operand is the same storage walked with swapped row
        // and column strides.
        let (rsa, csa) = if trans_a { (lda as isize, 1) } else { (1, lda as isize) };
        let (rsb, csb) = if trans_b { (ldb as isize, 1) } else { (1, ldb as isize) };

        // SAFETY: contract forwarded to the caller.
        unsafe {
            T::gemm_strided(m, k, n, alpha, a, rsa, csa, b, rsb, csb, beta, c, 1, ldc as isize);
        }
    }
}

/// Safe wrapper around [`gemm_raw`] for contiguous slices.
#[allow(clippy::too_many_arguments)]
pub fn gemm<T: Real>(
    trans_a: bool,
    trans_b: bool,
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    b: &[T],
    ldb: usize,
    beta: T,
    c: &mut [T],
    ldc: usize,
) {
    let (rows_a, cols_a) = if trans_a { (k, m) } else { (m, k) };
    let (rows_b, cols_b) = if trans_b { (n, k) } else { (k, n) };

    assert!(lda >= rows_a.max(1) && ldb >= rows_b.max(1) && ldc >= m.max(1));
    assert!(a.len() >= extent(rows_a, cols_a, lda));
    assert!(b.len() >= extent(rows_b, cols_b, ldb));
    assert!(c.len() >= extent(m, n, ldc));

    // SAFETY: extents checked above; distinct borrows rule out aliasing.
    unsafe {
        gemm_raw(
            trans_a,
            trans_b,
            m,
            n,
            k,
            alpha,
            a.as_ptr(),
            lda,
            b.as_ptr(),
            ldb,
            beta,
            c.as_mut_ptr(),
            ldc,
        );
    }
}

/// `y = alpha * op(A) * x + beta * y` with unit increments.
#[allow(clippy::too_many_arguments)]
pub fn gemv<T: Real>(
    trans: bool,
    m: usize,
    n: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    x: &[T],
    beta: T,
    y: &mut [T],
) {
    let (rows_op, cols_op) = if trans { (n, m) } else { (m, n) };
    assert!(x.len() >= cols_op && y.len() >= rows_op);

    gemm(trans, false, rows_op, 1, cols_op, alpha, a, lda, x, cols_op.max(1), beta, y, rows_op.max(1));
}

/// Raw-pointer counterpart of [`gemv`], used by the batched dispatch.
///
/// # Safety
///
/// Same contract as [`gemm_raw`].
#[allow(clippy::too_many_arguments)]
pub unsafe fn gemv_raw<T: Real>(
    trans: bool,
    m: usize,
    n: usize,
    alpha: T,
    a: *const T,
    lda: usize,
    x: *const T,
    beta: T,
    y: *mut T,
) {
    let (rows_op, cols_op) = if trans { (n, m) } else { (m, n) };

    // SAFETY: contract forwarded to the caller.
    unsafe {
        gemm_raw(trans, false, rows_op, 1, cols_op, alpha, a, lda, x, cols_op.max(1), beta, y, rows_op.max(1));
    }
}

/// `y = x`.
pub fn copy<T: Real>(x: &[T], y: &mut [T]) {
    assert_eq!(x.len(), y.len());
    y.copy_from_slice(x);
}

/// `y = alpha * x + y`.
pub fn axpy<T: Real>(alpha: T, x: &[T], y: &mut [T]) {
    assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// `x = alpha * x`.
pub fn scal<T: Real>(alpha: T, x: &mut [T]) {
    for xi in x {
        *xi *= alpha;
    }
}

/// Dot product with unit increments.
#[must_use]
pub fn dot<T: Real>(x: &[T], y: &[T]) -> T {
    assert_eq!(x.len(), y.len());
    x.iter().zip(y).map(|(&a, &b)| a * b).sum()
}

/// LU factorization with partial pivoting of an `n x n` column-major matrix,
/// in place: on return `a` holds the unit-lower and upper factors and
/// `pivots[r]` records the row swapped into position `r`.
///
/// An exactly zero pivot is reported as `Err`; callers that can tolerate a
/// singular factor (determinants) should use [`getrf_unchecked`].
pub fn getrf<T: Real>(n: usize, a: &mut [T], lda: usize) -> Result<Vec<usize>> {
    let (pivots, singular) = getrf_unchecked(n, a, lda);
    if singular {
        return Err(Error::Numeric("matrix is singular to working precision".to_string()));
    }
    Ok(pivots)
}

/// [`getrf`] variant that completes on singular input; the flag reports
/// whether a zero pivot was encountered.
pub fn getrf_unchecked<T: Real>(n: usize, a: &mut [T], lda: usize) -> (Vec<usize>, bool) {
    assert!(lda >= n.max(1) && a.len() >= extent(n, n, lda));

    let mut pivots = Vec::with_capacity(n);
    let mut singular = false;

    for col in 0..n {
        // select the largest remaining entry of this column as the pivot
        let mut pivot = col;
        for row in col + 1..n {
            if a[col * lda + row].abs() > a[col * lda + pivot].abs() {
                pivot = row;
            }
        }
        pivots.push(pivot);

        if pivot != col {
            for j in 0..n {
                a.swap(j * lda + col, j * lda + pivot);
            }
        }

        let diag = a[col * lda + col];
        if diag == T::zero() {
            singular = true;
            continue;
        }

        for row in col + 1..n {
            let factor = a[col * lda + row] / diag;
            a[col * lda + row] = factor;
            for j in col + 1..n {
                let upper = a[j * lda + col];
                a[j * lda + row] = a[j * lda + row] - factor * upper;
            }
        }
    }

    (pivots, singular)
}

/// Inverse from an LU factorization produced by [`getrf`], in place.
pub fn getri<T: Real>(n: usize, a: &mut [T], lda: usize, pivots: &[usize]) -> Result<()> {
    assert!(lda >= n.max(1) && a.len() >= extent(n, n, lda));
    assert_eq!(pivots.len(), n);

    for col in 0..n {
        if a[col * lda + col] == T::zero() {
            return Err(Error::Numeric("matrix is singular to working precision".to_string()));
        }
    }

    // solve A * X = I one unit vector at a time
    let mut inverse = vec![T::zero(); n * n];
    let mut rhs = vec![T::zero(); n];
    for col in 0..n {
        rhs.fill(T::zero());
        rhs[col] = T::one();

        // P * b
        for (row, &pivot) in pivots.iter().enumerate() {
            rhs.swap(row, pivot);
        }
        // L * y = P * b (unit lower triangle)
        for row in 1..n {
            for j in 0..row {
                let factor = a[j * lda + row];
                let prev = rhs[j];
                rhs[row] = rhs[row] - factor * prev;
            }
        }
        // U * x = y
        for row in (0..n).rev() {
            for j in row + 1..n {
                let factor = a[j * lda + row];
                let prev = rhs[j];
                rhs[row] = rhs[row] - factor * prev;
            }
            rhs[row] = rhs[row] / a[row * lda + row];
        }

        inverse[col * n..(col + 1) * n].copy_from_slice(&rhs);
    }

    for col in 0..n {
        a[col * lda..col * lda + n].copy_from_slice(&inverse[col * n..(col + 1) * n]);
    }

    Ok(())
}

const fn extent(rows: usize, cols: usize, ld: usize) -> usize {
    if rows == 0 || cols == 0 {
        0
    } else {
        ld * (cols - 1) + rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemm_matches_triple_loop() {
        // A = [1 3; 2 4] (column-major), B = [5 7; 6 8]
        let a = vec![1.0_f64, 2.0, 3.0, 4.0];
        let b = vec![5.0_f64, 6.0, 7.0, 8.0];
        let mut c = vec![0.0_f64; 4];

        gemm(false, false, 2, 2, 2, 1.0, &a, 2, &b, 2, 0.0, &mut c, 2);
        assert_eq!(c, vec![23.0, 34.0, 31.0, 46.0]);

        // C = A^T * B
        gemm(true, false, 2, 2, 2, 1.0, &a, 2, &b, 2, 0.0, &mut c, 2);
        assert_eq!(c, vec![17.0, 39.0, 23.0, 53.0]);
    }

    #[test]
    fn gemv_accumulates() {
        let a = vec![1.0_f64, 2.0, 3.0, 4.0];
        let x = vec![1.0_f64, 1.0];
        let mut y = vec![1.0_f64, 1.0];

        gemv(false, 2, 2, 2.0, &a, 2, &x, 1.0, &mut y);
        assert_eq!(y, vec![9.0, 13.0]);
    }

    #[test]
    fn getrf_getri_roundtrip() {
        // [4 7; 2 6] has inverse [0.6 -0.7; -0.2 0.4]
        let mut a = vec![4.0_f64, 2.0, 7.0, 6.0];
        let pivots = getrf(2, &mut a, 2).unwrap();
        getri(2, &mut a, 2, &pivots).unwrap();

        for (value, reference) in a.iter().zip([0.6, -0.2, -0.7, 0.4]) {
            assert!((value - reference).abs() < 1e-14);
        }
    }

    #[test]
    fn getrf_reports_singular() {
        let mut a = vec![1.0_f64, 2.0, 2.0, 4.0];
        assert!(getrf(2, &mut a, 2).is_err());
    }
}
