//! Scalar element types of the engine.
//!
//! Every tensor, workspace and coefficient matrix is generic over [`Real`],
//! which is implemented for `f32` and `f64` only. Runtime precision selection
//! is a factory over the two monomorphizations; see the command-line crate.

use num_traits::{Float, NumAssign};
use std::fmt::{Debug, Display, LowerExp};
use std::iter::Sum;

mod private {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Floating-point element type understood by the BLAS dispatch layer.
pub trait Real:
    private::Sealed
    + Float
    + NumAssign
    + Sum
    + Default
    + Debug
    + Display
    + LowerExp
    + Send
    + Sync
    + 'static
{
    /// Converts from `f64`, rounding to the nearest representable value.
    #[must_use]
    fn from_f64(x: f64) -> Self;

    /// Widens to `f64` (exact for both supported types).
    #[must_use]
    fn into_f64(self) -> f64;

    /// Strided matrix-matrix kernel: `C = alpha * A * B + beta * C` where
    /// `A` is `m x k`, `B` is `k x n` and every operand carries explicit row
    /// and column strides.
    ///
    /// # Safety
    ///
    /// The pointers must address allocations that cover every element
    /// reachable through the given dimensions and strides, and `c` must not
    /// alias `a` or `b`.
    unsafe fn gemm_strided(
        m: usize,
        k: usize,
        n: usize,
        alpha: Self,
        a: *const Self,
        rsa: isize,
        csa: isize,
        b: *const Self,
        rsb: isize,
        csb: isize,
        beta: Self,
        c: *mut Self,
        rsc: isize,
        csc: isize,
    );

    /// Column-major gemm through CBLAS.
    ///
    /// # Safety
    ///
    /// Same contract as [`Self::gemm_strided`], with `lda`/`ldb`/`ldc` as
    /// leading dimensions of the untransposed storage.
    #[cfg(feature = "blas")]
    #[allow(clippy::too_many_arguments)]
    unsafe fn cblas_gemm(
        trans_a: bool,
        trans_b: bool,
        m: usize,
        n: usize,
        k: usize,
        alpha: Self,
        a: *const Self,
        lda: usize,
        b: *const Self,
        ldb: usize,
        beta: Self,
        c: *mut Self,
        ldc: usize,
    );
}

macro_rules! impl_real {
    ($ty:ty, $mm_gemm:path, $cblas_gemm:path) => {
        impl Real for $ty {
            fn from_f64(x: f64) -> Self {
                x as $ty
            }

            fn into_f64(self) -> f64 {
                f64::from(self)
            }

            unsafe fn gemm_strided(
                m: usize,
                k: usize,
                n: usize,
                alpha: Self,
                a: *const Self,
                rsa: isize,
                csa: isize,
                b: *const Self,
                rsb: isize,
                csb: isize,
                beta: Self,
                c: *mut Self,
                rsc: isize,
                csc: isize,
            ) {
                // SAFETY: forwarded verbatim; the caller guarantees the
                // operand extents.
                unsafe {
                    $mm_gemm(m, k, n, alpha, a, rsa, csa, b, rsb, csb, beta, c, rsc, csc);
                }
            }

            #[cfg(feature = "blas")]
            unsafe fn cblas_gemm(
                trans_a: bool,
                trans_b: bool,
                m: usize,
                n: usize,
                k: usize,
                alpha: Self,
                a: *const Self,
                lda: usize,
                b: *const Self,
                ldb: usize,
                beta: Self,
                c: *mut Self,
                ldc: usize,
            ) {
                use cblas_sys::{CblasColMajor, CblasNoTrans, CblasTrans};

                let trans = |t| if t { CblasTrans } else { CblasNoTrans };

                // SAFETY: standard column-major CBLAS call; the caller
                // guarantees the operand extents.
                unsafe {
                    $cblas_gemm(
                        CblasColMajor,
                        trans(trans_a),
                        trans(trans_b),
                        m as i32,
                        n as i32,
                        k as i32,
                        alpha,
                        a,
                        lda as i32,
                        b,
                        ldb as i32,
                        beta,
                        c,
                        ldc as i32,
                    );
                }
            }
        }
    };
}

impl_real!(f32, matrixmultiply::sgemm, cblas_sys::cblas_sgemm);
impl_real!(f64, matrixmultiply::dgemm, cblas_sys::cblas_dgemm);
