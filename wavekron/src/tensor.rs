//! Dense column-major matrices and vectors, plus non-owning views.
//!
//! Owners hold contiguous column-major storage whose stride equals the row
//! count. Views bind a borrow of an owner with their own `(nrows, ncols,
//! stride)` so that a window of a coefficient matrix or a reshaped slice of a
//! workspace vector can be handed to a BLAS call with the owner's allocation
//! stride as the leading dimension. Lifetimes guarantee that a view never
//! outlives its owner, and writes through either side are observable through
//! the other.

use super::error::Result;
use super::lib_dispatch;
use super::real::Real;
use std::ops::{Add, Index, IndexMut, Mul, Range, Sub};

/// Owning column-major matrix; element `(i, j)` lives at `data[j * nrows + i]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matrix<T> {
    nrows: usize,
    ncols: usize,
    data: Vec<T>,
}

impl<T: Real> Matrix<T> {
    /// Constructs a zero-filled `nrows x ncols` matrix.
    #[must_use]
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![T::zero(); nrows * ncols],
        }
    }

    /// Constructs a matrix from column-major storage.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != nrows * ncols`.
    #[must_use]
    pub fn from_col_major(nrows: usize, ncols: usize, data: Vec<T>) -> Self {
        assert_eq!(data.len(), nrows * ncols);
        Self { nrows, ncols, data }
    }

    /// Constructs a matrix from row slices (handy for literals).
    ///
    /// # Panics
    ///
    /// Panics if the rows are ragged or empty.
    #[must_use]
    pub fn from_rows(rows: &[Vec<T>]) -> Self {
        let nrows = rows.len();
        assert!(nrows > 0);
        let ncols = rows[0].len();
        assert!(rows.iter().all(|row| row.len() == ncols));

        let mut result = Self::zeros(nrows, ncols);
        for (i, row) in rows.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                result[(i, j)] = value;
            }
        }
        result
    }

    /// Constructs the `n x n` identity.
    #[must_use]
    pub fn identity(n: usize) -> Self {
        let mut result = Self::zeros(n, n);
        for i in 0..n {
            result[(i, i)] = T::one();
        }
        result
    }

    /// Number of rows.
    #[must_use]
    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    #[must_use]
    pub const fn ncols(&self) -> usize {
        self.ncols
    }

    /// Allocation stride (leading dimension); equals [`Self::nrows`] for
    /// owning matrices.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.nrows
    }

    /// Column-major storage.
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable column-major storage.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// View of the whole matrix.
    #[must_use]
    pub fn view(&self) -> MatrixView<'_, T> {
        self.submatrix(0, 0, self.nrows, self.ncols)
    }

    /// Non-owning window of `nrows x ncols` anchored at `(row, col)`; the
    /// view keeps this matrix's stride so BLAS sees the true leading
    /// dimension.
    ///
    /// # Panics
    ///
    /// Panics if the window exceeds the matrix bounds.
    #[must_use]
    pub fn submatrix(&self, row: usize, col: usize, nrows: usize, ncols: usize) -> MatrixView<'_, T> {
        assert!(
            row + nrows <= self.nrows && col + ncols <= self.ncols,
            "window {nrows}x{ncols} at ({row}, {col}) exceeds matrix of shape {}x{}",
            self.nrows,
            self.ncols
        );

        MatrixView {
            nrows,
            ncols,
            stride: self.nrows,
            data: &self.data[col * self.nrows + row..],
        }
    }

    /// Freshly allocated transpose.
    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut result = Self::zeros(self.ncols, self.nrows);
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                result[(j, i)] = self[(i, j)];
            }
        }
        result
    }

    /// Inverse by LU factorization (`getrf`/`getri`).
    ///
    /// # Errors
    ///
    /// Returns a numeric error if the matrix is singular.
    ///
    /// # Panics
    ///
    /// Panics if the matrix is not square.
    pub fn invert(&self) -> Result<Self> {
        assert_eq!(self.nrows, self.ncols, "only square matrices can be inverted");

        let mut result = self.clone();
        let pivots = lib_dispatch::getrf(self.nrows, &mut result.data, self.nrows)?;
        lib_dispatch::getri(self.nrows, &mut result.data, self.nrows, &pivots)?;
        Ok(result)
    }

    /// Determinant by LU factorization; singular input yields zero.
    ///
    /// # Panics
    ///
    /// Panics if the matrix is not square.
    #[must_use]
    pub fn determinant(&self) -> T {
        assert_eq!(self.nrows, self.ncols, "determinant requires a square matrix");

        let mut lu = self.data.clone();
        let (pivots, _) = lib_dispatch::getrf_unchecked(self.nrows, &mut lu, self.nrows);

        let swaps = pivots.iter().enumerate().filter(|&(row, &pivot)| row != pivot).count();
        let sign = if swaps % 2 == 0 { T::one() } else { -T::one() };

        (0..self.nrows).map(|i| lu[i * self.nrows + i]).fold(sign, |acc, d| acc * d)
    }
}

impl<T: Real> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (i, j): (usize, usize)) -> &T {
        assert!(
            i < self.nrows && j < self.ncols,
            "index ({i}, {j}) is out of bounds for matrix of shape {}x{}",
            self.nrows,
            self.ncols
        );
        &self.data[j * self.nrows + i]
    }
}

impl<T: Real> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        assert!(
            i < self.nrows && j < self.ncols,
            "index ({i}, {j}) is out of bounds for matrix of shape {}x{}",
            self.nrows,
            self.ncols
        );
        &mut self.data[j * self.nrows + i]
    }
}

impl<T: Real> Add for &Matrix<T> {
    type Output = Matrix<T>;

    fn add(self, rhs: Self) -> Matrix<T> {
        assert!(self.nrows == rhs.nrows && self.ncols == rhs.ncols, "matrix shape mismatch");

        let mut result = self.clone();
        for (value, &other) in result.data.iter_mut().zip(&rhs.data) {
            *value += other;
        }
        result
    }
}

impl<T: Real> Sub for &Matrix<T> {
    type Output = Matrix<T>;

    fn sub(self, rhs: Self) -> Matrix<T> {
        assert!(self.nrows == rhs.nrows && self.ncols == rhs.ncols, "matrix shape mismatch");

        let mut result = self.clone();
        for (value, &other) in result.data.iter_mut().zip(&rhs.data) {
            *value -= other;
        }
        result
    }
}

impl<T: Real> Mul<T> for &Matrix<T> {
    type Output = Matrix<T>;

    fn mul(self, rhs: T) -> Matrix<T> {
        let mut result = self.clone();
        lib_dispatch::scal(rhs, &mut result.data);
        result
    }
}

impl<T: Real> Mul for &Matrix<T> {
    type Output = Matrix<T>;

    fn mul(self, rhs: Self) -> Matrix<T> {
        assert_eq!(self.ncols, rhs.nrows, "matrix shape mismatch");

        let mut result = Matrix::zeros(self.nrows, rhs.ncols);
        lib_dispatch::gemm(
            false,
            false,
            self.nrows,
            rhs.ncols,
            self.ncols,
            T::one(),
            &self.data,
            self.stride(),
            &rhs.data,
            rhs.stride(),
            T::zero(),
            &mut result.data,
            self.nrows,
        );
        result
    }
}

impl<T: Real> Mul<&Vector<T>> for &Matrix<T> {
    type Output = Vector<T>;

    fn mul(self, rhs: &Vector<T>) -> Vector<T> {
        assert_eq!(self.ncols, rhs.len(), "matrix/vector shape mismatch");

        let mut result = Vector::zeros(self.nrows);
        lib_dispatch::gemv(
            false,
            self.nrows,
            self.ncols,
            T::one(),
            &self.data,
            self.stride(),
            rhs.as_slice(),
            T::zero(),
            result.as_mut_slice(),
        );
        result
    }
}

/// Non-owning, read-only window into a [`Matrix`] or a [`Vector`] overlay.
#[derive(Clone, Copy, Debug)]
pub struct MatrixView<'a, T> {
    nrows: usize,
    ncols: usize,
    stride: usize,
    data: &'a [T],
}

impl<'a, T: Real> MatrixView<'a, T> {
    /// Number of rows.
    #[must_use]
    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    #[must_use]
    pub const fn ncols(&self) -> usize {
        self.ncols
    }

    /// Leading dimension of the owner's storage.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Pointer to element `(0, 0)`.
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    /// Copies the window into an owning matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix<T> {
        let mut result = Matrix::zeros(self.nrows, self.ncols);
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                result[(i, j)] = self[(i, j)];
            }
        }
        result
    }
}

impl<T: Real> Index<(usize, usize)> for MatrixView<'_, T> {
    type Output = T;

    fn index(&self, (i, j): (usize, usize)) -> &T {
        assert!(
            i < self.nrows && j < self.ncols,
            "index ({i}, {j}) is out of bounds for view of shape {}x{}",
            self.nrows,
            self.ncols
        );
        &self.data[j * self.stride + i]
    }
}

/// Mutable counterpart of [`MatrixView`].
#[derive(Debug)]
pub struct MatrixViewMut<'a, T> {
    nrows: usize,
    ncols: usize,
    stride: usize,
    data: &'a mut [T],
}

impl<'a, T: Real> MatrixViewMut<'a, T> {
    /// Number of rows.
    #[must_use]
    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    #[must_use]
    pub const fn ncols(&self) -> usize {
        self.ncols
    }

    /// Leading dimension of the owner's storage.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Mutable pointer to element `(0, 0)`.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }
}

impl<T: Real> Index<(usize, usize)> for MatrixViewMut<'_, T> {
    type Output = T;

    fn index(&self, (i, j): (usize, usize)) -> &T {
        assert!(i < self.nrows && j < self.ncols);
        &self.data[j * self.stride + i]
    }
}

impl<T: Real> IndexMut<(usize, usize)> for MatrixViewMut<'_, T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        assert!(i < self.nrows && j < self.ncols);
        &mut self.data[j * self.stride + i]
    }
}

/// Owning contiguous vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vector<T> {
    data: Vec<T>,
}

impl<T: Real> Vector<T> {
    /// Constructs a zero-filled vector of `size` elements.
    #[must_use]
    pub fn zeros(size: usize) -> Self {
        Self {
            data: vec![T::zero(); size],
        }
    }

    /// Wraps existing storage.
    #[must_use]
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the vector holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Contiguous storage.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable contiguous storage.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Euclidean norm.
    #[must_use]
    pub fn norm(&self) -> T {
        lib_dispatch::dot(&self.data, &self.data).sqrt()
    }

    /// Read-only subrange view.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the vector.
    #[must_use]
    pub fn view(&self, range: Range<usize>) -> VectorView<'_, T> {
        VectorView {
            data: &self.data[range],
        }
    }

    /// Matrix overlay of a subrange: `nrows x ncols` at `offset` with the
    /// given stride between columns.
    ///
    /// # Panics
    ///
    /// Panics if the implied extent exceeds the vector.
    #[must_use]
    pub fn matrix_view(&self, offset: usize, nrows: usize, ncols: usize, stride: usize) -> MatrixView<'_, T> {
        assert!(stride >= nrows && offset + matrix_extent(nrows, ncols, stride) <= self.data.len());

        MatrixView {
            nrows,
            ncols,
            stride,
            data: &self.data[offset..],
        }
    }

    /// Mutable matrix overlay; see [`Self::matrix_view`].
    ///
    /// # Panics
    ///
    /// Panics if the implied extent exceeds the vector.
    pub fn matrix_view_mut(
        &mut self,
        offset: usize,
        nrows: usize,
        ncols: usize,
        stride: usize,
    ) -> MatrixViewMut<'_, T> {
        assert!(stride >= nrows && offset + matrix_extent(nrows, ncols, stride) <= self.data.len());

        MatrixViewMut {
            nrows,
            ncols,
            stride,
            data: &mut self.data[offset..],
        }
    }
}

impl<T: Real> Index<usize> for Vector<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        assert!(index < self.data.len(), "index {index} is out of bounds for vector of size {}", self.data.len());
        &self.data[index]
    }
}

impl<T: Real> IndexMut<usize> for Vector<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        assert!(index < self.data.len(), "index {index} is out of bounds for vector of size {}", self.data.len());
        &mut self.data[index]
    }
}

impl<T: Real> Add for &Vector<T> {
    type Output = Vector<T>;

    fn add(self, rhs: Self) -> Vector<T> {
        assert_eq!(self.len(), rhs.len(), "vector size mismatch");

        let mut result = self.clone();
        lib_dispatch::axpy(T::one(), &rhs.data, &mut result.data);
        result
    }
}

impl<T: Real> Sub for &Vector<T> {
    type Output = Vector<T>;

    fn sub(self, rhs: Self) -> Vector<T> {
        assert_eq!(self.len(), rhs.len(), "vector size mismatch");

        let mut result = self.clone();
        lib_dispatch::axpy(-T::one(), &rhs.data, &mut result.data);
        result
    }
}

impl<T: Real> Mul<T> for &Vector<T> {
    type Output = Vector<T>;

    fn mul(self, rhs: T) -> Vector<T> {
        let mut result = self.clone();
        lib_dispatch::scal(rhs, &mut result.data);
        result
    }
}

/// Non-owning, read-only subrange of a [`Vector`].
#[derive(Clone, Copy, Debug)]
pub struct VectorView<'a, T> {
    data: &'a [T],
}

impl<'a, T: Real> VectorView<'a, T> {
    /// Number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the view is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pointer to the first element.
    #[must_use]
    pub const fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    /// Underlying slice.
    #[must_use]
    pub const fn as_slice(&self) -> &'a [T] {
        self.data
    }
}

const fn matrix_extent(nrows: usize, cols: usize, stride: usize) -> usize {
    if nrows == 0 || cols == 0 {
        0
    } else {
        stride * (cols - 1) + nrows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_roundtrip() {
        let a = Matrix::from_rows(&[vec![1.0_f64, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(a.transpose().transpose(), a);
        assert_eq!(a.transpose()[(2, 1)], 6.0);
    }

    #[test]
    fn multiply_dispatches_to_gemm() {
        let a = Matrix::from_rows(&[vec![1.0_f64, 2.0], vec![3.0, 4.0]]);
        let b = Matrix::from_rows(&[vec![5.0_f64, 6.0], vec![7.0, 8.0]]);

        assert_eq!(&a * &b, Matrix::from_rows(&[vec![19.0, 22.0], vec![43.0, 50.0]]));

        let x = Vector::from_vec(vec![1.0_f64, -1.0]);
        assert_eq!(&a * &x, Vector::from_vec(vec![-1.0, -1.0]));
    }

    #[test]
    fn invert_times_original_is_identity() {
        let a = Matrix::from_rows(&[
            vec![4.0_f64, 7.0, 1.0],
            vec![2.0, 6.0, 0.5],
            vec![1.0, 1.0, 3.0],
        ]);
        let product = &a.invert().unwrap() * &a;
        let identity = Matrix::<f64>::identity(3);

        for j in 0..3 {
            for i in 0..3 {
                assert!((product[(i, j)] - identity[(i, j)]).abs() < 2.0 * 16.0 * f64::EPSILON);
            }
        }
    }

    #[test]
    fn determinant_of_singular_matrix_is_zero() {
        let a = Matrix::from_rows(&[vec![1.0_f64, 2.0], vec![2.0, 4.0]]);
        assert_eq!(a.determinant(), 0.0);
        assert!(a.invert().is_err());

        let b = Matrix::from_rows(&[vec![2.0_f64, 0.0], vec![0.0, 3.0]]);
        assert!((b.determinant() - 6.0).abs() < 1e-14);
    }

    #[test]
    fn views_alias_owner_storage() {
        let mut owner = Matrix::<f64>::zeros(4, 4);
        owner[(1, 2)] = 7.0;

        let window = owner.submatrix(1, 1, 2, 2);
        assert_eq!(window[(0, 1)], 7.0);
        assert_eq!(window.stride(), 4);

        let mut storage = Vector::<f64>::zeros(8);
        {
            let mut overlay = storage.matrix_view_mut(2, 2, 3, 2);
            overlay[(1, 2)] = 5.0;
        }
        assert_eq!(storage[7], 5.0);
    }

    #[test]
    fn vector_arithmetic() {
        let x = Vector::from_vec(vec![1.0_f64, 2.0, 3.0]);
        let y = Vector::from_vec(vec![0.5_f64, 0.5, 0.5]);

        assert_eq!(&x + &y, Vector::from_vec(vec![1.5, 2.5, 3.5]));
        assert_eq!(&x - &y, Vector::from_vec(vec![0.5, 1.5, 2.5]));
        assert_eq!(&(&x * 2.0) - &x, x);
        assert!((x.norm() - 14.0_f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    #[should_panic(expected = "index (2, 0) is out of bounds for matrix of shape 2x2")]
    fn index_out_of_bounds_panics() {
        let a = Matrix::<f64>::zeros(2, 2);
        let _ = a[(2, 0)];
    }

    #[test]
    #[should_panic(expected = "matrix shape mismatch")]
    fn mismatched_addition_panics() {
        let a = Matrix::<f64>::zeros(2, 2);
        let b = Matrix::<f64>::zeros(2, 3);
        let _ = &a + &b;
    }
}
