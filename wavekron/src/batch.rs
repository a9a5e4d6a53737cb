//! Fixed-shape operand lists for batched gemm/gemv dispatch.
//!
//! A batch is a list of raw, non-owning pointer slots, each addressing the
//! first element of a column-major operand of one shared `(nrows, ncols,
//! stride, trans)` shape. Keeping the slots a plain pointer array preserves
//! the `T* const*` layout a batched BLAS backend expects; ownership stays
//! with the workspaces and coefficient matrices the pointers were derived
//! from.

use super::lib_dispatch;
use super::real::Real;
use super::tensor::{MatrixView, MatrixViewMut};
use std::ptr;

/// List of same-shaped operand slots for one batched BLAS call.
pub struct Batch<T: Real> {
    num_entries: usize,
    nrows: usize,
    ncols: usize,
    stride: usize,
    trans: bool,
    entries: Vec<*mut T>,
}

impl<T: Real> Batch<T> {
    /// Allocates a batch of `num_entries` unassigned slots.
    ///
    /// # Panics
    ///
    /// Panics if the shape is degenerate or the stride is smaller than the
    /// stored row count.
    #[must_use]
    pub fn new(num_entries: usize, nrows: usize, ncols: usize, stride: usize, trans: bool) -> Self {
        assert!(nrows > 0 && ncols > 0);
        assert!(stride >= nrows, "stride {stride} below row count {nrows}");

        Self {
            num_entries,
            nrows,
            ncols,
            stride,
            trans,
            entries: vec![ptr::null_mut(); num_entries],
        }
    }

    /// Number of slots.
    #[must_use]
    pub const fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// Stored rows per operand.
    #[must_use]
    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    /// Stored columns per operand.
    #[must_use]
    pub const fn ncols(&self) -> usize {
        self.ncols
    }

    /// Leading dimension shared by all operands.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Whether the operands enter the BLAS call transposed.
    #[must_use]
    pub const fn do_trans(&self) -> bool {
        self.trans
    }

    /// Rows of `op(entry)`.
    #[must_use]
    pub const fn op_nrows(&self) -> usize {
        if self.trans {
            self.ncols
        } else {
            self.nrows
        }
    }

    /// Columns of `op(entry)`.
    #[must_use]
    pub const fn op_ncols(&self) -> usize {
        if self.trans {
            self.nrows
        } else {
            self.ncols
        }
    }

    /// Records a read operand in `position`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already assigned or the view's shape or stride
    /// differ from the batch shape.
    pub fn assign(&mut self, position: usize, view: &MatrixView<'_, T>) {
        self.assign_ptr(position, view.as_ptr().cast_mut(), view.nrows(), view.ncols(), view.stride());
    }

    /// Records a write operand in `position`.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Self::assign`].
    pub fn assign_mut(&mut self, position: usize, view: &mut MatrixViewMut<'_, T>) {
        let (nrows, ncols, stride) = (view.nrows(), view.ncols(), view.stride());
        self.assign_ptr(position, view.as_mut_ptr(), nrows, ncols, stride);
    }

    fn assign_ptr(&mut self, position: usize, data: *mut T, nrows: usize, ncols: usize, stride: usize) {
        assert!(position < self.num_entries, "batch position {position} is out of bounds for {} entries", self.num_entries);
        assert!(
            nrows == self.nrows && ncols == self.ncols && stride == self.stride,
            "operand {nrows}x{ncols} stride {stride} does not match batch shape {}x{} stride {}",
            self.nrows,
            self.ncols,
            self.stride
        );
        assert!(self.entries[position].is_null(), "batch slot {position} is already assigned");

        self.entries[position] = data;
    }

    /// Clears one slot; returns whether it was assigned.
    pub fn clear_entry(&mut self, position: usize) -> bool {
        assert!(position < self.num_entries);

        let was_assigned = !self.entries[position].is_null();
        self.entries[position] = ptr::null_mut();
        was_assigned
    }

    /// Clears every slot.
    pub fn clear_all(&mut self) {
        self.entries.fill(ptr::null_mut());
    }

    /// Returns `true` if no slot is null.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.entries.iter().all(|entry| !entry.is_null())
    }

    fn entry(&self, position: usize) -> *mut T {
        self.entries[position]
    }
}

/// Issues one gemm per slot triple: `c = alpha * op(a) * op(b) + beta * c`.
/// Slot triples with any null pointer are skipped.
///
/// # Panics
///
/// Panics if the batch lengths differ, `c` is transposed, or the operand
/// shapes are incompatible.
pub fn batched_gemm<T: Real>(a: &Batch<T>, b: &Batch<T>, c: &Batch<T>, alpha: T, beta: T) {
    assert_eq!(a.num_entries(), b.num_entries());
    assert_eq!(a.num_entries(), c.num_entries());
    assert!(!c.do_trans(), "the output batch cannot be transposed");

    let m = a.op_nrows();
    let k = a.op_ncols();
    let n = b.op_ncols();
    assert_eq!(k, b.op_nrows(), "inner dimensions disagree");
    assert!(c.nrows() == m && c.ncols() == n, "output shape disagrees");

    for position in 0..a.num_entries() {
        let (pa, pb, pc) = (a.entry(position), b.entry(position), c.entry(position));
        if pa.is_null() || pb.is_null() || pc.is_null() {
            continue;
        }

        // SAFETY: pointers were recorded from live views whose owners outlive
        // the batch, shapes were checked at assignment, and distinct slots
        // address disjoint output regions.
        unsafe {
            lib_dispatch::gemm_raw(
                a.do_trans(),
                b.do_trans(),
                m,
                n,
                k,
                alpha,
                pa.cast_const(),
                a.stride(),
                pb.cast_const(),
                b.stride(),
                beta,
                pc,
                c.stride(),
            );
        }
    }
}

/// Issues one gemv per slot triple: `y = alpha * op(a) * x + beta * y`.
/// Slot triples with any null pointer are skipped.
///
/// # Panics
///
/// Panics if the batch lengths differ, `x` or `y` is transposed or not a
/// single column, or the shapes are incompatible.
pub fn batched_gemv<T: Real>(a: &Batch<T>, x: &Batch<T>, y: &Batch<T>, alpha: T, beta: T) {
    assert_eq!(a.num_entries(), x.num_entries());
    assert_eq!(a.num_entries(), y.num_entries());
    assert!(!x.do_trans() && !y.do_trans());
    assert!(x.ncols() == 1 && y.ncols() == 1);
    assert_eq!(x.nrows(), a.op_ncols());
    assert_eq!(y.nrows(), a.op_nrows());

    for position in 0..a.num_entries() {
        let (pa, px, py) = (a.entry(position), x.entry(position), y.entry(position));
        if pa.is_null() || px.is_null() || py.is_null() {
            continue;
        }

        // SAFETY: see `batched_gemm`.
        unsafe {
            lib_dispatch::gemv_raw(
                a.do_trans(),
                a.nrows(),
                a.ncols(),
                alpha,
                pa.cast_const(),
                a.stride(),
                px.cast_const(),
                beta,
                py,
            );
        }
    }
}
