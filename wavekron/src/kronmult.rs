//! Kronecker-product apply as a schedule of small batched gemms.
//!
//! For every (row element, connected column element, term) triple of a chunk
//! the batcher emits the gemm chain computing
//! `y = (A_{D-1} (x) ... (x) A_0) x_j`, where `A_d` is the `degree x degree`
//! window of the term's dimension-`d` coefficient matrix selected by the 1D
//! indices of the row and column elements. The chain reshapes the operand as
//! a `degree x degree^(D-1)` matrix, multiplies by `A_0` on the left, then
//! contracts one dimension per stage by multiplying `degree^d x degree`
//! panels with the transposed operator, alternating between the two
//! intermediate buffers; the final stage lands in the reduction space.
//!
//! The triple's slot block in every batch, its output region and its
//! intermediate panels are all pure functions of `kron_index`, so distinct
//! triples own disjoint slots and regions and the per-coupling loop can run
//! in any order.

use super::batch::{self, Batch};
use super::chunk::{ElementChunk, Workspace};
use super::element::{idx1d, ElementTable};
use super::lib_dispatch;
use super::pde::Pde;
use super::real::Real;
use super::tensor::Vector;

/// Gemms emitted per triple for one dimension: one for the first and last
/// dimension, `degree^(D - d - 1)` in between.
#[must_use]
pub fn compute_batch_size(degree: usize, num_dims: usize, dim: usize) -> usize {
    assert!(dim < num_dims);

    if dim == 0 || dim == num_dims - 1 {
        1
    } else {
        degree.pow(u32::try_from(num_dims - dim - 1).unwrap())
    }
}

/// The three operand batches of one dimension's batched gemm.
pub struct BatchSet<T: Real> {
    /// Left operands.
    pub a: Batch<T>,
    /// Right operands.
    pub b: Batch<T>,
    /// Outputs.
    pub c: Batch<T>,
}

impl<T: Real> BatchSet<T> {
    /// Returns `true` if all three batches are fully assigned.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.a.is_filled() && self.b.is_filled() && self.c.is_filled()
    }

    /// Clears all three batches.
    pub fn clear_all(&mut self) {
        self.a.clear_all();
        self.b.clear_all();
        self.c.clear_all();
    }
}

/// Allocates the `num_dims` batch sets for a chunk of `num_triples`
/// (coupling, term) pairs. `operator_strides[d]` is the leading dimension of
/// the dimension-`d` coefficient matrices.
#[must_use]
pub fn allocate_batches<T: Real>(
    degree: usize,
    num_dims: usize,
    operator_strides: &[usize],
    num_triples: usize,
) -> Vec<BatchSet<T>> {
    assert_eq!(operator_strides.len(), num_dims);

    let cols_rest = degree.pow(u32::try_from(num_dims - 1).unwrap());

    (0..num_dims)
        .map(|d| {
            let entries = num_triples * compute_batch_size(degree, num_dims, d);
            if d == 0 {
                BatchSet {
                    a: Batch::new(entries, degree, degree, operator_strides[0], false),
                    b: Batch::new(entries, degree, cols_rest, degree, false),
                    c: Batch::new(entries, degree, cols_rest, degree, false),
                }
            } else {
                let panel_rows = degree.pow(u32::try_from(d).unwrap());
                BatchSet {
                    a: Batch::new(entries, panel_rows, degree, panel_rows, false),
                    b: Batch::new(entries, degree, degree, operator_strides[d], true),
                    c: Batch::new(entries, panel_rows, degree, panel_rows, false),
                }
            }
        })
        .collect()
}

/// Fills the chunk's batches with operator windows and workspace views.
///
/// Slot `kron_index * num_gemms + g` of every batch belongs to the triple
/// with `kron_index = term + num_terms * (couplings preceding the coupling
/// in the chunk)`; the write-once discipline of [`Batch::assign`] verifies
/// the disjointness.
///
/// # Panics
///
/// Panics if the batch list or the workspace do not match the PDE shape.
pub fn build_batches<T: Real>(
    pde: &Pde<T>,
    table: &ElementTable,
    chunk: &ElementChunk,
    workspace: &mut Workspace<T>,
    batches: &mut [BatchSet<T>],
) {
    let num_dims = pde.num_dims();
    let num_terms = pde.num_terms();
    let degree = pde.degree();
    let elem_size = degree.pow(u32::try_from(num_dims).unwrap());

    assert_eq!(batches.len(), num_dims);
    assert_eq!(workspace.batch_intermediate.len(), (num_dims - 1).min(2));
    assert!(workspace.reduction_space.len() >= elem_size * num_terms * chunk.num_couplings());

    // per dimension, the data-carrying operand spans the whole element:
    // num_gemms * rows * cols == degree^D
    for (d, set) in batches.iter().enumerate() {
        let data = if d == 0 { &set.b } else { &set.a };
        debug_assert_eq!(
            elem_size,
            compute_batch_size(degree, num_dims, d) * data.nrows() * data.ncols()
        );
    }

    let first_col = chunk.min_start();
    let mut coupling = 0_usize;

    for &(row, range) in chunk.entries() {
        let row_elem = table.inverse(row);
        for col in range.start..=range.stop {
            let col_elem = table.inverse(col);
            let input_offset = elem_size * (col - first_col);

            for term in 0..num_terms {
                let kron_index = term + coupling * num_terms;
                let base = elem_size * kron_index;

                for d in 0..num_dims {
                    let row_1d = idx1d(row_elem.levels[d], row_elem.cells[d]);
                    let col_1d = idx1d(col_elem.levels[d], col_elem.cells[d]);
                    let operator = pde.coefficient_matrix(term, d).submatrix(
                        row_1d * degree,
                        col_1d * degree,
                        degree,
                        degree,
                    );

                    let num_gemms = compute_batch_size(degree, num_dims, d);

                    if d == 0 {
                        let set = &mut batches[0];
                        set.a.assign(kron_index, &operator);
                        set.b.assign(
                            kron_index,
                            &workspace.batch_input.matrix_view(
                                input_offset,
                                degree,
                                elem_size / degree,
                                degree,
                            ),
                        );
                        if num_dims == 1 {
                            set.c.assign_mut(
                                kron_index,
                                &mut workspace.reduction_space.matrix_view_mut(base, degree, 1, degree),
                            );
                        } else {
                            set.c.assign_mut(
                                kron_index,
                                &mut workspace.batch_intermediate[0].matrix_view_mut(
                                    base,
                                    degree,
                                    elem_size / degree,
                                    degree,
                                ),
                            );
                        }
                    } else {
                        let panel_rows = degree.pow(u32::try_from(d).unwrap());
                        let panel_len = panel_rows * degree;
                        let source = (d - 1) % 2;
                        let last = d == num_dims - 1;

                        for g in 0..num_gemms {
                            let slot = kron_index * num_gemms + g;
                            let offset = base + g * panel_len;

                            batches[d].a.assign(
                                slot,
                                &workspace.batch_intermediate[source].matrix_view(
                                    offset,
                                    panel_rows,
                                    degree,
                                    panel_rows,
                                ),
                            );
                            batches[d].b.assign(slot, &operator);
                            if last {
                                batches[d].c.assign_mut(
                                    slot,
                                    &mut workspace.reduction_space.matrix_view_mut(
                                        offset,
                                        panel_rows,
                                        degree,
                                        panel_rows,
                                    ),
                                );
                            } else {
                                batches[d].c.assign_mut(
                                    slot,
                                    &mut workspace.batch_intermediate[d % 2].matrix_view_mut(
                                        offset,
                                        panel_rows,
                                        degree,
                                        panel_rows,
                                    ),
                                );
                            }
                        }
                    }
                }
            }
            coupling += 1;
        }
    }
}

/// Runs the chunk's gemm chains in dimension order; stage `d + 1` depends on
/// stage `d` through the intermediate buffers.
pub fn execute_batches<T: Real>(batches: &[BatchSet<T>]) {
    for set in batches {
        batch::batched_gemm(&set.a, &set.b, &set.c, T::one(), T::zero());
    }
}

/// Copies the column elements a chunk reads into the input workspace.
pub fn copy_chunk_inputs<T: Real>(
    chunk: &ElementChunk,
    elem_size: usize,
    x: &Vector<T>,
    workspace: &mut Workspace<T>,
) {
    let first = chunk.min_start();
    for col in first..=chunk.max_stop() {
        lib_dispatch::copy(
            &x.as_slice()[col * elem_size..(col + 1) * elem_size],
            &mut workspace.batch_input.as_mut_slice()[(col - first) * elem_size..(col - first + 1) * elem_size],
        );
    }
}

/// Contracts the chunk's partial outputs into the output vector: one gemv
/// per row element against a slice of the preallocated ones vector,
/// accumulating into the row's element of `fx`.
pub fn reduce_chunk<T: Real>(
    chunk: &ElementChunk,
    elem_size: usize,
    num_terms: usize,
    workspace: &Workspace<T>,
    fx: &mut Vector<T>,
) {
    let mut prev_couplings = 0_usize;
    for &(row, range) in chunk.entries() {
        let connected = range.len();
        let ncols = num_terms * connected;
        let offset = elem_size * num_terms * prev_couplings;

        lib_dispatch::gemv(
            false,
            elem_size,
            ncols,
            T::one(),
            &workspace.reduction_space.as_slice()[offset..],
            elem_size,
            &workspace.unit_vector.as_slice()[..ncols],
            T::one(),
            &mut fx.as_mut_slice()[row * elem_size..(row + 1) * elem_size],
        );

        prev_couplings += connected;
    }
}

/// Applies the full operator: for every chunk, stages inputs, builds and
/// fires the per-dimension batches and reduces into `fx` (accumulating, so
/// `fx` is usually zeroed by the caller).
pub fn apply_operator<T: Real>(
    pde: &Pde<T>,
    table: &ElementTable,
    chunks: &[ElementChunk],
    workspace: &mut Workspace<T>,
    x: &Vector<T>,
    fx: &mut Vector<T>,
) {
    let num_dims = pde.num_dims();
    let degree = pde.degree();
    let elem_size = degree.pow(u32::try_from(num_dims).unwrap());
    assert_eq!(x.len(), table.len() * elem_size);
    assert_eq!(fx.len(), x.len());

    let operator_strides: Vec<usize> =
        (0..num_dims).map(|d| pde.coefficient_matrix(0, d).stride()).collect();

    for chunk in chunks {
        copy_chunk_inputs(chunk, elem_size, x, workspace);

        let num_triples = chunk.num_couplings() * pde.num_terms();
        let mut batches = allocate_batches(degree, num_dims, &operator_strides, num_triples);
        build_batches(pde, table, chunk, workspace, &mut batches);
        debug_assert!(batches.iter().all(BatchSet::is_filled));

        execute_batches(&batches);
        reduce_chunk(chunk, elem_size, pde.num_terms(), workspace, fx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::chunk::plan_chunks;
    use crate::element::{Element, Grid};
    use crate::tensor::Matrix;

    /// Dense reference: entry `(I, J)` of the Kronecker product of the
    /// per-dimension windows, dimension 0 fastest.
    fn dense_kron_entry<T: Real>(windows: &[Matrix<T>], degree: usize, i: usize, j: usize) -> T {
        let mut value = T::one();
        let (mut i, mut j) = (i, j);
        for window in windows {
            value = value * window[(i % degree, j % degree)];
            i /= degree;
            j /= degree;
        }
        value
    }

    fn dense_apply<T: Real>(
        pde: &crate::pde::Pde<T>,
        table: &ElementTable,
        x: &Vector<T>,
    ) -> Vector<T> {
        let num_dims = pde.num_dims();
        let degree = pde.degree();
        let elem_size = degree.pow(u32::try_from(num_dims).unwrap());
        let mut fx = Vector::zeros(x.len());

        for row in 0..table.len() {
            let row_elem: &Element = table.inverse(row);
            for col in 0..table.len() {
                let col_elem = table.inverse(col);
                for term in 0..pde.num_terms() {
                    let windows: Vec<Matrix<T>> = (0..num_dims)
                        .map(|d| {
                            pde.coefficient_matrix(term, d)
                                .submatrix(
                                    idx1d(row_elem.levels[d], row_elem.cells[d]) * degree,
                                    idx1d(col_elem.levels[d], col_elem.cells[d]) * degree,
                                    degree,
                                    degree,
                                )
                                .to_matrix()
                        })
                        .collect();

                    for i in 0..elem_size {
                        let mut acc = T::zero();
                        for j in 0..elem_size {
                            acc = acc
                                + dense_kron_entry(&windows, degree, i, j)
                                    * x[col * elem_size + j];
                        }
                        fx[row * elem_size + i] = fx[row * elem_size + i] + acc;
                    }
                }
            }
        }

        fx
    }

    fn ramp(len: usize) -> Vector<f64> {
        Vector::from_vec((0..len).map(|i| 0.25 * i as f64 - 1.0).collect())
    }

    fn check_against_dense(name: &str, level: usize, degree: usize, num_dims: usize) {
        let pde = builtins::from_name::<f64>(name, level, degree).unwrap();
        let table = ElementTable::new(level, num_dims, Grid::Sparse).unwrap();
        let elem_size = degree.pow(u32::try_from(num_dims).unwrap());

        let chunks = plan_chunks(table.len(), table.len(), elem_size, pde.num_terms(), 8, 1 << 28).unwrap();
        let mut workspace = Workspace::new(&chunks, elem_size, pde.num_terms(), num_dims);

        let x = ramp(table.len() * elem_size);
        let mut fx = Vector::zeros(x.len());
        apply_operator(&pde, &table, &chunks, &mut workspace, &x, &mut fx);

        let reference = dense_apply(&pde, &table, &x);
        for i in 0..fx.len() {
            assert!(
                (fx[i] - reference[i]).abs() < 1e-10,
                "{name}: entry {i}: {} vs {}",
                fx[i],
                reference[i]
            );
        }
    }

    #[test]
    fn matches_dense_kron_in_1d() {
        check_against_dense("continuity_1", 3, 2, 1);
    }

    #[test]
    fn degree_one_reduces_to_scalar_products() {
        // piecewise-constant basis: every window is 1 x 1 and the schedule
        // still emits exactly one gemm per coupling
        let batches = allocate_batches::<f64>(1, 1, &[8], 5);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].a.num_entries(), 5);
        assert_eq!(batches[0].b.ncols(), 1);

        check_against_dense("continuity_1", 3, 1, 1);
    }

    #[test]
    fn matches_dense_kron_in_2d() {
        check_against_dense("continuity_2", 2, 2, 2);
    }

    #[test]
    fn matches_dense_kron_in_3d() {
        check_against_dense("continuity_3", 2, 2, 3);
    }

    #[test]
    fn matches_dense_kron_under_tight_chunking() {
        let pde = builtins::from_name::<f64>("continuity_2", 2, 2).unwrap();
        let table = ElementTable::new(2, 2, Grid::Sparse).unwrap();
        let elem_size = 4;

        // budget that forces one coupling per chunk
        let limit = 4 * elem_size * pde.num_terms() * 8;
        let chunks = plan_chunks(table.len(), table.len(), elem_size, pde.num_terms(), 8, limit).unwrap();
        assert!(chunks.len() > 1);

        let mut workspace = Workspace::new(&chunks, elem_size, pde.num_terms(), 2);
        let x = ramp(table.len() * elem_size);
        let mut fx = Vector::zeros(x.len());
        apply_operator(&pde, &table, &chunks, &mut workspace, &x, &mut fx);

        let reference = dense_apply(&pde, &table, &x);
        for i in 0..fx.len() {
            assert!((fx[i] - reference[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn operand_count_for_six_dimensions() {
        // D = 6, degree = 4, one coupling, one term:
        // 1 + 4^4 + 4^3 + 4^2 + 4 + 1 = 342 gemms
        let degree = 4;
        let num_dims = 6;
        let strides = vec![degree; num_dims];
        let batches = allocate_batches::<f64>(degree, num_dims, &strides, 1);

        let total: usize = batches.iter().map(|set| set.a.num_entries()).sum();
        assert_eq!(total, 342);

        let pde = builtins::from_name::<f64>("continuity_6", 0, degree).unwrap();
        let table = ElementTable::new(0, num_dims, Grid::Sparse).unwrap();
        assert_eq!(table.len(), 1);

        let chunks = plan_chunks(1, 1, degree.pow(6), pde.num_terms(), 8, 1 << 30).unwrap();
        let mut workspace = Workspace::new(&chunks, degree.pow(6), pde.num_terms(), num_dims);

        let strides: Vec<usize> = (0..num_dims).map(|d| pde.coefficient_matrix(0, d).stride()).collect();
        let mut batches = allocate_batches(degree, num_dims, &strides, pde.num_terms());
        build_batches(&pde, &table, &chunks[0], &mut workspace, &mut batches);

        // every slot of every batch is assigned exactly once
        assert!(batches.iter().all(BatchSet::is_filled));
        let per_term: usize = batches.iter().map(|set| set.a.num_entries()).sum();
        assert_eq!(per_term, 342 * pde.num_terms());
    }

    #[test]
    fn one_dimension_writes_without_intermediates() {
        let pde = builtins::from_name::<f64>("continuity_1", 2, 2).unwrap();
        let table = ElementTable::new(2, 1, Grid::Sparse).unwrap();

        let chunks = plan_chunks(table.len(), table.len(), 2, 1, 8, 1 << 20).unwrap();
        let workspace = Workspace::<f64>::new(&chunks, 2, 1, 1);

        // no intermediate buffers exist on the D = 1 path
        assert!(workspace.batch_intermediate.is_empty());

        // exactly one gemm per coupling
        let batches = allocate_batches::<f64>(2, 1, &[pde.coefficient_matrix(0, 0).stride()], chunks[0].num_couplings());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].a.num_entries(), chunks[0].num_couplings());
    }

    #[test]
    fn reduction_contracts_terms_and_connections() {
        // T = 2, connected = 3, elem_size = 4, all-ones partials reduce to 6
        let elem_size = 4;
        let num_terms = 2;
        let chunks = plan_chunks(1, 3, elem_size, num_terms, 8, 1 << 20).unwrap();
        assert_eq!(chunks.len(), 1);

        let mut workspace = Workspace::<f64>::new(&chunks, elem_size, num_terms, 2);
        workspace.reduction_space.as_mut_slice().fill(1.0);

        let mut fx = Vector::zeros(3 * elem_size);
        reduce_chunk(&chunks[0], elem_size, num_terms, &workspace, &mut fx);

        for i in 0..elem_size {
            assert_eq!(fx[i], 6.0);
        }
        for i in elem_size..fx.len() {
            assert_eq!(fx[i], 0.0);
        }
    }
}
