//! Legendre quadrature and the discontinuous Galerkin multiwavelet basis.
//!
//! The engine represents functions by their coefficients in an orthonormal
//! hierarchical multiwavelet basis. This module supplies the pieces the rest
//! of the crate consumes: Legendre-Gauss nodes and weights, scaled Legendre
//! polynomial values and derivatives, the two-scale scaling/wavelet blocks,
//! the assembled forward transform, projection of a 1D function and the
//! tensor combination of per-dimension coefficient vectors over an element
//! table.
//!
//! Node and weight generation runs in `f64` and is cast to the requested
//! element type afterwards so that the `f32` instantiation does not lose the
//! basis to round-off.

use super::element::{idx1d, ElementTable};
use super::real::Real;
use super::tensor::{Matrix, Vector};

const NEWTON_TOL: f64 = 5e-16;
const NEWTON_MAX_ITER: usize = 100;

/// Legendre-Gauss nodes and weights on `[a, b]`, nodes in ascending order.
///
/// # Panics
///
/// Panics if `n == 0` or `a >= b`.
#[must_use]
pub fn legendre_gauss<T: Real>(n: usize, a: f64, b: f64) -> (Vector<T>, Vector<T>) {
    assert!(n > 0);
    assert!(a < b);

    let mut nodes = vec![0.0_f64; n];
    let mut weights = vec![0.0_f64; n];

    for i in 0..n {
        let mut x = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();

        let mut deriv = 0.0;
        for _ in 0..NEWTON_MAX_ITER {
            let (value, slope) = legendre_terminal(x, n);
            deriv = slope;
            let step = value / slope;
            x -= step;
            if step.abs() < NEWTON_TOL {
                break;
            }
        }

        // cos() seeds the roots in descending order
        nodes[n - 1 - i] = x;
        weights[n - 1 - i] = 2.0 / ((1.0 - x * x) * deriv * deriv);
    }

    let half_width = 0.5 * (b - a);
    let midpoint = 0.5 * (b + a);
    let nodes = nodes.into_iter().map(|x| T::from_f64(half_width.mul_add(x, midpoint))).collect();
    let weights = weights.into_iter().map(|w| T::from_f64(w * half_width)).collect();

    (Vector::from_vec(nodes), Vector::from_vec(weights))
}

/// `P_n` and `P_n'` at a single point, for the quadrature Newton iteration.
fn legendre_terminal(x: f64, n: usize) -> (f64, f64) {
    let mut previous = 1.0;
    let mut current = x;
    let mut previous_deriv = 0.0;
    let mut current_deriv = 1.0;

    for i in 2..=n {
        let fi = i as f64;
        let next = ((2.0 * fi - 1.0) * x * current - (fi - 1.0) * previous) / fi;
        let next_deriv = previous_deriv + (2.0 * fi - 1.0) * current;
        previous = current;
        current = next;
        previous_deriv = current_deriv;
        current_deriv = next_deriv;
    }

    if n == 0 {
        (1.0, 0.0)
    } else if n == 1 {
        (x, 1.0)
    } else {
        (current, current_deriv)
    }
}

/// Values and derivatives of the first `degree` scaled Legendre polynomials
/// at the given points: row `q`, column `i` holds `sqrt(2 i + 1) * P_i` at
/// point `q`. Points outside `[-1, 1]` produce zero rows.
#[must_use]
pub fn legendre<T: Real>(points: &[T], degree: usize) -> (Matrix<T>, Matrix<T>) {
    assert!(degree > 0);

    let mut values = Matrix::zeros(points.len(), degree);
    let mut derivs = Matrix::zeros(points.len(), degree);

    for (q, point) in points.iter().enumerate() {
        let x = point.into_f64();
        if !(-1.0..=1.0).contains(&x) {
            continue;
        }

        let mut value = [1.0_f64, x];
        let mut deriv = [0.0_f64, 1.0];
        for i in 0..degree {
            let scale = (2.0 * i as f64 + 1.0).sqrt();
            values[(q, i)] = T::from_f64(value[i.min(1)] * scale);
            derivs[(q, i)] = T::from_f64(deriv[i.min(1)] * scale);

            if i >= 1 {
                // advance the recurrences so that slot 1 always holds P_{i+1}
                let fi = (i + 1) as f64;
                let next = ((2.0 * fi - 1.0) * x * value[1] - (fi - 1.0) * value[0]) / fi;
                let next_deriv = deriv[0] + (2.0 * fi - 1.0) * value[1];
                value = [value[1], next];
                deriv = [deriv[1], next_deriv];
            }
        }
    }

    (values, derivs)
}

/// Two-scale blocks of the multiwavelet basis of the given degree.
///
/// `H0`/`H1` express the parent scaling functions in the two child scaling
/// bases; `G0`/`G1` span the orthogonal complement (the wavelets), built by
/// projection and modified Gram-Schmidt with a fixed sign convention so the
/// construction is deterministic.
#[must_use]
pub fn two_scale<T: Real>(degree: usize) -> (Matrix<T>, Matrix<T>, Matrix<T>, Matrix<T>) {
    let k = degree;
    let nq = k + 2;
    let (nodes, weights) = legendre_gauss::<f64>(nq, -1.0, 1.0);
    let (child, _) = legendre(nodes.as_slice(), k);

    // parent values at the points mapped into each half cell
    let left_points: Vec<f64> = nodes.as_slice().iter().map(|&x| 0.5 * (x - 1.0)).collect();
    let right_points: Vec<f64> = nodes.as_slice().iter().map(|&x| 0.5 * (x + 1.0)).collect();
    let (parent_left, _) = legendre(&left_points, k);
    let (parent_right, _) = legendre(&right_points, k);

    // H0[i][j] = <phi_i, sqrt(2) phi_j(2x + 1)> on [-1, 0]; the legendre
    // values carry sqrt(2) each, the substitution contributes 1/2
    let mut h0 = Matrix::<f64>::zeros(k, k);
    let mut h1 = Matrix::<f64>::zeros(k, k);
    let quarter_sqrt2 = std::f64::consts::SQRT_2 / 4.0;
    for i in 0..k {
        for j in 0..k {
            let mut left = 0.0;
            let mut right = 0.0;
            for q in 0..nq {
                let w = weights[q];
                left += w * parent_left[(q, i)] * child[(q, j)];
                right += w * parent_right[(q, i)] * child[(q, j)];
            }
            h0[(i, j)] = quarter_sqrt2 * left;
            h1[(i, j)] = quarter_sqrt2 * right;
        }
    }

    // parent coordinate vectors in the orthonormal child basis
    let parents: Vec<Vec<f64>> = (0..k)
        .map(|i| (0..k).map(|j| h0[(i, j)]).chain((0..k).map(|j| h1[(i, j)])).collect())
        .collect();

    let mut wavelets: Vec<Vec<f64>> = Vec::with_capacity(k);
    for m in 0..2 * k {
        if wavelets.len() == k {
            break;
        }

        let mut residual = vec![0.0_f64; 2 * k];
        residual[m] = 1.0;
        // two projection passes keep the basis orthogonal to round-off
        for _ in 0..2 {
            for basis in parents.iter().chain(&wavelets) {
                let overlap: f64 = residual.iter().zip(basis).map(|(r, b)| r * b).sum();
                for (r, b) in residual.iter_mut().zip(basis) {
                    *r -= overlap * b;
                }
            }
        }

        let norm: f64 = residual.iter().map(|r| r * r).sum::<f64>().sqrt();
        if norm < 1e-8 {
            continue;
        }

        for r in &mut residual {
            *r /= norm;
        }
        // fix the sign on the largest entry
        let lead = residual
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.abs().partial_cmp(&b.abs()).unwrap())
            .map(|(index, _)| index)
            .unwrap();
        if residual[lead] < 0.0 {
            for r in &mut residual {
                *r = -*r;
            }
        }
        wavelets.push(residual);
    }
    assert_eq!(wavelets.len(), k);

    let mut g0 = Matrix::<f64>::zeros(k, k);
    let mut g1 = Matrix::<f64>::zeros(k, k);
    for (r, wavelet) in wavelets.iter().enumerate() {
        for j in 0..k {
            g0[(r, j)] = wavelet[j];
            g1[(r, j)] = wavelet[k + j];
        }
    }

    (cast(&h0), cast(&h1), cast(&g0), cast(&g1))
}

/// Forward multiwavelet transform of size `degree * 2^level`, mapping
/// fine-level cell-Legendre coefficients to hierarchical coefficients in
/// `idx1d` block order. The transform is orthogonal.
#[must_use]
pub fn transform_matrix<T: Real>(level: usize, degree: usize) -> Matrix<T> {
    let n = degree << level;
    let (h0, h1, g0, g1) = two_scale::<f64>(degree);

    let mut result = Matrix::<f64>::zeros(n, n);
    // current map from fine coefficients to the surviving smooth block
    let mut smooth = Matrix::<f64>::identity(n);

    for l in (1..=level).rev() {
        let pairs = 1 << (l - 1);
        let s = degree << l;
        let mut coarse = Matrix::<f64>::zeros(s / 2, s);
        let mut detail = Matrix::<f64>::zeros(s / 2, s);
        for p in 0..pairs {
            for i in 0..degree {
                for j in 0..degree {
                    coarse[(p * degree + i, 2 * p * degree + j)] = h0[(i, j)];
                    coarse[(p * degree + i, (2 * p + 1) * degree + j)] = h1[(i, j)];
                    detail[(p * degree + i, 2 * p * degree + j)] = g0[(i, j)];
                    detail[(p * degree + i, (2 * p + 1) * degree + j)] = g1[(i, j)];
                }
            }
        }

        let details = &detail * &smooth;
        let row0 = degree << (l - 1);
        for j in 0..n {
            for i in 0..s / 2 {
                result[(row0 + i, j)] = details[(i, j)];
            }
        }
        smooth = &coarse * &smooth;
    }

    for j in 0..n {
        for i in 0..degree {
            result[(i, j)] = smooth[(i, j)];
        }
    }

    cast(&result)
}

/// Projects a 1D function onto the multiwavelet basis of one dimension:
/// per-cell Gauss quadrature against the fine-level Legendre basis followed
/// by the forward transform.
#[must_use]
pub fn project_1d<T: Real>(
    f: impl Fn(T) -> T,
    domain_min: f64,
    domain_max: f64,
    level: usize,
    degree: usize,
    transform: &Matrix<T>,
) -> Vector<T> {
    let cells = 1_usize << level;
    let n = degree * cells;
    assert_eq!(transform.nrows(), n);

    let width = (domain_max - domain_min) / cells as f64;
    let nq = degree + 2;
    let (nodes, weights) = legendre_gauss::<T>(nq, -1.0, 1.0);
    let (values, _) = legendre(nodes.as_slice(), degree);

    let half_root_width = T::from_f64(0.5 * width.sqrt());
    let mut realspace = Vector::zeros(n);
    for cell in 0..cells {
        let left = width.mul_add(cell as f64, domain_min);
        for i in 0..degree {
            let mut acc = T::zero();
            for q in 0..nq {
                let x = T::from_f64(0.5 * width * (nodes[q].into_f64() + 1.0) + left);
                acc += weights[q] * f(x) * values[(q, i)];
            }
            realspace[cell * degree + i] = half_root_width * acc;
        }
    }

    transform * &realspace
}

/// Tensor combination of per-dimension 1D coefficient vectors over the
/// elements of a table, scaled by `scale`. The local degrees of freedom of
/// an element are ordered dimension-0 fastest.
#[must_use]
pub fn combine_dimensions<T: Real>(
    table: &ElementTable,
    degree: usize,
    per_dim: &[Vector<T>],
    scale: T,
) -> Vector<T> {
    let num_dims = table.num_dims();
    assert_eq!(per_dim.len(), num_dims);

    let elem_size = degree.pow(u32::try_from(num_dims).unwrap());
    let mut result = Vector::zeros(table.len() * elem_size);

    for (e, element) in table.iter().enumerate() {
        for local in 0..elem_size {
            let mut value = scale;
            let mut remainder = local;
            for d in 0..num_dims {
                let i = remainder % degree;
                remainder /= degree;
                let block = idx1d(element.levels[d], element.cells[d]);
                value *= per_dim[d][block * degree + i];
            }
            result[e * elem_size + local] = value;
        }
    }

    result
}

fn cast<T: Real>(m: &Matrix<f64>) -> Matrix<T> {
    Matrix::from_col_major(
        m.nrows(),
        m.ncols(),
        m.data().iter().map(|&v| T::from_f64(v)).collect(),
    )
}
