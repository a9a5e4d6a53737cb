//! Assembly of one-dimensional coefficient matrices.
//!
//! Each `(term, dimension)` partial term becomes a realspace DG matrix of
//! side `degree * 2^level`, built cell by cell with Legendre-Gauss
//! quadrature of the coefficient function, then conjugated into wavelet
//! space with the forward transform. Mass factors are block diagonal; grad
//! factors combine the volume term of the weak derivative with interface
//! flux traces.

use super::basis::{legendre, legendre_gauss};
use super::pde::{BoundaryCondition, Dimension, OpKind, PartialTerm};
use super::real::Real;
use super::tensor::Matrix;

/// Assembles the wavelet-space coefficient matrix of one partial term on one
/// dimension. The coefficient function is evaluated at `t = 0`.
#[must_use]
pub fn assemble_partial_term<T: Real>(
    pterm: &PartialTerm<T>,
    dim: &Dimension<T>,
    transform: &Matrix<T>,
) -> Matrix<T> {
    let realspace = match pterm.kind {
        OpKind::Mass => assemble_mass(pterm, dim),
        OpKind::Grad => assemble_grad(pterm, dim),
    };

    &(transform * &realspace) * &transform.transpose()
}

fn assemble_mass<T: Real>(pterm: &PartialTerm<T>, dim: &Dimension<T>) -> Matrix<T> {
    let degree = dim.degree;
    let cells = 1_usize << dim.level;
    let width = (dim.domain_max.into_f64() - dim.domain_min.into_f64()) / cells as f64;

    let nq = degree + 2;
    let (nodes, weights) = legendre_gauss::<T>(nq, -1.0, 1.0);
    let (values, _) = legendre(nodes.as_slice(), degree);

    let half = T::from_f64(0.5);
    let mut matrix = Matrix::zeros(degree * cells, degree * cells);
    for cell in 0..cells {
        let left = width.mul_add(cell as f64, dim.domain_min.into_f64());
        for i in 0..degree {
            for j in 0..degree {
                let mut acc = T::zero();
                for q in 0..nq {
                    let x = T::from_f64(0.5 * width * (nodes[q].into_f64() + 1.0) + left);
                    acc += weights[q] * (pterm.g)(x, T::zero()) * values[(q, i)] * values[(q, j)];
                }
                matrix[(cell * degree + i, cell * degree + j)] = half * acc;
            }
        }
    }

    matrix
}

fn assemble_grad<T: Real>(pterm: &PartialTerm<T>, dim: &Dimension<T>) -> Matrix<T> {
    let degree = dim.degree;
    let cells = 1_usize << dim.level;
    let domain_min = dim.domain_min.into_f64();
    let width = (dim.domain_max.into_f64() - domain_min) / cells as f64;
    let inv_width = T::from_f64(1.0 / width);

    let nq = degree + 2;
    let (nodes, weights) = legendre_gauss::<T>(nq, -1.0, 1.0);
    let (values, derivs) = legendre(nodes.as_slice(), degree);
    let (trace_left, _) = legendre(&[-T::one()], degree);
    let (trace_right, _) = legendre(&[T::one()], degree);

    let mut matrix = Matrix::zeros(degree * cells, degree * cells);

    // volume term of the weak form: -integral of g f phi'
    for cell in 0..cells {
        let left = width.mul_add(cell as f64, domain_min);
        for i in 0..degree {
            for j in 0..degree {
                let mut acc = T::zero();
                for q in 0..nq {
                    let x = T::from_f64(0.5 * width * (nodes[q].into_f64() + 1.0) + left);
                    acc += weights[q] * (pterm.g)(x, T::zero()) * derivs[(q, i)] * values[(q, j)];
                }
                matrix[(cell * degree + i, cell * degree + j)] -= inv_width * acc;
            }
        }
    }

    // interface traces; interface m sits between cells m-1 and m
    let theta: T = pterm.flux.theta();
    let half = T::from_f64(0.5);
    for m in 0..=cells {
        let x = T::from_f64(width.mul_add(m as f64, domain_min));
        let g = (pterm.g)(x, T::zero());
        let sign = if g > T::zero() {
            T::one()
        } else if g < T::zero() {
            -T::one()
        } else {
            T::zero()
        };
        let weight_minus = half * (T::one() + theta * sign);
        let weight_plus = half * (T::one() - theta * sign);

        // right boundary of cell m-1
        if m > 0 {
            let row = m - 1;
            let col_plus = if m < cells {
                Some(m)
            } else if pterm.right == BoundaryCondition::Periodic {
                Some(0)
            } else {
                None
            };
            for i in 0..degree {
                for j in 0..degree {
                    let scale = inv_width * g * trace_right[(0, i)];
                    matrix[(row * degree + i, row * degree + j)] +=
                        scale * weight_minus * trace_right[(0, j)];
                    if let Some(col) = col_plus {
                        matrix[(row * degree + i, col * degree + j)] +=
                            scale * weight_plus * trace_left[(0, j)];
                    }
                }
            }
        }

        // left boundary of cell m
        if m < cells {
            let row = m;
            let col_minus = if m > 0 {
                Some(m - 1)
            } else if pterm.left == BoundaryCondition::Periodic {
                Some(cells - 1)
            } else {
                None
            };
            for i in 0..degree {
                for j in 0..degree {
                    let scale = inv_width * g * trace_left[(0, i)];
                    matrix[(row * degree + i, row * degree + j)] -=
                        scale * weight_plus * trace_left[(0, j)];
                    if let Some(col) = col_minus {
                        matrix[(row * degree + i, col * degree + j)] -=
                            scale * weight_minus * trace_right[(0, j)];
                    }
                }
            }
        }
    }

    matrix
}
