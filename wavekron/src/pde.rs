//! PDE descriptor: dimensions, separable operator terms, sources and the
//! pre-assembled 1D coefficient matrices.
//!
//! A descriptor is an immutable value constructed once per run. The spatial
//! operator is a sum of terms, each term a Kronecker product of one
//! one-dimensional factor per dimension; construction assembles every
//! `(term, dimension)` factor into a wavelet-space coefficient matrix of
//! side `degree * 2^level`, which is all the apply stage consumes.

use super::basis::{self, transform_matrix};
use super::coefficients;
use super::element::{ElementTable, MAX_DIMS};
use super::error::{Error, Result};
use super::real::Real;
use super::tensor::{Matrix, MatrixView, Vector};
use arrayvec::ArrayVec;
use rayon::prelude::*;

/// One-dimensional operator kind of a partial term.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpKind {
    /// Multiplication by the coefficient function: `g f`.
    Mass,
    /// Weak derivative of the flux: `d/dx (g f)`.
    Grad,
}

/// Numerical flux selector for grad partial terms.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flux {
    /// Average of the two traces.
    Central,
    /// Trace from the upstream side of `g`.
    Upwind,
    /// Trace from the downstream side of `g`.
    Downwind,
}

impl Flux {
    /// Flux parameter `theta` entering the interface weights
    /// `(1 ± theta * sign(g)) / 2`.
    #[must_use]
    pub fn theta<T: Real>(self) -> T {
        match self {
            Self::Central => T::zero(),
            Self::Upwind => T::one(),
            Self::Downwind => -T::one(),
        }
    }
}

/// Boundary treatment at one domain end.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BoundaryCondition {
    /// Wrap to the opposite end of the domain.
    Periodic,
    /// Homogeneous Dirichlet: the exterior trace vanishes.
    Dirichlet,
}

/// Single-dimension factor of a term.
#[derive(Clone, Copy)]
pub struct PartialTerm<T> {
    /// Operator kind.
    pub kind: OpKind,
    /// Coefficient function `g(x, t)`; assembly evaluates it at `t = 0`.
    pub g: fn(T, T) -> T,
    /// Numerical flux (grad only).
    pub flux: Flux,
    /// Left-end boundary condition.
    pub left: BoundaryCondition,
    /// Right-end boundary condition.
    pub right: BoundaryCondition,
}

impl<T: Real> PartialTerm<T> {
    /// Mass factor with coefficient one: the identity in an orthonormal
    /// basis.
    #[must_use]
    pub fn unit_mass() -> Self {
        Self {
            kind: OpKind::Mass,
            g: |_, _| T::one(),
            flux: Flux::Central,
            left: BoundaryCondition::Periodic,
            right: BoundaryCondition::Periodic,
        }
    }
}

/// One separable operator term: a partial term per dimension.
#[derive(Clone)]
pub struct Term<T> {
    /// Human-readable label, for summaries.
    pub name: &'static str,
    /// One factor per dimension, index = dimension.
    pub pterms: ArrayVec<PartialTerm<T>, MAX_DIMS>,
}

/// One spatial dimension of the problem.
#[derive(Clone, Copy)]
pub struct Dimension<T> {
    /// Lower domain bound.
    pub domain_min: T,
    /// Upper domain bound.
    pub domain_max: T,
    /// Hierarchical refinement level.
    pub level: usize,
    /// Number of Legendre basis functions per cell.
    pub degree: usize,
    /// Initial condition factor along this dimension.
    pub initial_condition: fn(T) -> T,
}

/// Separable function of space and time: a product of per-dimension spatial
/// factors and one time factor (scalar prefactors are folded into the time
/// factor).
#[derive(Clone)]
pub struct Separable<T> {
    /// Spatial factor per dimension.
    pub space: ArrayVec<fn(T) -> T, MAX_DIMS>,
    /// Time factor.
    pub time: fn(T) -> T,
}

/// Immutable problem description plus assembled coefficient matrices.
pub struct Pde<T: Real> {
    name: String,
    dims: ArrayVec<Dimension<T>, MAX_DIMS>,
    terms: Vec<Term<T>>,
    sources: Vec<Separable<T>>,
    exact: Option<Separable<T>>,
    transforms: ArrayVec<Matrix<T>, MAX_DIMS>,
    /// Row-major over `(term, dimension)`: entry `t * num_dims + d`.
    coefficients: Vec<Matrix<T>>,
}

impl<T: Real> Pde<T> {
    /// Validates the description and assembles all `(term, dimension)`
    /// coefficient matrices.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the shapes are inconsistent: no
    /// dimensions or terms, a term without exactly one factor per dimension,
    /// a source or exact solution without one spatial factor per dimension,
    /// zero degree, or levels/degrees that differ across dimensions.
    pub fn new(
        name: impl Into<String>,
        dims: ArrayVec<Dimension<T>, MAX_DIMS>,
        terms: Vec<Term<T>>,
        sources: Vec<Separable<T>>,
        exact: Option<Separable<T>>,
    ) -> Result<Self> {
        let name = name.into();
        let num_dims = dims.len();

        if num_dims == 0 {
            return Err(Error::Config(format!("PDE '{name}' declares no dimensions")));
        }
        if terms.is_empty() {
            return Err(Error::Config(format!("PDE '{name}' declares no terms")));
        }
        if dims.iter().any(|dim| dim.degree == 0) {
            return Err(Error::Config(format!("PDE '{name}' has a dimension of degree zero")));
        }
        let degree = dims[0].degree;
        let level = dims[0].level;
        if dims.iter().any(|dim| dim.degree != degree || dim.level != level) {
            return Err(Error::Config(format!(
                "PDE '{name}' mixes levels or degrees across dimensions; uniform values are required"
            )));
        }
        if dims
            .iter()
            .any(|dim| !(dim.domain_min.into_f64() < dim.domain_max.into_f64()))
        {
            return Err(Error::Config(format!("PDE '{name}' has an empty domain")));
        }
        if let Some(term) = terms.iter().find(|term| term.pterms.len() != num_dims) {
            return Err(Error::Config(format!(
                "term '{}' of PDE '{name}' carries {} factors for {num_dims} dimensions",
                term.name,
                term.pterms.len()
            )));
        }
        if sources.iter().any(|source| source.space.len() != num_dims)
            || exact.as_ref().is_some_and(|exact| exact.space.len() != num_dims)
        {
            return Err(Error::Config(format!(
                "a source or exact solution of PDE '{name}' does not carry one spatial factor per dimension"
            )));
        }

        let transforms: ArrayVec<Matrix<T>, MAX_DIMS> =
            dims.iter().map(|dim| transform_matrix(dim.level, dim.degree)).collect();

        let coefficients = (0..terms.len() * num_dims)
            .into_par_iter()
            .map(|index| {
                let (t, d) = (index / num_dims, index % num_dims);
                coefficients::assemble_partial_term(
                    &terms[t].pterms[d],
                    &dims[d],
                    &transforms[d],
                )
            })
            .collect();

        Ok(Self {
            name,
            dims,
            terms,
            sources,
            exact,
            transforms,
            coefficients,
        })
    }

    /// Name this PDE was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of dimensions.
    #[must_use]
    pub fn num_dims(&self) -> usize {
        self.dims.len()
    }

    /// Number of operator terms.
    #[must_use]
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Basis functions per cell (uniform across dimensions).
    #[must_use]
    pub fn degree(&self) -> usize {
        self.dims[0].degree
    }

    /// Refinement level (uniform across dimensions).
    #[must_use]
    pub fn level(&self) -> usize {
        self.dims[0].level
    }

    /// The dimensions.
    #[must_use]
    pub fn dims(&self) -> &[Dimension<T>] {
        &self.dims
    }

    /// The operator terms.
    #[must_use]
    pub fn terms(&self) -> &[Term<T>] {
        &self.terms
    }

    /// The sources.
    #[must_use]
    pub fn sources(&self) -> &[Separable<T>] {
        &self.sources
    }

    /// The separable exact solution, when one is known.
    #[must_use]
    pub fn exact_solution(&self) -> Option<&Separable<T>> {
        self.exact.as_ref()
    }

    /// Whether an analytic solution is available.
    #[must_use]
    pub fn has_analytic_solution(&self) -> bool {
        self.exact.is_some()
    }

    /// Forward multiwavelet transform of dimension `d`.
    #[must_use]
    pub fn transform(&self, d: usize) -> &Matrix<T> {
        &self.transforms[d]
    }

    /// View of the assembled coefficient matrix of term `t`, dimension `d`.
    #[must_use]
    pub fn coefficient(&self, t: usize, d: usize) -> MatrixView<'_, T> {
        self.coefficient_matrix(t, d).view()
    }

    /// Assembled coefficient matrix of term `t`, dimension `d`.
    #[must_use]
    pub fn coefficient_matrix(&self, t: usize, d: usize) -> &Matrix<T> {
        assert!(t < self.terms.len() && d < self.dims.len());
        &self.coefficients[t * self.dims.len() + d]
    }

    /// Projects a separable function onto the basis spanned by `table`,
    /// scaled by `scale`.
    #[must_use]
    pub fn project_separable(&self, table: &ElementTable, space: &[fn(T) -> T], scale: T) -> Vector<T> {
        assert_eq!(space.len(), self.num_dims());

        let per_dim: Vec<Vector<T>> = space
            .iter()
            .zip(&self.dims)
            .zip(&self.transforms)
            .map(|((f, dim), transform)| {
                basis::project_1d(
                    *f,
                    dim.domain_min.into_f64(),
                    dim.domain_max.into_f64(),
                    dim.level,
                    dim.degree,
                    transform,
                )
            })
            .collect();

        basis::combine_dimensions(table, self.degree(), &per_dim, scale)
    }

    /// Initial solution coefficients.
    #[must_use]
    pub fn initial_condition_vector(&self, table: &ElementTable) -> Vector<T> {
        let space: Vec<fn(T) -> T> = self.dims.iter().map(|dim| dim.initial_condition).collect();
        self.project_separable(table, &space, T::one())
    }

    /// Exact solution coefficients at time `t`, when an analytic solution is
    /// known.
    #[must_use]
    pub fn exact_solution_vector(&self, table: &ElementTable, t: T) -> Option<Vector<T>> {
        self.exact
            .as_ref()
            .map(|exact| self.project_separable(table, &exact.space, (exact.time)(t)))
    }

    /// Spatial source profiles, projected once; scale each by its time
    /// factor per step.
    #[must_use]
    pub fn source_spatial_vectors(&self, table: &ElementTable) -> Vec<Vector<T>> {
        self.sources
            .iter()
            .map(|source| self.project_separable(table, &source.space, T::one()))
            .collect()
    }

    /// Default time-step size: the smallest per-dimension cell width scaled
    /// by the CFL factor.
    #[must_use]
    pub fn suggested_dt(&self, cfl: T) -> T {
        let cells = (1_usize << self.level()) as f64;
        let width = self
            .dims
            .iter()
            .map(|dim| (dim.domain_max.into_f64() - dim.domain_min.into_f64()) / cells)
            .fold(f64::INFINITY, f64::min);
        cfl * T::from_f64(width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::element::Grid;

    #[test]
    fn assembled_shapes_follow_level_and_degree() {
        let pde = builtins::from_name::<f64>("continuity_2", 2, 2).unwrap();

        assert_eq!(pde.num_dims(), 2);
        assert_eq!(pde.num_terms(), 2);
        for t in 0..pde.num_terms() {
            for d in 0..pde.num_dims() {
                let view = pde.coefficient(t, d);
                assert_eq!(view.nrows(), 2 << 2);
                assert_eq!(view.ncols(), 2 << 2);
            }
        }
    }

    #[test]
    fn rejects_mixed_levels() {
        let mut dims = ArrayVec::<Dimension<f64>, MAX_DIMS>::new();
        for level in [2, 3] {
            dims.push(Dimension {
                domain_min: -1.0,
                domain_max: 1.0,
                level,
                degree: 2,
                initial_condition: |_| 0.0,
            });
        }
        let mut pterms = ArrayVec::new();
        pterms.push(PartialTerm::unit_mass());
        pterms.push(PartialTerm::unit_mass());

        let result = Pde::new("mixed", dims, vec![Term { name: "I", pterms }], vec![], None);
        assert!(matches!(result, Err(crate::error::Error::Config(_))));
    }

    #[test]
    fn initial_condition_of_continuity_1_is_zero() {
        let pde = builtins::from_name::<f64>("continuity_1", 2, 2).unwrap();
        let table = ElementTable::new(2, 1, Grid::Sparse).unwrap();

        let x0 = pde.initial_condition_vector(&table);
        assert_eq!(x0.len(), table.len() * 2);
        assert!(x0.as_slice().iter().all(|&v| v.abs() < 1e-14));
    }

    #[test]
    fn suggested_dt_scales_with_cfl() {
        let pde = builtins::from_name::<f64>("continuity_1", 3, 2).unwrap();

        let dt = pde.suggested_dt(0.5);
        // domain [-1, 1] over 2^3 cells, halved by the CFL factor
        assert!((dt - 0.125).abs() < 1e-15);
    }
}
