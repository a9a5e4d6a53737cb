//! Explicit time advance.
//!
//! One step combines the batched operator apply with the time-scaled source
//! vectors: the spatial profile of every source is projected once at setup
//! and only its scalar time factor is evaluated per step. The advance owns
//! the chunk plan and the workspaces; the solution leaves a step either
//! finite or as a fatal numeric error.

use super::chunk::{plan_chunks, ElementChunk, Workspace};
use super::element::ElementTable;
use super::error::{Error, Result};
use super::kronmult::apply_operator;
use super::lib_dispatch;
use super::pde::Pde;
use super::real::Real;
use super::tensor::Vector;

/// Explicit stepping scheme.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stepper {
    /// Forward Euler.
    Euler,
    /// Kutta's third-order rule.
    Rk3,
}

/// Time-advance state for one configuration: chunk plan, workspaces and
/// cached source profiles.
pub struct Advance<'a, T: Real> {
    pde: &'a Pde<T>,
    table: &'a ElementTable,
    chunks: Vec<ElementChunk>,
    workspace: Workspace<T>,
    sources: Vec<(Vector<T>, fn(T) -> T)>,
}

impl<'a, T: Real> Advance<'a, T> {
    /// Plans chunks for the full coupling set under `workspace_limit_bytes`
    /// and projects the source profiles.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the PDE and table shapes disagree or
    /// the memory budget cannot hold a single coupling.
    pub fn new(pde: &'a Pde<T>, table: &'a ElementTable, workspace_limit_bytes: usize) -> Result<Self> {
        if pde.num_dims() != table.num_dims() {
            return Err(Error::Config(format!(
                "PDE '{}' has {} dimensions but the element table has {}",
                pde.name(),
                pde.num_dims(),
                table.num_dims()
            )));
        }

        let coefficient_blocks = pde.coefficient_matrix(0, 0).nrows() / pde.degree();
        let max_idx1d = table
            .iter()
            .flat_map(|element| element.levels.iter().zip(&element.cells))
            .map(|(&level, &cell)| super::element::idx1d(level, cell))
            .max()
            .unwrap_or(0);
        if max_idx1d >= coefficient_blocks {
            return Err(Error::Config(format!(
                "element table of PDE '{}' addresses 1D index {max_idx1d} beyond the assembled {coefficient_blocks} blocks",
                pde.name()
            )));
        }

        let elem_size = pde.degree().pow(u32::try_from(pde.num_dims()).unwrap());
        let chunks = plan_chunks(
            table.len(),
            table.len(),
            elem_size,
            pde.num_terms(),
            std::mem::size_of::<T>(),
            workspace_limit_bytes,
        )?;
        let workspace = Workspace::new(&chunks, elem_size, pde.num_terms(), pde.num_dims());

        let sources = pde
            .source_spatial_vectors(table)
            .into_iter()
            .zip(pde.sources())
            .map(|(vector, source)| (vector, source.time))
            .collect();

        Ok(Self {
            pde,
            table,
            chunks,
            workspace,
            sources,
        })
    }

    /// Total degrees of freedom.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.table.len() * self.pde.degree().pow(u32::try_from(self.pde.num_dims()).unwrap())
    }

    /// The planned chunks.
    #[must_use]
    pub fn chunks(&self) -> &[ElementChunk] {
        &self.chunks
    }

    /// Right-hand side `A x + sum_s s(t)`.
    pub fn rhs(&mut self, x: &Vector<T>, t: T) -> Vector<T> {
        let mut fx = Vector::zeros(x.len());
        apply_operator(self.pde, self.table, &self.chunks, &mut self.workspace, x, &mut fx);

        for (profile, time) in &self.sources {
            lib_dispatch::axpy(time(t), profile.as_slice(), fx.as_mut_slice());
        }

        fx
    }

    /// Advances one step from `(x, t)` and returns the new solution.
    ///
    /// # Errors
    ///
    /// Returns a numeric error if the stepped solution contains NaN or
    /// infinite entries.
    pub fn step(&mut self, x: &Vector<T>, t: T, dt: T, stepper: Stepper) -> Result<Vector<T>> {
        let fx = match stepper {
            Stepper::Euler => {
                let k1 = self.rhs(x, t);
                &(&k1 * dt) + x
            }
            Stepper::Rk3 => {
                let half = T::from_f64(0.5);
                let two = T::from_f64(2.0);
                let sixth = T::from_f64(1.0 / 6.0);

                let k1 = self.rhs(x, t);
                let x2 = &(&k1 * (half * dt)) + x;
                let k2 = self.rhs(&x2, t + half * dt);
                let x3 = &(&(&k2 * (two * dt)) - &(&k1 * dt)) + x;
                let k3 = self.rhs(&x3, t + dt);

                let combined = &(&k1 + &(&k2 * T::from_f64(4.0))) + &k3;
                &(&combined * (sixth * dt)) + x
            }
        };

        if fx.as_slice().iter().any(|value| !value.is_finite()) {
            return Err(Error::Numeric(format!(
                "solution diverged at t = {t}: NaN or infinite entries after the step"
            )));
        }

        Ok(fx)
    }
}

/// Relative L2 distance between a computed and a reference coefficient
/// vector; the basis is orthonormal, so this is the relative L2 error of the
/// represented functions.
#[must_use]
pub fn relative_l2_error<T: Real>(computed: &Vector<T>, reference: &Vector<T>) -> T {
    (computed - reference).norm() / reference.norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::element::Grid;

    const WORKSPACE_LIMIT: usize = 1 << 28;

    #[test]
    fn one_euler_step_of_continuity_1_tracks_the_exact_solution() {
        let pde = builtins::from_name::<f64>("continuity_1", 2, 2).unwrap();
        let table = ElementTable::new(2, 1, Grid::Sparse).unwrap();
        let mut advance = Advance::new(&pde, &table, WORKSPACE_LIMIT).unwrap();

        let x0 = pde.initial_condition_vector(&table);
        let dt = 0.01;
        let x1 = advance.step(&x0, 0.0, dt, Stepper::Euler).unwrap();

        let reference = pde.exact_solution_vector(&table, dt).unwrap();
        let error = relative_l2_error(&x1, &reference);
        assert!(error <= 1e-3, "relative L2 error {error}");
    }

    #[test]
    fn ten_rk3_steps_of_continuity_3_stay_accurate() {
        let level = 3;
        let pde = builtins::from_name::<f64>("continuity_3", level, 3).unwrap();
        let table = ElementTable::new(level, 3, Grid::Sparse).unwrap();

        // admissible level tuples and elements of the 3D level-3 table
        assert_eq!(table.len(), 38);

        let mut advance = Advance::new(&pde, &table, WORKSPACE_LIMIT).unwrap();
        let dt = pde.suggested_dt(0.01);
        assert!((dt - 0.0025).abs() < 1e-15);

        let mut x = pde.initial_condition_vector(&table);
        let mut t = 0.0;
        for _ in 0..10 {
            x = advance.step(&x, t, dt, Stepper::Rk3).unwrap();
            t += dt;
        }

        let reference = pde.exact_solution_vector(&table, t).unwrap();
        let error = relative_l2_error(&x, &reference);
        assert!(error < 0.1, "relative L2 error {error}");
    }

    #[test]
    fn fokkerplanck_decays_towards_the_exact_solution() {
        let pde = builtins::from_name::<f64>("fokkerplanck_1d_4p2", 4, 3).unwrap();
        let table = ElementTable::new(4, 1, Grid::Sparse).unwrap();
        let mut advance = Advance::new(&pde, &table, WORKSPACE_LIMIT).unwrap();

        let dt = 1e-3;
        let mut x = pde.initial_condition_vector(&table);
        let mut t = 0.0;
        for _ in 0..100 {
            x = advance.step(&x, t, dt, Stepper::Rk3).unwrap();
            t += dt;
        }

        let reference = pde.exact_solution_vector(&table, t).unwrap();
        let error = relative_l2_error(&x, &reference);
        assert!(error < 1e-2, "relative L2 error {error}");
    }

    #[test]
    fn convergence_rate_follows_the_degree() {
        let degree = 3;
        // keep the RK3 error far below the spatial error at the finest level
        let dt = 2e-4;
        let steps = 250;

        let mut errors = Vec::new();
        for level in [3, 4, 5] {
            let pde = builtins::from_name::<f64>("continuity_1", level, degree).unwrap();
            let table = ElementTable::new(level, 1, Grid::Sparse).unwrap();
            let mut advance = Advance::new(&pde, &table, WORKSPACE_LIMIT).unwrap();

            let mut x = pde.initial_condition_vector(&table);
            let mut t = 0.0;
            for _ in 0..steps {
                x = advance.step(&x, t, dt, Stepper::Rk3).unwrap();
                t += dt;
            }

            let reference = pde.exact_solution_vector(&table, t).unwrap();
            errors.push(relative_l2_error(&x, &reference));
        }

        // slope of log2(error) against level over two refinements
        let slope = (errors[0] / errors[2]).log2() / 2.0;
        assert!(
            slope >= f64::from(u32::try_from(degree).unwrap()) - 0.1,
            "convergence slope {slope} with errors {errors:?}"
        );
    }

    #[test]
    fn unstable_step_size_is_reported_as_a_numeric_error() {
        let level = 2;
        let pde = builtins::from_name::<f64>("continuity_3", level, 3).unwrap();
        let table = ElementTable::new(level, 3, Grid::Sparse).unwrap();
        let mut advance = Advance::new(&pde, &table, WORKSPACE_LIMIT).unwrap();

        // far beyond the stability limit of forward Euler
        let dt = pde.suggested_dt(1.0);
        let mut x = pde.initial_condition_vector(&table);
        let mut t = 0.0;
        let mut diverged = false;
        for _ in 0..2000 {
            match advance.step(&x, t, dt, Stepper::Euler) {
                Ok(next) => x = next,
                Err(Error::Numeric(_)) => {
                    diverged = true;
                    break;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
            t += dt;
        }
        assert!(diverged, "Euler at CFL 1 must blow up");
    }

    #[test]
    fn mismatched_table_is_a_configuration_error() {
        let pde = builtins::from_name::<f64>("continuity_2", 2, 2).unwrap();
        let table = ElementTable::new(2, 1, Grid::Sparse).unwrap();
        assert!(matches!(
            Advance::new(&pde, &table, WORKSPACE_LIMIT),
            Err(Error::Config(_))
        ));

        // deeper table than the assembled coefficients
        let deep = ElementTable::new(4, 2, Grid::Sparse).unwrap();
        assert!(matches!(Advance::new(&pde, &deep, WORKSPACE_LIMIT), Err(Error::Config(_))));
    }
}
