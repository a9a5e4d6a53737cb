use super::helpers::{self, GridChoice, Precision, StepperChoice};
use super::{GlobalConfiguration, Subcommand};
use anyhow::Result;
use clap::{Parser, ValueHint};
use prettytable::{cell, row};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use wavekron::builtins;
use wavekron::element::ElementTable;
use wavekron::output;
use wavekron::pde::Pde;
use wavekron::real::Real;
use wavekron::tensor::Vector;
use wavekron::time::{relative_l2_error, Advance};

/// Run an explicit time advance of a built-in PDE.
#[derive(Parser)]
pub struct Opts {
    /// Name of the built-in PDE; see `wavekron pdes`.
    #[arg(long, value_name = "NAME")]
    pde: String,
    /// Sparse-grid refinement level.
    #[arg(default_value_t = 3, long)]
    level: usize,
    /// Basis functions per cell and dimension.
    #[arg(default_value_t = 2, long)]
    degree: usize,
    /// CFL factor scaling the default time step.
    #[arg(default_value_t = 0.01, long)]
    cfl: f64,
    /// Explicit time step, overriding the CFL default.
    #[arg(long, value_name = "DT")]
    dt: Option<f64>,
    /// Number of time steps.
    #[arg(default_value_t = 10, long)]
    num_steps: usize,
    /// Grid admissibility rule.
    #[arg(default_value = "sparse", long, value_enum)]
    grid: GridChoice,
    /// Explicit stepping scheme.
    #[arg(default_value = "rk3", long, value_enum)]
    stepper: StepperChoice,
    /// Floating-point element type.
    #[arg(default_value = "double", long, value_enum)]
    precision: Precision,
    /// Workspace memory budget in MiB.
    #[arg(default_value_t = 1024, long, value_name = "MIB")]
    memory_limit: usize,
    /// Directory receiving Octave-format dumps of the run.
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    output: Option<PathBuf>,
}

impl Subcommand for Opts {
    fn run(&self, cfg: &GlobalConfiguration) -> Result<ExitCode> {
        match self.precision {
            Precision::Single => solve::<f32>(self, cfg),
            Precision::Double => solve::<f64>(self, cfg),
        }
    }
}

fn solve<T: Real>(opts: &Opts, cfg: &GlobalConfiguration) -> Result<ExitCode> {
    let pde = builtins::from_name::<T>(&opts.pde, opts.level, opts.degree)?;
    let table = ElementTable::new(opts.level, pde.num_dims(), opts.grid.into())?;
    let mut advance = Advance::new(&pde, &table, opts.memory_limit * 1024 * 1024)?;

    let dt = opts
        .dt
        .map_or_else(|| pde.suggested_dt(T::from_f64(opts.cfl)), T::from_f64);

    if !cfg.quiet {
        println!(
            "{}: {} elements, {} degrees of freedom, {} chunks, dt = {:.6e}",
            pde.name(),
            table.len(),
            advance.dof(),
            advance.chunks().len(),
            dt
        );
    }

    let mut x = pde.initial_condition_vector(&table);
    if let Some(dir) = &opts.output {
        dump_setup(dir, &pde, &x);
    }

    let mut summary = helpers::create_table();
    summary.set_titles(row![c->"step", c->"t", c->"L2 norm", c->"rel L2 error"]);

    let mut t = T::zero();
    for step in 0..opts.num_steps {
        x = advance.step(&x, t, dt, opts.stepper.into())?;
        t += dt;

        let error = pde
            .exact_solution_vector(&table, t)
            .map_or_else(|| "n/a".to_string(), |reference| {
                format!("{:.6e}", relative_l2_error(&x, &reference))
            });
        summary.add_row(row![
            r->step + 1,
            r->format!("{t:.6e}"),
            r->format!("{:.6e}", x.norm()),
            r->error
        ]);
    }

    if !cfg.quiet {
        summary.printstd();
    }

    if let Some(dir) = &opts.output {
        dump(dir, "solution_final.dat", |writer| output::write_vector(writer, &x));
    }

    Ok(ExitCode::SUCCESS)
}

fn dump_setup<T: Real>(dir: &Path, pde: &Pde<T>, initial: &Vector<T>) {
    dump(dir, "solution_initial.dat", |writer| output::write_vector(writer, initial));
    for t in 0..pde.num_terms() {
        for d in 0..pde.num_dims() {
            dump(dir, &format!("coefficients_t{t}_d{d}.dat"), |writer| {
                output::write_matrix(writer, pde.coefficient_matrix(t, d))
            });
        }
    }
}

/// Dump failures are soft: warn on stderr and carry on.
fn dump(dir: &Path, name: &str, write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>) {
    let path = dir.join(name);
    let result = std::fs::create_dir_all(dir)
        .and_then(|()| File::create(&path))
        .map(BufWriter::new)
        .and_then(|mut writer| write(&mut writer));

    if let Err(err) = result {
        eprintln!("warning: unable to write '{}': {err}", path.display());
    }
}
