use clap::ValueEnum;
use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};
use prettytable::Table;

/// Floating-point element type of a run.
#[derive(Clone, Copy, ValueEnum)]
pub enum Precision {
    /// 32-bit floats.
    Single,
    /// 64-bit floats.
    Double,
}

/// Grid admissibility rule.
#[derive(Clone, Copy, ValueEnum)]
pub enum GridChoice {
    /// Level sums bounded by the refinement level.
    Sparse,
    /// Full tensor product of levels.
    Full,
}

impl From<GridChoice> for wavekron::element::Grid {
    fn from(choice: GridChoice) -> Self {
        match choice {
            GridChoice::Sparse => Self::Sparse,
            GridChoice::Full => Self::Full,
        }
    }
}

/// Explicit stepping scheme.
#[derive(Clone, Copy, ValueEnum)]
pub enum StepperChoice {
    /// Forward Euler.
    Euler,
    /// Kutta's third-order rule.
    Rk3,
}

impl From<StepperChoice> for wavekron::time::Stepper {
    fn from(choice: StepperChoice) -> Self {
        match choice {
            StepperChoice::Euler => Self::Euler,
            StepperChoice::Rk3 => Self::Rk3,
        }
    }
}

pub fn create_table() -> Table {
    let mut table = Table::new();
    table.set_format(
        FormatBuilder::new()
            .column_separator(' ')
            .separator(LinePosition::Title, LineSeparator::new('-', '+', ' ', ' '))
            .build(),
    );
    table
}
