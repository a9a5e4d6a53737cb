use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::Result;
use clap::Parser;
use prettytable::{cell, row};
use std::process::ExitCode;
use wavekron::builtins;

/// List the built-in PDEs.
#[derive(Parser)]
pub struct Opts {}

impl Subcommand for Opts {
    fn run(&self, _: &GlobalConfiguration) -> Result<ExitCode> {
        let mut table = helpers::create_table();
        table.set_titles(row![c->"name", c->"dims", c->"description"]);

        for &(name, num_dims, description) in builtins::CATALOG {
            table.add_row(row![name, r->num_dims, description]);
        }

        table.printstd();
        Ok(ExitCode::SUCCESS)
    }
}
