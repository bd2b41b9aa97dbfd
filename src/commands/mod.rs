pub mod analyze;
pub mod check;

use crate::ast::{self, ParsedFile};
use crate::cli::Commands;
use crate::errors::MyLangResult;
use crate::program::Program;
use crate::utils::Config;
use console::style;
use std::path::Path;

pub fn handle_command(command: Commands, config: &mut Config) -> MyLangResult<()> {
    match command {
        Commands::Analyze { files, output, ot } => {
            if ot {
                config.output.draw_operation_trees = true;
            }
            if let Some(dir) = output {
                config.output.directory = dir;
            }
            analyze::handle(&files, config)
        }
        Commands::Check { files } => check::handle(&files, config),
    }
}

pub(crate) fn load_files(files: &[String]) -> MyLangResult<Vec<ParsedFile>> {
    files
        .iter()
        .map(|f| ast::load_ast_file(Path::new(f)))
        .collect()
}

pub(crate) fn print_diagnostics(program: &Program, config: &Config) {
    let cap = config
        .diagnostics
        .max_messages
        .map(|m| m as usize)
        .unwrap_or(usize::MAX);

    if !program.errors.is_empty() {
        println!("{}:", style("Errors").red().bold());
        for error in program.errors.iter().take(cap) {
            println!("{error}");
        }
    }
    if !program.warnings.is_empty() {
        println!("{}:", style("Warnings").yellow().bold());
        for warning in program.warnings.iter().take(cap) {
            println!("{warning}");
        }
    }
}
