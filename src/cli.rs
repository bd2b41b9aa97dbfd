use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mylang-cfg")]
#[command(about = "CFG and call graph builder from MyLang ASTs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the IR and write Graphviz files for every function
    Analyze {
        /// AST files to analyze (JSON, one root node per file)
        #[arg(required = true)]
        files: Vec<String>,

        /// Output directory for the generated dot files
        #[arg(short, long)]
        output: Option<String>,

        /// Draw operation trees inside the CFG output
        #[arg(long)]
        ot: bool,
    },

    /// Build the IR and report diagnostics only
    Check {
        /// AST files to check
        #[arg(required = true)]
        files: Vec<String>,
    },
}
