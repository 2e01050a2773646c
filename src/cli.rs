use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use snakec::Backend;

#[derive(Parser)]
#[command(name = "snakec")]
#[command(about = "Compiler for a small indentation-structured language")]
pub struct Cli {
    /// Project file holding a [limits] table
    #[arg(long, global = true, default_value = "project.toml")]
    pub config: PathBuf,

    /// Print progress of each stage to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the token stream of a source file
    Tokens(FileArgs),
    /// Parse a source file and print the AST
    Parse(FileArgs),
    /// Compile a source file to assembly or LLVM IR
    Build(BuildArgs),
    /// Evaluate a source file without compiling it
    Eval(FileArgs),
    /// Compile, link with an external C compiler and run
    Run(RunArgs),
}

#[derive(clap::Args)]
pub struct FileArgs {
    /// Input file path
    pub file: PathBuf,
}

#[derive(clap::Args)]
pub struct BuildArgs {
    /// Input file path
    pub file: PathBuf,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = BackendArg::X86_64)]
    pub backend: BackendArg,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Input file path
    pub file: PathBuf,

    /// C compiler used to assemble and link
    #[arg(long, default_value = "cc")]
    pub cc: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum BackendArg {
    #[value(name = "x86-64")]
    X86_64,
    Llvm,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::X86_64 => Backend::X86_64,
            BackendArg::Llvm => Backend::Llvm,
        }
    }
}
