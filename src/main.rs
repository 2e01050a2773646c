mod cli;

use std::error::Error;
use std::fs;
use std::path::Path;
use std::process::{Command, ExitCode};

use clap::Parser as _;
use snafu::ResultExt;

use cli::{BuildArgs, Cli, Commands, RunArgs};
use snakec::error::IoSnafu;
use snakec::{Backend, CompilerLimits, lexer, parser};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, Box<dyn Error>> {
    let limits = snakec::load_limits(&cli.config)?;
    if cli.verbose {
        eprintln!("[snakec] limits: {:?}", limits);
    }

    match &cli.command {
        Commands::Tokens(args) => {
            let source = read_source(&args.file, cli.verbose)?;
            let tokens = lexer::lex(&source, &limits)?;
            print!("{}", tokens.dump());
        }
        Commands::Parse(args) => {
            let source = read_source(&args.file, cli.verbose)?;
            let tokens = lexer::lex(&source, &limits)?;
            if cli.verbose {
                eprintln!("[snakec] {} tokens", tokens.list.len());
            }
            let function = parser::parse(&tokens, &limits)?;
            println!("{}", function);
        }
        Commands::Build(args) => build(args, &limits, cli.verbose)?,
        Commands::Eval(args) => {
            let source = read_source(&args.file, cli.verbose)?;
            if let Some(value) = snakec::evaluate(&source, &limits)? {
                println!("{}", value);
            }
        }
        Commands::Run(args) => return run_native(args, &limits, cli.verbose),
    }

    Ok(ExitCode::SUCCESS)
}

fn read_source(path: &Path, verbose: bool) -> Result<String, Box<dyn Error>> {
    // read_to_string rejects input that is not valid UTF-8
    let source = fs::read_to_string(path).context(IoSnafu { path })?;
    if verbose {
        eprintln!("[snakec] read {} ({} bytes)", path.display(), source.len());
    }
    Ok(source)
}

fn build(args: &BuildArgs, limits: &CompilerLimits, verbose: bool) -> Result<(), Box<dyn Error>> {
    let source = read_source(&args.file, verbose)?;
    let backend = Backend::from(args.backend);

    match &args.output {
        Some(output) => {
            snakec::compile_to_file(&source, limits, backend, output)?;
            if verbose {
                eprintln!("[snakec] wrote {}", output.display());
            }
        }
        None => print!("{}", snakec::compile(&source, limits, backend)?),
    }
    Ok(())
}

fn run_native(args: &RunArgs, limits: &CompilerLimits, verbose: bool) -> Result<ExitCode, Box<dyn Error>> {
    let source = read_source(&args.file, verbose)?;

    let dir = tempfile::tempdir()?;
    let asm_path = dir.path().join(format!("main.{}", Backend::X86_64.extension()));
    let exe_path = dir.path().join("main");
    snakec::compile_to_file(&source, limits, Backend::X86_64, &asm_path)?;

    if verbose {
        eprintln!("[snakec] {} -o {} {}", args.cc, exe_path.display(), asm_path.display());
    }
    let status = Command::new(&args.cc)
        .arg("-o")
        .arg(&exe_path)
        .arg(&asm_path)
        .status()
        .map_err(|e| format!("failed to execute {}: {}", args.cc, e))?;
    if !status.success() {
        return Err(format!("{} failed with {}", args.cc, status).into());
    }

    let status = Command::new(&exe_path).status()?;
    if verbose {
        eprintln!("[snakec] program exited with {}", status);
    }
    // A signal-terminated program has no exit code
    let code = status.code().unwrap_or(1);
    Ok(ExitCode::from(code as u8))
}
