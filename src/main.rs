use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::{fs, io};

use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use mjc::bytecode::disasm::disassemble;
use mjc::diagnostics::Diagnostics;
use mjc::frontend::lexer::Lexer;
use mjc::frontend::token_dumper::TokenDumper;
use mjc::{Compiler, ObjectFile, Vm};

/// Single-pass MicroJava compiler.
#[derive(Debug, Parser)]
#[command(name = "mjc", version, about)]
struct Args {
    /// Source file (`.mj`)
    file: PathBuf,

    /// Print the token stream and stop
    #[arg(long)]
    tokens: bool,

    /// Disable colors in the token dump
    #[arg(long)]
    no_color: bool,

    /// Print a disassembly of the generated code
    #[arg(long)]
    disasm: bool,

    /// Execute the program, reading its input from stdin
    #[arg(long)]
    run: bool,

    /// Write the object file here
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write the postcard encoding instead of the binary image
    #[arg(long, requires = "output")]
    postcard: bool,

    /// Debug logging when RUST_LOG is not set
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(debug_fallback: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if debug_fallback { "debug" } else { "info" };
        EnvFilter::new(level)
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

fn ensure_extension(path: &Path) -> Result<(), String> {
    if path.extension().and_then(|e| e.to_str()) != Some("mj") {
        return Err(format!("expected a .mj file, got {}", path.display()));
    }
    Ok(())
}

fn dump_tokens(source: &str, no_color: bool) -> ExitCode {
    let mut diag = Diagnostics::new();
    let tokens = Lexer::new(source).tokenize(&mut diag);

    let mut dumper = TokenDumper::new();
    if no_color {
        dumper = dumper.no_color();
    }
    print!("{}", dumper.dump(&tokens));

    for d in diag.iter() {
        eprintln!("-- line {} col {}: {}", d.line, d.col, d.message);
    }
    if diag.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn write_object(obj: &ObjectFile, path: &Path, postcard: bool) -> Result<(), String> {
    let bytes = if postcard {
        obj.to_postcard().map_err(|e| e.to_string())?
    } else {
        obj.encode()
    };
    fs::write(path, bytes).map_err(|e| format!("failed to write '{}': {}", path.display(), e))?;
    tracing::info!(path = %path.display(), "object file written");
    Ok(())
}

fn run(args: &Args) -> Result<ExitCode, String> {
    ensure_extension(&args.file)?;
    let source = fs::read_to_string(&args.file)
        .map_err(|e| format!("failed to read '{}': {}", args.file.display(), e))?;

    if args.tokens {
        return Ok(dump_tokens(&source, args.no_color));
    }

    let compilation = Compiler::new()
        .compile_source(&source)
        .map_err(|e| e.to_string())?;

    for d in &compilation.diagnostics {
        println!("-- line {} col {}: {}", d.line, d.col, d.message);
    }
    if !compilation.is_ok() {
        println!("{} errors detected", compilation.diagnostics.len());
        return Ok(ExitCode::FAILURE);
    }

    let obj = compilation.object;
    if args.disasm {
        print!("{}", disassemble(&obj));
    }
    if let Some(path) = &args.output {
        write_object(&obj, path, args.postcard)?;
    }
    if args.run {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        let output = Vm::new().run(&obj, &input).map_err(|e| e.to_string())?;
        print!("{output}");
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
