//! Command-line driver for `lexgen`: reads a project file, runs the full
//! pipeline, and writes the emitted header/source pair to disk.
//!
//! Progress output is gated through a local `log!` macro rather than a
//! tracing/log-facade dependency, keeping verbosity handling a direct
//! function of the `-v` counter.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Compile a lexgen project file into a table-driven C++ scanner.
#[derive(Debug, Parser)]
#[command(name = "lexgen-cli", version, about)]
struct LexgenArgs {
    /// Path to the project file.
    input: PathBuf,

    /// Output directory for the emitted header/source (default: the input
    /// file's own directory).
    #[arg(long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Output source filename (default: `<input-stem>.lex.cpp`).
    #[arg(long = "src", value_name = "NAME")]
    src: Option<String>,

    /// Output header filename (default: `<input-stem>.lex.h`).
    #[arg(long = "header", value_name = "NAME")]
    header: Option<String>,

    /// Verbosity: repeat for more detail (-v warnings, -vv per-stage notes).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = LexgenArgs::parse();

    let log = |level: u8, s: &str| {
        if args.verbose >= level {
            eprintln!("{s}");
        }
    };
    macro_rules! log {
        ($level:expr, $($t:tt)*) => (log($level, &format!($($t)*)))
    }

    let stem = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("lexer")
        .to_string();

    let source = match std::fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: reading {}: {e}", args.input.display());
            return ExitCode::FAILURE;
        }
    };
    log!(2, "read {} bytes from {}", source.len(), args.input.display());

    let (header, src, warnings) = match lexgen::generate(&source, &stem) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    log!(2, "pipeline complete: {} warning(s)", warnings.len());
    for warning in &warnings {
        log!(1, "warning: {warning}");
    }

    let dir = args
        .dir
        .clone()
        .or_else(|| args.input.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let header_name = args.header.clone().unwrap_or_else(|| format!("{stem}.lex.h"));
    let src_name = args.src.clone().unwrap_or_else(|| format!("{stem}.lex.cpp"));
    let header_path = dir.join(&header_name);
    let src_path = dir.join(&src_name);

    if let Err(e) = std::fs::write(&header_path, header) {
        eprintln!("error: writing {}: {e}", header_path.display());
        return ExitCode::FAILURE;
    }
    if let Err(e) = std::fs::write(&src_path, src) {
        eprintln!("error: writing {}: {e}", src_path.display());
        return ExitCode::FAILURE;
    }
    log!(2, "wrote {}", header_path.display());
    log!(2, "wrote {}", src_path.display());

    ExitCode::SUCCESS
}
