//! CLI entry point for the `pio-prog` tool.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use pio_core::{PioSystem, Program, SystemConfig};
use pio_program::{load_program, program_image};
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
use tracing::{debug, Level};

const USAGE_TEXT: &str = "\
Usage: pio-prog <command> [options]

Commands:
  check <input>...                       Parse programs and print a summary
  build <input> [-o <output>] [--verbose] Write the little-endian instruction image
  place <input>... [--verbose]           Load programs into PIO0 and print offsets

Options:
  -o, --output <file>  Output file path (default: input stem + .bin)
  -v, --verbose        Log debug output to stderr
  -h, --help           Show this help message

Examples:
  pio-prog check blink.pio ws2812.pio
  pio-prog build blink.pio -o blink.bin
  pio-prog place blink.pio ws2812.pio
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Check(InputArgs),
    Build(BuildArgs),
    Place(InputArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct InputArgs {
    inputs: Vec<PathBuf>,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct BuildArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    match first.to_string_lossy().as_ref() {
        "check" => parse_input_args(args)
            .map(Command::Check)
            .map(ParseResult::Command),
        "build" => parse_build_args(args)
            .map(Command::Build)
            .map(ParseResult::Command),
        "place" => parse_input_args(args)
            .map(Command::Place)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn parse_input_args(args: impl Iterator<Item = OsString>) -> Result<InputArgs, String> {
    let mut inputs = Vec::new();
    let mut verbose = false;

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }
        if arg == "--verbose" || arg == "-v" {
            verbose = true;
            continue;
        }
        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }
        inputs.push(PathBuf::from(arg));
    }

    if inputs.is_empty() {
        return Err("missing input path".to_string());
    }
    Ok(InputArgs { inputs, verbose })
}

#[allow(clippy::while_let_on_iterator)]
fn parse_build_args(mut args: impl Iterator<Item = OsString>) -> Result<BuildArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
            continue;
        }

        if arg == "-o" || arg == "--output" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for -o".to_string())?;
            output = Some(PathBuf::from(value));
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if input.is_some() {
            return Err("multiple input paths provided".to_string());
        }
        input = Some(PathBuf::from(arg));
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(BuildArgs {
        input,
        output,
        verbose,
    })
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{stem}.bin"))
}

fn load(path: &Path) -> Result<Program, i32> {
    load_program(path).map_err(|e| {
        eprintln!("{e}");
        1
    })
}

fn summary(path: &Path, program: &Program) -> String {
    let origin = program
        .origin()
        .map_or_else(|| "relocatable".to_string(), |origin| format!("origin {origin}"));
    let side_set = program.side_set();
    let mut line = format!(
        "{}: {} ({} instructions, {origin}, wrap {}..{}",
        path.display(),
        program.id().unwrap_or("<unnamed>"),
        program.len(),
        program.wrap_target(),
        program.wrap(),
    );
    if side_set.count > 0 {
        line.push_str(&format!(", side-set {}", side_set.count));
        if side_set.optional {
            line.push_str(" opt");
        }
        if side_set.pindirs {
            line.push_str(" pindirs");
        }
    }
    line.push(')');
    line
}

fn run_check(args: &InputArgs) -> Result<(), i32> {
    let mut failed = false;
    for path in &args.inputs {
        match load(path) {
            Ok(program) => println!("{}", summary(path, &program)),
            Err(_) => failed = true,
        }
    }
    if failed {
        Err(1)
    } else {
        Ok(())
    }
}

fn run_build(args: BuildArgs) -> Result<(), i32> {
    let program = load(&args.input)?;
    let image = program_image(&program);
    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));

    if let Err(e) = fs::write(&output_path, &image) {
        eprintln!("error: failed to write output: {e}");
        return Err(1);
    }

    if args.verbose {
        for (slot, word) in program.instructions().iter().enumerate() {
            eprintln!("{slot:02}: {word:04x}");
        }
    }

    println!(
        "Wrote {} ({} instructions, {} bytes) -> {}",
        args.input.display(),
        program.len(),
        image.len(),
        output_path.display()
    );
    Ok(())
}

fn run_place(args: &InputArgs) -> Result<(), i32> {
    let programs = args
        .inputs
        .iter()
        .map(|path| load(path).map(|program| (path, program)))
        .collect::<Result<Vec<_>, _>>()?;

    let system = PioSystem::new(SystemConfig::default()).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let Some(pio) = system.pio(0) else {
        eprintln!("error: PIO0 is not available");
        return Err(1);
    };

    for (path, program) in &programs {
        match pio.add_program(program) {
            Ok(offset) => {
                debug!(path = %path.display(), offset, "placed program");
                println!("{}: offset {offset}", path.display());
            }
            Err(e) => {
                eprintln!("{}: error: {e}", path.display());
                return Err(1);
            }
        }
    }
    println!("occupancy {:#010x}", pio.memory().occupancy());
    Ok(())
}

const fn verbose(command: &Command) -> bool {
    match command {
        Command::Check(args) | Command::Place(args) => args.verbose,
        Command::Build(args) => args.verbose,
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            init_tracing(verbose(&command));
            let result = match command {
                Command::Check(args) => run_check(&args),
                Command::Build(args) => run_build(args),
                Command::Place(args) => run_place(&args),
            };
            match result {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
