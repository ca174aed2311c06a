//! Quill CLI: compile and run a source file or an inline snippet.

use std::env;
use std::fs;
use std::process;

use colored::Colorize;
use tracing_subscriber::filter::{EnvFilter, LevelFilter, ParseError};

use quill::bytecode::{self, VmConfig};
use quill::error::QuillError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes, following sysexits.
const EX_USAGE: i32 = 64;
const EX_DATAERR: i32 = 65;
const EX_NOINPUT: i32 = 66;
const EX_SOFTWARE: i32 = 70;

/// CLI command to execute.
enum Command {
    /// Run a source file
    Run { file: String },
    /// Evaluate a string
    Eval { code: String },
    Help,
    Version,
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    disassemble: bool,
    trace: bool,
    stack_size: usize,
}

fn print_usage() {
    eprintln!("Quill {} - bytecode compiler and virtual machine", VERSION);
    eprintln!();
    eprintln!("Usage: quill [options] <file.ql>");
    eprintln!("       quill [options] -e '<source>'");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e <source>         Compile and run source from the command line");
    eprintln!("  --disassemble       Print the bytecode before running it");
    eprintln!("  --trace             Log every executed instruction to stderr");
    eprintln!(
        "  --stack-size <N>    Operand stack capacity in slots (default {})",
        bytecode::vm::DEFAULT_STACK_CAPACITY
    );
    eprintln!("  -h, --help          Show this help");
    eprintln!("  -V, --version       Show the version");
}

fn usage_error(message: &str) -> ! {
    eprintln!("{} {}", "error:".red().bold(), message);
    print_usage();
    process::exit(EX_USAGE);
}

fn parse_stack_size(value: &str) -> Option<usize> {
    value
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=bytecode::vm::MAX_STACK_CAPACITY).contains(n))
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut options = Options {
        command: Command::Help,
        disassemble: false,
        trace: false,
        stack_size: bytecode::vm::DEFAULT_STACK_CAPACITY,
    };
    let mut command = None;

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "-h" | "--help" => return Options {
                command: Command::Help,
                ..options
            },
            "-V" | "--version" => return Options {
                command: Command::Version,
                ..options
            },
            "--disassemble" => options.disassemble = true,
            "--trace" => options.trace = true,
            "--stack-size" => {
                i += 1;
                let value = args
                    .get(i)
                    .unwrap_or_else(|| usage_error("--stack-size requires a number"));
                options.stack_size = parse_stack_size(value).unwrap_or_else(|| {
                    usage_error(&format!(
                        "invalid stack size '{}' (1..={})",
                        value,
                        bytecode::vm::MAX_STACK_CAPACITY
                    ))
                });
            }
            "-e" => {
                i += 1;
                let code = args
                    .get(i)
                    .unwrap_or_else(|| usage_error("-e requires source code"));
                if command.is_some() {
                    usage_error("only one program can be run at a time");
                }
                command = Some(Command::Eval { code: code.clone() });
            }
            other if other.starts_with('-') => {
                usage_error(&format!("unknown option '{}'", other));
            }
            file => {
                if command.is_some() {
                    usage_error(&format!("unexpected argument '{}'", file));
                }
                command = Some(Command::Run {
                    file: file.to_string(),
                });
            }
        }
        i += 1;
    }

    match command {
        Some(command) => Options { command, ..options },
        None => usage_error("no input file"),
    }
}

/// Build the log filter from `RUST_LOG` directives. Logging defaults to
/// `warn`; `--trace` additionally enables instruction tracing in the VM.
fn log_filter(directives: &str, trace: bool) -> Result<EnvFilter, ParseError> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives);
    if trace {
        Ok(filter.add_directive("quill::bytecode::vm=trace".parse()?))
    } else {
        Ok(filter)
    }
}

fn init_tracing(trace: bool) -> Result<(), ParseError> {
    let directives = env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let filter = log_filter(&directives, trace)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() {
    let options = parse_args();

    let source = match &options.command {
        Command::Help => {
            print_usage();
            return;
        }
        Command::Version => {
            println!("quill {}", VERSION);
            return;
        }
        Command::Eval { code } => code.clone(),
        Command::Run { file } => match fs::read_to_string(file) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("{} cannot read '{}': {}", "error:".red().bold(), file, e);
                process::exit(EX_NOINPUT);
            }
        },
    };

    if let Err(e) = init_tracing(options.trace) {
        eprintln!("{} invalid log filter: {}", "error:".red().bold(), e);
        process::exit(EX_USAGE);
    }

    if let Err(e) = run(&source, &options) {
        report(&e);
        process::exit(if e.is_static() { EX_DATAERR } else { EX_SOFTWARE });
    }
}

fn run(source: &str, options: &Options) -> Result<(), QuillError> {
    let compiled = quill::compile(source)?;

    if options.disassemble {
        print!("{}", bytecode::disassemble_compiled(&compiled));
        println!("---");
    }

    let config = VmConfig {
        stack_capacity: options.stack_size,
    };
    quill::execute(compiled, std::io::stdout(), config)?;
    Ok(())
}

fn report(error: &QuillError) {
    let label = match error {
        QuillError::Trap(_) => "trap:",
        _ => "error:",
    };
    eprintln!("{} {}", label.red().bold(), error);
}
