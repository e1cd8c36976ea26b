//! LSO CLI: assemble, verify, disassemble and run scripts.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input/decode/assembly error
//! - 2: Verification failure
//! - 3: Runtime fault

mod commands;
mod host;

use std::process;

use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "assemble" => commands::assemble(&args[2..]),
        "verify" => commands::verify(&args[2..]),
        "disassemble" => commands::disassemble(&args[2..]),
        "run" => commands::run(&args[2..]),
        "--help" | "-h" | "help" => {
            print_usage();
            process::exit(0);
        }
        other => {
            eprintln!("error: unknown command '{other}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    if let Err(code) = result {
        process::exit(code);
    }
}

/// Diagnostics go to stderr. `RUST_LOG` overrides the default filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,lso=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_usage() {
    eprintln!("Usage: lso <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  assemble <input.lsl.s> [-o output.lsob]   Assemble text to an image");
    eprintln!("  verify <input.lsob>                       Verify an image");
    eprintln!("  disassemble <input.lsob>                  Disassemble an image to text");
    eprintln!("  run <input.lsob> [--ticks N] [--config file.json] [--touch N]");
    eprintln!("                                            Verify and run one instance");
}
