mod bytecode;
mod lang;
mod parse;
mod runtime;

use std::{env, fs, path::Path, process, sync::Arc};

use crate::bytecode::code::Code;
use crate::bytecode::compile::compile;
use crate::bytecode::disasm::disassemble;
use crate::runtime::vm::execute;

fn main() {
    let args: Vec<String> = env::args().collect();

    let show_bytecode =
        args.contains(&"--bc".to_string()) || args.contains(&"--bytecode".to_string());
    let use_trace = args.contains(&"--trace".to_string());
    let emit = args
        .windows(2)
        .find(|pair| pair[0] == "--emit")
        .map(|pair| pair[1].clone());

    // First non-flag argument that is not the --emit target is the input.
    let mut filename = None;
    let mut skip_next = false;
    for arg in args.iter().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--emit" {
            skip_next = true;
            continue;
        }
        if !arg.starts_with('-') {
            filename = Some(arg.clone());
            break;
        }
    }

    match filename {
        Some(filename) => run_file(&filename, show_bytecode, use_trace, emit.as_deref()),
        None => print_usage(),
    }
}

fn print_usage() {
    println!("RILL - a small dynamically-typed language");
    println!();
    println!("Usage:");
    println!("  rill <file.rl>            Compile and run a program");
    println!("  rill <file.rlc>           Run a compiled image");
    println!("  rill --bc <file.rl>       Show the bytecode listing before running");
    println!("  rill --trace <file.rl>    Run with the hot-loop tracing backend");
    println!("  rill --emit <out.rlc> <file.rl>");
    println!("                            Also write the compiled image to <out.rlc>");
}

fn run_file(filename: &str, show_bytecode: bool, use_trace: bool, emit: Option<&str>) {
    let code = match load(filename) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("{}", message);
            process::exit(1);
        }
    };

    if show_bytecode {
        print!("{}", disassemble(&code));
    }

    if let Some(out) = emit {
        let image = match code.to_image() {
            Ok(image) => image,
            Err(e) => {
                eprintln!("Failed to serialize '{}': {}", filename, e);
                process::exit(1);
            }
        };
        if let Err(e) = fs::write(out, image) {
            eprintln!("Failed to write '{}': {}", out, e);
            process::exit(1);
        }
    }

    if let Err(e) = execute(&Arc::new(code), use_trace) {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn load(filename: &str) -> Result<Code, String> {
    let extension = Path::new(filename).extension().and_then(|e| e.to_str());
    match extension {
        Some("rl") => {
            let source = fs::read_to_string(filename)
                .map_err(|e| format!("Failed to read '{}': {}", filename, e))?;
            compile(&source).map_err(|e| format!("Compile error: {}", e))
        }
        Some("rlc") => {
            let image = fs::read(filename)
                .map_err(|e| format!("Failed to read '{}': {}", filename, e))?;
            Code::from_image(&image)
                .map_err(|e| format!("Failed to load compiled image '{}': {}", filename, e))
        }
        _ => Err(format!(
            "Error: expected a .rl or .rlc file, got {}",
            filename
        )),
    }
}
