use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tinylisp::Interpreter;

#[derive(Parser)]
#[command(author, version, about = "Runs a tinylisp program and prints each result")]
struct Args {
    /// Program to run; reads stdin when omitted
    file: Option<PathBuf>,
}

// Returns the display name and contents of the program.
fn read_source(path: Option<&PathBuf>) -> io::Result<(String, String)> {
    match path {
        Some(path) => Ok((path.display().to_string(), std::fs::read_to_string(path)?)),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(("<stdin>".to_string(), source))
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    tinylisp::logging::init();

    let (name, source) = match read_source(args.file.as_ref()) {
        Ok(input) => input,
        Err(e) => {
            let name = args
                .file
                .as_ref()
                .map_or_else(|| "<stdin>".to_string(), |path| path.display().to_string());
            eprintln!("Error: cannot read {}: {}", name, e);
            return ExitCode::from(2);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut interpreter = Interpreter::new();
    match interpreter.run(&source, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Keep the results printed so far ahead of the report.
            let _ = out.flush();
            e.print_report(&name, &source);
            ExitCode::from(1)
        }
    }
}
