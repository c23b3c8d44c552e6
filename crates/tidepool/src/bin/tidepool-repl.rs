use std::{
    io::{self, Write},
    process::ExitCode,
};

use tidepool::{ExecutionContext, ExecutionResult, LogSink, ResourceLimits, Status, StdLogSink, classify};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        // File execution mode
        let path = &args[1];
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error reading {path}: {e}");
                return ExitCode::FAILURE;
            }
        };
        let mut context = ExecutionContext::isolated(ResourceLimits::new());
        return match run_snippet(&mut context, &source) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(err) => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        };
    }

    // Interactive mode
    let mut context = ExecutionContext::isolated(ResourceLimits::new());
    let mut source = String::new();
    let mut indent = String::new();

    loop {
        let prompt = if source.is_empty() { "js> " } else { "... " };
        let Some(line) = read_line(prompt, &indent) else {
            println!();
            break;
        };

        if source.is_empty() && line.trim().is_empty() {
            continue;
        }

        if !source.is_empty() {
            source.push('\n');
        }
        source.push_str(&line);

        let classification = classify(&source);
        if classification.status == Status::Incomplete {
            indent = classification.indent;
            continue;
        }
        indent.clear();

        if let Err(err) = run_snippet(&mut context, &source) {
            eprintln!("{err}");
        }
        source.clear();
    }

    ExitCode::SUCCESS
}

/// Executes one snippet and prints its output, value, and error.
///
/// Returns whether the snippet succeeded.
fn run_snippet(context: &mut ExecutionContext, source: &str) -> Result<bool, tidepool::KernelError> {
    let result = context.execute(source)?;
    print_result(&result);
    Ok(result.success)
}

/// Prints captured logs, rich payloads, the value preview, and any error.
fn print_result(result: &ExecutionResult) {
    let mut sink = StdLogSink;
    for entry in result.output.iter().chain(&result.elevated) {
        sink.write(entry.clone());
    }
    for rich in &result.rich {
        println!("[{}] {}", rich.mime, rich.data);
    }
    if let Some(value) = &result.value {
        println!("{}", value.preview);
    }
    if let Some(error) = &result.error {
        // Parse failures carry a position instead of a stack.
        if error.is_syntax() {
            let at = match (error.line, error.column) {
                (Some(line), Some(column)) => format!(" (line {line}, column {column})"),
                (Some(line), None) => format!(" (line {line})"),
                _ => String::new(),
            };
            eprintln!("Uncaught {}: {}{at}", error.kind, error.message);
        } else {
            eprintln!("Uncaught {}: {}", error.kind, error.message);
            for frame in &error.traceback {
                eprintln!("    {frame}");
            }
        }
    }
}

/// Reads one line from stdin after printing a prompt and suggested indent.
///
/// Returns `None` on EOF (Ctrl+D). The indent is printed, not injected, so
/// the returned line is exactly what the user typed.
fn read_line(prompt: &str, indent: &str) -> Option<String> {
    print!("{prompt}{indent}");
    if io::stdout().flush().is_err() {
        return None;
    }
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input).ok()?;
    if read == 0 {
        return None;
    }
    Some(input.trim_end_matches(['\r', '\n']).to_owned())
}
