use std::{env, fs, process::ExitCode, time::Instant};

use tidepool::{ExecutionContext, ExecutorRegistry, LogSink, ResourceLimits, StdLogSink};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let (code, language) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!("usage: tidepool <file.js> | tidepool --eval <code> [--language <name>]");
            return ExitCode::FAILURE;
        }
    };

    let registry = ExecutorRegistry::new();
    let mut context = ExecutionContext::isolated(ResourceLimits::new());

    let start = Instant::now();
    let result = match registry.execute(&mut context, &code, &language) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let elapsed = start.elapsed();

    let mut sink = StdLogSink;
    for entry in result.output.iter().chain(&result.elevated) {
        sink.write(entry.clone());
    }
    for rich in &result.rich {
        println!("[{}] {}", rich.mime, rich.data);
    }

    if let Some(error) = &result.error {
        eprintln!("error after {elapsed:?}:\n{error}");
        return ExitCode::FAILURE;
    }
    if let Some(value) = &result.value {
        println!("{}", value.preview);
    }
    eprintln!("success after: {elapsed:?}");
    ExitCode::SUCCESS
}

/// Parses the argument list into `(code, language)`.
fn parse_args(args: &[String]) -> Result<(String, String), String> {
    let mut code = None;
    let mut file = None;
    let mut language = "javascript".to_owned();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--eval" | "-e" => {
                let snippet = args.get(i + 1).ok_or("--eval requires a code argument")?;
                code = Some(snippet.clone());
                i += 2;
            }
            "--language" | "-l" => {
                let name = args.get(i + 1).ok_or("--language requires a name argument")?;
                language = name.clone();
                i += 2;
            }
            flag if flag.starts_with('-') => {
                return Err(format!("unknown flag: {flag}"));
            }
            path => {
                file = Some(path.to_owned());
                i += 1;
            }
        }
    }

    match (code, file) {
        (Some(code), None) => Ok((code, language)),
        (None, Some(path)) => Ok((read_file(&path)?, language)),
        (Some(_), Some(_)) => Err("pass a file or --eval, not both".to_owned()),
        (None, None) => Err("no input given".to_owned()),
    }
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("cannot read {file_path}: {err}"));
        }
    }
    fs::read_to_string(file_path).map_err(|err| format!("cannot read {file_path}: {err}"))
}
