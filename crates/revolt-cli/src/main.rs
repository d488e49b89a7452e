use std::{env, fs, process::ExitCode, time::Instant};

use revolt::{Bounded, EvalLimits, Interpreter, NoopTracer, StdPrint, render};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let file_path = if args.len() > 1 { &args[1] } else { "example.rev" };
    let source = match read_file(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut interp: Interpreter<Bounded, NoopTracer, StdPrint> = Interpreter::new(Bounded::new(EvalLimits::default()), NoopTracer, StdPrint);

    let start = Instant::now();
    match interp.run(&source) {
        Ok(value) => {
            let elapsed = start.elapsed();
            let rendered = render(&interp, value);
            eprintln!("success after: {elapsed:?}");
            println!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let elapsed = start.elapsed();
            eprintln!("error after: {elapsed:?}\n{err}");
            ExitCode::FAILURE
        }
    }
}

fn read_file(file_path: &str) -> Result<String, String> {
    eprintln!("reading file: {file_path}");
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => return Err(format!("error reading {file_path}: {err}")),
    }
    fs::read_to_string(file_path).map_err(|err| format!("error reading file: {err}"))
}
