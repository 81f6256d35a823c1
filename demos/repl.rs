use framescheme::ast::Value;
use framescheme::{Error, Interpreter, InterpreterConfig, ParseError, ParseErrorKind};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::process;
use std::time::Duration;

struct Options {
    config: InterpreterConfig,
    files: Vec<String>,
}

fn parse_options() -> Result<Options, String> {
    let mut args = pico_args::Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        println!("Usage: repl [options] [files...]");
        println!("Options:");
        println!("  -h, --help: Print this help message");
        println!("  --time-slice-ms <ms>: Run time per batch before yielding (default: 100)");
        println!("  --no-prelude: Start without the library procedures");
        process::exit(0);
    }

    let mut config = InterpreterConfig::default();
    match args.opt_value_from_str::<_, u64>("--time-slice-ms") {
        Ok(Some(ms)) => config.time_slice = Duration::from_millis(ms),
        Ok(None) => {}
        Err(e) => return Err(e.to_string()),
    }
    config.load_prelude = !args.contains("--no-prelude");

    let files = args
        .finish()
        .into_iter()
        .map(|file| file.to_string_lossy().into_owned())
        .collect();
    Ok(Options { config, files })
}

fn main() {
    env_logger::init();

    let options = match parse_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    let interpreter = match Interpreter::with_config(options.config) {
        Ok(interpreter) => interpreter,
        Err(e) => {
            eprintln!("Could not start interpreter: {e}");
            process::exit(1);
        }
    };

    for file in &options.files {
        let loaded = std::fs::read_to_string(file)
            .map_err(|e| e.to_string())
            .and_then(|source| interpreter.run_source(&source).map_err(|e| e.to_string()));
        match loaded {
            Ok(value) => log::info!("loaded {file}: {value}"),
            Err(e) => {
                eprintln!("{file}: {e}");
                process::exit(1);
            }
        }
    }

    run_repl(&interpreter);
}

fn is_incomplete(result: &Result<Value, Error>) -> bool {
    matches!(
        result,
        Err(Error::ParseError(ParseError {
            kind: ParseErrorKind::Incomplete,
            ..
        }))
    )
}

fn run_repl(interpreter: &Interpreter) {
    println!("framescheme: a Scheme with first-class continuations");
    println!(
        "Time slice: {} ms",
        interpreter.config().time_slice.as_millis()
    );
    println!("Enter S-expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Could not initialize REPL: {e}");
            process::exit(1);
        }
    };
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "scheme> " } else { "   ...> " };
        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    match line.trim() {
                        "" => continue,
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(interpreter);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                pending.push_str(&line);
                pending.push('\n');

                // Keep reading until the expression is closed
                let result = interpreter.run_source(&pending);
                if is_incomplete(&result) {
                    continue;
                }
                let _ = rl.add_history_entry(pending.trim_end());
                pending.clear();

                match result {
                    Ok(Value::Unspecified) => {}
                    Ok(value) => println!("{value}"),
                    Err(e) => println!("Error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                pending.clear();
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :help  Show this message");
    println!("  :env   List the global bindings");
    println!("  :quit  Exit the REPL");
    println!();
    println!("Examples:");
    println!("  (define (square x) (* x x))");
    println!("  (map square (range 1 5))");
    println!("  (+ 1 (call/cc (lambda (k) (k 41))))");
    println!("  (letrec ((loop (lambda (n) (if (= n 0) 'done (loop (- n 1)))))) (loop 1000000))");
}

fn print_environment(interpreter: &Interpreter) {
    let names = interpreter.global_environment().binding_names();
    println!("{} bindings:", names.len());
    for line in names.chunks(8) {
        println!("  {}", line.join(" "));
    }
}
