// Rebound: REBOL-family interpreter with a step inspector

use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use rebound::interpreter::config::Config;
use rebound::interpreter::constants::INTERPRETER_THREAD_STACK;
use rebound::interpreter::engine::Interpreter;
use rebound::interpreter::errors::Failure;
use rebound::snapshot::SnapshotManager;
use rebound::ui::App;

const USAGE: &str = "\
Usage: rebound [options] [FILE]

With no FILE and no -e, starts an interactive session.

Options:
  -e EXPR              evaluate EXPR and print its molded result
  --inspect            record every step and browse the run in the inspector
  --stack-limit N      maximum frame depth
  --gc-ballast N       bytes allocated between collections
  -h, --help           show this message

Environment: REBOUND_STACK_LIMIT, REBOUND_GC_BALLAST, REBOUND_SNAPSHOT_LIMIT,
RUST_LOG";

enum Input {
    Repl,
    Expression(String),
    File(String),
}

struct Options {
    input: Input,
    inspect: bool,
    config: Config,
}

fn parse_number(flag: &str, value: Option<String>) -> Result<usize, String> {
    let value = value.ok_or_else(|| format!("{} needs a value", flag))?;
    value
        .parse()
        .map_err(|_| format!("{} expects a number, got {:?}", flag, value))
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Options>, String> {
    let mut config = Config::from_env();
    let mut input = Input::Repl;
    let mut inspect = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--inspect" => inspect = true,
            "--stack-limit" => config.stack_limit = parse_number(&arg, args.next())?,
            "--gc-ballast" => config.gc_ballast = parse_number(&arg, args.next())?,
            "-e" => input = Input::Expression(args.next().ok_or("-e needs an expression")?),
            flag if flag.starts_with('-') => return Err(format!("unknown option {}", flag)),
            _ => input = Input::File(arg),
        }
    }
    if inspect {
        config.snapshots = true;
    }
    Ok(Some(Options {
        input,
        inspect,
        config,
    }))
}

fn exit_status(failure: &Failure) -> u8 {
    match failure {
        Failure::Quit(status) => (*status).clamp(0, 255) as u8,
        _ => 1,
    }
}

/// Read-eval-print loop; `quit` leaves with its status
fn repl(interp: &mut Interpreter) -> u8 {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!(">> ");
        let _ = stdout.flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return 0,
            Ok(_) => {}
            Err(err) => {
                eprintln!("{}", err);
                return 1;
            }
        }
        if line.trim().is_empty() {
            continue;
        }
        let result = interp.eval_str(&line);
        print!("{}", interp.take_output());
        match result {
            Ok(value) if value.is_unset() => {}
            Ok(value) => println!("== {}", interp.mold(&value)),
            Err(Failure::Quit(status)) => return status.clamp(0, 255) as u8,
            Err(failure) => println!("{}", failure),
        }
    }
}

/// Outcome of a run on the interpreter thread
struct Run {
    status: u8,
    history: Option<SnapshotManager>,
    outcome: Option<String>,
}

fn run(input: Input, config: Config) -> Run {
    let mut interp = Interpreter::with_config(config);
    let (source, echo) = match input {
        Input::Repl => {
            return Run {
                status: repl(&mut interp),
                history: None,
                outcome: None,
            }
        }
        Input::Expression(expr) => (expr, true),
        Input::File(path) => match fs::read_to_string(&path) {
            Ok(source) => (source, false),
            Err(err) => {
                eprintln!("cannot read {}: {}", path, err);
                return Run {
                    status: 1,
                    history: None,
                    outcome: None,
                };
            }
        },
    };

    let result = interp.eval_str(&source);
    let recording = interp.config().snapshots;
    if !recording {
        print!("{}", interp.take_output());
    }
    let (status, outcome) = match result {
        Ok(value) => {
            if echo && !recording && !value.is_unset() {
                println!("{}", interp.mold(&value));
            }
            (0, None)
        }
        Err(failure) => {
            if !recording {
                eprintln!("{}", failure);
            }
            (exit_status(&failure), Some(failure.to_string().replace('\n', " ")))
        }
    };
    Run {
        status,
        history: interp.take_snapshots(),
        outcome,
    }
}

fn inspect(history: SnapshotManager, source: String, outcome: Option<String>) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let mut app = App::new(history, source, outcome);
    let res = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

fn main() -> ExitCode {
    env_logger::init();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Some(options)) => options,
        Ok(None) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("Error: {}\n\n{}", message, USAGE);
            return ExitCode::from(2);
        }
    };
    if options.inspect && matches!(options.input, Input::Repl) {
        eprintln!("Error: --inspect needs a FILE or -e EXPR");
        return ExitCode::from(2);
    }

    let source = match &options.input {
        Input::Expression(expr) => expr.clone(),
        Input::File(path) => fs::read_to_string(path).unwrap_or_default(),
        Input::Repl => String::new(),
    };

    // Deep recursion in scripts runs on the host stack
    let Options { input, inspect: wants_inspector, config } = options;
    let worker = std::thread::Builder::new()
        .name("interpreter".into())
        .stack_size(INTERPRETER_THREAD_STACK)
        .spawn(move || run(input, config));
    let outcome = match worker.map(|handle| handle.join()) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => {
            eprintln!("Error: interpreter thread panicked");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("Error: cannot start interpreter thread: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if wants_inspector {
        let Some(history) = outcome.history else {
            return ExitCode::from(outcome.status);
        };
        log::info!("recorded {} steps", history.len());
        if let Err(err) = inspect(history, source, outcome.outcome) {
            eprintln!("Error: {}", err);
            return ExitCode::FAILURE;
        }
    }
    ExitCode::from(outcome.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Options>, String> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let options = parse(&["--inspect", "--stack-limit", "64", "script.reb"]).unwrap().unwrap();
        assert!(options.inspect && options.config.snapshots);
        assert_eq!(options.config.stack_limit, 64);
        assert!(matches!(options.input, Input::File(ref p) if p == "script.reb"));

        assert!(matches!(parse(&["-e", "1 + 2"]).unwrap().unwrap().input, Input::Expression(_)));
        assert!(parse(&["--help"]).unwrap().is_none());
        assert!(parse(&["--gc-ballast", "lots"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(&Failure::Quit(3)), 3);
        assert_eq!(exit_status(&Failure::Halted), 1);
    }
}
