use std::fs;
use std::io::{self, BufRead, Read, Write};

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;

use monkey::backend::{self, Execution};
use monkey::session::{BytecodeView, Evaluation, Session, SessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Tokenize,
    Parse,
    Eval,
    Compile,
    Run,
    Repl,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "tokenize" => Some(Self::Tokenize),
            "parse" => Some(Self::Parse),
            "eval" => Some(Self::Eval),
            "compile" => Some(Self::Compile),
            "run" => Some(Self::Run),
            "repl" => Some(Self::Repl),
            _ => None,
        }
    }
}

struct Options {
    command: Command,
    backend_name: String,
    json: bool,
    input_path: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options> {
    let mut options = Options {
        command: Command::Run,
        backend_name: "evaluator".to_string(),
        json: false,
        input_path: None,
    };
    let mut command_seen = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--backend" | "-b" => {
                options.backend_name = args
                    .next()
                    .ok_or_else(|| anyhow!("Missing backend name after {arg}"))?;
            }
            "--json" => options.json = true,
            other => {
                if !command_seen
                    && options.input_path.is_none()
                    && let Some(command) = Command::from_name(other)
                {
                    options.command = command;
                    command_seen = true;
                    continue;
                }
                if other.starts_with('-') {
                    bail!("Unknown flag '{other}'");
                }
                if options.input_path.is_some() {
                    bail!("Only one input file is supported");
                }
                options.input_path = Some(other.to_string());
            }
        }
    }

    Ok(options)
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(io::stderr),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn read_source(input_path: Option<&str>) -> Result<String> {
    if let Some(path) = input_path {
        fs::read_to_string(path).with_context(|| format!("Reading {path}"))
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        Ok(buffer)
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Serializing output")?;
    println!("{rendered}");
    Ok(())
}

fn print_evaluation(evaluation: &Evaluation) {
    for line in &evaluation.output {
        println!("{line}");
    }
    if let Some(value) = &evaluation.value {
        println!("{}", value.inspect());
    }
}

fn main() -> Result<()> {
    init_tracing();
    let options = parse_args(std::env::args().skip(1))?;

    let source = match options.command {
        Command::Repl => String::new(),
        _ => read_source(options.input_path.as_deref())?,
    };
    let mut session = Session::new();

    match options.command {
        Command::Tokenize => {
            let tokens = session.tokenize(&source);
            if options.json {
                print_json(&tokens)?;
            } else {
                for token in &tokens {
                    println!("{} {:?}", token.kind.name(), token.literal);
                }
            }
        }
        Command::Parse => {
            let parsed = session.parse(&source);
            if options.json {
                print_json(&parsed)?;
            } else {
                print!("{}", parsed.program);
                if !parsed.errors.is_empty() {
                    println!();
                    bail!(SessionError::Syntax(parsed.errors));
                }
                println!();
            }
        }
        Command::Eval => {
            let evaluation = session.evaluate(&source)?;
            if options.json {
                print_json(&evaluation)?;
            } else {
                print_evaluation(&evaluation);
            }
        }
        Command::Compile => {
            let bytecode = session.compile(&source)?;
            let view = BytecodeView::from(&bytecode);
            if options.json {
                print_json(&view)?;
            } else {
                print!("{}", view.disassembly);
                for (index, constant) in view.constants.iter().enumerate() {
                    println!("constant {index}: {} {}", constant.kind, constant.value);
                    if let Some(disassembly) = &constant.disassembly {
                        print!("{disassembly}");
                    }
                }
            }
        }
        Command::Run => {
            let backend = backend::backend_named(&options.backend_name)
                .ok_or_else(|| anyhow!("Unknown backend '{}'", options.backend_name))?;
            let parsed = session.parse(&source);
            if !parsed.errors.is_empty() {
                bail!(SessionError::Syntax(parsed.errors));
            }
            let Execution { value, output } = backend
                .run(&parsed.program)
                .with_context(|| format!("Running with the {} backend", backend.name()))?;
            let evaluation = Evaluation { value, output };
            if options.json {
                print_json(&evaluation)?;
            } else {
                print_evaluation(&evaluation);
            }
        }
        Command::Repl => repl(&options.backend_name)?,
    }

    Ok(())
}

fn repl(backend_name: &str) -> Result<()> {
    let use_vm = match backend_name {
        "evaluator" => false,
        "vm" => true,
        other => bail!("Unknown backend '{other}'"),
    };

    let mut session = Session::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        write!(stdout, ">> ")?;
        stdout.flush()?;
        let Some(line) = lines.next() else {
            writeln!(stdout)?;
            return Ok(());
        };
        let line = line.context("Reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let result = if use_vm {
            session.run(&line)
        } else {
            session.evaluate(&line)
        };
        match result {
            Ok(evaluation) => print_evaluation(&evaluation),
            Err(error) => eprintln!("{error}"),
        }
    }
}
