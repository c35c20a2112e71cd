use std::io::Read;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sandbox_agent::config::Config;
use sandbox_agent::sandbox::{Executor, ExecutionOutcome, ShellRunner, Verdict};
use sandbox_agent::skills::{SkillContext, SkillRegistry};

const DEFAULT_CONFIG_PATH: &str = "config/sandbox.toml";

fn print_help() {
    println!(
        "\
sandbox-agent v{}

Validate and run model-written Python in a restricted child process.

USAGE:
    sandbox-agent [OPTIONS] <COMMAND>

COMMANDS:
    check <FILE|->          Validate only; exit 0 if approved, 1 if rejected
    run <FILE|->            Validate and execute, print the result
    shell <COMMAND>         Run a shell command with timeout and output cap
    tools                   Print the tool definitions as JSON
    call <TOOL> <JSON>      Dispatch one tool call and print its result

OPTIONS:
    -c, --config <PATH>     TOML configuration file [default: {DEFAULT_CONFIG_PATH}]
    -h, --help              Print this help message and exit
    -V, --version           Print version and exit

ENVIRONMENT VARIABLES:
    Variables are referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG              Log level filter for tracing
                          (e.g. debug, sandbox_agent=debug,warn)

EXAMPLES:
    sandbox-agent check script.py
    echo 'print(1 + 1)' | sandbox-agent run -
    sandbox-agent call list_files '{{\"pattern\": \"*.py\"}}'
    RUST_LOG=debug sandbox-agent run script.py",
        env!("CARGO_PKG_VERSION"),
    );
}

enum Command {
    Check(String),
    Run(String),
    Shell(String),
    Tools,
    Call { tool: String, params: String },
}

struct Args {
    config_path: Option<String>,
    command: Command,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("{arg} requires a path argument"))?;
                config_path = Some(path);
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let name = positional
        .next()
        .ok_or_else(|| anyhow!("No command given (try --help)"))?;
    let mut operand = |what: &str| {
        positional
            .next()
            .ok_or_else(|| anyhow!("'{name}' requires {what}"))
    };

    let command = match name.as_str() {
        "check" => Command::Check(operand("a file path or '-'")?),
        "run" => Command::Run(operand("a file path or '-'")?),
        "shell" => Command::Shell(operand("a command string")?),
        "tools" => Command::Tools,
        "call" => Command::Call {
            tool: operand("a tool name")?,
            params: operand("a JSON object of parameters")?,
        },
        other => bail!("Unknown command: {other} (try --help)"),
    };

    Ok(Args {
        config_path,
        command,
    })
}

/// Reads Python source from a file, or from stdin when given "-".
fn read_source(path: &str) -> Result<String> {
    if path == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("reading source from stdin")?;
        Ok(source)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading source file {path}"))
    }
}

fn exit_code_for(outcome: &ExecutionOutcome) -> i32 {
    match outcome {
        ExecutionOutcome::Completed { exit_code, .. } => *exit_code,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --help / --version before anything else
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("sandbox-agent v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
    }

    // Logs go to stderr so stdout carries only results
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sandbox_agent=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let config = match &args.config_path {
        Some(path) => {
            info!("Loading configuration from {path}");
            Config::load(path)?
        }
        None => {
            debug!("Loading configuration from {DEFAULT_CONFIG_PATH} if present");
            Config::load_or_default(DEFAULT_CONFIG_PATH)?
        }
    };

    let executor = Arc::new(Executor::from_config(&config.sandbox)?);
    let shell = Arc::new(ShellRunner::new(&config.shell));

    match args.command {
        Command::Check(path) => {
            let source = read_source(&path)?;
            let verdict = executor.validator().check(&source);
            println!("{verdict}");
            if let Verdict::Rejected(_) = verdict {
                std::process::exit(1);
            }
        }
        Command::Run(path) => {
            let source = read_source(&path)?;
            let outcome = executor.run(&source).await;
            match &outcome {
                ExecutionOutcome::Completed { output, .. } => print!("{output}"),
                other => eprintln!("{other}"),
            }
            std::process::exit(exit_code_for(&outcome));
        }
        Command::Shell(command) => {
            let outcome = shell.run(&command).await;
            match &outcome {
                ExecutionOutcome::Completed { output, .. } => print!("{output}"),
                other => eprintln!("{other}"),
            }
            std::process::exit(exit_code_for(&outcome));
        }
        Command::Tools => {
            let registry = SkillRegistry::with_builtins(executor, shell);
            println!(
                "{}",
                serde_json::to_string_pretty(&registry.tool_definitions())?
            );
        }
        Command::Call { tool, params } => {
            let params: Value = serde_json::from_str(&params)
                .with_context(|| format!("parsing parameters for {tool}"))?;
            let registry = SkillRegistry::with_builtins(executor, shell);
            info!("Skills: {} registered", registry.len());

            let context = SkillContext::new(
                std::env::current_dir().context("resolving working directory")?,
            );
            println!("{}", registry.dispatch(&tool, params, &context).await);
        }
    }

    Ok(())
}
