//! Command-line front end for the harness.
//!
//! `harness run` writes the instructions, launches the tool, and prints the
//! text between its first two prompts (or the failure details).

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use harness::io::config::{DEFAULT_CONFIG_PATH, HarnessConfig, load_config, write_config};
use harness::{DriverSettings, ErrorCode, InvocationRequest, InvocationResult, ProcessDriver};
use harness::{exit_codes, logging};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "harness",
    version,
    about = "Drive an interactive CLI tool and scrape its response"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write instructions.md, launch the tool, and print its response.
    Run(RunArgs),
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Working directory for the tool; receives instructions.md.
    #[arg(long, default_value = ".")]
    cwd: PathBuf,
    /// Instructions text.
    #[arg(long, conflicts_with = "instructions_file")]
    instructions: Option<String>,
    /// Read instructions from this file.
    #[arg(long)]
    instructions_file: Option<PathBuf>,
    /// Prompt passed to the tool instead of the configured default.
    #[arg(long)]
    prompt: Option<String>,
    /// Kill the tool if no response arrives within this many milliseconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: Option<u64>,
    /// Echo raw tool output to the terminal.
    #[arg(long)]
    debug: bool,
    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Run this shell command instead of the tool.
    #[arg(long, hide = true)]
    test_command: Option<String>,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Init { force, config } => cmd_init(&config, force),
    }
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    let cfg = load_config(&args.config).context("load config")?;
    let json = args.json;
    let request = build_request(args, &cfg)?;
    debug!(workdir = %request.workdir.display(), "invoking tool");

    let driver = ProcessDriver::new(DriverSettings::from(&cfg));
    let result = driver.run(&request).context("run tool")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("serialize result")?
        );
    } else {
        print_human(&result);
    }
    Ok(exit_code_for(&result))
}

fn cmd_init(path: &std::path::Path, force: bool) -> Result<i32> {
    if !force && path.exists() {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &HarnessConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

/// Merge command-line flags over config values.
fn build_request(args: RunArgs, cfg: &HarnessConfig) -> Result<InvocationRequest> {
    let instructions = match (args.instructions, args.instructions_file) {
        (Some(text), _) => text,
        (None, Some(path)) => {
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?
        }
        (None, None) => bail!("one of --instructions or --instructions-file is required"),
    };

    let mut request =
        InvocationRequest::new(instructions, args.cwd).with_debug(args.debug || cfg.debug);
    if let Some(prompt) = args.prompt {
        request = request.with_prompt(prompt);
    }
    if let Some(millis) = args.timeout_ms.or(cfg.timeout_ms) {
        request = request.with_timeout(Duration::from_millis(millis));
    }
    if let Some(command) = args.test_command {
        request = request.with_test_command(command);
    }
    Ok(request)
}

fn print_human(result: &InvocationResult) {
    match result.error() {
        None => {
            println!("Response:");
            println!("{}", result.output());
        }
        Some(error) => {
            eprintln!("Error running tool:");
            eprintln!("Message: {}", error.message);
            eprintln!("Code: {}", error.code);
            if let Some(details) = &error.details {
                eprintln!("Details: {}", details);
            }
            if !result.output().is_empty() {
                println!("Partial output before error:");
                println!("{}", result.output());
            }
        }
    }
}

fn exit_code_for(result: &InvocationResult) -> i32 {
    if result.is_success() {
        exit_codes::OK
    } else if result.has_code(ErrorCode::TIMEOUT) {
        exit_codes::TIMEOUT
    } else {
        exit_codes::FAILED
    }
}
