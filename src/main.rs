//! zsheet - command driver for the numeric spreadsheet core

mod command;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use zsheet_core::{Config, Session};

use command::{Command, execute};

fn print_usage() {
    eprintln!("Usage: zsheet [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [FILE]                    Grid to load (.zsff or CSV)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --command <CMD>       Run a command and exit (can be repeated)");
    eprintln!("  --config <FILE>           Read configuration from FILE");
    eprintln!("  --no-recovery             Disable background auto-recovery");
    eprintln!("  -h, --help                Print help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG                  Log filter (default: info)");
    eprintln!("  ZSHEET_BACKEND            auto | portable | parallel");
}

struct Args {
    file_path: Option<PathBuf>,
    commands: Vec<String>,
    config_path: Option<PathBuf>,
    no_recovery: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args {
        file_path: None,
        commands: Vec::new(),
        config_path: None,
        no_recovery: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-c" | "--command" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --command requires a command");
                    std::process::exit(2);
                }
                parsed.commands.push(args[i].clone());
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(2);
                }
                parsed.config_path = Some(PathBuf::from(&args[i]));
            }
            "--no-recovery" => parsed.no_recovery = true,
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                print_usage();
                std::process::exit(2);
            }
            _ => {
                if parsed.file_path.is_none() {
                    parsed.file_path = Some(PathBuf::from(&args[i]));
                } else {
                    eprintln!("Error: Unexpected argument: {}", args[i]);
                    print_usage();
                    std::process::exit(2);
                }
            }
        }
        i += 1;
    }
    parsed
}

/// Run one line; returns (ok, quit).
fn run_line(session: &mut Session, line: &str, out: &mut impl Write) -> io::Result<(bool, bool)> {
    match line.parse::<Command>() {
        Ok(command) => {
            let outcome = execute(session, command);
            if !outcome.output.is_empty() {
                writeln!(out, "{}", outcome.output)?;
            }
            Ok((outcome.ok, outcome.quit))
        }
        Err(e) => {
            writeln!(out, "#ERR {}", e)?;
            Ok((false, false))
        }
    }
}

fn run(args: Args) -> anyhow::Result<bool> {
    let mut config = Config::load(args.config_path.as_deref()).context("loading configuration")?;
    if args.no_recovery || !args.commands.is_empty() {
        config.recovery_enabled = false;
    }

    let mut session = Session::with_config(config);
    tracing::info!(session = session.session_id(), backend = session.backend_name(), "zsheet starting");

    if let Some(path) = &args.file_path
        && !session.on_load_requested(path)
    {
        anyhow::bail!("{}", session.status());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if !args.commands.is_empty() {
        let mut all_ok = true;
        for line in &args.commands {
            let (ok, quit) = run_line(&mut session, line, &mut out)?;
            all_ok &= ok;
            if quit {
                break;
            }
        }
        return Ok(all_ok);
    }

    session.start_recovery();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (_, quit) = run_line(&mut session, &line, &mut out)?;
        out.flush()?;
        if quit {
            break;
        }
    }
    session.stop_recovery();
    Ok(true)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = parse_args();
    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
