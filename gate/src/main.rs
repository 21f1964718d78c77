//! Stop gate for the Ralph work loop.
//!
//! Invoked as a stop hook: reads hook metadata on stdin, checks
//! `ralph/tasks.json` against `.ralph-active`, and prints one JSON decision.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use ralph_gate::exit_codes;
use ralph_gate::gate::{run_gate, validate_only};
use ralph_gate::io::git::GitWorktreeProbe;
use ralph_gate::io::hook::{read_hook_input, write_decision};
use ralph_gate::logging;

#[derive(Parser)]
#[command(
    name = "ralph-gate",
    version,
    about = "Decide whether the Ralph work loop may stop"
)]
struct Cli {
    /// Project root containing `ralph/` and `.ralph-active`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stop hook: read hook JSON on stdin, print `{"decision": ...}` on stdout.
    Stop,
    /// Check `ralph/tasks.json` schema and review invariants.
    Validate,
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
        Command::Stop => cmd_stop(&cli.root),
        Command::Validate => cmd_validate(&cli.root),
    }
}

fn cmd_stop(root: &Path) -> Result<i32> {
    let input = read_hook_input(io::stdin().lock());
    debug!(
        session_id = ?input.session_id,
        transcript_path = ?input.transcript_path,
        hook_event = ?input.hook_event_name,
        stop_hook_active = ?input.stop_hook_active,
        "stop hook invoked"
    );
    let decision = run_gate(root, &GitWorktreeProbe);
    write_decision(io::stdout().lock(), &decision)?;
    Ok(exit_codes::OK)
}

fn cmd_validate(root: &Path) -> Result<i32> {
    match validate_only(root) {
        Ok(tasks) => {
            println!("ok: {} stories", tasks.user_stories.len());
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("{:#}", err);
            Ok(exit_codes::INVALID)
        }
    }
}
