mod cli;
mod commands;
mod config;
mod ui;

use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use stackkit::CancelToken;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub region: Option<String>,
    /// Cancelled on Ctrl-C; stops the wait loop before its next read
    pub cancel: CancelToken,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        // A second Ctrl-C exits immediately
        if handler_token.is_cancelled() {
            std::process::exit(130);
        }
        ui::warn("Interrupted, stopping after the current check (the remote operation keeps running)");
        handler_token.cancel();
    })
    .context("Could not install Ctrl-C handler")?;

    let ctx = Context {
        quiet: cli.quiet,
        config: cli.config,
        region: cli.region,
        cancel,
    };

    match cli.command {
        Command::Create(args) => commands::create::run(&ctx, &args),
        Command::Update(args) => commands::update::run(&ctx, &args),
        Command::Diff { stack } => commands::diff::run(&ctx, &stack),
        Command::Status { stack } => commands::status::run(&ctx, stack.as_deref()),
        Command::Outputs { stack, json } => commands::outputs::run(&ctx, &stack, json),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "stacker", &mut io::stdout());
            Ok(())
        }
    }
}
