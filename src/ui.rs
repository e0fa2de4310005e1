use colored::Colorize;
use stackkit::change_set::summarize;
use stackkit::types::{Change, ChangeAction};
use stackkit::{Diagnostics, Level};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print one change set entry, coloured by action
pub fn change(change: &Change) {
    let line = summarize(change);
    let marker = match change.resource_change.action {
        ChangeAction::Add => "+".green(),
        ChangeAction::Remove => "-".red(),
        _ if change.is_destructive() => "!".red(),
        _ => "~".yellow(),
    };
    let line = if change.is_destructive() {
        line.red().to_string()
    } else {
        line
    };
    println!("  {marker} {line}");
}

/// Colour a stack status by phase
pub fn status(status: &str) -> String {
    if status.contains("ROLLBACK") || status.ends_with("_FAILED") {
        status.red().to_string()
    } else if status.ends_with("_COMPLETE") {
        status.green().to_string()
    } else {
        status.yellow().to_string()
    }
}

/// Prints stack progress in the terminal and forwards it to `log`.
pub struct UiDiagnostics {
    quiet: bool,
}

impl UiDiagnostics {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Diagnostics for UiDiagnostics {
    fn emit(&self, level: Level, message: &str) {
        match level {
            Level::Debug => log::debug!("{message}"),
            Level::Info => {
                log::debug!("{message}");
                if !self.quiet {
                    info(message);
                }
            }
            Level::Warn => {
                log::debug!("{message}");
                warn(message);
            }
            Level::Fatal => {
                log::debug!("{message}");
                error(message);
            }
        }
    }
}
