use anyhow::{Context as _, Result};
use colored::Colorize;
use stackkit::change_set::destructive_changes;
use stackkit::error::Operation;
use stackkit::{Error, UpdateOptions};

use super::{Session, diff, report};
use crate::Context;
use crate::cli::UpdateArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &UpdateArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let mut stack = session.stack(ctx, &args.stack, args.wait.timeout)?;

    // Before any change set exists
    let missing = stack.missing().map_err(report)?;
    if !missing.is_empty() {
        return Err(report(Error::MissingParameters(missing)));
    }

    let changes = match stack
        .describe_change_set()
        .map_err(|e| e.classify(Operation::Update))
    {
        Ok(changes) => changes,
        Err(e) if e.is_up_to_date() => {
            ui::success("Stack is up to date");
            return Ok(());
        }
        Err(e) => return Err(report(e)),
    };
    diff::show(&args.stack, &changes);

    let mut allow_destructive = args.allow_destructive;
    if !allow_destructive && !destructive_changes(&changes).is_empty() {
        if !args.yes && !confirm_destructive()? {
            println!();
            println!("  {} Aborted", "✗".red());
            return Ok(());
        }
        allow_destructive = true;
    }

    let options = UpdateOptions {
        blocking: !args.wait.no_wait,
        allow_destructive,
    };
    match stack.update(options) {
        Ok(()) if args.wait.no_wait => ui::info(&format!("Update submitted for {}", args.stack)),
        Ok(()) => ui::success(&format!("Stack {} updated", args.stack)),
        Err(e) if e.is_up_to_date() => ui::success("Stack is up to date"),
        Err(e) => return Err(report(e)),
    }
    Ok(())
}

/// Confirm with user
fn confirm_destructive() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Execute changes that remove or replace resources?")
        .default(false)
        .interact()
        .context("Confirmation needs a terminal, pass --yes or --allow-destructive")?;

    Ok(confirmed)
}
