use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;

use super::{Session, report};
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, name: Option<&str>) -> Result<()> {
    let session = Session::open(ctx)?;
    let names: Vec<String> = match name {
        Some(name) => vec![name.to_string()],
        None => session
            .config
            .stack_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };

    if names.is_empty() {
        ui::dim("No stacks configured");
        return Ok(());
    }

    for name in &names {
        show_stack(ctx, &session, name)?;
    }

    println!();
    Ok(())
}

fn show_stack(ctx: &Context, session: &Session, name: &str) -> Result<()> {
    let mut stack = session.stack(ctx, name, None)?;
    ui::header(name);

    let Some(status) = stack.status().map_err(report)? else {
        ui::kv("Status", &"not created".dimmed().to_string());
        return Ok(());
    };
    ui::kv("Status", &ui::status(status.as_str()));

    if let Some(reason) = stack.status_reason().map_err(report)? {
        ui::kv("Reason", &reason);
    }
    if let Some(created) = stack.creation_time().map_err(report)? {
        ui::kv("Created", &format_time(created));
    }
    if let Some(updated) = stack.last_updated_time().map_err(report)? {
        ui::kv("Updated", &format_time(updated));
    }

    match stack.parameter_changes() {
        Ok(Some(changed)) if !changed.is_empty() => {
            ui::kv("Parameters", &format!("changed: {}", changed.join(", ")).yellow().to_string());
        }
        Ok(_) => ui::kv("Parameters", &"in sync".green().to_string()),
        Err(e) => ui::kv("Parameters", &format!("could not resolve ({e})").red().to_string()),
    }

    if let Some(diff) = stack.capability_diff().map_err(report)? {
        if diff.is_empty() {
            ui::kv("Capabilities", &"in sync".green().to_string());
        } else {
            let mut drift = Vec::new();
            drift.extend(diff.added.iter().map(|c| format!("+{c}")));
            drift.extend(diff.removed.iter().map(|c| format!("-{c}")));
            ui::kv("Capabilities", &drift.join(" ").yellow().to_string());
        }
    }
    Ok(())
}

fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
