use anyhow::Result;
use stackkit::error::Operation;
use stackkit::types::Change;

use super::{Session, report};
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, name: &str) -> Result<()> {
    let session = Session::open(ctx)?;
    let mut stack = session.stack(ctx, name, None)?;

    match stack
        .describe_change_set()
        .map_err(|e| e.classify(Operation::Update))
    {
        Ok(changes) => {
            show(name, &changes);
            Ok(())
        }
        Err(e) if e.is_up_to_date() => {
            ui::success("Stack is up to date");
            Ok(())
        }
        Err(e) => Err(report(e)),
    }
}

/// Print a change set summary
pub fn show(name: &str, changes: &[Change]) {
    ui::header(&format!("Change set: {name}"));
    if changes.is_empty() {
        ui::dim("No resource changes");
        return;
    }

    for change in changes {
        ui::change(change);
    }

    let destructive = changes.iter().filter(|c| c.is_destructive()).count();
    if destructive > 0 {
        println!();
        ui::warn(&format!(
            "{destructive} change(s) remove or replace resources"
        ));
    }
}
