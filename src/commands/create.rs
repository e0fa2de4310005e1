use anyhow::Result;

use super::{Session, report};
use crate::Context;
use crate::cli::CreateArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &CreateArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let mut stack = session.stack(ctx, &args.stack, args.wait.timeout)?;

    if stack.exists().map_err(report)? {
        ui::warn(&format!("Stack {} already exists, use `stacker update`", args.stack));
        return Ok(());
    }

    stack.create(!args.wait.no_wait).map_err(report)?;

    if args.wait.no_wait {
        ui::info(&format!("Create submitted for {}", args.stack));
    } else {
        ui::success(&format!("Stack {} created", args.stack));
    }
    Ok(())
}
