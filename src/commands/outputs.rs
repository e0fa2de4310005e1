use anyhow::Result;

use super::{Session, report};
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, name: &str, json: bool) -> Result<()> {
    let session = Session::open(ctx)?;
    let mut stack = session.stack(ctx, name, None)?;
    let outputs = stack.outputs().map_err(report)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
        return Ok(());
    }

    ui::header(&format!("Outputs: {name}"));
    if outputs.is_empty() {
        ui::dim("No outputs (stack missing or not in a complete state)");
    }
    for (key, value) in &outputs {
        ui::kv(key, value);
    }
    Ok(())
}
