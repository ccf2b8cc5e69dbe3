//! Engine-side helper commands.

use crate::runtime::command::CommandContext;
use crate::runtime::error::CommandResult;
use crate::runtime::registry::CommandCatalog;
use crate::runtime::value::Value;

/// Register the core commands.
pub fn register(catalog: &CommandCatalog) {
    catalog.register("SetVariable", "変数設定", set_variable);
}

/// `SetVariable <var> <value>`: integers are stored as numbers, anything
/// else as text.
fn set_variable(ctx: &mut CommandContext<'_>) -> CommandResult<()> {
    let args = ctx.args();
    let target = args.variable(0, "variable")?;
    let value = Value::parse_literal(args.text(1, "value")?);
    ctx.state_mut().variables.set(target, value);
    Ok(())
}
