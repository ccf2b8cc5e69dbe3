//! Scoreboard commands.

use crate::platform::MAX_BOARD_ID;
use crate::runtime::bridge::AsyncCall;
use crate::runtime::command::CommandContext;
use crate::runtime::error::{CommandError, CommandResult};
use crate::runtime::registry::CommandCatalog;

use super::{clear_error, report_error};

/// Register the scoreboard commands.
pub fn register(catalog: &CommandCatalog) {
    catalog.register("SetRecordToScoreboard", "スコア送信", set_record);
    catalog.register("GetMyBestRecord", "自己ベスト取得", my_best_record);
}

/// `SetRecordToScoreboard <boardId> <scoreVar> [errorVar]`
fn set_record(ctx: &mut CommandContext<'_>) -> CommandResult<()> {
    let args = ctx.args();
    let board_id = args.id_in_range(0, "board id", MAX_BOARD_ID)?;
    let score_var = args.variable(1, "score variable")?;
    let error_var = args.optional_variable(2, "error variable")?;

    let state = ctx.state();
    let score_value = state.variables.get(score_var);
    let score = score_value
        .as_number()
        .ok_or_else(|| CommandError::InvalidArgument {
            index: 1,
            name: "score variable",
            expected: "variable holding a number",
            value: score_value.to_string(),
        })?;
    let submit = state.platform().scoreboards.set_record(board_id, score);

    ctx.bind(
        AsyncCall::new(submit)
            .on_success(move |state, ()| clear_error(&mut state.variables, error_var))
            .on_failure(move |state, failure| report_error(&mut state.variables, error_var, failure)),
    )
}

/// `GetMyBestRecord <boardId> <resultVar> [errorVar]`
///
/// Writes `0` when the player has no record on the board.
fn my_best_record(ctx: &mut CommandContext<'_>) -> CommandResult<()> {
    let args = ctx.args();
    let board_id = args.id_in_range(0, "board id", MAX_BOARD_ID)?;
    let result_var = args.variable(1, "result variable")?;
    let error_var = args.optional_variable(2, "error variable")?;

    let fetch = ctx.state().platform().scoreboards.my_best_record(board_id);

    ctx.bind(
        AsyncCall::new(fetch)
            .on_success(move |state, best: Option<i64>| {
                state.variables.set(result_var, best.unwrap_or(0));
                clear_error(&mut state.variables, error_var);
            })
            .on_failure(move |state, failure| report_error(&mut state.variables, error_var, failure)),
    )
}
