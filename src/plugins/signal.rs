//! Global and user signal commands.
//!
//! Getting a signal first drains the session's signal store. Only when the
//! store is empty does the command fetch (throttled) through the suspension
//! bridge, merge the batch into the store and take from it.

use std::sync::Arc;

use crate::runtime::bridge::AsyncCall;
use crate::runtime::command::{CommandArgs, CommandContext};
use crate::runtime::error::{CallFailure, CommandResult};
use crate::runtime::registry::CommandCatalog;
use crate::runtime::value::{VariableId, Variables};
use crate::signal::{Signal, SignalChannel};

use super::{clear_error, report_error};

/// Register the signal commands.
pub fn register(catalog: &CommandCatalog) {
    catalog.register(
        "GetGlobalSignal",
        "グローバルシグナル取得",
        get_signal(SignalChannel::Global),
    );
    catalog.register(
        "GetUserSignal",
        "ユーザーシグナル取得",
        get_signal(SignalChannel::User),
    );
    catalog.register("SendGlobalSignal", "グローバルシグナル送信", send_global_signal);
    catalog.register("SendUserSignal", "ユーザーシグナル送信", send_user_signal);
}

/// Variables a delivered signal is written into.
#[derive(Debug, Clone, Copy)]
struct SignalTargets {
    data: VariableId,
    sender_id: VariableId,
    sender_name: VariableId,
    error: Option<VariableId>,
}

impl SignalTargets {
    fn parse(args: &CommandArgs<'_>) -> CommandResult<Self> {
        Ok(Self {
            data: args.variable(0, "data variable")?,
            sender_id: args.variable(1, "sender id variable")?,
            sender_name: args.variable(2, "sender name variable")?,
            error: args.optional_variable(3, "error variable")?,
        })
    }

    /// Write `signal`, or the "no signal" markers when there is none.
    fn deliver(&self, variables: &mut Variables, signal: Option<&Signal>) {
        match signal {
            Some(signal) => {
                variables.set(self.data, signal.data.clone());
                variables.set(self.sender_id, signal.sender_id);
                variables.set(self.sender_name, signal.sender_name.as_str());
            }
            None => {
                variables.set(self.data, 0_i64);
                variables.set(self.sender_id, 0_i64);
                variables.set(self.sender_name, "");
            }
        }
        clear_error(variables, self.error);
    }

    fn fail(&self, variables: &mut Variables, failure: &CallFailure) {
        report_error(variables, self.error, failure);
    }
}

fn get_signal(
    channel: SignalChannel,
) -> impl Fn(&mut CommandContext<'_>) -> CommandResult<()> + Send + Sync + 'static {
    move |ctx| {
        let targets = SignalTargets::parse(&ctx.args())?;
        let state = ctx.state_mut();

        if let Some(signal) = state.signal_store(channel).take_next() {
            targets.deliver(&mut state.variables, Some(&signal));
            return Ok(());
        }

        let api = Arc::clone(&state.platform().signals);
        let throttle = Arc::clone(state.throttle());
        let fetch = async move { throttle.run(|| api.fetch_signals(channel)).await };

        ctx.bind(
            AsyncCall::new(fetch)
                .on_success(move |state, batch: Vec<Signal>| {
                    let store = state.signal_store(channel);
                    store.merge(batch);
                    let next = store.take_next();
                    targets.deliver(&mut state.variables, next.as_ref());
                })
                .on_failure(move |state, failure| targets.fail(&mut state.variables, failure)),
        )
    }
}

/// `SendGlobalSignal <dataVar> [errorVar]`
fn send_global_signal(ctx: &mut CommandContext<'_>) -> CommandResult<()> {
    let args = ctx.args();
    let data_var = args.variable(0, "data variable")?;
    let error_var = args.optional_variable(1, "error variable")?;

    let state = ctx.state();
    let data = state.variables.get(data_var).clone();
    let send = state.platform().signals.send_global_signal(data);

    ctx.bind(
        AsyncCall::new(send)
            .on_success(move |state, ()| clear_error(&mut state.variables, error_var))
            .on_failure(move |state, failure| report_error(&mut state.variables, error_var, failure)),
    )
}

/// `SendUserSignal <userIdVar> <dataVar> [errorVar]`
///
/// A non-positive or non-numeric user id is passed through as `0`; the
/// platform rejects it as a bad request, which halts the script.
fn send_user_signal(ctx: &mut CommandContext<'_>) -> CommandResult<()> {
    let args = ctx.args();
    let user_var = args.variable(0, "user id variable")?;
    let data_var = args.variable(1, "data variable")?;
    let error_var = args.optional_variable(2, "error variable")?;

    let state = ctx.state();
    let recipient = state
        .variables
        .get(user_var)
        .as_number()
        .and_then(|id| u64::try_from(id).ok())
        .unwrap_or(0);
    let data = state.variables.get(data_var).clone();
    let send = state.platform().signals.send_user_signal(recipient, data);

    ctx.bind(
        AsyncCall::new(send)
            .on_success(move |state, ()| clear_error(&mut state.variables, error_var))
            .on_failure(move |state, failure| report_error(&mut state.variables, error_var, failure)),
    )
}
