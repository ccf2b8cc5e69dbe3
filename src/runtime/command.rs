//! Command handler context and positional argument parsing.

use super::bridge::{AsyncCall, PendingCall};
use super::error::{CommandError, CommandResult};
use super::script::ScriptCommand;
use super::session::SessionState;
use super::value::VariableId;

/// Everything a handler may touch during one invocation.
pub struct CommandContext<'a> {
    state: &'a mut SessionState,
    command: &'a ScriptCommand,
    cursor: usize,
    pending: &'a mut Option<PendingCall>,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(
        state: &'a mut SessionState,
        command: &'a ScriptCommand,
        cursor: usize,
        pending: &'a mut Option<PendingCall>,
    ) -> Self {
        Self {
            state,
            command,
            cursor,
            pending,
        }
    }

    /// Session state, read-only.
    pub fn state(&self) -> &SessionState {
        &*self.state
    }

    /// Session state, mutable.
    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut *self.state
    }

    /// The command being executed.
    pub fn command(&self) -> &ScriptCommand {
        self.command
    }

    /// Argument parser over the command's positional arguments.
    pub fn args(&self) -> CommandArgs<'a> {
        CommandArgs {
            args: &self.command.args,
            variable_count: self.state.variables.len(),
        }
    }

    /// Suspend the interpreter on `call` until it settles.
    ///
    /// Only one call may be bound per invocation.
    pub fn bind<T: Send + 'static>(&mut self, call: AsyncCall<T>) -> CommandResult<()> {
        if self.pending.is_some() {
            return Err(CommandError::CallAlreadyPending);
        }
        let pending = PendingCall::spawn(call, self.cursor)?;
        tracing::debug!(
            session = %self.state.id(),
            line = self.command.line,
            command = %self.command.name,
            "interpreter suspended on platform call"
        );
        *self.pending = Some(pending);
        Ok(())
    }
}

/// Typed access to positional arguments.
#[derive(Debug, Clone, Copy)]
pub struct CommandArgs<'a> {
    args: &'a [String],
    variable_count: usize,
}

impl<'a> CommandArgs<'a> {
    /// Build a parser directly (used by tests and custom hosts).
    pub fn new(args: &'a [String], variable_count: usize) -> Self {
        Self {
            args,
            variable_count,
        }
    }

    /// Number of arguments supplied.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether no arguments were supplied.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Raw text of a required argument.
    pub fn text(&self, index: usize, name: &'static str) -> CommandResult<&'a str> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or(CommandError::MissingArgument { index, name })
    }

    /// Required integer argument.
    pub fn integer(&self, index: usize, name: &'static str) -> CommandResult<i64> {
        let raw = self.text(index, name)?;
        raw.trim()
            .parse()
            .map_err(|_| CommandError::InvalidArgument {
                index,
                name,
                expected: "integer",
                value: raw.to_string(),
            })
    }

    /// Required id in `1..=max`.
    pub fn id_in_range(&self, index: usize, name: &'static str, max: u32) -> CommandResult<u32> {
        let value = self.integer(index, name)?;
        if (1..=i64::from(max)).contains(&value) {
            Ok(value as u32)
        } else {
            Err(CommandError::OutOfRange {
                name,
                value,
                max: i64::from(max),
            })
        }
    }

    /// Required variable id.
    pub fn variable(&self, index: usize, name: &'static str) -> CommandResult<VariableId> {
        let value = self.integer(index, name)?;
        self.check_variable(value, name)
    }

    /// Optional variable id; absent, empty or `0` mean "not requested".
    pub fn optional_variable(
        &self,
        index: usize,
        name: &'static str,
    ) -> CommandResult<Option<VariableId>> {
        match self.args.get(index).map(|raw| raw.trim()) {
            None | Some("") | Some("0") => Ok(None),
            Some(_) => self.variable(index, name).map(Some),
        }
    }

    fn check_variable(&self, value: i64, name: &'static str) -> CommandResult<VariableId> {
        usize::try_from(value)
            .ok()
            .and_then(|raw| VariableId::checked(raw, self.variable_count))
            .ok_or(CommandError::OutOfRange {
                name,
                value,
                max: self.variable_count as i64,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_variable_ids_validated_against_table() {
        let raw = args(&["1", "10", "11", "-3", "x"]);
        let parsed = CommandArgs::new(&raw, 10);

        assert_eq!(parsed.variable(0, "a").unwrap().get(), 1);
        assert_eq!(parsed.variable(1, "b").unwrap().get(), 10);
        assert!(matches!(
            parsed.variable(2, "c"),
            Err(CommandError::OutOfRange { value: 11, max: 10, .. })
        ));
        assert!(matches!(
            parsed.variable(3, "d"),
            Err(CommandError::OutOfRange { value: -3, .. })
        ));
        assert!(matches!(
            parsed.variable(4, "e"),
            Err(CommandError::InvalidArgument { expected: "integer", .. })
        ));
        assert!(matches!(
            parsed.variable(5, "f"),
            Err(CommandError::MissingArgument { index: 5, name: "f" })
        ));
    }

    #[test]
    fn test_optional_variable() {
        let raw = args(&["0", "", "4"]);
        let parsed = CommandArgs::new(&raw, 10);

        assert_eq!(parsed.optional_variable(0, "a").unwrap(), None);
        assert_eq!(parsed.optional_variable(1, "b").unwrap(), None);
        assert_eq!(parsed.optional_variable(2, "c").unwrap().map(|v| v.get()), Some(4));
        assert_eq!(parsed.optional_variable(3, "d").unwrap(), None);
    }

    #[test]
    fn test_id_in_range() {
        let raw = args(&["100", "101", "0"]);
        let parsed = CommandArgs::new(&raw, 10);

        assert_eq!(parsed.id_in_range(0, "board", 100).unwrap(), 100);
        assert!(parsed.id_in_range(1, "board", 100).is_err());
        assert!(parsed.id_in_range(2, "board", 100).is_err());
    }
}
