use std::sync::Arc;

use super::bridge::PendingCall;
use super::command::CommandContext;
use super::error::{ScriptError, ScriptResult};
use super::registry::{CommandHandler, CommandRegistry};
use super::script::{Script, ScriptCommand};
use super::session::SessionState;

/// Outcome of a `tick` call on an interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// An instruction ran, or a settled call was applied.
    Progress,
    /// A bound call has not settled; the cursor did not move.
    Waiting,
    /// Every instruction has run.
    Completed,
}

struct BoundCommand {
    command: ScriptCommand,
    handler: CommandHandler,
}

/// Single-threaded script interpreter executing one instruction per tick.
pub struct Interpreter {
    name: String,
    commands: Vec<BoundCommand>,
    cursor: usize,
    pending: Option<PendingCall>,
    halted: bool,
}

impl Interpreter {
    /// Bind every command of `script` to its handler.
    pub fn new(
        name: impl Into<String>,
        script: &Script,
        registry: &CommandRegistry,
    ) -> ScriptResult<Self> {
        let commands = script
            .commands
            .iter()
            .map(|command| {
                let handler =
                    registry
                        .resolve(&command.name)
                        .ok_or_else(|| ScriptError::UnknownCommand {
                            name: command.name.clone(),
                            line: command.line,
                        })?;
                Ok(BoundCommand {
                    command: command.clone(),
                    handler,
                })
            })
            .collect::<ScriptResult<Vec<_>>>()?;

        Ok(Self {
            name: name.into(),
            commands,
            cursor: 0,
            pending: None,
            halted: false,
        })
    }

    /// Execute until one meaningful event occurs.
    ///
    /// A settled call's continuation and the instruction after it run in the
    /// same tick, so no other interpreter can observe or overwrite the
    /// continuation's writes before that instruction reads them.
    pub fn tick(&mut self, state: &mut SessionState) -> ScriptResult<StepEvent> {
        if self.halted {
            return Err(ScriptError::Halted);
        }

        if let Some(pending) = &self.pending {
            let Some(resolver) = pending.take_resolver() else {
                return Ok(StepEvent::Waiting);
            };
            let cursor = pending.cursor();
            self.pending = None;
            self.cursor = cursor + 1;
            let location = self.commands[cursor].command.location();
            tracing::debug!(
                interpreter = %self.name,
                line = location.line,
                "platform call settled; resuming"
            );
            if let Err(err) = resolver(state, &location) {
                return Err(self.halt(err));
            }
        }

        self.execute(state)
    }

    fn execute(&mut self, state: &mut SessionState) -> ScriptResult<StepEvent> {
        let Some(bound) = self.commands.get(self.cursor) else {
            return Ok(StepEvent::Completed);
        };
        let handler = Arc::clone(&bound.handler);
        let result = {
            let mut ctx = CommandContext::new(state, &bound.command, self.cursor, &mut self.pending);
            handler(&mut ctx)
        };

        if let Err(source) = result {
            let location = self.commands[self.cursor].command.location();
            return Err(self.halt(ScriptError::Command { location, source }));
        }

        if self.pending.is_some() {
            return Ok(StepEvent::Waiting);
        }
        self.cursor += 1;
        Ok(StepEvent::Progress)
    }

    fn halt(&mut self, err: ScriptError) -> ScriptError {
        tracing::warn!(interpreter = %self.name, error = %err, "interpreter halted");
        self.halted = true;
        self.pending = None;
        err
    }

    /// Label used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the next instruction to run (or the one being waited on).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of instructions in the script.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the script has no instructions.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Whether a bound call is outstanding.
    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether an error stopped this interpreter.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Whether every instruction has run.
    pub fn is_completed(&self) -> bool {
        !self.halted && self.pending.is_none() && self.cursor >= self.commands.len()
    }

    /// Whether further ticks can make progress.
    pub fn is_active(&self) -> bool {
        !self.halted && !self.is_completed()
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("name", &self.name)
            .field("cursor", &self.cursor)
            .field("len", &self.commands.len())
            .field("pending", &self.pending)
            .field("halted", &self.halted)
            .finish()
    }
}
