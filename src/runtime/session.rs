//! Session: the per-run context a set of interpreters executes against.
//!
//! The session owns the variable table, the lazily created signal stores and
//! the platform handles. Interpreters borrow that state one step at a time,
//! so no locking is needed between them.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::config::RuntimeConfig;
use super::error::{ConfigError, ScriptResult};
use super::interpreter::{Interpreter, StepEvent};
use super::registry::{CommandCatalog, CommandRegistry};
use super::script::Script;
use super::value::Variables;
use crate::platform::Platform;
use crate::signal::{SignalChannel, SignalStore, Throttle};

/// State shared by every interpreter of a session.
#[derive(Debug)]
pub struct SessionState {
    id: Uuid,
    config: RuntimeConfig,
    /// Numbered script variables.
    pub variables: Variables,
    signal_stores: HashMap<SignalChannel, SignalStore>,
    platform: Platform,
    throttle: Arc<Throttle>,
}

impl SessionState {
    fn new(config: RuntimeConfig, platform: Platform, throttle: Arc<Throttle>) -> Self {
        Self {
            id: Uuid::new_v4(),
            variables: Variables::new(config.variable_count),
            config,
            signal_stores: HashMap::new(),
            platform,
            throttle,
        }
    }

    /// Unique id of this session, used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Platform API handles.
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Throttle applied to signal fetches.
    pub fn throttle(&self) -> &Arc<Throttle> {
        &self.throttle
    }

    /// Store for `channel`, created on first use.
    pub fn signal_store(&mut self, channel: SignalChannel) -> &mut SignalStore {
        let session = self.id;
        self.signal_stores.entry(channel).or_insert_with(|| {
            tracing::debug!(%session, ?channel, "signal store created");
            SignalStore::new()
        })
    }

    /// Store for `channel` if one was created already.
    pub fn existing_signal_store(&self, channel: SignalChannel) -> Option<&SignalStore> {
        self.signal_stores.get(&channel)
    }
}

/// Summary of one `update` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStatus {
    /// Interpreters that can still make progress.
    pub active: usize,
    /// Interpreters parked on a platform call.
    pub waiting: usize,
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    config: RuntimeConfig,
    platform: Platform,
    throttle: Option<Arc<Throttle>>,
    registry: Option<CommandRegistry>,
}

impl SessionBuilder {
    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a dedicated throttle instead of the process-wide one.
    pub fn throttle(mut self, throttle: Arc<Throttle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Use a custom command registry instead of the global catalog.
    pub fn registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate the configuration and create the session.
    pub fn build(self) -> Result<Session, ConfigError> {
        self.config.validate()?;
        let throttle = self
            .throttle
            .unwrap_or_else(|| Throttle::process_wide(self.config.signal_fetch_interval()));
        let registry = self
            .registry
            .unwrap_or_else(|| CommandCatalog::global().snapshot());
        let state = SessionState::new(self.config, self.platform, throttle);
        tracing::info!(session = %state.id(), "session started");

        Ok(Session {
            state,
            registry,
            main: None,
            parallel: Vec::new(),
            frames: 0,
        })
    }
}

/// A running game session: state plus the interpreters executing against it.
pub struct Session {
    state: SessionState,
    registry: CommandRegistry,
    main: Option<Interpreter>,
    parallel: Vec<Interpreter>,
    frames: u64,
}

impl Session {
    /// Start building a session against `platform`.
    pub fn builder(platform: Platform) -> SessionBuilder {
        SessionBuilder {
            config: RuntimeConfig::default(),
            platform,
            throttle: None,
            registry: None,
        }
    }

    /// Shared state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Shared state, mutable.
    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Variable table.
    pub fn variables(&self) -> &Variables {
        &self.state.variables
    }

    /// Frames executed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The main interpreter, if a script is running.
    pub fn main_interpreter(&self) -> Option<&Interpreter> {
        self.main.as_ref()
    }

    /// Parallel interpreters.
    pub fn parallel_interpreters(&self) -> &[Interpreter] {
        &self.parallel
    }

    /// Replace the main interpreter with one running `script`.
    pub fn run_script(&mut self, script: &Script) -> ScriptResult<()> {
        self.main = Some(Interpreter::new("main", script, &self.registry)?);
        Ok(())
    }

    /// Add a parallel interpreter running `script`; returns its index.
    pub fn spawn_parallel(&mut self, script: &Script) -> ScriptResult<usize> {
        let index = self.parallel.len();
        let interpreter = Interpreter::new(format!("parallel-{index}"), script, &self.registry)?;
        self.parallel.push(interpreter);
        Ok(index)
    }

    /// Discard every interpreter. Calls still in flight settle into slots
    /// nobody reads.
    pub fn reset_interpreters(&mut self) {
        let dropped = self.main.iter().chain(&self.parallel).filter(|i| i.is_waiting()).count();
        tracing::info!(session = %self.state.id(), abandoned_calls = dropped, "interpreters reset");
        self.main = None;
        self.parallel.clear();
    }

    /// Restore variables from a save. Signal stores are kept.
    pub fn load_variables(&mut self, variables: Variables) {
        self.state.variables = variables;
    }

    /// Step every live interpreter once: main first, then parallels in
    /// spawn order.
    ///
    /// The first error halts its interpreter and is returned; interpreters
    /// later in the order are not stepped this frame.
    pub fn update(&mut self) -> ScriptResult<FrameStatus> {
        self.frames += 1;
        let mut status = FrameStatus::default();
        for interpreter in self.main.iter_mut().chain(self.parallel.iter_mut()) {
            if !interpreter.is_active() {
                continue;
            }
            match interpreter.tick(&mut self.state)? {
                StepEvent::Waiting => {
                    status.active += 1;
                    status.waiting += 1;
                }
                StepEvent::Progress | StepEvent::Completed => {
                    if interpreter.is_active() {
                        status.active += 1;
                    }
                }
            }
        }
        Ok(status)
    }

    /// Run frames until no interpreter can make progress, sleeping one frame
    /// interval between frames so platform calls get to settle.
    ///
    /// Returns the number of frames run by this call.
    pub async fn run_until_idle(&mut self) -> ScriptResult<u64> {
        let frame_interval = self.state.config.frame_interval();
        let max_frames = self.state.config.max_frames;
        let mut frames = 0;
        loop {
            let status = self.update()?;
            frames += 1;
            if status.active == 0 {
                return Ok(frames);
            }
            if max_frames.is_some_and(|max| frames >= max) {
                tracing::warn!(frames, "frame limit reached with interpreters still active");
                return Ok(frames);
            }
            tokio::time::sleep(frame_interval).await;
        }
    }
}
