//! Command registry
//!
//! Plugins register handlers under an English name and a localized alias in
//! a catalog. Sessions take an immutable snapshot of the catalog, and
//! interpreters bind every script line to its handler once, when the script
//! is loaded.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::command::CommandContext;
use super::error::CommandResult;

/// Handler invoked for one script command.
pub type CommandHandler = Arc<dyn Fn(&mut CommandContext<'_>) -> CommandResult<()> + Send + Sync>;

#[derive(Clone)]
struct CommandInfo {
    canonical: &'static str,
    handler: CommandHandler,
}

/// Mutable catalog of command handlers.
pub struct CommandCatalog {
    commands: RwLock<HashMap<String, CommandInfo>>,
}

static CATALOG: Lazy<CommandCatalog> = Lazy::new(CommandCatalog::with_plugins);

impl CommandCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
        }
    }

    /// Create a catalog holding every bundled plugin command.
    pub fn with_plugins() -> Self {
        let catalog = Self::new();
        crate::plugins::register_all(&catalog);
        catalog
    }

    /// Access the global catalog singleton (bundled plugins pre-registered).
    pub fn global() -> &'static Self {
        &CATALOG
    }

    /// Register a handler under its name and localized alias.
    ///
    /// Re-registering a name replaces the previous handler.
    pub fn register<F>(&self, name: &'static str, alias: &'static str, handler: F)
    where
        F: Fn(&mut CommandContext<'_>) -> CommandResult<()> + Send + Sync + 'static,
    {
        let info = CommandInfo {
            canonical: name,
            handler: Arc::new(handler),
        };
        let mut commands = self.commands.write();
        for key in [name, alias] {
            if commands.insert(key.to_string(), info.clone()).is_some() {
                tracing::debug!(command = key, "command handler replaced");
            }
        }
    }

    /// Produce an immutable snapshot for a session.
    pub fn snapshot(&self) -> CommandRegistry {
        let commands = self.commands.read();
        CommandRegistry {
            commands: Arc::new(commands.clone()),
        }
    }
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of a command catalog.
#[derive(Clone)]
pub struct CommandRegistry {
    commands: Arc<HashMap<String, CommandInfo>>,
}

impl CommandRegistry {
    /// Handler registered under `name` (either the name or its alias).
    pub fn resolve(&self, name: &str) -> Option<CommandHandler> {
        self.commands.get(name).map(|info| Arc::clone(&info.handler))
    }

    /// English name for `name`, which may be an alias.
    pub fn canonical_name(&self, name: &str) -> Option<&'static str> {
        self.commands.get(name).map(|info| info.canonical)
    }

    /// Check whether the snapshot knows `name`.
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// English names of every registered command, sorted.
    pub fn list_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.commands.values().map(|info| info.canonical).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.list_commands())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolves_to_same_handler() {
        let catalog = CommandCatalog::new();
        catalog.register("Noop", "何もしない", |_ctx| Ok(()));
        let registry = catalog.snapshot();

        assert!(registry.has_command("Noop"));
        assert!(registry.has_command("何もしない"));
        assert_eq!(registry.canonical_name("何もしない"), Some("Noop"));
        assert_eq!(registry.list_commands(), vec!["Noop"]);
        assert!(registry.resolve("Missing").is_none());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_registrations() {
        let catalog = CommandCatalog::new();
        let before = catalog.snapshot();
        catalog.register("Late", "遅い", |_ctx| Ok(()));

        assert!(!before.has_command("Late"));
        assert!(catalog.snapshot().has_command("Late"));
    }

    #[test]
    fn test_global_catalog_has_bundled_plugins() {
        let registry = CommandCatalog::global().snapshot();
        for name in [
            "SetVariable",
            "GetGlobalSignal",
            "GetUserSignal",
            "SendGlobalSignal",
            "SendUserSignal",
            "SetRecordToScoreboard",
            "GetMyBestRecord",
        ] {
            assert!(registry.has_command(name), "missing {name}");
        }
        assert!(registry.has_command("ユーザーシグナル取得"));
    }
}
