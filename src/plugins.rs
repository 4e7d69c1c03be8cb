// File: src/plugins.rs
use crate::core::engine::CommandEngine;
use crate::core::types::CommandDefinition;
use crate::error::PluginError;
use crate::persistence::{load_plugin_state, save_plugin_state, PluginState};
use crate::registry::ActionRegistry;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// A bundle of commands and the handlers that serve them.
pub trait CommandPlugin {
    fn name(&self) -> &str;

    fn commands(&self) -> Vec<CommandDefinition>;

    fn register_handlers(&self, registry: &mut ActionRegistry);
}

/// Tracks which phrases belong to which plugin, since the engine itself has no
/// notion of ownership, and switches plugins on and off.
pub struct PluginManager {
    installed: BTreeMap<String, Vec<CommandDefinition>>,
    state: PluginState,
    state_path: Option<PathBuf>,
}

impl PluginManager {
    /// Keeps status in memory only.
    pub fn in_memory() -> Self {
        Self { installed: BTreeMap::new(), state: PluginState::default(), state_path: None }
    }

    /// Restores status from `path` and writes every change back to it.
    pub fn with_state_file(path: impl Into<PathBuf>) -> Result<Self, PluginError> {
        let path = path.into();
        let state = load_plugin_state(&path)?;
        Ok(Self { installed: BTreeMap::new(), state, state_path: Some(path) })
    }

    /// Registers the plugin's handlers, and its commands unless it was left disabled.
    /// Returns the number of phrases added to the engine.
    pub fn install(
        &mut self,
        plugin: &dyn CommandPlugin,
        engine: &mut CommandEngine,
        registry: &mut ActionRegistry,
    ) -> Result<usize, PluginError> {
        let name = plugin.name().to_string();
        let commands = plugin.commands();
        plugin.register_handlers(registry);

        let mut inserted = 0;
        if self.state.is_enabled(&name) {
            inserted = engine.load(&commands)?;
            for command in &commands {
                if !registry.contains(&command.action) {
                    warn!(plugin = %name, action = %command.action, "command has no registered handler");
                }
            }
        }
        info!(plugin = %name, enabled = self.state.is_enabled(&name), phrases = inserted, "plugin installed");
        self.installed.insert(name, commands);
        Ok(inserted)
    }

    /// Removes the plugin's phrases. Returns false when it was already disabled.
    pub fn disable(&mut self, name: &str, engine: &mut CommandEngine) -> Result<bool, PluginError> {
        let commands = self.installed.get(name).ok_or_else(|| PluginError::Unknown(name.to_string()))?;
        if !self.state.is_enabled(name) {
            return Ok(false);
        }
        let removed: usize = commands.iter().map(|c| engine.remove_definition(c)).sum();
        self.state.set(name, false);
        self.persist()?;
        info!(plugin = name, removed, "plugin disabled");
        Ok(true)
    }

    /// Re-registers the plugin's phrases. Returns false when it was already enabled.
    pub fn enable(&mut self, name: &str, engine: &mut CommandEngine) -> Result<bool, PluginError> {
        let commands = self.installed.get(name).ok_or_else(|| PluginError::Unknown(name.to_string()))?;
        if self.state.is_enabled(name) {
            return Ok(false);
        }
        let inserted = engine.load(commands)?;
        self.state.set(name, true);
        self.persist()?;
        info!(plugin = name, inserted, "plugin enabled");
        Ok(true)
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.installed.contains_key(name).then(|| self.state.is_enabled(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.installed.keys().map(String::as_str)
    }

    fn persist(&self) -> Result<(), PluginError> {
        if let Some(path) = &self.state_path {
            save_plugin_state(&self.state, path)?;
        }
        Ok(())
    }
}
