// File: src/persistence.rs
use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Which plugins the user switched on or off. Plugins absent from the map are enabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginState {
    pub enabled: BTreeMap<String, bool>,
}

impl PluginState {
    pub fn is_enabled(&self, plugin: &str) -> bool {
        self.enabled.get(plugin).copied().unwrap_or(true)
    }

    pub fn set(&mut self, plugin: impl Into<String>, enabled: bool) {
        self.enabled.insert(plugin.into(), enabled);
    }
}

/// Default location: `<local data dir>/stewart/plugins.bin`.
pub fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stewart")
        .join("plugins.bin")
}

/// Writes the state to a temp file next to `path`, then renames it over `path`.
pub fn save_plugin_state(state: &PluginState, path: &Path) -> Result<(), PersistenceError> {
    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(&temp_file);
        bincode::serialize_into(&mut writer, state)?;
        writer.flush()?;
    }
    temp_file.persist(path)?;
    debug!(path = %path.display(), "plugin state saved");
    Ok(())
}

/// A missing file is not an error: it loads as the default state.
pub fn load_plugin_state(path: &Path) -> Result<PluginState, PersistenceError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(PluginState::default()),
        Err(err) => return Err(err.into()),
    };
    let state = bincode::deserialize_from(BufReader::new(file))?;
    Ok(state)
}
