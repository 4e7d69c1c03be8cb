// File: src/config.rs
// Every section is optional, so an empty file yields a working assistant with no commands.

use crate::core::segmenter::{SegmentationConfig, DEFAULT_CONNECTOR, DEFAULT_MAX_GAP};
use crate::core::types::{CommandDefinition, Parameters};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub trigger: TriggerConfig,

    #[serde(default)]
    pub segmentation: SegmentationSection,

    #[serde(default)]
    pub answers: AnswersConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub commands: Vec<CommandEntry>,

    #[serde(default)]
    pub command_repeats: Vec<RepeatEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Every utterance is a request.
    Disabled,
    /// Every request must contain a trigger word.
    Always,
    /// A trigger word opens a window during which none is needed.
    Timed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub words: Vec<String>,

    #[serde(default = "default_trigger_mode")]
    pub mode: TriggerMode,

    #[serde(default = "default_timed_seconds")]
    pub timed_seconds: u64,
}

fn default_trigger_mode() -> TriggerMode {
    TriggerMode::Disabled
}

fn default_timed_seconds() -> u64 {
    30
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            words: Vec::new(),
            mode: default_trigger_mode(),
            timed_seconds: default_timed_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationSection {
    #[serde(default = "default_connector")]
    pub connector: String,

    #[serde(default)]
    pub slurp_rest: Vec<String>,

    #[serde(default = "default_max_gap")]
    pub max_gap: usize,
}

fn default_connector() -> String {
    DEFAULT_CONNECTOR.to_string()
}

fn default_max_gap() -> usize {
    DEFAULT_MAX_GAP
}

impl Default for SegmentationSection {
    fn default() -> Self {
        Self {
            connector: default_connector(),
            slurp_rest: Vec::new(),
            max_gap: default_max_gap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnswersConfig {
    /// Spoken when only a trigger word was heard.
    #[serde(default)]
    pub default: Vec<String>,

    /// Spoken once for an utterance holding several commands.
    #[serde(default)]
    pub multi: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_length")]
    pub max_length: usize,
}

fn default_history_length() -> usize {
    20
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_length: default_history_length() }
    }
}

/// A phrase written either as a word list or as one space-separated string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PhraseSpec {
    Words(Vec<String>),
    Text(String),
}

impl PhraseSpec {
    pub fn words(&self) -> Vec<String> {
        match self {
            PhraseSpec::Words(words) => words.clone(),
            PhraseSpec::Text(text) => text.split_whitespace().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEntry {
    pub phrase: PhraseSpec,
    pub action: String,

    #[serde(default)]
    pub parameters: Parameters,

    #[serde(default)]
    pub responses: Vec<String>,

    #[serde(default)]
    pub synonyms: BTreeMap<String, String>,

    #[serde(default)]
    pub equivalents: Vec<PhraseSpec>,

    #[serde(default)]
    pub inside_speech: bool,
}

impl From<&CommandEntry> for CommandDefinition {
    fn from(entry: &CommandEntry) -> Self {
        CommandDefinition {
            phrase: entry.phrase.words(),
            action: entry.action.clone(),
            parameters: entry.parameters.clone(),
            responses: entry.responses.clone(),
            synonyms: entry.synonyms.clone(),
            equivalents: entry.equivalents.iter().map(PhraseSpec::words).collect(),
            inside_speech: entry.inside_speech,
        }
    }
}

/// One command per link: `phrase + [link]`, with `{ parameter = value }` as parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepeatEntry {
    pub phrase: PhraseSpec,
    pub action: String,
    pub parameter: String,
    pub links: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub responses: Vec<String>,

    #[serde(default)]
    pub synonyms: BTreeMap<String, String>,
}

impl RepeatEntry {
    pub fn expand(&self) -> Vec<CommandDefinition> {
        self.links
            .iter()
            .map(|(link, value)| {
                let mut phrase = self.phrase.words();
                phrase.push(link.clone());
                let mut parameters = Parameters::new();
                parameters.insert(self.parameter.clone(), value.clone());
                CommandDefinition {
                    phrase,
                    action: self.action.clone(),
                    parameters,
                    responses: self.responses.clone(),
                    synonyms: self.synonyms.clone(),
                    equivalents: Vec::new(),
                    inside_speech: false,
                }
            })
            .collect()
    }
}

impl Config {
    /// Default location: `<config dir>/stewart/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stewart")
            .join("config.toml")
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content, path)?;
        info!(path = %path.display(), commands = config.commands.len(), "configuration loaded");
        Ok(config)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let connector = &self.segmentation.connector;
        if connector.split_whitespace().count() != 1 {
            return Err(ConfigError::Invalid(format!(
                "segmentation.connector must be a single word, got {connector:?}"
            )));
        }
        if self.trigger.mode != TriggerMode::Disabled && self.trigger.words.iter().all(|w| w.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "trigger.words must not be empty unless trigger.mode is \"disabled\"".to_string(),
            ));
        }
        Ok(())
    }

    pub fn segmentation_config(&self) -> SegmentationConfig {
        SegmentationConfig {
            connector: self.segmentation.connector.clone(),
            slurp_rest: self.segmentation.slurp_rest.iter().cloned().collect(),
            max_gap: self.segmentation.max_gap,
        }
    }

    /// Plain commands followed by expanded repeat entries.
    pub fn definitions(&self) -> Vec<CommandDefinition> {
        self.commands
            .iter()
            .map(CommandDefinition::from)
            .chain(self.command_repeats.iter().flat_map(RepeatEntry::expand))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[trigger]
words = ["stewart"]
mode = "timed"
timed_seconds = 10

[segmentation]
connector = "and"
slurp_rest = ["search", "write"]
max_gap = 2

[answers]
default = ["Yes, sir?"]
multi = ["Right away"]

[[commands]]
phrase = ["open", "browser"]
action = "browser_open"
parameters = { url = "https://example.org", tabs = 2 }
responses = ["Opening"]
synonyms = { launch = "open" }
equivalents = ["start browser"]

[[commands]]
phrase = "take screenshot"
action = "hotkey"
parameters = { hotkey = ["shift", "print"] }
inside_speech = true

[[command_repeats]]
phrase = "set volume"
action = "volume"
parameter = "level"
links = { ten = 10, fifty = 50 }
"#;

    fn sample() -> Config {
        Config::parse(SAMPLE, Path::new("sample.toml")).unwrap()
    }

    #[test]
    fn test_parse_sections() {
        let config = sample();
        assert_eq!(config.trigger.mode, TriggerMode::Timed);
        assert_eq!(config.trigger.timed_seconds, 10);
        assert_eq!(config.answers.multi, vec!["Right away".to_string()]);
        assert_eq!(config.history.max_length, 20);

        let seg = config.segmentation_config();
        assert_eq!(seg.max_gap, 2);
        assert!(seg.slurp_rest.contains("write"));
    }

    #[test]
    fn test_definitions_flatten_commands_and_repeats() {
        let defs = sample().definitions();
        assert_eq!(defs.len(), 4);

        assert_eq!(defs[0].phrase, vec!["open".to_string(), "browser".to_string()]);
        assert_eq!(defs[0].equivalents, vec![vec!["start".to_string(), "browser".to_string()]]);
        assert_eq!(defs[0].parameters["tabs"], 2);
        assert_eq!(defs[1].phrase, vec!["take".to_string(), "screenshot".to_string()]);
        assert!(defs[1].inside_speech);
        assert_eq!(defs[1].parameters["hotkey"], serde_json::json!(["shift", "print"]));

        let fifty = defs.iter().find(|d| d.phrase.last().map(String::as_str) == Some("fifty")).unwrap();
        assert_eq!(fifty.action, "volume");
        assert_eq!(fifty.parameters["level"], 50);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("", Path::new("empty.toml")).unwrap();
        assert_eq!(config.trigger.mode, TriggerMode::Disabled);
        assert_eq!(config.segmentation_config(), SegmentationConfig::default());
        assert!(config.definitions().is_empty());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let bad_connector = "[segmentation]\nconnector = \"and then\"\n";
        assert!(matches!(
            Config::parse(bad_connector, Path::new("c.toml")),
            Err(ConfigError::Invalid(_))
        ));

        let no_trigger = "[trigger]\nmode = \"always\"\n";
        assert!(matches!(Config::parse(no_trigger, Path::new("t.toml")), Err(ConfigError::Invalid(_))));

        assert!(matches!(Config::parse("commands = 3", Path::new("x.toml")), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert!(config.commands.is_empty());
        assert!(matches!(Config::load(&dir.path().join("absent.toml")), Err(ConfigError::Io { .. })));
    }
}
