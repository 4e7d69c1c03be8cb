use crate::core::normalizer::{FirstWordSet, Normalizer};
use crate::core::resolver::Resolver;
use crate::core::segmenter::{SegmentationConfig, Segmenter};
use crate::core::trie::PhraseTrie;
use crate::core::types::{tokenize, CommandDefinition, ResolvedCommand, SegmentedCommand, TerminalData};
use crate::error::EngineError;
use std::collections::BTreeSet;
use tracing::debug;

/// Segments of one utterance and the commands they resolved to.
#[derive(Debug, Clone, Default)]
pub struct Interpretation {
    pub segments: Vec<SegmentedCommand>,
    pub commands: Vec<ResolvedCommand>,
}

impl Interpretation {
    /// No word of the utterance could open a command. Distinct from segments
    /// that were found but resolved to nothing.
    pub fn is_unrecognized(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_multi(&self) -> bool {
        self.segments.len() > 1
    }
}

// The engine owns the trie and the normalizer state built on top of it.
// Reads take &self and may run side by side; registration and removal take &mut self.
pub struct CommandEngine {
    trie: PhraseTrie,
    normalizer: Normalizer,
    segmentation: SegmentationConfig,
}

impl Default for CommandEngine {
    fn default() -> Self {
        Self::new(SegmentationConfig::default())
    }
}

impl CommandEngine {
    pub fn new(segmentation: SegmentationConfig) -> Self {
        Self {
            trie: PhraseTrie::new(),
            normalizer: Normalizer::new(),
            segmentation,
        }
    }

    pub fn register(&mut self, definition: &CommandDefinition) -> Result<usize, EngineError> {
        self.normalizer.register(definition, &mut self.trie)
    }

    /// Registers every definition in order. Re-loading the same set is idempotent.
    pub fn load<'d, I>(&mut self, definitions: I) -> Result<usize, EngineError>
    where
        I: IntoIterator<Item = &'d CommandDefinition>,
    {
        let mut inserted = 0;
        for definition in definitions {
            inserted += self.register(definition)?;
        }
        debug!(inserted, "loaded command definitions");
        Ok(inserted)
    }

    /// Removes one phrase. Returns false when it was not registered.
    pub fn remove<S: AsRef<str>>(&mut self, phrase: &[S]) -> bool {
        let canonical = self.normalizer.normalize(phrase, &self.trie);
        if !self.trie.remove(&canonical) {
            return false;
        }
        self.normalizer.sync_first_words(&self.trie);
        debug!(phrase = %canonical.join(" "), "removed command");
        true
    }

    /// Removes a definition's phrase and all of its equivalents, as they were stored
    /// when it was registered. Returns how many were removed.
    pub fn remove_definition(&mut self, definition: &CommandDefinition) -> usize {
        let Ok(phrases) = Normalizer::stored_phrases(definition) else {
            return 0;
        };
        let mut removed = 0;
        for phrase in &phrases {
            if self.trie.remove(phrase) {
                removed += 1;
            }
        }
        if removed > 0 {
            self.normalizer.sync_first_words(&self.trie);
            debug!(action = %definition.action, removed, "removed command definition");
        }
        removed
    }

    pub fn add_hook<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&[String], &CommandDefinition) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.normalizer.add_hook(name, hook);
    }

    pub fn segmenter(&self) -> Segmenter<'_> {
        Segmenter::new(&self.trie, &self.normalizer, &self.segmentation)
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.trie, &self.normalizer)
    }

    pub fn segment(&self, utterance: &str) -> Vec<SegmentedCommand> {
        self.segmenter().segment(&tokenize(utterance))
    }

    pub fn lookup<S: AsRef<str>>(&self, tokens: &[S]) -> Option<&TerminalData> {
        self.trie.lookup(&self.normalizer.normalize(tokens, &self.trie))
    }

    /// Segments the utterance and resolves each segment, dropping the ones that
    /// name no registered command.
    pub fn interpret(&self, utterance: &str) -> Interpretation {
        let segments = self.segment(utterance);
        let resolver = self.resolver();
        let commands = segments
            .iter()
            .filter_map(|segment| resolver.resolve(segment, utterance))
            .collect();
        Interpretation { segments, commands }
    }

    pub fn trie(&self) -> &PhraseTrie {
        &self.trie
    }

    pub fn first_words(&self) -> &FirstWordSet {
        self.normalizer.first_words()
    }

    /// Every word a recognizer needs to know: phrase words plus spoken synonyms.
    pub fn vocabulary(&self) -> BTreeSet<String> {
        let mut words: BTreeSet<String> = self
            .trie
            .phrases()
            .into_iter()
            .flat_map(|(phrase, _)| phrase)
            .collect();
        words.extend(self.normalizer.synonyms().words().map(str::to_string));
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> CommandEngine {
        let mut engine = CommandEngine::default();
        engine
            .load(&[
                CommandDefinition::new(["open", "browser"], "browser_open").with_equivalent(["start", "browser"]),
                CommandDefinition::new(["click"], "click").with_synonym("press", "click"),
                CommandDefinition::new(["scroll", "down"], "scroll").with_parameter("way", "down"),
            ])
            .unwrap();
        engine
    }

    #[test]
    fn test_interpret_multi_command_utterance() {
        let engine = engine();
        let result = engine.interpret("open browser and press and scroll down");
        let actions: Vec<&str> = result.commands.iter().map(|c| c.action.as_str()).collect();
        assert_eq!(actions, vec!["browser_open", "click", "scroll"]);
        assert!(result.is_multi());
        assert!(result.commands.iter().all(|c| c.original_request_text == "open browser and press and scroll down"));
    }

    #[test]
    fn test_unrecognized_differs_from_unresolved() {
        let engine = engine();
        assert!(engine.interpret("what a nice day").is_unrecognized());

        let partial = engine.interpret("scroll");
        assert!(!partial.is_unrecognized());
        assert!(partial.commands.is_empty());
    }

    #[test]
    fn test_remove_definition_drops_equivalents_and_first_words() {
        let mut engine = engine();
        let def = CommandDefinition::new(["open", "browser"], "browser_open").with_equivalent(["start", "browser"]);
        assert_eq!(engine.remove_definition(&def), 2);
        assert_eq!(engine.remove_definition(&def), 0);
        assert!(engine.lookup(&["start", "browser"]).is_none());
        assert!(!engine.first_words().contains("open"));
        assert!(!engine.first_words().contains("start"));
        assert!(engine.interpret("open browser").is_unrecognized());
    }

    #[test]
    fn test_remove_through_synonym() {
        let mut engine = engine();
        assert!(engine.remove(&["press"]));
        assert!(engine.lookup(&["click"]).is_none());
        assert!(!engine.first_words().contains("press"));
    }

    #[test]
    fn test_later_synonym_keeps_earlier_phrase_reachable() {
        let mut engine = CommandEngine::default();
        let defs = [
            CommandDefinition::new(["scroll", "down"], "scroll"),
            CommandDefinition::new(["lower", "volume"], "volume").with_synonym("down", "lower"),
        ];
        engine.load(&defs).unwrap();

        assert_eq!(engine.lookup(&["scroll", "down"]).map(|t| t.action.as_str()), Some("scroll"));
        assert_eq!(engine.lookup(&["down", "volume"]).map(|t| t.action.as_str()), Some("volume"));
        let segments: Vec<Vec<String>> = engine.segment("scroll down").into_iter().map(|s| s.tokens).collect();
        assert_eq!(segments, vec![vec!["scroll".to_string(), "down".to_string()]]);

        assert!(engine.remove(&["scroll", "down"]));
        assert!(engine.lookup(&["scroll", "down"]).is_none());
        // "down" is no longer inside any phrase, so it may open "lower volume".
        assert!(engine.first_words().contains("down"));
    }

    #[test]
    fn test_reload_leaves_trie_unchanged() {
        let mut engine = CommandEngine::default();
        let defs = [
            CommandDefinition::new(["scroll", "down"], "scroll"),
            CommandDefinition::new(["lower", "volume"], "volume").with_synonym("down", "lower"),
        ];
        engine.load(&defs).unwrap();
        let phrases: Vec<Vec<String>> = engine.trie().phrases().into_iter().map(|(p, _)| p).collect();
        let nodes = engine.trie().node_count();

        engine.load(&defs).unwrap();
        let reloaded: Vec<Vec<String>> = engine.trie().phrases().into_iter().map(|(p, _)| p).collect();
        assert_eq!(reloaded, phrases);
        assert_eq!(engine.trie().node_count(), nodes);
    }

    #[test]
    fn test_vocabulary_includes_synonyms() {
        let engine = engine();
        let vocabulary = engine.vocabulary();
        for word in ["open", "browser", "start", "click", "press", "scroll", "down"] {
            assert!(vocabulary.contains(word), "missing {word}");
        }
    }
}
