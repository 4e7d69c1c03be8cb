// File: src/core/segmenter.rs
use crate::core::normalizer::Normalizer;
use crate::core::trie::PhraseTrie;
use crate::core::types::SegmentedCommand;
use std::collections::HashSet;
use tracing::{debug, trace};

pub const DEFAULT_CONNECTOR: &str = "and";
pub const DEFAULT_MAX_GAP: usize = 1;

/// Language-specific settings for splitting one utterance into several commands.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationConfig {
    /// Word joining two spoken commands; never part of either.
    pub connector: String,
    /// Words whose command swallows the rest of the utterance verbatim.
    pub slurp_rest: HashSet<String>,
    /// How many skipped words may separate a command word from its continuation.
    pub max_gap: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            connector: DEFAULT_CONNECTOR.to_string(),
            slurp_rest: HashSet::new(),
            max_gap: DEFAULT_MAX_GAP,
        }
    }
}

/// Single left-to-right pass cutting an utterance into command segments.
/// Words that neither open a command nor continue the open one are dropped as noise.
pub struct Segmenter<'a> {
    trie: &'a PhraseTrie,
    normalizer: &'a Normalizer,
    config: &'a SegmentationConfig,
}

impl<'a> Segmenter<'a> {
    pub fn new(trie: &'a PhraseTrie, normalizer: &'a Normalizer, config: &'a SegmentationConfig) -> Self {
        Self { trie, normalizer, config }
    }

    pub fn segment<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<SegmentedCommand> {
        let first_words = self.normalizer.first_words();
        let mut result = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut last_pos = 0;

        for (pos, token) in tokens.iter().enumerate() {
            let token = token.as_ref();
            if first_words.contains(token) {
                if !current.is_empty() {
                    result.push(SegmentedCommand::new(std::mem::take(&mut current)));
                }
                if self.is_slurp(token) {
                    let rest = tokens[pos..].iter().map(|t| t.as_ref().to_string()).collect();
                    result.push(SegmentedCommand::new(rest));
                    break;
                }
                current.push(token.to_string());
                last_pos = pos;
            } else if token == self.config.connector {
                continue;
            } else if let Some(last) = current.last() {
                if self.continues(last, last_pos, token, pos, tokens) {
                    current.push(token.to_string());
                    last_pos = pos;
                } else {
                    trace!(token, "dropped as noise");
                }
            }
        }
        if !current.is_empty() {
            result.push(SegmentedCommand::new(current));
        }

        debug!(segments = ?result.iter().map(|s| s.tokens.join(" ")).collect::<Vec<_>>(), "segmented utterance");
        result
    }

    fn is_slurp(&self, token: &str) -> bool {
        let slurp = &self.config.slurp_rest;
        slurp.contains(token) || slurp.contains(self.normalizer.synonyms().canonical(token))
    }

    /// Whether `token` at `pos` may extend a command whose last word is `last` at `last_pos`.
    fn continues<S: AsRef<str>>(&self, last: &str, last_pos: usize, token: &str, pos: usize, tokens: &[S]) -> bool {
        let skipped = pos - last_pos - 1;
        if skipped > self.config.max_gap {
            return false;
        }

        // Raw words first, canonical forms as a fallback.
        let synonyms = self.normalizer.synonyms();
        let last_labels = [last, synonyms.canonical(last).split_whitespace().last().unwrap_or(last)];
        let token_labels = [token, synonyms.canonical(token).split_whitespace().next().unwrap_or(token)];
        let follows = last_labels.iter().any(|label| {
            let children = self.trie.children_of(label);
            token_labels.iter().any(|t| children.contains(t))
        });
        if !follows {
            return false;
        }

        let first_words = self.normalizer.first_words();
        tokens[last_pos + 1..pos].iter().all(|t| !first_words.contains(t.as_ref()))
    }
}
