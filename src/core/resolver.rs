// File: src/core/resolver.rs
use crate::core::normalizer::Normalizer;
use crate::core::trie::PhraseTrie;
use crate::core::types::{ResolvedCommand, SegmentedCommand};

/// Resolves segmented commands against the trie. Pure: no handler is looked up or run.
pub struct Resolver<'a> {
    trie: &'a PhraseTrie,
    normalizer: &'a Normalizer,
}

impl<'a> Resolver<'a> {
    pub fn new(trie: &'a PhraseTrie, normalizer: &'a Normalizer) -> Self {
        Self { trie, normalizer }
    }

    /// `None` means the segment names no registered command, including the case
    /// where it only spells a prefix of one.
    pub fn resolve(&self, segment: &SegmentedCommand, utterance: &str) -> Option<ResolvedCommand> {
        let canonical = self.normalizer.normalize(&segment.tokens, self.trie);
        let terminal = self.trie.lookup(&canonical)?;
        Some(ResolvedCommand {
            action: terminal.action.clone(),
            parameters: terminal.parameters.clone(),
            responses: terminal.responses.clone(),
            inside_speech: terminal.inside_speech,
            matched_tokens: segment.tokens.clone(),
            original_request_text: utterance.to_string(),
        })
    }
}
