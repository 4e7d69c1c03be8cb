// src/core/types.rs
use std::collections::BTreeMap;

/// Opaque key/value set handed to a handler unchanged.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Splits recognized text into word tokens. No case folding or punctuation
/// stripping happens here; upstream must normalize the same way phrases were written.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// One registrable command as supplied by configuration or a plugin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandDefinition {
    pub phrase: Vec<String>,
    pub action: String,
    pub parameters: Parameters,
    pub responses: Vec<String>,
    /// Maps a spoken word to its canonical form.
    pub synonyms: BTreeMap<String, String>,
    /// Alternate full phrasings resolving to the same terminal data.
    pub equivalents: Vec<Vec<String>>,
    /// The action produces its own audio, so no confirmation is spoken for it.
    pub inside_speech: bool,
}

impl CommandDefinition {
    pub fn new<I, S>(phrase: I, action: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrase: phrase.into_iter().map(Into::into).collect(),
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_responses<I, S>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses = responses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_synonym(mut self, synonym: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.synonyms.insert(synonym.into(), canonical.into());
        self
    }

    pub fn with_equivalent<I, S>(mut self, phrase: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.equivalents.push(phrase.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_inside_speech(mut self, inside_speech: bool) -> Self {
        self.inside_speech = inside_speech;
        self
    }

    /// The record stored at the phrase's terminal trie node.
    pub fn terminal(&self) -> TerminalData {
        TerminalData {
            action: self.action.clone(),
            parameters: self.parameters.clone(),
            responses: self.responses.clone(),
            inside_speech: self.inside_speech,
        }
    }

    /// An equivalent registered as a plain alias: same terminal data, no synonyms or equivalents of its own.
    pub(crate) fn alias(&self, phrase: Vec<String>) -> Self {
        Self {
            phrase,
            action: self.action.clone(),
            parameters: self.parameters.clone(),
            responses: self.responses.clone(),
            synonyms: BTreeMap::new(),
            equivalents: Vec::new(),
            inside_speech: self.inside_speech,
        }
    }
}

/// Data carried by a node that terminates a complete phrase.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalData {
    pub action: String,
    pub parameters: Parameters,
    pub responses: Vec<String>,
    pub inside_speech: bool,
}

/// Ordered tokens of one command cut out of an utterance. Not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentedCommand {
    pub tokens: Vec<String>,
}

impl SegmentedCommand {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }
}

impl From<Vec<&str>> for SegmentedCommand {
    fn from(tokens: Vec<&str>) -> Self {
        Self::new(tokens.into_iter().map(str::to_string).collect())
    }
}

/// A segment matched against the trie, ready for the handler boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCommand {
    pub action: String,
    pub parameters: Parameters,
    pub responses: Vec<String>,
    pub inside_speech: bool,
    pub matched_tokens: Vec<String>,
    pub original_request_text: String,
}
