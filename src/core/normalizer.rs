// File: src/core/normalizer.rs
use crate::core::trie::PhraseTrie;
use crate::core::types::CommandDefinition;
use crate::error::EngineError;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Observer called with the normalized phrase and its definition before every insertion.
/// An `Err` is logged and otherwise ignored.
pub type RegistrationHook = Box<dyn Fn(&[String], &CommandDefinition) -> anyhow::Result<()> + Send + Sync>;

/// Every synonym seen so far, word to canonical word. Only consulted for spoken
/// input, as a fallback when a word has no edge of its own. Resolution is a single hop.
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    map: HashMap<String, String>,
}

impl SynonymTable {
    pub fn insert(&mut self, synonym: impl Into<String>, canonical: impl Into<String>) {
        self.map.insert(synonym.into(), canonical.into());
    }

    pub fn canonical<'a>(&'a self, word: &'a str) -> &'a str {
        self.map.get(word).map(String::as_str).unwrap_or(word)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(s, c)| (s.as_str(), c.as_str()))
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Splits multi-word tokens, substitutes `synonyms`, then splits again so that a
/// multi-word canonical form lands as separate tokens.
pub fn expand_phrase<S: AsRef<str>>(words: &[S], synonyms: &BTreeMap<String, String>) -> Vec<String> {
    words
        .iter()
        .flat_map(|w| w.as_ref().split_whitespace())
        .flat_map(move |w| synonyms.get(w).map(String::as_str).unwrap_or(w).split_whitespace())
        .map(str::to_string)
        .collect()
}

/// Words that may open a command. Rebuilt from the trie after every change: the
/// first word of each phrase, plus each synonym whose canonical form opens a
/// phrase, unless that synonym is already a later word of some phrase.
#[derive(Debug, Clone, Default)]
pub struct FirstWordSet {
    words: HashSet<String>,
}

impl FirstWordSet {
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Turns command definitions into trie insertions, and spoken tokens into the
/// labels the trie stores.
#[derive(Default)]
pub struct Normalizer {
    synonyms: SynonymTable,
    first_words: FirstWordSet,
    hooks: Vec<(String, RegistrationHook)>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    pub fn first_words(&self) -> &FirstWordSet {
        &self.first_words
    }

    pub fn add_hook<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&[String], &CommandDefinition) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.push((name.into(), Box::new(hook)));
    }

    /// Trie paths of a definition: its phrase, then each equivalent, all rewritten
    /// with the definition's own synonyms. Fails if any of them ends up with no words.
    pub fn stored_phrases(definition: &CommandDefinition) -> Result<Vec<Vec<String>>, EngineError> {
        std::iter::once(&definition.phrase)
            .chain(&definition.equivalents)
            .map(|raw| {
                let phrase = expand_phrase(raw.as_slice(), &definition.synonyms);
                if phrase.is_empty() {
                    let reason = if raw.iter().all(|t| t.trim().is_empty()) {
                        "phrase has no words"
                    } else {
                        "phrase has no words left after synonym substitution"
                    };
                    return Err(EngineError::Validation {
                        action: definition.action.clone(),
                        reason: reason.to_string(),
                    });
                }
                Ok(phrase)
            })
            .collect()
    }

    /// Validates, normalizes and inserts a definition together with its equivalents.
    /// Returns the number of phrases written to the trie. Nothing is registered
    /// when validation fails.
    pub fn register(&mut self, definition: &CommandDefinition, trie: &mut PhraseTrie) -> Result<usize, EngineError> {
        let phrases = Self::stored_phrases(definition)?;

        for (synonym, canonical) in &definition.synonyms {
            self.synonyms.insert(synonym.clone(), canonical.clone());
        }

        let mut inserted = 0;
        for (i, phrase) in phrases.iter().enumerate() {
            match i {
                0 => self.run_hooks(phrase, definition),
                _ => self.run_hooks(phrase, &definition.alias(definition.equivalents[i - 1].clone())),
            }
            trie.insert(phrase, definition.terminal());
            inserted += 1;
            debug!(phrase = %phrase.join(" "), action = %definition.action, "registered command");
        }
        self.sync_first_words(trie);
        Ok(inserted)
    }

    /// Maps spoken tokens onto the labels stored in `trie`. A token follows its own
    /// edge when there is one, and its canonical form otherwise. Once the walk
    /// leaves the trie the remaining tokens are only substituted.
    pub fn normalize<S: AsRef<str>>(&self, tokens: &[S], trie: &PhraseTrie) -> Vec<String> {
        let mut path = Vec::with_capacity(tokens.len());
        let mut node = Some(trie.root());
        for token in tokens.iter().flat_map(|t| t.as_ref().split_whitespace()) {
            let canonical = self.synonyms.canonical(token);
            if let Some(current) = node {
                if let Some(next) = trie.step(current, token) {
                    path.push(token.to_string());
                    node = Some(next);
                    continue;
                }
                node = trie.walk(current, canonical.split_whitespace());
            }
            path.extend(canonical.split_whitespace().map(str::to_string));
        }
        path
    }

    /// Recomputes the first-word set from the current trie.
    pub fn sync_first_words(&mut self, trie: &PhraseTrie) {
        let mut words: HashSet<String> = trie.openers().map(str::to_string).collect();
        for (synonym, canonical) in self.synonyms.iter() {
            let opens = canonical.split_whitespace().next().is_some_and(|w| trie.opens_with(w));
            if opens && !trie.is_inner_label(synonym) {
                words.insert(synonym.to_string());
            }
        }
        self.first_words = FirstWordSet { words };
    }

    fn run_hooks(&self, phrase: &[String], definition: &CommandDefinition) {
        for (name, hook) in &self.hooks {
            if let Err(err) = hook(phrase, definition) {
                warn!(hook = %name, error = %err, "registration hook failed, continuing");
            }
        }
    }
}
