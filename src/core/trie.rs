// --- File: src/core/trie.rs
use crate::core::types::TerminalData;
use std::collections::{BTreeSet, HashMap};

const ROOT: usize = 0;

// --- PhraseTrie: word-level prefix tree over command phrases ---

#[derive(Clone, Debug, Default)]
struct PhraseNode {
    children: HashMap<String, usize>,
    terminal: Option<TerminalData>,
}

/// Arena-backed prefix tree keyed by whole words. Node 0 is the root; detached
/// nodes go on a free list and are reused by later insertions.
#[derive(Clone, Debug)]
pub struct PhraseTrie {
    nodes: Vec<PhraseNode>,
    free: Vec<usize>,
    // Edge label -> number of edges below the root carrying it.
    inner_labels: HashMap<String, usize>,
}

impl Default for PhraseTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl PhraseTrie {
    pub fn new() -> Self {
        Self { nodes: vec![PhraseNode::default()], free: Vec::new(), inner_labels: HashMap::new() }
    }

    fn alloc(&mut self) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = PhraseNode::default();
            idx
        } else {
            self.nodes.push(PhraseNode::default());
            self.nodes.len() - 1
        }
    }

    /// Inserts a phrase, overwriting whatever terminal data the phrase already had.
    /// O(k) complexity where k is the phrase length. An empty phrase is ignored.
    pub fn insert<S: AsRef<str>>(&mut self, tokens: &[S], terminal: TerminalData) {
        if tokens.is_empty() {
            return;
        }
        let mut node_idx = ROOT;
        for token in tokens {
            let token = token.as_ref();
            let next_idx = match self.nodes[node_idx].children.get(token) {
                Some(&id) => id,
                None => {
                    let new_node_id = self.alloc();
                    self.nodes[node_idx].children.insert(token.to_string(), new_node_id);
                    if node_idx != ROOT {
                        *self.inner_labels.entry(token.to_string()).or_insert(0) += 1;
                    }
                    new_node_id
                }
            };
            node_idx = next_idx;
        }
        self.nodes[node_idx].terminal = Some(terminal);
    }

    /// Clears the phrase's terminal data and prunes the chain of nodes left with
    /// neither terminal data nor children. Returns false when nothing was registered.
    pub fn remove<S: AsRef<str>>(&mut self, tokens: &[S]) -> bool {
        let mut node_idx = ROOT;
        let mut path: Vec<(usize, &str)> = Vec::with_capacity(tokens.len());
        for token in tokens {
            let token = token.as_ref();
            match self.nodes[node_idx].children.get(token) {
                Some(&next_idx) => {
                    path.push((node_idx, token));
                    node_idx = next_idx;
                }
                None => return false,
            }
        }
        if path.is_empty() || self.nodes[node_idx].terminal.take().is_none() {
            return false;
        }

        for &(parent_idx, token) in path.iter().rev() {
            let child_idx = self.nodes[parent_idx].children[token];
            let child = &self.nodes[child_idx];
            if child.terminal.is_some() || !child.children.is_empty() {
                break;
            }
            self.nodes[parent_idx].children.remove(token);
            self.free.push(child_idx);
            if parent_idx != ROOT {
                self.forget_inner_label(token);
            }
        }
        true
    }

    /// Longest-match lookup.
    ///
    /// Descends while tokens match. If descent stops on an unmatched token after at
    /// least one match, the node reached so far answers (trailing words such as the
    /// object of a verb are ignored). If every token matched, the final node answers,
    /// which is `None` when the input was only a prefix of some phrase.
    pub fn lookup<S: AsRef<str>>(&self, tokens: &[S]) -> Option<&TerminalData> {
        let mut node_idx = ROOT;
        for token in tokens {
            match self.step(node_idx, token.as_ref()) {
                Some(next_idx) => node_idx = next_idx,
                None => break,
            }
        }
        if node_idx == ROOT {
            return None;
        }
        self.nodes[node_idx].terminal.as_ref()
    }

    /// Labels of the children of every node whose incoming edge is `token`,
    /// anywhere in the tree. Several such nodes are merged by union.
    pub fn children_of(&self, token: &str) -> BTreeSet<&str> {
        let mut result = BTreeSet::new();
        let mut stack = vec![ROOT];
        while let Some(node_idx) = stack.pop() {
            for (label, &child_idx) in &self.nodes[node_idx].children {
                if label == token {
                    result.extend(self.nodes[child_idx].children.keys().map(String::as_str));
                }
                stack.push(child_idx);
            }
        }
        result
    }

    /// Every registered phrase with its terminal data, sorted by phrase.
    pub fn phrases(&self) -> Vec<(Vec<String>, &TerminalData)> {
        let mut found = Vec::new();
        let mut stack: Vec<(usize, Vec<String>)> = vec![(ROOT, Vec::new())];
        while let Some((node_idx, path)) = stack.pop() {
            let node = &self.nodes[node_idx];
            if let Some(terminal) = &node.terminal {
                found.push((path.clone(), terminal));
            }
            for (label, &child_idx) in &node.children {
                let mut child_path = path.clone();
                child_path.push(label.clone());
                stack.push((child_idx, child_path));
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }

    /// Whether some phrase starts with `token`.
    pub fn opens_with(&self, token: &str) -> bool {
        self.nodes[ROOT].children.contains_key(token)
    }

    /// First words of all registered phrases.
    pub fn openers(&self) -> impl Iterator<Item = &str> {
        self.nodes[ROOT].children.keys().map(String::as_str)
    }

    /// Whether `token` labels an edge somewhere below the first word of a phrase.
    pub fn is_inner_label(&self, token: &str) -> bool {
        self.inner_labels.contains_key(token)
    }

    pub(crate) fn root(&self) -> usize {
        ROOT
    }

    pub(crate) fn step(&self, node_idx: usize, label: &str) -> Option<usize> {
        self.nodes[node_idx].children.get(label).copied()
    }

    /// Follows `labels` from `node_idx`; `None` as soon as one edge is missing.
    pub(crate) fn walk<'l>(&self, node_idx: usize, labels: impl IntoIterator<Item = &'l str>) -> Option<usize> {
        labels.into_iter().try_fold(node_idx, |idx, label| self.step(idx, label))
    }

    fn forget_inner_label(&mut self, label: &str) {
        if let Some(count) = self.inner_labels.get_mut(label) {
            *count -= 1;
            if *count == 0 {
                self.inner_labels.remove(label);
            }
        }
    }

    /// Nodes currently attached to the tree, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[ROOT].children.is_empty()
    }
}
