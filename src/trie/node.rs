use std::collections::BTreeMap;
use std::path::Path;
use levenshtein_automata::{Distance, LevenshteinAutomatonBuilder, DFA, SINK_STATE};
use serde::{Deserialize, Serialize};
use crate::core::error::Result;
use crate::storage::container::{self, ContainerKind};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct TrieNode {
    children: BTreeMap<char, TrieNode>,
    terminal: bool,
}

/// Persisted prefix tree over one field's tokens.
/// Supports exact, prefix and bounded edit-distance lookup; read-only
/// once loaded.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Trie {
    root: TrieNode,
    token_count: usize,
}

impl Trie {
    pub fn new() -> Self {
        Trie::default()
    }

    pub fn insert(&mut self, token: &str) {
        let mut node = &mut self.root;
        for ch in token.chars() {
            node = node.children.entry(ch).or_default();
        }
        if !node.terminal {
            node.terminal = true;
            self.token_count += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.token_count
    }

    pub fn is_empty(&self) -> bool {
        self.token_count == 0
    }

    /// Cost proportional to token length.
    pub fn has_exact(&self, token: &str) -> bool {
        self.walk(token).map(|node| node.terminal).unwrap_or(false)
    }

    /// Tokens starting with `prefix`, lexicographic, lazily enumerated.
    /// Restartable: calling again yields the same sequence.
    pub fn prefixed<'a>(&'a self, prefix: &str) -> Prefixed<'a> {
        let stack = match self.walk(prefix) {
            Some(node) => vec![(node, prefix.to_string())],
            None => Vec::new(),
        };
        Prefixed { stack }
    }

    /// Tokens within `max_edits` insertions/deletions/substitutions of
    /// `token`, lazily enumerated in lexicographic order. The Levenshtein
    /// DFA is the running edit-distance frontier; a branch whose DFA state
    /// is the sink can never reach a match and is pruned.
    pub fn similar<'a>(&'a self, token: &str, max_edits: u8) -> Similar<'a> {
        let dfa = LevenshteinAutomatonBuilder::new(max_edits, false).build_dfa(token);
        let stack = vec![(&self.root, dfa.initial_state(), String::new())];
        Similar { dfa, max_edits, stack }
    }

    fn walk(&self, token: &str) -> Option<&TrieNode> {
        let mut node = &self.root;
        for ch in token.chars() {
            node = node.children.get(&ch)?;
        }
        Some(node)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = bincode::serialize(self)?;
        container::write_file(path, ContainerKind::Trie, &payload)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let payload = container::read_file(path, ContainerKind::Trie)?;
        Ok(bincode::deserialize(&payload)?)
    }
}

/// Depth-first prefix enumeration with an explicit stack.
pub struct Prefixed<'a> {
    stack: Vec<(&'a TrieNode, String)>,
}

impl<'a> Iterator for Prefixed<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some((node, token)) = self.stack.pop() {
            // Reverse push so the smallest child is popped first.
            for (ch, child) in node.children.iter().rev() {
                let mut extended = token.clone();
                extended.push(*ch);
                self.stack.push((child, extended));
            }
            if node.terminal {
                return Some(token);
            }
        }
        None
    }
}

/// Bounded depth-first fuzzy enumeration driven by a Levenshtein DFA.
pub struct Similar<'a> {
    dfa: DFA,
    max_edits: u8,
    stack: Vec<(&'a TrieNode, u32, String)>,
}

impl<'a> Iterator for Similar<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some((node, state, token)) = self.stack.pop() {
            for (ch, child) in node.children.iter().rev() {
                let mut next_state = state;
                let mut buf = [0u8; 4];
                for &byte in ch.encode_utf8(&mut buf).as_bytes() {
                    next_state = self.dfa.transition(next_state, byte);
                }
                if next_state == SINK_STATE {
                    continue;
                }
                let mut extended = token.clone();
                extended.push(*ch);
                self.stack.push((child, next_state, extended));
            }
            if node.terminal {
                if let Distance::Exact(d) = self.dfa.distance(state) {
                    if d <= self.max_edits {
                        return Some(token);
                    }
                }
            }
        }
        None
    }
}
