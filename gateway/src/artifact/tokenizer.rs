//! Word-level tokenizer companion for the sequence classifier.

use std::collections::HashMap;

use serde::Deserialize;

/// Vocabulary exported from the training run's word tokenizer.
///
/// Text normalisation follows the tokenizer the network was trained with:
/// optional lowercasing, every `filters` character replaced by a space, then
/// a split on whitespace.
#[derive(Debug, Clone, Deserialize)]
pub struct WordTokenizer {
    word_index: HashMap<String, u32>,
    /// Only ids below this bound are kept; the rest count as unknown.
    #[serde(default)]
    num_words: Option<usize>,
    #[serde(default)]
    oov_token: Option<String>,
    /// Used for unknown words when `oov_token` is not in the vocabulary.
    #[serde(default = "default_unknown_id")]
    unknown_id: u32,
    #[serde(default = "default_true")]
    lower: bool,
    #[serde(default = "default_filters")]
    filters: String,
}

fn default_unknown_id() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_filters() -> String {
    "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n".to_string()
}

impl WordTokenizer {
    pub fn new(word_index: HashMap<String, u32>) -> Self {
        Self {
            word_index,
            num_words: None,
            oov_token: None,
            unknown_id: default_unknown_id(),
            lower: true,
            filters: default_filters(),
        }
    }

    pub fn check(&self) -> Result<(), String> {
        if self.word_index.values().any(|&id| id == 0) {
            return Err("token id 0 is reserved for padding".to_string());
        }
        if self.unknown_token_id() == 0 {
            return Err("unknown token id must not be the padding id".to_string());
        }
        Ok(())
    }

    /// Id assigned to words outside the (possibly truncated) vocabulary.
    pub fn unknown_token_id(&self) -> u32 {
        self.oov_token
            .as_ref()
            .and_then(|t| self.word_index.get(t))
            .copied()
            .unwrap_or(self.unknown_id)
    }

    /// Largest id `encode` can ever produce.
    pub fn max_token_id(&self) -> u32 {
        let max_known = self
            .word_index
            .values()
            .copied()
            .filter(|&id| self.in_vocabulary(id))
            .max()
            .unwrap_or(0);
        max_known.max(self.unknown_token_id())
    }

    fn in_vocabulary(&self, id: u32) -> bool {
        self.num_words.map_or(true, |n| (id as usize) < n)
    }

    fn words(&self, text: &str) -> Vec<String> {
        let text = if self.lower {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        let cleaned: String = text
            .chars()
            .map(|c| if self.filters.contains(c) { ' ' } else { c })
            .collect();
        cleaned.split_whitespace().map(str::to_string).collect()
    }

    /// Convert text into token ids, one per word.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let unknown = self.unknown_token_id();
        self.words(text)
            .iter()
            .map(|w| match self.word_index.get(w) {
                Some(&id) if self.in_vocabulary(id) => id,
                _ => unknown,
            })
            .collect()
    }
}
