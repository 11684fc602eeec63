use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Lemma the tagger emits for wordforms outside its lexicon
pub const UNKNOWN_LEMMA: &str = "<unknown>";

/// One (form, tag, lemma) triple returned by the tagger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedToken {
    pub form: String,
    pub tag: String,
    pub lemma: String,
}

impl TaggedToken {
    pub fn new(form: impl Into<String>, tag: impl Into<String>, lemma: impl Into<String>) -> Self {
        Self {
            form: form.into(),
            tag: tag.into(),
            lemma: lemma.into(),
        }
    }
}

/// Tagger output grouped by utterance id.
///
/// Lookups of unknown ids yield an empty slice so alignment degrades to
/// blank cells instead of failing.
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    groups: HashMap<String, Vec<TaggedToken>>,
    order: Vec<String>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or reopen) the group for `uid`
    pub fn open(&mut self, uid: &str) {
        if !self.groups.contains_key(uid) {
            self.order.push(uid.to_string());
            self.groups.insert(uid.to_string(), Vec::new());
        }
    }

    pub fn push(&mut self, uid: &str, token: TaggedToken) {
        self.open(uid);
        if let Some(group) = self.groups.get_mut(uid) {
            group.push(token);
        }
    }

    pub fn get(&self, uid: &str) -> &[TaggedToken] {
        self.groups.get(uid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.groups.contains_key(uid)
    }

    /// Utterance ids in the order the tagger returned them
    pub fn uids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The utterance as `word_TAG=lemma` items separated by spaces
    pub fn tagged_string(&self, uid: &str) -> String {
        self.get(uid)
            .iter()
            .map(|t| format!("{}_{}={}", t.form, t.tag, t.lemma))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn iter_tokens(&self) -> impl Iterator<Item = &TaggedToken> {
        self.groups.values().flat_map(|g| g.iter())
    }

    pub fn iter_tokens_mut(&mut self) -> impl Iterator<Item = &mut TaggedToken> {
        self.groups.values_mut().flat_map(|g| g.iter_mut())
    }
}
