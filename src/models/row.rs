use serde::{Deserialize, Serialize};

use super::ConlluToken;

/// Build the row id for token `index` (1-based) of utterance `uid`
pub fn row_id(uid: &str, index: usize) -> String {
    format!("{}_w{}", uid, index)
}

/// Split a row id into utterance id and 1-based token index
pub fn split_row_id(id: &str) -> Option<(&str, usize)> {
    let (uid, index) = id.rsplit_once("_w")?;
    let index = index.parse().ok()?;
    Some((uid, index))
}

/// Rule-based annotations computed from the tagged utterance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAnnotations {
    pub refl: Option<String>,
    pub dat: Option<String>,
    pub clit: Option<String>,
    pub modal: Option<String>,
    pub particle: Option<String>,
}

impl RuleAnnotations {
    pub const COLUMNS: [&'static str; 5] = [
        "annot_refl",
        "annot_dat",
        "annot_clit",
        "annot_mod",
        "annot_particle",
    ];

    /// Values in `COLUMNS` order, empty where unset
    pub fn values(&self) -> [&str; 5] {
        [
            self.refl.as_deref().unwrap_or(""),
            self.dat.as_deref().unwrap_or(""),
            self.clit.as_deref().unwrap_or(""),
            self.modal.as_deref().unwrap_or(""),
            self.particle.as_deref().unwrap_or(""),
        ]
    }
}

/// One output record: a single token with its metadata and enrichments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRow {
    /// `{uid}_w{word_number}`
    pub row_id: String,
    /// `{session}_u{utterance_number}`
    pub uid: String,
    pub session_id: String,
    pub utterance_number: u64,
    /// 1-based, contiguous within the utterance
    pub word_number: usize,
    pub speaker: String,
    /// Display name of the child this row is attributed to
    pub child_project: String,
    /// "C" when the speaker is a target child, "X" otherwise
    pub child_other: String,
    /// Age literal, only for target-child speakers
    pub age: String,
    /// Age in days of the speaker or of the session's reference child
    pub age_days: u32,
    pub time_code: String,
    pub word: String,
    pub lemma: String,
    pub pos: String,
    pub features: String,
    /// %mor alignment flag ("YES"/"NO") when morphology comes from the transcript
    pub annotation: String,
    pub utterance: String,
    pub utt_clean: String,
    pub utt_tagged: String,
    pub annotations: RuleAnnotations,
    pub conllu: Option<ConlluToken>,
    pub link: Option<String>,
}

impl TokenRow {
    /// Part of speech used for filtering: tagger/%mor tag, else parser UPOS
    pub fn resolved_pos(&self) -> &str {
        if !self.pos.is_empty() {
            return &self.pos;
        }
        self.conllu
            .as_ref()
            .map(|c| c.upos())
            .filter(|upos| *upos != "_")
            .unwrap_or("")
    }
}
