use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::models::{row_id, RuleAnnotations, Session, TokenRow, Utterance, UNKNOWN_CHILD};
use crate::text::{tokens, Language};

/// Configuration for Stage 1 row generation
#[derive(Debug, Clone)]
pub struct RowConfig {
    /// Print the utterance columns on the first token of each utterance only
    pub first_utterance_only: bool,
    /// Fill the `utt_clean` column
    pub include_utt_clean: bool,
    /// Fill lemma, pos and features from the %mor tier
    pub align_mor: bool,
}

impl Default for RowConfig {
    fn default() -> Self {
        Self {
            first_utterance_only: false,
            include_utt_clean: false,
            align_mor: true,
        }
    }
}

/// Result of Stage 1
#[derive(Debug, Default)]
pub struct Stage1Result {
    pub rows: Vec<TokenRow>,
    /// Utterances whose %mor item count equals their token count
    pub mor_aligned: usize,
    /// Utterances with a %mor tier of a different length
    pub mor_mismatched: usize,
    /// Utterances that produced no token at all
    pub empty_utterances: usize,
}

static MOR_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*)\|(.*)$").unwrap());
static MOR_LEMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*?)[-&](.*)$").unwrap());

/// Tag, lemma and features of one %mor item such as `v|vouloir-PRES`
pub fn split_mor_item(item: &str) -> (String, String, String) {
    let Some(caps) = MOR_ITEM.captures(item) else {
        return (item.to_string(), String::new(), String::new());
    };
    let tag = caps[1].to_string();
    match MOR_LEMMA.captures(&caps[2]) {
        Some(lemma) => (tag, lemma[1].to_string(), lemma[2].to_string()),
        None => (tag, caps[2].to_string(), String::new()),
    }
}

/// Demographic columns for rows of one speaker
struct SpeakerColumns {
    child_project: String,
    child_other: &'static str,
    age: String,
    age_days: u32,
}

fn speaker_columns(session: Option<&Session>, speaker: &str) -> SpeakerColumns {
    if let Some(child) = session.and_then(|s| s.child(speaker)) {
        return SpeakerColumns {
            child_project: child.display_name.clone(),
            child_other: "C",
            age: child.age.literal.clone(),
            age_days: child.age.days,
        };
    }
    let reference = session.and_then(Session::reference_child);
    SpeakerColumns {
        child_project: reference
            .map(|c| c.display_name.clone())
            .unwrap_or_else(|| UNKNOWN_CHILD.to_string()),
        child_other: "X",
        age: String::new(),
        age_days: reference.map(|c| c.age.days).unwrap_or(0),
    }
}

/// Execute Stage 1: one row per token of every utterance
pub fn execute_stage1(
    sessions: &[Session],
    utterances: &[Utterance],
    config: &RowConfig,
) -> Stage1Result {
    let mut result = Stage1Result::default();

    for utt in utterances {
        let session = sessions.get(utt.session_index);
        let language = Language::from_code(session.map(|s| s.language.as_str()).unwrap_or(""));
        let words = tokens(&utt.cleaned, language);
        if words.is_empty() {
            result.empty_utterances += 1;
            continue;
        }

        let uid = utt.uid();
        let columns = speaker_columns(session, &utt.speaker);

        let mor_items: Vec<&str> = match (&utt.mor, config.align_mor) {
            (Some(mor), true) => mor.split_whitespace().collect(),
            _ => Vec::new(),
        };
        let annotation = if !config.align_mor || utt.mor.is_none() {
            ""
        } else if mor_items.len() == words.len() {
            result.mor_aligned += 1;
            "YES"
        } else {
            debug!(
                "{}: {} tokens, {} %mor items",
                uid,
                words.len(),
                mor_items.len()
            );
            result.mor_mismatched += 1;
            "NO"
        };

        for (i, word) in words.into_iter().enumerate() {
            let word_number = i + 1;
            let (pos, lemma, features) = mor_items
                .get(i)
                .map(|item| split_mor_item(item))
                .unwrap_or_default();
            let print_utterance = !config.first_utterance_only || word_number == 1;

            result.rows.push(TokenRow {
                row_id: row_id(&uid, word_number),
                uid: uid.clone(),
                session_id: utt.session_id.clone(),
                utterance_number: utt.number,
                word_number,
                speaker: utt.speaker.clone(),
                child_project: columns.child_project.clone(),
                child_other: columns.child_other.to_string(),
                age: columns.age.clone(),
                age_days: columns.age_days,
                time_code: utt.time_code.clone().unwrap_or_default(),
                word,
                lemma,
                pos,
                features,
                annotation: annotation.to_string(),
                utterance: if print_utterance { utt.raw.clone() } else { String::new() },
                utt_clean: if print_utterance && config.include_utt_clean {
                    utt.cleaned.clone()
                } else {
                    String::new()
                },
                utt_tagged: String::new(),
                annotations: RuleAnnotations::default(),
                conllu: None,
                link: None,
            });
        }
    }

    info!(
        "Stage 1: {} rows from {} utterances ({} empty)",
        result.rows.len(),
        utterances.len(),
        result.empty_utterances
    );
    if config.align_mor && result.mor_mismatched > 0 {
        info!(
            "%mor alignment: {} utterances aligned, {} with a different length",
            result.mor_aligned, result.mor_mismatched
        );
    }
    result
}
