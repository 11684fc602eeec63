use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::{TagTable, UNKNOWN_LEMMA};

use super::Language;

/// One entry of the tagger's lexical-gap patch table.
///
/// A token whose form matches `form`, whose lemma equals `when_lemma` and,
/// if given, whose tag equals `when_tag` gets `tag` and `lemma` assigned.
#[derive(Debug, Clone, Copy)]
pub struct LemmaCorrection {
    pub label: &'static str,
    pub form: &'static str,
    pub when_tag: Option<&'static str>,
    pub when_lemma: &'static str,
    pub tag: Option<&'static str>,
    /// `None` copies the wordform into the lemma
    pub lemma: Option<&'static str>,
}

const fn unknown_verb(label: &'static str, form: &'static str, lemma: &'static str) -> LemmaCorrection {
    LemmaCorrection {
        label,
        form,
        when_tag: None,
        when_lemma: UNKNOWN_LEMMA,
        tag: Some("VER"),
        lemma: Some(lemma),
    }
}

/// Corrections for the spoken-French tagger parameters
pub const FRENCH_CORRECTIONS: &[LemmaCorrection] = &[
    LemmaCorrection {
        label: "punctuation",
        form: r"^[,?]$",
        when_tag: Some("NAM"),
        when_lemma: UNKNOWN_LEMMA,
        tag: Some("PON"),
        lemma: None,
    },
    LemmaCorrection {
        label: "Marie",
        form: r"^Marie$",
        when_tag: Some("VER:pres"),
        when_lemma: "marier",
        tag: Some("NAM"),
        lemma: Some("Marie"),
    },
    LemmaCorrection {
        label: "aller",
        form: r"^allez",
        when_tag: None,
        when_lemma: UNKNOWN_LEMMA,
        tag: Some("VER:impe"),
        lemma: Some("aller"),
    },
    unknown_verb("attendre", r"^attend", "attendre"),
    unknown_verb("dire", r"^dis", "dire"),
    unknown_verb("enlever", r"^enl.v.", "enlever"),
    unknown_verb("faire", r"^fai", "faire"),
    unknown_verb("finir", r"^fini", "finir"),
    unknown_verb("prendre", r"^prend", "prendre"),
    unknown_verb("mettre", r"^mett", "mettre"),
    unknown_verb("regarder", r"^regard", "regarder"),
    unknown_verb("tomber", r"^tomb", "tomber"),
    unknown_verb("voir", r"^vu", "voir"),
    LemmaCorrection {
        label: "!",
        form: r"^!",
        when_tag: None,
        when_lemma: UNKNOWN_LEMMA,
        tag: Some("PON"),
        lemma: Some("!"),
    },
];

struct CompiledCorrection {
    rule: LemmaCorrection,
    form: Regex,
}

static FRENCH_COMPILED: LazyLock<Vec<CompiledCorrection>> = LazyLock::new(|| {
    FRENCH_CORRECTIONS
        .iter()
        .map(|rule| CompiledCorrection {
            rule: *rule,
            form: Regex::new(rule.form).unwrap(),
        })
        .collect()
});

/// Counts of applied corrections
#[derive(Debug, Clone, Default)]
pub struct CorrectionReport {
    /// (label, substitutions) in table order
    pub per_label: Vec<(&'static str, usize)>,
    pub total: usize,
    /// Verb tokens still lemmatized as unknown afterwards
    pub remaining_unknown_verbs: usize,
}

fn corrections_for(language: Language) -> &'static [CompiledCorrection] {
    match language {
        Language::French => &FRENCH_COMPILED,
        _ => &[],
    }
}

/// Patch known lexical gaps of the tagger in place
pub fn correct_tagged(table: &mut TagTable, language: Language) -> CorrectionReport {
    let corrections = corrections_for(language);
    let mut counts = vec![0usize; corrections.len()];

    for token in table.iter_tokens_mut() {
        let hit = corrections.iter().position(|c| {
            token.lemma == c.rule.when_lemma
                && c.rule.when_tag.is_none_or(|t| token.tag == t)
                && c.form.is_match(&token.form)
        });
        if let Some(i) = hit {
            let rule = &corrections[i].rule;
            if let Some(tag) = rule.tag {
                token.tag = tag.to_string();
            }
            token.lemma = rule.lemma.map(str::to_string).unwrap_or_else(|| token.form.clone());
            counts[i] += 1;
        }
    }

    let per_label: Vec<(&'static str, usize)> = corrections
        .iter()
        .zip(counts)
        .map(|(c, n)| (c.rule.label, n))
        .collect();
    for (label, n) in &per_label {
        debug!("{} substitutions for: {}", n, label);
    }

    let remaining_unknown_verbs = table
        .iter_tokens()
        .filter(|t| t.tag.starts_with("VER") && t.lemma == UNKNOWN_LEMMA)
        .count();

    CorrectionReport {
        total: per_label.iter().map(|(_, n)| n).sum(),
        per_label,
        remaining_unknown_verbs,
    }
}
