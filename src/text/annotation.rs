use std::sync::LazyLock;

use regex::Regex;

use crate::models::RuleAnnotations;

static REFLEXIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" [^_]+_.*?=se [^_]+_VER.*?=(?P<lemma>\w+)").unwrap());
static DATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^_]+_VER.*?=(?P<lemma>\w+) (à|au|aux)_[^ ]+").unwrap());
static MODAL_LEMMAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(devoir|falloir|pouvoir|savoir|vouloir)").unwrap());

/// Lemma-dependent patterns, compiled per call
struct LemmaPatterns {
    dat_clitic: Regex,
    acc_clitic: Regex,
    accdat_clitic: Regex,
    mod_clitic_verb: Regex,
    clitic_mod: Regex,
    mod_object: Regex,
    mod_verb: Regex,
    mod_clause: Regex,
    particle: Regex,
}

impl LemmaPatterns {
    fn compile(lemma: &str) -> Option<Self> {
        let l = regex::escape(lemma);
        let re = |pattern: String| Regex::new(&pattern).ok();
        Some(Self {
            dat_clitic: re(format!(
                r"(lui|leur)_PRO:clo[^ ]+ [^_]+_(VER|AUX).*?=(?P<lemma>{l})"
            ))?,
            acc_clitic: re(format!(
                r"(le|la|les)_PRO:clo[^ ]+ [^_]+_(VER|AUX).*?=(?P<lemma>{l})"
            ))?,
            accdat_clitic: re(format!(
                r"(le|la|les)_PRO:clo[^ ]+ (lui|leur)_PRO:clo[^ ]+ [^_]+_(VER|AUX).*?=(?P<lemma>{l})"
            ))?,
            mod_clitic_verb: re(format!(
                r"[^ _]+_.*?=(?P<lemma>{l})( [^_]+_ADV=\S+)*( [^_]+_PRO:clo=\S+).*? [^_]+_VER:infi=(?P<verb>\S+)"
            ))?,
            clitic_mod: re(format!(
                r"([^ _]+_PRO:clo=\S+) [^_]+_.*?=(?P<lemma>{l})( pas_ADV=pas)?.*? [^_]+_VER:infi=(?P<verb>\S+)"
            ))?,
            mod_object: re(format!(
                r"[^ _]+_[^=]+=(?P<lemma>{l}) [^_]+_(DET:.*?|PRO:rel|PRO:dem)="
            ))?,
            mod_verb: re(format!(
                r"[^ _]+_.*?=(?P<lemma>{l})( [^_]+_ADV=\S+)* [^_]+_(VER|AUX):infi=(?P<verb>\S+)"
            ))?,
            mod_clause: re(format!(
                r"[^ _]+_.*?=(?P<lemma>{l})( [^_]+_ADV=\S+)* [^_]+_(KON|PRO:int)"
            ))?,
            particle: re(format!(
                r"[^ _]+_VER:.*?=(?P<lemma>{l}) (?P<part>(dessus|dessous|dehors|avant|derrière|en-.*)_ADV=\S+)"
            ))?,
        })
    }
}

/// Annotate the token with lemma `lemma` from its tagged utterance.
///
/// `tagged` is the utterance in `word_TAG=lemma` form. The annotation
/// columns are independent of each other; the modal column is always set.
pub fn annotate(tagged: &str, lemma: &str) -> RuleAnnotations {
    let mut annotations = RuleAnnotations::default();

    let captured_lemma = |re: &Regex| {
        re.captures(tagged)
            .and_then(|c| c.name("lemma"))
            .map(|m| m.as_str() == lemma)
            .unwrap_or(false)
    };
    if captured_lemma(&REFLEXIVE) {
        annotations.refl = Some("refl".to_string());
    }
    if captured_lemma(&DATIVE) {
        annotations.dat = Some("aPP".to_string());
    }

    let prefix = if MODAL_LEMMAS.is_match(lemma) { "modal" } else { "verb" };

    let Some(p) = LemmaPatterns::compile(lemma) else {
        annotations.modal = Some(format!("{}-noRule", prefix));
        return annotations;
    };

    // Most specific clitic configuration wins
    if p.accdat_clitic.is_match(tagged) {
        annotations.clit = Some("accdat".to_string());
    } else if p.acc_clitic.is_match(tagged) {
        annotations.clit = Some("acc".to_string());
    } else if p.dat_clitic.is_match(tagged) {
        annotations.clit = Some("dat".to_string());
    }

    let modal = if p.mod_clitic_verb.is_match(tagged) {
        format!("{}-clit-verb", prefix)
    } else if p.clitic_mod.is_match(tagged) {
        format!("clit-{}", prefix)
    } else if p.mod_object.is_match(tagged) {
        format!("{}-obj", prefix)
    } else if p.mod_verb.is_match(tagged) {
        format!("{}-verb", prefix)
    } else if p.mod_clause.is_match(tagged) {
        format!("{}-clause", prefix)
    } else {
        format!("{}-noRule", prefix)
    };
    annotations.modal = Some(modal);

    if let Some(part) = p.particle.captures(tagged).and_then(|c| c.name("part")) {
        annotations.particle = Some(format!("verb-part_{}", part.as_str()));
    }

    annotations
}
