use std::sync::LazyLock;

use regex::Regex;

/// Language profiles known to the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    French,
    Italian,
    English,
    Generic,
}

impl Language {
    /// Resolve a CHAT/ISO language code; unknown codes fall back to `Generic`.
    ///
    /// `@Languages` values such as "fra, eng" resolve by their first code.
    pub fn from_code(code: &str) -> Self {
        let first = code
            .split([',', ' ', '\t'])
            .find(|c| !c.is_empty())
            .unwrap_or("")
            .to_ascii_lowercase();
        match first.as_str() {
            "fra" | "fre" | "fr" => Language::French,
            "ita" | "it" => Language::Italian,
            "eng" | "en" => Language::English,
            _ => Language::Generic,
        }
    }
}

/// Where a rule inserts whitespace relative to its match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Before,
    After,
    Both,
}

struct SpacingRule {
    pattern: Regex,
    side: Side,
}

impl SpacingRule {
    fn new(pattern: &str, side: Side) -> Self {
        Self {
            pattern: Regex::new(pattern).unwrap(),
            side,
        }
    }

    fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &regex::Captures| match self.side {
                Side::Before => format!(" {}", &caps[0]),
                Side::After => format!("{} ", &caps[0]),
                Side::Both => format!(" {} ", &caps[0]),
            })
            .into_owned()
    }
}

const PUNCTUATION: &str = r#"\.{2,}|…|[.,;:!?()\[\]{}"«»“”]"#;

static GENERIC_RULES: LazyLock<Vec<SpacingRule>> =
    LazyLock::new(|| vec![SpacingRule::new(PUNCTUATION, Side::Both)]);

static FRENCH_RULES: LazyLock<Vec<SpacingRule>> = LazyLock::new(|| {
    vec![
        // Elided articles, pronouns and conjunctions: l'eau qu'il jusqu'ici
        SpacingRule::new(r"(?i)\b(?:jusqu|lorsqu|puisqu|qu|[cdjlmnst])['’]", Side::After),
        // Inverted and imperative clitics: va-t-il dis-moi est-ce
        SpacingRule::new(
            r"-(?:t-(?:elles?|ils?|on)\b|(?:ce|elles?|ils?|je|la|les?|leur|lui|mêmes?|moi|nous|on|toi|tu|vous|en|y|ci|là)\b|[mt]['’])",
            Side::Before,
        ),
        SpacingRule::new(PUNCTUATION, Side::Both),
    ]
});

static ITALIAN_RULES: LazyLock<Vec<SpacingRule>> = LazyLock::new(|| {
    vec![
        // dell'acqua l'altro c'è un'amica
        SpacingRule::new(
            r"(?i)\b(?:dell|nell|all|dall|sull|coll|quest|quell|un|[cdlmnstv])['’]",
            Side::After,
        ),
        SpacingRule::new(PUNCTUATION, Side::Both),
    ]
});

static ENGLISH_RULES: LazyLock<Vec<SpacingRule>> = LazyLock::new(|| {
    vec![
        SpacingRule::new(r"(?i)n['’]t\b", Side::Before),
        SpacingRule::new(r"(?i)['’](?:s|re|ll|ve|d|m)\b", Side::Before),
        SpacingRule::new(PUNCTUATION, Side::Both),
    ]
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn rules_for(language: Language) -> &'static [SpacingRule] {
    match language {
        Language::French => &FRENCH_RULES,
        Language::Italian => &ITALIAN_RULES,
        Language::English => &ENGLISH_RULES,
        Language::Generic => &GENERIC_RULES,
    }
}

/// Space-separate a cleaned utterance into tagger tokens.
///
/// Only whitespace is inserted or normalized; every other character keeps
/// its position relative to the others.
pub fn tokenize(text: &str, language: Language) -> String {
    let mut out = text.to_string();
    for rule in rules_for(language) {
        out = rule.apply(&out);
    }
    WHITESPACE.replace_all(&out, " ").trim().to_string()
}

/// Tokens of `tokenize(text, language)`
pub fn tokens(text: &str, language: Language) -> Vec<String> {
    tokenize(text, language)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::from_code("fra"), Language::French);
        assert_eq!(Language::from_code("FR"), Language::French);
        assert_eq!(Language::from_code("ita, eng"), Language::Italian);
        assert_eq!(Language::from_code("en"), Language::English);
        assert_eq!(Language::from_code("deu"), Language::Generic);
        assert_eq!(Language::from_code(""), Language::Generic);
    }

    #[test]
    fn test_french_elision_and_clitics() {
        assert_eq!(
            tokenize("l'enfant qu'il voit, va-t-il venir?", Language::French),
            "l' enfant qu' il voit , va -t-il venir ?"
        );
        assert_eq!(tokenize("dis-moi jusqu'ici", Language::French), "dis -moi jusqu' ici");
        assert_eq!(tokenize("aujourd'hui", Language::French), "aujourd'hui");
    }

    #[test]
    fn test_italian_elision() {
        assert_eq!(
            tokenize("dell'acqua e un'amica.", Language::Italian),
            "dell' acqua e un' amica ."
        );
    }

    #[test]
    fn test_english_contractions() {
        assert_eq!(tokenize("I don't know, it's mine", Language::English), "I do n't know , it 's mine");
    }

    #[test]
    fn test_generic_fallback() {
        assert_eq!(tokenize("ja, genau...", Language::Generic), "ja , genau ...");
    }

    #[test]
    fn test_content_preserved() {
        let samples = [
            "l'enfant qu'il voit, va-t-il venir?",
            "c'est « bon » (non) ... oui!",
            "I'm gonna say: \"don't\"",
            "  plusieurs   espaces  ",
            "",
        ];
        for language in [Language::French, Language::Italian, Language::English, Language::Generic] {
            for sample in samples {
                let out = tokenize(sample, language);
                assert_eq!(strip_ws(&out), strip_ws(sample), "{:?} {:?}", language, sample);
                assert!(!out.contains("  "));
            }
        }
    }

    #[test]
    fn test_tokens_skip_empty() {
        assert_eq!(tokens("  a  b ", Language::Generic), vec!["a", "b"]);
        assert!(tokens("", Language::Generic).is_empty());
    }
}
