use std::sync::LazyLock;

use regex::Regex;

/// Ordered substitutions stripping CHAT transcription markup.
///
/// Order matters: bracket-scoped codes go first so that the later
/// generic bracket and delimiter rules never see nested content, and
/// in-word markup is removed before placeholder words are matched.
static CLEANING_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // Typographic scope brackets
        (Regex::new(r"‹").unwrap(), "<"),
        (Regex::new(r"›").unwrap(), ">"),
        // Retraced groups: <je t'avais dit> [/]
        (Regex::new(r"<[^<>]*>\s*\[/{1,3}\]").unwrap(), " "),
        // Retraced single words: je [/] je
        (Regex::new(r"\S+\s*\[/{1,3}\]").unwrap(), " "),
        // Error corrections keep the produced form: <va> [% sdi=vais]
        (Regex::new(r"<([^<>]*)>\s*\[%[^\]]*\]").unwrap(), " $1 "),
        // Unintelligible or omitted groups: <xxx yyy> [>]
        (Regex::new(r"<(?:0|www|xxx|yyy)[^<>]*>").unwrap(), " "),
        // Stress
        (Regex::new(r"\[!{1,2}\]").unwrap(), " "),
        (Regex::new(r"[ˈˌ↑↓]").unwrap(), ""),
        // Pauses become commas, the tagger knows those
        (Regex::new(r"\((?:\.{1,3}|\d+(?::\d+)?\.\d*)\)").unwrap(), " , "),
        // Linkers and terminator prefixes: +< +, +//. +"/.
        (Regex::new(r#"\+[/<,^"]*"#).unwrap(), " "),
        // Remaining bracketed codes and comments
        (Regex::new(r"\[[^\]]*\]").unwrap(), " "),
        (Regex::new(r"[<>]").unwrap(), " "),
        // Fillers, fragments and events: &-euh &+fr &=laughs
        (Regex::new(r"&\S*").unwrap(), ""),
        // Special form markers: papa@f mummy@s:eng
        (Regex::new(r"@\S*").unwrap(), ""),
        // In-word pauses, elided material, then lengthening: ba^nane (be)cause bo:nne
        (Regex::new(r"\^").unwrap(), ""),
        (Regex::new(r"\(+([\p{L}:]+)\)+").unwrap(), "$1"),
        (Regex::new(r"(\p{L}):+").unwrap(), "$1"),
        // Compounds and clitic links
        (Regex::new(r"[_=]").unwrap(), " "),
        // Omitted-word prefix: 0faire
        (Regex::new(r"\b0+(\p{L})").unwrap(), "$1"),
        // Unintelligible speech and bare omissions
        (Regex::new(r"\b(?:xxx|yyy|www|0)\b").unwrap(), " "),
        (Regex::new(r"\s+").unwrap(), " "),
    ]
});

/// Strip transcription conventions from a main-tier utterance.
///
/// The result is whitespace-normalized and `clean_utterance` is idempotent.
pub fn clean_utterance(raw: &str) -> String {
    let mut text = raw.to_string();
    for (pattern, replacement) in CLEANING_RULES.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "mais <je t'avais dit que> [/] je t'avais dit que (.) tu es là@f .",
        "qui <va> [% sdi=vais] la raconter .",
        "xxx veux &-euh (be)cause 0faire [: faire] +...",
        "<xxx yyy> [/] le chat_noir [!] +//.",
        "‹ah oui› [>] c' est bo:nne (..) la ba^nane ?",
        "je [/] je [//] tu veux 0 ((ga))teau &=rit +\"/.",
        "0 xxx@f 00lait (1.5) moi_aussi [+ bch] .",
        "  plein   d'espaces\t ici  ",
        "",
        "a^:b",
        "ba^^:nane",
        "(ga):teau (ga:)teau",
    ];

    #[test]
    fn test_retracing_and_pauses() {
        assert_eq!(
            clean_utterance(SAMPLES[0]),
            "mais je t'avais dit que , tu es là ."
        );
    }

    #[test]
    fn test_corrections_keep_content() {
        assert_eq!(clean_utterance(SAMPLES[1]), "qui va la raconter .");
    }

    #[test]
    fn test_placeholders_and_fragments() {
        assert_eq!(clean_utterance(SAMPLES[2]), "veux because faire ...");
        assert_eq!(clean_utterance(SAMPLES[3]), "le chat noir .");
        assert_eq!(clean_utterance(SAMPLES[6]), "lait , moi aussi .");
    }

    #[test]
    fn test_in_word_markup() {
        assert_eq!(
            clean_utterance(SAMPLES[4]),
            "ah oui c' est bonne , la banane ?"
        );
        assert_eq!(clean_utterance(SAMPLES[5]), "tu veux gateau .");
    }

    #[test]
    fn test_whitespace_normalized() {
        assert_eq!(clean_utterance(SAMPLES[7]), "plein d'espaces ici");
        assert_eq!(clean_utterance(SAMPLES[8]), "");
    }

    #[test]
    fn test_pause_before_lengthening() {
        assert_eq!(clean_utterance(SAMPLES[9]), "ab");
        assert_eq!(clean_utterance(SAMPLES[10]), "banane");
        assert_eq!(clean_utterance(SAMPLES[11]), "gateau gateau");
    }

    #[test]
    fn test_idempotent() {
        for sample in SAMPLES {
            let once = clean_utterance(sample);
            assert_eq!(clean_utterance(&once), once, "not idempotent for {:?}", sample);
        }
    }
}
