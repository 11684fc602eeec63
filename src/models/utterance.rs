use serde::{Deserialize, Serialize};

/// One speaker turn extracted from a session block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    /// Session id of the header that governs this utterance
    pub session_id: String,
    /// Index into the parsed session list
    pub session_index: usize,
    /// Running utterance number (see session counter rules)
    pub number: u64,
    /// Speaker code without the leading '*'
    pub speaker: String,
    /// Tier text with continuations folded and the time code removed
    pub raw: String,
    /// Output of the utterance cleaner
    pub cleaned: String,
    /// Time alignment code, e.g. "1230_2456"
    pub time_code: Option<String>,
    /// Content of the %mor tier, if present
    pub mor: Option<String>,
    /// 1-based line number where the tier starts in the input
    pub line: usize,
}

impl Utterance {
    /// Utterance id, the prefix of every row id of this utterance
    pub fn uid(&self) -> String {
        format!("{}_u{}", self.session_id, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid() {
        let utt = Utterance {
            session_id: "16447".to_string(),
            session_index: 0,
            number: 12,
            speaker: "CHI".to_string(),
            raw: "bonjour .".to_string(),
            cleaned: "bonjour .".to_string(),
            time_code: None,
            mor: None,
            line: 40,
        };
        assert_eq!(utt.uid(), "16447_u12");
    }
}
