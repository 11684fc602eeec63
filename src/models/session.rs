use serde::{Deserialize, Serialize};

/// Child name used when a session registers no target child.
pub const UNKNOWN_CHILD: &str = "unknown";

/// An age as written in the transcript plus its normalized day count
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Age {
    /// Literal as it appeared (after corrections), e.g. "1;04.13"
    pub literal: String,
    /// years*365 + months*30.4 + days, truncated
    pub days: u32,
}

/// Demographic record for one target child of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildDemographics {
    /// Speaker code of the child, e.g. "CHI"
    pub speaker: String,
    /// Display name with project suffix, e.g. "Tim_Yor"
    pub display_name: String,
    pub age: Age,
}

/// One recording session parsed from a header block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    /// Persistent identifier with leading zeros stripped
    pub session_id: String,
    /// Language code from @Languages (or the first @ID)
    pub language: String,
    /// Corpus code of the first target child, if any
    pub corpus: String,
    /// Target children in header order
    pub children: Vec<ChildDemographics>,
}

impl Session {
    /// Look up a target child by speaker code
    pub fn child(&self, speaker: &str) -> Option<&ChildDemographics> {
        self.children.iter().find(|c| c.speaker == speaker)
    }

    /// The child whose age annotates rows of other speakers.
    ///
    /// Prefers the conventional "CHI" code, otherwise the first registered child.
    pub fn reference_child(&self) -> Option<&ChildDemographics> {
        self.child("CHI").or_else(|| self.children.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(code: &str, days: u32) -> ChildDemographics {
        ChildDemographics {
            speaker: code.to_string(),
            display_name: format!("{}_Pal", code),
            age: Age {
                literal: String::new(),
                days,
            },
        }
    }

    #[test]
    fn test_reference_child_prefers_chi() {
        let session = Session {
            children: vec![child("ANN", 700), child("CHI", 500)],
            ..Default::default()
        };
        assert_eq!(session.reference_child().unwrap().speaker, "CHI");
    }

    #[test]
    fn test_reference_child_falls_back_to_first() {
        let session = Session {
            children: vec![child("ANN", 700), child("BOB", 500)],
            ..Default::default()
        };
        assert_eq!(session.reference_child().unwrap().speaker, "ANN");
        assert!(Session::default().reference_child().is_none());
    }
}
