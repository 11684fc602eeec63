use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::row_id;

pub const CONLLU_COLUMNS: [&str; 10] = [
    "ID", "FORM", "LEMMA", "UPOS", "XPOS", "FEATS", "HEAD", "DEPREL", "DEPS", "MISC",
];

const ITEM_PREFIX: &str = "# item_id = ";

/// Comment line that opens the records of one utterance
pub fn item_marker(uid: &str) -> String {
    format!("{}{}", ITEM_PREFIX, uid)
}

/// Utterance id carried by an item marker line, if it is one
pub fn parse_item_marker(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix(ITEM_PREFIX)
        .and_then(|rest| rest.split_whitespace().next())
}

/// The ten columns of one CoNLL-U word line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConlluToken {
    pub columns: Vec<String>,
}

impl ConlluToken {
    /// Build from split columns, padding missing ones with "_"
    pub fn from_columns(columns: &[&str]) -> Self {
        let mut columns: Vec<String> = columns.iter().take(10).map(|c| c.to_string()).collect();
        columns.resize(10, "_".to_string());
        Self { columns }
    }

    pub fn upos(&self) -> &str {
        &self.columns[3]
    }

    pub fn head(&self) -> &str {
        &self.columns[6]
    }

    pub fn deprel(&self) -> &str {
        &self.columns[7]
    }
}

/// Parser output keyed by row id (`{uid}_w{index}`)
#[derive(Debug, Clone, Default)]
pub struct ConlluTable {
    tokens: HashMap<String, ConlluToken>,
    uids: Vec<String>,
}

impl ConlluTable {
    /// Parse CoNLL-U text grouped by `# item_id` comments.
    ///
    /// Word lines before the first marker, multiword ranges and empty nodes
    /// are ignored.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();
        let mut current: Option<String> = None;

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.starts_with('#') {
                if let Some(uid) = parse_item_marker(line) {
                    table.uids.push(uid.to_string());
                    current = Some(uid.to_string());
                }
                continue;
            }
            let Some(uid) = current.as_deref() else {
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 2 {
                continue;
            }
            let Ok(index) = cols[0].parse::<usize>() else {
                continue;
            };
            table
                .tokens
                .insert(row_id(uid, index), ConlluToken::from_columns(&cols));
        }

        table
    }

    pub fn get(&self, row_id: &str) -> Option<&ConlluToken> {
        self.tokens.get(row_id)
    }

    /// Utterance ids in the order their markers appeared
    pub fn uids(&self) -> &[String] {
        &self.uids
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A bounded group of utterances submitted to the parser in one request
#[derive(Debug, Clone)]
pub struct ParseChunk {
    /// Position of the chunk in submission order
    pub index: usize,
    /// Utterance ids in the chunk, in order
    pub uids: Vec<String>,
    /// One serialized block per utterance, each ending with a blank line
    pub blocks: Vec<String>,
}

impl ParseChunk {
    pub fn payload(&self) -> String {
        self.blocks.concat()
    }

    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    pub fn first_uid(&self) -> &str {
        self.uids.first().map(String::as_str).unwrap_or("")
    }

    pub fn last_uid(&self) -> &str {
        self.uids.last().map(String::as_str).unwrap_or("")
    }

    /// Split into consecutive sub-chunks of at most `size` utterances
    pub fn split(&self, size: usize) -> Vec<ParseChunk> {
        let size = size.max(1);
        self.uids
            .chunks(size)
            .zip(self.blocks.chunks(size))
            .enumerate()
            .map(|(i, (uids, blocks))| ParseChunk {
                index: i,
                uids: uids.to_vec(),
                blocks: blocks.to_vec(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# item_id = 7_u1\n\
1\til\til\tPRON\tPRO:PER\t_\t2\tnsubj\t_\t_\n\
2\ttombe\ttomber\tVERB\tVER:pres\t_\t0\troot\t_\t_\n\
\n\
# item_id = 7_u2\n\
# text = oui\n\
1-2\tdu\t_\t_\t_\t_\t_\t_\t_\t_\n\
1\toui\toui\tINTJ\tADV\t_\t0\troot\t_\t_\n\n";

    #[test]
    fn test_parse_keys_rows_by_item_and_index() {
        let table = ConlluTable::parse(SAMPLE);
        assert_eq!(table.token_count(), 3);
        assert_eq!(table.uids(), &["7_u1".to_string(), "7_u2".to_string()]);
        let tombe = table.get("7_u1_w2").unwrap();
        assert_eq!(tombe.upos(), "VERB");
        assert_eq!(tombe.head(), "0");
        assert_eq!(tombe.deprel(), "root");
        assert_eq!(table.get("7_u2_w1").unwrap().columns[1], "oui");
        assert!(table.get("7_u2_w2").is_none());
    }

    #[test]
    fn test_short_lines_are_padded() {
        let table = ConlluTable::parse("# item_id = 1_u1\n1\tbonjour\n");
        let token = table.get("1_u1_w1").unwrap();
        assert_eq!(token.columns.len(), 10);
        assert_eq!(token.deprel(), "_");
    }

    #[test]
    fn test_chunk_split() {
        let chunk = ParseChunk {
            index: 0,
            uids: (1..=25).map(|i| format!("1_u{}", i)).collect(),
            blocks: (1..=25).map(|i| format!("# item_id = 1_u{}\n\n", i)).collect(),
        };
        let minis = chunk.split(10);
        assert_eq!(minis.iter().map(ParseChunk::len).collect::<Vec<_>>(), vec![10, 10, 5]);
        assert_eq!(minis[2].first_uid(), "1_u21");
        assert_eq!(minis[2].last_uid(), "1_u25");
    }

    #[test]
    fn test_item_marker() {
        assert_eq!(parse_item_marker(&item_marker("3_u9")), Some("3_u9"));
        assert_eq!(parse_item_marker("# sent_id = 3"), None);
    }
}
