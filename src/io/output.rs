use std::borrow::Cow;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{RuleAnnotations, TokenRow, CONLLU_COLUMNS};

/// Stand-in for double quotes inside link formulas while the table is written
pub const LINK_QUOTE_MARKER: &str = "@@QUOT@@";

/// One column of the output tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    UttId,
    UttNr,
    WordNr,
    Speaker,
    ChildProject,
    ChildOther,
    Age,
    AgeDays,
    TimeCode,
    Word,
    Lemma,
    Pos,
    Features,
    Annotation,
    Utterance,
    UttClean,
    UttTagged,
    /// Index into `RuleAnnotations::COLUMNS`
    Rule(usize),
    /// Index into `CONLLU_COLUMNS`
    Conllu(usize),
    Link,
}

const BASE_COLUMNS: [Column; 16] = [
    Column::Id,
    Column::UttId,
    Column::UttNr,
    Column::WordNr,
    Column::Speaker,
    Column::ChildProject,
    Column::ChildOther,
    Column::Age,
    Column::AgeDays,
    Column::TimeCode,
    Column::Word,
    Column::Lemma,
    Column::Pos,
    Column::Features,
    Column::Annotation,
    Column::Utterance,
];

impl Column {
    pub fn header(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::UttId => "utt_id",
            Column::UttNr => "utt_nr",
            Column::WordNr => "w_nr",
            Column::Speaker => "speaker",
            Column::ChildProject => "child_project",
            Column::ChildOther => "child_other",
            Column::Age => "age",
            Column::AgeDays => "age_days",
            Column::TimeCode => "time_code",
            Column::Word => "word",
            Column::Lemma => "lemma",
            Column::Pos => "pos",
            Column::Features => "features",
            Column::Annotation => "annotation",
            Column::Utterance => "utterance",
            Column::UttClean => "utt_clean",
            Column::UttTagged => "utt_tagged",
            Column::Rule(i) => RuleAnnotations::COLUMNS[*i],
            Column::Conllu(i) => CONLLU_COLUMNS[*i],
            Column::Link => "link",
        }
    }

    /// Resolve a header name back to its column
    pub fn from_header(name: &str) -> Option<Column> {
        BASE_COLUMNS
            .iter()
            .copied()
            .chain([Column::UttClean, Column::UttTagged, Column::Link])
            .chain((0..RuleAnnotations::COLUMNS.len()).map(Column::Rule))
            .chain((0..CONLLU_COLUMNS.len()).map(Column::Conllu))
            .find(|c| c.header() == name)
    }

    pub fn value<'a>(&self, row: &'a TokenRow) -> Cow<'a, str> {
        match self {
            Column::Id => Cow::Borrowed(&row.row_id),
            Column::UttId => Cow::Borrowed(&row.uid),
            Column::UttNr => Cow::Owned(row.utterance_number.to_string()),
            Column::WordNr => Cow::Owned(row.word_number.to_string()),
            Column::Speaker => Cow::Borrowed(&row.speaker),
            Column::ChildProject => Cow::Borrowed(&row.child_project),
            Column::ChildOther => Cow::Borrowed(&row.child_other),
            Column::Age => Cow::Borrowed(&row.age),
            Column::AgeDays => Cow::Owned(row.age_days.to_string()),
            Column::TimeCode => Cow::Borrowed(&row.time_code),
            Column::Word => Cow::Borrowed(&row.word),
            Column::Lemma => Cow::Borrowed(&row.lemma),
            Column::Pos => Cow::Borrowed(&row.pos),
            Column::Features => Cow::Borrowed(&row.features),
            Column::Annotation => Cow::Borrowed(&row.annotation),
            Column::Utterance => Cow::Borrowed(&row.utterance),
            Column::UttClean => Cow::Borrowed(&row.utt_clean),
            Column::UttTagged => Cow::Borrowed(&row.utt_tagged),
            Column::Rule(i) => Cow::Borrowed(row.annotations.values()[*i]),
            Column::Conllu(i) => row
                .conllu
                .as_ref()
                .map(|c| Cow::Borrowed(c.columns[*i].as_str()))
                .unwrap_or(Cow::Borrowed("")),
            Column::Link => row
                .link
                .as_deref()
                .map(|l| Cow::Owned(l.replace('"', LINK_QUOTE_MARKER)))
                .unwrap_or(Cow::Borrowed("")),
        }
    }
}

/// Which optional column groups a table carries
#[derive(Debug, Clone, Copy, Default)]
pub struct TableLayout {
    pub utt_clean: bool,
    pub utt_tagged: bool,
    pub annotations: bool,
    pub conllu: bool,
    pub link: bool,
}

impl TableLayout {
    /// All columns, in a fixed order
    pub fn full_columns(&self) -> Vec<Column> {
        let mut columns = BASE_COLUMNS.to_vec();
        if self.utt_clean {
            columns.push(Column::UttClean);
        }
        if self.utt_tagged {
            columns.push(Column::UttTagged);
        }
        if self.annotations {
            columns.extend((0..RuleAnnotations::COLUMNS.len()).map(Column::Rule));
        }
        if self.conllu {
            columns.extend((0..CONLLU_COLUMNS.len()).map(Column::Conllu));
        }
        if self.link {
            columns.push(Column::Link);
        }
        columns
    }

    /// The reduced column set of the light table
    pub fn light_columns(&self) -> Vec<Column> {
        let mut columns = vec![
            Column::Id,
            Column::Speaker,
            Column::ChildProject,
            Column::ChildOther,
            Column::AgeDays,
            Column::Word,
            Column::Lemma,
            Column::Pos,
        ];
        if self.conllu {
            // UPOS, HEAD, DEPREL
            columns.extend([Column::Conllu(3), Column::Conllu(6), Column::Conllu(7)]);
        }
        if self.annotations {
            columns.extend((0..RuleAnnotations::COLUMNS.len()).map(Column::Rule));
        }
        columns.push(Column::Utterance);
        if self.link {
            columns.push(Column::Link);
        }
        columns
    }
}

/// Quote a field the way a minimal-quoting TSV writer does
fn tsv_field(value: &str) -> Cow<'_, str> {
    if value.contains(['\t', '\n', '\r', '"']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Write rows as a tab-separated table with a header line.
///
/// Link formulas are written with their quotes masked and restored in a
/// second pass over the file, so the field quoting never touches them.
pub fn write_tsv<'a>(
    path: &Path,
    columns: &[Column],
    rows: impl IntoIterator<Item = &'a TokenRow>,
) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    let mut out = BufWriter::new(file);

    let header: Vec<&str> = columns.iter().map(Column::header).collect();
    writeln!(out, "{}", header.join("\t"))?;

    let mut written = 0;
    for row in rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|c| tsv_field(&c.value(row)).into_owned())
            .collect();
        writeln!(out, "{}", fields.join("\t"))?;
        written += 1;
    }
    out.flush().with_context(|| format!("Failed to write file: {:?}", path))?;
    drop(out);

    if columns.contains(&Column::Link) {
        unmask_link_quotes(path)?;
    }
    Ok(written)
}

fn unmask_link_quotes(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {:?}", path))?;
    std::fs::write(path, content.replace(LINK_QUOTE_MARKER, "\""))
        .with_context(|| format!("Failed to write file: {:?}", path))?;
    Ok(())
}

/// Build the link formula for one row from a template with
/// `{uid}` and `{session}` placeholders
pub fn render_link(template: &str, uid: &str, session: &str) -> String {
    template.replace("{uid}", uid).replace("{session}", session)
}

fn misc_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_whitespace() || c == '|' { '_' } else { c })
        .collect()
}

/// Write rows carrying parser output as a CoNLL-U document.
///
/// One sentence per utterance with at least one parsed row, prefixed by
/// `# sent_id`, `# text` and child metadata comments. When `misc` is not
/// empty the MISC column is replaced with `name=value` pairs of those
/// columns. Returns the number of sentences written.
pub fn write_conllu(path: &Path, rows: &[TokenRow], misc: &[Column]) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    let mut out = BufWriter::new(file);
    let mut sentences = 0;

    for utterance in rows.chunk_by(|a, b| a.uid == b.uid) {
        if utterance.iter().all(|r| r.conllu.is_none()) {
            continue;
        }
        let first = &utterance[0];
        let text: Vec<&str> = utterance.iter().map(|r| r.word.as_str()).collect();
        writeln!(out, "# sent_id = {}", first.uid)?;
        writeln!(out, "# text = {}", text.join(" "))?;
        writeln!(out, "# speaker = {}", first.speaker)?;
        writeln!(out, "# child_age = {}", first.age_days)?;
        writeln!(out, "# child_other = {}", first.child_other)?;
        writeln!(out, "# child_project = {}", first.child_project)?;

        for row in utterance {
            let mut columns: Vec<String> = match &row.conllu {
                Some(token) => token.columns.clone(),
                None => {
                    let or_blank = |s: &str| if s.is_empty() { "_".to_string() } else { s.to_string() };
                    let mut cols = vec!["_".to_string(); CONLLU_COLUMNS.len()];
                    cols[1] = row.word.clone();
                    cols[2] = or_blank(&row.lemma);
                    cols[4] = or_blank(&row.pos);
                    cols
                }
            };
            columns[0] = row.word_number.to_string();
            if !misc.is_empty() {
                columns[9] = misc
                    .iter()
                    .map(|c| format!("{}={}", c.header(), misc_value(&c.value(row))))
                    .collect::<Vec<_>>()
                    .join("|");
            }
            writeln!(out, "{}", columns.join("\t"))?;
        }
        writeln!(out)?;
        sentences += 1;
    }

    out.flush().with_context(|| format!("Failed to write file: {:?}", path))?;
    Ok(sentences)
}

/// Tagger figures recorded in the run summary
#[derive(Debug, Clone, Serialize)]
pub struct TaggerSummary {
    pub backend: String,
    pub aligned_utterances: usize,
    pub mismatched_utterances: usize,
    pub blank_cells: usize,
    pub corrections: usize,
    pub remaining_unknown_verbs: usize,
}

/// Parser figures recorded in the run summary
#[derive(Debug, Clone, Serialize)]
pub struct ParserSummary {
    pub service: String,
    pub chunks: usize,
    pub bisected_chunks: usize,
    pub submitted_utterances: usize,
    pub parsed_tokens: usize,
    pub gaps: usize,
}

/// Machine-readable account of one conversion run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub input: PathBuf,
    /// RFC 3339 timestamps
    pub started_at: String,
    pub finished_at: String,
    pub sessions: usize,
    pub dropped_sessions: usize,
    pub utterances: usize,
    pub rows: usize,
    pub light_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagger: Option<TaggerSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser: Option<ParserSummary>,
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConlluToken;

    fn row(uid: &str, n: usize, word: &str) -> TokenRow {
        TokenRow {
            row_id: format!("{}_w{}", uid, n),
            uid: uid.to_string(),
            session_id: "7".to_string(),
            utterance_number: 1,
            word_number: n,
            speaker: "CHI".to_string(),
            child_project: "Tim_Yor".to_string(),
            child_other: "C".to_string(),
            age: "2;01.03".to_string(),
            age_days: 763,
            time_code: String::new(),
            word: word.to_string(),
            lemma: String::new(),
            pos: String::new(),
            features: String::new(),
            annotation: String::new(),
            utterance: String::new(),
            utt_clean: String::new(),
            utt_tagged: String::new(),
            annotations: RuleAnnotations::default(),
            conllu: None,
            link: None,
        }
    }

    #[test]
    fn test_tsv_field_quoting() {
        assert_eq!(tsv_field("plain"), "plain");
        assert_eq!(tsv_field("a\tb"), "\"a\tb\"");
        assert_eq!(tsv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_link_survives_unquoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let mut r = row("7_u1", 1, "oui");
        r.link = Some(render_link(
            r#"=HYPERLINK("https://example.org/{session}#{uid}";"{uid}")"#,
            &r.uid,
            &r.session_id,
        ));

        let columns = [Column::Id, Column::Word, Column::Link];
        let n = write_tsv(&path, &columns, [&r]).unwrap();
        assert_eq!(n, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "id\tword\tlink");
        assert_eq!(
            lines[1],
            "7_u1_w1\toui\t=HYPERLINK(\"https://example.org/7#7_u1\";\"7_u1\")"
        );
    }

    #[test]
    fn test_layout_columns() {
        let layout = TableLayout {
            annotations: true,
            conllu: true,
            ..Default::default()
        };
        let full = layout.full_columns();
        assert_eq!(full.len(), 16 + 5 + 10);
        assert_eq!(full[0].header(), "id");
        assert_eq!(full[16].header(), "annot_refl");
        assert_eq!(full[21].header(), "ID");

        let light: Vec<&str> = layout.light_columns().iter().map(Column::header).collect();
        assert!(light.contains(&"DEPREL"));
        assert!(!light.contains(&"utt_id"));
    }

    #[test]
    fn test_column_from_header() {
        assert_eq!(Column::from_header("age_days"), Some(Column::AgeDays));
        assert_eq!(Column::from_header("annot_mod"), Some(Column::Rule(3)));
        assert_eq!(Column::from_header("DEPREL"), Some(Column::Conllu(7)));
        assert_eq!(Column::from_header("nope"), None);
    }

    #[test]
    fn test_write_conllu_with_metadata_and_misc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.conllu");

        let mut a = row("7_u1", 1, "il");
        a.conllu = Some(ConlluToken::from_columns(&[
            "1", "il", "il", "PRON", "PRO:PER", "_", "2", "nsubj", "_", "_",
        ]));
        let mut b = row("7_u1", 2, "tombe");
        b.conllu = Some(ConlluToken::from_columns(&[
            "2", "tombe", "tomber", "VERB", "VER:pres", "_", "0", "root", "_", "_",
        ]));
        let unparsed = row("7_u2", 1, "oui");

        let sentences = write_conllu(
            &path,
            &[a, b, unparsed],
            &[Column::Speaker, Column::AgeDays],
        )
        .unwrap();
        assert_eq!(sentences, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "# sent_id = 7_u1");
        assert_eq!(lines[1], "# text = il tombe");
        assert_eq!(lines[3], "# child_age = 763");
        assert_eq!(lines[5], "# child_project = Tim_Yor");
        assert_eq!(
            lines[7],
            "2\ttombe\ttomber\tVERB\tVER:pres\t_\t0\troot\t_\tspeaker=CHI|age_days=763"
        );
        assert!(!content.contains("7_u2"));
    }

    #[test]
    fn test_run_summary_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = RunSummary {
            run_id: "r1".to_string(),
            input: PathBuf::from("a.cha"),
            started_at: "2024-01-01T00:00:00+00:00".to_string(),
            finished_at: "2024-01-01T00:00:01+00:00".to_string(),
            sessions: 2,
            dropped_sessions: 0,
            utterances: 10,
            rows: 40,
            light_rows: 12,
            tagger: None,
            parser: None,
            outputs: vec![PathBuf::from("a.tsv")],
        };
        summary.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["rows"], 40);
        assert!(value.get("tagger").is_none());
    }
}
