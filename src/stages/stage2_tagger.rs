use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{TagTable, TaggedToken, TokenRow};
use crate::text::{annotate, correct_tagged, CorrectionReport, Language};
use crate::tools::TaggerBackend;

/// Configuration for Stage 2 tagging
#[derive(Debug, Clone, Default)]
pub struct TaggerStageConfig {
    /// Fill the `utt_tagged` column
    pub utt_tagged: bool,
    /// Keep the utterance (and tagged utterance) only on rows whose tag matches
    pub utterance_pos_pattern: Option<String>,
    /// Compute rule annotations for rows whose tag matches
    pub annotate_pattern: Option<String>,
}

/// Counts of the positional merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentReport {
    pub aligned_utterances: usize,
    /// One incident per utterance whose tag count differs from its token count
    pub mismatched_utterances: usize,
    /// Rows left without tag and lemma
    pub blank_cells: usize,
}

/// Result of Stage 2
#[derive(Debug)]
pub struct Stage2Result {
    pub alignment: AlignmentReport,
    pub corrections: CorrectionReport,
    pub job_path: PathBuf,
    pub output_path: PathBuf,
}

static SENTENCE_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<s_([^>]+)>$").unwrap());

pub(crate) fn compile_pattern(pattern: &str) -> PipelineResult<Regex> {
    Regex::new(pattern).map_err(|e| PipelineError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// One `<s_UID> tok tok …` line per utterance
pub fn batch_lines(rows: &[TokenRow]) -> Vec<String> {
    rows.chunk_by(|a, b| a.uid == b.uid)
        .map(|group| {
            let words: Vec<&str> = group.iter().map(|r| r.word.as_str()).collect();
            format!("<s_{}> {}", group[0].uid, words.join(" "))
        })
        .collect()
}

/// Reformat batch lines into the one-token-per-line job the tagger reads
pub fn job_text(lines: &[String]) -> String {
    let mut job = String::new();
    for line in lines {
        for item in line.split(' ').filter(|t| !t.is_empty()) {
            job.push_str(item);
            job.push('\n');
        }
    }
    job
}

/// Re-segment the flat tagger stream by its `<s_UID>` markers.
///
/// Lines before the first marker and other SGML lines are skipped.
pub fn parse_tagger_output(text: &str) -> TagTable {
    let mut table = TagTable::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(caps) = SENTENCE_MARKER.captures(line) {
            table.open(&caps[1]);
            current = Some(caps[1].to_string());
            continue;
        }
        let Some(uid) = current.as_deref() else {
            continue;
        };
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 3 {
            continue;
        }
        table.push(uid, TaggedToken::new(cols[0], cols[1], cols[2]));
    }
    table
}

struct AlignPatterns {
    utterance_pos: Option<Regex>,
    annotate: Option<Regex>,
}

impl AlignPatterns {
    fn compile(config: &TaggerStageConfig) -> PipelineResult<Self> {
        Ok(Self {
            utterance_pos: config.utterance_pos_pattern.as_deref().map(compile_pattern).transpose()?,
            annotate: config.annotate_pattern.as_deref().map(compile_pattern).transpose()?,
        })
    }
}

/// Zip each utterance's tagged tokens onto its rows strictly by position
pub fn align_tags(
    rows: &mut [TokenRow],
    table: &TagTable,
    config: &TaggerStageConfig,
) -> PipelineResult<AlignmentReport> {
    let patterns = AlignPatterns::compile(config)?;
    let mut report = AlignmentReport::default();

    for group in rows.chunk_by_mut(|a, b| a.uid == b.uid) {
        let uid = group[0].uid.clone();
        let tagged = table.get(&uid);

        if tagged.len() == group.len() {
            report.aligned_utterances += 1;
        } else {
            report.mismatched_utterances += 1;
            report.blank_cells += group.len().saturating_sub(tagged.len());
            warn!(
                "{}: tagger returned {} tokens for {} words, leaving unmatched cells blank",
                uid,
                tagged.len(),
                group.len()
            );
        }

        let tagged_string = table.tagged_string(&uid);
        for (i, row) in group.iter_mut().enumerate() {
            match tagged.get(i) {
                Some(token) => {
                    row.pos = token.tag.clone();
                    row.lemma = token.lemma.clone();
                }
                None => {
                    row.pos.clear();
                    row.lemma.clear();
                }
            }
            row.features.clear();

            let pos_matches = patterns
                .utterance_pos
                .as_ref()
                .is_none_or(|re| re.is_match(&row.pos));
            if config.utt_tagged && pos_matches {
                row.utt_tagged = tagged_string.clone();
            }
            if !pos_matches {
                row.utterance.clear();
            }
            if let Some(re) = &patterns.annotate {
                if !row.pos.is_empty() && re.is_match(&row.pos) {
                    row.annotations = annotate(&tagged_string, &row.lemma);
                }
            }
        }
    }

    Ok(report)
}

/// Execute Stage 2: batch-tag all rows and merge tags and lemmas back
pub async fn execute_stage2(
    rows: &mut [TokenRow],
    tagger: &dyn TaggerBackend,
    work_dir: &Path,
    language: Language,
    config: &TaggerStageConfig,
) -> PipelineResult<Stage2Result> {
    let lines = batch_lines(rows);
    let job_path = work_dir.join("tagger-job.txt");
    let output_path = work_dir.join("tagger-output.txt");
    std::fs::write(&job_path, job_text(&lines))?;

    info!(
        "Stage 2: tagging {} utterances with {}",
        lines.len(),
        tagger.name()
    );
    tagger
        .tag(&job_path, &output_path)
        .await
        .map_err(|e| PipelineError::Tagger(format!("{:#}", e)))?;

    let raw = std::fs::read_to_string(&output_path)?;
    let mut table = parse_tagger_output(&raw);
    if table.len() != lines.len() {
        warn!(
            "Tagger output has {} utterance markers, {} were submitted",
            table.len(),
            lines.len()
        );
    }

    let corrections = correct_tagged(&mut table, language);
    info!(
        "Corrected {} tagger lemmas ({} verbs still unknown)",
        corrections.total, corrections.remaining_unknown_verbs
    );

    let alignment = align_tags(rows, &table, config)?;
    info!(
        "Stage 2: {} utterances aligned, {} mismatched, {} blank cells",
        alignment.aligned_utterances, alignment.mismatched_utterances, alignment.blank_cells
    );

    Ok(Stage2Result {
        alignment,
        corrections,
        job_path,
        output_path,
    })
}
