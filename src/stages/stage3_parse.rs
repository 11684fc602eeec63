use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{item_marker, parse_item_marker, ConlluTable, ParseChunk, TokenRow};
use crate::tools::ParseService;

use super::stage2_tagger::compile_pattern;

/// Configuration for Stage 3 parsing
#[derive(Debug, Clone)]
pub struct ParseStageConfig {
    /// Utterances per request
    pub chunk_size: usize,
    /// Utterances per request when isolating a failing chunk
    pub mini_chunk_size: usize,
    /// Submit only utterances with at least one row whose tag matches
    pub pos_pattern: Option<String>,
}

impl Default for ParseStageConfig {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            mini_chunk_size: 10,
            pos_pattern: None,
        }
    }
}

/// Counts of the parse stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub chunks: usize,
    /// Chunks that failed whole and were resubmitted as mini-chunks
    pub bisected_chunks: usize,
    pub submitted_utterances: usize,
    pub parsed_tokens: usize,
    /// Rows of submitted utterances without a parse
    pub gaps: usize,
}

/// Serialize one utterance as an `# item_id` block of CoNLL-U records
pub fn serialize_utterance(uid: &str, rows: &[TokenRow]) -> String {
    let mut block = item_marker(uid);
    block.push('\n');
    for row in rows {
        let or_blank = |s: &str| if s.is_empty() { "_".to_string() } else { s.to_string() };
        block.push_str(&format!(
            "{}\t{}\t{}\t_\t{}\t_\t_\t_\t_\t_\n",
            row.word_number,
            row.word,
            or_blank(&row.lemma),
            or_blank(&row.pos)
        ));
    }
    block.push('\n');
    block
}

/// Group the utterances to submit into chunks of `chunk_size`
pub fn build_chunks(rows: &[TokenRow], config: &ParseStageConfig) -> PipelineResult<Vec<ParseChunk>> {
    let filter = config.pos_pattern.as_deref().map(compile_pattern).transpose()?;

    let mut uids = Vec::new();
    let mut blocks = Vec::new();
    for group in rows.chunk_by(|a, b| a.uid == b.uid) {
        if let Some(re) = &filter {
            if !group.iter().any(|r| re.is_match(&r.pos)) {
                continue;
            }
        }
        uids.push(group[0].uid.clone());
        blocks.push(serialize_utterance(&group[0].uid, group));
    }

    let size = config.chunk_size.max(1);
    Ok(uids
        .chunks(size)
        .zip(blocks.chunks(size))
        .enumerate()
        .map(|(index, (uids, blocks))| ParseChunk {
            index,
            uids: uids.to_vec(),
            blocks: blocks.to_vec(),
        })
        .collect())
}

/// Submit one chunk; the error carries the failure reason
async fn submit(service: &dyn ParseService, chunk: &ParseChunk) -> Result<String, String> {
    let result = service
        .parse(&chunk.payload())
        .await
        .map_err(|e| format!("{:#}", e))?;
    if result.trim().is_empty() {
        return Err("empty result".to_string());
    }
    if !result.lines().any(|l| parse_item_marker(l).is_some()) {
        return Err("result without item markers".to_string());
    }
    Ok(result)
}

/// `{stem}.failed-{first_uid}.conllu`
pub fn artifact_path(stem: &Path, first_uid: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(format!(".failed-{}.conllu", first_uid));
    PathBuf::from(name)
}

fn write_artifact(stem: &Path, chunk: &ParseChunk, reason: &str) -> PipelineResult<PathBuf> {
    let path = artifact_path(stem, chunk.first_uid());
    let content = format!(
        "# unparsable utterances {}..{}\n# failed at {}\n# reason: {}\n{}",
        chunk.first_uid(),
        chunk.last_uid(),
        chrono::Utc::now().to_rfc3339(),
        reason.replace('\n', " "),
        chunk.payload()
    );
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Write the artifact for a chunk that cannot be parsed and build the error
fn unparsable(stem: &Path, chunk: &ParseChunk, reason: String) -> PipelineError {
    match write_artifact(stem, chunk, &reason) {
        Ok(artifact) => PipelineError::UnparsableChunk {
            artifact,
            first_uid: chunk.first_uid().to_string(),
            last_uid: chunk.last_uid().to_string(),
            utterances: chunk.len(),
            reason,
        },
        Err(e) => e,
    }
}

/// Resubmit a failed chunk as mini-chunks, aborting at the first one that fails
async fn bisect(
    service: &dyn ParseService,
    chunk: &ParseChunk,
    mini_chunk_size: usize,
    artifact_stem: &Path,
) -> PipelineResult<String> {
    let mut results = String::new();
    for mini in chunk.split(mini_chunk_size) {
        match submit(service, &mini).await {
            Ok(result) => {
                results.push_str(&result);
                if !result.ends_with('\n') {
                    results.push('\n');
                }
            }
            Err(reason) => return Err(unparsable(artifact_stem, &mini, reason)),
        }
    }
    Ok(results)
}

/// Execute Stage 3: parse utterances chunk by chunk and merge the result
/// onto the rows by row id.
pub async fn execute_stage3(
    rows: &mut [TokenRow],
    service: &dyn ParseService,
    work_dir: &Path,
    artifact_stem: &Path,
    config: &ParseStageConfig,
) -> PipelineResult<ParseReport> {
    let chunks = build_chunks(rows, config)?;
    let mut report = ParseReport {
        chunks: chunks.len(),
        submitted_utterances: chunks.iter().map(ParseChunk::len).sum(),
        ..Default::default()
    };
    info!(
        "Stage 3: parsing {} utterances in {} chunks with {}",
        report.submitted_utterances,
        report.chunks,
        service.name()
    );

    let payload: String = chunks.iter().map(ParseChunk::payload).collect();
    std::fs::write(work_dir.join("parse-payload.conllu"), payload)?;

    let mut combined = String::new();
    for chunk in &chunks {
        let result = match submit(service, chunk).await {
            Ok(result) => result,
            Err(reason) if chunk.len() <= config.mini_chunk_size.max(1) => {
                warn!(
                    "Chunk {} ({}..{}) failed: {}",
                    chunk.index,
                    chunk.first_uid(),
                    chunk.last_uid(),
                    reason
                );
                return Err(unparsable(artifact_stem, chunk, reason));
            }
            Err(reason) => {
                warn!(
                    "Chunk {} ({}..{}) failed: {}; resubmitting in mini-chunks of {}",
                    chunk.index,
                    chunk.first_uid(),
                    chunk.last_uid(),
                    reason,
                    config.mini_chunk_size
                );
                report.bisected_chunks += 1;
                bisect(service, chunk, config.mini_chunk_size, artifact_stem).await?
            }
        };
        combined.push_str(&result);
        if !combined.ends_with('\n') {
            combined.push('\n');
        }
        info!("Chunk {}/{} parsed", chunk.index + 1, report.chunks);
    }
    std::fs::write(work_dir.join("parse-result.conllu"), &combined)?;

    let table = ConlluTable::parse(&combined);
    report.parsed_tokens = table.token_count();

    let submitted: std::collections::HashSet<&str> =
        chunks.iter().flat_map(|c| c.uids.iter().map(String::as_str)).collect();
    for row in rows.iter_mut() {
        match table.get(&row.row_id) {
            Some(token) => row.conllu = Some(token.clone()),
            None if submitted.contains(row.uid.as_str()) => report.gaps += 1,
            None => {}
        }
    }
    if report.gaps > 0 {
        warn!("{} submitted rows have no parse", report.gaps);
    }
    info!(
        "Stage 3: {} tokens parsed, {} chunks bisected",
        report.parsed_tokens, report.bisected_chunks
    );

    Ok(report)
}
