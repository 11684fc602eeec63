use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{ChildDemographics, Session, Utterance};
use crate::text::{clean_utterance, parse_age};

/// How a multi-session file is cut into session blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitStrategy {
    /// A block ends with each `@End` line
    #[default]
    AfterEndMarker,
    /// A block starts with each `@Begin` line
    BeforeBeginMarker,
}

/// Configuration for Stage 0 session parsing
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub split: SplitStrategy,
    /// Drop blocks whose header marks them as placeholders
    pub drop_placeholders: bool,
    /// Where `{stem}.missing-header.txt` goes when a block has no header
    pub artifact_stem: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            split: SplitStrategy::AfterEndMarker,
            drop_placeholders: true,
            artifact_stem: None,
        }
    }
}

/// Result of Stage 0
#[derive(Debug, Default)]
pub struct Stage0Result {
    pub sessions: Vec<Session>,
    pub utterances: Vec<Utterance>,
    /// Placeholder blocks that were skipped
    pub dropped_blocks: usize,
    /// Blocks that reused the previous session's header
    pub headerless_blocks: usize,
}

/// Known header typos, applied to the raw header text
pub const HEADER_CORRECTIONS: &[(&str, &str)] = &[(
    "CHI Target_Child , TAT Tata Babysitter",
    "CHI Anne Target_Child , TAT Tata Babysitter",
)];

static NAME_CORRECTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"[éè]").unwrap(), "e"),
        (Regex::new(r"\bAnn_Yor\b").unwrap(), "Anne_Yor"),
        (Regex::new(r"\b(?:Greg|Gregx|Gregoire)_Cha\b").unwrap(), "Gregoire_Cha"),
    ]
});

static PID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@PID:.*/.*?0*(\d+)").unwrap());
static LANGUAGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^@Languages:\s*(.*)$").unwrap());
static PARTICIPANTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^@Participants:\s*(.*)$").unwrap());
static ID_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^@ID:\s*(.*)$").unwrap());
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^@Comment:.*(?:dummy file|No transcript)").unwrap());
static MAIN_TIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*([A-Za-z0-9]+):\s*(.*)$").unwrap());
static MOR_TIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^%mor:\s*(.*)$").unwrap());
static TIME_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x15(\d+_\d+)\x15").unwrap());
static TIME_CODE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s?\x15[^\x15]*\x15").unwrap());

const TARGET_CHILD: &str = "Target_Child";

/// A line of the input with its 1-based line number
type Line<'a> = (usize, &'a str);

/// Cut the input into session blocks
pub fn split_blocks(text: &str, strategy: SplitStrategy) -> Vec<Vec<Line<'_>>> {
    let mut blocks = Vec::new();
    let mut current: Vec<Line> = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        match strategy {
            SplitStrategy::AfterEndMarker => {
                current.push((i + 1, line));
                if line.starts_with("@End") {
                    blocks.push(std::mem::take(&mut current));
                }
            }
            SplitStrategy::BeforeBeginMarker => {
                if line.starts_with("@Begin") && current.iter().any(|(_, l)| l.starts_with("@Begin")) {
                    blocks.push(std::mem::take(&mut current));
                }
                current.push((i + 1, line));
            }
        }
    }
    if current.iter().any(|(_, l)| !l.trim().is_empty()) {
        blocks.push(current);
    }
    blocks
}

/// Leading run of `@` lines, with continuation lines folded into their line
fn header_lines<'a>(block: &[Line<'a>]) -> (String, usize) {
    let mut header: Vec<String> = Vec::new();
    let mut consumed = 0;

    for (_, line) in block {
        if line.starts_with('@') {
            header.push(line.to_string());
        } else if line.starts_with([' ', '\t']) && !header.is_empty() {
            if let Some(last) = header.last_mut() {
                last.push(' ');
                last.push_str(line.trim());
            }
        } else if !line.trim().is_empty() {
            break;
        }
        consumed += 1;
    }
    (header.join("\n"), consumed)
}

/// `@Participants` entries as (code, name) pairs; the name may be absent
fn participant_names(header: &str) -> Vec<(String, Option<String>)> {
    let Some(caps) = PARTICIPANTS.captures(header) else {
        return Vec::new();
    };
    caps[1]
        .split(',')
        .filter_map(|entry| {
            let parts: Vec<&str> = entry.split_whitespace().collect();
            let code = parts.first()?;
            let name = (parts.len() >= 3).then(|| parts[1..parts.len() - 1].join(" "));
            Some((code.to_string(), name))
        })
        .collect()
}

/// Apply the name-correction table to a display name
pub fn correct_child_name(name: &str) -> String {
    let mut name = name.to_string();
    for (pattern, replacement) in NAME_CORRECTIONS.iter() {
        name = pattern.replace_all(&name, *replacement).into_owned();
    }
    name
}

fn id_field(id: &[String], i: usize) -> String {
    id.get(i).cloned().unwrap_or_default()
}

/// Parse a header block into a session; `None` if it carries no `@PID`
pub fn parse_header(raw_header: &str) -> Option<Session> {
    let mut header = raw_header.to_string();
    for (bad, good) in HEADER_CORRECTIONS {
        header = header.replace(bad, good);
    }

    let session_id = PID.captures(&header)?[1].to_string();

    let ids: Vec<Vec<String>> = ID_LINE
        .captures_iter(&header)
        .map(|c| c[1].split('|').map(|f| f.trim().to_string()).collect())
        .collect();

    let targets: Vec<&Vec<String>> = ids
        .iter()
        .filter(|id| id.get(7).is_some_and(|role| role == TARGET_CHILD))
        .collect();
    let names = participant_names(&header);

    let children = targets
        .iter()
        .map(|id| {
            let code = id_field(id, 2);
            let corpus = id_field(id, 1);
            let name = names
                .iter()
                .find(|(c, _)| *c == code)
                .and_then(|(_, n)| n.clone())
                .unwrap_or_else(|| format!("n={}", targets.len()));
            let project: String = corpus.chars().take(3).collect();
            ChildDemographics {
                speaker: code,
                display_name: correct_child_name(&format!("{}_{}", name, project)),
                age: parse_age(&id_field(id, 3)),
            }
        })
        .collect::<Vec<_>>();

    let language = LANGUAGES
        .captures(&header)
        .map(|c| c[1].trim().to_string())
        .or_else(|| ids.first().map(|id| id_field(id, 0)))
        .unwrap_or_default();
    let corpus = targets
        .first()
        .or(ids.first().as_ref())
        .map(|id| id_field(id, 1))
        .unwrap_or_default();

    Some(Session {
        session_id,
        language,
        corpus,
        children,
    })
}

/// Parsing state across blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    AwaitingHeader,
    HeaderParsed,
    InSession,
}

/// Which tier continuation lines belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Main,
    Mor,
    Ignored,
}

struct PendingUtterance {
    speaker: String,
    text: String,
    mor: Option<String>,
    line: usize,
}

struct SessionReader {
    state: ParseState,
    result: Stage0Result,
    counter: u64,
    /// Last utterance number handed out per session id
    last_numbers: HashMap<String, u64>,
    pending: Option<PendingUtterance>,
    tier: Tier,
}

impl SessionReader {
    fn new() -> Self {
        Self {
            state: ParseState::AwaitingHeader,
            result: Stage0Result::default(),
            counter: 0,
            last_numbers: HashMap::new(),
            pending: None,
            tier: Tier::Ignored,
        }
    }

    fn start_session(&mut self, session: Session) {
        if let Some(previous) = self.result.sessions.last() {
            self.last_numbers
                .insert(previous.session_id.clone(), self.counter);
        }
        let resumed = self.last_numbers.get(&session.session_id).copied();
        let same_id = resumed.is_some();
        self.counter = resumed.unwrap_or(0);
        info!(
            "Session {}: {} target children, language {:?}{}",
            session.session_id,
            session.children.len(),
            session.language,
            if same_id { " (numbering continues)" } else { "" }
        );
        for child in &session.children {
            debug!(
                "  {} = {} age {} ({} days)",
                child.speaker, child.display_name, child.age.literal, child.age.days
            );
        }
        self.result.sessions.push(session);
        self.state = ParseState::HeaderParsed;
    }

    fn flush(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let Some(session) = self.result.sessions.last() else {
            return;
        };

        let time_code = TIME_CODE.captures(&pending.text).map(|c| c[1].to_string());
        let raw = TIME_CODE_SPAN.replace_all(&pending.text, "").trim().to_string();

        self.counter += 1;
        self.result.utterances.push(Utterance {
            session_id: session.session_id.clone(),
            session_index: self.result.sessions.len() - 1,
            number: self.counter,
            speaker: pending.speaker,
            cleaned: clean_utterance(&raw),
            raw,
            time_code,
            mor: pending.mor.map(|m| m.trim().to_string()),
            line: pending.line,
        });
    }

    fn read_line(&mut self, number: usize, line: &str) -> PipelineResult<()> {
        if let Some(caps) = MAIN_TIER.captures(line) {
            self.flush();
            if self.state == ParseState::AwaitingHeader {
                return Err(PipelineError::MissingHeader {
                    line: number,
                    text: line.to_string(),
                    artifact: None,
                });
            }
            self.state = ParseState::InSession;
            self.pending = Some(PendingUtterance {
                speaker: caps[1].to_string(),
                text: caps[2].to_string(),
                mor: None,
                line: number,
            });
            self.tier = Tier::Main;
        } else if let Some(caps) = MOR_TIER.captures(line) {
            self.tier = match self.pending.as_mut() {
                Some(pending) => {
                    pending.mor = Some(caps[1].to_string());
                    Tier::Mor
                }
                None => Tier::Ignored,
            };
        } else if line.starts_with(['%', '@']) {
            self.tier = Tier::Ignored;
        } else if line.starts_with([' ', '\t']) && !line.trim().is_empty() {
            let target = match (self.tier, self.pending.as_mut()) {
                (Tier::Main, Some(p)) => Some(&mut p.text),
                (Tier::Mor, Some(p)) => p.mor.as_mut(),
                _ => None,
            };
            if let Some(text) = target {
                text.push(' ');
                text.push_str(line.trim());
            }
        }
        Ok(())
    }

    fn read_block(&mut self, block: &[Line<'_>], config: &SessionConfig) -> PipelineResult<()> {
        let (header, consumed) = header_lines(block);

        if config.drop_placeholders && PLACEHOLDER.is_match(&header) {
            debug!("Dropping placeholder block at line {}", block[0].0);
            self.result.dropped_blocks += 1;
            return Ok(());
        }

        match parse_header(&header) {
            Some(session) => self.start_session(session),
            None => {
                let has_utterances = block.iter().any(|(_, l)| l.starts_with('*'));
                if has_utterances && self.state != ParseState::AwaitingHeader {
                    let previous = self
                        .result
                        .sessions
                        .last()
                        .map(|s| s.session_id.as_str())
                        .unwrap_or("");
                    warn!(
                        "Block at line {} has no @PID header, keeping session {}",
                        block[0].0, previous
                    );
                    self.result.headerless_blocks += 1;
                }
            }
        }

        for (number, line) in &block[consumed..] {
            self.read_line(*number, line)?;
        }
        self.flush();
        self.tier = Tier::Ignored;
        Ok(())
    }
}

/// `{stem}.missing-header.txt`
pub fn missing_header_path(stem: &Path) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".missing-header.txt");
    PathBuf::from(name)
}

/// Write the block that lacks a header, with its input line numbers
fn write_missing_header_artifact(
    stem: &Path,
    block: &[Line<'_>],
    line: usize,
) -> PipelineResult<PathBuf> {
    let path = missing_header_path(stem);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = format!(
        "# utterance at line {} before any @PID header\n# failed at {}\n",
        line,
        chrono::Utc::now().to_rfc3339()
    );
    for (number, text) in block {
        content.push_str(&format!("{}\t{}\n", number, text));
    }
    std::fs::write(&path, content)?;
    warn!("Block without header written to {:?}", path);
    Ok(path)
}

/// Execute Stage 0: split the transcript into sessions and utterances
pub fn execute_stage0(text: &str, config: &SessionConfig) -> PipelineResult<Stage0Result> {
    let blocks = split_blocks(text, config.split);
    debug!("{} session blocks ({:?})", blocks.len(), config.split);

    let mut reader = SessionReader::new();
    for block in &blocks {
        if block.is_empty() {
            continue;
        }
        match reader.read_block(block, config) {
            Err(PipelineError::MissingHeader { line, text, .. }) => {
                let artifact = match &config.artifact_stem {
                    Some(stem) => Some(write_missing_header_artifact(stem, block, line)?),
                    None => None,
                };
                return Err(PipelineError::MissingHeader {
                    line,
                    text,
                    artifact,
                });
            }
            other => other?,
        }
    }

    let result = reader.result;
    info!(
        "Parsed {} sessions, {} utterances ({} placeholder blocks dropped)",
        result.sessions.len(),
        result.utterances.len(),
        result.dropped_blocks
    );
    Ok(result)
}
