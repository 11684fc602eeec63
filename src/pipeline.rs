use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::error::PipelineResult;
use crate::io::{read_transcript, ParserSummary, RunSummary, TaggerSummary};
use crate::models::{Session, TokenRow, Utterance};
use crate::stages::{
    execute_stage0, execute_stage1, execute_stage2, execute_stage3, execute_stage4,
    AssembleConfig, ParseStageConfig, RowConfig, SessionConfig, TaggerStageConfig,
};
use crate::text::Language;
use crate::tools::{ParseService, TaggerBackend};

/// Configuration of a whole conversion run
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub sessions: SessionConfig,
    pub rows: RowConfig,
    pub tagger: TaggerStageConfig,
    pub parse: ParseStageConfig,
    pub assemble: AssembleConfig,
}

/// One conversion run: configuration, external tools, the parsed transcript
/// and a working directory that is removed when the pipeline is dropped.
pub struct Pipeline {
    config: PipelineConfig,
    tagger: Option<Box<dyn TaggerBackend>>,
    parser: Option<Box<dyn ParseService>>,
    work_dir: TempDir,
    run_id: Uuid,
    sessions: Vec<Session>,
    utterances: Vec<Utterance>,
    rows: Vec<TokenRow>,
    dropped_sessions: usize,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let work_dir = tempfile::Builder::new()
            .prefix("chat2rows-")
            .tempdir()
            .context("Failed to create working directory")?;
        Ok(Self {
            config,
            tagger: None,
            parser: None,
            work_dir,
            run_id: Uuid::new_v4(),
            sessions: Vec::new(),
            utterances: Vec::new(),
            rows: Vec::new(),
            dropped_sessions: 0,
        })
    }

    pub fn with_tagger(mut self, tagger: Box<dyn TaggerBackend>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    pub fn with_parser(mut self, parser: Box<dyn ParseService>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    pub fn rows(&self) -> &[TokenRow] {
        &self.rows
    }

    /// Parse sessions and utterances from transcript text and build the rows.
    ///
    /// Creates the output directory, which also receives diagnostic artifacts.
    pub fn load(&mut self, text: &str) -> PipelineResult<()> {
        std::fs::create_dir_all(&self.config.assemble.output_dir)?;
        let session_config = SessionConfig {
            artifact_stem: Some(self.config.assemble.stem()),
            ..self.config.sessions.clone()
        };
        let stage0 = execute_stage0(text, &session_config)?;
        let row_config = RowConfig {
            align_mor: self.config.rows.align_mor && self.tagger.is_none(),
            ..self.config.rows.clone()
        };
        let stage1 = execute_stage1(&stage0.sessions, &stage0.utterances, &row_config);

        self.sessions = stage0.sessions;
        self.utterances = stage0.utterances;
        self.dropped_sessions = stage0.dropped_blocks;
        self.rows = stage1.rows;
        Ok(())
    }

    /// Language of the file, taken from its first session
    fn language(&self) -> Language {
        Language::from_code(self.sessions.first().map(|s| s.language.as_str()).unwrap_or(""))
    }

    /// Run the configured tagger over all rows
    pub async fn tag(&mut self) -> PipelineResult<Option<TaggerSummary>> {
        let Some(tagger) = self.tagger.as_deref() else {
            return Ok(None);
        };
        let language = self.language();
        let result = execute_stage2(
            &mut self.rows,
            tagger,
            self.work_dir.path(),
            language,
            &self.config.tagger,
        )
        .await?;
        Ok(Some(TaggerSummary {
            backend: tagger.name().to_string(),
            aligned_utterances: result.alignment.aligned_utterances,
            mismatched_utterances: result.alignment.mismatched_utterances,
            blank_cells: result.alignment.blank_cells,
            corrections: result.corrections.total,
            remaining_unknown_verbs: result.corrections.remaining_unknown_verbs,
        }))
    }

    /// Run the configured dependency parser over all rows
    pub async fn parse(&mut self) -> PipelineResult<Option<ParserSummary>> {
        let Some(parser) = self.parser.as_deref() else {
            return Ok(None);
        };
        let report = execute_stage3(
            &mut self.rows,
            parser,
            self.work_dir.path(),
            &self.config.assemble.stem(),
            &self.config.parse,
        )
        .await?;
        Ok(Some(ParserSummary {
            service: parser.name().to_string(),
            chunks: report.chunks,
            bisected_chunks: report.bisected_chunks,
            submitted_utterances: report.submitted_utterances,
            parsed_tokens: report.parsed_tokens,
            gaps: report.gaps,
        }))
    }

    /// Convert one transcript file and write all outputs
    pub async fn run(&mut self, input: &Path) -> Result<RunSummary> {
        let span = info_span!("run", run_id = %self.run_id);
        self.run_inner(input).instrument(span).await
    }

    async fn run_inner(&mut self, input: &Path) -> Result<RunSummary> {
        let started_at = chrono::Utc::now();
        info!("Converting {:?}", input);

        let text = read_transcript(input)?;
        self.load(&text)?;

        let tagger = self.tag().await?;
        let parser = self.parse().await?;

        let mut assemble = self.config.assemble.clone();
        assemble.layout.utt_clean = self.config.rows.include_utt_clean;
        assemble.layout.utt_tagged = tagger.is_some() && self.config.tagger.utt_tagged;
        assemble.layout.annotations =
            tagger.is_some() && self.config.tagger.annotate_pattern.is_some();
        assemble.layout.conllu = parser.is_some();
        if parser.is_none() && assemble.write_conllu {
            info!("No parser configured, skipping CoNLL-U output");
            assemble.write_conllu = false;
        }
        let stage4 = execute_stage4(&mut self.rows, &assemble)?;

        let summary_path: PathBuf = assemble.output_path(".summary.json");
        let mut outputs = stage4.outputs;
        outputs.push(summary_path.clone());

        let summary = RunSummary {
            run_id: self.run_id.to_string(),
            input: input.to_path_buf(),
            started_at: started_at.to_rfc3339(),
            finished_at: chrono::Utc::now().to_rfc3339(),
            sessions: self.sessions.len(),
            dropped_sessions: self.dropped_sessions,
            utterances: self.utterances.len(),
            rows: stage4.rows,
            light_rows: stage4.light_rows,
            tagger,
            parser,
            outputs,
        };
        summary.write_json(&summary_path)?;
        info!(
            "Complete: {} sessions, {} utterances, {} rows",
            summary.sessions, summary.utterances, summary.rows
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::stages::stage2_tagger::tests::FakeTagger;
    use crate::stages::stage3_parse::tests::FakeParser;

    const TRANSCRIPT: &str = "@UTF8\n\
@Begin\n\
@Languages:\tfra\n\
@Participants:\tCHI Tim Target_Child , MOT Mother Mother\n\
@ID:\tfra|York|CHI|1;04.13|male|||Target_Child|||\n\
@PID:\t11312/a-00016447-1\n\
*CHI:\til se lave .\n\
%mor:\tpro|il pro|se v|laver .\n\
*MOT:\tallez [/] allez !\n\
@End\n\
@Begin\n\
@Languages:\tfra\n\
@Participants:\tCHI Tim Target_Child\n\
@ID:\tfra|York|CHI|1;05.02|male|||Target_Child|||\n\
@PID:\t11312/a-00016448-1\n\
*CHI:\tgâteau .\n\
@End\n";

    fn write_input(dir: &Path) -> PathBuf {
        let path = dir.join("tim.cha");
        std::fs::write(&path, TRANSCRIPT).unwrap();
        path
    }

    fn config(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            assemble: AssembleConfig {
                output_dir: dir.to_path_buf(),
                prefix: "tim".to_string(),
                write_conllu: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_without_tools_uses_mor() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let mut pipeline = Pipeline::new(config(dir.path())).unwrap();
        let summary = pipeline.run(&input).await.unwrap();

        assert_eq!(summary.sessions, 2);
        assert_eq!(summary.utterances, 3);
        assert_eq!(summary.rows, 8);
        assert!(summary.tagger.is_none());
        // no parser: only tables and summary
        assert_eq!(summary.outputs.len(), 3);
        assert_eq!(pipeline.rows()[2].lemma, "laver");
        assert_eq!(pipeline.rows()[0].annotation, "YES");
        assert_eq!(pipeline.rows()[7].uid, "16448_u1");

        let json = std::fs::read_to_string(dir.path().join("tim.summary.json")).unwrap();
        assert!(json.contains(&summary.run_id));
    }

    #[tokio::test]
    async fn test_run_with_tagger_and_parser() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let mut config = config(dir.path());
        config.tagger.utt_tagged = true;
        config.tagger.annotate_pattern = Some("^VER".to_string());
        config.assemble.light_pattern = Some("^VER".to_string());

        let mut pipeline = Pipeline::new(config)
            .unwrap()
            .with_tagger(Box::new(FakeTagger { truncate: None }))
            .with_parser(Box::new(FakeParser::default()));
        let work_dir = pipeline.work_dir().to_path_buf();
        let summary = pipeline.run(&input).await.unwrap();

        let tagger = summary.tagger.as_ref().unwrap();
        assert_eq!(tagger.aligned_utterances, 3);
        assert_eq!(tagger.corrections, 1);
        assert_eq!(summary.parser.as_ref().unwrap().parsed_tokens, 8);
        assert_eq!(summary.outputs.len(), 4);

        let rows = pipeline.rows();
        // %mor is ignored once a tagger runs
        assert_eq!(rows[0].annotation, "");
        assert_eq!(rows[2].annotations.refl.as_deref(), Some("refl"));
        assert_eq!(rows[4].lemma, "aller");
        assert!(rows.iter().all(|r| r.conllu.is_some()));

        // lave and the corrected allez
        assert_eq!(summary.light_rows, 2);
        let full = std::fs::read_to_string(dir.path().join("tim.tsv")).unwrap();
        assert!(full.lines().next().unwrap().ends_with("\tannot_particle\tID\tFORM\tLEMMA\tUPOS\tXPOS\tFEATS\tHEAD\tDEPREL\tDEPS\tMISC"));

        drop(pipeline);
        assert!(!work_dir.exists());
    }

    #[tokio::test]
    async fn test_unparsable_chunk_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let mut pipeline = Pipeline::new(config(dir.path()))
            .unwrap()
            .with_parser(Box::new(FakeParser {
                reject: Some("16448_u1".to_string()),
                ..Default::default()
            }));
        let work_dir = pipeline.work_dir().to_path_buf();
        let err = pipeline.run(&input).await.unwrap_err();

        let err = err.downcast::<PipelineError>().unwrap();
        assert!(matches!(err, PipelineError::UnparsableChunk { ref first_uid, .. } if first_uid == "16447_u1"));
        assert!(dir.path().join("tim.failed-16447_u1.conllu").exists());
        assert!(!dir.path().join("tim.tsv").exists());

        // the working directory goes away on the error path too
        assert!(work_dir.exists());
        drop(pipeline);
        assert!(!work_dir.exists());
    }

    #[tokio::test]
    async fn test_artifact_lands_in_new_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let out = dir.path().join("runs").join("tim");
        let mut pipeline = Pipeline::new(config(&out))
            .unwrap()
            .with_parser(Box::new(FakeParser {
                reject: Some("16447_u2".to_string()),
                ..Default::default()
            }));
        let err = pipeline.run(&input).await.unwrap_err();

        let err = err.downcast::<PipelineError>().unwrap();
        let PipelineError::UnparsableChunk { artifact, .. } = err else {
            panic!("expected an unparsable chunk");
        };
        assert_eq!(artifact, out.join("tim.failed-16447_u1.conllu"));
        assert!(artifact.exists());
    }

    #[test]
    fn test_missing_header_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::new(config(dir.path())).unwrap();
        let work_dir = pipeline.work_dir().to_path_buf();
        let err = pipeline.load("@Begin\n*CHI:\toui .\n@End\n").unwrap_err();

        let PipelineError::MissingHeader { line, artifact, .. } = err else {
            panic!("expected a missing header");
        };
        assert_eq!(line, 2);
        assert_eq!(artifact, Some(dir.path().join("tim.missing-header.txt")));
        assert!(dir.path().join("tim.missing-header.txt").exists());

        drop(pipeline);
        assert!(!work_dir.exists());
    }
}
