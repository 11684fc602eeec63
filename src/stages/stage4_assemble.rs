use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::info;

use crate::io::{render_link, write_conllu, write_tsv, Column, TableLayout};
use crate::models::TokenRow;

use super::stage2_tagger::compile_pattern;

/// Configuration for Stage 4 output assembly
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    pub output_dir: PathBuf,
    /// File name stem shared by all outputs
    pub prefix: String,
    /// Light table keeps rows whose resolved part of speech matches; all rows when unset
    pub light_pattern: Option<String>,
    pub write_conllu: bool,
    /// Full-table column names copied into the CoNLL-U MISC field
    pub conllu_misc: Vec<String>,
    /// Link formula template with `{uid}` and `{session}` placeholders
    pub link_template: Option<String>,
    pub layout: TableLayout,
}

impl Default for AssembleConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            prefix: "chat2rows".to_string(),
            light_pattern: None,
            write_conllu: false,
            conllu_misc: Vec::new(),
            link_template: None,
            layout: TableLayout::default(),
        }
    }
}

impl AssembleConfig {
    /// `{output_dir}/{prefix}`
    pub fn stem(&self) -> PathBuf {
        self.output_dir.join(&self.prefix)
    }

    /// `{output_dir}/{prefix}{suffix}`
    pub fn output_path(&self, suffix: &str) -> PathBuf {
        self.output_dir.join(format!("{}{}", self.prefix, suffix))
    }
}

/// Result of Stage 4
#[derive(Debug, Default)]
pub struct Stage4Result {
    pub outputs: Vec<PathBuf>,
    pub rows: usize,
    pub light_rows: usize,
    pub conllu_sentences: Option<usize>,
}

fn misc_columns(names: &[String]) -> Result<Vec<Column>> {
    names
        .iter()
        .map(|name| match Column::from_header(name) {
            Some(column) => Ok(column),
            None => bail!("Unknown column for CoNLL-U MISC: {}", name),
        })
        .collect()
}

/// Execute Stage 4: write the full and light tables and the optional
/// CoNLL-U document.
pub fn execute_stage4(rows: &mut [TokenRow], config: &AssembleConfig) -> Result<Stage4Result> {
    let light_filter = config.light_pattern.as_deref().map(compile_pattern).transpose()?;
    let misc = misc_columns(&config.conllu_misc)?;

    let mut layout = config.layout;
    if let Some(template) = &config.link_template {
        layout.link = true;
        for row in rows.iter_mut() {
            row.link = Some(render_link(template, &row.uid, &row.session_id));
        }
    }

    std::fs::create_dir_all(&config.output_dir)?;
    let mut result = Stage4Result::default();

    let full_path = config.output_path(".tsv");
    result.rows = write_tsv(&full_path, &layout.full_columns(), rows.iter())?;
    info!("Wrote {} rows to {:?}", result.rows, full_path);
    result.outputs.push(full_path);

    let light_path = config.output_path(".light.tsv");
    let light_rows = rows
        .iter()
        .filter(|r| light_filter.as_ref().is_none_or(|re| re.is_match(r.resolved_pos())));
    result.light_rows = write_tsv(&light_path, &layout.light_columns(), light_rows)?;
    info!("Wrote {} rows to {:?}", result.light_rows, light_path);
    result.outputs.push(light_path);

    if config.write_conllu {
        let conllu_path = config.output_path(".conllu");
        let sentences = write_conllu(&conllu_path, rows, &misc)?;
        info!("Wrote {} sentences to {:?}", sentences, conllu_path);
        result.conllu_sentences = Some(sentences);
        result.outputs.push(conllu_path);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::error::PipelineError;
    use crate::models::{ConlluToken, RuleAnnotations};

    fn row(uid: &str, n: usize, word: &str, pos: &str) -> TokenRow {
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
            lemma: word.to_string(),
            pos: pos.to_string(),
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

    fn config(dir: &Path) -> AssembleConfig {
        AssembleConfig {
            output_dir: dir.to_path_buf(),
            prefix: "julie".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_light_table_filters_on_resolved_pos() {
        let dir = tempfile::tempdir().unwrap();
        let mut rows = vec![
            row("7_u1", 1, "il", "PRO:PER"),
            row("7_u1", 2, "tombe", "VER:pres"),
            row("7_u1", 3, "là", ""),
        ];
        rows[2].conllu = Some(ConlluToken::from_columns(&["3", "là", "là", "VERB"]));
        let config = AssembleConfig {
            light_pattern: Some("^VER".to_string()),
            ..config(dir.path())
        };
        let result = execute_stage4(&mut rows, &config).unwrap();

        assert_eq!(result.rows, 3);
        assert_eq!(result.light_rows, 2);
        assert_eq!(result.outputs.len(), 2);
        let light = std::fs::read_to_string(dir.path().join("julie.light.tsv")).unwrap();
        assert!(light.contains("\ttombe\t"));
        assert!(!light.contains("\til\t"));
        assert!(result.conllu_sentences.is_none());
    }

    #[test]
    fn test_link_and_conllu_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut rows = vec![row("7_u1", 1, "oui", "ADV")];
        rows[0].conllu = Some(ConlluToken::from_columns(&[
            "1", "oui", "oui", "INTJ", "ADV", "_", "0", "root", "_", "_",
        ]));
        let config = AssembleConfig {
            write_conllu: true,
            conllu_misc: vec!["speaker".to_string()],
            link_template: Some("=HYPERLINK(\"http://x/{session}#{uid}\")".to_string()),
            ..config(dir.path())
        };
        let result = execute_stage4(&mut rows, &config).unwrap();

        assert_eq!(result.conllu_sentences, Some(1));
        let full = std::fs::read_to_string(dir.path().join("julie.tsv")).unwrap();
        assert!(full.contains("=HYPERLINK(\"http://x/7#7_u1\")"));
        let conllu = std::fs::read_to_string(dir.path().join("julie.conllu")).unwrap();
        assert!(conllu.contains("\troot\t_\tspeaker=CHI\n"));
    }

    #[test]
    fn test_bad_light_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let config = AssembleConfig {
            light_pattern: Some("[".to_string()),
            ..config(dir.path())
        };
        let err = execute_stage4(&mut [], &config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_unknown_misc_column() {
        let dir = tempfile::tempdir().unwrap();
        let config = AssembleConfig {
            write_conllu: true,
            conllu_misc: vec!["nope".to_string()],
            ..config(dir.path())
        };
        assert!(execute_stage4(&mut [], &config).is_err());
    }
}
