use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use chat2rows::{
    default_prefix, execute_stage0, execute_stage1, read_transcript, AssembleConfig,
    ParseStageConfig, ParserServiceConfig, Pipeline, PipelineConfig, RowConfig, SessionConfig,
    SplitStrategy, TaggerConfig, TaggerStageConfig, TreeTagger, UdpipeClient,
};

#[derive(Parser)]
#[command(name = "chat2rows")]
#[command(author, version, about = "CHAT transcript to token-per-row table converter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a transcript into token tables
    Convert(ConvertArgs),

    /// Report sessions, speakers and token counts without writing anything
    Inspect {
        /// Input transcript (.cha or .cha.gz)
        #[arg(short, long)]
        input: PathBuf,

        /// Start a session block at each @Begin instead of ending one at each @End
        #[arg(long)]
        split_before_begin: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Args)]
struct ConvertArgs {
    /// Input transcript (.cha or .cha.gz)
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for the output files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Output file name stem (default: input name without .cha/.gz)
    #[arg(long)]
    prefix: Option<String>,

    /// Start a session block at each @Begin instead of ending one at each @End
    #[arg(long)]
    split_before_begin: bool,

    /// Keep blocks marked as placeholders
    #[arg(long)]
    keep_placeholders: bool,

    /// Print the utterance on the first token of each utterance only
    #[arg(long)]
    first_utterance_only: bool,

    /// Add the cleaned utterance column
    #[arg(long)]
    utt_clean: bool,

    /// Tag with TreeTagger
    #[arg(long)]
    tag: bool,

    /// TreeTagger binary (overrides TREETAGGER_BIN)
    #[arg(long)]
    tagger_bin: Option<PathBuf>,

    /// TreeTagger parameter file (overrides TREETAGGER_PARAMS)
    #[arg(long)]
    tagger_params: Option<PathBuf>,

    /// Add the tagged utterance column
    #[arg(long)]
    utt_tagged: bool,

    /// Print utterances only on rows whose tag matches this regex
    #[arg(long)]
    utterance_pos: Option<String>,

    /// Add rule annotations for rows whose tag matches this regex
    #[arg(long)]
    annotate: Option<String>,

    /// Parse with the remote dependency parser
    #[arg(long)]
    parse: bool,

    /// Parser endpoint (overrides CHAT2ROWS_PARSER_URL)
    #[arg(long)]
    parser_url: Option<String>,

    /// Parser model (overrides CHAT2ROWS_PARSER_MODEL)
    #[arg(long)]
    parser_model: Option<String>,

    /// Utterances per parser request
    #[arg(long, default_value = "200")]
    chunk_size: usize,

    /// Utterances per request when isolating a failing chunk
    #[arg(long, default_value = "10")]
    mini_chunk_size: usize,

    /// Parse only utterances with a row whose tag matches this regex
    #[arg(long)]
    parse_pos: Option<String>,

    /// Keep rows in the light table whose part of speech matches this regex
    #[arg(long)]
    light_pattern: Option<String>,

    /// Also write a CoNLL-U file
    #[arg(long)]
    conllu: bool,

    /// Columns copied into the CoNLL-U MISC field
    #[arg(long, value_delimiter = ',')]
    conllu_misc: Vec<String>,

    /// Link formula template with {uid} and {session} placeholders
    #[arg(long)]
    link_template: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert(args) => {
            setup_logging(args.verbose);
            convert(args).await
        }
        Commands::Inspect {
            input,
            split_before_begin,
            verbose,
        } => {
            setup_logging(verbose);
            inspect(input, split_before_begin)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn split_strategy(before_begin: bool) -> SplitStrategy {
    if before_begin {
        SplitStrategy::BeforeBeginMarker
    } else {
        SplitStrategy::AfterEndMarker
    }
}

async fn convert(args: ConvertArgs) -> Result<()> {
    let prefix = args
        .prefix
        .clone()
        .unwrap_or_else(|| default_prefix(&args.input));

    let config = PipelineConfig {
        sessions: SessionConfig {
            split: split_strategy(args.split_before_begin),
            drop_placeholders: !args.keep_placeholders,
            ..Default::default()
        },
        rows: RowConfig {
            first_utterance_only: args.first_utterance_only,
            include_utt_clean: args.utt_clean,
            ..Default::default()
        },
        tagger: TaggerStageConfig {
            utt_tagged: args.utt_tagged,
            utterance_pos_pattern: args.utterance_pos.clone(),
            annotate_pattern: args.annotate.clone(),
        },
        parse: ParseStageConfig {
            chunk_size: args.chunk_size,
            mini_chunk_size: args.mini_chunk_size,
            pos_pattern: args.parse_pos.clone(),
        },
        assemble: AssembleConfig {
            output_dir: args.output_dir.clone(),
            prefix,
            light_pattern: args.light_pattern.clone(),
            write_conllu: args.conllu,
            conllu_misc: args.conllu_misc.clone(),
            link_template: args.link_template.clone(),
            ..Default::default()
        },
    };

    let mut pipeline = Pipeline::new(config)?;

    if args.tag {
        let mut tagger_config = match &args.tagger_params {
            Some(params) => TaggerConfig::new("tree-tagger", params),
            None => TaggerConfig::from_env()?,
        };
        if let Some(bin) = &args.tagger_bin {
            tagger_config.binary = bin.clone();
        } else if let Ok(bin) = std::env::var("TREETAGGER_BIN") {
            tagger_config.binary = bin.into();
        }
        info!("Tagging with {:?}", tagger_config.binary);
        pipeline = pipeline.with_tagger(Box::new(TreeTagger::new(tagger_config)));
    }

    if args.parse {
        let mut parser_config = ParserServiceConfig::from_env();
        if let Some(url) = &args.parser_url {
            parser_config.url = url.clone();
        }
        if let Some(model) = &args.parser_model {
            parser_config.model = model.clone();
        }
        info!("Parsing with {} ({})", parser_config.url, parser_config.model);
        let client = UdpipeClient::new(parser_config)?;
        pipeline = pipeline.with_parser(Box::new(client));
    }

    info!("Run {}", pipeline.run_id());
    let summary = pipeline
        .run(&args.input)
        .await
        .with_context(|| format!("Failed to convert {:?}", args.input))?;

    for path in &summary.outputs {
        info!("Output written to {:?}", path);
    }
    Ok(())
}

fn inspect(input: PathBuf, split_before_begin: bool) -> Result<()> {
    info!("Inspecting transcript {:?}", input);
    let text = read_transcript(&input)?;
    let config = SessionConfig {
        split: split_strategy(split_before_begin),
        ..Default::default()
    };
    let stage0 = execute_stage0(&text, &config).context("Failed to parse transcript")?;
    let rows = execute_stage1(&stage0.sessions, &stage0.utterances, &RowConfig::default());

    println!("Transcript Analysis");
    println!("===================");
    println!("Sessions: {}", stage0.sessions.len());
    println!("Placeholder blocks dropped: {}", stage0.dropped_blocks);
    println!("Headerless blocks: {}", stage0.headerless_blocks);
    println!("Utterances: {}", stage0.utterances.len());
    println!("Tokens: {}", rows.rows.len());
    println!(
        "%mor alignment: {} aligned, {} mismatched",
        rows.mor_aligned, rows.mor_mismatched
    );
    println!();

    println!("Sessions");
    println!("--------");
    for session in &stage0.sessions {
        let children: Vec<String> = session
            .children
            .iter()
            .map(|c| format!("{} {} ({} days)", c.speaker, c.display_name, c.age.days))
            .collect();
        println!(
            "{} [{}] {}: {}",
            session.session_id,
            session.language,
            session.corpus,
            children.join(", ")
        );
    }
    println!();

    println!("Speaker Statistics");
    println!("------------------");
    let mut speakers: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for utt in &stage0.utterances {
        speakers.entry(utt.speaker.as_str()).or_default().0 += 1;
    }
    for row in &rows.rows {
        speakers.entry(row.speaker.as_str()).or_default().1 += 1;
    }
    for (speaker, (utterances, tokens)) in &speakers {
        println!(
            "{}: {} utterances, {} tokens, {:.1} tokens/utterance",
            speaker,
            utterances,
            tokens,
            *tokens as f64 / (*utterances).max(1) as f64
        );
    }

    Ok(())
}
