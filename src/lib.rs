pub mod error;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod stages;
pub mod text;
pub mod tools;

pub use error::{PipelineError, PipelineResult};
pub use io::{default_prefix, read_transcript, RunSummary, TableLayout};
pub use models::{Session, TokenRow, Utterance};
pub use pipeline::{Pipeline, PipelineConfig};
pub use stages::{
    execute_stage0, execute_stage1, AssembleConfig, ParseStageConfig, RowConfig, SessionConfig,
    SplitStrategy, TaggerStageConfig,
};
pub use tools::{ParserServiceConfig, TaggerConfig, TreeTagger, UdpipeClient};
