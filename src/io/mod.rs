pub mod input;
pub mod output;

pub use input::{default_prefix, read_transcript};
pub use output::{
    render_link, write_conllu, write_tsv, Column, ParserSummary, RunSummary, TableLayout,
    TaggerSummary,
};
