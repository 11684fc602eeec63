//! External collaborators: the batch POS tagger and the remote dependency parser

pub mod parser_client;
pub mod tagger;

pub use parser_client::{ParseService, ParserServiceConfig, UdpipeClient};
pub use tagger::{TaggerBackend, TaggerConfig, TreeTagger};
