pub mod conllu;
pub mod row;
pub mod session;
pub mod tagging;
pub mod utterance;

pub use conllu::*;
pub use row::*;
pub use session::*;
pub use tagging::*;
pub use utterance::*;
