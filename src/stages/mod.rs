pub mod stage0_sessions;
pub mod stage1_rows;
pub mod stage2_tagger;
pub mod stage3_parse;
pub mod stage4_assemble;

pub use stage0_sessions::*;
pub use stage1_rows::*;
pub use stage2_tagger::*;
pub use stage3_parse::*;
pub use stage4_assemble::*;
