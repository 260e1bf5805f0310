mod collector;
mod files;
mod indexer;

pub use collector::*;
pub use files::*;
pub use indexer::*;
