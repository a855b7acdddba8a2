// File: ./src/model/mod.rs
pub mod event;
pub mod merge;
pub mod source;

pub use event::{Event, RawRecord};
pub use source::{Source, SourceKind};
