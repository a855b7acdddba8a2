// Crate root library declaration and module exports.
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod fetch;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod storage;
pub mod text;
