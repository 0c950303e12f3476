pub mod archive;
pub mod betting;
pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod library;
pub mod report;
pub mod run_config;
pub mod util;

pub use error::{Error, Result};
