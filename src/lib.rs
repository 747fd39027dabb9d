//! Library crate for dast-realtime: one containerized DAST scan per invocation,
//! with result submission and orphan-container reaping.
pub mod config;
pub mod container;
pub mod error;
pub mod reaper;
pub mod reporter;
pub mod runtime;
pub mod scanner;
pub mod types;
pub mod workspace;

pub use error::{ScanError, SubmissionError};
pub use scanner::Scanner;
