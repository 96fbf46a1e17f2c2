//! Side-effecting helpers: configuration files and the text-generation backend.

pub mod config;
pub mod ollama;
pub mod prompt;
