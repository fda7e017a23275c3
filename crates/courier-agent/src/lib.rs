pub mod catalog;
pub mod coerce;
pub mod directive;
pub mod dispatch;
pub mod gemini;
pub mod ollama;
pub mod prompt;
pub mod provider;
pub mod runtime;
pub mod summarize;
