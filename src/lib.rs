//! paperlens - structured document analysis with on-device or remote LLMs.
//!
//! Extracts a document's text, routes each request to a local Ollama model
//! when it is ready (or to an OpenAI-compatible API otherwise), and turns the
//! completion into a validated [`models::AnalysisRecord`].

pub mod config;
pub mod extract;
pub mod llm;
pub mod models;
pub mod services;
