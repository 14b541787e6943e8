//! HTTP server relaying prompts as newline-delimited text streams.
//!
//! - [`api`]: Routes, handlers and shared state
//! - [`streaming`]: Line framing of relay events

pub mod api;
pub mod streaming;
