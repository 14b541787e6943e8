//! Client for the Gemini `streamGenerateContent` API.
//!
//! - [`types`]: Request/response wire types
//! - [`sse`]: Server-Sent Events decoding into text fragments
//! - [`client`]: HTTP client implementing [`GenerativeModel`](crate::relay::model::GenerativeModel)

pub mod client;
pub mod sse;
pub mod types;

pub use client::GeminiClient;
