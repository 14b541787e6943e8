//! gemini-relay: streaming HTTP relay for a hosted generative model.
//!
//! Accepts a text prompt (`POST /chat`) or a prompt plus image
//! (`POST /vision`), opens a streaming generation call against the Gemini API
//! and forwards each fragment as soon as it arrives, one `\n`-terminated line
//! per fragment. Failures are reported in-band as a single
//! `[ERROR STREAM] ...` line; the HTTP status is always 200 once relaying
//! has started.

pub mod config;
pub mod error;
pub mod gemini;
pub mod metrics;
pub mod relay;
pub mod server;
