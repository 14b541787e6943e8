//! The streaming relay.
//!
//! - [`model`]: Prompt type and the [`GenerativeModel`](model::GenerativeModel) seam
//! - [`engine`]: Per-request relay task and its event stream

pub mod engine;
pub mod model;
