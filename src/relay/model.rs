//! The remote-model seam.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::RelayError;

/// Stream of fragment texts produced by a model, in generation order.
///
/// Items may be empty strings. The stream ends after yielding an error.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

/// Input to a single generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// Text-only prompt.
    Text(String),
    /// Prompt text plus one image, sent as inline data.
    Vision {
        text: String,
        image: Bytes,
        mime_type: String,
    },
}

impl Prompt {
    pub fn text(&self) -> &str {
        match self {
            Prompt::Text(text) | Prompt::Vision { text, .. } => text,
        }
    }
}

/// A hosted generative model with a streaming generation call.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier, for logs and health output.
    fn name(&self) -> &str;

    /// Open a streaming generation call.
    ///
    /// Errors returned here happen before any fragment is produced.
    async fn stream_generate(&self, prompt: &Prompt) -> Result<FragmentStream, RelayError>;
}
