use async_trait::async_trait;

use crate::{Analysis, Error, Result};

/// A still image of the shared screen, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    mime_type: String,
    data: String,
}

impl Frame {
    const DEFAULT_MIME: &'static str = "image/jpeg";

    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URL as produced by a browser canvas.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let (header, data) = url
            .split_once(',')
            .ok_or_else(|| Error::Frame("expected a data URL with a ',' separator".into()))?;
        if data.is_empty() {
            return Err(Error::Frame("data URL carries no image data".into()));
        }

        let mime_type = header
            .split_once(':')
            .and_then(|(_, rest)| rest.split_once(';'))
            .map(|(mime, _)| mime)
            .filter(|mime| !mime.is_empty())
            .unwrap_or(Self::DEFAULT_MIME);

        Ok(Self::new(mime_type, data))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}

/// Where the scheduler pulls frames from.
///
/// `None` means no frame is ready yet. That is a normal outcome and the
/// cycle is simply skipped.
pub trait FrameSource: Send + Sync {
    fn frame(&self) -> Option<Frame>;
}

/// Abstraction over the remote vision model.
///
/// `GeminiClient` implements this for the real service; tests substitute
/// deterministic doubles. One call per invocation, no internal retry.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, frame: &Frame) -> Result<Analysis>;
}
