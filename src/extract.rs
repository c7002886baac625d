//! Text extraction collaborator boundary.
//!
//! Decoding uploaded bytes into text is external to the retrieval core; the
//! core only consumes the extracted text as an opaque string. The shipped
//! implementation accepts UTF-8 plain text. A PDF (or any other format)
//! extractor plugs in behind the same trait.

use async_trait::async_trait;
use thiserror::Error;

/// Raised when the uploaded bytes cannot be decoded into text.
#[derive(Debug, Error)]
#[error("failed to extract text from document: {0}")]
pub struct ExtractionError(String);

impl ExtractionError {
    /// Wrap a collaborator-specific failure description.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Interface implemented by document text extractors.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Decode raw document bytes into text.
    async fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Extractor for plain UTF-8 text documents.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    /// Construct a new plain-text extractor.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(error) => Err(ExtractionError::new(format!(
                "document is not valid UTF-8 text: {error}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decodes_utf8_bytes() {
        let extractor = PlainTextExtractor::new();
        let text = extractor
            .extract_text("hello".as_bytes())
            .await
            .expect("valid utf-8");
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn rejects_invalid_utf8() {
        let extractor = PlainTextExtractor::new();
        let error = extractor.extract_text(&[0xff, 0xfe, 0x00]).await.unwrap_err();
        assert!(error.to_string().contains("not valid UTF-8"));
    }
}
