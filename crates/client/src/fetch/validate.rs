//! Response acceptance rules.
//!
//! Blocking servers routinely answer 200 with an HTML error page where a
//! document was expected, so a status check alone is not enough.

use super::FetchResponse;
use docket_core::ContentKind;
use reqwest::StatusCode;

/// Why a received response was not accepted. Retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("unexpected status {0}")]
    Status(u16),

    #[error("content type {0:?} is not an accepted document type")]
    ContentType(Option<String>),

    #[error("empty response body")]
    Empty,

    #[error("response body of {size} bytes exceeds {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// Acceptance rules for fetched responses.
#[derive(Debug, Clone)]
pub struct ResponseRules {
    /// Document content types, matched case-insensitively as substrings.
    pub document_content_types: Vec<String>,
    pub max_bytes: usize,
}

impl Default for ResponseRules {
    fn default() -> Self {
        Self {
            document_content_types: vec!["application/pdf".into(), "application/octet-stream".into()],
            max_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ResponseRules {
    /// Whether `content_type` is on the document allow-list.
    pub fn is_document_type(&self, content_type: Option<&str>) -> bool {
        let Some(content_type) = content_type else {
            return false;
        };
        let content_type = content_type.to_ascii_lowercase();
        self.document_content_types
            .iter()
            .any(|allowed| content_type.contains(&allowed.to_ascii_lowercase()))
    }

    /// Accept or reject a response expected to be of `kind`.
    pub fn check(&self, response: &FetchResponse, kind: ContentKind) -> Result<(), Rejection> {
        if response.status != StatusCode::OK {
            return Err(Rejection::Status(response.status.as_u16()));
        }

        if kind == ContentKind::Document && !self.is_document_type(response.content_type.as_deref()) {
            return Err(Rejection::ContentType(response.content_type.clone()));
        }

        if response.bytes.is_empty() {
            return Err(Rejection::Empty);
        }

        if response.bytes.len() > self.max_bytes {
            return Err(Rejection::TooLarge { size: response.bytes.len(), limit: self.max_bytes });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn response(status: StatusCode, content_type: Option<&str>, body: &'static [u8]) -> FetchResponse {
        let url = url::Url::parse("https://example.com/export/1/pdf").unwrap();
        FetchResponse {
            url: url.clone(),
            final_url: url,
            status,
            content_type: content_type.map(Into::into),
            bytes: Bytes::from_static(body),
            fetch_ms: 1,
        }
    }

    #[test]
    fn test_document_accepted() {
        let rules = ResponseRules::default();
        let ok = response(StatusCode::OK, Some("application/pdf"), b"%PDF-1.7");
        assert_eq!(rules.check(&ok, ContentKind::Document), Ok(()));
    }

    #[test]
    fn test_content_type_match_is_case_insensitive_substring() {
        let rules = ResponseRules::default();
        assert!(rules.is_document_type(Some("Application/PDF; charset=binary")));
        assert!(!rules.is_document_type(Some("text/html")));
        assert!(!rules.is_document_type(None));
    }

    #[test]
    fn test_error_page_with_200_rejected() {
        let rules = ResponseRules::default();
        let page = response(StatusCode::OK, Some("text/html; charset=utf-8"), b"<html>Access denied</html>");
        assert_eq!(
            rules.check(&page, ContentKind::Document),
            Err(Rejection::ContentType(Some("text/html; charset=utf-8".into())))
        );
        assert_eq!(rules.check(&page, ContentKind::Listing), Ok(()));
    }

    #[test]
    fn test_non_200_rejected() {
        let rules = ResponseRules::default();
        let forbidden = response(StatusCode::FORBIDDEN, Some("text/html"), b"nope");
        assert_eq!(rules.check(&forbidden, ContentKind::Listing), Err(Rejection::Status(403)));

        let no_content = response(StatusCode::NO_CONTENT, Some("application/pdf"), b"");
        assert_eq!(rules.check(&no_content, ContentKind::Document), Err(Rejection::Status(204)));
    }

    #[test]
    fn test_empty_body_rejected() {
        let rules = ResponseRules::default();
        let empty = response(StatusCode::OK, Some("application/pdf"), b"");
        assert_eq!(rules.check(&empty, ContentKind::Document), Err(Rejection::Empty));
    }

    #[test]
    fn test_oversized_body_rejected() {
        let rules = ResponseRules { max_bytes: 4, ..Default::default() };
        let big = response(StatusCode::OK, Some("application/pdf"), b"%PDF-1.7");
        assert_eq!(rules.check(&big, ContentKind::Document), Err(Rejection::TooLarge { size: 8, limit: 4 }));
    }
}
