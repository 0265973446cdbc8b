//! Identifier extraction from document URLs.

pub use docket_core::url::{UrlError, canonicalize};

/// Extract the external identifier embedded in a document URL.
///
/// Takes the trailing run of purely numeric path segments and joins them
/// with `_`: `/cases/view/12345` gives `12345` and `/judgment/kehc/2019/77`
/// gives `2019_77`. Returns None when the path ends in a non-numeric segment.
pub fn external_id(url: &url::Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    let numeric: Vec<&str> = segments
        .iter()
        .rev()
        .take_while(|s| s.chars().all(|c| c.is_ascii_digit()))
        .copied()
        .collect();

    if numeric.is_empty() {
        return None;
    }

    Some(numeric.into_iter().rev().collect::<Vec<_>>().join("_"))
}
