//! Artifact naming and on-disk checks.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Longest file name produced, in characters.
pub const MAX_FILENAME_CHARS: usize = 200;

const DOCUMENT_EXTENSION: &str = "pdf";

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\s]"#).expect("valid regex"));
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\-.]").expect("valid regex"));

/// Replace characters that are unsafe in file names with `_` and cap length.
pub fn sanitize_filename(name: &str) -> String {
    let name = UNSAFE_CHARS.replace_all(name, "_");
    let name = NON_WORD.replace_all(&name, "_");
    name.chars().take(MAX_FILENAME_CHARS).collect()
}

/// File name for one resource of an item: `<title>_<id>_<subtype>.pdf`,
/// omitting the id when the source URL carries none.
pub fn artifact_filename(title: &str, external_id: Option<&str>, subtype: &str) -> String {
    let stem = match external_id {
        Some(id) => format!("{title}_{id}_{subtype}"),
        None => format!("{title}_{subtype}"),
    };
    let suffix = format!(".{DOCUMENT_EXTENSION}");
    let stem = sanitize_filename(&stem);
    let keep = MAX_FILENAME_CHARS.saturating_sub(suffix.len());
    format!("{}{suffix}", stem.chars().take(keep).collect::<String>())
}

pub fn artifact_path(output_dir: &Path, title: &str, external_id: Option<&str>, subtype: &str) -> PathBuf {
    output_dir.join(artifact_filename(title, external_id, subtype))
}

/// Size of the file at `path` if it exists and is non-empty.
pub async fn existing_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(meta.len()),
        _ => None,
    }
}
