//! Turning extracted records into work items.

use docket_core::WorkItem;
use serde_json::Value;

/// Where the identity fields of a work item live inside an extracted record.
///
/// Paths are dot-separated (`trial_reference.court`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryMapping {
    pub title_field: String,
    pub url_field: String,
    pub reference_field: Option<String>,
}

impl Default for DiscoveryMapping {
    fn default() -> Self {
        Self {
            title_field: "title".to_string(),
            url_field: "url".to_string(),
            reference_field: Some("trial_reference.court".to_string()),
        }
    }
}

fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |value, segment| value.get(segment))
}

fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn is_absolute_http(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Work items for every record listed under `required_field` in `payload`.
///
/// Records without a title or an absolute http(s) URL are skipped.
pub fn items_from_payload(payload: &Value, required_field: &str, mapping: &DiscoveryMapping) -> Vec<WorkItem> {
    let Some(records) = payload.get(required_field).and_then(Value::as_array) else {
        return Vec::new();
    };

    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let title = lookup(record, &mapping.title_field).and_then(text_of);
            let url = lookup(record, &mapping.url_field)
                .and_then(text_of)
                .filter(|u| is_absolute_http(u));

            let (Some(title), Some(url)) = (title, url) else {
                tracing::debug!(index, "record lacks title or url, skipped");
                return None;
            };

            let item = WorkItem::new(title, url);
            let reference = mapping
                .reference_field
                .as_deref()
                .and_then(|path| lookup(record, path))
                .and_then(text_of);

            Some(match reference {
                Some(reference) => item.with_reference(reference),
                None => item,
            })
        })
        .collect()
}
