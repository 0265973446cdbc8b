//! Free-text fallback: synthesize records from line patterns.

use regex::Regex;
use serde_json::{Map, Value, json};

/// A tag assigned when any of its keywords occurs on a line.
#[derive(Debug, Clone)]
pub struct KeywordTag {
    pub tag: String,
    /// Lowercase keywords.
    pub keywords: Vec<String>,
}

impl KeywordTag {
    pub fn new(tag: &str, keywords: &[&str]) -> Self {
        Self { tag: tag.to_string(), keywords: keywords.iter().map(|k| k.to_lowercase()).collect() }
    }

    fn matches(&self, lowered_line: &str) -> bool {
        self.keywords.iter().any(|k| lowered_line.contains(k.as_str()))
    }
}

/// Patterns driving the heuristic strategy.
#[derive(Debug, Clone)]
pub struct HeuristicRules {
    /// A line matching any of these starts a new record.
    pub title_patterns: Vec<Regex>,
    /// Checked in order; the first match on a line tags the current record.
    pub keyword_tags: Vec<KeywordTag>,
    pub tag_field: String,
    /// Tag value for records no keyword matched.
    pub default_tag: String,
}

impl Default for HeuristicRules {
    fn default() -> Self {
        Self {
            title_patterns: vec![
                Regex::new(r"[A-Z][A-Za-z\s&]*\s+(?:v\.?|vs\.?|versus)\s+[A-Z][A-Za-z\s&]*").expect("valid regex"),
                Regex::new(r"Case\s+(?:No\.|Number)\s*[A-Z0-9/\-]+").expect("valid regex"),
            ],
            keyword_tags: vec![
                KeywordTag::new("Supreme Court", &["supreme court", "supreme"]),
                KeywordTag::new("Court of Appeal", &["court of appeal", "appeal court"]),
                KeywordTag::new("High Court", &["high court"]),
                KeywordTag::new("Magistrate's Court", &["magistrate's court", "magistrate"]),
            ],
            tag_field: "court_level".to_string(),
            default_tag: "Unknown".to_string(),
        }
    }
}

impl HeuristicRules {
    /// Records found in `text`, one per title line. Keyword lines tag the
    /// most recent record.
    pub fn records(&self, text: &str) -> Vec<Map<String, Value>> {
        let mut records: Vec<Map<String, Value>> = Vec::new();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if self.title_patterns.iter().any(|p| p.is_match(line)) {
                let mut record = Map::new();
                record.insert("title".into(), json!(line));
                record.insert("description".into(), json!(line));
                record.insert(self.tag_field.clone(), json!(self.default_tag));
                records.push(record);
            }

            let lowered = line.to_lowercase();
            if let Some(current) = records.last_mut()
                && let Some(tag) = self.keyword_tags.iter().find(|t| t.matches(&lowered))
            {
                current.insert(self.tag_field.clone(), json!(tag.tag));
            }
        }

        records
    }

    /// `{required_field: [records]}`, or `None` when nothing was found.
    pub fn synthesize(&self, text: &str, required_field: &str) -> Option<Value> {
        let records = self.records(text);
        if records.is_empty() {
            return None;
        }
        let mut object = Map::new();
        object.insert(required_field.to_string(), Value::Array(records.into_iter().map(Value::Object).collect()));
        Some(Value::Object(object))
    }
}
