//! Item filters.
//!
//! Filters run first and look only at the item's own fields, so they are
//! cheap and never touch the network or disk.

use docket_core::{FilterVerdict, WorkItem};
use regex::Regex;

/// Pure predicate over a work item.
pub trait ItemFilter: Send + Sync {
    fn accepts(&self, item: &WorkItem) -> bool;

    fn verdict(&self, item: &WorkItem) -> FilterVerdict {
        if self.accepts(item) { FilterVerdict::Pass } else { FilterVerdict::Reject }
    }
}

/// Passes everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ItemFilter for AcceptAll {
    fn accepts(&self, _item: &WorkItem) -> bool {
        true
    }
}

/// Passes items that carry a non-blank discovered reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct HasReference;

impl ItemFilter for HasReference {
    fn accepts(&self, item: &WorkItem) -> bool {
        item.discovered_reference.as_deref().is_some_and(|r| !r.trim().is_empty())
    }
}

/// Passes items whose title matches the pattern.
#[derive(Debug, Clone)]
pub struct TitleMatches(pub Regex);

impl ItemFilter for TitleMatches {
    fn accepts(&self, item: &WorkItem) -> bool {
        self.0.is_match(item.title())
    }
}

/// Passes items whose source host is listed, or is a subdomain of a listed
/// host.
#[derive(Debug, Clone)]
pub struct HostAllowlist {
    hosts: Vec<String>,
}

impl HostAllowlist {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { hosts: hosts.into_iter().map(|h| h.as_ref().trim().to_ascii_lowercase()).collect() }
    }
}

impl ItemFilter for HostAllowlist {
    fn accepts(&self, item: &WorkItem) -> bool {
        let Ok(url) = url::Url::parse(item.source_url().trim()) else {
            return false;
        };
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return false;
        };
        self.hosts
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")))
    }
}

/// Passes items every inner filter passes.
#[derive(Default)]
pub struct AllOf(pub Vec<Box<dyn ItemFilter>>);

impl AllOf {
    pub fn with(mut self, filter: impl ItemFilter + 'static) -> Self {
        self.0.push(Box::new(filter));
        self
    }
}

impl ItemFilter for AllOf {
    fn accepts(&self, item: &WorkItem) -> bool {
        self.0.iter().all(|f| f.accepts(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, url: &str) -> WorkItem {
        WorkItem::new(title, url)
    }

    #[test]
    fn test_has_reference() {
        let bare = item("A v B", "https://kenyalaw.org/case/1");
        assert_eq!(HasReference.verdict(&bare), FilterVerdict::Reject);
        assert_eq!(HasReference.verdict(&bare.clone().with_reference("  ")), FilterVerdict::Reject);
        assert_eq!(HasReference.verdict(&bare.with_reference("HCCR 1/2019")), FilterVerdict::Pass);
    }

    #[test]
    fn test_title_matches() {
        let filter = TitleMatches(Regex::new(r"(?i)\bv\.?\s").unwrap());
        assert!(filter.accepts(&item("Republic v. Doe", "https://x.org/1")));
        assert!(!filter.accepts(&item("Annual report", "https://x.org/2")));
    }

    #[test]
    fn test_host_allowlist() {
        let filter = HostAllowlist::new(["kenyalaw.org"]);
        assert!(filter.accepts(&item("a", "https://kenyalaw.org/case/1")));
        assert!(filter.accepts(&item("a", "https://new.KenyaLaw.org/case/1")));
        assert!(!filter.accepts(&item("a", "https://notkenyalaw.org/case/1")));
        assert!(!filter.accepts(&item("a", "not a url")));
    }

    #[test]
    fn test_all_of() {
        let filter = AllOf::default().with(HasReference).with(HostAllowlist::new(["kenyalaw.org"]));
        let passing = item("a", "https://kenyalaw.org/1").with_reference("ref");
        let wrong_host = item("a", "https://example.org/1").with_reference("ref");

        assert!(filter.accepts(&passing));
        assert!(!filter.accepts(&wrong_host));
        assert!(AllOf::default().accepts(&wrong_host));
    }
}
