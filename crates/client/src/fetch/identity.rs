//! Client identity profiles presented to the remote source.

use reqwest::header::{self, HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::{Deserialize, Serialize};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// A set of request headers emulating one browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub name: String,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    #[serde(default)]
    pub referer: Option<String>,
}

impl IdentityProfile {
    pub fn header_map(&self) -> Result<HeaderMap, InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_str(&self.user_agent)?);
        headers.insert(header::ACCEPT, HeaderValue::from_str(&self.accept)?);
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_str(&self.accept_language)?);
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        if let Some(referer) = &self.referer {
            headers.insert(header::REFERER, HeaderValue::from_str(referer)?);
        }
        Ok(headers)
    }
}

/// Non-empty, ordered pool of identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPool {
    profiles: Vec<IdentityProfile>,
}

impl IdentityPool {
    /// Returns None for an empty profile list.
    pub fn new(profiles: Vec<IdentityProfile>) -> Option<Self> {
        (!profiles.is_empty()).then_some(Self { profiles })
    }

    /// Three desktop Chrome identities on different platforms, the latter two
    /// carrying a referer.
    pub fn browsers() -> Self {
        let profile = |name: &str, user_agent: &str, referer: Option<&str>| IdentityProfile {
            name: name.into(),
            user_agent: user_agent.into(),
            accept: ACCEPT_HTML.into(),
            accept_language: "en-US,en;q=0.5".into(),
            referer: referer.map(Into::into),
        };

        Self {
            profiles: vec![
                profile(
                    "windows-chrome",
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
                    None,
                ),
                profile(
                    "linux-chrome",
                    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                    Some("https://kenyalaw.org/"),
                ),
                profile(
                    "macos-chrome",
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                    Some("https://new.kenyalaw.org/"),
                ),
            ],
        }
    }

    pub fn size(&self) -> usize {
        self.profiles.len()
    }

    /// Index of the profile used for zero-based attempt `n`.
    pub fn index_for(&self, n: u32) -> usize {
        n as usize % self.profiles.len()
    }

    pub fn profile_for(&self, n: u32) -> &IdentityProfile {
        &self.profiles[self.index_for(n)]
    }

    pub fn profiles(&self) -> &[IdentityProfile] {
        &self.profiles
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::browsers()
    }
}
