use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A URL sitting in (or drained from) the crawl frontier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredUrl {
    pub url: String,
    /// Number of non-empty path segments.
    pub depth: usize,
    pub visited: bool,
}

impl DiscoveredUrl {
    pub fn new(url: String, depth: usize) -> Self {
        Self {
            url,
            depth,
            visited: false,
        }
    }
}

/// Outcome of fetching one frontier URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageVisit {
    pub url: String,
    pub depth: usize,
    pub response_time: Duration,
    pub links_found: Vec<String>,
    pub error: Option<String>,
}

impl PageVisit {
    pub fn new(url: String, depth: usize) -> Self {
        Self {
            url,
            depth,
            response_time: Duration::from_secs(0),
            links_found: Vec::new(),
            error: None,
        }
    }

    pub fn with_error(url: String, depth: usize, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url, depth)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A fetched document body. `status_code` is `None` when the page came from
/// the browser, which does not surface the document's response status.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status_code: Option<u16>,
    pub body: String,
}
