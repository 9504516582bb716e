// Path heuristics for crawled site pages

use crate::config::AuditConfig;
use crate::error::{AuditError, Result};
use crate::model::{Category, ClassificationResult};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::collections::BTreeMap;
use tpa_audit_scanner::PageVisit;
use url::Url;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Lowercased path without trailing slash; the site root is `/`.
fn normalize_path(path: &str) -> String {
    let path = path.to_lowercase();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn canonical_path(url: &str) -> String {
    normalize_path(&extract_url_path(url))
}

/// Signals gathered while fetching a page.
#[derive(Debug, Clone, Default)]
pub struct PageSignals {
    pub fetch_error: Option<String>,
}

impl From<&PageVisit> for PageSignals {
    fn from(visit: &PageVisit) -> Self {
        Self {
            fetch_error: visit.error.clone(),
        }
    }
}

/// Known duplicate paths and the canonical page each duplicates.
#[derive(Debug, Clone, Default)]
pub struct DuplicateTable {
    entries: BTreeMap<String, String>,
}

impl DuplicateTable {
    pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(dup, canonical)| (normalize_path(dup), canonical.to_string()))
            .collect();
        Self { entries }
    }

    pub fn canonical_for(&self, url: &str) -> Option<&str> {
        self.entries.get(&canonical_path(url)).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compiled denylist. Matching is done against the full URL.
#[derive(Debug, Clone)]
pub struct Denylist {
    patterns: Vec<Regex>,
}

impl Denylist {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| AuditError::Config(format!("Invalid skip pattern {}: {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// The first pattern `url` matches, if any.
    pub fn matching_pattern(&self, url: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|re| re.is_match(url))
            .map(|re| re.as_str())
    }

    pub fn should_skip(&self, url: &str) -> bool {
        self.matching_pattern(url).is_some()
    }
}

/// Everything `categorise` needs, built once per run.
#[derive(Debug, Clone)]
pub struct UrlRules {
    base_url: String,
    cutoff_year: i32,
    denylist: Denylist,
    duplicates: DuplicateTable,
    year: Regex,
}

impl UrlRules {
    pub fn from_config(config: &AuditConfig, run_date: NaiveDate) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cutoff_year: config.cutoff_date(run_date).year(),
            denylist: Denylist::new(&config.skip_patterns)?,
            duplicates: DuplicateTable::new(
                config.duplicates.iter().map(|(d, c)| (d.as_str(), c.as_str())),
            ),
            year: Regex::new(r"(\d{4})").map_err(|e| AuditError::Config(e.to_string()))?,
        })
    }

    pub fn denylist(&self) -> &Denylist {
        &self.denylist
    }

    pub fn cutoff_year(&self) -> i32 {
        self.cutoff_year
    }

    fn path_year(&self, path: &str) -> Option<i32> {
        self.year
            .captures(path)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    fn stale_year(&self, path: &str) -> Option<i32> {
        self.path_year(path).filter(|y| *y < self.cutoff_year)
    }

    /// Map a URL and what was observed fetching it to a retention category.
    ///
    /// Rules are tried in order and the first hit wins. The duplicate table
    /// is consulted before anything else, and denylisted URLs can never come
    /// out as `KEEP`.
    pub fn categorise(&self, url: &str, signals: &PageSignals) -> ClassificationResult {
        let result = |category, reason: String| ClassificationResult::new(url, category, reason);
        let path = canonical_path(url);

        if let Some(canonical) = self.duplicates.canonical_for(url) {
            return result(
                Category::Duplicate,
                format!("Possible duplicate of {}{}", self.base_url, canonical),
            );
        }

        if let Some(pattern) = self.denylist.matching_pattern(url) {
            return result(Category::Review, format!("Matches skip pattern {}", pattern));
        }

        if let Some(ref error) = signals.fetch_error {
            return result(Category::Review, format!("Fetch failed: {}", error));
        }

        if path.contains("/gallery/") {
            return match self.stale_year(&path) {
                Some(year) => result(
                    Category::DeleteCandidate,
                    format!("Old gallery page from {}", year),
                ),
                None => result(Category::Keep, "Recent gallery page".to_string()),
            };
        }

        if path.contains("/event/") {
            return match self.stale_year(&path) {
                Some(year) => result(Category::DeleteCandidate, format!("Past event from {}", year)),
                None => result(
                    Category::Review,
                    "Past or upcoming event - check if still relevant".to_string(),
                ),
            };
        }

        if path.contains("/directory/") {
            return result(Category::Review, "Check if member is still active".to_string());
        }

        if path.contains("/filter_categories/") || path.contains("/directory_cat/") {
            return result(
                Category::Review,
                "Auto-generated category page - check if needed".to_string(),
            );
        }

        if path.contains("/webinar/") {
            return match self.stale_year(&path) {
                Some(year) => result(Category::DeleteCandidate, format!("Old webinar from {}", year)),
                None => result(Category::Keep, "Webinar page".to_string()),
            };
        }

        if path.contains("/article/") || path.contains("/whitepaper/") {
            return result(Category::Keep, "Content page".to_string());
        }

        if path.matches('/').count() <= 1 {
            return result(Category::Keep, "Core site page".to_string());
        }

        result(Category::Review, "No classification rule matched".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_path() {
        assert_eq!(canonical_path("https://example.org"), "/");
        assert_eq!(canonical_path("https://example.org/"), "/");
        assert_eq!(canonical_path("https://example.org/Members/Become-A-Member/"), "/members/become-a-member");
    }

    #[test]
    fn test_duplicate_table_lookup() {
        let table = DuplicateTable::new([("/members/directory-old/", "/directory")]);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.canonical_for("https://example.org/members/directory-old"),
            Some("/directory")
        );
        assert_eq!(table.canonical_for("https://example.org/directory"), None);
    }

    #[test]
    fn test_denylist_reports_pattern() {
        let denylist = Denylist::new(&["/author/".to_string(), r"\d{4}-\d{2}$".to_string()]).unwrap();
        assert_eq!(
            denylist.matching_pattern("https://example.org/author/jane"),
            Some("/author/")
        );
        assert_eq!(
            denylist.matching_pattern("https://example.org/events/2021-04"),
            Some(r"\d{4}-\d{2}$")
        );
        assert!(!denylist.should_skip("https://example.org/about-us"));
    }
}
