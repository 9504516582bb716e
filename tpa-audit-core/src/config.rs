// Run configuration shared by both pipelines

use crate::error::{AuditError, Result};
use chrono::{Months, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://thepaymentsassociation.org";
pub const MAX_RETENTION_YEARS: u32 = 100;

/// What to do with a type slug that has no entry in the label table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmappedSlugPolicy {
    /// `open-banking` becomes `Open Banking`
    #[default]
    TitleCase,
    /// Treat the slug as unresolved and fall through to the next strategy
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub base_url: String,
    pub sitemap_path: String,
    /// Child sitemaps of the index are read only if their URL contains this.
    pub article_sitemap_marker: String,
    /// Sitemap URLs are treated as articles only if they contain this.
    pub article_path_marker: String,
    pub output_root: PathBuf,
    pub crawl_batch_size: usize,
    pub crawl_max_depth: usize,
    pub article_concurrency: usize,
    pub request_timeout_secs: u64,
    pub page_timeout_secs: u64,
    pub user_agent: String,
    pub retention_years: u32,
    pub skip_patterns: Vec<String>,
    /// Duplicate path to the canonical path it duplicates.
    pub duplicates: BTreeMap<String, String>,
    /// Type slug to display label.
    pub type_labels: BTreeMap<String, String>,
    pub unmapped_slugs: UnmappedSlugPolicy,
    /// Stripped from the end of page titles.
    pub title_suffix: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            sitemap_path: "/sitemap.xml".to_string(),
            article_sitemap_marker: "post-sitemap".to_string(),
            article_path_marker: "/article/".to_string(),
            output_root: PathBuf::from("data").join("tpa-audit"),
            crawl_batch_size: 10,
            crawl_max_depth: 2,
            article_concurrency: 20,
            request_timeout_secs: 20,
            page_timeout_secs: 30,
            user_agent: tpa_audit_scanner::fetcher::DEFAULT_USER_AGENT.to_string(),
            retention_years: 3,
            skip_patterns: [
                r"/events/tag/",
                r"/events/category/",
                r"/day/",
                r"\d{4}-\d{2}$",
                r"\d{4}-\d{2}-\d{2}",
                r"\?",
                r"/page/",
                r"/feed/",
                r"/author/",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            duplicates: [
                ("/members/become-a-member", "/become-a-member"),
                ("/members/purchase-membership", "/purchase-membership"),
                ("/members/terms-and-conditions", "/terms-and-conditions"),
                ("/members/directory-old", "/directory"),
            ]
            .iter()
            .map(|(dup, canonical)| (dup.to_string(), canonical.to_string()))
            .collect(),
            type_labels: [
                ("thought-leadership-quarterly", "Thought Leadership"),
                ("thought-leadership", "Thought Leadership"),
                ("payments-intelligence", "Payments Intelligence"),
            ]
            .iter()
            .map(|(slug, label)| (slug.to_string(), label.to_string()))
            .collect(),
            unmapped_slugs: UnmappedSlugPolicy::default(),
            title_suffix: " | The Payments Association".to_string(),
        }
    }
}

impl AuditConfig {
    /// Load a JSON file; fields it leaves out keep their built-in values.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AuditError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: AuditConfig = serde_json::from_str(&content).map_err(|e| {
            AuditError::Config(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| AuditError::Config(format!("Invalid base_url {}: {}", self.base_url, e)))?;
        if base.host_str().is_none() {
            return Err(AuditError::Config(format!("base_url {} has no host", self.base_url)));
        }
        if self.crawl_batch_size == 0 || self.article_concurrency == 0 {
            return Err(AuditError::Config(
                "crawl_batch_size and article_concurrency must be at least 1".to_string(),
            ));
        }
        if self.retention_years > MAX_RETENTION_YEARS {
            return Err(AuditError::Config(format!(
                "retention_years must be at most {}, got {}",
                MAX_RETENTION_YEARS, self.retention_years
            )));
        }
        for pattern in &self.skip_patterns {
            Regex::new(pattern).map_err(|e| {
                AuditError::Config(format!("Invalid skip pattern {}: {}", pattern, e))
            })?;
        }
        Ok(())
    }

    pub fn sitemap_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.sitemap_path)
    }

    /// Content published before this date is past retention.
    pub fn cutoff_date(&self, run_date: NaiveDate) -> NaiveDate {
        run_date
            .checked_sub_months(Months::new(self.retention_years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// `<output_root>/<YYYY-MM-DD>`
    pub fn output_dir(&self, run_date: NaiveDate) -> PathBuf {
        self.output_root.join(run_date.format("%Y-%m-%d").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = AuditConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sitemap_url(), "https://thepaymentsassociation.org/sitemap.xml");
        assert_eq!(config.crawl_batch_size, 10);
        assert_eq!(config.article_concurrency, 20);
    }

    #[test]
    fn test_cutoff_date_is_three_calendar_years_back() {
        let config = AuditConfig::default();
        let run = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(config.cutoff_date(run), NaiveDate::from_ymd_opt(2023, 10, 16).unwrap());

        let leap = NaiveDate::from_ymd_opt(2028, 2, 29).unwrap();
        assert_eq!(config.cutoff_date(leap), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    }

    #[test]
    fn test_output_dir_is_dated() {
        let config = AuditConfig::default();
        let run = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(
            config.output_dir(run),
            PathBuf::from("data").join("tpa-audit").join("2026-01-05")
        );
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"article_concurrency": 5, "unmapped_slugs": "unknown",
                "type_labels": {{"open-banking": "Open Banking"}}}}"#
        )
        .unwrap();

        let config = AuditConfig::from_file(file.path()).unwrap();
        assert_eq!(config.article_concurrency, 5);
        assert_eq!(config.unmapped_slugs, UnmappedSlugPolicy::Unknown);
        assert_eq!(config.type_labels.len(), 1);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.crawl_batch_size, 10);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"skip_patterns": ["("]}}"#).unwrap();
        assert!(matches!(AuditConfig::from_file(file.path()), Err(AuditError::Config(_))));

        let config = AuditConfig {
            base_url: "not a url".to_string(),
            ..AuditConfig::default()
        };
        assert!(matches!(config.validate(), Err(AuditError::Config(_))));
    }

    #[test]
    fn test_retention_years_bounded() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"retention_years": 4294967295}}"#).unwrap();
        assert!(matches!(AuditConfig::from_file(file.path()), Err(AuditError::Config(_))));

        let config = AuditConfig {
            retention_years: MAX_RETENTION_YEARS,
            ..AuditConfig::default()
        };
        assert!(config.validate().is_ok());

        let run = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(config.cutoff_date(run), NaiveDate::from_ymd_opt(1926, 10, 16).unwrap());

        let unchecked = AuditConfig {
            retention_years: u32::MAX,
            ..AuditConfig::default()
        };
        assert_eq!(unchecked.cutoff_date(run), NaiveDate::MIN);
    }
}
