use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const UNKNOWN: &str = "unknown";

/// Retention decision for a page or article.
///
/// Variant order is report order: the actionable categories sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    DeleteCandidate,
    Duplicate,
    Review,
    Keep,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::DeleteCandidate,
        Category::Duplicate,
        Category::Review,
        Category::Keep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DeleteCandidate => "DELETE_CANDIDATE",
            Category::Duplicate => "DUPLICATE",
            Category::Review => "REVIEW",
            Category::Keep => "KEEP",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub url: String,
    #[serde(rename = "status")]
    pub category: Category,
    pub reason: String,
}

impl ClassificationResult {
    pub fn new(url: impl Into<String>, category: Category, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category,
            reason: reason.into(),
        }
    }
}

/// Which step of the article type fallback chain produced the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSource {
    ContainerType,
    Breadcrumb,
    CategoryClass,
    None,
}

impl TypeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeSource::ContainerType => "container_type",
            TypeSource::Breadcrumb => "breadcrumb",
            TypeSource::CategoryClass => "category_class",
            TypeSource::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub url: String,
    pub title: String,
    pub author: String,
    pub published: Option<NaiveDate>,
    pub article_type: String,
    pub type_source: TypeSource,
    pub category: Category,
    pub reason: String,
}

impl ArticleRecord {
    /// Placeholder for an article whose page could not be fetched or parsed.
    pub fn failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: UNKNOWN.to_string(),
            author: UNKNOWN.to_string(),
            published: None,
            article_type: UNKNOWN.to_string(),
            type_source: TypeSource::None,
            category: Category::Review,
            reason: reason.into(),
        }
    }

    pub fn published_label(&self) -> String {
        self.published
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}
