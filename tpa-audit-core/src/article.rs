// Article metadata extraction from server-rendered WordPress pages

use crate::config::{AuditConfig, UnmappedSlugPolicy};
use crate::model::{ArticleRecord, Category, TypeSource, UNKNOWN};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Structured data pulled from the page's `application/ld+json` blocks.
#[derive(Debug, Clone, Default)]
pub struct LinkedData {
    /// The graph node carrying `datePublished`.
    pub article: Option<Map<String, Value>>,
    /// Name of the second `BreadcrumbList` entry (the first is Home).
    pub breadcrumb_section: Option<String>,
    /// Blocks that failed to parse.
    pub errors: Vec<String>,
}

impl LinkedData {
    fn article_str(&self, key: &str) -> Option<&str> {
        self.article
            .as_ref()?
            .get(key)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn headline(&self) -> Option<&str> {
        self.article_str("headline")
    }

    pub fn date_published(&self) -> Option<&str> {
        self.article_str("datePublished")
    }

    /// `author` may be a single object or a list; the first name wins.
    pub fn author(&self) -> Option<&str> {
        let author = self.article.as_ref()?.get("author")?;
        let author = match author {
            Value::Array(items) => items.first()?,
            other => other,
        };
        let name = match author {
            Value::Object(obj) => obj.get("name")?.as_str(),
            Value::String(name) => Some(name.as_str()),
            _ => None,
        };
        name.map(str::trim).filter(|s| !s.is_empty())
    }
}

fn graph_nodes(data: Value) -> Option<Vec<Value>> {
    match data {
        Value::Object(mut obj) => match obj.remove("@graph") {
            Some(Value::Array(nodes)) => Some(nodes),
            Some(_) => None,
            None => Some(vec![Value::Object(obj)]),
        },
        Value::Array(nodes) => Some(nodes),
        _ => None,
    }
}

fn has_type(node: &Value, wanted: &str) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => t == wanted,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}

fn breadcrumb_section(node: &Value) -> Option<String> {
    let item = node.get("itemListElement")?.as_array()?.get(1)?;
    let name = item
        .get("name")
        .or_else(|| item.get("item").and_then(|i| i.get("name")))?
        .as_str()?
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}

pub fn extract_linked_data(document: &Html) -> LinkedData {
    let mut linked = LinkedData::default();
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return linked;
    };

    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        let data: Value = match serde_json::from_str(raw.trim()) {
            Ok(data) => data,
            Err(e) => {
                debug!("Skipping malformed JSON-LD block: {}", e);
                linked.errors.push(e.to_string());
                continue;
            }
        };
        let Some(nodes) = graph_nodes(data) else {
            continue;
        };

        if linked.breadcrumb_section.is_none() {
            linked.breadcrumb_section = nodes
                .iter()
                .find(|n| has_type(n, "BreadcrumbList"))
                .and_then(breadcrumb_section);
        }

        if linked.article.is_none() {
            linked.article = nodes
                .into_iter()
                .find(|n| n.get("datePublished").is_some())
                .and_then(|n| match n {
                    Value::Object(obj) => Some(obj),
                    _ => None,
                });
        }

        if linked.article.is_some() && linked.breadcrumb_section.is_some() {
            break;
        }
    }

    linked
}

/// The parts of an article page the extractors look at.
#[derive(Debug, Clone, Default)]
pub struct ArticlePage {
    pub linked: LinkedData,
    /// Classes of the main article container, in document order.
    pub container_classes: Vec<String>,
    pub title_tag: Option<String>,
}

impl ArticlePage {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);

        let container_classes = Selector::parse(r#"[class*="elementor-location-single"]"#)
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .and_then(|el| el.value().attr("class"))
            .map(|classes| classes.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let title_tag = Selector::parse("title")
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        Self {
            linked: extract_linked_data(&document),
            container_classes,
            title_tag,
        }
    }

    /// Slug of the first container class starting with `prefix`.
    pub fn class_slug(&self, prefix: &str) -> Option<&str> {
        self.container_classes
            .iter()
            .filter_map(|c| c.strip_prefix(prefix))
            .find(|slug| !slug.is_empty())
    }
}

/// Slug to display label normalisation.
#[derive(Debug, Clone, Default)]
pub struct TypeLabels {
    labels: BTreeMap<String, String>,
    policy: UnmappedSlugPolicy,
}

impl TypeLabels {
    pub fn new(labels: BTreeMap<String, String>, policy: UnmappedSlugPolicy) -> Self {
        Self { labels, policy }
    }

    /// `None` when the slug is unmapped and the policy says to treat it as unknown.
    pub fn label_for_slug(&self, slug: &str) -> Option<String> {
        let slug = slug.trim().to_lowercase();
        if slug.is_empty() {
            return None;
        }
        if let Some(label) = self.labels.get(&slug) {
            return Some(label.clone());
        }
        match self.policy {
            UnmappedSlugPolicy::TitleCase => Some(title_case(&slug)),
            UnmappedSlugPolicy::Unknown => None,
        }
    }

    /// Normalise text that is already meant for display, such as a breadcrumb name.
    pub fn label_for_display(&self, label: &str) -> Option<String> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        if self.labels.values().any(|l| l == label) {
            return Some(label.to_string());
        }
        if let Some(mapped) = self.labels.get(&slugify(label)) {
            return Some(mapped.clone());
        }
        match self.policy {
            UnmappedSlugPolicy::TitleCase => Some(label.to_string()),
            UnmappedSlugPolicy::Unknown => None,
        }
    }
}

pub fn title_case(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn slugify(label: &str) -> String {
    label
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// One step of the article type fallback chain.
pub trait TypeStrategy: Send + Sync {
    fn source(&self) -> TypeSource;
    fn try_extract(&self, page: &ArticlePage, labels: &TypeLabels) -> Option<String>;
}

/// `filter_types-<slug>` on the article container.
pub struct ContainerTypeClass;

impl TypeStrategy for ContainerTypeClass {
    fn source(&self) -> TypeSource {
        TypeSource::ContainerType
    }

    fn try_extract(&self, page: &ArticlePage, labels: &TypeLabels) -> Option<String> {
        labels.label_for_slug(page.class_slug("filter_types-")?)
    }
}

/// Second entry of the JSON-LD breadcrumb trail.
pub struct BreadcrumbSection;

impl TypeStrategy for BreadcrumbSection {
    fn source(&self) -> TypeSource {
        TypeSource::Breadcrumb
    }

    fn try_extract(&self, page: &ArticlePage, labels: &TypeLabels) -> Option<String> {
        labels.label_for_display(page.linked.breadcrumb_section.as_deref()?)
    }
}

/// `category-<slug>` on the article container.
pub struct CategoryClass;

impl TypeStrategy for CategoryClass {
    fn source(&self) -> TypeSource {
        TypeSource::CategoryClass
    }

    fn try_extract(&self, page: &ArticlePage, labels: &TypeLabels) -> Option<String> {
        labels.label_for_slug(page.class_slug("category-")?)
    }
}

pub struct TypeChain {
    strategies: Vec<Box<dyn TypeStrategy>>,
}

impl Default for TypeChain {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(ContainerTypeClass),
                Box::new(BreadcrumbSection),
                Box::new(CategoryClass),
            ],
        }
    }
}

impl TypeChain {
    pub fn new(strategies: Vec<Box<dyn TypeStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn resolve(&self, page: &ArticlePage, labels: &TypeLabels) -> (String, TypeSource) {
        self.strategies
            .iter()
            .find_map(|s| s.try_extract(page, labels).map(|t| (t, s.source())))
            .unwrap_or_else(|| (UNKNOWN.to_string(), TypeSource::None))
    }
}

/// Accepts RFC 3339, a naive ISO timestamp or a bare `YYYY-MM-DD`.
pub fn parse_publish_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|d| d.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Everything needed to turn an article page into an `ArticleRecord`.
pub struct ArticleExtractor {
    chain: TypeChain,
    labels: TypeLabels,
    title_suffix: String,
    cutoff: NaiveDate,
    retention_years: u32,
}

impl ArticleExtractor {
    pub fn from_config(config: &AuditConfig, run_date: NaiveDate) -> Self {
        Self {
            chain: TypeChain::default(),
            labels: TypeLabels::new(config.type_labels.clone(), config.unmapped_slugs),
            title_suffix: config.title_suffix.clone(),
            cutoff: config.cutoff_date(run_date),
            retention_years: config.retention_years,
        }
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    /// Published before the cutoff is a delete candidate; no date means review.
    pub fn classify_age(&self, published: Option<NaiveDate>) -> (Category, String) {
        match published {
            Some(date) if date < self.cutoff => (
                Category::DeleteCandidate,
                format!(
                    "Published {} - over {} years old",
                    date.format("%b %Y"),
                    self.retention_years
                ),
            ),
            Some(date) => (Category::Keep, format!("Published {}", date.format("%b %Y"))),
            None => (Category::Review, "Could not determine publish date".to_string()),
        }
    }

    pub fn extract(&self, url: &str, html: &str) -> ArticleRecord {
        let page = ArticlePage::parse(html);

        let title = page
            .linked
            .headline()
            .or(page.title_tag.as_deref())
            .map(|t| {
                let t = t.trim();
                t.strip_suffix(self.title_suffix.as_str()).unwrap_or(t).trim().to_string()
            })
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let author = page.linked.author().unwrap_or(UNKNOWN).to_string();
        let raw_date = page.linked.date_published();
        let published = raw_date.and_then(parse_publish_date);
        let (article_type, type_source) = self.chain.resolve(&page, &self.labels);
        let (category, mut reason) = self.classify_age(published);

        if published.is_none() {
            if let Some(raw) = raw_date {
                reason = format!("{} (unparseable datePublished {:?})", reason, raw);
            } else if let Some(error) = page.linked.errors.first() {
                reason = format!("{} (malformed JSON-LD: {})", reason, error);
            }
        }

        ArticleRecord {
            url: url.to_string(),
            title,
            author,
            published,
            article_type,
            type_source,
            category,
            reason,
        }
    }
}
