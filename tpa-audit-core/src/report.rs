// CSV reports and console summaries

use crate::error::Result;
use crate::model::{ArticleRecord, Category, ClassificationResult};
use colored::Colorize;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CRAWL_REPORT_FILE: &str = "tpa_audit.csv";
pub const ARTICLE_REPORT_FILE: &str = "tpa_articles_audit.csv";

pub const CRAWL_COLUMNS: [&str; 3] = ["url", "status", "reason"];
pub const ARTICLE_COLUMNS: [&str; 8] = [
    "url",
    "title",
    "author",
    "published_date",
    "article_type",
    "type_source",
    "status",
    "reason",
];

/// Actionable categories first, then URL.
pub fn sort_classifications(results: &mut [ClassificationResult]) {
    results.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.url.cmp(&b.url)));
}

/// Oldest first, undated last, then URL.
pub fn sort_articles(records: &mut [ArticleRecord]) {
    records.sort_by(|a, b| {
        (a.published.is_none(), a.published, &a.url).cmp(&(b.published.is_none(), b.published, &b.url))
    });
}

#[derive(Debug, Serialize)]
struct ArticleRow<'a> {
    url: &'a str,
    title: &'a str,
    author: &'a str,
    published_date: String,
    article_type: &'a str,
    type_source: &'static str,
    status: Category,
    reason: &'a str,
}

impl<'a> From<&'a ArticleRecord> for ArticleRow<'a> {
    fn from(record: &'a ArticleRecord) -> Self {
        Self {
            url: &record.url,
            title: &record.title,
            author: &record.author,
            published_date: record.published_label(),
            article_type: &record.article_type,
            type_source: record.type_source.as_str(),
            status: record.category,
            reason: &record.reason,
        }
    }
}

/// The header is written up front so an empty report still carries its columns.
fn write_rows<T: Serialize>(
    dir: &Path,
    file_name: &str,
    columns: &[&str],
    rows: impl IntoIterator<Item = (String, T)>,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)?;
    writer.write_record(columns)?;

    let mut written = HashSet::new();
    for (url, row) in rows {
        if !written.insert(url.clone()) {
            warn!("Dropping repeated row for {}", url);
            continue;
        }
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!("Wrote {} rows to {}", written.len(), path.display());
    Ok(path)
}

/// Write the crawl report (`url,status,reason`) into `dir`, creating it if needed.
pub fn write_crawl_report(results: &[ClassificationResult], dir: &Path) -> Result<PathBuf> {
    write_rows(
        dir,
        CRAWL_REPORT_FILE,
        &CRAWL_COLUMNS,
        results.iter().map(|r| (r.url.clone(), r)),
    )
}

/// Write the article report into `dir`, creating it if needed.
pub fn write_article_report(records: &[ArticleRecord], dir: &Path) -> Result<PathBuf> {
    write_rows(
        dir,
        ARTICLE_REPORT_FILE,
        &ARTICLE_COLUMNS,
        records.iter().map(|r| (r.url.clone(), ArticleRow::from(r))),
    )
}

pub fn count_categories<'a>(categories: impl IntoIterator<Item = &'a Category>) -> BTreeMap<Category, usize> {
    let mut counts: BTreeMap<Category, usize> = Category::ALL.iter().map(|c| (*c, 0)).collect();
    for category in categories {
        *counts.entry(*category).or_default() += 1;
    }
    counts
}

fn colored_category(category: Category) -> String {
    let label = format!("{:<16}", category.as_str());
    match category {
        Category::DeleteCandidate => label.red().bold().to_string(),
        Category::Duplicate => label.magenta().bold().to_string(),
        Category::Review => label.yellow().to_string(),
        Category::Keep => label.green().to_string(),
    }
}

fn push_category_counts(report: &mut String, counts: &BTreeMap<Category, usize>, include_duplicates: bool) {
    for (category, count) in counts {
        if *category == Category::Duplicate && !include_duplicates {
            continue;
        }
        report.push_str(&format!("  {} : {}\n", colored_category(*category), count));
    }
}

/// Generate a crawl summary from results
pub fn generate_crawl_summary(results: &[ClassificationResult], output_path: &Path) -> String {
    let counts = count_categories(results.iter().map(|r| &r.category));

    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str(&format!(
        "Found {} URLs saved to {}\n\n",
        results.len(),
        output_path.display()
    ));
    push_category_counts(&mut report, &counts, true);
    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    report
}

/// Generate an article audit summary, including a per-type breakdown
pub fn generate_article_summary(records: &[ArticleRecord], output_path: &Path) -> String {
    let counts = count_categories(records.iter().map(|r| &r.category));

    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *by_type.entry(record.article_type.as_str()).or_default() += 1;
    }
    let mut by_type: Vec<(&str, usize)> = by_type.into_iter().collect();
    by_type.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str(&format!(
        "{} articles saved to {}\n\n",
        records.len(),
        output_path.display()
    ));
    push_category_counts(&mut report, &counts, false);

    report.push_str("\nArticle types:\n");
    for (article_type, count) in by_type {
        report.push_str(&format!("  {:<30} {}\n", article_type, count));
    }
    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    report
}
