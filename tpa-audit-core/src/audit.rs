// Sitemap-driven article audit

use crate::article::ArticleExtractor;
use crate::config::AuditConfig;
use crate::error::{AuditError, Result};
use crate::model::ArticleRecord;
use crate::report::sort_articles;
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tpa_audit_scanner::PageFetcher;
use tpa_audit_scanner::sitemap::fetch_article_urls;
use tracing::{info, warn};

const PROGRESS_LOG_EVERY: usize = 200;

pub struct ArticleAuditOptions {
    pub run_date: NaiveDate,
    pub show_progress_bars: bool,
}

/// Fetch and classify one article. Never fails: problems become a REVIEW record.
pub async fn audit_article(
    fetcher: &dyn PageFetcher,
    extractor: &ArticleExtractor,
    url: &str,
) -> ArticleRecord {
    match fetcher.fetch(url).await {
        Ok(page) => {
            let record = extractor.extract(url, &page.body);
            info!(
                "{} [{}] {} {}",
                record.category,
                record.article_type,
                record.published_label(),
                record.title.chars().take(60).collect::<String>()
            );
            record
        }
        Err(e) => {
            let error = AuditError::from(e);
            warn!("✗ {}: {}", url, error);
            ArticleRecord::failed(url, format!("Fetch failed: {}", error))
        }
    }
}

/// Enumerate articles from the sitemap index and audit each one concurrently.
///
/// An unreachable or unreadable sitemap aborts the run; failures on
/// individual articles are recorded and the batch carries on.
pub async fn execute_article_audit(
    config: &AuditConfig,
    fetcher: Arc<dyn PageFetcher>,
    options: ArticleAuditOptions,
) -> Result<Vec<ArticleRecord>> {
    let ArticleAuditOptions {
        run_date,
        show_progress_bars,
    } = options;

    let sitemap_url = config.sitemap_url();
    let urls = fetch_article_urls(
        fetcher.as_ref(),
        &sitemap_url,
        &config.article_sitemap_marker,
        &config.article_path_marker,
    )
    .await
    .map_err(|e| AuditError::Config(format!("Sitemap {} unavailable: {}", sitemap_url, e)))?;

    let total = urls.len();
    info!(
        "Auditing {} articles ({} concurrent)",
        total, config.article_concurrency
    );

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, eta {eta})")
                .map_err(|e| AuditError::Config(e.to_string()))?
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let extractor = Arc::new(ArticleExtractor::from_config(config, run_date));
    let semaphore = Arc::new(Semaphore::new(config.article_concurrency));
    let completed = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::with_capacity(total);
    for url in urls {
        let fetcher = fetcher.clone();
        let extractor = extractor.clone();
        let semaphore = semaphore.clone();
        let completed = completed.clone();
        let pb = progress_bar.clone();
        let task_url = url.clone();

        let task = tokio::spawn(async move {
            let record = match semaphore.acquire().await {
                Ok(_permit) => audit_article(fetcher.as_ref(), &extractor, &task_url).await,
                Err(e) => ArticleRecord::failed(&task_url, format!("Not scheduled: {}", e)),
            };

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref pb) = pb {
                pb.inc(1);
            }
            if done % PROGRESS_LOG_EVERY == 0 {
                info!("Progress: {}/{} ({}%)", done, total, done * 100 / total.max(1));
            }
            record
        });
        tasks.push((url, task));
    }

    let mut records = Vec::with_capacity(total);
    for (url, task) in tasks {
        match task.await {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Article task for {} failed: {}", url, e);
                records.push(ArticleRecord::failed(url, format!("Task failed: {}", e)));
            }
        }
    }

    if let Some(ref pb) = progress_bar {
        pb.finish_and_clear();
    }

    sort_articles(&mut records);
    Ok(records)
}
