use crate::classify::{PageSignals, UrlRules};
use crate::config::AuditConfig;
use crate::error::{AuditError, Result};
use crate::model::ClassificationResult;
use crate::report::sort_classifications;
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tpa_audit_scanner::{Crawler, LinkFilter, PageFetcher, ProgressCallback};
use tracing::info;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub run_date: NaiveDate,
    pub show_progress_bars: bool,
}

/// Crawl the configured site and classify every page reached.
///
/// The returned results hold one entry per visited URL, sorted for the report.
pub async fn execute_crawl(
    config: &AuditConfig,
    fetcher: Arc<dyn PageFetcher>,
    options: CrawlOptions,
) -> Result<Vec<ClassificationResult>> {
    let CrawlOptions {
        run_date,
        show_progress_bars,
    } = options;

    let rules = Arc::new(UrlRules::from_config(config, run_date)?);
    info!(
        "Crawling {} (pages from before {} are stale)",
        config.base_url,
        rules.cutoff_year()
    );

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .map_err(|e| AuditError::Config(e.to_string()))?,
        );
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let filter_rules = rules.clone();
    let link_filter: LinkFilter = Arc::new(move |url: &str| !filter_rules.denylist().should_skip(url));

    let mut crawler = Crawler::new(fetcher)
        .with_batch_size(config.crawl_batch_size)
        .with_max_depth(config.crawl_max_depth)
        .with_link_filter(link_filter);

    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let progress: ProgressCallback = Arc::new(move |visited: usize, queued: usize| {
            pb_clone.set_message(format!("Crawling... {} visited, {} queued", visited, queued));
            pb_clone.tick();
        });
        crawler = crawler.with_progress_callback(progress);
    }

    let visits = crawler
        .crawl(&config.base_url)
        .await
        .map_err(|e| AuditError::Config(format!("Cannot crawl {}: {}", config.base_url, e)))?;

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!("Crawl complete! {} URLs visited", visits.len()));
    }

    let mut results: Vec<ClassificationResult> = visits
        .iter()
        .map(|visit| rules.categorise(&visit.url, &PageSignals::from(visit)))
        .collect();
    sort_classifications(&mut results);

    Ok(results)
}
