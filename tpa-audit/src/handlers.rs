use anyhow::Context;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tpa_audit_core::audit::{ArticleAuditOptions, execute_article_audit};
use tpa_audit_core::crawl::{CrawlOptions, execute_crawl};
use tpa_audit_core::report::{
    generate_article_summary, generate_crawl_summary, write_article_report, write_crawl_report,
};
use tpa_audit_core::AuditConfig;
use tpa_audit_scanner::{BrowserFetcher, HttpFetcher, PageFetcher};
use tracing::{info, warn};

/// Everything a subcommand needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: AuditConfig,
    pub output_dir: PathBuf,
    pub run_date: NaiveDate,
    pub quiet: bool,
}

impl RunContext {
    pub fn new(
        config_path: Option<&str>,
        output_root: Option<&str>,
        run_date: NaiveDate,
        quiet: bool,
    ) -> anyhow::Result<Self> {
        let mut config = load_config(config_path)?;
        if let Some(root) = output_root {
            config.output_root = expand_path(root);
        }
        let output_dir = config.output_dir(run_date);

        Ok(Self {
            config,
            output_dir,
            run_date,
            quiet,
        })
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Built-in settings, overridden field by field from `config_path` when given.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<AuditConfig> {
    let config = match config_path {
        Some(path) => {
            let path = expand_path(path);
            let config = AuditConfig::from_file(&path)?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => {
            let config = AuditConfig::default();
            config.validate()?;
            config
        }
    };

    let output_root = config.output_root.to_string_lossy().into_owned();
    Ok(AuditConfig {
        output_root: expand_path(&output_root),
        ..config
    })
}

fn http_fetcher(config: &AuditConfig) -> anyhow::Result<HttpFetcher> {
    HttpFetcher::with_timeout(config.request_timeout_secs, &config.user_agent)
        .context("Failed to build HTTP client")
}

/// Crawl the site, write `tpa_audit.csv` and print the summary.
pub async fn handle_crawl(ctx: &RunContext, use_http: bool) -> anyhow::Result<PathBuf> {
    let options = CrawlOptions {
        run_date: ctx.run_date,
        show_progress_bars: !ctx.quiet,
    };

    let results = if use_http {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(http_fetcher(&ctx.config)?);
        execute_crawl(&ctx.config, fetcher, options).await?
    } else {
        let browser = Arc::new(
            BrowserFetcher::launch(Duration::from_secs(ctx.config.page_timeout_secs))
                .await
                .context("Failed to launch headless browser")?,
        );
        let fetcher: Arc<dyn PageFetcher> = browser.clone();
        let outcome = execute_crawl(&ctx.config, fetcher, options).await;

        match Arc::try_unwrap(browser) {
            Ok(browser) => {
                if let Err(e) = browser.close().await {
                    warn!("Browser did not shut down cleanly: {}", e);
                }
            }
            Err(_) => warn!("Browser still in use, leaving it to exit with the process"),
        }
        outcome?
    };

    let path = write_crawl_report(&results, &ctx.output_dir)
        .with_context(|| format!("Failed to write report to {}", ctx.output_dir.display()))?;
    println!("{}", generate_crawl_summary(&results, &path));
    Ok(path)
}

/// Audit every article in the sitemap, write `tpa_articles_audit.csv` and print the summary.
pub async fn handle_articles(ctx: &RunContext) -> anyhow::Result<PathBuf> {
    let fetcher: Arc<dyn PageFetcher> = Arc::new(http_fetcher(&ctx.config)?);
    let options = ArticleAuditOptions {
        run_date: ctx.run_date,
        show_progress_bars: !ctx.quiet,
    };

    let records = execute_article_audit(&ctx.config, fetcher, options).await?;

    let path = write_article_report(&records, &ctx.output_dir)
        .with_context(|| format!("Failed to write report to {}", ctx.output_dir.display()))?;
    println!("{}", generate_article_summary(&records, &path));
    Ok(path)
}

/// Report location relative to the working directory when possible.
pub fn display_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(|p| p.display().to_string()))
        .unwrap_or_else(|| path.display().to_string())
}
