use crate::error::{Result, ScanError};
use crate::result::FetchedPage;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Anything that can turn a URL into a document body.
///
/// The crawler renders pages through a headless browser because parts of the
/// site build their navigation client-side; the article auditor only needs the
/// server-rendered HTML and uses the plain HTTP client.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

pub struct HttpFetcher {
    client: Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(20, DEFAULT_USER_AGENT)
    }

    pub fn with_timeout(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ScanError::Timeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                ScanError::HttpError(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchedPage {
            url: final_url,
            status_code: Some(status.as_u16()),
            body,
        })
    }
}

/// Headless Chromium driven over CDP. One tab per fetch, closed afterwards.
pub struct BrowserFetcher {
    browser: Browser,
    handler: JoinHandle<()>,
    page_timeout: Duration,
}

impl BrowserFetcher {
    pub async fn launch(page_timeout: Duration) -> Result<Self> {
        let config = BrowserConfig::builder()
            .request_timeout(page_timeout)
            .build()
            .map_err(ScanError::BrowserError)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        // The CDP handler has to be polled for the browser to make progress
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        info!("Launched headless browser");
        Ok(Self {
            browser,
            handler,
            page_timeout,
        })
    }

    fn timeout_error(&self, url: &str) -> ScanError {
        ScanError::Timeout {
            url: url.to_string(),
            secs: self.page_timeout.as_secs(),
        }
    }

    /// Load `url` in a fresh tab and return the final URL and rendered DOM.
    async fn render(&self, url: &str) -> Result<(String, String)> {
        let page = tokio::time::timeout(self.page_timeout, self.browser.new_page("about:blank"))
            .await
            .map_err(|_| self.timeout_error(url))??;

        let tab = page.clone();
        let tab_url = url.to_string();
        let close_tab = async move {
            if let Err(e) = tab.close().await {
                debug!("Failed to close tab for {}: {}", tab_url, e);
            }
        };

        let load = async {
            page.goto(url).await?;
            let final_url = page.url().await?.unwrap_or_else(|| url.to_string());
            let body = page.content().await?;
            Ok::<_, ScanError>((final_url, body))
        };

        within_deadline(self.page_timeout, load, close_tab)
            .await
            .ok_or_else(|| self.timeout_error(url))?
    }

    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        self.handler.await?;
        Ok(())
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        debug!("Rendering {}", url);

        let (final_url, body) = self.render(url).await?;

        Ok(FetchedPage {
            url: final_url,
            status_code: None,
            body,
        })
    }
}

/// Run `work` for at most `limit`, then run `cleanup` whether or not it finished.
/// `None` means the deadline passed.
async fn within_deadline<T>(
    limit: Duration,
    work: impl Future<Output = T>,
    cleanup: impl Future<Output = ()>,
) -> Option<T> {
    let outcome = tokio::time::timeout(limit, work).await.ok();
    cleanup.await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_runs_when_deadline_passes() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let flag = cleaned.clone();

        let outcome = within_deadline(
            Duration::from_secs(30),
            std::future::pending::<()>(),
            async move { flag.store(true, Ordering::SeqCst) },
        )
        .await;

        assert!(outcome.is_none());
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cleanup_runs_after_work_completes() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let flag = cleaned.clone();

        let outcome = within_deadline(
            Duration::from_secs(30),
            async { "rendered" },
            async move { flag.store(true, Ordering::SeqCst) },
        )
        .await;

        assert_eq!(outcome, Some("rendered"));
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_http_fetch_returns_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/about-us"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>About</html>"))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let page = fetcher
            .fetch(&format!("{}/about-us", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(page.status_code, Some(200));
        assert!(page.body.contains("About"));
    }

    #[tokio::test]
    async fn test_http_fetch_non_success_is_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher
            .fetch(&format!("{}/gone", mock_server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Status { status: 404, .. }));
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_http_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::with_timeout(1, DEFAULT_USER_AGENT).unwrap();
        let err = fetcher
            .fetch(&format!("{}/slow", mock_server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Timeout { secs: 1, .. }));
    }
}
