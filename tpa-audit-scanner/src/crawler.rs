use crate::error::{Result, ScanError};
use crate::fetcher::PageFetcher;
use crate::result::{DiscoveredUrl, PageVisit};
use futures::future::join_all;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Returns false for URLs that must never enter the frontier.
pub type LinkFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;
/// Called after each batch with (visited so far, still queued).
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    batch_size: usize,
    max_depth: usize,
    link_filter: Option<LinkFilter>,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            batch_size: 10,
            max_depth: 2,
            link_filter: None,
            progress_callback: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_link_filter(mut self, filter: LinkFilter) -> Self {
        self.link_filter = Some(filter);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Breadth-first crawl from `start_url`, fetching the frontier in batches.
    ///
    /// Every URL that was taken off the frontier appears exactly once in the
    /// returned visits, whether its fetch succeeded or not. The start URL is
    /// always fetched; the depth bound and link filter apply to discovered links.
    pub async fn crawl(&self, start_url: &str) -> Result<Vec<PageVisit>> {
        let parsed = Url::parse(start_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;
        let authority = authority(&parsed)
            .ok_or_else(|| ScanError::InvalidUrl(format!("{} has no host", start_url)))?;

        info!(
            "Starting crawl of {} (batch size {}, max depth {})",
            start_url, self.batch_size, self.max_depth
        );

        let start = normalize_url(&parsed);
        let mut seen: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<DiscoveredUrl> = VecDeque::new();
        seen.insert(start.clone());
        frontier.push_back(DiscoveredUrl::new(start.clone(), path_depth(&start)));

        let mut visits = Vec::new();

        loop {
            let mut batch = Vec::with_capacity(self.batch_size);
            while batch.len() < self.batch_size {
                let Some(mut next) = frontier.pop_front() else {
                    break;
                };
                if next.url != start && !self.accepts(&next.url) {
                    debug!("Skipping {}", next.url);
                    continue;
                }
                next.visited = true;
                batch.push(next);
            }

            if batch.is_empty() {
                break;
            }

            info!(
                "Batch of {} | Visited: {} | Queue: {}",
                batch.len(),
                visits.len(),
                frontier.len()
            );

            let outcomes = join_all(batch.iter().map(|item| self.visit(item, &authority))).await;

            for visit in outcomes {
                for link in &visit.links_found {
                    if seen.insert(link.clone()) {
                        frontier.push_back(DiscoveredUrl::new(link.clone(), path_depth(link)));
                    }
                }
                visits.push(visit);
            }

            if let Some(ref callback) = self.progress_callback {
                callback(visits.len(), frontier.len());
            }
        }

        info!("Crawl complete. Visited {} pages", visits.len());
        Ok(visits)
    }

    fn accepts(&self, url: &str) -> bool {
        if path_depth(url) > self.max_depth {
            return false;
        }
        match self.link_filter {
            Some(ref filter) => filter(url),
            None => true,
        }
    }

    async fn visit(&self, item: &DiscoveredUrl, authority: &str) -> PageVisit {
        let start = Instant::now();
        match self.fetcher.fetch(&item.url).await {
            Ok(page) => {
                let mut visit = PageVisit::new(item.url.clone(), item.depth);
                visit.response_time = start.elapsed();
                visit.links_found = extract_links(&page.body, &page.url, authority);
                info!("✓ {} ({} links found)", item.url, visit.links_found.len());
                visit
            }
            Err(e) => {
                warn!("✗ {}: {}", item.url, e);
                let mut visit = PageVisit::with_error(item.url.clone(), item.depth, e.to_string());
                visit.response_time = start.elapsed();
                visit
            }
        }
    }
}

/// Same-site anchors of `html`, resolved against `current_url` and
/// normalised. Order of first appearance is kept; duplicates dropped.
pub fn extract_links(html: &str, current_url: &str, authority: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(link_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_url(current_url, href) else {
            continue;
        };
        if self::authority(&resolved).as_deref() != Some(authority) {
            continue;
        }
        let clean = normalize_url(&resolved);
        if seen.insert(clean.clone()) {
            links.push(clean);
        }
    }

    links
}

fn resolve_url(base: &str, href: &str) -> Option<Url> {
    let href = href.trim();
    // Skip empty, javascript:, mailto:, tel: and in-page anchors
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let resolved = base_url.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// `host[:port]` of a URL, the unit the crawl is confined to.
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// `scheme://host[:port]/path` with query, fragment and trailing slash removed.
pub fn normalize_url(url: &Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        authority(url).unwrap_or_default(),
        url.path().trim_end_matches('/')
    )
}

/// Number of non-empty path segments; unparseable URLs count as infinitely deep.
pub fn path_depth(url: &str) -> usize {
    Url::parse(url)
        .map(|u| u.path().split('/').filter(|s| !s.is_empty()).count())
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::HttpFetcher;
    use crate::result::FetchedPage;
    use std::sync::Mutex as StdMutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    async fn mount_page(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    fn crawler() -> Crawler {
        Crawler::new(Arc::new(HttpFetcher::new().unwrap()))
    }

    #[test]
    fn test_path_depth() {
        assert_eq!(path_depth("https://example.org"), 0);
        assert_eq!(path_depth("https://example.org/"), 0);
        assert_eq!(path_depth("https://example.org/about-us"), 1);
        assert_eq!(path_depth("https://example.org/article/some-post/"), 2);
        assert_eq!(path_depth("https://example.org/a/b/c"), 3);
        assert_eq!(path_depth("not a url"), usize::MAX);
    }

    #[test]
    fn test_normalize_url_strips_query_fragment_and_slash() {
        let url = Url::parse("https://example.org/events/?page=2#top").unwrap();
        assert_eq!(normalize_url(&url), "https://example.org/events");

        let root = Url::parse("https://example.org/").unwrap();
        assert_eq!(normalize_url(&root), "https://example.org");

        let ported = Url::parse("http://127.0.0.1:8080/about/").unwrap();
        assert_eq!(normalize_url(&ported), "http://127.0.0.1:8080/about");
    }

    #[test]
    fn test_extract_links_same_site_only() {
        let html = r##"<html><body>
            <a href="/about-us/">About</a>
            <a href="https://example.org/article/hello">Hello</a>
            <a href="https://other.example.com/page">Elsewhere</a>
            <a href="mailto:info@example.org">Mail</a>
            <a href="#section">Anchor</a>
            <a href="/about-us">About again</a>
        </body></html>"##;

        let links = extract_links(html, "https://example.org/", "example.org");
        assert_eq!(
            links,
            vec![
                "https://example.org/about-us".to_string(),
                "https://example.org/article/hello".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_link_discovery() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_page(
            &mock_server,
            "/",
            format!(r#"<a href="{uri}/page1">1</a><a href="{uri}/page2/">2</a>"#),
        )
        .await;
        mount_page(&mock_server, "/page1", "<p>P1</p>".to_string()).await;
        mount_page(&mock_server, "/page2", "<p>P2</p>".to_string()).await;

        let visits = crawler().crawl(&uri).await.unwrap();

        let mut urls: Vec<_> = visits.iter().map(|v| v.url.clone()).collect();
        urls.sort();
        assert_eq!(urls, vec![uri.clone(), format!("{uri}/page1"), format!("{uri}/page2")]);
        assert!(visits.iter().all(|v| v.is_ok()));
    }

    #[tokio::test]
    async fn test_depth_limit_respected() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_page(
            &mock_server,
            "/",
            format!(r#"<a href="{uri}/a/b">ok</a><a href="{uri}/a/b/c">too deep</a>"#),
        )
        .await;
        mount_page(&mock_server, "/a/b", "<p>B</p>".to_string()).await;

        let visits = crawler().with_max_depth(2).crawl(&uri).await.unwrap();

        assert_eq!(visits.len(), 2);
        assert!(visits.iter().all(|v| !v.url.ends_with("/c")));
    }

    #[tokio::test]
    async fn test_link_filter_excludes_urls() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_page(
            &mock_server,
            "/",
            format!(r#"<a href="{uri}/keep">k</a><a href="{uri}/author/bob">a</a>"#),
        )
        .await;
        mount_page(&mock_server, "/keep", "<p>K</p>".to_string()).await;

        let visits = crawler()
            .with_link_filter(Arc::new(|url: &str| !url.contains("/author/")))
            .crawl(&uri)
            .await
            .unwrap();

        assert_eq!(visits.len(), 2);
        assert!(visits.iter().all(|v| !v.url.contains("/author/")));
    }

    #[tokio::test]
    async fn test_failed_fetch_recorded_without_aborting() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_page(
            &mock_server,
            "/",
            format!(r#"<a href="{uri}/missing">m</a><a href="{uri}/fine">f</a>"#),
        )
        .await;
        mount_page(&mock_server, "/fine", "<p>F</p>".to_string()).await;

        let visits = crawler().crawl(&uri).await.unwrap();

        assert_eq!(visits.len(), 3);
        let missing = visits.iter().find(|v| v.url.ends_with("/missing")).unwrap();
        assert!(missing.error.as_deref().unwrap().contains("404"));
        assert!(visits.iter().find(|v| v.url.ends_with("/fine")).unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_frontier_processed_in_batches() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        let mut root_html = String::new();
        for i in 1..=7 {
            root_html.push_str(&format!(r#"<a href="{uri}/page{i}">{i}</a>"#));
            mount_page(&mock_server, &format!("/page{i}"), "<p>leaf</p>".to_string()).await;
        }
        mount_page(&mock_server, "/", root_html).await;

        let progress: Arc<StdMutex<Vec<usize>>> = Arc::new(StdMutex::new(Vec::new()));
        let progress_clone = progress.clone();

        let visits = crawler()
            .with_batch_size(3)
            .with_progress_callback(Arc::new(move |visited, _queued| {
                progress_clone.lock().unwrap().push(visited);
            }))
            .crawl(&uri)
            .await
            .unwrap();

        assert_eq!(visits.len(), 8);
        // root alone, then 3 + 3 + 1 leaves
        assert_eq!(*progress.lock().unwrap(), vec![1, 4, 7, 8]);
    }

    #[tokio::test]
    async fn test_each_url_visited_once() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_page(
            &mock_server,
            "/",
            format!(r#"<a href="{uri}/loop">l</a><a href="{uri}/loop/">l</a><a href="{uri}/">home</a>"#),
        )
        .await;
        mount_page(
            &mock_server,
            "/loop",
            format!(r#"<a href="{uri}">home</a><a href="{uri}/loop?x=1">self</a>"#),
        )
        .await;

        let visits = crawler().crawl(&uri).await.unwrap();

        let unique: HashSet<_> = visits.iter().map(|v| v.url.clone()).collect();
        assert_eq!(unique.len(), visits.len());
        assert_eq!(visits.len(), 2);
    }

    #[tokio::test]
    async fn test_start_url_visited_even_when_filtered() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_page(
            &mock_server,
            "/author/jane/posts",
            format!(r#"<a href="{uri}/about">a</a><a href="{uri}/author/bob">b</a>"#),
        )
        .await;
        mount_page(&mock_server, "/about", "<p>About</p>".to_string()).await;

        let start = format!("{uri}/author/jane/posts");
        let visits = crawler()
            .with_max_depth(2)
            .with_link_filter(Arc::new(|url: &str| !url.contains("/author/")))
            .crawl(&start)
            .await
            .unwrap();

        let urls: Vec<_> = visits.iter().map(|v| v.url.clone()).collect();
        assert_eq!(urls, vec![start, format!("{uri}/about")]);
    }

    struct RedirectingFetcher;

    #[async_trait::async_trait]
    impl PageFetcher for RedirectingFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            let (final_url, body) = match url {
                "https://example.org/old-news" => (
                    "https://example.org/news/",
                    r#"<a href="latest">Latest</a>"#,
                ),
                _ => (url, "<p>leaf</p>"),
            };
            Ok(FetchedPage {
                url: final_url.to_string(),
                status_code: None,
                body: body.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_links_resolved_against_final_url() {
        let visits = Crawler::new(Arc::new(RedirectingFetcher))
            .crawl("https://example.org/old-news")
            .await
            .unwrap();

        let urls: Vec<_> = visits.iter().map(|v| v.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.org/old-news", "https://example.org/news/latest"]
        );
    }

    #[tokio::test]
    async fn test_invalid_start_url() {
        let err = crawler().crawl("not a url").await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidUrl(_)));
    }
}
