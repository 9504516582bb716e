use crate::error::Result;
use crate::fetcher::PageFetcher;
use quick_xml::events::Event;
use std::collections::BTreeSet;
use tracing::info;

/// Parse a sitemap index and return the `<loc>` of every `<sitemap>` entry.
pub fn parse_sitemap_index(xml: &str) -> Result<Vec<String>> {
    parse_locs(xml, b"sitemap")
}

/// Parse a urlset and return the `<loc>` of every `<url>` entry.
pub fn parse_urlset(xml: &str) -> Result<Vec<String>> {
    parse_locs(xml, b"url")
}

fn parse_locs(xml: &str, entry: &[u8]) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut locs = Vec::new();
    let mut in_entry = false;
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                name if name == entry => in_entry = true,
                b"loc" if in_entry => in_loc = true,
                _ => {}
            },
            Event::Text(e) if in_loc => {
                let text = e.unescape()?;
                let text = text.trim();
                if !text.is_empty() {
                    locs.push(text.to_string());
                }
            }
            Event::CData(e) if in_loc => {
                let text = String::from_utf8_lossy(&e).trim().to_string();
                if !text.is_empty() {
                    locs.push(text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"loc" => in_loc = false,
                name if name == entry => in_entry = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(locs)
}

/// Walk a sitemap index down to the article URLs it lists.
///
/// Only child sitemaps whose location contains `sitemap_marker` are read, and
/// only URLs containing `path_marker` are kept. Trailing slashes are trimmed
/// and the result is sorted and de-duplicated. Any fetch or parse failure on
/// the sitemaps themselves is returned to the caller.
pub async fn fetch_article_urls(
    fetcher: &dyn PageFetcher,
    index_url: &str,
    sitemap_marker: &str,
    path_marker: &str,
) -> Result<Vec<String>> {
    info!("Fetching sitemap index: {}", index_url);
    let index = fetcher.fetch(index_url).await?;

    let child_sitemaps: Vec<String> = parse_sitemap_index(&index.body)?
        .into_iter()
        .filter(|loc| loc.contains(sitemap_marker))
        .collect();
    info!("Found {} {} sitemaps", child_sitemaps.len(), sitemap_marker);

    let mut urls = BTreeSet::new();
    for sitemap_url in &child_sitemaps {
        let sitemap = fetcher.fetch(sitemap_url).await?;
        for loc in parse_urlset(&sitemap.body)? {
            let loc = loc.trim_end_matches('/');
            if loc.contains(path_marker) {
                urls.insert(loc.to_string());
            }
        }
    }

    info!("Found {} article URLs", urls.len());
    Ok(urls.into_iter().collect())
}
