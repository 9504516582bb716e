pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod result;
pub mod sitemap;

pub use crawler::{Crawler, LinkFilter, ProgressCallback};
pub use error::ScanError;
pub use fetcher::{BrowserFetcher, HttpFetcher, PageFetcher};
pub use result::{DiscoveredUrl, FetchedPage, PageVisit};
