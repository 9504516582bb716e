pub mod handlers;

pub use handlers::{RunContext, expand_path, handle_articles, handle_crawl, load_config};
