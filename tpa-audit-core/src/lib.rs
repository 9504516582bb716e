pub mod article;
pub mod audit;
pub mod classify;
pub mod config;
pub mod crawl;
pub mod error;
pub mod model;
pub mod report;

pub use config::AuditConfig;
pub use error::{AuditError, Result};
pub use model::{ArticleRecord, Category, ClassificationResult, TypeSource};

pub fn print_banner() {
    use colored::Colorize;
    println!(
        "{} {}",
        "tpa-audit".bright_white().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_blue()
    );
    println!("{}", "content retention audit for thepaymentsassociation.org".dimmed());
}
