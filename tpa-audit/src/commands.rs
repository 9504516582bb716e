use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("tpa-audit")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("tpa-audit")
        .styles(CLAP_STYLING)
        .about("Content retention audit for thepaymentsassociation.org")
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress bars and info logging")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-c --"config" <FILE>)
                .required(false)
                .global(true)
                .help("JSON file overriding any of the built-in settings"),
        )
        .arg(
            arg!(-o --"output-dir" <DIR>)
                .required(false)
                .global(true)
                .help("Root directory for reports; a dated subdirectory is created per run"),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl the site from its home page and classify every page reached. \
                Writes tpa_audit.csv.",
                )
                .arg(
                    arg!(--"http")
                        .required(false)
                        .help("Fetch pages with a plain HTTP client instead of headless Chromium"),
                ),
        )
        .subcommand(command!("articles").about(
            "Audit every article listed in the sitemap by publish date and type. \
                Writes tpa_articles_audit.csv.",
        ))
}
