use chrono::Local;
use clap::ArgMatches;
use commands::command_argument_builder;
use tpa_audit::handlers::{RunContext, display_path, handle_articles, handle_crawl};
use tpa_audit_core::print_banner;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }
    init_logging(quiet);

    let outcome = match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => run_crawl(primary_command, quiet).await,
        Some(("articles", primary_command)) => run_articles(primary_command, quiet).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    match outcome {
        Ok(path) => info!("Report written to {}", display_path(&path)),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `warn` when quiet.
fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn run_context(args: &ArgMatches, quiet: bool) -> anyhow::Result<RunContext> {
    RunContext::new(
        args.get_one::<String>("config").map(String::as_str),
        args.get_one::<String>("output-dir").map(String::as_str),
        Local::now().date_naive(),
        quiet,
    )
}

async fn run_crawl(args: &ArgMatches, quiet: bool) -> anyhow::Result<std::path::PathBuf> {
    let ctx = run_context(args, quiet)?;
    handle_crawl(&ctx, args.get_flag("http")).await
}

async fn run_articles(args: &ArgMatches, quiet: bool) -> anyhow::Result<std::path::PathBuf> {
    let ctx = run_context(args, quiet)?;
    handle_articles(&ctx).await
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
