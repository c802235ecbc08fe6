mod commands;
mod metrics;
mod prompt;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sampledrawer_core::{load_config_or_default, validate_config, Library, LibraryError};

/// Tag-indexed, full-text searchable audio sample library.
#[derive(Parser, Debug)]
#[command(name = "sampledrawer", version)]
pub struct Cli {
    /// Configuration file (defaults to ./config.toml when present)
    #[arg(long, global = true, env = "SAMPLEDRAWER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Library directory, overriding the configuration
    #[arg(long, global = true, value_name = "DIR")]
    library: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Print metrics in Prometheus text format after the command
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze files and add them to the library
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Rewrite rule set
        #[arg(long, default_value = sampledrawer_core::metadata::DEFAULT_RULE_SET)]
        rules: String,
        /// Folder the auto-category is derived from
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        /// Extra tag for every file
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Index the files in place instead of copying them
        #[arg(long)]
        no_copy: bool,
    },
    /// List items matching a query
    Search {
        query: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Complete the last word of a query
    Complete {
        text: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List tags with their item counts
    Tags,
    /// Print the stored file of an item
    Path {
        md5: String,
        /// Print a human-readable alias kept until the timeout
        #[arg(long)]
        pretty: bool,
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Check the library and repair problems
    Verify {
        #[arg(long, conflicts_with = "assume_no")]
        assume_yes: bool,
        #[arg(long)]
        assume_no: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    if let Err(e) = run(cli) {
        match e.downcast_ref::<LibraryError>() {
            Some(fatal) if fatal.is_fatal() => error!("Fatal library error: {}", fatal),
            _ => error!("Fatal error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(path) = cli.library {
        config.library.path = path;
    }
    validate_config(&config).context("Configuration validation failed")?;

    info!("Library path: {:?}", config.library.path);
    let library = Library::open(&config.library.path)?;

    commands::dispatch(&library, &config, cli.command)?;
    library.close();

    if cli.print_metrics {
        print!("{}", metrics::encode_metrics()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from([
            "sampledrawer",
            "import",
            "a.wav",
            "b.wav",
            "--tag",
            "drums",
            "--tag",
            "/kits/808",
            "--no-copy",
        ])
        .unwrap();
        match cli.command {
            Command::Import {
                paths,
                rules,
                tags,
                no_copy,
                root,
            } => {
                assert_eq!(paths.len(), 2);
                assert_eq!(rules, "default");
                assert_eq!(tags, vec!["drums", "/kits/808"]);
                assert!(no_copy);
                assert!(root.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["sampledrawer", "tags", "--print-metrics", "--library", "/tmp/lib"])
            .unwrap();
        assert!(cli.print_metrics);
        assert_eq!(cli.library, Some(PathBuf::from("/tmp/lib")));
    }

    #[test]
    fn test_verify_answers_conflict() {
        assert!(Cli::try_parse_from(["sampledrawer", "verify", "--assume-yes", "--assume-no"]).is_err());
    }
}
