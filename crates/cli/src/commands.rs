//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rusqlite::types::Value;
use tracing::{info, warn};

use sampledrawer_core::{
    analyzer::{BasicAnalyzer, CachedAnalyzer, FileAnalyzer},
    library::{ImportFailure, ImportReport},
    metadata::Metadata,
    search::{CompletionQuery, SearchQuery, SqlOptions, SqlQuery, ITEM_COLUMNS},
    verifier::{Answer, FixedAnswer, LibraryVerifier, VerifyReport},
    Config, Library,
};

use crate::prompt::TerminalObserver;
use crate::Command;

pub fn dispatch(library: &Library, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Import {
            paths,
            rules,
            root,
            tags,
            no_copy,
        } => import(library, config, &paths, &rules, root.as_deref(), &tags, !no_copy),
        Command::Search { query, limit, json } => search(
            library,
            &query.join(" "),
            limit.unwrap_or(config.search.default_limit),
            json,
        ),
        Command::Complete { text, limit } => complete(
            library,
            &text,
            limit.unwrap_or(config.search.completion_limit),
        ),
        Command::Tags => tags(library),
        Command::Path {
            md5,
            pretty,
            timeout,
        } => path(
            library,
            &md5,
            pretty.then(|| {
                timeout
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| config.export.pretty_path_timeout())
            }),
        ),
        Command::Verify {
            assume_yes,
            assume_no,
        } => {
            let report = if assume_yes {
                LibraryVerifier::new(library).verify(&mut FixedAnswer(Answer::Yes))?
            } else if assume_no {
                LibraryVerifier::new(library).verify(&mut FixedAnswer(Answer::No))?
            } else {
                LibraryVerifier::new(library).verify(&mut TerminalObserver::new())?
            };
            print_verify_report(&report);
            Ok(())
        }
    }
}

fn import(
    library: &Library,
    config: &Config,
    paths: &[PathBuf],
    rule_set: &str,
    root: Option<&Path>,
    extra_tags: &[String],
    copy: bool,
) -> Result<()> {
    let rules = config
        .rule_set(rule_set)
        .context("Invalid rewrite rules")?
        .with_context(|| format!("Unknown rule set {:?}", rule_set))?;
    let analyzer = CachedAnalyzer::new(BasicAnalyzer::new(), config.analyzer.cache_capacity);

    let mut analysis_failures = Vec::new();
    let mut items = Vec::new();
    for path in paths {
        match analyzer.analyze(path) {
            Ok(info) => {
                let mut metadata = Metadata::from_file_info(&info);
                metadata.add_tags(extra_tags);
                items.push(metadata.rewrite(&rules, root));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot analyze file");
                analysis_failures.push(ImportFailure {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let mut report = library.import_files(items, copy)?;
    report.failed.extend(analysis_failures);
    print_import_report(&report);
    info!(
        imported = report.imported.len(),
        skipped = report.skipped(),
        "Import finished"
    );
    Ok(())
}

fn print_import_report(report: &ImportReport) {
    for (path, id) in &report.imported {
        println!("imported #{}: {}", id, path);
    }
    for conflict in &report.conflicts {
        println!(
            "conflict: {} is already in the library as {:?}",
            conflict.path, conflict.existing_name
        );
    }
    for failure in &report.failed {
        println!("failed: {}: {}", failure.path, failure.reason);
    }
}

fn search(library: &Library, text: &str, limit: usize, json: bool) -> Result<()> {
    let query = SearchQuery::parse(text);
    let items = library.get_items(&query, &SqlOptions::default().with_limit(limit))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    for item in &items {
        let tags: Vec<&str> = item.tags().iter().map(String::as_str).collect();
        println!(
            "{}\t{}\t{}",
            item.md5().unwrap_or_default(),
            item.name().unwrap_or_default(),
            tags.join(" ")
        );
    }
    Ok(())
}

fn complete(library: &Library, text: &str, limit: usize) -> Result<()> {
    let Some(query) = CompletionQuery::from_text(text) else {
        return Ok(());
    };
    for suggestion in library.get_completions(&query, limit)? {
        println!("{}", query.complete(&suggestion));
    }
    Ok(())
}

fn tags(library: &Library) -> Result<()> {
    for tag in library.get_tags()? {
        println!("{}\t{}", tag.item_count, tag.name);
    }
    Ok(())
}

fn find_by_md5(library: &Library, md5: &str) -> Result<Metadata> {
    let columns: Vec<String> = ITEM_COLUMNS.iter().map(|c| format!("item.{}", c)).collect();
    let query = SqlQuery::new(
        format!(
            "SELECT {} FROM items item WHERE item.md5 = ? AND item.workplace_id IS NULL",
            columns.join(", ")
        ),
        vec![Value::Text(md5.to_string())],
    );
    match library.get_items_sql(&query)?.into_iter().next() {
        Some(item) => Ok(item),
        None => bail!("No item with checksum {}", md5),
    }
}

fn path(library: &Library, md5: &str, pretty_timeout: Option<Duration>) -> Result<()> {
    let item = find_by_md5(library, md5)?;
    let Some(timeout) = pretty_timeout else {
        println!("{}", library.get_library_object_path(&item)?.display());
        return Ok(());
    };
    let alias = library.get_pretty_path(&item, timeout)?;
    println!("{}", alias.display());
    info!("Alias is kept for {:?}", timeout);
    thread::sleep(timeout);
    Ok(())
}

fn print_verify_report(report: &VerifyReport) {
    println!(
        "checked {} items, {} issues: removed {} items, {} files, {} directories, {} broken links{}",
        report.items_checked,
        report.issues,
        report.items_removed,
        report.files_removed,
        report.dirs_removed,
        report.links_removed,
        if report.tag_counts_fixed {
            ", tag counts fixed"
        } else {
            ""
        }
    );
}
