use clap::{Parser, Subcommand};
use copyq_archive::archive::{ArchiveStore, StoreError};
use copyq_archive::config::{loader, ArchiveConfig, TabName};
use copyq_archive::query::{format_item, QueryEngine};
use copyq_archive::source::{CopyQSource, HistorySource};
use copyq_archive::sync::{save_pass, TabFilter};
use std::io::Write;
use std::ops::ControlFlow;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "copyq-archive",
    version,
    about = "Archive CopyQ clipboard history beyond its size limit"
)]
struct Cli {
    /// Config file (defaults to ~/.copyq-archive/config.yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Defaults to `save`
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive items CopyQ currently holds that are not archived yet
    Save {
        /// Only these tabs (defaults to `tabs` from config, else every tab)
        tabs: Vec<String>,
    },
    /// Search archived items by substring, newest first
    #[command(args_conflicts_with_subcommands = true)]
    Search {
        #[command(subcommand)]
        scope: Option<SearchScope>,
        /// Words are joined with single spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,
    },
    /// List archived tabs
    Tabs {
        /// List the tabs CopyQ has right now instead
        #[arg(long)]
        source: bool,
    },
}

#[derive(Subcommand)]
enum SearchScope {
    /// Search within one archived tab
    Tab {
        tab: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    copyq_archive::logging::init(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = result {
        eprintln!("copyq-archive: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = loader::load(cli.config.as_deref())?;
    match cli.command.unwrap_or(Commands::Save { tabs: Vec::new() }) {
        Commands::Save { tabs } => run_save(&config, &tabs).await,
        Commands::Search { scope: Some(SearchScope::Tab { tab, query }), .. } => {
            run_search(&config, Some(&tab), &query).await
        }
        Commands::Search { scope: None, query } => run_search(&config, None, &query).await,
        Commands::Tabs { source } => run_tabs(&config, source).await,
    }
}

async fn run_save(
    config: &ArchiveConfig,
    tabs: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let scope: Vec<String> = if tabs.is_empty() {
        config.tabs.iter().map(|t| t.as_str().to_string()).collect()
    } else {
        let mut names = Vec::new();
        for t in tabs {
            names.push(TabName::new(t)?.as_str().to_string());
        }
        names
    };

    let source = CopyQSource::new(&config.copyq).with_scope(scope);
    let store = ArchiveStore::open(&config.database)?;
    let filter = TabFilter::new(config.exclude_tabs.clone());

    let stats = save_pass(&source, &store, &filter).await?;
    tracing::info!(
        tabs = stats.tabs,
        observed = stats.observed,
        inserted = stats.inserted,
        already_archived = stats.already_archived + stats.duplicates,
        "save complete"
    );
    Ok(())
}

async fn run_search(
    config: &ArchiveConfig,
    tab: Option<&str>,
    words: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let store = ArchiveStore::open(&config.database)?;
    if needs_initial_save(&store)? {
        tracing::warn!(
            "archive at {} is empty, saving from CopyQ first (this may take a while)",
            config.database.display()
        );
        run_save(config, &[]).await?;
    }

    let query = words.join(" ");
    let engine = QueryEngine::new(&store);

    let mut stdout = std::io::stdout().lock();
    let mut found = 0;
    let mut write_error = None;
    engine.search_with(&query, tab, |item| {
        found += 1;
        match writeln!(stdout, "{}", format_item(found, &item)) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                write_error = Some(e);
                ControlFlow::Break(())
            }
        }
    })?;

    if let Some(e) = write_error {
        // Reader went away (e.g. `| head`); nothing left to do
        if e.kind() == std::io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(e.into());
    }

    let stats = engine.stats()?;
    tracing::info!("found {found} items out of {} total items", stats.distinct_contents);
    Ok(())
}

/// A search against an empty archive first archives what CopyQ holds. Checks items,
/// not the file, since `tabs` also creates the database.
fn needs_initial_save(store: &ArchiveStore) -> Result<bool, StoreError> {
    Ok(store.stats()?.items == 0)
}

async fn run_tabs(
    config: &ArchiveConfig,
    from_source: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let tabs = if from_source {
        let mut tabs = CopyQSource::new(&config.copyq).list_tabs().await?;
        tabs.sort();
        tabs
    } else {
        let store = ArchiveStore::open(&config.database)?;
        QueryEngine::new(&store).tabs()?
    };

    for tab in tabs {
        println!("{tab}");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use copyq_archive::archive::NewItem;

    /// (tab, query words, verbose) of a parsed `search` invocation.
    fn parse_search(args: &[&str]) -> Option<(Option<String>, Vec<String>, bool)> {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Some(Commands::Search { scope: None, query }) => Some((None, query, cli.verbose)),
            Some(Commands::Search { scope: Some(SearchScope::Tab { tab, query }), .. }) => {
                Some((Some(tab), query, cli.verbose))
            }
            _ => None,
        }
    }

    fn words(w: &[&str]) -> Vec<String> {
        w.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn no_command_means_save() {
        let cli = Cli::try_parse_from(["copyq-archive"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn query_words_may_start_with_hyphen() {
        assert_eq!(
            parse_search(&["copyq-archive", "search", "rm", "-rf", "/tmp"]),
            Some((None, words(&["rm", "-rf", "/tmp"]), false))
        );
        assert_eq!(
            parse_search(&["copyq-archive", "search", "-rf"]),
            Some((None, words(&["-rf"]), false))
        );
        // Once the query has started, known flags are query words too
        assert_eq!(
            parse_search(&["copyq-archive", "search", "grep", "-v"]),
            Some((None, words(&["grep", "-v"]), false))
        );
        assert_eq!(
            parse_search(&["copyq-archive", "search", "--", "-v"]),
            Some((None, words(&["-v"]), false))
        );
    }

    #[test]
    fn tab_scoped_query_words_may_start_with_hyphen() {
        assert_eq!(
            parse_search(&["copyq-archive", "search", "tab", "work", "-x", "y"]),
            Some((Some("work".to_string()), words(&["-x", "y"]), false))
        );
    }

    #[test]
    fn leading_flags_before_query_still_apply() {
        assert_eq!(
            parse_search(&["copyq-archive", "-v", "search", "foo"]),
            Some((None, words(&["foo"]), true))
        );
    }

    #[test]
    fn empty_archive_needs_initial_save() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("history.db");

        // Created empty by an earlier command
        let store = ArchiveStore::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert!(needs_initial_save(&store).unwrap());

        let item = NewItem {
            tab: "work".to_string(),
            content: "foo".to_string(),
            source_rank: 0,
            archived_at: Utc::now(),
        };
        store.insert(&item).unwrap();
        assert!(!needs_initial_save(&store).unwrap());
    }
}
