use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::io;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

use psdeals::config::{Config, LocaleTable, Preferences};
use psdeals::models::{ContentType, Listing, Locale, PriceRange, SortKey, WATCHLIST_TAG};
use psdeals::output::{self, Layout};
use psdeals::parsers::ItemExtractor;
use psdeals::scrapers::{enumerate_listings, search_into, FetchCoordinator, FetchOutcome};
use psdeals::selector::{select_from_terminal, Selection};
use psdeals::storage::{ItemFilter, QueryResult, SqliteStorage, Storage};
use psdeals::utils::PageFetcher;
use psdeals::watchlist::WatchlistManager;
use psdeals::Error;

#[derive(Parser, Debug)]
#[command(name = "psdeals", version, about = "Fetch, cache and filter PlayStation Store deals")]
struct Cli {
    /// Store country code, e.g. `us` or `de`
    #[arg(short = 's', long = "store")]
    store: Option<String>,

    /// Store language code, e.g. `en` or `de`
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Only titles priced above this
    #[arg(short = 'f', long = "from")]
    from: Option<f64>,

    /// Only titles priced below this
    #[arg(short = 'u', long = "under")]
    under: Option<f64>,

    /// Content types to keep, comma separated
    #[arg(long = "type", value_enum, value_delimiter = ',')]
    content: Vec<ContentType>,

    /// Sort keys in priority order, comma separated
    #[arg(long, value_enum, value_delimiter = ',')]
    sort: Vec<SortKey>,

    /// Reverse every sort key
    #[arg(long)]
    reverse: bool,

    /// Search the store instead of browsing deals; commas separate phrases
    #[arg(short = 'q', long)]
    query: Option<String>,

    /// Fetch every deal without asking
    #[arg(short = 'a', long = "alldeals")]
    all_deals: bool,

    /// Ignore stored results and fetch anew
    #[arg(short = 'i', long)]
    ignore: bool,

    /// Don't print results to the terminal
    #[arg(short = 'n', long = "noprint")]
    no_print: bool,

    /// Print results in a table-like layout
    #[arg(long)]
    table: bool,

    /// Save results as text files in the current directory
    #[arg(short = 't', long = "txt")]
    txt: bool,

    /// Configuration file (defaults to ./psdeals.{toml,json,yaml})
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the watchlist
    Watchlist {
        #[command(subcommand)]
        action: WatchlistAction,
    },
    /// Print the supported languages and countries
    List,
    /// Delete stored deal and search results
    Flush,
    /// Delete stored results and the watchlist
    Flushall,
    /// Print the effective preferences
    Preferences,
}

#[derive(Subcommand, Debug)]
enum WatchlistAction {
    Show,
    /// Refresh the prices of watched titles for the chosen store
    Check,
    /// Search a title and add picks to the watchlist
    Add {
        #[arg(required = true)]
        title: Vec<String>,
    },
    Remove,
}

/// Command-line options merged over the configured preferences.
struct Session {
    config: Config,
    table: LocaleTable,
    prefs: Preferences,
    locale: Locale,
    fetcher: PageFetcher,
    extractor: ItemExtractor,
    store: SqliteStorage,
}

impl Session {
    async fn start(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
        let table = config.locale_table().context("Failed to load the language table")?;
        let prefs = merge_preferences(cli, &config.preferences);

        let locale = Locale::new(
            prefs.language.as_deref().unwrap_or("en"),
            prefs.country.as_deref().unwrap_or("us"),
        );

        let fetcher = PageFetcher::from_config(&config)?;
        let extractor = ItemExtractor::new(prefs.price_range());
        let store = SqliteStorage::open(&config.database_path)
            .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
        store.ensure_schema().await?;

        Ok(Self {
            config,
            table,
            prefs,
            locale,
            fetcher,
            extractor,
            store,
        })
    }

    fn filter_for(&self, deal_id: &str) -> ItemFilter {
        ItemFilter::new(deal_id, &self.locale)
            .with_range(self.prefs.price_range())
            .with_content(&self.table, &self.locale.language, &self.prefs.content)
            .with_sorting(&self.prefs.sorting, self.prefs.sort_reverse)
    }

    fn layout(&self) -> Layout {
        Layout::from_table_flag(self.prefs.table_print)
    }

    fn coordinator(&self) -> FetchCoordinator {
        FetchCoordinator::new(
            self.fetcher.clone(),
            self.extractor,
            self.config.database_path.clone(),
            self.config.worker_count(),
        )
    }

    fn watchlist(&self) -> WatchlistManager {
        WatchlistManager::new(
            self.fetcher.clone(),
            self.extractor,
            self.config.database_path.clone(),
            self.config.worker_count(),
        )
    }

    fn deliver(&self, heading: &str, result: &QueryResult) -> Result<()> {
        if !self.prefs.dont_print {
            let mut stdout = io::stdout().lock();
            output::render(&mut stdout, heading, result, self.layout())?;
        }
        if self.prefs.save_text && !result.is_empty() {
            let dir = std::env::current_dir()?;
            let path = output::save_text(&dir, heading, &self.locale, result, self.layout())?;
            println!("Saved to {}", path.display());
        }
        Ok(())
    }
}

fn merge_preferences(cli: &Cli, defaults: &Preferences) -> Preferences {
    let mut prefs = defaults.clone();
    if let Some(lang) = &cli.lang {
        prefs.language = Some(lang.clone());
    }
    if let Some(store) = &cli.store {
        prefs.country = Some(store.clone());
    }
    prefs.min_price = cli.from.unwrap_or(prefs.min_price);
    prefs.max_price = cli.under.unwrap_or(prefs.max_price);
    if !cli.content.is_empty() {
        prefs.content = cli.content.clone();
    }
    if !cli.sort.is_empty() {
        prefs.sorting = cli.sort.clone();
    }
    prefs.sort_reverse |= cli.reverse;
    prefs.fetch_all_deals |= cli.all_deals;
    prefs.ignore_previous_fetch |= cli.ignore;
    prefs.dont_print |= cli.no_print;
    prefs.table_print |= cli.table;
    prefs.save_text |= cli.txt;
    prefs
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("psdeals=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    tokio::select! {
        result = run(cli) => result,
        _ = signal::ctrl_c() => std::process::exit(130),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let session = Session::start(&cli).await?;

    match &cli.command {
        Some(Command::List) => return list_locales(&session.table),
        Some(Command::Preferences) => {
            for (name, value) in session.prefs.describe() {
                println!("{}: {}", name, value);
            }
            return Ok(());
        }
        Some(Command::Flush) => {
            session.store.clear_all(false).await?;
            println!("Stored results deleted.");
            return Ok(());
        }
        Some(Command::Flushall) => {
            session.store.clear_all(true).await?;
            println!("Stored results and watchlist deleted.");
            return Ok(());
        }
        _ => {}
    }

    session
        .table
        .validate(&session.locale)
        .context("Unsupported store; run `psdeals list` for the available ones")?;
    check_price_range(session.prefs.price_range())?;

    let outcome = match (&cli.command, &cli.query) {
        (Some(Command::Watchlist { action }), _) => run_watchlist(&session, action).await,
        (_, Some(query)) => run_search(&session, query).await,
        _ => run_deals(&session).await,
    };

    if let Err(err) = &outcome {
        match err.downcast_ref::<Error>() {
            Some(Error::InputAbort) => {
                println!("Nothing selected, operation aborted.");
                return Ok(());
            }
            Some(err) if err.is_site_format() => {
                println!("The store's site format changed: {}", err);
                return Ok(());
            }
            _ => {}
        }
    }
    outcome
}

fn check_price_range(range: PriceRange) -> Result<()> {
    if range.min >= range.max {
        anyhow::bail!("Minimum price {} must be below maximum price {}", range.min, range.max);
    }
    Ok(())
}

fn list_locales(table: &LocaleTable) -> Result<()> {
    for (language, countries) in table.languages() {
        println!("{}: {}", language, countries.join(" "));
    }
    Ok(())
}

async fn run_deals(session: &Session) -> Result<()> {
    let listings = enumerate_listings(&session.fetcher, &session.locale).await?;

    let chosen: Vec<Listing> = if session.prefs.fetch_all_deals {
        listings
    } else {
        for (n, listing) in listings.iter().enumerate() {
            println!("{:>3}. {}", n + 1, listing.name);
        }
        match select_from_terminal(listings.len(), "Deals to fetch (numbers separated by spaces):")? {
            Selection::Chosen(indices) => indices.into_iter().map(|i| listings[i - 1].clone()).collect(),
            Selection::Aborted => return Err(Error::InputAbort.into()),
        }
    };

    let coordinator = session.coordinator();
    let force = session.prefs.ignore_previous_fetch;

    for listing in &chosen {
        match coordinator.fetch_listing(listing, &session.locale, force).await {
            Ok(FetchOutcome::Unextractable) => {
                println!("Could not read the pages of '{}', skipping it.", listing.name);
                continue;
            }
            Ok(FetchOutcome::Cached { count, pages }) => {
                info!("'{}' served from earlier fetch ({} items, {} pages)", listing.name, count, pages);
            }
            Ok(FetchOutcome::Fetched { .. }) => {}
            Err(err) if err.is_site_format() => {
                println!("The store's site format changed, skipping '{}': {}", listing.name, err);
                continue;
            }
            Err(err) => {
                error!("Fetching '{}' failed: {}", listing.name, err);
                continue;
            }
        }

        let result = session.store.query(&session.filter_for(&listing.deal_id)).await?;
        session.deliver(&listing.name, &result)?;
    }
    Ok(())
}

async fn run_search(session: &Session, query: &str) -> Result<()> {
    let phrases: Vec<&str> = query.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    if phrases.is_empty() {
        anyhow::bail!("Empty search query");
    }

    let searches = phrases.iter().map(|phrase| {
        let tag = Listing::search(phrase);
        async move {
            let written = search_into(
                &session.fetcher,
                &session.extractor,
                &session.store,
                phrase,
                &session.locale,
                &tag,
            )
            .await;
            (tag, written)
        }
    });

    for (tag, written) in join_all(searches).await {
        match written {
            Ok(_) => {
                let result = session.store.query(&session.filter_for(&tag.deal_id)).await?;
                session.deliver(&tag.name, &result)?;
            }
            Err(err) if err.is_site_format() => {
                println!("The store's site format changed, skipping '{}': {}", tag.name, err);
            }
            Err(err) => warn!("Search '{}' failed: {}", tag.name, err),
        }
    }
    Ok(())
}

async fn run_watchlist(session: &Session, action: &WatchlistAction) -> Result<()> {
    let manager = session.watchlist();
    let mut stdout = io::stdout();

    match action {
        WatchlistAction::Show => {
            manager.show(&mut stdout).await?;
        }
        WatchlistAction::Check => {
            let result = manager
                .check(&session.locale, session.filter_for(WATCHLIST_TAG))
                .await?;
            session.deliver(WATCHLIST_TAG, &result)?;
        }
        WatchlistAction::Add { title } => {
            let term = title.join(" ");
            let mut input = io::stdin().lock();
            let added = manager.add(&term, &session.locale, &mut input, &mut stdout).await?;
            println!("{} titles added to the watchlist.", added.len());
        }
        WatchlistAction::Remove => {
            let mut input = io::stdin().lock();
            let removed = manager.remove(&mut input, &mut stdout).await?;
            println!("{} titles removed from the watchlist.", removed);
        }
    }
    Ok(())
}
