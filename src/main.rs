use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mangadb::catalog::Catalog;
use mangadb::config::Config;
use mangadb::duplicate_manager::{resolve_duplicate, DuplicatePolicy, Resolution};
use mangadb::errors::MdbError;
use mangadb::extractor::HttpSource;
use mangadb::model::{AssocKind, Book};
use mangadb::pipeline::{import_many, ItemStatus};
use mangadb::ImportOutcome;

#[derive(Parser, Debug)]
#[command(name = "mangadb", about = "Catalog manga and doujinshi from their web pages")]
struct PrgmArgs {
    /// Database file to use instead of the configured one
    #[arg(long, global = true)]
    db: Option<String>,

    /// Open the database read-only
    #[arg(long, global = true)]
    read_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import books from their urls
    Import {
        urls: Vec<String>,

        /// File with one url per line
        #[arg(long)]
        file: Option<PathBuf>,

        /// Put the imported books on this list (repeatable)
        #[arg(long = "list")]
        lists: Vec<String>,

        /// Mark the links as downloaded
        #[arg(long)]
        downloaded: bool,

        #[arg(long, value_enum, default_value_t = DuplicatePolicy::Ask)]
        on_duplicate: DuplicatePolicy,
    },
    /// Search with free text and filters, e.g. `tag:"Multi Word;!Other" favorite:1`
    Search {
        query: Vec<String>,

        /// e.g. "pages DESC"
        #[arg(long)]
        order: Option<String>,

        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long)]
        json: bool,
    },
    /// Show one book
    Show {
        id: i64,

        #[arg(long)]
        json: bool,
    },
    /// Replace the names of one attribute of a book, e.g. `sync 3 tag A B`
    Sync {
        id: i64,
        kind: String,
        names: Vec<String>,
    },
    /// List every stored name of an attribute
    Names { kind: String },
    /// Delete a book
    Remove { id: i64 },
    /// Mark a link as downloaded, or not downloaded with --no
    Downloaded {
        link_id: i64,

        #[arg(long)]
        no: bool,
    },
    /// Write a commented sample config to ~/.mangadb/config.toml
    InitConfig,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_kind(kind: &str) -> Result<AssocKind, MdbError> {
    AssocKind::from_key(&kind.to_lowercase())
        .ok_or_else(|| MdbError::Parse(format!("'{kind}' is not a book attribute")))
}

/// Row offset of a 1-based page, saturating on huge page numbers
fn page_offset(page: i64, page_size: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(page_size)
}

fn page_count(total: i64, page_size: i64) -> i64 {
    total / page_size + i64::from(total % page_size != 0)
}

fn print_book(catalog: &Catalog, book: &Book) -> Result<(), MdbError> {
    let c = &book.columns;
    println!("#{} {}", book.id.unwrap_or_default(), book.title());
    if let (Some(_), Some(foreign)) = (&c.title_eng, &c.title_foreign) {
        println!("  {foreign}");
    }
    let language = match c.language_id {
        Some(id) => catalog.get_language_name(id)?.unwrap_or_default(),
        None => String::new(),
    };
    println!(
        "  pages: {}  language: {language}  rating: {}  favorite: {}",
        c.pages.unwrap_or_default(),
        c.rating.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
        c.favorite
    );
    for kind in AssocKind::ALL {
        let names = book.assoc(kind);
        if !names.is_empty() {
            println!("  {kind}: {}", names.join(", "));
        }
    }
    for link in &book.ext_links {
        let mut flags = vec![];
        if link.downloaded {
            flags.push("downloaded");
        }
        if link.outdated {
            flags.push("outdated");
        }
        println!("  link #{}: {} {}", link.id.unwrap_or_default(), link.url, flags.join(" "));
    }
    Ok(())
}

async fn run_import(
    catalog: &mut Catalog,
    config: &Config,
    mut urls: Vec<String>,
    file: Option<PathBuf>,
    lists: Vec<String>,
    downloaded: bool,
    on_duplicate: DuplicatePolicy,
) -> Result<(), MdbError> {
    if let Some(file) = file {
        let contents = std::fs::read_to_string(&file)?;
        urls.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string),
        );
    }
    if urls.is_empty() {
        warn!("No urls to import");
        return Ok(());
    }

    let opts = config.import.pipeline_options(&lists, downloaded);
    let source = Arc::new(HttpSource::new(&config.import.user_agent)?);

    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .map_err(|e| MdbError::Generic(e.to_string()))?,
    );
    let report = import_many(catalog, source, urls, &opts, |item| {
        pb.set_message(item.url.clone());
        pb.inc(1);
    })
    .await?;
    pb.finish_and_clear();

    for item in report.items {
        match item.status {
            ItemStatus::Imported(ImportOutcome::Duplicate { candidates, record }) => {
                match resolve_duplicate(catalog, &candidates, &record, &opts.import, on_duplicate)? {
                    Resolution::Skipped => println!("Skipped duplicate {}", item.url),
                    Resolution::Attached { book_id, .. } => {
                        println!("Added {} to book #{book_id}", item.url)
                    }
                    Resolution::Inserted { book_id } => {
                        println!("Inserted {} as book #{book_id}", item.url)
                    }
                }
            }
            ItemStatus::Imported(ImportOutcome::Inserted { book_id, book }) => {
                println!("Inserted #{book_id} {}", book.title())
            }
            ItemStatus::Imported(ImportOutcome::Updated { book_id, changes, outdated_link, .. }) => {
                println!("Updated #{book_id}:\n{}", changes.log());
                if let Some(link) = outdated_link {
                    println!("  link #{link} is outdated");
                }
            }
            ItemStatus::Imported(ImportOutcome::AlreadyPresent { book_id }) => {
                println!("#{book_id} is up to date")
            }
            ItemStatus::Imported(ImportOutcome::NoData { url }) => println!("No data for {url}"),
            ItemStatus::FetchFailed(e) | ItemStatus::ImportFailed(e) => {
                println!("Failed {}: {e}", item.url)
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = PrgmArgs::parse();
    let config = Config::load()?;
    init_logging(&config.logging.level);

    if let Command::InitConfig = args.command {
        let path = Config::create_sample()?;
        println!("Sample config written to {}", path.display());
        return Ok(());
    }

    let db_path = args.db.clone().or_else(|| config.database.path.clone());
    let read_only = args.read_only || config.database.read_only;
    let mut catalog = Catalog::open(db_path.as_deref(), read_only)?;

    match args.command {
        Command::Import { urls, file, lists, downloaded, on_duplicate } => {
            run_import(&mut catalog, &config, urls, file, lists, downloaded, on_duplicate).await?;
        }
        Command::Search { query, order, page, json } => {
            let page_size = config.search.page_size.max(1);
            let order = order.unwrap_or_else(|| config.search.default_order.clone());
            let offset = page_offset(page, page_size);
            let res = catalog.search(&query.join(" "), Some(&order), Some(page_size), offset, true)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&res.books)?);
            } else {
                for book in &res.books {
                    print_book(&catalog, book)?;
                }
                let total = res.total.unwrap_or_default();
                let pages = page_count(total, page_size);
                println!("\nPage {page}/{pages}, {total} books");
            }
        }
        Command::Show { id, json } => match catalog.get_book(id)? {
            Some(book) if json => println!("{}", serde_json::to_string_pretty(&book)?),
            Some(book) => print_book(&catalog, &book)?,
            None => println!("No book with id {id}"),
        },
        Command::Sync { id, kind, names } => {
            let change = catalog.sync_association(id, parse_kind(&kind)?, names.as_slice())?;
            println!("Added: {:?}\nRemoved: {:?}", change.added, change.removed);
        }
        Command::Names { kind } => {
            for name in catalog.list_names(parse_kind(&kind)?)? {
                println!("{name}");
            }
        }
        Command::Remove { id } => {
            if catalog.remove_book(id)? {
                info!("Book #{id} removed");
                println!("Removed book #{id}");
            } else {
                println!("No book with id {id}");
            }
        }
        Command::Downloaded { link_id, no } => {
            if catalog.set_downloaded(link_id, !no)? {
                println!("Link #{link_id} downloaded: {}", !no);
            } else {
                println!("No link with id {link_id}");
            }
        }
        Command::InitConfig => {}
    }

    catalog.close()?;
    Ok(())
}
