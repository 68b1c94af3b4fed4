//! The store handle. A `Catalog` owns the single SQLite connection; every
//! write goes through `&mut self` and runs in one transaction, so there is
//! exactly one writer per open catalog.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info, warn};

use crate::database::{self, associations, db_loader, queries};
use crate::errors::{MdbError, Result};
use crate::model::{AssocChange, AssocKind, Book, BookColumns, ColumnDiff};
use crate::search::{compile, parse_query, LanguageResolver, OrderBy, ParsedQuery};

pub mod import;

pub use import::{ImportOptions, ImportOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageMode {
    CreateIfAbsent,
    LookupOnly,
}

/// Ways of addressing stored books
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookLookup {
    Id(i64),
    Url(String),
    Identity { site_id: i64, id_onpage: String },
    Titles { title_eng: Option<String>, title_foreign: Option<String> },
}

impl BookLookup {
    /// Builds a lookup from a field mapping. Valid combinations are `id`,
    /// `url`, `site_id` + `id_onpage` and `title_eng` + `title_foreign`
    /// (titles may be null); extra fields are ignored. Checked in that order.
    pub fn from_fields(fields: &BTreeMap<String, Option<String>>) -> Option<Self> {
        let get = |k: &str| fields.get(k);
        if let Some(Some(id)) = get("id") {
            return id.parse().ok().map(BookLookup::Id);
        }
        if let Some(Some(url)) = get("url") {
            return Some(BookLookup::Url(url.clone()));
        }
        let site = get("site_id").or_else(|| get("imported_from"));
        if let (Some(Some(site)), Some(Some(onpage))) = (site, get("id_onpage")) {
            return site.parse().ok().map(|site_id| BookLookup::Identity {
                site_id,
                id_onpage: onpage.clone(),
            });
        }
        if let (Some(eng), Some(foreign)) = (get("title_eng"), get("title_foreign")) {
            if eng.is_some() || foreign.is_some() {
                return Some(BookLookup::Titles {
                    title_eng: eng.clone(),
                    title_foreign: foreign.clone(),
                });
            }
        }
        None
    }
}

/// One page of search results
#[derive(Debug, Default)]
pub struct SearchPage {
    pub books: Vec<Book>,
    /// Number of matches ignoring pagination, when requested
    pub total: Option<i64>,
}

/// Everything that changed when saving a book over its stored version
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookChanges {
    pub columns: ColumnDiff,
    pub assoc: BTreeMap<AssocKind, AssocChange>,
    pub links: Vec<String>,
}

impl BookChanges {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.assoc.is_empty() && self.links.is_empty()
    }

    /// Human readable change log
    pub fn log(&self) -> String {
        let mut lines = self.columns.log.clone();
        for (kind, change) in &self.assoc {
            if !change.added.is_empty() {
                lines.push(format!("Added {kind}: {}", join_set(&change.added)));
            }
            if !change.removed.is_empty() {
                lines.push(format!("Removed {kind}: {}", join_set(&change.removed)));
            }
        }
        lines.extend(self.links.iter().cloned());
        lines.join("\n")
    }
}

fn join_set(s: &std::collections::BTreeSet<String>) -> String {
    s.iter().cloned().collect::<Vec<_>>().join(", ")
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub struct Catalog {
    conn: Connection,
    read_only: bool,
}

impl Catalog {
    /// Opens (and for writable catalogs, creates and initializes) the database.
    /// `None` uses the per-user default path.
    pub fn open(path: Option<&str>, read_only: bool) -> Result<Self> {
        let conn = db_loader::open_db(path, read_only)?;
        if read_only {
            if !database::is_initialized(&conn)? {
                return Err(MdbError::Generic(
                    "Database is not initialized and can't be initialized read-only".to_string(),
                ));
            }
        } else {
            database::init(&conn)?;
        }
        info!("Opened catalog (read_only: {read_only})");
        Ok(Catalog { conn, read_only })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = db_loader::open_in_memory()?;
        database::init(&conn)?;
        Ok(Catalog { conn, read_only: false })
    }

    /// Closes the connection, reporting errors instead of ignoring them on drop
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| MdbError::from(e))
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Raw connection for read queries
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            Err(MdbError::ReadOnlyViolation)
        } else {
            Ok(())
        }
    }

    // ========== Languages ==========

    pub fn get_language_id(&self, name: &str) -> Result<Option<i64>> {
        queries::get_language_id(&self.conn, name)
    }

    pub fn get_language_name(&self, id: i64) -> Result<Option<String>> {
        queries::get_language_name(&self.conn, id)
    }

    pub fn resolve_language(&mut self, name: &str, mode: LanguageMode) -> Result<Option<i64>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        if let Some(id) = self.get_language_id(name)? {
            return Ok(Some(id));
        }
        if mode == LanguageMode::LookupOnly {
            return Ok(None);
        }
        self.ensure_writable()?;
        let tx = self.conn.transaction()?;
        let id = resolve_language_tx(&tx, name, mode)?;
        tx.commit()?;
        Ok(id)
    }

    // ========== Reads ==========

    /// Attaches attribute lists and links to loaded rows, batched per attribute
    fn hydrate(&self, rows: Vec<(i64, BookColumns)>) -> Result<Vec<Book>> {
        let ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
        let mut names: BTreeMap<AssocKind, BTreeMap<i64, Vec<String>>> = BTreeMap::new();
        for kind in AssocKind::ALL {
            names.insert(kind, associations::get_assoc_names_for_books(&self.conn, &ids, kind)?);
        }
        let mut links = queries::get_ext_links_for_books(&self.conn, &ids)?;

        let books = rows
            .into_iter()
            .map(|(id, cols)| {
                let mut book = Book::new(cols);
                book.id = Some(id);
                for (kind, by_book) in names.iter_mut() {
                    if let Some(n) = by_book.remove(&id) {
                        book.set_assoc(*kind, n);
                    }
                }
                book.ext_links = links.remove(&id).unwrap_or_default();
                book.mark_committed();
                book
            })
            .collect();
        Ok(books)
    }

    pub fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let Some(cols) = queries::get_book_columns(&self.conn, id)? else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![(id, cols)])?.pop())
    }

    /// Ids of the books matching `lookup`, lowest first
    pub fn get_book_ids(&self, lookup: &BookLookup) -> Result<Vec<i64>> {
        match lookup {
            BookLookup::Id(id) => Ok(queries::get_book_columns(&self.conn, *id)?
                .map(|_| vec![*id])
                .unwrap_or_default()),
            BookLookup::Url(url) => queries::get_book_ids_by_url(&self.conn, url),
            BookLookup::Identity { site_id, id_onpage } => {
                Ok(queries::get_ext_link_by_identity(&self.conn, *site_id, id_onpage)?
                    .and_then(|l| l.book_id)
                    .into_iter()
                    .collect())
            }
            BookLookup::Titles { title_eng, title_foreign } => queries::get_book_ids_by_titles(
                &self.conn,
                title_eng.as_deref(),
                title_foreign.as_deref(),
            ),
        }
    }

    /// Books matching `lookup`, each loaded only when the iterator reaches it
    pub fn get_books<'a>(
        &'a self,
        lookup: &BookLookup,
    ) -> Result<impl Iterator<Item = Result<Book>> + 'a> {
        let ids = self.get_book_ids(lookup)?;
        Ok(ids.into_iter().filter_map(move |id| self.get_book(id).transpose()))
    }

    /// The single book with exactly these titles
    pub fn get_book_by_titles(
        &self,
        title_eng: Option<&str>,
        title_foreign: Option<&str>,
    ) -> Result<Option<Book>> {
        let ids = queries::get_book_ids_by_titles(&self.conn, title_eng, title_foreign)?;
        match ids.as_slice() {
            [] => Ok(None),
            [id] => self.get_book(*id),
            _ => Err(MdbError::IdentityAmbiguous {
                what: format!("titles {title_eng:?} / {title_foreign:?}"),
                ids,
            }),
        }
    }

    pub fn list_names(&self, kind: AssocKind) -> Result<Vec<String>> {
        associations::list_names(&self.conn, kind)
    }

    /// Runs a search string. An unsupported `order_by` is logged and replaced
    /// by the default order; unknown filter keys are logged and dropped.
    pub fn search(
        &self,
        query: &str,
        order_by: Option<&str>,
        limit: Option<i64>,
        offset: i64,
        with_count: bool,
    ) -> Result<SearchPage> {
        let order = match order_by.map(str::parse::<OrderBy>) {
            None => OrderBy::default(),
            Some(Ok(o)) => o,
            Some(Err(e)) => {
                warn!("{e}, using '{}'", OrderBy::default());
                OrderBy::default()
            }
        };
        let parsed = parse_query(query, self);
        self.search_parsed(&parsed, order, limit, offset, with_count)
    }

    pub fn search_parsed(
        &self,
        parsed: &ParsedQuery,
        order: OrderBy,
        limit: Option<i64>,
        offset: i64,
        with_count: bool,
    ) -> Result<SearchPage> {
        let compiled = compile(parsed, order, limit, offset);
        debug!("Search SQL: {}", compiled.sql);

        let mut stmt = self.conn.prepare(&compiled.sql)?;
        let rows = stmt
            .query_map(params_from_iter(compiled.params.iter()), queries::book_columns_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let books = self.hydrate(rows)?;

        let total = if with_count {
            let count: i64 = self.conn.query_row(
                &compiled.count_sql,
                params_from_iter(compiled.count_params.iter()),
                |row| row.get(0),
            )?;
            Some(count)
        } else {
            None
        };
        Ok(SearchPage { books, total })
    }

    // ========== Writes ==========

    /// Makes a book's names for `kind` equal `desired`, atomically
    pub fn sync_association<S: AsRef<str>>(
        &mut self,
        book_id: i64,
        kind: AssocKind,
        desired: &[S],
    ) -> Result<AssocChange> {
        self.ensure_writable()?;
        let tx = self.conn.transaction()?;
        let change = associations::sync_association(&tx, book_id, kind, desired)?;
        if !change.is_empty() {
            queries::touch_last_change(&tx, book_id, today())?;
        }
        tx.commit()?;
        Ok(change)
    }

    /// Writes an edited book over its stored version and reports what changed.
    /// Links are not touched here.
    pub fn save_book(&mut self, book: &mut Book) -> Result<BookChanges> {
        self.ensure_writable()?;
        let id = book
            .id
            .ok_or_else(|| MdbError::Generic("Book has no id, insert it first".to_string()))?;
        let stored = self
            .get_book(id)?
            .ok_or_else(|| MdbError::Generic(format!("Book #{id} is not in the database")))?;

        let tx = self.conn.transaction()?;
        let changes = update_book_tx(&tx, &stored, book, today())?;
        tx.commit()?;
        book.mark_committed();
        Ok(changes)
    }

    /// Deletes a book with its links and join rows, then drops lookup rows
    /// nothing references anymore
    pub fn remove_book(&mut self, id: i64) -> Result<bool> {
        self.ensure_writable()?;
        let tx = self.conn.transaction()?;
        let removed = queries::delete_book(&tx, id)? > 0;
        if removed {
            for kind in AssocKind::ALL {
                associations::remove_orphans(&tx, kind)?;
            }
        }
        tx.commit()?;
        if removed {
            info!("Removed book #{id}");
        }
        Ok(removed)
    }

    pub fn set_downloaded(&mut self, link_id: i64, downloaded: bool) -> Result<bool> {
        self.ensure_writable()?;
        Ok(queries::set_ext_link_downloaded(&self.conn, link_id, downloaded)? > 0)
    }
}

impl LanguageResolver for Catalog {
    fn language_id(&self, name: &str) -> Option<i64> {
        match self.get_language_id(name) {
            Ok(id) => id,
            Err(e) => {
                warn!("Could not look up language '{name}': {e}");
                None
            }
        }
    }
}

/// Language id for `name`, created on `conn` with `CreateIfAbsent`, so a
/// rollback of the surrounding transaction drops the new row as well
pub(crate) fn resolve_language_tx(
    conn: &Connection,
    name: &str,
    mode: LanguageMode,
) -> Result<Option<i64>> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if let Some(id) = queries::get_language_id(conn, name)? {
        return Ok(Some(id));
    }
    match mode {
        LanguageMode::LookupOnly => Ok(None),
        LanguageMode::CreateIfAbsent => {
            let id = queries::insert_language(conn, name)?;
            info!("Added language '{name}' with id {id}");
            Ok(Some(id))
        }
    }
}

pub(crate) fn insert_book_tx(conn: &Connection, book: &mut Book) -> Result<i64> {
    let cols = book.export_for_db()?;
    let id = queries::insert_book(conn, cols)?;
    for link in book.ext_links.iter_mut() {
        link.id = Some(queries::insert_ext_link(conn, id, link)?);
        link.book_id = Some(id);
    }
    for kind in AssocKind::ALL {
        associations::sync_association(conn, id, kind, book.assoc(kind))?;
    }
    book.id = Some(id);
    Ok(id)
}

/// Writes `new` over `stored`. `last_change` is bumped when something changed.
pub(crate) fn update_book_tx(
    conn: &Connection,
    stored: &Book,
    new: &mut Book,
    today: NaiveDate,
) -> Result<BookChanges> {
    let id = stored
        .id
        .ok_or_else(|| MdbError::Generic("Stored book has no id".to_string()))?;
    let mut changes = BookChanges {
        columns: new.columns.diff(&stored.columns),
        ..Default::default()
    };
    for kind in stored.diff_assoc(new).into_keys() {
        let change = associations::sync_association(conn, id, kind, new.assoc(kind))?;
        if !change.is_empty() {
            changes.assoc.insert(kind, change);
        }
    }
    if !changes.is_empty() {
        new.columns.last_change = Some(today);
    }
    new.export_for_db()?;
    queries::update_book(conn, id, &new.columns)?;
    if !changes.is_empty() {
        debug!("Book #{id} changed:\n{}", changes.log());
    }
    Ok(changes)
}

#[cfg(test)]
mod tests;
