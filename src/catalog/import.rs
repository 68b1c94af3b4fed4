use tracing::{info, warn};

use rusqlite::Connection;

use crate::catalog::{
    insert_book_tx, resolve_language_tx, today, update_book_tx, BookChanges, Catalog,
    LanguageMode,
};
use crate::database::{queries, DEFAULT_LANGUAGE};
use crate::errors::{MdbError, Result};
use crate::extractor::{self, PageSource};
use crate::model::title::normalize_title;
use crate::model::{AssocKind, Book, ExtractedRecord};

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// User lists a newly inserted book is put on; added to existing ones on update
    pub lists: Vec<String>,
    pub downloaded: bool,
}

#[derive(Debug)]
pub enum ImportOutcome {
    /// Nothing could be fetched or extracted from the url
    NoData { url: String },
    /// The link is known and nothing changed
    AlreadyPresent { book_id: i64 },
    Updated {
        book_id: i64,
        book: Book,
        changes: BookChanges,
        /// Link flagged outdated because the page count changed
        outdated_link: Option<i64>,
    },
    /// Not inserted: books with the same normalized title exist. The record
    /// is handed back for `attach_link` or `force_insert`.
    Duplicate { candidates: Vec<i64>, record: ExtractedRecord },
    Inserted { book_id: i64, book: Book },
}

impl ImportOutcome {
    /// `(book_id, book, outdated_link_id)`. The book is only returned when it
    /// was written.
    pub fn into_parts(self) -> (Option<i64>, Option<Book>, Option<i64>) {
        match self {
            ImportOutcome::NoData { .. } | ImportOutcome::Duplicate { .. } => (None, None, None),
            ImportOutcome::AlreadyPresent { book_id } => (Some(book_id), None, None),
            ImportOutcome::Updated { book_id, book, outdated_link, .. } => {
                (Some(book_id), Some(book), outdated_link)
            }
            ImportOutcome::Inserted { book_id, book } => (Some(book_id), Some(book), None),
        }
    }

    pub fn book_id(&self) -> Option<i64> {
        match self {
            ImportOutcome::AlreadyPresent { book_id }
            | ImportOutcome::Updated { book_id, .. }
            | ImportOutcome::Inserted { book_id, .. } => Some(*book_id),
            _ => None,
        }
    }
}

/// Language of the record, created inside the caller's transaction if new
fn record_language(conn: &Connection, record: &ExtractedRecord) -> Result<i64> {
    let name = record.language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
    resolve_language_tx(conn, name, LanguageMode::CreateIfAbsent)?
        .ok_or(MdbError::Validation { column: "language_id" })
}

impl Catalog {

    /// Fetches `url` through `source`, extracts it and imports the result
    pub async fn import_url(
        &mut self,
        url: &str,
        source: &dyn PageSource,
        opts: &ImportOptions,
    ) -> Result<ImportOutcome> {
        self.ensure_writable()?;
        let record = extractor::retrieve_book_data(source, url).await?;
        self.import_fetched(url, record, opts)
    }

    /// Imports the result of a fetch, `None` meaning nothing was extracted
    pub fn import_fetched(
        &mut self,
        url: &str,
        record: Option<ExtractedRecord>,
        opts: &ImportOptions,
    ) -> Result<ImportOutcome> {
        match record {
            Some(record) => self.import_record(record, opts),
            None => {
                warn!("{}", MdbError::ExtractionEmpty(url.to_string()));
                Ok(ImportOutcome::NoData { url: url.to_string() })
            }
        }
    }

    /// Inserts or updates the book described by `record`.
    ///
    /// A known `(site, id_onpage)` updates the owning book. Otherwise a book
    /// whose normalized title matches is reported as a duplicate instead of
    /// inserting.
    pub fn import_record(
        &mut self,
        record: ExtractedRecord,
        opts: &ImportOptions,
    ) -> Result<ImportOutcome> {
        self.ensure_writable()?;

        if let Some(link) =
            queries::get_ext_link_by_identity(&self.conn, record.site_id, &record.id_onpage)?
        {
            if let (Some(link_id), Some(book_id)) = (link.id, link.book_id) {
                return self.update_from_record(book_id, link_id, &record, opts);
            }
        }

        let candidates = queries::get_book_ids_by_normalized_titles(
            &self.conn,
            record.title_eng.as_deref().and_then(normalize_title).as_deref(),
            record.title_foreign.as_deref().and_then(normalize_title).as_deref(),
        )?;
        if !candidates.is_empty() {
            if candidates.len() > 1 {
                warn!(
                    "{}",
                    MdbError::IdentityAmbiguous {
                        what: format!("title '{}'", record.title()),
                        ids: candidates.clone(),
                    }
                );
            }
            info!(
                "Possible duplicate of book(s) {candidates:?} found for '{}'",
                record.title()
            );
            return Ok(ImportOutcome::Duplicate { candidates, record });
        }

        self.force_insert(&record, opts)
    }

    /// Inserts `record` as a new book without looking for duplicates
    pub fn force_insert(
        &mut self,
        record: &ExtractedRecord,
        opts: &ImportOptions,
    ) -> Result<ImportOutcome> {
        self.ensure_writable()?;
        let today = today();
        let tx = self.conn.transaction()?;
        let language_id = record_language(&tx, record)?;
        let mut book = record.to_book(language_id, &opts.lists, today);
        book.ext_links.push(record.to_link(opts.downloaded, today));
        let book_id = insert_book_tx(&tx, &mut book)?;
        tx.commit()?;

        book.mark_committed();
        info!("Added book #{book_id} '{}'", book.title());
        Ok(ImportOutcome::Inserted { book_id, book })
    }

    /// Adds the record's link to an existing book, leaving its data as is
    pub fn attach_link(
        &mut self,
        book_id: i64,
        record: &ExtractedRecord,
        downloaded: bool,
    ) -> Result<i64> {
        self.ensure_writable()?;
        if queries::get_book_columns(&self.conn, book_id)?.is_none() {
            return Err(MdbError::Generic(format!("Book #{book_id} is not in the database")));
        }
        let link = record.to_link(downloaded, today());
        let link_id = queries::insert_ext_link(&self.conn, book_id, &link)?;
        info!("Added link '{}' to book #{book_id}", link.url);
        Ok(link_id)
    }

    fn update_from_record(
        &mut self,
        book_id: i64,
        link_id: i64,
        record: &ExtractedRecord,
        opts: &ImportOptions,
    ) -> Result<ImportOutcome> {
        let stored = self
            .get_book(book_id)?
            .ok_or_else(|| MdbError::Generic(format!("Book #{book_id} is not in the database")))?;
        let today = today();
        let tx = self.conn.transaction()?;
        let language_id = record_language(&tx, record)?;

        // site data replaces stored data, user data is kept
        let fresh = record.to_book(language_id, &[], today);
        let mut book = stored.clone();
        book.columns.title_eng = fresh.columns.title_eng.clone();
        book.columns.title_foreign = fresh.columns.title_foreign.clone();
        book.columns.pages = fresh.columns.pages;
        book.columns.status_id = fresh.columns.status_id;
        book.columns.language_id = fresh.columns.language_id;
        book.columns.censor_id = fresh.columns.censor_id;
        book.columns.rating = fresh.columns.rating;
        book.columns.nsfw = fresh.columns.nsfw;
        book.columns.last_update = Some(today);
        for kind in AssocKind::ALL.into_iter().filter(|k| *k != AssocKind::List) {
            book.set_assoc(kind, fresh.assoc(kind));
        }
        let lists: Vec<String> = stored
            .assoc(AssocKind::List)
            .iter()
            .chain(opts.lists.iter())
            .cloned()
            .collect();
        book.set_assoc(AssocKind::List, lists);

        let mut link = stored
            .ext_links
            .iter()
            .find(|l| l.id == Some(link_id))
            .cloned()
            .ok_or_else(|| MdbError::Generic(format!("Link #{link_id} is not loaded")))?;
        let fresh_link = record.to_link(link.downloaded, today);
        let link_changes = link.diff(&fresh_link);

        let pages_changed = stored.columns.pages != book.columns.pages;
        let mut changes = update_book_tx(&tx, &stored, &mut book, today)?;
        changes.links = link_changes;

        link.url = fresh_link.url;
        link.uploader = fresh_link.uploader;
        link.upload_date = fresh_link.upload_date;
        link.ratings = fresh_link.ratings;
        link.favorites = fresh_link.favorites;
        link.last_update = today;
        if pages_changed {
            link.outdated = true;
        }
        queries::update_ext_link(&tx, link_id, &link)?;
        tx.commit()?;

        if let Some(l) = book.ext_links.iter_mut().find(|l| l.id == Some(link_id)) {
            *l = link;
        }
        book.mark_committed();

        if changes.is_empty() {
            info!("Book #{book_id} '{}' is already in DB", book.title());
            return Ok(ImportOutcome::AlreadyPresent { book_id });
        }
        info!("Updated book #{book_id} '{}':\n{}", book.title(), changes.log());
        let outdated_link = pages_changed.then_some(link_id);
        if outdated_link.is_some() {
            warn!("Page count of book #{book_id} changed, link #{link_id} flagged outdated");
        }
        Ok(ImportOutcome::Updated {
            book_id,
            book,
            changes,
            outdated_link,
        })
    }
}
