use clap::ValueEnum;
use dialoguer::{theme::ColorfulTheme, Select};

use crate::catalog::{Catalog, ImportOptions, ImportOutcome};
use crate::errors::MdbError;
use crate::model::ExtractedRecord;

/// What to do when an imported book looks like one already stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DuplicatePolicy {
    /// Ask interactively for every duplicate
    Ask,
    /// Leave the database untouched
    Skip,
    /// Add the link to the first matching book
    Attach,
    /// Store the book anyway
    Insert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Skipped,
    Attached { book_id: i64, link_id: i64 },
    Inserted { book_id: i64 },
}

pub fn resolve_duplicate(
    catalog: &mut Catalog,
    candidates: &[i64],
    record: &ExtractedRecord,
    opts: &ImportOptions,
    policy: DuplicatePolicy,
) -> Result<Resolution, MdbError> {
    match policy {
        DuplicatePolicy::Skip => Ok(Resolution::Skipped),
        DuplicatePolicy::Attach => match candidates.first() {
            Some(&book_id) => attach(catalog, book_id, record, opts),
            None => Ok(Resolution::Skipped),
        },
        DuplicatePolicy::Insert => insert(catalog, record, opts),
        DuplicatePolicy::Ask => ask(catalog, candidates, record, opts),
    }
}

fn attach(
    catalog: &mut Catalog,
    book_id: i64,
    record: &ExtractedRecord,
    opts: &ImportOptions,
) -> Result<Resolution, MdbError> {
    let link_id = catalog.attach_link(book_id, record, opts.downloaded)?;
    Ok(Resolution::Attached { book_id, link_id })
}

fn insert(
    catalog: &mut Catalog,
    record: &ExtractedRecord,
    opts: &ImportOptions,
) -> Result<Resolution, MdbError> {
    match catalog.force_insert(record, opts)? {
        ImportOutcome::Inserted { book_id, .. } => Ok(Resolution::Inserted { book_id }),
        other => Err(MdbError::Generic(format!("Unexpected import result {other:?}"))),
    }
}

fn ask(
    catalog: &mut Catalog,
    candidates: &[i64],
    record: &ExtractedRecord,
    opts: &ImportOptions,
) -> Result<Resolution, MdbError> {
    println!("\n'{}' ({}) looks like a book already in the database.", record.title(), record.url);

    let mut options = vec![];
    for id in candidates {
        let label = match catalog.get_book(*id)? {
            Some(book) => {
                let sites: Vec<&str> = book.ext_links.iter().map(|l| l.url.as_str()).collect();
                format!(
                    "Add link to #{id} '{}' ({} pages) [{}]",
                    book.title(),
                    book.columns.pages.unwrap_or_default(),
                    sites.join(", ")
                )
            }
            None => format!("Add link to #{id}"),
        };
        options.push(label);
    }
    options.push("Insert as a new book".to_string());
    options.push("Skip".to_string());

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Duplicate found")
        .items(&options)
        .default(0)
        .interact()
        .map_err(|e| MdbError::Parse(format!("Selection error: {}", e)))?;

    if let Some(&book_id) = candidates.get(selection) {
        attach(catalog, book_id, record, opts)
    } else if selection == candidates.len() {
        insert(catalog, record, opts)
    } else {
        Ok(Resolution::Skipped)
    }
}
