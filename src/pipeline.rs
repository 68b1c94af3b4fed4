//! Batch import: many fetch tasks, one writer.
//!
//! Pages are fetched concurrently (at most `workers` at a time) and handed to
//! the single writer over a bounded channel, so the catalog connection never
//! leaves the calling task.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info};

use crate::catalog::{Catalog, ImportOptions, ImportOutcome};
use crate::errors::{MdbError, Result};
use crate::extractor::{self, PageSource};
use crate::model::ExtractedRecord;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub workers: usize,
    pub queue_size: usize,
    pub import: ImportOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            workers: 4,
            queue_size: 16,
            import: ImportOptions::default(),
        }
    }
}

#[derive(Debug)]
pub enum ItemStatus {
    Imported(ImportOutcome),
    FetchFailed(String),
    ImportFailed(String),
}

#[derive(Debug)]
pub struct ItemReport {
    pub index: usize,
    pub url: String,
    pub status: ItemStatus,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// One entry per input url, in input order
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    fn count(&self, f: impl Fn(&ItemStatus) -> bool) -> usize {
        self.items.iter().filter(|i| f(&i.status)).count()
    }

    pub fn inserted(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Imported(ImportOutcome::Inserted { .. })))
    }

    pub fn updated(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Imported(ImportOutcome::Updated { .. })))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Imported(ImportOutcome::AlreadyPresent { .. })))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Imported(ImportOutcome::Duplicate { .. })))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| {
            matches!(
                s,
                ItemStatus::FetchFailed(_)
                    | ItemStatus::ImportFailed(_)
                    | ItemStatus::Imported(ImportOutcome::NoData { .. })
            )
        })
    }

    pub fn summary(&self) -> String {
        format!(
            "{} inserted, {} updated, {} unchanged, {} duplicates, {} failed",
            self.inserted(),
            self.updated(),
            self.unchanged(),
            self.duplicates(),
            self.failed()
        )
    }
}

type Fetched = (usize, String, Result<Option<ExtractedRecord>>);

/// Imports every url. A failing url is reported and never stops the others;
/// `on_item` is called as each one is written.
pub async fn import_many<F>(
    catalog: &mut Catalog,
    source: Arc<dyn PageSource>,
    urls: Vec<String>,
    opts: &PipelineOptions,
    mut on_item: F,
) -> Result<BatchReport>
where
    F: FnMut(&ItemReport),
{
    if catalog.is_read_only() {
        return Err(MdbError::ReadOnlyViolation);
    }
    info!("Importing {} urls with {} workers", urls.len(), opts.workers);

    let semaphore = Arc::new(Semaphore::new(opts.workers.max(1)));
    let (tx, mut rx) = mpsc::channel::<Fetched>(opts.queue_size.max(1));

    for (index, url) in urls.into_iter().enumerate() {
        let tx = tx.clone();
        let semaphore = Arc::clone(&semaphore);
        let source = Arc::clone(&source);
        tokio::spawn(async move {
            let res = match semaphore.acquire_owned().await {
                Ok(_permit) => extractor::retrieve_book_data(source.as_ref(), &url).await,
                Err(e) => Err(MdbError::Generic(format!("Worker pool closed: {e}"))),
            };
            if tx.send((index, url, res)).await.is_err() {
                debug!("Writer stopped before fetch #{index} was delivered");
            }
        });
    }
    // the loop below ends once every task dropped its sender
    drop(tx);

    let mut report = BatchReport::default();
    while let Some((index, url, fetched)) = rx.recv().await {
        let status = match fetched {
            Err(e) => {
                error!("Fetching '{url}' failed: {e}");
                ItemStatus::FetchFailed(e.to_string())
            }
            Ok(record) => match catalog.import_fetched(&url, record, &opts.import) {
                Ok(outcome) => ItemStatus::Imported(outcome),
                Err(e) => {
                    error!("Importing '{url}' failed: {e}");
                    ItemStatus::ImportFailed(e.to_string())
                }
            },
        };
        let item = ItemReport { index, url, status };
        on_item(&item);
        report.items.push(item);
    }

    report.items.sort_by_key(|i| i.index);
    info!("Batch import done: {}", report.summary());
    Ok(report)
}
