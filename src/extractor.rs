use tracing::{info, warn};

use crate::errors::{MdbError, Result};
use crate::model::ExtractedRecord;

pub mod source;
pub mod tsumino;

pub use source::{HttpSource, PageSource, StaticSource, DEFAULT_USER_AGENT};
pub use tsumino::TsuminoExtractor;

/// Turns the html of one site's book page into an [`ExtractedRecord`]
pub trait Extractor: Send + Sync {
    fn site_id(&self) -> i64;
    fn site_name(&self) -> &'static str;
    fn matches(&self, url: &str) -> bool;
    fn book_id_from_url(&self, url: &str) -> Option<String>;
    fn cover_url(&self, id_onpage: &str) -> Option<String>;
    /// None if the page doesn't hold the expected book data
    fn extract(&self, url: &str, html: &str) -> Option<ExtractedRecord>;
}

static EXTRACTORS: [&dyn Extractor; 1] = [&TsuminoExtractor];

pub fn find_extractor(url: &str) -> Option<&'static dyn Extractor> {
    EXTRACTORS.iter().copied().find(|e| e.matches(url))
}

pub fn find_extractor_by_site(site_id: i64) -> Option<&'static dyn Extractor> {
    EXTRACTORS.iter().copied().find(|e| e.site_id() == site_id)
}

/// Fetches and extracts `url`. `Ok(None)` when the page gave no data.
pub async fn retrieve_book_data(
    source: &dyn PageSource,
    url: &str,
) -> Result<Option<ExtractedRecord>> {
    let extractor = find_extractor(url)
        .ok_or_else(|| MdbError::Parse(format!("No extractor supports url '{url}'")))?;
    info!("Retrieving book data from {} for '{url}'", extractor.site_name());

    let Some(html) = source.get_html(url).await? else {
        warn!("Extraction failed! HTML was empty for url '{url}'");
        return Ok(None);
    };
    Ok(extractor.extract(url, &html))
}
