use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{MdbError, Result};
use crate::model::assoc::AssocKind;
use crate::model::book::{Book, BookColumns};
use crate::model::ext_link::ExternalLink;
use crate::model::status::{Censorship, Status};

/// Normalized metadata produced by an extractor for one page.
///
/// Every field a book or link can take from a site is listed here; anything
/// else found in an incoming mapping lands in `unknown` and is dropped by
/// [`ExtractedRecord::from_json`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(alias = "imported_from")]
    pub site_id: i64,
    pub id_onpage: String,
    pub url: String,
    #[serde(default)]
    pub title_eng: Option<String>,
    #[serde(default)]
    pub title_foreign: Option<String>,
    #[serde(default)]
    pub pages: Option<i64>,
    /// Language name, resolved to an id when persisting
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub status_id: Option<i64>,
    #[serde(default)]
    pub censor_id: Option<i64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub ratings: Option<i64>,
    #[serde(default)]
    pub favorites: Option<i64>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub upload_date: Option<NaiveDate>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub tag: Vec<String>,
    #[serde(default)]
    pub artist: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub parody: Vec<String>,
    #[serde(default)]
    pub character: Vec<String>,
    #[serde(default)]
    pub collection: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, serde_json::Value>,
}

impl ExtractedRecord {
    /// Builds a record from a field mapping, warning about and dropping
    /// fields that have no counterpart on a book or link.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let mut rec: ExtractedRecord = serde_json::from_value(value)
            .map_err(|e| MdbError::Parse(format!("Invalid extracted record: {e}")))?;
        if !rec.unknown.is_empty() {
            let keys = rec.unknown.keys().cloned().collect::<Vec<_>>().join(", ");
            warn!("Dropping unknown fields from record for '{}': {keys}", rec.url);
            rec.unknown.clear();
        }
        Ok(rec)
    }

    /// Values of an associated attribute. Lists are user data and never extracted.
    pub fn assoc(&self, kind: AssocKind) -> &[String] {
        match kind {
            AssocKind::Tag => &self.tag,
            AssocKind::Artist => &self.artist,
            AssocKind::Category => &self.category,
            AssocKind::Parody => &self.parody,
            AssocKind::Character => &self.character,
            AssocKind::Collection => &self.collection,
            AssocKind::Groups => &self.groups,
            AssocKind::List => &[],
        }
    }

    pub fn title(&self) -> &str {
        self.title_eng
            .as_deref()
            .or(self.title_foreign.as_deref())
            .unwrap_or(&self.url)
    }

    /// Book as described by this record. `language_id` is the resolved
    /// language, `lists` the user lists to put it on.
    pub fn to_book(&self, language_id: i64, lists: &[String], today: NaiveDate) -> Book {
        let columns = BookColumns {
            title_eng: self.title_eng.clone(),
            title_foreign: self.title_foreign.clone(),
            pages: self.pages,
            status_id: Some(self.status_id.unwrap_or(Status::Unknown.id())),
            language_id: Some(language_id),
            censor_id: Some(
                self.censor_id
                    .unwrap_or_else(|| Censorship::from_tags(&self.tag).id()),
            ),
            rating: self.rating,
            my_rating: None,
            note: self.note.clone(),
            favorite: false,
            nsfw: self.nsfw,
            last_change: Some(today),
            last_update: Some(today),
        };
        let mut book = Book::new(columns);
        for kind in AssocKind::ALL {
            book.set_assoc(kind, self.assoc(kind));
        }
        book.set_assoc(AssocKind::List, lists);
        book
    }

    pub fn to_link(&self, downloaded: bool, today: NaiveDate) -> ExternalLink {
        ExternalLink {
            id: None,
            book_id: None,
            site_id: self.site_id,
            id_onpage: self.id_onpage.clone(),
            url: self.url.clone(),
            uploader: self.uploader.clone(),
            upload_date: self.upload_date,
            ratings: self.ratings,
            favorites: self.favorites,
            downloaded,
            last_update: today,
            outdated: false,
        }
    }
}
