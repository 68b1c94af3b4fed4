use chrono::NaiveDate;
use serde::Serialize;

/// A specific site's record of a book. `(site_id, id_onpage)` identifies it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalLink {
    pub id: Option<i64>,
    pub book_id: Option<i64>,
    pub site_id: i64,
    pub id_onpage: String,
    pub url: String,
    pub uploader: Option<String>,
    pub upload_date: Option<NaiveDate>,
    pub ratings: Option<i64>,
    pub favorites: Option<i64>,
    pub downloaded: bool,
    /// Date the site was last checked for this link
    pub last_update: NaiveDate,
    pub outdated: bool,
}

impl ExternalLink {
    pub fn identity(&self) -> (i64, &str) {
        (self.site_id, self.id_onpage.as_str())
    }

    /// Column-wise diff against a freshly extracted version of the same link.
    /// Only fields the site provides are compared.
    pub fn diff(&self, other: &ExternalLink) -> Vec<String> {
        let mut changes = vec![];
        if self.url != other.url {
            changes.push(format!("Column 'url' changed from '{}' to '{}'", self.url, other.url));
        }
        if self.uploader != other.uploader {
            changes.push(format!(
                "Column 'uploader' changed from '{:?}' to '{:?}'",
                self.uploader, other.uploader
            ));
        }
        if self.upload_date != other.upload_date {
            changes.push(format!(
                "Column 'upload_date' changed from '{:?}' to '{:?}'",
                self.upload_date, other.upload_date
            ));
        }
        if self.ratings != other.ratings {
            changes.push(format!(
                "Column 'ratings' changed from '{:?}' to '{:?}'",
                self.ratings, other.ratings
            ));
        }
        if self.favorites != other.favorites {
            changes.push(format!(
                "Column 'favorites' changed from '{:?}' to '{:?}'",
                self.favorites, other.favorites
            ));
        }
        changes
    }
}
