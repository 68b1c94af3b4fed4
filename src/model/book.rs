use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use chrono::NaiveDate;
use serde::Serialize;

use crate::errors::{MdbError, Result};
use crate::model::assoc::AssocKind;
use crate::model::ext_link::ExternalLink;

/// Scalar columns stored directly in the `books` row
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BookColumns {
    pub title_eng: Option<String>,
    pub title_foreign: Option<String>,
    pub pages: Option<i64>,
    pub status_id: Option<i64>,
    pub language_id: Option<i64>,
    pub censor_id: Option<i64>,
    pub rating: Option<f64>,
    pub my_rating: Option<f64>,
    pub note: Option<String>,
    pub favorite: bool,
    pub nsfw: bool,
    pub last_change: Option<NaiveDate>,
    pub last_update: Option<NaiveDate>,
}

/// Result of comparing two versions of a book's scalar columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnDiff {
    pub log: Vec<String>,
    pub changed: Vec<&'static str>,
}

impl ColumnDiff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    fn compare<T: PartialEq + Debug>(&mut self, col: &'static str, old: &T, new: &T) {
        if old != new {
            self.log.push(format!("Column '{col}' changed from '{old:?}' to '{new:?}'"));
            self.changed.push(col);
        }
    }
}

impl BookColumns {
    pub const COLUMNS: [&'static str; 13] = [
        "title_eng",
        "title_foreign",
        "pages",
        "status_id",
        "language_id",
        "censor_id",
        "rating",
        "my_rating",
        "note",
        "favorite",
        "nsfw",
        "last_change",
        "last_update",
    ];

    /// Checks every not-null column is populated
    pub fn validate(&self) -> Result<()> {
        let has_title = |t: &Option<String>| t.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !has_title(&self.title_eng) && !has_title(&self.title_foreign) {
            return Err(MdbError::Validation { column: "title_eng" });
        }
        if self.pages.is_none() {
            return Err(MdbError::Validation { column: "pages" });
        }
        if self.status_id.is_none() {
            return Err(MdbError::Validation { column: "status_id" });
        }
        if self.language_id.is_none() {
            return Err(MdbError::Validation { column: "language_id" });
        }
        if self.censor_id.is_none() {
            return Err(MdbError::Validation { column: "censor_id" });
        }
        if self.last_change.is_none() {
            return Err(MdbError::Validation { column: "last_change" });
        }
        Ok(())
    }

    /// Changes needed to go from `old` to `self`.
    /// `last_change`/`last_update` are bookkeeping and never reported.
    pub fn diff(&self, old: &BookColumns) -> ColumnDiff {
        let mut d = ColumnDiff::default();
        d.compare("title_eng", &old.title_eng, &self.title_eng);
        d.compare("title_foreign", &old.title_foreign, &self.title_foreign);
        d.compare("pages", &old.pages, &self.pages);
        d.compare("status_id", &old.status_id, &self.status_id);
        d.compare("language_id", &old.language_id, &self.language_id);
        d.compare("censor_id", &old.censor_id, &self.censor_id);
        d.compare("rating", &old.rating, &self.rating);
        d.compare("my_rating", &old.my_rating, &self.my_rating);
        d.compare("note", &old.note, &self.note);
        d.compare("favorite", &old.favorite, &self.favorite);
        d.compare("nsfw", &old.nsfw, &self.nsfw);
        d
    }
}

/// Names added and removed for one associated attribute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssocChange {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl AssocChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Trims names, drops empty ones and duplicates while keeping first-seen order
pub fn clean_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Book {
    pub id: Option<i64>,
    #[serde(flatten)]
    pub columns: BookColumns,
    assoc: BTreeMap<AssocKind, Vec<String>>,
    pub ext_links: Vec<ExternalLink>,
    /// Columns as last loaded from or written to the store
    #[serde(skip)]
    committed: Option<BookColumns>,
}

impl Book {
    pub fn new(columns: BookColumns) -> Self {
        Book {
            columns,
            ..Default::default()
        }
    }

    /// Display title, english preferred
    pub fn title(&self) -> &str {
        self.columns
            .title_eng
            .as_deref()
            .or(self.columns.title_foreign.as_deref())
            .unwrap_or("")
    }

    pub fn assoc(&self, kind: AssocKind) -> &[String] {
        self.assoc.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_assoc<I, S>(&mut self, kind: AssocKind, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = clean_names(names);
        if names.is_empty() {
            self.assoc.remove(&kind);
        } else {
            self.assoc.insert(kind, names);
        }
    }

    /// Columns ready to be written, failing if a not-null column is missing
    pub fn export_for_db(&self) -> Result<&BookColumns> {
        self.columns.validate()?;
        Ok(&self.columns)
    }

    pub fn committed(&self) -> Option<&BookColumns> {
        self.committed.as_ref()
    }

    pub fn mark_committed(&mut self) {
        self.committed = Some(self.columns.clone());
    }

    pub fn in_db(&self) -> bool {
        self.id.is_some() && self.committed.is_some()
    }

    /// True if the columns differ from the committed snapshot
    pub fn has_unsaved_changes(&self) -> bool {
        match &self.committed {
            Some(c) => !self.columns.diff(c).is_empty(),
            None => true,
        }
    }

    /// Per attribute, what has to change to turn `self` into `other`
    pub fn diff_assoc(&self, other: &Book) -> BTreeMap<AssocKind, AssocChange> {
        let mut res = BTreeMap::new();
        for kind in AssocKind::ALL {
            let current: BTreeSet<&String> = self.assoc(kind).iter().collect();
            let desired: BTreeSet<&String> = other.assoc(kind).iter().collect();
            let change = AssocChange {
                added: desired.difference(&current).map(|s| s.to_string()).collect(),
                removed: current.difference(&desired).map(|s| s.to_string()).collect(),
            };
            if !change.is_empty() {
                res.insert(kind, change);
            }
        }
        res
    }
}
