use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Many-to-many attributes of a book. Each kind has its own lookup table
/// (id + unique name) and join table (book_id, lookup id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssocKind {
    Tag,
    Artist,
    Category,
    Parody,
    Character,
    Collection,
    Groups,
    List,
}

impl AssocKind {
    pub const ALL: [AssocKind; 8] = [
        AssocKind::Tag,
        AssocKind::Artist,
        AssocKind::Category,
        AssocKind::Parody,
        AssocKind::Character,
        AssocKind::Collection,
        AssocKind::Groups,
        AssocKind::List,
    ];

    /// Key used in search strings and extracted records
    pub fn key(&self) -> &'static str {
        match self {
            AssocKind::Tag => "tag",
            AssocKind::Artist => "artist",
            AssocKind::Category => "category",
            AssocKind::Parody => "parody",
            AssocKind::Character => "character",
            AssocKind::Collection => "collection",
            AssocKind::Groups => "groups",
            AssocKind::List => "list",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        AssocKind::ALL.into_iter().find(|k| k.key() == s)
    }

    pub fn lookup_table(&self) -> &'static str {
        match self {
            AssocKind::Tag => "tags",
            AssocKind::Artist => "artists",
            AssocKind::Category => "categories",
            AssocKind::Parody => "parodies",
            AssocKind::Character => "characters",
            AssocKind::Collection => "collections",
            // "groups" is an SQL keyword
            AssocKind::Groups => "circles",
            AssocKind::List => "lists",
        }
    }

    pub fn join_table(&self) -> &'static str {
        match self {
            AssocKind::Tag => "lkp_book_tag",
            AssocKind::Artist => "lkp_book_artist",
            AssocKind::Category => "lkp_book_category",
            AssocKind::Parody => "lkp_book_parody",
            AssocKind::Character => "lkp_book_character",
            AssocKind::Collection => "lkp_book_collection",
            AssocKind::Groups => "lkp_book_circle",
            AssocKind::List => "lkp_book_list",
        }
    }

    /// Foreign key column in the join table pointing at the lookup table
    pub fn id_column(&self) -> &'static str {
        match self {
            AssocKind::Tag => "tag_id",
            AssocKind::Artist => "artist_id",
            AssocKind::Category => "category_id",
            AssocKind::Parody => "parody_id",
            AssocKind::Character => "character_id",
            AssocKind::Collection => "collection_id",
            AssocKind::Groups => "circle_id",
            AssocKind::List => "list_id",
        }
    }
}

impl Display for AssocKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
