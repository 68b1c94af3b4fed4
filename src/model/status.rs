use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Unknown = 1,
    Ongoing = 2,
    Completed = 3,
    Unreleased = 4,
    Hiatus = 5,
    Cancelled = 6,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Unknown,
        Status::Ongoing,
        Status::Completed,
        Status::Unreleased,
        Status::Hiatus,
        Status::Cancelled,
    ];

    pub fn id(&self) -> i64 {
        *self as i64
    }

    pub fn from_id(i: i64) -> Option<Self> {
        Status::ALL.into_iter().find(|s| s.id() == i)
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Status::ALL
            .into_iter()
            .find(|st| st.to_string().eq_ignore_ascii_case(s.trim()))
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Unknown => write!(f, "Unknown"),
            Status::Ongoing => write!(f, "Ongoing"),
            Status::Completed => write!(f, "Completed"),
            Status::Unreleased => write!(f, "Unreleased"),
            Status::Hiatus => write!(f, "Hiatus"),
            Status::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Censorship {
    #[default]
    Unknown = 1,
    Censored = 2,
    Decensored = 3,
    Uncensored = 4,
}

impl Censorship {
    pub const ALL: [Censorship; 4] = [
        Censorship::Unknown,
        Censorship::Censored,
        Censorship::Decensored,
        Censorship::Uncensored,
    ];

    pub fn id(&self) -> i64 {
        *self as i64
    }

    pub fn from_id(i: i64) -> Option<Self> {
        Censorship::ALL.into_iter().find(|c| c.id() == i)
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Censorship::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(s.trim()))
    }

    /// Derive the censorship state from a book's tags
    pub fn from_tags(tags: &[String]) -> Self {
        if tags.is_empty() {
            Censorship::Unknown
        } else if tags.iter().any(|t| t == "Decensored") {
            Censorship::Decensored
        } else if tags.iter().any(|t| t == "Uncensored") {
            Censorship::Uncensored
        } else {
            Censorship::Censored
        }
    }
}

impl Display for Censorship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Censorship::Unknown => write!(f, "Unknown"),
            Censorship::Censored => write!(f, "Censored"),
            Censorship::Decensored => write!(f, "Decensored"),
            Censorship::Uncensored => write!(f, "Uncensored"),
        }
    }
}

/// Sites books can be imported from; the id is part of a link's identity
pub const SITES: [(i64, &str); 4] = [
    (1, "tsumino.com"),
    (2, "nhentai.net"),
    (3, "MangaDex"),
    (4, "Manganelo"),
];
