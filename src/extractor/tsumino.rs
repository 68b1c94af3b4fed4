use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, warn};

use crate::extractor::Extractor;
use crate::model::{Censorship, ExtractedRecord, Status};

const SITE_ID: i64 = 1;

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:https?://)?(?:www\.)?tsumino\.com/(?:entry|Read/Index)/(\d+)/?")
            .expect("valid regex")
    })
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+) / (.+)").expect("valid regex"))
}

fn rating_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d\.\d{1,2}|\d) \((\d+) users / (\d+) favs\)").expect("valid regex")
    })
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

#[derive(Debug, Clone, PartialEq)]
enum BookData {
    Text(String),
    List(Vec<String>),
}

impl BookData {
    fn into_text(self) -> String {
        match self {
            BookData::Text(t) => t,
            BookData::List(l) => l.into_iter().next().unwrap_or_default(),
        }
    }

    fn into_list(self) -> Vec<String> {
        match self {
            BookData::Text(t) => vec![t],
            BookData::List(l) => l,
        }
    }
}

fn first_text(el: &ElementRef) -> Option<String> {
    el.text().map(str::trim).find(|t| !t.is_empty()).map(str::to_string)
}

/// `id` of every `div.book-data` in the info container mapped to its text,
/// or to the texts of its links
fn extract_info(html: &str) -> Option<BTreeMap<String, BookData>> {
    let document = Html::parse_document(html);
    let container = document.select(&selector("div.book-info-container")).next()?;
    let data_sel = selector("div.book-data");
    let a_sel = selector("a");

    let mut res = BTreeMap::new();
    for div in container.select(&data_sel) {
        let Some(id) = div.value().attr("id").filter(|id| !id.is_empty()) else {
            continue;
        };
        // needs a logged in session
        if id == "MyRating" {
            continue;
        }
        let links: Vec<String> = div.select(&a_sel).filter_map(|a| first_text(&a)).collect();
        if !links.is_empty() {
            res.insert(id.to_string(), BookData::List(links));
        } else if let Some(text) = first_text(&div) {
            res.insert(id.to_string(), BookData::Text(text));
        }
    }
    debug!("Extracted book data!");
    Some(res)
}

fn is_foreign(title: &str) -> bool {
    title.chars().any(|c| !c.is_ascii() && c.is_alphabetic())
}

/// Splits `"English / Foreign"`; a single title goes to the side its script suggests
fn split_title(value: &str) -> (Option<String>, Option<String>) {
    if let Some(caps) = title_re().captures(value) {
        return (Some(caps[1].to_string()), Some(caps[2].to_string()));
    }
    if is_foreign(value) {
        (None, Some(value.to_string()))
    } else {
        (Some(value.to_string()), None)
    }
}

pub struct TsuminoExtractor;

impl Extractor for TsuminoExtractor {
    fn site_id(&self) -> i64 {
        SITE_ID
    }

    fn site_name(&self) -> &'static str {
        "tsumino.com"
    }

    fn matches(&self, url: &str) -> bool {
        url_re().is_match(url)
    }

    fn book_id_from_url(&self, url: &str) -> Option<String> {
        url_re().captures(url).map(|c| c[1].to_string())
    }

    fn cover_url(&self, id_onpage: &str) -> Option<String> {
        Some(format!("https://content.tsumino.com/thumbs/{id_onpage}/1"))
    }

    fn extract(&self, url: &str, html: &str) -> Option<ExtractedRecord> {
        let Some(id_onpage) = self.book_id_from_url(url) else {
            warn!("No book id could be extracted from \"{url}\"!");
            return None;
        };
        let Some(mut data) = extract_info(html) else {
            warn!("No book info found in page of '{url}'");
            return None;
        };

        let mut rec = ExtractedRecord {
            site_id: SITE_ID,
            id_onpage,
            url: url.trim_end_matches('-').to_string(),
            language: Some("English".to_string()),
            status_id: Some(Status::Unknown.id()),
            // no reliable marker for sfw books on the site
            nsfw: true,
            ..Default::default()
        };

        if let Some(title) = data.remove("Title") {
            (rec.title_eng, rec.title_foreign) = split_title(&title.into_text());
        }
        if let Some(pages) = data.remove("Pages") {
            let pages = pages.into_text();
            rec.pages = pages.parse().ok();
            if rec.pages.is_none() {
                warn!("Could not parse page count '{pages}'");
            }
        }
        if let Some(rating) = data.remove("Rating") {
            let rating = rating.into_text();
            match rating_re().captures(&rating) {
                Some(caps) => {
                    rec.rating = caps[1].parse().ok();
                    rec.ratings = caps[2].parse().ok();
                    rec.favorites = caps[3].parse().ok();
                }
                None => warn!("Could not parse rating '{rating}'"),
            }
        }
        if let Some(uploader) = data.remove("Uploader") {
            let uploader = uploader.into_list();
            if uploader.len() > 1 {
                error!("More than one uploader: {uploader:?}");
            }
            rec.uploader = uploader.into_iter().next();
        }
        if let Some(date) = data.remove("Uploaded") {
            let date = date.into_text();
            rec.upload_date = NaiveDate::parse_from_str(&date, "%Y %B %d").ok();
            if rec.upload_date.is_none() {
                warn!("Could not parse upload date '{date}'");
            }
        }

        let mut list = |key: &str| data.remove(key).map(BookData::into_list).unwrap_or_default();
        rec.tag = list("Tag");
        rec.category = list("Category");
        rec.collection = list("Collection");
        rec.groups = list("Group");
        rec.artist = list("Artist");
        rec.parody = list("Parody");
        rec.character = list("Character");
        rec.censor_id = Some(Censorship::from_tags(&rec.tag).id());

        if !data.is_empty() {
            warn!(
                "There are still metadata keys left! The HTML on tsumino.com probably changed! Keys left over: {}",
                data.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        Some(rec)
    }
}
