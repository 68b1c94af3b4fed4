use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::errors::MdbError;
use crate::model::{AssocKind, Censorship, Status};

/// Scalar book columns a search string can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarKey {
    Favorite,
    Nsfw,
    Pages,
    LanguageId,
    StatusId,
    CensorId,
}

impl ScalarKey {
    pub fn column(&self) -> &'static str {
        match self {
            ScalarKey::Favorite => "favorite",
            ScalarKey::Nsfw => "nsfw",
            ScalarKey::Pages => "pages",
            ScalarKey::LanguageId => "language_id",
            ScalarKey::StatusId => "status_id",
            ScalarKey::CensorId => "censor_id",
        }
    }

    /// Key as typed in a search string
    pub fn from_search_key(key: &str) -> Option<Self> {
        match key {
            "favorite" => Some(ScalarKey::Favorite),
            "nsfw" => Some(ScalarKey::Nsfw),
            "pages" => Some(ScalarKey::Pages),
            "language" => Some(ScalarKey::LanguageId),
            "status" => Some(ScalarKey::StatusId),
            "censorship" => Some(ScalarKey::CensorId),
            _ => None,
        }
    }
}

/// Value of a scalar filter: raw text for the compiler to interpret, or an
/// id already resolved from a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarValue {
    Raw(String),
    Id(i64),
}

/// Name -> id lookup for `language:` filters. Must never create languages.
pub trait LanguageResolver {
    fn language_id(&self, name: &str) -> Option<i64>;
}

impl<F> LanguageResolver for F
where
    F: Fn(&str) -> Option<i64>,
{
    fn language_id(&self, name: &str) -> Option<i64> {
        self(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    /// Free text matched against the titles
    pub title: Option<String>,
    pub scalars: BTreeMap<ScalarKey, ScalarValue>,
    pub include: BTreeMap<AssocKind, Vec<String>>,
    pub exclude: BTreeMap<AssocKind, Vec<String>>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.scalars.is_empty()
            && self.include.is_empty()
            && self.exclude.is_empty()
    }
}

fn key_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^([A-Za-z_]+):(.*)$").expect("valid regex"))
}

/// Splits on whitespace outside of double quotes. Quote characters stay in
/// the tokens; an unbalanced last quote is dropped.
pub fn tokenize(input: &str) -> Vec<String> {
    let quote_count = input.matches('"').count();
    let stray_quote = if quote_count % 2 == 1 {
        input.rfind('"')
    } else {
        None
    };

    let mut tokens = vec![];
    let mut current = String::new();
    let mut in_quotes = false;
    for (i, c) in input.char_indices() {
        if Some(i) == stray_quote {
            continue;
        }
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"')
}

/// Parses a search string into free text and filters.
///
/// `key:value` tokens with a known key become filters; values may be quoted
/// and hold `;`-separated items, each optionally prefixed with `!` to exclude
/// it. Unknown keys are logged and dropped. Everything else is free text.
pub fn parse_query<L: LanguageResolver + ?Sized>(input: &str, languages: &L) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();
    let mut free_text: Vec<String> = vec![];

    for token in tokenize(input) {
        let Some(caps) = key_value_re().captures(&token) else {
            let text = unquote(&token);
            if !text.is_empty() {
                free_text.push(text.to_string());
            }
            continue;
        };
        let key = caps[1].to_lowercase();
        let value = unquote(&caps[2]);

        if let Some(kind) = AssocKind::from_key(&key) {
            for item in value.split(';').map(str::trim) {
                match item.strip_prefix('!').map(str::trim) {
                    Some("") => {}
                    Some(excluded) => parsed.exclude.entry(kind).or_default().push(excluded.to_string()),
                    None if item.is_empty() => {}
                    None => parsed.include.entry(kind).or_default().push(item.to_string()),
                }
            }
        } else if let Some(scalar) = ScalarKey::from_search_key(&key) {
            if let Some(v) = resolve_scalar(scalar, value, languages) {
                parsed.scalars.insert(scalar, v);
            }
        } else {
            info!("{}", MdbError::UnsupportedSearchKey(key));
        }
    }

    if !free_text.is_empty() {
        parsed.title = Some(free_text.join(" "));
    }
    debug!("Parsed search '{input}' into {parsed:?}");
    parsed
}

fn resolve_scalar<L: LanguageResolver + ?Sized>(
    key: ScalarKey,
    value: &str,
    languages: &L,
) -> Option<ScalarValue> {
    if value.is_empty() {
        return None;
    }
    let resolved = match key {
        ScalarKey::LanguageId => languages.language_id(value).map(ScalarValue::Id),
        ScalarKey::StatusId => Status::from_name(value).map(|s| ScalarValue::Id(s.id())),
        ScalarKey::CensorId => Censorship::from_name(value).map(|c| ScalarValue::Id(c.id())),
        ScalarKey::Favorite | ScalarKey::Nsfw | ScalarKey::Pages => {
            Some(ScalarValue::Raw(value.to_string()))
        }
    };
    if resolved.is_none() {
        info!("Unknown value '{value}' for search type '{}', filter dropped", key.column());
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs(name: &str) -> Option<i64> {
        match name {
            "English" => Some(1),
            "Japanese" => Some(2),
            _ => None,
        }
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_respects_quotes() {
        assert_eq!(
            tokenize(r#"a  tag:"Multi Word;x" b"#),
            vec!["a", r#"tag:"Multi Word;x""#, "b"]
        );
        assert_eq!(tokenize("   "), Vec::<String>::new());
        // stray trailing quote is ignored
        assert_eq!(tokenize(r#"list:!to-read" favorite:0"#), vec!["list:!to-read", "favorite:0"]);
    }

    #[test]
    fn test_plain_title() {
        let p = parse_query("search for title", &langs);
        assert_eq!(p.title.as_deref(), Some("search for title"));
        assert!(p.include.is_empty() && p.exclude.is_empty() && p.scalars.is_empty());
    }

    #[test]
    fn test_filter_position_does_not_matter() {
        let a = parse_query("search for title tag:Test1;Test2", &langs);
        let b = parse_query("tag:Test1;Test2 search for title", &langs);
        assert_eq!(a, b);
        assert_eq!(a.title.as_deref(), Some("search for title"));
        assert_eq!(a.include[&AssocKind::Tag], names(&["Test1", "Test2"]));
    }

    #[test]
    fn test_quoted_multi_word_values() {
        let p = parse_query(r#"tag:"Multi Word Tag;Test1;!Test3""#, &langs);
        assert_eq!(p.include[&AssocKind::Tag], names(&["Multi Word Tag", "Test1"]));
        assert_eq!(p.exclude[&AssocKind::Tag], names(&["Test3"]));
        assert_eq!(p.title, None);
    }

    #[test]
    fn test_mixed_query() {
        let p = parse_query(
            r#"category:Manga search for title tag:"Multi Word Tag;Test1;!Test3;Test2;!Test4""#,
            &langs,
        );
        assert_eq!(p.title.as_deref(), Some("search for title"));
        assert_eq!(p.include[&AssocKind::Tag], names(&["Multi Word Tag", "Test1", "Test2"]));
        assert_eq!(p.include[&AssocKind::Category], names(&["Manga"]));
        assert_eq!(p.exclude[&AssocKind::Tag], names(&["Test3", "Test4"]));
        assert_eq!(p.exclude.len(), 1);
    }

    #[test]
    fn test_scalars_and_language() {
        let p = parse_query(
            r#"parody:"!Test and Test2;Test;Incl and incl" pages:25 favorite:0 language:English"#,
            &langs,
        );
        assert_eq!(p.title, None);
        assert_eq!(p.include[&AssocKind::Parody], names(&["Test", "Incl and incl"]));
        assert_eq!(p.exclude[&AssocKind::Parody], names(&["Test and Test2"]));
        assert_eq!(p.scalars[&ScalarKey::Favorite], ScalarValue::Raw("0".to_string()));
        assert_eq!(p.scalars[&ScalarKey::Pages], ScalarValue::Raw("25".to_string()));
        assert_eq!(p.scalars[&ScalarKey::LanguageId], ScalarValue::Id(1));
    }

    #[test]
    fn test_stray_quote_and_unquoted_exclusions() {
        let p = parse_query(
            r#"parody:"!Test and Test2;Test" title search tag:!Test3;Test2;!Test4 list:!to-read" favorite:0 language:English"#,
            &langs,
        );
        assert_eq!(p.title.as_deref(), Some("title search"));
        assert_eq!(p.include[&AssocKind::Tag], names(&["Test2"]));
        assert_eq!(p.exclude[&AssocKind::Tag], names(&["Test3", "Test4"]));
        assert_eq!(p.exclude[&AssocKind::List], names(&["to-read"]));
        assert!(!p.include.contains_key(&AssocKind::List));
        assert_eq!(p.scalars[&ScalarKey::LanguageId], ScalarValue::Id(1));
    }

    #[test]
    fn test_unknown_keys_and_languages_are_dropped() {
        let p = parse_query("adakfaro:1 language:Klingon title", &langs);
        assert_eq!(p.title.as_deref(), Some("title"));
        assert!(p.scalars.is_empty());
        assert!(p.include.is_empty());
    }

    #[test]
    fn test_status_and_censorship_resolve_to_ids() {
        let p = parse_query("status:completed censorship:Uncensored status:bogus", &langs);
        // an unresolvable value is dropped and does not override the earlier one
        assert_eq!(p.scalars[&ScalarKey::StatusId], ScalarValue::Id(3));
        assert_eq!(p.scalars[&ScalarKey::CensorId], ScalarValue::Id(4));
    }

    #[test]
    fn test_duplicates() {
        let p = parse_query("favorite:1 tag:A favorite:0 tag:B;!A", &langs);
        assert_eq!(p.scalars[&ScalarKey::Favorite], ScalarValue::Raw("0".to_string()));
        assert_eq!(p.include[&AssocKind::Tag], names(&["A", "B"]));
        // kept on both sides, the compiler lets the exclusion win
        assert_eq!(p.exclude[&AssocKind::Tag], names(&["A"]));
    }

    #[test]
    fn test_empty_items_are_ignored() {
        let p = parse_query("tag:;A;;!;!", &langs);
        assert_eq!(p.include[&AssocKind::Tag], names(&["A"]));
        assert!(p.exclude.is_empty());
        assert!(parse_query("", &langs).is_empty());
    }
}
