use std::collections::{BTreeMap, BTreeSet};

use super::*;
use crate::model::ExtractedRecord;

fn record(id_onpage: &str, title: &str, pages: i64, tags: &[&str]) -> ExtractedRecord {
    ExtractedRecord {
        site_id: 1,
        id_onpage: id_onpage.to_string(),
        url: format!("https://www.tsumino.com/entry/{id_onpage}"),
        title_eng: Some(title.to_string()),
        pages: Some(pages),
        tag: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

fn set(v: &[&str]) -> BTreeSet<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn inserted_id(outcome: ImportOutcome) -> i64 {
    match outcome {
        ImportOutcome::Inserted { book_id, .. } => book_id,
        other => panic!("expected insert, got {other:?}"),
    }
}

fn titles(page: &SearchPage) -> Vec<&str> {
    page.books.iter().map(|b| b.title()).collect()
}

/// Alpha: tags A, B / artist X; Beta: tag A; Gamma: tag C
fn seeded() -> Catalog {
    let mut cat = Catalog::open_in_memory().unwrap();
    let opts = ImportOptions::default();
    let mut alpha = record("1", "Alpha Book", 30, &["A", "B"]);
    alpha.artist = vec!["X".to_string()];
    cat.import_record(alpha, &opts).unwrap();
    cat.import_record(record("2", "Beta Book", 10, &["A"]), &opts).unwrap();
    cat.import_record(record("3", "Gamma Book", 20, &["C"]), &opts).unwrap();
    cat
}

#[test]
fn test_import_round_trip() {
    let mut cat = Catalog::open_in_memory().unwrap();
    let mut rec = record("43357", "Negimatic Paradise! 05'", 23, &["Cosplay", "Teacher"]);
    rec.title_foreign = Some("ネギまちっく天国05'".to_string());
    rec.artist = vec!["Tsurugi Yasuyuki".to_string()];
    rec.rating = Some(4.57);
    rec.ratings = Some(7);
    let opts = ImportOptions {
        lists: vec!["to-read".to_string()],
        downloaded: true,
    };

    let id = inserted_id(cat.import_record(rec.clone(), &opts).unwrap());
    let book = cat.get_book(id).unwrap().unwrap();
    assert!(book.in_db());
    assert_eq!(book.columns.title_foreign.as_deref(), Some("ネギまちっく天国05'"));
    assert_eq!(book.columns.pages, Some(23));
    assert_eq!(book.columns.language_id, Some(1));
    assert_eq!(book.columns.rating, Some(4.57));
    assert_eq!(book.assoc(AssocKind::Tag), &["Cosplay".to_string(), "Teacher".to_string()]);
    assert_eq!(book.assoc(AssocKind::Artist), &["Tsurugi Yasuyuki".to_string()]);
    assert_eq!(book.assoc(AssocKind::List), &["to-read".to_string()]);
    assert_eq!(book.ext_links.len(), 1);
    assert!(book.ext_links[0].downloaded);
    assert_eq!(book.ext_links[0].ratings, Some(7));

    // same data again changes nothing
    let again = cat.import_record(rec, &ImportOptions::default()).unwrap();
    assert!(matches!(again, ImportOutcome::AlreadyPresent { book_id } if book_id == id));
    let (book_id, book, outdated) = again.into_parts();
    assert_eq!(book_id, Some(id));
    assert!(book.is_none() && outdated.is_none());
    assert_eq!(cat.get_book(id).unwrap().unwrap().assoc(AssocKind::List).len(), 1);
}

#[test]
fn test_import_update_reports_changes() {
    let mut cat = Catalog::open_in_memory().unwrap();
    let opts = ImportOptions::default();
    let id = inserted_id(cat.import_record(record("7", "Venus Nights", 20, &["A", "B"]), &opts).unwrap());
    let link_id = cat.get_book(id).unwrap().unwrap().ext_links[0].id.unwrap();

    let mut rec = record("7", "Venus Nights", 25, &["B", "C"]);
    rec.favorites = Some(3);
    let outcome = cat.import_record(rec, &opts).unwrap();
    let ImportOutcome::Updated { book_id, book, changes, outdated_link } = outcome else {
        panic!("expected update");
    };
    assert_eq!(book_id, id);
    assert_eq!(changes.columns.changed, vec!["pages"]);
    assert_eq!(changes.assoc[&AssocKind::Tag].added, set(&["C"]));
    assert_eq!(changes.assoc[&AssocKind::Tag].removed, set(&["A"]));
    assert_eq!(changes.links.len(), 1);
    assert!(changes.log().contains("Removed tag: A"));
    assert_eq!(outdated_link, Some(link_id));
    assert!(book.ext_links[0].outdated);

    let stored = cat.get_book(id).unwrap().unwrap();
    assert_eq!(stored.columns.pages, Some(25));
    assert!(stored.ext_links[0].outdated);
    assert_eq!(stored.ext_links[0].favorites, Some(3));
    // no tag is left without a book
    assert_eq!(cat.list_names(AssocKind::Tag).unwrap(), vec!["B", "C"]);
}

#[test]
fn test_update_keeps_user_data() {
    let mut cat = Catalog::open_in_memory().unwrap();
    let id = inserted_id(
        cat.import_record(record("7", "Venus Nights", 20, &["A"]), &ImportOptions::default())
            .unwrap(),
    );
    let mut book = cat.get_book(id).unwrap().unwrap();
    book.columns.my_rating = Some(4.5);
    book.columns.favorite = true;
    book.set_assoc(AssocKind::List, ["favs"]);
    let changes = cat.save_book(&mut book).unwrap();
    assert_eq!(changes.columns.changed, vec!["my_rating", "favorite"]);
    assert_eq!(changes.assoc[&AssocKind::List].added, set(&["favs"]));
    assert!(!book.has_unsaved_changes());

    let opts = ImportOptions {
        lists: vec!["to-read".to_string()],
        downloaded: false,
    };
    cat.import_record(record("7", "Venus Nights", 21, &["A"]), &opts).unwrap();
    let stored = cat.get_book(id).unwrap().unwrap();
    assert_eq!(stored.columns.my_rating, Some(4.5));
    assert!(stored.columns.favorite);
    assert_eq!(stored.assoc(AssocKind::List), &["favs".to_string(), "to-read".to_string()]);
}

#[test]
fn test_duplicate_detection_and_follow_ups() {
    let mut cat = Catalog::open_in_memory().unwrap();
    let opts = ImportOptions::default();
    let id = inserted_id(cat.import_record(record("1", "Venus Nights!", 20, &[]), &opts).unwrap());

    let mut other_site = record("99", "venus   NIGHTS", 20, &[]);
    other_site.site_id = 2;
    other_site.url = "https://nhentai.net/g/99/".to_string();
    let outcome = cat.import_record(other_site, &opts).unwrap();
    let ImportOutcome::Duplicate { candidates, record: dup } = outcome else {
        panic!("expected duplicate");
    };
    assert_eq!(candidates, vec![id]);
    // nothing was written
    assert_eq!(cat.search("", None, None, 0, true).unwrap().total, Some(1));

    let link_id = cat.attach_link(id, &dup, true).unwrap();
    let book = cat.get_book(id).unwrap().unwrap();
    assert_eq!(book.ext_links.len(), 2);
    assert_eq!(book.ext_links[1].id, Some(link_id));
    assert_eq!(
        cat.get_book_ids(&BookLookup::Url("https://nhentai.net/g/99/".to_string())).unwrap(),
        vec![id]
    );

    let forced = inserted_id(cat.force_insert(&record("2", "Venus Nights!", 5, &[]), &opts).unwrap());
    assert_ne!(forced, id);
    assert!(matches!(
        cat.get_book_by_titles(Some("Venus Nights!"), None),
        Err(MdbError::IdentityAmbiguous { .. })
    ));
}

#[test]
fn test_failed_save_rolls_back() {
    let mut cat = Catalog::open_in_memory().unwrap();
    let id = inserted_id(
        cat.import_record(record("1", "Alpha Book", 20, &["A"]), &ImportOptions::default())
            .unwrap(),
    );
    let mut book = cat.get_book(id).unwrap().unwrap();
    book.set_assoc(AssocKind::Tag, ["New"]);
    book.columns.pages = None;
    assert!(matches!(
        cat.save_book(&mut book),
        Err(MdbError::Validation { column: "pages" })
    ));

    let stored = cat.get_book(id).unwrap().unwrap();
    assert_eq!(stored.assoc(AssocKind::Tag), &["A".to_string()]);
    assert_eq!(stored.columns.pages, Some(20));
    assert_eq!(cat.list_names(AssocKind::Tag).unwrap(), vec!["A"]);

    // records missing a required column are never inserted
    let mut rec = record("2", "Beta Book", 1, &["B"]);
    rec.pages = None;
    assert!(cat.import_record(rec, &ImportOptions::default()).is_err());
    assert_eq!(cat.list_names(AssocKind::Tag).unwrap(), vec!["A"]);
}

#[test]
fn test_search_and_or_policy() {
    let cat = seeded();
    let page = cat.search("tag:A;C", Some("title_eng"), None, 0, false).unwrap();
    assert_eq!(titles(&page), vec!["Alpha Book", "Beta Book", "Gamma Book"]);
    assert_eq!(page.total, None);

    let page = cat.search("tag:A artist:X", None, None, 0, false).unwrap();
    assert_eq!(titles(&page), vec!["Alpha Book"]);

    let page = cat.search("tag:A;!B", None, None, 0, false).unwrap();
    assert_eq!(titles(&page), vec!["Beta Book"]);

    // same name on both sides: the exclusion wins
    let page = cat.search("tag:A;!A", None, None, 0, true).unwrap();
    assert!(page.books.is_empty());
    assert_eq!(page.total, Some(0));

    let page = cat.search("BOOK tag:C", None, None, 0, false).unwrap();
    assert_eq!(titles(&page), vec!["Gamma Book"]);
}

#[test]
fn test_search_hydrates_results() {
    let cat = seeded();
    let page = cat.search("artist:X", None, None, 0, false).unwrap();
    let alpha = &page.books[0];
    assert!(alpha.in_db());
    assert_eq!(alpha.assoc(AssocKind::Tag), &["A".to_string(), "B".to_string()]);
    assert_eq!(alpha.ext_links.len(), 1);
    assert_eq!(alpha.ext_links[0].id_onpage, "1");
}

#[test]
fn test_search_pagination_and_order() {
    let cat = seeded();
    let first = cat.search("", None, Some(2), 0, true).unwrap();
    let second = cat.search("", None, Some(2), 2, true).unwrap();
    assert_eq!(titles(&first), vec!["Gamma Book", "Beta Book"]);
    assert_eq!(titles(&second), vec!["Alpha Book"]);
    assert_eq!(first.total, Some(3));
    assert_eq!(second.total, Some(3));

    let by_pages = cat.search("", Some("pages DESC"), None, 0, false).unwrap();
    assert_eq!(titles(&by_pages), vec!["Alpha Book", "Gamma Book", "Beta Book"]);

    // unsupported order falls back to id DESC
    let fallback = cat.search("", Some("pages; DROP TABLE books"), None, 0, false).unwrap();
    assert_eq!(titles(&fallback), titles(&cat.search("", None, None, 0, false).unwrap()));
}

#[test]
fn test_search_values_cannot_inject() {
    let cat = seeded();
    let page = cat.search(r#"tag:"x' OR '1'='1""#, None, None, 0, true).unwrap();
    assert_eq!(page.total, Some(0));
    let page = cat.search("'; DROP TABLE books; --", None, None, 0, true).unwrap();
    assert_eq!(page.total, Some(0));
    let page = cat.search("100%", None, None, 0, true).unwrap();
    assert_eq!(page.total, Some(0));
    assert_eq!(cat.search("", None, None, 0, true).unwrap().total, Some(3));
}

#[test]
fn test_language_modes() {
    let mut cat = seeded();
    assert_eq!(cat.resolve_language("English", LanguageMode::LookupOnly).unwrap(), Some(1));
    assert_eq!(cat.resolve_language("German", LanguageMode::LookupOnly).unwrap(), None);
    assert_eq!(cat.get_language_id("German").unwrap(), None);

    let german = cat.resolve_language("German", LanguageMode::CreateIfAbsent).unwrap().unwrap();
    assert_eq!(cat.resolve_language("German", LanguageMode::LookupOnly).unwrap(), Some(german));
    assert_eq!(cat.get_language_name(german).unwrap().as_deref(), Some("German"));

    let mut rec = record("9", "Delta Book", 5, &[]);
    rec.language = Some("German".to_string());
    cat.import_record(rec, &ImportOptions::default()).unwrap();
    let page = cat.search("language:German", None, None, 0, false).unwrap();
    assert_eq!(titles(&page), vec!["Delta Book"]);
    // unknown language drops the filter instead of creating it
    let page = cat.search("language:Klingon", None, None, 0, true).unwrap();
    assert_eq!(page.total, Some(4));
    assert_eq!(cat.get_language_id("Klingon").unwrap(), None);
}

#[test]
fn test_failed_import_keeps_no_new_language() {
    let mut cat = seeded();
    let mut rec = record("9", "Delta Book", 5, &["D"]);
    rec.language = Some("German".to_string());
    rec.pages = None;
    assert!(matches!(
        cat.import_record(rec, &ImportOptions::default()),
        Err(MdbError::Validation { column: "pages" })
    ));
    assert_eq!(cat.get_language_id("German").unwrap(), None);

    // same on the update path of a known link
    let mut rec = record("1", "Alpha Book", 30, &["A"]);
    rec.language = Some("French".to_string());
    rec.pages = None;
    assert!(cat.import_record(rec, &ImportOptions::default()).is_err());
    assert_eq!(cat.get_language_id("French").unwrap(), None);
    let alpha = cat.get_book(1).unwrap().unwrap();
    assert_eq!(alpha.columns.language_id, Some(1));
    assert_eq!(alpha.columns.pages, Some(30));
}

#[test]
fn test_search_folds_non_ascii_case() {
    let mut cat = seeded();
    let opts = ImportOptions::default();
    cat.import_record(record("10", "Über Alles", 12, &[]), &opts).unwrap();
    let mut venus = record("11", "ＶＥＮＵＳ Nights", 14, &[]);
    venus.title_foreign = Some("ヴィーナス・ナイツ".to_string());
    cat.import_record(venus, &opts).unwrap();

    for query in ["über", "ÜBER", "Über"] {
        let page = cat.search(query, None, None, 0, true).unwrap();
        assert_eq!(titles(&page), vec!["Über Alles"], "query {query}");
    }
    for query in ["ｖｅｎｕｓ", "VENUS", "venus nights"] {
        let page = cat.search(query, None, None, 0, true).unwrap();
        assert_eq!(titles(&page), vec!["ＶＥＮＵＳ Nights"], "query {query}");
        assert_eq!(page.total, Some(1));
    }
    // foreign titles are searched too, wildcards stay literal
    assert_eq!(titles(&cat.search("ナイツ", None, None, 0, false).unwrap()), vec!["ＶＥＮＵＳ Nights"]);
    assert!(cat.search("ü%", None, None, 0, false).unwrap().books.is_empty());
}

#[test]
fn test_set_downloaded() {
    let mut cat = seeded();
    let book = cat.get_book(1).unwrap().unwrap();
    let link_id = book.ext_links[0].id.unwrap();
    assert!(!book.ext_links[0].downloaded);

    assert!(cat.set_downloaded(link_id, true).unwrap());
    assert!(cat.get_book(1).unwrap().unwrap().ext_links[0].downloaded);
    assert!(cat.set_downloaded(link_id, false).unwrap());
    assert!(!cat.get_book(1).unwrap().unwrap().ext_links[0].downloaded);
    assert!(!cat.set_downloaded(9999, true).unwrap());
}

#[test]
fn test_book_lookup() {
    let cat = seeded();
    let fields = |pairs: &[(&str, Option<&str>)]| -> BTreeMap<String, Option<String>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    };

    assert_eq!(BookLookup::from_fields(&fields(&[("id", Some("3"))])), Some(BookLookup::Id(3)));
    assert_eq!(
        BookLookup::from_fields(&fields(&[("site_id", Some("1")), ("id_onpage", Some("2"))])),
        Some(BookLookup::Identity { site_id: 1, id_onpage: "2".to_string() })
    );
    let by_titles = BookLookup::from_fields(&fields(&[
        ("title_eng", Some("Beta Book")),
        ("title_foreign", None),
    ]))
    .unwrap();
    assert!(BookLookup::from_fields(&fields(&[("title_eng", Some("Beta Book"))])).is_none());
    assert!(BookLookup::from_fields(&fields(&[("pages", Some("3"))])).is_none());

    let books: Vec<Book> = cat.get_books(&by_titles).unwrap().collect::<Result<_>>().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].columns.pages, Some(10));

    let identity = BookLookup::Identity { site_id: 1, id_onpage: "3".to_string() };
    let ids = cat.get_book_ids(&identity).unwrap();
    assert_eq!(cat.get_book(ids[0]).unwrap().unwrap().title(), "Gamma Book");
    assert!(cat.get_book_ids(&BookLookup::Id(42)).unwrap().is_empty());
}

#[test]
fn test_remove_book_collects_orphans() {
    let mut cat = seeded();
    let alpha = cat.search("artist:X", None, None, 0, false).unwrap().books[0].id.unwrap();
    assert!(cat.remove_book(alpha).unwrap());
    assert!(!cat.remove_book(alpha).unwrap());
    assert!(cat.get_book(alpha).unwrap().is_none());
    assert_eq!(cat.list_names(AssocKind::Tag).unwrap(), vec!["A", "C"]);
    assert!(cat.list_names(AssocKind::Artist).unwrap().is_empty());
    assert!(cat
        .get_book_ids(&BookLookup::Identity { site_id: 1, id_onpage: "1".to_string() })
        .unwrap()
        .is_empty());
}

#[test]
fn test_sync_association_through_catalog() {
    let mut cat = seeded();
    let gamma = cat.search("tag:C", None, None, 0, false).unwrap().books[0].id.unwrap();
    let change = cat.sync_association(gamma, AssocKind::Tag, &["C", "D"]).unwrap();
    assert_eq!(change.added, set(&["D"]));
    assert!(cat.sync_association(gamma, AssocKind::Tag, &["C", "D"]).unwrap().is_empty());
    assert_eq!(cat.search("tag:D", None, None, 0, true).unwrap().total, Some(1));
}

#[test]
fn test_read_only_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manga_db.sqlite");
    let path = path.to_str().unwrap();

    // read-only needs an initialized file
    assert!(Catalog::open(Some(path), true).is_err());

    let mut cat = Catalog::open(Some(path), false).unwrap();
    let id = inserted_id(
        cat.import_record(record("1", "Alpha Book", 20, &["A"]), &ImportOptions::default())
            .unwrap(),
    );
    cat.close().unwrap();

    let mut cat = Catalog::open(Some(path), true).unwrap();
    assert!(cat.is_read_only());
    assert_eq!(cat.search("tag:A", None, None, 0, true).unwrap().total, Some(1));

    let err = cat
        .import_record(record("2", "Beta Book", 5, &[]), &ImportOptions::default())
        .unwrap_err();
    assert!(matches!(err, MdbError::ReadOnlyViolation));
    assert!(cat.sync_association(id, AssocKind::Tag, &["B"]).unwrap_err().is_read_only());
    assert!(cat.remove_book(id).unwrap_err().is_read_only());
    assert!(cat.resolve_language("German", LanguageMode::CreateIfAbsent).unwrap_err().is_read_only());

    // the connection itself refuses writes too
    let raw = cat.connection().execute("DELETE FROM books", []).unwrap_err();
    assert!(MdbError::from(raw).is_read_only());
    assert_eq!(cat.get_book(id).unwrap().unwrap().assoc(AssocKind::Tag), &["A".to_string()]);
}
