use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::database::tables::*;
use crate::errors::Result;
use crate::model::title::normalize_title;
use crate::model::{BookColumns, ExternalLink};

pub const BOOK_SELECT_COLS: &str = "id, title_eng, title_foreign, pages, status_id, language_id, \
    censor_id, rating, my_rating, note, favorite, nsfw, last_change, last_update";

const EXT_LINK_SELECT_COLS: &str = "id, book_id, site_id, id_onpage, url, uploader, upload_date, \
    ratings, favorites, downloaded, last_update, outdated";

/// `?, ?, ?` for an IN clause with `n` items
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Maps a row selected with [`BOOK_SELECT_COLS`] to (id, columns)
pub fn book_columns_from_row(row: &Row) -> rusqlite::Result<(i64, BookColumns)> {
    Ok((
        row.get(0)?,
        BookColumns {
            title_eng: row.get(1)?,
            title_foreign: row.get(2)?,
            pages: row.get(3)?,
            status_id: row.get(4)?,
            language_id: row.get(5)?,
            censor_id: row.get(6)?,
            rating: row.get(7)?,
            my_rating: row.get(8)?,
            note: row.get(9)?,
            favorite: row.get(10)?,
            nsfw: row.get(11)?,
            last_change: row.get(12)?,
            last_update: row.get(13)?,
        },
    ))
}

fn ext_link_from_row(row: &Row) -> rusqlite::Result<ExternalLink> {
    Ok(ExternalLink {
        id: row.get(0)?,
        book_id: row.get(1)?,
        site_id: row.get(2)?,
        id_onpage: row.get(3)?,
        url: row.get(4)?,
        uploader: row.get(5)?,
        upload_date: row.get(6)?,
        ratings: row.get(7)?,
        favorites: row.get(8)?,
        downloaded: row.get(9)?,
        last_update: row.get(10)?,
        outdated: row.get(11)?,
    })
}

// ========== Languages ==========

pub fn get_language_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            &format!("SELECT id FROM {DB_LANGUAGES_NAME} WHERE name = ?1"),
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn get_language_name(conn: &Connection, id: i64) -> Result<Option<String>> {
    let name = conn
        .query_row(
            &format!("SELECT name FROM {DB_LANGUAGES_NAME} WHERE id = ?1"),
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name)
}

pub fn insert_language(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        &format!("INSERT INTO {DB_LANGUAGES_NAME} (name) VALUES (?1)"),
        params![name],
    )?;
    Ok(conn.last_insert_rowid())
}

// ========== Books ==========

pub fn insert_book(conn: &Connection, cols: &BookColumns) -> Result<i64> {
    conn.execute(
        &format!(
            "INSERT INTO {DB_BOOKS_NAME}
             (title_eng, title_foreign, title_eng_norm, title_foreign_norm, pages, status_id,
              language_id, censor_id, rating, my_rating, note, favorite, nsfw, last_change, last_update)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            cols.title_eng,
            cols.title_foreign,
            cols.title_eng.as_deref().and_then(normalize_title),
            cols.title_foreign.as_deref().and_then(normalize_title),
            cols.pages,
            cols.status_id,
            cols.language_id,
            cols.censor_id,
            cols.rating,
            cols.my_rating,
            cols.note,
            cols.favorite,
            cols.nsfw,
            cols.last_change,
            cols.last_update,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_book(conn: &Connection, id: i64, cols: &BookColumns) -> Result<usize> {
    let rows = conn.execute(
        &format!(
            "UPDATE {DB_BOOKS_NAME} SET
                title_eng = ?2, title_foreign = ?3, title_eng_norm = ?4, title_foreign_norm = ?5,
                pages = ?6, status_id = ?7, language_id = ?8, censor_id = ?9, rating = ?10,
                my_rating = ?11, note = ?12, favorite = ?13, nsfw = ?14, last_change = ?15,
                last_update = ?16
             WHERE id = ?1"
        ),
        params![
            id,
            cols.title_eng,
            cols.title_foreign,
            cols.title_eng.as_deref().and_then(normalize_title),
            cols.title_foreign.as_deref().and_then(normalize_title),
            cols.pages,
            cols.status_id,
            cols.language_id,
            cols.censor_id,
            cols.rating,
            cols.my_rating,
            cols.note,
            cols.favorite,
            cols.nsfw,
            cols.last_change,
            cols.last_update,
        ],
    )?;
    Ok(rows)
}

pub fn get_book_columns(conn: &Connection, id: i64) -> Result<Option<BookColumns>> {
    let res = conn
        .query_row(
            &format!("SELECT {BOOK_SELECT_COLS} FROM {DB_BOOKS_NAME} WHERE id = ?1"),
            params![id],
            book_columns_from_row,
        )
        .optional()?;
    Ok(res.map(|(_, cols)| cols))
}

pub fn touch_last_change(conn: &Connection, id: i64, date: NaiveDate) -> Result<usize> {
    let rows = conn.execute(
        &format!("UPDATE {DB_BOOKS_NAME} SET last_change = ?2 WHERE id = ?1"),
        params![id, date],
    )?;
    Ok(rows)
}

/// Deletes the book; join rows and links go with it through ON DELETE CASCADE
pub fn delete_book(conn: &Connection, id: i64) -> Result<usize> {
    let rows = conn.execute(&format!("DELETE FROM {DB_BOOKS_NAME} WHERE id = ?1"), params![id])?;
    Ok(rows)
}

/// Ids of books whose titles are exactly the given ones (NULL matches NULL)
pub fn get_book_ids_by_titles(
    conn: &Connection,
    title_eng: Option<&str>,
    title_foreign: Option<&str>,
) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id FROM {DB_BOOKS_NAME}
         WHERE title_eng IS ?1 AND title_foreign IS ?2
         ORDER BY id"
    ))?;
    let ids = stmt
        .query_map(params![title_eng, title_foreign], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// Ids of books sharing a normalized english or foreign title
pub fn get_book_ids_by_normalized_titles(
    conn: &Connection,
    eng_norm: Option<&str>,
    foreign_norm: Option<&str>,
) -> Result<Vec<i64>> {
    if eng_norm.is_none() && foreign_norm.is_none() {
        return Ok(vec![]);
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT id FROM {DB_BOOKS_NAME}
         WHERE (?1 IS NOT NULL AND title_eng_norm = ?1)
            OR (?2 IS NOT NULL AND title_foreign_norm = ?2)
         ORDER BY id"
    ))?;
    let ids = stmt
        .query_map(params![eng_norm, foreign_norm], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

// ========== External links ==========

pub fn insert_ext_link(conn: &Connection, book_id: i64, link: &ExternalLink) -> Result<i64> {
    conn.execute(
        &format!(
            "INSERT INTO {DB_EXT_LINKS_NAME}
             (book_id, site_id, id_onpage, url, uploader, upload_date, ratings, favorites,
              downloaded, last_update, outdated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            book_id,
            link.site_id,
            link.id_onpage,
            link.url,
            link.uploader,
            link.upload_date,
            link.ratings,
            link.favorites,
            link.downloaded,
            link.last_update,
            link.outdated,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_ext_link(conn: &Connection, id: i64, link: &ExternalLink) -> Result<usize> {
    let rows = conn.execute(
        &format!(
            "UPDATE {DB_EXT_LINKS_NAME} SET
                url = ?2, uploader = ?3, upload_date = ?4, ratings = ?5, favorites = ?6,
                downloaded = ?7, last_update = ?8, outdated = ?9
             WHERE id = ?1"
        ),
        params![
            id,
            link.url,
            link.uploader,
            link.upload_date,
            link.ratings,
            link.favorites,
            link.downloaded,
            link.last_update,
            link.outdated,
        ],
    )?;
    Ok(rows)
}

pub fn get_ext_link_by_identity(
    conn: &Connection,
    site_id: i64,
    id_onpage: &str,
) -> Result<Option<ExternalLink>> {
    let link = conn
        .query_row(
            &format!(
                "SELECT {EXT_LINK_SELECT_COLS} FROM {DB_EXT_LINKS_NAME}
                 WHERE site_id = ?1 AND id_onpage = ?2"
            ),
            params![site_id, id_onpage],
            ext_link_from_row,
        )
        .optional()?;
    Ok(link)
}

pub fn get_book_ids_by_url(conn: &Connection, url: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT book_id FROM {DB_EXT_LINKS_NAME} WHERE url = ?1 ORDER BY book_id"
    ))?;
    let ids = stmt
        .query_map(params![url], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// Links of every given book, keyed by book id
pub fn get_ext_links_for_books(
    conn: &Connection,
    book_ids: &[i64],
) -> Result<BTreeMap<i64, Vec<ExternalLink>>> {
    let mut res: BTreeMap<i64, Vec<ExternalLink>> = BTreeMap::new();
    if book_ids.is_empty() {
        return Ok(res);
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXT_LINK_SELECT_COLS} FROM {DB_EXT_LINKS_NAME}
         WHERE book_id IN ({})
         ORDER BY id",
        placeholders(book_ids.len())
    ))?;
    let links = stmt.query_map(params_from_iter(book_ids.iter()), ext_link_from_row)?;
    for link in links {
        let link = link?;
        if let Some(book_id) = link.book_id {
            res.entry(book_id).or_default().push(link);
        }
    }
    Ok(res)
}

pub fn set_ext_link_downloaded(conn: &Connection, link_id: i64, downloaded: bool) -> Result<usize> {
    let rows = conn.execute(
        &format!("UPDATE {DB_EXT_LINKS_NAME} SET downloaded = ?2 WHERE id = ?1"),
        params![link_id, downloaded],
    )?;
    Ok(rows)
}
