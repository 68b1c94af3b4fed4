//! Keeps the join/lookup tables of an associated attribute in line with the
//! set of names a book should have.
//!
//! All functions take a plain `&Connection` so they can run inside the
//! caller's transaction (`rusqlite::Transaction` derefs to `Connection`).
//! Lookup rows are created on first use and deleted as soon as no join row
//! references them anymore.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use crate::database::queries::placeholders;
use crate::errors::Result;
use crate::model::book::clean_names;
use crate::model::{AssocChange, AssocKind};

/// Names linked to a book for `kind`, in insertion order
pub fn get_assoc_names(conn: &Connection, book_id: i64, kind: AssocKind) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT l.name
         FROM {join} j
         JOIN {lookup} l ON l.id = j.{id_col}
         WHERE j.book_id = ?1
         ORDER BY j.rowid",
        join = kind.join_table(),
        lookup = kind.lookup_table(),
        id_col = kind.id_column(),
    ))?;
    let names = stmt
        .query_map(params![book_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// Names linked to each of `book_ids` for `kind`, fetched in one query
pub fn get_assoc_names_for_books(
    conn: &Connection,
    book_ids: &[i64],
    kind: AssocKind,
) -> Result<BTreeMap<i64, Vec<String>>> {
    let mut res: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    if book_ids.is_empty() {
        return Ok(res);
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT j.book_id, l.name
         FROM {join} j
         JOIN {lookup} l ON l.id = j.{id_col}
         WHERE j.book_id IN ({ph})
         ORDER BY j.book_id, j.rowid",
        join = kind.join_table(),
        lookup = kind.lookup_table(),
        id_col = kind.id_column(),
        ph = placeholders(book_ids.len()),
    ))?;
    let rows = stmt.query_map(params_from_iter(book_ids.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (book_id, name) = row?;
        res.entry(book_id).or_default().push(name);
    }
    Ok(res)
}

pub fn get_lookup_id(conn: &Connection, kind: AssocKind, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            &format!("SELECT id FROM {} WHERE name = ?1", kind.lookup_table()),
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn get_or_create_lookup(conn: &Connection, kind: AssocKind, name: &str) -> Result<i64> {
    if let Some(id) = get_lookup_id(conn, kind, name)? {
        return Ok(id);
    }
    conn.execute(
        &format!("INSERT INTO {} (name) VALUES (?1)", kind.lookup_table()),
        params![name],
    )?;
    debug!("Created {kind} '{name}'");
    Ok(conn.last_insert_rowid())
}

/// Links a book to a lookup row; returns 0 if the link already existed
pub fn link(conn: &Connection, book_id: i64, kind: AssocKind, lookup_id: i64) -> Result<usize> {
    let rows = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} (book_id, {}) VALUES (?1, ?2)",
            kind.join_table(),
            kind.id_column()
        ),
        params![book_id, lookup_id],
    )?;
    Ok(rows)
}

pub fn unlink(conn: &Connection, book_id: i64, kind: AssocKind, lookup_id: i64) -> Result<usize> {
    let rows = conn.execute(
        &format!(
            "DELETE FROM {} WHERE book_id = ?1 AND {} = ?2",
            kind.join_table(),
            kind.id_column()
        ),
        params![book_id, lookup_id],
    )?;
    Ok(rows)
}

/// Deletes the lookup row if no book references it. Returns true if deleted.
pub fn remove_if_orphaned(conn: &Connection, kind: AssocKind, lookup_id: i64) -> Result<bool> {
    let rows = conn.execute(
        &format!(
            "DELETE FROM {lookup}
             WHERE id = ?1
               AND NOT EXISTS (SELECT 1 FROM {join} WHERE {id_col} = ?1)",
            lookup = kind.lookup_table(),
            join = kind.join_table(),
            id_col = kind.id_column(),
        ),
        params![lookup_id],
    )?;
    if rows > 0 {
        debug!("Removed unreferenced {kind} #{lookup_id}");
    }
    Ok(rows > 0)
}

/// Deletes every unreferenced lookup row of `kind`
pub fn remove_orphans(conn: &Connection, kind: AssocKind) -> Result<usize> {
    let rows = conn.execute(
        &format!(
            "DELETE FROM {lookup}
             WHERE NOT EXISTS (SELECT 1 FROM {join} j WHERE j.{id_col} = {lookup}.id)",
            lookup = kind.lookup_table(),
            join = kind.join_table(),
            id_col = kind.id_column(),
        ),
        [],
    )?;
    Ok(rows)
}

/// Makes the names linked to `book_id` for `kind` equal to `desired`.
///
/// Empty names are ignored. Returns what was actually added and removed, so
/// a second call with the same set returns an empty change.
pub fn sync_association<S: AsRef<str>>(
    conn: &Connection,
    book_id: i64,
    kind: AssocKind,
    desired: &[S],
) -> Result<AssocChange> {
    let desired = clean_names(desired);
    let current: BTreeSet<String> = get_assoc_names(conn, book_id, kind)?.into_iter().collect();
    let desired_set: BTreeSet<&String> = desired.iter().collect();

    let mut change = AssocChange::default();

    // adds in the caller's order so insertion order follows the extracted order
    for name in desired.iter().filter(|n| !current.contains(*n)) {
        let lookup_id = get_or_create_lookup(conn, kind, name)?;
        if link(conn, book_id, kind, lookup_id)? > 0 {
            change.added.insert(name.clone());
        }
    }

    for name in current.iter().filter(|n| !desired_set.contains(n)) {
        let Some(lookup_id) = get_lookup_id(conn, kind, name)? else {
            continue;
        };
        if unlink(conn, book_id, kind, lookup_id)? > 0 {
            change.removed.insert(name.clone());
        }
        remove_if_orphaned(conn, kind, lookup_id)?;
    }

    if !change.is_empty() {
        debug!(
            "Book #{book_id} {kind}: added {:?}, removed {:?}",
            change.added, change.removed
        );
    }
    Ok(change)
}

/// All names of `kind`, alphabetically
pub fn list_names(conn: &Connection, kind: AssocKind) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT name FROM {} ORDER BY name ASC",
        kind.lookup_table()
    ))?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}
