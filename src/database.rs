use rusqlite::{params, Connection};
use tracing::debug;

use crate::database::tables::*;
use crate::errors::Result;
use crate::model::status::SITES;
use crate::model::{AssocKind, Censorship, Status};

pub mod associations;
pub mod db_loader;
pub mod queries;
pub mod tables;

pub const DEFAULT_LANGUAGE: &str = "English";

pub fn init_table(name: &str, cols: &str) -> String {
    format!("CREATE TABLE IF NOT EXISTS {name} ({cols})")
}

/// Creates every table and seeds the fixed lookup tables. Idempotent.
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute(&init_table(DB_LANGUAGES_NAME, DB_LANGUAGES_COLS), [])?;
    conn.execute(&init_table(DB_SITES_NAME, DB_SITES_COLS), [])?;
    conn.execute(&init_table(DB_STATUSES_NAME, DB_STATUSES_COLS), [])?;
    conn.execute(&init_table(DB_CENSORSHIPS_NAME, DB_CENSORSHIPS_COLS), [])?;
    conn.execute(&init_table(DB_BOOKS_NAME, DB_BOOKS_COLS), [])?;
    conn.execute(&init_table(DB_EXT_LINKS_NAME, DB_EXT_LINKS_COLS), [])?;
    for kind in AssocKind::ALL {
        conn.execute(&init_table(kind.lookup_table(), DB_LOOKUP_COLS), [])?;
        conn.execute(&init_table(kind.join_table(), &join_table_cols(kind)), [])?;
        conn.execute(&join_table_index(kind), [])?;
    }
    for idx in DB_INDEXES {
        conn.execute(idx, [])?;
    }

    for (id, name) in SITES {
        conn.execute(
            &format!("INSERT OR IGNORE INTO {DB_SITES_NAME} (id, name) VALUES (?1, ?2)"),
            params![id, name],
        )?;
    }
    for st in Status::ALL {
        conn.execute(
            &format!("INSERT OR IGNORE INTO {DB_STATUSES_NAME} (id, name) VALUES (?1, ?2)"),
            params![st.id(), st.to_string()],
        )?;
    }
    for c in Censorship::ALL {
        conn.execute(
            &format!("INSERT OR IGNORE INTO {DB_CENSORSHIPS_NAME} (id, name) VALUES (?1, ?2)"),
            params![c.id(), c.to_string()],
        )?;
    }
    conn.execute(
        &format!("INSERT OR IGNORE INTO {DB_LANGUAGES_NAME} (id, name) VALUES (1, ?1)"),
        params![DEFAULT_LANGUAGE],
    )?;

    debug!("Database schema initialized");
    Ok(())
}

/// True if the schema has been created on this connection
pub fn is_initialized(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![DB_BOOKS_NAME],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
