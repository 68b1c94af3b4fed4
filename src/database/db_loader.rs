use std::{env, fs, path::Path};

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::errors::{MdbError, Result};
use crate::model::title::fold_case;

pub const DB_FILE_NAME: &str = "manga_db.sqlite";

/// Directory holding the database, thumbnails and config for the current user
pub fn get_default_root_dir() -> Result<String> {
    let os = std::env::consts::OS;
    let v = match os {
        "windows" => String::from("USERPROFILE"),
        "linux" | "macos" => String::from("HOME"),
        x => return Err(MdbError::UnsupportedOS(x.to_string())),
    };

    let home = env::var(&v).map_err(|_| MdbError::UnavailableEnvVariable(v))?;
    let path_f = match os {
        "windows" => format!("{home}\\AppData\\Local\\mangadb"),
        _ => format!("{home}/.mangadb"),
    };

    let path = Path::new(&path_f);
    if !path.exists() {
        fs::create_dir_all(path).map_err(|_| MdbError::PathCreationFailed(path_f.clone()))?;
    }
    Ok(path_f)
}

pub fn get_default_db_path() -> Result<String> {
    let root = get_default_root_dir()?;
    let path = Path::new(&root).join(DB_FILE_NAME);
    path.to_str()
        .map(|s| s.to_string())
        .ok_or(MdbError::PathCreationFailed(root))
}

/// Opens the database file. A read-only connection rejects every write at
/// the SQLite level and requires the file to exist.
pub fn open_db(custom_path: Option<&str>, read_only: bool) -> Result<Connection> {
    let path = match custom_path {
        Some(p) => p.to_string(),
        None => get_default_db_path()?,
    };
    debug!("Opening database at {path} (read_only: {read_only})");

    let flags = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI
    };
    let conn = Connection::open_with_flags(path, flags)?;
    configure(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    // SQLite disables foreign keys by default
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    // LIKE only folds ASCII, search compares casefold(column) instead
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| fold_case(&s))),
    )?;
    Ok(())
}
