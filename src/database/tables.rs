use crate::model::AssocKind;

pub const DB_BOOKS_NAME: &str = "books";
pub const DB_BOOKS_COLS: &str = "id INTEGER PRIMARY KEY, \
    title_eng TEXT, \
    title_foreign TEXT, \
    title_eng_norm TEXT, \
    title_foreign_norm TEXT, \
    pages INTEGER NOT NULL, \
    status_id INTEGER NOT NULL, \
    language_id INTEGER NOT NULL, \
    censor_id INTEGER NOT NULL, \
    rating REAL, \
    my_rating REAL, \
    note TEXT, \
    favorite INTEGER NOT NULL DEFAULT 0, \
    nsfw INTEGER NOT NULL DEFAULT 0, \
    last_change TEXT NOT NULL, \
    last_update TEXT, \
    CHECK (title_eng IS NOT NULL OR title_foreign IS NOT NULL), \
    FOREIGN KEY (status_id) REFERENCES statuses(id), \
    FOREIGN KEY (language_id) REFERENCES languages(id), \
    FOREIGN KEY (censor_id) REFERENCES censorships(id)";

pub const DB_EXT_LINKS_NAME: &str = "ext_links";
pub const DB_EXT_LINKS_COLS: &str = "id INTEGER PRIMARY KEY, \
    book_id INTEGER NOT NULL, \
    site_id INTEGER NOT NULL, \
    id_onpage TEXT NOT NULL, \
    url TEXT NOT NULL, \
    uploader TEXT, \
    upload_date TEXT, \
    ratings INTEGER, \
    favorites INTEGER, \
    downloaded INTEGER NOT NULL DEFAULT 0, \
    last_update TEXT NOT NULL, \
    outdated INTEGER NOT NULL DEFAULT 0, \
    UNIQUE (site_id, id_onpage), \
    FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE, \
    FOREIGN KEY (site_id) REFERENCES sites(id)";

pub const DB_LANGUAGES_NAME: &str = "languages";
pub const DB_LANGUAGES_COLS: &str = "id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE";

pub const DB_SITES_NAME: &str = "sites";
pub const DB_SITES_COLS: &str = "id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE";

pub const DB_STATUSES_NAME: &str = "statuses";
pub const DB_STATUSES_COLS: &str = "id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE";

pub const DB_CENSORSHIPS_NAME: &str = "censorships";
pub const DB_CENSORSHIPS_COLS: &str = "id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE";

pub const DB_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_books_title_eng_norm ON books(title_eng_norm)",
    "CREATE INDEX IF NOT EXISTS idx_books_title_foreign_norm ON books(title_foreign_norm)",
    "CREATE INDEX IF NOT EXISTS idx_ext_links_book_id ON ext_links(book_id)",
];

/// Columns of a lookup table, shared by every associated attribute
pub const DB_LOOKUP_COLS: &str = "id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE";

/// Columns of the join table of `kind`
pub fn join_table_cols(kind: AssocKind) -> String {
    let id_col = kind.id_column();
    let lookup = kind.lookup_table();
    format!(
        "book_id INTEGER NOT NULL, \
        {id_col} INTEGER NOT NULL, \
        PRIMARY KEY (book_id, {id_col}), \
        FOREIGN KEY (book_id) REFERENCES {DB_BOOKS_NAME}(id) ON DELETE CASCADE, \
        FOREIGN KEY ({id_col}) REFERENCES {lookup}(id) ON DELETE CASCADE"
    )
}

/// Index for "which books use this lookup row", needed by the orphan check
pub fn join_table_index(kind: AssocKind) -> String {
    let table = kind.join_table();
    let id_col = kind.id_column();
    format!("CREATE INDEX IF NOT EXISTS idx_{table}_{id_col} ON {table}({id_col})")
}
