//! SQL schema and statements for the content index.
//!
//! Row identities are SQLite `INTEGER PRIMARY KEY AUTOINCREMENT` columns.
//! Uniqueness constraints carry the store's invariants:
//!
//! * `paths.path` is unique
//! * `files(name, path_id)` is unique
//! * `file_hashes.hash` / `path_hashes.hash` are unique
//! * `file_map.file_id` is the primary key, so a file has at most one
//!   association and re-hashing replaces it
//!
//! Directory paths and file names are stored as the raw bytes of the OS
//! string, so names that are not valid UTF-8 stay distinct. BLOBs compare
//! bytewise, which keeps `ORDER BY` on them lexical.
//!
//! `path_hashes` and `path_map` hold directory-level digests. Nothing in the
//! scan pipeline computes those yet, but the store accepts them.

/// Tables dropped by a reset, children before parents.
pub const DROP_TABLES: &[&str] = &[
    "DROP TABLE IF EXISTS file_map",
    "DROP TABLE IF EXISTS path_map",
    "DROP TABLE IF EXISTS files",
    "DROP TABLE IF EXISTS file_hashes",
    "DROP TABLE IF EXISTS path_hashes",
    "DROP TABLE IF EXISTS paths",
];

/// Schema creation, parents before children.
pub const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS paths (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path BLOB NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name BLOB NOT NULL,
        path_id INTEGER NOT NULL REFERENCES paths(id),
        generate INTEGER NOT NULL DEFAULT 0,
        UNIQUE (name, path_id)
    )",
    "CREATE TABLE IF NOT EXISTS file_hashes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hash TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS path_hashes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hash TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS file_map (
        file_id INTEGER PRIMARY KEY REFERENCES files(id),
        hash_id INTEGER NOT NULL REFERENCES file_hashes(id)
    )",
    "CREATE TABLE IF NOT EXISTS path_map (
        path_id INTEGER PRIMARY KEY REFERENCES paths(id),
        hash_id INTEGER NOT NULL REFERENCES path_hashes(id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_file_map_hash ON file_map(hash_id)",
    "CREATE INDEX IF NOT EXISTS idx_path_map_hash ON path_map(hash_id)",
];

pub const INSERT_PATH: &str = "INSERT OR IGNORE INTO paths(path) VALUES (?1)";
pub const SELECT_PATH_ID: &str = "SELECT id FROM paths WHERE path = ?1";

pub const INSERT_FILE: &str = "INSERT INTO files(name, path_id, generate) VALUES (?1, ?2, ?3)
     ON CONFLICT(name, path_id) DO UPDATE SET generate = excluded.generate";
pub const SELECT_FILE_ID: &str = "SELECT f.id FROM files f JOIN paths p ON p.id = f.path_id
     WHERE p.path = ?1 AND f.name = ?2";

pub const INSERT_FILE_HASH: &str = "INSERT OR IGNORE INTO file_hashes(hash) VALUES (?1)";
pub const SELECT_FILE_HASH_ID: &str = "SELECT id FROM file_hashes WHERE hash = ?1";

pub const INSERT_PATH_HASH: &str = "INSERT OR IGNORE INTO path_hashes(hash) VALUES (?1)";
pub const SELECT_PATH_HASH_ID: &str = "SELECT id FROM path_hashes WHERE hash = ?1";

pub const UPSERT_FILE_MAP: &str = "INSERT INTO file_map(file_id, hash_id) VALUES (?1, ?2)
     ON CONFLICT(file_id) DO UPDATE SET hash_id = excluded.hash_id";
pub const UPSERT_PATH_MAP: &str = "INSERT INTO path_map(path_id, hash_id) VALUES (?1, ?2)
     ON CONFLICT(path_id) DO UPDATE SET hash_id = excluded.hash_id";

pub const SELECT_HASH_FOR_FILE: &str = "SELECT h.hash FROM file_hashes h
     JOIN file_map m ON m.hash_id = h.id
     JOIN files f ON f.id = m.file_id
     JOIN paths p ON p.id = f.path_id
     WHERE p.path = ?1 AND f.name = ?2";

pub const SELECT_FILES_BY_HASH: &str = "SELECT p.path, f.name FROM files f
     JOIN paths p ON p.id = f.path_id
     JOIN file_map m ON m.file_id = f.id
     JOIN file_hashes h ON h.id = m.hash_id
     WHERE h.hash = ?1
     ORDER BY p.path, f.name";

pub const SELECT_PATHS_BY_HASH: &str = "SELECT p.path FROM paths p
     JOIN path_map m ON m.path_id = p.id
     JOIN path_hashes h ON h.id = m.hash_id
     WHERE h.hash = ?1
     ORDER BY p.path";

/// One row per associated file whose hash has two or more associations.
pub const SELECT_DUPLICATE_FILES: &str = "SELECT h.hash, p.path, f.name FROM file_map m
     JOIN file_hashes h ON h.id = m.hash_id
     JOIN files f ON f.id = m.file_id
     JOIN paths p ON p.id = f.path_id
     WHERE m.hash_id IN (SELECT hash_id FROM file_map GROUP BY hash_id HAVING COUNT(*) >= 2)
     ORDER BY h.hash, p.path, f.name";

pub const SELECT_DUPLICATE_PATHS: &str = "SELECT h.hash, p.path FROM path_map m
     JOIN path_hashes h ON h.id = m.hash_id
     JOIN paths p ON p.id = m.path_id
     WHERE m.hash_id IN (SELECT hash_id FROM path_map GROUP BY hash_id HAVING COUNT(*) >= 2)
     ORDER BY h.hash, p.path";

pub const SELECT_UNVERIFIED_FILES: &str = "SELECT p.path, f.name FROM files f
     JOIN paths p ON p.id = f.path_id
     WHERE f.id NOT IN (SELECT file_id FROM file_map)
     ORDER BY p.path, f.name";
pub const SELECT_VERIFIED_FILES: &str = "SELECT p.path, f.name FROM files f
     JOIN paths p ON p.id = f.path_id
     WHERE f.id IN (SELECT file_id FROM file_map)
     ORDER BY p.path, f.name";

pub const SELECT_UNVERIFIED_PATHS: &str =
    "SELECT path FROM paths WHERE id NOT IN (SELECT path_id FROM path_map) ORDER BY path";
pub const SELECT_VERIFIED_PATHS: &str =
    "SELECT path FROM paths WHERE id IN (SELECT path_id FROM path_map) ORDER BY path";

/// Files of namespace `?1` whose hash has no file in the other namespace.
pub const SELECT_UNMATCHED_IN_NAMESPACE: &str = "SELECT p.path, f.name FROM files f
     JOIN paths p ON p.id = f.path_id
     JOIN file_map m ON m.file_id = f.id
     WHERE f.generate = ?1
       AND m.hash_id NOT IN (
           SELECT m2.hash_id FROM file_map m2
           JOIN files f2 ON f2.id = m2.file_id
           WHERE f2.generate <> ?1)
     ORDER BY p.path, f.name";

/// Every associated file together with its hash, used for root-scoped queries.
pub const SELECT_ASSOCIATED_FILES: &str = "SELECT p.path, f.name, h.hash FROM files f
     JOIN paths p ON p.id = f.path_id
     JOIN file_map m ON m.file_id = f.id
     JOIN file_hashes h ON h.id = m.hash_id
     ORDER BY p.path, f.name";

pub const COUNT_PATHS: &str = "SELECT COUNT(*) FROM paths";
pub const COUNT_FILES: &str = "SELECT COUNT(*) FROM files";
pub const COUNT_FILE_HASHES: &str = "SELECT COUNT(*) FROM file_hashes";
pub const COUNT_FILE_MAP: &str = "SELECT COUNT(*) FROM file_map";
