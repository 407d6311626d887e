//! SQLite-backed content store.
//!
//! The store owns a single in-memory connection behind a mutex. Every public
//! operation takes the lock for its whole duration, and every check-then-insert
//! sequence runs inside one `IMMEDIATE` transaction, so concurrent callers can
//! neither double-insert a hash nor leave an association pointing at a row
//! that was never created.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use rusqlite::{params, Connection, OptionalExtension, ToSql, TransactionBehavior};

use super::schema;
use super::{CopyCandidate, DuplicateGroup, StoreError, StoreResult, StoreStats};

/// Thread-safe content-addressed index.
///
/// # Example
///
/// ```
/// use drivededup::store::ContentStore;
/// use std::path::Path;
///
/// let store = ContentStore::open_in_memory().unwrap();
/// store.associate_file(Path::new("/a/x.txt"), "aa11", true).unwrap();
/// store.associate_file(Path::new("/a/b/y.txt"), "aa11", true).unwrap();
///
/// let groups = store.duplicate_groups().unwrap();
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].paths.len(), 2);
/// ```
pub struct ContentStore {
    conn: Mutex<Option<Connection>>,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("available", &self.is_available())
            .finish()
    }
}

impl ContentStore {
    /// Open a fresh in-memory index with the full schema.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            conn: Mutex::new(Some(open_connection()?)),
        })
    }

    /// Whether the store currently accepts operations.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.conn.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    /// Close the connection. Every later operation except [`reset`](Self::reset)
    /// returns [`StoreError::Unavailable`].
    pub fn close(&self) {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        log::debug!("Content store closed");
    }

    /// Drop and recreate every relation atomically.
    ///
    /// A closed (or poisoned) store is reopened with an empty schema. The
    /// caller must make sure no result delivery is in flight.
    pub fn reset(&self) -> StoreResult<()> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(open_connection()?);
            log::info!("Content store reopened");
            return Ok(());
        }
        let conn = guard.as_mut().ok_or(StoreError::Unavailable)?;

        // Cached statements hold read locks on the tables about to be dropped.
        conn.flush_prepared_statement_cache();

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_error("BEGIN IMMEDIATE", String::new()))?;
        for sql in schema::DROP_TABLES.iter().chain(schema::CREATE_TABLES) {
            tx.execute(sql, [])
                .map_err(query_error(sql, String::new()))?;
        }
        tx.commit().map_err(query_error("COMMIT", String::new()))?;

        log::info!("Content store reset");
        Ok(())
    }

    // ---- paths -----------------------------------------------------------

    /// Whether a directory path row exists.
    pub fn has_path(&self, path: &Path) -> StoreResult<bool> {
        let key = path_key(path);
        self.with_conn(|conn| exists(conn, schema::SELECT_PATH_ID, &key, &render(&key)))
    }

    /// Insert a directory path if absent. Returns its row id.
    pub fn add_path(&self, path: &Path) -> StoreResult<i64> {
        let key = path_key(path);
        self.with_tx(|conn| ensure_path(conn, &key))
    }

    /// Whether a directory-digest row exists.
    pub fn has_path_hash(&self, hash: &str) -> StoreResult<bool> {
        self.with_conn(|conn| exists(conn, schema::SELECT_PATH_HASH_ID, &hash, hash))
    }

    /// Insert a directory digest if absent. Returns its row id.
    pub fn add_path_hash(&self, hash: &str) -> StoreResult<i64> {
        self.with_tx(|conn| {
            ensure_hash(
                conn,
                schema::INSERT_PATH_HASH,
                schema::SELECT_PATH_HASH_ID,
                hash,
            )
        })
    }

    /// Associate a directory with a digest, creating either row on demand.
    pub fn associate_path(&self, path: &Path, hash: &str) -> StoreResult<()> {
        let key = path_key(path);
        self.with_tx(|conn| {
            let hash_id = ensure_hash(
                conn,
                schema::INSERT_PATH_HASH,
                schema::SELECT_PATH_HASH_ID,
                hash,
            )?;
            let path_id = ensure_path(conn, &key)?;
            conn.execute(schema::UPSERT_PATH_MAP, params![path_id, hash_id])
                .map_err(query_error(
                    schema::UPSERT_PATH_MAP,
                    format!("{path_id}, {hash_id}"),
                ))?;
            Ok(())
        })
    }

    /// Directories associated with a digest.
    pub fn paths_by_hash(&self, hash: &str) -> StoreResult<Vec<PathBuf>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(schema::SELECT_PATHS_BY_HASH)
                .map_err(query_error(schema::SELECT_PATHS_BY_HASH, hash.to_string()))?;
            let rows = stmt
                .query_map(params![hash], |row| row.get::<_, Vec<u8>>(0).map(decode))
                .map_err(query_error(schema::SELECT_PATHS_BY_HASH, hash.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(query_error(schema::SELECT_PATHS_BY_HASH, hash.to_string()))
        })
    }

    // ---- files -----------------------------------------------------------

    /// Whether a file row exists for this absolute path.
    pub fn has_file(&self, path: &Path) -> StoreResult<bool> {
        let (dir, name) = split_file(path)?;
        self.with_conn(|conn| {
            conn.query_row(schema::SELECT_FILE_ID, params![dir, name], |row| {
                row.get::<_, i64>(0)
            })
            .optional()
            .map(|id| id.is_some())
            .map_err(query_error(schema::SELECT_FILE_ID, path.display().to_string()))
        })
    }

    /// Insert a file (and its containing path) if absent. Returns the file row id.
    ///
    /// The namespace flag of an existing row is overwritten with `generate`.
    pub fn add_file(&self, path: &Path, generate: bool) -> StoreResult<i64> {
        let (dir, name) = split_file(path)?;
        self.with_tx(|conn| ensure_file(conn, &dir, &name, generate))
    }

    /// Whether a file digest row exists.
    pub fn has_file_hash(&self, hash: &str) -> StoreResult<bool> {
        self.with_conn(|conn| exists(conn, schema::SELECT_FILE_HASH_ID, &hash, hash))
    }

    /// Insert a file digest if absent. Returns its row id.
    pub fn add_file_hash(&self, hash: &str) -> StoreResult<i64> {
        self.with_tx(|conn| {
            ensure_hash(
                conn,
                schema::INSERT_FILE_HASH,
                schema::SELECT_FILE_HASH_ID,
                hash,
            )
        })
    }

    /// Associate a file with its content digest.
    ///
    /// Ensures the hash row, then the path and file rows, then writes the
    /// association, all in one transaction. A file that already has an
    /// association is re-pointed at the new hash rather than duplicated.
    pub fn associate_file(&self, path: &Path, hash: &str, generate: bool) -> StoreResult<()> {
        let (dir, name) = split_file(path)?;
        self.with_tx(|conn| {
            let hash_id = ensure_hash(
                conn,
                schema::INSERT_FILE_HASH,
                schema::SELECT_FILE_HASH_ID,
                hash,
            )?;
            let file_id = ensure_file(conn, &dir, &name, generate)?;
            conn.execute(schema::UPSERT_FILE_MAP, params![file_id, hash_id])
                .map_err(query_error(
                    schema::UPSERT_FILE_MAP,
                    format!("{file_id}, {hash_id}"),
                ))?;
            Ok(())
        })
    }

    /// Current digest associated with a file, if any.
    pub fn hash_for_file(&self, path: &Path) -> StoreResult<Option<String>> {
        let (dir, name) = split_file(path)?;
        self.with_conn(|conn| {
            conn.query_row(schema::SELECT_HASH_FOR_FILE, params![dir, name], |row| {
                row.get(0)
            })
            .optional()
            .map_err(query_error(
                schema::SELECT_HASH_FOR_FILE,
                path.display().to_string(),
            ))
        })
    }

    /// Files associated with a digest, sorted by path.
    pub fn files_by_hash(&self, hash: &str) -> StoreResult<Vec<PathBuf>> {
        self.with_conn(|conn| {
            query_files(conn, schema::SELECT_FILES_BY_HASH, params![hash], hash)
        })
    }

    // ---- reports ---------------------------------------------------------

    /// Every file digest shared by two or more files, with its files.
    pub fn duplicate_groups(&self) -> StoreResult<Vec<DuplicateGroup>> {
        self.with_conn(|conn| {
            let sql = schema::SELECT_DUPLICATE_FILES;
            let mut stmt = conn
                .prepare_cached(sql)
                .map_err(query_error(sql, String::new()))?;
            let rows = stmt
                .query_map([], |row| {
                    let hash: String = row.get(0)?;
                    Ok((hash, join(row.get(1)?, row.get(2)?)))
                })
                .map_err(query_error(sql, String::new()))?;
            let rows = rows
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_error(sql, String::new()))?;
            Ok(fold_groups(rows))
        })
    }

    /// Every directory digest shared by two or more directories.
    pub fn duplicate_path_groups(&self) -> StoreResult<Vec<DuplicateGroup>> {
        self.with_conn(|conn| {
            let sql = schema::SELECT_DUPLICATE_PATHS;
            let mut stmt = conn
                .prepare_cached(sql)
                .map_err(query_error(sql, String::new()))?;
            let rows = stmt
                .query_map([], |row| {
                    let hash: String = row.get(0)?;
                    Ok((hash, decode(row.get(1)?)))
                })
                .map_err(query_error(sql, String::new()))?;
            let rows = rows
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_error(sql, String::new()))?;
            Ok(fold_groups(rows))
        })
    }

    /// Files with no association yet (dispatched but not hashed).
    pub fn unverified_files(&self) -> StoreResult<Vec<PathBuf>> {
        self.with_conn(|conn| query_files(conn, schema::SELECT_UNVERIFIED_FILES, [], ""))
    }

    /// Files with an association.
    pub fn verified_files(&self) -> StoreResult<Vec<PathBuf>> {
        self.with_conn(|conn| query_files(conn, schema::SELECT_VERIFIED_FILES, [], ""))
    }

    /// Directories with no directory-level digest.
    pub fn unverified_paths(&self) -> StoreResult<Vec<PathBuf>> {
        self.with_conn(|conn| query_paths(conn, schema::SELECT_UNVERIFIED_PATHS))
    }

    /// Directories with a directory-level digest.
    pub fn verified_paths(&self) -> StoreResult<Vec<PathBuf>> {
        self.with_conn(|conn| query_paths(conn, schema::SELECT_VERIFIED_PATHS))
    }

    /// Baseline files whose content is absent from the comparison set.
    pub fn missing_files(&self) -> StoreResult<Vec<PathBuf>> {
        self.with_conn(|conn| {
            query_files(
                conn,
                schema::SELECT_UNMATCHED_IN_NAMESPACE,
                params![true],
                "true",
            )
        })
    }

    /// Comparison files whose content is absent from the baseline set.
    pub fn new_files(&self) -> StoreResult<Vec<PathBuf>> {
        self.with_conn(|conn| {
            query_files(
                conn,
                schema::SELECT_UNMATCHED_IN_NAMESPACE,
                params![false],
                "false",
            )
        })
    }

    /// Hashed files under `source_root` whose digest has no file under
    /// `destination_root`, paired with their mirrored destination path.
    pub fn copy_candidates(
        &self,
        source_root: &Path,
        destination_root: &Path,
    ) -> StoreResult<Vec<CopyCandidate>> {
        let associated = self.with_conn(|conn| {
            let sql = schema::SELECT_ASSOCIATED_FILES;
            let mut stmt = conn
                .prepare_cached(sql)
                .map_err(query_error(sql, String::new()))?;
            let rows = stmt
                .query_map([], |row| {
                    let hash: String = row.get(2)?;
                    Ok((join(row.get(0)?, row.get(1)?), hash))
                })
                .map_err(query_error(sql, String::new()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(query_error(sql, String::new()))
        })?;

        let present: HashSet<&str> = associated
            .iter()
            .filter(|(path, _)| path.starts_with(destination_root))
            .map(|(_, hash)| hash.as_str())
            .collect();

        Ok(associated
            .iter()
            .filter(|(path, hash)| {
                path.starts_with(source_root)
                    && !path.starts_with(destination_root)
                    && !present.contains(hash.as_str())
            })
            .filter_map(|(path, hash)| {
                let relative = path.strip_prefix(source_root).ok()?;
                Some(CopyCandidate {
                    source: path.clone(),
                    destination: destination_root.join(relative),
                    hash: hash.clone(),
                })
            })
            .collect())
    }

    /// Row counts of the main relations.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        self.with_conn(|conn| {
            Ok(StoreStats {
                paths: count(conn, schema::COUNT_PATHS)?,
                files: count(conn, schema::COUNT_FILES)?,
                hashes: count(conn, schema::COUNT_FILE_HASHES)?,
                associations: count(conn, schema::COUNT_FILE_MAP)?,
            })
        })
    }

    // ---- plumbing --------------------------------------------------------

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.conn.lock().map_err(|_| StoreError::Unavailable)?;
        let conn = guard.as_ref().ok_or(StoreError::Unavailable)?;
        f(conn)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Unavailable)?;
        let conn = guard.as_mut().ok_or(StoreError::Unavailable)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_error("BEGIN IMMEDIATE", String::new()))?;
        // Dropping `tx` on the error path rolls back.
        let value = f(&*tx)?;
        tx.commit().map_err(query_error("COMMIT", String::new()))?;
        Ok(value)
    }
}

fn open_connection() -> StoreResult<Connection> {
    let conn = Connection::open_in_memory().map_err(query_error(":memory:", String::new()))?;
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(query_error("PRAGMA foreign_keys", "true".to_string()))?;
    for sql in schema::CREATE_TABLES {
        conn.execute(sql, [])
            .map_err(query_error(sql, String::new()))?;
    }
    Ok(conn)
}

fn query_error(query: &str, params: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> StoreError {
    let query = query.to_string();
    let params = params.into();
    move |source| StoreError::Query {
        query,
        params,
        source,
    }
}

fn path_key(path: &Path) -> Vec<u8> {
    os_bytes(path.as_os_str())
}

fn os_bytes(value: &OsStr) -> Vec<u8> {
    value.as_encoded_bytes().to_vec()
}

#[cfg(unix)]
fn decode(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn decode(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

fn join(dir: Vec<u8>, name: Vec<u8>) -> PathBuf {
    let mut path = decode(dir);
    path.push(decode(name));
    path
}

fn render(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn split_file(path: &Path) -> StoreResult<(Vec<u8>, Vec<u8>)> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    match (parent, path.file_name()) {
        (Some(parent), Some(name)) => Ok((path_key(parent), os_bytes(name))),
        _ => Err(StoreError::InvalidPath(path.to_path_buf())),
    }
}

fn exists<K: ToSql + ?Sized>(conn: &Connection, sql: &str, key: &K, rendered: &str) -> StoreResult<bool> {
    conn.query_row(sql, params![key], |row| row.get::<_, i64>(0))
        .optional()
        .map(|id| id.is_some())
        .map_err(query_error(sql, rendered))
}

fn count(conn: &Connection, sql: &str) -> StoreResult<u64> {
    conn.query_row(sql, [], |row| row.get::<_, i64>(0))
        .map(|n| n.max(0) as u64)
        .map_err(query_error(sql, String::new()))
}

fn ensure_path(conn: &Connection, path: &[u8]) -> StoreResult<i64> {
    conn.execute(schema::INSERT_PATH, params![path])
        .map_err(query_error(schema::INSERT_PATH, render(path)))?;
    conn.query_row(schema::SELECT_PATH_ID, params![path], |row| row.get(0))
        .map_err(query_error(schema::SELECT_PATH_ID, render(path)))
}

fn ensure_hash(conn: &Connection, insert: &str, select: &str, hash: &str) -> StoreResult<i64> {
    conn.execute(insert, params![hash])
        .map_err(query_error(insert, hash))?;
    conn.query_row(select, params![hash], |row| row.get(0))
        .map_err(query_error(select, hash))
}

fn ensure_file(conn: &Connection, dir: &[u8], name: &[u8], generate: bool) -> StoreResult<i64> {
    let path_id = ensure_path(conn, dir)?;
    let rendered = || format!("{}, {path_id}, {generate}", render(name));
    conn.execute(schema::INSERT_FILE, params![name, path_id, generate])
        .map_err(query_error(schema::INSERT_FILE, rendered()))?;
    conn.query_row(schema::SELECT_FILE_ID, params![dir, name], |row| row.get(0))
        .map_err(query_error(schema::SELECT_FILE_ID, rendered()))
}

fn query_files<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    rendered: &str,
) -> StoreResult<Vec<PathBuf>> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(query_error(sql, rendered))?;
    let rows = stmt
        .query_map(params, |row| Ok(join(row.get(0)?, row.get(1)?)))
        .map_err(query_error(sql, rendered))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(query_error(sql, rendered))
}

fn query_paths(conn: &Connection, sql: &str) -> StoreResult<Vec<PathBuf>> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(query_error(sql, String::new()))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, Vec<u8>>(0).map(decode))
        .map_err(query_error(sql, String::new()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(query_error(sql, String::new()))
}

/// Fold `(hash, member)` rows sorted by hash into groups.
fn fold_groups(rows: Vec<(String, PathBuf)>) -> Vec<DuplicateGroup> {
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    for (hash, path) in rows {
        match groups.last_mut() {
            Some(group) if group.hash == hash => group.paths.push(path),
            _ => groups.push(DuplicateGroup {
                hash,
                paths: vec![path],
            }),
        }
    }
    groups.retain(|group| group.paths.len() >= 2);
    groups
}
