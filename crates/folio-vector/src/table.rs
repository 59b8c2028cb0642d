//! SQLite connection and housekeeping helpers.
//!
//! Opens the database, applies the schema and stores one JSON metadata
//! record per collection.
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use folio_core::types::CollectionMeta;
use folio_core::{Error, Result};

use crate::schema::SCHEMA;

pub(crate) fn store_err(e: impl std::fmt::Display) -> Error {
    Error::Store(e.to_string())
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() { std::fs::create_dir_all(parent)?; }
    }
    let conn = Connection::open(path).map_err(store_err)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(store_err)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA).map_err(store_err)
}

pub fn get_meta(conn: &Connection, name: &str) -> Result<Option<CollectionMeta>> {
    let raw: Option<String> = conn
        .query_row("SELECT meta FROM collections WHERE name = ?1", params![name], |r| r.get(0))
        .optional()
        .map_err(store_err)?;
    raw.map(|s| serde_json::from_str(&s).map_err(store_err)).transpose()
}

pub fn set_meta(conn: &Connection, name: &str, meta: &CollectionMeta) -> Result<()> {
    let json = serde_json::to_string(meta).map_err(store_err)?;
    conn.execute(
        "INSERT INTO collections (name, meta, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET meta = excluded.meta, updated_at = excluded.updated_at",
        params![name, json, Utc::now().to_rfc3339()],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn list_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name").map_err(store_err)?;
    let rows = stmt.query_map([], |r| r.get::<_, String>(0)).map_err(store_err)?;
    rows.collect::<std::result::Result<Vec<_>, _>>().map_err(store_err)
}

pub fn delete(conn: &mut Connection, name: &str) -> Result<()> {
    let tx = conn.transaction().map_err(store_err)?;
    tx.execute("DELETE FROM entries WHERE collection = ?1", params![name]).map_err(store_err)?;
    tx.execute("DELETE FROM collections WHERE name = ?1", params![name]).map_err(store_err)?;
    tx.commit().map_err(store_err)
}
