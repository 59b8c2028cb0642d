use rusqlite::{params, Connection};

use folio_core::types::{Chunk, IndexEntry};
use folio_core::{Error, Result};

use crate::table::store_err;

pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Store(format!("vector blob of {} bytes is not a multiple of 4", bytes.len())));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Writes `entries` in a single transaction; nothing is kept if any row fails.
pub fn insert_entries(conn: &mut Connection, collection: &str, entries: &[IndexEntry]) -> Result<()> {
    let tx = conn.transaction().map_err(store_err)?;
    {
        let mut stmt = tx
            .prepare(
                "INSERT OR REPLACE INTO entries (collection, id, text, source, chunk_index, file_type, vector)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(store_err)?;
        for entry in entries {
            let c = &entry.chunk;
            let chunk_index = i64::try_from(c.chunk_index).map_err(store_err)?;
            stmt.execute(params![collection, c.id, c.text, c.source, chunk_index, c.file_type, encode_vector(&entry.vector)])
                .map_err(store_err)?;
        }
    }
    tx.commit().map_err(store_err)
}

pub fn read_entries(conn: &Connection, collection: &str) -> Result<Vec<IndexEntry>> {
    let mut stmt = conn
        .prepare("SELECT id, text, source, chunk_index, file_type, vector FROM entries WHERE collection = ?1")
        .map_err(store_err)?;
    let rows = stmt
        .query_map(params![collection], |r| {
            let chunk_index: i64 = r.get(3)?;
            Ok((
                Chunk {
                    id: r.get(0)?,
                    text: r.get(1)?,
                    source: r.get(2)?,
                    chunk_index: usize::try_from(chunk_index).unwrap_or_default(),
                    file_type: r.get(4)?,
                },
                r.get::<_, Vec<u8>>(5)?,
            ))
        })
        .map_err(store_err)?;
    let mut entries = Vec::new();
    for row in rows {
        let (chunk, blob) = row.map_err(store_err)?;
        entries.push(IndexEntry { chunk, vector: decode_vector(&blob)? });
    }
    Ok(entries)
}

pub fn count_entries(conn: &Connection, collection: &str) -> Result<usize> {
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM entries WHERE collection = ?1", params![collection], |r| r.get(0))
        .map_err(store_err)?;
    usize::try_from(n).map_err(store_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_blob_is_little_endian_f32() {
        let v = vec![1.0f32, -0.5, 0.25];
        let bytes = encode_vector(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_vector(&bytes).unwrap(), v);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(matches!(decode_vector(&[0u8; 5]), Err(Error::Store(_))));
    }
}
