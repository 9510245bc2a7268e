//! Database query implementations
//!
//! Contains functions for reading and writing profile documents

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::DbError;
use crate::store::document::{normalize_legacy_fields, ProfileUpdate};

/// Get the stored document for an identity
pub fn get_document(conn: &Connection, uid: &str) -> Result<Option<Value>, DbError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT document FROM profiles WHERE uid = ?1",
            params![uid],
            |row| row.get(0),
        )
        .optional()?;

    let document: Option<Value> = raw.map(|text| serde_json::from_str(&text)).transpose()?;
    Ok(document)
}

/// Write a full document, replacing any existing one
pub fn put_document(conn: &Connection, uid: &str, document: &Value) -> Result<(), DbError> {
    conn.execute(
        r#"
        INSERT INTO profiles (uid, document)
        VALUES (?1, ?2)
        ON CONFLICT(uid) DO UPDATE SET
            document = excluded.document,
            updated_at = CURRENT_TIMESTAMP
        "#,
        params![uid, document.to_string()],
    )?;
    Ok(())
}

/// Apply a partial update to an existing document.
///
/// Returns the updated document, or `None` if the identity has no document.
pub fn update_document(
    conn: &Connection,
    uid: &str,
    update: &ProfileUpdate,
) -> Result<Option<Value>, DbError> {
    let tx = conn.unchecked_transaction()?;

    let Some(mut document) = get_document(&tx, uid)? else {
        return Ok(None);
    };
    update.apply_to(&mut document);
    put_document(&tx, uid, &document)?;

    tx.commit()?;
    Ok(Some(document))
}

/// List all identities with a stored document
pub fn list_uids(conn: &Connection) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare("SELECT uid FROM profiles ORDER BY uid")?;
    let uids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(uids)
}

/// Rewrite documents that still use legacy field names.
///
/// Returns the number of documents rewritten.
pub fn migrate_legacy_field_names(conn: &Connection) -> Result<usize, DbError> {
    let rows = {
        let mut stmt = conn.prepare("SELECT uid, document FROM profiles")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let mut migrated = 0;
    for (uid, text) in rows {
        let mut document: Value = match serde_json::from_str(&text) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Skipping unreadable profile document {}: {}", uid, e);
                continue;
            }
        };

        if normalize_legacy_fields(&mut document) {
            put_document(conn, &uid, &document)?;
            migrated += 1;
        }
    }

    Ok(migrated)
}
