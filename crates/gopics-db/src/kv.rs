//! Hash and ordered-index primitives over the `hashes` and `zsets` tables.
//!
//! Every function takes a plain connection; pass a transaction to group
//! several calls atomically.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};

use crate::Result;

pub fn hgetall(conn: &Connection, key: &str) -> Result<HashMap<String, Vec<u8>>> {
    let mut stmt = conn.prepare_cached("SELECT field, value FROM hashes WHERE key = ?1")?;
    let fields = stmt
        .query_map([key], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(fields)
}

pub fn exists(conn: &Connection, key: &str) -> Result<bool> {
    let found = conn
        .prepare_cached("SELECT 1 FROM hashes WHERE key = ?1 LIMIT 1")?
        .query_row([key], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Set the given fields, overwriting existing values.
pub fn hmset(conn: &Connection, key: &str, fields: &[(&str, Vec<u8>)]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO hashes (key, field, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
    )?;
    for (field, value) in fields {
        stmt.execute(params![key, field, value])?;
    }
    Ok(())
}

/// Set the given fields only if `key` has none yet.
/// Returns `false` and writes nothing when the key already exists.
///
/// Only race-free inside an immediate (write-locked) transaction.
pub fn hmset_nx(conn: &Connection, key: &str, fields: &[(&str, Vec<u8>)]) -> Result<bool> {
    if exists(conn, key)? {
        return Ok(false);
    }
    hmset(conn, key, fields)?;
    Ok(true)
}

pub fn del(conn: &Connection, key: &str) -> Result<usize> {
    let mut removed = conn.execute("DELETE FROM hashes WHERE key = ?1", [key])?;
    removed += conn.execute("DELETE FROM zsets WHERE key = ?1", [key])?;
    Ok(removed)
}

/// Add `member` with `score`, or move it to `score` if already present.
pub fn zadd(conn: &Connection, key: &str, score: i64, member: &str) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO zsets (key, member, score) VALUES (?1, ?2, ?3)
         ON CONFLICT(key, member) DO UPDATE SET score = excluded.score",
    )?
    .execute(params![key, member, score])?;
    Ok(())
}

/// Up to `limit` members, highest score first. Equal scores come out in
/// descending member order.
pub fn zrevrange(conn: &Connection, key: &str, limit: usize) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT member FROM zsets WHERE key = ?1
         ORDER BY score DESC, member DESC
         LIMIT ?2",
    )?;
    let members = stmt
        .query_map(params![key, limit as i64], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(members)
}

pub fn zcard(conn: &Connection, key: &str) -> Result<usize> {
    let count: i64 = conn
        .prepare_cached("SELECT COUNT(*) FROM zsets WHERE key = ?1")?
        .query_row([key], |row| row.get(0))?;
    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run(&conn).unwrap();
        conn
    }

    #[test]
    fn missing_hash_is_empty() {
        let conn = conn();
        assert!(hgetall(&conn, "user:nobody").unwrap().is_empty());
        assert!(!exists(&conn, "user:nobody").unwrap());
    }

    #[test]
    fn hmset_overwrites_fields() {
        let conn = conn();
        hmset(&conn, "h", &[("a", b"1".to_vec()), ("b", b"2".to_vec())]).unwrap();
        hmset(&conn, "h", &[("a", b"3".to_vec())]).unwrap();

        let fields = hgetall(&conn, "h").unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["a"], b"3");
        assert_eq!(fields["b"], b"2");
    }

    #[test]
    fn hmset_nx_keeps_existing_hash() {
        let conn = conn();
        assert!(hmset_nx(&conn, "h", &[("a", b"1".to_vec())]).unwrap());
        assert!(!hmset_nx(&conn, "h", &[("a", b"2".to_vec()), ("c", b"9".to_vec())]).unwrap());

        let fields = hgetall(&conn, "h").unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["a"], b"1");
    }

    #[test]
    fn zrevrange_orders_by_score_then_member() {
        let conn = conn();
        zadd(&conn, "z", 10, "a").unwrap();
        zadd(&conn, "z", 30, "b").unwrap();
        zadd(&conn, "z", 20, "c").unwrap();
        zadd(&conn, "z", 30, "d").unwrap();

        assert_eq!(zrevrange(&conn, "z", 10).unwrap(), ["d", "b", "c", "a"]);
        assert_eq!(zrevrange(&conn, "z", 2).unwrap(), ["d", "b"]);
        assert!(zrevrange(&conn, "empty", 10).unwrap().is_empty());
    }

    #[test]
    fn zadd_moves_existing_member() {
        let conn = conn();
        zadd(&conn, "z", 10, "a").unwrap();
        zadd(&conn, "z", 20, "b").unwrap();
        zadd(&conn, "z", 30, "a").unwrap();

        assert_eq!(zcard(&conn, "z").unwrap(), 2);
        assert_eq!(zrevrange(&conn, "z", 10).unwrap(), ["a", "b"]);
    }

    #[test]
    fn keys_are_independent() {
        let conn = conn();
        hmset(&conn, "user:a", &[("name", b"a".to_vec())]).unwrap();
        zadd(&conn, "timeline:a", 1, "p").unwrap();

        assert_eq!(del(&conn, "user:a").unwrap(), 1);
        assert_eq!(zcard(&conn, "timeline:a").unwrap(), 1);
    }
}
