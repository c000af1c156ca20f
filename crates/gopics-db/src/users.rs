use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use gopics_types::models::User;

use crate::models::{HashRecord, user_key};
use crate::{Database, DbError, Result, kv};

impl Database {
    // -- Users --

    /// Look up a user. An unknown name is `Ok(None)`, not an error.
    pub async fn get_user(&self, name: &str) -> Result<Option<User>> {
        let name = name.to_string();
        self.with_conn(move |conn| query_user(conn, &name)).await
    }

    /// Write a new user record.
    ///
    /// Conditional: fails with [`DbError::NameTaken`] if a record for the
    /// name already exists, even when a concurrent request created it after
    /// the caller's own existence check.
    pub async fn create_user(&self, user: User) -> Result<()> {
        self.with_conn(move |conn| insert_user(conn, &user)).await
    }
}

pub fn query_user(conn: &Connection, name: &str) -> Result<Option<User>> {
    let key = user_key(name);
    let fields = kv::hgetall(conn, &key)?;
    if fields.is_empty() {
        return Ok(None);
    }
    User::from_fields(&key, fields).map(Some)
}

pub fn insert_user(conn: &mut Connection, user: &User) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if !kv::hmset_nx(&tx, &user_key(&user.name), &user.to_fields())? {
        return Err(DbError::NameTaken(user.name.clone()));
    }
    tx.commit()?;

    info!("User {} registered", user.name);
    Ok(())
}
