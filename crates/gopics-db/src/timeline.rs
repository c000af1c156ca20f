use rusqlite::{Connection, TransactionBehavior};
use tracing::error;

use gopics_types::models::Post;

use crate::models::{HashRecord, post_key, timeline_key};
use crate::{Database, DbError, Result, kv};

/// Posts shown on a timeline page.
pub const DEFAULT_LIMIT: usize = 100;

impl Database {
    // -- Timelines --

    /// Store `post` and index it on `owner`'s timeline under `published_at`
    /// (seconds since epoch). Both writes land together or not at all.
    pub async fn commit_post(&self, post: Post, owner: &str, published_at: i64) -> Result<()> {
        let owner = owner.to_string();
        self.with_conn(move |conn| commit(conn, &post, &owner, published_at))
            .await
    }

    /// Up to `limit` posts of `owner`, most recent first. An owner who never
    /// posted gets an empty list.
    pub async fn recent_posts(&self, owner: &str, limit: usize) -> Result<Vec<Post>> {
        let owner = owner.to_string();
        self.with_conn(move |conn| query_recent(conn, &owner, limit))
            .await
    }
}

pub fn commit(conn: &mut Connection, post: &Post, owner: &str, published_at: i64) -> Result<()> {
    commit_with(conn, post, owner, published_at, || Ok(()))
}

/// `between` runs after the record write and before the index write, inside
/// the transaction. An error from it rolls back the record.
fn commit_with<F>(
    conn: &mut Connection,
    post: &Post,
    owner: &str,
    published_at: i64,
    between: F,
) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let key = post_key(&post.name);
    if !kv::hmset_nx(&tx, &key, &post.to_fields())? {
        return Err(DbError::DuplicateKey(key));
    }
    between()?;
    kv::zadd(&tx, &timeline_key(owner), published_at, &post.name)?;

    tx.commit()?;
    Ok(())
}

pub fn query_recent(conn: &mut Connection, owner: &str, limit: usize) -> Result<Vec<Post>> {
    // Read index and records from one snapshot.
    let tx = conn.transaction()?;

    let names = kv::zrevrange(&tx, &timeline_key(owner), limit)?;
    let mut posts = Vec::with_capacity(names.len());
    for name in names {
        let key = post_key(&name);
        let fields = kv::hgetall(&tx, &key)?;
        if fields.is_empty() {
            error!("Timeline of {} references missing post {}", owner, name);
            return Err(DbError::Inconsistent(key));
        }
        posts.push(Post::from_fields(&key, fields)?);
    }

    tx.commit()?;
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PoolConfig;
    use crate::models::user_key;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> Database {
        Database::open(&dir.path().join("timeline.db"), PoolConfig::default()).unwrap()
    }

    fn post(name: &str, text: &str) -> Post {
        Post {
            author_name: "alice".into(),
            author_pic_url: "https://www.gravatar.com/avatar/old".into(),
            name: name.into(),
            text: text.into(),
            time: "Mon 2 Jan 2006 15:04".into(),
        }
    }

    #[tokio::test]
    async fn commit_then_read() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);

        db.commit_post(post("a.jpeg", "hello"), "alice", 100).await.unwrap();

        let posts = db.recent_posts("alice", DEFAULT_LIMIT).await.unwrap();
        assert_eq!(posts, vec![post("a.jpeg", "hello")]);
    }

    #[tokio::test]
    async fn never_posted_is_empty() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        assert!(db.recent_posts("bob", DEFAULT_LIMIT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn most_recent_first() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);

        for (name, at) in [("a", 300), ("b", 100), ("c", 200), ("d", 200), ("e", 50)] {
            db.commit_post(post(name, name), "alice", at).await.unwrap();
        }

        let names: Vec<_> = db
            .recent_posts("alice", DEFAULT_LIMIT)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names[0], "a");
        assert_eq!(names[3..], ["b", "e"]);
    }

    #[tokio::test]
    async fn limit_caps_result() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);

        db.with_conn(|conn| {
            for i in 0..150 {
                commit(conn, &post(&format!("{i:03}.jpeg"), ""), "alice", i % 40)?;
            }
            Ok(())
        })
        .await
        .unwrap();

        let posts = db.recent_posts("alice", DEFAULT_LIMIT).await.unwrap();
        assert_eq!(posts.len(), DEFAULT_LIMIT);

        let scores = db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT score FROM zsets WHERE key = 'timeline:alice' AND member = ?1",
                )?;
                let mut scores = Vec::new();
                for p in posts {
                    scores.push(stmt.query_row([&p.name], |r| r.get::<_, i64>(0))?);
                }
                Ok(scores)
            })
            .await
            .unwrap();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));

        assert_eq!(db.recent_posts("alice", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn timelines_are_per_owner() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);

        db.commit_post(post("a.jpeg", "mine"), "alice", 1).await.unwrap();
        assert!(db.recent_posts("bob", DEFAULT_LIMIT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_between_writes_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);

        let err = db
            .with_conn(|conn| {
                commit_with(conn, &post("a.jpeg", "hello"), "alice", 1, || {
                    Err(DbError::Sqlite(rusqlite::Error::InvalidQuery))
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Sqlite(_)));

        let (record, indexed) = db
            .with_conn(|conn| {
                Ok((
                    kv::exists(conn, &post_key("a.jpeg"))?,
                    kv::zcard(conn, &timeline_key("alice"))?,
                ))
            })
            .await
            .unwrap();
        assert!(!record);
        assert_eq!(indexed, 0);
        assert!(db.recent_posts("alice", DEFAULT_LIMIT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reused_identifier_is_rejected() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);

        db.commit_post(post("a.jpeg", "first"), "alice", 1).await.unwrap();
        let err = db.commit_post(post("a.jpeg", "second"), "alice", 2).await.unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey(_)));

        let posts = db.recent_posts("alice", DEFAULT_LIMIT).await.unwrap();
        assert_eq!(posts, vec![post("a.jpeg", "first")]);
    }

    #[tokio::test]
    async fn missing_record_is_inconsistency() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);

        db.commit_post(post("a.jpeg", "hello"), "alice", 1).await.unwrap();
        db.with_conn(|conn| kv::del(conn, &post_key("a.jpeg")).map(|_| ()))
            .await
            .unwrap();

        let err = db.recent_posts("alice", DEFAULT_LIMIT).await.unwrap_err();
        assert!(matches!(err, DbError::Inconsistent(key) if key == "post:a.jpeg"));
    }

    #[tokio::test]
    async fn author_fields_are_not_kept_in_sync() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);

        db.commit_post(post("a.jpeg", "hello"), "alice", 1).await.unwrap();
        db.with_conn(|conn| {
            kv::hmset(
                conn,
                &user_key("alice"),
                &[("pic_url", b"https://www.gravatar.com/avatar/new".to_vec())],
            )
        })
        .await
        .unwrap();

        let posts = db.recent_posts("alice", DEFAULT_LIMIT).await.unwrap();
        assert_eq!(posts[0].author_pic_url, "https://www.gravatar.com/avatar/old");
    }
}
