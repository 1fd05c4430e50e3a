use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::models::{FeedComment, FeedPost};
use crate::state::NutritionState;

/// Well-known key the client's nutrition document persists under.
pub const STATE_KEY: &str = "nutrition_state";
/// Well-known key the server's authoritative document persists under.
pub const SERVER_STATE_KEY: &str = "server_nutrition_state";

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let storage = Storage { conn };
        storage.migrate()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Storage { conn };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS posts (
                    id TEXT PRIMARY KEY,
                    author TEXT NOT NULL,
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS post_likes (
                    post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    author TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE(post_id, author)
                );

                CREATE TABLE IF NOT EXISTS post_comments (
                    id TEXT PRIMARY KEY,
                    post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    author TEXT NOT NULL,
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);
                CREATE INDEX IF NOT EXISTS idx_likes_post ON post_likes(post_id);
                CREATE INDEX IF NOT EXISTS idx_comments_post ON post_comments(post_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Key-value store ---

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn kv_delete(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }

    // --- Nutrition document persistence ---

    /// Persist a nutrition document under `key`. A failed write is logged and
    /// swallowed; local storage is best-effort, never a hard failure.
    pub fn save_state(&self, key: &str, state: &NutritionState) {
        let result = serde_json::to_string(state)
            .context("failed to serialize nutrition state")
            .and_then(|json| self.kv_set(key, &json));
        if let Err(e) = result {
            tracing::warn!("failed to persist nutrition state: {e:#}");
        }
    }

    /// Load a nutrition document, falling back to an empty one when the key
    /// is absent or the stored JSON no longer decodes.
    pub fn load_state(&self, key: &str) -> NutritionState {
        match self.kv_get(key) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("stored nutrition state is undecodable, starting fresh: {e}");
                    NutritionState::default()
                }
            },
            Ok(None) => NutritionState::default(),
            Err(e) => {
                tracing::warn!("failed to read nutrition state: {e:#}");
                NutritionState::default()
            }
        }
    }

    // --- Feed ---

    pub fn insert_post(&self, author: &str, body: &str) -> Result<FeedPost> {
        let author = author.trim();
        let body = body.trim();
        if author.is_empty() {
            bail!("Post author must not be empty");
        }
        if body.is_empty() {
            bail!("Post body must not be empty");
        }
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO posts (id, author, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, author, body, now],
        )?;
        self.get_post(&id)?
            .context("post vanished after insert")
    }

    pub fn get_post(&self, id: &str) -> Result<Option<FeedPost>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, author, body, created_at FROM posts WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, author, body, created_at)) = row else {
            return Ok(None);
        };
        let likes = self.post_likes(&id)?;
        let comments = self.post_comments(&id)?;
        Ok(Some(FeedPost {
            id,
            author,
            body,
            created_at,
            likes,
            comments,
        }))
    }

    /// Posts newest-first, likes and comments attached.
    pub fn list_posts(&self, limit: i64) -> Result<Vec<FeedPost>> {
        let ids: Vec<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM posts ORDER BY created_at DESC LIMIT ?1")?;
            stmt.query_map(params![limit], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?
        };
        let mut posts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(post) = self.get_post(&id)? {
                posts.push(post);
            }
        }
        Ok(posts)
    }

    /// Toggle a like: returns `true` when the like was added, `false` when
    /// an existing like was removed.
    pub fn toggle_like(&self, post_id: &str, author: &str) -> Result<bool> {
        if self.get_post(post_id)?.is_none() {
            bail!("Post {post_id} not found");
        }
        let removed = self.conn.execute(
            "DELETE FROM post_likes WHERE post_id = ?1 AND author = ?2",
            params![post_id, author],
        )?;
        if removed > 0 {
            return Ok(false);
        }
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO post_likes (post_id, author, created_at) VALUES (?1, ?2, ?3)",
            params![post_id, author, now],
        )?;
        Ok(true)
    }

    pub fn add_comment(&self, post_id: &str, author: &str, body: &str) -> Result<FeedComment> {
        let body = body.trim();
        if body.is_empty() {
            bail!("Comment body must not be empty");
        }
        if self.get_post(post_id)?.is_none() {
            bail!("Post {post_id} not found");
        }
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO post_comments (id, post_id, author, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, post_id, author, body, now],
        )?;
        Ok(FeedComment {
            id,
            author: author.to_string(),
            body: body.to_string(),
            created_at: now,
        })
    }

    pub fn delete_post(&self, id: &str, author: &str) -> Result<bool> {
        let Some(post) = self.get_post(id)? else {
            return Ok(false);
        };
        if post.author != author {
            bail!("Only the author can delete a post");
        }
        self.conn
            .execute("DELETE FROM post_likes WHERE post_id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM post_comments WHERE post_id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(true)
    }

    fn post_likes(&self, post_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT author FROM post_likes WHERE post_id = ?1 ORDER BY created_at")?;
        let likes = stmt
            .query_map(params![post_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(likes)
    }

    fn post_comments(&self, post_id: &str) -> Result<Vec<FeedComment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, author, body, created_at FROM post_comments
             WHERE post_id = ?1 ORDER BY created_at",
        )?;
        let comments = stmt
            .query_map(params![post_id], |row| {
                Ok(FeedComment {
                    id: row.get(0)?,
                    author: row.get(1)?,
                    body: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kv_set_get_delete() {
        let storage = Storage::open_in_memory().unwrap();

        assert!(storage.kv_get("missing").unwrap().is_none());

        storage.kv_set("k", "v1").unwrap();
        assert_eq!(storage.kv_get("k").unwrap().as_deref(), Some("v1"));

        storage.kv_set("k", "v2").unwrap();
        assert_eq!(storage.kv_get("k").unwrap().as_deref(), Some("v2"));

        assert!(storage.kv_delete("k").unwrap());
        assert!(storage.kv_get("k").unwrap().is_none());
        assert!(!storage.kv_delete("k").unwrap());
    }

    #[test]
    fn test_state_roundtrip() {
        use crate::models::MealType;
        let storage = Storage::open_in_memory().unwrap();

        let mut state = NutritionState::default();
        state
            .add_meal(
                "2024-01-01".parse().unwrap(),
                MealType::Lunch,
                crate::models::FoodItem {
                    name: "Rice".to_string(),
                    calories: 130.0,
                    protein: 2.7,
                    carbs: 28.0,
                    fat: 0.3,
                    serving: "100 g".to_string(),
                    category: crate::models::FoodCategory::Grain,
                    brand: None,
                    barcode: None,
                    source: "manual".to_string(),
                },
                2.0,
                chrono::Utc::now(),
            )
            .unwrap();

        storage.save_state(STATE_KEY, &state);
        let loaded = storage.load_state(STATE_KEY);
        assert_eq!(loaded.days.len(), 1);
        let bucket = loaded.days.values().next().unwrap();
        assert!((bucket.totals.calories - 260.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_state_absent_or_corrupt_yields_empty() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(storage.load_state(STATE_KEY).days.is_empty());

        storage.kv_set(STATE_KEY, "{not json").unwrap();
        assert!(storage.load_state(STATE_KEY).days.is_empty());
    }

    #[test]
    fn test_feed_post_like_comment() {
        let storage = Storage::open_in_memory().unwrap();

        let post = storage.insert_post("alice", "hit my protein goal today").unwrap();
        assert_eq!(post.author, "alice");
        assert!(post.likes.is_empty());

        assert!(storage.toggle_like(&post.id, "bob").unwrap());
        let comment = storage.add_comment(&post.id, "bob", "nice!").unwrap();
        assert_eq!(comment.author, "bob");

        let posts = storage.list_posts(50).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].likes, vec!["bob".to_string()]);
        assert_eq!(posts[0].comments.len(), 1);

        // Second like from the same author toggles off
        assert!(!storage.toggle_like(&post.id, "bob").unwrap());
        let posts = storage.list_posts(50).unwrap();
        assert!(posts[0].likes.is_empty());
    }

    #[test]
    fn test_feed_validation() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(storage.insert_post("alice", "   ").is_err());
        assert!(storage.insert_post("", "body").is_err());
        assert!(storage.toggle_like("no-such-post", "bob").is_err());
        assert!(storage.add_comment("no-such-post", "bob", "hi").is_err());
    }

    #[test]
    fn test_delete_post_author_only() {
        let storage = Storage::open_in_memory().unwrap();
        let post = storage.insert_post("alice", "post").unwrap();
        storage.toggle_like(&post.id, "bob").unwrap();

        assert!(storage.delete_post(&post.id, "bob").is_err());
        assert!(storage.delete_post(&post.id, "alice").unwrap());
        assert!(storage.get_post(&post.id).unwrap().is_none());
        assert!(!storage.delete_post(&post.id, "alice").unwrap());
    }

    #[test]
    fn test_list_posts_newest_first() {
        let storage = Storage::open_in_memory().unwrap();
        // created_at has second precision; distinct ordering comes from
        // explicit timestamps here
        storage
            .conn
            .execute(
                "INSERT INTO posts (id, author, body, created_at) VALUES
                 ('a', 'alice', 'older', '2024-01-01T10:00:00Z'),
                 ('b', 'alice', 'newer', '2024-01-02T10:00:00Z')",
                [],
            )
            .unwrap();
        let posts = storage.list_posts(50).unwrap();
        assert_eq!(posts[0].body, "newer");
        assert_eq!(posts[1].body, "older");
    }
}
