use super::{now, Comment, Db};
use rusqlite::{params, Result};

impl Db {
    /// Flips the current user's like on `manga_id`. `None` when nobody is
    /// logged in, otherwise whether the manga is now liked.
    pub fn toggle_like(&self, manga_id: &str) -> Result<Option<bool>> {
        let Some(user) = self.get_user()? else {
            return Ok(None);
        };
        let removed = self.conn.execute(
            "DELETE FROM likes WHERE user_id = ?1 AND manga_id = ?2",
            params![user.id, manga_id],
        )?;
        if removed > 0 {
            return Ok(Some(false));
        }
        self.conn.execute(
            "INSERT INTO likes (user_id, manga_id) VALUES (?1, ?2)",
            params![user.id, manga_id],
        )?;
        Ok(Some(true))
    }

    pub fn like_count(&self, manga_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE manga_id = ?1",
            params![manga_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn is_liked(&self, manga_id: &str) -> Result<bool> {
        let Some(user) = self.get_user()? else {
            return Ok(false);
        };
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE user_id = ?1 AND manga_id = ?2",
            params![user.id, manga_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Posts as the current user. `None` when nobody is logged in or the
    /// text is blank.
    pub fn add_comment(&self, manga_id: &str, content: &str) -> Result<Option<Comment>> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        let Some(user) = self.get_user()? else {
            return Ok(None);
        };
        let created_at = now();
        self.conn.execute(
            "INSERT INTO comments (user_id, username, manga_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.id, user.username, manga_id, content, created_at],
        )?;
        Ok(Some(Comment {
            id: self.conn.last_insert_rowid(),
            user_id: user.id,
            username: user.username,
            manga_id: manga_id.to_string(),
            content: content.to_string(),
            created_at,
        }))
    }

    pub fn get_comments(&self, manga_id: &str) -> Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, username, manga_id, content, created_at
             FROM comments WHERE manga_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![manga_id], |row| {
            Ok(Comment {
                id: row.get(0)?,
                user_id: row.get(1)?,
                username: row.get(2)?,
                manga_id: row.get(3)?,
                content: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;

        let mut comments = Vec::new();
        for comment in rows {
            comments.push(comment?);
        }
        Ok(comments)
    }

    pub fn remove_comment(&self, comment_id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM comments WHERE id = ?1", params![comment_id])?;
        Ok(changed > 0)
    }
}
