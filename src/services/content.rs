/// Content interaction ledger.
///
/// Photos and their interaction relations: `likes` (shared with messages),
/// `saved_content` and `marked_users`. Every add inserts the relation row
/// first and then moves the counter; every remove deletes the row first.
use rusqlite::{params, Connection, OptionalExtension};

use super::{ensure_user_exists, new_id, now, EmptyListPolicy};
use crate::db::models::Photo;
use crate::db::{expect_one_row, map_unique};
use crate::error::{CoreError, Result};

/// Content that carries a `likes` counter backed by the `likes` relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Photo,
    Message,
}

impl LikeTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            LikeTarget::Photo => "photo",
            LikeTarget::Message => "message",
        }
    }

    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "photo" => Some(LikeTarget::Photo),
            "message" => Some(LikeTarget::Message),
            _ => None,
        }
    }

    fn counter(&self) -> &'static str {
        match self {
            LikeTarget::Photo => "photos.likes",
            LikeTarget::Message => "messages.likes",
        }
    }

    fn increment_sql(&self) -> &'static str {
        match self {
            LikeTarget::Photo => "UPDATE photos SET likes = likes + 1 WHERE id = ?1",
            LikeTarget::Message => "UPDATE messages SET likes = likes + 1 WHERE id = ?1",
        }
    }

    fn decrement_sql(&self) -> &'static str {
        match self {
            LikeTarget::Photo => "UPDATE photos SET likes = likes - 1 WHERE id = ?1 AND likes > 0",
            LikeTarget::Message => {
                "UPDATE messages SET likes = likes - 1 WHERE id = ?1 AND likes > 0"
            }
        }
    }
}

pub struct ContentLedger<'a> {
    conn: &'a Connection,
    policy: EmptyListPolicy,
}

impl<'a> ContentLedger<'a> {
    pub fn new(conn: &'a Connection, policy: EmptyListPolicy) -> Self {
        ContentLedger { conn, policy }
    }

    /// Publish a photo under a generated id; the uploaded file name is kept
    /// only as an attribute.
    pub fn publish_photo(&self, user_id: &str, file_name: &str, description: &str) -> Result<Photo> {
        if file_name.trim().is_empty() {
            return Err(CoreError::InvalidInput("file name is required".to_string()));
        }
        ensure_user_exists(self.conn, user_id)?;

        let id = new_id();
        self.conn.execute(
            "INSERT INTO photos (id, user_id, file_name, description, date_of_publishing)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user_id, file_name, description, now()],
        )?;

        let affected = self.conn.execute(
            "UPDATE users SET posts = posts + 1 WHERE id = ?1",
            params![user_id],
        )?;
        expect_one_row(affected, "users.posts")?;

        log::info!("{} published photo {}", user_id, id);
        self.get_photo(&id)
    }

    pub fn get_photo(&self, photo_id: &str) -> Result<Photo> {
        let sql = format!("SELECT {} FROM photos WHERE id = ?1", Photo::COLUMNS);
        self.conn
            .query_row(&sql, params![photo_id], Photo::from_row)
            .optional()?
            .ok_or(CoreError::PhotoNotFound)
    }

    /// Published, non-archived photos of a user, newest first
    pub fn get_user_photos(&self, user_id: &str) -> Result<Vec<Photo>> {
        let sql = format!(
            "SELECT {} FROM photos WHERE user_id = ?1 AND archived = 0
             ORDER BY date_of_publishing DESC",
            Photo::COLUMNS
        );
        let photos = self.query_photos(&sql, user_id)?;
        self.policy.apply(photos, CoreError::NoPhotos)
    }

    /// Photos the user saved, most recently saved first
    pub fn get_saved_photos(&self, user_id: &str) -> Result<Vec<Photo>> {
        let columns = Photo::COLUMNS
            .split(", ")
            .map(|c| format!("p.{}", c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM photos p
             JOIN saved_content s ON s.photo_id = p.id
             WHERE s.user_id = ?1 ORDER BY s.saved_at DESC",
            columns
        );
        let photos = self.query_photos(&sql, user_id)?;
        self.policy.apply(photos, CoreError::NoPhotos)
    }

    /// Delete a photo with every relation row pointing at it. Owner only.
    pub fn delete_photo(&self, photo_id: &str, user_id: &str) -> Result<()> {
        let photo = self.owned_photo(photo_id, user_id)?;

        self.conn.execute(
            "DELETE FROM likes WHERE content_kind = ?1 AND content_id = ?2",
            params![LikeTarget::Photo.kind(), photo_id],
        )?;
        self.conn.execute(
            "DELETE FROM saved_content WHERE photo_id = ?1",
            params![photo_id],
        )?;
        self.conn.execute(
            "DELETE FROM marked_users WHERE photo_id = ?1",
            params![photo_id],
        )?;
        self.conn
            .execute("DELETE FROM photos WHERE id = ?1", params![photo_id])?;

        let affected = self.conn.execute(
            "UPDATE users SET posts = posts - 1 WHERE id = ?1 AND posts > 0",
            params![photo.user_id],
        )?;
        expect_one_row(affected, "users.posts")?;

        log::info!("{} deleted photo {}", user_id, photo_id);
        Ok(())
    }

    pub fn archive_photo(&self, photo_id: &str, user_id: &str) -> Result<()> {
        self.set_archived(photo_id, user_id, true)
    }

    pub fn unarchive_photo(&self, photo_id: &str, user_id: &str) -> Result<()> {
        self.set_archived(photo_id, user_id, false)
    }

    pub fn edit_description(&self, photo_id: &str, user_id: &str, description: &str) -> Result<()> {
        self.owned_photo(photo_id, user_id)?;
        self.conn.execute(
            "UPDATE photos SET description = ?1 WHERE id = ?2",
            params![description, photo_id],
        )?;
        Ok(())
    }

    pub fn share_photo(&self, photo_id: &str) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE photos SET sharings = sharings + 1 WHERE id = ?1",
            params![photo_id],
        )?;
        if affected == 0 {
            return Err(CoreError::PhotoNotFound);
        }
        Ok(())
    }

    pub fn like_photo(&self, photo_id: &str, user_id: &str) -> Result<()> {
        self.get_photo(photo_id)?;
        self.like(LikeTarget::Photo, photo_id, user_id)
    }

    pub fn unlike_photo(&self, photo_id: &str, user_id: &str) -> Result<()> {
        self.get_photo(photo_id)?;
        self.unlike(LikeTarget::Photo, photo_id, user_id)
    }

    /// Record a like and bump the target's counter
    pub(crate) fn like(&self, target: LikeTarget, content_id: &str, user_id: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO likes (user_id, content_kind, content_id, liked_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, target.kind(), content_id, now()],
            )
            .map_err(|e| map_unique(e, CoreError::AlreadyLiked))?;

        let affected = self.conn.execute(target.increment_sql(), params![content_id])?;
        expect_one_row(affected, target.counter())
    }

    /// Remove a like and decrement the target's counter
    pub(crate) fn unlike(&self, target: LikeTarget, content_id: &str, user_id: &str) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM likes WHERE user_id = ?1 AND content_kind = ?2 AND content_id = ?3",
            params![user_id, target.kind(), content_id],
        )?;
        if deleted == 0 {
            return Err(CoreError::NotLiked);
        }

        let affected = self.conn.execute(target.decrement_sql(), params![content_id])?;
        expect_one_row(affected, target.counter())
    }

    pub fn save_photo(&self, photo_id: &str, user_id: &str) -> Result<()> {
        self.get_photo(photo_id)?;
        self.conn
            .execute(
                "INSERT INTO saved_content (user_id, photo_id, saved_at) VALUES (?1, ?2, ?3)",
                params![user_id, photo_id, now()],
            )
            .map_err(|e| map_unique(e, CoreError::AlreadySaved))?;

        let affected = self.conn.execute(
            "UPDATE photos SET savings = savings + 1 WHERE id = ?1",
            params![photo_id],
        )?;
        expect_one_row(affected, "photos.savings")
    }

    pub fn unsave_photo(&self, photo_id: &str, user_id: &str) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM saved_content WHERE user_id = ?1 AND photo_id = ?2",
            params![user_id, photo_id],
        )?;
        if deleted == 0 {
            return Err(CoreError::NotSaved);
        }

        let affected = self.conn.execute(
            "UPDATE photos SET savings = savings - 1 WHERE id = ?1 AND savings > 0",
            params![photo_id],
        )?;
        expect_one_row(affected, "photos.savings")
    }

    /// Mark a user on a photo and raise its `marked_users` flag. Owner only.
    pub fn mark_user(&self, photo_id: &str, owner_id: &str, marked_user_id: &str) -> Result<()> {
        self.owned_photo(photo_id, owner_id)?;
        ensure_user_exists(self.conn, marked_user_id)?;

        self.conn
            .execute(
                "INSERT INTO marked_users (photo_id, user_id) VALUES (?1, ?2)",
                params![photo_id, marked_user_id],
            )
            .map_err(|e| map_unique(e, CoreError::AlreadyMarked))?;

        let affected = self.conn.execute(
            "UPDATE photos SET marked_users = 1 WHERE id = ?1",
            params![photo_id],
        )?;
        expect_one_row(affected, "photos.marked_users")
    }

    /// Unmark a user. The flag is left alone; see [`Self::refresh_marked_flag`].
    pub fn unmark_user(&self, photo_id: &str, owner_id: &str, marked_user_id: &str) -> Result<()> {
        self.owned_photo(photo_id, owner_id)?;
        let deleted = self.conn.execute(
            "DELETE FROM marked_users WHERE photo_id = ?1 AND user_id = ?2",
            params![photo_id, marked_user_id],
        )?;
        if deleted == 0 {
            return Err(CoreError::NotMarked);
        }
        Ok(())
    }

    /// Second step of unmarking: recompute the flag from the relation.
    /// Returns the new flag value.
    pub fn refresh_marked_flag(&self, photo_id: &str, owner_id: &str) -> Result<bool> {
        self.owned_photo(photo_id, owner_id)?;
        self.recompute_marked_flag(photo_id)
    }

    pub fn get_marked_users(&self, photo_id: &str) -> Result<Vec<String>> {
        self.get_photo(photo_id)?;
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM marked_users WHERE photo_id = ?1 ORDER BY user_id")?;
        let users = stmt
            .query_map(params![photo_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(users)
    }

    /// Undo every interaction of `user_id` and delete their photos.
    /// Used by account deletion.
    pub(crate) fn remove_user_interactions(&self, user_id: &str) -> Result<()> {
        let liked: Vec<(String, String)> = {
            let mut stmt = self
                .conn
                .prepare("SELECT content_kind, content_id FROM likes WHERE user_id = ?1")?;
            let rows = stmt
                .query_map(params![user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        for (kind, content_id) in liked {
            match LikeTarget::parse(&kind) {
                Some(target) => self.unlike(target, &content_id, user_id)?,
                None => log::warn!("Skipping like with unknown kind '{}'", kind),
            }
        }

        for photo_id in self.ids("SELECT photo_id FROM saved_content WHERE user_id = ?1", user_id)? {
            self.unsave_photo(&photo_id, user_id)?;
        }

        let marked_on = self.ids("SELECT photo_id FROM marked_users WHERE user_id = ?1", user_id)?;
        self.conn.execute(
            "DELETE FROM marked_users WHERE user_id = ?1",
            params![user_id],
        )?;
        for photo_id in marked_on {
            self.recompute_marked_flag(&photo_id)?;
        }

        for photo_id in self.ids("SELECT id FROM photos WHERE user_id = ?1", user_id)? {
            self.delete_photo(&photo_id, user_id)?;
        }

        Ok(())
    }

    fn recompute_marked_flag(&self, photo_id: &str) -> Result<bool> {
        let any_marked: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM marked_users WHERE photo_id = ?1)",
            params![photo_id],
            |row| row.get(0),
        )?;
        let affected = self.conn.execute(
            "UPDATE photos SET marked_users = ?1 WHERE id = ?2",
            params![any_marked, photo_id],
        )?;
        expect_one_row(affected, "photos.marked_users")?;
        Ok(any_marked)
    }

    fn owned_photo(&self, photo_id: &str, user_id: &str) -> Result<Photo> {
        let photo = self.get_photo(photo_id)?;
        if photo.user_id != user_id {
            return Err(CoreError::Forbidden("only the owner can change this photo"));
        }
        Ok(photo)
    }

    fn set_archived(&self, photo_id: &str, user_id: &str, archived: bool) -> Result<()> {
        self.owned_photo(photo_id, user_id)?;
        self.conn.execute(
            "UPDATE photos SET archived = ?1 WHERE id = ?2",
            params![archived, photo_id],
        )?;
        Ok(())
    }

    fn query_photos(&self, sql: &str, user_id: &str) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(sql)?;
        let photos = stmt
            .query_map(params![user_id], Photo::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    fn ids(&self, sql: &str, user_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::services::testing::{count, seed_user};

    fn posts(conn: &Connection, id: &str) -> i64 {
        conn.query_row("SELECT posts FROM users WHERE id = ?1", params![id], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_publish_photo_uses_generated_id() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");

        let ledger = ContentLedger::new(&conn, EmptyListPolicy::Error);
        let first = ledger.publish_photo("alice", "beach.jpg", "sunset").unwrap();
        let second = ledger.publish_photo("alice", "beach.jpg", "again").unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.file_name, "beach.jpg");
        assert_eq!(posts(&conn, "alice"), 2);
    }

    #[tokio::test]
    async fn test_like_ledger() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");
        seed_user(&conn, "bob");

        let ledger = ContentLedger::new(&conn, EmptyListPolicy::Error);
        let photo = ledger.publish_photo("alice", "a.jpg", "").unwrap();

        ledger.like_photo(&photo.id, "bob").unwrap();
        assert!(matches!(ledger.like_photo(&photo.id, "bob"), Err(CoreError::AlreadyLiked)));
        assert_eq!(ledger.get_photo(&photo.id).unwrap().likes, 1);

        ledger.unlike_photo(&photo.id, "bob").unwrap();
        assert_eq!(ledger.get_photo(&photo.id).unwrap().likes, 0);
        assert!(matches!(ledger.unlike_photo(&photo.id, "bob"), Err(CoreError::NotLiked)));
        assert!(matches!(ledger.like_photo("missing", "bob"), Err(CoreError::PhotoNotFound)));
    }

    #[tokio::test]
    async fn test_save_ledger_and_saved_list() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");
        seed_user(&conn, "bob");

        let ledger = ContentLedger::new(&conn, EmptyListPolicy::Error);
        let photo = ledger.publish_photo("alice", "a.jpg", "").unwrap();

        assert!(matches!(ledger.get_saved_photos("bob"), Err(CoreError::NoPhotos)));
        ledger.save_photo(&photo.id, "bob").unwrap();
        assert!(matches!(ledger.save_photo(&photo.id, "bob"), Err(CoreError::AlreadySaved)));
        assert_eq!(ledger.get_photo(&photo.id).unwrap().savings, 1);
        assert_eq!(ledger.get_saved_photos("bob").unwrap()[0].id, photo.id);

        ledger.unsave_photo(&photo.id, "bob").unwrap();
        assert_eq!(ledger.get_photo(&photo.id).unwrap().savings, 0);
        assert!(matches!(ledger.unsave_photo(&photo.id, "bob"), Err(CoreError::NotSaved)));
    }

    #[tokio::test]
    async fn test_marked_flag_is_explicit_two_step() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");
        seed_user(&conn, "bob");
        seed_user(&conn, "carol");

        let ledger = ContentLedger::new(&conn, EmptyListPolicy::Error);
        let photo = ledger.publish_photo("alice", "a.jpg", "").unwrap();

        ledger.mark_user(&photo.id, "alice", "bob").unwrap();
        ledger.mark_user(&photo.id, "alice", "carol").unwrap();
        assert!(matches!(
            ledger.mark_user(&photo.id, "alice", "bob"),
            Err(CoreError::AlreadyMarked)
        ));
        assert!(ledger.get_photo(&photo.id).unwrap().marked_users);
        assert!(matches!(
            ledger.mark_user(&photo.id, "bob", "carol"),
            Err(CoreError::Forbidden(_))
        ));

        ledger.unmark_user(&photo.id, "alice", "bob").unwrap();
        assert!(ledger.refresh_marked_flag(&photo.id, "alice").unwrap());

        ledger.unmark_user(&photo.id, "alice", "carol").unwrap();
        // Unmarking alone leaves the flag raised.
        assert!(ledger.get_photo(&photo.id).unwrap().marked_users);
        assert!(!ledger.refresh_marked_flag(&photo.id, "alice").unwrap());
        assert!(!ledger.get_photo(&photo.id).unwrap().marked_users);
        assert!(ledger.get_marked_users(&photo.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_photo_clears_relations() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");
        seed_user(&conn, "bob");

        let ledger = ContentLedger::new(&conn, EmptyListPolicy::Error);
        let photo = ledger.publish_photo("alice", "a.jpg", "").unwrap();
        ledger.like_photo(&photo.id, "bob").unwrap();
        ledger.save_photo(&photo.id, "bob").unwrap();
        ledger.mark_user(&photo.id, "alice", "bob").unwrap();

        assert!(matches!(
            ledger.delete_photo(&photo.id, "bob"),
            Err(CoreError::Forbidden(_))
        ));
        ledger.delete_photo(&photo.id, "alice").unwrap();

        assert_eq!(posts(&conn, "alice"), 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM likes"), 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM saved_content"), 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM marked_users"), 0);
    }

    #[tokio::test]
    async fn test_archived_photos_hidden_from_profile() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");

        let ledger = ContentLedger::new(&conn, EmptyListPolicy::Error);
        let photo = ledger.publish_photo("alice", "a.jpg", "").unwrap();
        ledger.edit_description(&photo.id, "alice", "new caption").unwrap();
        ledger.share_photo(&photo.id).unwrap();

        ledger.archive_photo(&photo.id, "alice").unwrap();
        assert!(matches!(ledger.get_user_photos("alice"), Err(CoreError::NoPhotos)));

        ledger.unarchive_photo(&photo.id, "alice").unwrap();
        let photos = ledger.get_user_photos("alice").unwrap();
        assert_eq!(photos[0].description, "new caption");
        assert_eq!(photos[0].sharings, 1);
    }
}
