/// Follow graph maintenance.
/// Keeps `users.followers` / `users.following` in step with the `follows` edges.
use rusqlite::{params, Connection, OptionalExtension};

use super::{ensure_user_exists, now, EmptyListPolicy};
use crate::db::models::FollowEdge;
use crate::db::{expect_one_row, map_unique};
use crate::error::{CoreError, Result};

pub struct FollowGraph<'a> {
    conn: &'a Connection,
    policy: EmptyListPolicy,
}

impl<'a> FollowGraph<'a> {
    pub fn new(conn: &'a Connection, policy: EmptyListPolicy) -> Self {
        FollowGraph { conn, policy }
    }

    /// Whether the edge `(follower_id, followed_id)` exists
    pub fn is_following(&self, follower_id: &str, followed_id: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
                params![follower_id, followed_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Create the edge `follower -> followed` and bump both counters.
    pub fn follow(&self, follower_id: &str, followed_id: &str) -> Result<()> {
        if follower_id == followed_id {
            return Err(CoreError::SelfFollow);
        }
        ensure_user_exists(self.conn, follower_id)?;
        ensure_user_exists(self.conn, followed_id)?;
        if self.is_following(follower_id, followed_id)? {
            return Err(CoreError::AlreadyFollowing);
        }

        let affected = self.conn.execute(
            "UPDATE users SET following = following + 1 WHERE id = ?1",
            params![follower_id],
        )?;
        expect_one_row(affected, "users.following")?;

        let affected = self.conn.execute(
            "UPDATE users SET followers = followers + 1 WHERE id = ?1",
            params![followed_id],
        )?;
        expect_one_row(affected, "users.followers")?;

        self.insert_edge(follower_id, followed_id)?;

        log::info!("{} followed {}", follower_id, followed_id);
        Ok(())
    }

    /// Remove the edge `follower -> followed` and decrement both counters.
    pub fn unfollow(&self, follower_id: &str, followed_id: &str) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
            params![follower_id, followed_id],
        )?;
        if deleted == 0 {
            return Err(CoreError::NotFollowing);
        }

        self.decrement_following(follower_id)?;
        self.decrement_followers(followed_id)?;

        log::info!("{} unfollowed {}", follower_id, followed_id);
        Ok(())
    }

    /// Edges whose target is `user_id`
    pub fn list_followers(&self, user_id: &str) -> Result<Vec<FollowEdge>> {
        let edges = self.query_edges(
            "SELECT follower_id, followed_id, follow_date FROM follows
             WHERE followed_id = ?1 ORDER BY follow_date DESC",
            user_id,
        )?;
        self.policy.apply(edges, CoreError::NoFollowers)
    }

    /// Edges whose source is `user_id`
    pub fn list_following(&self, user_id: &str) -> Result<Vec<FollowEdge>> {
        let edges = self.query_edges(
            "SELECT follower_id, followed_id, follow_date FROM follows
             WHERE follower_id = ?1 ORDER BY follow_date DESC",
            user_id,
        )?;
        self.policy.apply(edges, CoreError::NoFollowing)
    }

    /// Drop every edge touching `user_id`, adjusting the other side's counters.
    /// Used by account deletion.
    pub(crate) fn remove_all_edges(&self, user_id: &str) -> Result<()> {
        let followed = self.neighbours(
            "SELECT followed_id FROM follows WHERE follower_id = ?1",
            user_id,
        )?;
        for other in followed {
            self.unfollow(user_id, &other)?;
        }

        let followers = self.neighbours(
            "SELECT follower_id FROM follows WHERE followed_id = ?1",
            user_id,
        )?;
        for other in followers {
            self.unfollow(&other, user_id)?;
        }

        Ok(())
    }

    /// The primary key catches a concurrent follow that slipped past the check.
    fn insert_edge(&self, follower_id: &str, followed_id: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO follows (follower_id, followed_id, follow_date) VALUES (?1, ?2, ?3)",
                params![follower_id, followed_id, now()],
            )
            .map_err(|e| map_unique(e, CoreError::AlreadyFollowing))?;
        Ok(())
    }

    fn decrement_following(&self, user_id: &str) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE users SET following = following - 1 WHERE id = ?1 AND following > 0",
            params![user_id],
        )?;
        expect_one_row(affected, "users.following")
    }

    fn decrement_followers(&self, user_id: &str) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE users SET followers = followers - 1 WHERE id = ?1 AND followers > 0",
            params![user_id],
        )?;
        expect_one_row(affected, "users.followers")
    }

    fn query_edges(&self, sql: &str, user_id: &str) -> Result<Vec<FollowEdge>> {
        let mut stmt = self.conn.prepare(sql)?;
        let edges = stmt
            .query_map(params![user_id], |row| {
                Ok(FollowEdge {
                    follower_id: row.get(0)?,
                    followed_id: row.get(1)?,
                    follow_date: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    fn neighbours(&self, sql: &str, user_id: &str) -> Result<Vec<String>> {
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

    fn counters(conn: &Connection, id: &str) -> (i64, i64) {
        conn.query_row(
            "SELECT followers, following FROM users WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_follow_updates_counters_and_edge() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");
        seed_user(&conn, "bob");

        let graph = FollowGraph::new(&conn, EmptyListPolicy::Error);
        graph.follow("alice", "bob").unwrap();

        assert_eq!(counters(&conn, "alice"), (0, 1));
        assert_eq!(counters(&conn, "bob"), (1, 0));
        assert!(graph.is_following("alice", "bob").unwrap());
        assert!(!graph.is_following("bob", "alice").unwrap());
    }

    #[tokio::test]
    async fn test_second_follow_is_rejected_and_counters_unchanged() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");
        seed_user(&conn, "bob");

        let graph = FollowGraph::new(&conn, EmptyListPolicy::Error);
        graph.follow("alice", "bob").unwrap();
        let result = graph.follow("alice", "bob");

        assert!(matches!(result, Err(CoreError::AlreadyFollowing)));
        assert_eq!(counters(&conn, "alice"), (0, 1));
        assert_eq!(counters(&conn, "bob"), (1, 0));
    }

    #[tokio::test]
    async fn test_self_follow_rejected() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");

        let graph = FollowGraph::new(&conn, EmptyListPolicy::Error);
        assert!(matches!(graph.follow("alice", "alice"), Err(CoreError::SelfFollow)));
        assert_eq!(counters(&conn, "alice"), (0, 0));
    }

    #[tokio::test]
    async fn test_follow_missing_user_is_not_found() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");

        let graph = FollowGraph::new(&conn, EmptyListPolicy::Error);
        let result = graph.follow("alice", "ghost");

        match result {
            Err(e) => {
                assert!(matches!(e, CoreError::UserNotFound));
                assert!(!e.is_retryable());
            }
            Ok(()) => panic!("following a missing user should fail"),
        }
        assert_eq!(counters(&conn, "alice"), (0, 0));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM follows"), 0);
    }

    #[tokio::test]
    async fn test_duplicate_edge_insert_maps_to_already_following() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");
        seed_user(&conn, "bob");

        // A concurrent follow committed the edge after our existence check.
        conn.execute(
            "INSERT INTO follows (follower_id, followed_id, follow_date) VALUES ('alice', 'bob', 'x')",
            [],
        )
        .unwrap();

        let graph = FollowGraph::new(&conn, EmptyListPolicy::Error);
        let result = graph.insert_edge("alice", "bob");

        assert!(matches!(result, Err(CoreError::AlreadyFollowing)));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM follows"), 1);
    }

    #[tokio::test]
    async fn test_unfollow_round_trip() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");
        seed_user(&conn, "bob");

        let graph = FollowGraph::new(&conn, EmptyListPolicy::Error);
        graph.follow("alice", "bob").unwrap();
        graph.unfollow("alice", "bob").unwrap();

        assert_eq!(counters(&conn, "alice"), (0, 0));
        assert_eq!(counters(&conn, "bob"), (0, 0));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM follows"), 0);
    }

    #[tokio::test]
    async fn test_unfollow_without_edge() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");
        seed_user(&conn, "bob");

        let graph = FollowGraph::new(&conn, EmptyListPolicy::Error);
        assert!(matches!(graph.unfollow("alice", "bob"), Err(CoreError::NotFollowing)));
    }

    #[tokio::test]
    async fn test_unfollow_never_stores_negative_counter() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        seed_user(&conn, "alice");
        seed_user(&conn, "bob");

        // An edge whose counters were never incremented.
        conn.execute(
            "INSERT INTO follows (follower_id, followed_id, follow_date) VALUES ('alice', 'bob', 'x')",
            [],
        )
        .unwrap();

        let graph = FollowGraph::new(&conn, EmptyListPolicy::Error);
        let result = graph.unfollow("alice", "bob");

        assert!(matches!(result, Err(CoreError::CounterUpdateFailed(_))));
        assert_eq!(counters(&conn, "alice"), (0, 0));
    }

    #[tokio::test]
    async fn test_counters_mirror_edges() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        for id in ["a", "b", "c", "d"] {
            seed_user(&conn, id);
        }

        let graph = FollowGraph::new(&conn, EmptyListPolicy::Error);
        graph.follow("a", "b").unwrap();
        graph.follow("a", "c").unwrap();
        graph.follow("c", "b").unwrap();
        graph.follow("d", "b").unwrap();
        graph.unfollow("a", "c").unwrap();
        graph.follow("b", "a").unwrap();

        for id in ["a", "b", "c", "d"] {
            let (followers, following) = counters(&conn, id);
            let in_edges: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM follows WHERE followed_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .unwrap();
            let out_edges: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(followers, in_edges, "followers of {}", id);
            assert_eq!(following, out_edges, "following of {}", id);
        }
    }

    #[tokio::test]
    async fn test_list_followers_and_following() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        for id in ["a", "b", "c"] {
            seed_user(&conn, id);
        }

        let graph = FollowGraph::new(&conn, EmptyListPolicy::Error);
        graph.follow("a", "c").unwrap();
        graph.follow("b", "c").unwrap();

        let followers = graph.list_followers("c").unwrap();
        assert_eq!(followers.len(), 2);
        assert!(followers.iter().all(|e| e.followed_id == "c"));

        let following = graph.list_following("a").unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].followed_id, "c");

        assert!(matches!(graph.list_followers("a"), Err(CoreError::NoFollowers)));
        assert!(matches!(graph.list_following("c"), Err(CoreError::NoFollowing)));

        let lenient = FollowGraph::new(&conn, EmptyListPolicy::Empty);
        assert!(lenient.list_followers("a").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_all_edges() {
        let pool = create_test_pool();
        let conn = pool.lock().await;
        for id in ["a", "b", "c"] {
            seed_user(&conn, id);
        }

        let graph = FollowGraph::new(&conn, EmptyListPolicy::Error);
        graph.follow("a", "b").unwrap();
        graph.follow("c", "a").unwrap();
        graph.follow("c", "b").unwrap();

        graph.remove_all_edges("a").unwrap();

        assert_eq!(counters(&conn, "b"), (1, 0));
        assert_eq!(counters(&conn, "c"), (0, 1));
        assert_eq!(counters(&conn, "a"), (0, 0));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM follows"), 1);
    }
}
