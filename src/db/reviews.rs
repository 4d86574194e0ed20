use rusqlite::params;

use super::{Database, DiscordId, now};
use crate::error::BotError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub reviewer_id: DiscordId,
    pub target_id: DiscordId,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewSummary {
    pub average: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeaderboardEntry {
    pub user_id: DiscordId,
    pub average: f64,
    pub count: u32,
}

impl Database {
    /// Stores the reviewer's opinion of `target_id`, replacing any earlier one.
    /// Returns `true` if an earlier review was replaced.
    pub fn upsert_review(
        &self,
        guild_id: DiscordId,
        reviewer_id: DiscordId,
        target_id: DiscordId,
        rating: i64,
        comment: Option<&str>,
    ) -> Result<bool, BotError> {
        if reviewer_id == target_id {
            return Err(BotError::SelfReview);
        }
        if !(1..=5).contains(&rating) {
            return Err(BotError::InvalidRating(rating));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let replaced = tx.execute(
            "DELETE FROM reviews WHERE guild_id = ?1 AND reviewer_id = ?2 AND target_id = ?3",
            params![guild_id, reviewer_id, target_id],
        )? > 0;

        tx.execute(
            "INSERT INTO reviews (guild_id, reviewer_id, target_id, rating, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![guild_id, reviewer_id, target_id, rating, comment, now()],
        )?;
        tx.commit()?;

        Ok(replaced)
    }

    pub fn review_summary(
        &self,
        guild_id: DiscordId,
        target_id: DiscordId,
    ) -> Result<ReviewSummary, BotError> {
        let conn = self.conn()?;
        let summary = conn.query_row(
            "SELECT COALESCE(AVG(rating), 0.0), COUNT(*) FROM reviews
             WHERE guild_id = ?1 AND target_id = ?2",
            params![guild_id, target_id],
            |row| {
                Ok(ReviewSummary {
                    average: row.get(0)?,
                    count: row.get(1)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// Newest first.
    pub fn recent_reviews(
        &self,
        guild_id: DiscordId,
        target_id: DiscordId,
        limit: u32,
    ) -> Result<Vec<Review>, BotError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT reviewer_id, target_id, rating, comment, created_at FROM reviews
             WHERE guild_id = ?1 AND target_id = ?2
             ORDER BY created_at DESC, rowid DESC LIMIT ?3",
        )?;

        let reviews = stmt
            .query_map(params![guild_id, target_id, limit], |row| {
                Ok(Review {
                    reviewer_id: row.get(0)?,
                    target_id: row.get(1)?,
                    rating: row.get(2)?,
                    comment: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    /// Highest average first; ties go to more reviews, then the lower user id.
    pub fn review_leaderboard(
        &self,
        guild_id: DiscordId,
        limit: u32,
    ) -> Result<Vec<LeaderboardEntry>, BotError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT target_id, AVG(rating) AS average, COUNT(*) AS total FROM reviews
             WHERE guild_id = ?1
             GROUP BY target_id
             ORDER BY average DESC, total DESC, target_id ASC
             LIMIT ?2",
        )?;

        let entries = stmt
            .query_map(params![guild_id, limit], |row| {
                Ok(LeaderboardEntry {
                    user_id: row.get(0)?,
                    average: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_self_review_and_bad_rating() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.upsert_review(1, 10, 10, 5, None),
            Err(BotError::SelfReview)
        ));
        assert!(matches!(
            db.upsert_review(1, 10, 11, 6, None),
            Err(BotError::InvalidRating(6))
        ));
        assert!(matches!(
            db.upsert_review(1, 10, 11, 0, None),
            Err(BotError::InvalidRating(0))
        ));
    }

    #[test]
    fn second_review_replaces_first() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.upsert_review(1, 10, 20, 2, Some("meh")).unwrap());
        assert!(db.upsert_review(1, 10, 20, 5, Some("great")).unwrap());

        let summary = db.review_summary(1, 20).unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.average, 5.0);

        let recent = db.recent_reviews(1, 20, 5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].comment.as_deref(), Some("great"));
    }

    #[test]
    fn summary_of_unreviewed_user_is_empty() {
        let db = Database::open_in_memory().unwrap();
        let summary = db.review_summary(1, 20).unwrap();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average, 0.0);
    }

    #[test]
    fn recent_reviews_are_newest_first_and_limited() {
        let db = Database::open_in_memory().unwrap();
        for reviewer in 1..=7 {
            db.upsert_review(1, reviewer, 50, 3, None).unwrap();
        }

        let recent = db.recent_reviews(1, 50, 5).unwrap();
        let reviewers: Vec<_> = recent.iter().map(|r| r.reviewer_id).collect();
        assert_eq!(reviewers, vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn leaderboard_orders_by_average_then_count_then_id() {
        let db = Database::open_in_memory().unwrap();
        // user 100: avg 4.5 over 2
        db.upsert_review(1, 1, 100, 4, None).unwrap();
        db.upsert_review(1, 2, 100, 5, None).unwrap();
        // user 200: avg 5 over 1
        db.upsert_review(1, 1, 200, 5, None).unwrap();
        // user 300: avg 4.5 over 4
        for (reviewer, rating) in [(1, 5), (2, 4), (3, 5), (4, 4)] {
            db.upsert_review(1, reviewer, 300, rating, None).unwrap();
        }
        // user 50: avg 5 over 1, lower id than 200
        db.upsert_review(1, 3, 50, 5, None).unwrap();
        // other guild does not count
        db.upsert_review(2, 1, 999, 5, None).unwrap();

        let board = db.review_leaderboard(1, 10).unwrap();
        let order: Vec<_> = board.iter().map(|e| e.user_id).collect();
        assert_eq!(order, vec![50, 200, 300, 100]);
        assert_eq!(board[2].count, 4);
    }
}
