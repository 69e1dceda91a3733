use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{Leaderboard, LeaderboardEntry, LeaderboardResult};
use crate::db::models::UserId;

/// Process-local ranking map. Reads share the lock; writes take it
/// exclusively. Ties on points break by ascending user id so that identical
/// inputs always rank identically.
#[derive(Debug, Default)]
pub struct MemoryLeaderboard {
    scores: RwLock<HashMap<i64, i64>>,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Leaderboard for MemoryLeaderboard {
    async fn record_score(&self, user: UserId, total: i64) -> LeaderboardResult<()> {
        let mut scores = self.scores.write().expect("leaderboard lock poisoned");
        scores.insert(user.0, total);
        Ok(())
    }

    async fn top(&self, limit: i64) -> LeaderboardResult<Vec<LeaderboardEntry>> {
        let scores = self.scores.read().expect("leaderboard lock poisoned");

        let mut entries: Vec<(i64, i64)> = scores.iter().map(|(id, pts)| (*id, *pts)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        if limit > 0 {
            entries.truncate(limit as usize);
        }

        Ok(entries
            .into_iter()
            .map(|(id, points)| LeaderboardEntry {
                user_id: UserId(id),
                points,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn orders_by_points_descending() {
        let lb = MemoryLeaderboard::new();
        lb.record_score(UserId(1), 50).await.unwrap();
        lb.record_score(UserId(2), 200).await.unwrap();
        lb.record_score(UserId(3), 120).await.unwrap();

        let top = lb.top(10).await.unwrap();
        let ids: Vec<i64> = top.iter().map(|e| e.user_id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn last_write_wins_for_a_user() {
        let lb = MemoryLeaderboard::new();
        lb.record_score(UserId(7), 10).await.unwrap();
        lb.record_score(UserId(7), 90).await.unwrap();

        let top = lb.top(1).await.unwrap();
        assert_eq!(top[0].points, 90);
    }

    #[tokio::test]
    async fn ties_break_by_ascending_user_id() {
        let lb = MemoryLeaderboard::new();
        lb.record_score(UserId(9), 100).await.unwrap();
        lb.record_score(UserId(4), 100).await.unwrap();
        lb.record_score(UserId(6), 100).await.unwrap();

        let top = lb.top(10).await.unwrap();
        let ids: Vec<i64> = top.iter().map(|e| e.user_id.0).collect();
        assert_eq!(ids, vec![4, 6, 9]);
    }

    #[tokio::test]
    async fn limit_truncates() {
        let lb = MemoryLeaderboard::new();
        for id in 1..=5 {
            lb.record_score(UserId(id), id * 10).await.unwrap();
        }

        assert_eq!(lb.top(2).await.unwrap().len(), 2);
    }
}
