//! Leaderboard registry
//!
//! Append-only log of every model that completed bagging, written
//! concurrently by family search loops and read back as ranked snapshots.
//! The registry serializes its own writes; readers never block writers for
//! longer than one push.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::metric::MetricKind;

/// One completed model on the leaderboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Registration id (deterministic: level, then family order, then
    /// proposal order)
    pub model_id: usize,
    /// Model family name
    pub family: String,
    /// Stack level
    pub level: usize,
    /// Signed validation score (higher is better)
    pub score: f64,
    /// Metric behind the score
    pub metric: MetricKind,
    /// Raw metric value in its natural sign, for display
    pub metric_value: f64,
    /// Total fit time across fold and refit trials
    pub fit_duration: Duration,
    /// Largest single-trial memory reservation, in MiB
    pub peak_memory_mb: u64,
    /// Number of trials behind the model (folds x sets + refit)
    pub num_trials: usize,
    /// Position in overall training order
    pub fit_order: usize,
}

/// Append-only, internally synchronized leaderboard
#[derive(Debug, Default)]
pub struct Leaderboard {
    entries: Mutex<Vec<LeaderboardEntry>>,
}

impl Leaderboard {
    /// Empty leaderboard
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry
    pub fn push(&self, entry: LeaderboardEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(entry);
    }

    /// Number of entries so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the leaderboard is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy of all entries in append order
    ///
    /// Restartable: each call takes a fresh snapshot, so iteration can be
    /// restarted while other components keep appending.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LeaderboardEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Ranked view: score descending, ties broken by ascending model id
    ///
    /// The tie-break must not involve measured wall-clock time: models with
    /// exactly equal scores would otherwise rank by timing noise and reruns
    /// of a seeded run would produce different leaderboards.
    #[must_use]
    pub fn ranked(&self) -> Vec<LeaderboardEntry> {
        let mut entries = self.snapshot();
        entries.sort_by(|a, b| {
            b.score.total_cmp(&a.score).then_with(|| a.model_id.cmp(&b.model_id))
        });
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(model_id: usize, score: f64, millis: u64) -> LeaderboardEntry {
        LeaderboardEntry {
            model_id,
            family: "gbm".to_string(),
            level: 0,
            score,
            metric: MetricKind::Mse,
            metric_value: -score,
            fit_duration: Duration::from_millis(millis),
            peak_memory_mb: 64,
            num_trials: 6,
            fit_order: model_id,
        }
    }

    #[test]
    fn test_ranked_sorts_by_score_descending() {
        let board = Leaderboard::new();
        board.push(entry(0, -2.0, 10));
        board.push(entry(1, -0.5, 10));
        board.push(entry(2, -1.0, 10));

        let ranked = board.ranked();
        let ids: Vec<usize> = ranked.iter().map(|e| e.model_id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
    }

    #[test]
    fn test_ties_broken_by_model_id_not_duration() {
        let board = Leaderboard::new();
        // The slower fit has the lower id; duration must not affect rank
        board.push(entry(0, -1.0, 500));
        board.push(entry(1, -1.0, 100));

        let ranked = board.ranked();
        assert_eq!(ranked[0].model_id, 0);
        assert_eq!(ranked[1].model_id, 1);
    }

    #[test]
    fn test_ranked_is_deterministic_for_tied_scores() {
        // Same entries pushed in different orders rank identically
        let a = Leaderboard::new();
        a.push(entry(2, -1.0, 300));
        a.push(entry(0, -1.0, 100));
        a.push(entry(1, -0.5, 900));

        let b = Leaderboard::new();
        b.push(entry(0, -1.0, 100));
        b.push(entry(1, -0.5, 900));
        b.push(entry(2, -1.0, 300));

        let ids_a: Vec<usize> = a.ranked().iter().map(|e| e.model_id).collect();
        let ids_b: Vec<usize> = b.ranked().iter().map(|e| e.model_id).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(ids_a, vec![1, 0, 2]);
    }

    #[test]
    fn test_snapshot_preserves_append_order() {
        let board = Leaderboard::new();
        board.push(entry(3, -1.0, 1));
        board.push(entry(1, -2.0, 1));
        let snapshot = board.snapshot();
        assert_eq!(snapshot[0].model_id, 3);
        assert_eq!(snapshot[1].model_id, 1);
    }

    #[test]
    fn test_concurrent_appends_all_land() {
        use std::sync::Arc;
        let board = Arc::new(Leaderboard::new());
        let mut handles = Vec::new();
        for worker in 0..4 {
            let board = Arc::clone(&board);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    board.push(entry(worker * 50 + i, -(i as f64), 1));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker");
        }
        assert_eq!(board.len(), 200);
    }

    #[test]
    fn test_entry_roundtrip() {
        let e = entry(7, -0.25, 42);
        let json = serde_json::to_string(&e).expect("serialize");
        let back: LeaderboardEntry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.model_id, 7);
        assert_eq!(back.metric, MetricKind::Mse);
    }
}
