//! Scores of the who-said game.
//!
//! Points are kept per table (`normal`, `story`) and user. The combined ranking
//! shortlists each table before summing so that a single table cannot flood it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::games::{GameError, store::JsonFile};

/// Number of top scorers shortlisted from each table for the combined ranking.
const SHORTLIST_SIZE: usize = 5;

/// Table name of combined entries.
pub const COMBINED_TABLE: &str = "combined";

/// Accumulated score of a user in one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub mode: String,
    pub username: String,
    pub score: f64,
}

pub struct LeaderboardStore {
    rows: Mutex<Vec<LeaderboardEntry>>,
    file: JsonFile,
}

impl LeaderboardStore {
    /// Creates the store and loads its rows from `path`.
    pub async fn new(path: String) -> Self {
        let file = JsonFile::new(path);
        let rows = file.load().await;

        LeaderboardStore {
            rows: Mutex::new(rows),
            file,
        }
    }

    /// Adds `points` to the score of `username` in table `mode`, creating the row
    /// if needed.
    ///
    /// # Returns
    ///
    /// The new score.
    pub async fn award(&self, mode: &str, username: &str, points: f64) -> f64 {
        let mut rows = self.rows.lock().await;

        match rows
            .iter_mut()
            .find(|row| row.mode == mode && row.username == username)
        {
            Some(row) => {
                row.score += points;
                row.score
            }
            None => {
                rows.push(LeaderboardEntry {
                    mode: mode.to_string(),
                    username: username.to_string(),
                    score: points,
                });
                points
            }
        }
    }

    /// Best `n` entries of table `mode`, or of the combined ranking when `mode` is
    /// `None`.
    pub async fn top(&self, mode: Option<&str>, n: usize) -> Vec<LeaderboardEntry> {
        let rows = self.rows.lock().await;

        match mode {
            Some(mode) => {
                let mut table: Vec<LeaderboardEntry> =
                    rows.iter().filter(|row| row.mode == mode).cloned().collect();
                sort_ranking(&mut table);
                table.truncate(n);
                table
            }
            None => combine_rankings(&rows, n),
        }
    }

    /// Writes the rows to disk.
    ///
    /// The rows stay locked during the write, so concurrent awards and writes
    /// always leave the latest rows on disk.
    pub async fn persist(&self) -> Result<(), GameError> {
        let rows = self.rows.lock().await;
        self.file.persist(&*rows).await
    }
}

/// Sorts by score descending, then username ascending.
fn sort_ranking(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.username.cmp(&b.username))
    });
}

/// Builds the combined ranking of all tables.
///
/// From each table the top [`SHORTLIST_SIZE`] entries and the lowest scorer are
/// kept. The kept scores are summed per user and the best `n` users returned.
pub fn combine_rankings(rows: &[LeaderboardEntry], n: usize) -> Vec<LeaderboardEntry> {
    let modes: BTreeSet<&str> = rows.iter().map(|row| row.mode.as_str()).collect();
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();

    for mode in modes {
        let mut table: Vec<LeaderboardEntry> =
            rows.iter().filter(|row| row.mode == mode).cloned().collect();
        sort_ranking(&mut table);

        let lowest = table.last().cloned();
        table.truncate(SHORTLIST_SIZE);
        if let Some(lowest) = lowest {
            if !table.iter().any(|row| row.username == lowest.username) {
                table.push(lowest);
            }
        }

        for row in table {
            *totals.entry(row.username).or_insert(0.0) += row.score;
        }
    }

    let mut combined: Vec<LeaderboardEntry> = totals
        .into_iter()
        .map(|(username, score)| LeaderboardEntry {
            mode: COMBINED_TABLE.to_string(),
            username,
            score,
        })
        .collect();
    sort_ranking(&mut combined);
    combined.truncate(n);
    combined
}
