use std::collections::HashMap;
use std::time::Instant;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::executor::Executor;
use crate::primary_fetch::PrimarySource;
use crate::reconcile::{IdentityReconciler, PlayerIdentity, Resolution};
use crate::records::{
    Blob, PlayerBirthdateUpdate, Record, SecondaryCheckedUpdate, SecondaryIdUpdate,
    SecondaryStatUpdate,
};
use crate::secondary_fetch::{RatingSnapshot, SecondarySource};
use crate::store::{MatchAppearance, PendingPlayer, pending_players};

/// Pairs each match with the ratings in force on its date.
///
/// Snapshots are walked newest first with the upper bound starting at `today`. A snapshot
/// dated `d` covers matches strictly between `d` and the bound, then the bound moves to `d`.
pub fn assign_snapshots(
    snapshots: &[RatingSnapshot],
    matches: &[MatchAppearance],
    today: NaiveDate,
) -> Vec<(u64, Blob)> {
    let mut ordered: Vec<&RatingSnapshot> = snapshots.iter().collect();
    ordered.sort_by(|a, b| b.date.cmp(&a.date));

    let mut assigned = Vec::new();
    let mut upper = today;
    for snapshot in ordered {
        for appearance in matches {
            if snapshot.date < appearance.match_date && appearance.match_date < upper {
                assigned.push((appearance.match_id, snapshot.stats.clone()));
            }
        }
        upper = snapshot.date;
    }
    assigned
}

pub struct RatingsRun<'a, P: ?Sized, S: ?Sized> {
    primary: &'a P,
    secondary: &'a S,
    aliases: &'a HashMap<String, u64>,
    executor: &'a Executor,
    today: NaiveDate,
}

impl<'a, P, S> RatingsRun<'a, P, S>
where
    P: PrimarySource + ?Sized,
    S: SecondarySource + ?Sized,
{
    pub fn new(
        primary: &'a P,
        secondary: &'a S,
        aliases: &'a HashMap<String, u64>,
        executor: &'a Executor,
    ) -> Self {
        Self {
            primary,
            secondary,
            aliases,
            executor,
            today: Local::now().date_naive(),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Loads up to `limit` unchecked players from the store and rates them.
    pub fn fetch_ratings(&self, conn: &Connection, limit: usize) -> Result<Vec<Record>> {
        let players = pending_players(conn, limit)?;
        Ok(self.rate_players(&players))
    }

    pub fn rate_players(&self, players: &[PendingPlayer]) -> Vec<Record> {
        let started = Instant::now();
        let records = self
            .executor
            .run_chunked(players, |player| self.rate_player(player));
        info!(
            players = players.len(),
            records = records.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "ratings run finished"
        );
        records
    }

    fn rate_player(&self, player: &PendingPlayer) -> Vec<Record> {
        let id = player.primary_player_id;
        let mut out = Vec::new();

        let secondary_id = match player.secondary_player_id {
            Some(known) => Some(known),
            None => {
                let mut birth_date = player.birth_date;
                if birth_date.is_none() {
                    match self.primary.player_birthdate(id) {
                        Ok(Some(found)) => {
                            out.push(
                                PlayerBirthdateUpdate {
                                    primary_player_id: id,
                                    birth_date: found,
                                }
                                .into(),
                            );
                            birth_date = Some(found);
                        }
                        Ok(None) => debug!(player = id, "no birth date on player page"),
                        Err(err) => warn!(player = id, error = %err, "birth date lookup failed"),
                    }
                }
                let identity = PlayerIdentity {
                    full_name: Some(player.full_name.as_str()),
                    short_name: player.short_name.as_deref(),
                    birth_date,
                };
                let resolution = IdentityReconciler::new(self.secondary, self.aliases).resolve(&identity);
                if let Resolution::Unresolved(reason) = &resolution {
                    debug!(player = id, ?reason, "secondary identity unresolved");
                }
                resolution.secondary_id()
            }
        };

        if let Some(secondary_id) = secondary_id {
            if player.secondary_player_id.is_none() {
                out.push(
                    SecondaryIdUpdate {
                        primary_player_id: id,
                        secondary_player_id: secondary_id,
                    }
                    .into(),
                );
            }
            match self.secondary.rating_history(secondary_id) {
                Ok(snapshots) => {
                    for (match_id, stats) in assign_snapshots(&snapshots, &player.matches, self.today)
                    {
                        out.push(
                            SecondaryStatUpdate {
                                primary_player_id: id,
                                match_id,
                                secondary_stat: stats,
                            }
                            .into(),
                        );
                    }
                }
                Err(err) => warn!(player = id, secondary_id, error = %err, "rating history failed"),
            }
        }

        out.push(
            SecondaryCheckedUpdate {
                primary_player_id: id,
                has_secondary_stat: false,
            }
            .into(),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn snapshot(date: (i32, u32, u32), overall: i64) -> RatingSnapshot {
        let mut stats = Blob::new();
        stats.insert("Overall".to_string(), Value::from(overall));
        RatingSnapshot {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("date"),
            stats,
        }
    }

    fn appearance(match_id: u64, date: (i32, u32, u32)) -> MatchAppearance {
        MatchAppearance {
            match_id,
            match_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("date"),
        }
    }

    #[test]
    fn matches_get_the_snapshot_in_force() {
        let snapshots = vec![snapshot((2019, 1, 10), 70), snapshot((2019, 3, 1), 75)];
        let matches = vec![
            appearance(1, (2019, 1, 5)),
            appearance(2, (2019, 2, 1)),
            appearance(3, (2019, 3, 1)),
            appearance(4, (2019, 4, 1)),
        ];
        let today = NaiveDate::from_ymd_opt(2019, 5, 1).expect("date");
        let assigned = assign_snapshots(&snapshots, &matches, today);
        let overall: Vec<(u64, Option<i64>)> = assigned
            .iter()
            .map(|(id, stats)| (*id, stats.get("Overall").and_then(Value::as_i64)))
            .collect();
        assert_eq!(overall, vec![(4, Some(75)), (2, Some(70))]);
    }
}
