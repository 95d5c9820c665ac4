use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::dates::date_interval;
use crate::event_docs::DayListing;
use crate::executor::Executor;
use crate::normalize::{empty_player_stat_record, normalize_match, player_stat_record};
use crate::primary_fetch::PrimarySource;
use crate::reconcile::{IdentityReconciler, PlayerIdentity};
use crate::records::Record;
use crate::secondary_fetch::SecondarySource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWork {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWork {
    pub event_id: u64,
}

/// Secondary lookups done while players are first seen.
pub struct InlineReconcile<'a> {
    pub source: &'a dyn SecondarySource,
    pub aliases: &'a HashMap<String, u64>,
}

/// Event ids of the listed tournaments, in listing order. An empty filter keeps everything.
pub fn listed_event_ids(listing: &DayListing, tournaments: &HashSet<u64>) -> Vec<u64> {
    let mut ids = Vec::new();
    for tournament in listing.tournaments() {
        let keep = tournaments.is_empty()
            || tournament
                .unique_id()
                .is_some_and(|id| tournaments.contains(&id));
        if !keep {
            debug!(tournament = tournament.name(), "tournament not configured");
            continue;
        }
        ids.extend(tournament.event_ids());
    }
    ids
}

pub struct MatchOrchestrator<'a, P: ?Sized> {
    primary: &'a P,
    executor: &'a Executor,
    tournaments: HashSet<u64>,
    zone: Tz,
    inline: Option<InlineReconcile<'a>>,
}

impl<'a, P: PrimarySource + ?Sized> MatchOrchestrator<'a, P> {
    pub fn new(primary: &'a P, executor: &'a Executor, tournaments: HashSet<u64>, zone: Tz) -> Self {
        Self {
            primary,
            executor,
            tournaments,
            zone,
            inline: None,
        }
    }

    pub fn with_inline_reconcile(mut self, inline: InlineReconcile<'a>) -> Self {
        self.inline = Some(inline);
        self
    }

    /// Every record of every configured match played from `start` to `end` inclusive.
    pub fn fetch_dates(&self, start: NaiveDate, end: Option<NaiveDate>) -> Vec<Record> {
        let started = Instant::now();
        let days: Vec<DayWork> = date_interval(start, end)
            .into_iter()
            .map(|date| DayWork { date })
            .collect();
        let event_ids = self.executor.run_chunked(&days, |day| self.list_day(day));
        info!(
            days = days.len(),
            matches = event_ids.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "collected match ids"
        );
        self.fetch_matches(&event_ids)
    }

    pub fn fetch_matches(&self, event_ids: &[u64]) -> Vec<Record> {
        let started = Instant::now();
        let work: Vec<MatchWork> = event_ids
            .iter()
            .map(|&event_id| MatchWork { event_id })
            .collect();
        let records = self.executor.run_chunked(&work, |unit| self.fetch_match(unit));
        info!(
            matches = work.len(),
            records = records.len(),
            threads = self.executor.threads(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "fetched matches"
        );
        records
    }

    fn list_day(&self, day: &DayWork) -> Vec<u64> {
        match self.primary.day_listing(day.date) {
            Ok(listing) => listed_event_ids(&listing, &self.tournaments),
            Err(err) => {
                warn!(date = %day.date, error = %err, "day listing failed");
                Vec::new()
            }
        }
    }

    fn fetch_match(&self, unit: &MatchWork) -> Vec<Record> {
        let event_id = unit.event_id;
        let event = match self.primary.event(event_id) {
            Ok(event) => event,
            Err(err) => {
                warn!(event_id, error = %err, "event fetch failed");
                return Vec::new();
            }
        };
        let lineups = match self.primary.lineups(event_id) {
            Ok(doc) if doc.sides().is_some() => Some(doc),
            Ok(_) => {
                warn!(event_id, "event has no lineups");
                None
            }
            Err(err) => {
                warn!(event_id, error = %err, "lineup fetch failed");
                None
            }
        };
        let odds = match lineups {
            Some(_) => self
                .primary
                .odds(event_id)
                .map_err(|err| warn!(event_id, error = %err, "odds fetch failed"))
                .ok(),
            None => None,
        };

        let normalized = match normalize_match(&event, lineups.as_ref(), odds.as_ref(), self.zone) {
            Ok(normalized) => normalized,
            Err(err) => {
                warn!(event_id, error = %err, "event could not be normalized");
                return Vec::new();
            }
        };

        let mut records = normalized.records;
        if let Some(inline) = self.inline.as_ref() {
            self.reconcile_players(inline, &mut records);
        }
        for player in &normalized.players {
            let stat = match self
                .primary
                .player_statistics(player.match_id, player.player_id)
            {
                Ok(doc) => player_stat_record(player, &doc),
                Err(err) => {
                    warn!(
                        event_id,
                        player = player.player_id,
                        error = %err,
                        "player statistics fetch failed"
                    );
                    empty_player_stat_record(player)
                }
            };
            records.push(stat.into());
        }
        records
    }

    fn reconcile_players(&self, inline: &InlineReconcile<'_>, records: &mut [Record]) {
        let reconciler = IdentityReconciler::new(inline.source, inline.aliases);
        for record in records.iter_mut() {
            let Record::Player(player) = record else {
                continue;
            };
            let identity = PlayerIdentity {
                full_name: Some(player.full_name.as_str()),
                short_name: player.short_name.as_deref(),
                birth_date: player.birth_date,
            };
            player.secondary_player_id = reconciler.resolve(&identity).secondary_id();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_docs::parse_day_listing_json;

    #[test]
    fn listing_keeps_configured_tournaments() {
        let listing = parse_day_listing_json(
            r#"{"sportItem": {"tournaments": [
                {"tournament": {"uniqueId": 17, "name": "Premier League"}, "events": [{"id": 1}, {"id": 2}]},
                {"tournament": {"uniqueId": 999, "name": "Friendly"}, "events": [{"id": 3}]},
                {"tournament": null, "events": [{"id": 4}]}
            ]}}"#,
        )
        .expect("listing");
        let configured: HashSet<u64> = [17].into_iter().collect();
        assert_eq!(listed_event_ids(&listing, &configured), vec![1, 2]);
        assert_eq!(listed_event_ids(&listing, &HashSet::new()), vec![1, 2, 3, 4]);
    }
}
