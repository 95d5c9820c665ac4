#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;

use matchday_miner::error::{FetchError, SourceResult};
use matchday_miner::event_docs::{
    DayListing, EventDocument, IdRef, LineupDocument, OddsDocument, PlayerStatDocument,
    parse_day_listing_json, parse_event_json, parse_lineups_json, parse_odds_json,
    parse_player_stat_json,
};
use matchday_miner::primary_fetch::{PrimarySource, parse_player_birthdate_html};
use matchday_miner::secondary_fetch::{
    RatingSnapshot, SearchCandidate, SecondarySource, parse_changelog_html, parse_profile_html,
};

pub fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn not_found(url: String) -> FetchError {
    FetchError::Http { url, status: 404 }
}

pub const KEEPERS: &[u64] = &[100, 200, 300, 400];
pub const LISTED_DAY: (i32, u32, u32) = (2019, 8, 11);

/// Primary source serving the fixture documents.
///
/// Events 1001 and 2002 are known. Only 1001 has odds. Goalkeepers get the keeper stat page,
/// everyone else the outfield one, both re-keyed to the requested ids.
pub struct FixturePrimary {
    events: HashMap<u64, EventDocument>,
    lineups: HashMap<u64, LineupDocument>,
    odds: HashMap<u64, OddsDocument>,
    keeper_stats: PlayerStatDocument,
    outfield_stats: PlayerStatDocument,
    listing: DayListing,
    without_lineups: HashSet<u64>,
    failing_stats: HashSet<u64>,
    birthdate_page: String,
    birthdate_players: HashSet<u64>,
    pub stat_calls: AtomicUsize,
}

impl FixturePrimary {
    pub fn new() -> Self {
        let events = [
            (1001, parse_event_json(&read_fixture("event_match_a.json")).expect("event a")),
            (2002, parse_event_json(&read_fixture("event_match_b.json")).expect("event b")),
        ]
        .into_iter()
        .collect();
        let lineups = [
            (1001, parse_lineups_json(&read_fixture("lineups_a.json")).expect("lineups a")),
            (2002, parse_lineups_json(&read_fixture("lineups_b.json")).expect("lineups b")),
        ]
        .into_iter()
        .collect();
        let odds = [(1001, parse_odds_json(&read_fixture("odds.json")).expect("odds"))]
            .into_iter()
            .collect();
        Self {
            events,
            lineups,
            odds,
            keeper_stats: parse_player_stat_json(&read_fixture("player_stats_keeper.json"))
                .expect("keeper stats"),
            outfield_stats: parse_player_stat_json(&read_fixture("player_stats_outfield.json"))
                .expect("outfield stats"),
            listing: parse_day_listing_json(&read_fixture("day_listing.json")).expect("listing"),
            without_lineups: HashSet::new(),
            failing_stats: HashSet::new(),
            birthdate_page: read_fixture("sofa_player.html"),
            birthdate_players: HashSet::new(),
            stat_calls: AtomicUsize::new(0),
        }
    }

    pub fn without_lineups(mut self, event_id: u64) -> Self {
        self.without_lineups.insert(event_id);
        self
    }

    pub fn failing_stats(mut self, player_id: u64) -> Self {
        self.failing_stats.insert(player_id);
        self
    }

    pub fn with_birthdate_page(mut self, player_id: u64) -> Self {
        self.birthdate_players.insert(player_id);
        self
    }
}

impl PrimarySource for FixturePrimary {
    fn day_listing(&self, date: NaiveDate) -> SourceResult<DayListing> {
        let (y, m, d) = LISTED_DAY;
        if date == ymd(y, m, d) {
            Ok(self.listing.clone())
        } else {
            Ok(DayListing::default())
        }
    }

    fn event(&self, event_id: u64) -> SourceResult<EventDocument> {
        self.events
            .get(&event_id)
            .cloned()
            .ok_or_else(|| not_found(format!("event/{event_id}")).into())
    }

    fn lineups(&self, event_id: u64) -> SourceResult<LineupDocument> {
        if self.without_lineups.contains(&event_id) {
            return Ok(LineupDocument::default());
        }
        self.lineups
            .get(&event_id)
            .cloned()
            .ok_or_else(|| not_found(format!("lineups/{event_id}")).into())
    }

    fn odds(&self, event_id: u64) -> SourceResult<OddsDocument> {
        self.odds
            .get(&event_id)
            .cloned()
            .ok_or_else(|| not_found(format!("odds/{event_id}")).into())
    }

    fn player_statistics(
        &self,
        event_id: u64,
        player_id: u64,
    ) -> SourceResult<PlayerStatDocument> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_stats.contains(&player_id) {
            return Err(FetchError::Timeout {
                url: format!("stats/{event_id}/{player_id}"),
                attempts: 4,
            }
            .into());
        }
        let mut doc = if KEEPERS.contains(&player_id) {
            self.keeper_stats.clone()
        } else {
            self.outfield_stats.clone()
        };
        doc.event_data = Some(IdRef { id: Some(event_id) });
        doc.player = Some(IdRef { id: Some(player_id) });
        Ok(doc)
    }

    fn player_birthdate(&self, player_id: u64) -> SourceResult<Option<NaiveDate>> {
        if self.birthdate_players.contains(&player_id) {
            Ok(parse_player_birthdate_html(&self.birthdate_page)?)
        } else {
            Ok(None)
        }
    }
}

/// Secondary source with one known player: the fixture profile, id 158023.
pub struct FixtureSecondary {
    names: HashMap<String, Vec<u64>>,
    pub searches: AtomicUsize,
    pub histories: AtomicUsize,
}

pub const SECONDARY_ID: u64 = 158023;

impl FixtureSecondary {
    pub fn new() -> Self {
        let names = [("Lionel Messi".to_string(), vec![SECONDARY_ID])]
            .into_iter()
            .collect();
        Self {
            names,
            searches: AtomicUsize::new(0),
            histories: AtomicUsize::new(0),
        }
    }
}

impl SecondarySource for FixtureSecondary {
    fn search_players(&self, name: &str) -> SourceResult<Vec<SearchCandidate>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .names
            .get(name)
            .map(|ids| ids.iter().copied().map(SearchCandidate::new).collect())
            .unwrap_or_default())
    }

    fn profile_birthdate(&self, _candidate: &SearchCandidate) -> SourceResult<Option<NaiveDate>> {
        Ok(Some(ymd(1987, 6, 24)))
    }

    fn rating_history(&self, secondary_id: u64) -> SourceResult<Vec<RatingSnapshot>> {
        self.histories.fetch_add(1, Ordering::SeqCst);
        if secondary_id != SECONDARY_ID {
            return Ok(Vec::new());
        }
        let profile = parse_profile_html(&read_fixture("fifa_profile.html"))?;
        Ok(parse_changelog_html(
            &read_fixture("fifa_changelog.html"),
            &profile.stats,
        )?)
    }
}
