use chrono_tz::Tz;

use crate::dates::{kickoff_in_zone, match_day};
use crate::error::ParseError;
use crate::event_docs::{
    EventDocument, EventInfo, LineupDocument, OddsDocument, PlayerStatDocument, TeamInfo,
    TeamSheet,
};
use crate::odds_normalize::normalize_odds;
use crate::records::{
    ManagerRecord, MatchRecord, MatchStatisticRecord, OddsRecord, PlayerLineupRecord, PlayerRef,
    PlayerStatRecord, Record, RefereeRecord, SeasonRecord, StadiumRecord, TeamLineupRecord,
    TeamRecord, TournamentRecord,
};
use crate::stats_normalize::{match_blobs, normalize_player_stats};

/// A player listed on either team sheet of a match, in sheet order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineupPlayer {
    pub match_id: u64,
    pub team_id: u64,
    pub player_id: u64,
}

/// Records of one match plus the players whose statistics still have to be fetched.
#[derive(Debug, Default)]
pub struct NormalizedMatch {
    pub records: Vec<Record>,
    pub players: Vec<LineupPlayer>,
}

fn event_info<'a>(doc: &'a EventDocument) -> Result<&'a EventInfo, ParseError> {
    doc.event
        .as_ref()
        .ok_or_else(|| ParseError::missing("event", "event"))
}

pub fn tournament_record(event: &EventInfo) -> Option<TournamentRecord> {
    let tournament = event.tournament.as_ref()?;
    Some(TournamentRecord {
        tournament_id: tournament.unique_id?,
        tournament_name: tournament.name.clone().unwrap_or_default(),
        tournament_short: tournament.slug.clone(),
    })
}

pub fn season_record(event: &EventInfo) -> Option<SeasonRecord> {
    let season = event.season.as_ref()?;
    Some(SeasonRecord {
        season_id: season.id?,
        season_year: season.year.clone(),
        season_name: season.name.clone(),
        season_slug: season.slug.clone(),
    })
}

pub fn team_record(team: &TeamInfo) -> Option<TeamRecord> {
    Some(TeamRecord {
        team_id: team.id?,
        team_name: team.name.clone().unwrap_or_default(),
        team_slug: team.slug.clone(),
        team_short: team.short_name.clone(),
    })
}

pub fn referee_record(event: &EventInfo) -> Option<RefereeRecord> {
    let referee = event.referee.as_ref()?;
    Some(RefereeRecord {
        referee_id: referee.id?,
        referee_name: referee.name.clone().unwrap_or_default(),
        yellow_card_per_game: referee.yellow_cards_per_game,
        red_card_per_game: referee.red_cards_per_game,
    })
}

pub fn stadium_record(event: &EventInfo) -> Option<StadiumRecord> {
    let venue = event.venue.as_ref()?;
    Some(StadiumRecord {
        stadium_id: venue.id?,
        country: venue.country_name().map(str::to_string),
        city: venue.city_name().map(str::to_string),
        name: venue.stadium_name().map(str::to_string),
        capacity: venue.capacity(),
    })
}

pub fn match_record(doc: &EventDocument, zone: Tz) -> Result<MatchRecord, ParseError> {
    let event = event_info(doc)?;
    let match_id = event.id.ok_or_else(|| ParseError::missing("event", "id"))?;
    let tournament_id = doc
        .unique_tournament_id()
        .ok_or_else(|| ParseError::missing("event", "tournament.uniqueId"))?;
    let home_team_id = doc
        .home_team_id()
        .ok_or_else(|| ParseError::missing("event", "homeTeam.id"))?;
    let away_team_id = doc
        .away_team_id()
        .ok_or_else(|| ParseError::missing("event", "awayTeam.id"))?;
    let full_date = kickoff_in_zone(
        event.start_timestamp,
        event.formatted_start_date.as_deref(),
        event.start_time.as_deref(),
        zone,
    );
    Ok(MatchRecord {
        match_id,
        tournament_id,
        season_id: event.season.as_ref().and_then(|s| s.id),
        match_date: match_day(event.start_timestamp, event.formatted_start_date.as_deref()),
        full_date,
        match_status: event.status.as_ref().and_then(|s| s.kind.clone()),
        home_team_id,
        away_team_id,
        referee_id: event.referee.as_ref().and_then(|r| r.id),
        stadium_id: event.venue.as_ref().and_then(|v| v.id),
    })
}

pub fn odds_record(match_id: u64, doc: &OddsDocument) -> OddsRecord {
    let odds = normalize_odds(doc);
    OddsRecord {
        match_id,
        primary_odds: (!odds.is_empty()).then_some(odds),
        feed_odds: None,
    }
}

pub fn statistic_record(match_id: u64, doc: &EventDocument) -> MatchStatisticRecord {
    let blobs = match_blobs(doc);
    let event = doc.event.as_ref();
    MatchStatisticRecord {
        match_id,
        primary_statistics: blobs.statistics,
        feed_statistics: None,
        forms: blobs.forms,
        votes: blobs.votes,
        manager_duels: blobs.manager_duels,
        h2h: blobs.h2h,
        home_score: event
            .and_then(|e| e.home_score.as_ref())
            .and_then(|s| s.current),
        away_score: event
            .and_then(|e| e.away_score.as_ref())
            .and_then(|s| s.current),
    }
}

fn sheet_records(
    match_id: u64,
    team_id: u64,
    sheet: &TeamSheet,
    records: &mut Vec<Record>,
    players: &mut Vec<LineupPlayer>,
) {
    let manager_id = sheet.manager.as_ref().and_then(|m| m.id);
    if let Some(manager) = sheet.manager.as_ref() {
        if let (Some(id), Some(name)) = (manager.id, manager.name.as_ref()) {
            records.push(
                ManagerRecord {
                    manager_id: id,
                    manager_name: name.clone(),
                }
                .into(),
            );
        }
    }
    records.push(
        TeamLineupRecord {
            match_id,
            team_id,
            formation: sheet.formation.clone(),
            manager_id,
        }
        .into(),
    );

    for (slot, entry) in sheet.players.iter().enumerate() {
        let Some(player) = entry.player.as_ref() else {
            continue;
        };
        let Some(player_id) = player.id else {
            continue;
        };
        records.push(
            PlayerRef {
                primary_player_id: player_id,
                secondary_player_id: None,
                full_name: player.name.clone().unwrap_or_default(),
                slug: player.slug.clone(),
                short_name: player.short_name.clone(),
                birth_date: None,
                height: player.height.and_then(|h| u32::try_from(h).ok()),
            }
            .into(),
        );
        records.push(
            PlayerLineupRecord {
                match_id,
                team_id,
                primary_player_id: player_id,
                position_long: entry.position_name.clone(),
                position_short: entry.position_short.clone(),
                rating: entry.rating,
                substitute: entry.substitute,
                slot,
            }
            .into(),
        );
        players.push(LineupPlayer {
            match_id,
            team_id,
            player_id,
        });
    }
}

/// Every record of one match except player statistics.
///
/// Tournament, season and teams are emitted before the lineup check. Without both team
/// sheets the rest of the match is left out.
pub fn normalize_match(
    event: &EventDocument,
    lineups: Option<&LineupDocument>,
    odds: Option<&OddsDocument>,
    zone: Tz,
) -> Result<NormalizedMatch, ParseError> {
    let info = event_info(event)?;
    let mut out = NormalizedMatch::default();

    if let Some(tournament) = tournament_record(info) {
        out.records.push(tournament.into());
    }
    if let Some(season) = season_record(info) {
        out.records.push(season.into());
    }
    for team in [info.home_team.as_ref(), info.away_team.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(team_record)
    {
        out.records.push(team.into());
    }

    let Some((home, away)) = lineups.and_then(LineupDocument::sides) else {
        return Ok(out);
    };

    let record = match_record(event, zone)?;
    let match_id = record.match_id;
    let (home_team_id, away_team_id) = (record.home_team_id, record.away_team_id);

    if let Some(stadium) = stadium_record(info) {
        out.records.push(stadium.into());
    }
    if let Some(referee) = referee_record(info) {
        out.records.push(referee.into());
    }
    out.records.push(record.into());
    if let Some(odds) = odds {
        out.records.push(odds_record(match_id, odds).into());
    }
    out.records.push(statistic_record(match_id, event).into());

    sheet_records(match_id, home_team_id, home, &mut out.records, &mut out.players);
    sheet_records(match_id, away_team_id, away, &mut out.records, &mut out.players);
    Ok(out)
}

/// Statistics row for one lineup player. Ids in the document win over the requested ones.
pub fn player_stat_record(player: &LineupPlayer, doc: &PlayerStatDocument) -> PlayerStatRecord {
    let has_primary_stat = doc.group_count() > 0;
    PlayerStatRecord {
        primary_player_id: doc.player_id().unwrap_or(player.player_id),
        match_id: doc.match_id().unwrap_or(player.match_id),
        primary_stat: has_primary_stat.then(|| normalize_player_stats(doc)),
        secondary_stat: None,
        has_primary_stat,
        has_secondary_stat: false,
    }
}

/// Row kept for a player whose statistics page could not be read.
pub fn empty_player_stat_record(player: &LineupPlayer) -> PlayerStatRecord {
    PlayerStatRecord {
        primary_player_id: player.player_id,
        match_id: player.match_id,
        primary_stat: None,
        secondary_stat: None,
        has_primary_stat: false,
        has_secondary_stat: false,
    }
}
