use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};

/// Free-form JSON object stored as one column (odds, statistics, ratings).
pub type Blob = Map<String, Value>;

/// Allow-listed player statistics. Every allow-listed key is present, empty values are `None`.
pub type StatLine = BTreeMap<String, Option<i64>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TournamentRecord {
    pub tournament_id: u64,
    pub tournament_name: String,
    pub tournament_short: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonRecord {
    pub season_id: u64,
    pub season_year: Option<String>,
    pub season_name: Option<String>,
    pub season_slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRecord {
    pub team_id: u64,
    pub team_name: String,
    pub team_slug: Option<String>,
    pub team_short: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub match_id: u64,
    pub tournament_id: u64,
    pub season_id: Option<u64>,
    pub match_date: Option<NaiveDate>,
    /// Kick-off in the reference timezone.
    pub full_date: Option<DateTime<FixedOffset>>,
    pub match_status: Option<String>,
    pub home_team_id: u64,
    pub away_team_id: u64,
    pub referee_id: Option<u64>,
    pub stadium_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefereeRecord {
    pub referee_id: u64,
    pub referee_name: String,
    pub yellow_card_per_game: Option<f64>,
    pub red_card_per_game: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StadiumRecord {
    pub stadium_id: u64,
    pub country: Option<String>,
    pub city: Option<String>,
    pub name: Option<String>,
    pub capacity: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddsRecord {
    pub match_id: u64,
    pub primary_odds: Option<Blob>,
    pub feed_odds: Option<Blob>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchStatisticRecord {
    pub match_id: u64,
    pub primary_statistics: Option<Blob>,
    pub feed_statistics: Option<Blob>,
    pub forms: Option<Blob>,
    pub votes: Option<Blob>,
    pub manager_duels: Option<Blob>,
    pub h2h: Option<Blob>,
    pub home_score: Option<f64>,
    pub away_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamLineupRecord {
    pub match_id: u64,
    pub team_id: u64,
    pub formation: Option<String>,
    pub manager_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerRecord {
    pub manager_id: u64,
    pub manager_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerLineupRecord {
    pub match_id: u64,
    pub team_id: u64,
    pub primary_player_id: u64,
    pub position_long: Option<String>,
    pub position_short: Option<String>,
    pub rating: Option<f64>,
    pub substitute: bool,
    /// Position of the player inside the team sheet, starters first.
    pub slot: usize,
}

/// A player keyed by the primary-source id. The secondary id stays `None` until reconciled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRef {
    pub primary_player_id: u64,
    pub secondary_player_id: Option<u64>,
    pub full_name: String,
    pub slug: Option<String>,
    pub short_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStatRecord {
    pub primary_player_id: u64,
    pub match_id: u64,
    pub primary_stat: Option<StatLine>,
    pub secondary_stat: Option<Blob>,
    pub has_primary_stat: bool,
    pub has_secondary_stat: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerBirthdateUpdate {
    pub primary_player_id: u64,
    pub birth_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondaryIdUpdate {
    pub primary_player_id: u64,
    pub secondary_player_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondaryStatUpdate {
    pub primary_player_id: u64,
    pub match_id: u64,
    pub secondary_stat: Blob,
}

/// Marks every stat row of a player as looked up against the secondary source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondaryCheckedUpdate {
    pub primary_player_id: u64,
    pub has_secondary_stat: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedOddsUpdate {
    pub match_id: u64,
    pub feed_odds: Blob,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedStatisticUpdate {
    pub match_id: u64,
    pub feed_statistics: Blob,
    pub home_score: Option<f64>,
    pub away_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
    Tournament,
    Season,
    Team,
    Match,
    Referee,
    Stadium,
    Odds,
    MatchStatistic,
    TeamLineup,
    Manager,
    PlayerLineup,
    Player,
    PlayerStat,
    PlayerBirthdate,
    SecondaryId,
    SecondaryStat,
    SecondaryChecked,
    FeedOdds,
    FeedStatistic,
}

impl RecordKind {
    /// Table the record lands in. Update kinds share the table of the row they modify.
    pub fn table(self) -> &'static str {
        match self {
            RecordKind::Tournament => "tournaments",
            RecordKind::Season => "seasons",
            RecordKind::Team => "teams",
            RecordKind::Match => "matches",
            RecordKind::Referee => "referees",
            RecordKind::Stadium => "stadiums",
            RecordKind::Odds | RecordKind::FeedOdds => "odds",
            RecordKind::MatchStatistic | RecordKind::FeedStatistic => "statistics",
            RecordKind::TeamLineup => "team_lineups",
            RecordKind::Manager => "managers",
            RecordKind::PlayerLineup => "player_lineups",
            RecordKind::Player | RecordKind::PlayerBirthdate | RecordKind::SecondaryId => {
                "players"
            }
            RecordKind::PlayerStat | RecordKind::SecondaryStat | RecordKind::SecondaryChecked => {
                "player_stats"
            }
        }
    }

    pub fn is_update(self) -> bool {
        matches!(
            self,
            RecordKind::PlayerBirthdate
                | RecordKind::SecondaryId
                | RecordKind::SecondaryStat
                | RecordKind::SecondaryChecked
                | RecordKind::FeedOdds
                | RecordKind::FeedStatistic
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Tournament(TournamentRecord),
    Season(SeasonRecord),
    Team(TeamRecord),
    Match(MatchRecord),
    Referee(RefereeRecord),
    Stadium(StadiumRecord),
    Odds(OddsRecord),
    MatchStatistic(MatchStatisticRecord),
    TeamLineup(TeamLineupRecord),
    Manager(ManagerRecord),
    PlayerLineup(PlayerLineupRecord),
    Player(PlayerRef),
    PlayerStat(PlayerStatRecord),
    PlayerBirthdate(PlayerBirthdateUpdate),
    SecondaryId(SecondaryIdUpdate),
    SecondaryStat(SecondaryStatUpdate),
    SecondaryChecked(SecondaryCheckedUpdate),
    FeedOdds(FeedOddsUpdate),
    FeedStatistic(FeedStatisticUpdate),
}

macro_rules! record_variants {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        impl Record {
            pub fn kind(&self) -> RecordKind {
                match self {
                    $(Record::$variant(_) => RecordKind::$variant,)+
                }
            }

            /// Column name to value, using the persisted field names.
            pub fn to_fields(&self) -> Map<String, Value> {
                let value = match self {
                    $(Record::$variant(inner) => serde_json::to_value(inner),)+
                };
                match value {
                    Ok(Value::Object(fields)) => fields,
                    _ => Map::new(),
                }
            }
        }

        $(
            impl From<$ty> for Record {
                fn from(inner: $ty) -> Self {
                    Record::$variant(inner)
                }
            }
        )+
    };
}

record_variants! {
    Tournament => TournamentRecord,
    Season => SeasonRecord,
    Team => TeamRecord,
    Match => MatchRecord,
    Referee => RefereeRecord,
    Stadium => StadiumRecord,
    Odds => OddsRecord,
    MatchStatistic => MatchStatisticRecord,
    TeamLineup => TeamLineupRecord,
    Manager => ManagerRecord,
    PlayerLineup => PlayerLineupRecord,
    Player => PlayerRef,
    PlayerStat => PlayerStatRecord,
    PlayerBirthdate => PlayerBirthdateUpdate,
    SecondaryId => SecondaryIdUpdate,
    SecondaryStat => SecondaryStatUpdate,
    SecondaryChecked => SecondaryCheckedUpdate,
    FeedOdds => FeedOddsUpdate,
    FeedStatistic => FeedStatisticUpdate,
}
