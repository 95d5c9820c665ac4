use chrono::NaiveDate;
use scraper::Html;
use tracing::debug;

use crate::dates::parse_loose_date;
use crate::error::{ParseError, SourceResult};
use crate::event_docs::{
    DayListing, EventDocument, LineupDocument, LineupEntry, OddsDocument, PlayerInfo,
    PlayerStatDocument, TeamSheet, parse_day_listing_json, parse_event_json, parse_lineups_json,
    parse_odds_json, parse_player_stat_json,
};
use crate::html::{own_text, parent_element, selector};
use crate::http_client::SourceClient;

const DAY_URL: &str = "https://www.sofascore.com/football//{date}/json";
const EVENT_URL: &str = "https://www.sofascore.com/event/{event_id}/json";
const LINEUPS_URL: &str = "https://www.sofascore.com/event/{event_id}/lineups/json";
const LINEUPS_EMBED_URL: &str = "https://www.sofascore.com/event/{event_id}/lineups/embed";
const PLAYER_STATS_URL: &str =
    "https://www.sofascore.com/event/{event_id}/player/{player_id}/statistics/json";
const ODDS_URL: &str = "https://api.sofascore.com/api/v1/event/{event_id}/odds/1/all?_=";
const PLAYER_URL: &str = "https://www.sofascore.com/player/filipe-luis/{player_id}";

/// Documents of the primary statistics site. Implementations must be shareable across
/// worker threads.
pub trait PrimarySource: Send + Sync {
    fn day_listing(&self, date: NaiveDate) -> SourceResult<DayListing>;
    fn event(&self, event_id: u64) -> SourceResult<EventDocument>;
    /// Team sheets of an event. Implementations may fall back to a rendered page.
    fn lineups(&self, event_id: u64) -> SourceResult<LineupDocument>;
    fn odds(&self, event_id: u64) -> SourceResult<OddsDocument>;
    fn player_statistics(&self, event_id: u64, player_id: u64)
    -> SourceResult<PlayerStatDocument>;
    /// `Ok(None)` when the profile exists but shows no birth date.
    fn player_birthdate(&self, player_id: u64) -> SourceResult<Option<NaiveDate>>;
}

pub struct PrimaryClient<'a> {
    http: &'a SourceClient,
}

impl<'a> PrimaryClient<'a> {
    pub fn new(http: &'a SourceClient) -> Self {
        Self { http }
    }
}

fn event_url(template: &str, event_id: u64) -> String {
    template.replace("{event_id}", &event_id.to_string())
}

impl PrimarySource for PrimaryClient<'_> {
    fn day_listing(&self, date: NaiveDate) -> SourceResult<DayListing> {
        let url = DAY_URL.replace("{date}", &date.format("%Y-%m-%d").to_string());
        let body = self.http.get_text(&url)?;
        Ok(parse_day_listing_json(&body)?)
    }

    fn event(&self, event_id: u64) -> SourceResult<EventDocument> {
        let body = self.http.get_text(&event_url(EVENT_URL, event_id))?;
        Ok(parse_event_json(&body)?)
    }

    fn lineups(&self, event_id: u64) -> SourceResult<LineupDocument> {
        let json: SourceResult<LineupDocument> = self
            .http
            .get_text(&event_url(LINEUPS_URL, event_id))
            .map_err(Into::into)
            .and_then(|body| parse_lineups_json(&body).map_err(Into::into));
        match json {
            Ok(doc) if doc.sides().is_some() => return Ok(doc),
            Ok(_) => debug!(event_id, "lineup json has no team sheets, trying embed page"),
            Err(err) => debug!(event_id, error = %err, "lineup json unavailable, trying embed page"),
        }
        let body = self.http.get_text(&event_url(LINEUPS_EMBED_URL, event_id))?;
        Ok(parse_embedded_lineups_html(&body)?)
    }

    fn odds(&self, event_id: u64) -> SourceResult<OddsDocument> {
        let body = self.http.get_text(&event_url(ODDS_URL, event_id))?;
        Ok(parse_odds_json(&body)?)
    }

    fn player_statistics(
        &self,
        event_id: u64,
        player_id: u64,
    ) -> SourceResult<PlayerStatDocument> {
        let url = event_url(PLAYER_STATS_URL, event_id).replace("{player_id}", &player_id.to_string());
        let body = self.http.get_text(&url)?;
        Ok(parse_player_stat_json(&body)?)
    }

    fn player_birthdate(&self, player_id: u64) -> SourceResult<Option<NaiveDate>> {
        let url = PLAYER_URL.replace("{player_id}", &player_id.to_string());
        let body = self.http.get_text(&url)?;
        Ok(parse_player_birthdate_html(&body)?)
    }
}

fn column_position(idx: usize, columns: usize) -> (&'static str, &'static str) {
    if idx == 0 {
        ("G", "Goalkeeper")
    } else if idx == 1 {
        ("D", "Defender")
    } else if idx + 1 == columns {
        ("F", "Forward")
    } else {
        ("M", "Midfielder")
    }
}

/// Rebuilds team sheets from the rendered lineup page.
///
/// Columns run goalkeeper to forwards. The formation counts players per column, goalkeeper
/// excluded. Ratings, managers and substitutes are not on the page.
pub fn parse_embedded_lineups_html(raw: &str) -> Result<LineupDocument, ParseError> {
    let document = Html::parse_document(raw);
    let team_sel = selector(r#"div[id*="team"][data-lineup-type]"#)?;
    let column_sel = selector("div.cell.cell--vertical.u-h420")?;
    let row_sel = selector("div.cell__section.lineups__player")?;

    let mut lineup = LineupDocument::default();
    for team in document.select(&team_sel) {
        let side = team.value().attr("data-lineup-type").unwrap_or_default();
        let columns: Vec<_> = team.select(&column_sel).collect();
        let mut counts = Vec::with_capacity(columns.len());
        let mut players = Vec::new();
        for (idx, column) in columns.iter().enumerate() {
            let (short, long) = column_position(idx, columns.len());
            let mut count = 0;
            for row in column.select(&row_sel) {
                count += 1;
                let name = row.value().attr("data-player-name").map(str::to_string);
                let id = row
                    .value()
                    .attr("data-id")
                    .and_then(|id| id.trim().parse::<u64>().ok());
                players.push(LineupEntry {
                    substitute: false,
                    position_name: Some(long.to_string()),
                    position_short: Some(short.to_string()),
                    rating: None,
                    player: Some(PlayerInfo {
                        id,
                        slug: name.as_ref().map(|n| n.to_lowercase().replace(' ', "-")),
                        name,
                        short_name: None,
                        height: None,
                    }),
                });
            }
            counts.push(count);
        }
        let formation = counts
            .iter()
            .skip(1)
            .map(|c: &usize| c.to_string())
            .collect::<Vec<_>>()
            .join("-");
        let sheet = TeamSheet {
            formation: Some(formation).filter(|f| !f.is_empty()),
            manager: None,
            players,
        };
        if side == "home" {
            lineup.home = Some(sheet);
        } else {
            lineup.away = Some(sheet);
        }
    }

    if lineup.home.is_none() && lineup.away.is_none() {
        return Err(ParseError::missing("lineup embed", "team blocks"));
    }
    Ok(lineup)
}

const BIRTH_LABELS: &[&str] = &["Age", "Alter", "birth"];

/// Birth date from a primary-source player page.
///
/// The date sits in the value cell next to the age label, usually as `27 yrs (9 Aug 1985)`.
pub fn parse_player_birthdate_html(raw: &str) -> Result<Option<NaiveDate>, ParseError> {
    let document = Html::parse_document(raw);
    let container_sel = selector("div.cell.u-tC.u-flex-wrap.u-mT32")?;
    let any_sel = selector("*")?;
    let content_sel = selector("div.cell__content")?;

    let Some(container) = document.select(&container_sel).next() else {
        return Err(ParseError::missing("player page", "details container"));
    };

    for label in BIRTH_LABELS {
        let Some(label_el) = container
            .select(&any_sel)
            .find(|el| own_text(el).contains(label))
        else {
            continue;
        };
        let Some(parent) = parent_element(&label_el) else {
            continue;
        };
        let Some(content) = parent.select(&content_sel).next() else {
            continue;
        };
        let text = own_text(&content);
        let inner = match (text.find('('), text.find(')')) {
            (Some(open), Some(close)) if open < close => &text[open + 1..close],
            _ => text.as_str(),
        };
        return Ok(parse_loose_date(inner));
    }
    Ok(None)
}
