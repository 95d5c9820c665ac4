use std::collections::HashSet;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;
use tracing::debug;

use crate::dates::parse_loose_date;
use crate::error::{ParseError, SourceResult};
use crate::html::{full_text, own_text, selector};
use crate::http_client::SourceClient;
use crate::records::Blob;

const SITE_ROOT: &str = "https://www.fifaindex.com";
const SEARCH_URL: &str = "https://www.fifaindex.com/players/?name={name}&order=desc";
const PLAYER_URL: &str = "https://www.fifaindex.com/player/{id}";

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex"));

/// Attribute names every rating snapshot carries, empty until seen on a page.
pub const RATING_KEYS: &[&str] = &[
    "Ball Control",
    "Dribbling",
    "Marking",
    "Slide Tackle",
    "Stand Tackle",
    "Aggression",
    "Reactions",
    "Att. Position",
    "Interceptions",
    "Vision",
    "Composure",
    "Crossing",
    "Short Pass",
    "Long Pass",
    "Acceleration",
    "Stamina",
    "Strength",
    "Balance",
    "Sprint Speed",
    "Agility",
    "Jumping",
    "Heading",
    "Shot Power",
    "Finishing",
    "Long Shots",
    "Curve",
    "FK Acc.",
    "Penalties",
    "Volleys",
    "GK Positioning",
    "GK Diving",
    "GK Handling",
    "GK Kicking",
    "GK Reflexes",
    "Overall",
    "Potential",
    "Height",
    "Weight",
    "Preferred Foot",
    "Preferred Positions",
];

const POSITIONS_KEY: &str = "Preferred Positions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub id: u64,
    pub profile_url: String,
}

impl SearchCandidate {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            profile_url: PLAYER_URL.replace("{id}", &id.to_string()),
        }
    }
}

/// Ratings in force from `date` until the next newer snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingSnapshot {
    pub date: NaiveDate,
    pub stats: Blob,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePage {
    pub stats: Blob,
    pub changelog_url: Option<String>,
}

/// The secondary ratings site.
pub trait SecondarySource: Send + Sync {
    /// Candidates for an exact name search, across result pages.
    fn search_players(&self, name: &str) -> SourceResult<Vec<SearchCandidate>>;
    fn profile_birthdate(&self, candidate: &SearchCandidate) -> SourceResult<Option<NaiveDate>>;
    /// Dated snapshots, newest first.
    fn rating_history(&self, secondary_id: u64) -> SourceResult<Vec<RatingSnapshot>>;
}

pub struct SecondaryClient<'a> {
    http: &'a SourceClient,
    max_pages: usize,
}

impl<'a> SecondaryClient<'a> {
    pub fn new(http: &'a SourceClient, max_pages: usize) -> Self {
        Self {
            http,
            max_pages: max_pages.max(1),
        }
    }
}

pub fn search_url(name: &str, page: usize) -> String {
    let base = SEARCH_URL.replace("{name}", &name.trim().replace(' ', "+"));
    if page <= 1 {
        base
    } else {
        format!("{base}&page={page}")
    }
}

impl SecondarySource for SecondaryClient<'_> {
    fn search_players(&self, name: &str) -> SourceResult<Vec<SearchCandidate>> {
        collect_search_pages(name, self.max_pages, |page| {
            Ok(self.http.get_text(&search_url(name, page))?)
        })
    }

    fn profile_birthdate(&self, candidate: &SearchCandidate) -> SourceResult<Option<NaiveDate>> {
        let body = self.http.get_text(&candidate.profile_url)?;
        Ok(parse_profile_birthdate_html(&body)?)
    }

    fn rating_history(&self, secondary_id: u64) -> SourceResult<Vec<RatingSnapshot>> {
        let profile_url = PLAYER_URL.replace("{id}", &secondary_id.to_string());
        let profile = parse_profile_html(&self.http.get_text(&profile_url)?)?;
        let Some(changelog_url) = profile.changelog_url.as_deref() else {
            debug!(secondary_id, "profile has no changelog link");
            return Ok(Vec::new());
        };
        let body = self.http.get_text(changelog_url)?;
        Ok(parse_changelog_html(&body, &profile.stats)?)
    }
}

/// Walks result pages until one adds no new ids or `max_pages` is reached.
///
/// Only a failing first page is an error. A later page that fails ends the walk with the
/// candidates already collected.
pub fn collect_search_pages(
    name: &str,
    max_pages: usize,
    mut fetch_page: impl FnMut(usize) -> SourceResult<String>,
) -> SourceResult<Vec<SearchCandidate>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for page in 1..=max_pages.max(1) {
        let found = match fetch_page(page).and_then(|body| Ok(parse_search_results_html(&body)?)) {
            Ok(found) => found,
            Err(err) if page == 1 => return Err(err),
            Err(err) => {
                debug!(name, page, error = %err, "search page failed, keeping earlier pages");
                break;
            }
        };
        let before = out.len();
        for candidate in found {
            if seen.insert(candidate.id) {
                out.push(candidate);
            }
        }
        if out.len() == before {
            break;
        }
    }
    debug!(name, candidates = out.len(), "secondary search finished");
    Ok(out)
}

pub fn parse_search_results_html(raw: &str) -> Result<Vec<SearchCandidate>, ParseError> {
    let document = Html::parse_document(raw);
    let row_sel = selector("table.table-players tr[data-playerid]")?;
    Ok(document
        .select(&row_sel)
        .filter_map(|row| row.value().attr("data-playerid"))
        .filter_map(|id| id.trim().parse::<u64>().ok())
        .map(SearchCandidate::new)
        .collect())
}

fn profile_block(document: &Html) -> Result<ElementRef<'_>, ParseError> {
    let block_sel = selector("div.row.pt-3")?;
    document
        .select(&block_sel)
        .next()
        .ok_or_else(|| ParseError::missing("secondary profile", "details block"))
}

/// `span.float-right` of the first paragraph under `scope` whose text mentions `label`.
fn labelled_value(scope: &ElementRef<'_>, label: &str) -> Result<Option<String>, ParseError> {
    let p_sel = selector("p")?;
    let value_sel = selector("span.float-right")?;
    Ok(scope
        .select(&p_sel)
        .find(|p| full_text(p).contains(label))
        .and_then(|p| p.select(&value_sel).next())
        .map(|span| full_text(&span))
        .filter(|text| !text.is_empty()))
}

pub fn parse_profile_birthdate_html(raw: &str) -> Result<Option<NaiveDate>, ParseError> {
    let document = Html::parse_document(raw);
    let block = profile_block(&document)?;
    Ok(labelled_value(&block, "Birth Date")?.and_then(|text| parse_loose_date(&text)))
}

fn empty_snapshot() -> Blob {
    RATING_KEYS
        .iter()
        .map(|key| (key.to_string(), Value::from("")))
        .collect()
}

fn scalar(text: &str) -> Value {
    match text.trim().parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::from(text.trim()),
    }
}

fn metric_number(scope: &ElementRef<'_>, label: &str) -> Result<Option<Value>, ParseError> {
    let p_sel = selector("p")?;
    let unit_sel = selector("span.data-units.data-units-metric")?;
    Ok(scope
        .select(&p_sel)
        .find(|p| full_text(p).contains(label))
        .and_then(|p| p.select(&unit_sel).next())
        .and_then(|span| {
            DIGITS
                .find(&full_text(&span))
                .and_then(|m| m.as_str().parse::<i64>().ok())
        })
        .map(Value::from))
}

/// Current ratings plus the changelog link of a secondary-source profile.
pub fn parse_profile_html(raw: &str) -> Result<ProfilePage, ParseError> {
    let document = Html::parse_document(raw);
    let block = profile_block(&document)?;
    let column_sel = selector("div.col-sm-6")?;
    let rating_sel = selector("span.rating")?;
    let position_sel = selector("a.link-position")?;
    let changelog_sel = selector("a.btn.btn-block.btn-sm.btn-primary.mt-3")?;
    let card_sel = selector("div.row.grid > div")?;
    let stat_line_sel = selector("div.card-body p")?;

    let mut stats = empty_snapshot();

    let changelog_url = block
        .select(&changelog_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| {
            if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{SITE_ROOT}{href}")
            }
        });

    if let Some(info) = block.select(&column_sel).nth(1) {
        let ratings: Vec<String> = info.select(&rating_sel).map(|r| full_text(&r)).collect();
        if let Some(overall) = ratings.first() {
            stats.insert("Overall".to_string(), scalar(overall));
        }
        if let Some(potential) = ratings.get(1) {
            stats.insert("Potential".to_string(), scalar(potential));
        }
        if let Some(height) = metric_number(&info, "Height")? {
            stats.insert("Height".to_string(), height);
        }
        if let Some(weight) = metric_number(&info, "Weight")? {
            stats.insert("Weight".to_string(), weight);
        }
        if let Some(foot) = labelled_value(&info, "Preferred Foot")? {
            stats.insert("Preferred Foot".to_string(), Value::from(foot));
        }
        let positions: Vec<Value> = info
            .select(&position_sel)
            .map(|a| Value::from(a.value().attr("title").unwrap_or_default()))
            .collect();
        if !positions.is_empty() {
            stats.insert(POSITIONS_KEY.to_string(), Value::Array(positions));
        }
    } else {
        debug!("secondary profile lacks the info column");
    }

    for card in document.select(&card_sel) {
        for line in card.select(&stat_line_sel) {
            let parts: Vec<&str> = line
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect();
            let (Some(name), Some(value)) = (parts.first(), parts.last()) else {
                continue;
            };
            if parts.len() < 2 {
                continue;
            }
            if let Ok(value) = value.parse::<i64>() {
                stats.insert(name.to_string(), Value::from(value));
            }
        }
    }

    Ok(ProfilePage {
        stats,
        changelog_url,
    })
}

fn set_position(stats: &mut Blob, slot: usize, value: &str) {
    let entry = stats
        .entry(POSITIONS_KEY.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    if let Value::Array(positions) = entry {
        while positions.len() < slot {
            positions.push(Value::from(""));
        }
        if slot >= 1 {
            positions[slot - 1] = Value::from(value);
        }
    }
}

/// Undoes one changelog card: each change line holds the value before the update.
fn revert_changes(card: &ElementRef<'_>, newer: &Blob) -> Result<Blob, ParseError> {
    let change_sel = selector("div.mb-2.col-6")?;
    let mut older = newer.clone();
    for change in card.select(&change_sel) {
        let text = own_text(&change);
        let mut split = text.split(':');
        let (Some(name), Some(value), None) = (split.next(), split.next(), split.next()) else {
            continue;
        };
        let name = name.trim();
        let value = value.split_whitespace().next().unwrap_or_default();
        let value = if value == "N/A" { "" } else { value };

        if name.contains("Preferred Position") {
            if let Some(slot) = DIGITS
                .find(name)
                .and_then(|m| m.as_str().parse::<usize>().ok())
            {
                set_position(&mut older, slot, value);
            }
        } else if older.contains_key(name) {
            older.insert(name.to_string(), scalar(value));
        }
    }
    Ok(older)
}

/// Walks the changelog newest first, pairing each update date with the ratings that held
/// after it.
pub fn parse_changelog_html(raw: &str, current: &Blob) -> Result<Vec<RatingSnapshot>, ParseError> {
    let document = Html::parse_document(raw);
    let card_sel = selector("div.col-lg-8 div.card.mb-5")?;
    let header_sel = selector(r#"h5.card-header a[href*="player"]"#)?;

    let mut snapshots = Vec::new();
    let mut stats = current.clone();
    for card in document.select(&card_sel) {
        let date = card
            .select(&header_sel)
            .next()
            .map(|a| full_text(&a))
            .and_then(|text| text.split("@ ").nth(1).map(str::to_string))
            .and_then(|raw_date| parse_loose_date(&raw_date));
        let older = revert_changes(&card, &stats)?;
        match date {
            Some(date) => snapshots.push(RatingSnapshot {
                date,
                stats: std::mem::replace(&mut stats, older),
            }),
            None => {
                debug!("changelog card without a readable date");
                stats = older;
            }
        }
    }
    Ok(snapshots)
}
