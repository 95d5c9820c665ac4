use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::event_docs::{
    EventDocument, H2hDuel, ManagerDuel, PlayerStatDocument, StatItem, StatisticsBlock, TeamForm,
    TeamsForm, Votes,
};
use crate::records::{Blob, StatLine};

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex"));

/// Goalkeeper pages carry one extra stat group.
// TODO: switch to the lineup position (`G`) once stat pages are always paired with a lineup entry.
pub const GOALKEEPER_GROUP_COUNT: usize = 6;

struct StatDef {
    group: &'static str,
    key: &'static str,
    sources: &'static [&'static str],
}

const fn stat_def(
    group: &'static str,
    key: &'static str,
    sources: &'static [&'static str],
) -> StatDef {
    StatDef { group, key, sources }
}

const OUTFIELD_STATS: &[StatDef] = &[
    stat_def("summary", "goal_assist", &["goalAssist"]),
    stat_def("summary", "goals", &["goals"]),
    stat_def("summary", "minutes_played", &["minutesPlayed"]),
    stat_def("attack", "shots_blocked", &["shotsBlocked"]),
    stat_def("attack", "shots_off_target", &["shotsOffTarget"]),
    stat_def("attack", "shots_on_target", &["shotsOnTarget"]),
    stat_def("attack", "total_contest", &["totalContest"]),
    stat_def("defence", "challenge_lost", &["challengeLost"]),
    stat_def("defence", "interception_won", &["interceptionWon", "interceptionWin"]),
    stat_def("defence", "outfielder_block", &["outfielderBlock"]),
    stat_def("defence", "total_clearance", &["totalClearance"]),
    stat_def("defence", "total_tackle", &["wonTackel", "totalTackle"]),
    stat_def("duels", "dispossessed", &["dispossessed"]),
    stat_def("duels", "fouls", &["fouls"]),
    stat_def("duels", "total_duels", &["totalDuels", "groundDuels"]),
    stat_def("duels", "was_fouled", &["wasFouled"]),
    stat_def("passing", "accurate_pass", &["accuratePass"]),
    stat_def("passing", "key_pass", &["keyPass"]),
    stat_def("passing", "total_cross", &["totalCross"]),
    stat_def("passing", "total_long_balls", &["totalLongBalls"]),
];

const GOALKEEPER_STATS: &[StatDef] = &[
    stat_def("goalkeeper", "good_high_claim", &["goodHighClaim"]),
    stat_def("goalkeeper", "punches", &["punches"]),
    stat_def("goalkeeper", "runs_out", &["runsOut"]),
    stat_def("goalkeeper", "saves", &["saves"]),
];

pub fn outfield_stat_keys() -> impl Iterator<Item = &'static str> {
    OUTFIELD_STATS.iter().map(|s| s.key)
}

pub fn goalkeeper_stat_keys() -> impl Iterator<Item = &'static str> {
    GOALKEEPER_STATS.iter().map(|s| s.key)
}

/// Integer behind a stat item: the raw value wins, then the first number in the display text.
pub fn item_value(item: &StatItem) -> Option<i64> {
    if let Some(raw) = item.raw.as_ref().filter(|raw| !raw.is_null()) {
        return match raw {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
    }
    let text = item.value.as_deref()?;
    FIRST_NUMBER
        .find(text)
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

fn lookup(doc: &PlayerStatDocument, spec: &StatDef) -> Option<i64> {
    for source in spec.sources {
        let Some(item) = doc.item(spec.group, source) else {
            continue;
        };
        if item.raw.as_ref().is_some_and(|raw| !raw.is_null()) {
            return item_value(item);
        }
        if let Some(value) = item_value(item) {
            return Some(value);
        }
    }
    None
}

/// Allow-listed statistics of one player in one match.
///
/// Every outfield key is always present. Goalkeeper keys appear only when the page has
/// exactly [`GOALKEEPER_GROUP_COUNT`] groups.
pub fn normalize_player_stats(doc: &PlayerStatDocument) -> StatLine {
    let mut line = StatLine::new();
    for spec in OUTFIELD_STATS {
        line.insert(spec.key.to_string(), lookup(doc, spec));
    }
    if doc.group_count() == GOALKEEPER_GROUP_COUNT {
        for spec in GOALKEEPER_STATS {
            line.insert(spec.key.to_string(), lookup(doc, spec));
        }
    }
    line
}

fn snake(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

fn numeric_or_text(value: &Value) -> Value {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(s.clone())),
        other => other.clone(),
    }
}

fn non_empty(blob: Blob) -> Option<Blob> {
    (!blob.is_empty()).then_some(blob)
}

fn opt<T: Into<Value>>(value: Option<T>) -> Value {
    value.map(Into::into).unwrap_or(Value::Null)
}

pub fn statistics_blob(block: &StatisticsBlock) -> Option<Blob> {
    let mut out = Blob::new();
    for period in &block.periods {
        let Some(period_name) = period.period.as_deref() else {
            continue;
        };
        let prefix = snake(period_name);
        for group in &period.groups {
            for item in &group.items {
                let Some(name) = item.name.as_deref() else {
                    continue;
                };
                let key = format!("{prefix}_{}", snake(name));
                if let Some(home) = item.home.as_ref() {
                    out.insert(format!("{key}_home"), numeric_or_text(home));
                }
                if let Some(away) = item.away.as_ref() {
                    out.insert(format!("{key}_away"), numeric_or_text(away));
                }
            }
        }
    }
    non_empty(out)
}

fn team_form(out: &mut Blob, side: &str, form: &TeamForm) {
    out.insert(format!("{side}_avg_rating"), opt(form.avg_rating));
    out.insert(format!("{side}_position"), opt(form.position));
    out.insert(format!("{side}_points"), opt(form.points));
    for (idx, result) in form.form.iter().enumerate() {
        out.insert(format!("{side}_form_{idx}"), Value::from(result.as_str()));
    }
}

pub fn forms_blob(forms: &TeamsForm) -> Option<Blob> {
    let mut out = Blob::new();
    if let Some(home) = forms.home.as_ref() {
        team_form(&mut out, "home", home);
    }
    if let Some(away) = forms.away.as_ref() {
        team_form(&mut out, "away", away);
    }
    non_empty(out)
}

pub fn votes_blob(votes: &Votes) -> Option<Blob> {
    let mut out = Blob::new();
    out.insert("vote_home".to_string(), opt(votes.vote1));
    out.insert("vote_away".to_string(), opt(votes.vote2));
    out.insert("vote_draw".to_string(), opt(votes.vote_x));
    out.insert("vote_home_perc".to_string(), opt(votes.vote1_perc));
    out.insert("vote_away_perc".to_string(), opt(votes.vote2_perc));
    out.insert("vote_draw_perc".to_string(), opt(votes.vote_x_perc));
    Some(out)
}

pub fn manager_duels_blob(duel: &ManagerDuel) -> Option<Blob> {
    let mut out = Blob::new();
    out.insert("manager_home_win".to_string(), opt(duel.home_wins));
    out.insert("manager_away_win".to_string(), opt(duel.away_wins));
    out.insert("manager_draw".to_string(), opt(duel.draws));
    out.insert(
        "manager_home".to_string(),
        opt(duel.home_manager.as_ref().and_then(|m| m.id)),
    );
    out.insert(
        "manager_away".to_string(),
        opt(duel.away_manager.as_ref().and_then(|m| m.id)),
    );
    Some(out)
}

pub fn h2h_blob(duel: &H2hDuel) -> Option<Blob> {
    let mut out = Blob::new();
    out.insert("h2h_home".to_string(), opt(duel.homewins));
    out.insert("h2h_away".to_string(), opt(duel.awaywins));
    out.insert("h2h_draw".to_string(), opt(duel.draws));
    Some(out)
}

/// All match-level blobs of an event, `None` where the block is absent.
pub struct MatchBlobs {
    pub statistics: Option<Blob>,
    pub forms: Option<Blob>,
    pub votes: Option<Blob>,
    pub manager_duels: Option<Blob>,
    pub h2h: Option<Blob>,
}

pub fn match_blobs(doc: &EventDocument) -> MatchBlobs {
    MatchBlobs {
        statistics: doc.statistics.as_ref().and_then(statistics_blob),
        forms: doc.teams_form.as_ref().and_then(forms_blob),
        votes: doc.vote.as_ref().and_then(votes_blob),
        manager_duels: doc.manager_duel.as_ref().and_then(manager_duels_blob),
        h2h: doc.h2h_duel.as_ref().and_then(h2h_blob),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(raw: Option<Value>, value: Option<&str>) -> StatItem {
        StatItem {
            raw,
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn raw_value_wins_over_display_text() {
        assert_eq!(item_value(&item(Some(Value::from(3)), Some("9"))), Some(3));
        assert_eq!(item_value(&item(None, Some("24 (31)"))), Some(24));
        assert_eq!(item_value(&item(None, Some("-"))), None);
        assert_eq!(item_value(&item(Some(Value::Null), Some("7"))), Some(7));
    }

    #[test]
    fn statistics_keys_use_period_and_item_name() {
        let block: StatisticsBlock = serde_json::from_value(serde_json::json!({
            "periods": [{
                "period": "ALL",
                "groups": [{
                    "groupName": "Possession",
                    "statisticsItems": [
                        {"name": "Ball possession", "home": "55%", "away": "45%"},
                        {"name": "Total shots", "home": "14", "away": 9}
                    ]
                }]
            }]
        }))
        .expect("valid block");
        let blob = statistics_blob(&block).expect("non empty");
        assert_eq!(blob.get("all_ball_possession_home"), Some(&Value::from("55%")));
        assert_eq!(blob.get("all_total_shots_home"), Some(&Value::from(14.0)));
        assert_eq!(blob.get("all_total_shots_away"), Some(&Value::from(9)));
    }

    #[test]
    fn empty_statistics_block_is_none() {
        assert!(statistics_blob(&StatisticsBlock::default()).is_none());
        assert!(forms_blob(&TeamsForm::default()).is_none());
    }
}
