use serde_json::Value;
use tracing::debug;

use crate::event_docs::{OddsDocument, OddsMarket};
use crate::records::Blob;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketClass {
    /// Keys are `{market}_{outcome}`.
    Ordinary,
    /// Keys are `{line}_{choice}`, e.g. `2_5_over`.
    MatchGoals,
    /// Two-way market keyed `{market}_home` / `{market}_away`.
    HomeAway,
    /// Listed but carries no keys.
    Placeholder,
    Unsupported,
}

const ORDINARY_MARKETS: &[&str] = &[
    "Full time",
    "Double chance",
    "1st half",
    "Draw no bet",
    "Both teams to score",
];

pub fn classify_market(name: &str) -> MarketClass {
    match name {
        "" => MarketClass::Placeholder,
        "Match goals" => MarketClass::MatchGoals,
        "Asian handicap" | "First team to score" => MarketClass::HomeAway,
        other if ORDINARY_MARKETS.contains(&other) => MarketClass::Ordinary,
        _ => MarketClass::Unsupported,
    }
}

/// Rewrites leading `1`/`X`/`2` characters to `home`/`draw`/`away`, joined by `_`.
///
/// Stops at the first other character. A label with no leading token comes back unchanged.
pub fn replace_outcome_label(label: &str) -> String {
    let mut parts = Vec::new();
    for ch in label.chars() {
        let part = match ch {
            '1' => "home",
            '2' => "away",
            'x' | 'X' => "draw",
            _ => break,
        };
        parts.push(part);
    }
    if parts.is_empty() {
        label.to_string()
    } else {
        parts.join("_")
    }
}

/// `"a/b"` to decimal odds `a/b + 1`. Anything unparseable is `0.0`.
pub fn fractional_to_decimal(raw: &str) -> f64 {
    let Some((num, den)) = raw.split_once('/') else {
        return 0.0;
    };
    let (Ok(num), Ok(den)) = (num.trim().parse::<i64>(), den.trim().parse::<i64>()) else {
        return 0.0;
    };
    if den == 0 {
        return 0.0;
    }
    num as f64 / den as f64 + 1.0
}

fn market_prefix(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

fn choice_odds(fractional: Option<&str>) -> Value {
    Value::from(fractional.map(fractional_to_decimal).unwrap_or(0.0))
}

/// Keys for a single market, or `None` when its shape cannot be normalized.
pub fn normalize_market(market: &OddsMarket) -> Option<Vec<(String, Value)>> {
    let name = market.market_name.as_deref()?;
    match classify_market(name) {
        MarketClass::Ordinary => {
            let prefix = market_prefix(name);
            let entries = market
                .choices
                .iter()
                .filter_map(|choice| {
                    let label = choice.name.as_deref()?;
                    Some((
                        format!("{prefix}_{}", replace_outcome_label(label)),
                        choice_odds(choice.fractional_value.as_deref()),
                    ))
                })
                .collect();
            Some(entries)
        }
        MarketClass::MatchGoals => {
            let line = market.choice_group.as_deref()?;
            let prefix = line.to_lowercase().replace('.', "_");
            let entries = market
                .choices
                .iter()
                .filter_map(|choice| {
                    let label = choice.name.as_deref()?;
                    Some((
                        format!("{prefix}_{}", label.to_lowercase()),
                        choice_odds(choice.fractional_value.as_deref()),
                    ))
                })
                .collect();
            Some(entries)
        }
        MarketClass::HomeAway => {
            let [home, away, ..] = market.choices.as_slice() else {
                return None;
            };
            let prefix = market_prefix(name);
            Some(vec![
                (
                    format!("{prefix}_home"),
                    choice_odds(home.fractional_value.as_deref()),
                ),
                (
                    format!("{prefix}_away"),
                    choice_odds(away.fractional_value.as_deref()),
                ),
            ])
        }
        MarketClass::Placeholder => Some(Vec::new()),
        MarketClass::Unsupported => None,
    }
}

/// Flattens every recognised market into one object. Unrecognised or malformed markets
/// are dropped on their own.
pub fn normalize_odds(doc: &OddsDocument) -> Blob {
    let mut out = Blob::new();
    for market in &doc.markets {
        match normalize_market(market) {
            Some(entries) => out.extend(entries),
            None => debug!(
                market = market.market_name.as_deref().unwrap_or(""),
                "skipping odds market"
            ),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_docs::OddsChoice;

    fn choice(name: &str, fractional: &str) -> OddsChoice {
        OddsChoice {
            name: Some(name.to_string()),
            fractional_value: Some(fractional.to_string()),
        }
    }

    fn market(name: &str, group: Option<&str>, choices: Vec<OddsChoice>) -> OddsMarket {
        OddsMarket {
            market_name: Some(name.to_string()),
            choice_group: group.map(str::to_string),
            choices,
        }
    }

    #[test]
    fn fractional_conversion() {
        assert_eq!(fractional_to_decimal("1/2"), 1.5);
        assert_eq!(fractional_to_decimal("3/1"), 4.0);
        assert_eq!(fractional_to_decimal("abc"), 0.0);
        assert_eq!(fractional_to_decimal("5/0"), 0.0);
        assert_eq!(fractional_to_decimal("1.5/2"), 0.0);
        assert_eq!(fractional_to_decimal(""), 0.0);
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(replace_outcome_label("1"), "home");
        assert_eq!(replace_outcome_label("X"), "draw");
        assert_eq!(replace_outcome_label("2"), "away");
        assert_eq!(replace_outcome_label("X2"), "draw_away");
        assert_eq!(replace_outcome_label("2X"), "away_draw");
        assert_eq!(replace_outcome_label("12"), "home_away");
        assert_eq!(replace_outcome_label("1 (0:1)"), "home");
        assert_eq!(replace_outcome_label("Yes"), "Yes");
        assert_eq!(replace_outcome_label(""), "");
    }

    #[test]
    fn markets_are_classified() {
        assert_eq!(classify_market("Full time"), MarketClass::Ordinary);
        assert_eq!(classify_market("Match goals"), MarketClass::MatchGoals);
        assert_eq!(classify_market("Asian handicap"), MarketClass::HomeAway);
        assert_eq!(classify_market(""), MarketClass::Placeholder);
        assert_eq!(classify_market("Corners 2-way"), MarketClass::Unsupported);
    }

    #[test]
    fn normalizes_mixed_markets_and_drops_bad_ones() {
        let doc = OddsDocument {
            markets: vec![
                market(
                    "Full time",
                    None,
                    vec![choice("1", "11/10"), choice("X", "9/4"), choice("2", "5/2")],
                ),
                market("Match goals", Some("2.5"), vec![choice("Over", "4/5"), choice("Under", "1/1")]),
                market("Asian handicap", None, vec![choice("(-0.5) 1", "1/1")]),
                market("First team to score", None, vec![choice("1", "4/6"), choice("2", "bad")]),
                market("", None, vec![choice("1", "1/1")]),
                market("Corners 2-way", None, vec![choice("Over", "1/1")]),
            ],
        };
        let odds = normalize_odds(&doc);
        assert_eq!(odds.get("full_time_home"), Some(&Value::from(2.1)));
        assert_eq!(odds.get("full_time_draw"), Some(&Value::from(3.25)));
        assert_eq!(odds.get("2_5_over"), Some(&Value::from(1.8)));
        assert_eq!(odds.get("2_5_under"), Some(&Value::from(2.0)));
        assert_eq!(odds.get("first_team_to_score_away"), Some(&Value::from(0.0)));
        assert!(odds.keys().all(|k| !k.starts_with("asian_handicap")));
        assert!(odds.keys().all(|k| !k.starts_with("corners")));
        assert_eq!(odds.len(), 7);
    }
}
