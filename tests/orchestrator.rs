mod common;

use std::collections::{HashMap, HashSet};

use chrono_tz::Europe::Budapest;
use serde_json::Value;

use matchday_miner::executor::Executor;
use matchday_miner::match_fetch::{InlineReconcile, MatchOrchestrator};
use matchday_miner::records::{Record, RecordKind};
use matchday_miner::sink::{NullSink, Sink};
use matchday_miner::tabular_sink::TabularSink;

use common::{FixturePrimary, FixtureSecondary, SECONDARY_ID, ymd};

fn configured() -> HashSet<u64> {
    [17, 8].into_iter().collect()
}

fn count(records: &[Record], kind: RecordKind) -> usize {
    records.iter().filter(|r| r.kind() == kind).count()
}

#[test]
fn date_range_fetch_collects_configured_matches() {
    let primary = FixturePrimary::new();
    let executor = Executor::new(None);
    let orchestrator = MatchOrchestrator::new(&primary, &executor, configured(), Budapest);
    let records = orchestrator.fetch_dates(ymd(2019, 8, 10), Some(ymd(2019, 8, 12)));

    assert_eq!(count(&records, RecordKind::Match), 2);
    assert_eq!(count(&records, RecordKind::PlayerStat), 8);
    assert_eq!(count(&records, RecordKind::Odds), 1);
    assert_eq!(records.len(), 21 + 18 + 8);
}

#[test]
fn tabular_sink_joins_match_rows() {
    let primary = FixturePrimary::new();
    let executor = Executor::new(None);
    let records = MatchOrchestrator::new(&primary, &executor, configured(), Budapest)
        .fetch_matches(&[1001, 2002]);

    let mut sink = TabularSink::default();
    sink.accept_all(records);
    let out = sink.finalize();

    assert_eq!(out.matches.len(), 2);
    assert_eq!(out.player_stats.len(), 8);
    let first = &out.matches[0];
    assert_eq!(first.get("match_id"), Some(&Value::from(1001)));
    assert_eq!(first.get("tournament_name"), Some(&Value::from("Premier League")));
    assert_eq!(first.get("season_year"), Some(&Value::from("19/20")));
    assert_eq!(first.get("home_team_name"), Some(&Value::from("Manchester United")));
    assert_eq!(first.get("away_team_short"), Some(&Value::from("Chelsea")));
    assert_eq!(first.get("referee_name"), Some(&Value::from("Anthony Taylor")));
    assert_eq!(first.get("stadium_name"), Some(&Value::from("Old Trafford")));
    assert_eq!(first.get("all_ball_possession_home"), Some(&Value::from("47%")));
    assert!(
        first
            .get("full_time_home")
            .and_then(Value::as_f64)
            .is_some_and(|odds| (odds - 2.2).abs() < 1e-9)
    );
    assert_eq!(first.get("home_formation"), Some(&Value::from("4-2-3-1")));
    assert_eq!(
        first.get("home_manager_name"),
        Some(&Value::from("Ole Gunnar Solskjaer"))
    );
    assert_eq!(first.get("home_primary_player_id_0"), Some(&Value::from(100)));
    assert_eq!(first.get("away_substitute_1"), Some(&Value::Bool(true)));
    assert_eq!(first.get("home_score").and_then(Value::as_f64), Some(4.0));

    let second = &out.matches[1];
    assert_eq!(second.get("tournament_name"), Some(&Value::from("LaLiga")));
    assert!(second.get("full_time_home").is_none());
    assert_eq!(second.get("away_manager_name"), Some(&Value::from("Zinédine Zidane")));
    assert_eq!(out.tables.get("players").map(Vec::len), Some(8));
}

#[test]
fn worker_pool_output_matches_sequential_run() {
    let primary = FixturePrimary::new();
    let sequential = Executor::new(None);
    let pooled = Executor::new(Some(3));
    let ids = [1001, 2002, 1001, 2002, 9999];

    let first = MatchOrchestrator::new(&primary, &sequential, configured(), Budapest).fetch_matches(&ids);
    let again = MatchOrchestrator::new(&primary, &sequential, configured(), Budapest).fetch_matches(&ids);
    let parallel = MatchOrchestrator::new(&primary, &pooled, configured(), Budapest).fetch_matches(&ids);

    assert_eq!(first, again);
    assert_eq!(first, parallel);
    assert_eq!(count(&first, RecordKind::Match), 4);
}

#[test]
fn failing_event_does_not_stop_the_run() {
    let primary = FixturePrimary::new();
    let executor = Executor::new(Some(2));
    let records =
        MatchOrchestrator::new(&primary, &executor, configured(), Budapest).fetch_matches(&[9999, 1001]);
    assert_eq!(count(&records, RecordKind::Match), 1);
    assert_eq!(records.len(), 21 + 4);
}

#[test]
fn match_without_lineups_keeps_reference_rows_only() {
    let primary = FixturePrimary::new().without_lineups(2002);
    let executor = Executor::new(None);
    let records =
        MatchOrchestrator::new(&primary, &executor, configured(), Budapest).fetch_matches(&[2002]);
    let kinds: Vec<RecordKind> = records.iter().map(Record::kind).collect();
    assert_eq!(
        kinds,
        vec![
            RecordKind::Tournament,
            RecordKind::Season,
            RecordKind::Team,
            RecordKind::Team
        ]
    );
    assert_eq!(primary.stat_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn failed_player_statistics_still_emit_a_row() {
    let primary = FixturePrimary::new().failing_stats(101);
    let executor = Executor::new(None);
    let records =
        MatchOrchestrator::new(&primary, &executor, configured(), Budapest).fetch_matches(&[1001]);
    let stats: Vec<_> = records
        .iter()
        .filter_map(|r| match r {
            Record::PlayerStat(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(stats.len(), 4);
    let failed = stats
        .iter()
        .find(|s| s.primary_player_id == 101)
        .expect("row for failed player");
    assert!(!failed.has_primary_stat);
    assert!(stats.iter().filter(|s| s.has_primary_stat).count() == 3);
}

#[test]
fn inline_reconcile_fills_secondary_ids() {
    let primary = FixturePrimary::new();
    let secondary = FixtureSecondary::new();
    let aliases: HashMap<String, u64> = [("Karim Benzema".to_string(), 165153)].into_iter().collect();
    let executor = Executor::new(None);
    let records = MatchOrchestrator::new(&primary, &executor, configured(), Budapest)
        .with_inline_reconcile(InlineReconcile {
            source: &secondary,
            aliases: &aliases,
        })
        .fetch_matches(&[2002]);

    let ids: HashMap<u64, Option<u64>> = records
        .iter()
        .filter_map(|r| match r {
            Record::Player(p) => Some((p.primary_player_id, p.secondary_player_id)),
            _ => None,
        })
        .collect();
    assert_eq!(ids.get(&301), Some(&Some(SECONDARY_ID)));
    assert_eq!(ids.get(&401), Some(&Some(165153)));
    assert_eq!(ids.get(&300), Some(&None));
}

#[test]
fn null_sink_discards_everything() {
    let primary = FixturePrimary::new();
    let executor = Executor::new(None);
    let records =
        MatchOrchestrator::new(&primary, &executor, configured(), Budapest).fetch_matches(&[1001]);
    let total = records.len();
    let mut sink = NullSink::default();
    sink.accept_all(records);
    assert_eq!(sink.finalize(), total);
}
