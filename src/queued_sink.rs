use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};
use serde_json::Value;
use tracing::{info, warn};

use crate::records::{Record, RecordKind};
use crate::sink::Sink;
use crate::store::key_columns;

/// Columns an upsert never overwrites once the row exists.
fn preserved_columns(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::PlayerStat => &["secondary_stat", "has_secondary_stat"],
        _ => &[],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedStatement {
    pub kind: RecordKind,
    pub sql: String,
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub executed: usize,
    pub failed: usize,
    pub rows_changed: usize,
}

pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(n) => match n.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        nested => SqlValue::Text(nested.to_string()),
    }
}

fn upsert(kind: RecordKind, fields: &serde_json::Map<String, Value>) -> QueuedStatement {
    let table = kind.table();
    let keys = key_columns(kind);
    let preserved = preserved_columns(kind);
    let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|col| !keys.contains(col) && !preserved.contains(col))
        .map(|col| format!("{col} = COALESCE(excluded.{col}, {table}.{col})"))
        .collect();
    let conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT({}) {conflict}",
        columns.join(", "),
        placeholders.join(", "),
        keys.join(", "),
    );
    QueuedStatement {
        kind,
        sql,
        params: fields.values().map(to_sql_value).collect(),
    }
}

fn update(
    kind: RecordKind,
    sql: &str,
    fields: &serde_json::Map<String, Value>,
    order: &[&str],
) -> QueuedStatement {
    QueuedStatement {
        kind,
        sql: sql.to_string(),
        params: order
            .iter()
            .map(|name| fields.get(*name).map(to_sql_value).unwrap_or(SqlValue::Null))
            .collect(),
    }
}

/// The write a record turns into: an upsert for base kinds, a targeted update otherwise.
pub fn statement_for(record: &Record) -> QueuedStatement {
    let kind = record.kind();
    let fields = record.to_fields();
    match kind {
        RecordKind::PlayerBirthdate => update(
            kind,
            "UPDATE players SET birth_date = ?1 WHERE primary_player_id = ?2",
            &fields,
            &["birth_date", "primary_player_id"],
        ),
        RecordKind::SecondaryId => update(
            kind,
            "UPDATE players SET secondary_player_id = ?1 WHERE primary_player_id = ?2",
            &fields,
            &["secondary_player_id", "primary_player_id"],
        ),
        RecordKind::SecondaryStat => update(
            kind,
            "UPDATE player_stats SET secondary_stat = ?1, has_secondary_stat = 1, \
             secondary_checked = 1 WHERE primary_player_id = ?2 AND match_id = ?3",
            &fields,
            &["secondary_stat", "primary_player_id", "match_id"],
        ),
        RecordKind::SecondaryChecked => update(
            kind,
            "UPDATE player_stats SET secondary_checked = 1, has_secondary_stat = \
             CASE WHEN secondary_stat IS NULL THEN ?1 ELSE has_secondary_stat END \
             WHERE primary_player_id = ?2",
            &fields,
            &["has_secondary_stat", "primary_player_id"],
        ),
        RecordKind::FeedOdds => update(
            kind,
            "INSERT INTO odds (match_id, feed_odds) VALUES (?1, ?2) \
             ON CONFLICT(match_id) DO UPDATE SET feed_odds = excluded.feed_odds",
            &fields,
            &["match_id", "feed_odds"],
        ),
        RecordKind::FeedStatistic => update(
            kind,
            "INSERT INTO statistics (match_id, feed_statistics, home_score, away_score) \
             VALUES (?1, ?2, ?3, ?4) ON CONFLICT(match_id) DO UPDATE SET \
             feed_statistics = excluded.feed_statistics, \
             home_score = COALESCE(statistics.home_score, excluded.home_score), \
             away_score = COALESCE(statistics.away_score, excluded.away_score)",
            &fields,
            &["match_id", "feed_statistics", "home_score", "away_score"],
        ),
        _ => upsert(kind, &fields),
    }
}

/// Queues one statement per record and runs them all in a single transaction on finalize.
pub struct QueuedSink<'c> {
    conn: &'c mut Connection,
    queue: Vec<QueuedStatement>,
}

impl<'c> QueuedSink<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self {
            conn,
            queue: Vec::new(),
        }
    }

    pub fn queued(&self) -> &[QueuedStatement] {
        &self.queue
    }
}

impl Sink for QueuedSink<'_> {
    type Output = Result<FlushReport>;

    fn accept(&mut self, record: Record) {
        self.queue.push(statement_for(&record));
    }

    fn finalize(self) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        let tx = self.conn.transaction().context("begin flush transaction")?;
        for statement in &self.queue {
            let outcome = tx
                .prepare_cached(&statement.sql)
                .and_then(|mut stmt| stmt.execute(params_from_iter(statement.params.iter())));
            match outcome {
                Ok(changed) => {
                    report.executed += 1;
                    report.rows_changed += changed;
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(table = statement.kind.table(), error = %err, "queued statement failed");
                }
            }
        }
        tx.commit().context("commit flush transaction")?;
        info!(
            executed = report.executed,
            failed = report.failed,
            rows_changed = report.rows_changed,
            "flushed write queue"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ManagerRecord, SecondaryIdUpdate};

    #[test]
    fn base_records_become_upserts() {
        let statement = statement_for(&Record::from(ManagerRecord {
            manager_id: 4,
            manager_name: "Pep".to_string(),
        }));
        assert_eq!(
            statement.sql,
            "INSERT INTO managers (manager_id, manager_name) VALUES (?1, ?2) \
             ON CONFLICT(manager_id) DO UPDATE SET \
             manager_name = COALESCE(excluded.manager_name, managers.manager_name)"
        );
        assert_eq!(
            statement.params,
            vec![SqlValue::Integer(4), SqlValue::Text("Pep".to_string())]
        );
    }

    #[test]
    fn update_records_bind_in_statement_order() {
        let statement = statement_for(&Record::from(SecondaryIdUpdate {
            primary_player_id: 10,
            secondary_player_id: 20,
        }));
        assert!(statement.sql.starts_with("UPDATE players"));
        assert_eq!(
            statement.params,
            vec![SqlValue::Integer(20), SqlValue::Integer(10)]
        );
    }
}
