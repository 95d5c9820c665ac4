use anyhow::Result;
use rusqlite::Connection;

use crate::config::SinkKind;
use crate::queued_sink::{FlushReport, QueuedSink};
use crate::records::Record;
use crate::tabular_sink::{TabularOutput, TabularSink};

/// Accumulation target for normalized records.
pub trait Sink {
    type Output;

    fn accept(&mut self, record: Record);

    fn accept_all<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = Record>,
        Self: Sized,
    {
        for record in records {
            self.accept(record);
        }
    }

    fn finalize(self) -> Self::Output;
}

#[derive(Debug, Default)]
pub struct NullSink {
    discarded: usize,
}

impl Sink for NullSink {
    /// Number of records dropped.
    type Output = usize;

    fn accept(&mut self, _record: Record) {
        self.discarded += 1;
    }

    fn finalize(self) -> usize {
        self.discarded
    }
}

pub enum AnySink<'c> {
    Tabular(TabularSink),
    Queued(QueuedSink<'c>),
    Null(NullSink),
}

#[derive(Debug)]
pub enum SinkOutput {
    Tabular(TabularOutput),
    Queued(FlushReport),
    Null { discarded: usize },
}

impl<'c> AnySink<'c> {
    /// The queued variant writes through `conn`. Other variants ignore it.
    pub fn for_kind(kind: SinkKind, conn: Option<&'c mut Connection>) -> Result<Self> {
        Ok(match kind {
            SinkKind::Tabular => AnySink::Tabular(TabularSink::default()),
            SinkKind::Null => AnySink::Null(NullSink::default()),
            SinkKind::Queued => {
                let conn = conn.ok_or_else(|| anyhow::anyhow!("queued sink needs a database"))?;
                AnySink::Queued(QueuedSink::new(conn))
            }
        })
    }
}

impl Sink for AnySink<'_> {
    type Output = Result<SinkOutput>;

    fn accept(&mut self, record: Record) {
        match self {
            AnySink::Tabular(sink) => sink.accept(record),
            AnySink::Queued(sink) => sink.accept(record),
            AnySink::Null(sink) => sink.accept(record),
        }
    }

    fn finalize(self) -> Result<SinkOutput> {
        Ok(match self {
            AnySink::Tabular(sink) => SinkOutput::Tabular(sink.finalize()),
            AnySink::Queued(sink) => SinkOutput::Queued(sink.finalize()?),
            AnySink::Null(sink) => SinkOutput::Null {
                discarded: sink.finalize(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ManagerRecord;

    #[test]
    fn null_sink_counts_and_discards() {
        let mut sink = NullSink::default();
        sink.accept_all((0..3).map(|id| {
            Record::from(ManagerRecord {
                manager_id: id,
                manager_name: format!("manager {id}"),
            })
        }));
        assert_eq!(sink.finalize(), 3);
    }

    #[test]
    fn queued_sink_requires_connection() {
        assert!(AnySink::for_kind(SinkKind::Queued, None).is_err());
        assert!(matches!(
            AnySink::for_kind(SinkKind::Null, None),
            Ok(AnySink::Null(_))
        ));
    }
}
